// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Link-layer operations behind a capability trait.
//!
//! The production implementation drives `ip(8)` (and `nsenter(1)` for the
//! job's network namespace) through the timeout-wrapped subprocess helper;
//! tests inject [`FakeLinkOps`] and assert on the recorded call sequence.

use async_trait::async_trait;
use joblet_platform::process::{run_checked, LINK_TIMEOUT};
use std::net::Ipv4Addr;
use tokio::process::Command;
use tracing::debug;

/// Netlink-level operations the network manager needs.
#[async_trait]
pub trait LinkOps: Send + Sync {
    /// Create the bridge if absent, assign the gateway address, bring it
    /// up, and install the NAT masquerade rule for its CIDR.
    async fn ensure_bridge(&self, name: &str, gateway_cidr: &str, cidr: &str)
        -> Result<(), String>;

    /// Delete a bridge.
    async fn delete_bridge(&self, name: &str) -> Result<(), String>;

    /// Create a veth pair.
    async fn create_veth(&self, host: &str, peer: &str) -> Result<(), String>;

    /// Attach the host end to a bridge and bring it up.
    async fn attach_to_bridge(&self, host: &str, bridge: &str) -> Result<(), String>;

    /// Move the peer end into the network namespace of `pid`.
    async fn move_into_ns(&self, peer: &str, pid: u32) -> Result<(), String>;

    /// Inside the namespace of `pid`: address the peer, bring `lo` and the
    /// peer up, and set the default route to the gateway.
    async fn configure_in_ns(
        &self,
        pid: u32,
        peer: &str,
        ip_cidr: &str,
        gateway: Ipv4Addr,
    ) -> Result<(), String>;

    /// Bring up loopback only (the `isolated` network).
    async fn setup_loopback(&self, pid: u32) -> Result<(), String>;

    /// Delete a link by name; absent links are fine.
    async fn delete_link(&self, name: &str) -> Result<(), String>;
}

/// `ip(8)`-backed implementation.
#[derive(Debug, Clone, Copy, Default)]
pub struct IpCommandLinkOps;

impl IpCommandLinkOps {
    async fn ip(&self, args: &[&str], description: &str) -> Result<(), String> {
        let mut cmd = Command::new("ip");
        cmd.args(args);
        run_checked(cmd, LINK_TIMEOUT, description).await?;
        Ok(())
    }

    /// `ip` invocation inside the network namespace of `pid`.
    async fn ip_in_ns(&self, pid: u32, args: &[&str], description: &str) -> Result<(), String> {
        let pid_arg = pid.to_string();
        let mut cmd = Command::new("nsenter");
        cmd.args(["-t", &pid_arg, "-n", "ip"]).args(args);
        run_checked(cmd, LINK_TIMEOUT, description).await?;
        Ok(())
    }

    async fn link_exists(&self, name: &str) -> bool {
        let mut cmd = Command::new("ip");
        cmd.args(["link", "show", name]);
        matches!(
            joblet_platform::process::run_with_timeout(cmd, LINK_TIMEOUT, "ip link show").await,
            Ok(output) if output.status.success()
        )
    }
}

#[async_trait]
impl LinkOps for IpCommandLinkOps {
    async fn ensure_bridge(
        &self,
        name: &str,
        gateway_cidr: &str,
        cidr: &str,
    ) -> Result<(), String> {
        if !self.link_exists(name).await {
            self.ip(
                &["link", "add", name, "type", "bridge"],
                "bridge creation",
            )
            .await?;
            self.ip(
                &["addr", "add", gateway_cidr, "dev", name],
                "bridge gateway address",
            )
            .await?;
        }
        self.ip(&["link", "set", name, "up"], "bridge up").await?;

        // NAT to the host for outbound traffic; -C probes for an existing
        // rule so repeated ensures stay idempotent.
        let mut check = Command::new("iptables");
        check.args(["-t", "nat", "-C", "POSTROUTING", "-s", cidr, "-j", "MASQUERADE"]);
        let present = matches!(
            joblet_platform::process::run_with_timeout(check, LINK_TIMEOUT, "nat probe").await,
            Ok(output) if output.status.success()
        );
        if !present {
            let mut add = Command::new("iptables");
            add.args(["-t", "nat", "-A", "POSTROUTING", "-s", cidr, "-j", "MASQUERADE"]);
            run_checked(add, LINK_TIMEOUT, "nat masquerade").await?;
        }

        debug!(bridge = name, cidr, "bridge ensured");
        Ok(())
    }

    async fn delete_bridge(&self, name: &str) -> Result<(), String> {
        self.delete_link(name).await
    }

    async fn create_veth(&self, host: &str, peer: &str) -> Result<(), String> {
        self.ip(
            &["link", "add", host, "type", "veth", "peer", "name", peer],
            "veth creation",
        )
        .await
    }

    async fn attach_to_bridge(&self, host: &str, bridge: &str) -> Result<(), String> {
        self.ip(&["link", "set", host, "master", bridge], "veth master")
            .await?;
        self.ip(&["link", "set", host, "up"], "veth host up").await
    }

    async fn move_into_ns(&self, peer: &str, pid: u32) -> Result<(), String> {
        let pid_arg = pid.to_string();
        self.ip(
            &["link", "set", peer, "netns", &pid_arg],
            "veth move to namespace",
        )
        .await
    }

    async fn configure_in_ns(
        &self,
        pid: u32,
        peer: &str,
        ip_cidr: &str,
        gateway: Ipv4Addr,
    ) -> Result<(), String> {
        let gw = gateway.to_string();
        self.ip_in_ns(pid, &["addr", "add", ip_cidr, "dev", peer], "peer address")
            .await?;
        self.ip_in_ns(pid, &["link", "set", "lo", "up"], "loopback up")
            .await?;
        self.ip_in_ns(pid, &["link", "set", peer, "up"], "peer up")
            .await?;
        self.ip_in_ns(
            pid,
            &["route", "add", "default", "via", &gw],
            "default route",
        )
        .await
    }

    async fn setup_loopback(&self, pid: u32) -> Result<(), String> {
        self.ip_in_ns(pid, &["link", "set", "lo", "up"], "loopback up")
            .await
    }

    async fn delete_link(&self, name: &str) -> Result<(), String> {
        if !self.link_exists(name).await {
            return Ok(());
        }
        self.ip(&["link", "del", name], "link deletion").await
    }
}

/// Recording fake for tests.
#[cfg(any(test, feature = "test-support"))]
pub struct FakeLinkOps {
    calls: parking_lot::Mutex<Vec<String>>,
    /// Call descriptions that should fail, by substring match.
    fail_on: parking_lot::Mutex<Vec<String>>,
}

#[cfg(any(test, feature = "test-support"))]
impl Default for FakeLinkOps {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(any(test, feature = "test-support"))]
impl FakeLinkOps {
    pub fn new() -> Self {
        Self {
            calls: parking_lot::Mutex::new(Vec::new()),
            fail_on: parking_lot::Mutex::new(Vec::new()),
        }
    }

    pub fn fail_on(&self, substring: impl Into<String>) {
        self.fail_on.lock().push(substring.into());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    fn record(&self, call: String) -> Result<(), String> {
        for pattern in self.fail_on.lock().iter() {
            if call.contains(pattern.as_str()) {
                return Err(format!("injected failure for {}", call));
            }
        }
        self.calls.lock().push(call);
        Ok(())
    }
}

#[cfg(any(test, feature = "test-support"))]
#[async_trait]
impl LinkOps for FakeLinkOps {
    async fn ensure_bridge(
        &self,
        name: &str,
        gateway_cidr: &str,
        cidr: &str,
    ) -> Result<(), String> {
        self.record(format!("ensure_bridge {} {} {}", name, gateway_cidr, cidr))
    }

    async fn delete_bridge(&self, name: &str) -> Result<(), String> {
        self.record(format!("delete_bridge {}", name))
    }

    async fn create_veth(&self, host: &str, peer: &str) -> Result<(), String> {
        self.record(format!("create_veth {} {}", host, peer))
    }

    async fn attach_to_bridge(&self, host: &str, bridge: &str) -> Result<(), String> {
        self.record(format!("attach_to_bridge {} {}", host, bridge))
    }

    async fn move_into_ns(&self, peer: &str, pid: u32) -> Result<(), String> {
        self.record(format!("move_into_ns {} {}", peer, pid))
    }

    async fn configure_in_ns(
        &self,
        pid: u32,
        peer: &str,
        ip_cidr: &str,
        gateway: Ipv4Addr,
    ) -> Result<(), String> {
        self.record(format!(
            "configure_in_ns {} {} {} {}",
            pid, peer, ip_cidr, gateway
        ))
    }

    async fn setup_loopback(&self, pid: u32) -> Result<(), String> {
        self.record(format!("setup_loopback {}", pid))
    }

    async fn delete_link(&self, name: &str) -> Result<(), String> {
        self.record(format!("delete_link {}", name))
    }
}
