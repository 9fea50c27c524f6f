// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Network definitions and per-job allocations.

use crate::job::JobId;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

/// The three networks that always exist and cannot be deleted.
pub const BUILTIN_NETWORKS: [&str; 3] = ["none", "isolated", "bridge"];

/// Whether a network name refers to a built-in.
pub fn is_builtin_network(name: &str) -> bool {
    BUILTIN_NETWORKS.contains(&name)
}

/// A named bridge network with a CIDR.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub name: String,
    /// IPv4 CIDR, e.g. `172.20.0.0/16`. Empty for `none`/`isolated`.
    #[serde(default)]
    pub cidr: String,
    /// Bridge interface name; derived from the network name when empty.
    #[serde(default)]
    pub bridge: String,
}

impl NetworkConfig {
    pub fn bridge_name(&self) -> String {
        if self.bridge.is_empty() {
            format!("joblet-{}", self.name)
        } else {
            self.bridge.clone()
        }
    }
}

/// A job's slot in a network: created when the job enters its network
/// namespace, destroyed during cleanup. Each `(network, ip)` pair is
/// uniquely owned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobNetworkAllocation {
    pub job_id: JobId,
    pub network: String,
    pub ip: Ipv4Addr,
    pub hostname: String,
    /// Host-side veth interface name (peer end moves into the namespace).
    pub veth_host: String,
    pub veth_peer: String,
}
