// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Network manager: named networks, their pools, and per-job attachment.
//!
//! The built-ins `none`, `isolated`, and `bridge` always exist and cannot
//! be deleted. User networks may be created up to the configured cap.
//! Bridge and veth manipulation is serialised per network; IP allocation
//! is serialised by each pool's own lock.

use crate::ip_pool::IpPool;
use crate::link::LinkOps;
use ipnetwork::Ipv4Network;
use joblet_core::config::NetworkSection;
use joblet_core::{is_builtin_network, JobId, JobNetworkAllocation, NetworkConfig};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("unknown network: {0}")]
    UnknownNetwork(String),
    #[error("network {0} already exists")]
    AlreadyExists(String),
    #[error("built-in network {0} cannot be modified")]
    BuiltinImmutable(String),
    #[error("user network cap ({0}) reached")]
    CapReached(usize),
    #[error("invalid CIDR {cidr}: {reason}")]
    InvalidCidr { cidr: String, reason: String },
    #[error("no free addresses in network {0}")]
    PoolExhausted(String),
    #[error("link operation failed: {0}")]
    Link(String),
}

struct NetworkState {
    config: NetworkConfig,
    /// Absent for `none`/`isolated`.
    pool: Option<Arc<IpPool>>,
    /// Serialises bridge/veth work for this network.
    ops_lock: Arc<tokio::sync::Mutex<()>>,
    bridge_ready: bool,
}

/// Owns every network and the per-job allocations.
pub struct NetworkManager {
    link: Arc<dyn LinkOps>,
    networks: Mutex<HashMap<String, NetworkState>>,
    allocations: Mutex<HashMap<JobId, JobNetworkAllocation>>,
    max_custom: usize,
}

impl NetworkManager {
    /// Seed the built-ins plus any user networks from configuration.
    pub fn new(section: &NetworkSection, link: Arc<dyn LinkOps>) -> Result<Self, NetworkError> {
        let mut networks = HashMap::new();

        for name in ["none", "isolated"] {
            networks.insert(
                name.to_string(),
                NetworkState {
                    config: NetworkConfig {
                        name: name.to_string(),
                        cidr: String::new(),
                        bridge: String::new(),
                    },
                    pool: None,
                    ops_lock: Arc::new(tokio::sync::Mutex::new(())),
                    bridge_ready: true,
                },
            );
        }

        networks.insert(
            "bridge".to_string(),
            Self::bridged_state(NetworkConfig {
                name: "bridge".to_string(),
                cidr: section.bridge_cidr.clone(),
                bridge: String::new(),
            })?,
        );

        let manager = Self {
            link,
            networks: Mutex::new(networks),
            allocations: Mutex::new(HashMap::new()),
            max_custom: section.max_custom_networks,
        };

        for (name, def) in &section.networks {
            manager.create_network(name, &def.cidr, &def.bridge)?;
        }

        Ok(manager)
    }

    fn bridged_state(config: NetworkConfig) -> Result<NetworkState, NetworkError> {
        let network: Ipv4Network =
            config
                .cidr
                .parse()
                .map_err(|e: ipnetwork::IpNetworkError| NetworkError::InvalidCidr {
                    cidr: config.cidr.clone(),
                    reason: e.to_string(),
                })?;
        Ok(NetworkState {
            pool: Some(Arc::new(IpPool::new(network))),
            ops_lock: Arc::new(tokio::sync::Mutex::new(())),
            bridge_ready: false,
            config,
        })
    }

    /// Create a user-defined bridged network.
    pub fn create_network(
        &self,
        name: &str,
        cidr: &str,
        bridge: &str,
    ) -> Result<(), NetworkError> {
        if is_builtin_network(name) {
            return Err(NetworkError::BuiltinImmutable(name.to_string()));
        }
        let mut networks = self.networks.lock();
        if networks.contains_key(name) {
            return Err(NetworkError::AlreadyExists(name.to_string()));
        }
        let custom_count = networks
            .keys()
            .filter(|k| !is_builtin_network(k))
            .count();
        if custom_count >= self.max_custom {
            return Err(NetworkError::CapReached(self.max_custom));
        }

        let state = Self::bridged_state(NetworkConfig {
            name: name.to_string(),
            cidr: cidr.to_string(),
            bridge: bridge.to_string(),
        })?;
        networks.insert(name.to_string(), state);
        info!(network = name, cidr, "network created");
        Ok(())
    }

    /// Remove a user-defined network. Built-ins are immutable.
    pub async fn remove_network(&self, name: &str) -> Result<(), NetworkError> {
        if is_builtin_network(name) {
            return Err(NetworkError::BuiltinImmutable(name.to_string()));
        }
        let state = {
            let mut networks = self.networks.lock();
            networks
                .remove(name)
                .ok_or_else(|| NetworkError::UnknownNetwork(name.to_string()))?
        };
        if state.bridge_ready {
            self.link
                .delete_bridge(&state.config.bridge_name())
                .await
                .map_err(NetworkError::Link)?;
        }
        info!(network = name, "network removed");
        Ok(())
    }

    pub fn exists(&self, name: &str) -> bool {
        self.networks.lock().contains_key(name)
    }

    pub fn list(&self) -> Vec<NetworkConfig> {
        let mut configs: Vec<NetworkConfig> = self
            .networks
            .lock()
            .values()
            .map(|s| s.config.clone())
            .collect();
        configs.sort_by(|a, b| a.name.cmp(&b.name));
        configs
    }

    /// Attach a job to a network once its child process (and thus its
    /// network namespace) exists.
    ///
    /// `none` is a no-op; `isolated` brings up loopback only; bridged
    /// networks get a veth pair, an address from the pool, and a default
    /// route via the gateway.
    pub async fn attach(
        &self,
        job_id: &JobId,
        network_name: &str,
        pid: u32,
        hostname: &str,
    ) -> Result<Option<JobNetworkAllocation>, NetworkError> {
        if network_name == "none" {
            return Ok(None);
        }
        if network_name == "isolated" {
            self.link
                .setup_loopback(pid)
                .await
                .map_err(NetworkError::Link)?;
            return Ok(None);
        }

        let (config, pool, ops_lock, needs_bridge) = {
            let networks = self.networks.lock();
            let state = networks
                .get(network_name)
                .ok_or_else(|| NetworkError::UnknownNetwork(network_name.to_string()))?;
            let pool = state
                .pool
                .clone()
                .ok_or_else(|| NetworkError::UnknownNetwork(network_name.to_string()))?;
            (
                state.config.clone(),
                pool,
                Arc::clone(&state.ops_lock),
                !state.bridge_ready,
            )
        };

        let _guard = ops_lock.lock().await;

        let bridge = config.bridge_name();
        if needs_bridge {
            let prefix = pool.network().prefix();
            let gateway_cidr = format!("{}/{}", pool.gateway(), prefix);
            self.link
                .ensure_bridge(&bridge, &gateway_cidr, &config.cidr)
                .await
                .map_err(NetworkError::Link)?;
            if let Some(state) = self.networks.lock().get_mut(network_name) {
                state.bridge_ready = true;
            }
        }

        let ip = pool
            .allocate()
            .ok_or_else(|| NetworkError::PoolExhausted(network_name.to_string()))?;

        // Interface names are capped at 15 chars; the short job id keeps
        // the pair well under it.
        let veth_host = format!("vh-{}", job_id.short(8));
        let veth_peer = format!("vp-{}", job_id.short(8));

        let result = self
            .plumb_veth(&pool, &bridge, &veth_host, &veth_peer, ip, pid)
            .await;
        if let Err(e) = result {
            pool.release(ip);
            let _ = self.link.delete_link(&veth_host).await;
            return Err(e);
        }

        let allocation = JobNetworkAllocation {
            job_id: job_id.clone(),
            network: network_name.to_string(),
            ip,
            hostname: hostname.to_string(),
            veth_host,
            veth_peer,
        };
        self.allocations
            .lock()
            .insert(job_id.clone(), allocation.clone());
        debug!(job_id = %job_id, network = network_name, ip = %ip, "job attached");
        Ok(Some(allocation))
    }

    async fn plumb_veth(
        &self,
        pool: &IpPool,
        bridge: &str,
        veth_host: &str,
        veth_peer: &str,
        ip: std::net::Ipv4Addr,
        pid: u32,
    ) -> Result<(), NetworkError> {
        let prefix = pool.network().prefix();
        let ip_cidr = format!("{}/{}", ip, prefix);

        self.link
            .create_veth(veth_host, veth_peer)
            .await
            .map_err(NetworkError::Link)?;
        self.link
            .attach_to_bridge(veth_host, bridge)
            .await
            .map_err(NetworkError::Link)?;
        self.link
            .move_into_ns(veth_peer, pid)
            .await
            .map_err(NetworkError::Link)?;
        self.link
            .configure_in_ns(pid, veth_peer, &ip_cidr, pool.gateway())
            .await
            .map_err(NetworkError::Link)?;
        Ok(())
    }

    /// Release a job's network artefacts: delete the host veth end and
    /// return the address to the pool. Safe to call for jobs that never
    /// attached.
    pub async fn detach(&self, job_id: &JobId) -> Result<(), NetworkError> {
        let Some(allocation) = self.allocations.lock().remove(job_id) else {
            return Ok(());
        };

        let mut failed = None;
        if let Err(e) = self.link.delete_link(&allocation.veth_host).await {
            warn!(job_id = %job_id, veth = %allocation.veth_host, error = %e, "veth removal failed");
            failed = Some(e);
        }

        if let Some(pool) = self.pool_of(&allocation.network) {
            pool.release(allocation.ip);
        }

        debug!(job_id = %job_id, network = %allocation.network, ip = %allocation.ip, "job detached");
        match failed {
            None => Ok(()),
            Some(e) => Err(NetworkError::Link(e)),
        }
    }

    /// The allocation currently held by a job, if any.
    pub fn allocation(&self, job_id: &JobId) -> Option<JobNetworkAllocation> {
        self.allocations.lock().get(job_id).cloned()
    }

    fn pool_of(&self, network: &str) -> Option<Arc<IpPool>> {
        self.networks.lock().get(network).and_then(|s| s.pool.clone())
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
