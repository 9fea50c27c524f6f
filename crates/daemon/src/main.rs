// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! jobletd: the joblet daemon binary.
//!
//! Wires the subsystems together, initialises the cgroup hierarchy,
//! starts the background loops, and runs until SIGTERM/SIGINT. Shutdown
//! flushes both telemetry pipelines and the state batcher before exit.

use joblet_core::{Config, SystemClock};
use joblet_daemon::{
    CleanupCoordinator, FsRuntimeCatalog, JobRegistry, JobRuntime, JobService, ValidationService,
    VolumeManager,
};
use joblet_daemon::runtime::RuntimeDeps;
use joblet_isolation::{CgroupManager, FilesystemIsolator};
use joblet_network::{IpCommandLinkOps, NetworkManager};
use joblet_state::{BatcherConfig, StateBatcher, StateClient};
use joblet_telemetry::{HistoryReader, LogPipeline, MetricsPipeline};
use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Lock file guarding against a second daemon on the same host.
const LOCK_PATH: &str = "/run/joblet/jobletd.lock";

fn init_tracing(log_dir: &Path) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match std::fs::create_dir_all(log_dir) {
        Ok(()) => {
            let appender = tracing_appender::rolling::daily(log_dir, "jobletd.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .init();
            Some(guard)
        }
        Err(_) => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
            None
        }
    }
}

fn acquire_daemon_lock() -> Option<File> {
    use fs2::FileExt;
    if let Some(parent) = Path::new(LOCK_PATH).parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let file = File::create(LOCK_PATH).ok()?;
    match file.try_lock_exclusive() {
        Ok(()) => Some(file),
        Err(_) => None,
    }
}

#[tokio::main]
async fn main() {
    let config = match Config::discover() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("jobletd: configuration error: {}", e);
            std::process::exit(2);
        }
    };

    let _tracing_guard = init_tracing(Path::new("/var/log/joblet"));

    let Some(_lock) = acquire_daemon_lock() else {
        error!("another jobletd instance holds {}", LOCK_PATH);
        std::process::exit(1);
    };

    info!(version = env!("CARGO_PKG_VERSION"), "jobletd starting");

    // Cgroup hierarchy first: everything else depends on the delegated
    // base being writable.
    let cgroup = Arc::new(CgroupManager::new(&config.cgroup));
    if let Err(e) = cgroup.init(std::process::id()) {
        error!(error = %e, "cgroup initialisation failed");
        std::process::exit(1);
    }

    let isolator = Arc::new(FilesystemIsolator::new(&config.filesystem, &config.runtimes));
    let network = match NetworkManager::new(&config.network, Arc::new(IpCommandLinkOps)) {
        Ok(network) => Arc::new(network),
        Err(e) => {
            error!(error = %e, "network manager initialisation failed");
            std::process::exit(1);
        }
    };
    let volumes = match VolumeManager::new(&config.volumes) {
        Ok(volumes) => Arc::new(volumes),
        Err(e) => {
            error!(error = %e, "volume manager initialisation failed");
            std::process::exit(1);
        }
    };
    let runtimes = Arc::new(FsRuntimeCatalog::new(&config.runtimes));

    let logs = Arc::new(LogPipeline::start(config.logs.clone()));
    let metrics = Arc::new(MetricsPipeline::start(config.metrics.clone()));

    let state_client = StateClient::new(&config.state);
    if let Err(e) = state_client.ping().await {
        warn!(error = %e, "state subprocess unreachable at startup, continuing");
    }
    let batcher = Arc::new(StateBatcher::start(
        state_client,
        BatcherConfig {
            queue_size: config.state.batch_queue_size,
        },
    ));

    let cleanup = Arc::new(CleanupCoordinator::new(
        Arc::clone(&cgroup),
        Arc::clone(&isolator),
        Arc::clone(&network),
        Arc::clone(&batcher),
        Duration::from_secs(config.cgroup.cleanup_timeout_secs),
    ));

    let runtime = JobRuntime::new(RuntimeDeps {
        validation: ValidationService::new(config.joblet.clone()),
        clock: Arc::new(SystemClock),
        registry: Arc::new(JobRegistry::new()),
        cgroup,
        isolator,
        network: Arc::clone(&network),
        volumes: Arc::clone(&volumes),
        runtimes: Arc::clone(&runtimes),
        logs: Arc::clone(&logs),
        metrics: Arc::clone(&metrics),
        batcher: Arc::clone(&batcher),
        cleanup,
        config: config.clone(),
    });

    let _service = JobService::new(
        Arc::clone(&runtime),
        Arc::clone(&logs),
        Arc::clone(&metrics),
        HistoryReader::new(config.logs.base.clone()),
        HistoryReader::new(config.metrics.base.clone()),
        network,
        volumes,
        runtimes,
    );
    // The RPC transport layers over `_service`; it is out of scope here.

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let background = tokio::spawn(Arc::clone(&runtime).run_background(shutdown_rx.clone()));
    let sweeper = joblet_telemetry::spawn_retention_sweeper(
        vec![
            (config.logs.base.clone(), config.logs.retention_days),
            (config.metrics.base.clone(), config.metrics.retention_days),
        ],
        Duration::from_secs(3600),
        shutdown_rx,
    );

    info!("jobletd ready");

    let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
    {
        Ok(sigterm) => sigterm,
        Err(e) => {
            error!(error = %e, "signal handler installation failed");
            std::process::exit(1);
        }
    };
    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("SIGINT received"),
        _ = sigterm.recv() => info!("SIGTERM received"),
    }

    info!("jobletd shutting down");
    let _ = shutdown_tx.send(true);
    let _ = background.await;
    let _ = sweeper.await;

    // Partial batches must reach disk before exit.
    logs.shutdown().await;
    metrics.shutdown().await;
    batcher.shutdown().await;

    info!("jobletd stopped");
}
