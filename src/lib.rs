//! Host Pulse: a host-local telemetry agent.
//!
//! A single [`metrics::Engine`] samples procfs, the disk, the network
//! socket tables and the container runtime. Its snapshots are served in two
//! ways: on request by the [`api`] endpoint and pushed periodically to
//! WebSocket clients by the [`stream`] session manager.
use std::sync::Arc;

use container::CliRuntime;
use metrics::Engine;
use stream::{SessionLimiter, StreamServer};

pub mod api;
pub mod auth;
pub mod config;
pub mod container;
pub mod environment;
pub mod error;
pub mod fsutil;
pub mod metrics;
pub mod procfs;
pub mod stream;

/// Runs the agent until Ctrl-C.
///
/// Configuration comes from the environment (see [`config`]). Inside a
/// container the host's root filesystem is read from `ROOTFS_MOUNT_PATH`.
///
/// # Errors
///
/// Returns an error if either listener cannot be bound or fails while serving.
pub async fn run() -> error::Result<()> {
    let config = config::ServerConfig::from_env();
    let host = environment::resolve_host_paths(&config.rootfs);
    log::debug!(
        "Environment: {:?}, procfs: {}, disk: {}",
        host.environment,
        host.proc_root.path().display(),
        host.disk_path.display()
    );
    if config.api_token.is_empty() {
        log::warn!("MONITORING_API_TOKEN is not set; both endpoints accept unauthenticated clients");
    }

    let mut builder = Engine::builder();
    builder
        .set_proc_root(host.proc_root)
        .set_disk_path(host.disk_path)
        .set_container_runtime(Box::new(CliRuntime::new(config.container_cli.clone())));
    let engine = Arc::new(builder.build());

    let shutdown = stream::shutdown_signal(async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => log::info!("Shutting down"),
            Err(err) => log::error!("Failed to listen for Ctrl-C: {err}"),
        }
    });

    let token: Arc<str> = Arc::from(config.api_token.as_str());
    let api = api::APIServer::new(
        Arc::clone(&engine),
        &config.metrics_endpoint.path,
        Arc::clone(&token),
    );
    let streams = StreamServer::new(
        engine,
        SessionLimiter::new(config.max_sessions),
        token,
        shutdown.clone(),
    );

    let ws_addr = config.ws_addr();
    tokio::try_join!(
        api.listen(&config.metrics_endpoint.addr, shutdown.clone()),
        streams.listen(&ws_addr, shutdown),
    )?;
    Ok(())
}
