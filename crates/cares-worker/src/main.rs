//! CARES worker binary.
//!
//! Joins the cluster, streams metrics, and serves function execution
//! requests until shut down. A dropped heartbeat stream triggers a
//! reconnect with the same node id.

use std::sync::Arc;

use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use cares_worker::{
    ClusterClient, DockerRuntime, ExecuteServer, FixedProbe, ProcProbe, ResourceProbe,
    WorkerConfig,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("cares_worker=info".parse()?))
        .init();

    info!("CARES worker starting");

    let config = WorkerConfig::load()?;
    info!(
        orchestrator = %config.cluster.orchestrator_addr,
        rpc_addr = %config.rpc.listen_addr,
        heartbeat_secs = config.heartbeat.interval.as_secs(),
        "configuration loaded"
    );

    let cancel = CancellationToken::new();
    let cancel_on_signal = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("shutdown signal received, initiating graceful shutdown");
        cancel_on_signal.cancel();
    });

    // Execute listener.
    let runtime = Arc::new(DockerRuntime::with_binary(&config.runtime.binary));
    let server = ExecuteServer::new(runtime);
    let listener = cares_core::TcpListener::bind(config.rpc.listen_addr).await?;
    let server_cancel = cancel.clone();
    let server_task = tokio::spawn(async move {
        if let Err(e) = server.run(listener, server_cancel).await {
            error!(error = %e, "execute listener failed");
        }
    });

    // Cluster membership with reconnect.
    let client = ClusterClient::new(&config);
    info!(node_id = %client.node_id(), "cluster identity assigned");

    let probe: Arc<dyn ResourceProbe> = if cfg!(target_os = "linux") {
        Arc::new(ProcProbe::new())
    } else {
        warn!("procfs probe unavailable on this platform, reporting idle metrics");
        Arc::new(FixedProbe::idle())
    };
    let reconnect_delay = config.cluster.reconnect_delay;

    while !cancel.is_cancelled() {
        match client.run_session(probe.clone(), cancel.clone()).await {
            Ok(()) => break,
            Err(e) => {
                warn!(error = %e, delay_secs = reconnect_delay.as_secs(), "cluster session ended, reconnecting");
            }
        }

        tokio::select! {
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(reconnect_delay) => {}
        }
    }

    cancel.cancel();
    let _ = server_task.await;

    info!("worker shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("received Ctrl+C");
        }
        () = terminate => {
            info!("received SIGTERM");
        }
    }
}
