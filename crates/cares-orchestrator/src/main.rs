//! CARES orchestrator binary.
//!
//! Hosts the cluster RPC plane, the HTTP API, and the background
//! snapshot writer for the function registry.

use std::sync::Arc;

use tokio::signal;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use cares_orchestrator::{
    api, cluster::ClusterServer, CommandQueues, FunctionRegistry, NodeRegistry,
    OrchestratorConfig, Scheduler, SnapshotStore,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("cares_orchestrator=info".parse()?),
        )
        .init();

    info!("CARES orchestrator starting");

    let config = OrchestratorConfig::load()?;
    info!(
        rpc_addr = %config.rpc.listen_addr,
        http_addr = %config.http.listen_addr,
        snapshot_path = %config.storage.snapshot_path.display(),
        "configuration loaded"
    );

    let cancel = CancellationToken::new();
    let cancel_on_signal = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("shutdown signal received, initiating graceful shutdown");
        cancel_on_signal.cancel();
    });

    // Function registry, seeded from the snapshot when one is readable.
    let store = SnapshotStore::new(config.storage.snapshot_path.clone());
    let initial = match store.load() {
        Ok(functions) => {
            info!(count = functions.len(), "function snapshot loaded");
            functions
        }
        Err(e) => {
            warn!(error = %e, "could not load function snapshot, starting empty");
            Vec::new()
        }
    };
    let (persist_tx, persist_rx) = watch::channel(Vec::new());
    let functions = Arc::new(FunctionRegistry::with_persistence(initial, persist_tx));
    let writer = store.spawn_writer(persist_rx, cancel.clone());

    // Node registry and command queues shared by the RPC plane and the API.
    let nodes = Arc::new(NodeRegistry::new());
    let queues = Arc::new(CommandQueues::with_depth(config.commands.queue_depth));

    // Cluster RPC plane.
    let cluster = ClusterServer::new(nodes.clone(), queues.clone());
    let rpc_listener = cares_core::TcpListener::bind(config.rpc.listen_addr).await?;
    let rpc_cancel = cancel.clone();
    let rpc_task = tokio::spawn(async move {
        if let Err(e) = cluster.run(rpc_listener, rpc_cancel).await {
            error!(error = %e, "cluster RPC plane failed");
        }
    });

    // HTTP API.
    let state = Arc::new(api::AppState {
        nodes,
        functions,
        scheduler: Scheduler::new(),
        dispatch_timeout: config.dispatch.timeout,
    });
    let app = api::router(state);

    let listener = tokio::net::TcpListener::bind(config.http.listen_addr).await?;
    info!(addr = %config.http.listen_addr, "HTTP API listening");

    let http_cancel = cancel.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { http_cancel.cancelled().await })
        .await?;

    cancel.cancel();
    let _ = rpc_task.await;
    let _ = writer.await;

    info!("orchestrator shutdown complete");
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
