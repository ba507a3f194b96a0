//! Cluster RPC plane: join handshake and heartbeat streams.
//!
//! Each worker holds one persistent connection to this listener. The
//! first frame is a Join; after the acknowledgement the same connection
//! carries the worker's metric stream in one direction and queued
//! commands in the other. Whatever ends the stream, whether EOF, an
//! error, or shutdown, the node is marked Disconnected and its command
//! queue is dropped.

use std::net::SocketAddr;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use cares_core::{framing, TcpConnection, TcpListener};
use cares_proto::{Acknowledgement, ClusterMessage, Codec, Envelope, MessageType, NodeInfo};

use crate::error::Result;
use crate::queue::CommandQueues;
use crate::registry::NodeRegistry;

/// RPC plane server for worker joins and heartbeat streams.
#[derive(Debug)]
pub struct ClusterServer {
    registry: Arc<NodeRegistry>,
    queues: Arc<CommandQueues>,
}

impl ClusterServer {
    /// Creates a server over the shared registry and command-queue table.
    pub fn new(registry: Arc<NodeRegistry>, queues: Arc<CommandQueues>) -> Self {
        Self { registry, queues }
    }

    /// Accepts worker connections on a pre-bound listener until cancelled.
    ///
    /// Each connection gets its own handler task; accept errors are
    /// logged and do not stop the listener.
    pub async fn run(&self, listener: TcpListener, cancel: CancellationToken) -> Result<()> {
        if let Ok(addr) = listener.local_addr() {
            info!(addr = %addr, "cluster RPC plane listening");
        }

        loop {
            let accepted = tokio::select! {
                () = cancel.cancelled() => {
                    info!("cluster RPC plane shutting down");
                    return Ok(());
                }
                accepted = listener.accept() => accepted,
            };

            match accepted {
                Ok((connection, peer)) => {
                    let registry = self.registry.clone();
                    let queues = self.queues.clone();
                    let cancel = cancel.clone();
                    tokio::spawn(async move {
                        handle_connection(connection, peer, registry, queues, cancel).await;
                    });
                }
                Err(e) => {
                    warn!(error = %e, "failed to accept worker connection");
                }
            }
        }
    }
}

/// Handles one worker connection: Join handshake, then the metric stream.
async fn handle_connection(
    connection: TcpConnection,
    peer: SocketAddr,
    registry: Arc<NodeRegistry>,
    queues: Arc<CommandQueues>,
    cancel: CancellationToken,
) {
    // The cleanup must run on every exit path, including task
    // cancellation, so it hangs off a drop guard rather than the tail of
    // this function.
    let joined: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));
    let _guard = scopeguard::guard(
        (registry.clone(), queues.clone(), joined.clone()),
        |(registry, queues, joined)| {
            if let Some(node_id) = joined.lock().take() {
                queues.remove(&node_id);
                if registry.mark_disconnected(&node_id) {
                    info!(node_id = %node_id, "worker disconnected");
                }
            }
        },
    );

    let (mut reader, mut writer) = tokio::io::split(connection);

    loop {
        let frame = tokio::select! {
            () = cancel.cancelled() => return,
            frame = framing::recv_frame(&mut reader) => frame,
        };

        let frame = match frame {
            Ok(Some(frame)) => frame,
            Ok(None) => return,
            Err(e) => {
                debug!(peer = %peer, error = %e, "heartbeat stream error");
                return;
            }
        };

        if frame.header.message_type != MessageType::Cluster {
            warn!(peer = %peer, message_type = ?frame.header.message_type, "non-cluster frame on RPC plane");
            return;
        }

        let envelope: Envelope<ClusterMessage> = match Codec::decode(&frame.payload) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(peer = %peer, error = %e, "undecodable cluster frame");
                return;
            }
        };

        match envelope.payload {
            ClusterMessage::Join(info) => {
                let ack = handle_join(&info, &registry, &queues, &joined);
                let reply = Envelope::response_to(&envelope.header, ClusterMessage::JoinAck(ack));
                if let Err(e) =
                    framing::send_envelope(&mut writer, &reply, MessageType::Cluster).await
                {
                    debug!(peer = %peer, error = %e, "failed to send join ack");
                    return;
                }
            }
            ClusterMessage::Metrics(metrics) => {
                if !registry.update_metrics(&metrics.node_id, metrics.cpu_usage, metrics.memory_usage)
                {
                    warn!(node_id = %metrics.node_id, "metrics for unknown node");
                    continue;
                }
                joined.lock().get_or_insert_with(|| metrics.node_id.clone());

                // At most one queued command rides back per received record.
                if let Some(command) = queues.pop(&metrics.node_id) {
                    let reply = Envelope::new(ClusterMessage::Command(command));
                    if let Err(e) =
                        framing::send_envelope(&mut writer, &reply, MessageType::Cluster).await
                    {
                        debug!(peer = %peer, error = %e, "failed to send command");
                        return;
                    }
                }
            }
            other => {
                warn!(peer = %peer, message = ?other, "unexpected cluster message from worker");
            }
        }
    }
}

fn handle_join(
    info: &NodeInfo,
    registry: &NodeRegistry,
    queues: &CommandQueues,
    joined: &Mutex<Option<String>>,
) -> Acknowledgement {
    let address = match info.address.parse::<SocketAddr>() {
        Ok(address) => address,
        Err(e) => {
            warn!(node_id = %info.node_id, address = %info.address, error = %e, "join rejected");
            return Acknowledgement::rejected(format!(
                "invalid dispatch address '{}': {e}",
                info.address
            ));
        }
    };

    registry.add(info.node_id.as_str(), address, info.hostname.as_str());
    queues.create(info.node_id.as_str());
    *joined.lock() = Some(info.node_id.clone());

    info!(
        node_id = %info.node_id,
        hostname = %info.hostname,
        address = %address,
        "worker joined cluster"
    );

    Acknowledgement::ok(format!("welcome to cluster, node {}", info.node_id))
}
