//! Cluster client: join handshake and heartbeat streaming.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::io::ReadHalf;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use cares_core::{framing, TcpConnection};
use cares_proto::{
    ClusterMessage, Codec, Envelope, MessageType, NodeInfo, NodeMetrics, OrchestratorCommand,
};

use crate::config::WorkerConfig;
use crate::error::{Result, WorkerError};
use crate::probe::ResourceProbe;

/// Client side of the cluster RPC plane.
///
/// One [`run_session`](Self::run_session) call is one connection
/// lifetime: connect, join, stream metrics until the stream dies or the
/// worker shuts down. Reconnecting is the caller's loop; the node id
/// stays stable across sessions so the orchestrator sees a re-join, not
/// a new node.
#[derive(Debug, Clone)]
pub struct ClusterClient {
    node_id: String,
    hostname: String,
    orchestrator_addr: SocketAddr,
    advertise_addr: SocketAddr,
    heartbeat_interval: Duration,
    join_timeout: Duration,
}

impl ClusterClient {
    /// Creates a client from the worker configuration.
    #[must_use]
    pub fn new(config: &WorkerConfig) -> Self {
        let node_id = config
            .cluster
            .node_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let hostname = config
            .cluster
            .hostname
            .clone()
            .or_else(|| std::env::var("HOSTNAME").ok())
            .unwrap_or_else(|| "worker".to_owned());

        Self {
            node_id,
            hostname,
            orchestrator_addr: config.cluster.orchestrator_addr,
            advertise_addr: config.rpc.advertised(),
            heartbeat_interval: config.heartbeat.interval,
            join_timeout: config.heartbeat.join_timeout,
        }
    }

    /// Returns this worker's node id.
    #[must_use]
    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    /// Runs one cluster session: join, then heartbeat until the stream
    /// ends or `cancel` fires.
    ///
    /// Returns `Ok(())` only on cancellation; every other exit is an
    /// error the caller may treat as "reconnect later".
    pub async fn run_session(
        &self,
        probe: Arc<dyn ResourceProbe>,
        cancel: CancellationToken,
    ) -> Result<()> {
        let mut connection = TcpConnection::connect(self.orchestrator_addr)
            .await
            .map_err(|e| WorkerError::ConnectionFailed(e.to_string()))?;

        self.join(&mut connection).await?;
        self.heartbeat_loop(connection, probe, cancel).await
    }

    /// Sends the join request and waits for the acknowledgement.
    async fn join(&self, connection: &mut TcpConnection) -> Result<()> {
        let info = NodeInfo::new(
            self.node_id.as_str(),
            self.advertise_addr.to_string(),
            self.hostname.as_str(),
            Utc::now().timestamp(),
        );
        let envelope = Envelope::new(ClusterMessage::Join(info));
        framing::send_envelope(connection, &envelope, MessageType::Cluster).await?;

        let frame = framing::recv_frame_timeout(connection, self.join_timeout)
            .await?
            .ok_or_else(|| {
                WorkerError::StreamClosed("connection closed during join".to_owned())
            })?;

        let reply: Envelope<ClusterMessage> = Codec::decode(&frame.payload)?;
        match reply.payload {
            ClusterMessage::JoinAck(ack) if ack.success => {
                info!(node_id = %self.node_id, message = %ack.message, "joined cluster");
                Ok(())
            }
            ClusterMessage::JoinAck(ack) => Err(WorkerError::JoinRejected(ack.message)),
            other => Err(WorkerError::Protocol(
                cares_proto::ProtocolError::UnexpectedMessage(format!("{other:?}")),
            )),
        }
    }

    /// Streams metric records and reacts to commands pushed back.
    ///
    /// Receiving runs in its own task feeding a channel, so a heartbeat
    /// tick can never cancel a half-read frame.
    async fn heartbeat_loop(
        &self,
        connection: TcpConnection,
        probe: Arc<dyn ResourceProbe>,
        cancel: CancellationToken,
    ) -> Result<()> {
        let (reader, mut writer) = tokio::io::split(connection);
        let (frame_tx, mut frame_rx) = mpsc::channel::<Vec<u8>>(8);
        let reader_task = tokio::spawn(read_frames(reader, frame_tx));

        let result = self
            .stream_metrics(&mut writer, probe, &mut frame_rx, &cancel)
            .await;
        reader_task.abort();
        result
    }

    async fn stream_metrics(
        &self,
        writer: &mut (impl tokio::io::AsyncWrite + Unpin),
        probe: Arc<dyn ResourceProbe>,
        frame_rx: &mut mpsc::Receiver<Vec<u8>>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let mut ticker = tokio::time::interval(self.heartbeat_interval);

        loop {
            tokio::select! {
                () = cancel.cancelled() => return Ok(()),
                _ = ticker.tick() => {
                    let metrics = self.collect_metrics(probe.as_ref()).await;
                    let envelope = Envelope::new(ClusterMessage::Metrics(metrics));
                    framing::send_envelope(writer, &envelope, MessageType::Cluster)
                        .await
                        .map_err(|e| WorkerError::StreamClosed(e.to_string()))?;
                }
                payload = frame_rx.recv() => {
                    match payload {
                        Some(payload) => {
                            if let Some(new_interval) = self.handle_frame(&payload) {
                                ticker = tokio::time::interval(new_interval);
                            }
                        }
                        None => {
                            return Err(WorkerError::StreamClosed(
                                "orchestrator closed the stream".to_owned(),
                            ));
                        }
                    }
                }
            }
        }
    }

    /// Samples the probe, degrading to a zeroed "error" record when the
    /// probe fails rather than skipping the heartbeat.
    async fn collect_metrics(&self, probe: &dyn ResourceProbe) -> NodeMetrics {
        let (cpu_usage, memory_usage, status) = match probe.sample().await {
            Ok(sample) => (sample.cpu_percent, sample.memory_percent, "active"),
            Err(e) => {
                warn!(error = %e, "resource probe failed");
                (0.0, 0.0, "error")
            }
        };

        NodeMetrics {
            node_id: self.node_id.clone(),
            cpu_usage,
            memory_usage,
            timestamp: Utc::now().timestamp(),
            status: status.to_owned(),
        }
    }

    /// Handles one payload from the orchestrator; returns a new heartbeat
    /// interval when commanded to change cadence.
    fn handle_frame(&self, payload: &[u8]) -> Option<Duration> {
        let envelope: Envelope<ClusterMessage> = match Codec::decode(payload) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(error = %e, "undecodable frame from orchestrator");
                return None;
            }
        };

        match envelope.payload {
            ClusterMessage::Command(OrchestratorCommand::SetMetricsInterval { interval_secs }) => {
                if interval_secs == 0 {
                    warn!("ignoring zero metrics interval");
                    return None;
                }
                info!(interval_secs, "metrics interval changed by orchestrator");
                Some(Duration::from_secs(u64::from(interval_secs)))
            }
            ClusterMessage::Command(OrchestratorCommand::Drain) => {
                info!("drain requested by orchestrator");
                None
            }
            other => {
                warn!(message = ?other, "unexpected message on heartbeat stream");
                None
            }
        }
    }
}

/// Forwards frame payloads from the stream into a channel.
///
/// Dropping the sender (on EOF, stream error, or an abandoned channel)
/// is the signal the stream has ended.
async fn read_frames(mut reader: ReadHalf<TcpConnection>, tx: mpsc::Sender<Vec<u8>>) {
    loop {
        match framing::recv_frame(&mut reader).await {
            Ok(Some(frame)) => {
                if frame.header.message_type != MessageType::Cluster {
                    warn!(message_type = ?frame.header.message_type, "non-cluster frame on heartbeat stream");
                    continue;
                }
                if tx.send(frame.payload).await.is_err() {
                    return;
                }
            }
            Ok(None) => return,
            Err(e) => {
                warn!(error = %e, "heartbeat stream read failed");
                return;
            }
        }
    }
}
