//! Cluster membership messages.
//!
//! These messages carry the join handshake and the heartbeat stream
//! between workers and the orchestrator:
//!
//! - **Worker → Orchestrator**: join requests, periodic metric records
//! - **Orchestrator → Worker**: join acknowledgements, queued commands

use rkyv::{Archive, Deserialize, Serialize};

/// Cluster message types.
#[derive(Archive, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum ClusterMessage {
    // Worker -> Orchestrator
    /// Request to join the cluster.
    Join(NodeInfo),
    /// Periodic resource metrics record.
    Metrics(NodeMetrics),

    // Orchestrator -> Worker
    /// Join acknowledgement.
    JoinAck(Acknowledgement),
    /// Command pushed back on the heartbeat stream.
    Command(OrchestratorCommand),
}

/// Identity a worker presents when joining the cluster.
#[derive(Archive, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct NodeInfo {
    /// Unique node identifier.
    pub node_id: String,
    /// Address of the worker's own RPC listener, for reverse dispatch.
    pub address: String,
    /// Descriptive hostname.
    pub hostname: String,
    /// Unix timestamp (seconds) of the join request.
    pub timestamp: i64,
}

impl NodeInfo {
    /// Creates a new node info record.
    #[must_use]
    pub fn new(
        node_id: impl Into<String>,
        address: impl Into<String>,
        hostname: impl Into<String>,
        timestamp: i64,
    ) -> Self {
        Self {
            node_id: node_id.into(),
            address: address.into(),
            hostname: hostname.into(),
            timestamp,
        }
    }
}

/// Generic success/failure acknowledgement.
#[derive(Archive, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Acknowledgement {
    /// Whether the request was accepted.
    pub success: bool,
    /// Human-readable detail.
    pub message: String,
}

impl Acknowledgement {
    /// Creates a successful acknowledgement.
    #[must_use]
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    /// Creates a rejection.
    #[must_use]
    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// One heartbeat record from a worker.
#[derive(Archive, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct NodeMetrics {
    /// Node identifier.
    pub node_id: String,
    /// CPU usage percentage, 0-100.
    pub cpu_usage: f64,
    /// Memory usage percentage, 0-100.
    pub memory_usage: f64,
    /// Unix timestamp (seconds) the sample was taken.
    pub timestamp: i64,
    /// Coarse worker-side status tag ("active" or "error").
    pub status: String,
}

/// Commands the orchestrator can push to a worker on the heartbeat stream.
///
/// Reserved for future expansion; the queue carrying these is bounded and
/// drop-oldest, so no command delivery is guaranteed.
#[derive(Archive, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorCommand {
    /// Change the interval between metric records.
    SetMetricsInterval {
        /// New interval in seconds.
        interval_secs: u32,
    },
    /// Ask the worker to finish in-flight work and reconnect later.
    Drain,
}
