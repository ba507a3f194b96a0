//! Worker error types.

use thiserror::Error;

/// Worker errors.
#[derive(Error, Debug)]
pub enum WorkerError {
    /// Failed to reach the orchestrator.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The orchestrator rejected the join request.
    #[error("join rejected: {0}")]
    JoinRejected(String),

    /// The heartbeat stream ended.
    #[error("heartbeat stream closed: {0}")]
    StreamClosed(String),

    /// Wire protocol failure.
    #[error(transparent)]
    Protocol(#[from] cares_proto::ProtocolError),

    /// Container runtime failure.
    #[error("container runtime error: {0}")]
    Runtime(String),

    /// Resource probe failure.
    #[error("resource probe error: {0}")]
    Probe(String),
}

/// Result type for worker operations.
pub type Result<T> = std::result::Result<T, WorkerError>;
