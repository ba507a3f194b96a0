//! Wire protocol types for CARES orchestrator/worker communication.
//!
//! Every RPC operation in the cluster (joining, heartbeat streaming,
//! function execution) travels as a framed, rkyv-serialised envelope over
//! plain TCP:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │              Frame Header (8 bytes, fixed)              │
//! ├──────────────┬──────────────┬───────────────────────────┤
//! │  Version (2) │ Msg Type (2) │    Payload Length (4)     │
//! ├──────────────┴──────────────┴───────────────────────────┤
//! │                 rkyv-serialised Envelope                │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! This crate is I/O-free; the async framing helpers live in `cares-core`.

pub mod codec;
mod cluster;
mod envelope;
mod error;
mod function;

pub use cluster::{Acknowledgement, ClusterMessage, NodeInfo, NodeMetrics, OrchestratorCommand};
pub use codec::{Codec, FrameHeader, MessageType, FRAME_HEADER_SIZE, MAX_MESSAGE_SIZE};
pub use envelope::{CorrelationId, Envelope, EnvelopeHeader};
pub use error::ProtocolError;
pub use function::{FunctionMessage, FunctionRequest, FunctionResult};

/// Protocol version constants.
pub mod version {
    /// Current protocol version.
    pub const CURRENT: u16 = 1;

    /// Minimum supported protocol version.
    pub const MIN_SUPPORTED: u16 = 1;
}

/// Default port assignments (all configurable at runtime).
pub mod ports {
    /// Orchestrator RPC listener (join + heartbeat streams).
    pub const ORCHESTRATOR_RPC: u16 = 50051;

    /// Orchestrator HTTP API.
    pub const ORCHESTRATOR_HTTP: u16 = 8080;

    /// Worker RPC listener (function execution).
    pub const WORKER_RPC: u16 = 50052;
}
