//! CARES orchestrator - cluster membership, scheduling, and invocation.
//!
//! The orchestrator is the single coordination point of a CARES cluster:
//!
//! - **Node registry**: tracks workers and their live resource metrics
//! - **Function registry**: user-registered container functions with a
//!   durable JSON snapshot
//! - **Cluster RPC plane**: accepts worker joins and bidirectional
//!   heartbeat streams
//! - **Scheduler**: picks the cheapest active worker per invocation
//! - **HTTP API**: function registration, listing, and invocation
//!
//! # Architecture
//!
//! Workers connect once and keep streaming metrics; every metric arrival
//! updates the node registry in place. Invocations read a point-in-time
//! snapshot of the registry, so scheduling never contends with the
//! heartbeat path beyond short critical sections.
//!
//! # Example
//!
//! ```ignore
//! use cares_orchestrator::{config::OrchestratorConfig, cluster::ClusterServer};
//!
//! let config = OrchestratorConfig::default();
//! let server = ClusterServer::new(registry, queues);
//! server.run(config.rpc.listen_addr, cancel).await?;
//! ```

pub mod api;
pub mod cluster;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod functions;
pub mod queue;
pub mod registry;
pub mod scheduler;
pub mod store;

pub use config::OrchestratorConfig;
pub use error::{OrchestratorError, Result};
pub use functions::{Function, FunctionRegistry, FunctionStatus};
pub use queue::CommandQueues;
pub use registry::{Node, NodeRegistry, NodeStatus};
pub use scheduler::Scheduler;
pub use store::SnapshotStore;
