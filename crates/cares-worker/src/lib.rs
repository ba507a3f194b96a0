//! CARES worker - cluster membership and container execution.
//!
//! A worker is the execution side of a CARES cluster:
//!
//! - **Cluster client**: joins the orchestrator, then streams resource
//!   metrics on the same connection and reacts to pushed commands
//! - **Execute listener**: answers `ExecuteFunction` requests from the
//!   orchestrator by running the requested container image
//! - **Collaborator adapters**: the container runtime and the host
//!   resource probes sit behind traits so they can be swapped in tests
//!
//! Workers are expected to be expendable: if the heartbeat stream drops,
//! the binary simply reconnects and joins again under the same node id.

pub mod client;
pub mod config;
pub mod error;
pub mod executor;
pub mod probe;
pub mod server;

pub use client::ClusterClient;
pub use config::WorkerConfig;
pub use error::{Result, WorkerError};
pub use executor::{ContainerRuntime, DockerRuntime, RunOutput};
pub use probe::{FixedProbe, ProcProbe, ResourceProbe, ResourceSample};
pub use server::ExecuteServer;
