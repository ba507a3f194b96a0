//! Configuration types for the orchestrator.

use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use crate::queue::DEFAULT_QUEUE_DEPTH;
use crate::store::DEFAULT_SNAPSHOT_PATH;

/// Orchestrator configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Cluster RPC plane configuration.
    pub rpc: RpcConfig,
    /// HTTP API configuration.
    pub http: HttpConfig,
    /// Function snapshot storage configuration.
    pub storage: StorageConfig,
    /// Function dispatch configuration.
    pub dispatch: DispatchConfig,
    /// Per-node command queue configuration.
    pub commands: CommandConfig,
}

impl OrchestratorConfig {
    /// Loads configuration from `orchestrator.toml` layered under
    /// `ORCHESTRATOR_*` environment variables.
    pub fn load() -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file("orchestrator.toml"))
            .merge(Env::prefixed("ORCHESTRATOR_").split("__"))
            .extract()
    }
}

/// Cluster RPC plane configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RpcConfig {
    /// Address the join/heartbeat listener binds to.
    pub listen_addr: SocketAddr,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::new(
                IpAddr::V4(Ipv4Addr::UNSPECIFIED),
                cares_proto::ports::ORCHESTRATOR_RPC,
            ),
        }
    }
}

/// HTTP API configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Address the HTTP listener binds to.
    pub listen_addr: SocketAddr,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::new(
                IpAddr::V4(Ipv4Addr::UNSPECIFIED),
                cares_proto::ports::ORCHESTRATOR_HTTP,
            ),
        }
    }
}

/// Function snapshot storage configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path of the JSON snapshot file.
    pub snapshot_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            snapshot_path: PathBuf::from(DEFAULT_SNAPSHOT_PATH),
        }
    }
}

/// Function dispatch configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Maximum time to wait for a worker to produce a result.
    #[serde(with = "serde_duration_secs")]
    pub timeout: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            timeout: crate::dispatch::DEFAULT_DISPATCH_TIMEOUT,
        }
    }
}

/// Per-node command queue configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CommandConfig {
    /// Bounded depth of each node's outbound command queue.
    pub queue_depth: usize,
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            queue_depth: DEFAULT_QUEUE_DEPTH,
        }
    }
}

/// Serde helper for Duration as seconds.
mod serde_duration_secs {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.rpc.listen_addr.port(), 50051);
        assert_eq!(config.http.listen_addr.port(), 8080);
        assert_eq!(
            config.storage.snapshot_path,
            PathBuf::from("data/functions.json")
        );
        assert_eq!(config.dispatch.timeout, Duration::from_secs(60));
        assert_eq!(config.commands.queue_depth, 10);
    }
}
