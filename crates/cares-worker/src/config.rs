//! Configuration types for the worker.

use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Worker configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Cluster membership configuration.
    pub cluster: ClusterConfig,
    /// Execute listener configuration.
    pub rpc: RpcConfig,
    /// Heartbeat configuration.
    pub heartbeat: HeartbeatConfig,
    /// Container runtime configuration.
    pub runtime: RuntimeConfig,
}

impl WorkerConfig {
    /// Loads configuration from `worker.toml` layered under `WORKER_*`
    /// environment variables.
    pub fn load() -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file("worker.toml"))
            .merge(Env::prefixed("WORKER_").split("__"))
            .extract()
    }
}

/// Cluster membership configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Orchestrator RPC address to join.
    pub orchestrator_addr: SocketAddr,
    /// Node id; a fresh UUID when unset.
    pub node_id: Option<String>,
    /// Hostname reported at join time; the OS hostname when unset.
    pub hostname: Option<String>,
    /// Delay between reconnect attempts after a stream failure.
    #[serde(with = "serde_duration_secs")]
    pub reconnect_delay: Duration,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            orchestrator_addr: SocketAddr::new(
                IpAddr::V4(Ipv4Addr::LOCALHOST),
                cares_proto::ports::ORCHESTRATOR_RPC,
            ),
            node_id: None,
            hostname: None,
            reconnect_delay: Duration::from_secs(5),
        }
    }
}

/// Execute listener configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RpcConfig {
    /// Address the execute listener binds to.
    pub listen_addr: SocketAddr,
    /// Address advertised to the orchestrator for reverse dispatch;
    /// defaults to `listen_addr`.
    pub advertise_addr: Option<SocketAddr>,
}

impl RpcConfig {
    /// The address the orchestrator should dial back.
    ///
    /// A wildcard listen address is not dialable, so it degrades to
    /// loopback unless an explicit advertise address is configured.
    #[must_use]
    pub fn advertised(&self) -> SocketAddr {
        if let Some(addr) = self.advertise_addr {
            return addr;
        }
        let mut addr = self.listen_addr;
        if addr.ip().is_unspecified() {
            addr.set_ip(IpAddr::V4(Ipv4Addr::LOCALHOST));
        }
        addr
    }
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::new(
                IpAddr::V4(Ipv4Addr::UNSPECIFIED),
                cares_proto::ports::WORKER_RPC,
            ),
            advertise_addr: None,
        }
    }
}

/// Heartbeat configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HeartbeatConfig {
    /// Interval between metric records.
    #[serde(with = "serde_duration_secs")]
    pub interval: Duration,
    /// Timeout for the join acknowledgement.
    #[serde(with = "serde_duration_secs")]
    pub join_timeout: Duration,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            join_timeout: Duration::from_secs(10),
        }
    }
}

/// Container runtime configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Container engine binary to shell out to.
    pub binary: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            binary: "docker".to_owned(),
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
        let config = WorkerConfig::default();
        assert_eq!(config.cluster.orchestrator_addr.port(), 50051);
        assert_eq!(config.rpc.listen_addr.port(), 50052);
        assert_eq!(config.heartbeat.interval, Duration::from_secs(2));
        assert_eq!(config.runtime.binary, "docker");
    }

    #[test]
    fn advertised_falls_back_to_listen_addr() {
        let mut rpc = RpcConfig {
            listen_addr: "192.168.1.5:50052".parse().unwrap(),
            advertise_addr: None,
        };
        assert_eq!(rpc.advertised(), rpc.listen_addr);

        let advertise: SocketAddr = "10.0.0.7:50052".parse().unwrap();
        rpc.advertise_addr = Some(advertise);
        assert_eq!(rpc.advertised(), advertise);
    }

    #[test]
    fn advertised_replaces_wildcard_with_loopback() {
        let rpc = RpcConfig::default();
        assert!(rpc.listen_addr.ip().is_unspecified());
        assert_eq!(rpc.advertised(), "127.0.0.1:50052".parse::<SocketAddr>().unwrap());
    }
}
