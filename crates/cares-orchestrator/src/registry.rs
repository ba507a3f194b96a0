//! Node registry for tracking cluster workers.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Unique node identifier.
pub type NodeId = String;

/// Node registry.
///
/// Thread-safe directory of every worker the orchestrator has seen.
/// Entries are never removed implicitly: a worker whose heartbeat stream
/// ends stays visible as Disconnected until explicitly removed.
#[derive(Debug, Default)]
pub struct NodeRegistry {
    nodes: DashMap<NodeId, Node>,
}

impl NodeRegistry {
    /// Creates a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: DashMap::new(),
        }
    }

    /// Inserts or overwrites the entry for `id`.
    ///
    /// The node starts in Joining with zeroed metrics; a re-join under the
    /// same id replaces whatever state the previous incarnation left.
    pub fn add(
        &self,
        id: impl Into<NodeId>,
        address: SocketAddr,
        hostname: impl Into<String>,
    ) -> Node {
        let now = Utc::now();
        let node = Node {
            id: id.into(),
            address,
            hostname: hostname.into(),
            status: NodeStatus::Joining,
            cpu_usage: 0.0,
            memory_usage: 0.0,
            joined_at: now,
            last_seen: now,
        };

        self.nodes.insert(node.id.clone(), node.clone());
        node
    }

    /// Updates a node's resource metrics from a heartbeat record.
    ///
    /// Values outside [0, 100] are clamped. The node transitions to
    /// Active and its `last_seen` advances. Returns false when the id is
    /// unknown.
    pub fn update_metrics(&self, id: &str, cpu_usage: f64, memory_usage: f64) -> bool {
        let Some(mut node) = self.nodes.get_mut(id) else {
            return false;
        };

        node.cpu_usage = clamp_percent(cpu_usage);
        node.memory_usage = clamp_percent(memory_usage);
        node.last_seen = Utc::now();
        node.status = NodeStatus::Active;
        true
    }

    /// Marks a node Disconnected, keeping its entry and metrics.
    pub fn mark_disconnected(&self, id: &str) -> bool {
        let Some(mut node) = self.nodes.get_mut(id) else {
            return false;
        };

        node.status = NodeStatus::Disconnected;
        true
    }

    /// Deletes the entry for `id`. Returns false when absent.
    pub fn remove(&self, id: &str) -> bool {
        self.nodes.remove(id).is_some()
    }

    /// Returns an independent copy of the node, if present.
    pub fn get(&self, id: &str) -> Option<Node> {
        self.nodes.get(id).map(|n| n.clone())
    }

    /// Returns an independent point-in-time copy of all nodes.
    pub fn snapshot(&self) -> Vec<Node> {
        self.nodes.iter().map(|n| n.value().clone()).collect()
    }

    /// Returns the total number of nodes.
    pub fn count(&self) -> usize {
        self.nodes.len()
    }

    /// Returns the number of Active nodes.
    pub fn active_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| n.status == NodeStatus::Active)
            .count()
    }
}

fn clamp_percent(value: f64) -> f64 {
    value.clamp(0.0, 100.0)
}

/// A worker node as seen by the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Unique node identifier.
    pub id: NodeId,
    /// Address of the worker's RPC listener, for reverse dispatch.
    pub address: SocketAddr,
    /// Descriptive hostname.
    pub hostname: String,
    /// Connection status.
    pub status: NodeStatus,
    /// CPU usage percentage, clamped to [0, 100].
    pub cpu_usage: f64,
    /// Memory usage percentage, clamped to [0, 100].
    pub memory_usage: f64,
    /// When the node last joined.
    pub joined_at: DateTime<Utc>,
    /// When the node was last heard from.
    pub last_seen: DateTime<Utc>,
}

/// Node connection status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeStatus {
    /// Joined but no heartbeat received yet.
    Joining,
    /// Streaming heartbeats.
    Active,
    /// Heartbeat stream ended; entry retained for visibility.
    Disconnected,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(port: u16) -> SocketAddr {
        format!("127.0.0.1:{port}").parse().unwrap()
    }

    #[test]
    fn add_starts_joining_with_zeroed_metrics() {
        let registry = NodeRegistry::new();
        let node = registry.add("node-1", addr(50052), "worker-host");

        assert_eq!(node.status, NodeStatus::Joining);
        assert_eq!(node.cpu_usage, 0.0);
        assert_eq!(node.memory_usage, 0.0);
        assert_eq!(registry.count(), 1);
        assert_eq!(registry.active_count(), 0);
    }

    #[test]
    fn update_metrics_promotes_to_active() {
        let registry = NodeRegistry::new();
        registry.add("node-1", addr(50052), "worker-host");

        assert!(registry.update_metrics("node-1", 42.0, 58.5));

        let node = registry.get("node-1").unwrap();
        assert_eq!(node.status, NodeStatus::Active);
        assert!((node.cpu_usage - 42.0).abs() < f64::EPSILON);
        assert!((node.memory_usage - 58.5).abs() < f64::EPSILON);
        assert_eq!(registry.active_count(), 1);
    }

    #[test]
    fn update_metrics_clamps_out_of_range() {
        let registry = NodeRegistry::new();
        registry.add("node-1", addr(50052), "worker-host");

        registry.update_metrics("node-1", 130.0, -5.0);

        let node = registry.get("node-1").unwrap();
        assert_eq!(node.cpu_usage, 100.0);
        assert_eq!(node.memory_usage, 0.0);
    }

    #[test]
    fn update_metrics_unknown_node_returns_false() {
        let registry = NodeRegistry::new();
        assert!(!registry.update_metrics("ghost", 10.0, 10.0));
    }

    #[test]
    fn last_seen_advances_on_heartbeat() {
        let registry = NodeRegistry::new();
        registry.add("node-1", addr(50052), "worker-host");
        let before = registry.get("node-1").unwrap().last_seen;

        registry.update_metrics("node-1", 1.0, 1.0);
        let after = registry.get("node-1").unwrap().last_seen;

        assert!(after >= before);
    }

    #[test]
    fn mark_disconnected_keeps_entry_and_metrics() {
        let registry = NodeRegistry::new();
        registry.add("node-1", addr(50052), "worker-host");
        registry.update_metrics("node-1", 33.0, 44.0);

        assert!(registry.mark_disconnected("node-1"));

        let node = registry.get("node-1").unwrap();
        assert_eq!(node.status, NodeStatus::Disconnected);
        assert!((node.cpu_usage - 33.0).abs() < f64::EPSILON);
        assert_eq!(registry.count(), 1);
        assert_eq!(registry.active_count(), 0);
    }

    #[test]
    fn rejoin_overwrites_previous_state() {
        let registry = NodeRegistry::new();
        registry.add("node-1", addr(50052), "worker-host");
        registry.update_metrics("node-1", 90.0, 90.0);
        registry.mark_disconnected("node-1");

        let node = registry.add("node-1", addr(50053), "worker-host");

        assert_eq!(node.status, NodeStatus::Joining);
        assert_eq!(node.cpu_usage, 0.0);
        assert_eq!(node.address, addr(50053));
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn remove_deletes_entry() {
        let registry = NodeRegistry::new();
        registry.add("node-1", addr(50052), "worker-host");

        assert!(registry.remove("node-1"));
        assert!(!registry.remove("node-1"));
        assert!(registry.get("node-1").is_none());
    }

    #[test]
    fn snapshot_is_an_independent_copy() {
        let registry = NodeRegistry::new();
        registry.add("node-1", addr(50052), "worker-host");

        let snapshot = registry.snapshot();
        registry.update_metrics("node-1", 77.0, 77.0);

        assert_eq!(snapshot[0].cpu_usage, 0.0);
        assert_eq!(registry.get("node-1").unwrap().cpu_usage, 77.0);
    }
}
