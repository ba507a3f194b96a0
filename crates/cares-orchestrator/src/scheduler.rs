//! Cost-based worker selection.

use crate::registry::{Node, NodeStatus};

/// Relative weight of CPU usage in the cost score.
const CPU_WEIGHT: f64 = 0.5;

/// Relative weight of memory usage in the cost score.
const MEMORY_WEIGHT: f64 = 0.5;

/// Selects one worker per invocation.
///
/// The scheduler is stateless: it takes a registry snapshot as input and
/// has no memory of prior decisions, so concurrent invocations may pick
/// the same worker until fresh metrics shift the scores.
#[derive(Debug, Clone, Copy, Default)]
pub struct Scheduler;

impl Scheduler {
    /// Creates a new scheduler.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Picks the cheapest Active node from the snapshot.
    ///
    /// Candidates are scored by [`cost_score`]; the lowest score wins,
    /// with ties broken by lexicographic node id so selection is
    /// deterministic regardless of snapshot order. Returns `None` when
    /// no node is Active.
    pub fn select<'a>(&self, snapshot: &'a [Node]) -> Option<&'a Node> {
        snapshot
            .iter()
            .filter(|n| n.status == NodeStatus::Active)
            .min_by(|a, b| {
                cost_score(a)
                    .total_cmp(&cost_score(b))
                    .then_with(|| a.id.cmp(&b.id))
            })
    }
}

/// Cost score of a node: `0.5·cpu + 0.5·mem`, lower is better.
#[must_use]
pub fn cost_score(node: &Node) -> f64 {
    CPU_WEIGHT * node.cpu_usage + MEMORY_WEIGHT * node.memory_usage
}
