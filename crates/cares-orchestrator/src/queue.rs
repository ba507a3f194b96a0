//! Per-node outbound command queues.
//!
//! Each joined worker gets a bounded queue of commands to piggyback on
//! its heartbeat stream: the HTTP/admin side pushes, the stream handler
//! pops at most one per received metrics record. A full queue drops the
//! oldest entry, never the producer.

use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::VecDeque;

use cares_proto::OrchestratorCommand;

use crate::registry::NodeId;

/// Default queue depth per node.
pub const DEFAULT_QUEUE_DEPTH: usize = 10;

/// Table of command queues, one per joined node.
#[derive(Debug)]
pub struct CommandQueues {
    queues: DashMap<NodeId, CommandQueue>,
    depth: usize,
}

impl Default for CommandQueues {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandQueues {
    /// Creates a table with the default per-node depth.
    #[must_use]
    pub fn new() -> Self {
        Self::with_depth(DEFAULT_QUEUE_DEPTH)
    }

    /// Creates a table with a custom per-node depth.
    #[must_use]
    pub fn with_depth(depth: usize) -> Self {
        Self {
            queues: DashMap::new(),
            depth,
        }
    }

    /// Creates (or resets) the queue for a node.
    ///
    /// Called on Join; a re-join discards whatever the previous
    /// incarnation left queued.
    pub fn create(&self, node_id: impl Into<NodeId>) {
        self.queues
            .insert(node_id.into(), CommandQueue::new(self.depth));
    }

    /// Drops a node's queue. Called when its heartbeat stream ends.
    pub fn remove(&self, node_id: &str) {
        self.queues.remove(node_id);
    }

    /// Enqueues a command for a node.
    ///
    /// Returns false when the node has no queue (not joined). A full
    /// queue sheds its oldest command to make room.
    pub fn push(&self, node_id: &str, command: OrchestratorCommand) -> bool {
        match self.queues.get(node_id) {
            Some(queue) => {
                queue.push(command);
                true
            }
            None => false,
        }
    }

    /// Pops the next command for a node, if any.
    pub fn pop(&self, node_id: &str) -> Option<OrchestratorCommand> {
        self.queues.get(node_id).and_then(|queue| queue.pop())
    }

    /// Returns whether a node currently has a queue.
    pub fn contains(&self, node_id: &str) -> bool {
        self.queues.contains_key(node_id)
    }
}

/// Bounded single-producer single-consumer command queue.
#[derive(Debug)]
struct CommandQueue {
    commands: Mutex<VecDeque<OrchestratorCommand>>,
    depth: usize,
}

impl CommandQueue {
    fn new(depth: usize) -> Self {
        Self {
            commands: Mutex::new(VecDeque::with_capacity(depth)),
            depth,
        }
    }

    fn push(&self, command: OrchestratorCommand) {
        let mut commands = self.commands.lock();
        if commands.len() == self.depth {
            commands.pop_front();
        }
        commands.push_back(command);
    }

    fn pop(&self) -> Option<OrchestratorCommand> {
        self.commands.lock().pop_front()
    }
}
