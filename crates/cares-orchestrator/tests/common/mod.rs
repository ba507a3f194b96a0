//! Common test utilities for orchestrator integration tests.

// Each integration test binary compiles this module independently and
// uses a different subset of it.
#![allow(dead_code)]

pub mod fixtures;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;

use cares_orchestrator::{
    api::{self, AppState},
    CommandQueues, FunctionRegistry, NodeRegistry, Scheduler,
};

/// Complete orchestrator setup with all components wired together.
pub struct TestOrchestrator {
    pub nodes: Arc<NodeRegistry>,
    pub functions: Arc<FunctionRegistry>,
    pub queues: Arc<CommandQueues>,
    pub state: Arc<AppState>,
}

impl TestOrchestrator {
    /// Creates a fresh orchestrator with a short dispatch timeout.
    pub fn new() -> Self {
        let nodes = Arc::new(NodeRegistry::new());
        let functions = Arc::new(FunctionRegistry::new());
        let queues = Arc::new(CommandQueues::new());

        let state = Arc::new(AppState {
            nodes: nodes.clone(),
            functions: functions.clone(),
            scheduler: Scheduler::new(),
            dispatch_timeout: Duration::from_secs(2),
        });

        Self {
            nodes,
            functions,
            queues,
            state,
        }
    }

    /// Builds the HTTP router over this orchestrator's state.
    pub fn router(&self) -> Router {
        api::router(self.state.clone())
    }
}

impl Default for TestOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

/// Polls `condition` until it holds or two seconds elapse.
pub async fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}
