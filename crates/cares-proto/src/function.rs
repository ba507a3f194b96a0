//! Function execution messages.
//!
//! Used for the orchestrator → worker dispatch path: one request, one
//! result, no streaming.

use rkyv::{Archive, Deserialize, Serialize};

/// Function execution messages.
#[derive(Archive, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum FunctionMessage {
    /// Request to execute a function.
    Execute(FunctionRequest),

    /// Execution result.
    Result(FunctionResult),
}

/// Request to run a container image.
#[derive(Archive, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FunctionRequest {
    /// Container image reference to run.
    pub docker_image: String,
    /// Function name, for logging on the worker side.
    pub function_name: String,
}

impl FunctionRequest {
    /// Creates a new execution request.
    #[must_use]
    pub fn new(docker_image: impl Into<String>, function_name: impl Into<String>) -> Self {
        Self {
            docker_image: docker_image.into(),
            function_name: function_name.into(),
        }
    }
}

/// Result of a container run.
#[derive(Archive, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FunctionResult {
    /// Combined stdout and stderr captured from the container.
    pub output: String,
    /// Whether the container ran to completion successfully.
    pub success: bool,
    /// Error detail; empty when `success` is true.
    pub error: String,
}

impl FunctionResult {
    /// Creates a successful result.
    #[must_use]
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            success: true,
            error: String::new(),
        }
    }

    /// Creates a failed result, keeping whatever output was captured.
    #[must_use]
    pub fn failed(output: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            success: false,
            error: error.into(),
        }
    }
}
