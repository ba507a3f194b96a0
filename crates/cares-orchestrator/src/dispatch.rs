//! ExecuteFunction dispatch to a chosen worker.
//!
//! One short-lived connection per invocation: a single request frame
//! out, a single result frame back, no retries. Dropping the returned
//! future (for instance when the HTTP caller disconnects) tears down the
//! connection and with it the outbound RPC.

use std::time::Duration;

use tracing::debug;

use cares_core::{framing, TcpConnection};
use cares_proto::{
    Codec, Envelope, FunctionMessage, FunctionRequest, FunctionResult, MessageType,
};

use crate::error::{OrchestratorError, Result};
use crate::functions::Function;
use crate::registry::Node;

/// Default time to wait for a worker to produce a result.
pub const DEFAULT_DISPATCH_TIMEOUT: Duration = Duration::from_secs(60);

/// Runs a function on the given node and returns the worker's result.
///
/// Any failure along the way (connect, send, decode, timeout, or the
/// worker closing early) surfaces as [`OrchestratorError::Dispatch`]
/// with the underlying message. A result with `success = false` is
/// returned as-is; mapping it to an error is the caller's concern.
pub async fn execute_on_node(
    node: &Node,
    function: &Function,
    timeout: Duration,
) -> Result<FunctionResult> {
    debug!(
        node_id = %node.id,
        function = %function.name,
        image = %function.image,
        "dispatching function to worker"
    );

    let mut connection = TcpConnection::connect(node.address).await.map_err(|e| {
        OrchestratorError::Dispatch(format!("failed to connect to worker {}: {e}", node.id))
    })?;

    let request = FunctionRequest::new(function.image.as_str(), function.name.as_str());
    let envelope = Envelope::new(FunctionMessage::Execute(request));
    framing::send_envelope(&mut connection, &envelope, MessageType::Function)
        .await
        .map_err(|e| OrchestratorError::Dispatch(e.to_string()))?;

    let frame = framing::recv_frame_timeout(&mut connection, timeout)
        .await
        .map_err(|e| OrchestratorError::Dispatch(e.to_string()))?
        .ok_or_else(|| {
            OrchestratorError::Dispatch(format!(
                "worker {} closed the connection without a result",
                node.id
            ))
        })?;

    if frame.header.message_type != MessageType::Function {
        return Err(OrchestratorError::Dispatch(format!(
            "unexpected message type {:?} in execute reply",
            frame.header.message_type
        )));
    }

    let reply: Envelope<FunctionMessage> = Codec::decode(&frame.payload)
        .map_err(|e| OrchestratorError::Dispatch(e.to_string()))?;

    match reply.payload {
        FunctionMessage::Result(result) => Ok(result),
        other => Err(OrchestratorError::Dispatch(format!(
            "unexpected reply from worker: {other:?}"
        ))),
    }
}
