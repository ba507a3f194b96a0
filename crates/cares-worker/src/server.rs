//! Execute listener: answers function execution requests.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use cares_core::{framing, TcpConnection, TcpListener};
use cares_proto::{Codec, Envelope, FunctionMessage, FunctionResult, MessageType};

use crate::error::Result;
use crate::executor::ContainerRuntime;

/// RPC listener serving `ExecuteFunction` requests from the orchestrator.
///
/// Each connection carries exactly one request and one result. Requests
/// run concurrently; the cost model on the orchestrator is what steers
/// load away from a busy worker, not admission control here.
pub struct ExecuteServer {
    runtime: Arc<dyn ContainerRuntime>,
}

impl ExecuteServer {
    /// Creates a server over the given container runtime.
    pub fn new(runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self { runtime }
    }

    /// Accepts execute connections on a pre-bound listener until cancelled.
    pub async fn run(&self, listener: TcpListener, cancel: CancellationToken) -> Result<()> {
        if let Ok(addr) = listener.local_addr() {
            info!(addr = %addr, "execute listener ready");
        }

        loop {
            let accepted = tokio::select! {
                () = cancel.cancelled() => {
                    info!("execute listener shutting down");
                    return Ok(());
                }
                accepted = listener.accept() => accepted,
            };

            match accepted {
                Ok((connection, peer)) => {
                    let runtime = self.runtime.clone();
                    tokio::spawn(async move {
                        handle_execute(connection, peer, runtime).await;
                    });
                }
                Err(e) => {
                    warn!(error = %e, "failed to accept execute connection");
                }
            }
        }
    }
}

/// Handles one execute connection: one request in, one result out.
async fn handle_execute(
    mut connection: TcpConnection,
    peer: SocketAddr,
    runtime: Arc<dyn ContainerRuntime>,
) {
    let frame = match framing::recv_frame(&mut connection).await {
        Ok(Some(frame)) => frame,
        Ok(None) => return,
        Err(e) => {
            debug!(peer = %peer, error = %e, "execute connection error");
            return;
        }
    };

    if frame.header.message_type != MessageType::Function {
        warn!(peer = %peer, message_type = ?frame.header.message_type, "non-function frame on execute listener");
        return;
    }

    let envelope: Envelope<FunctionMessage> = match Codec::decode(&frame.payload) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!(peer = %peer, error = %e, "undecodable execute frame");
            return;
        }
    };

    let request = match envelope.payload {
        FunctionMessage::Execute(request) => request,
        other => {
            warn!(peer = %peer, message = ?other, "unexpected function message");
            return;
        }
    };

    info!(
        function = %request.function_name,
        image = %request.docker_image,
        "executing function"
    );

    let result = match runtime.run(&request.docker_image).await {
        Ok(run) => FunctionResult {
            output: run.output,
            success: run.success,
            error: run.error,
        },
        Err(e) => {
            warn!(function = %request.function_name, error = %e, "container runtime failed");
            FunctionResult::failed(String::new(), e.to_string())
        }
    };

    let reply = Envelope::response_to(&envelope.header, FunctionMessage::Result(result));
    if let Err(e) = framing::send_envelope(&mut connection, &reply, MessageType::Function).await {
        debug!(peer = %peer, error = %e, "failed to send execute result");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WorkerError;
    use crate::executor::RunOutput;
    use async_trait::async_trait;
    use cares_proto::FunctionRequest;
    use std::time::Duration;

    /// Runtime that records the requested image and returns a canned result.
    struct MockRuntime {
        result: std::result::Result<RunOutput, String>,
    }

    #[async_trait]
    impl ContainerRuntime for MockRuntime {
        async fn run(&self, image: &str) -> Result<RunOutput> {
            assert!(!image.is_empty());
            self.result
                .clone()
                .map_err(WorkerError::Runtime)
        }
    }

    async fn spawn_server(runtime: MockRuntime) -> (SocketAddr, CancellationToken) {
        let cancel = CancellationToken::new();
        let server = ExecuteServer::new(Arc::new(runtime));

        let listener = TcpListener::bind("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        let addr = listener.local_addr().unwrap();

        let server_cancel = cancel.clone();
        tokio::spawn(async move {
            server.run(listener, server_cancel).await.unwrap();
        });

        (addr, cancel)
    }

    async fn execute(addr: SocketAddr, image: &str) -> FunctionResult {
        let mut connection = TcpConnection::connect(addr).await.unwrap();
        let envelope = Envelope::new(FunctionMessage::Execute(FunctionRequest::new(
            image, "test",
        )));
        framing::send_envelope(&mut connection, &envelope, MessageType::Function)
            .await
            .unwrap();

        let frame = framing::recv_frame_timeout(&mut connection, Duration::from_secs(2))
            .await
            .unwrap()
            .unwrap();
        let reply: Envelope<FunctionMessage> = Codec::decode(&frame.payload).unwrap();
        assert_eq!(reply.header.correlation_id, envelope.header.correlation_id);

        match reply.payload {
            FunctionMessage::Result(result) => result,
            other => panic!("expected Result, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn successful_run_returns_output() {
        let (addr, cancel) = spawn_server(MockRuntime {
            result: Ok(RunOutput::ok("hello from container\n")),
        })
        .await;

        let result = execute(addr, "hello-world").await;
        assert!(result.success);
        assert_eq!(result.output, "hello from container\n");
        assert!(result.error.is_empty());

        cancel.cancel();
    }

    #[tokio::test]
    async fn failed_run_keeps_output_and_error() {
        let (addr, cancel) = spawn_server(MockRuntime {
            result: Ok(RunOutput::failed("boom\n", "container exited with exit status: 1")),
        })
        .await;

        let result = execute(addr, "broken-image").await;
        assert!(!result.success);
        assert_eq!(result.output, "boom\n");
        assert!(result.error.contains("exit status"));

        cancel.cancel();
    }

    #[tokio::test]
    async fn runtime_error_maps_to_failed_result() {
        let (addr, cancel) = spawn_server(MockRuntime {
            result: Err("docker not installed".to_owned()),
        })
        .await;

        let result = execute(addr, "any-image").await;
        assert!(!result.success);
        assert!(result.error.contains("docker not installed"));

        cancel.cancel();
    }
}
