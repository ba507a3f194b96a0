//! Test fixtures: node seeding and in-process mock workers.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use cares_core::{framing, TcpListener};
use cares_proto::{Codec, Envelope, FunctionMessage, FunctionResult, MessageType};
use cares_orchestrator::NodeRegistry;

/// Registers a node and drives it to Active with the given metrics.
pub fn activate_node(registry: &NodeRegistry, id: &str, address: SocketAddr, cpu: f64, mem: f64) {
    registry.add(id, address, "test-host");
    assert!(registry.update_metrics(id, cpu, mem));
}

/// In-process worker answering every execute request with a fixed result.
pub struct MockWorker {
    /// Address the orchestrator should dispatch to.
    pub addr: SocketAddr,
    /// Number of execute requests served.
    pub hits: Arc<AtomicUsize>,
}

impl MockWorker {
    /// Spawns a worker replying with the given result to every request.
    pub async fn spawn(result: FunctionResult) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));

        let task_hits = hits.clone();
        tokio::spawn(async move {
            loop {
                let Ok((mut connection, _)) = listener.accept().await else {
                    return;
                };
                let result = result.clone();
                let hits = task_hits.clone();
                tokio::spawn(async move {
                    let Ok(Some(frame)) = framing::recv_frame(&mut connection).await else {
                        return;
                    };
                    let Ok(envelope) =
                        Codec::decode::<Envelope<FunctionMessage>>(&frame.payload)
                    else {
                        return;
                    };

                    if matches!(envelope.payload, FunctionMessage::Execute(_)) {
                        hits.fetch_add(1, Ordering::SeqCst);
                        let reply = Envelope::response_to(
                            &envelope.header,
                            FunctionMessage::Result(result),
                        );
                        let _ = framing::send_envelope(
                            &mut connection,
                            &reply,
                            MessageType::Function,
                        )
                        .await;
                    }
                });
            }
        });

        Self { addr, hits }
    }

    /// Number of execute requests this worker has served.
    pub fn hit_count(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}
