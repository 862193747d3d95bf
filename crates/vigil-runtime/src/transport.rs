#![forbid(unsafe_code)]

//! The engine worker transport.
//!
//! [`EngineWorker`] runs the pure engine on a dedicated thread and talks to
//! it over bounded mpsc channels. Every request carries a correlation id;
//! the matching response echoes it, so callers never rely on "the next
//! message is the response". The payload of a request is a structural
//! snapshot ([`vigil_core::Graph::snapshot`]): the engine side never
//! observes later mutations and can never write back into the live graph.
//!
//! # Error Propagation
//!
//! A panic while executing a request is caught on the worker thread and
//! forwarded as an `error`-typed response; the worker keeps serving
//! subsequent requests. Submitting after [`EngineWorker::shutdown`] (or
//! after the thread has exited) fails with
//! [`RuntimeError::WorkerUnavailable`].
//!
//! # Cancellation
//!
//! Terminating the worker is the only cancellation primitive: requests in
//! flight at shutdown get no response.

use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use vigil_core::{Graph, Value};
use vigil_engine::{AnalysisReport, ChangeRecord, SerializedNode, analyze, diff};
use vigil_engine::{to_html, to_text};

use crate::error::{Result, RuntimeError};

/// Channel capacity for requests and responses. Bounded, so a runaway
/// producer blocks instead of accumulating unbounded memory.
const CHANNEL_CAPACITY: usize = 64;

/// Correlation identifier echoed from request to response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub u64);

/// One serialization job: a detached graph plus the slot to walk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializeJob {
    pub graph: Graph,
    pub root: Value,
}

/// An engine operation, tagged for the wire as
/// `{"type": "serialize" | "diff" | "analyze", "data": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum EngineOp {
    #[serde(rename_all = "camelCase")]
    Serialize { jobs: Vec<SerializeJob> },
    #[serde(rename_all = "camelCase")]
    Diff {
        old_tree: SerializedNode,
        new_tree: SerializedNode,
    },
    #[serde(rename_all = "camelCase")]
    Analyze { graph: Graph, root: Value },
}

/// Request envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineRequest {
    pub id: RequestId,
    #[serde(flatten)]
    pub op: EngineOp,
}

/// The result of a serialize request: the trees plus both renderings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializeOutcome {
    pub trees: Vec<SerializedNode>,
    pub text: String,
    pub html: String,
}

/// Error payload forwarded from the worker side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineFault {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

/// Reply envelope body, tagged for the wire as
/// `{"type": "<op>Result", "result": ...}` or `{"type": "error", "error": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum EngineReply {
    SerializeResult { result: SerializeOutcome },
    DiffResult { result: Vec<ChangeRecord> },
    AnalyzeResult { result: AnalysisReport },
    Error { error: EngineFault },
}

/// Response envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineResponse {
    pub id: RequestId,
    #[serde(flatten)]
    pub reply: EngineReply,
}

enum WorkerMsg {
    Request(EngineRequest),
    Shutdown,
}

/// Handle to the engine worker thread.
pub struct EngineWorker {
    sender: mpsc::SyncSender<WorkerMsg>,
    responses: mpsc::Receiver<EngineResponse>,
    handle: Option<JoinHandle<()>>,
    next_id: Cell<u64>,
}

impl EngineWorker {
    /// Spawn the worker thread.
    #[must_use]
    pub fn start() -> Self {
        let (tx, rx) = mpsc::sync_channel::<WorkerMsg>(CHANNEL_CAPACITY);
        let (resp_tx, resp_rx) = mpsc::sync_channel::<EngineResponse>(CHANNEL_CAPACITY);

        let handle = thread::Builder::new()
            .name("vigil-engine".into())
            .spawn(move || engine_loop(rx, resp_tx))
            .expect("failed to spawn engine worker thread");

        tracing::debug!("engine worker started");
        Self {
            sender: tx,
            responses: resp_rx,
            handle: Some(handle),
            next_id: Cell::new(1),
        }
    }

    /// Enqueue an operation, returning its correlation id.
    pub fn submit(&self, op: EngineOp) -> Result<RequestId> {
        let id = RequestId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.sender
            .send(WorkerMsg::Request(EngineRequest { id, op }))
            .map_err(|_| RuntimeError::WorkerUnavailable)?;
        Ok(id)
    }

    /// Non-blocking poll for the next response.
    #[must_use]
    pub fn try_recv(&self) -> Option<EngineResponse> {
        self.responses.try_recv().ok()
    }

    /// Blocking poll with a deadline.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Option<EngineResponse>> {
        match self.responses.recv_timeout(timeout) {
            Ok(response) => Ok(Some(response)),
            Err(mpsc::RecvTimeoutError::Timeout) => Ok(None),
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(RuntimeError::WorkerDisconnected),
        }
    }

    /// Submit and block until the matching response arrives. Responses with
    /// other correlation ids (from earlier fire-and-forget submissions) are
    /// dropped with a warning.
    pub fn round_trip(&self, op: EngineOp) -> Result<EngineReply> {
        let id = self.submit(op)?;
        loop {
            let response = self
                .responses
                .recv()
                .map_err(|_| RuntimeError::WorkerDisconnected)?;
            if response.id == id {
                return Ok(response.reply);
            }
            tracing::warn!(
                got = response.id.0,
                want = id.0,
                "dropping stale engine response"
            );
        }
    }

    /// Gracefully stop the worker: pending requests already queued are
    /// still processed, then the thread exits and is joined.
    pub fn shutdown(mut self) {
        let _ = self.sender.send(WorkerMsg::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for EngineWorker {
    fn drop(&mut self) {
        // Best-effort shutdown if the caller forgot to call shutdown().
        let _ = self.sender.send(WorkerMsg::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// The worker thread's main loop: execute requests one at a time, convert
/// panics into error replies, exit on shutdown or channel teardown.
fn engine_loop(rx: mpsc::Receiver<WorkerMsg>, tx: mpsc::SyncSender<EngineResponse>) {
    loop {
        let request = match rx.recv() {
            Ok(WorkerMsg::Request(request)) => request,
            Ok(WorkerMsg::Shutdown) | Err(_) => {
                tracing::debug!("engine worker exiting");
                return;
            }
        };

        let id = request.id;
        let reply = panic::catch_unwind(AssertUnwindSafe(|| execute(request.op)))
            .unwrap_or_else(|payload| EngineReply::Error {
                error: EngineFault {
                    message: describe_panic(payload.as_ref()),
                    stack: None,
                },
            });

        if tx.send(EngineResponse { id, reply }).is_err() {
            // Caller went away; nothing left to serve.
            return;
        }
    }
}

fn execute(op: EngineOp) -> EngineReply {
    match op {
        EngineOp::Serialize { jobs } => {
            let mut trees = Vec::with_capacity(jobs.len());
            let mut blocks = Vec::with_capacity(jobs.len());
            let mut html = String::new();
            for job in &jobs {
                let tree = vigil_engine::serialize(&job.graph, &job.root);
                blocks.push(to_text(&tree));
                html.push_str(&to_html(&tree));
                trees.push(tree);
            }
            EngineReply::SerializeResult {
                result: SerializeOutcome {
                    trees,
                    text: blocks.join("\n"),
                    html,
                },
            }
        }
        EngineOp::Diff { old_tree, new_tree } => EngineReply::DiffResult {
            result: diff(&old_tree, &new_tree),
        },
        EngineOp::Analyze { graph, root } => EngineReply::AnalyzeResult {
            result: analyze(&graph, &root),
        },
    }
}

fn describe_panic(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "engine worker panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_core::Literal;

    fn sprite_snapshot() -> (Graph, Value) {
        let mut graph = Graph::new();
        let root = graph
            .materialize(Literal::instance(
                "Sprite",
                [("x", Literal::from(5)), ("y", Literal::null())],
            ))
            .unwrap();
        (graph, root)
    }

    #[test]
    fn serialize_round_trip() {
        let worker = EngineWorker::start();
        let (graph, root) = sprite_snapshot();
        let reply = worker
            .round_trip(EngineOp::Serialize {
                jobs: vec![SerializeJob { graph, root }],
            })
            .unwrap();

        let EngineReply::SerializeResult { result } = reply else {
            panic!("expected serialize result, got {reply:?}");
        };
        assert_eq!(result.trees.len(), 1);
        assert!(result.text.contains("+ Sprite"));
        assert!(result.html.contains("object-node"));
        worker.shutdown();
    }

    #[test]
    fn diff_round_trip() {
        let worker = EngineWorker::start();
        let (old_graph, old_root) = sprite_snapshot();
        let old_tree = vigil_engine::serialize(&old_graph, &old_root);

        let (mut new_graph, new_root) = sprite_snapshot();
        let id = new_root.as_ref_id().unwrap();
        new_graph.set(id, "x", Value::Int(9)).unwrap();
        let new_tree = vigil_engine::serialize(&new_graph, &new_root);

        let reply = worker
            .round_trip(EngineOp::Diff { old_tree, new_tree })
            .unwrap();
        let EngineReply::DiffResult { result } = reply else {
            panic!("expected diff result, got {reply:?}");
        };
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].path(), "x");
        worker.shutdown();
    }

    #[test]
    fn analyze_round_trip() {
        let worker = EngineWorker::start();
        let (graph, root) = sprite_snapshot();
        let reply = worker
            .round_trip(EngineOp::Analyze { graph, root })
            .unwrap();
        let EngineReply::AnalyzeResult { result } = reply else {
            panic!("expected analyze result, got {reply:?}");
        };
        assert_eq!(result.stats.object_count, 1);
        assert_eq!(result.stats.primitive_count, 2);
        worker.shutdown();
    }

    #[test]
    fn correlation_ids_are_unique_and_echoed() {
        let worker = EngineWorker::start();
        let (graph, root) = sprite_snapshot();

        let first = worker
            .submit(EngineOp::Analyze {
                graph: graph.clone(),
                root: root.clone(),
            })
            .unwrap();
        let second = worker.submit(EngineOp::Analyze { graph, root }).unwrap();
        assert_ne!(first, second);

        let r1 = worker
            .recv_timeout(Duration::from_secs(5))
            .unwrap()
            .expect("first response");
        let r2 = worker
            .recv_timeout(Duration::from_secs(5))
            .unwrap()
            .expect("second response");
        assert_eq!(r1.id, first);
        assert_eq!(r2.id, second);
        worker.shutdown();
    }

    #[test]
    fn submit_after_shutdown_fails() {
        let worker = EngineWorker::start();
        let sender = worker.sender.clone();
        worker.shutdown();

        let result = sender.send(WorkerMsg::Request(EngineRequest {
            id: RequestId(99),
            op: EngineOp::Serialize { jobs: vec![] },
        }));
        assert!(result.is_err(), "send after shutdown should fail");
    }

    #[test]
    fn drop_joins_cleanly() {
        let worker = EngineWorker::start();
        drop(worker);
    }

    #[test]
    fn request_envelope_wire_shape() {
        let (graph, root) = sprite_snapshot();
        let request = EngineRequest {
            id: RequestId(7),
            op: EngineOp::Analyze { graph, root },
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["id"], 7);
        assert_eq!(json["type"], "analyze");
        assert!(json["data"]["graph"].is_object());

        let back: EngineRequest = serde_json::from_value(json).unwrap();
        assert_eq!(back, request);
    }

    #[test]
    fn response_envelope_wire_shape() {
        let response = EngineResponse {
            id: RequestId(3),
            reply: EngineReply::DiffResult { result: vec![] },
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["type"], "diffResult");
        assert!(json["result"].as_array().unwrap().is_empty());

        let error = EngineResponse {
            id: RequestId(4),
            reply: EngineReply::Error {
                error: EngineFault {
                    message: "boom".into(),
                    stack: None,
                },
            },
        };
        let json = serde_json::to_value(&error).unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["error"]["message"], "boom");
        assert!(json["error"].get("stack").is_none());
    }

    #[test]
    fn panic_description_prefers_payload_text() {
        assert_eq!(describe_panic(&"bad"), "bad");
        assert_eq!(describe_panic(&"bad".to_string()), "bad");
        assert_eq!(describe_panic(&42u32), "engine worker panicked");
    }
}
