#![forbid(unsafe_code)]

//! The process-scoped observation registry.
//!
//! [`Observatory`] owns everything with a lifecycle: the observed instances,
//! the render scheduler, the render sink, and the optional engine worker.
//! It replaces the ambient static registry of the original design with an
//! explicitly created and torn-down context: build one at the composition
//! root, pass handles around, call [`Observatory::clear`] when done.
//!
//! # Rendering
//!
//! A render serializes every observed root, renders the trees as text, and
//! presents one `<pre class="composition-tree">` block to the sink; with no
//! observed instances it presents the explicit empty-state marker instead.
//! [`Observatory::flush`] is the scheduling opportunity: it runs at most one
//! coalesced render. With the worker enabled, the render is submitted as a
//! `serialize` request over the transport and applied by
//! [`Observatory::drain_worker`] when the response arrives; only the newest
//! in-flight request's response is presented, stale ones are dropped.
//!
//! A missing sink logs an error and abandons that render cycle; nothing is
//! retried and nothing is fatal.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use vigil_core::{Literal, Value};
use vigil_engine::render::escape_html;
use vigil_engine::{serialize, to_text};

use crate::error::Result;
use crate::observer::{ObserveOptions, ObservedHandle, ObserverState, create_observer};
use crate::scheduler::RenderScheduler;
use crate::transport::{EngineOp, EngineReply, EngineWorker, RequestId, SerializeJob};

/// Marker presented when nothing is observed.
pub const EMPTY_STATE: &str =
    "<div class=\"empty-state\">Object tree will appear here when changes are made</div>";

/// Where rendered output goes.
pub trait RenderSink {
    fn present(&mut self, block: &str);
}

/// An in-memory sink that records every presented block. Cloning shares the
/// backing storage, so tests can keep a reader while the observatory owns
/// the writer.
#[derive(Clone, Default)]
pub struct MemorySink {
    blocks: Rc<RefCell<Vec<String>>>,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn blocks(&self) -> Vec<String> {
        self.blocks.borrow().clone()
    }

    #[must_use]
    pub fn last(&self) -> Option<String> {
        self.blocks.borrow().last().cloned()
    }

    #[must_use]
    pub fn present_count(&self) -> usize {
        self.blocks.borrow().len()
    }
}

impl RenderSink for MemorySink {
    fn present(&mut self, block: &str) {
        self.blocks.borrow_mut().push(block.to_string());
    }
}

/// The registry of observed instances, with explicit create/clear lifecycle.
pub struct Observatory {
    observers: RefCell<Vec<Rc<ObserverState>>>,
    scheduler: Rc<RenderScheduler>,
    sink: RefCell<Option<Box<dyn RenderSink>>>,
    worker: RefCell<Option<EngineWorker>>,
    pending_render: Cell<Option<RequestId>>,
}

impl Default for Observatory {
    fn default() -> Self {
        Self::new()
    }
}

impl Observatory {
    #[must_use]
    pub fn new() -> Self {
        Self {
            observers: RefCell::new(Vec::new()),
            scheduler: Rc::new(RenderScheduler::new()),
            sink: RefCell::new(None),
            worker: RefCell::new(None),
            pending_render: Cell::new(None),
        }
    }

    /// Attach the render sink.
    pub fn set_sink(&self, sink: impl RenderSink + 'static) {
        *self.sink.borrow_mut() = Some(Box::new(sink));
    }

    /// Begin observing `root`, returning its wrapper. Renders immediately.
    pub fn observe(&self, root: Literal, options: ObserveOptions) -> Result<ObservedHandle> {
        if options.use_worker {
            self.ensure_worker();
        }
        let (state, handle) = create_observer(root, options, Rc::clone(&self.scheduler))?;
        self.observers.borrow_mut().push(state);
        self.render_now();
        Ok(handle)
    }

    #[must_use]
    pub fn observed_count(&self) -> usize {
        self.observers.borrow().len()
    }

    /// Whether a coalesced render is waiting for the next [`flush`](Self::flush).
    #[must_use]
    pub fn needs_render(&self) -> bool {
        self.scheduler.is_pending()
    }

    /// The scheduling opportunity: run at most one pending coalesced
    /// render. Returns whether a render ran.
    pub fn flush(&self) -> bool {
        self.scheduler.run_if_pending(|| self.render_now())
    }

    /// Toggle the engine worker. Turning it off terminates the worker;
    /// requests in flight get no response.
    pub fn set_use_worker(&self, enabled: bool) {
        if enabled {
            self.ensure_worker();
        } else if let Some(worker) = self.worker.borrow_mut().take() {
            self.pending_render.set(None);
            worker.shutdown();
        }
    }

    #[must_use]
    pub fn worker_active(&self) -> bool {
        self.worker.borrow().is_some()
    }

    fn ensure_worker(&self) {
        let mut worker = self.worker.borrow_mut();
        if worker.is_none() {
            *worker = Some(EngineWorker::start());
        }
    }

    /// Render immediately, bypassing the scheduler. With the worker active
    /// this submits a serialize request; otherwise it renders inline.
    pub fn render_now(&self) {
        if self.sink.borrow().is_none() {
            tracing::error!("render sink not attached, abandoning render");
            return;
        }

        let jobs = {
            let observers = self.observers.borrow();
            if observers.is_empty() {
                None
            } else if self.worker.borrow().is_some() {
                let mut jobs = Vec::with_capacity(observers.len());
                for state in observers.iter() {
                    match state.graph.borrow().snapshot(state.root) {
                        Ok(graph) => jobs.push(SerializeJob {
                            graph,
                            root: Value::Ref(state.root),
                        }),
                        Err(error) => {
                            tracing::warn!(%error, "skipping unsnapshotable root");
                        }
                    }
                }
                Some(jobs)
            } else {
                let blocks: Vec<String> = observers
                    .iter()
                    .map(|state| {
                        let graph = state.graph.borrow();
                        to_text(&serialize(&graph, &Value::Ref(state.root)))
                    })
                    .collect();
                drop(observers);
                self.present_tree_text(&blocks.join("\n"));
                return;
            }
        };

        match jobs {
            None => self.present(EMPTY_STATE),
            Some(jobs) => {
                let worker = self.worker.borrow();
                let Some(worker) = worker.as_ref() else {
                    return;
                };
                match worker.submit(EngineOp::Serialize { jobs }) {
                    Ok(id) => self.pending_render.set(Some(id)),
                    Err(error) => {
                        tracing::error!(%error, "failed to submit render to engine worker");
                    }
                }
            }
        }
    }

    /// Apply responses that have arrived from the worker. Only the newest
    /// in-flight render's response is presented; stale correlation ids are
    /// dropped. Returns how many renders were applied.
    pub fn drain_worker(&self) -> usize {
        let worker = self.worker.borrow();
        let Some(worker) = worker.as_ref() else {
            return 0;
        };
        let mut applied = 0;
        while let Some(response) = worker.try_recv() {
            if self.pending_render.get() != Some(response.id) {
                tracing::warn!(id = response.id.0, "dropping stale render response");
                continue;
            }
            self.pending_render.set(None);
            match response.reply {
                EngineReply::SerializeResult { result } => {
                    self.present_tree_text(&result.text);
                    applied += 1;
                }
                EngineReply::Error { error } => {
                    tracing::error!(message = %error.message, "engine worker render failed");
                }
                other => {
                    tracing::warn!(?other, "unexpected reply to render request");
                }
            }
        }
        applied
    }

    /// Poll [`drain_worker`](Self::drain_worker) until the in-flight render
    /// resolves or the timeout elapses. Returns whether it resolved.
    pub fn await_worker(&self, timeout: Duration) -> bool {
        let deadline = std::time::Instant::now() + timeout;
        loop {
            self.drain_worker();
            if self.pending_render.get().is_none() {
                return true;
            }
            if std::time::Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
    }

    /// Drop every observed instance and terminate the worker. The next
    /// render presents the empty-state marker.
    pub fn clear(&self) {
        self.observers.borrow_mut().clear();
        self.pending_render.set(None);
        self.scheduler.reset();
        if let Some(worker) = self.worker.borrow_mut().take() {
            worker.shutdown();
        }
        tracing::debug!("observatory cleared");
    }

    fn present_tree_text(&self, text: &str) {
        self.present(&format!(
            "<pre class=\"composition-tree\">{}</pre>",
            escape_html(text)
        ));
    }

    fn present(&self, block: &str) {
        let mut sink = self.sink.borrow_mut();
        match sink.as_mut() {
            Some(sink) => sink.present(block),
            None => tracing::error!("render sink not attached, dropping render output"),
        }
    }
}
