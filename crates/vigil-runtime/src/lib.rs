#![forbid(unsafe_code)]

//! Runtime: the observation surface and everything impure.
//!
//! - [`observer`]: the accessor/mutator wrapper ([`ObservedHandle`]) that
//!   intercepts reads, writes, and deletes, classifies them, and dispatches
//!   the configured callbacks.
//! - [`scheduler`]: the coalescing render scheduler (N mutations per
//!   scheduling quantum, one render).
//! - [`registry`]: the process-scoped [`Observatory`] owning observers, the
//!   render sink, and the optional engine worker.
//! - [`transport`]: the request/response channel to the engine worker
//!   thread.
//! - [`component`]: the per-instance component dependency registry.
//!
//! Everything except the worker thread is single-threaded and synchronous:
//! every intercepted operation runs to completion before returning, so
//! callback order matches mutation order exactly.

pub mod component;
pub mod error;
pub mod observer;
pub mod registry;
pub mod scheduler;
pub mod transport;

pub use component::{Component, Dependency};
pub use error::{Result, RuntimeError};
pub use observer::{Fetched, ObserveOptions, ObservedHandle, StatusKind};
pub use registry::{MemorySink, Observatory, RenderSink};
pub use scheduler::RenderScheduler;
pub use transport::{
    EngineFault, EngineOp, EngineReply, EngineRequest, EngineResponse, EngineWorker, RequestId,
    SerializeJob, SerializeOutcome,
};
