#![forbid(unsafe_code)]

//! Vigil public facade crate.
//!
//! This crate provides the stable, ergonomic surface area for users.

pub mod prelude {
    pub use vigil_core as core;
    pub use vigil_engine as engine;
    pub use vigil_runtime as runtime;

    pub use vigil_core::{ChangeEvent, Graph, Literal, NodeId, Scalar, Value};
    pub use vigil_engine::{analyze, diff, serialize, to_html, to_text};
    pub use vigil_runtime::{
        Component, Dependency, EngineOp, EngineReply, EngineWorker, Fetched, MemorySink,
        ObserveOptions, ObservedHandle, Observatory, RenderSink, RuntimeError, StatusKind,
    };
}
