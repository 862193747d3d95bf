#![forbid(unsafe_code)]

//! Core: the identity-bearing value graph, canonical paths, change events,
//! and the dependency/path tracker.
//!
//! Everything in this crate is synchronous, single-threaded state with no
//! callbacks and no I/O. The observation surface that dispatches callbacks
//! lives in `vigil-runtime`; the pure tree engine lives in `vigil-engine`.

pub mod error;
pub mod event;
pub mod graph;
pub mod path;
pub mod tracker;
pub mod value;

pub use error::{GraphError, Result};
pub use event::ChangeEvent;
pub use graph::{Graph, NodeBody, NodeId, NodeKind};
pub use tracker::ChangeTracker;
pub use value::{Literal, Scalar, Value};

/// Hash map keyed with `ahash`, the default table type throughout Vigil.
pub type Map<K, V> = std::collections::HashMap<K, V, ahash::RandomState>;

/// Hash set hashed with `ahash`.
pub type Set<T> = std::collections::HashSet<T, ahash::RandomState>;
