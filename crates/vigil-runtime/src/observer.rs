#![forbid(unsafe_code)]

//! The interception layer: explicit accessor/mutator wrappers.
//!
//! [`ObservedHandle`] is the wrapper placed over a graph node. Every read,
//! write, and delete goes through it, is classified (new property, changed
//! value, access of a missing property, deletion), and dispatched to the
//! callbacks configured in [`ObserveOptions`]; every write and delete also
//! requests a coalesced render.
//!
//! Wrapping is idempotent and identity-keyed: the first time a composite
//! value is reached it is registered in the wrapped set and assigned its
//! canonical path; reaching it again (including through a cycle) returns a
//! handle equal to the first under wrapper identity. Wrap-lookup happens
//! before any recursive wrap, so assigning a node to one of its own
//! properties terminates.
//!
//! # Invariants
//!
//! 1. Exactly one callback per write: `on_new_property` when the property
//!    was untracked and held no value, else `on_property_change` when the
//!    value actually changed, else none.
//! 2. Callbacks are dispatched with no internal borrows held; they may
//!    re-enter the handle (including writing to it).
//! 3. Enumeration and introspection (`keys`, `has`, `type_name`) pass
//!    through without side effects.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use vigil_core::{
    ChangeEvent, ChangeTracker, Graph, Literal, Map, NodeId, NodeKind, Set, Value, path,
};

use crate::error::{Result, RuntimeError};
use crate::scheduler::RenderScheduler;

/// Status-indicator signal kinds, surfaced through
/// [`ObserveOptions::on_status`]. Purely informational.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Change,
    Delete,
}

type NewPropertyFn = dyn Fn(&str, &Value, NodeId, &ChangeEvent);
type PropertyChangeFn = dyn Fn(&str, &Value, &Value, NodeId, &ChangeEvent);
type PropertyDeleteFn = dyn Fn(&str, &Value, NodeId, &ChangeEvent);
type AccessFailureFn = dyn Fn(&str, &Value, NodeId, &ChangeEvent);
type StatusFn = dyn Fn(StatusKind);

/// Observation configuration. All callbacks are optional and no-ops when
/// omitted.
#[derive(Clone)]
pub struct ObserveOptions {
    pub(crate) observe_nested: bool,
    pub(crate) use_worker: bool,
    pub(crate) on_new_property: Option<Rc<NewPropertyFn>>,
    pub(crate) on_property_change: Option<Rc<PropertyChangeFn>>,
    pub(crate) on_property_delete: Option<Rc<PropertyDeleteFn>>,
    pub(crate) on_access_failure: Option<Rc<AccessFailureFn>>,
    pub(crate) on_status: Option<Rc<StatusFn>>,
}

impl Default for ObserveOptions {
    fn default() -> Self {
        Self {
            observe_nested: true,
            use_worker: false,
            on_new_property: None,
            on_property_change: None,
            on_property_delete: None,
            on_access_failure: None,
            on_status: None,
        }
    }
}

impl fmt::Debug for ObserveOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserveOptions")
            .field("observe_nested", &self.observe_nested)
            .field("use_worker", &self.use_worker)
            .field("on_new_property", &self.on_new_property.is_some())
            .field("on_property_change", &self.on_property_change.is_some())
            .field("on_property_delete", &self.on_property_delete.is_some())
            .field("on_access_failure", &self.on_access_failure.is_some())
            .field("on_status", &self.on_status.is_some())
            .finish()
    }
}

impl ObserveOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Recursively wrap nested composite values (default true).
    #[must_use]
    pub fn observe_nested(mut self, enabled: bool) -> Self {
        self.observe_nested = enabled;
        self
    }

    /// Route engine calls through the worker transport (default false).
    #[must_use]
    pub fn use_worker(mut self, enabled: bool) -> Self {
        self.use_worker = enabled;
        self
    }

    #[must_use]
    pub fn on_new_property(
        mut self,
        f: impl Fn(&str, &Value, NodeId, &ChangeEvent) + 'static,
    ) -> Self {
        self.on_new_property = Some(Rc::new(f));
        self
    }

    #[must_use]
    pub fn on_property_change(
        mut self,
        f: impl Fn(&str, &Value, &Value, NodeId, &ChangeEvent) + 'static,
    ) -> Self {
        self.on_property_change = Some(Rc::new(f));
        self
    }

    #[must_use]
    pub fn on_property_delete(
        mut self,
        f: impl Fn(&str, &Value, NodeId, &ChangeEvent) + 'static,
    ) -> Self {
        self.on_property_delete = Some(Rc::new(f));
        self
    }

    #[must_use]
    pub fn on_access_failure(
        mut self,
        f: impl Fn(&str, &Value, NodeId, &ChangeEvent) + 'static,
    ) -> Self {
        self.on_access_failure = Some(Rc::new(f));
        self
    }

    #[must_use]
    pub fn on_status(mut self, f: impl Fn(StatusKind) + 'static) -> Self {
        self.on_status = Some(Rc::new(f));
        self
    }
}

/// Shared state of one observed instance: its graph, tracker, wrapped-set,
/// options, and scheduler.
#[derive(Debug)]
pub(crate) struct ObserverState {
    pub(crate) root: NodeId,
    pub(crate) graph: RefCell<Graph>,
    pub(crate) tracker: RefCell<ChangeTracker>,
    wrapped: RefCell<Set<NodeId>>,
    pub(crate) options: ObserveOptions,
    scheduler: Rc<RenderScheduler>,
    pub(crate) components: RefCell<Map<(NodeId, &'static str), NodeId>>,
}

/// Materialize a root literal and wrap it, producing the observer state and
/// the root handle.
pub(crate) fn create_observer(
    root: Literal,
    options: ObserveOptions,
    scheduler: Rc<RenderScheduler>,
) -> Result<(Rc<ObserverState>, ObservedHandle)> {
    let mut graph = Graph::new();
    let value = graph.materialize(root)?;
    let root_id = value.as_ref_id().ok_or(RuntimeError::NotComposite)?;
    let state = Rc::new(ObserverState {
        root: root_id,
        graph: RefCell::new(graph),
        tracker: RefCell::new(ChangeTracker::new()),
        wrapped: RefCell::new(Set::default()),
        options,
        scheduler,
        components: RefCell::new(Map::default()),
    });
    let handle = wrap(&state, root_id, "");
    Ok((state, handle))
}

/// Register an identity as wrapped (idempotent) and hand out its wrapper.
/// The canonical path is assigned only on first wrap.
fn wrap(state: &Rc<ObserverState>, id: NodeId, path: &str) -> ObservedHandle {
    if state.wrapped.borrow_mut().insert(id) {
        state.tracker.borrow_mut().assign_path(id, path);
    }
    ObservedHandle {
        state: Rc::clone(state),
        id,
    }
}

/// The result of an observed read.
#[derive(Debug, Clone)]
pub enum Fetched {
    /// A scalar or function leaf, or a raw reference when nested
    /// observation is disabled.
    Value(Value),
    /// A wrapper over a composite value.
    Node(ObservedHandle),
}

impl Fetched {
    #[must_use]
    pub fn into_handle(self) -> Option<ObservedHandle> {
        match self {
            Fetched::Node(handle) => Some(handle),
            Fetched::Value(_) => None,
        }
    }

    #[must_use]
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Fetched::Value(value) => Some(value),
            Fetched::Node(_) => None,
        }
    }
}

/// The interception-capable wrapper over one graph node.
///
/// Cloning produces another wrapper for the same identity; equality is
/// wrapper identity (same observer, same node), the analogue of
/// `wrap(x) === wrap(x)`.
#[derive(Clone)]
pub struct ObservedHandle {
    state: Rc<ObserverState>,
    id: NodeId,
}

impl PartialEq for ObservedHandle {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.state, &other.state) && self.id == other.id
    }
}

impl Eq for ObservedHandle {}

impl fmt::Debug for ObservedHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservedHandle")
            .field("id", &self.id)
            .field("path", &self.path())
            .finish()
    }
}

impl ObservedHandle {
    pub(crate) fn from_parts(state: Rc<ObserverState>, id: NodeId) -> Self {
        Self { state, id }
    }

    pub(crate) fn state(&self) -> &Rc<ObserverState> {
        &self.state
    }

    /// The identity of the wrapped node.
    #[must_use]
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// The canonical path under which this node was first reached; empty at
    /// the root.
    #[must_use]
    pub fn path(&self) -> String {
        self.state.tracker.borrow().get_path(self.id).to_string()
    }

    #[must_use]
    pub fn kind(&self) -> NodeKind {
        self.state
            .graph
            .borrow()
            .kind(self.id)
            .unwrap_or(NodeKind::Object)
    }

    #[must_use]
    pub fn type_name(&self) -> String {
        self.state
            .graph
            .borrow()
            .type_name(self.id)
            .unwrap_or("Object")
            .to_string()
    }

    /// Own property names in enumeration order. Pass-through: no wrapping,
    /// no callbacks.
    pub fn keys(&self) -> Result<Vec<String>> {
        Ok(self.state.graph.borrow().keys(self.id)?)
    }

    /// Whether the property exists (even with a `Null` value). Pass-through.
    pub fn has(&self, prop: &str) -> Result<bool> {
        Ok(self.state.graph.borrow().has(self.id, prop)?)
    }

    /// Read a property.
    ///
    /// A missing property dispatches `on_access_failure` and reads as
    /// `None`. A composite value is wrapped on first read (when nested
    /// observation is enabled) and returned as [`Fetched::Node`].
    pub fn get(&self, prop: &str) -> Result<Option<Fetched>> {
        let parent_path = self.path();
        let value = self.state.graph.borrow().get(self.id, prop)?.cloned();
        match value {
            None => {
                let event = ChangeEvent::new(prop, &parent_path);
                if let Some(cb) = &self.state.options.on_access_failure {
                    cb(prop, &Value::Null, self.id, &event);
                }
                Ok(None)
            }
            Some(value) => Ok(Some(self.fetched(value, &path::join_key(&parent_path, prop)))),
        }
    }

    /// Read a nested composite property as a handle; `None` for leaves and
    /// missing properties.
    pub fn child(&self, prop: &str) -> Result<Option<ObservedHandle>> {
        Ok(self.get(prop)?.and_then(Fetched::into_handle))
    }

    /// Write a property. Classifies the write, dispatches at most one
    /// callback, and schedules a render.
    pub fn set(&self, prop: &str, value: impl Into<Literal>) -> Result<()> {
        let literal = value.into();
        let parent_path = self.path();

        let old = self.state.graph.borrow().get(self.id, prop)?.cloned();
        let had_value = old.as_ref().is_some_and(|v| !v.is_null());
        let was_tracked = self.state.tracker.borrow().has_dependency(self.id, prop);

        let new_value = self.state.graph.borrow_mut().materialize(literal)?;
        self.wrap_if_composite(&new_value, &path::join_key(&parent_path, prop));
        self.state
            .graph
            .borrow_mut()
            .set(self.id, prop, new_value.clone())?;

        let event = ChangeEvent::new(prop, &parent_path);
        self.state
            .tracker
            .borrow_mut()
            .record_change(self.id, prop, &parent_path);

        self.dispatch_write(prop, old, &new_value, had_value, was_tracked, &event);
        self.state.scheduler.request();
        Ok(())
    }

    /// Delete a property. Dispatches `on_property_delete` when it existed
    /// and schedules a render regardless.
    pub fn remove(&self, prop: &str) -> Result<bool> {
        let parent_path = self.path();
        let old = self.state.graph.borrow_mut().remove(self.id, prop)?;
        let existed = old.is_some();
        if let Some(old_value) = old {
            self.state
                .tracker
                .borrow_mut()
                .remove_dependency(self.id, prop);
            let event = ChangeEvent::new(prop, &parent_path);
            self.signal(StatusKind::Delete);
            if let Some(cb) = &self.state.options.on_property_delete {
                cb(prop, &old_value, self.id, &event);
            }
        }
        self.state.scheduler.request();
        Ok(existed)
    }

    // ── Array operations ─────────────────────────────────────────────

    /// Read an element; out-of-bounds dispatches `on_access_failure`.
    pub fn get_index(&self, index: usize) -> Result<Option<Fetched>> {
        let parent_path = self.path();
        let prop = index.to_string();
        let value = self.state.graph.borrow().get_index(self.id, index)?.cloned();
        match value {
            None => {
                let event = ChangeEvent::new(&prop, &parent_path);
                if let Some(cb) = &self.state.options.on_access_failure {
                    cb(&prop, &Value::Null, self.id, &event);
                }
                Ok(None)
            }
            Some(value) => Ok(Some(self.fetched(value, &path::join_key(&parent_path, &prop)))),
        }
    }

    /// Write an element (`index == len` appends). Same classification and
    /// dispatch as [`set`](Self::set), with the index as the property name.
    pub fn set_index(&self, index: usize, value: impl Into<Literal>) -> Result<()> {
        let literal = value.into();
        let parent_path = self.path();
        let prop = index.to_string();

        let old = {
            let graph = self.state.graph.borrow();
            // Validate the node is an array before materializing.
            let len = graph.array_len(self.id)?;
            if index > len {
                return Err(RuntimeError::Graph(
                    vigil_core::GraphError::IndexOutOfBounds {
                        id: self.id,
                        index,
                        len,
                    },
                ));
            }
            graph.get_index(self.id, index)?.cloned()
        };
        let had_value = old.as_ref().is_some_and(|v| !v.is_null());
        let was_tracked = self.state.tracker.borrow().has_dependency(self.id, &prop);

        let new_value = self.state.graph.borrow_mut().materialize(literal)?;
        self.wrap_if_composite(&new_value, &path::join_key(&parent_path, &prop));
        self.state
            .graph
            .borrow_mut()
            .set_index(self.id, index, new_value.clone())?;

        let event = ChangeEvent::new(&prop, &parent_path);
        self.state
            .tracker
            .borrow_mut()
            .record_change(self.id, &prop, &parent_path);

        self.dispatch_write(&prop, old, &new_value, had_value, was_tracked, &event);
        self.state.scheduler.request();
        Ok(())
    }

    /// Append an element, returning its index.
    pub fn push(&self, value: impl Into<Literal>) -> Result<usize> {
        let index = self.state.graph.borrow().array_len(self.id)?;
        self.set_index(index, value)?;
        Ok(index)
    }

    /// Array length. Pass-through.
    pub fn len(&self) -> Result<usize> {
        Ok(self.state.graph.borrow().array_len(self.id)?)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    // ── Internals ────────────────────────────────────────────────────

    /// Wrap a freshly stored composite value under `path`, unless nested
    /// observation is off or it is already wrapped. The lookup-before-wrap
    /// order is what makes self-assignment terminate.
    fn wrap_if_composite(&self, value: &Value, path: &str) {
        if let Value::Ref(child) = value
            && self.state.options.observe_nested
            && !self.state.wrapped.borrow().contains(child)
        {
            wrap(&self.state, *child, path);
        }
    }

    fn fetched(&self, value: Value, path: &str) -> Fetched {
        match value {
            Value::Ref(child) if self.state.options.observe_nested => {
                Fetched::Node(wrap(&self.state, child, path))
            }
            other => Fetched::Value(other),
        }
    }

    /// Classify a completed write and dispatch at most one callback. Called
    /// with no internal borrows held.
    fn dispatch_write(
        &self,
        prop: &str,
        old: Option<Value>,
        new_value: &Value,
        had_value: bool,
        was_tracked: bool,
        event: &ChangeEvent,
    ) {
        self.signal(StatusKind::Change);
        if !was_tracked && !had_value {
            if let Some(cb) = &self.state.options.on_new_property {
                cb(prop, new_value, self.id, event);
            }
        } else {
            let old_value = old.unwrap_or(Value::Null);
            if old_value != *new_value
                && let Some(cb) = &self.state.options.on_property_change
            {
                cb(prop, &old_value, new_value, self.id, event);
            }
        }
    }

    fn signal(&self, kind: StatusKind) {
        if let Some(cb) = &self.state.options.on_status {
            cb(kind);
        }
    }
}
