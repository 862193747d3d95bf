#![forbid(unsafe_code)]

//! The identity arena.
//!
//! A [`Graph`] owns every composite value reachable from its roots. Each
//! object or array gets a [`NodeId`] at allocation time; the id is the
//! object's *identity*, independent of its contents, and is the key for all
//! side tables (proxy cache, path table, dependency sets). Ids are never
//! reused within a graph.
//!
//! # Invariants
//!
//! 1. A `NodeId` handed out by `alloc_*`/`materialize` stays valid until
//!    [`Graph::clear`]; slots may reference it from anywhere, including from
//!    the node's own entries (cycles are first-class).
//! 2. Object entries preserve insertion order, so key enumeration is stable
//!    and mirrors the source's property order.
//! 3. [`Graph::snapshot`] copies exactly the nodes reachable from the given
//!    root, preserving ids, and terminates on cyclic graphs.
//!
//! Nodes orphaned by overwrites are not collected eagerly; they are dropped
//! wholesale when the owning registry tears the graph down, and snapshots
//! never include them.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{GraphError, Result};
use crate::value::{Literal, Value};
use crate::{Map, Set};

/// Opaque identity of a live composite node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(u64);

impl NodeId {
    /// Build an id from its raw representation. Intended for tests and
    /// deserialized payloads; ids for live data come from the graph.
    #[must_use]
    pub fn from_raw(raw: u64) -> Self {
        NodeId(raw)
    }

    #[must_use]
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The two composite node shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Object,
    Array,
}

/// Storage for one composite node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeBody {
    Object {
        /// Instance name (`Sprite`, `Position`, ...) or `None` for a plain
        /// object.
        name: Option<String>,
        entries: Vec<(String, Value)>,
    },
    Array(Vec<Value>),
}

/// An arena of composite nodes addressed by identity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    nodes: Map<NodeId, NodeBody>,
    next_id: u64,
}

impl Graph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[must_use]
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Drop every node. Outstanding ids become dangling.
    pub fn clear(&mut self) {
        self.nodes.clear();
    }

    fn alloc(&mut self, body: NodeBody) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.nodes.insert(id, body);
        id
    }

    /// Allocate an empty anonymous object node.
    pub fn alloc_object(&mut self) -> NodeId {
        self.alloc(NodeBody::Object {
            name: None,
            entries: Vec::new(),
        })
    }

    /// Allocate an empty named instance node.
    pub fn alloc_instance(&mut self, name: impl Into<String>) -> NodeId {
        self.alloc(NodeBody::Object {
            name: Some(name.into()),
            entries: Vec::new(),
        })
    }

    /// Allocate an empty array node.
    pub fn alloc_array(&mut self) -> NodeId {
        self.alloc(NodeBody::Array(Vec::new()))
    }

    /// Turn an input literal into a stored value, allocating nodes for
    /// composite literals. `Literal::Ref` is validated against the arena.
    pub fn materialize(&mut self, literal: Literal) -> Result<Value> {
        match literal {
            Literal::Scalar(s) => Ok(Value::from(s)),
            Literal::Function(name) => Ok(Value::Function(name)),
            Literal::Ref(id) => {
                if self.contains(id) {
                    Ok(Value::Ref(id))
                } else {
                    Err(GraphError::MissingNode { id })
                }
            }
            Literal::Array(items) => {
                let id = self.alloc_array();
                for item in items {
                    let value = self.materialize(item)?;
                    self.push(id, value)?;
                }
                Ok(Value::Ref(id))
            }
            Literal::Object { name, fields } => {
                let id = match name {
                    Some(n) => self.alloc_instance(n),
                    None => self.alloc_object(),
                };
                for (key, field) in fields {
                    let value = self.materialize(field)?;
                    self.set(id, &key, value)?;
                }
                Ok(Value::Ref(id))
            }
        }
    }

    fn body(&self, id: NodeId) -> Result<&NodeBody> {
        self.nodes.get(&id).ok_or(GraphError::MissingNode { id })
    }

    fn body_mut(&mut self, id: NodeId) -> Result<&mut NodeBody> {
        self.nodes
            .get_mut(&id)
            .ok_or(GraphError::MissingNode { id })
    }

    pub fn kind(&self, id: NodeId) -> Result<NodeKind> {
        Ok(match self.body(id)? {
            NodeBody::Object { .. } => NodeKind::Object,
            NodeBody::Array(_) => NodeKind::Array,
        })
    }

    /// The display name for a node: its instance name, `"Object"`, or
    /// `"Array"`.
    pub fn type_name(&self, id: NodeId) -> Result<&str> {
        Ok(match self.body(id)? {
            NodeBody::Object { name, .. } => name.as_deref().unwrap_or("Object"),
            NodeBody::Array(_) => "Array",
        })
    }

    // ── Object accessors ─────────────────────────────────────────────

    fn entries(&self, id: NodeId) -> Result<&[(String, Value)]> {
        match self.body(id)? {
            NodeBody::Object { entries, .. } => Ok(entries),
            NodeBody::Array(_) => Err(GraphError::NotAnObject { id }),
        }
    }

    fn entries_mut(&mut self, id: NodeId) -> Result<&mut Vec<(String, Value)>> {
        match self.body_mut(id)? {
            NodeBody::Object { entries, .. } => Ok(entries),
            NodeBody::Array(_) => Err(GraphError::NotAnObject { id }),
        }
    }

    pub fn get(&self, id: NodeId, key: &str) -> Result<Option<&Value>> {
        Ok(self
            .entries(id)?
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v))
    }

    pub fn has(&self, id: NodeId, key: &str) -> Result<bool> {
        Ok(self.entries(id)?.iter().any(|(k, _)| k == key))
    }

    /// Write a property, returning the previous value if the key existed.
    /// New keys append in enumeration order.
    pub fn set(&mut self, id: NodeId, key: &str, value: Value) -> Result<Option<Value>> {
        let entries = self.entries_mut(id)?;
        if let Some((_, slot)) = entries.iter_mut().find(|(k, _)| k == key) {
            Ok(Some(std::mem::replace(slot, value)))
        } else {
            entries.push((key.to_string(), value));
            Ok(None)
        }
    }

    /// Delete a property, returning its value if the key existed.
    pub fn remove(&mut self, id: NodeId, key: &str) -> Result<Option<Value>> {
        let entries = self.entries_mut(id)?;
        match entries.iter().position(|(k, _)| k == key) {
            Some(index) => Ok(Some(entries.remove(index).1)),
            None => Ok(None),
        }
    }

    pub fn keys(&self, id: NodeId) -> Result<Vec<String>> {
        Ok(self.entries(id)?.iter().map(|(k, _)| k.clone()).collect())
    }

    /// Iterate the node's entries in insertion order.
    pub fn iter_entries(
        &self,
        id: NodeId,
    ) -> Result<impl Iterator<Item = (&str, &Value)>> {
        Ok(self.entries(id)?.iter().map(|(k, v)| (k.as_str(), v)))
    }

    // ── Array accessors ──────────────────────────────────────────────

    fn items(&self, id: NodeId) -> Result<&[Value]> {
        match self.body(id)? {
            NodeBody::Array(items) => Ok(items),
            NodeBody::Object { .. } => Err(GraphError::NotAnArray { id }),
        }
    }

    fn items_mut(&mut self, id: NodeId) -> Result<&mut Vec<Value>> {
        match self.body_mut(id)? {
            NodeBody::Array(items) => Ok(items),
            NodeBody::Object { .. } => Err(GraphError::NotAnArray { id }),
        }
    }

    pub fn get_index(&self, id: NodeId, index: usize) -> Result<Option<&Value>> {
        Ok(self.items(id)?.get(index))
    }

    /// Write an element. `index == len` appends; anything past that is an
    /// error (no sparse arrays).
    pub fn set_index(&mut self, id: NodeId, index: usize, value: Value) -> Result<Option<Value>> {
        let items = self.items_mut(id)?;
        if index < items.len() {
            Ok(Some(std::mem::replace(&mut items[index], value)))
        } else if index == items.len() {
            items.push(value);
            Ok(None)
        } else {
            Err(GraphError::IndexOutOfBounds {
                id,
                index,
                len: items.len(),
            })
        }
    }

    /// Append an element, returning its index.
    pub fn push(&mut self, id: NodeId, value: Value) -> Result<usize> {
        let items = self.items_mut(id)?;
        items.push(value);
        Ok(items.len() - 1)
    }

    pub fn array_len(&self, id: NodeId) -> Result<usize> {
        Ok(self.items(id)?.len())
    }

    pub fn iter_items(&self, id: NodeId) -> Result<impl Iterator<Item = &Value>> {
        Ok(self.items(id)?.iter())
    }

    // ── Snapshots ────────────────────────────────────────────────────

    /// Structural copy of the subgraph reachable from `root`, preserving
    /// ids. This is the clone shipped across the engine transport: the
    /// receiver never observes mutations made after the copy was taken.
    pub fn snapshot(&self, root: NodeId) -> Result<Graph> {
        if !self.contains(root) {
            return Err(GraphError::MissingNode { id: root });
        }
        let mut out = Graph {
            nodes: Map::default(),
            next_id: self.next_id,
        };
        let mut visited: Set<NodeId> = Set::default();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if !visited.insert(id) {
                continue;
            }
            let Some(body) = self.nodes.get(&id) else {
                // Dangling reference: leave it dangling in the copy too so
                // the engine renders the same error leaf on both sides.
                continue;
            };
            out.nodes.insert(id, body.clone());
            let slots: Box<dyn Iterator<Item = &Value>> = match body {
                NodeBody::Object { entries, .. } => Box::new(entries.iter().map(|(_, v)| v)),
                NodeBody::Array(items) => Box::new(items.iter()),
            };
            for value in slots {
                if let Value::Ref(child) = value {
                    stack.push(*child);
                }
            }
        }
        Ok(out)
    }
}
