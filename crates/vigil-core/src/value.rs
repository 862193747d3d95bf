#![forbid(unsafe_code)]

//! Value representation: stored slots and input literals.
//!
//! [`Value`] is what a graph slot holds: a scalar, a named function leaf, or
//! a [`NodeId`] reference to a composite node. [`Literal`] is the input tree
//! used to write values through the observation surface; composite literals
//! are materialized into fresh graph nodes, while [`Literal::Ref`] reuses an
//! existing node (which is how cycles are formed).
//!
//! # Equality
//!
//! Scalars compare by value, functions by name, references by identity
//! (`NodeId`). Two structurally identical objects are therefore *not* equal:
//! identity, not content, is what the tracker and the proxy cache key on.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::graph::NodeId;

/// A primitive value.
///
/// `Null` doubles as the "declared but unset" placeholder: a property whose
/// stored value is `Null` is treated as having no previous value when a
/// write is classified as new-vs-changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => f.write_str("null"),
            Scalar::Bool(b) => write!(f, "{b}"),
            Scalar::Int(n) => write!(f, "{n}"),
            Scalar::Float(n) => write!(f, "{n}"),
            Scalar::Str(s) => f.write_str(s),
        }
    }
}

/// A stored slot in the graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// A function leaf. Only the name is carried; functions are never
    /// entered by traversal.
    Function(String),
    /// A reference to a composite node, compared by identity.
    Ref(NodeId),
}

impl Value {
    /// The scalar content of this slot, if it is one.
    #[must_use]
    pub fn as_scalar(&self) -> Option<Scalar> {
        match self {
            Value::Null => Some(Scalar::Null),
            Value::Bool(b) => Some(Scalar::Bool(*b)),
            Value::Int(n) => Some(Scalar::Int(*n)),
            Value::Float(n) => Some(Scalar::Float(*n)),
            Value::Str(s) => Some(Scalar::Str(s.clone())),
            Value::Function(_) | Value::Ref(_) => None,
        }
    }

    /// The referenced node id, if this slot is a reference.
    #[must_use]
    pub fn as_ref_id(&self) -> Option<NodeId> {
        match self {
            Value::Ref(id) => Some(*id),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(n) => write!(f, "{n}"),
            Value::Str(s) => f.write_str(s),
            Value::Function(name) => write!(f, "{name}()"),
            Value::Ref(id) => write!(f, "[object {id}]"),
        }
    }
}

impl From<Scalar> for Value {
    fn from(s: Scalar) -> Self {
        match s {
            Scalar::Null => Value::Null,
            Scalar::Bool(b) => Value::Bool(b),
            Scalar::Int(n) => Value::Int(n),
            Scalar::Float(n) => Value::Float(n),
            Scalar::Str(s) => Value::Str(s),
        }
    }
}

/// An input tree for writes.
///
/// Scalar and function literals become slot values directly. `Array` and
/// `Object` literals allocate fresh nodes when materialized. `Ref` points at
/// an existing node and is what makes self-references and shared subtrees
/// expressible: assigning `Literal::Ref(id)` to a property of the node `id`
/// itself produces a cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Scalar(Scalar),
    Function(String),
    Array(Vec<Literal>),
    Object {
        /// Instance name rendered as the tree header (`+ Sprite`). `None`
        /// renders as plain `Object`.
        name: Option<String>,
        fields: Vec<(String, Literal)>,
    },
    Ref(NodeId),
}

impl Literal {
    #[must_use]
    pub fn null() -> Self {
        Literal::Scalar(Scalar::Null)
    }

    pub fn function(name: impl Into<String>) -> Self {
        Literal::Function(name.into())
    }

    pub fn array(items: impl IntoIterator<Item = Literal>) -> Self {
        Literal::Array(items.into_iter().collect())
    }

    /// An anonymous object literal.
    pub fn object<K: Into<String>>(fields: impl IntoIterator<Item = (K, Literal)>) -> Self {
        Literal::Object {
            name: None,
            fields: fields
                .into_iter()
                .map(|(k, v)| (k.into(), v))
                .collect(),
        }
    }

    /// A named instance literal with no fields.
    pub fn named(name: impl Into<String>) -> Self {
        Literal::Object {
            name: Some(name.into()),
            fields: Vec::new(),
        }
    }

    /// A named instance literal, e.g. `Literal::instance("Sprite", ...)`.
    pub fn instance<K: Into<String>>(
        name: impl Into<String>,
        fields: impl IntoIterator<Item = (K, Literal)>,
    ) -> Self {
        Literal::Object {
            name: Some(name.into()),
            fields: fields
                .into_iter()
                .map(|(k, v)| (k.into(), v))
                .collect(),
        }
    }
}

impl From<()> for Literal {
    fn from((): ()) -> Self {
        Literal::null()
    }
}

impl From<bool> for Literal {
    fn from(b: bool) -> Self {
        Literal::Scalar(Scalar::Bool(b))
    }
}

impl From<i32> for Literal {
    fn from(n: i32) -> Self {
        Literal::Scalar(Scalar::Int(i64::from(n)))
    }
}

impl From<i64> for Literal {
    fn from(n: i64) -> Self {
        Literal::Scalar(Scalar::Int(n))
    }
}

impl From<f64> for Literal {
    fn from(n: f64) -> Self {
        Literal::Scalar(Scalar::Float(n))
    }
}

impl From<&str> for Literal {
    fn from(s: &str) -> Self {
        Literal::Scalar(Scalar::Str(s.to_string()))
    }
}

impl From<String> for Literal {
    fn from(s: String) -> Self {
        Literal::Scalar(Scalar::Str(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_display_matches_source_text() {
        assert_eq!(Scalar::Null.to_string(), "null");
        assert_eq!(Scalar::Bool(true).to_string(), "true");
        assert_eq!(Scalar::Int(42).to_string(), "42");
        assert_eq!(Scalar::Float(1.5).to_string(), "1.5");
        assert_eq!(Scalar::Float(2.0).to_string(), "2");
        assert_eq!(Scalar::Str("hi".into()).to_string(), "hi");
    }

    #[test]
    fn value_equality_is_identity_for_refs() {
        let a = Value::Ref(NodeId::from_raw(1));
        let b = Value::Ref(NodeId::from_raw(2));
        assert_ne!(a, b);
        assert_eq!(a, Value::Ref(NodeId::from_raw(1)));
    }

    #[test]
    fn literal_conversions() {
        assert_eq!(Literal::from(5), Literal::Scalar(Scalar::Int(5)));
        assert_eq!(Literal::from(()), Literal::null());
        assert_eq!(
            Literal::from("x"),
            Literal::Scalar(Scalar::Str("x".into()))
        );
    }

    #[test]
    fn scalar_serde_is_untagged() {
        let json = serde_json::to_value(Scalar::Int(3)).unwrap();
        assert_eq!(json, serde_json::json!(3));
        let json = serde_json::to_value(Scalar::Null).unwrap();
        assert_eq!(json, serde_json::Value::Null);
        let back: Scalar = serde_json::from_value(serde_json::json!("abc")).unwrap();
        assert_eq!(back, Scalar::Str("abc".into()));
    }

    #[test]
    fn as_scalar_rejects_composites() {
        assert!(Value::Ref(NodeId::from_raw(7)).as_scalar().is_none());
        assert!(Value::Function("f".into()).as_scalar().is_none());
        assert_eq!(Value::Int(1).as_scalar(), Some(Scalar::Int(1)));
    }
}
