#![forbid(unsafe_code)]

//! Graph-to-tree serialization.
//!
//! [`serialize`] performs a depth-first walk of the values reachable from a
//! slot and produces a self-describing tagged tree. Classification order is
//! fixed: primitive, then circular (identity already seen in *this* call),
//! then array, then function leaf, then object. The visited set is scoped to
//! one top-level invocation and never persists across calls, so consecutive
//! serializations of the same graph are independent.
//!
//! A slot referencing a node absent from the graph (a dangling reference in
//! a snapshot or a torn-down arena) becomes an `error` leaf; one bad slot
//! never aborts the traversal.

use serde::{Deserialize, Serialize};

use vigil_core::{Graph, NodeId, NodeKind, Scalar, Set, Value, path};

/// One key/value pair of a serialized object node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub key: String,
    pub value: SerializedNode,
}

/// A tagged, path-annotated tree node.
///
/// The serde representation is the engine's wire format: a `type` tag with
/// camelCase payload fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SerializedNode {
    #[serde(rename_all = "camelCase")]
    Primitive { path: String, value: Scalar },
    /// A back-reference to a node already visited in this walk. Only the
    /// type name is recorded, never the content.
    #[serde(rename_all = "camelCase")]
    Circular { path: String, reference: String },
    #[serde(rename_all = "camelCase")]
    Function { path: String, name: String },
    #[serde(rename_all = "camelCase")]
    Error { path: String, message: String },
    #[serde(rename_all = "camelCase")]
    Array {
        path: String,
        length: usize,
        items: Vec<SerializedNode>,
    },
    #[serde(rename_all = "camelCase")]
    Object {
        path: String,
        name: String,
        properties: Vec<Property>,
    },
}

impl SerializedNode {
    /// The node's path annotation.
    #[must_use]
    pub fn path(&self) -> &str {
        match self {
            SerializedNode::Primitive { path, .. }
            | SerializedNode::Circular { path, .. }
            | SerializedNode::Function { path, .. }
            | SerializedNode::Error { path, .. }
            | SerializedNode::Array { path, .. }
            | SerializedNode::Object { path, .. } => path,
        }
    }

    /// The wire tag of this node's variant.
    #[must_use]
    pub fn type_tag(&self) -> &'static str {
        match self {
            SerializedNode::Primitive { .. } => "primitive",
            SerializedNode::Circular { .. } => "circular",
            SerializedNode::Function { .. } => "function",
            SerializedNode::Error { .. } => "error",
            SerializedNode::Array { .. } => "array",
            SerializedNode::Object { .. } => "object",
        }
    }
}

/// Serialize the value reachable from `value` into a tagged tree.
#[must_use]
pub fn serialize(graph: &Graph, value: &Value) -> SerializedNode {
    let mut visited: Set<NodeId> = Set::default();
    walk(graph, value, String::new(), &mut visited)
}

fn walk(graph: &Graph, value: &Value, path: String, visited: &mut Set<NodeId>) -> SerializedNode {
    if let Some(scalar) = value.as_scalar() {
        return SerializedNode::Primitive {
            path,
            value: scalar,
        };
    }
    if let Value::Function(name) = value {
        return SerializedNode::Function {
            path,
            name: name.clone(),
        };
    }
    let Value::Ref(id) = value else {
        unreachable!("scalar and function slots handled above");
    };
    let id = *id;

    if visited.contains(&id) {
        let reference = graph.type_name(id).unwrap_or("Object").to_string();
        return SerializedNode::Circular { path, reference };
    }

    let Ok(kind) = graph.kind(id) else {
        return SerializedNode::Error {
            path,
            message: format!("dangling reference to {id}"),
        };
    };
    visited.insert(id);

    match kind {
        NodeKind::Array => {
            let items: Vec<&Value> = graph
                .iter_items(id)
                .map(Iterator::collect)
                .unwrap_or_default();
            let length = items.len();
            let items = items
                .into_iter()
                .enumerate()
                .map(|(index, item)| walk(graph, item, path::join_index(&path, index), visited))
                .collect();
            SerializedNode::Array {
                path,
                length,
                items,
            }
        }
        NodeKind::Object => {
            let name = graph.type_name(id).unwrap_or("Object").to_string();
            let entries: Vec<(&str, &Value)> = graph
                .iter_entries(id)
                .map(Iterator::collect)
                .unwrap_or_default();
            let properties = entries
                .into_iter()
                .map(|(key, slot)| Property {
                    value: walk(graph, slot, path::join_key(&path, key), visited),
                    key: key.to_string(),
                })
                .collect();
            SerializedNode::Object {
                path,
                name,
                properties,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_core::Literal;

    fn build(literal: Literal) -> (Graph, Value) {
        let mut graph = Graph::new();
        let value = graph.materialize(literal).unwrap();
        (graph, value)
    }

    #[test]
    fn scalar_is_primitive_leaf() {
        let graph = Graph::new();
        let node = serialize(&graph, &Value::Int(7));
        assert_eq!(
            node,
            SerializedNode::Primitive {
                path: String::new(),
                value: Scalar::Int(7)
            }
        );
    }

    #[test]
    fn object_children_carry_dotted_paths() {
        let (graph, root) = build(Literal::instance(
            "Sprite",
            [("x", Literal::from(5)), ("y", Literal::null())],
        ));
        let SerializedNode::Object { name, properties, path } = serialize(&graph, &root) else {
            panic!("expected object node");
        };
        assert_eq!(path, "");
        assert_eq!(name, "Sprite");
        assert_eq!(properties.len(), 2);
        assert_eq!(properties[0].key, "x");
        assert_eq!(properties[0].value.path(), "x");
        assert_eq!(properties[1].value.path(), "y");
    }

    #[test]
    fn nested_paths_compose() {
        let (graph, root) = build(Literal::object([(
            "a",
            Literal::object([("b", Literal::from(1))]),
        )]));
        let SerializedNode::Object { properties, .. } = serialize(&graph, &root) else {
            panic!("expected object node");
        };
        let SerializedNode::Object { ref properties, .. } = properties[0].value else {
            panic!("expected nested object");
        };
        assert_eq!(properties[0].value.path(), "a.b");
    }

    #[test]
    fn array_items_carry_bracket_paths() {
        let (graph, root) = build(Literal::object([(
            "items",
            Literal::array([Literal::from(1), Literal::from(2)]),
        )]));
        let SerializedNode::Object { properties, .. } = serialize(&graph, &root) else {
            panic!("expected object node");
        };
        let SerializedNode::Array { length, ref items, .. } = properties[0].value else {
            panic!("expected array node");
        };
        assert_eq!(length, 2);
        assert_eq!(items[0].path(), "items[0]");
        assert_eq!(items[1].path(), "items[1]");
    }

    #[test]
    fn function_is_leaf_with_name() {
        let (graph, root) = build(Literal::object([("fn", Literal::function("update"))]));
        let SerializedNode::Object { properties, .. } = serialize(&graph, &root) else {
            panic!("expected object node");
        };
        assert_eq!(
            properties[0].value,
            SerializedNode::Function {
                path: "fn".into(),
                name: "update".into()
            }
        );
    }

    #[test]
    fn self_reference_terminates_as_circular() {
        let (mut graph, root) = build(Literal::instance("Sprite", [("x", Literal::from(1))]));
        let id = root.as_ref_id().unwrap();
        graph.set(id, "me", Value::Ref(id)).unwrap();

        let SerializedNode::Object { properties, .. } = serialize(&graph, &root) else {
            panic!("expected object node");
        };
        assert_eq!(
            properties[1].value,
            SerializedNode::Circular {
                path: "me".into(),
                reference: "Sprite".into()
            }
        );
    }

    #[test]
    fn shared_subtree_reports_circular_on_second_reach() {
        // The visited set is call-persistent, so a diamond (not a true
        // cycle) still collapses its second occurrence.
        let mut graph = Graph::new();
        let shared = graph
            .materialize(Literal::object([("v", Literal::from(1))]))
            .unwrap();
        let shared_id = shared.as_ref_id().unwrap();
        let root_id = graph.alloc_object();
        graph.set(root_id, "a", Value::Ref(shared_id)).unwrap();
        graph.set(root_id, "b", Value::Ref(shared_id)).unwrap();

        let SerializedNode::Object { properties, .. } =
            serialize(&graph, &Value::Ref(root_id))
        else {
            panic!("expected object node");
        };
        assert_eq!(properties[0].value.type_tag(), "object");
        assert_eq!(properties[1].value.type_tag(), "circular");
    }

    #[test]
    fn dangling_reference_becomes_error_leaf() {
        let (mut graph, root) = build(Literal::object([("x", Literal::from(1))]));
        let id = root.as_ref_id().unwrap();
        // Forge a reference to a node the graph has never allocated.
        graph.set(id, "ghost", Value::Ref(NodeId::from_raw(4096))).unwrap();

        let SerializedNode::Object { properties, .. } = serialize(&graph, &root) else {
            panic!("expected object node");
        };
        let SerializedNode::Error { ref message, .. } = properties[1].value else {
            panic!("expected error leaf, got {:?}", properties[1].value);
        };
        assert!(message.contains("dangling reference"));
        // The rest of the object still serialized.
        assert_eq!(properties[0].value.type_tag(), "primitive");
    }

    #[test]
    fn visited_set_resets_between_calls() {
        let (mut graph, root) = build(Literal::named("Sprite"));
        let id = root.as_ref_id().unwrap();
        graph.set(id, "me", Value::Ref(id)).unwrap();

        let first = serialize(&graph, &root);
        let second = serialize(&graph, &root);
        assert_eq!(first, second);
        assert_eq!(second.type_tag(), "object");
    }

    #[test]
    fn wire_tags_match_contract() {
        let (graph, root) = build(Literal::object([("x", Literal::from(1))]));
        let json = serde_json::to_value(serialize(&graph, &root)).unwrap();
        assert_eq!(json["type"], "object");
        assert_eq!(json["properties"][0]["value"]["type"], "primitive");
        assert_eq!(json["properties"][0]["value"]["value"], 1);
    }
}
