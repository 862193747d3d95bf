#![forbid(unsafe_code)]

//! Structural diff over tagged trees.
//!
//! [`diff`] compares two [`SerializedNode`] trees node-by-node, keyed by
//! path. Rules, in order: missing-old/present-new is an `add`; the reverse
//! is a `delete`; a tag mismatch is a `typeChange` and ends recursion into
//! that subtree; equal-tag primitives produce an `update` when the values
//! differ; objects recurse over the union of both sides' keys (new-side
//! order first, then old-only keys as deletes); arrays report a resize when
//! lengths differ and then compare pairwise up to the longer length.
//!
//! A per-call visited-path set guards against processing the same path
//! twice within one invocation; it is never persisted across calls.

use serde::{Deserialize, Serialize};

use crate::serialize::SerializedNode;
use vigil_core::{Map, Scalar, Set, path};

/// One structural difference between two trees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ChangeRecord {
    #[serde(rename_all = "camelCase")]
    Add { path: String, value: SerializedNode },
    #[serde(rename_all = "camelCase")]
    Delete {
        path: String,
        old_value: SerializedNode,
    },
    /// The node changed its tagged type; subtrees are not compared further.
    #[serde(rename_all = "camelCase")]
    TypeChange {
        path: String,
        old_type: String,
        new_type: String,
        old_value: SerializedNode,
        new_value: SerializedNode,
    },
    #[serde(rename_all = "camelCase")]
    Update {
        path: String,
        old_value: Scalar,
        new_value: Scalar,
    },
    #[serde(rename_all = "camelCase")]
    ArrayResize {
        path: String,
        old_length: usize,
        new_length: usize,
    },
}

impl ChangeRecord {
    #[must_use]
    pub fn path(&self) -> &str {
        match self {
            ChangeRecord::Add { path, .. }
            | ChangeRecord::Delete { path, .. }
            | ChangeRecord::TypeChange { path, .. }
            | ChangeRecord::Update { path, .. }
            | ChangeRecord::ArrayResize { path, .. } => path,
        }
    }
}

/// Compare two trees rooted at the empty path.
#[must_use]
pub fn diff(old: &SerializedNode, new: &SerializedNode) -> Vec<ChangeRecord> {
    diff_from(old, new, "")
}

/// Compare two trees rooted at an explicit base path.
#[must_use]
pub fn diff_from(old: &SerializedNode, new: &SerializedNode, base: &str) -> Vec<ChangeRecord> {
    let mut changes = Vec::new();
    let mut visited: Set<String> = Set::default();
    compare(Some(old), Some(new), base, &mut changes, &mut visited);
    changes
}

fn compare(
    old: Option<&SerializedNode>,
    new: Option<&SerializedNode>,
    path: &str,
    changes: &mut Vec<ChangeRecord>,
    visited: &mut Set<String>,
) {
    if !visited.insert(path.to_string()) {
        return;
    }

    let (old, new) = match (old, new) {
        (None, None) => return,
        (None, Some(new)) => {
            changes.push(ChangeRecord::Add {
                path: path.to_string(),
                value: new.clone(),
            });
            return;
        }
        (Some(old), None) => {
            changes.push(ChangeRecord::Delete {
                path: path.to_string(),
                old_value: old.clone(),
            });
            return;
        }
        (Some(old), Some(new)) => (old, new),
    };

    if old.type_tag() != new.type_tag() {
        changes.push(ChangeRecord::TypeChange {
            path: path.to_string(),
            old_type: old.type_tag().to_string(),
            new_type: new.type_tag().to_string(),
            old_value: old.clone(),
            new_value: new.clone(),
        });
        return;
    }

    match (old, new) {
        (
            SerializedNode::Primitive { value: old_value, .. },
            SerializedNode::Primitive { value: new_value, .. },
        ) => {
            if old_value != new_value {
                changes.push(ChangeRecord::Update {
                    path: path.to_string(),
                    old_value: old_value.clone(),
                    new_value: new_value.clone(),
                });
            }
        }
        (
            SerializedNode::Object {
                properties: old_props,
                ..
            },
            SerializedNode::Object {
                properties: new_props,
                ..
            },
        ) => {
            let old_by_key: Map<&str, &SerializedNode> = old_props
                .iter()
                .map(|p| (p.key.as_str(), &p.value))
                .collect();
            let new_keys: Set<&str> = new_props.iter().map(|p| p.key.as_str()).collect();

            // Added and changed properties, in the new side's order.
            for prop in new_props {
                let child_path = path::join_key(path, &prop.key);
                compare(
                    old_by_key.get(prop.key.as_str()).copied(),
                    Some(&prop.value),
                    &child_path,
                    changes,
                    visited,
                );
            }
            // Deleted properties, in the old side's order.
            for prop in old_props {
                if !new_keys.contains(prop.key.as_str()) {
                    let child_path = path::join_key(path, &prop.key);
                    compare(Some(&prop.value), None, &child_path, changes, visited);
                }
            }
        }
        (
            SerializedNode::Array {
                length: old_length,
                items: old_items,
                ..
            },
            SerializedNode::Array {
                length: new_length,
                items: new_items,
                ..
            },
        ) => {
            if old_length != new_length {
                changes.push(ChangeRecord::ArrayResize {
                    path: path.to_string(),
                    old_length: *old_length,
                    new_length: *new_length,
                });
            }
            let longest = old_items.len().max(new_items.len());
            for index in 0..longest {
                let child_path = path::join_index(path, index);
                compare(
                    old_items.get(index),
                    new_items.get(index),
                    &child_path,
                    changes,
                    visited,
                );
            }
        }
        // Function, circular, and error leaves of the same type never
        // produce records, even when their payloads differ.
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serialize::serialize;
    use vigil_core::{Graph, Literal, Value};

    fn tree(literal: Literal) -> SerializedNode {
        let mut graph = Graph::new();
        let root = graph.materialize(literal).unwrap();
        serialize(&graph, &root)
    }

    #[test]
    fn identical_trees_diff_empty() {
        let t = tree(Literal::instance(
            "Sprite",
            [("x", Literal::from(1)), ("y", Literal::null())],
        ));
        assert!(diff(&t, &t).is_empty());
    }

    #[test]
    fn primitive_change_is_update() {
        let old = tree(Literal::object([("x", Literal::from(1))]));
        let new = tree(Literal::object([("x", Literal::from(2))]));
        assert_eq!(
            diff(&old, &new),
            vec![ChangeRecord::Update {
                path: "x".into(),
                old_value: Scalar::Int(1),
                new_value: Scalar::Int(2),
            }]
        );
    }

    #[test]
    fn added_and_deleted_keys() {
        let old = tree(Literal::object([("a", Literal::from(1))]));
        let new = tree(Literal::object([("b", Literal::from(2))]));
        let changes = diff(&old, &new);
        assert_eq!(changes.len(), 2);
        assert!(matches!(&changes[0], ChangeRecord::Add { path, .. } if path == "b"));
        assert!(matches!(&changes[1], ChangeRecord::Delete { path, .. } if path == "a"));
    }

    #[test]
    fn type_change_stops_recursion() {
        let old = tree(Literal::object([(
            "v",
            Literal::object([("deep", Literal::from(1))]),
        )]));
        let new = tree(Literal::object([("v", Literal::from(5))]));
        let changes = diff(&old, &new);
        assert_eq!(changes.len(), 1);
        let ChangeRecord::TypeChange {
            path,
            old_type,
            new_type,
            ..
        } = &changes[0]
        else {
            panic!("expected type change, got {:?}", changes[0]);
        };
        assert_eq!(path, "v");
        assert_eq!(old_type, "object");
        assert_eq!(new_type, "primitive");
    }

    #[test]
    fn array_resize_then_pairwise() {
        let old = tree(Literal::array([Literal::from(1), Literal::from(2)]));
        let new = tree(Literal::array([
            Literal::from(1),
            Literal::from(9),
            Literal::from(3),
        ]));
        let changes = diff(&old, &new);
        assert_eq!(
            changes[0],
            ChangeRecord::ArrayResize {
                path: String::new(),
                old_length: 2,
                new_length: 3,
            }
        );
        assert!(matches!(&changes[1], ChangeRecord::Update { path, .. } if path == "[1]"));
        assert!(matches!(&changes[2], ChangeRecord::Add { path, .. } if path == "[2]"));
        assert_eq!(changes.len(), 3);
    }

    #[test]
    fn nested_paths_compose_in_records() {
        let old = tree(Literal::object([(
            "a",
            Literal::object([("b", Literal::from(1))]),
        )]));
        let new = tree(Literal::object([(
            "a",
            Literal::object([("b", Literal::from(2))]),
        )]));
        let changes = diff(&old, &new);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].path(), "a.b");
    }

    #[test]
    fn function_rename_produces_no_record() {
        let old = tree(Literal::object([("f", Literal::function("a"))]));
        let new = tree(Literal::object([("f", Literal::function("b"))]));
        assert!(diff(&old, &new).is_empty());
    }

    #[test]
    fn circular_nodes_compare_silently() {
        let make = || {
            let mut graph = Graph::new();
            let root = graph.materialize(Literal::named("Sprite")).unwrap();
            let id = root.as_ref_id().unwrap();
            graph.set(id, "me", Value::Ref(id)).unwrap();
            serialize(&graph, &root)
        };
        assert!(diff(&make(), &make()).is_empty());
    }

    #[test]
    fn diff_from_prefixes_base_path() {
        let old = tree(Literal::object([("x", Literal::from(1))]));
        let new = tree(Literal::object([("x", Literal::from(2))]));
        let changes = diff_from(&old, &new, "root");
        assert_eq!(changes[0].path(), "root.x");
    }

    #[test]
    fn wire_tags_match_contract() {
        let record = ChangeRecord::ArrayResize {
            path: "items".into(),
            old_length: 1,
            new_length: 2,
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["type"], "arrayResize");
        assert_eq!(json["oldLength"], 1);
        assert_eq!(json["newLength"], 2);

        let update = ChangeRecord::Update {
            path: "x".into(),
            old_value: Scalar::Int(1),
            new_value: Scalar::Int(2),
        };
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json["type"], "update");
        assert_eq!(json["oldValue"], 1);
        assert_eq!(json["newValue"], 2);
    }
}
