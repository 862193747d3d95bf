#![forbid(unsafe_code)]

//! Structural statistics and advisory recommendations.
//!
//! [`analyze`] runs one depth-first pass over the values reachable from a
//! slot and accumulates counts. The identity-visited set lives for the call
//! only; a node reached a second time (shared or cyclic) counts as one
//! circular reference and is not re-entered.
//!
//! Recommendations are threshold-based advisory strings with no correctness
//! impact; `should_use_worker` is the heuristic the runtime consults before
//! offloading.

use serde::{Deserialize, Serialize};
use web_time::Instant;

use vigil_core::{Graph, NodeId, NodeKind, Set, Value};

/// Structural counters for one analyzed graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub object_count: usize,
    pub primitive_count: usize,
    pub function_count: usize,
    pub array_count: usize,
    pub circular_count: usize,
    pub max_depth: usize,
    /// Objects + primitives + functions + arrays (circular re-visits are
    /// not items).
    pub total_items: usize,
    pub processing_time_us: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RecommendationKind {
    Warning,
    Info,
    Performance,
}

/// One advisory finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub kind: RecommendationKind,
    pub message: String,
    pub metric: String,
}

/// The full result of an analysis pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    pub stats: Stats,
    pub recommendations: Vec<Recommendation>,
    pub should_use_worker: bool,
}

/// Analyze the structure reachable from `value`.
#[must_use]
pub fn analyze(graph: &Graph, value: &Value) -> AnalysisReport {
    let start = Instant::now();
    let mut stats = Stats::default();
    let mut visited: Set<NodeId> = Set::default();
    walk(graph, value, 0, &mut stats, &mut visited);

    stats.total_items = stats.object_count
        + stats.primitive_count
        + stats.function_count
        + stats.array_count;
    stats.processing_time_us = start.elapsed().as_micros() as u64;

    let should_use_worker = stats.total_items > 1000 || stats.max_depth > 10;
    AnalysisReport {
        recommendations: recommendations(&stats),
        should_use_worker,
        stats,
    }
}

fn walk(graph: &Graph, value: &Value, depth: usize, stats: &mut Stats, visited: &mut Set<NodeId>) {
    stats.max_depth = stats.max_depth.max(depth);

    let id = match value {
        Value::Function(_) => {
            stats.function_count += 1;
            return;
        }
        Value::Ref(id) => *id,
        _ => {
            stats.primitive_count += 1;
            return;
        }
    };

    if !visited.insert(id) {
        stats.circular_count += 1;
        return;
    }

    match graph.kind(id) {
        Ok(NodeKind::Array) => {
            stats.array_count += 1;
            if let Ok(items) = graph.iter_items(id) {
                for item in items {
                    walk(graph, item, depth + 1, stats, visited);
                }
            }
        }
        Ok(NodeKind::Object) => {
            stats.object_count += 1;
            if let Ok(entries) = graph.iter_entries(id) {
                for (_, slot) in entries {
                    walk(graph, slot, depth + 1, stats, visited);
                }
            }
        }
        // Dangling references contribute nothing.
        Err(_) => {}
    }
}

fn recommendations(stats: &Stats) -> Vec<Recommendation> {
    let mut out = Vec::new();
    if stats.max_depth > 15 {
        out.push(Recommendation {
            kind: RecommendationKind::Warning,
            message: "Very deep object nesting detected. Consider flattening structure."
                .to_string(),
            metric: format!("Max depth: {}", stats.max_depth),
        });
    }
    if stats.circular_count > 5 {
        out.push(Recommendation {
            kind: RecommendationKind::Info,
            message:
                "Multiple circular references found. This is normal but affects rendering performance."
                    .to_string(),
            metric: format!("Circular refs: {}", stats.circular_count),
        });
    }
    if stats.total_items > 5000 {
        out.push(Recommendation {
            kind: RecommendationKind::Performance,
            message: "Large structure detected. Consider offloading to the engine worker."
                .to_string(),
            metric: format!("Total items: {}", stats.total_items),
        });
    }
    out
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
    fn counts_flat_object() {
        let (graph, root) = build(Literal::object([
            ("a", Literal::from(1)),
            ("b", Literal::from("x")),
            ("f", Literal::function("go")),
        ]));
        let report = analyze(&graph, &root);
        assert_eq!(report.stats.object_count, 1);
        assert_eq!(report.stats.primitive_count, 2);
        assert_eq!(report.stats.function_count, 1);
        assert_eq!(report.stats.array_count, 0);
        assert_eq!(report.stats.total_items, 4);
        assert_eq!(report.stats.max_depth, 1);
        assert!(!report.should_use_worker);
    }

    #[test]
    fn three_levels_with_back_reference() {
        let (mut graph, root) = build(Literal::object([(
            "l1",
            Literal::object([("l2", Literal::object([("leaf", Literal::from(1))]))]),
        )]));
        let root_id = root.as_ref_id().unwrap();
        let l1 = graph
            .get(root_id, "l1")
            .unwrap()
            .and_then(Value::as_ref_id)
            .unwrap();
        graph.set(l1, "back", Value::Ref(root_id)).unwrap();

        let report = analyze(&graph, &root);
        assert!(report.stats.max_depth >= 3);
        assert_eq!(report.stats.circular_count, 1);
    }

    #[test]
    fn deep_nesting_flips_worker_heuristic() {
        let mut literal = Literal::object([("leaf", Literal::from(0))]);
        for _ in 0..12 {
            literal = Literal::object([("next", literal)]);
        }
        let (graph, root) = build(literal);
        let report = analyze(&graph, &root);
        assert!(report.stats.max_depth > 10);
        assert!(report.should_use_worker);
    }

    #[test]
    fn wide_structure_flips_worker_heuristic() {
        let fields: Vec<(String, Literal)> = (0..1200)
            .map(|i| (format!("k{i}"), Literal::from(i as i64)))
            .collect();
        let (graph, root) = build(Literal::Object {
            name: None,
            fields,
        });
        let report = analyze(&graph, &root);
        assert!(report.stats.total_items > 1000);
        assert!(report.should_use_worker);
    }

    #[test]
    fn recommendations_fire_on_thresholds() {
        let mut literal = Literal::object([("leaf", Literal::from(0))]);
        for _ in 0..17 {
            literal = Literal::object([("next", literal)]);
        }
        let (graph, root) = build(literal);
        let report = analyze(&graph, &root);
        assert!(
            report
                .recommendations
                .iter()
                .any(|r| r.kind == RecommendationKind::Warning)
        );

        let (small_graph, small_root) = build(Literal::object([("x", Literal::from(1))]));
        assert!(analyze(&small_graph, &small_root).recommendations.is_empty());
    }

    #[test]
    fn shared_nodes_count_once() {
        let mut graph = Graph::new();
        let shared = graph
            .materialize(Literal::object([("v", Literal::from(1))]))
            .unwrap();
        let shared_id = shared.as_ref_id().unwrap();
        let root_id = graph.alloc_object();
        graph.set(root_id, "a", Value::Ref(shared_id)).unwrap();
        graph.set(root_id, "b", Value::Ref(shared_id)).unwrap();

        let report = analyze(&graph, &Value::Ref(root_id));
        assert_eq!(report.stats.object_count, 2);
        assert_eq!(report.stats.circular_count, 1);
    }

    #[test]
    fn report_serde_uses_camel_case() {
        let (graph, root) = build(Literal::object([("x", Literal::from(1))]));
        let json = serde_json::to_value(analyze(&graph, &root)).unwrap();
        assert!(json["stats"]["objectCount"].is_number());
        assert!(json["shouldUseWorker"].is_boolean());
    }
}
