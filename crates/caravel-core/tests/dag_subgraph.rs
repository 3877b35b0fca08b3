//! Tests for sub-graph extraction: selected nodes plus their ancestors.

mod support;

use std::collections::HashSet;

use caravel_core::dag::{Dag, GraphError};
use support::{TestInstallable, descriptors_from};

/// wordpress1 → [shared-rds, external-ingress], external-ingress → tiller →
/// cluster, plus an unrelated unit that must not be pulled in.
fn sample_dag() -> Dag {
    let installables = vec![
        TestInstallable::new("manifest1", "cluster").arc(),
        TestInstallable::new("manifest1", "tiller")
            .with_dependencies(&["manifest1:cluster"])
            .arc(),
        TestInstallable::new("manifest1", "external-ingress")
            .with_dependencies(&["manifest1:tiller"])
            .arc(),
        TestInstallable::new("manifest1", "shared-rds").arc(),
        TestInstallable::new("manifest1", "wordpress1")
            .with_dependencies(&["manifest1:shared-rds", "manifest1:external-ingress"])
            .arc(),
        TestInstallable::new("manifest1", "unrelated").arc(),
    ];
    Dag::build(&descriptors_from(&installables)).unwrap()
}

#[test]
fn extract_pulls_in_all_ancestors_unmarked() {
    let dag = sample_dag();
    let sub = dag.extract_subgraph(&["manifest1:wordpress1"]).unwrap();

    let names: HashSet<String> = sub.node_names().into_iter().collect();
    let expected: HashSet<String> = [
        "manifest1:wordpress1",
        "manifest1:shared-rds",
        "manifest1:external-ingress",
        "manifest1:tiller",
        "manifest1:cluster",
    ]
    .into_iter()
    .map(String::from)
    .collect();
    assert_eq!(names, expected);

    for idx in sub.node_indices() {
        let node = sub.node(idx);
        assert_eq!(
            node.is_marked(),
            node.name() == "manifest1:wordpress1",
            "only the selected node should be marked, got {:?}",
            node
        );
    }

    // Edges between included nodes are preserved.
    assert!(sub.contains_edge("manifest1:cluster", "manifest1:tiller"));
    assert!(sub.contains_edge("manifest1:tiller", "manifest1:external-ingress"));
    assert!(sub.contains_edge("manifest1:external-ingress", "manifest1:wordpress1"));
    assert!(sub.contains_edge("manifest1:shared-rds", "manifest1:wordpress1"));
    assert_eq!(sub.edge_count(), 4);
}

#[test]
fn extract_errors_on_unknown_node() {
    let dag = sample_dag();
    let err = dag.extract_subgraph(&["manifest1:nonexistent"]).unwrap_err();
    assert!(
        matches!(err, GraphError::UnknownNode(ref name) if name == "manifest1:nonexistent"),
        "expected UnknownNode, got {err:?}"
    );
}

#[test]
fn extract_marked_flag_is_sticky_upgradeable() {
    let dag = sample_dag();

    // tiller is first reached as wordpress1's ancestor, then selected
    // directly; its mark must upgrade and stay.
    let sub = dag
        .extract_subgraph(&["manifest1:wordpress1", "manifest1:tiller"])
        .unwrap();
    let tiller = sub.find("manifest1:tiller").unwrap();
    assert!(sub.node(tiller).is_marked());

    // Same selection in the opposite order: selecting first, then visiting
    // as an ancestor, must not clear the mark.
    let sub = dag
        .extract_subgraph(&["manifest1:tiller", "manifest1:wordpress1"])
        .unwrap();
    let tiller = sub.find("manifest1:tiller").unwrap();
    assert!(sub.node(tiller).is_marked());
}

#[test]
fn extract_is_deterministic_in_structure() {
    let dag = sample_dag();
    let selection = ["manifest1:wordpress1", "manifest1:tiller"];

    let first = dag.extract_subgraph(&selection).unwrap();
    let second = dag.extract_subgraph(&selection).unwrap();

    let first_names: HashSet<String> = first.node_names().into_iter().collect();
    let second_names: HashSet<String> = second.node_names().into_iter().collect();
    assert_eq!(first_names, second_names);
    assert_eq!(first.edge_count(), second.edge_count());
    for name in &first_names {
        for other in &first_names {
            assert_eq!(
                first.contains_edge(name, other),
                second.contains_edge(name, other)
            );
        }
    }
}

#[test]
fn extract_deduplicates_shared_ancestors() {
    // Two selected nodes funnel into the same ancestor chain; each ancestor
    // must appear once, with edges from both paths preserved.
    let dag = sample_dag();
    let sub = dag
        .extract_subgraph(&["manifest1:wordpress1", "manifest1:external-ingress"])
        .unwrap();

    assert_eq!(sub.len(), 5);
    let ingress = sub.find("manifest1:external-ingress").unwrap();
    assert!(sub.node(ingress).is_marked());
}
