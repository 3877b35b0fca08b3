//! The traversal engine: feeds eligible nodes to the worker pool and tracks
//! completions until every node in the graph is finished.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use petgraph::graph::NodeIndex;
use tokio::sync::mpsc;
use tracing::{debug, trace};

use super::Dag;

/// Which way results flow. Downward processes a node once all of its
/// dependencies are finished (install/template/output); upward once all of
/// its dependents are finished (delete).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TraversalDirection {
    Down,
    Up,
}

/// Per-traversal node state, kept apart from the graph structure so the same
/// graph can be traversed again with fresh status. `Queued` guarantees a
/// node is pushed onto the ready channel at most once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeStatus {
    Unprocessed,
    Queued,
    Finished,
}

/// Drive one traversal over the graph.
///
/// Publishes eligible nodes on `ready_tx` and consumes completion signals
/// from `done_rx`; returns once every node is finished. The status map has a
/// single writer (this task), which is the race-avoidance discipline the
/// whole engine relies on. Rather than sleeping blindly between scans, the
/// loop waits on the done channel with `poll_interval` as an upper bound, so
/// completions wake it immediately.
pub(crate) async fn walk(
    dag: Arc<Dag>,
    direction: TraversalDirection,
    poll_interval: Duration,
    ready_tx: mpsc::Sender<NodeIndex>,
    mut done_rx: mpsc::UnboundedReceiver<NodeIndex>,
) -> anyhow::Result<()> {
    let mut status: HashMap<NodeIndex, NodeStatus> = dag
        .node_indices()
        .map(|idx| (idx, NodeStatus::Unprocessed))
        .collect();

    loop {
        // Record any completions that arrived while scanning.
        while let Ok(idx) = done_rx.try_recv() {
            status.insert(idx, NodeStatus::Finished);
        }

        let ready: Vec<NodeIndex> = status
            .iter()
            .filter(|&(_, s)| *s == NodeStatus::Unprocessed)
            .map(|(&idx, _)| idx)
            .filter(|&idx| eligible(&dag, idx, direction, &status))
            .collect();
        for idx in ready {
            trace!(node = %dag.node(idx).name(), "node eligible, queueing");
            ready_tx
                .send(idx)
                .await
                .context("worker pool shut down before the traversal finished")?;
            status.insert(idx, NodeStatus::Queued);
        }

        if status.values().all(|s| *s == NodeStatus::Finished) {
            debug!(nodes = status.len(), "traversal complete");
            return Ok(());
        }

        // Wait for the next completion, re-scanning at least every interval.
        match tokio::time::timeout(poll_interval, done_rx.recv()).await {
            Ok(Some(idx)) => {
                status.insert(idx, NodeStatus::Finished);
            }
            Ok(None) => anyhow::bail!("done channel closed before the traversal finished"),
            Err(_) => {}
        }
    }
}

/// A node is eligible once all of its traversal-direction-relevant
/// neighbors are finished. Roots (or leaves, going up) qualify immediately.
fn eligible(
    dag: &Dag,
    idx: NodeIndex,
    direction: TraversalDirection,
    status: &HashMap<NodeIndex, NodeStatus>,
) -> bool {
    let finished = |n: NodeIndex| status.get(&n) == Some(&NodeStatus::Finished);
    match direction {
        TraversalDirection::Down => dag.parents(idx).all(finished),
        TraversalDirection::Up => dag.children(idx).all(finished),
    }
}
