//! Structural traversal over the graph's petgraph backbone.

use std::collections::HashSet;

use petgraph::visit::{Bfs, Reversed};
use petgraph::Direction;

use super::Graph;
use crate::error::{WorkflowError, WorkflowResult};

/// Full upstream closure of `name`, excluding the node itself.
pub(crate) fn parent_nodes(graph: &Graph, name: &str) -> WorkflowResult<Vec<String>> {
    let start = graph
        .index_of(name)
        .ok_or_else(|| WorkflowError::NodeNotFound(name.to_string()))?;

    let dag = graph.dag();
    let reversed = Reversed(dag);
    let mut bfs = Bfs::new(reversed, start);
    let mut parents = Vec::new();
    while let Some(idx) = bfs.next(reversed) {
        if idx == start {
            continue;
        }
        parents.push(dag[idx].clone());
    }
    Ok(parents)
}

/// Entry points for a run, in node insertion order.
pub(crate) fn start_node_names(
    graph: &Graph,
    destination: Option<&str>,
) -> WorkflowResult<Vec<String>> {
    let dag = graph.dag();

    let is_root = |name: &str| {
        graph
            .index_of(name)
            .map(|idx| dag.neighbors_directed(idx, Direction::Incoming).count() == 0)
            .unwrap_or(false)
    };

    match destination {
        None => Ok(graph
            .node_names()
            .filter(|name| is_root(name))
            .map(str::to_string)
            .collect()),
        Some(dest) => {
            let mut reachable: HashSet<String> = parent_nodes(graph, dest)?.into_iter().collect();
            reachable.insert(dest.to_string());

            let roots: Vec<String> = graph
                .node_names()
                .filter(|name| reachable.contains(*name) && is_root(name))
                .map(str::to_string)
                .collect();

            // A destination inside a cycle has no root ancestor; start at it.
            if roots.is_empty() {
                Ok(vec![dest.to_string()])
            } else {
                Ok(roots)
            }
        }
    }
}
