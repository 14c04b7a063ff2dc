//! Topological execution order.
//!
//! Linearizes the subgraph reachable from the primary node so that
//! every node is emitted after all of its upstream sources. Ties among
//! simultaneously-ready nodes are broken by connection creation order,
//! which keeps stage numbering identical across repeated runs of an
//! unmutated graph.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::error::GraphError;
use crate::graph::ChainGraph;

impl ChainGraph {
  /// Compute the execution order starting at `start`.
  ///
  /// Only nodes reachable from `start` via outgoing connections
  /// participate. A primary node with no outgoing connections yields a
  /// single-stage order. Fails with [`GraphError::CycleDetected`] if
  /// the reachable subgraph contains a cycle, naming the node ids that
  /// could not be ordered.
  pub fn execution_order(&self, start: &str) -> Result<Vec<String>, GraphError> {
    if self.node(start).is_none() {
      return Err(GraphError::UnknownNode(start.to_string()));
    }

    // Reachability sweep, recording discovery order for tie-breaks.
    let mut discovered: Vec<String> = vec![start.to_string()];
    let mut reachable: HashSet<String> = HashSet::from([start.to_string()]);
    let mut sweep = VecDeque::from([start.to_string()]);
    while let Some(node_id) = sweep.pop_front() {
      for connection in self.outgoing(&node_id) {
        if reachable.insert(connection.target_node_id.clone()) {
          discovered.push(connection.target_node_id.clone());
          sweep.push_back(connection.target_node_id.clone());
        }
      }
    }

    // In-degrees restricted to the reachable subgraph.
    let mut in_degree: HashMap<&str, usize> =
      discovered.iter().map(|id| (id.as_str(), 0)).collect();
    for connection in self.connections() {
      if reachable.contains(&connection.source_node_id)
        && reachable.contains(&connection.target_node_id)
      {
        *in_degree.entry(connection.target_node_id.as_str()).or_default() += 1;
      }
    }

    // Kahn's algorithm over a FIFO queue seeded in discovery order.
    let mut ready: VecDeque<&str> = discovered
      .iter()
      .map(String::as_str)
      .filter(|id| in_degree[id] == 0)
      .collect();
    let mut order = Vec::with_capacity(discovered.len());
    while let Some(node_id) = ready.pop_front() {
      order.push(node_id.to_string());
      for connection in self.outgoing(node_id) {
        let Some(degree) = in_degree.get_mut(connection.target_node_id.as_str()) else {
          continue;
        };
        *degree -= 1;
        if *degree == 0 {
          ready.push_back(connection.target_node_id.as_str());
        }
      }
    }

    if order.len() < discovered.len() {
      let ordered: HashSet<&str> = order.iter().map(String::as_str).collect();
      let node_ids = discovered
        .iter()
        .filter(|id| !ordered.contains(id.as_str()))
        .cloned()
        .collect();
      return Err(GraphError::CycleDetected { node_ids });
    }

    Ok(order)
  }
}
