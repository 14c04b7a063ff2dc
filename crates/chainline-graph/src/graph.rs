use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::connection::{InputMapping, OutputConnection};
use crate::error::GraphError;
use crate::node::RunnableNode;

/// The chain graph owned by one playground session.
///
/// Nodes are keyed by id; connections live in a Vec in creation order.
/// Creation order matters: it is the tie-break used by
/// [`execution_order`](ChainGraph::execution_order), which keeps stage
/// numbering reproducible across runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChainGraph {
  nodes: HashMap<String, RunnableNode>,
  connections: Vec<OutputConnection>,
  /// Monotonic sequence for generated connection ids.
  connection_seq: u64,
}

impl ChainGraph {
  pub fn new() -> Self {
    Self::default()
  }

  /// Attach a node to the graph.
  pub fn add_node(&mut self, node: RunnableNode) -> Result<(), GraphError> {
    if self.nodes.contains_key(&node.id) {
      return Err(GraphError::DuplicateNodeId(node.id));
    }
    self.nodes.insert(node.id.clone(), node);
    Ok(())
  }

  /// Detach a node, cascading removal of every connection that
  /// references it as source or target. Idempotent.
  pub fn remove_node(&mut self, node_id: &str) {
    self.nodes.remove(node_id);
    self
      .connections
      .retain(|c| c.source_node_id != node_id && c.target_node_id != node_id);
  }

  /// Connect one node's output to another node's inputs.
  ///
  /// The connection starts with an empty mapping list; use
  /// [`update_mappings`](ChainGraph::update_mappings) to populate it.
  pub fn add_connection(
    &mut self,
    source_node_id: &str,
    target_node_id: &str,
    source_output_key: &str,
  ) -> Result<&OutputConnection, GraphError> {
    if !self.nodes.contains_key(source_node_id) {
      return Err(GraphError::UnknownNode(source_node_id.to_string()));
    }
    if !self.nodes.contains_key(target_node_id) {
      return Err(GraphError::UnknownNode(target_node_id.to_string()));
    }
    if self
      .connections
      .iter()
      .any(|c| c.source_node_id == source_node_id && c.target_node_id == target_node_id)
    {
      return Err(GraphError::DuplicateConnection {
        source_node_id: source_node_id.to_string(),
        target_node_id: target_node_id.to_string(),
      });
    }

    self.connection_seq += 1;
    self.connections.push(OutputConnection {
      id: format!("conn-{}", self.connection_seq),
      source_node_id: source_node_id.to_string(),
      target_node_id: target_node_id.to_string(),
      source_output_key: source_output_key.to_string(),
      input_mappings: Vec::new(),
    });
    Ok(self.connections.last().unwrap())
  }

  /// Remove a connection by id. Idempotent.
  pub fn remove_connection(&mut self, connection_id: &str) {
    self.connections.retain(|c| c.id != connection_id);
  }

  /// Replace a connection's mapping list wholesale.
  pub fn update_mappings(
    &mut self,
    connection_id: &str,
    mappings: Vec<InputMapping>,
  ) -> Result<(), GraphError> {
    let connection = self
      .connections
      .iter_mut()
      .find(|c| c.id == connection_id)
      .ok_or_else(|| GraphError::UnknownConnection(connection_id.to_string()))?;
    connection.input_mappings = mappings;
    Ok(())
  }

  /// Get a node by id.
  pub fn node(&self, node_id: &str) -> Option<&RunnableNode> {
    self.nodes.get(node_id)
  }

  pub fn nodes(&self) -> &HashMap<String, RunnableNode> {
    &self.nodes
  }

  /// All connections in creation order.
  pub fn connections(&self) -> &[OutputConnection] {
    &self.connections
  }

  /// Connections targeting `node_id`, in creation order.
  pub fn incoming(&self, node_id: &str) -> impl Iterator<Item = &OutputConnection> {
    self
      .connections
      .iter()
      .filter(move |c| c.target_node_id == node_id)
  }

  /// Connections originating at `node_id`, in creation order.
  pub fn outgoing(&self, node_id: &str) -> impl Iterator<Item = &OutputConnection> {
    self
      .connections
      .iter()
      .filter(move |c| c.source_node_id == node_id)
  }
}
