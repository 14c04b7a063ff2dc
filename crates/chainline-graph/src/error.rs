use thiserror::Error;

/// Structural graph errors.
///
/// These are raised synchronously at the point of the offending
/// mutation or order computation and are meant to be surfaced to the
/// caller directly — they are never folded into execution results.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
  #[error("node id already exists: {0}")]
  DuplicateNodeId(String),

  #[error("node not found: {0}")]
  UnknownNode(String),

  #[error("connection not found: {0}")]
  UnknownConnection(String),

  #[error("connection already exists: {source_node_id} -> {target_node_id}")]
  DuplicateConnection {
    source_node_id: String,
    target_node_id: String,
  },

  #[error("cycle detected among nodes: {}", node_ids.join(", "))]
  CycleDetected { node_ids: Vec<String> },
}
