use serde::{Deserialize, Serialize};

/// The kind of runnable a node refers to.
///
/// Dispatch is always on this tag — nodes of either kind share the same
/// graph behavior and differ only in how the external client invokes
/// them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunnableKind {
  ApplicationRevision,
  EvaluatorRevision,
}

impl RunnableKind {
  /// Stable string form, used in results and log events.
  pub fn as_str(&self) -> &'static str {
    match self {
      RunnableKind::ApplicationRevision => "application-revision",
      RunnableKind::EvaluatorRevision => "evaluator-revision",
    }
  }
}

/// A runnable attached to the chain graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunnableNode {
  /// Unique within one graph instance.
  pub id: String,
  pub kind: RunnableKind,
  /// Opaque reference into the external revision store. The graph never
  /// interprets or mutates it.
  pub entity_id: String,
  /// Display name, used for stage labels and error messages only.
  pub label: String,
  /// Distance from the primary node along the chain. Informational.
  pub depth: u32,
}
