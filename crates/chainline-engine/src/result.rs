//! Per-stage and per-row execution results.
//!
//! These records are purely derived state: the orchestrator owns them,
//! the UI reads them reactively, and nothing treats them as a source of
//! truth for row data or graph structure.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use chainline_graph::RunnableKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
  Pending,
  Running,
  Success,
  Error,
}

/// A recovered, row-scoped execution failure. Stored as data, never
/// thrown — a failed evaluation run is an expected business outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageError {
  pub message: String,
  pub code: Option<String>,
}

/// Result of one node's execution within a chain run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageExecutionResult {
  pub execution_id: String,
  pub node_id: String,
  pub node_label: String,
  pub node_kind: RunnableKind,
  /// 0-based position in the topological order.
  pub stage_index: usize,
  pub status: StageStatus,
  pub started_at: Option<DateTime<Utc>>,
  pub completed_at: Option<DateTime<Utc>>,
  /// Raw output, opaque to the engine.
  pub output: serde_json::Value,
  /// Normalized output when the runnable provides one.
  pub structured_output: Option<serde_json::Value>,
  pub error: Option<StageError>,
  /// Reference into an external trace/observability record.
  pub trace_id: Option<String>,
  /// Latency/cost/token metrics, passed through untouched.
  pub metrics: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowStatus {
  Idle,
  Pending,
  Running,
  Success,
  Error,
  Cancelled,
}

/// Snapshot of where a running chain currently is. Present only while
/// the row is running.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainProgress {
  /// 0-based index of the stage currently executing.
  pub current_stage: usize,
  pub total_stages: usize,
  pub current_node_id: String,
  pub current_node_label: String,
  pub current_node_kind: RunnableKind,
}

/// Aggregate result of one row's chain execution.
///
/// Exactly one of these exists per row at a time; a re-run overwrites
/// the previous record wholesale. Row-level `output`, `error` and
/// `metrics` are convenience copies from the primary (first) node's
/// stage result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowExecutionResult {
  pub execution_id: String,
  pub status: RowStatus,
  pub started_at: Option<DateTime<Utc>>,
  pub completed_at: Option<DateTime<Utc>>,
  /// True when more than one node participated in the run.
  pub is_chain: bool,
  pub total_stages: usize,
  pub chain_progress: Option<ChainProgress>,
  /// Completed stage results, keyed by node id, accumulated as stages
  /// finish. Kept on failure so partial chains stay diagnosable.
  pub chain_results: HashMap<String, StageExecutionResult>,
  pub output: serde_json::Value,
  pub error: Option<StageError>,
  pub metrics: Option<serde_json::Value>,
}

impl RowExecutionResult {
  /// A fresh record for a run that is about to start.
  pub fn started(execution_id: String, total_stages: usize) -> Self {
    Self {
      execution_id,
      status: RowStatus::Running,
      started_at: Some(Utc::now()),
      completed_at: None,
      is_chain: total_stages > 1,
      total_stages,
      chain_progress: None,
      chain_results: HashMap::new(),
      output: serde_json::Value::Null,
      error: None,
      metrics: None,
    }
  }
}
