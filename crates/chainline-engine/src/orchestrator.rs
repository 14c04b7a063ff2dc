//! Chain orchestration.
//!
//! Drives one row's full chain stage by stage: topological order is
//! computed once per run from a snapshot of the graph, each stage's
//! inputs are resolved from prior stage outputs and raw row data, and
//! incremental state is published to the [`ResultStore`] after every
//! stage boundary. The first failing stage halts the remaining chain
//! for that row; completed stages stay visible for diagnosis.
//!
//! Stages within a row are strictly sequential — stage N+1's inputs may
//! depend on stage N's output, so this loop must never be parallelized.
//! Rows are independent of each other and may run concurrently.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use chainline_graph::ChainGraph;

use crate::client::RunnableClient;
use crate::error::EngineError;
use crate::resolve::resolve_inputs;
use crate::result::{
  ChainProgress, RowExecutionResult, RowStatus, StageExecutionResult, StageStatus,
};
use crate::store::ResultStore;
use crate::testset::TestsetRow;

/// Orchestrator policy knobs.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
  /// Bound on rows executing concurrently in
  /// [`execute_all`](ChainOrchestrator::execute_all). Protects the
  /// remote execution service from a whole-testset stampede.
  pub max_concurrent_rows: usize,
}

impl Default for OrchestratorConfig {
  fn default() -> Self {
    Self {
      max_concurrent_rows: 8,
    }
  }
}

/// Executes chains for one playground session.
///
/// Constructed explicitly per session and passed by reference — it owns
/// its [`ResultStore`] and holds the [`RunnableClient`] behind which
/// all I/O happens. The orchestrator keeps no per-run state of its own,
/// so a re-run while a previous run is in flight simply supersedes it:
/// the fresh insert rotates the row's `execution_id` and the stale
/// run's remaining writes are discarded by the store.
pub struct ChainOrchestrator {
  client: Arc<dyn RunnableClient>,
  store: Arc<ResultStore>,
  config: OrchestratorConfig,
}

impl ChainOrchestrator {
  pub fn new(client: Arc<dyn RunnableClient>) -> Self {
    Self::with_config(client, OrchestratorConfig::default())
  }

  pub fn with_config(client: Arc<dyn RunnableClient>, config: OrchestratorConfig) -> Self {
    Self {
      client,
      store: Arc::new(ResultStore::new()),
      config,
    }
  }

  /// The observable per-row result store for UI consumption.
  pub fn store(&self) -> Arc<ResultStore> {
    self.store.clone()
  }

  /// Execute one row's chain starting at `primary_node_id`.
  ///
  /// Structural errors (unknown primary, cycle) are returned before
  /// anything executes; runnable failures are folded into the returned
  /// [`RowExecutionResult`]. The graph topology is snapshotted at entry
  /// — mid-run mutations of the session graph do not affect this run.
  #[instrument(
    name = "row_execute",
    skip(self, graph, row, cancel),
    fields(row_id = %row.id, primary = %primary_node_id)
  )]
  pub async fn execute_row(
    &self,
    graph: &ChainGraph,
    primary_node_id: &str,
    row: &TestsetRow,
    cancel: CancellationToken,
  ) -> Result<RowExecutionResult, EngineError> {
    let graph = graph.clone();
    let order = graph.execution_order(primary_node_id)?;
    let execution_id = uuid::Uuid::new_v4().to_string();

    info!(
      execution_id = %execution_id,
      row_id = %row.id,
      total_stages = order.len(),
      "row_started"
    );

    let mut row_result = RowExecutionResult::started(execution_id.clone(), order.len());
    self.store.insert(&row.id, row_result.clone());

    let mut completed: HashMap<String, StageExecutionResult> = HashMap::new();

    for (stage_index, node_id) in order.iter().enumerate() {
      if cancel.is_cancelled() {
        return self.finalize_cancelled(&row.id, row_result);
      }

      // The order came from this same snapshot, so the node is present.
      let node = graph.node(node_id).unwrap().clone();

      row_result.chain_progress = Some(ChainProgress {
        current_stage: stage_index,
        total_stages: order.len(),
        current_node_id: node.id.clone(),
        current_node_label: node.label.clone(),
        current_node_kind: node.kind,
      });
      self.publish(&row.id, &row_result);

      info!(
        execution_id = %execution_id,
        node_id = %node.id,
        stage_index,
        "stage_started"
      );

      // The primary stage is the chain's entry point: it receives the
      // row's raw testcase data wholesale, no mappings applied.
      let inputs = if stage_index == 0 {
        Value::Object(row.data.clone())
      } else {
        Value::Object(resolve_inputs(&graph, node_id, &completed, row).inputs)
      };

      let started_at = Utc::now();
      let outcome = tokio::select! {
        outcome = self.client.invoke(&node, inputs) => outcome,
        _ = cancel.cancelled() => {
          warn!(execution_id = %execution_id, node_id = %node.id, "row cancelled mid-stage");
          return self.finalize_cancelled(&row.id, row_result);
        }
      };

      let stage = StageExecutionResult {
        execution_id: execution_id.clone(),
        node_id: node.id.clone(),
        node_label: node.label.clone(),
        node_kind: node.kind,
        stage_index,
        status: outcome.status,
        started_at: Some(started_at),
        completed_at: Some(Utc::now()),
        output: outcome.output,
        structured_output: outcome.structured_output,
        error: outcome.error,
        trace_id: outcome.trace_id,
        metrics: outcome.metrics,
      };

      completed.insert(node.id.clone(), stage.clone());
      row_result
        .chain_results
        .insert(node.id.clone(), stage.clone());

      if stage.status == StageStatus::Error {
        error!(
          execution_id = %execution_id,
          node_id = %node.id,
          stage_index,
          error = stage.error.as_ref().map(|e| e.message.as_str()).unwrap_or("unknown"),
          "stage_failed"
        );
        return Ok(self.finalize_error(&row.id, row_result, &stage));
      }

      info!(
        execution_id = %execution_id,
        node_id = %node.id,
        stage_index,
        "stage_completed"
      );
      self.publish(&row.id, &row_result);
    }

    Ok(self.finalize_success(&row.id, row_result, &order[0]))
  }

  /// Execute every row independently. Rows run concurrently up to the
  /// configured bound with no ordering guarantee between them; each
  /// row's own stages remain strictly sequential.
  pub async fn execute_all(
    &self,
    graph: &ChainGraph,
    primary_node_id: &str,
    rows: &[TestsetRow],
    cancel: CancellationToken,
  ) -> Vec<(String, Result<RowExecutionResult, EngineError>)> {
    stream::iter(rows.iter().map(|row| {
      let cancel = cancel.clone();
      async move {
        (
          row.id.clone(),
          self.execute_row(graph, primary_node_id, row, cancel).await,
        )
      }
    }))
    .buffer_unordered(self.config.max_concurrent_rows)
    .collect()
    .await
  }

  /// Publish the run's current row state, unless a newer run owns the
  /// row by now.
  fn publish(&self, row_id: &str, row_result: &RowExecutionResult) {
    self
      .store
      .update_if_current(row_id, &row_result.execution_id, |r| {
        *r = row_result.clone();
      });
  }

  fn finalize_success(
    &self,
    row_id: &str,
    mut row_result: RowExecutionResult,
    primary_node_id: &str,
  ) -> RowExecutionResult {
    // The representative row result is the primary node's output.
    if let Some(primary) = row_result.chain_results.get(primary_node_id) {
      row_result.output = primary.output.clone();
      row_result.metrics = primary.metrics.clone();
    }
    row_result.status = RowStatus::Success;
    row_result.error = None;
    row_result.chain_progress = None;
    row_result.completed_at = Some(Utc::now());
    self.publish(row_id, &row_result);

    info!(
      execution_id = %row_result.execution_id,
      row_id = %row_id,
      "row_completed"
    );
    row_result
  }

  fn finalize_error(
    &self,
    row_id: &str,
    mut row_result: RowExecutionResult,
    failed_stage: &StageExecutionResult,
  ) -> RowExecutionResult {
    row_result.status = RowStatus::Error;
    row_result.output = failed_stage.output.clone();
    row_result.error = failed_stage.error.clone();
    row_result.metrics = failed_stage.metrics.clone();
    row_result.chain_progress = None;
    row_result.completed_at = Some(Utc::now());
    self.publish(row_id, &row_result);

    error!(
      execution_id = %row_result.execution_id,
      row_id = %row_id,
      failed_node = %failed_stage.node_id,
      "row_failed"
    );
    row_result
  }

  fn finalize_cancelled(
    &self,
    row_id: &str,
    mut row_result: RowExecutionResult,
  ) -> Result<RowExecutionResult, EngineError> {
    row_result.status = RowStatus::Cancelled;
    row_result.chain_progress = None;
    row_result.completed_at = Some(Utc::now());
    self.publish(row_id, &row_result);

    warn!(
      execution_id = %row_result.execution_id,
      row_id = %row_id,
      "row_cancelled"
    );
    Err(EngineError::Cancelled)
  }
}
