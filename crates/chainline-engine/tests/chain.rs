//! Integration tests for chain orchestration against a scripted client.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

use chainline_engine::{
  ChainOrchestrator, ClientError, EngineError, RowStatus, RunnableClient, RunnableData,
  StageOutcome, StageStatus, TestsetRow,
};
use chainline_graph::{ChainGraph, GraphError, InputMapping, RunnableKind, RunnableNode, SourcePath};

/// Scripted client: one fixed outcome per node id, recording every
/// invocation. An optional delay makes cancellation races testable.
struct MockClient {
  outcomes: HashMap<String, StageOutcome>,
  delay: Option<Duration>,
  invocations: Mutex<Vec<(String, Value)>>,
}

impl MockClient {
  fn new() -> Self {
    Self {
      outcomes: HashMap::new(),
      delay: None,
      invocations: Mutex::new(Vec::new()),
    }
  }

  fn succeed(mut self, node_id: &str, output: Value) -> Self {
    self
      .outcomes
      .insert(node_id.to_string(), StageOutcome::success(output));
    self
  }

  fn fail(mut self, node_id: &str, message: &str) -> Self {
    self
      .outcomes
      .insert(node_id.to_string(), StageOutcome::failure(message));
    self
  }

  fn with_delay(mut self, delay: Duration) -> Self {
    self.delay = Some(delay);
    self
  }

  fn invoked_node_ids(&self) -> Vec<String> {
    self
      .invocations
      .lock()
      .unwrap()
      .iter()
      .map(|(id, _)| id.clone())
      .collect()
  }

  fn inputs_for(&self, node_id: &str) -> Option<Value> {
    self
      .invocations
      .lock()
      .unwrap()
      .iter()
      .find(|(id, _)| id == node_id)
      .map(|(_, inputs)| inputs.clone())
  }
}

#[async_trait]
impl RunnableClient for MockClient {
  async fn runnable_data(
    &self,
    kind: RunnableKind,
    entity_id: &str,
  ) -> Result<RunnableData, ClientError> {
    Ok(RunnableData {
      kind,
      entity_id: entity_id.to_string(),
      input_schema: json!({}),
      output_schema: json!({}),
    })
  }

  async fn invoke(&self, node: &RunnableNode, inputs: Value) -> StageOutcome {
    self
      .invocations
      .lock()
      .unwrap()
      .push((node.id.clone(), inputs));
    if let Some(delay) = self.delay {
      tokio::time::sleep(delay).await;
    }
    self
      .outcomes
      .get(&node.id)
      .cloned()
      .unwrap_or_else(|| StageOutcome::failure(format!("no scripted outcome for '{}'", node.id)))
  }
}

fn node(id: &str, kind: RunnableKind, depth: u32) -> RunnableNode {
  RunnableNode {
    id: id.to_string(),
    kind,
    entity_id: format!("rev-{}", id),
    label: id.to_uppercase(),
    depth,
  }
}

fn mapping(target: &str, path: &str) -> InputMapping {
  InputMapping {
    target_input_key: target.to_string(),
    source_path: SourcePath::parse(path),
  }
}

fn row(id: &str, data: Value) -> TestsetRow {
  let Value::Object(map) = data else {
    panic!("row data must be an object");
  };
  TestsetRow::new(id, map)
}

/// app -> eval with `input = output.text`.
fn two_node_graph() -> ChainGraph {
  let mut graph = ChainGraph::new();
  graph
    .add_node(node("app", RunnableKind::ApplicationRevision, 0))
    .unwrap();
  graph
    .add_node(node("eval", RunnableKind::EvaluatorRevision, 1))
    .unwrap();
  let id = graph
    .add_connection("app", "eval", "output")
    .unwrap()
    .id
    .clone();
  graph
    .update_mappings(&id, vec![mapping("input", "output.text")])
    .unwrap();
  graph
}

#[tokio::test]
async fn single_node_run_gets_raw_row_data() {
  let client = Arc::new(MockClient::new().succeed("app", json!({"text": "answer"})));
  let orchestrator = ChainOrchestrator::new(client.clone());

  let mut graph = ChainGraph::new();
  graph
    .add_node(node("app", RunnableKind::ApplicationRevision, 0))
    .unwrap();
  let row = row("row-1", json!({"question": "q1", "country": "France"}));

  let result = orchestrator
    .execute_row(&graph, "app", &row, CancellationToken::new())
    .await
    .unwrap();

  assert_eq!(result.status, RowStatus::Success);
  assert!(!result.is_chain);
  assert_eq!(result.total_stages, 1);
  assert_eq!(result.output, json!({"text": "answer"}));
  assert!(result.chain_progress.is_none());
  // The primary stage receives the testcase wholesale.
  assert_eq!(
    client.inputs_for("app").unwrap(),
    json!({"question": "q1", "country": "France"})
  );
}

#[tokio::test]
async fn two_node_chain_resolves_upstream_output() {
  let client = Arc::new(
    MockClient::new()
      .succeed("app", json!({"text": "hello"}))
      .succeed("eval", json!({"score": 1.0})),
  );
  let orchestrator = ChainOrchestrator::new(client.clone());
  let graph = two_node_graph();
  let row = row("row-1", json!({"question": "q1"}));

  let result = orchestrator
    .execute_row(&graph, "app", &row, CancellationToken::new())
    .await
    .unwrap();

  assert_eq!(result.status, RowStatus::Success);
  assert!(result.is_chain);
  assert_eq!(client.invoked_node_ids(), vec!["app", "eval"]);
  assert_eq!(client.inputs_for("eval").unwrap(), json!({"input": "hello"}));
  // Row-level output is the primary node's, not the last stage's.
  assert_eq!(result.output, json!({"text": "hello"}));
  assert_eq!(result.chain_results["eval"].output, json!({"score": 1.0}));
  assert_eq!(result.chain_results["eval"].stage_index, 1);
}

#[tokio::test]
async fn chain_halts_on_first_stage_failure() {
  // app -> e1 -> e2, with e1 scripted to fail.
  let client = Arc::new(
    MockClient::new()
      .succeed("app", json!({"text": "ok"}))
      .fail("e1", "evaluator exploded")
      .succeed("e2", json!({"score": 0.0})),
  );
  let orchestrator = ChainOrchestrator::new(client.clone());

  let mut graph = ChainGraph::new();
  graph
    .add_node(node("app", RunnableKind::ApplicationRevision, 0))
    .unwrap();
  graph
    .add_node(node("e1", RunnableKind::EvaluatorRevision, 1))
    .unwrap();
  graph
    .add_node(node("e2", RunnableKind::EvaluatorRevision, 2))
    .unwrap();
  graph.add_connection("app", "e1", "output").unwrap();
  graph.add_connection("e1", "e2", "output").unwrap();
  let row = row("row-1", json!({}));

  let result = orchestrator
    .execute_row(&graph, "app", &row, CancellationToken::new())
    .await
    .unwrap();

  assert_eq!(result.status, RowStatus::Error);
  assert_eq!(result.error.as_ref().unwrap().message, "evaluator exploded");
  // Stage 1 succeeded and stays visible; stage 3 never ran.
  assert_eq!(result.chain_results["app"].status, StageStatus::Success);
  assert_eq!(result.chain_results["e1"].status, StageStatus::Error);
  assert!(!result.chain_results.contains_key("e2"));
  assert_eq!(client.invoked_node_ids(), vec!["app", "e1"]);
}

#[tokio::test]
async fn cycle_fails_before_any_execution() {
  let client = Arc::new(MockClient::new());
  let orchestrator = ChainOrchestrator::new(client.clone());

  let mut graph = two_node_graph();
  graph.add_connection("eval", "app", "output").unwrap();
  let row = row("row-1", json!({}));

  let err = orchestrator
    .execute_row(&graph, "app", &row, CancellationToken::new())
    .await
    .unwrap_err();

  assert!(matches!(
    err,
    EngineError::Graph(GraphError::CycleDetected { .. })
  ));
  assert!(client.invoked_node_ids().is_empty());
  // No partial result was recorded.
  assert!(orchestrator.store().row("row-1").is_none());
}

#[tokio::test]
async fn rerun_discards_previous_result() {
  let client = Arc::new(
    MockClient::new()
      .succeed("app", json!({"text": "first"}))
      .succeed("eval", json!({"score": 0.5})),
  );
  let orchestrator = ChainOrchestrator::new(client.clone());
  let mut graph = two_node_graph();
  let row = row("row-1", json!({}));

  let first = orchestrator
    .execute_row(&graph, "app", &row, CancellationToken::new())
    .await
    .unwrap();
  assert_eq!(first.total_stages, 2);

  // The user detaches the evaluator, then re-runs the same row.
  graph.remove_node("eval");
  let second = orchestrator
    .execute_row(&graph, "app", &row, CancellationToken::new())
    .await
    .unwrap();

  assert_ne!(second.execution_id, first.execution_id);
  let stored = orchestrator.store().row("row-1").unwrap();
  assert_eq!(stored.execution_id, second.execution_id);
  assert_eq!(stored.total_stages, 1);
  // No stale stage from the old topology leaks into the new record.
  assert!(!stored.chain_results.contains_key("eval"));
}

#[tokio::test]
async fn execute_all_runs_rows_independently() {
  let client = Arc::new(
    MockClient::new()
      .succeed("app", json!({"text": "out"}))
      .succeed("eval", json!({"score": 1.0})),
  );
  let orchestrator = ChainOrchestrator::new(client.clone());
  let graph = two_node_graph();
  let rows: Vec<TestsetRow> = (1..=3)
    .map(|i| row(&format!("row-{}", i), json!({"question": format!("q{}", i)})))
    .collect();

  let results = orchestrator
    .execute_all(&graph, "app", &rows, CancellationToken::new())
    .await;

  assert_eq!(results.len(), 3);
  let mut execution_ids = Vec::new();
  for (row_id, result) in results {
    let result = result.unwrap();
    assert_eq!(result.status, RowStatus::Success, "row {}", row_id);
    // Stage numbering is per-row, not shared.
    assert_eq!(result.chain_results["app"].stage_index, 0);
    assert_eq!(result.chain_results["eval"].stage_index, 1);
    execution_ids.push(result.execution_id);
  }
  execution_ids.sort();
  execution_ids.dedup();
  assert_eq!(execution_ids.len(), 3);
  assert_eq!(orchestrator.store().all().len(), 3);
}

#[tokio::test]
async fn cancellation_marks_row_cancelled_and_discards_outcome() {
  let client = Arc::new(
    MockClient::new()
      .succeed("app", json!({"text": "late"}))
      .with_delay(Duration::from_millis(200)),
  );
  let orchestrator = ChainOrchestrator::new(client.clone());

  let mut graph = ChainGraph::new();
  graph
    .add_node(node("app", RunnableKind::ApplicationRevision, 0))
    .unwrap();
  let row = row("row-1", json!({}));

  let cancel = CancellationToken::new();
  let run = orchestrator.execute_row(&graph, "app", &row, cancel.clone());
  let (result, _) = tokio::join!(run, async {
    tokio::time::sleep(Duration::from_millis(20)).await;
    cancel.cancel();
  });

  assert!(matches!(result, Err(EngineError::Cancelled)));
  let stored = orchestrator.store().row("row-1").unwrap();
  assert_eq!(stored.status, RowStatus::Cancelled);
  assert!(stored.chain_progress.is_none());
  // The in-flight stage's outcome was discarded, not recorded.
  assert!(stored.chain_results.is_empty());
}

#[tokio::test]
async fn superseded_run_cannot_clobber_its_successor() {
  let slow = Arc::new(
    MockClient::new()
      .succeed("app", json!({"text": "slow"}))
      .with_delay(Duration::from_millis(120)),
  );
  let orchestrator = ChainOrchestrator::new(slow.clone());

  let mut graph = ChainGraph::new();
  graph
    .add_node(node("app", RunnableKind::ApplicationRevision, 0))
    .unwrap();
  let row = row("row-1", json!({}));

  // First run starts, then a re-run supersedes it while the first is
  // still awaiting its stage.
  let first = orchestrator.execute_row(&graph, "app", &row, CancellationToken::new());
  let second = async {
    tokio::time::sleep(Duration::from_millis(30)).await;
    orchestrator
      .execute_row(&graph, "app", &row, CancellationToken::new())
      .await
  };
  let (first, second) = tokio::join!(first, second);

  let first = first.unwrap();
  let second = second.unwrap();
  assert_ne!(first.execution_id, second.execution_id);

  // The second run inserted a fresh record; the first run's later
  // writes were stale and must not have been applied.
  let stored = orchestrator.store().row("row-1").unwrap();
  assert_eq!(stored.execution_id, second.execution_id);
  assert_eq!(stored.status, RowStatus::Success);
}

#[tokio::test]
async fn subscribers_see_running_then_terminal_status() {
  let client = Arc::new(MockClient::new().succeed("app", json!({"text": "ok"})));
  let orchestrator = ChainOrchestrator::new(client.clone());
  let store = orchestrator.store();
  let mut updates = store.subscribe();

  let mut graph = ChainGraph::new();
  graph
    .add_node(node("app", RunnableKind::ApplicationRevision, 0))
    .unwrap();
  let row = row("row-1", json!({}));

  orchestrator
    .execute_row(&graph, "app", &row, CancellationToken::new())
    .await
    .unwrap();

  let mut statuses = Vec::new();
  while let Ok(update) = updates.try_recv() {
    assert_eq!(update.row_id, "row-1");
    statuses.push(update.status);
  }
  assert_eq!(statuses.first(), Some(&RowStatus::Running));
  assert_eq!(statuses.last(), Some(&RowStatus::Success));
}
