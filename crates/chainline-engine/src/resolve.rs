//! Best-effort input resolution.
//!
//! For a downstream node, combines already-computed stage outputs and
//! the row's raw testcase data into a concrete input object, per the
//! mappings declared on the node's incoming connections. Resolution
//! never raises: an unresolvable path simply omits the target field and
//! reports the mapping as invalid, so a half-wired chain still runs as
//! far as it can.
//!
//! The primary node never passes through here — the orchestrator hands
//! it the row's raw data wholesale.

use std::collections::HashMap;

use serde_json::Value;

use chainline_graph::{ChainGraph, MappingStatus, SourcePath};

use crate::result::StageExecutionResult;
use crate::testset::TestsetRow;

/// Per-mapping resolution outcome for one run, surfaced for diagnostic
/// display (valid/invalid badges) without blocking execution.
#[derive(Debug, Clone, PartialEq)]
pub struct MappingReport {
  pub connection_id: String,
  pub target_input_key: String,
  pub source_path: SourcePath,
  pub status: MappingStatus,
}

/// A resolved input object plus the per-mapping diagnosis that produced
/// it. `inputs` contains exactly the target keys that resolved; absent
/// keys are omitted, never set to null.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResolvedInputs {
  pub inputs: serde_json::Map<String, Value>,
  pub mappings: Vec<MappingReport>,
}

/// Resolve `target_node_id`'s inputs from completed stage results and
/// the row's raw data.
///
/// Connections are visited in creation order and mappings in declared
/// order; a later mapping for the same target key wins.
pub fn resolve_inputs(
  graph: &ChainGraph,
  target_node_id: &str,
  completed: &HashMap<String, StageExecutionResult>,
  row: &TestsetRow,
) -> ResolvedInputs {
  let mut resolved = ResolvedInputs::default();

  for connection in graph.incoming(target_node_id) {
    for mapping in &connection.input_mappings {
      let value = match &mapping.source_path {
        SourcePath::Testcase(field) => row.data.get(field).cloned(),
        SourcePath::NodeOutput(path) => completed
          .get(&connection.source_node_id)
          .and_then(|stage| lookup_path(&stage_view(stage), path)),
      };

      let status = match value {
        Some(value) => {
          resolved
            .inputs
            .insert(mapping.target_input_key.clone(), value);
          MappingStatus::Valid
        }
        None => MappingStatus::Invalid,
      };

      resolved.mappings.push(MappingReport {
        connection_id: connection.id.clone(),
        target_input_key: mapping.target_input_key.clone(),
        source_path: mapping.source_path.clone(),
        status,
      });
    }
  }

  resolved
}

/// The structure a stage exposes to dotted source paths.
fn stage_view(stage: &StageExecutionResult) -> Value {
  let mut view = serde_json::Map::new();
  view.insert("output".to_string(), stage.output.clone());
  if let Some(structured) = &stage.structured_output {
    view.insert("structuredOutput".to_string(), structured.clone());
  }
  Value::Object(view)
}

/// Traverse a dotted path through objects (and array indexes) of a JSON
/// value. Returns None for any missing segment.
pub(crate) fn lookup_path(root: &Value, path: &str) -> Option<Value> {
  let mut current = root;
  for segment in path.split('.') {
    current = match current {
      Value::Object(map) => map.get(segment)?,
      Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
      _ => return None,
    };
  }
  Some(current.clone())
}
