//! The runnable execution seam.
//!
//! [`RunnableClient`] is the only place the engine performs I/O. The
//! orchestrator never decides how a runnable is invoked and the client
//! never decides ordering or mapping — it is a pure invoke-and-
//! normalize step against the external revision store and execution
//! service.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use chainline_graph::{MappingStatus, OutputConnection, RunnableKind, RunnableNode, SourcePath};

use crate::resolve::MappingReport;
use crate::result::{StageError, StageStatus};
use crate::testset::TestsetRow;

/// Current definition of a runnable, as fetched from the external
/// revision store. Schemas are opaque JSON-schema-shaped values; the
/// engine only inspects them for mapping diagnosis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunnableData {
  pub kind: RunnableKind,
  pub entity_id: String,
  pub input_schema: Value,
  pub output_schema: Value,
}

/// Normalized outcome of one runnable invocation.
///
/// Transport and remote failures are folded into `status = Error` with
/// a populated message — [`RunnableClient::invoke`] never returns
/// `Err`, so the orchestrator applies uniform error handling regardless
/// of node kind.
#[derive(Debug, Clone, PartialEq)]
pub struct StageOutcome {
  pub status: StageStatus,
  pub output: Value,
  pub structured_output: Option<Value>,
  pub error: Option<StageError>,
  pub trace_id: Option<String>,
  pub metrics: Option<Value>,
}

impl StageOutcome {
  pub fn success(output: Value) -> Self {
    Self {
      status: StageStatus::Success,
      output,
      structured_output: None,
      error: None,
      trace_id: None,
      metrics: None,
    }
  }

  pub fn failure(message: impl Into<String>) -> Self {
    Self {
      status: StageStatus::Error,
      output: Value::Null,
      structured_output: None,
      error: Some(StageError {
        message: message.into(),
        code: None,
      }),
      trace_id: None,
      metrics: None,
    }
  }
}

/// Errors from the runnable-data lookup path.
#[derive(Debug, Error)]
pub enum ClientError {
  #[error("runnable not found: {kind} {entity_id}")]
  NotFound { kind: String, entity_id: String },

  #[error("revision store unavailable: {0}")]
  Unavailable(String),
}

/// External collaborator owning runnable definitions and invocation.
#[async_trait]
pub trait RunnableClient: Send + Sync {
  /// Fetch the current definition of a runnable.
  async fn runnable_data(
    &self,
    kind: RunnableKind,
    entity_id: &str,
  ) -> Result<RunnableData, ClientError>;

  /// Invoke a runnable with resolved inputs and normalize the result.
  async fn invoke(&self, node: &RunnableNode, inputs: Value) -> StageOutcome;
}

/// Statically diagnose a connection's mappings against the source
/// runnable's declared output schema and the row's current keys.
///
/// Diagnosis is permissive: a mapping is `Invalid` only when the
/// referenced path provably cannot resolve — a missing row key, or a
/// path segment absent from a schema that does declare its properties.
/// Paths through undeclared shapes stay `Valid`; the run-time resolver
/// has the final word.
pub fn validate_mappings(
  connection: &OutputConnection,
  source: &RunnableData,
  row: &TestsetRow,
) -> Vec<MappingReport> {
  connection
    .input_mappings
    .iter()
    .map(|mapping| {
      let status = match &mapping.source_path {
        SourcePath::Testcase(field) => {
          if row.data.contains_key(field) {
            MappingStatus::Valid
          } else {
            MappingStatus::Invalid
          }
        }
        SourcePath::NodeOutput(path) => diagnose_schema_path(&source.output_schema, path),
      };
      MappingReport {
        connection_id: connection.id.clone(),
        target_input_key: mapping.target_input_key.clone(),
        source_path: mapping.source_path.clone(),
        status,
      }
    })
    .collect()
}

fn diagnose_schema_path(output_schema: &Value, path: &str) -> MappingStatus {
  // Source paths address the stage view, whose "output" branch is
  // described by the runnable's output schema. Other branches (e.g.
  // structuredOutput) carry no declared schema.
  let rest = match path.strip_prefix("output") {
    Some("") => "",
    Some(rest) => match rest.strip_prefix('.') {
      Some(rest) => rest,
      None => return MappingStatus::Valid,
    },
    None => return MappingStatus::Valid,
  };

  let mut schema = output_schema;
  for segment in rest.split('.').filter(|s| !s.is_empty()) {
    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
      // Undeclared shape; cannot prove the path wrong.
      return MappingStatus::Valid;
    };
    match properties.get(segment) {
      Some(next) => schema = next,
      None => return MappingStatus::Invalid,
    }
  }
  MappingStatus::Valid
}
