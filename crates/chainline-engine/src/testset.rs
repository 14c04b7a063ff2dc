use serde::{Deserialize, Serialize};

/// One unit of input data driving a chain execution (a testcase).
///
/// Rows are owned by whichever loadable data source is attached to the
/// session (a local array or an externally synced testset); the engine
/// only ever reads them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestsetRow {
  /// Unique within one loadable data source.
  pub id: String,
  /// Arbitrary key-value testcase data.
  pub data: serde_json::Map<String, serde_json::Value>,
}

impl TestsetRow {
  pub fn new(id: impl Into<String>, data: serde_json::Map<String, serde_json::Value>) -> Self {
    Self {
      id: id.into(),
      data,
    }
  }
}
