use std::fmt;

use serde::{Deserialize, Serialize};

/// Prefix marking a source path that reads from the row's raw testcase
/// data instead of an upstream node's output.
const TESTCASE_PREFIX: &str = "testcase.";

/// Where a mapped input value comes from.
///
/// Parsed from the string convention used throughout the product:
/// `testcase.<field>` reads the named field from the row data; anything
/// else is a dotted path into the source node's stage output structure
/// (e.g. `output.text`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourcePath {
  /// A field of the row's raw testcase data.
  Testcase(String),
  /// A dotted path into the upstream stage's output view.
  NodeOutput(String),
}

impl SourcePath {
  pub fn parse(raw: &str) -> Self {
    match raw.strip_prefix(TESTCASE_PREFIX) {
      Some(field) => SourcePath::Testcase(field.to_string()),
      None => SourcePath::NodeOutput(raw.to_string()),
    }
  }
}

impl fmt::Display for SourcePath {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      SourcePath::Testcase(field) => write!(f, "{}{}", TESTCASE_PREFIX, field),
      SourcePath::NodeOutput(path) => write!(f, "{}", path),
    }
  }
}

impl Serialize for SourcePath {
  fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(self)
  }
}

impl<'de> Deserialize<'de> for SourcePath {
  fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let raw = String::deserialize(deserializer)?;
    Ok(SourcePath::parse(&raw))
  }
}

/// One field-level mapping carried by a connection: populate
/// `target_input_key` on the downstream node from `source_path`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputMapping {
  pub target_input_key: String,
  pub source_path: SourcePath,
}

/// Computed resolution status of a mapping for one run. Never stored on
/// the graph itself — `Invalid` means the path could not be resolved
/// against the current shape, and execution proceeds best-effort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MappingStatus {
  Valid,
  Invalid,
}

/// A directed edge from one node's output to another node's inputs.
///
/// At most one connection exists per ordered (source, target) pair; a
/// single connection carries all field mappings between the two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConnection {
  pub id: String,
  pub source_node_id: String,
  pub target_node_id: String,
  /// Logical name of the upstream value being exposed (e.g. "output").
  pub source_output_key: String,
  pub input_mappings: Vec<InputMapping>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_testcase_prefix() {
    let path = SourcePath::parse("testcase.country");
    assert_eq!(path, SourcePath::Testcase("country".to_string()));
    assert_eq!(path.to_string(), "testcase.country");
  }

  #[test]
  fn parses_dotted_output_path() {
    let path = SourcePath::parse("output.text");
    assert_eq!(path, SourcePath::NodeOutput("output.text".to_string()));
    assert_eq!(path.to_string(), "output.text");
  }

  #[test]
  fn source_path_round_trips_through_serde() {
    let mapping = InputMapping {
      target_input_key: "question".to_string(),
      source_path: SourcePath::parse("testcase.question"),
    };
    let json = serde_json::to_string(&mapping).unwrap();
    assert!(json.contains("\"testcase.question\""));
    let back: InputMapping = serde_json::from_str(&json).unwrap();
    assert_eq!(back, mapping);
  }
}
