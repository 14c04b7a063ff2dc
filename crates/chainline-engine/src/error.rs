use thiserror::Error;

use chainline_graph::GraphError;

/// Errors surfaced by the orchestrator itself.
///
/// Only structural problems and cancellation land here. Runnable
/// failures never do — they are recorded as stage/row result data,
/// since a failed evaluation run is an expected business outcome.
#[derive(Debug, Error)]
pub enum EngineError {
  /// Structural graph error raised before any stage executes.
  #[error(transparent)]
  Graph(#[from] GraphError),

  /// The row's execution was cancelled.
  #[error("row execution cancelled")]
  Cancelled,
}
