//! Chainline Engine
//!
//! Executes one playground chain per testset row: computes the
//! topological stage order from the session's [`ChainGraph`], resolves
//! each stage's inputs from upstream outputs and raw row data, invokes
//! runnables through the [`RunnableClient`] seam, and publishes
//! per-stage and per-row results to an observable [`ResultStore`].
//!
//! The engine is an in-process library with no network surface of its
//! own; all I/O happens behind [`RunnableClient`], which callers
//! implement against their execution service.
//!
//! [`ChainGraph`]: chainline_graph::ChainGraph

mod client;
mod error;
mod orchestrator;
mod resolve;
mod result;
mod store;
mod testset;

pub use client::{ClientError, RunnableClient, RunnableData, StageOutcome, validate_mappings};
pub use error::EngineError;
pub use orchestrator::{ChainOrchestrator, OrchestratorConfig};
pub use resolve::{MappingReport, ResolvedInputs, resolve_inputs};
pub use result::{
  ChainProgress, RowExecutionResult, RowStatus, StageError, StageExecutionResult, StageStatus,
};
pub use store::{ResultStore, RowUpdate};
pub use testset::TestsetRow;
