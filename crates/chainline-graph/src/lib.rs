//! Chainline Graph
//!
//! This crate provides the chain graph model for chainline: the set of
//! runnable nodes (application and evaluator revisions) a playground
//! session has attached, the output-to-input connections between them,
//! and the topological execution order derived from those connections.
//!
//! The graph is pure data — it performs no I/O and knows nothing about
//! how a runnable is invoked. Mutations enforce referential integrity
//! (removing a node cascades to its connections, endpoints must exist,
//! one connection per ordered node pair); cycles are only detected when
//! an execution order is requested.

mod connection;
mod error;
mod graph;
mod node;
mod order;

pub use connection::{InputMapping, MappingStatus, OutputConnection, SourcePath};
pub use error::GraphError;
pub use graph::ChainGraph;
pub use node::{RunnableKind, RunnableNode};
