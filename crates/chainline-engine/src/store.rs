//! Observable per-row result store.
//!
//! One store exists per orchestrator (per playground session) and is
//! constructed explicitly — never a module-level singleton. Writes are
//! last-writer-wins per row id; a read immediately after a completed
//! write sees that write. Subscribers receive a [`RowUpdate`] for every
//! applied write and re-read the store for the full record.

use std::collections::HashMap;
use std::sync::RwLock;

use tokio::sync::broadcast;

use crate::result::{RowExecutionResult, RowStatus};

const UPDATE_CHANNEL_CAPACITY: usize = 256;

/// Notification that a row's result changed.
#[derive(Debug, Clone)]
pub struct RowUpdate {
  pub row_id: String,
  pub execution_id: String,
  pub status: RowStatus,
}

pub struct ResultStore {
  rows: RwLock<HashMap<String, RowExecutionResult>>,
  updates: broadcast::Sender<RowUpdate>,
}

impl ResultStore {
  pub fn new() -> Self {
    let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
    Self {
      rows: RwLock::new(HashMap::new()),
      updates,
    }
  }

  /// Snapshot of a row's current result.
  pub fn row(&self, row_id: &str) -> Option<RowExecutionResult> {
    self.rows.read().unwrap().get(row_id).cloned()
  }

  /// Snapshot of every row result.
  pub fn all(&self) -> HashMap<String, RowExecutionResult> {
    self.rows.read().unwrap().clone()
  }

  /// Subscribe to row updates. Lagging receivers miss intermediate
  /// updates but can always re-read the store.
  pub fn subscribe(&self) -> broadcast::Receiver<RowUpdate> {
    self.updates.subscribe()
  }

  /// Replace a row's result unconditionally. Used at run start, where a
  /// new execution discards whatever the previous run left behind.
  pub fn insert(&self, row_id: &str, result: RowExecutionResult) {
    let update = RowUpdate {
      row_id: row_id.to_string(),
      execution_id: result.execution_id.clone(),
      status: result.status,
    };
    self.rows.write().unwrap().insert(row_id.to_string(), result);
    let _ = self.updates.send(update);
  }

  /// Apply `f` to a row's result only if it still belongs to
  /// `execution_id`.
  ///
  /// This is the stale-write guard: once a re-run has inserted a fresh
  /// record, updates from the superseded run no longer match and are
  /// discarded. Returns whether the update was applied.
  pub fn update_if_current<F>(&self, row_id: &str, execution_id: &str, f: F) -> bool
  where
    F: FnOnce(&mut RowExecutionResult),
  {
    let update = {
      let mut rows = self.rows.write().unwrap();
      match rows.get_mut(row_id) {
        Some(result) if result.execution_id == execution_id => {
          f(result);
          Some(RowUpdate {
            row_id: row_id.to_string(),
            execution_id: result.execution_id.clone(),
            status: result.status,
          })
        }
        _ => None,
      }
    };

    match update {
      Some(update) => {
        let _ = self.updates.send(update);
        true
      }
      None => false,
    }
  }

  /// Drop a row's result (e.g. when its source row is removed).
  pub fn remove(&self, row_id: &str) {
    self.rows.write().unwrap().remove(row_id);
  }
}

impl Default for ResultStore {
  fn default() -> Self {
    Self::new()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn insert_overwrites_previous_run() {
    let store = ResultStore::new();
    store.insert("row-1", RowExecutionResult::started("exec-1".to_string(), 3));
    store.insert("row-1", RowExecutionResult::started("exec-2".to_string(), 1));

    let result = store.row("row-1").unwrap();
    assert_eq!(result.execution_id, "exec-2");
    assert_eq!(result.total_stages, 1);
    assert!(result.chain_results.is_empty());
  }

  #[test]
  fn stale_execution_updates_are_discarded() {
    let store = ResultStore::new();
    store.insert("row-1", RowExecutionResult::started("exec-1".to_string(), 2));
    store.insert("row-1", RowExecutionResult::started("exec-2".to_string(), 2));

    let applied = store.update_if_current("row-1", "exec-1", |r| {
      r.status = RowStatus::Success;
    });

    assert!(!applied);
    assert_eq!(store.row("row-1").unwrap().status, RowStatus::Running);
  }

  #[test]
  fn current_execution_updates_are_applied_and_broadcast() {
    let store = ResultStore::new();
    let mut updates = store.subscribe();
    store.insert("row-1", RowExecutionResult::started("exec-1".to_string(), 1));

    let applied = store.update_if_current("row-1", "exec-1", |r| {
      r.status = RowStatus::Success;
    });
    assert!(applied);
    assert_eq!(store.row("row-1").unwrap().status, RowStatus::Success);

    let first = updates.try_recv().unwrap();
    assert_eq!(first.status, RowStatus::Running);
    let second = updates.try_recv().unwrap();
    assert_eq!(second.status, RowStatus::Success);
  }
}
