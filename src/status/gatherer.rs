//! Single-writer status aggregation.
//!
//! One gathering task owns write access to the progress table. Producers
//! send `StatusUpdate`s over an unbounded channel; `StatusUpdate::Stop`
//! writes `runnerFinished=true` as the final write and ends the task.
//! Readers may snapshot the table at any time.

use std::sync::Arc;

use dashmap::DashMap;
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::STATUS_KEY_RUNNER_FINISHED;
use crate::error::{GridloadError, Result};

/// One progress fact, or the request to finish gathering.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusUpdate {
    Update { key: String, value: Value },
    Stop,
}

impl StatusUpdate {
    pub fn new(key: impl Into<String>, value: impl Into<Value>) -> Self {
        StatusUpdate::Update {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Concurrently readable progress state of one test loop run.
#[derive(Debug, Clone, Default)]
pub struct ProgressTable {
    entries: Arc<DashMap<String, Value>>,
}

impl ProgressTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    /// Point-in-time copy of every key.
    pub fn snapshot(&self) -> Map<String, Value> {
        self.entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn store(&self, key: String, value: Value) {
        self.entries.insert(key, value);
    }
}

/// Aggregation actor feeding a `ProgressTable`.
#[derive(Debug)]
pub struct StatusGatherer {
    table: ProgressTable,
    updates: mpsc::UnboundedSender<StatusUpdate>,
    receiver: Option<mpsc::UnboundedReceiver<StatusUpdate>>,
}

impl Default for StatusGatherer {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusGatherer {
    pub fn new() -> Self {
        let (updates, receiver) = mpsc::unbounded_channel();
        Self {
            table: ProgressTable::new(),
            updates,
            receiver: Some(receiver),
        }
    }

    /// Handle for readers.
    pub fn table(&self) -> ProgressTable {
        self.table.clone()
    }

    /// Write directly, bypassing the channel.
    ///
    /// Only valid before `listen` has been called; afterwards the gathering
    /// task is the sole writer.
    pub fn insert_synchronously(&self, update: StatusUpdate) -> Result<()> {
        if self.receiver.is_none() {
            return Err(GridloadError::InvalidState(
                "synchronous status insertion after gathering started".to_string(),
            ));
        }
        if let StatusUpdate::Update { key, value } = update {
            self.table.store(key, value);
        }
        Ok(())
    }

    /// Producer handle for concurrent writers.
    pub fn sender(&self) -> mpsc::UnboundedSender<StatusUpdate> {
        self.updates.clone()
    }

    /// Queue one update for the gathering task.
    pub fn update(&self, key: impl Into<String>, value: impl Into<Value>) {
        if self.updates.send(StatusUpdate::new(key, value)).is_err() {
            log::debug!("Status gathering already stopped, dropping update");
        }
    }

    /// Spawn the gathering task. May be called once.
    pub fn listen(&mut self) -> Result<JoinHandle<()>> {
        let receiver = self
            .receiver
            .take()
            .ok_or_else(|| GridloadError::InvalidState("status gatherer is already listening".to_string()))?;
        Ok(tokio::spawn(gather(self.table.clone(), receiver)))
    }

    /// Ask the gathering task to finalize and exit.
    pub fn stop(&self) {
        if self.updates.send(StatusUpdate::Stop).is_err() {
            log::debug!("Status gathering already stopped");
        }
    }

    /// Whether the finalization write has happened.
    pub fn listening_stopped(&self) -> bool {
        matches!(self.table.get(STATUS_KEY_RUNNER_FINISHED), Some(Value::Bool(true)))
    }
}

async fn gather(table: ProgressTable, mut receiver: mpsc::UnboundedReceiver<StatusUpdate>) {
    while let Some(update) = receiver.recv().await {
        match update {
            StatusUpdate::Update { key, value } => table.store(key, value),
            StatusUpdate::Stop => {
                table.store(STATUS_KEY_RUNNER_FINISHED.to_string(), Value::Bool(true));
                receiver.close();
                return;
            }
        }
    }
    log::warn!("Status channel closed without stop request");
}
