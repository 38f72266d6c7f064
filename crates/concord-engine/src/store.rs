//! Run history collaborator.

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::result::ExecutionResult;

#[derive(Debug, Error)]
pub enum StoreError {
  #[error("run store backend error: {0}")]
  Backend(String),
}

/// Receives every finished run. Persistence lives outside the engine.
#[async_trait]
pub trait RunStore: Send + Sync {
  async fn save(&self, result: &ExecutionResult) -> Result<(), StoreError>;

  async fn get(&self, run_id: &str) -> Result<Option<ExecutionResult>, StoreError>;
}

#[derive(Debug, Default)]
pub struct InMemoryRunStore {
  runs: RwLock<HashMap<String, ExecutionResult>>,
}

impl InMemoryRunStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub async fn len(&self) -> usize {
    self.runs.read().await.len()
  }
}

#[async_trait]
impl RunStore for InMemoryRunStore {
  async fn save(&self, result: &ExecutionResult) -> Result<(), StoreError> {
    self
      .runs
      .write()
      .await
      .insert(result.run_id.clone(), result.clone());
    Ok(())
  }

  async fn get(&self, run_id: &str) -> Result<Option<ExecutionResult>, StoreError> {
    Ok(self.runs.read().await.get(run_id).cloned())
  }
}
