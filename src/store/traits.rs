//! Remote map access traits.
//!
//! The grid client lives outside this crate; it is consumed through these
//! two traits. Values travel as `serde_json::Value`.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

/// Hands out handles to named remote maps.
#[async_trait]
pub trait MapStore: Send + Sync {
    /// Acquire a handle to the map called `name`, creating it remotely if needed.
    async fn get_map(&self, name: &str) -> Result<Arc<dyn MapHandle>>;
}

/// Client-side handle to one remote map.
#[async_trait]
pub trait MapHandle: Send + Sync {
    fn name(&self) -> &str;

    async fn contains_key(&self, key: &str) -> Result<bool>;

    async fn get(&self, key: &str) -> Result<Option<Value>>;

    async fn set(&self, key: &str, value: Value) -> Result<()>;

    /// Remove a key, returning the previous value.
    async fn remove(&self, key: &str) -> Result<Option<Value>>;

    /// Release the handle. Further calls on it fail.
    async fn destroy(&self) -> Result<()>;
}
