//! In-process map store.
//!
//! Backs maps with `DashMap`s so many partition workers can hit it in
//! parallel. Counts every remote call and supports fault injection, which
//! makes it the backend for local dry runs and for tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;

use super::{MapHandle, MapStore};
use crate::error::{GridloadError, Result};

type Entries = Arc<DashMap<String, Value>>;

/// Faults to inject into upcoming calls.
///
/// Counters describe how many of the next calls misbehave.
#[derive(Debug, Default)]
pub struct Faults {
    evict_gets: AtomicU32,
    corrupt_gets: AtomicU32,
    fail_sets: AtomicU32,
    fail_get_map: AtomicBool,
    get_map_delay_ms: AtomicU64,
}

impl Faults {
    /// Next `n` gets report the key as absent.
    pub fn evict_next_gets(&self, n: u32) {
        self.evict_gets.store(n, Ordering::SeqCst);
    }

    /// Next `n` gets return a value that is not a valid element.
    pub fn corrupt_next_gets(&self, n: u32) {
        self.corrupt_gets.store(n, Ordering::SeqCst);
    }

    /// Next `n` sets fail.
    pub fn fail_next_sets(&self, n: u32) {
        self.fail_sets.store(n, Ordering::SeqCst);
    }

    pub fn fail_get_map(&self, fail: bool) {
        self.fail_get_map.store(fail, Ordering::SeqCst);
    }

    pub fn delay_get_map(&self, delay: Duration) {
        self.get_map_delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    fn take(counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

/// Number of calls made per operation.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CallCounts {
    pub get_map: u64,
    pub contains_key: u64,
    pub get: u64,
    pub set: u64,
    pub remove: u64,
    pub destroy: u64,
}

impl CallCounts {
    pub fn total(&self) -> u64 {
        self.get_map + self.contains_key + self.get + self.set + self.remove + self.destroy
    }
}

#[derive(Debug, Default)]
struct Counters {
    get_map: AtomicU64,
    contains_key: AtomicU64,
    get: AtomicU64,
    set: AtomicU64,
    remove: AtomicU64,
    destroy: AtomicU64,
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

/// `MapStore` keeping all maps in process memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryMapStore {
    maps: Arc<DashMap<String, Entries>>,
    faults: Arc<Faults>,
    counters: Arc<Counters>,
}

impl InMemoryMapStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn faults(&self) -> &Faults {
        &self.faults
    }

    pub fn calls(&self) -> CallCounts {
        let c = &self.counters;
        CallCounts {
            get_map: c.get_map.load(Ordering::Relaxed),
            contains_key: c.contains_key.load(Ordering::Relaxed),
            get: c.get.load(Ordering::Relaxed),
            set: c.set.load(Ordering::Relaxed),
            remove: c.remove.load(Ordering::Relaxed),
            destroy: c.destroy.load(Ordering::Relaxed),
        }
    }

    /// Names of all maps ever acquired, sorted.
    pub fn map_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.maps.iter().map(|entry| entry.key().clone()).collect();
        names.sort();
        names
    }

    /// Keys currently held by a map, sorted.
    pub fn keys_of(&self, map_name: &str) -> Vec<String> {
        let Some(entries) = self.maps.get(map_name).map(|e| e.value().clone()) else {
            return Vec::new();
        };
        let mut keys: Vec<_> = entries.iter().map(|entry| entry.key().clone()).collect();
        keys.sort();
        keys
    }

    pub fn size_of(&self, map_name: &str) -> usize {
        self.maps.get(map_name).map(|e| e.value().len()).unwrap_or(0)
    }
}

#[async_trait]
impl MapStore for InMemoryMapStore {
    async fn get_map(&self, name: &str) -> Result<Arc<dyn MapHandle>> {
        bump(&self.counters.get_map);

        let delay_ms = self.faults.get_map_delay_ms.load(Ordering::SeqCst);
        if delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }
        if self.faults.fail_get_map.load(Ordering::SeqCst) {
            return Err(GridloadError::Remote(format!("unable to acquire map '{}'", name)));
        }

        let entries = self.maps.entry(name.to_string()).or_default().value().clone();
        Ok(Arc::new(InMemoryMapHandle {
            name: name.to_string(),
            entries,
            faults: self.faults.clone(),
            counters: self.counters.clone(),
            destroyed: AtomicBool::new(false),
        }))
    }
}

struct InMemoryMapHandle {
    name: String,
    entries: Entries,
    faults: Arc<Faults>,
    counters: Arc<Counters>,
    destroyed: AtomicBool,
}

impl InMemoryMapHandle {
    fn ensure_live(&self) -> Result<()> {
        if self.destroyed.load(Ordering::SeqCst) {
            return Err(GridloadError::Remote(format!(
                "handle of map '{}' has been destroyed",
                self.name
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl MapHandle for InMemoryMapHandle {
    fn name(&self) -> &str {
        &self.name
    }

    async fn contains_key(&self, key: &str) -> Result<bool> {
        bump(&self.counters.contains_key);
        self.ensure_live()?;
        Ok(self.entries.contains_key(key))
    }

    async fn get(&self, key: &str) -> Result<Option<Value>> {
        bump(&self.counters.get);
        self.ensure_live()?;
        if Faults::take(&self.faults.evict_gets) {
            return Ok(None);
        }
        if Faults::take(&self.faults.corrupt_gets) {
            return Ok(Some(Value::String("corrupted".to_string())));
        }
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        bump(&self.counters.set);
        self.ensure_live()?;
        if Faults::take(&self.faults.fail_sets) {
            return Err(GridloadError::Remote(format!(
                "set of key '{}' in map '{}' rejected",
                key, self.name
            )));
        }
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<Option<Value>> {
        bump(&self.counters.remove);
        self.ensure_live()?;
        Ok(self.entries.remove(key).map(|(_, value)| value))
    }

    async fn destroy(&self) -> Result<()> {
        bump(&self.counters.destroy);
        if self.destroyed.swap(true, Ordering::SeqCst) {
            return Err(GridloadError::Remote(format!("map '{}' destroyed twice", self.name)));
        }
        Ok(())
    }
}
