// src/cache.rs
//! Shared fetch cache.
//!
//! One slot per (metric type, disambiguator). Every slot sits behind its own
//! async mutex, and the update engine holds that lock across the due check, the
//! upstream fetch and the write back, so entities sharing a key never fetch it
//! twice in one window.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::Value;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::clock::Clock;
use crate::registry::{CacheScope, MetricType};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub metric: MetricType,
    pub disambiguator: Option<String>,
}

impl CacheKey {
    pub fn new(metric: MetricType, disambiguator: Option<String>) -> Self {
        Self { metric, disambiguator }
    }

    /// Key for an entity of `metric` polling `asset`. Global families ignore the asset.
    pub fn for_entity(metric: &MetricType, asset: &str) -> Self {
        let disambiguator = match metric.fetch_type().cache_scope() {
            CacheScope::Global => None,
            CacheScope::PerAsset | CacheScope::Private => Some(asset.trim().to_lowercase()),
        };
        Self::new(metric.clone(), disambiguator)
    }

    pub fn is_shareable(&self) -> bool {
        self.metric.fetch_type().is_shareable()
    }
}

#[derive(Debug, Clone, Default)]
pub struct CacheEntry {
    payload: Option<Value>,
    last_fetch: i64,
    min_interval_secs: Option<u64>,
}

impl CacheEntry {
    pub fn payload(&self) -> Option<&Value> {
        self.payload.as_ref()
    }

    pub fn last_fetch(&self) -> i64 {
        self.last_fetch
    }

    pub fn min_interval_secs(&self) -> Option<u64> {
        self.min_interval_secs
    }

    pub fn is_due(&self, now: i64) -> bool {
        if self.payload.is_none() {
            return true;
        }
        let interval = self.min_interval_secs.unwrap_or(0) as i64;
        now - self.last_fetch >= interval
    }

    pub fn store(&mut self, payload: Value, now: i64) {
        self.payload = Some(payload);
        self.last_fetch = now;
    }

    fn lower_interval(&mut self, secs: u64) {
        self.min_interval_secs = Some(match self.min_interval_secs {
            Some(cur) => cur.min(secs),
            None => secs,
        });
    }
}

/// Exclusive access to one shareable slot for the duration of an update.
pub struct CacheSlot {
    key: CacheKey,
    entry: OwnedMutexGuard<CacheEntry>,
}

impl CacheSlot {
    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    /// Cached payload, if it is still inside its refresh window.
    pub fn fresh_payload(&self, now: i64) -> Option<Value> {
        if self.entry.is_due(now) {
            None
        } else {
            self.entry.payload().cloned()
        }
    }

    pub fn store(&mut self, payload: Value, now: i64) {
        self.entry.store(payload, now);
    }
}

pub struct SharedFetchCache {
    clock: Arc<dyn Clock>,
    slots: Mutex<HashMap<CacheKey, Arc<AsyncMutex<CacheEntry>>>>,
}

impl SharedFetchCache {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock, slots: Mutex::new(HashMap::new()) }
    }

    fn slot(&self, key: &CacheKey) -> Arc<AsyncMutex<CacheEntry>> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.entry(key.clone()).or_default().clone()
    }

    fn existing(&self, key: &CacheKey) -> Option<Arc<AsyncMutex<CacheEntry>>> {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.get(key).cloned()
    }

    /// Records that some entity wants `key` at least every `interval_secs`.
    /// The effective interval only ever shrinks.
    pub async fn register_interest(&self, key: &CacheKey, interval_secs: u64) {
        let slot = self.slot(key);
        slot.lock().await.lower_interval(interval_secs);
    }

    pub async fn min_interval(&self, key: &CacheKey) -> Option<u64> {
        let slot = self.existing(key)?;
        let entry = slot.lock().await;
        entry.min_interval_secs()
    }

    /// Locks the slot for `key`. Private families have no slot and yield `None`.
    pub async fn lock(&self, key: &CacheKey) -> Option<CacheSlot> {
        if !key.is_shareable() {
            return None;
        }
        let entry = self.slot(key).lock_owned().await;
        Some(CacheSlot { key: key.clone(), entry })
    }

    pub async fn should_fetch(&self, key: &CacheKey) -> bool {
        if !key.is_shareable() {
            return true;
        }
        match self.existing(key) {
            None => true,
            Some(slot) => slot.lock().await.is_due(self.clock.unix()),
        }
    }

    pub async fn get(&self, key: &CacheKey) -> Option<Value> {
        let slot = self.existing(key)?;
        let entry = slot.lock().await;
        entry.payload().cloned()
    }

    /// Stores `payload` stamped with the current time. Returns false, storing
    /// nothing, for families that must not be shared.
    pub async fn put(&self, key: &CacheKey, payload: Value) -> bool {
        if !key.is_shareable() {
            return false;
        }
        let now = self.clock.unix();
        self.slot(key).lock().await.store(payload, now);
        true
    }
}
