// src/sources.rs
//! Cross-entity lookups keyed by asset symbol.
//!
//! Entities register the roles their family can fill at construction and
//! publish their latest value after every update tick. Shared roles keep one
//! value per contributor (hashrate takes the max, pool blocks are summed);
//! block time and last difficulty have a single authoritative source per
//! asset (the first to register).

use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock};

pub type EntityId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceRole {
    /// Network or pool hashrate, many contributors, max wins.
    Hashrate,
    /// Timestamp of the block at the previous difficulty retarget.
    BlockTime,
    /// Height of the previous difficulty retarget.
    LastDifficulty,
    /// Blocks out of the last 100 claimed by a chain control entity.
    PoolBlocks100,
    /// Blocks out of the last 1000 claimed by a chain control entity.
    PoolBlocks1000,
}

impl SourceRole {
    pub fn is_exclusive(self) -> bool {
        matches!(self, SourceRole::BlockTime | SourceRole::LastDifficulty)
    }
}

#[derive(Debug)]
struct Authoritative {
    entity: EntityId,
    value: Option<f64>,
}

type Key = (SourceRole, String);

#[derive(Debug, Default)]
struct Tables {
    shared: HashMap<Key, BTreeMap<EntityId, Option<f64>>>,
    exclusive: HashMap<Key, Authoritative>,
}

impl Tables {
    fn reported(&self, role: SourceRole, asset: &str) -> impl Iterator<Item = f64> + '_ {
        self.shared
            .get(&(role, asset_key(asset)))
            .into_iter()
            .flat_map(|m| m.values().flatten().copied())
            .filter(|v| v.is_finite())
    }

    fn exclusive_value(&self, role: SourceRole, asset: &str) -> Option<f64> {
        self.exclusive.get(&(role, asset_key(asset)))?.value
    }
}

#[derive(Debug, Default)]
pub struct SourceIndex {
    tables: RwLock<Tables>,
}

fn asset_key(asset: &str) -> String {
    asset.trim().to_lowercase()
}

impl SourceIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false when an exclusive role is already held by another entity.
    pub fn register(&self, role: SourceRole, asset: &str, entity: &str) -> bool {
        let mut t = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        let key = (role, asset_key(asset));
        if !role.is_exclusive() {
            t.shared.entry(key).or_default().entry(entity.to_string()).or_insert(None);
            return true;
        }
        match t.exclusive.get(&key) {
            Some(existing) => existing.entity == entity,
            None => {
                t.exclusive.insert(key, Authoritative { entity: entity.to_string(), value: None });
                true
            }
        }
    }

    /// Records the latest value of `entity` for `role`. Ignored for entities that
    /// never registered or that lost the exclusive role.
    pub fn publish(&self, role: SourceRole, asset: &str, entity: &str, value: Option<f64>) {
        let mut t = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        let key = (role, asset_key(asset));
        if role.is_exclusive() {
            if let Some(slot) = t.exclusive.get_mut(&key).filter(|s| s.entity == entity) {
                slot.value = value;
            }
        } else if let Some(slot) = t.shared.get_mut(&key).and_then(|m| m.get_mut(entity)) {
            *slot = value;
        }
    }

    /// Max hashrate reported by any contributor for `asset`.
    pub fn best_hashrate(&self, asset: &str) -> Option<f64> {
        let t = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        t.reported(SourceRole::Hashrate, asset).reduce(f64::max)
    }

    pub fn block_time(&self, asset: &str) -> Option<i64> {
        let t = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        t.exclusive_value(SourceRole::BlockTime, asset).map(|v| v as i64)
    }

    pub fn last_difficulty_height(&self, asset: &str) -> Option<i64> {
        let t = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        t.exclusive_value(SourceRole::LastDifficulty, asset).map(|v| v as i64)
    }

    /// Blocks of the last 100 and last 1000 claimed by every chain control
    /// entity of `asset` that currently holds a value. `None` until one has.
    pub fn pool_blocks_claimed(&self, asset: &str) -> Option<(i64, i64)> {
        let t = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        let sum = |role| {
            t.reported(role, asset)
                .map(|v| v as i64)
                .reduce(i64::saturating_add)
        };
        Some((sum(SourceRole::PoolBlocks100)?, sum(SourceRole::PoolBlocks1000).unwrap_or(0)))
    }

    pub fn hashrate_contributors(&self, asset: &str) -> Vec<EntityId> {
        let t = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        t.shared
            .get(&(SourceRole::Hashrate, asset_key(asset)))
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn best_hashrate_is_max_of_reported() {
        let idx = SourceIndex::new();
        assert_eq!(idx.best_hashrate("btc"), None);
        assert!(idx.register(SourceRole::Hashrate, "btc", "summary"));
        assert!(idx.register(SourceRole::Hashrate, "BTC", "pool"));
        assert_eq!(idx.best_hashrate("btc"), None);

        idx.publish(SourceRole::Hashrate, "btc", "summary", Some(5.0e20));
        assert_eq!(idx.best_hashrate("btc"), Some(5.0e20));
        idx.publish(SourceRole::Hashrate, "btc", "pool", Some(6.0e20));
        assert_eq!(idx.best_hashrate("btc"), Some(6.0e20));
        idx.publish(SourceRole::Hashrate, "btc", "pool", None);
        assert_eq!(idx.best_hashrate("btc"), Some(5.0e20));
        assert_eq!(idx.hashrate_contributors("btc").len(), 2);
    }

    #[test]
    fn unregistered_publish_is_ignored() {
        let idx = SourceIndex::new();
        idx.publish(SourceRole::Hashrate, "ltc", "stranger", Some(1.0));
        assert_eq!(idx.best_hashrate("ltc"), None);
    }

    #[test]
    fn exclusive_roles_keep_first_source() {
        let idx = SourceIndex::new();
        assert!(idx.register(SourceRole::BlockTime, "btc", "bt-1"));
        assert!(!idx.register(SourceRole::BlockTime, "btc", "bt-2"));
        assert!(idx.register(SourceRole::BlockTime, "btc", "bt-1"));

        idx.publish(SourceRole::BlockTime, "btc", "bt-2", Some(42.0));
        assert_eq!(idx.block_time("btc"), None);
        idx.publish(SourceRole::BlockTime, "btc", "bt-1", Some(1_713_571_767.0));
        assert_eq!(idx.block_time("btc"), Some(1_713_571_767));

        assert_eq!(idx.last_difficulty_height("btc"), None);
        assert!(idx.register(SourceRole::LastDifficulty, "btc", "summary"));
        idx.publish(SourceRole::LastDifficulty, "btc", "summary", Some(838_656.0));
        assert_eq!(idx.last_difficulty_height("btc"), Some(838_656));
    }

    #[test]
    fn pool_blocks_are_summed_over_published_contributors() {
        let idx = SourceIndex::new();
        for id in ["foundry", "antpool", "broken"] {
            assert!(idx.register(SourceRole::PoolBlocks100, "btc", id));
            assert!(idx.register(SourceRole::PoolBlocks1000, "btc", id));
        }
        assert_eq!(idx.pool_blocks_claimed("btc"), None);

        idx.publish(SourceRole::PoolBlocks100, "btc", "foundry", Some(30.0));
        idx.publish(SourceRole::PoolBlocks1000, "btc", "foundry", Some(290.0));
        idx.publish(SourceRole::PoolBlocks100, "BTC", "antpool", Some(25.0));
        idx.publish(SourceRole::PoolBlocks1000, "BTC", "antpool", Some(240.0));
        idx.publish(SourceRole::PoolBlocks100, "btc", "broken", None);
        assert_eq!(idx.pool_blocks_claimed("btc"), Some((55, 530)));
        assert_eq!(idx.pool_blocks_claimed("ltc"), None);
        assert_eq!(idx.best_hashrate("btc"), None);
    }
}
