// src/types.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Secondary fields of an entity. Replaced wholesale on every update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricFields {
    pub base_price: Option<f64>,
    pub volume_24h: Option<f64>,
    pub change_1h: Option<f64>,
    pub change_24h: Option<f64>,
    pub change_7d: Option<f64>,
    pub change_30d: Option<f64>,
    pub market_cap: Option<f64>,
    pub circulating_supply: Option<f64>,
    pub total_supply: Option<f64>,
    pub all_time_high: Option<f64>,
    pub all_time_high_date: Option<DateTime<Utc>>,
    pub all_time_low: Option<f64>,
    pub all_time_low_date: Option<DateTime<Utc>>,
    pub low_24h: Option<f64>,
    pub high_24h: Option<f64>,
    pub image_url: Option<String>,
    pub difficulty: Option<f64>,
    pub hashrate: Option<f64>,
    pub pool_control_1000b: Option<i64>,
    pub block_height: Option<i64>,
    pub worker_count: Option<i64>,
    pub last_block: Option<i64>,
    pub blocks_pending: Option<i64>,
    pub blocks_confirmed: Option<i64>,
    pub blocks_orphaned: Option<i64>,
    pub mempool_tx_count: Option<i64>,
    pub mempool_total_fee: Option<i64>,
    pub fees_fastest: Option<i64>,
    pub fees_30min: Option<i64>,
    pub fees_60min: Option<i64>,
    pub fees_eco: Option<i64>,
    pub fees_minimum: Option<i64>,
    pub next_block_size: Option<i64>,
    pub next_block_tx_count: Option<i64>,
    pub next_block_total_fee: Option<i64>,
    pub next_block_median_fee: Option<i64>,
    pub next_block_fee_range_min: Option<i64>,
    pub next_block_fee_range_max: Option<i64>,
}

/// Result of a successful extraction: the primary value and its field set.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub state: f64,
    pub fields: MetricFields,
}

/// Chain tunables used by the difficulty and halving projections.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChainParams {
    pub diff_multiplier: f64,
    pub block_time_minutes: f64,
    pub difficulty_window: i64,
    pub halving_window: i64,
}

pub const DEFAULT_CHAIN_DIFF_MULTIPLIER: f64 = 4_294_967_296.0;
pub const DEFAULT_CHAIN_BLOCK_TIME_MINS: f64 = 10.0;
pub const DEFAULT_CHAIN_DIFFICULTY_WINDOW: i64 = 2016;
pub const DEFAULT_CHAIN_HALVING_WINDOW: i64 = 210_000;
pub const DAY_SECONDS: i64 = 86_400;

impl Default for ChainParams {
    fn default() -> Self {
        Self {
            diff_multiplier: DEFAULT_CHAIN_DIFF_MULTIPLIER,
            block_time_minutes: DEFAULT_CHAIN_BLOCK_TIME_MINS,
            difficulty_window: DEFAULT_CHAIN_DIFFICULTY_WINDOW,
            halving_window: DEFAULT_CHAIN_HALVING_WINDOW,
        }
    }
}

#[inline]
pub fn round_to(x: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (x * factor).round() / factor
}
