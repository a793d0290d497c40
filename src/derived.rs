// src/derived.rs
//! Best-effort formulas over stored fields. Every function returns `None` when
//! any input is missing instead of failing.

use chrono::{DateTime, Utc};
use phf::phf_map;

use crate::types::{round_to, ChainParams};

pub const RETARGET_CHANGE_MIN_PCT: f64 = -75.0;
pub const RETARGET_CHANGE_MAX_PCT: f64 = 300.0;

/// SI multipliers keyed by the lowercased first letter of a unit label.
static SI_PREFIX: phf::Map<char, f64> = phf_map! {
    'k' => 1e3,
    'm' => 1e6,
    'g' => 1e9,
    't' => 1e12,
    'p' => 1e15,
    'e' => 1e18,
    'z' => 1e21,
    'y' => 1e24,
    'r' => 1e27,
    'q' => 1e30,
};

/// "PH/s" -> 1e15, "" -> 1.
pub fn unit_multiplier(unit: Option<&str>) -> f64 {
    unit.and_then(|u| u.trim().chars().next())
        .and_then(|c| SI_PREFIX.get(&c.to_ascii_lowercase()).copied())
        .unwrap_or(1.0)
}

pub fn scale_to_unit(value: Option<f64>, unit: Option<&str>) -> Option<f64> {
    value.map(|v| round_to(v / unit_multiplier(unit), 4))
}

/// Satoshis per unit for the currency labels mempool totals can be shown in.
static SATS_PER_UNIT: phf::Map<&'static str, f64> = phf_map! {
    "btc" => 1e8,
    "₿" => 1e8,
    "mbtc" => 1e5,
    "ubtc" => 1e2,
    "µbtc" => 1e2,
    "bits" => 1e2,
    "sat" => 1.0,
    "sats" => 1.0,
};

/// "BTC" -> 1e8, "sats" or anything unknown -> 1.
pub fn currency_multiplier(unit: Option<&str>) -> f64 {
    unit.and_then(|u| SATS_PER_UNIT.get(u.trim().to_lowercase().as_str()).copied())
        .unwrap_or(1.0)
}

pub fn scale_to_currency(sats: Option<i64>, unit: Option<&str>) -> Option<f64> {
    sats.map(|v| round_to(v as f64 / currency_multiplier(unit), 4))
}

/// Whole satoshis per transaction; unknown for an empty mempool.
pub fn average_fee_per_tx(total_fee: Option<i64>, tx_count: Option<i64>) -> Option<i64> {
    total_fee?.checked_div(tx_count.filter(|n| *n > 0)?)
}

/// "12 - 301"
pub fn fee_range_combined(min: Option<i64>, max: Option<i64>) -> Option<String> {
    Some(format!("{} - {}", min?, max?))
}

/// Blocks of `window` not claimed by any tracked pool. Never negative.
pub fn unclaimed_blocks(window: i64, claimed: i64) -> i64 {
    window.saturating_sub(claimed).max(0)
}

pub fn difficulty_block_progress(height: Option<i64>, window: i64) -> Option<i64> {
    if window <= 0 {
        return None;
    }
    height.map(|h| h.rem_euclid(window))
}

pub fn difficulty_retarget_height(height: Option<i64>, window: i64) -> Option<i64> {
    let progress = difficulty_block_progress(height, window)?;
    height?.checked_add(window - progress)
}

pub fn previous_retarget_height(height: Option<i64>, window: i64) -> Option<i64> {
    difficulty_retarget_height(height, window)?.checked_sub(window)
}

pub fn block_time_seconds(
    difficulty: Option<f64>,
    diff_multiplier: f64,
    best_hashrate: Option<f64>,
) -> Option<f64> {
    match (difficulty, best_hashrate) {
        (Some(d), Some(h)) if h > 0.0 => Some((d * diff_multiplier) / h),
        _ => None,
    }
}

pub fn retarget_eta_seconds(
    height: Option<i64>,
    window: i64,
    block_time: Option<f64>,
) -> Option<i64> {
    let retarget = difficulty_retarget_height(height, window)?;
    let remaining = retarget - height?;
    let eta = remaining as f64 * block_time?;
    // `as` would saturate; a saturated eta poisons every later sum
    if !eta.is_finite() || eta.abs() >= i64::MAX as f64 {
        return None;
    }
    Some(eta as i64)
}

/// Clamped percentage the next retarget is expected to move difficulty by.
/// `actual_window` must be positive.
pub fn clamp_percent_change(expected_window: f64, actual_window: f64) -> Option<f64> {
    if actual_window <= 0.0 || !actual_window.is_finite() || !expected_window.is_finite() {
        return None;
    }
    let pct = ((expected_window - actual_window) / actual_window) * 100.0;
    Some(round_to(
        pct.clamp(RETARGET_CHANGE_MIN_PCT, RETARGET_CHANGE_MAX_PCT),
        2,
    ))
}

pub fn retarget_percent_change(
    eta_seconds: Option<i64>,
    last_retarget_ts: Option<i64>,
    now: i64,
    block_time_minutes: f64,
    window: i64,
) -> Option<f64> {
    let eta = eta_seconds?;
    let last = last_retarget_ts?;
    let expected = (block_time_minutes * 60.0) * window as f64;
    let actual = now.checked_add(eta)?.checked_sub(last)? as f64;
    clamp_percent_change(expected, actual)
}

pub fn retarget_estimated_difficulty(difficulty: Option<f64>, pct: Option<f64>) -> Option<f64> {
    Some(round_to(difficulty? * (1.0 + pct? / 100.0), 2))
}

pub fn all_time_high_distance(all_time_high: Option<f64>, price: Option<f64>) -> Option<f64> {
    Some(round_to(all_time_high? - price?, 2))
}

pub fn pool_control_percentage(blocks_1000: Option<i64>) -> Option<f64> {
    blocks_1000.map(|n| round_to((n as f64 / 1000.0) * 100.0, 4))
}

pub fn days_since(date: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Option<i64> {
    date.map(|d| (now - d).num_days())
}

/// Inputs for the retarget chain of a chain-summary entity.
#[derive(Debug, Clone, Copy)]
pub struct RetargetInputs {
    pub height: Option<i64>,
    pub difficulty: Option<f64>,
    pub best_hashrate: Option<f64>,
    pub last_retarget_ts: Option<i64>,
    pub now: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RetargetProjection {
    pub block_progress: Option<i64>,
    pub retarget_height: Option<i64>,
    pub previous_retarget_height: Option<i64>,
    pub block_time: Option<f64>,
    pub eta_seconds: Option<i64>,
    pub percent_change: Option<f64>,
    pub estimated_difficulty: Option<f64>,
}

impl RetargetProjection {
    pub fn compute(inp: &RetargetInputs, params: &ChainParams) -> Self {
        let w = params.difficulty_window;
        let block_time = block_time_seconds(inp.difficulty, params.diff_multiplier, inp.best_hashrate);
        let eta_seconds = retarget_eta_seconds(inp.height, w, block_time);
        let percent_change = retarget_percent_change(
            eta_seconds,
            inp.last_retarget_ts,
            inp.now,
            params.block_time_minutes,
            w,
        );
        Self {
            block_progress: difficulty_block_progress(inp.height, w),
            retarget_height: difficulty_retarget_height(inp.height, w),
            previous_retarget_height: previous_retarget_height(inp.height, w),
            block_time,
            eta_seconds,
            percent_change,
            estimated_difficulty: retarget_estimated_difficulty(inp.difficulty, percent_change),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HalvingProjection {
    pub block_progress: Option<i64>,
    pub blocks_remaining: Option<i64>,
    pub next_height: Option<i64>,
    pub total_to_date: Option<i64>,
}

impl HalvingProjection {
    pub fn compute(height: Option<i64>, window: i64) -> Self {
        let (Some(h), true) = (height, window > 0) else {
            return Self::default();
        };
        let progress = h.rem_euclid(window);
        Self {
            block_progress: Some(progress),
            blocks_remaining: Some(window - progress),
            next_height: h.checked_add(window - progress),
            total_to_date: Some(h.div_euclid(window)),
        }
    }
}
