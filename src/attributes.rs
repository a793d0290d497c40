// src/attributes.rs
//! Named attributes exposed per entity, and which families expose which.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

use crate::registry::FetchType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AttrKey {
    LastUpdate,
    BasePrice,
    Volume24h,
    Change1h,
    Change24h,
    Change7d,
    Change30d,
    MarketCap,
    CirculatingSupply,
    TotalSupply,
    AllTimeHigh,
    AllTimeLow,
    Low24h,
    High24h,
    ImageUrl,
    Difficulty,
    Hashrate,
    PoolControl1000b,
    BlockHeight,
    WorkerCount,
    LastBlock,
    BlocksPending,
    BlocksConfirmed,
    BlocksOrphaned,
    MempoolTxCount,
    MempoolTotalFee,
    MempoolFeesFastest,
    MempoolFees30min,
    MempoolFees60min,
    MempoolFeesEco,
    MempoolFeesMinimum,
    MempoolNextBlockSize,
    MempoolNextBlockTxCount,
    MempoolNextBlockTotalFee,
    MempoolNextBlockMedianFee,
    MempoolNextBlockFeeRangeMin,
    MempoolNextBlockFeeRangeMax,
    // derived
    BlockTimeInSeconds,
    DifficultyBlockProgress,
    DifficultyRetargetHeight,
    DifficultyPreviousRetargetHeight,
    DifficultyRetargetSeconds,
    DifficultyRetargetPercentChange,
    DifficultyRetargetEstimatedDiff,
    DifficultyCalc,
    HalvingBlockProgress,
    HalvingBlocksRemaining,
    NextHalvingHeight,
    TotalHalvingsToDate,
    HashrateCalc,
    AllTimeHighDistance,
    DaysSinceAllTimeHigh,
    DaysSinceAllTimeLow,
    PoolControl1000bPerc,
    MempoolSizeCalc,
    MempoolTotalFeeCalc,
    MempoolAverageFeePerTx,
    MempoolNextBlockSizeCalc,
    MempoolNextBlockTotalFeeCalc,
    MempoolNextBlockFeeRangeCombined,
}

impl AttrKey {
    pub const ALL: [AttrKey; 60] = [
        AttrKey::LastUpdate,
        AttrKey::BasePrice,
        AttrKey::Volume24h,
        AttrKey::Change1h,
        AttrKey::Change24h,
        AttrKey::Change7d,
        AttrKey::Change30d,
        AttrKey::MarketCap,
        AttrKey::CirculatingSupply,
        AttrKey::TotalSupply,
        AttrKey::AllTimeHigh,
        AttrKey::AllTimeLow,
        AttrKey::Low24h,
        AttrKey::High24h,
        AttrKey::ImageUrl,
        AttrKey::Difficulty,
        AttrKey::Hashrate,
        AttrKey::PoolControl1000b,
        AttrKey::BlockHeight,
        AttrKey::WorkerCount,
        AttrKey::LastBlock,
        AttrKey::BlocksPending,
        AttrKey::BlocksConfirmed,
        AttrKey::BlocksOrphaned,
        AttrKey::MempoolTxCount,
        AttrKey::MempoolTotalFee,
        AttrKey::MempoolFeesFastest,
        AttrKey::MempoolFees30min,
        AttrKey::MempoolFees60min,
        AttrKey::MempoolFeesEco,
        AttrKey::MempoolFeesMinimum,
        AttrKey::MempoolNextBlockSize,
        AttrKey::MempoolNextBlockTxCount,
        AttrKey::MempoolNextBlockTotalFee,
        AttrKey::MempoolNextBlockMedianFee,
        AttrKey::MempoolNextBlockFeeRangeMin,
        AttrKey::MempoolNextBlockFeeRangeMax,
        AttrKey::BlockTimeInSeconds,
        AttrKey::DifficultyBlockProgress,
        AttrKey::DifficultyRetargetHeight,
        AttrKey::DifficultyPreviousRetargetHeight,
        AttrKey::DifficultyRetargetSeconds,
        AttrKey::DifficultyRetargetPercentChange,
        AttrKey::DifficultyRetargetEstimatedDiff,
        AttrKey::DifficultyCalc,
        AttrKey::HalvingBlockProgress,
        AttrKey::HalvingBlocksRemaining,
        AttrKey::NextHalvingHeight,
        AttrKey::TotalHalvingsToDate,
        AttrKey::HashrateCalc,
        AttrKey::AllTimeHighDistance,
        AttrKey::DaysSinceAllTimeHigh,
        AttrKey::DaysSinceAllTimeLow,
        AttrKey::PoolControl1000bPerc,
        AttrKey::MempoolSizeCalc,
        AttrKey::MempoolTotalFeeCalc,
        AttrKey::MempoolAverageFeePerTx,
        AttrKey::MempoolNextBlockSizeCalc,
        AttrKey::MempoolNextBlockTotalFeeCalc,
        AttrKey::MempoolNextBlockFeeRangeCombined,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AttrKey::LastUpdate => "last_update",
            AttrKey::BasePrice => "baseprice",
            AttrKey::Volume24h => "24h_volume",
            AttrKey::Change1h => "1h_change",
            AttrKey::Change24h => "24h_change",
            AttrKey::Change7d => "7d_change",
            AttrKey::Change30d => "30d_change",
            AttrKey::MarketCap => "market_cap",
            AttrKey::CirculatingSupply => "circulating_supply",
            AttrKey::TotalSupply => "total_supply",
            AttrKey::AllTimeHigh => "all_time_high",
            AttrKey::AllTimeLow => "all_time_low",
            AttrKey::Low24h => "24h_low",
            AttrKey::High24h => "24h_high",
            AttrKey::ImageUrl => "image_url",
            AttrKey::Difficulty => "difficulty",
            AttrKey::Hashrate => "hashrate",
            AttrKey::PoolControl1000b => "pool_control_1000b",
            AttrKey::BlockHeight => "block_height",
            AttrKey::WorkerCount => "worker_count",
            AttrKey::LastBlock => "last_block",
            AttrKey::BlocksPending => "blocks_pending",
            AttrKey::BlocksConfirmed => "blocks_confirmed",
            AttrKey::BlocksOrphaned => "blocks_orphaned",
            AttrKey::MempoolTxCount => "mempool_tx_count",
            AttrKey::MempoolTotalFee => "mempool_total_fee",
            AttrKey::MempoolFeesFastest => "mempool_fees_fastest",
            AttrKey::MempoolFees30min => "mempool_fees_30min",
            AttrKey::MempoolFees60min => "mempool_fees_60min",
            AttrKey::MempoolFeesEco => "mempool_fees_eco",
            AttrKey::MempoolFeesMinimum => "mempool_fees_minimum",
            AttrKey::MempoolNextBlockSize => "mempool_next_block_size",
            AttrKey::MempoolNextBlockTxCount => "mempool_next_block_tx_count",
            AttrKey::MempoolNextBlockTotalFee => "mempool_next_block_total_fee",
            AttrKey::MempoolNextBlockMedianFee => "mempool_next_block_median_fee",
            AttrKey::MempoolNextBlockFeeRangeMin => "mempool_next_block_fee_range_min",
            AttrKey::MempoolNextBlockFeeRangeMax => "mempool_next_block_fee_range_max",
            AttrKey::BlockTimeInSeconds => "block_time_in_seconds",
            AttrKey::DifficultyBlockProgress => "difficulty_block_progress",
            AttrKey::DifficultyRetargetHeight => "difficulty_retarget_height",
            AttrKey::DifficultyPreviousRetargetHeight => "difficulty_previous_retarget_height",
            AttrKey::DifficultyRetargetSeconds => "difficulty_retarget_seconds",
            AttrKey::DifficultyRetargetPercentChange => "difficulty_retarget_percent_change",
            AttrKey::DifficultyRetargetEstimatedDiff => "difficulty_retarget_estimated_diff",
            AttrKey::DifficultyCalc => "difficulty_calc",
            AttrKey::HalvingBlockProgress => "halving_block_progress",
            AttrKey::HalvingBlocksRemaining => "halving_blocks_remaining",
            AttrKey::NextHalvingHeight => "next_halving_height",
            AttrKey::TotalHalvingsToDate => "total_halvings_to_date",
            AttrKey::HashrateCalc => "hashrate_calc",
            AttrKey::AllTimeHighDistance => "all_time_high_distance",
            AttrKey::DaysSinceAllTimeHigh => "days_since_all_time_high",
            AttrKey::DaysSinceAllTimeLow => "days_since_all_time_low",
            AttrKey::PoolControl1000bPerc => "pool_control_1000b_perc",
            AttrKey::MempoolSizeCalc => "mempool_size_calc",
            AttrKey::MempoolTotalFeeCalc => "mempool_total_fee_calc",
            AttrKey::MempoolAverageFeePerTx => "mempool_average_fee_per_tx",
            AttrKey::MempoolNextBlockSizeCalc => "mempool_next_block_size_calc",
            AttrKey::MempoolNextBlockTotalFeeCalc => "mempool_next_block_total_fee_calc",
            AttrKey::MempoolNextBlockFeeRangeCombined => "mempool_next_block_fee_range_combined",
        }
    }
}

impl fmt::Display for AttrKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown attribute key `{0}`")]
pub struct UnknownAttrKey(pub String);

impl FromStr for AttrKey {
    type Err = UnknownAttrKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        AttrKey::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| UnknownAttrKey(s.to_string()))
    }
}

impl Serialize for AttrKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AttrValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl AttrValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttrValue::Int(v) => Some(*v as f64),
            AttrValue::Float(v) => Some(*v),
            AttrValue::Text(_) => None,
        }
    }
}

impl From<i64> for AttrValue {
    fn from(v: i64) -> Self {
        AttrValue::Int(v)
    }
}

impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        AttrValue::Float(v)
    }
}

impl From<String> for AttrValue {
    fn from(v: String) -> Self {
        AttrValue::Text(v)
    }
}

/// Family-gated attributes; a present key with `None` means "defined but unknown".
pub type AttributeMap = BTreeMap<AttrKey, Option<AttrValue>>;

/// Stored fields each family exposes.
pub fn raw_keys(ft: FetchType) -> &'static [AttrKey] {
    use AttrKey::*;
    match ft {
        FetchType::PriceMain => &[
            LastUpdate,
            BasePrice,
            Volume24h,
            Change1h,
            Change24h,
            Change7d,
            Change30d,
            MarketCap,
            CirculatingSupply,
            TotalSupply,
            AllTimeHigh,
            AllTimeLow,
            Low24h,
            High24h,
            ImageUrl,
        ],
        FetchType::PriceSimple => &[LastUpdate, BasePrice, Volume24h, Change24h, MarketCap],
        FetchType::Dominance => &[LastUpdate, MarketCap],
        FetchType::ChainSummary => &[LastUpdate, CirculatingSupply, Difficulty, Hashrate],
        FetchType::ChainControl => &[LastUpdate, PoolControl1000b],
        FetchType::ChainOrphans => &[LastUpdate],
        FetchType::ChainBlockTime => &[LastUpdate, BlockHeight],
        FetchType::NompPoolStats => &[
            LastUpdate,
            BlockHeight,
            WorkerCount,
            LastBlock,
            BlocksPending,
            BlocksConfirmed,
            BlocksOrphaned,
        ],
        FetchType::MempoolStats => &[LastUpdate, MempoolTxCount, MempoolTotalFee],
        FetchType::MempoolFees => &[
            LastUpdate,
            MempoolFeesFastest,
            MempoolFees30min,
            MempoolFees60min,
            MempoolFeesEco,
            MempoolFeesMinimum,
        ],
        FetchType::MempoolNextBlock => &[
            LastUpdate,
            MempoolNextBlockSize,
            MempoolNextBlockTxCount,
            MempoolNextBlockTotalFee,
            MempoolNextBlockMedianFee,
            MempoolNextBlockFeeRangeMin,
            MempoolNextBlockFeeRangeMax,
        ],
    }
}

/// Computed attributes each family exposes.
pub fn derived_keys(ft: FetchType) -> &'static [AttrKey] {
    use AttrKey::*;
    match ft {
        FetchType::PriceMain => &[AllTimeHighDistance, DaysSinceAllTimeHigh, DaysSinceAllTimeLow],
        FetchType::ChainSummary => &[
            BlockTimeInSeconds,
            DifficultyBlockProgress,
            DifficultyRetargetHeight,
            DifficultyPreviousRetargetHeight,
            DifficultyRetargetSeconds,
            DifficultyRetargetPercentChange,
            DifficultyRetargetEstimatedDiff,
            DifficultyCalc,
            HalvingBlockProgress,
            HalvingBlocksRemaining,
            NextHalvingHeight,
            TotalHalvingsToDate,
            HashrateCalc,
        ],
        FetchType::ChainControl => &[PoolControl1000bPerc],
        FetchType::NompPoolStats => &[HashrateCalc],
        FetchType::MempoolStats => &[MempoolSizeCalc, MempoolTotalFeeCalc, MempoolAverageFeePerTx],
        FetchType::MempoolNextBlock => &[
            MempoolNextBlockSizeCalc,
            MempoolNextBlockTotalFeeCalc,
            MempoolNextBlockFeeRangeCombined,
        ],
        FetchType::PriceSimple
        | FetchType::Dominance
        | FetchType::ChainOrphans
        | FetchType::ChainBlockTime
        | FetchType::MempoolFees => &[],
    }
}

pub fn is_valid_for(ft: FetchType, key: AttrKey) -> bool {
    raw_keys(ft).contains(&key) || derived_keys(ft).contains(&key)
}
