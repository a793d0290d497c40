// src/extract.rs
//! Per-family payload handling.
//!
//! `narrow` turns a raw upstream response into the payload an entity works
//! from (and the one that gets cached); `extract` turns that payload into the
//! primary value plus the family's field set. The primary value is required;
//! secondary fields are `None` when missing, null or not numeric. Zero is data.

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;

use crate::error::ExtractError;
use crate::registry::FetchType;
use crate::types::{round_to, Extraction, MetricFields, DAY_SECONDS};

/// Per-entity parameters the extraction rules depend on.
#[derive(Debug, Clone, Copy)]
pub struct ExtractContext<'a> {
    pub asset: &'a str,
    pub quote: &'a str,
    pub multiplier: f64,
    pub pool_prefixes: &'a [String],
    pub pool_name: Option<&'a str>,
    pub block_height: Option<i64>,
    pub today: NaiveDate,
}

fn number(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn integer(v: &Value) -> Option<i64> {
    v.as_i64().or_else(|| number(v).filter(|f| f.is_finite()).map(|f| f as i64))
}

fn present<'a>(v: &'a Value, key: &str) -> Option<&'a Value> {
    v.get(key).filter(|x| !x.is_null())
}

fn field<'a>(v: &'a Value, key: &str) -> Result<&'a Value, ExtractError> {
    present(v, key).ok_or_else(|| ExtractError::MissingField(key.to_string()))
}

fn req_f64(v: &Value, key: &str) -> Result<f64, ExtractError> {
    number(field(v, key)?).ok_or_else(|| ExtractError::Malformed(format!("`{key}` is not a number")))
}

fn req_i64(v: &Value, key: &str) -> Result<i64, ExtractError> {
    integer(field(v, key)?).ok_or_else(|| ExtractError::Malformed(format!("`{key}` is not an integer")))
}

fn opt_f64(v: &Value, key: &str) -> Option<f64> {
    present(v, key).and_then(number)
}

fn opt_i64(v: &Value, key: &str) -> Option<i64> {
    present(v, key).and_then(integer)
}

fn opt_str(v: &Value, key: &str) -> Option<String> {
    present(v, key).and_then(Value::as_str).map(str::to_string)
}

fn opt_date(v: &Value, key: &str) -> Option<DateTime<Utc>> {
    let s = present(v, key)?.as_str()?;
    DateTime::parse_from_rfc3339(s).ok().map(|d| d.with_timezone(&Utc))
}

/// Selects the part of a raw response `extract` reads.
pub fn narrow(ft: FetchType, raw: Value, ctx: &ExtractContext<'_>) -> Result<Value, ExtractError> {
    match ft {
        FetchType::PriceMain => match raw {
            Value::Array(mut list) if !list.is_empty() => Ok(list.swap_remove(0)),
            Value::Array(_) => Err(ExtractError::MissingField(format!("markets entry for {}", ctx.asset))),
            _ => Err(ExtractError::Malformed("markets response is not a list".into())),
        },
        FetchType::PriceSimple => take(raw, ctx.asset),
        FetchType::Dominance => take(raw, "data"),
        FetchType::NompPoolStats => {
            let pool = ctx
                .pool_name
                .ok_or_else(|| ExtractError::InvalidArgument("pool name not configured".into()))?;
            let pools = take(raw, "pools")?;
            flatten_pool(take(pools, pool)?)
        }
        FetchType::MempoolNextBlock => match raw {
            Value::Array(mut blocks) if !blocks.is_empty() => Ok(blocks.swap_remove(0)),
            Value::Array(_) => Err(ExtractError::MissingField("projected block".into())),
            _ => Err(ExtractError::Malformed("mempool blocks response is not a list".into())),
        },
        FetchType::ChainSummary
        | FetchType::ChainControl
        | FetchType::ChainOrphans
        | FetchType::ChainBlockTime
        | FetchType::MempoolStats
        | FetchType::MempoolFees => Ok(raw),
    }
}

fn take(raw: Value, key: &str) -> Result<Value, ExtractError> {
    match raw {
        Value::Object(mut obj) => match obj.remove(key) {
            Some(v) if !v.is_null() => Ok(v),
            _ => Err(ExtractError::MissingField(key.to_string())),
        },
        _ => Err(ExtractError::Malformed(format!("expected an object around `{key}`"))),
    }
}

/// Lifts `poolStats` and the block counters to the top level of a pool entry.
fn flatten_pool(pool: Value) -> Result<Value, ExtractError> {
    let Value::Object(mut obj) = pool else {
        return Err(ExtractError::Malformed("pool entry is not an object".into()));
    };
    if let Some(Value::Object(stats)) = obj.remove("poolStats") {
        obj.extend(stats);
    }
    let blocks = obj.remove("blocks").unwrap_or(Value::Null);
    for (from, to) in [
        ("pending", "blocks_pending"),
        ("confirmed", "blocks_confirmed"),
        ("orphaned", "blocks_orphaned"),
    ] {
        obj.insert(to.to_string(), blocks.get(from).cloned().unwrap_or(Value::Null));
    }
    obj.remove("workers");
    obj.remove("poolFees");
    Ok(Value::Object(obj))
}

/// Primary value and field set for an already narrowed payload.
pub fn extract(ft: FetchType, payload: &Value, ctx: &ExtractContext<'_>) -> Result<Extraction, ExtractError> {
    match ft {
        FetchType::PriceMain => price_main(payload, ctx),
        FetchType::PriceSimple => price_simple(payload, ctx),
        FetchType::Dominance => dominance(payload, ctx),
        FetchType::ChainSummary => chain_summary(payload, ctx),
        FetchType::ChainControl => chain_control(payload, ctx),
        FetchType::ChainOrphans => chain_orphans(payload, ctx),
        FetchType::ChainBlockTime => chain_block_time(payload, ctx),
        FetchType::NompPoolStats => nomp_pool_stats(payload),
        FetchType::MempoolStats => mempool_stats(payload),
        FetchType::MempoolFees => mempool_fees(payload),
        FetchType::MempoolNextBlock => mempool_next_block(payload),
    }
}

fn price_main(p: &Value, ctx: &ExtractContext<'_>) -> Result<Extraction, ExtractError> {
    let price = req_f64(p, "current_price")?;
    Ok(Extraction {
        state: price * ctx.multiplier,
        fields: MetricFields {
            base_price: Some(price),
            volume_24h: opt_f64(p, "total_volume"),
            change_1h: opt_f64(p, "price_change_percentage_1h_in_currency"),
            change_24h: opt_f64(p, "price_change_percentage_24h_in_currency"),
            change_7d: opt_f64(p, "price_change_percentage_7d_in_currency"),
            change_30d: opt_f64(p, "price_change_percentage_30d_in_currency"),
            market_cap: opt_f64(p, "market_cap"),
            circulating_supply: opt_f64(p, "circulating_supply"),
            total_supply: opt_f64(p, "total_supply"),
            all_time_high: opt_f64(p, "ath"),
            all_time_high_date: opt_date(p, "ath_date"),
            all_time_low: opt_f64(p, "atl"),
            all_time_low_date: opt_date(p, "atl_date"),
            low_24h: opt_f64(p, "low_24h"),
            high_24h: opt_f64(p, "high_24h"),
            image_url: opt_str(p, "image"),
            ..MetricFields::default()
        },
    })
}

fn price_simple(p: &Value, ctx: &ExtractContext<'_>) -> Result<Extraction, ExtractError> {
    let quote = ctx.quote;
    let price = req_f64(p, quote)?;
    Ok(Extraction {
        state: price * ctx.multiplier,
        fields: MetricFields {
            base_price: Some(price),
            volume_24h: opt_f64(p, &format!("{quote}_24h_vol")),
            change_24h: opt_f64(p, &format!("{quote}_24h_change")),
            market_cap: opt_f64(p, &format!("{quote}_market_cap")),
            ..MetricFields::default()
        },
    })
}

fn dominance(p: &Value, ctx: &ExtractContext<'_>) -> Result<Extraction, ExtractError> {
    let pct = req_f64(field(p, "market_cap_percentage")?, ctx.asset)?;
    let market_cap = present(p, "total_market_cap").and_then(|m| opt_f64(m, ctx.asset));
    Ok(Extraction {
        state: round_to(pct, 1),
        fields: MetricFields { market_cap, ..MetricFields::default() },
    })
}

fn chain_summary(p: &Value, ctx: &ExtractContext<'_>) -> Result<Extraction, ExtractError> {
    let chain = field(p, ctx.asset)?;
    let height = req_i64(chain, "height")?;
    Ok(Extraction {
        state: height as f64,
        fields: MetricFields {
            difficulty: opt_f64(chain, "diff"),
            circulating_supply: opt_f64(chain, "supply"),
            hashrate: opt_f64(chain, "hashrate"),
            ..MetricFields::default()
        },
    })
}

/// Sums the 100 and 1000 block counts of every pool whose name starts with any
/// configured prefix. Each pool is counted once.
fn chain_control(p: &Value, ctx: &ExtractContext<'_>) -> Result<Extraction, ExtractError> {
    let pools = field(p, "pools")?
        .as_array()
        .ok_or_else(|| ExtractError::Malformed("`pools` is not a list".into()))?;
    let prefixes: Vec<String> = ctx
        .pool_prefixes
        .iter()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect();

    let mut matched = 0usize;
    let (mut nb100, mut nb1000) = (0i64, 0i64);
    for pool in pools {
        let Some(name) = pool.get("name").and_then(Value::as_str) else {
            continue;
        };
        let name = name.to_lowercase();
        if prefixes.iter().any(|pre| name.starts_with(pre.as_str())) {
            matched += 1;
            nb100 = nb100.saturating_add(opt_i64(pool, "nb100").unwrap_or(0));
            nb1000 = nb1000.saturating_add(opt_i64(pool, "nb1000").unwrap_or(0));
        }
    }

    if matched == 0 {
        return Err(ExtractError::NoPoolMatched(ctx.pool_prefixes.to_vec()));
    }
    Ok(Extraction {
        state: nb100 as f64,
        fields: MetricFields { pool_control_1000b: Some(nb1000), ..MetricFields::default() },
    })
}

/// `n` is a per-day series starting at day offset `d` since the epoch. Its last
/// element counts for today only if the series reaches today's UTC date.
fn chain_orphans(p: &Value, ctx: &ExtractContext<'_>) -> Result<Extraction, ExtractError> {
    let start_day = req_i64(p, "d")?;
    let series = field(p, "n")?
        .as_array()
        .ok_or_else(|| ExtractError::Malformed("`n` is not a list".into()))?;

    let out_of_range = || ExtractError::Malformed(format!("day offset {start_day} out of range"));
    let last_ts = i64::try_from(series.len())
        .ok()
        .and_then(|len| start_day.checked_add(len))
        .and_then(|day| day.checked_mul(DAY_SECONDS))
        .ok_or_else(out_of_range)?;
    let last_date = DateTime::from_timestamp(last_ts, 0).ok_or_else(out_of_range)?.date_naive();

    let today = match series.last() {
        Some(last) if last_date == ctx.today => {
            integer(last).ok_or_else(|| ExtractError::Malformed("orphan count is not an integer".into()))?
        }
        _ => 0,
    };
    Ok(Extraction { state: today as f64, fields: MetricFields::default() })
}

fn chain_block_time(p: &Value, ctx: &ExtractContext<'_>) -> Result<Extraction, ExtractError> {
    let ts = integer(p).ok_or_else(|| ExtractError::Malformed("block time is not an integer".into()))?;
    Ok(Extraction {
        state: ts as f64,
        fields: MetricFields { block_height: ctx.block_height, ..MetricFields::default() },
    })
}

fn nomp_pool_stats(p: &Value) -> Result<Extraction, ExtractError> {
    let hashrate = req_f64(p, "hashrate")?;
    Ok(Extraction {
        state: hashrate,
        fields: MetricFields {
            hashrate: Some(hashrate),
            block_height: opt_i64(p, "height"),
            worker_count: opt_i64(p, "workerCount"),
            last_block: opt_i64(p, "lastBlock"),
            blocks_pending: opt_i64(p, "blocks_pending"),
            blocks_confirmed: opt_i64(p, "blocks_confirmed"),
            blocks_orphaned: opt_i64(p, "blocks_orphaned"),
            ..MetricFields::default()
        },
    })
}

fn mempool_stats(p: &Value) -> Result<Extraction, ExtractError> {
    Ok(Extraction {
        state: req_i64(p, "vsize")? as f64,
        fields: MetricFields {
            mempool_tx_count: opt_i64(p, "count"),
            mempool_total_fee: opt_i64(p, "total_fee"),
            ..MetricFields::default()
        },
    })
}

fn mempool_fees(p: &Value) -> Result<Extraction, ExtractError> {
    let fastest = req_i64(p, "fastestFee")?;
    Ok(Extraction {
        state: fastest as f64,
        fields: MetricFields {
            fees_fastest: Some(fastest),
            fees_30min: opt_i64(p, "halfHourFee"),
            fees_60min: opt_i64(p, "hourFee"),
            fees_eco: opt_i64(p, "economyFee"),
            fees_minimum: opt_i64(p, "minimumFee"),
            ..MetricFields::default()
        },
    })
}

/// First projected block. `feeRange` runs from the cheapest to the dearest
/// fee rate included.
fn mempool_next_block(p: &Value) -> Result<Extraction, ExtractError> {
    let tx_count = req_i64(p, "nTx")?;
    let range = present(p, "feeRange").and_then(Value::as_array);
    let bound = |v: Option<&Value>| v.and_then(integer);
    Ok(Extraction {
        state: tx_count as f64,
        fields: MetricFields {
            next_block_size: opt_i64(p, "blockSize"),
            next_block_tx_count: Some(tx_count),
            next_block_total_fee: opt_i64(p, "totalFees"),
            next_block_median_fee: opt_i64(p, "medianFee"),
            next_block_fee_range_min: bound(range.and_then(|r| r.first())),
            next_block_fee_range_max: bound(range.and_then(|r| r.last())),
            ..MetricFields::default()
        },
    })
}
