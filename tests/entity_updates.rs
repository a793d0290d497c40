//! End-to-end update ticks against a scripted upstream and a pinned clock.

mod common;

use std::time::Duration;

use serde_json::json;

use common::{services, ScriptedTransport, T0};
use cryptoinfo::attributes::{AttrKey, AttrValue};
use cryptoinfo::config::{ChildSensorConfig, EntityConfig};
use cryptoinfo::entity::{Entity, UpdateOutcome};
use cryptoinfo::error::ConfigError;
use cryptoinfo::sources::SourceRole;

const MARKETS: &str = "coins/markets";
const SIMPLE: &str = "simple/price";
const GLOBAL: &str = "/global";
const SUMMARY: &str = "q=summary";
const POOLS: &str = "index.pools.dws";
const MEMPOOL: &str = "api/mempool";
const NEXT_BLOCKS: &str = "fees/mempool-blocks";

fn price_cfg() -> EntityConfig {
    EntityConfig {
        cryptocurrency_name: "bitcoin".into(),
        currency_name: "usd".into(),
        multiplier: 2.0,
        ..EntityConfig::default()
    }
}

fn mode(api_mode: &str, asset: &str) -> EntityConfig {
    EntityConfig {
        api_mode: api_mode.into(),
        cryptocurrency_name: asset.into(),
        unit_of_measurement: String::new(),
        ..EntityConfig::default()
    }
}

fn child(property: &str, unit: Option<&str>) -> ChildSensorConfig {
    ChildSensorConfig {
        property: property.into(),
        id: None,
        unique_id: None,
        unit_of_measurement: unit.map(str::to_string),
    }
}

fn attr(entity: &Entity, key: AttrKey) -> Option<AttrValue> {
    entity.attributes().get(&key).cloned().flatten()
}

fn summary_payload() -> serde_json::Value {
    json!({"btc": {
        "height": 840_100,
        "diff": 86_388_558_925_171.0,
        "supply": 19_687_500.0,
        "hashrate": 6.1e20
    }})
}

#[tokio::test]
async fn price_main_scales_state_and_derives_ath_distance() {
    let (_clock, services) = services(T0);
    let upstream = ScriptedTransport::new();
    upstream.json(
        MARKETS,
        json!([{
            "current_price": 50_000.0,
            "ath": 73_750.07,
            "ath_date": "2024-03-14T07:10:36.635Z",
            "price_change_percentage_24h_in_currency": -1.5
        }]),
    );

    let mut e = Entity::new(&price_cfg(), services).await.unwrap();
    assert_eq!(e.name(), "Cryptoinfo Bitcoin Price USD");
    assert_eq!(e.id(), "bitcoinusd260");

    assert_eq!(e.update(upstream.as_ref()).await, UpdateOutcome::Fetched);
    assert_eq!(e.state(), Some(100_000.0));
    assert!(e.is_available());
    assert_eq!(attr(&e, AttrKey::BasePrice), Some(AttrValue::Float(50_000.0)));
    assert_eq!(attr(&e, AttrKey::AllTimeHighDistance), Some(AttrValue::Float(23_750.07)));
    assert_eq!(attr(&e, AttrKey::DaysSinceAllTimeHigh), Some(AttrValue::Int(36)));
    assert_eq!(attr(&e, AttrKey::Change24h), Some(AttrValue::Float(-1.5)));
    assert_eq!(attr(&e, AttrKey::MarketCap), None);
    assert!(upstream.urls()[0].contains("ids=bitcoin&vs_currency=usd"));
}

#[tokio::test]
async fn price_falls_back_to_simple_endpoint() {
    let (_clock, services) = services(T0);
    let upstream = ScriptedTransport::new();
    upstream.status(MARKETS, 429);
    upstream.json(SIMPLE, json!({"bitcoin": {"usd": 49_000.0, "usd_24h_vol": 2.5e10}}));

    let mut e = Entity::new(&price_cfg(), services).await.unwrap();
    assert_eq!(e.update(upstream.as_ref()).await, UpdateOutcome::Fallback);
    assert_eq!(e.state(), Some(98_000.0));
    assert_eq!(e.fields().volume_24h, Some(2.5e10));
    assert_eq!(e.fields().all_time_high, None);
    assert_eq!(upstream.calls(MARKETS), 1);
    assert_eq!(upstream.calls(SIMPLE), 1);
}

#[tokio::test]
async fn simple_price_falls_back_to_markets_endpoint() {
    let (_clock, services) = services(T0);
    let upstream = ScriptedTransport::new();
    upstream.json(SIMPLE, json!({"bitcoin": {}}));
    upstream.json(MARKETS, json!([{"current_price": 50_000.0, "ath": 73_750.07, "total_volume": 3.1e10}]));

    let cfg = EntityConfig { api_mode: "price_simple".into(), ..price_cfg() };
    let mut e = Entity::new(&cfg, services).await.unwrap();
    assert_eq!(e.update(upstream.as_ref()).await, UpdateOutcome::Fallback);
    assert_eq!(e.state(), Some(100_000.0));
    assert_eq!(e.fields().all_time_high, Some(73_750.07));

    // the markets-only fields stay out of a simple price entity's attributes
    let attrs = e.attributes();
    assert!(!attrs.contains_key(&AttrKey::AllTimeHigh));
    assert!(!attrs.contains_key(&AttrKey::AllTimeHighDistance));
    assert_eq!(attrs.get(&AttrKey::Volume24h), Some(&Some(AttrValue::Float(3.1e10))));
    assert_eq!(upstream.calls(SIMPLE), 1);
    assert_eq!(upstream.calls(MARKETS), 1);
}

#[tokio::test]
async fn failure_clears_everything_but_keeps_last_updated() {
    let (clock, services) = services(T0);
    let upstream = ScriptedTransport::new();
    upstream.json(MARKETS, json!([{"current_price": 50_000.0, "ath": 73_750.07}]));

    let mut e = Entity::new(&price_cfg(), services).await.unwrap();
    assert_eq!(e.update(upstream.as_ref()).await, UpdateOutcome::Fetched);
    let stamped = e.last_updated();
    assert!(stamped.is_some());

    clock.advance(60);
    upstream.json(MARKETS, json!([{"ath": 73_750.07}]));
    upstream.status(SIMPLE, 500);
    assert_eq!(e.update(upstream.as_ref()).await, UpdateOutcome::Failed);
    assert!(!e.is_available());
    assert_eq!(e.state(), None);
    assert_eq!(e.fields().all_time_high, None);
    assert_eq!(e.fields().base_price, None);
    assert_eq!(e.last_updated(), stamped);

    let snap = e.snapshot();
    assert!(!snap.available);
    assert_eq!(snap.state, None);
}

#[tokio::test]
async fn dominance_entities_share_one_fetch_per_interval() {
    let (clock, services) = services(T0);
    let upstream = ScriptedTransport::new();
    upstream.json(
        GLOBAL,
        json!({"data": {
            "market_cap_percentage": {"btc": 52.3789, "eth": 16.04},
            "total_market_cap": {"btc": 38_912_345.5}
        }}),
    );

    let mut btc = Entity::new(&EntityConfig { update_frequency_secs: 300, ..mode("dominance", "btc") }, services.clone())
        .await
        .unwrap();
    let mut eth = Entity::new(&EntityConfig { update_frequency_secs: 60, ..mode("dominance", "eth") }, services)
        .await
        .unwrap();

    assert_eq!(btc.update(upstream.as_ref()).await, UpdateOutcome::Fetched);
    assert_eq!(eth.update(upstream.as_ref()).await, UpdateOutcome::Cached);
    assert_eq!(upstream.calls(GLOBAL), 1);
    assert_eq!(btc.state(), Some(52.4));
    assert_eq!(eth.state(), Some(16.0));
    assert_eq!(eth.fields().market_cap, None);

    clock.advance(59);
    assert_eq!(btc.update(upstream.as_ref()).await, UpdateOutcome::Cached);
    assert_eq!(upstream.calls(GLOBAL), 1);

    // the shared interval is the smallest registered one
    clock.advance(1);
    assert_eq!(btc.update(upstream.as_ref()).await, UpdateOutcome::Fetched);
    assert_eq!(eth.update(upstream.as_ref()).await, UpdateOutcome::Cached);
    assert_eq!(upstream.calls(GLOBAL), 2);
}

#[tokio::test(start_paused = true)]
async fn concurrent_updates_on_one_key_fetch_once() {
    let (_clock, services) = services(T0);
    let upstream = ScriptedTransport::new();
    upstream.delay(Duration::from_millis(250));
    upstream.json(GLOBAL, json!({"data": {"market_cap_percentage": {"btc": 52.3789, "eth": 16.04}}}));

    let mut btc = Entity::new(&mode("dominance", "btc"), services.clone()).await.unwrap();
    let mut eth = Entity::new(&mode("dominance", "eth"), services).await.unwrap();

    let (a, b) = tokio::join!(btc.update(upstream.as_ref()), eth.update(upstream.as_ref()));
    assert_eq!((a, b), (UpdateOutcome::Fetched, UpdateOutcome::Cached));
    assert_eq!(upstream.calls(GLOBAL), 1);
    assert_eq!(eth.state(), Some(16.0));
}

#[tokio::test]
async fn failed_shared_fetch_is_not_cached() {
    let (_clock, services) = services(T0);
    let upstream = ScriptedTransport::new();
    upstream.json(GLOBAL, json!({"data": {"market_cap_percentage": {}}}));

    let mut btc = Entity::new(&mode("dominance", "btc"), services.clone()).await.unwrap();
    let mut eth = Entity::new(&mode("dominance", "eth"), services).await.unwrap();

    assert_eq!(btc.update(upstream.as_ref()).await, UpdateOutcome::Failed);
    assert_eq!(eth.update(upstream.as_ref()).await, UpdateOutcome::Failed);
    assert_eq!(upstream.calls(GLOBAL), 2);
}

#[tokio::test]
async fn pool_stats_without_domain_is_rejected_before_fetching() {
    let (_clock, services) = services(T0);
    let upstream = ScriptedTransport::new();

    let cfg = EntityConfig { pool_name: Some("bitcoin".into()), ..mode("nomp_pool_stats", "btc") };
    let res = Entity::new(&cfg, services.clone()).await;
    assert!(matches!(res, Err(ConfigError::MissingApiDomain(_))));

    let cfg = EntityConfig { api_domain_name: Some("pool.example.org".into()), ..mode("nomp_pool_stats", "btc") };
    let res = Entity::new(&cfg, services).await;
    assert!(matches!(res, Err(ConfigError::MissingPoolName(_))));
    assert_eq!(upstream.total_calls(), 0);
}

#[tokio::test]
async fn chain_control_without_matching_pool_fails() {
    let (_clock, services) = services(T0);
    let upstream = ScriptedTransport::new();
    upstream.json(
        POOLS,
        json!({"pools": [
            {"name": "Foundry USA", "nb100": 30, "nb1000": 290},
            {"name": "AntPool", "nb100": 25, "nb1000": 240}
        ]}),
    );

    let cfg = EntityConfig { pool_prefix: vec!["foundry".into(), "ant".into()], ..mode("chain_control", "btc") };
    let mut some = Entity::new(&cfg, services.clone()).await.unwrap();
    assert!(some.id().ends_with("_cc_foundryant"));
    assert_eq!(some.update(upstream.as_ref()).await, UpdateOutcome::Fetched);
    assert_eq!(some.state_value(), Some(AttrValue::Int(55)));
    assert_eq!(attr(&some, AttrKey::PoolControl1000bPerc), Some(AttrValue::Float(53.0)));

    // served from the per-asset slot, but nothing matches
    let cfg = EntityConfig { pool_prefix: vec!["slush".into()], ..mode("chain_control", "btc") };
    let mut none = Entity::new(&cfg, services).await.unwrap();
    assert_eq!(none.update(upstream.as_ref()).await, UpdateOutcome::Failed);
    assert!(!none.is_available());
    assert_eq!(none.state_value(), None);
    assert_eq!(upstream.calls(POOLS), 1);
}

#[tokio::test]
async fn children_follow_their_parent() {
    let (_clock, services) = services(T0);
    let upstream = ScriptedTransport::new();
    upstream.json(SUMMARY, summary_payload());

    let cfg = EntityConfig {
        extra_sensors: vec![
            child("hashrate_calc", Some("EH/s")),
            child("difficulty_retarget_height", None),
            child("all_time_high", None),
        ],
        ..mode("chain_summary", "btc")
    };
    let mut e = Entity::new(&cfg, services).await.unwrap();
    // all_time_high is not a chain summary attribute
    assert_eq!(e.children().len(), 2);
    assert!(e.children().iter().all(|c| !c.is_available()));

    assert_eq!(e.update(upstream.as_ref()).await, UpdateOutcome::Fetched);
    let hashrate = &e.children()[0];
    assert_eq!(hashrate.id(), format!("{}_hashrate_calc", e.id()));
    assert_eq!(hashrate.state(), Some(&AttrValue::Float(610.0)));
    assert_eq!(e.children()[1].state(), Some(&AttrValue::Int(840_672)));

    upstream.status(SUMMARY, 503);
    assert_eq!(e.update(upstream.as_ref()).await, UpdateOutcome::Failed);
    assert!(e.children().iter().all(|c| !c.is_available()));
    assert_eq!(e.snapshots().len(), 3);
}

#[tokio::test]
async fn retarget_projection_uses_block_time_and_best_hashrate() {
    let (_clock, services) = services(T0);
    let upstream = ScriptedTransport::new();
    upstream.json(SUMMARY, summary_payload());
    upstream.json("getblocktime&height=838656", json!(T0 - 866_400));

    let mut summary = Entity::new(&mode("chain_summary", "btc"), services.clone()).await.unwrap();
    let mut block_time = Entity::new(&mode("chain_block_time", "btc"), services.clone()).await.unwrap();

    // no chain summary data yet, so no height to ask for
    assert_eq!(block_time.update(upstream.as_ref()).await, UpdateOutcome::Failed);

    assert_eq!(summary.update(upstream.as_ref()).await, UpdateOutcome::Fetched);
    assert_eq!(summary.state_value(), Some(AttrValue::Int(840_100)));
    assert_eq!(attr(&summary, AttrKey::DifficultyBlockProgress), Some(AttrValue::Int(1_444)));
    assert_eq!(attr(&summary, AttrKey::DifficultyPreviousRetargetHeight), Some(AttrValue::Int(838_656)));
    assert_eq!(attr(&summary, AttrKey::DifficultyRetargetPercentChange), None);
    assert_eq!(services.sources.last_difficulty_height("btc"), Some(838_656));

    assert_eq!(block_time.update(upstream.as_ref()).await, UpdateOutcome::Fetched);
    assert_eq!(block_time.state_value(), Some(AttrValue::Int(T0 - 866_400)));
    assert_eq!(block_time.fields().block_height, Some(838_656));
    assert_eq!(services.sources.block_time("btc"), Some(T0 - 866_400));

    let Some(AttrValue::Float(pct)) = attr(&summary, AttrKey::DifficultyRetargetPercentChange) else {
        panic!("percent change missing");
    };
    assert!((-75.0..=300.0).contains(&pct));
    assert!(pct < 0.0);
    assert!(attr(&summary, AttrKey::DifficultyRetargetEstimatedDiff).is_some());

    // same height again: no upstream call
    assert_eq!(block_time.update(upstream.as_ref()).await, UpdateOutcome::Reused);
    assert_eq!(upstream.calls("getblocktime"), 1);
}

#[tokio::test]
async fn pool_stats_contributes_to_best_hashrate() {
    let (_clock, services) = services(T0);
    let upstream = ScriptedTransport::new();
    upstream.json(SUMMARY, summary_payload());
    upstream.json(
        "pool.example.org/api/stats",
        json!({"pools": {"bitcoin": {
            "name": "bitcoin",
            "hashrate": 7.0e20,
            "poolStats": {"validBlocks": "12"},
            "workerCount": 41,
            "blocks": {"pending": 1, "confirmed": 20, "orphaned": 0},
            "workers": {"bc1q": {}}
        }}}),
    );

    let mut summary = Entity::new(&mode("chain_summary", "btc"), services.clone()).await.unwrap();
    let pool_cfg = EntityConfig {
        api_domain_name: Some("pool.example.org".into()),
        pool_name: Some("bitcoin".into()),
        ..mode("nomp_pool_stats", "btc")
    };
    let mut pool = Entity::new(&pool_cfg, services.clone()).await.unwrap();
    assert!(upstream.urls().is_empty());

    assert_eq!(summary.update(upstream.as_ref()).await, UpdateOutcome::Fetched);
    let Some(AttrValue::Float(slow)) = attr(&summary, AttrKey::BlockTimeInSeconds) else {
        panic!("block time missing");
    };

    assert_eq!(pool.update(upstream.as_ref()).await, UpdateOutcome::Fetched);
    assert_eq!(pool.fields().worker_count, Some(41));
    assert_eq!(pool.fields().blocks_confirmed, Some(20));
    assert_eq!(services.sources.best_hashrate("btc"), Some(7.0e20));
    assert_eq!(services.sources.hashrate_contributors("btc").len(), 2);

    let Some(AttrValue::Float(fast)) = attr(&summary, AttrKey::BlockTimeInSeconds) else {
        panic!("block time missing");
    };
    assert!(fast < slow);
}

#[tokio::test]
async fn second_block_time_entity_does_not_take_over_the_role() {
    let (_clock, services) = services(T0);
    let upstream = ScriptedTransport::new();
    upstream.json("height=100", json!(1_000));
    upstream.json("height=200", json!(2_000));

    let first_cfg = EntityConfig { fetch_args: "100".into(), ..mode("chain_block_time", "btc") };
    let second_cfg = EntityConfig {
        unique_id: Some("bt_alt".into()),
        fetch_args: "200".into(),
        ..mode("chain_block_time", "btc")
    };
    let mut first = Entity::new(&first_cfg, services.clone()).await.unwrap();
    let mut second = Entity::new(&second_cfg, services.clone()).await.unwrap();

    assert_eq!(first.update(upstream.as_ref()).await, UpdateOutcome::Fetched);
    assert_eq!(second.update(upstream.as_ref()).await, UpdateOutcome::Fetched);
    assert_eq!(second.state(), Some(2_000.0));
    assert_eq!(services.sources.block_time("btc"), Some(1_000));
    assert!(!services.sources.register(SourceRole::BlockTime, "btc", "bt_alt"));
    assert!(services.sources.register(SourceRole::BlockTime, "btc", first.id()));
}

#[tokio::test]
async fn remaining_pools_report_what_the_others_leave() {
    let (clock, services) = services(T0);
    let upstream = ScriptedTransport::new();
    upstream.json(
        POOLS,
        json!({"pools": [
            {"name": "Foundry USA", "nb100": 30, "nb1000": 290},
            {"name": "AntPool", "nb100": 25, "nb1000": 240},
            {"name": "ViaBTC", "nb100": 12, "nb1000": 110}
        ]}),
    );

    let foundry_cfg = EntityConfig { pool_prefix: vec!["foundry".into()], ..mode("chain_control", "btc") };
    let ant_cfg = EntityConfig { pool_prefix: vec!["ant".into()], ..mode("chain_control", "btc") };
    let rest_cfg = EntityConfig { pool_prefix: vec!["remaining".into()], ..mode("chain_control", "btc") };
    let mut foundry = Entity::new(&foundry_cfg, services.clone()).await.unwrap();
    let mut ant = Entity::new(&ant_cfg, services.clone()).await.unwrap();
    let mut rest = Entity::new(&rest_cfg, services.clone()).await.unwrap();
    assert!(rest.id().ends_with("_cc_remaining"));

    // nothing published yet
    assert_eq!(rest.update(upstream.as_ref()).await, UpdateOutcome::Failed);
    assert!(!rest.is_available());

    assert_eq!(foundry.update(upstream.as_ref()).await, UpdateOutcome::Fetched);
    assert_eq!(ant.update(upstream.as_ref()).await, UpdateOutcome::Cached);
    assert_eq!(rest.update(upstream.as_ref()).await, UpdateOutcome::Derived);
    assert_eq!(rest.state_value(), Some(AttrValue::Int(45)));
    assert_eq!(attr(&rest, AttrKey::PoolControl1000b), Some(AttrValue::Int(470)));
    assert_eq!(attr(&rest, AttrKey::PoolControl1000bPerc), Some(AttrValue::Float(47.0)));
    assert_eq!(upstream.calls(POOLS), 1);

    // a failing contributor drops out of the sum, the remaining entity never counts itself
    upstream.status(POOLS, 500);
    clock.advance(60);
    assert_eq!(ant.update(upstream.as_ref()).await, UpdateOutcome::Failed);
    assert_eq!(rest.update(upstream.as_ref()).await, UpdateOutcome::Derived);
    assert_eq!(rest.state_value(), Some(AttrValue::Int(70)));
    assert_eq!(services.sources.pool_blocks_claimed("btc"), Some((30, 290)));
}

#[tokio::test]
async fn mempool_stats_derive_fee_attributes() {
    let (_clock, services) = services(T0);
    let upstream = ScriptedTransport::new();
    upstream.json(MEMPOOL, json!({"count": 41_235, "vsize": 19_403_012, "total_fee": 40_125_387}));

    let cfg = EntityConfig {
        extra_sensors: vec![child("mempool_total_fee_calc", Some("BTC")), child("mempool_size_calc", Some("MvB"))],
        ..mode("mempool_stats", "btc")
    };
    let mut e = Entity::new(&cfg, services).await.unwrap();
    assert_eq!(e.update(upstream.as_ref()).await, UpdateOutcome::Fetched);
    assert_eq!(upstream.urls(), ["https://mempool.space/api/mempool"]);
    assert_eq!(e.state_value(), Some(AttrValue::Int(19_403_012)));
    assert_eq!(attr(&e, AttrKey::MempoolTxCount), Some(AttrValue::Int(41_235)));
    assert_eq!(attr(&e, AttrKey::MempoolAverageFeePerTx), Some(AttrValue::Int(973)));
    assert_eq!(attr(&e, AttrKey::MempoolTotalFeeCalc), Some(AttrValue::Float(40_125_387.0)));
    assert!(!e.attributes().contains_key(&AttrKey::MempoolFeesFastest));

    assert_eq!(e.children()[0].state(), Some(&AttrValue::Float(0.4013)));
    assert_eq!(e.children()[1].state(), Some(&AttrValue::Float(19.403)));
}

#[tokio::test]
async fn mempool_next_block_is_shared_between_bitcoin_spellings() {
    let (_clock, services) = services(T0);
    let upstream = ScriptedTransport::new();
    upstream.json(
        NEXT_BLOCKS,
        json!([
            {"blockSize": 1_588_411, "nTx": 3_211, "totalFees": 5_102_331, "medianFee": 17.8,
             "feeRange": [12.1, 14.0, 17.9, 52.6, 301.2]}
        ]),
    );

    let mut short = Entity::new(&mode("mempool_next_block", "btc"), services.clone()).await.unwrap();
    let mut long = Entity::new(&mode("mempool_next_block", "bitcoin"), services).await.unwrap();
    assert_eq!(short.update(upstream.as_ref()).await, UpdateOutcome::Fetched);
    assert_eq!(long.update(upstream.as_ref()).await, UpdateOutcome::Cached);
    assert_eq!(upstream.calls(NEXT_BLOCKS), 1);

    assert_eq!(long.state_value(), Some(AttrValue::Int(3_211)));
    assert_eq!(
        attr(&long, AttrKey::MempoolNextBlockFeeRangeCombined),
        Some(AttrValue::Text("12 - 301".into()))
    );
    assert_eq!(attr(&long, AttrKey::MempoolNextBlockMedianFee), Some(AttrValue::Int(17)));
}

#[tokio::test]
async fn mempool_families_reject_other_assets() {
    let (_clock, services) = services(T0);
    let upstream = ScriptedTransport::new();
    let res = Entity::new(&mode("mempool_fees", "ltc"), services).await;
    assert!(matches!(res, Err(ConfigError::UnsupportedAsset { family: "mempool_fees", .. })));
    assert_eq!(upstream.total_calls(), 0);
}
