// src/entity.rs
//! One polled metric instance and its update state machine.
//!
//! A tick resolves the entity's arguments, takes the shared cache slot for its
//! key (shareable families only), reuses the slot payload when it is still
//! fresh or fetches and extracts otherwise, tries the fallback endpoint for
//! price families, and finally either replaces every field or clears them all.

use std::collections::HashMap;
use std::mem;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::attributes::{derived_keys, is_valid_for, raw_keys, AttrKey, AttrValue, AttributeMap};
use crate::cache::{CacheKey, CacheSlot};
use crate::child::ChildEntity;
use crate::config::EntityConfig;
use crate::derived::{
    all_time_high_distance, average_fee_per_tx, days_since, fee_range_combined, pool_control_percentage,
    previous_retarget_height, scale_to_currency, scale_to_unit, unclaimed_blocks, HalvingProjection,
    RetargetInputs, RetargetProjection,
};
use crate::error::{AttemptError, ConfigError, ExtractError};
use crate::extract::{self, ExtractContext};
use crate::metrics;
use crate::providers::Transport;
use crate::registry::{DeviceClass, FetchType, MetricType};
use crate::services::MetricServices;
use crate::sources::SourceRole;
use crate::template;
use crate::types::{ChainParams, Extraction, MetricFields};

pub const NAME_PREFIX: &str = "Cryptoinfo ";

/// Sole pool prefix of a chain control entity that reports what every other
/// chain control entity of its asset leaves unclaimed.
pub const REMAINING_POOLS: &str = "remaining";

const MEMPOOL_ASSETS: [&str; 2] = ["btc", "bitcoin"];

/// How a tick ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Upstream was called and the payload extracted.
    Fetched,
    /// The shared slot was still fresh; no upstream call.
    Cached,
    /// Block time for an unchanged height; previous state kept.
    Reused,
    /// Primary endpoint failed, fallback endpoint succeeded.
    Fallback,
    /// Computed from values other entities published; no upstream call.
    Derived,
    /// Nothing usable; the entity is now unavailable.
    Failed,
}

impl UpdateOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            UpdateOutcome::Fetched => "fetched",
            UpdateOutcome::Cached => "cached",
            UpdateOutcome::Reused => "reused",
            UpdateOutcome::Fallback => "fallback",
            UpdateOutcome::Derived => "derived",
            UpdateOutcome::Failed => "failed",
        }
    }

    pub fn is_success(self) -> bool {
        self != UpdateOutcome::Failed
    }
}

/// Everything an outside observer sees of an entity after a tick.
#[derive(Debug, Clone, Serialize)]
pub struct EntitySnapshot {
    pub id: String,
    pub name: String,
    pub metric: MetricType,
    pub state: Option<AttrValue>,
    pub available: bool,
    pub last_updated: Option<DateTime<Utc>>,
    pub unit: Option<String>,
    pub device_class: Option<DeviceClass>,
    pub attributes: AttributeMap,
}

/// "btc" -> "BTC", "bitcoin-cash" -> "Bitcoin-Cash"
fn friendly_asset(asset: &str) -> String {
    if asset.chars().count() <= 6 {
        asset.to_uppercase()
    } else {
        title_case(asset)
    }
}

fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut at_word_start = true;
    for c in s.chars() {
        if at_word_start {
            out.extend(c.to_uppercase());
        } else {
            out.extend(c.to_lowercase());
        }
        at_word_start = !c.is_alphanumeric();
    }
    out
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

pub struct Entity {
    services: Arc<MetricServices>,
    metric: MetricType,
    cache_key: CacheKey,
    id: String,
    name: String,
    asset: String,
    quote: String,
    unit: String,
    multiplier: f64,
    update_frequency_secs: u64,
    pool_prefixes: Vec<String>,
    remaining_pools: bool,
    fetch_args: String,
    api_domain: Option<String>,
    pool_name: Option<String>,
    params: ChainParams,
    state: Option<f64>,
    fields: MetricFields,
    available: bool,
    last_updated: Option<DateTime<Utc>>,
    children: Vec<ChildEntity>,
}

impl Entity {
    /// Builds the entity, registers its cache interest and source roles, and
    /// creates its children. Pool stats without a domain or pool name is rejected
    /// here, before any fetch.
    pub async fn new(cfg: &EntityConfig, services: Arc<MetricServices>) -> Result<Self, ConfigError> {
        cfg.validate()?;
        let metric = services.registry.resolve(&cfg.api_mode);
        let ft = metric.fetch_type();
        let asset = cfg.cryptocurrency_name.trim().to_lowercase();
        let quote = cfg.currency_name.trim().to_lowercase();
        let pool_prefixes: Vec<String> = cfg.pool_prefix.iter().map(|p| p.trim().to_string()).collect();
        let remaining_pools = ft == FetchType::ChainControl
            && matches!(pool_prefixes.as_slice(), [only] if only.eq_ignore_ascii_case(REMAINING_POOLS));

        let name = match non_empty(cfg.id.as_deref()) {
            Some(id) => format!("{NAME_PREFIX}{id}"),
            None if ft.is_price() => {
                format!("{NAME_PREFIX}{} Price {}", title_case(&asset), quote.to_uppercase())
            }
            None => format!("{NAME_PREFIX}{} {}", friendly_asset(&asset), metric.name()),
        };

        let api_domain = non_empty(cfg.api_domain_name.as_deref()).map(str::to_string);
        let pool_name = non_empty(cfg.pool_name.as_deref()).map(str::to_string);
        if ft == FetchType::NompPoolStats {
            if api_domain.is_none() {
                error!("no api domain name supplied for {name}");
                return Err(ConfigError::MissingApiDomain(name));
            }
            if pool_name.is_none() {
                error!("no pool name supplied for {name}");
                return Err(ConfigError::MissingPoolName(name));
            }
        }
        if ft.is_mempool() && !MEMPOOL_ASSETS.contains(&asset.as_str()) {
            error!("{name} is not bitcoin, mempool data is only available for bitcoin");
            return Err(ConfigError::UnsupportedAsset { entity: name, family: ft.slug() });
        }

        let id = match non_empty(cfg.unique_id.as_deref()) {
            Some(uid) => uid.to_string(),
            None if ft.is_price() => {
                format!("{asset}{quote}{}{}", cfg.multiplier, cfg.update_frequency_secs)
            }
            None => {
                let mut slug = metric.short_id().to_string();
                if ft == FetchType::ChainControl {
                    slug.push('_');
                    slug.push_str(&pool_prefixes.concat());
                }
                format!("{asset}{}{}_{slug}", cfg.multiplier, cfg.update_frequency_secs)
            }
        };

        let cache_key = CacheKey::for_entity(&metric, &asset);
        // the remaining-pools entity never fetches and must not count itself
        if !remaining_pools {
            if cache_key.is_shareable() {
                services.cache.register_interest(&cache_key, cfg.update_frequency_secs).await;
            }
            for &role in ft.source_roles() {
                if !services.sources.register(role, &asset, &id) {
                    warn!("{name}: {role:?} source for {asset} is already provided by another entity");
                }
            }
        }

        let mut children = Vec::with_capacity(cfg.extra_sensors.len());
        for child_cfg in &cfg.extra_sensors {
            let key = match child_cfg.property.parse::<AttrKey>() {
                Ok(k) if is_valid_for(ft, k) => k,
                Ok(k) => {
                    warn!("{name}: attribute {k} is not available for {ft}, skipping child");
                    continue;
                }
                Err(e) => {
                    warn!("{name}: {e}, skipping child");
                    continue;
                }
            };
            let child_metric = services.registry.intern_derived(&metric, key);
            children.push(ChildEntity::new(&id, &name, key, child_metric, child_cfg));
        }

        Ok(Self {
            services,
            metric,
            cache_key,
            id,
            name,
            asset,
            quote,
            unit: cfg.unit_of_measurement.clone(),
            multiplier: cfg.multiplier,
            update_frequency_secs: cfg.update_frequency_secs,
            pool_prefixes,
            remaining_pools,
            fetch_args: cfg.fetch_args.clone(),
            api_domain,
            pool_name,
            params: cfg.chain_params(),
            state: None,
            fields: MetricFields::default(),
            available: true,
            last_updated: None,
            children,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn metric(&self) -> &MetricType {
        &self.metric
    }

    pub fn asset(&self) -> &str {
        &self.asset
    }

    pub fn state(&self) -> Option<f64> {
        self.state
    }

    pub fn fields(&self) -> &MetricFields {
        &self.fields
    }

    pub fn is_available(&self) -> bool {
        self.available
    }

    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.last_updated
    }

    pub fn update_frequency_secs(&self) -> u64 {
        self.update_frequency_secs
    }

    pub fn children(&self) -> &[ChildEntity] {
        &self.children
    }

    /// Runs one tick. Failures are local: they leave the entity unavailable and
    /// never touch the shared cache.
    pub async fn update(&mut self, transport: &dyn Transport) -> UpdateOutcome {
        let ft = self.metric.fetch_type();
        let now = self.services.clock.now();

        let outcome = match self.run(ft, transport, now).await {
            Ok((extraction, outcome)) => {
                self.apply(extraction, now);
                outcome
            }
            Err(e) => {
                error!("error fetching update for {}: {e}", self.name);
                self.clear();
                UpdateOutcome::Failed
            }
        };
        metrics::record_update(ft, outcome.as_str());

        self.publish_sources(ft);
        self.refresh_children(now);
        outcome
    }

    async fn run(
        &self,
        ft: FetchType,
        transport: &dyn Transport,
        now: DateTime<Utc>,
    ) -> Result<(Extraction, UpdateOutcome), AttemptError> {
        if self.remaining_pools {
            return Ok((self.unclaimed_pool_blocks()?, UpdateOutcome::Derived));
        }

        let block_height = match ft {
            FetchType::ChainBlockTime => Some(self.requested_block_height()?),
            _ => None,
        };

        if let (Some(height), Some(state)) = (block_height, self.state) {
            if state > 0.0 && self.fields.block_height == Some(height) {
                debug!("{}: block {height} unchanged, keeping block time", self.name);
                let extraction = Extraction { state, fields: self.fields.clone() };
                return Ok((extraction, UpdateOutcome::Reused));
            }
        }

        let ctx = self.extract_ctx(block_height, now);
        let mut slot = self.services.cache.lock(&self.cache_key).await;

        let primary = self.primary(ft, &ctx, slot.as_mut(), transport, now).await;
        let primary_err = match primary {
            Ok(done) => return Ok(done),
            Err(e) => e,
        };
        drop(slot);

        let Some(alt) = ft.fallback() else {
            return Err(primary_err);
        };
        warn!("{}: {ft} failed ({primary_err}), trying {alt}", self.name);
        metrics::record_fallback(ft);
        let payload = self.fetch(alt, &ctx, block_height, transport).await?;
        let extraction = extract::extract(alt, &payload, &ctx)?;
        Ok((extraction, UpdateOutcome::Fallback))
    }

    /// Share of the last 100 and 1000 blocks left over by the asset's other
    /// chain control entities.
    fn unclaimed_pool_blocks(&self) -> Result<Extraction, ExtractError> {
        let (nb100, nb1000) = self
            .services
            .sources
            .pool_blocks_claimed(&self.asset)
            .ok_or(ExtractError::NoSourceData("chain control"))?;
        Ok(Extraction {
            state: unclaimed_blocks(100, nb100) as f64,
            fields: MetricFields {
                pool_control_1000b: Some(unclaimed_blocks(1000, nb1000)),
                ..MetricFields::default()
            },
        })
    }

    /// Primary attempt. The slot, when present, is held for the whole attempt so
    /// sharers of the key wait for this fetch instead of issuing their own.
    async fn primary(
        &self,
        ft: FetchType,
        ctx: &ExtractContext<'_>,
        slot: Option<&mut CacheSlot>,
        transport: &dyn Transport,
        now: DateTime<Utc>,
    ) -> Result<(Extraction, UpdateOutcome), AttemptError> {
        let ts = now.timestamp();
        if let Some(cached) = slot.as_ref().and_then(|s| s.fresh_payload(ts)) {
            debug!("{}: using cached {ft} payload", self.name);
            metrics::record_cache_reuse(ft);
            let extraction = extract::extract(ft, &cached, ctx)?;
            return Ok((extraction, UpdateOutcome::Cached));
        }

        let payload = self.fetch(ft, ctx, ctx.block_height, transport).await?;
        let extraction = extract::extract(ft, &payload, ctx)?;
        if let Some(slot) = slot {
            slot.store(payload, ts);
        }
        Ok((extraction, UpdateOutcome::Fetched))
    }

    async fn fetch(
        &self,
        ft: FetchType,
        ctx: &ExtractContext<'_>,
        block_height: Option<i64>,
        transport: &dyn Transport,
    ) -> Result<Value, AttemptError> {
        let url = self.url_for(ft, block_height)?;
        debug!("{}: fetching {ft} from {url}", self.name);
        let raw = transport.fetch(&url).await?;
        Ok(extract::narrow(ft, raw, ctx)?)
    }

    fn url_for(&self, ft: FetchType, block_height: Option<i64>) -> Result<String, ExtractError> {
        let e = &self.services.endpoints;
        Ok(match ft {
            FetchType::PriceMain => e.price_main(&self.asset, &self.quote),
            FetchType::PriceSimple => e.price_simple(&self.asset, &self.quote),
            FetchType::Dominance => e.dominance(),
            FetchType::ChainSummary => e.chain_summary(),
            FetchType::ChainControl => e.chain_control(&self.asset),
            FetchType::ChainOrphans => e.chain_orphans(&self.asset),
            FetchType::ChainBlockTime => {
                let height = block_height
                    .ok_or_else(|| ExtractError::InvalidArgument("block height not resolved".into()))?;
                e.chain_block_time(&self.asset, height)
            }
            FetchType::NompPoolStats => {
                let domain = self
                    .api_domain
                    .as_deref()
                    .ok_or_else(|| ExtractError::InvalidArgument("api domain not configured".into()))?;
                e.nomp_pool_stats(domain)
            }
            FetchType::MempoolStats => e.mempool_stats(),
            FetchType::MempoolFees => e.mempool_fees(),
            FetchType::MempoolNextBlock => e.mempool_next_block(),
        })
    }

    fn extract_ctx(&self, block_height: Option<i64>, now: DateTime<Utc>) -> ExtractContext<'_> {
        ExtractContext {
            asset: &self.asset,
            quote: &self.quote,
            multiplier: self.multiplier,
            pool_prefixes: &self.pool_prefixes,
            pool_name: self.pool_name.as_deref(),
            block_height,
            today: now.date_naive(),
        }
    }

    /// First argument if given, else the previous retarget height published by
    /// the asset's chain summary entity.
    fn requested_block_height(&self) -> Result<i64, ExtractError> {
        let sources = &self.services.sources;
        let last_diff = sources.last_difficulty_height(&self.asset);

        let mut context = HashMap::from([("asset", self.asset.clone()), ("quote", self.quote.clone())]);
        if let Some(h) = last_diff {
            context.insert("last_difficulty_height", h.to_string());
        }
        let args = template::fetch_args(self.services.renderer.as_ref(), &self.fetch_args, &context, 1);

        match args.into_iter().next().flatten() {
            Some(arg) => match arg.parse::<i64>() {
                Ok(h) if h >= 0 => Ok(h),
                _ => Err(ExtractError::InvalidArgument(format!("block height {arg:?}"))),
            },
            None => last_diff.ok_or(ExtractError::NoSourceData("chain summary")),
        }
    }

    fn apply(&mut self, extraction: Extraction, now: DateTime<Utc>) {
        self.state = Some(extraction.state);
        self.fields = extraction.fields;
        self.available = true;
        self.last_updated = Some(now);
    }

    fn clear(&mut self) {
        self.state = None;
        self.fields = MetricFields::default();
        self.available = false;
    }

    fn publish_sources(&self, ft: FetchType) {
        if self.remaining_pools {
            return;
        }
        for &role in ft.source_roles() {
            let value = match role {
                SourceRole::Hashrate => self.fields.hashrate,
                SourceRole::BlockTime => self.state,
                SourceRole::LastDifficulty => {
                    previous_retarget_height(self.height(), self.params.difficulty_window).map(|h| h as f64)
                }
                SourceRole::PoolBlocks100 => self.state,
                SourceRole::PoolBlocks1000 => self.fields.pool_control_1000b.map(|n| n as f64),
            };
            self.services.sources.publish(role, &self.asset, &self.id, value);
        }
    }

    fn refresh_children(&mut self, now: DateTime<Utc>) {
        let mut children = mem::take(&mut self.children);
        for child in &mut children {
            let attrs = self.attributes_for_unit(child.unit());
            child.refresh(&attrs, now);
        }
        self.children = children;
    }

    fn height(&self) -> Option<i64> {
        match self.metric.fetch_type() {
            FetchType::ChainSummary => self.state.map(|s| s as i64),
            _ => self.fields.block_height,
        }
    }

    /// Attributes for this entity's own display unit.
    pub fn attributes(&self) -> AttributeMap {
        self.attributes_for_unit(None)
    }

    /// Family-gated attribute map. `unit` only affects the `*_calc` conversions.
    pub fn attributes_for_unit(&self, unit: Option<&str>) -> AttributeMap {
        let ft = self.metric.fetch_type();
        let now = self.services.clock.now();
        let mut map = AttributeMap::new();
        for &key in raw_keys(ft) {
            map.insert(key, self.raw_value(key));
        }

        let derived = derived_keys(ft);
        if derived.is_empty() {
            return map;
        }
        let (retarget, halving) = if ft == FetchType::ChainSummary {
            let height = self.height();
            let inputs = RetargetInputs {
                height,
                difficulty: self.fields.difficulty,
                best_hashrate: self.services.sources.best_hashrate(&self.asset),
                last_retarget_ts: self.services.sources.block_time(&self.asset),
                now: now.timestamp(),
            };
            (
                RetargetProjection::compute(&inputs, &self.params),
                HalvingProjection::compute(height, self.params.halving_window),
            )
        } else {
            (RetargetProjection::default(), HalvingProjection::default())
        };

        for &key in derived {
            let value: Option<AttrValue> = match key {
                AttrKey::BlockTimeInSeconds => retarget.block_time.map(Into::into),
                AttrKey::DifficultyBlockProgress => retarget.block_progress.map(Into::into),
                AttrKey::DifficultyRetargetHeight => retarget.retarget_height.map(Into::into),
                AttrKey::DifficultyPreviousRetargetHeight => retarget.previous_retarget_height.map(Into::into),
                AttrKey::DifficultyRetargetSeconds => retarget.eta_seconds.map(Into::into),
                AttrKey::DifficultyRetargetPercentChange => retarget.percent_change.map(Into::into),
                AttrKey::DifficultyRetargetEstimatedDiff => retarget.estimated_difficulty.map(Into::into),
                AttrKey::DifficultyCalc => scale_to_unit(self.fields.difficulty, unit).map(Into::into),
                AttrKey::HalvingBlockProgress => halving.block_progress.map(Into::into),
                AttrKey::HalvingBlocksRemaining => halving.blocks_remaining.map(Into::into),
                AttrKey::NextHalvingHeight => halving.next_height.map(Into::into),
                AttrKey::TotalHalvingsToDate => halving.total_to_date.map(Into::into),
                AttrKey::HashrateCalc => scale_to_unit(self.fields.hashrate, unit).map(Into::into),
                AttrKey::AllTimeHighDistance => {
                    all_time_high_distance(self.fields.all_time_high, self.fields.base_price).map(Into::into)
                }
                AttrKey::DaysSinceAllTimeHigh => days_since(self.fields.all_time_high_date, now).map(Into::into),
                AttrKey::DaysSinceAllTimeLow => days_since(self.fields.all_time_low_date, now).map(Into::into),
                AttrKey::PoolControl1000bPerc => {
                    pool_control_percentage(self.fields.pool_control_1000b).map(Into::into)
                }
                AttrKey::MempoolSizeCalc => scale_to_unit(self.state, unit).map(Into::into),
                AttrKey::MempoolTotalFeeCalc => {
                    scale_to_currency(self.fields.mempool_total_fee, unit).map(Into::into)
                }
                AttrKey::MempoolAverageFeePerTx => {
                    average_fee_per_tx(self.fields.mempool_total_fee, self.fields.mempool_tx_count).map(Into::into)
                }
                AttrKey::MempoolNextBlockSizeCalc => {
                    scale_to_unit(self.fields.next_block_size.map(|n| n as f64), unit).map(Into::into)
                }
                AttrKey::MempoolNextBlockTotalFeeCalc => {
                    scale_to_currency(self.fields.next_block_total_fee, unit).map(Into::into)
                }
                AttrKey::MempoolNextBlockFeeRangeCombined => {
                    fee_range_combined(self.fields.next_block_fee_range_min, self.fields.next_block_fee_range_max)
                        .map(Into::into)
                }
                _ => None,
            };
            map.insert(key, value);
        }
        map
    }

    fn raw_value(&self, key: AttrKey) -> Option<AttrValue> {
        let f = &self.fields;
        let float = |v: Option<f64>| v.map(AttrValue::Float);
        let int = |v: Option<i64>| v.map(AttrValue::Int);
        match key {
            AttrKey::LastUpdate => self
                .last_updated
                .map(|t| AttrValue::Text(t.format("%d-%m-%Y %H:%M").to_string())),
            AttrKey::BasePrice => float(f.base_price),
            AttrKey::Volume24h => float(f.volume_24h),
            AttrKey::Change1h => float(f.change_1h),
            AttrKey::Change24h => float(f.change_24h),
            AttrKey::Change7d => float(f.change_7d),
            AttrKey::Change30d => float(f.change_30d),
            AttrKey::MarketCap => float(f.market_cap),
            AttrKey::CirculatingSupply => float(f.circulating_supply),
            AttrKey::TotalSupply => float(f.total_supply),
            AttrKey::AllTimeHigh => float(f.all_time_high),
            AttrKey::AllTimeLow => float(f.all_time_low),
            AttrKey::Low24h => float(f.low_24h),
            AttrKey::High24h => float(f.high_24h),
            AttrKey::ImageUrl => f.image_url.clone().map(AttrValue::Text),
            AttrKey::Difficulty => float(f.difficulty),
            AttrKey::Hashrate => float(f.hashrate),
            AttrKey::PoolControl1000b => int(f.pool_control_1000b),
            AttrKey::BlockHeight => int(f.block_height),
            AttrKey::WorkerCount => int(f.worker_count),
            AttrKey::LastBlock => int(f.last_block),
            AttrKey::BlocksPending => int(f.blocks_pending),
            AttrKey::BlocksConfirmed => int(f.blocks_confirmed),
            AttrKey::BlocksOrphaned => int(f.blocks_orphaned),
            AttrKey::MempoolTxCount => int(f.mempool_tx_count),
            AttrKey::MempoolTotalFee => int(f.mempool_total_fee),
            AttrKey::MempoolFeesFastest => int(f.fees_fastest),
            AttrKey::MempoolFees30min => int(f.fees_30min),
            AttrKey::MempoolFees60min => int(f.fees_60min),
            AttrKey::MempoolFeesEco => int(f.fees_eco),
            AttrKey::MempoolFeesMinimum => int(f.fees_minimum),
            AttrKey::MempoolNextBlockSize => int(f.next_block_size),
            AttrKey::MempoolNextBlockTxCount => int(f.next_block_tx_count),
            AttrKey::MempoolNextBlockTotalFee => int(f.next_block_total_fee),
            AttrKey::MempoolNextBlockMedianFee => int(f.next_block_median_fee),
            AttrKey::MempoolNextBlockFeeRangeMin => int(f.next_block_fee_range_min),
            AttrKey::MempoolNextBlockFeeRangeMax => int(f.next_block_fee_range_max),
            _ => None,
        }
    }

    /// State as published: integers for heights, counts and timestamps.
    pub fn state_value(&self) -> Option<AttrValue> {
        let s = self.state?;
        Some(if self.metric.fetch_type().integer_state() {
            AttrValue::Int(s as i64)
        } else {
            AttrValue::Float(s)
        })
    }

    pub fn snapshot(&self) -> EntitySnapshot {
        EntitySnapshot {
            id: self.id.clone(),
            name: self.name.clone(),
            metric: self.metric.clone(),
            state: self.state_value(),
            available: self.available,
            last_updated: self.last_updated,
            unit: non_empty(Some(self.unit.as_str())).map(str::to_string),
            device_class: self.metric.fetch_type().device_class(),
            attributes: self.attributes(),
        }
    }

    /// Snapshot of this entity followed by one per child.
    pub fn snapshots(&self) -> Vec<EntitySnapshot> {
        let mut out = Vec::with_capacity(1 + self.children.len());
        out.push(self.snapshot());
        out.extend(self.children.iter().map(ChildEntity::snapshot));
        out
    }
}
