// src/config.rs
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::error::ConfigError;
use crate::providers::endpoints::{COINGECKO_BASE_URL, CRYPTOID_BASE_URL, MEMPOOL_BASE_URL};
use crate::providers::http::DEFAULT_TIMEOUT_SECS;
use crate::types::{
    ChainParams, DEFAULT_CHAIN_BLOCK_TIME_MINS, DEFAULT_CHAIN_DIFFICULTY_WINDOW,
    DEFAULT_CHAIN_DIFF_MULTIPLIER, DEFAULT_CHAIN_HALVING_WINDOW,
};

/// Whole config file: a `[daemon]` table and an `[[entities]]` array.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CryptoinfoConfig {
    #[serde(default)]                            pub daemon: DaemonConfig,
    #[serde(default)]                            pub entities: Vec<EntityConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DaemonConfig {
    #[serde(default = "d_coingecko")]            pub coingecko_base_url: String,
    #[serde(default = "d_cryptoid")]             pub cryptoid_base_url: String,
    #[serde(default = "d_mempool")]              pub mempool_base_url: String,
    #[serde(default = "d_timeout_secs")]         pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EntityConfig {
    #[serde(default)]                            pub id: Option<String>,
    #[serde(default)]                            pub unique_id: Option<String>,
    #[serde(default = "d_cryptocurrency")]       pub cryptocurrency_name: String,
    #[serde(default = "d_currency")]             pub currency_name: String,
    #[serde(default = "d_unit")]                 pub unit_of_measurement: String,
    #[serde(default = "d_multiplier")]           pub multiplier: f64,
    #[serde(default = "d_update_secs")]          pub update_frequency_secs: u64,
    #[serde(default)]                            pub api_mode: String,
    #[serde(default)]                            pub pool_prefix: Vec<String>,
    #[serde(default)]                            pub fetch_args: String,
    #[serde(default)]                            pub api_domain_name: Option<String>,
    #[serde(default)]                            pub pool_name: Option<String>,
    #[serde(default = "d_diff_multiplier")]      pub diff_multiplier: f64,
    #[serde(default = "d_block_time_minutes")]   pub block_time_minutes: f64,
    #[serde(default = "d_difficulty_window")]    pub difficulty_window: i64,
    #[serde(default = "d_halving_window")]       pub halving_window: i64,
    #[serde(default)]                            pub extra_sensors: Vec<ChildSensorConfig>,
}

/// A child entity bound to one attribute of its parent.
#[derive(Debug, Clone, Deserialize)]
pub struct ChildSensorConfig {
    pub property: String,
    #[serde(default)]                            pub id: Option<String>,
    #[serde(default)]                            pub unique_id: Option<String>,
    #[serde(default)]                            pub unit_of_measurement: Option<String>,
}

fn d_coingecko() -> String { COINGECKO_BASE_URL.into() }
fn d_cryptoid() -> String { CRYPTOID_BASE_URL.into() }
fn d_mempool() -> String { MEMPOOL_BASE_URL.into() }
fn d_timeout_secs() -> u64 { DEFAULT_TIMEOUT_SECS }
fn d_cryptocurrency() -> String { "bitcoin".into() }
fn d_currency() -> String { "usd".into() }
fn d_unit() -> String { "$".into() }
fn d_multiplier() -> f64 { 1.0 }
fn d_update_secs() -> u64 { 60 }
fn d_diff_multiplier() -> f64 { DEFAULT_CHAIN_DIFF_MULTIPLIER }
fn d_block_time_minutes() -> f64 { DEFAULT_CHAIN_BLOCK_TIME_MINS }
fn d_difficulty_window() -> i64 { DEFAULT_CHAIN_DIFFICULTY_WINDOW }
fn d_halving_window() -> i64 { DEFAULT_CHAIN_HALVING_WINDOW }

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            coingecko_base_url: d_coingecko(),
            cryptoid_base_url: d_cryptoid(),
            mempool_base_url: d_mempool(),
            request_timeout_secs: d_timeout_secs(),
        }
    }
}

impl Default for EntityConfig {
    fn default() -> Self {
        Self {
            id: None,
            unique_id: None,
            cryptocurrency_name: d_cryptocurrency(),
            currency_name: d_currency(),
            unit_of_measurement: d_unit(),
            multiplier: d_multiplier(),
            update_frequency_secs: d_update_secs(),
            api_mode: String::new(),
            pool_prefix: Vec::new(),
            fetch_args: String::new(),
            api_domain_name: None,
            pool_name: None,
            diff_multiplier: d_diff_multiplier(),
            block_time_minutes: d_block_time_minutes(),
            difficulty_window: d_difficulty_window(),
            halving_window: d_halving_window(),
            extra_sensors: Vec::new(),
        }
    }
}

impl CryptoinfoConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let cfg: Self = toml::from_str(s)?;
        for e in &cfg.entities {
            e.validate()?;
        }
        Ok(cfg)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }
}

fn invalid(field: &'static str, value: impl ToString) -> ConfigError {
    ConfigError::InvalidValue { field, value: value.to_string() }
}

impl EntityConfig {
    /// Rejects values the schedule and the chain formulas cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cryptocurrency_name.trim().is_empty() {
            return Err(invalid("cryptocurrency_name", &self.cryptocurrency_name));
        }
        if self.update_frequency_secs == 0 {
            return Err(invalid("update_frequency_secs", self.update_frequency_secs));
        }
        if !self.multiplier.is_finite() {
            return Err(invalid("multiplier", self.multiplier));
        }
        if !(self.diff_multiplier.is_finite() && self.diff_multiplier > 0.0) {
            return Err(invalid("diff_multiplier", self.diff_multiplier));
        }
        if !(self.block_time_minutes.is_finite() && self.block_time_minutes > 0.0) {
            return Err(invalid("block_time_minutes", self.block_time_minutes));
        }
        if self.difficulty_window <= 0 {
            return Err(invalid("difficulty_window", self.difficulty_window));
        }
        if self.halving_window <= 0 {
            return Err(invalid("halving_window", self.halving_window));
        }
        Ok(())
    }

    pub fn chain_params(&self) -> ChainParams {
        ChainParams {
            diff_multiplier: self.diff_multiplier,
            block_time_minutes: self.block_time_minutes,
            difficulty_window: self.difficulty_window,
            halving_window: self.halving_window,
        }
    }

    #[inline]
    pub fn update_frequency(&self) -> Duration {
        Duration::from_secs(self.update_frequency_secs)
    }
}
