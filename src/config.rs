//! TOML configuration loading and validation.

use std::path::Path;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::query::ValuationField;
use crate::types::SecurityKind;

/// Top-level strategy configuration. Every section may be omitted.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StrategyConfig {
    #[serde(default)]
    pub universe: UniverseConfig,
    #[serde(default)]
    pub filter: FilterConfig,
    #[serde(default)]
    pub selection: SelectionConfig,
    #[serde(default)]
    pub rebalance: RebalanceConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UniverseConfig {
    #[serde(default)]
    pub kind: SecurityKind,
    /// Pre-rank the listing and keep only the `pool_size` smallest.
    /// `None` passes the whole listing to the filter.
    #[serde(default)]
    pub pool_size: Option<usize>,
}

impl Default for UniverseConfig {
    fn default() -> Self {
        Self {
            kind: SecurityKind::Stock,
            pool_size: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FilterConfig {
    #[serde(default = "default_special_treatment")]
    pub special_treatment_prefixes: Vec<String>,
    #[serde(default = "default_min_listing_days")]
    pub min_listing_days: i64,
    #[serde(default = "default_excluded_prefixes")]
    pub excluded_prefixes: Vec<String>,
    #[serde(default = "default_lookback")]
    pub session_lookback_days: i64,
    #[serde(default = "default_true")]
    pub exclude_limit_up: bool,
}

fn default_special_treatment() -> Vec<String> {
    vec!["ST".into(), "*ST".into()]
}
fn default_min_listing_days() -> i64 {
    20
}
fn default_excluded_prefixes() -> Vec<String> {
    vec!["N".into()]
}
fn default_lookback() -> i64 {
    1
}
fn default_true() -> bool {
    true
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            special_treatment_prefixes: default_special_treatment(),
            min_listing_days: default_min_listing_days(),
            excluded_prefixes: default_excluded_prefixes(),
            session_lookback_days: default_lookback(),
            exclude_limit_up: default_true(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SelectionConfig {
    #[serde(default = "default_top_n")]
    pub top_n: usize,
    #[serde(default)]
    pub rank_by: ValuationField,
}

fn default_top_n() -> usize {
    100
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            top_n: default_top_n(),
            rank_by: ValuationField::CirculatingMarketCap,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RebalanceConfig {
    /// Skip a target-value order when the holding's weight is already within
    /// this distance of its target. 0.0 always orders.
    #[serde(default)]
    pub min_weight_drift: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleConfig {
    /// 1 = first trading session of the month, -1 = last.
    #[serde(default = "default_monthday")]
    pub monthday: i32,
    #[serde(default = "default_benchmark")]
    pub benchmark: String,
    #[serde(default = "default_true")]
    pub use_real_price: bool,
}

fn default_monthday() -> i32 {
    1
}
fn default_benchmark() -> String {
    "000300.XSHG".into()
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            monthday: default_monthday(),
            benchmark: default_benchmark(),
            use_real_price: default_true(),
        }
    }
}

impl StrategyConfig {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::ConfigRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml(&contents)
    }

    /// Parse and validate a TOML string.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: StrategyConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate config invariants.
    pub fn validate(&self) -> Result<()> {
        if self.universe.pool_size == Some(0) {
            return Err(Error::Config("universe.pool_size must be > 0".into()));
        }
        if self.selection.top_n == 0 {
            return Err(Error::Config("selection.top_n must be > 0".into()));
        }
        if self.filter.min_listing_days < 0 {
            return Err(Error::Config("filter.min_listing_days must be >= 0".into()));
        }
        if self.filter.session_lookback_days < 0 {
            return Err(Error::Config(
                "filter.session_lookback_days must be >= 0".into(),
            ));
        }
        if self.filter.special_treatment_prefixes.iter().any(String::is_empty)
            || self.filter.excluded_prefixes.iter().any(String::is_empty)
        {
            return Err(Error::Config(
                "empty prefix would exclude every security".into(),
            ));
        }
        let drift = self.rebalance.min_weight_drift;
        if !drift.is_finite() || !(0.0..1.0).contains(&drift) {
            return Err(Error::Config(
                "rebalance.min_weight_drift must be in [0.0, 1.0)".into(),
            ));
        }
        if self.schedule.monthday == 0 {
            return Err(Error::Config(
                "schedule.monthday must be non-zero (1 = first, -1 = last)".into(),
            ));
        }
        Ok(())
    }
}
