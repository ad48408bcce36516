//! Strategy configuration: TOML-loadable, validated, immutable per session.
//!
//! Every field has a default, so an empty TOML document is a valid config:
//!
//! ```toml
//! max_positions = 2
//! profit_threshold = 0.14
//! max_hold_days = 3
//! entry_time = "14:55"
//!
//! [screener]
//! max_body_ratio = 0.3
//! ```

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config {path}: {message}")]
    Read { path: String, message: String },

    #[error("parse config TOML: {0}")]
    Parse(String),

    #[error("invalid config: {field} {message}")]
    Invalid { field: &'static str, message: String },
}

fn invalid(field: &'static str, message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        message: message.into(),
    }
}

/// Thresholds for the same-day price-action screen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenerThresholds {
    /// Prior daily bars required before screening.
    pub min_history_bars: usize,
    /// Today's low must be >= yesterday's close times this.
    pub floor_ratio: f64,
    /// Today's high must be < yesterday's close times this.
    pub ceiling_ratio: f64,
    /// Max `|last - open| / (high - low)`.
    pub max_body_ratio: f64,
    /// Current price must be <= yesterday's close times this.
    pub max_extension_ratio: f64,
}

impl Default for ScreenerThresholds {
    fn default() -> Self {
        Self {
            min_history_bars: 2,
            floor_ratio: 0.999,
            ceiling_ratio: 1.091,
            max_body_ratio: 0.3,
            max_extension_ratio: 1.05,
        }
    }
}

/// Multipliers used by the exit rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExitThresholds {
    /// Day-1 stop at `limit_up_high * day1_stop_ratio`.
    pub day1_stop_ratio: f64,
    /// Later-day stop at `limit_up_high * later_stop_ratio`.
    pub later_stop_ratio: f64,
    /// Rebound from the intraday low that takes profit.
    pub rebound_take_profit: f64,
}

impl Default for ExitThresholds {
    fn default() -> Self {
        Self {
            day1_stop_ratio: 0.96,
            later_stop_ratio: 0.99,
            rebound_take_profit: 0.07,
        }
    }
}

/// Price the resistance level must clear by `margin`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResistanceReference {
    /// The tick's price. The level then always sits above the price, so the
    /// breach rule only fires if the level is supplied from another snapshot.
    #[default]
    CurrentPrice,
    /// The position's cost basis: the nearest heavy prior high above entry.
    CostBasis,
}

/// Resistance estimator parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResistanceParams {
    /// Daily bars requested from the feed.
    pub lookback_bars: usize,
    /// Fewer bars than this yields no resistance.
    pub min_bars: usize,
    /// Bars on each side a local high must dominate.
    pub pivot_window: usize,
    /// Bars on each side averaged into the volume weight.
    pub volume_window: usize,
    /// A level must exceed `reference * margin`.
    pub margin: f64,
    pub reference: ResistanceReference,
}

impl Default for ResistanceParams {
    fn default() -> Self {
        Self {
            lookback_bars: 60,
            min_bars: 30,
            pivot_window: 5,
            volume_window: 2,
            margin: 1.02,
            reference: ResistanceReference::CurrentPrice,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    pub max_positions: usize,
    /// Fixed take-profit as a fraction of cost basis.
    pub profit_threshold: f64,
    pub max_hold_days: u32,
    /// Smallest order notional worth placing.
    pub min_order_value: f64,
    /// Time of day at which entries are evaluated.
    #[serde(with = "hhmm")]
    pub entry_time: NaiveTime,
    /// Records older than this many calendar days are evicted.
    pub stale_record_days: i64,
    /// Daily price-limit as a fraction of the previous close.
    pub limit_up_ratio: f64,
    /// A price within this distance of the limit counts as limit-up.
    pub limit_up_tolerance: f64,
    pub screener: ScreenerThresholds,
    pub exit: ExitThresholds,
    pub resistance: ResistanceParams,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            max_positions: 2,
            profit_threshold: 0.14,
            max_hold_days: 3,
            min_order_value: 1000.0,
            entry_time: NaiveTime::from_hms_opt(14, 55, 0).unwrap_or(NaiveTime::MIN),
            stale_record_days: 10,
            limit_up_ratio: 0.10,
            limit_up_tolerance: 0.01,
            screener: ScreenerThresholds::default(),
            exit: ExitThresholds::default(),
            resistance: ResistanceParams::default(),
        }
    }
}

impl StrategyConfig {
    /// Load and validate a config from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate a config from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_positions < 1 {
            return Err(invalid("max_positions", "must be >= 1"));
        }
        if !(self.profit_threshold > 0.0) {
            return Err(invalid("profit_threshold", "must be > 0"));
        }
        if self.max_hold_days < 1 {
            return Err(invalid("max_hold_days", "must be >= 1"));
        }
        if !(self.min_order_value >= 0.0) {
            return Err(invalid("min_order_value", "must be >= 0"));
        }
        if self.stale_record_days < 0 {
            return Err(invalid("stale_record_days", "must be >= 0"));
        }
        if !(self.limit_up_ratio > 0.0) {
            return Err(invalid("limit_up_ratio", "must be > 0"));
        }
        if !(self.limit_up_tolerance >= 0.0) {
            return Err(invalid("limit_up_tolerance", "must be >= 0"));
        }

        let s = &self.screener;
        if s.min_history_bars < 2 {
            return Err(invalid("screener.min_history_bars", "must be >= 2"));
        }
        if !(s.max_body_ratio >= 0.0) {
            return Err(invalid("screener.max_body_ratio", "must be >= 0"));
        }
        if !(s.floor_ratio > 0.0 && s.ceiling_ratio > s.floor_ratio) {
            return Err(invalid("screener.ceiling_ratio", "must exceed floor_ratio > 0"));
        }

        let e = &self.exit;
        if !(e.day1_stop_ratio > 0.0 && e.later_stop_ratio > 0.0) {
            return Err(invalid("exit", "stop ratios must be > 0"));
        }
        if !(e.rebound_take_profit > 0.0) {
            return Err(invalid("exit.rebound_take_profit", "must be > 0"));
        }

        let r = &self.resistance;
        if r.pivot_window == 0 {
            return Err(invalid("resistance.pivot_window", "must be >= 1"));
        }
        if r.min_bars < 2 * r.pivot_window + 1 {
            return Err(invalid(
                "resistance.min_bars",
                format!("must be >= {} (2 * pivot_window + 1)", 2 * r.pivot_window + 1),
            ));
        }
        if r.lookback_bars < r.min_bars {
            return Err(invalid("resistance.lookback_bars", "must be >= min_bars"));
        }
        if !(r.margin >= 1.0) {
            return Err(invalid("resistance.margin", "must be >= 1.0"));
        }
        Ok(())
    }
}

/// `HH:MM` (de)serialization for times of day.
mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&time.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(d)?;
        NaiveTime::parse_from_str(&raw, "%H:%M").map_err(serde::de::Error::custom)
    }
}
