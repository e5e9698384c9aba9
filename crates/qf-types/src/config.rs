//! Validated configuration record (§6, SPEC_FULL §2).
//!
//! Loading from TOML/env and CLI argument parsing are external-loader
//! responsibilities; this module only carries the validated shape, mirroring
//! the teacher's habit of deriving `Serialize`/`Deserialize` on every public
//! record even where the core never performs I/O itself.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::portfolio::SettlementMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Dev,
    Test,
    Prod,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetType {
    Stock,
    Cb,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    Primary,
    Backup,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyName {
    DoubleLow,
    Macd,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub worker_count: u32,
    pub queue_size: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginsConfig {
    pub enabled: Vec<String>,
    pub autoload: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AssetTypeSpec {
    pub settlement: SettlementMode,
    pub lot_size: u32,
    pub fee_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetConfig {
    pub kind: AssetType,
    pub params: serde_json::Value,
}

/// Tagged strategy parameters, discriminated by `StrategyName`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum StrategyParams {
    DoubleLow {
        price_max: f64,
        premium_max: f64,
        top_n: u32,
    },
    Macd {
        fast: u32,
        slow: u32,
        signal: u32,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyConfig {
    pub name: StrategyName,
    pub params: StrategyParams,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSourceConfig {
    pub primary: Provider,
    pub backup: Provider,
    pub cache_dir: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BacktestConfig {
    pub initial_capital: f64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub fee_rate: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskConfig {
    pub max_position_ratio: f64,
    pub stop_loss_ratio: f64,
}

/// The canonical configuration record (extended form; the short form the
/// original source also carried is discarded per the Open Question in §9).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameworkConfig {
    pub environment: Environment,
    pub engine: EngineConfig,
    pub logging: LoggingConfig,
    pub plugins: PluginsConfig,
    pub asset_types: std::collections::BTreeMap<AssetType, AssetTypeSpec>,
    pub asset: AssetConfig,
    pub strategy: StrategyConfig,
    pub data_source: DataSourceConfig,
    pub backtest: BacktestConfig,
    pub risk: RiskConfig,
}

impl FrameworkConfig {
    /// Enforce the cross-field invariants spec calls out explicitly:
    /// `fast < slow` for MACD params, `end_date >= start_date` for the
    /// backtest window, plus the per-field range checks named in §6.
    pub fn validate(self) -> Result<Self> {
        if self.engine.worker_count < 1 {
            return Err(Error::config("engine.worker_count must be >= 1"));
        }
        if self.engine.queue_size < 1 {
            return Err(Error::config("engine.queue_size must be >= 1"));
        }
        for (asset_type, spec) in &self.asset_types {
            if spec.lot_size < 1 {
                return Err(Error::config(format!(
                    "asset_types.{asset_type:?}.lot_size must be >= 1"
                )));
            }
            if !(0.0..=0.01).contains(&spec.fee_rate) || spec.fee_rate == 0.0 {
                return Err(Error::config(format!(
                    "asset_types.{asset_type:?}.fee_rate must be in (0, 0.01]"
                )));
            }
        }
        if let StrategyParams::Macd { fast, slow, .. } = &self.strategy.params {
            if fast >= slow {
                return Err(Error::config("strategy.params.fast must be < slow"));
            }
        }
        if self.backtest.initial_capital <= 0.0 {
            return Err(Error::config("backtest.initial_capital must be > 0"));
        }
        if self.backtest.end_date < self.backtest.start_date {
            return Err(Error::config("backtest.end_date must be >= start_date"));
        }
        if !(0.0..=0.01).contains(&self.backtest.fee_rate) {
            return Err(Error::config("backtest.fee_rate must be in [0, 0.01]"));
        }
        if !(0.0..=1.0).contains(&self.risk.max_position_ratio) || self.risk.max_position_ratio == 0.0
        {
            return Err(Error::config("risk.max_position_ratio must be in (0, 1]"));
        }
        if !(0.0..=1.0).contains(&self.risk.stop_loss_ratio) || self.risk.stop_loss_ratio == 0.0 {
            return Err(Error::config("risk.stop_loss_ratio must be in (0, 1]"));
        }
        Ok(self)
    }
}
