//! Deterministic bar-replay backtest driver (§4.5): fuses the
//! portfolio, risk engine and event/plugin machinery of `qf-engine`/
//! `qf-risk` into the single `BacktestDriver::run` entry point.

pub mod driver;
pub mod matcher;
pub mod raw_bar;
pub mod signals;
pub mod stats;

pub use driver::{BacktestDriver, BacktestSettings};
pub use matcher::{match_aggregated, match_single, Fill};
pub use raw_bar::{coerce_date, normalize as normalize_bar, RawBar, RawDate};
pub use signals::{normalize_signal, normalize_signals};
pub use stats::compute_stats;
