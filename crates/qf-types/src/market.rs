//! Normalized market data types.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub type Symbol = String;

/// One normalized OHLCV record for a symbol, as returned by a data-source
/// adapter (§6). `date` is the trading date the bar belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub symbol: Symbol,
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub amount: f64,
}

/// All bars sharing one trading date, grouped into the object passed to a
/// strategy's `on_bar`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedBar {
    pub date: NaiveDate,
    pub cb_data: Vec<Bar>,
}
