//! Backtest result record (§3): the statistics and series a completed
//! run exposes.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::order::Trade;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NetValuePoint {
    pub date: NaiveDate,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    pub initial_cash: f64,
    pub final_value: f64,
    pub total_return: f64,
    pub annual_return: f64,
    pub sharpe_ratio: f64,
    pub max_drawdown: f64,
    pub win_rate: f64,
    pub trade_count: usize,
    pub net_value_series: Vec<NetValuePoint>,
    pub trades: Vec<Trade>,
}
