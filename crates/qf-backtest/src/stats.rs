//! Backtest statistics (§4.5 last paragraph, §9 Numeric semantics),
//! grounded on `simple_backtest.py::_calculate_stats`.

use qf_types::{BacktestResult, NetValuePoint, Side, Trade};

/// Trading days per year used to annualize the Sharpe ratio.
const TRADING_DAYS_PER_YEAR: f64 = 252.0;
/// Calendar days per year used to annualize total return.
const CALENDAR_DAYS_PER_YEAR: f64 = 365.0;

/// Compute the full `BacktestResult` from a completed replay's net
/// value series and trade log. An empty series (no dates fell in
/// range) short-circuits to the flat, no-trade result.
pub fn compute_stats(initial_cash: f64, series: &[NetValuePoint], trades: &[Trade]) -> BacktestResult {
    if series.is_empty() {
        return BacktestResult {
            initial_cash,
            final_value: initial_cash,
            total_return: 0.0,
            annual_return: 0.0,
            sharpe_ratio: 0.0,
            max_drawdown: 0.0,
            win_rate: 0.0,
            trade_count: 0,
            net_value_series: Vec::new(),
            trades: Vec::new(),
        };
    }

    let values: Vec<f64> = series.iter().map(|p| p.value).collect();
    let final_value = *values.last().expect("series non-empty");
    let total_return = (final_value - initial_cash) / initial_cash;

    let days = (series.last().unwrap().date - series.first().unwrap().date)
        .num_days()
        .max(1) as f64;
    let annual_return = (1.0 + total_return).powf(CALENDAR_DAYS_PER_YEAR / days) - 1.0;

    let daily_returns: Vec<f64> = values
        .windows(2)
        .filter(|w| w[0] > 0.0)
        .map(|w| w[1] / w[0] - 1.0)
        .collect();

    let sharpe_ratio = if daily_returns.is_empty() {
        0.0
    } else {
        let mean = daily_returns.iter().sum::<f64>() / daily_returns.len() as f64;
        let variance =
            daily_returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / daily_returns.len() as f64;
        let std = variance.sqrt();
        if std > 0.0 {
            mean / std * TRADING_DAYS_PER_YEAR.sqrt()
        } else {
            0.0
        }
    };

    let mut peak = values[0];
    let mut max_drawdown = 0.0_f64;
    for &value in &values {
        if value > peak {
            peak = value;
        }
        let drawdown = if peak > 0.0 { (peak - value) / peak } else { 0.0 };
        if drawdown > max_drawdown {
            max_drawdown = drawdown;
        }
    }

    let sell_trades: Vec<&Trade> = trades.iter().filter(|t| t.side == Side::Sell).collect();
    let win_rate = if sell_trades.is_empty() {
        0.0
    } else {
        sell_trades.iter().filter(|t| t.pnl > 0.0).count() as f64 / sell_trades.len() as f64
    };

    BacktestResult {
        initial_cash,
        final_value,
        total_return,
        annual_return,
        sharpe_ratio,
        max_drawdown,
        win_rate,
        trade_count: trades.len(),
        net_value_series: series.to_vec(),
        trades: trades.to_vec(),
    }
}
