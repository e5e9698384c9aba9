//! The bar-replay backtest driver (§4.5, §8 scenarios), grounded on
//! `simple_backtest.py::SimpleBacktestEngine.run`/`_process_bar`.
//!
//! `BacktestDriver::run` implements the ten-step replay loop of §4.5:
//! per-day price update, strategy invocation, signal normalization, an
//! optional risk-engine pass, matching, commission, buy/sell against
//! the portfolio under the skip-on-failure policy of §7, day-end
//! settlement, and net-value-series accumulation, finishing with the
//! statistics computed by [`crate::stats::compute_stats`].

use std::collections::BTreeMap;

use chrono::NaiveDate;
use qf_engine::{Context, Strategy};
use qf_risk::RiskManager;
use qf_types::{
    AggregatedBar, Bar, BacktestResult, FrameworkConfig, NetValuePoint, Portfolio, Result,
    SettlementMode, Side, Symbol, Trade,
};
use tracing::{debug, info};

use crate::matcher::match_aggregated;
use crate::raw_bar::{self, RawBar};
use crate::signals::normalize_signals;
use crate::stats::compute_stats;

/// Parameters governing one backtest run, independent of the shared
/// `FrameworkConfig` a strategy/plugin reads through `Context` (§6's
/// configuration record has no slippage field; it is a driver-level
/// execution-model knob, matching `SimpleBacktestEngine.__init__`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BacktestSettings {
    pub initial_cash: f64,
    pub mode: SettlementMode,
    pub commission_rate: f64,
    pub slippage: f64,
}

impl Default for BacktestSettings {
    /// Mirrors `SimpleBacktestEngine`'s defaults: 100,000 cash, T+0,
    /// 3bps commission, 10bps slippage.
    fn default() -> Self {
        Self {
            initial_cash: 100_000.0,
            mode: SettlementMode::T0,
            commission_rate: 0.0003,
            slippage: 0.001,
        }
    }
}

/// Orchestrates one deterministic replay of `bars` through `strategy`
/// (§4.5, P8).
pub struct BacktestDriver {
    settings: BacktestSettings,
}

impl BacktestDriver {
    pub fn new(settings: BacktestSettings) -> Self {
        Self { settings }
    }

    /// Run the replay loop over `[start_date, end_date]` (inclusive)
    /// and return the completed statistics (§4.5).
    pub fn run(
        &self,
        strategy: &mut dyn Strategy,
        config: FrameworkConfig,
        bars: &[RawBar],
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<BacktestResult> {
        let portfolio = Portfolio::new(self.settings.initial_cash, self.settings.mode)?;
        let mut ctx = Context::new(config, portfolio, RiskManager::new());

        strategy.on_init(&mut ctx)?;

        let daily_bars = self.aggregate_by_day(bars, start_date, end_date)?;

        let mut latest_prices: BTreeMap<Symbol, f64> = BTreeMap::new();
        let mut trades: Vec<Trade> = Vec::new();
        let mut net_value_series: Vec<NetValuePoint> = Vec::new();

        for (date, day_bars) in &daily_bars {
            for bar in day_bars {
                latest_prices.insert(bar.symbol.clone(), bar.close);
            }

            let aggregated = AggregatedBar {
                date: *date,
                cb_data: day_bars.clone(),
            };
            debug!(date = %date, bar_count = day_bars.len(), "day start");

            let signals = strategy.on_bar(&mut ctx, &aggregated)?;
            let orders = normalize_signals(&signals);

            for order in orders {
                let outcome = ctx.risk_manager.check_order(&order, &ctx.portfolio, &latest_prices)?;
                if !outcome.passed {
                    debug!(symbol = %order.symbol, violations = ?outcome.violations, "order blocked by risk engine");
                    continue;
                }

                let Some(fill) = match_aggregated(&order, &latest_prices, &ctx.portfolio, self.settings.slippage)
                else {
                    continue;
                };
                let commission = fill.amount * self.settings.commission_rate;

                match fill.side {
                    Side::Buy => {
                        if fill.amount + commission > ctx.portfolio.cash {
                            continue;
                        }
                        ctx.portfolio.buy(fill.symbol.clone(), fill.quantity, fill.price, *date)?;
                        ctx.portfolio.cash -= commission;
                        debug!(symbol = %fill.symbol, quantity = fill.quantity, price = fill.price, "buy filled");
                        trades.push(Trade::new(
                            *date,
                            fill.symbol,
                            Side::Buy,
                            fill.quantity,
                            fill.price,
                            commission,
                            0.0,
                        ));
                    }
                    Side::Sell => {
                        let realized_pnl = match ctx.portfolio.sell(fill.symbol.clone(), fill.quantity, fill.price, *date)
                        {
                            Ok(pnl) => pnl,
                            Err(err) => {
                                debug!(symbol = %fill.symbol, error = %err, "sell skipped");
                                continue;
                            }
                        };
                        ctx.portfolio.cash -= commission;
                        debug!(symbol = %fill.symbol, quantity = fill.quantity, price = fill.price, "sell filled");
                        trades.push(Trade::new(
                            *date,
                            fill.symbol,
                            Side::Sell,
                            fill.quantity,
                            fill.price,
                            commission,
                            realized_pnl - commission,
                        ));
                    }
                }
            }

            ctx.portfolio.settle_day(*date);
            let value = ctx.portfolio.get_total_value(&latest_prices);
            net_value_series.push(NetValuePoint { date: *date, value });
            info!(date = %date, value, trade_count = trades.len(), "day end");
        }

        let result = compute_stats(self.settings.initial_cash, &net_value_series, &trades);
        info!(
            final_value = result.final_value,
            total_return = result.total_return,
            trade_count = result.trade_count,
            "backtest finished"
        );
        Ok(result)
    }

    /// Coerce each raw bar's date and group survivors (those falling in
    /// `[start_date, end_date]`) by trading date (§4.5 "Aggregation").
    fn aggregate_by_day(
        &self,
        bars: &[RawBar],
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<BTreeMap<NaiveDate, Vec<Bar>>> {
        let mut daily: BTreeMap<NaiveDate, Vec<Bar>> = BTreeMap::new();
        for raw in bars {
            let bar = raw_bar::normalize(raw)?;
            if bar.date >= start_date && bar.date <= end_date {
                daily.entry(bar.date).or_default().push(bar);
            }
        }
        Ok(daily)
    }
}
