//! Position and portfolio accounting: weighted-average cost, T+0/T+1
//! settlement (§3, §4.2, §8 P1/P2).

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::market::Symbol;

/// Settlement mode governing when bought shares become sellable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SettlementMode {
    /// Same-day resale allowed.
    T0,
    /// Shares become available the day after `settle_day` releases them.
    T1,
}

/// One symbol's holding. Removed from the portfolio once `quantity` reaches
/// zero. Invariant: `0 <= available <= quantity`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: Symbol,
    pub quantity: u64,
    pub avg_cost: f64,
    pub available: u64,
    pub last_buy_date: Option<NaiveDate>,
}

fn validate_trade_input(symbol: &str, quantity: u64, price: f64) -> Result<()> {
    if symbol.trim().is_empty() {
        return Err(Error::validation("trade symbol must not be empty"));
    }
    if quantity == 0 {
        return Err(Error::validation("trade quantity must be positive"));
    }
    if price <= 0.0 {
        return Err(Error::validation("trade price must be positive"));
    }
    Ok(())
}

/// Cash, positions and settlement state for one backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Portfolio {
    pub initial_cash: f64,
    pub cash: f64,
    pub mode: SettlementMode,
    pub positions: BTreeMap<Symbol, Position>,
    /// Quantities bought on a given date, held aside until `settle_day`
    /// releases them into `available` (T+1 only).
    pub pending_t1: BTreeMap<NaiveDate, BTreeMap<Symbol, u64>>,
}

impl Portfolio {
    pub fn new(initial_cash: f64, mode: SettlementMode) -> Result<Self> {
        if initial_cash < 0.0 {
            return Err(Error::validation("initial cash must not be negative"));
        }
        Ok(Self {
            initial_cash,
            cash: initial_cash,
            mode,
            positions: BTreeMap::new(),
            pending_t1: BTreeMap::new(),
        })
    }

    /// Buy `quantity` shares of `symbol` at `price`, settling on `date`.
    pub fn buy(
        &mut self,
        symbol: impl Into<Symbol>,
        quantity: u64,
        price: f64,
        date: NaiveDate,
    ) -> Result<()> {
        let symbol = symbol.into();
        validate_trade_input(&symbol, quantity, price)?;
        let cost = quantity as f64 * price;
        if cost > self.cash {
            return Err(Error::trade("insufficient cash")
                .with_context("symbol", &symbol)
                .with_context("required", cost.to_string())
                .with_context("available", self.cash.to_string()));
        }
        self.cash -= cost;

        match self.positions.get_mut(&symbol) {
            None => {
                let available = match self.mode {
                    SettlementMode::T0 => quantity,
                    SettlementMode::T1 => 0,
                };
                self.positions.insert(
                    symbol.clone(),
                    Position {
                        symbol: symbol.clone(),
                        quantity,
                        avg_cost: price,
                        available,
                        last_buy_date: Some(date),
                    },
                );
            }
            Some(position) => {
                let new_quantity = position.quantity + quantity;
                position.avg_cost = (position.avg_cost * position.quantity as f64 + cost)
                    / new_quantity as f64;
                position.quantity = new_quantity;
                if matches!(self.mode, SettlementMode::T0) {
                    position.available += quantity;
                }
                position.last_buy_date = Some(date);
            }
        }

        if matches!(self.mode, SettlementMode::T1) {
            *self
                .pending_t1
                .entry(date)
                .or_default()
                .entry(symbol)
                .or_insert(0) += quantity;
        }
        Ok(())
    }

    /// Sell `quantity` shares of `symbol` at `price` on `date`.
    pub fn sell(
        &mut self,
        symbol: impl Into<Symbol>,
        quantity: u64,
        price: f64,
        date: NaiveDate,
    ) -> Result<f64> {
        let symbol = symbol.into();
        validate_trade_input(&symbol, quantity, price)?;

        let available = self.get_available_quantity(&symbol, date);
        let position = self
            .positions
            .get_mut(&symbol)
            .ok_or_else(|| Error::trade("no position to sell").with_context("symbol", &symbol))?;
        if quantity > position.quantity {
            return Err(Error::trade("sell quantity exceeds position quantity")
                .with_context("symbol", &symbol)
                .with_context("quantity", quantity.to_string())
                .with_context("position_quantity", position.quantity.to_string()));
        }
        if quantity > available {
            return Err(Error::trade("sell quantity exceeds available quantity")
                .with_context("symbol", &symbol)
                .with_context("quantity", quantity.to_string())
                .with_context("available", available.to_string()));
        }

        let realized_pnl = (price - position.avg_cost) * quantity as f64;
        self.cash += quantity as f64 * price;
        position.quantity -= quantity;
        position.available -= quantity;

        if position.quantity == 0 {
            self.positions.remove(&symbol);
        } else if matches!(self.mode, SettlementMode::T0) {
            let position = self.positions.get_mut(&symbol).expect("position present");
            position.available = position.quantity;
        }

        Ok(realized_pnl)
    }

    /// Quantity sellable right now under the portfolio's settlement mode.
    /// `date` is accepted for symmetry with the original contract but does
    /// not affect the result.
    pub fn get_available_quantity(&self, symbol: &str, _date: NaiveDate) -> u64 {
        let Some(position) = self.positions.get(symbol) else {
            return 0;
        };
        match self.mode {
            SettlementMode::T0 => position.quantity,
            SettlementMode::T1 => position.available,
        }
    }

    /// Release T+1 holds for `date` into each position's `available`. A
    /// no-op in T+0 mode.
    pub fn settle_day(&mut self, date: NaiveDate) {
        if matches!(self.mode, SettlementMode::T0) {
            return;
        }
        let Some(released) = self.pending_t1.remove(&date) else {
            return;
        };
        for (symbol, quantity) in released {
            if let Some(position) = self.positions.get_mut(&symbol) {
                position.available += quantity;
            }
        }
    }

    fn price_of(&self, symbol: &str, prices: &BTreeMap<Symbol, f64>) -> f64 {
        prices
            .get(symbol)
            .copied()
            .unwrap_or_else(|| self.positions.get(symbol).map(|p| p.avg_cost).unwrap_or(0.0))
    }

    pub fn get_total_value(&self, prices: &BTreeMap<Symbol, f64>) -> f64 {
        let holdings: f64 = self
            .positions
            .values()
            .map(|p| p.quantity as f64 * self.price_of(&p.symbol, prices))
            .sum();
        self.cash + holdings
    }

    pub fn get_unrealized_pnl(&self, prices: &BTreeMap<Symbol, f64>) -> f64 {
        self.positions
            .values()
            .map(|p| (self.price_of(&p.symbol, prices) - p.avg_cost) * p.quantity as f64)
            .sum()
    }

    /// Each held symbol's market value divided by total value. Returns
    /// zero for every held symbol when total value is non-positive.
    pub fn get_position_ratios(&self, prices: &BTreeMap<Symbol, f64>) -> BTreeMap<Symbol, f64> {
        let total = self.get_total_value(prices);
        self.positions
            .values()
            .map(|p| {
                let ratio = if total <= 0.0 {
                    0.0
                } else {
                    (p.quantity as f64 * self.price_of(&p.symbol, prices)) / total
                };
                (p.symbol.clone(), ratio)
            })
            .collect()
    }
}
