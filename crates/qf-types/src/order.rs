//! Order and trade data types (§3).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::market::Symbol;

/// Order direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

/// Order execution style. `price` on `Order` is required iff this is `Limit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    Market,
    Limit,
}

/// A strategy-emitted order, prior to matching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub symbol: Symbol,
    pub side: Side,
    pub quantity: u64,
    pub order_type: OrderType,
    pub price: Option<f64>,
}

impl Order {
    /// Construct an order, enforcing the invariants of §3: non-empty
    /// symbol, positive quantity, and `price` present iff `order_type` is
    /// `Limit` (and positive when present).
    pub fn new(
        symbol: impl Into<Symbol>,
        side: Side,
        quantity: u64,
        order_type: OrderType,
        price: Option<f64>,
    ) -> Result<Self> {
        let symbol = symbol.into();
        if symbol.trim().is_empty() {
            return Err(Error::validation("order symbol must not be empty"));
        }
        if quantity == 0 {
            return Err(Error::validation("order quantity must be positive"));
        }
        match (order_type, price) {
            (OrderType::Limit, None) => {
                return Err(Error::validation("limit order requires a price"));
            }
            (OrderType::Limit, Some(p)) if p <= 0.0 => {
                return Err(Error::validation("limit order price must be positive"));
            }
            (OrderType::Market, Some(p)) if p <= 0.0 => {
                return Err(Error::validation("order price must be positive when set"));
            }
            _ => {}
        }
        Ok(Self {
            symbol,
            side,
            quantity,
            order_type,
            price,
        })
    }
}

/// One executed trade, recorded by the backtest driver (§3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub date: NaiveDate,
    pub symbol: Symbol,
    pub side: Side,
    pub quantity: u64,
    pub price: f64,
    pub amount: f64,
    pub commission: f64,
    pub pnl: f64,
}

impl Trade {
    pub fn new(
        date: NaiveDate,
        symbol: impl Into<Symbol>,
        side: Side,
        quantity: u64,
        price: f64,
        commission: f64,
        pnl: f64,
    ) -> Self {
        let amount = quantity as f64 * price;
        Self {
            date,
            symbol: symbol.into(),
            side,
            quantity,
            price,
            amount,
            commission,
            pnl,
        }
    }
}
