//! External-interface contracts consumed by the core that do not require
//! the aggregated `Context` (§6): the data-source feed and the `Signal`
//! shape a strategy emits. The `Strategy` trait itself lives in
//! `qf_engine::context` because it operates on `Context`, which bundles the
//! portfolio/risk-manager/event-engine types owned by downstream crates.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::market::{Bar, Symbol};
use crate::order::{OrderType, Side};

/// A signal a strategy emits for one symbol. The original source accepted
/// both map-shaped and object-shaped payloads (Design Notes §9); Rust
/// strategies return this single tagged shape directly instead, since
/// nominal typing replaces the duck-typed adapter at the language boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub symbol: Symbol,
    pub side: Side,
    /// Defaults to `1` at the normalization step (§4.5) when absent.
    pub quantity: Option<u64>,
    /// Defaults to `Limit` when `price` is set, else `Market` (§4.5).
    pub order_type: Option<OrderType>,
    pub price: Option<f64>,
}

impl Signal {
    pub fn new(symbol: impl Into<Symbol>, side: Side) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            quantity: None,
            order_type: None,
            price: None,
        }
    }

    pub fn with_quantity(mut self, quantity: u64) -> Self {
        self.quantity = Some(quantity);
        self
    }

    pub fn with_price(mut self, price: f64) -> Self {
        self.price = Some(price);
        self
    }

    pub fn with_order_type(mut self, order_type: OrderType) -> Self {
        self.order_type = Some(order_type);
        self
    }
}

/// Data-source contract (§6): a normalized bar feed plus a realtime quote
/// lookup. Adapters implementing this trait are external collaborators;
/// only the contract is part of the core.
#[async_trait]
pub trait DataSource: Send + Sync {
    async fn fetch_bars(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> Result<Vec<Bar>>;
    async fn fetch_realtime(&self, symbol: &str) -> Result<serde_json::Value>;
}
