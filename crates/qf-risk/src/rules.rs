//! Composable order/position risk rules (§4.3).
//!
//! Each rule is independent: running one never short-circuits another, and
//! a single check pass never mutates portfolio state (P7).

use std::collections::BTreeMap;

use qf_types::{Error, ErrorKind, Order, OrderType, Portfolio, Position, Result, Side, Symbol};

/// A pluggable order/position risk rule.
pub trait RiskRule: Send + Sync {
    /// Human-readable rule name, used in tracing and diagnostics.
    fn name(&self) -> &str;

    /// Evaluate an order against the rule. Returns zero or more violation
    /// messages; an empty vec means the order passes this rule. Order field
    /// access enforces `Order` invariants, so a rule that needs `order.price`
    /// raises `Error::Validation` rather than silently passing when it is
    /// absent.
    fn check_order(&self, order: &Order, portfolio: &Portfolio, prices: &BTreeMap<Symbol, f64>) -> Result<Vec<String>>;

    /// Evaluate a held position against the rule.
    fn check_position(&self, symbol: &str, position: &Position, price: f64) -> Result<Vec<String>>;
}

fn default_position_check(_symbol: &str, _position: &Position, _price: f64) -> Result<Vec<String>> {
    Ok(Vec::new())
}

fn default_order_check(_order: &Order, _portfolio: &Portfolio, _prices: &BTreeMap<Symbol, f64>) -> Result<Vec<String>> {
    Ok(Vec::new())
}

/// Read `order.price`, raising `Error::Validation` if absent. Mirrors the
/// original's `_read_order_price`, used by rules that price the order
/// themselves rather than falling back to a market quote.
fn require_order_price(order: &Order) -> Result<f64> {
    order.price.ok_or_else(|| {
        Error::validation(format!(
            "order for {} has no price set; this rule requires an explicit order price",
            order.symbol
        ))
    })
}

/// Violation iff `price <= avg_cost * (1 - pct)`.
pub struct StopLoss {
    pct: f64,
}

impl StopLoss {
    pub fn new(pct: f64) -> Result<Self> {
        if !(pct > 0.0 && pct < 1.0) {
            return Err(Error::new(
                ErrorKind::Validation,
                "StopLoss pct must be in (0, 1)",
            ));
        }
        Ok(Self { pct })
    }
}

impl RiskRule for StopLoss {
    fn name(&self) -> &str {
        "stop_loss"
    }

    fn check_order(&self, _order: &Order, _portfolio: &Portfolio, _prices: &BTreeMap<Symbol, f64>) -> Result<Vec<String>> {
        default_order_check(_order, _portfolio, _prices)
    }

    fn check_position(&self, symbol: &str, position: &Position, price: f64) -> Result<Vec<String>> {
        if price <= position.avg_cost * (1.0 - self.pct) {
            Ok(vec![format!(
                "stop loss triggered for {symbol}: price {price} <= {:.4} ({}% below cost {})",
                position.avg_cost * (1.0 - self.pct),
                self.pct * 100.0,
                position.avg_cost
            )])
        } else {
            default_position_check(symbol, position, price)
        }
    }
}

/// Violation iff `price >= avg_cost * (1 + pct)`.
pub struct TakeProfit {
    pct: f64,
}

impl TakeProfit {
    pub fn new(pct: f64) -> Result<Self> {
        if !(pct > 0.0 && pct < 1.0) {
            return Err(Error::new(
                ErrorKind::Validation,
                "TakeProfit pct must be in (0, 1)",
            ));
        }
        Ok(Self { pct })
    }
}

impl RiskRule for TakeProfit {
    fn name(&self) -> &str {
        "take_profit"
    }

    fn check_order(&self, _order: &Order, _portfolio: &Portfolio, _prices: &BTreeMap<Symbol, f64>) -> Result<Vec<String>> {
        default_order_check(_order, _portfolio, _prices)
    }

    fn check_position(&self, symbol: &str, position: &Position, price: f64) -> Result<Vec<String>> {
        if price >= position.avg_cost * (1.0 + self.pct) {
            Ok(vec![format!(
                "take profit triggered for {symbol}: price {price} >= {:.4} ({}% above cost {})",
                position.avg_cost * (1.0 + self.pct),
                self.pct * 100.0,
                position.avg_cost
            )])
        } else {
            default_position_check(symbol, position, price)
        }
    }
}

/// For BUY orders only: violation iff the projected position value after
/// the fill exceeds `ratio` of total portfolio value.
pub struct MaxPositionRatio {
    ratio: f64,
}

impl MaxPositionRatio {
    pub fn new(ratio: f64) -> Result<Self> {
        if !(ratio > 0.0 && ratio <= 1.0) {
            return Err(Error::new(
                ErrorKind::Validation,
                "MaxPositionRatio ratio must be in (0, 1]",
            ));
        }
        Ok(Self { ratio })
    }
}

impl RiskRule for MaxPositionRatio {
    fn name(&self) -> &str {
        "max_position_ratio"
    }

    fn check_order(&self, order: &Order, portfolio: &Portfolio, prices: &BTreeMap<Symbol, f64>) -> Result<Vec<String>> {
        if order.side != Side::Buy {
            return Ok(Vec::new());
        }
        let total = portfolio.get_total_value(prices);
        if total <= 0.0 {
            return Ok(Vec::new());
        }
        let fill_price = require_order_price(order)?;
        let current_holding_value = portfolio
            .positions
            .get(&order.symbol)
            .map(|p| {
                let current_price = prices
                    .get(&order.symbol)
                    .copied()
                    .unwrap_or(p.avg_cost);
                p.quantity as f64 * current_price
            })
            .unwrap_or(0.0);
        let projected = current_holding_value + order.quantity as f64 * fill_price;
        let projected_ratio = projected / total;
        if projected_ratio > self.ratio {
            Ok(vec![format!(
                "max position ratio exceeded for {}: projected position ratio {:.4} > limit {:.4}",
                order.symbol, projected_ratio, self.ratio
            )])
        } else {
            Ok(Vec::new())
        }
    }

    fn check_position(&self, symbol: &str, position: &Position, price: f64) -> Result<Vec<String>> {
        default_position_check(symbol, position, price)
    }
}

/// BUY orders for a symbol not currently held violate iff the portfolio
/// already holds `n` or more distinct symbols.
pub struct MaxHoldings {
    max_count: usize,
}

impl MaxHoldings {
    pub fn new(max_count: u32) -> Result<Self> {
        if max_count == 0 {
            return Err(Error::new(
                ErrorKind::Validation,
                "MaxHoldings max_count must be > 0",
            ));
        }
        Ok(Self {
            max_count: max_count as usize,
        })
    }
}

impl RiskRule for MaxHoldings {
    fn name(&self) -> &str {
        "max_holdings"
    }

    fn check_order(&self, order: &Order, portfolio: &Portfolio, _prices: &BTreeMap<Symbol, f64>) -> Result<Vec<String>> {
        if order.side != Side::Buy || portfolio.positions.contains_key(&order.symbol) {
            return Ok(Vec::new());
        }
        if portfolio.positions.len() >= self.max_count {
            Ok(vec![format!(
                "max holdings exceeded: already holding {} symbols (limit {})",
                portfolio.positions.len(),
                self.max_count
            )])
        } else {
            Ok(Vec::new())
        }
    }

    fn check_position(&self, symbol: &str, position: &Position, price: f64) -> Result<Vec<String>> {
        default_position_check(symbol, position, price)
    }
}

/// Violation iff `order.quantity * order.price > amount`.
pub struct MaxTradeAmount {
    amount: f64,
}

impl MaxTradeAmount {
    pub fn new(amount: f64) -> Result<Self> {
        if amount <= 0.0 {
            return Err(Error::new(
                ErrorKind::Validation,
                "MaxTradeAmount amount must be > 0",
            ));
        }
        Ok(Self { amount })
    }
}

impl RiskRule for MaxTradeAmount {
    fn name(&self) -> &str {
        "max_trade_amount"
    }

    fn check_order(&self, order: &Order, _portfolio: &Portfolio, _prices: &BTreeMap<Symbol, f64>) -> Result<Vec<String>> {
        let price = require_order_price(order)?;
        let trade_amount = order.quantity as f64 * price;
        if trade_amount > self.amount {
            Ok(vec![format!(
                "max trade amount exceeded for {}: {:.2} > limit {:.2}",
                order.symbol, trade_amount, self.amount
            )])
        } else {
            Ok(Vec::new())
        }
    }

    fn check_position(&self, symbol: &str, position: &Position, price: f64) -> Result<Vec<String>> {
        default_position_check(symbol, position, price)
    }
}
