//! Composable order/position risk rule engine (§4.3).
//!
//! Mirrors the teacher's `gb-risk` monitoring pipeline in shape (a config
//! struct validated at construction, descriptive violation strings) applied
//! to the spec's order-gating rule set instead of portfolio-wide alerting.

pub mod manager;
pub mod rules;

pub use manager::{CheckOutcome, RiskManager};
pub use rules::{MaxHoldings, MaxPositionRatio, MaxTradeAmount, RiskRule, StopLoss, TakeProfit};
