//! `RiskManager`: an ordered list of rules evaluated as one unit (§4.3).

use std::collections::BTreeMap;

use qf_types::{Order, Portfolio, Position, Result, Symbol};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::rules::RiskRule;

/// Outcome of a single `check_order`/`check_position` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckOutcome {
    pub passed: bool,
    pub violations: Vec<String>,
}

/// Holds an ordered list of independent risk rules. `check_order` runs every
/// rule and concatenates violations; no rule short-circuits another (P7: a
/// check pass never mutates portfolio state).
pub struct RiskManager {
    rules: Vec<Box<dyn RiskRule>>,
    last_violations: Vec<String>,
}

impl Default for RiskManager {
    fn default() -> Self {
        Self::new()
    }
}

impl RiskManager {
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            last_violations: Vec::new(),
        }
    }

    pub fn add_rule(&mut self, rule: Box<dyn RiskRule>) {
        self.rules.push(rule);
    }

    /// Runs every rule and concatenates violations. A rule that cannot be
    /// evaluated (e.g. an order missing a required field) aborts the whole
    /// pass with that rule's error rather than silently skipping it.
    pub fn check_order(
        &mut self,
        order: &Order,
        portfolio: &Portfolio,
        prices: &BTreeMap<Symbol, f64>,
    ) -> Result<CheckOutcome> {
        let mut violations = Vec::new();
        for rule in &self.rules {
            let rule_violations = rule.check_order(order, portfolio, prices)?;
            if !rule_violations.is_empty() {
                debug!(rule = rule.name(), count = rule_violations.len(), "risk rule violation");
            }
            violations.extend(rule_violations);
        }
        self.last_violations = violations.clone();
        Ok(CheckOutcome {
            passed: violations.is_empty(),
            violations,
        })
    }

    pub fn check_position(&mut self, symbol: &str, position: &Position, price: f64) -> Result<CheckOutcome> {
        let mut violations = Vec::new();
        for rule in &self.rules {
            let rule_violations = rule.check_position(symbol, position, price)?;
            if !rule_violations.is_empty() {
                debug!(rule = rule.name(), count = rule_violations.len(), "risk rule violation");
            }
            violations.extend(rule_violations);
        }
        self.last_violations = violations.clone();
        Ok(CheckOutcome {
            passed: violations.is_empty(),
            violations,
        })
    }

    pub fn last_violations(&self) -> &[String] {
        &self.last_violations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{MaxTradeAmount, StopLoss};
    use chrono::NaiveDate;
    use qf_types::{OrderType, SettlementMode, Side};

    #[test]
    fn independent_rules_all_contribute_violations() {
        let mut manager = RiskManager::new();
        manager.add_rule(Box::new(MaxTradeAmount::new(100.0).unwrap()));
        manager.add_rule(Box::new(StopLoss::new(0.1).unwrap()));

        let portfolio = Portfolio::new(100_000.0, SettlementMode::T0).unwrap();
        let order = Order::new("CB001", Side::Buy, 100, OrderType::Limit, Some(10.0)).unwrap();
        let outcome = manager.check_order(&order, &portfolio, &BTreeMap::new()).unwrap();
        assert!(!outcome.passed);
        assert_eq!(outcome.violations.len(), 1);
    }

    #[test]
    fn check_order_does_not_mutate_portfolio() {
        let mut manager = RiskManager::new();
        manager.add_rule(Box::new(MaxTradeAmount::new(1.0).unwrap()));
        let mut portfolio = Portfolio::new(100_000.0, SettlementMode::T0).unwrap();
        portfolio
            .buy("CB001", 1, 1.0, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())
            .unwrap();
        let before = portfolio.clone();
        let order = Order::new("CB001", Side::Buy, 100, OrderType::Limit, Some(10.0)).unwrap();
        manager.check_order(&order, &portfolio, &BTreeMap::new()).unwrap();
        assert_eq!(before, portfolio);
    }

    #[test]
    fn check_order_propagates_rule_validation_error() {
        use crate::rules::MaxPositionRatio;
        let mut manager = RiskManager::new();
        manager.add_rule(Box::new(MaxPositionRatio::new(0.5).unwrap()));
        let portfolio = Portfolio::new(100_000.0, SettlementMode::T0).unwrap();
        let order = Order::new("CB001", Side::Buy, 100, OrderType::Market, None).unwrap();
        let err = manager
            .check_order(&order, &portfolio, &BTreeMap::from([("CB001".to_string(), 10.0)]))
            .unwrap_err();
        assert_eq!(err.kind(), qf_types::ErrorKind::Validation);
    }
}
