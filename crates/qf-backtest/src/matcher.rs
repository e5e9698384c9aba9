//! Order matching (§4.5 step 5), grounded on
//! `simple_backtest.py::_match_order_v2` (aggregated, latest-price
//! driven) and `_match_order` (single-bar MARKET/LIMIT).

use std::collections::BTreeMap;

use qf_types::{Bar, Order, OrderType, Portfolio, Side, Symbol};

/// One matched fill, ready for commission and account update (§3 Trade,
/// minus `commission`/`pnl` which the driver fills in after matching).
#[derive(Debug, Clone, PartialEq)]
pub struct Fill {
    pub symbol: Symbol,
    pub side: Side,
    pub quantity: u64,
    pub price: f64,
    pub amount: f64,
}

/// Auto-size fraction of current cash committed to a BUY with no
/// explicit quantity (§4.5 step 5: "30% of current cash").
const AUTO_SIZE_CASH_FRACTION: f64 = 0.3;

/// Match `order` against the day's latest prices (the primary replay
/// matcher). Rejects an empty symbol, a non-BUY/SELL side, a missing or
/// non-positive latest price, or a computed quantity of zero. Applies
/// slippage to the latest close to produce the fill price.
pub fn match_aggregated(
    order: &Order,
    latest_prices: &BTreeMap<Symbol, f64>,
    portfolio: &Portfolio,
    slippage: f64,
) -> Option<Fill> {
    if order.symbol.trim().is_empty() {
        return None;
    }
    let close = *latest_prices.get(&order.symbol)?;
    if close <= 0.0 {
        return None;
    }

    let quantity = if order.quantity > 0 {
        order.quantity
    } else {
        match order.side {
            Side::Buy => {
                let available = portfolio.cash * AUTO_SIZE_CASH_FRACTION;
                (available / close).floor() as u64
            }
            Side::Sell => portfolio.positions.get(&order.symbol).map(|p| p.quantity).unwrap_or(0),
        }
    };
    if quantity == 0 {
        return None;
    }

    let price = match order.side {
        Side::Buy => close * (1.0 + slippage),
        Side::Sell => close * (1.0 - slippage),
    };
    let amount = quantity as f64 * price;
    Some(Fill {
        symbol: order.symbol.clone(),
        side: order.side,
        quantity,
        price,
        amount,
    })
}

/// Match one order against a single bar, supporting both `MARKET` and
/// `LIMIT` order types (§4.5's secondary matcher). `LIMIT` BUY fills at
/// the limit price iff `bar.low <= limit`; `LIMIT` SELL fills iff
/// `bar.high >= limit`; otherwise no fill.
pub fn match_single(order: &Order, bar: &Bar, slippage: f64) -> Option<Fill> {
    if order.symbol != bar.symbol || order.quantity == 0 {
        return None;
    }
    if bar.close <= 0.0 {
        return None;
    }

    let price = match order.order_type {
        OrderType::Market => match order.side {
            Side::Buy => bar.close * (1.0 + slippage),
            Side::Sell => bar.close * (1.0 - slippage),
        },
        OrderType::Limit => {
            let limit = order.price?;
            if limit <= 0.0 {
                return None;
            }
            match order.side {
                Side::Buy if bar.low <= limit => limit,
                Side::Sell if bar.high >= limit => limit,
                _ => return None,
            }
        }
    };

    let amount = order.quantity as f64 * price;
    Some(Fill {
        symbol: order.symbol.clone(),
        side: order.side,
        quantity: order.quantity,
        price,
        amount,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use qf_types::SettlementMode;

    fn prices(pairs: &[(&str, f64)]) -> BTreeMap<Symbol, f64> {
        pairs.iter().map(|(s, p)| (s.to_string(), *p)).collect()
    }

    #[test]
    fn rejects_missing_price() {
        let portfolio = Portfolio::new(100_000.0, SettlementMode::T0).unwrap();
        let order = Order::new("CB001", Side::Buy, 10, OrderType::Market, None).unwrap();
        assert!(match_aggregated(&order, &prices(&[]), &portfolio, 0.0).is_none());
    }

    #[test]
    fn buy_applies_positive_slippage() {
        let portfolio = Portfolio::new(100_000.0, SettlementMode::T0).unwrap();
        let order = Order::new("CB001", Side::Buy, 10, OrderType::Market, None).unwrap();
        let fill = match_aggregated(&order, &prices(&[("CB001", 100.0)]), &portfolio, 0.01).unwrap();
        assert!((fill.price - 101.0).abs() < 1e-9);
        assert_eq!(fill.quantity, 10);
    }

    #[test]
    fn sell_applies_negative_slippage() {
        let portfolio = Portfolio::new(100_000.0, SettlementMode::T0).unwrap();
        let order = Order::new("CB001", Side::Sell, 10, OrderType::Market, None).unwrap();
        let fill = match_aggregated(&order, &prices(&[("CB001", 100.0)]), &portfolio, 0.01).unwrap();
        assert!((fill.price - 99.0).abs() < 1e-9);
    }

    #[test]
    fn limit_buy_fills_when_low_at_or_below_limit() {
        let bar = Bar {
            symbol: "CB001".into(),
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            open: 100.0,
            high: 105.0,
            low: 95.0,
            close: 100.0,
            volume: 1.0,
            amount: 1.0,
        };
        let order = Order::new("CB001", Side::Buy, 10, OrderType::Limit, Some(96.0)).unwrap();
        let fill = match_single(&order, &bar, 0.0).unwrap();
        assert_eq!(fill.price, 96.0);
    }

    #[test]
    fn limit_buy_does_not_fill_when_low_above_limit() {
        let bar = Bar {
            symbol: "CB001".into(),
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            open: 100.0,
            high: 105.0,
            low: 98.0,
            close: 100.0,
            volume: 1.0,
            amount: 1.0,
        };
        let order = Order::new("CB001", Side::Buy, 10, OrderType::Limit, Some(96.0)).unwrap();
        assert!(match_single(&order, &bar, 0.0).is_none());
    }

    #[test]
    fn limit_sell_fills_when_high_at_or_above_limit() {
        let bar = Bar {
            symbol: "CB001".into(),
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            open: 100.0,
            high: 110.0,
            low: 95.0,
            close: 100.0,
            volume: 1.0,
            amount: 1.0,
        };
        let order = Order::new("CB001", Side::Sell, 10, OrderType::Limit, Some(108.0)).unwrap();
        let fill = match_single(&order, &bar, 0.0).unwrap();
        assert_eq!(fill.price, 108.0);
    }

    #[test]
    fn market_order_matches_regardless_of_limit_fields() {
        let bar = Bar {
            symbol: "CB001".into(),
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            open: 100.0,
            high: 100.0,
            low: 100.0,
            close: 100.0,
            volume: 1.0,
            amount: 1.0,
        };
        let order = Order::new("CB001", Side::Buy, 10, OrderType::Market, None).unwrap();
        assert!(match_single(&order, &bar, 0.0).is_some());
    }

    #[test]
    fn sell_auto_sizes_to_full_position() {
        let mut portfolio = Portfolio::new(100_000.0, SettlementMode::T0).unwrap();
        portfolio
            .buy("CB001", 50, 10.0, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())
            .unwrap();
        let order = Order {
            symbol: "CB001".into(),
            side: Side::Sell,
            quantity: 0,
            order_type: OrderType::Market,
            price: None,
        };
        let fill = match_aggregated(&order, &prices(&[("CB001", 12.0)]), &portfolio, 0.0).unwrap();
        assert_eq!(fill.quantity, 50);
    }
}
