//! Signal-to-order normalization (§4.5 step 4), grounded on
//! `simple_backtest.py::_normalize_orders`.
//!
//! The original source accepted both map- and object-shaped signals and
//! fell back through `side`/`direction`; the Rust boundary collapses
//! that to the single `qf_types::Signal` shape (Design Notes §9), so
//! this module only has to apply the two remaining normalization
//! rules: default `quantity` to `1` and default `order_type` from
//! whether `price` is set.

use qf_types::{Order, OrderType, Result, Signal};

/// Normalize one strategy-emitted `Signal` into an `Order` (§4.5 step 4).
///
/// `quantity` defaults to `1` when absent **or zero** (mirroring the
/// original's `int(signal.get("quantity", 1) or 1)`, where Python's
/// falsy-`0` folds into the same default as a missing value).
/// `order_type` defaults to `Limit` when `price` is set, else `Market`.
pub fn normalize_signal(signal: &Signal) -> Result<Order> {
    let quantity = match signal.quantity {
        Some(q) if q > 0 => q,
        _ => 1,
    };
    let order_type = signal
        .order_type
        .unwrap_or(if signal.price.is_some() { OrderType::Limit } else { OrderType::Market });
    Order::new(signal.symbol.clone(), signal.side, quantity, order_type, signal.price)
}

/// Normalize a strategy's full signal list, dropping any signal that
/// fails order construction (an invalid symbol/price combination) per
/// §7's skip-on-failure policy rather than aborting the replay.
pub fn normalize_signals(signals: &[Signal]) -> Vec<Order> {
    signals.iter().filter_map(|s| normalize_signal(s).ok()).collect()
}
