//! Dependency bundle and scoped current-context tracking (§4.6, §5, P10).
//!
//! `Context` bundles the config, portfolio, risk manager, event engine and
//! logger a strategy/plugin/hook needs. The current-context mechanism is a
//! per-flow stack, never a process-wide singleton (Design Notes §9): here a
//! flow is one OS thread, since the backtest driver is synchronous and
//! single-threaded per run (§5) and never needs `tokio::task_local!`
//! machinery.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use qf_risk::RiskManager;
use qf_types::{AggregatedBar, FrameworkConfig, Portfolio, Result, Signal};
use serde_json::Value;

use crate::bus::EventEngine;

/// The dependency bundle threaded through a backtest run.
pub struct Context {
    pub config: FrameworkConfig,
    pub portfolio: Portfolio,
    pub risk_manager: RiskManager,
    pub event_engine: EventEngine,
    pub logger: tracing::Span,
    data: HashMap<String, Value>,
}

impl Context {
    pub fn new(config: FrameworkConfig, portfolio: Portfolio, risk_manager: RiskManager) -> Self {
        Self {
            config,
            portfolio,
            risk_manager,
            event_engine: EventEngine::new(),
            logger: tracing::info_span!("backtest"),
            data: HashMap::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    pub fn get_or(&self, key: &str, default: Value) -> Value {
        self.data.get(key).cloned().unwrap_or(default)
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.data.insert(key.into(), value);
    }
}

thread_local! {
    static CURRENT_CONTEXT: RefCell<Vec<Rc<RefCell<Context>>>> = const { RefCell::new(Vec::new()) };
}

/// Push `ctx` as the innermost current context for this flow. The returned
/// guard pops it on drop (including unwinding), restoring whatever was
/// current before `enter_context` was called (P10).
pub struct ContextScope {
    _private: (),
}

impl ContextScope {
    pub fn enter(ctx: Rc<RefCell<Context>>) -> Self {
        CURRENT_CONTEXT.with(|stack| stack.borrow_mut().push(ctx));
        Self { _private: () }
    }
}

impl Drop for ContextScope {
    fn drop(&mut self) {
        CURRENT_CONTEXT.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

/// The innermost pushed context for the invoking flow, or `None` outside
/// any scope. Flows are isolated: values pushed on one thread are never
/// visible on another.
pub fn get_current_context() -> Option<Rc<RefCell<Context>>> {
    CURRENT_CONTEXT.with(|stack| stack.borrow().last().cloned())
}

/// A strategy consumed by the backtest driver (§6). `on_init` is optional
/// (default no-op); `on_bar` is called once per trading day.
pub trait Strategy {
    fn on_init(&mut self, _ctx: &mut Context) -> Result<()> {
        Ok(())
    }

    fn on_bar(&mut self, ctx: &mut Context, bar: &AggregatedBar) -> Result<Vec<Signal>>;
}

/// Test-only fixtures shared across `qf-engine`'s unit tests (`plugins`,
/// `hookspecs`) so each module doesn't hand-roll its own sample config.
#[cfg(test)]
pub(crate) mod tests_support {
    use super::*;
    use chrono::NaiveDate;
    use qf_types::{
        AssetConfig, AssetType, BacktestConfig, DataSourceConfig, EngineConfig, Environment,
        LoggingConfig, PluginsConfig, Provider, RiskConfig, SettlementMode, StrategyConfig,
        StrategyName, StrategyParams,
    };
    use std::collections::BTreeMap;

    pub fn sample_framework_config() -> FrameworkConfig {
        FrameworkConfig {
            environment: Environment::Test,
            engine: EngineConfig {
                worker_count: 1,
                queue_size: 1,
            },
            logging: LoggingConfig {
                level: "info".into(),
                format: "json".into(),
            },
            plugins: PluginsConfig {
                enabled: vec![],
                autoload: false,
            },
            asset_types: BTreeMap::new(),
            asset: AssetConfig {
                kind: AssetType::Cb,
                params: Value::Null,
            },
            strategy: StrategyConfig {
                name: StrategyName::Macd,
                params: StrategyParams::Macd {
                    fast: 12,
                    slow: 26,
                    signal: 9,
                },
            },
            data_source: DataSourceConfig {
                primary: Provider::Primary,
                backup: Provider::Backup,
                cache_dir: "/tmp".into(),
            },
            backtest: BacktestConfig {
                initial_capital: 100_000.0,
                start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                end_date: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
                fee_rate: 0.001,
            },
            risk: RiskConfig {
                max_position_ratio: 0.5,
                stop_loss_ratio: 0.1,
            },
        }
    }

    pub fn sample_context() -> Context {
        Context::new(
            sample_framework_config(),
            Portfolio::new(100_000.0, SettlementMode::T0).unwrap(),
            RiskManager::new(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::tests_support::sample_context;
    use super::*;

    #[test]
    fn current_context_is_none_outside_any_scope() {
        assert!(get_current_context().is_none());
    }

    #[test]
    fn scope_restores_previous_binding_on_exit() {
        assert!(get_current_context().is_none());
        {
            let ctx = Rc::new(RefCell::new(sample_context()));
            let _scope = ContextScope::enter(ctx);
            assert!(get_current_context().is_some());
        }
        assert!(get_current_context().is_none());
    }

    #[test]
    fn nested_scopes_restore_outer_binding() {
        let outer = Rc::new(RefCell::new(sample_context()));
        let _outer_scope = ContextScope::enter(outer.clone());
        {
            let inner = Rc::new(RefCell::new(sample_context()));
            let _inner_scope = ContextScope::enter(inner.clone());
            assert!(Rc::ptr_eq(&get_current_context().unwrap(), &inner));
        }
        assert!(Rc::ptr_eq(&get_current_context().unwrap(), &outer));
    }

    #[test]
    fn data_map_get_and_set() {
        let mut ctx = sample_context();
        ctx.set("k", Value::from(1));
        assert_eq!(ctx.get("k"), Some(&Value::from(1)));
        assert_eq!(ctx.get_or("missing", Value::from(2)), Value::from(2));
    }
}
