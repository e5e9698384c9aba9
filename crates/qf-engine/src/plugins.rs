//! Plugin lifecycle manager with dependency resolution (§4.4, P5, P6).

use indexmap::IndexMap;
use qf_types::{AggregatedBar, Error, Order, Result, Trade};
use tracing::{debug, info};

use crate::context::Context;

/// A registered plugin. `setup`/`teardown` default to no-ops, matching
/// `plugins/base.py::Plugin`.
pub trait Plugin {
    fn name(&self) -> &str;

    fn version(&self) -> &str {
        "0.1.0"
    }

    fn description(&self) -> &str {
        ""
    }

    fn dependencies(&self) -> &[String] {
        &[]
    }

    fn setup(&mut self, _ctx: &mut Context) -> Result<()> {
        Ok(())
    }

    fn teardown(&mut self, _ctx: &mut Context) -> Result<()> {
        Ok(())
    }

    /// Opt-in to the hook surface (§6). Per Design Notes §9, this replaces
    /// attribute-probing (`getattr(plugin, hook_name, None)`) with an
    /// explicit interface assertion.
    fn as_hook_handler(&mut self) -> Option<&mut dyn HookHandler> {
        None
    }
}

/// The hook surface a plugin may implement (§6): `on_init, on_start,
/// on_stop, on_bar, on_order, on_trade, on_error`. Every method defaults to
/// a no-op so a plugin only overrides what it needs.
pub trait HookHandler {
    fn on_init(&mut self, _ctx: &mut Context) -> Result<()> {
        Ok(())
    }

    fn on_start(&mut self, _ctx: &mut Context) -> Result<()> {
        Ok(())
    }

    fn on_stop(&mut self, _ctx: &mut Context) -> Result<()> {
        Ok(())
    }

    fn on_bar(&mut self, _ctx: &mut Context, _bar: &AggregatedBar) -> Result<()> {
        Ok(())
    }

    /// Returns the order on pass, `None` to block it (§6).
    fn on_order(&mut self, _ctx: &mut Context, order: Order) -> Result<Option<Order>> {
        Ok(Some(order))
    }

    fn on_trade(&mut self, _ctx: &mut Context, _trade: &Trade) -> Result<()> {
        Ok(())
    }

    fn on_error(&mut self, _ctx: &mut Context, _error: &Error) -> Result<()> {
        Ok(())
    }
}

/// Which hook to invoke, bundled with its typed arguments. `call_hook`
/// dispatches through `HookHandler` rather than probing for an
/// attribute named `hook_name`, since Rust has no runtime reflection.
pub enum Hook<'a> {
    OnInit,
    OnStart,
    OnStop,
    OnBar(&'a AggregatedBar),
    OnOrder(Order),
    OnTrade(&'a Trade),
    OnError(&'a Error),
}

/// Per-plugin return value from a `call_hook` pass.
pub enum HookReturn {
    Unit,
    Order(Option<Order>),
}

/// Registers plugin instances by unique name, computes a topological
/// initialization order, and drives setup/teardown (§4.4).
pub struct PluginManager {
    plugins: IndexMap<String, Box<dyn Plugin>>,
    initialized: bool,
    init_order: Vec<String>,
}

impl Default for PluginManager {
    fn default() -> Self {
        Self::new()
    }
}

impl PluginManager {
    pub fn new() -> Self {
        Self {
            plugins: IndexMap::new(),
            initialized: false,
            init_order: Vec::new(),
        }
    }

    pub fn register(&mut self, plugin: Box<dyn Plugin>) -> Result<()> {
        let name = plugin.name().to_string();
        if self.plugins.contains_key(&name) {
            return Err(Error::validation(format!("plugin already registered: {name}")));
        }
        self.plugins.insert(name, plugin);
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn init_order(&self) -> &[String] {
        &self.init_order
    }

    /// Validate dependencies, compute a topological order (Kahn's
    /// algorithm over the reverse `dep -> dependent` graph, seeded in
    /// registration order for determinism), and call `setup` on each
    /// plugin in that order. Idempotent: a no-op once already initialized.
    pub fn initialize(&mut self, ctx: &mut Context) -> Result<()> {
        if self.initialized {
            return Ok(());
        }

        self.check_dependencies()?;
        self.detect_cycles()?;
        let order = self.topological_order()?;

        for name in &order {
            debug!(plugin = %name, "setup");
            let plugin = self.plugins.get_mut(name).expect("plugin present");
            plugin.setup(ctx)?;
        }
        info!(order = ?order, "plugin manager initialized");
        self.init_order = order;
        self.initialized = true;
        Ok(())
    }

    /// Call `teardown` over the stored init order in reverse. A no-op if
    /// `initialize` was never called.
    pub fn shutdown(&mut self, ctx: &mut Context) -> Result<()> {
        if !self.initialized {
            return Ok(());
        }
        for name in self.init_order.iter().rev() {
            debug!(plugin = %name, "teardown");
            if let Some(plugin) = self.plugins.get_mut(name) {
                plugin.teardown(ctx)?;
            }
        }
        self.init_order.clear();
        self.initialized = false;
        Ok(())
    }

    fn check_dependencies(&self) -> Result<()> {
        for (name, plugin) in &self.plugins {
            for dep in plugin.dependencies() {
                if !self.plugins.contains_key(dep) {
                    return Err(Error::validation(format!(
                        "plugin {name} depends on unregistered plugin {dep}"
                    )));
                }
            }
        }
        Ok(())
    }

    fn detect_cycles(&self) -> Result<()> {
        #[derive(PartialEq)]
        enum Mark {
            Visiting,
            Visited,
        }
        use std::collections::HashMap;

        let mut marks: HashMap<&str, Mark> = HashMap::new();

        fn visit<'a>(
            name: &'a str,
            plugins: &'a IndexMap<String, Box<dyn Plugin>>,
            marks: &mut HashMap<&'a str, Mark>,
        ) -> Result<()> {
            match marks.get(name) {
                Some(Mark::Visited) => return Ok(()),
                Some(Mark::Visiting) => {
                    return Err(Error::validation(format!(
                        "dependency cycle detected at plugin {name}"
                    )));
                }
                None => {}
            }
            marks.insert(name, Mark::Visiting);
            if let Some(plugin) = plugins.get(name) {
                for dep in plugin.dependencies() {
                    visit(dep, plugins, marks)?;
                }
            }
            marks.insert(name, Mark::Visited);
            Ok(())
        }

        for name in self.plugins.keys() {
            visit(name, &self.plugins, &mut marks)?;
        }
        Ok(())
    }

    fn topological_order(&self) -> Result<Vec<String>> {
        use std::collections::HashMap;

        let mut indegree: HashMap<&str, usize> = self
            .plugins
            .keys()
            .map(|name| (name.as_str(), 0))
            .collect();
        let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();

        for (name, plugin) in &self.plugins {
            for dep in plugin.dependencies() {
                *indegree.get_mut(name.as_str()).unwrap() += 1;
                dependents.entry(dep.as_str()).or_default().push(name.as_str());
            }
        }

        let mut queue: Vec<&str> = self
            .plugins
            .keys()
            .map(|s| s.as_str())
            .filter(|name| indegree[name] == 0)
            .collect();

        let mut order = Vec::with_capacity(self.plugins.len());
        let mut i = 0;
        while i < queue.len() {
            let name = queue[i];
            i += 1;
            order.push(name.to_string());
            if let Some(deps) = dependents.get(name) {
                for &dependent in deps {
                    let entry = indegree.get_mut(dependent).unwrap();
                    *entry -= 1;
                    if *entry == 0 {
                        queue.push(dependent);
                    }
                }
            }
        }

        if order.len() != self.plugins.len() {
            return Err(Error::validation("dependency cycle detected during topological sort"));
        }
        Ok(order)
    }

    /// Invoke `hook` on every plugin (in registration order) that opts into
    /// `HookHandler`. Errors propagate to the caller; there is no silent
    /// swallow (§4.4, §7).
    pub fn call_hook(&mut self, ctx: &mut Context, hook: Hook<'_>) -> Result<Vec<HookReturn>> {
        let mut results = Vec::new();
        for plugin in self.plugins.values_mut() {
            let Some(handler) = plugin.as_hook_handler() else {
                continue;
            };
            let result = match &hook {
                Hook::OnInit => {
                    handler.on_init(ctx)?;
                    HookReturn::Unit
                }
                Hook::OnStart => {
                    handler.on_start(ctx)?;
                    HookReturn::Unit
                }
                Hook::OnStop => {
                    handler.on_stop(ctx)?;
                    HookReturn::Unit
                }
                Hook::OnBar(bar) => {
                    handler.on_bar(ctx, bar)?;
                    HookReturn::Unit
                }
                Hook::OnOrder(order) => HookReturn::Order(handler.on_order(ctx, order.clone())?),
                Hook::OnTrade(trade) => {
                    handler.on_trade(ctx, trade)?;
                    HookReturn::Unit
                }
                Hook::OnError(error) => {
                    handler.on_error(ctx, error)?;
                    HookReturn::Unit
                }
            };
            results.push(result);
        }
        Ok(results)
    }
}
