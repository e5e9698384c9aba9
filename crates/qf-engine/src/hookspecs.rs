//! Hook registry (§4.4): a separate, more general mechanism than
//! `PluginManager::call_hook`, supporting `first_result`/`optional`
//! semantics and priority-ordered implementations per hook name.

use qf_types::{Error, Result};

/// Options attached to a hook's specification.
#[derive(Debug, Clone, Copy, Default)]
pub struct HookSpecOptions {
    /// When true, `call` in "all" mode still only needs the first
    /// implementation to produce a value; `HookCaller::call_first` is the
    /// intended entry point for such hooks.
    pub first_result: bool,
    /// When true, zero registered implementations is not an error.
    pub optional: bool,
}

/// Options attached to one implementation of a hook.
#[derive(Debug, Clone, Copy, Default)]
pub struct HookImplOptions {
    pub priority: i32,
}

type Implementation<Args, R> = Box<dyn Fn(&Args) -> Option<R> + Send>;

/// Collects implementations for one named hook and exposes both an "all"
/// mode (every return value) and a "first_result" mode (first non-null,
/// or null when every implementation returns null).
pub struct HookCaller<Args, R> {
    name: String,
    spec: HookSpecOptions,
    implementations: Vec<(Implementation<Args, R>, i32)>,
}

impl<Args, R> HookCaller<Args, R> {
    pub fn new(name: impl Into<String>, spec: HookSpecOptions) -> Self {
        Self {
            name: name.into(),
            spec,
            implementations: Vec::new(),
        }
    }

    /// Register an implementation, keeping the list sorted by descending
    /// priority.
    pub fn register(&mut self, opts: HookImplOptions, implementation: impl Fn(&Args) -> Option<R> + Send + 'static) {
        self.implementations.push((Box::new(implementation), opts.priority));
        self.implementations.sort_by(|a, b| b.1.cmp(&a.1));
    }

    pub fn is_empty(&self) -> bool {
        self.implementations.is_empty()
    }

    fn require_non_empty(&self) -> Result<()> {
        if self.implementations.is_empty() && !self.spec.optional {
            return Err(Error::internal(format!("no implementation registered for hook {}", self.name))
                .with_code("HOOK_LOOKUP_ERROR"));
        }
        Ok(())
    }

    /// "All" mode: every implementation's return value, in priority order.
    pub fn call_all(&self, args: Args) -> Result<Vec<R>> {
        self.require_non_empty()?;
        Ok(self
            .implementations
            .iter()
            .filter_map(|(f, _)| f(&args))
            .collect())
    }

    /// "first_result" mode: the first non-null value, or `None` when every
    /// implementation returns null (or none are registered and the spec is
    /// optional).
    pub fn call_first(&self, args: Args) -> Result<Option<R>> {
        self.require_non_empty()?;
        for (f, _) in &self.implementations {
            if let Some(value) = f(&args) {
                return Ok(Some(value));
            }
        }
        Ok(None)
    }

    /// Dispatch using whichever mode the spec declares.
    pub fn call(&self, args: Args) -> Result<HookCallResult<R>>
    where
        Args: Clone,
    {
        if self.spec.first_result {
            Ok(HookCallResult::First(self.call_first(args)?))
        } else {
            Ok(HookCallResult::All(self.call_all(args)?))
        }
    }
}

pub enum HookCallResult<R> {
    All(Vec<R>),
    First(Option<R>),
}

/// The built-in hook specs named in §6:
/// `on_init, on_start, on_stop, on_bar, on_order[first_result], on_trade,
/// on_error[optional]`.
pub fn builtin_hook_specs() -> Vec<(&'static str, HookSpecOptions)> {
    vec![
        ("on_init", HookSpecOptions::default()),
        ("on_start", HookSpecOptions::default()),
        ("on_stop", HookSpecOptions::default()),
        ("on_bar", HookSpecOptions::default()),
        (
            "on_order",
            HookSpecOptions {
                first_result: true,
                optional: false,
            },
        ),
        ("on_trade", HookSpecOptions::default()),
        (
            "on_error",
            HookSpecOptions {
                first_result: false,
                optional: true,
            },
        ),
    ]
}
