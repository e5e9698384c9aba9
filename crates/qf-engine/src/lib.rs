//! Priority event bus, plugin lifecycle manager, hook registry and the
//! dependency-bundle `Context` (§4.1, §4.4, §4.6).

pub mod bus;
pub mod context;
pub mod hookspecs;
pub mod plugins;

pub use bus::{EventBusStats, EventEngine};
pub use context::{get_current_context, Context, ContextScope, Strategy};
pub use hookspecs::{builtin_hook_specs, HookCallResult, HookCaller, HookImplOptions, HookSpecOptions};
pub use plugins::{Hook, HookHandler, HookReturn, Plugin, PluginManager};
