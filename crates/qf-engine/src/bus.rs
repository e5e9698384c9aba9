//! Priority event bus with middleware and error isolation (§4.1, §5,
//! P3/P4).
//!
//! Dispatch is synchronous and single-threaded from the caller's
//! perspective: `put` completes every middleware, every handler, and every
//! recursively re-dispatched event before returning.

use std::collections::HashMap;

use qf_types::{Error, Event, EventType, HandlerId, HandlerInfo, Result};
use tracing::{debug, warn};

/// Hard ceiling on recursive re-dispatch depth (§9 Open Questions): the
/// original source imposes none, so an implementer-chosen bound avoids an
/// unbounded stack.
const MAX_RECURSION_DEPTH: u32 = 64;

type Handler = Box<dyn FnMut(&Event) -> Result<Option<Event>> + Send>;
type Middleware = Box<dyn FnMut(&Event) -> Result<Option<Event>> + Send>;

#[derive(Debug, Clone, Default)]
pub struct EventBusStats {
    pub running: bool,
    pub event_count: u64,
    pub error_count: u64,
    pub handlers: HashMap<EventType, usize>,
    pub middleware_count: usize,
}

/// Dispatches events to priority-ordered handlers through a middleware
/// chain. Lifecycle: `stopped` -> `running` (via `start`) -> `stopped` (via
/// `stop`).
pub struct EventEngine {
    handlers: HashMap<EventType, Vec<HandlerInfo<Handler>>>,
    middlewares: Vec<Middleware>,
    running: bool,
    event_count: u64,
    error_count: u64,
    next_handler_id: u64,
}

impl Default for EventEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl EventEngine {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            middlewares: Vec::new(),
            running: false,
            event_count: 0,
            error_count: 0,
            next_handler_id: 0,
        }
    }

    /// Register a handler for `event_type` at `priority`. Handler lists are
    /// kept sorted by descending priority; ties keep registration order
    /// (Rust's `sort_by` is stable, matching the original's
    /// `list.sort(reverse=True)`).
    pub fn register(
        &mut self,
        event_type: EventType,
        priority: i32,
        handler: impl FnMut(&Event) -> Result<Option<Event>> + Send + 'static,
    ) -> HandlerId {
        let id = HandlerId(self.next_handler_id);
        self.next_handler_id += 1;
        let list = self.handlers.entry(event_type).or_default();
        list.push(HandlerInfo::new(id, Box::new(handler), priority));
        list.sort_by(|a, b| b.priority.cmp(&a.priority));
        id
    }

    /// Alias matching the original's symbolic-name surface.
    pub fn register_handler(
        &mut self,
        event_type: EventType,
        priority: i32,
        handler: impl FnMut(&Event) -> Result<Option<Event>> + Send + 'static,
    ) -> HandlerId {
        self.register(event_type, priority, handler)
    }

    /// Remove the handler with `id` from `event_type`'s list. Returns
    /// whether anything was removed.
    pub fn unregister(&mut self, event_type: EventType, id: HandlerId) -> bool {
        if let Some(list) = self.handlers.get_mut(&event_type) {
            if let Some(pos) = list.iter().position(|h| h.id == id) {
                list.remove(pos);
                return true;
            }
        }
        false
    }

    pub fn use_middleware(&mut self, middleware: impl FnMut(&Event) -> Result<Option<Event>> + Send + 'static) {
        self.middlewares.push(Box::new(middleware));
    }

    /// Reset counters, transition to `running`, and emit a synthetic
    /// `START` event.
    pub fn start(&mut self) -> Result<()> {
        self.running = true;
        self.event_count = 0;
        self.error_count = 0;
        let event = Event::new(EventType::Start, serde_json::Value::Null).with_source("EventEngine");
        self.put(event)
    }

    /// Emit a synthetic `STOP` event while still running, then transition
    /// to `stopped`.
    pub fn stop(&mut self) -> Result<()> {
        let event = Event::new(EventType::Stop, serde_json::Value::Null).with_source("EventEngine");
        self.put(event)?;
        self.running = false;
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Dispatch one event (§4.1 steps 1-5). Returns `Error::Internal` with
    /// code `EVENT_RECURSION_LIMIT` if recursive re-dispatch exceeds
    /// `MAX_RECURSION_DEPTH` (§9 Open Questions).
    pub fn put(&mut self, event: Event) -> Result<()> {
        self.put_inner(event, 0)
    }

    fn put_inner(&mut self, event: Event, depth: u32) -> Result<()> {
        if !self.running {
            debug!(?event.event_type, "dropped: bus not running");
            return Ok(());
        }
        if depth > MAX_RECURSION_DEPTH {
            self.error_count += 1;
            warn!(depth, "event recursion limit exceeded");
            return Err(Error::internal(format!(
                "event recursion limit of {MAX_RECURSION_DEPTH} exceeded"
            ))
            .with_code("EVENT_RECURSION_LIMIT"));
        }
        self.event_count += 1;

        let mut current = event;
        for middleware in &mut self.middlewares {
            match middleware(&current) {
                Ok(Some(replaced)) => current = replaced,
                Ok(None) => {
                    debug!(?current.event_type, "dropped by middleware");
                    return Ok(());
                }
                Err(err) => {
                    self.error_count += 1;
                    warn!(error = %err, "middleware error, continuing with unchanged event");
                }
            }
        }

        let Some(handlers) = self.handlers.get_mut(&current.event_type) else {
            debug!(?current.event_type, "no handlers registered");
            return Ok(());
        };

        let mut redispatch = Vec::new();
        for handler_info in handlers.iter_mut() {
            match (handler_info.handler)(&current) {
                Ok(Some(new_event)) if new_event != current => {
                    redispatch.push(new_event);
                }
                Ok(_) => {}
                Err(err) => {
                    self.error_count += 1;
                    warn!(error = %err, "handler error, continuing to next handler");
                }
            }
        }

        for event in redispatch {
            self.put_inner(event, depth + 1)?;
        }
        Ok(())
    }

    pub fn emit(&mut self, event: Event) -> Result<()> {
        self.put(event)
    }

    pub fn stats(&self) -> EventBusStats {
        EventBusStats {
            running: self.running,
            event_count: self.event_count,
            error_count: self.error_count,
            handlers: self.handlers.iter().map(|(k, v)| (*k, v.len())).collect(),
            middleware_count: self.middlewares.len(),
        }
    }
}
