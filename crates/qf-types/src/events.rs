//! Event bus data types: the closed `EventType` enumeration, `Event`
//! envelope and `HandlerInfo` registration record (§3, §4.1).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Closed enumeration of event kinds the bus dispatches. This is the union
/// of the two overlapping Python event-type enumerations the original
/// source carried (`core/events.py` and `core/engine.py`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    Bar,
    Tick,
    Quote,
    Order,
    Trade,
    Position,
    Signal,
    Risk,
    Log,
    Error,
    Start,
    Stop,
    Heartbeat,
    StrategyInit,
    StrategyStop,
    RiskCheck,
    RiskTrigger,
}

/// One event dispatched through the bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub payload: Value,
    pub source: Option<String>,
    /// Unix timestamp in seconds, matching the original's `time.time()`.
    pub timestamp: f64,
}

impl Event {
    pub fn new(event_type: EventType, payload: Value) -> Self {
        Self {
            event_type,
            payload,
            source: None,
            timestamp: now_unix(),
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

fn now_unix() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Opaque identity for a registered handler, returned by
/// `EventEngine::register` so callers can later `unregister` it. Rust
/// closures have no portable identity comparison, unlike the original's
/// attribute-equality check on a bound method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(pub u64);

/// One registered handler and its dispatch priority. Handler lists for a
/// given event type are kept sorted by descending priority, ties broken by
/// registration order.
pub struct HandlerInfo<H> {
    pub id: HandlerId,
    pub handler: H,
    pub priority: i32,
}

impl<H> HandlerInfo<H> {
    pub fn new(id: HandlerId, handler: H, priority: i32) -> Self {
        Self {
            id,
            handler,
            priority,
        }
    }
}
