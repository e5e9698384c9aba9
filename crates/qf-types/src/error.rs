//! Error model: a single root error carrying a kind, message, code, context
//! map and optional chained cause.
//!
//! Display mirrors the original framework's `format_exception`: `"[CODE]
//! message"`, followed by `" | context: k=v, ..."` when context is
//! non-empty (sorted by key), followed by `" | cause: ..."` when a cause is
//! attached.

use std::collections::BTreeMap;
use std::fmt;

/// Error subkind. `Internal` is the catch-all the rest of the runtime
/// reaches for when no domain kind applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Config,
    Data,
    Strategy,
    Risk,
    Trade,
    Validation,
    Internal,
}

impl ErrorKind {
    fn default_code(self) -> &'static str {
        match self {
            ErrorKind::Config => "CONFIG_ERROR",
            ErrorKind::Data => "DATA_ERROR",
            ErrorKind::Strategy => "STRATEGY_ERROR",
            ErrorKind::Risk => "RISK_ERROR",
            ErrorKind::Trade => "TRADE_ERROR",
            ErrorKind::Validation => "VALIDATION_ERROR",
            ErrorKind::Internal => "INTERNAL_ERROR",
        }
    }
}

/// Root error type for the backtesting runtime.
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    message: String,
    code: String,
    context: BTreeMap<String, String>,
    cause: Option<Box<dyn std::error::Error + Send + Sync>>,
    /// `std::any::type_name` of `cause`, captured in `wrap` before it is
    /// erased to a trait object, so `Display` can print it the way the
    /// original's `format_exception` did with `type(exc.cause).__name__`.
    cause_type_name: Option<&'static str>,
}

impl Error {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            code: kind.default_code().to_string(),
            kind,
            message: message.into(),
            context: BTreeMap::new(),
            cause: None,
            cause_type_name: None,
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Config, message)
    }

    pub fn data(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Data, message)
    }

    pub fn strategy(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Strategy, message)
    }

    pub fn risk(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Risk, message)
    }

    pub fn trade(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Trade, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    /// Override the default code derived from `kind`.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = code.into();
        self
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Wrap a foreign error as the cause of a new error of the given kind,
    /// preserving chain semantics via `Error::source`.
    pub fn wrap(
        kind: ErrorKind,
        message: impl Into<String>,
        cause: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        let cause_type_name = Some(std::any::type_name_of_val(&cause));
        Self {
            code: kind.default_code().to_string(),
            kind,
            message: message.into(),
            context: BTreeMap::new(),
            cause: Some(Box::new(cause)),
            cause_type_name,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if !self.context.is_empty() {
            write!(f, " | context: ")?;
            let mut first = true;
            for (k, v) in &self.context {
                if !first {
                    write!(f, ", ")?;
                }
                write!(f, "{k}={v}")?;
                first = false;
            }
        }
        if let Some(cause) = &self.cause {
            match self.cause_type_name {
                Some(type_name) => write!(f, " | cause: {type_name}: {cause}")?,
                None => write!(f, " | cause: {cause}")?,
            }
        }
        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_ref()
            .map(|c| c.as_ref() as &(dyn std::error::Error + 'static))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Normalize a data-adapter failure message into one of the reasons §7
/// names, by matching case-insensitive substrings. Used when wrapping
/// adapter exceptions into a `Data` error.
pub fn normalize_data_reason(action: &str, text: &str) -> String {
    let lowered = text.to_lowercase();
    if ["429", "too many", "rate"].iter().any(|s| lowered.contains(s)) {
        "rate limit".to_string()
    } else if ["timeout", "network", "connection"]
        .iter()
        .any(|s| lowered.contains(s))
    {
        "network error".to_string()
    } else if ["no data", "empty"].iter().any(|s| lowered.contains(s)) {
        "no data".to_string()
    } else {
        format!("{action} failed")
    }
}

/// Build a validation error from a format string.
#[macro_export]
macro_rules! validation_error {
    ($($arg:tt)*) => {
        $crate::error::Error::validation(format!($($arg)*))
    };
}

/// Build an internal error from a format string.
#[macro_export]
macro_rules! internal_error {
    ($($arg:tt)*) => {
        $crate::error::Error::internal(format!($($arg)*))
    };
}

/// Build a configuration error from a format string.
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)*) => {
        $crate::error::Error::config(format!($($arg)*))
    };
}
