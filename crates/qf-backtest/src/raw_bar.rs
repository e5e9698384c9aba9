//! Raw bar ingestion and date coercion (§4.5, §9), grounded on
//! `simple_backtest.py::_coerce_date`.
//!
//! A data-source adapter hands the driver loosely-typed records rather
//! than the already-normalized `qf_types::Bar`: the `date` field may
//! arrive as a date, a naive datetime, or a string in one of three
//! formats. `RawBar` carries that flexibility; `normalize` converts it
//! into the closed `Bar` shape once the date is resolved.

use chrono::{NaiveDate, NaiveDateTime};
use qf_types::{Bar, Error, Result, Symbol};

/// The date forms `simple_backtest.py::_coerce_date` accepts.
#[derive(Debug, Clone, PartialEq)]
pub enum RawDate {
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Str(String),
}

impl From<NaiveDate> for RawDate {
    fn from(value: NaiveDate) -> Self {
        RawDate::Date(value)
    }
}

impl From<NaiveDateTime> for RawDate {
    fn from(value: NaiveDateTime) -> Self {
        RawDate::DateTime(value)
    }
}

impl From<&str> for RawDate {
    fn from(value: &str) -> Self {
        RawDate::Str(value.to_string())
    }
}

/// One un-normalized bar record as a data-source adapter would hand it
/// to the driver, prior to the `date` coercion of §4.5.
#[derive(Debug, Clone, PartialEq)]
pub struct RawBar {
    pub symbol: Symbol,
    pub date: RawDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub amount: f64,
}

/// Formats accepted for string dates, tried in order, matching
/// `_coerce_date`'s `("%Y-%m-%d", "%Y/%m/%d", "%Y%m%d")`.
const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%Y%m%d"];

/// Resolve a `RawDate` to a `NaiveDate`, trying each accepted string
/// format in turn.
pub fn coerce_date(value: &RawDate) -> Result<NaiveDate> {
    match value {
        RawDate::Date(date) => Ok(*date),
        RawDate::DateTime(dt) => Ok(dt.date()),
        RawDate::Str(text) => DATE_FORMATS
            .iter()
            .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
            .ok_or_else(|| {
                Error::data(format!("unsupported date value: {text:?}"))
                    .with_context("accepted_formats", DATE_FORMATS.join(", "))
            }),
    }
}

/// Resolve `raw.date` and fold the rest of the fields into a normalized
/// `Bar` (§3).
pub fn normalize(raw: &RawBar) -> Result<Bar> {
    Ok(Bar {
        symbol: raw.symbol.clone(),
        date: coerce_date(&raw.date)?,
        open: raw.open,
        high: raw.high,
        low: raw.low,
        close: raw.close,
        volume: raw.volume,
        amount: raw.amount,
    })
}
