//! Attribute value parsers.
//!
//! Raw attribute values are strings or absent. A parser turns that into the
//! typed value held by an [`Attribute`](super::Attribute). Non-nullable
//! parsers fall back to a default; nullable ones yield `None`. Unparseable
//! numbers are treated like an absent attribute rather than NaN, so that
//! re-writing the same garbage never counts as a change.

/// Parses a raw attribute value.
pub type Parser<V> = Box<dyn Fn(Option<&str>) -> V>;

pub fn string(default: impl Into<String>) -> impl Fn(Option<&str>) -> String + 'static {
    let default = default.into();
    move |raw| raw.map(str::to_string).unwrap_or_else(|| default.clone())
}

pub fn nullable_string() -> impl Fn(Option<&str>) -> Option<String> + 'static {
    |raw| raw.map(str::to_string)
}

pub fn number(default: f64) -> impl Fn(Option<&str>) -> f64 + 'static {
    move |raw| parse_number(raw).unwrap_or(default)
}

pub fn nullable_number() -> impl Fn(Option<&str>) -> Option<f64> + 'static {
    parse_number
}

/// Only the literals `true` and `false` are recognized.
pub fn boolean(default: bool) -> impl Fn(Option<&str>) -> bool + 'static {
    move |raw| parse_boolean(raw).unwrap_or(default)
}

pub fn nullable_boolean() -> impl Fn(Option<&str>) -> Option<bool> + 'static {
    parse_boolean
}

fn parse_number(raw: Option<&str>) -> Option<f64> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|n| !n.is_nan())
}

fn parse_boolean(raw: Option<&str>) -> Option<bool> {
    match raw {
        Some("true") => Some(true),
        Some("false") => Some(false),
        _ => None,
    }
}
