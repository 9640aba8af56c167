//! Driver-neutral scalar values.
//!
//! The builder never talks to a driver directly: templates produce a SQL
//! string plus a [`Value`] list, and the result reader consumes [`Value`]s
//! handed back by the caller's row iterator. The enum covers exactly the
//! scalar shapes the column model knows about.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;

/// A SQL argument or result scalar.
///
/// Serializable so argument lists can be logged or snapshotted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    DateTime(NaiveDateTime),
    Date(NaiveDate),
    Time(NaiveTime),
    Json(serde_json::Value),
}

impl Value {
    /// Whether this value is SQL NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Widen any integer representation to i64, if possible.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::Uint(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    /// Widen any integer representation to u64, if non-negative.
    pub fn as_uint(&self) -> Option<u64> {
        match self {
            Value::Uint(v) => Some(*v),
            Value::Int(v) => u64::try_from(*v).ok(),
            _ => None,
        }
    }

    /// Text content, if this is a text value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Parse a datetime out of the canonical driver shapes.
    ///
    /// Accepts native datetime values, date-only and time-only values
    /// (promoted onto the epoch date / midnight), and the canonical string
    /// forms `YYYY-MM-DD HH:MM:SS` / `YYYY-MM-DDTHH:MM:SS`.
    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            Value::DateTime(dt) => Some(*dt),
            Value::Date(d) => d.and_hms_opt(0, 0, 0),
            Value::Time(t) => Some(NaiveDateTime::new(epoch_date(), *t)),
            Value::Text(s) => parse_datetime_text(s),
            Value::Bytes(b) => parse_datetime_text(std::str::from_utf8(b).ok()?),
            _ => None,
        }
    }

    /// Parse a date out of the canonical driver shapes (`YYYY-MM-DD`).
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(d) => Some(*d),
            Value::DateTime(dt) => Some(dt.date()),
            Value::Text(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d").ok(),
            Value::Bytes(b) => {
                NaiveDate::parse_from_str(std::str::from_utf8(b).ok()?, "%Y-%m-%d").ok()
            }
            _ => None,
        }
    }

    /// Parse a time out of the canonical driver shapes (`HH:MM:SS`).
    pub fn as_time(&self) -> Option<NaiveTime> {
        match self {
            Value::Time(t) => Some(*t),
            Value::DateTime(dt) => Some(dt.time()),
            Value::Text(s) => NaiveTime::parse_from_str(s, "%H:%M:%S").ok(),
            Value::Bytes(b) => {
                NaiveTime::parse_from_str(std::str::from_utf8(b).ok()?, "%H:%M:%S").ok()
            }
            _ => None,
        }
    }

    /// Render this value as an inline SQL literal.
    ///
    /// Only used for literal operands in conditions; bound arguments never go
    /// through here. Strings are single-quoted with `'` doubled.
    pub fn write_literal(&self, out: &mut String) {
        match self {
            Value::Null => out.push_str("NULL"),
            Value::Bool(true) => out.push_str("TRUE"),
            Value::Bool(false) => out.push_str("FALSE"),
            Value::Int(v) => {
                out.push_str(&v.to_string());
            }
            Value::Uint(v) => {
                out.push_str(&v.to_string());
            }
            Value::Float(v) => {
                out.push_str(&v.to_string());
            }
            Value::Text(s) => write_quoted(s, out),
            Value::Bytes(b) => {
                // Hex form works on both dialects.
                out.push_str("X'");
                for byte in b {
                    out.push_str(&format!("{byte:02X}"));
                }
                out.push('\'');
            }
            Value::DateTime(dt) => {
                write_quoted(&dt.format("%Y-%m-%d %H:%M:%S").to_string(), out);
            }
            Value::Date(d) => write_quoted(&d.format("%Y-%m-%d").to_string(), out),
            Value::Time(t) => write_quoted(&t.format("%H:%M:%S").to_string(), out),
            Value::Json(v) => write_quoted(&v.to_string(), out),
        }
    }
}

fn write_quoted(s: &str, out: &mut String) {
    out.push('\'');
    for ch in s.chars() {
        if ch == '\'' {
            out.push('\'');
        }
        out.push(ch);
    }
    out.push('\'');
}

fn epoch_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default()
}

fn parse_datetime_text(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S"))
        .ok()
        .or_else(|| {
            // Date-only input promotes to midnight.
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

macro_rules! value_from_int {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(v: $t) -> Self {
                Value::Int(v as i64)
            }
        })*
    };
}

macro_rules! value_from_uint {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(v: $t) -> Self {
                Value::Uint(v as u64)
            }
        })*
    };
}

value_from_int!(i8, i16, i32, i64);
value_from_uint!(u8, u16, u32, u64);

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v as f64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::DateTime(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Date(v)
    }
}

impl From<NaiveTime> for Value {
    fn from(v: NaiveTime) -> Self {
        Value::Time(v)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Value::Json(v)
    }
}

impl<T> From<Option<T>> for Value
where
    T: Into<Value>,
{
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_text_escapes_quotes() {
        let mut out = String::new();
        Value::Text("it's".into()).write_literal(&mut out);
        assert_eq!(out, "'it''s'");
    }

    #[test]
    fn literal_null_and_bool() {
        let mut out = String::new();
        Value::Null.write_literal(&mut out);
        out.push(' ');
        Value::Bool(true).write_literal(&mut out);
        assert_eq!(out, "NULL TRUE");
    }

    #[test]
    fn datetime_from_canonical_text() {
        let dt = Value::Text("2024-03-01 10:20:30".into()).as_datetime().unwrap();
        assert_eq!(dt.to_string(), "2024-03-01 10:20:30");
    }

    #[test]
    fn date_only_text_promotes_to_midnight() {
        let dt = Value::Text("2024-03-01".into()).as_datetime().unwrap();
        assert_eq!(dt.to_string(), "2024-03-01 00:00:00");
    }

    #[test]
    fn time_from_canonical_text() {
        let t = Value::Text("10:20:30".into()).as_time().unwrap();
        assert_eq!(t.to_string(), "10:20:30");
    }

    #[test]
    fn int_widening() {
        assert_eq!(Value::Uint(7).as_int(), Some(7));
        assert_eq!(Value::Int(-1).as_uint(), None);
    }

    #[test]
    fn option_none_is_null() {
        let v: Value = Option::<i64>::None.into();
        assert!(v.is_null());
    }
}
