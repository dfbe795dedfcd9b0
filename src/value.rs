/// Dynamic values exchanged between callers and providers
///
/// Operations take positional `Value` arguments and return a single `Value`.
/// The enum is deliberately small: numbers, integers (counts), text, calendar
/// values and booleans cover everything the built-in providers exchange.
use crate::{OperationError, OperationResult};
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// JSON has no NaN or infinity; non-finite numbers are written as the
/// strings `"NaN"`, `"inf"` and `"-inf"` so the sentinel stays visible.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    #[serde(serialize_with = "serialize_number")]
    Number(f64),
    Date(NaiveDate),
    Time(NaiveTime),
    Text(String),
}

impl Value {
    /// Short type label used in logs
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Integer(_) => "integer",
            Value::Number(_) => "number",
            Value::Date(_) => "date",
            Value::Time(_) => "time",
            Value::Text(_) => "text",
        }
    }

    /// Numeric view; integers widen to f64
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Integer view; whole numbers narrow from f64
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            Value::Number(n) if n.is_finite() && n.fract() == 0.0 => Some(*n as i64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Date view; ISO `YYYY-MM-DD` text is accepted as well
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(d) => Some(*d),
            Value::Text(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d").ok(),
            _ => None,
        }
    }

    /// True for the numeric fallback sentinel (NaN)
    pub fn is_nan_sentinel(&self) -> bool {
        matches!(self, Value::Number(n) if n.is_nan())
    }

    /// Interpret a command-line token: number, then ISO date, then text
    pub fn parse_cli(token: &str) -> Value {
        if let Ok(n) = token.parse::<f64>() {
            return Value::Number(n);
        }
        if let Ok(d) = NaiveDate::parse_from_str(token, "%Y-%m-%d") {
            return Value::Date(d);
        }
        Value::Text(token.to_string())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Number(n) => write!(f, "{}", n),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Value::Time(t) => write!(f, "{}", t.format("%H:%M:%S")),
            Value::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Value::Date(d)
    }
}

impl From<NaiveTime> for Value {
    fn from(t: NaiveTime) -> Self {
        Value::Time(t)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

/// Positional argument accessors that fail with `Validation` errors
pub mod args {
    use super::*;

    fn get<'a>(args: &'a [Value], index: usize, name: &str) -> OperationResult<&'a Value> {
        args.get(index).ok_or_else(|| {
            OperationError::Validation(format!("missing argument '{}' at position {}", name, index))
        })
    }

    pub fn number(args: &[Value], index: usize, name: &str) -> OperationResult<f64> {
        let value = get(args, index, name)?;
        value.as_f64().ok_or_else(|| {
            OperationError::Validation(format!(
                "{} must be a number, got {}",
                name,
                value.type_name()
            ))
        })
    }

    pub fn integer(args: &[Value], index: usize, name: &str) -> OperationResult<i64> {
        let value = get(args, index, name)?;
        value.as_i64().ok_or_else(|| {
            OperationError::Validation(format!(
                "{} must be an integer, got {}",
                name,
                value.type_name()
            ))
        })
    }

    pub fn text<'a>(args: &'a [Value], index: usize, name: &str) -> OperationResult<&'a str> {
        let value = get(args, index, name)?;
        value.as_str().ok_or_else(|| {
            OperationError::Validation(format!(
                "{} must be a string, got {}",
                name,
                value.type_name()
            ))
        })
    }

    pub fn date(args: &[Value], index: usize, name: &str) -> OperationResult<NaiveDate> {
        let value = get(args, index, name)?;
        value.as_date().ok_or_else(|| {
            OperationError::Validation(format!(
                "{} must be a date (YYYY-MM-DD), got {}",
                name, value
            ))
        })
    }

    /// Render arguments for logs, truncated to `max_chars`
    pub fn summarize(args: &[Value], max_chars: usize) -> String {
        let rendered = format!(
            "[{}]",
            args.iter()
                .map(|v| v.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        );
        if rendered.chars().count() <= max_chars {
            rendered
        } else {
            rendered.chars().take(max_chars).collect()
        }
    }
}

fn serialize_number<S>(number: &f64, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    if number.is_finite() {
        serializer.serialize_f64(*number)
    } else {
        serializer.collect_str(number)
    }
}
