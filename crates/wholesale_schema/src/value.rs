//! Parsed field values.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::fmt;
use std::str::FromStr;

use crate::contract::DataType;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// One parsed field. Ordering and hashing are total so values can be used
/// directly as primary-key components.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Value {
    Null,
    Int(i64),
    Decimal(Decimal),
    Date(NaiveDate),
    Str(String),
}

impl Value {
    /// Parse raw text as `data_type`. Empty text becomes `Null`; the caller
    /// decides whether null is allowed.
    pub fn parse(raw: &str, data_type: &DataType) -> Option<Value> {
        if raw.is_empty() {
            return Some(Value::Null);
        }
        match data_type {
            DataType::Int64 => raw.parse::<i64>().ok().map(Value::Int),
            DataType::Date => NaiveDate::parse_from_str(raw, DATE_FORMAT)
                .ok()
                .map(Value::Date),
            DataType::String => Some(Value::Str(raw.to_string())),
            DataType::Decimal { scale, .. } => {
                if !data_type.validate_string(raw) {
                    return None;
                }
                let mut d = Decimal::from_str(raw).ok()?;
                d.rescale(u32::from(*scale));
                Some(Value::Decimal(d))
            }
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Numeric view; integers widen to decimals.
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Value::Int(i) => Some(Decimal::from(*i)),
            Value::Decimal(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, ""),
            Value::Int(i) => write!(f, "{}", i),
            Value::Decimal(d) => write!(f, "{}", d),
            Value::Date(d) => write!(f, "{}", d.format(DATE_FORMAT)),
            Value::Str(s) => write!(f, "{}", s),
        }
    }
}
