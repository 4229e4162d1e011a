//! Canonical enums and addressing types (used across all crates)

use serde::de;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::naming::safe_ident;

/// Semantic column type for declared schemas.
///
/// Serialized as a lowercase string for simple types and as an object with a
/// `kind` for parameterised ones:
/// `"int64"`, `"date"`, `{"kind": "decimal", "precision": 15, "scale": 2}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum DataType {
    /// 64-bit signed integer (keys, counts, sizes)
    Int64,

    /// Fixed-point decimal (money, quantities, rates)
    Decimal { precision: u8, scale: u8 },

    /// Calendar date (no time component), ISO `%Y-%m-%d`
    Date,

    /// UTF-8 string
    #[default]
    String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DataTypeRepr {
    Simple(String),
    Object(DataTypeObject),
}

#[derive(Debug, Deserialize)]
struct DataTypeObject {
    pub kind: String,
    #[serde(default)]
    pub precision: Option<u8>,
    #[serde(default)]
    pub scale: Option<u8>,
}

impl Serialize for DataType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            DataType::Int64 => serializer.serialize_str("int64"),
            DataType::Date => serializer.serialize_str("date"),
            DataType::String => serializer.serialize_str("string"),
            DataType::Decimal { precision, scale } => {
                let mut map = serializer.serialize_map(Some(3))?;
                map.serialize_entry("kind", "decimal")?;
                map.serialize_entry("precision", precision)?;
                map.serialize_entry("scale", scale)?;
                map.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for DataType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match DataTypeRepr::deserialize(deserializer)? {
            DataTypeRepr::Simple(raw) => DataType::from_str(&raw).map_err(de::Error::custom),
            DataTypeRepr::Object(obj) => DataType::from_object(obj).map_err(de::Error::custom),
        }
    }
}

impl DataType {
    /// The decimal type TPC-H uses for every money and quantity column.
    pub const fn money() -> Self {
        DataType::Decimal {
            precision: 15,
            scale: 2,
        }
    }

    /// Check if a string value can be parsed as this type
    pub fn validate_string(&self, value: &str) -> bool {
        if value.is_empty() {
            return true; // Empty handled by nullable check
        }

        match self {
            DataType::Int64 => value.parse::<i64>().is_ok(),
            DataType::Date => chrono::NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok(),
            DataType::String => true,
            DataType::Decimal { precision, scale } => decimal_precision_scale(value)
                .map(|(int_digits, value_scale)| {
                    // The value is rescaled to `scale`, so the integer part
                    // only has `precision - scale` digits to work with.
                    int_digits + (*scale as usize) <= *precision as usize
                        && value_scale <= *scale as usize
                })
                .unwrap_or(false),
        }
    }

    fn from_object(obj: DataTypeObject) -> Result<Self, String> {
        match obj.kind.to_lowercase().as_str() {
            "int64" => Ok(DataType::Int64),
            "date" => Ok(DataType::Date),
            "string" => Ok(DataType::String),
            "decimal" => {
                let precision = obj
                    .precision
                    .ok_or_else(|| "decimal.precision is required".to_string())?;
                let scale = obj
                    .scale
                    .ok_or_else(|| "decimal.scale is required".to_string())?;
                if precision == 0 || precision > 38 {
                    return Err("decimal.precision must be between 1 and 38".to_string());
                }
                if scale > precision {
                    return Err("decimal.scale must be <= precision".to_string());
                }
                Ok(DataType::Decimal { precision, scale })
            }
            other => Err(format!("Invalid data type kind: '{}'", other)),
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Int64 => write!(f, "int64"),
            DataType::Date => write!(f, "date"),
            DataType::String => write!(f, "string"),
            DataType::Decimal { precision, scale } => {
                write!(f, "decimal({},{})", precision, scale)
            }
        }
    }
}

impl FromStr for DataType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        if let Some(args) = lower
            .strip_prefix("decimal(")
            .and_then(|rest| rest.strip_suffix(')'))
        {
            let (p, sc) = args
                .split_once(',')
                .ok_or_else(|| format!("Invalid decimal type: '{}'", s))?;
            let precision = p
                .trim()
                .parse::<u8>()
                .map_err(|_| format!("Invalid decimal precision in '{}'", s))?;
            let scale = sc
                .trim()
                .parse::<u8>()
                .map_err(|_| format!("Invalid decimal scale in '{}'", s))?;
            return DataType::from_object(DataTypeObject {
                kind: "decimal".to_string(),
                precision: Some(precision),
                scale: Some(scale),
            });
        }
        match lower.as_str() {
            "int64" | "bigint" | "integer" | "int" => Ok(DataType::Int64),
            "date" => Ok(DataType::Date),
            "string" | "utf8" | "varchar" | "text" => Ok(DataType::String),
            _ => Err(format!("Invalid data type: '{}'", s)),
        }
    }
}

fn decimal_precision_scale(value: &str) -> Option<(usize, usize)> {
    let mut int_digits = 0usize;
    let mut scale = 0usize;
    let mut saw_dot = false;
    let mut saw_digit = false;

    for (idx, ch) in value.chars().enumerate() {
        if ch == '+' || ch == '-' {
            if idx != 0 {
                return None;
            }
            continue;
        }
        if ch == '.' {
            if saw_dot {
                return None;
            }
            saw_dot = true;
            continue;
        }
        if !ch.is_ascii_digit() {
            return None;
        }
        saw_digit = true;
        if saw_dot {
            scale += 1;
        } else if int_digits > 0 || ch != '0' {
            // Leading zeros take no precision
            int_digits += 1;
        }
    }

    if saw_digit {
        Some((int_digits, scale))
    } else {
        None
    }
}

/// Errors produced when parsing a table address.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TableRefError {
    #[error("table reference is empty")]
    Empty,
    #[error("table reference '{0}' has too many parts (expected [catalog.][schema.]table)")]
    TooManyParts(String),
}

/// Address of a managed table: (catalog, schema, table).
///
/// Every component is sanitised with [`safe_ident`] so a `TableRef` can be
/// mapped onto a directory layout without escaping.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TableRef {
    pub catalog: String,
    pub schema: String,
    pub table: String,
}

impl TableRef {
    pub fn new(catalog: &str, schema: &str, table: &str) -> Self {
        Self {
            catalog: safe_ident(catalog),
            schema: safe_ident(schema),
            table: safe_ident(table),
        }
    }

    /// A sibling table in the same catalog and schema.
    pub fn sibling(&self, table: &str) -> Self {
        Self {
            catalog: self.catalog.clone(),
            schema: self.schema.clone(),
            table: safe_ident(table),
        }
    }

    /// Parse `table`, `schema.table` or `catalog.schema.table`, filling the
    /// missing leading parts from the defaults.
    pub fn parse(
        raw: &str,
        default_catalog: &str,
        default_schema: &str,
    ) -> Result<Self, TableRefError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(TableRefError::Empty);
        }
        let parts: Vec<&str> = raw.split('.').collect();
        match parts.as_slice() {
            [table] => Ok(Self::new(default_catalog, default_schema, table)),
            [schema, table] => Ok(Self::new(default_catalog, schema, table)),
            [catalog, schema, table] => Ok(Self::new(catalog, schema, table)),
            _ => Err(TableRefError::TooManyParts(raw.to_string())),
        }
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.catalog, self.schema, self.table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_type_serialization() {
        assert_eq!(serde_json::to_string(&DataType::Int64).unwrap(), "\"int64\"");
        let json = serde_json::to_string(&DataType::money()).unwrap();
        assert!(json.contains("\"kind\":\"decimal\""));
        assert!(json.contains("\"precision\":15"));

        let parsed: DataType = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, DataType::money());
        let parsed: DataType = serde_json::from_str("\"date\"").unwrap();
        assert_eq!(parsed, DataType::Date);
    }

    #[test]
    fn test_data_type_from_str() {
        assert_eq!("decimal(15,2)".parse::<DataType>().unwrap(), DataType::money());
        assert_eq!("BIGINT".parse::<DataType>().unwrap(), DataType::Int64);
        assert!("decimal(40,2)".parse::<DataType>().is_err());
        assert!("blob".parse::<DataType>().is_err());
    }

    #[test]
    fn test_validate_string() {
        assert!(DataType::Int64.validate_string("-17"));
        assert!(!DataType::Int64.validate_string("1.5"));
        assert!(DataType::Date.validate_string("1995-03-15"));
        assert!(!DataType::Date.validate_string("15/03/1995"));
        assert!(DataType::money().validate_string("901.00"));
        assert!(DataType::money().validate_string("-283.84"));
        assert!(!DataType::money().validate_string("0.125"));
        assert!(!DataType::money().validate_string("12a"));
    }

    #[test]
    fn test_decimal_integer_digits_leave_room_for_scale() {
        // decimal(15,2) holds at most 13 integer digits
        assert!(DataType::money().validate_string("9999999999999.99"));
        assert!(DataType::money().validate_string("9999999999999"));
        assert!(!DataType::money().validate_string("99999999999999"));
        assert!(!DataType::money().validate_string("10000000000000.5"));
        assert!(DataType::money().validate_string("0000000000000001.50"));
        assert!(DataType::money().validate_string("0.07"));
    }

    #[test]
    fn test_table_ref_parse() {
        let t = TableRef::parse("fact_table", "wholesale", "tpch").unwrap();
        assert_eq!(t.to_string(), "wholesale.tpch.fact_table");

        let t = TableRef::parse("bench.sf1.orders", "wholesale", "tpch").unwrap();
        assert_eq!(t.catalog, "bench");
        assert_eq!(t.schema, "sf1");
        assert_eq!(t.table, "orders");

        assert_eq!(
            TableRef::parse("  ", "wholesale", "tpch"),
            Err(TableRefError::Empty)
        );
        assert!(matches!(
            TableRef::parse("a.b.c.d", "wholesale", "tpch"),
            Err(TableRefError::TooManyParts(_))
        ));
    }
}
