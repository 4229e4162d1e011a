//! Schema Contract Types
//!
//! A table is declared before it is read. The declaration is a CONTRACT:
//! column order, semantic type, nullability and value checks. Input that
//! does not conform is a failure, never a silent coercion.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::value::Value;

/// Canonical data type used for schema contracts (shared across crates).
pub use wholesale_protocol::DataType;

/// A locked schema - immutable definition of one input relation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockedSchema {
    /// Table name (e.g., "lineitem")
    pub name: String,

    /// The columns in this schema, in file order
    pub columns: Vec<LockedColumn>,

    /// Primary key column names (enforced unique at load)
    pub primary_key: Vec<String>,

    /// Declared foreign keys (reported, not enforced at load)
    pub foreign_keys: Vec<ForeignKey>,

    /// SHA-256 of the declaration (first 16 hex chars)
    pub content_hash: String,
}

impl LockedSchema {
    /// Create a new locked schema
    pub fn new(name: impl Into<String>, columns: Vec<LockedColumn>) -> Self {
        let mut schema = Self {
            name: name.into(),
            columns,
            primary_key: Vec::new(),
            foreign_keys: Vec::new(),
            content_hash: String::new(),
        };
        schema.content_hash = schema.compute_hash();
        schema
    }

    /// Declare the primary key
    pub fn with_primary_key(mut self, columns: &[&str]) -> Self {
        self.primary_key = columns.iter().map(|c| c.to_string()).collect();
        self.content_hash = self.compute_hash();
        self
    }

    /// Declare a foreign key
    pub fn with_foreign_key(mut self, fk: ForeignKey) -> Self {
        self.foreign_keys.push(fk);
        self.content_hash = self.compute_hash();
        self
    }

    /// Index of a column by name
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Column indices of the primary key, in declaration order
    pub fn primary_key_indices(&self) -> Vec<usize> {
        self.primary_key
            .iter()
            .filter_map(|name| self.column_index(name))
            .collect()
    }

    fn compute_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.name.as_bytes());
        for col in &self.columns {
            hasher.update(b"\x1f");
            hasher.update(col.name.as_bytes());
            hasher.update(col.data_type.to_string().as_bytes());
            hasher.update([col.nullable as u8]);
            for check in &col.checks {
                hasher.update(check.to_string().as_bytes());
            }
        }
        hasher.update(b"\x1e");
        for key in &self.primary_key {
            hasher.update(key.as_bytes());
        }
        for fk in &self.foreign_keys {
            hasher.update(fk.to_string().as_bytes());
        }
        let digest = hasher.finalize();
        digest[..8].iter().map(|b| format!("{:02x}", b)).collect()
    }
}

/// A locked column definition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LockedColumn {
    /// Column name (must match exactly)
    pub name: String,

    /// Expected data type
    pub data_type: DataType,

    /// Whether empty values are allowed (loaded as null)
    pub nullable: bool,

    /// Value checks applied after parsing
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub checks: Vec<Check>,

    /// Optional description for documentation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl LockedColumn {
    /// Create a new required (non-nullable) column
    pub fn required(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable: false,
            checks: Vec::new(),
            description: None,
        }
    }

    /// Create a new optional (nullable) column
    pub fn optional(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable: true,
            checks: Vec::new(),
            description: None,
        }
    }

    /// Attach a value check
    pub fn with_check(mut self, check: Check) -> Self {
        self.checks.push(check);
        self
    }

    /// Set description
    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }
}

/// Declared value constraint for a column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Check {
    /// Numeric value strictly greater than zero
    Positive,
    /// Numeric value greater than or equal to zero
    NonNegative,
    /// Numeric value within an inclusive range
    Between { min: Decimal, max: Decimal },
    /// String value drawn from a fixed enumeration
    OneOf { values: Vec<String> },
}

impl Check {
    /// Enumeration check from string literals
    pub fn one_of(values: &[&str]) -> Self {
        Check::OneOf {
            values: values.iter().map(|v| v.to_string()).collect(),
        }
    }

    /// Inclusive range check from integer bounds
    pub fn between(min: i64, max: i64) -> Self {
        Check::Between {
            min: Decimal::from(min),
            max: Decimal::from(max),
        }
    }

    /// Evaluate the check. Null values always pass (nullability is checked
    /// separately).
    pub fn passes(&self, value: &Value) -> bool {
        if value.is_null() {
            return true;
        }
        match self {
            Check::Positive => value
                .as_decimal()
                .map(|d| d > Decimal::ZERO)
                .unwrap_or(false),
            Check::NonNegative => value
                .as_decimal()
                .map(|d| d >= Decimal::ZERO)
                .unwrap_or(false),
            Check::Between { min, max } => value
                .as_decimal()
                .map(|d| d >= *min && d <= *max)
                .unwrap_or(false),
            Check::OneOf { values } => value
                .as_str()
                .map(|s| values.iter().any(|v| v == s))
                .unwrap_or(false),
        }
    }
}

impl fmt::Display for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Check::Positive => write!(f, "> 0"),
            Check::NonNegative => write!(f, ">= 0"),
            Check::Between { min, max } => write!(f, "in [{}, {}]", min, max),
            Check::OneOf { values } => write!(f, "in {{{}}}", values.join(", ")),
        }
    }
}

/// A declared foreign key: `columns` of this table reference the primary key
/// of `references`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKey {
    pub columns: Vec<String>,
    pub references: String,
    pub referenced_columns: Vec<String>,
}

impl ForeignKey {
    pub fn new(columns: &[&str], references: &str, referenced_columns: &[&str]) -> Self {
        Self {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            references: references.to_string(),
            referenced_columns: referenced_columns.iter().map(|c| c.to_string()).collect(),
        }
    }
}

impl fmt::Display for ForeignKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}) -> {}({})",
            self.columns.join(", "),
            self.references,
            self.referenced_columns.join(", ")
        )
    }
}

/// A schema violation - a field is missing, malformed or mis-shaped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaViolation {
    /// Table being loaded
    pub table: String,

    /// 1-based source line (if applicable)
    pub line: Option<u64>,

    /// Column name (if applicable)
    pub column: Option<String>,

    /// What was expected
    pub expected: String,

    /// What was actually received
    pub got: String,

    /// Type of violation
    pub violation_type: ViolationType,
}

impl SchemaViolation {
    /// Create a type mismatch violation
    pub fn type_mismatch(
        table: impl Into<String>,
        column: impl Into<String>,
        expected: &DataType,
        got: impl Into<String>,
    ) -> Self {
        Self {
            table: table.into(),
            line: None,
            column: Some(column.into()),
            expected: expected.to_string(),
            got: got.into(),
            violation_type: ViolationType::TypeMismatch,
        }
    }

    /// Create a null not allowed violation
    pub fn null_not_allowed(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            line: None,
            column: Some(column.into()),
            expected: "non-empty value".to_string(),
            got: "empty field".to_string(),
            violation_type: ViolationType::NullNotAllowed,
        }
    }

    /// Create a column count violation
    pub fn column_count(table: impl Into<String>, expected: usize, got: usize) -> Self {
        Self {
            table: table.into(),
            line: None,
            column: None,
            expected: format!("{} fields", expected),
            got: format!("{} fields", got),
            violation_type: ViolationType::ColumnCountMismatch,
        }
    }

    /// Set the line context
    pub fn with_line(mut self, line: u64) -> Self {
        self.line = Some(line);
        self
    }
}

impl fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} in '{}': expected {}, got '{}'",
            self.violation_type, self.table, self.expected, self.got
        )?;
        if let Some(ref col) = self.column {
            write!(f, " (column {})", col)?;
        }
        if let Some(line) = self.line {
            write!(f, " at line {}", line)?;
        }
        Ok(())
    }
}

impl std::error::Error for SchemaViolation {}

/// Types of schema violations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationType {
    /// Value doesn't parse as the declared type (e.g., "abc" for int64)
    TypeMismatch,

    /// Empty value in a non-nullable column
    NullNotAllowed,

    /// Number of fields doesn't match the declared column count
    ColumnCountMismatch,
}

impl fmt::Display for ViolationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViolationType::TypeMismatch => write!(f, "Type mismatch"),
            ViolationType::NullNotAllowed => write!(f, "Null not allowed"),
            ViolationType::ColumnCountMismatch => write!(f, "Column count mismatch"),
        }
    }
}

/// A constraint violation - a well-typed value fails a declared business rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintViolation {
    pub table: String,
    pub line: Option<u64>,
    pub column: String,
    /// Rendered rule, e.g. "in [0, 1]" or "unique (l_orderkey, l_linenumber)"
    pub rule: String,
    pub value: String,
    pub kind: ConstraintKind,
}

/// Which kind of rule was broken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintKind {
    CheckFailed,
    DuplicateKey,
}

impl ConstraintViolation {
    pub fn check_failed(table: &str, column: &str, check: &Check, value: &Value) -> Self {
        Self {
            table: table.to_string(),
            line: None,
            column: column.to_string(),
            rule: check.to_string(),
            value: value.to_string(),
            kind: ConstraintKind::CheckFailed,
        }
    }

    pub fn duplicate_key(table: &str, key_columns: &[String], key: &[Value]) -> Self {
        let rendered: Vec<String> = key.iter().map(|v| v.to_string()).collect();
        Self {
            table: table.to_string(),
            line: None,
            column: key_columns.join(", "),
            rule: format!("unique ({})", key_columns.join(", ")),
            value: rendered.join(", "),
            kind: ConstraintKind::DuplicateKey,
        }
    }

    pub fn with_line(mut self, line: u64) -> Self {
        self.line = Some(line);
        self
    }
}

impl fmt::Display for ConstraintViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ConstraintKind::CheckFailed => write!(
                f,
                "'{}'.{} = '{}' violates check {}",
                self.table, self.column, self.value, self.rule
            )?,
            ConstraintKind::DuplicateKey => write!(
                f,
                "'{}' key ({}) = ({}) violates {}",
                self.table, self.column, self.value, self.rule
            )?,
        }
        if let Some(line) = self.line {
            write!(f, " at line {}", line)?;
        }
        Ok(())
    }
}

impl std::error::Error for ConstraintViolation {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_create_schema() {
        let schema = LockedSchema::new(
            "region",
            vec![
                LockedColumn::required("r_regionkey", DataType::Int64),
                LockedColumn::required("r_name", DataType::String),
                LockedColumn::optional("r_comment", DataType::String),
            ],
        )
        .with_primary_key(&["r_regionkey"]);

        assert_eq!(schema.name, "region");
        assert_eq!(schema.columns.len(), 3);
        assert_eq!(schema.primary_key_indices(), vec![0]);
        assert_eq!(schema.content_hash.len(), 16);
    }

    #[test]
    fn test_content_hash_tracks_declaration() {
        let a = LockedSchema::new(
            "t",
            vec![LockedColumn::required("q", DataType::money())],
        );
        let b = LockedSchema::new(
            "t",
            vec![LockedColumn::required("q", DataType::money()).with_check(Check::Positive)],
        );
        let a2 = LockedSchema::new(
            "t",
            vec![LockedColumn::required("q", DataType::money())],
        );
        assert_eq!(a.content_hash, a2.content_hash);
        assert_ne!(a.content_hash, b.content_hash);
    }

    #[test]
    fn test_checks() {
        let q = Value::Decimal(Decimal::from_str("17.00").unwrap());
        let zero = Value::Decimal(Decimal::ZERO);
        assert!(Check::Positive.passes(&q));
        assert!(!Check::Positive.passes(&zero));
        assert!(Check::NonNegative.passes(&zero));

        let discount = Check::between(0, 1);
        assert!(discount.passes(&Value::Decimal(Decimal::from_str("0.04").unwrap())));
        assert!(discount.passes(&Value::Decimal(Decimal::ONE)));
        assert!(!discount.passes(&Value::Decimal(Decimal::from_str("1.01").unwrap())));
        assert!(!discount.passes(&Value::Decimal(Decimal::from_str("-0.01").unwrap())));

        let status = Check::one_of(&["F", "O", "P"]);
        assert!(status.passes(&Value::Str("O".to_string())));
        assert!(!status.passes(&Value::Str("X".to_string())));
        assert!(status.passes(&Value::Null));
    }

    #[test]
    fn test_violation_display() {
        let v = SchemaViolation::type_mismatch("orders", "o_orderdate", &DataType::Date, "1996-13-40")
            .with_line(42);
        let msg = v.to_string();
        assert!(msg.contains("Type mismatch"));
        assert!(msg.contains("orders"));
        assert!(msg.contains("o_orderdate"));
        assert!(msg.contains("line 42"));

        let c = ConstraintViolation::check_failed(
            "lineitem",
            "l_discount",
            &Check::between(0, 1),
            &Value::Decimal(Decimal::from_str("1.50").unwrap()),
        )
        .with_line(7);
        let msg = c.to_string();
        assert!(msg.contains("l_discount"));
        assert!(msg.contains("1.50"));
        assert!(msg.contains("in [0, 1]"));
        assert!(msg.contains("line 7"));
    }
}
