//! Strict delimited-text loader.
//!
//! Reads dbgen-style files (no header, optional trailing delimiter) and
//! validates every field against a [`LockedSchema`]. The first violation
//! aborts the load: a table is either fully typed or not produced at all.

use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use crate::contract::{ConstraintViolation, DataType, LockedSchema, SchemaViolation};
use crate::value::Value;

/// Errors produced while loading a table.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Failed to open {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed input for '{table}': {source}")]
    Csv {
        table: String,
        #[source]
        source: csv::Error,
    },

    #[error("Schema violation: {0}")]
    Schema(#[from] SchemaViolation),

    #[error("Constraint violation: {0}")]
    Constraint(#[from] ConstraintViolation),
}

impl LoadError {
    /// Table the error belongs to, if known.
    pub fn table(&self) -> Option<&str> {
        match self {
            LoadError::Io { .. } => None,
            LoadError::Csv { table, .. } => Some(table),
            LoadError::Schema(v) => Some(&v.table),
            LoadError::Constraint(v) => Some(&v.table),
        }
    }

    /// Stable machine-readable kind, used in JSON error output.
    pub fn kind(&self) -> &'static str {
        match self {
            LoadError::Io { .. } => "io",
            LoadError::Csv { .. } => "malformed_input",
            LoadError::Schema(_) => "schema_violation",
            LoadError::Constraint(_) => "constraint_violation",
        }
    }
}

/// A loaded table: its contract plus validated rows in file order.
#[derive(Debug, Clone)]
pub struct Relation {
    pub schema: LockedSchema,
    pub rows: Vec<Vec<Value>>,
}

impl Relation {
    pub fn empty(schema: LockedSchema) -> Self {
        Self {
            schema,
            rows: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.schema.name
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The values of `columns` for every row, in file order. `None` when a
    /// column is not declared.
    pub fn project<'a>(
        &'a self,
        columns: &[String],
    ) -> Option<impl Iterator<Item = Vec<&'a Value>> + 'a> {
        let indices: Vec<usize> = columns
            .iter()
            .map(|c| self.schema.column_index(c))
            .collect::<Option<_>>()?;
        Some(
            self.rows
                .iter()
                .map(move |row| indices.iter().map(|&i| &row[i]).collect()),
        )
    }
}

/// Load a table from a file on disk.
pub fn load_file(schema: &LockedSchema, path: &Path, delimiter: u8) -> Result<Relation, LoadError> {
    let file = File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let relation = load_reader(schema, file, delimiter)?;
    info!(
        table = %schema.name,
        rows = relation.len(),
        path = %path.display(),
        "Loaded table"
    );
    Ok(relation)
}

/// Load a table from any reader.
pub fn load_reader<R: Read>(
    schema: &LockedSchema,
    reader: R,
    delimiter: u8,
) -> Result<Relation, LoadError> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .from_reader(reader);

    let pk_indices = schema.primary_key_indices();
    let mut seen_keys: HashSet<Vec<Value>> = HashSet::new();
    let mut rows = Vec::new();
    let width = schema.columns.len();

    for result in rdr.records() {
        let record = result.map_err(|source| LoadError::Csv {
            table: schema.name.clone(),
            source,
        })?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);

        let mut fields: Vec<&str> = record.iter().collect();
        // dbgen terminates every line with the delimiter
        if fields.len() == width + 1 && fields.last().is_some_and(|f| f.is_empty()) {
            fields.pop();
        }
        if fields.len() != width {
            return Err(SchemaViolation::column_count(&schema.name, width, fields.len())
                .with_line(line)
                .into());
        }

        let row = parse_row(schema, &fields, line)?;

        if !pk_indices.is_empty() {
            let key: Vec<Value> = pk_indices.iter().map(|&i| row[i].clone()).collect();
            if seen_keys.contains(&key) {
                return Err(
                    ConstraintViolation::duplicate_key(&schema.name, &schema.primary_key, &key)
                        .with_line(line)
                        .into(),
                );
            }
            seen_keys.insert(key);
        }

        rows.push(row);
    }

    debug!(table = %schema.name, rows = rows.len(), "Validated rows");
    Ok(Relation {
        schema: schema.clone(),
        rows,
    })
}

fn parse_row(schema: &LockedSchema, fields: &[&str], line: u64) -> Result<Vec<Value>, LoadError> {
    let mut row = Vec::with_capacity(fields.len());
    for (column, raw) in schema.columns.iter().zip(fields) {
        let text = match column.data_type {
            DataType::String => *raw,
            _ => raw.trim(),
        };
        let value = Value::parse(text, &column.data_type).ok_or_else(|| {
            SchemaViolation::type_mismatch(&schema.name, &column.name, &column.data_type, text)
                .with_line(line)
        })?;
        if value.is_null() && !column.nullable {
            return Err(SchemaViolation::null_not_allowed(&schema.name, &column.name)
                .with_line(line)
                .into());
        }
        if let Some(check) = column.checks.iter().find(|c| !c.passes(&value)) {
            return Err(
                ConstraintViolation::check_failed(&schema.name, &column.name, check, &value)
                    .with_line(line)
                    .into(),
            );
        }
        row.push(value);
    }
    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::{ConstraintKind, ViolationType};
    use crate::tables::TableName;

    fn load(table: TableName, text: &str) -> Result<Relation, LoadError> {
        load_reader(&table.schema(), text.as_bytes(), b'|')
    }

    #[test]
    fn test_trailing_delimiter_is_ignored() {
        let rel = load(
            TableName::Region,
            "0|AFRICA|lar deposits. blithely final|\n1|AMERICA|hs use ironic|\n",
        )
        .unwrap();
        assert_eq!(rel.len(), 2);
        assert_eq!(rel.rows[1][1], Value::Str("AMERICA".to_string()));
    }

    #[test]
    fn test_missing_trailing_delimiter_is_accepted() {
        let rel = load(TableName::Region, "0|AFRICA|c").unwrap();
        assert_eq!(rel.len(), 1);
    }

    #[test]
    fn test_empty_comment_is_null() {
        let rel = load(TableName::Region, "0|AFRICA||\n").unwrap();
        assert!(rel.rows[0][2].is_null());
    }

    #[test]
    fn test_quote_characters_are_literal() {
        let rel = load(TableName::Region, "0|AFRICA|say \"hi\"|\n").unwrap();
        assert_eq!(rel.rows[0][2], Value::Str("say \"hi\"".to_string()));
    }

    #[test]
    fn test_column_count_mismatch() {
        let err = load(TableName::Region, "0|AFRICA|\n1|AMERICA|x|y|z|\n").unwrap_err();
        match err {
            LoadError::Schema(v) => {
                assert_eq!(v.violation_type, ViolationType::ColumnCountMismatch);
                assert_eq!(v.line, Some(2));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unparsable_key() {
        let err = load(TableName::Region, "zero|AFRICA|c|\n").unwrap_err();
        match err {
            LoadError::Schema(v) => {
                assert_eq!(v.violation_type, ViolationType::TypeMismatch);
                assert_eq!(v.column.as_deref(), Some("r_regionkey"));
                assert_eq!(v.got, "zero");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_required_field_missing() {
        let err = load(TableName::Region, "0||c|\n").unwrap_err();
        assert!(matches!(
            err,
            LoadError::Schema(SchemaViolation {
                violation_type: ViolationType::NullNotAllowed,
                ..
            })
        ));
    }

    #[test]
    fn test_enum_check_rejects_unknown_status() {
        let err = load(
            TableName::Orders,
            "1|370|X|172799.49|1996-01-02|5-LOW|Clerk#000000951|0|c|\n",
        )
        .unwrap_err();
        match err {
            LoadError::Constraint(v) => {
                assert_eq!(v.kind, ConstraintKind::CheckFailed);
                assert_eq!(v.column, "o_orderstatus");
                assert_eq!(v.value, "X");
                assert_eq!(v.line, Some(1));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_duplicate_primary_key() {
        let err = load(TableName::Nation, "0|ALGERIA|0|c|\n1|ARGENTINA|1|c|\n0|AGAIN|0|c|\n")
            .unwrap_err();
        match err {
            LoadError::Constraint(v) => {
                assert_eq!(v.kind, ConstraintKind::DuplicateKey);
                assert_eq!(v.line, Some(3));
                assert_eq!(v.value, "0");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(
            load(TableName::Nation, "0|ALGERIA|0|c|\n0|X|0|c|\n")
                .unwrap_err()
                .table(),
            Some("nation")
        );
    }

    #[test]
    fn test_numeric_fields_are_trimmed() {
        let rel = load(TableName::Nation, " 7 |GERMANY| 3|c|\n").unwrap();
        assert_eq!(rel.rows[0][0], Value::Int(7));
        assert_eq!(rel.rows[0][2], Value::Int(3));
    }

    #[test]
    fn test_project_columns() {
        let rel = load(TableName::Nation, "0|ALGERIA|0|c|\n1|ARGENTINA|1|c|\n").unwrap();
        let keys: Vec<Vec<&Value>> = rel
            .project(&["n_nationkey".to_string(), "n_name".to_string()])
            .unwrap()
            .collect();
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[1], vec![&Value::Int(1), &Value::Str("ARGENTINA".to_string())]);
        assert!(rel.project(&["nope".to_string()]).is_none());
    }

    #[test]
    fn test_decimal_overflowing_declared_precision_is_rejected() {
        let line = "1|155190|7706|1|99999999999999|21168.23|0.04|0.02|N|O|1996-03-13|1996-02-12|1996-03-22|DELIVER IN PERSON|TRUCK|c|\n";
        match load(TableName::Lineitem, line).unwrap_err() {
            LoadError::Schema(v) => {
                assert_eq!(v.violation_type, ViolationType::TypeMismatch);
                assert_eq!(v.column.as_deref(), Some("l_quantity"));
                assert_eq!(v.got, "99999999999999");
            }
            other => panic!("unexpected error: {other}"),
        }

        let ok = line.replace("99999999999999", "9999999999999.99");
        let rel = load(TableName::Lineitem, &ok).unwrap();
        assert_eq!(rel.len(), 1);
    }
}
