//! Relation -> Arrow conversion.
//!
//! Every persisted table, source or derived, is described by a
//! [`LockedSchema`] and converted column by column from [`Value`]s. The
//! declared type decides the Arrow type: int64 -> Int64, decimal(p,s) ->
//! Decimal128(p,s), date -> Date32, string -> Utf8.

use arrow::array::{
    ArrayRef, Date32Builder, Decimal128Builder, Int64Builder, RecordBatch, StringBuilder,
};
use arrow::datatypes::{DataType as ArrowType, Field, Schema, SchemaRef};
use chrono::Datelike;
use std::sync::Arc;

use wholesale_schema::{DataType, LockedSchema, Relation, Value};

use crate::error::{PipelineError, Result, Stage};

/// Days from 0001-01-01 (CE day 1) to 1970-01-01.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// A row type with a declared table contract.
pub trait Tabular {
    fn contract() -> LockedSchema;

    /// Field values in contract column order.
    fn values(&self) -> Vec<Value>;
}

pub fn arrow_type(data_type: &DataType) -> ArrowType {
    match data_type {
        DataType::Int64 => ArrowType::Int64,
        DataType::Decimal { precision, scale } => ArrowType::Decimal128(*precision, *scale as i8),
        DataType::Date => ArrowType::Date32,
        DataType::String => ArrowType::Utf8,
    }
}

pub fn arrow_schema(contract: &LockedSchema) -> SchemaRef {
    let fields: Vec<Field> = contract
        .columns
        .iter()
        .map(|c| Field::new(&c.name, arrow_type(&c.data_type), c.nullable))
        .collect();
    Arc::new(Schema::new(fields))
}

/// Convert rows laid out in `contract` column order into one batch.
pub fn rows_to_batch(contract: &LockedSchema, rows: &[Vec<Value>]) -> Result<RecordBatch> {
    let table = contract.name.as_str();
    let mut columns: Vec<ArrayRef> = Vec::with_capacity(contract.columns.len());

    for (idx, column) in contract.columns.iter().enumerate() {
        let cells = rows.iter().map(|row| row.get(idx).unwrap_or(&Value::Null));
        let mismatch = |value: &Value| {
            PipelineError::contract(
                Stage::Persist,
                table,
                format!(
                    "column '{}' declared {} but holds '{}'",
                    column.name, column.data_type, value
                ),
            )
        };
        let null_check = |value: &Value| -> Result<()> {
            if value.is_null() && !column.nullable {
                return Err(PipelineError::contract(
                    Stage::Persist,
                    table,
                    format!("column '{}' is not nullable", column.name),
                ));
            }
            Ok(())
        };

        let array: ArrayRef = match &column.data_type {
            DataType::Int64 => {
                let mut builder = Int64Builder::with_capacity(rows.len());
                for value in cells {
                    null_check(value)?;
                    match value {
                        Value::Null => builder.append_null(),
                        Value::Int(i) => builder.append_value(*i),
                        other => return Err(mismatch(other)),
                    }
                }
                Arc::new(builder.finish())
            }
            DataType::Decimal { precision, scale } => {
                let mut builder = Decimal128Builder::with_capacity(rows.len())
                    .with_precision_and_scale(*precision, *scale as i8)
                    .map_err(|source| PipelineError::Arrow {
                        table: table.to_string(),
                        source,
                    })?;
                for value in cells {
                    null_check(value)?;
                    match value {
                        Value::Null => builder.append_null(),
                        Value::Decimal(d) => {
                            let mut d = *d;
                            d.rescale(u32::from(*scale));
                            builder.append_value(d.mantissa());
                        }
                        Value::Int(i) => {
                            builder.append_value(i128::from(*i) * 10i128.pow(u32::from(*scale)))
                        }
                        other => return Err(mismatch(other)),
                    }
                }
                Arc::new(builder.finish())
            }
            DataType::Date => {
                let mut builder = Date32Builder::with_capacity(rows.len());
                for value in cells {
                    null_check(value)?;
                    match value {
                        Value::Null => builder.append_null(),
                        Value::Date(d) => {
                            builder.append_value(d.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE)
                        }
                        other => return Err(mismatch(other)),
                    }
                }
                Arc::new(builder.finish())
            }
            DataType::String => {
                let mut builder = StringBuilder::new();
                for value in cells {
                    null_check(value)?;
                    match value {
                        Value::Null => builder.append_null(),
                        Value::Str(s) => builder.append_value(s),
                        other => return Err(mismatch(other)),
                    }
                }
                Arc::new(builder.finish())
            }
        };
        columns.push(array);
    }

    RecordBatch::try_new(arrow_schema(contract), columns).map_err(|source| PipelineError::Arrow {
        table: table.to_string(),
        source,
    })
}

/// Convert a validated source relation.
pub fn relation_to_batch(relation: &Relation) -> Result<RecordBatch> {
    rows_to_batch(&relation.schema, &relation.rows)
}

/// Convert typed rows.
pub fn tabular_to_batch<T: Tabular>(rows: &[T]) -> Result<RecordBatch> {
    let values: Vec<Vec<Value>> = rows.iter().map(Tabular::values).collect();
    rows_to_batch(&T::contract(), &values)
}

/// Helpers for building `Value`s from typed fields.
pub(crate) fn opt_str(v: &Option<String>) -> Value {
    match v {
        Some(s) => Value::Str(s.clone()),
        None => Value::Null,
    }
}

pub(crate) fn opt_int(v: Option<i64>) -> Value {
    v.map(Value::Int).unwrap_or(Value::Null)
}

pub(crate) fn text(s: &str) -> Value {
    Value::Str(s.to_string())
}
