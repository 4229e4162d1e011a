//! Output formatting utilities for CLI commands
//!
//! Provides consistent formatting for:
//! - Tables with column alignment
//! - Arrow record batches as tables or JSON rows

use anyhow::{Context, Result};
use arrow::array::{Array, Int64Array, RecordBatch};
use arrow::datatypes::DataType as ArrowType;
use arrow::util::display::{ArrayFormatter, FormatOptions};
use comfy_table::{presets::UTF8_FULL_CONDENSED, Cell, Color, ContentArrangement, Table};
use serde_json::{Map, Value as JsonValue};

/// Print a table with headers and rows
pub fn print_table(headers: &[&str], rows: Vec<Vec<String>>) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic);

    let header_cells: Vec<Cell> = headers
        .iter()
        .map(|h| Cell::new(h).fg(Color::Cyan))
        .collect();
    table.set_header(header_cells);

    for row in rows {
        table.add_row(row);
    }

    println!("{}", table);
}

/// Render up to `limit` rows of `batches` as strings, nulls as empty cells.
pub fn batch_rows(batches: &[RecordBatch], limit: usize) -> Result<(Vec<String>, Vec<Vec<String>>)> {
    let Some(first) = batches.first() else {
        return Ok((Vec::new(), Vec::new()));
    };
    let headers = first
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();

    let options = FormatOptions::default().with_null("");
    let mut rows = Vec::new();
    'outer: for batch in batches {
        let formatters = batch
            .columns()
            .iter()
            .map(|c| ArrayFormatter::try_new(c.as_ref(), &options))
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("Failed to format table column")?;
        for row in 0..batch.num_rows() {
            if rows.len() >= limit {
                break 'outer;
            }
            rows.push(formatters.iter().map(|f| f.value(row).to_string()).collect());
        }
    }
    Ok((headers, rows))
}

/// Up to `limit` rows as JSON objects. Integers stay numbers; decimals and
/// dates are rendered as strings so no precision is lost.
pub fn batch_json_rows(batches: &[RecordBatch], limit: usize) -> Result<Vec<JsonValue>> {
    let options = FormatOptions::default();
    let mut out = Vec::new();
    'outer: for batch in batches {
        let schema = batch.schema();
        let formatters = batch
            .columns()
            .iter()
            .map(|c| ArrayFormatter::try_new(c.as_ref(), &options))
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("Failed to format table column")?;
        for row in 0..batch.num_rows() {
            if out.len() >= limit {
                break 'outer;
            }
            let mut object = Map::new();
            for (idx, field) in schema.fields().iter().enumerate() {
                let column = batch.column(idx);
                let value = if column.is_null(row) {
                    JsonValue::Null
                } else if field.data_type() == &ArrowType::Int64 {
                    column
                        .as_any()
                        .downcast_ref::<Int64Array>()
                        .map(|a| JsonValue::from(a.value(row)))
                        .unwrap_or(JsonValue::Null)
                } else {
                    JsonValue::String(formatters[idx].value(row).to_string())
                };
                object.insert(field.name().clone(), value);
            }
            out.push(JsonValue::Object(object));
        }
    }
    Ok(out)
}

/// Print a batch as a table
pub fn print_batches(batches: &[RecordBatch], limit: usize) -> Result<()> {
    let (headers, rows) = batch_rows(batches, limit)?;
    let header_refs: Vec<&str> = headers.iter().map(String::as_str).collect();
    print_table(&header_refs, rows);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Decimal128Array, StringArray};
    use arrow::datatypes::{Field, Schema};
    use std::sync::Arc;

    fn batch() -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![
            Field::new("k", ArrowType::Int64, false),
            Field::new("name", ArrowType::Utf8, true),
            Field::new("bal", ArrowType::Decimal128(15, 2), false),
        ]));
        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Int64Array::from(vec![1, 2, 3])),
                Arc::new(StringArray::from(vec![Some("a"), None, Some("c")])),
                Arc::new(
                    Decimal128Array::from(vec![12345i128, -50, 0])
                        .with_precision_and_scale(15, 2)
                        .unwrap(),
                ),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_batch_rows_limits_and_blanks_nulls() {
        let (headers, rows) = batch_rows(&[batch()], 2).unwrap();
        assert_eq!(headers, vec!["k", "name", "bal"]);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], vec!["1", "a", "123.45"]);
        assert_eq!(rows[1][1], "");
        assert_eq!(rows[1][2], "-0.50");
    }

    #[test]
    fn test_batch_json_rows() {
        let rows = batch_json_rows(&[batch(), batch()], 4).unwrap();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0]["k"], 1);
        assert_eq!(rows[0]["bal"], "123.45");
        assert!(rows[1]["name"].is_null());
        assert_eq!(rows[3]["k"], 1);
    }

    #[test]
    fn test_no_batches() {
        let (headers, rows) = batch_rows(&[], 10).unwrap();
        assert!(headers.is_empty());
        assert!(rows.is_empty());
    }
}
