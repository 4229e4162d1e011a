//! `wholesale schema` - print declared table contracts.

use anyhow::Result;
use clap::Args;

use wholesale_pipeline::{
    ActiveCustomer, CheapestSupplier, CustGeo, FactRow, NationMapped, OrderLineitem,
    PartPartsupp, SuppGeo, Tabular, TopSupplier,
};
use wholesale_schema::{LockedSchema, TableName};

use crate::cli::error::HelpfulError;
use crate::cli::output::print_table;

#[derive(Debug, Args)]
pub struct SchemaArgs {
    /// Table name; omit to list every declared table
    pub table: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Every declared contract: sources in load order, then derived tables in
/// pipeline order.
pub fn declared_schemas() -> Vec<LockedSchema> {
    let mut schemas: Vec<LockedSchema> = TableName::all().iter().map(|t| t.schema()).collect();
    schemas.extend([
        NationMapped::contract(),
        ActiveCustomer::contract(),
        TopSupplier::contract(),
        CheapestSupplier::contract(),
        CustGeo::contract(),
        SuppGeo::contract(),
        OrderLineitem::contract(),
        PartPartsupp::contract(),
        FactRow::contract(),
    ]);
    schemas
}

pub fn run(args: SchemaArgs) -> Result<()> {
    let schemas = declared_schemas();

    let Some(name) = args.table else {
        if args.json {
            println!("{}", serde_json::to_string_pretty(&schemas)?);
        } else {
            let rows = schemas
                .iter()
                .map(|s| {
                    vec![
                        s.name.clone(),
                        s.columns.len().to_string(),
                        s.primary_key.join(", "),
                        s.content_hash.clone(),
                    ]
                })
                .collect();
            print_table(&["TABLE", "COLUMNS", "PRIMARY KEY", "HASH"], rows);
        }
        return Ok(());
    };

    let wanted = name.trim().to_lowercase();
    let Some(schema) = schemas.iter().find(|s| s.name == wanted) else {
        let known: Vec<String> = schemas.iter().map(|s| s.name.clone()).collect();
        return Err(HelpfulError::unknown_schema(&name, &known).into());
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(schema)?);
        return Ok(());
    }

    let rows = schema
        .columns
        .iter()
        .map(|c| {
            vec![
                c.name.clone(),
                c.data_type.to_string(),
                if c.nullable { "yes" } else { "no" }.to_string(),
                c.checks
                    .iter()
                    .map(|check| check.to_string())
                    .collect::<Vec<_>>()
                    .join("; "),
            ]
        })
        .collect();
    print_table(&["COLUMN", "TYPE", "NULLABLE", "CHECKS"], rows);
    println!("primary key: ({})", schema.primary_key.join(", "));
    for fk in &schema.foreign_keys {
        println!("foreign key: {}", fk);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_declared_schema_names_are_unique() {
        let schemas = declared_schemas();
        let names: HashSet<&str> = schemas.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names.len(), schemas.len());
        assert_eq!(schemas.len(), 17);
        assert!(names.contains("fact_table"));
        assert!(names.contains("lineitem"));
    }
}
