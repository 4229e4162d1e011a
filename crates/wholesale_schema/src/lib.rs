//! Declared schemas and the strict loader for the TPC-H source tables.
//!
//! Ingestion is two-phase: every table has an explicit [`LockedSchema`]
//! (see [`tables`]) and input is validated against it field by field.
//! Nothing is inferred from the data.
//!
//! # Example
//!
//! ```
//! use wholesale_schema::{load_reader, TableName};
//!
//! let rel = load_reader(&TableName::Region.schema(), "0|AFRICA|comment|".as_bytes(), b'|')
//!     .unwrap();
//! assert_eq!(rel.len(), 1);
//! ```

pub mod contract;
pub mod dataset;
pub mod loader;
pub mod records;
pub mod tables;
pub mod value;

pub use contract::{
    Check, ConstraintKind, ConstraintViolation, DataType, ForeignKey, LockedColumn, LockedSchema,
    SchemaViolation, ViolationType,
};
pub use dataset::{Dataset, LoadOptions};
pub use loader::{load_file, load_reader, LoadError, Relation};
pub use records::{
    Customer, LineItem, Nation, Order, Part, PartSupp, Region, RowView, Supplier, TableRecord,
};
pub use tables::{schema_for, TableName};
pub use value::Value;
