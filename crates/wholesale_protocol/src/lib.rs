//! Canonical types shared by every Wholesale crate.
//!
//! The loader, the table store and the pipeline all agree on:
//! - [`DataType`]: the semantic column types a declared schema may use
//! - [`TableRef`]: the (catalog, schema, table) address of a managed table

pub mod defaults;
pub mod naming;
pub mod paths;
pub mod types;

pub use naming::{is_safe_ident, safe_ident};
pub use types::{DataType, TableRef, TableRefError};
