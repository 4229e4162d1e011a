//! Command-line interface for the wholesale pipeline.

pub mod error;
pub mod output;

pub mod check;
pub mod config;
pub mod query;
pub mod run;
pub mod schema;
pub mod show;
