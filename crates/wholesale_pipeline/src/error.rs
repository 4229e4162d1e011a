//! Pipeline errors, each attributed to the stage that failed.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;
use wholesale_schema::{LoadError, SchemaViolation};
use wholesale_sinks::SinkError;

/// Pipeline stage, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Config,
    Load,
    GeoEnrich,
    Queries,
    Denormalize,
    Persist,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Config => "config",
            Stage::Load => "load",
            Stage::GeoEnrich => "geo_enrich",
            Stage::Queries => "queries",
            Stage::Denormalize => "denormalize",
            Stage::Persist => "persist",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("Failed to read reference data {path}: {source}")]
    ReferenceIo {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Reference data {path} is unusable: {message}")]
    ReferenceFormat { path: PathBuf, message: String },

    /// A stage received input that breaks its contract (e.g. a value of the
    /// wrong type for a declared column).
    #[error("{stage} stage input contract broken for '{table}': {message}")]
    Contract {
        stage: Stage,
        table: String,
        message: String,
    },

    #[error("Failed to build Arrow batch for '{table}': {source}")]
    Arrow {
        table: String,
        #[source]
        source: arrow::error::ArrowError,
    },

    #[error("Table store write failed: {0}")]
    Store(#[from] SinkError),
}

pub type Result<T> = std::result::Result<T, PipelineError>;

impl PipelineError {
    /// The stage that failed.
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::Config(_) => Stage::Config,
            PipelineError::Load(_) => Stage::Load,
            PipelineError::ReferenceIo { .. } | PipelineError::ReferenceFormat { .. } => {
                Stage::GeoEnrich
            }
            PipelineError::Contract { stage, .. } => *stage,
            PipelineError::Arrow { .. } | PipelineError::Store(_) => Stage::Persist,
        }
    }

    /// Stable machine-readable kind for JSON error output.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Config(_) => "config",
            PipelineError::Load(err) => err.kind(),
            PipelineError::ReferenceIo { .. } => "reference_io",
            PipelineError::ReferenceFormat { .. } => "reference_format",
            PipelineError::Contract { .. } => "contract",
            PipelineError::Arrow { .. } => "arrow",
            PipelineError::Store(_) => "store",
        }
    }

    pub(crate) fn contract(stage: Stage, table: &str, message: impl Into<String>) -> Self {
        PipelineError::Contract {
            stage,
            table: table.to_string(),
            message: message.into(),
        }
    }
}

impl From<SchemaViolation> for PipelineError {
    fn from(v: SchemaViolation) -> Self {
        PipelineError::Load(LoadError::Schema(v))
    }
}
