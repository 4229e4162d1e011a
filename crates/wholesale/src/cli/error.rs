//! Helpful error types for CLI commands
//!
//! Every error includes:
//! - What went wrong
//! - Context about the situation
//! - Suggestions for how to fix it

use serde::Serialize;
use std::fmt;
use std::path::Path;

use wholesale_pipeline::{PipelineError, Stage};
use wholesale_schema::LoadError;

/// An error with helpful context and suggestions
#[derive(Debug)]
pub struct HelpfulError {
    /// The main error message
    pub message: String,
    /// Additional context about what was happening
    pub context: Option<String>,
    /// Suggestions for how to fix the error
    pub suggestions: Vec<String>,
}

impl HelpfulError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            context: None,
            suggestions: Vec::new(),
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    pub fn with_suggestions(
        mut self,
        suggestions: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.suggestions.extend(suggestions.into_iter().map(|s| s.into()));
        self
    }

    // === Common error constructors ===

    /// Config file given explicitly but missing
    pub fn config_not_found(path: &Path) -> Self {
        Self::new(format!("Config file not found: {}", path.display()))
            .with_context("--config must point to an existing TOML file")
            .with_suggestions([
                format!("TRY: Check that the file exists: ls -la {}", path.display()),
                "TRY: Omit --config to use ./wholesale.toml or built-in defaults".to_string(),
            ])
    }

    /// Config file exists but is not valid TOML for the pipeline
    pub fn invalid_config(path: &Path, details: &str) -> Self {
        Self::new(format!("Invalid config file: {}", path.display()))
            .with_context(details.to_string())
            .with_suggestions([
                "TRY: Sections are [input], [store], [queries] and [output]".to_string(),
                "TRY: Print the resolved defaults: wholesale config".to_string(),
            ])
    }

    /// Table not present in the store
    pub fn table_not_found(table: &str, available: &[String]) -> Self {
        let err = Self::new(format!("Table not found: {}", table))
            .with_context("The table has not been committed by a pipeline run");
        if available.is_empty() {
            err.with_suggestion("TRY: Run the pipeline first: wholesale run --input <DIR>")
        } else {
            err.with_suggestion(format!("TRY: Stored tables: {}", available.join(", ")))
        }
    }

    /// Unknown declared schema
    pub fn unknown_schema(name: &str, known: &[String]) -> Self {
        Self::new(format!("Unknown table schema: {}", name))
            .with_suggestion(format!("TRY: One of: {}", known.join(", ")))
    }

    /// Suggestions for a failed pipeline stage
    pub fn from_pipeline(err: &PipelineError) -> Self {
        let base = Self::new(err.to_string())
            .with_context(format!("Pipeline stage '{}' failed", err.stage()));
        match err {
            PipelineError::Config(_) => base.with_suggestion(
                "TRY: Print the resolved configuration: wholesale config",
            ),
            PipelineError::Load(LoadError::Io { path, .. }) => base.with_suggestions([
                format!("TRY: Check that the file exists: ls -la {}", path.display()),
                "TRY: Point at the dbgen output directory: --input <DIR>".to_string(),
                "TRY: Override file names in [input.files] of wholesale.toml".to_string(),
            ]),
            PipelineError::Load(load) => {
                let table = load.table().unwrap_or("input");
                base.with_suggestions([
                    format!("TRY: Inspect the table contract: wholesale schema {}", table),
                    "TRY: Fix or regenerate the offending row; no tables were written".to_string(),
                ])
            }
            PipelineError::ReferenceIo { path, .. } => base.with_suggestions([
                format!("TRY: Check that the file exists: ls -la {}", path.display()),
                "TRY: Pass the country-code file explicitly: --reference <FILE>".to_string(),
            ]),
            PipelineError::ReferenceFormat { .. } => base.with_suggestion(
                "TRY: The reference file needs 'country_name' and 'iso3_code' header columns",
            ),
            PipelineError::Store(_) => base.with_suggestions([
                "TRY: Check write permissions on the store root".to_string(),
                "TRY: Previously committed tables were left untouched".to_string(),
            ]),
            PipelineError::Contract { .. } | PipelineError::Arrow { .. } => base,
        }
    }
}

impl fmt::Display for HelpfulError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ERROR: {}", self.message)?;

        if let Some(ctx) = &self.context {
            writeln!(f, "CONTEXT: {}", ctx)?;
        }

        if !self.suggestions.is_empty() {
            writeln!(f)?;
            for suggestion in &self.suggestions {
                writeln!(f, "  {}", suggestion)?;
            }
        }

        Ok(())
    }
}

impl std::error::Error for HelpfulError {}

#[derive(Debug, Serialize)]
struct JsonError {
    error: String,
    stage: Option<Stage>,
    kind: Option<&'static str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    suggestions: Vec<String>,
}

fn json_error(err: &anyhow::Error) -> JsonError {
    if let Some(pipeline_err) = err.downcast_ref::<PipelineError>() {
        return JsonError {
            error: pipeline_err.to_string(),
            stage: Some(pipeline_err.stage()),
            kind: Some(pipeline_err.kind()),
            suggestions: HelpfulError::from_pipeline(pipeline_err).suggestions,
        };
    }
    if let Some(helpful) = err.downcast_ref::<HelpfulError>() {
        return JsonError {
            error: helpful.message.clone(),
            stage: None,
            kind: None,
            suggestions: helpful.suggestions.clone(),
        };
    }
    JsonError {
        error: format!("{:#}", err),
        stage: None,
        kind: None,
        suggestions: Vec::new(),
    }
}

/// Print an error as a JSON object on stdout.
pub fn print_json_error(err: &anyhow::Error) {
    let payload = json_error(err);
    match serde_json::to_string_pretty(&payload) {
        Ok(text) => println!("{}", text),
        Err(_) => eprintln!("{:?}", err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use wholesale_schema::{Check, ConstraintViolation, Value};

    #[test]
    fn test_helpful_error_display() {
        let err = HelpfulError::new("Something went wrong")
            .with_context("While processing data")
            .with_suggestion("Try again");

        let display = format!("{}", err);
        assert!(display.contains("ERROR: Something went wrong"));
        assert!(display.contains("CONTEXT: While processing data"));
        assert!(display.contains("Try again"));
    }

    #[test]
    fn test_config_not_found() {
        let err = HelpfulError::config_not_found(&PathBuf::from("/nonexistent/wholesale.toml"));
        let display = format!("{}", err);
        assert!(display.contains("/nonexistent/wholesale.toml"));
        assert!(display.contains("TRY:"));
    }

    #[test]
    fn test_json_error_carries_stage() {
        let err = anyhow::Error::from(PipelineError::from(LoadError::Constraint(
            ConstraintViolation::check_failed(
                "lineitem",
                "l_discount",
                &Check::between(0, 1),
                &Value::Int(2),
            )
            .with_line(4),
        )));
        let payload = json_error(&err);
        assert_eq!(payload.stage, Some(Stage::Load));
        assert_eq!(payload.kind, Some("constraint_violation"));
        assert!(payload.error.contains("l_discount"));

        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["stage"], "load");
    }

    #[test]
    fn test_json_error_for_plain_errors() {
        let payload = json_error(&anyhow::anyhow!("boom"));
        assert_eq!(payload.error, "boom");
        assert!(payload.stage.is_none());
    }
}
