//! Configuration resolution for the CLI
//!
//! Priority (highest first):
//! 1. Command-line flags
//! 2. The TOML file named by `--config`, else the first of `./wholesale.toml`
//!    and `<home>/wholesale.toml` that exists
//! 3. Built-in defaults
//!
//! All paths are under ~/.wholesale/ unless `WHOLESALE_HOME` says otherwise.

use anyhow::Result;
use serde::Serialize;
use std::path::{Path, PathBuf};

use wholesale_pipeline::PipelineConfig;
use wholesale_protocol::paths::WholesalePaths;

use crate::cli::error::HelpfulError;
use crate::cli::output::print_table;

/// Resolved configuration plus the file it came from.
#[derive(Debug, Clone)]
pub struct Settings {
    pub config: PipelineConfig,
    pub source: Option<PathBuf>,
}

/// Flag values that override the file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub input: Option<PathBuf>,
    pub reference: Option<PathBuf>,
    pub store: Option<PathBuf>,
    pub export_csv: bool,
}

impl Overrides {
    pub fn apply(&self, config: &mut PipelineConfig) {
        if let Some(dir) = &self.input {
            config.input.dir = dir.clone();
        }
        if let Some(reference) = &self.reference {
            config.input.reference_file = Some(reference.clone());
        }
        if let Some(root) = &self.store {
            config.store.root = root.clone();
        }
        if self.export_csv {
            config.output.export_csv = true;
        }
    }
}

/// Load settings. An explicit path must exist; the implicit candidates
/// are optional.
pub fn load_settings(explicit: Option<&Path>) -> Result<Settings> {
    load_settings_from(explicit, &WholesalePaths::resolve())
}

fn load_settings_from(explicit: Option<&Path>, paths: &WholesalePaths) -> Result<Settings> {
    let path = match explicit {
        Some(path) if !path.is_file() => {
            return Err(HelpfulError::config_not_found(path).into());
        }
        Some(path) => path.to_path_buf(),
        None => match paths.config_candidates().into_iter().find(|p| p.is_file()) {
            Some(path) => path,
            None => {
                return Ok(Settings {
                    config: PipelineConfig::default(),
                    source: None,
                })
            }
        },
    };

    let text = std::fs::read_to_string(&path)
        .map_err(|e| HelpfulError::invalid_config(&path, &e.to_string()))?;
    let config = parse_config(&text).map_err(|e| HelpfulError::invalid_config(&path, &e))?;
    tracing::debug!(path = %path.display(), "Loaded config file");
    Ok(Settings {
        config,
        source: Some(path),
    })
}

pub fn parse_config(text: &str) -> std::result::Result<PipelineConfig, String> {
    toml::from_str(text).map_err(|e| e.to_string())
}

/// Settings with flag overrides applied.
pub fn resolve(explicit: Option<&Path>, overrides: &Overrides) -> Result<PipelineConfig> {
    let mut settings = load_settings(explicit)?;
    overrides.apply(&mut settings.config);
    Ok(settings.config)
}

#[derive(Debug, Serialize)]
struct ConfigOutput {
    config_file: Option<PathBuf>,
    home: PathBuf,
    logs_dir: PathBuf,
    home_config: PathBuf,
    reference_file: PathBuf,
    config: PipelineConfig,
}

/// `wholesale config`
pub fn run(json: bool, explicit: Option<&Path>) -> Result<()> {
    let paths = WholesalePaths::resolve();
    let settings = load_settings_from(explicit, &paths)?;
    let output = ConfigOutput {
        config_file: settings.source.clone(),
        home: paths.home,
        logs_dir: paths.logs_dir,
        home_config: paths.home_config,
        reference_file: settings.config.input.reference_path(),
        config: settings.config,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let config = &output.config;
    let rows = vec![
        vec![
            "config file".to_string(),
            output
                .config_file
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(defaults)".to_string()),
        ],
        vec!["home".to_string(), output.home.display().to_string()],
        vec!["logs".to_string(), output.logs_dir.display().to_string()],
        vec!["home config".to_string(), output.home_config.display().to_string()],
        vec!["input.dir".to_string(), config.input.dir.display().to_string()],
        vec!["input.delimiter".to_string(), config.input.delimiter.to_string()],
        vec![
            "input.reference_file".to_string(),
            output.reference_file.display().to_string(),
        ],
        vec!["store.root".to_string(), config.store.root.display().to_string()],
        vec![
            "store.location".to_string(),
            format!("{}.{}", config.store.catalog, config.store.schema),
        ],
        vec![
            "queries.active_window_days".to_string(),
            config.queries.active_window_days.to_string(),
        ],
        vec![
            "queries.top_customers".to_string(),
            config.queries.top_customers.to_string(),
        ],
        vec![
            "queries.top_suppliers".to_string(),
            config.queries.top_suppliers.to_string(),
        ],
        vec![
            "queries.cheapest_per_part".to_string(),
            config.queries.cheapest_per_part.to_string(),
        ],
        vec!["output.export_csv".to_string(), config.output.export_csv.to_string()],
    ];
    print_table(&["SETTING", "VALUE"], rows);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use wholesale_schema::TableName;

    #[test]
    fn test_parse_full_config() {
        let config = parse_config(
            r#"
[input]
dir = "/data/sf1"
delimiter = "|"
reference_file = "/data/iso.csv"

[input.files]
lineitem = "lineitem_sf1.tbl"

[store]
root = "/warehouse"
catalog = "sales"

[queries]
top_customers = 20

[output]
export_csv = true
"#,
        )
        .unwrap();
        assert_eq!(config.input.dir, PathBuf::from("/data/sf1"));
        assert_eq!(config.input.delimiter, '|');
        assert_eq!(
            config.input.files.get(&TableName::Lineitem).map(String::as_str),
            Some("lineitem_sf1.tbl")
        );
        assert_eq!(config.store.catalog, "sales");
        assert_eq!(config.store.schema, "tpch");
        assert_eq!(config.queries.top_customers, 20);
        assert_eq!(config.queries.top_suppliers, 10);
        assert!(config.output.export_csv);
    }

    #[test]
    fn test_unknown_table_in_files_is_rejected() {
        let err = parse_config("[input.files]\nshipments = \"x.tbl\"\n").unwrap_err();
        assert!(err.contains("shipments") || err.contains("unknown variant"));
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let err = load_settings(Some(dir.path().join("missing.toml").as_path())).unwrap_err();
        assert!(err.to_string().contains("Config file not found"));
    }

    #[test]
    fn test_home_config_is_the_fallback() {
        let home = TempDir::new().unwrap();
        let paths = WholesalePaths::under(home.path().to_path_buf());
        std::fs::write(&paths.home_config, "[store]\ncatalog = \"from_home\"\n").unwrap();

        let settings = load_settings_from(None, &paths).unwrap();
        assert_eq!(settings.source.as_deref(), Some(paths.home_config.as_path()));
        assert_eq!(settings.config.store.catalog, "from_home");

        let empty = WholesalePaths::under(home.path().join("nothing-here"));
        let settings = load_settings_from(None, &empty).unwrap();
        assert!(settings.source.is_none());
        assert_eq!(settings.config, PipelineConfig::default());
    }

    #[test]
    fn test_overrides_win() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("wholesale.toml");
        std::fs::write(&path, "[input]\ndir = \"from-file\"\n").unwrap();

        let config = resolve(
            Some(path.as_path()),
            &Overrides {
                input: Some(PathBuf::from("from-flag")),
                store: Some(PathBuf::from("store")),
                ..Overrides::default()
            },
        )
        .unwrap();
        assert_eq!(config.input.dir, PathBuf::from("from-flag"));
        assert_eq!(config.store.root, PathBuf::from("store"));
        assert!(!config.output.export_csv);
    }
}
