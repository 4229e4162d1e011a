//! Where a Wholesale process keeps its state.
//!
//! Everything hangs off one home directory:
//! - `<home>/warehouse`: default table store root
//! - `<home>/logs`: rolling log files
//! - `<home>/wholesale.toml`: config used when the working directory has none

use serde::Serialize;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::defaults::DEFAULT_CONFIG_FILE;

pub const HOME_ENV: &str = "WHOLESALE_HOME";

/// Resolved state locations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WholesalePaths {
    pub home: PathBuf,
    pub store_root: PathBuf,
    pub logs_dir: PathBuf,
    pub home_config: PathBuf,
}

impl WholesalePaths {
    /// Resolve from the process environment.
    pub fn resolve() -> Self {
        Self::from_env(|key| std::env::var_os(key))
    }

    /// Resolve the home directory from `lookup`.
    ///
    /// Priority:
    /// 1) WHOLESALE_HOME
    /// 2) HOME/USERPROFILE joined with `.wholesale`
    /// 3) ./.wholesale
    pub fn from_env(lookup: impl Fn(&str) -> Option<OsString>) -> Self {
        let home = match lookup(HOME_ENV).filter(|v| !v.is_empty()) {
            Some(path) => PathBuf::from(path),
            None => lookup("HOME")
                .or_else(|| lookup("USERPROFILE"))
                .filter(|v| !v.is_empty())
                .map(|home| PathBuf::from(home).join(".wholesale"))
                .unwrap_or_else(|| Path::new(".").join(".wholesale")),
        };
        Self::under(home)
    }

    pub fn under(home: PathBuf) -> Self {
        Self {
            store_root: home.join("warehouse"),
            logs_dir: home.join("logs"),
            home_config: home.join(DEFAULT_CONFIG_FILE),
            home,
        }
    }

    /// Config files tried, in order, when none is named explicitly.
    pub fn config_candidates(&self) -> [PathBuf; 2] {
        [PathBuf::from(DEFAULT_CONFIG_FILE), self.home_config.clone()]
    }
}
