//! Per-schema store manifest (`_manifest.json`).

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io;
use std::path::Path;

pub const MANIFEST_FILE: &str = "_manifest.json";

/// Committed tables of one (catalog, schema) directory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub catalog: String,
    pub schema: String,
    #[serde(default)]
    pub tables: BTreeMap<String, ManifestEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub file: String,
    pub rows: u64,
    /// blake3 hex digest of the committed Parquet file
    pub blake3: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub csv_file: Option<String>,
    pub committed_at: String,
}

impl Manifest {
    pub fn new(catalog: &str, schema: &str) -> Self {
        Self {
            catalog: catalog.to_string(),
            schema: schema.to_string(),
            tables: BTreeMap::new(),
        }
    }

    /// Load the manifest at `path`, or an empty one if it does not exist.
    pub fn load_or_new(path: &Path, catalog: &str, schema: &str) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new(catalog, schema));
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest: {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse manifest: {}", path.display()))
    }
}

/// blake3 hex digest of a file's contents.
pub fn file_digest(path: &Path) -> Result<String> {
    let mut file =
        File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut hasher = blake3::Hasher::new();
    io::copy(&mut file, &mut hasher)
        .with_context(|| format!("Failed to hash {}", path.display()))?;
    Ok(hasher.finalize().to_hex().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_manifest_roundtrip_and_missing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(MANIFEST_FILE);

        let empty = Manifest::load_or_new(&path, "wholesale", "tpch").unwrap();
        assert!(empty.tables.is_empty());

        let mut manifest = empty.clone();
        manifest.tables.insert(
            "fact_table".to_string(),
            ManifestEntry {
                file: "fact_table.parquet".to_string(),
                rows: 6005,
                blake3: "ab".repeat(32),
                schema_hash: None,
                csv_file: None,
                committed_at: "2024-01-01T00:00:00+00:00".to_string(),
            },
        );
        std::fs::write(&path, serde_json::to_string_pretty(&manifest).unwrap()).unwrap();

        let loaded = Manifest::load_or_new(&path, "ignored", "ignored").unwrap();
        assert_eq!(loaded, manifest);
    }

    #[test]
    fn test_corrupt_manifest_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(MANIFEST_FILE);
        std::fs::write(&path, "not json").unwrap();
        let err = Manifest::load_or_new(&path, "wholesale", "tpch").unwrap_err();
        assert!(err.to_string().contains("Failed to parse manifest"));
    }

    #[test]
    fn test_file_digest_is_content_addressed() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        std::fs::write(&a, b"same bytes").unwrap();
        std::fs::write(&b, b"same bytes").unwrap();
        assert_eq!(file_digest(&a).unwrap(), file_digest(&b).unwrap());
        std::fs::write(&b, b"other bytes").unwrap();
        assert_ne!(file_digest(&a).unwrap(), file_digest(&b).unwrap());
    }
}
