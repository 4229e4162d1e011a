//! Geo enrichment: nation name -> ISO3 country code.
//!
//! A left join of Nation onto a country-code reference table keyed by a
//! normalised name. Every nation survives; nations without a match keep a
//! null code.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::io::Read;
use std::path::Path;
use tracing::{info, warn};

use wholesale_schema::{DataType, LockedColumn, LockedSchema, Nation, Value};

use crate::convert::{opt_str, text, Tabular};
use crate::error::{PipelineError, Result};

const NAME_HEADER: &str = "country_name";
const CODE_HEADER: &str = "iso3_code";

/// Normalise a country or nation name for matching: uppercase, with every
/// run of non-alphanumeric characters folded to one space and no leading or
/// trailing space.
pub fn normalize_name(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut gap = false;
    for ch in raw.chars() {
        if ch.is_alphanumeric() {
            if gap && !out.is_empty() {
                out.push(' ');
            }
            gap = false;
            out.extend(ch.to_uppercase());
        } else {
            gap = true;
        }
    }
    out
}

fn valid_iso3(code: &str) -> Option<String> {
    let code = code.trim();
    if code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic()) {
        Some(code.to_ascii_uppercase())
    } else {
        None
    }
}

/// The country-code reference table, keyed by normalised name.
#[derive(Debug, Clone, Default)]
pub struct CountryCodes {
    codes: BTreeMap<String, String>,
    /// Names that mapped to more than one distinct code
    pub ambiguous: Vec<String>,
    /// Reference rows dropped for an empty name or a malformed code
    pub skipped_rows: usize,
}

impl CountryCodes {
    pub fn load(path: &Path, delimiter: u8) -> Result<Self> {
        let file = std::fs::File::open(path).map_err(|e| PipelineError::ReferenceIo {
            path: path.to_path_buf(),
            source: csv::Error::from(e),
        })?;
        let codes = Self::from_reader(file, delimiter, path)?;
        info!(
            path = %path.display(),
            names = codes.len(),
            skipped = codes.skipped_rows,
            "Loaded country-code reference"
        );
        Ok(codes)
    }

    /// Parse reference rows. `origin` is only used in error messages.
    pub fn from_reader<R: Read>(reader: R, delimiter: u8, origin: &Path) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let io_err = |source: csv::Error| PipelineError::ReferenceIo {
            path: origin.to_path_buf(),
            source,
        };

        let headers = rdr.headers().map_err(io_err)?.clone();
        let find = |wanted: &str| {
            headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(wanted))
                .ok_or_else(|| PipelineError::ReferenceFormat {
                    path: origin.to_path_buf(),
                    message: format!(
                        "missing '{}' column (found: {})",
                        wanted,
                        headers.iter().collect::<Vec<_>>().join(", ")
                    ),
                })
        };
        let name_idx = find(NAME_HEADER)?;
        let code_idx = find(CODE_HEADER)?;

        let mut candidates: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        let mut skipped_rows = 0;
        for record in rdr.records() {
            let record = record.map_err(io_err)?;
            let line = record.position().map(|p| p.line()).unwrap_or(0);
            let name = normalize_name(record.get(name_idx).unwrap_or(""));
            let code = record.get(code_idx).and_then(valid_iso3);
            match (name.is_empty(), code) {
                (false, Some(code)) => {
                    candidates.entry(name).or_default().insert(code);
                }
                _ => {
                    skipped_rows += 1;
                    warn!(line, "Skipping reference row without a name or a valid ISO3 code");
                }
            }
        }

        let mut codes = BTreeMap::new();
        let mut ambiguous = Vec::new();
        for (name, set) in candidates {
            // BTreeSet iterates ascending: the smallest code wins
            if let Some(first) = set.iter().next() {
                if set.len() > 1 {
                    warn!(
                        name = %name,
                        chosen = %first,
                        candidates = ?set,
                        "Ambiguous country name in reference data"
                    );
                    ambiguous.push(name.clone());
                }
                codes.insert(name, first.clone());
            }
        }

        Ok(Self {
            codes,
            ambiguous,
            skipped_rows,
        })
    }

    /// ISO3 code for a raw (un-normalised) name.
    pub fn lookup(&self, raw_name: &str) -> Option<&str> {
        self.codes.get(&normalize_name(raw_name)).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

/// Nation plus its ISO3 code.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NationMapped {
    pub nation_key: i64,
    pub name: String,
    pub region_key: i64,
    pub iso3_code: Option<String>,
}

impl Tabular for NationMapped {
    fn contract() -> LockedSchema {
        LockedSchema::new(
            "nation_mapped",
            vec![
                LockedColumn::required("nation_key", DataType::Int64),
                LockedColumn::required("name", DataType::String),
                LockedColumn::required("region_key", DataType::Int64),
                LockedColumn::optional("iso3_code", DataType::String)
                    .with_description("ISO 3166-1 alpha-3, null when the name has no match"),
            ],
        )
        .with_primary_key(&["nation_key"])
    }

    fn values(&self) -> Vec<Value> {
        vec![
            Value::Int(self.nation_key),
            text(&self.name),
            Value::Int(self.region_key),
            opt_str(&self.iso3_code),
        ]
    }
}

/// Output of the enrichment step.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GeoOutcome {
    pub rows: Vec<NationMapped>,
    pub matched: usize,
    pub unmatched: Vec<String>,
}

/// Left-join nations to reference codes. Output order follows nation_key.
pub fn enrich_nations(nations: &[Nation], codes: &CountryCodes) -> GeoOutcome {
    let mut rows: Vec<NationMapped> = nations
        .iter()
        .map(|n| NationMapped {
            nation_key: n.nation_key,
            name: n.name.clone(),
            region_key: n.region_key,
            iso3_code: codes.lookup(&n.name).map(str::to_string),
        })
        .collect();
    rows.sort_by_key(|n| n.nation_key);

    let unmatched: Vec<String> = rows
        .iter()
        .filter(|n| n.iso3_code.is_none())
        .map(|n| n.name.clone())
        .collect();
    let matched = rows.len() - unmatched.len();

    if !unmatched.is_empty() {
        warn!(
            count = unmatched.len(),
            names = ?unmatched,
            "Nations without an ISO3 code"
        );
    }
    info!(nations = rows.len(), matched, "Enriched nations");

    GeoOutcome {
        rows,
        matched,
        unmatched,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codes(text: &str) -> CountryCodes {
        CountryCodes::from_reader(text.as_bytes(), b',', Path::new("ref.csv")).unwrap()
    }

    fn nation(key: i64, name: &str) -> Nation {
        Nation {
            nation_key: key,
            name: name.to_string(),
            region_key: 0,
        }
    }

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("  United  Kingdom "), "UNITED KINGDOM");
        assert_eq!(normalize_name("united-kingdom"), "UNITED KINGDOM");
        assert_eq!(normalize_name("Côte d'Ivoire"), "CÔTE D IVOIRE");
        assert_eq!(normalize_name("---"), "");
    }

    #[test]
    fn test_headers_are_case_insensitive_and_extra_columns_ignored() {
        let c = codes("ISO2,Country_Name,ISO3_CODE\nDZ,Algeria,dza\nAR,Argentina,ARG\n");
        assert_eq!(c.lookup("ALGERIA"), Some("DZA"));
        assert_eq!(c.lookup("argentina"), Some("ARG"));
        assert_eq!(c.len(), 2);
    }

    #[test]
    fn test_missing_header_is_an_error() {
        let err = CountryCodes::from_reader(
            "name,code\nAlgeria,DZA\n".as_bytes(),
            b',',
            Path::new("ref.csv"),
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::ReferenceFormat { .. }));
        assert!(err.to_string().contains("country_name"));
    }

    #[test]
    fn test_ambiguous_name_takes_smallest_code() {
        let c = codes("country_name,iso3_code\nGeorgia,GEO\ngeorgia,ABC\nGeorgia,GEO\n");
        assert_eq!(c.lookup("Georgia"), Some("ABC"));
        assert_eq!(c.ambiguous, vec!["GEORGIA".to_string()]);
    }

    #[test]
    fn test_invalid_codes_are_skipped() {
        let c = codes("country_name,iso3_code\nFrance,FR\nFrance,FRA\n,DEU\nPeru,P3R\n");
        assert_eq!(c.lookup("FRANCE"), Some("FRA"));
        assert_eq!(c.lookup("PERU"), None);
        assert_eq!(c.skipped_rows, 3);
    }

    #[test]
    fn test_left_join_keeps_every_nation() {
        let c = codes("country_name,iso3_code\nAlgeria,DZA\nRussian Federation,RUS\n");
        let nations = vec![nation(22, "RUSSIA"), nation(0, "ALGERIA")];
        let out = enrich_nations(&nations, &c);
        assert_eq!(out.rows.len(), 2);
        assert_eq!(out.rows[0].nation_key, 0);
        assert_eq!(out.rows[0].iso3_code.as_deref(), Some("DZA"));
        assert_eq!(out.rows[1].iso3_code, None);
        assert_eq!(out.matched, 1);
        assert_eq!(out.unmatched, vec!["RUSSIA".to_string()]);
    }
}
