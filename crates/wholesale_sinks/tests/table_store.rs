//! Table store behaviour across whole runs: overwrite, all-or-nothing
//! failure, manifest bookkeeping and path confinement.

use arrow::array::{Int64Array, RecordBatch, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use proptest::prelude::*;
use std::sync::Arc;
use tempfile::tempdir;
use wholesale_protocol::TableRef;
use wholesale_sinks::{file_digest, SinkError, TableStore, TableWrite, MANIFEST_FILE};

fn batch(keys: &[i64]) -> RecordBatch {
    let schema = Schema::new(vec![
        Field::new("key", DataType::Int64, false),
        Field::new("label", DataType::Utf8, false),
    ]);
    let labels: Vec<String> = keys.iter().map(|k| format!("k{}", k)).collect();
    RecordBatch::try_new(
        Arc::new(schema),
        vec![
            Arc::new(Int64Array::from(keys.to_vec())),
            Arc::new(StringArray::from(labels)),
        ],
    )
    .unwrap()
}

fn table(name: &str) -> TableRef {
    TableRef::new("wholesale", "tpch", name)
}

fn row_count(store: &TableStore, name: &str) -> usize {
    store
        .read_table(&table(name))
        .unwrap()
        .iter()
        .map(|b| b.num_rows())
        .sum()
}

#[test]
fn test_overwrite_replaces_whole_table() {
    let dir = tempdir().unwrap();
    let store = TableStore::new(dir.path());

    store
        .write_tables(&[TableWrite::from_batch(table("orders"), batch(&[1, 2, 3]))])
        .unwrap();
    assert_eq!(row_count(&store, "orders"), 3);

    store
        .write_tables(&[TableWrite::from_batch(table("orders"), batch(&[9]))])
        .unwrap();
    assert_eq!(row_count(&store, "orders"), 1);

    let leftovers: Vec<String> = std::fs::read_dir(store.schema_dir(&table("orders")))
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .filter(|n| n.starts_with('.'))
        .collect();
    assert!(leftovers.is_empty(), "staging files left: {:?}", leftovers);
}

#[test]
fn test_failed_run_leaves_previous_tables() {
    let dir = tempdir().unwrap();
    let store = TableStore::new(dir.path());
    store
        .write_tables(&[
            TableWrite::from_batch(table("a"), batch(&[1])),
            TableWrite::from_batch(table("b"), batch(&[1, 2])),
        ])
        .unwrap();
    let digest_a = file_digest(&store.table_path(&table("a"))).unwrap();

    let narrow = Schema::new(vec![Field::new("key", DataType::Int64, false)]);
    let err = store
        .write_tables(&[
            TableWrite::from_batch(table("a"), batch(&[5, 6, 7])),
            TableWrite::new(table("b"), Arc::new(narrow), vec![batch(&[5])]),
        ])
        .unwrap_err();
    assert!(err.to_string().contains("Schema mismatch"), "{err}");

    assert_eq!(file_digest(&store.table_path(&table("a"))).unwrap(), digest_a);
    assert_eq!(row_count(&store, "a"), 1);
    assert_eq!(row_count(&store, "b"), 2);
}

fn staging_leftovers(store: &TableStore) -> Vec<String> {
    std::fs::read_dir(store.schema_dir(&table("any")))
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .filter(|n| n.ends_with(".tmp"))
        .collect()
}

#[test]
fn test_corrupt_manifest_fails_before_any_table_is_written() {
    let dir = tempdir().unwrap();
    let store = TableStore::new(dir.path());
    store
        .write_tables(&[TableWrite::from_batch(table("a"), batch(&[1]))])
        .unwrap();
    let digest_a = file_digest(&store.table_path(&table("a"))).unwrap();
    let manifest_path = store.manifest_path(&table("a"));
    std::fs::write(&manifest_path, "not json").unwrap();

    let err = store
        .write_tables(&[
            TableWrite::from_batch(table("a"), batch(&[5, 6, 7])),
            TableWrite::from_batch(table("b"), batch(&[5])),
        ])
        .unwrap_err();
    assert!(err.to_string().contains("Failed to parse manifest"), "{err}");

    assert_eq!(file_digest(&store.table_path(&table("a"))).unwrap(), digest_a);
    assert!(!store.exists(&table("b")));
    assert_eq!(std::fs::read_to_string(&manifest_path).unwrap(), "not json");
    assert!(staging_leftovers(&store).is_empty());
}

#[test]
fn test_manifest_commit_failure_restores_tables() {
    let dir = tempdir().unwrap();
    let store = TableStore::new(dir.path());
    store
        .write_tables(&[TableWrite::from_batch(table("a"), batch(&[1]))])
        .unwrap();
    let digest_a = file_digest(&store.table_path(&table("a"))).unwrap();

    // The previous manifest cannot be moved aside
    let blocked = store
        .schema_dir(&table("a"))
        .join(format!(".{}.bak", MANIFEST_FILE));
    std::fs::create_dir(&blocked).unwrap();
    std::fs::write(blocked.join("keep"), b"x").unwrap();

    assert!(store
        .write_tables(&[
            TableWrite::from_batch(table("a"), batch(&[5, 6, 7])),
            TableWrite::from_batch(table("b"), batch(&[5])),
        ])
        .is_err());

    assert_eq!(file_digest(&store.table_path(&table("a"))).unwrap(), digest_a);
    assert!(!store.exists(&table("b")));
    let manifest = store.manifest("wholesale", "tpch").unwrap();
    assert_eq!(manifest.tables["a"].rows, 1);
    assert!(!manifest.tables.contains_key("b"));
    assert!(staging_leftovers(&store).is_empty());
}

#[test]
fn test_schema_mismatch_aborts_run() {
    let dir = tempdir().unwrap();
    let store = TableStore::new(dir.path());

    let other = Schema::new(vec![Field::new("key", DataType::Int64, false)]);
    let write = TableWrite::new(table("t"), Arc::new(other), vec![batch(&[1])]);
    let err = store.write_tables(&[write]).unwrap_err();
    assert!(err.to_string().contains("expected 1 columns, got 2"));
    assert!(!store.exists(&table("t")));
}

#[test]
fn test_empty_table_keeps_schema() {
    let dir = tempdir().unwrap();
    let store = TableStore::new(dir.path());
    let schema = batch(&[]).schema();
    store
        .write_tables(&[TableWrite::new(table("empty"), schema.clone(), Vec::new())])
        .unwrap();

    assert_eq!(row_count(&store, "empty"), 0);
    assert_eq!(store.read_schema(&table("empty")).unwrap().fields(), schema.fields());
}

#[test]
fn test_manifest_and_listing() {
    let dir = tempdir().unwrap();
    let store = TableStore::new(dir.path());
    store
        .write_tables(&[
            TableWrite::from_batch(table("fact_table"), batch(&[1, 2]))
                .with_schema_hash("abc123")
                .with_csv_export(true),
            TableWrite::from_batch(table("customer"), batch(&[1])),
        ])
        .unwrap();

    let manifest = store.manifest("wholesale", "tpch").unwrap();
    let fact = &manifest.tables["fact_table"];
    assert_eq!(fact.rows, 2);
    assert_eq!(fact.schema_hash.as_deref(), Some("abc123"));
    assert_eq!(fact.csv_file.as_deref(), Some("fact_table.csv"));
    assert_eq!(
        fact.blake3,
        file_digest(&store.table_path(&table("fact_table"))).unwrap()
    );
    assert!(store.csv_path(&table("fact_table")).exists());

    let csv = std::fs::read_to_string(store.csv_path(&table("fact_table"))).unwrap();
    assert!(csv.starts_with("key,label"));

    let names: Vec<String> = store
        .list_tables("wholesale", "tpch")
        .unwrap()
        .into_iter()
        .map(|t| t.table)
        .collect();
    assert_eq!(names, vec!["customer", "fact_table"]);
}

#[test]
fn test_identical_writes_are_byte_identical() {
    let dir = tempdir().unwrap();
    let store = TableStore::new(dir.path());
    store
        .write_tables(&[TableWrite::from_batch(table("t"), batch(&[3, 1, 2]))])
        .unwrap();
    let first = file_digest(&store.table_path(&table("t"))).unwrap();
    store
        .write_tables(&[TableWrite::from_batch(table("t"), batch(&[3, 1, 2]))])
        .unwrap();
    assert_eq!(file_digest(&store.table_path(&table("t"))).unwrap(), first);
}

#[test]
fn test_missing_table() {
    let dir = tempdir().unwrap();
    let store = TableStore::new(dir.path());
    assert!(matches!(
        store.read_table(&table("nope")),
        Err(SinkError::TableNotFound(_))
    ));
    assert!(store.list_tables("wholesale", "tpch").unwrap().is_empty());
}

proptest! {
    #[test]
    fn prop_table_paths_stay_under_root(
        catalog in ".{0,12}",
        schema in ".{0,12}",
        name in ".{0,24}",
    ) {
        let store = TableStore::new("/warehouse");
        let t = TableRef::new(&catalog, &schema, &name);
        let path = store.table_path(&t);
        prop_assert!(path.starts_with("/warehouse"));
        prop_assert_eq!(path.components().count(), 5);
    }
}
