//! Managed table store for pipeline output.
//!
//! Tables are addressed by [`TableRef`] and stored as one Parquet file each:
//! `<root>/<catalog>/<schema>/<table>.parquet`. A run hands every table it
//! produces to [`TableStore::write_tables`], which:
//! - Stages each table in a hidden temp file
//! - Validates every batch against the table's schema
//! - Stages the updated `_manifest.json` next to them, with row counts and
//!   digests taken from the staged files
//! - Commits tables and manifest by rename, moving previous versions aside
//! - Restores every previous version if any commit fails

use anyhow::{bail, Context, Result};
use arrow::array::RecordBatch;
use arrow::datatypes::{DataType, Schema, SchemaRef};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use wholesale_protocol::TableRef;

mod manifest;
pub use manifest::{file_digest, Manifest, ManifestEntry, MANIFEST_FILE};

/// Errors returned by table store operations.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("{message}")]
    Message { message: String },
    #[error("{message}")]
    Source {
        message: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("Table {0} not found")]
    TableNotFound(String),
}

pub type SinkResult<T> = std::result::Result<T, SinkError>;

impl SinkError {
    fn message(message: impl Into<String>) -> Self {
        SinkError::Message {
            message: message.into(),
        }
    }
}

impl From<anyhow::Error> for SinkError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<SinkError>() {
            Ok(sink_err) => sink_err,
            Err(err) => SinkError::Source {
                message: err.to_string(),
                source: err,
            },
        }
    }
}

/// One table to be written by a run.
#[derive(Debug, Clone)]
pub struct TableWrite {
    pub table: TableRef,
    pub schema: SchemaRef,
    pub batches: Vec<RecordBatch>,
    pub export_csv: bool,
    /// Hash of the declared contract that produced the rows
    pub schema_hash: Option<String>,
}

impl TableWrite {
    pub fn new(table: TableRef, schema: SchemaRef, batches: Vec<RecordBatch>) -> Self {
        Self {
            table,
            schema,
            batches,
            export_csv: false,
            schema_hash: None,
        }
    }

    /// Single-batch convenience constructor.
    pub fn from_batch(table: TableRef, batch: RecordBatch) -> Self {
        Self::new(table, batch.schema(), vec![batch])
    }

    pub fn with_csv_export(mut self, export_csv: bool) -> Self {
        self.export_csv = export_csv;
        self
    }

    pub fn with_schema_hash(mut self, hash: impl Into<String>) -> Self {
        self.schema_hash = Some(hash.into());
        self
    }

    pub fn num_rows(&self) -> u64 {
        self.batches.iter().map(|b| b.num_rows() as u64).sum()
    }
}

/// A committed table.
#[derive(Debug, Clone, serde::Serialize)]
pub struct TableArtifact {
    pub table: TableRef,
    pub path: PathBuf,
    pub csv_path: Option<PathBuf>,
    pub rows: u64,
}

/// Temp/final/backup bookkeeping shared by the file sinks.
///
/// The previous version of a table is renamed to the backup path during
/// commit and only removed once the whole run has committed.
struct StagedFile {
    final_path: PathBuf,
    temp_path: PathBuf,
    backup_path: PathBuf,
    replaced_previous: bool,
    committed: bool,
}

impl StagedFile {
    fn new(dir: &Path, file_name: &str) -> Self {
        Self {
            final_path: dir.join(file_name),
            temp_path: dir.join(format!(".{}.tmp", file_name)),
            backup_path: dir.join(format!(".{}.bak", file_name)),
            replaced_previous: false,
            committed: false,
        }
    }

    fn create_temp(&self) -> Result<File> {
        File::create(&self.temp_path)
            .with_context(|| format!("Failed to create temp file: {}", self.temp_path.display()))
    }

    fn commit(&mut self) -> Result<()> {
        if self.final_path.exists() {
            std::fs::rename(&self.final_path, &self.backup_path).with_context(|| {
                format!(
                    "Failed to move aside {} -> {}",
                    self.final_path.display(),
                    self.backup_path.display()
                )
            })?;
            self.replaced_previous = true;
        }
        if let Err(err) = std::fs::rename(&self.temp_path, &self.final_path) {
            if self.replaced_previous {
                let _ = std::fs::rename(&self.backup_path, &self.final_path);
                self.replaced_previous = false;
            }
            return Err(err).with_context(|| {
                format!(
                    "Failed to rename {} -> {}",
                    self.temp_path.display(),
                    self.final_path.display()
                )
            });
        }
        self.committed = true;
        Ok(())
    }

    fn rollback(&mut self) {
        if self.committed {
            let _ = std::fs::remove_file(&self.final_path);
            warn!("Rolled back committed file: {}", self.final_path.display());
            if self.replaced_previous {
                if let Err(err) = std::fs::rename(&self.backup_path, &self.final_path) {
                    warn!(
                        "Failed to restore {} from {}: {}",
                        self.final_path.display(),
                        self.backup_path.display(),
                        err
                    );
                } else {
                    info!("Restored previous version: {}", self.final_path.display());
                }
            }
        }
        if self.temp_path.exists() {
            let _ = std::fs::remove_file(&self.temp_path);
            warn!("Rolled back temp file: {}", self.temp_path.display());
        }
        self.committed = false;
        self.replaced_previous = false;
    }

    fn finalize(&mut self) {
        if self.replaced_previous && self.backup_path.exists() {
            if let Err(err) = std::fs::remove_file(&self.backup_path) {
                warn!(
                    "Failed to remove backup {}: {}",
                    self.backup_path.display(),
                    err
                );
            }
        }
        self.replaced_previous = false;
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if !self.committed && self.temp_path.exists() {
            let _ = std::fs::remove_file(&self.temp_path);
            warn!("Cleaned up orphaned temp file: {}", self.temp_path.display());
        }
    }
}

/// Parquet sink writer: `<dir>/<table>.parquet`
pub struct ParquetSink {
    writer: Option<parquet::arrow::arrow_writer::ArrowWriter<File>>,
    rows_written: u64,
    staged: StagedFile,
}

impl ParquetSink {
    pub fn new(dir: PathBuf, table: &str) -> Result<Self> {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create table directory: {}", dir.display()))?;
        Ok(Self {
            writer: None,
            rows_written: 0,
            staged: StagedFile::new(&dir, &format!("{}.parquet", table)),
        })
    }

    fn init(&mut self, schema: &Schema) -> Result<()> {
        debug!(
            "Initializing Parquet sink: {} (temp: {})",
            self.staged.final_path.display(),
            self.staged.temp_path.display()
        );

        let file = self.staged.create_temp()?;
        let props = parquet::file::properties::WriterProperties::builder()
            .set_compression(parquet::basic::Compression::SNAPPY)
            .build();
        let writer = parquet::arrow::arrow_writer::ArrowWriter::try_new(
            file,
            Arc::new(schema.clone()),
            Some(props),
        )
        .context("Failed to create Parquet writer")?;
        self.writer = Some(writer);
        Ok(())
    }

    fn write_batch(&mut self, batch: &RecordBatch) -> Result<u64> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("Parquet sink not initialized"))?;
        writer
            .write(batch)
            .context("Failed to write batch to Parquet")?;
        let rows = batch.num_rows() as u64;
        self.rows_written += rows;
        debug!(
            "Wrote {} rows to Parquet (total: {})",
            rows, self.rows_written
        );
        Ok(rows)
    }

    fn prepare(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.take() {
            writer.close().context("Failed to close Parquet writer")?;
        }
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        self.staged.commit()?;
        info!(
            "Committed Parquet table: {} ({} rows)",
            self.staged.final_path.display(),
            self.rows_written
        );
        Ok(())
    }
}

/// CSV export writer: `<dir>/<table>.csv`
pub struct CsvSink {
    writer: Option<arrow::csv::Writer<File>>,
    rows_written: u64,
    staged: StagedFile,
}

impl CsvSink {
    pub fn new(dir: PathBuf, table: &str) -> Result<Self> {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create table directory: {}", dir.display()))?;
        Ok(Self {
            writer: None,
            rows_written: 0,
            staged: StagedFile::new(&dir, &format!("{}.csv", table)),
        })
    }

    fn init(&mut self, _schema: &Schema) -> Result<()> {
        let file = self.staged.create_temp()?;
        let writer = arrow::csv::WriterBuilder::new()
            .with_header(true)
            .build(file);
        self.writer = Some(writer);
        Ok(())
    }

    fn write_batch(&mut self, batch: &RecordBatch) -> Result<u64> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("CSV sink not initialized"))?;
        writer
            .write(batch)
            .context("Failed to write batch to CSV")?;
        let rows = batch.num_rows() as u64;
        self.rows_written += rows;
        Ok(rows)
    }

    fn prepare(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.take() {
            let mut file = writer.into_inner();
            file.flush().with_context(|| {
                format!("Failed to flush CSV export: {}", self.staged.temp_path.display())
            })?;
            file.sync_all().with_context(|| {
                format!("Failed to sync CSV export: {}", self.staged.temp_path.display())
            })?;
        }
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        self.staged.commit()?;
        info!(
            "Committed CSV export: {} ({} rows)",
            self.staged.final_path.display(),
            self.rows_written
        );
        Ok(())
    }
}

/// Manifest writer: `<dir>/_manifest.json`, committed with the tables it
/// describes.
struct ManifestSink {
    manifest: Option<Manifest>,
    staged: StagedFile,
}

impl ManifestSink {
    fn new(dir: &Path, manifest: Manifest) -> Self {
        Self {
            manifest: Some(manifest),
            staged: StagedFile::new(dir, MANIFEST_FILE),
        }
    }

    fn prepare(&mut self) -> Result<()> {
        if let Some(manifest) = self.manifest.take() {
            let mut file = self.staged.create_temp()?;
            serde_json::to_writer_pretty(&mut file, &manifest)
                .context("Failed to serialize manifest")?;
            file.sync_all().with_context(|| {
                format!("Failed to sync manifest: {}", self.staged.temp_path.display())
            })?;
        }
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        self.staged.commit()?;
        debug!("Committed manifest: {}", self.staged.final_path.display());
        Ok(())
    }
}

enum Sink {
    Parquet(ParquetSink),
    Csv(Box<CsvSink>),
    Manifest(Box<ManifestSink>),
}

impl Sink {
    fn init(&mut self, schema: &Schema) -> Result<()> {
        match self {
            Sink::Parquet(sink) => sink.init(schema),
            Sink::Csv(sink) => sink.init(schema),
            Sink::Manifest(_) => bail!("Manifest sink takes no batches"),
        }
    }

    fn write_batch(&mut self, batch: &RecordBatch) -> Result<u64> {
        match self {
            Sink::Parquet(sink) => sink.write_batch(batch),
            Sink::Csv(sink) => sink.write_batch(batch),
            Sink::Manifest(_) => bail!("Manifest sink takes no batches"),
        }
    }

    fn prepare(&mut self) -> Result<()> {
        match self {
            Sink::Parquet(sink) => sink.prepare(),
            Sink::Csv(sink) => sink.prepare(),
            Sink::Manifest(sink) => sink.prepare(),
        }
    }

    fn commit(&mut self) -> Result<()> {
        match self {
            Sink::Parquet(sink) => sink.commit(),
            Sink::Csv(sink) => sink.commit(),
            Sink::Manifest(sink) => sink.commit(),
        }
    }

    fn staged(&mut self) -> &mut StagedFile {
        match self {
            Sink::Parquet(sink) => &mut sink.staged,
            Sink::Csv(sink) => &mut sink.staged,
            Sink::Manifest(sink) => &mut sink.staged,
        }
    }

    fn rollback(&mut self) {
        match self {
            Sink::Parquet(sink) => {
                drop(sink.writer.take());
            }
            Sink::Csv(sink) => {
                drop(sink.writer.take());
            }
            Sink::Manifest(sink) => {
                sink.manifest = None;
            }
        }
        self.staged().rollback();
    }
}

/// Sink registry - manages every sink of a run so they commit together.
#[derive(Default)]
pub struct SinkRegistry {
    sinks: BTreeMap<String, Sink>,
}

impl SinkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn add(&mut self, name: &str, sink: Sink) {
        self.sinks.insert(name.to_string(), sink);
    }

    /// Initialize a sink with its schema
    pub fn init(&mut self, name: &str, schema: &Schema) -> Result<()> {
        match self.sinks.get_mut(name) {
            Some(sink) => sink.init(schema),
            None => bail!("No sink registered for output: {}", name),
        }
    }

    /// Write a batch to a sink
    pub fn write_batch(&mut self, name: &str, batch: &RecordBatch) -> Result<u64> {
        match self.sinks.get_mut(name) {
            Some(sink) => sink.write_batch(batch),
            None => bail!("No sink registered for output: {}", name),
        }
    }

    /// Staged file of a prepared sink, before it is committed.
    fn staged_path(&mut self, name: &str) -> Result<&Path> {
        match self.sinks.get_mut(name) {
            Some(sink) => Ok(&sink.staged().temp_path),
            None => bail!("No sink registered for output: {}", name),
        }
    }

    /// Close every sink's staged file. Rolls everything back on failure.
    ///
    /// Sinks that are already prepared are left as they are, so sinks added
    /// after a first prepare can be prepared by calling this again.
    pub fn prepare(&mut self) -> Result<()> {
        let prepare_result: Result<()> = self.sinks.iter_mut().try_for_each(|(name, sink)| {
            debug!("Preparing sink: {}", name);
            sink.prepare()
        });
        if let Err(err) = prepare_result {
            warn!("Sink prepare failed, rolling back: {}", err);
            self.rollback_all();
            return Err(err);
        }
        Ok(())
    }

    /// Prepare and commit all sinks with rollback on failure. Previous
    /// versions are only discarded once every sink has committed.
    pub fn finish(mut self) -> Result<()> {
        self.prepare()?;

        let commit_result: Result<()> = self.sinks.iter_mut().try_for_each(|(name, sink)| {
            debug!("Committing sink: {}", name);
            sink.commit()
        });
        if let Err(err) = commit_result {
            warn!("Sink commit failed, rolling back: {}", err);
            self.rollback_all();
            return Err(err);
        }

        for sink in self.sinks.values_mut() {
            sink.staged().finalize();
        }
        Ok(())
    }

    fn rollback_all(&mut self) {
        for sink in self.sinks.values_mut() {
            sink.rollback();
        }
    }
}

/// Validate that a batch conforms to a declared schema
///
/// Returns Ok(()) if the batch schema matches, or an error describing the mismatch.
pub fn validate_batch_schema(
    batch: &RecordBatch,
    declared_schema: &Schema,
    sink_name: &str,
) -> Result<()> {
    let batch_schema = batch.schema();

    if batch_schema.fields().len() != declared_schema.fields().len() {
        bail!(
            "Schema mismatch for '{}': expected {} columns, got {}",
            sink_name,
            declared_schema.fields().len(),
            batch_schema.fields().len()
        );
    }

    for (i, (batch_field, declared_field)) in batch_schema
        .fields()
        .iter()
        .zip(declared_schema.fields().iter())
        .enumerate()
    {
        if batch_field.name() != declared_field.name() {
            bail!(
                "Schema mismatch for '{}' column {}: expected name '{}', got '{}'",
                sink_name,
                i,
                declared_field.name(),
                batch_field.name()
            );
        }

        if !types_compatible(batch_field.data_type(), declared_field.data_type()) {
            bail!(
                "Schema mismatch for '{}' column '{}': expected type {:?}, got {:?}",
                sink_name,
                declared_field.name(),
                declared_field.data_type(),
                batch_field.data_type()
            );
        }

        // Nullability (batch can be more restrictive)
        if batch_field.is_nullable() && !declared_field.is_nullable() {
            bail!(
                "Schema mismatch for '{}' column '{}': batch allows nulls but table does not",
                sink_name,
                declared_field.name()
            );
        }
    }

    Ok(())
}

fn types_compatible(actual: &DataType, expected: &DataType) -> bool {
    if actual == expected {
        return true;
    }
    match (actual, expected) {
        (DataType::Int32, DataType::Int64) => true,
        (DataType::Utf8, DataType::LargeUtf8) => true,
        (DataType::LargeUtf8, DataType::Utf8) => true,
        // Scale must match exactly; wider precision is fine
        (DataType::Decimal128(p1, s1), DataType::Decimal128(p2, s2)) => s1 == s2 && p1 <= p2,
        _ => false,
    }
}

/// Filesystem-backed managed table store.
#[derive(Debug, Clone)]
pub struct TableStore {
    root: PathBuf,
}

impl TableStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding every table of the table's (catalog, schema).
    pub fn schema_dir(&self, table: &TableRef) -> PathBuf {
        self.root.join(&table.catalog).join(&table.schema)
    }

    pub fn table_path(&self, table: &TableRef) -> PathBuf {
        self.schema_dir(table)
            .join(format!("{}.parquet", table.table))
    }

    pub fn csv_path(&self, table: &TableRef) -> PathBuf {
        self.schema_dir(table).join(format!("{}.csv", table.table))
    }

    pub fn manifest_path(&self, table: &TableRef) -> PathBuf {
        self.schema_dir(table).join(MANIFEST_FILE)
    }

    pub fn exists(&self, table: &TableRef) -> bool {
        self.table_path(table).is_file()
    }

    /// Write every table of a run. Either all tables and their manifests
    /// are replaced or none are.
    pub fn write_tables(&self, writes: &[TableWrite]) -> SinkResult<Vec<TableArtifact>> {
        // Read the manifests first: an unreadable one fails the run before
        // anything is staged.
        let mut manifests: BTreeMap<PathBuf, Manifest> = BTreeMap::new();
        for write in writes {
            let dir = self.schema_dir(&write.table);
            if !manifests.contains_key(&dir) {
                let loaded = Manifest::load_or_new(
                    &self.manifest_path(&write.table),
                    &write.table.catalog,
                    &write.table.schema,
                )?;
                manifests.insert(dir, loaded);
            }
        }

        let mut registry = SinkRegistry::new();
        let mut seen = std::collections::BTreeSet::new();

        for write in writes {
            let name = write.table.to_string();
            if !seen.insert(name.clone()) {
                return Err(SinkError::message(format!(
                    "Table {} written twice in one run",
                    name
                )));
            }
            let dir = self.schema_dir(&write.table);
            let sink = ParquetSink::new(dir.clone(), &write.table.table)?;
            registry.add(&format!("{}.parquet", name), Sink::Parquet(sink));
            if write.export_csv {
                let csv = CsvSink::new(dir, &write.table.table)?;
                registry.add(&format!("{}.csv", name), Sink::Csv(Box::new(csv)));
            }
        }

        let mut artifacts = Vec::with_capacity(writes.len());
        for write in writes {
            let name = write.table.to_string();
            let mut targets = vec![format!("{}.parquet", name)];
            if write.export_csv {
                targets.push(format!("{}.csv", name));
            }
            for target in &targets {
                registry.init(target, write.schema.as_ref())?;
            }
            for batch in &write.batches {
                validate_batch_schema(batch, write.schema.as_ref(), &name)?;
                for target in &targets {
                    registry.write_batch(target, batch)?;
                }
            }
            artifacts.push(TableArtifact {
                table: write.table.clone(),
                path: self.table_path(&write.table),
                csv_path: write.export_csv.then(|| self.csv_path(&write.table)),
                rows: write.num_rows(),
            });
        }

        registry.prepare()?;

        let committed_at = chrono::Utc::now().to_rfc3339();
        for (write, artifact) in writes.iter().zip(&artifacts) {
            let staged = registry.staged_path(&format!("{}.parquet", write.table))?;
            let entry = ManifestEntry {
                file: format!("{}.parquet", artifact.table.table),
                rows: artifact.rows,
                blake3: file_digest(staged)?,
                schema_hash: write.schema_hash.clone(),
                csv_file: artifact
                    .csv_path
                    .as_ref()
                    .map(|_| format!("{}.csv", artifact.table.table)),
                committed_at: committed_at.clone(),
            };
            if let Some(manifest) = manifests.get_mut(&self.schema_dir(&artifact.table)) {
                manifest.tables.insert(artifact.table.table.clone(), entry);
            }
        }
        for (dir, manifest) in manifests {
            let name = dir.join(MANIFEST_FILE).display().to_string();
            registry.add(&name, Sink::Manifest(Box::new(ManifestSink::new(&dir, manifest))));
        }

        registry.finish()?;

        info!(tables = artifacts.len(), "Committed table store run");
        Ok(artifacts)
    }

    /// Read a stored table back as record batches.
    pub fn read_table(&self, table: &TableRef) -> SinkResult<Vec<RecordBatch>> {
        let path = self.table_path(table);
        if !path.is_file() {
            return Err(SinkError::TableNotFound(table.to_string()));
        }
        let file = File::open(&path)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        let reader =
            parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder::try_new(file)
                .with_context(|| format!("Failed to read Parquet metadata: {}", path.display()))?
                .build()
                .context("Failed to build Parquet reader")?;
        let batches = reader
            .collect::<std::result::Result<Vec<_>, _>>()
            .with_context(|| format!("Failed to read {}", path.display()))?;
        debug!(table = %table, batches = batches.len(), "Read table");
        Ok(batches)
    }

    /// Arrow schema of a stored table.
    pub fn read_schema(&self, table: &TableRef) -> SinkResult<SchemaRef> {
        let path = self.table_path(table);
        if !path.is_file() {
            return Err(SinkError::TableNotFound(table.to_string()));
        }
        let file = File::open(&path)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        let builder =
            parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder::try_new(file)
                .with_context(|| format!("Failed to read Parquet metadata: {}", path.display()))?;
        Ok(builder.schema().clone())
    }

    /// Tables committed under `catalog.schema`, sorted by name.
    pub fn list_tables(&self, catalog: &str, schema: &str) -> SinkResult<Vec<TableRef>> {
        let location = TableRef::new(catalog, schema, "table");
        let dir = self.schema_dir(&location);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut tables = Vec::new();
        let entries = std::fs::read_dir(&dir)
            .with_context(|| format!("Failed to list {}", dir.display()))?;
        for entry in entries {
            let entry = entry.with_context(|| format!("Failed to list {}", dir.display()))?;
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with('.') {
                continue;
            }
            if let Some(stem) = name.strip_suffix(".parquet") {
                tables.push(location.sibling(stem));
            }
        }
        tables.sort();
        Ok(tables)
    }

    /// The manifest of `catalog.schema`.
    pub fn manifest(&self, catalog: &str, schema: &str) -> SinkResult<Manifest> {
        let location = TableRef::new(catalog, schema, "table");
        Ok(Manifest::load_or_new(
            &self.manifest_path(&location),
            &location.catalog,
            &location.schema,
        )?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Array, Date32Array, Decimal128Array, Int64Array, StringArray};
    use arrow::datatypes::Field;
    use tempfile::tempdir;

    fn test_batch(keys: &[i64]) -> RecordBatch {
        let schema = Schema::new(vec![
            Field::new("id", DataType::Int64, false),
            Field::new("name", DataType::Utf8, true),
            Field::new("amount", DataType::Decimal128(15, 2), false),
            Field::new("day", DataType::Date32, false),
        ]);
        let names: Vec<Option<String>> = keys
            .iter()
            .map(|k| (k % 2 == 0).then(|| format!("row{}", k)))
            .collect();
        let amounts = Decimal128Array::from(keys.iter().map(|k| i128::from(k * 100 + 5)).collect::<Vec<_>>())
            .with_precision_and_scale(15, 2)
            .unwrap();
        RecordBatch::try_new(
            Arc::new(schema),
            vec![
                Arc::new(Int64Array::from(keys.to_vec())),
                Arc::new(StringArray::from(names)),
                Arc::new(amounts),
                Arc::new(Date32Array::from(vec![9500; keys.len()])),
            ],
        )
        .unwrap()
    }

    fn table(name: &str) -> TableRef {
        TableRef::new("wholesale", "tpch", name)
    }

    #[test]
    fn test_parquet_sink_commit() {
        let dir = tempdir().unwrap();
        let mut sink = ParquetSink::new(dir.path().to_path_buf(), "orders").unwrap();

        let batch = test_batch(&[1, 2, 3]);
        sink.init(batch.schema().as_ref()).unwrap();
        assert_eq!(sink.write_batch(&batch).unwrap(), 3);
        sink.prepare().unwrap();
        sink.commit().unwrap();

        assert!(dir.path().join("orders.parquet").exists());
        assert!(!dir.path().join(".orders.parquet.tmp").exists());
    }

    #[test]
    fn test_rollback_restores_previous_version() {
        let dir = tempdir().unwrap();
        let final_path = dir.path().join("orders.parquet");
        std::fs::write(&final_path, b"previous").unwrap();

        let mut sink = ParquetSink::new(dir.path().to_path_buf(), "orders").unwrap();
        let batch = test_batch(&[1]);
        sink.init(batch.schema().as_ref()).unwrap();
        sink.write_batch(&batch).unwrap();
        sink.prepare().unwrap();
        sink.commit().unwrap();
        assert_ne!(std::fs::read(&final_path).unwrap(), b"previous");
        assert!(dir.path().join(".orders.parquet.bak").exists());

        let mut wrapped = Sink::Parquet(sink);
        wrapped.rollback();
        assert_eq!(std::fs::read(&final_path).unwrap(), b"previous");
        assert!(!dir.path().join(".orders.parquet.bak").exists());
    }

    #[test]
    fn test_csv_sink_flushes_every_row() {
        let dir = tempdir().unwrap();
        let mut sink = CsvSink::new(dir.path().to_path_buf(), "orders").unwrap();
        let keys: Vec<i64> = (1..=500).collect();
        let batch = test_batch(&keys);
        sink.init(batch.schema().as_ref()).unwrap();
        sink.write_batch(&batch).unwrap();
        sink.prepare().unwrap();
        sink.commit().unwrap();

        let text = std::fs::read_to_string(dir.path().join("orders.csv")).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 501);
        assert_eq!(lines[0], "id,name,amount,day");
        assert!(lines[500].starts_with("500,row500,500.05,"));
        assert!(!dir.path().join(".orders.csv.tmp").exists());
    }

    #[test]
    fn test_commit_failure_restores_previous_tables() {
        let dir = tempdir().unwrap();
        let store = TableStore::new(dir.path());
        store
            .write_tables(&[
                TableWrite::from_batch(table("a"), test_batch(&[1, 2])),
                TableWrite::from_batch(table("z"), test_batch(&[1])),
            ])
            .unwrap();
        let before = std::fs::read(store.table_path(&table("a"))).unwrap();

        // `z` cannot move its previous version aside, so it fails after `a`
        // has already committed.
        let blocked = store.schema_dir(&table("z")).join(".z.parquet.bak");
        std::fs::create_dir(&blocked).unwrap();
        std::fs::write(blocked.join("keep"), b"x").unwrap();

        let mut registry = SinkRegistry::new();
        for name in ["a", "z"] {
            let sink = ParquetSink::new(store.schema_dir(&table(name)), name).unwrap();
            registry.add(name, Sink::Parquet(sink));
            let batch = test_batch(&[7, 8, 9]);
            registry.init(name, batch.schema().as_ref()).unwrap();
            registry.write_batch(name, &batch).unwrap();
        }
        assert!(registry.finish().is_err());

        let after = std::fs::read(store.table_path(&table("a"))).unwrap();
        assert_eq!(before, after);
        assert_eq!(store.read_table(&table("a")).unwrap()[0].num_rows(), 2);
        assert_eq!(store.read_table(&table("z")).unwrap()[0].num_rows(), 1);
        assert!(!store.schema_dir(&table("a")).join(".a.parquet.bak").exists());
    }

    #[test]
    fn test_manifest_digest_comes_from_staged_file() {
        let dir = tempdir().unwrap();
        let store = TableStore::new(dir.path());
        store
            .write_tables(&[TableWrite::from_batch(table("orders"), test_batch(&[1, 2]))])
            .unwrap();

        let manifest = store.manifest("wholesale", "tpch").unwrap();
        let entry = &manifest.tables["orders"];
        assert_eq!(entry.rows, 2);
        assert_eq!(
            entry.blake3,
            file_digest(&store.table_path(&table("orders"))).unwrap()
        );
        assert!(!store.schema_dir(&table("orders")).join("._manifest.json.tmp").exists());
    }

    #[test]
    fn test_validate_batch_schema() {
        let batch = test_batch(&[1]);
        let declared = batch.schema();
        assert!(validate_batch_schema(&batch, &declared, "t").is_ok());

        let renamed = Schema::new(vec![
            Field::new("key", DataType::Int64, false),
            Field::new("name", DataType::Utf8, true),
            Field::new("amount", DataType::Decimal128(15, 2), false),
            Field::new("day", DataType::Date32, false),
        ]);
        let err = validate_batch_schema(&batch, &renamed, "t").unwrap_err();
        assert!(err.to_string().contains("expected name 'key'"));

        let rescaled = Schema::new(vec![
            Field::new("id", DataType::Int64, false),
            Field::new("name", DataType::Utf8, true),
            Field::new("amount", DataType::Decimal128(15, 4), false),
            Field::new("day", DataType::Date32, false),
        ]);
        assert!(validate_batch_schema(&batch, &rescaled, "t").is_err());
    }

    #[test]
    fn test_types_compatible() {
        assert!(types_compatible(&DataType::Int32, &DataType::Int64));
        assert!(!types_compatible(&DataType::Int64, &DataType::Int32));
        assert!(types_compatible(
            &DataType::Decimal128(12, 2),
            &DataType::Decimal128(15, 2)
        ));
        assert!(!types_compatible(&DataType::Date32, &DataType::Utf8));
    }

    #[test]
    fn test_read_table_roundtrip_values() {
        let dir = tempdir().unwrap();
        let store = TableStore::new(dir.path());
        store
            .write_tables(&[TableWrite::from_batch(table("t"), test_batch(&[4, 5]))])
            .unwrap();

        let batches = store.read_table(&table("t")).unwrap();
        let batch = &batches[0];
        let amounts = batch
            .column(2)
            .as_any()
            .downcast_ref::<Decimal128Array>()
            .unwrap();
        assert_eq!(amounts.value(0), 405);
        let names = batch
            .column(1)
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        assert_eq!(names.value(0), "row4");
        assert!(names.is_null(1));
    }
}
