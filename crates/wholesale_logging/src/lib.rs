//! Shared logging setup for the Wholesale binary and tests.

use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const DEFAULT_LOG_FILTER: &str =
    "wholesale=info,wholesale_pipeline=info,wholesale_schema=info,wholesale_sinks=info";

/// How many log files are kept and how large each may grow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rotation {
    pub max_files: usize,
    pub max_bytes: u64,
}

impl Default for Rotation {
    fn default() -> Self {
        Self {
            max_files: 5,
            max_bytes: 10 * 1024 * 1024,
        }
    }
}

/// Logging configuration for a Wholesale process.
pub struct LogConfig<'a> {
    pub app_name: &'a str,
    /// Send the full filter to stderr instead of warnings only.
    pub verbose: bool,
    /// Override the log directory (defaults to ~/.wholesale/logs).
    pub log_dir: Option<PathBuf>,
}

/// Initialize tracing with a rolling file writer and stderr output.
///
/// The file layer always records at the `RUST_LOG` / default filter. The
/// stderr layer only shows warnings unless `verbose` is set, so that JSON
/// output on stdout stays machine-readable.
pub fn init_logging(config: LogConfig<'_>) -> Result<()> {
    let log_dir = config.log_dir.unwrap_or_else(logs_dir);
    fs::create_dir_all(&log_dir)
        .with_context(|| format!("Failed to create logs directory: {}", log_dir.display()))?;
    let file_writer = RollingWriter::open(&log_dir, config.app_name, Rotation::default())
        .with_context(|| format!("Failed to open log file in {}", log_dir.display()))?;

    let console_filter = if config.verbose {
        default_filter()
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false)
                .with_filter(default_filter()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(console_filter),
        )
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(())
}

fn default_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}

/// Get the logs directory: ~/.wholesale/logs
pub fn logs_dir() -> PathBuf {
    wholesale_protocol::paths::WholesalePaths::resolve().logs_dir
}

/// `<name>.log`, rotated to `<name>.log.1` .. `<name>.log.{max_files-1}`.
struct RollingFile {
    dir: PathBuf,
    stem: String,
    rotation: Rotation,
    file: File,
    written: u64,
}

impl RollingFile {
    fn open(dir: &Path, app_name: &str, rotation: Rotation) -> io::Result<Self> {
        let stem = file_stem(app_name);
        let (file, written) = open_append(&dir.join(format!("{}.log", stem)))?;
        let mut log = Self {
            dir: dir.to_path_buf(),
            stem,
            rotation: Rotation {
                max_files: rotation.max_files.max(1),
                ..rotation
            },
            file,
            written,
        };
        if log.written > log.rotation.max_bytes {
            log.rotate()?;
        }
        Ok(log)
    }

    fn path(&self, generation: usize) -> PathBuf {
        if generation == 0 {
            self.dir.join(format!("{}.log", self.stem))
        } else {
            self.dir.join(format!("{}.log.{}", self.stem, generation))
        }
    }

    /// Shift every generation up by one, dropping the oldest, and reopen
    /// an empty current file.
    fn rotate(&mut self) -> io::Result<()> {
        self.file.flush()?;
        let oldest = self.rotation.max_files - 1;
        if oldest > 0 {
            let doomed = self.path(oldest);
            if doomed.exists() {
                fs::remove_file(&doomed)?;
            }
            for generation in (0..oldest).rev() {
                let from = self.path(generation);
                if from.exists() {
                    fs::rename(&from, self.path(generation + 1))?;
                }
            }
        } else {
            // Single-file policy: truncate in place
            fs::remove_file(self.path(0))?;
        }
        let (file, written) = open_append(&self.path(0))?;
        self.file = file;
        self.written = written;
        Ok(())
    }
}

impl Write for RollingFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.written + buf.len() as u64 > self.rotation.max_bytes {
            self.rotate()?;
        }
        let n = self.file.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

fn open_append(path: &Path) -> io::Result<(File, u64)> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let len = file.metadata()?.len();
    Ok((file, len))
}

/// Cloneable handle to one [`RollingFile`]; every clone writes to the same
/// file, which is what `MakeWriter` needs.
#[derive(Clone)]
struct RollingWriter(Arc<Mutex<RollingFile>>);

impl RollingWriter {
    fn open(dir: &Path, app_name: &str, rotation: Rotation) -> io::Result<Self> {
        Ok(Self(Arc::new(Mutex::new(RollingFile::open(
            dir, app_name, rotation,
        )?))))
    }

    fn with_file<T>(&self, f: impl FnOnce(&mut RollingFile) -> io::Result<T>) -> io::Result<T> {
        let mut guard = self
            .0
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log writer lock poisoned"))?;
        f(&mut guard)
    }
}

impl Write for RollingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.with_file(|file| file.write(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        self.with_file(|file| file.flush())
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for RollingWriter {
    type Writer = RollingWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

fn file_stem(name: &str) -> String {
    name.chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
                ch
            } else {
                '_'
            }
        })
        .collect()
}
