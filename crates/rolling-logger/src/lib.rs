//! Rolling file logger
//!
//! Writes formatted log lines to `<dir>/<app>.log`, rotating to
//! `<app>.1.log` .. `<app>.N.log` once the active file grows past a size
//! limit. The most recent lines are also kept in an in-memory circular
//! buffer so a caller can show them without touching the disk.
//!
//! `log` records are bridged into the `tracing` subscriber installed by
//! [`init_logger`], so library code can keep using the `log` macros.

use std::collections::VecDeque;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};

use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Size at which the active log file is rotated
pub const MAX_FILE_BYTES: u64 = 2 * 1024 * 1024;
/// Number of rotated files kept next to the active one
pub const MAX_ROTATED_FILES: usize = 3;
/// Lines kept in the in-memory buffer
pub const BUFFER_LINES: usize = 500;

static GLOBAL_WRITER: OnceLock<RollingFileWriter> = OnceLock::new();

struct Inner {
    dir: PathBuf,
    app_name: String,
    file: File,
    written: u64,
    max_bytes: u64,
    buffer: VecDeque<String>,
    pending: String,
}

impl Inner {
    fn active_path(dir: &Path, app_name: &str) -> PathBuf {
        dir.join(format!("{}.log", app_name))
    }

    fn rotated_path(&self, index: usize) -> PathBuf {
        self.dir.join(format!("{}.{}.log", self.app_name, index))
    }

    fn rotate(&mut self) -> io::Result<()> {
        self.file.flush()?;

        // Shift app.(n-1).log -> app.n.log, dropping the oldest
        let oldest = self.rotated_path(MAX_ROTATED_FILES);
        if oldest.exists() {
            fs::remove_file(&oldest)?;
        }
        for index in (1..MAX_ROTATED_FILES).rev() {
            let from = self.rotated_path(index);
            if from.exists() {
                fs::rename(&from, self.rotated_path(index + 1))?;
            }
        }

        let active = Self::active_path(&self.dir, &self.app_name);
        fs::rename(&active, self.rotated_path(1))?;
        self.file = OpenOptions::new().create(true).append(true).open(&active)?;
        self.written = 0;
        Ok(())
    }

    fn remember(&mut self, bytes: &[u8]) {
        self.pending.push_str(&String::from_utf8_lossy(bytes));
        while let Some(pos) = self.pending.find('\n') {
            let line: String = self.pending.drain(..=pos).collect();
            if self.buffer.len() == BUFFER_LINES {
                self.buffer.pop_front();
            }
            self.buffer.push_back(line.trim_end().to_string());
        }
    }
}

/// Cloneable handle to the rolling log file
#[derive(Clone)]
pub struct RollingFileWriter {
    inner: Arc<Mutex<Inner>>,
}

impl RollingFileWriter {
    /// Open (or create) `<dir>/<app_name>.log` for appending
    pub fn open(dir: impl AsRef<Path>, app_name: &str) -> io::Result<Self> {
        Self::with_max_bytes(dir, app_name, MAX_FILE_BYTES)
    }

    /// Same as [`RollingFileWriter::open`] with a custom rotation threshold
    pub fn with_max_bytes(dir: impl AsRef<Path>, app_name: &str, max_bytes: u64) -> io::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        let path = Inner::active_path(&dir, app_name);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let written = file.metadata().map(|m| m.len()).unwrap_or(0);

        Ok(Self {
            inner: Arc::new(Mutex::new(Inner {
                dir,
                app_name: app_name.to_string(),
                file,
                written,
                max_bytes,
                buffer: VecDeque::with_capacity(BUFFER_LINES),
                pending: String::new(),
            })),
        })
    }

    /// Snapshot of the buffered lines, oldest first
    pub fn recent_lines(&self) -> Vec<String> {
        match self.inner.lock() {
            Ok(inner) => inner.buffer.iter().cloned().collect(),
            Err(_) => Vec::new(),
        }
    }
}

impl Write for RollingFileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log writer poisoned"))?;

        if inner.written > 0 && inner.written + buf.len() as u64 > inner.max_bytes {
            inner.rotate()?;
        }

        inner.file.write_all(buf)?;
        inner.written += buf.len() as u64;
        inner.remember(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log writer poisoned"))?;
        inner.file.flush()
    }
}

impl<'a> MakeWriter<'a> for RollingFileWriter {
    type Writer = RollingFileWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Install the global subscriber writing to `<log_dir>/<app_name>.log`.
///
/// The filter comes from `RUST_LOG` and defaults to `info`. Calling this
/// twice returns an error and leaves the first subscriber in place.
pub fn init_logger(log_dir: PathBuf, app_name: &str) -> Result<(), String> {
    let writer = RollingFileWriter::open(&log_dir, app_name)
        .map_err(|e| format!("Failed to open log file in {}: {}", log_dir.display(), e))?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_target(true)
        .with_writer(writer.clone())
        .finish()
        .try_init()
        .map_err(|e| format!("Failed to install logger: {}", e))?;

    GLOBAL_WRITER
        .set(writer)
        .map_err(|_| "Logger already initialized".to_string())?;

    log::debug!("rolling logger ready in {}", log_dir.display());
    Ok(())
}

/// Lines buffered by the global logger, empty before [`init_logger`]
pub fn recent_lines() -> Vec<String> {
    GLOBAL_WRITER
        .get()
        .map(RollingFileWriter::recent_lines)
        .unwrap_or_default()
}

/// Log an info line through the global subscriber
pub fn info(message: &str) -> Result<(), String> {
    ensure_initialized()?;
    tracing::info!("{}", message);
    Ok(())
}

/// Log an error line through the global subscriber
pub fn error(message: &str) -> Result<(), String> {
    ensure_initialized()?;
    tracing::error!("{}", message);
    Ok(())
}

fn ensure_initialized() -> Result<(), String> {
    if GLOBAL_WRITER.get().is_some() {
        Ok(())
    } else {
        Err(format!(
            "Logger not initialized ({})",
            chrono::Local::now().format("%H:%M:%S%.3f")
        ))
    }
}
