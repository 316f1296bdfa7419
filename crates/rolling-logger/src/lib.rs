//! Rolling Logger
//!
//! Installs a global `tracing` subscriber that writes to stderr and to a
//! size-rotated file under the log directory. The last lines written are
//! also kept in memory so a host can show them without touching the disk.
//! `log` records are bridged into the same subscriber.

use std::collections::VecDeque;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};

use thiserror::Error;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, Registry};

/// Rotate once the active file would grow past this
pub const DEFAULT_MAX_BYTES: u64 = 5 * 1024 * 1024;
/// Rotated files kept next to the active one
pub const DEFAULT_MAX_FILES: usize = 5;
/// Lines kept in the in-memory buffer
pub const DEFAULT_BUFFER_LINES: usize = 500;

#[derive(Debug, Error)]
pub enum LoggerError {
    #[error("log file error: {0}")]
    Io(#[from] io::Error),
    #[error("logger already initialized")]
    AlreadyInitialized,
    #[error("logger not initialized")]
    NotInitialized,
}

// ============================================================================
// Recent lines
// ============================================================================

/// Fixed-capacity buffer of the most recent log lines
#[derive(Debug)]
pub struct LineBuffer {
    lines: VecDeque<String>,
    capacity: usize,
}

impl LineBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, line: String) {
        if self.lines.len() == self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

// ============================================================================
// Rotating file
// ============================================================================

struct RollingState {
    dir: PathBuf,
    base_name: String,
    file: File,
    size: u64,
    max_bytes: u64,
    max_files: usize,
}

impl RollingState {
    fn active_path(&self) -> PathBuf {
        self.dir.join(format!("{}.log", self.base_name))
    }

    fn rotated_path(&self, n: usize) -> PathBuf {
        self.dir.join(format!("{}.log.{}", self.base_name, n))
    }

    /// app.log -> app.log.1 -> ... -> app.log.N, dropping the oldest
    fn rotate(&mut self) -> io::Result<()> {
        self.file.flush()?;
        let oldest = self.rotated_path(self.max_files);
        if oldest.exists() {
            fs::remove_file(&oldest)?;
        }
        for n in (1..self.max_files).rev() {
            let from = self.rotated_path(n);
            if from.exists() {
                fs::rename(&from, self.rotated_path(n + 1))?;
            }
        }
        if self.max_files > 0 {
            fs::rename(self.active_path(), self.rotated_path(1))?;
        }
        self.file = File::create(self.active_path())?;
        self.size = 0;
        Ok(())
    }
}

/// Size-rotated log file writer, cheap to clone
#[derive(Clone)]
pub struct RollingWriter {
    state: Arc<Mutex<RollingState>>,
    recent: Arc<Mutex<LineBuffer>>,
}

impl RollingWriter {
    pub fn open(dir: impl AsRef<Path>, base_name: &str) -> Result<Self, LoggerError> {
        Self::with_limits(dir, base_name, DEFAULT_MAX_BYTES, DEFAULT_MAX_FILES, DEFAULT_BUFFER_LINES)
    }

    pub fn with_limits(
        dir: impl AsRef<Path>,
        base_name: &str,
        max_bytes: u64,
        max_files: usize,
        buffer_lines: usize,
    ) -> Result<Self, LoggerError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        let path = dir.join(format!("{}.log", base_name));
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let size = file.metadata()?.len();
        Ok(Self {
            state: Arc::new(Mutex::new(RollingState {
                dir,
                base_name: base_name.to_string(),
                file,
                size,
                max_bytes,
                max_files,
            })),
            recent: Arc::new(Mutex::new(LineBuffer::new(buffer_lines))),
        })
    }

    pub fn path(&self) -> Option<PathBuf> {
        self.state.lock().ok().map(|s| s.active_path())
    }

    pub fn recent_lines(&self) -> Vec<String> {
        self.recent.lock().map(|b| b.lines()).unwrap_or_default()
    }
}

impl Write for RollingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        {
            let mut state = self
                .state
                .lock()
                .map_err(|_| io::Error::new(io::ErrorKind::Other, "log writer poisoned"))?;
            if state.size > 0 && state.size + buf.len() as u64 > state.max_bytes {
                state.rotate()?;
            }
            state.file.write_all(buf)?;
            state.size += buf.len() as u64;
        }

        if let Ok(mut recent) = self.recent.lock() {
            for line in String::from_utf8_lossy(buf).lines() {
                if !line.is_empty() {
                    recent.push(line.to_string());
                }
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.state
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log writer poisoned"))?
            .file
            .flush()
    }
}

impl<'a> MakeWriter<'a> for RollingWriter {
    type Writer = RollingWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

// ============================================================================
// Global logger
// ============================================================================

static WRITER: OnceLock<RollingWriter> = OnceLock::new();

/// Install the global subscriber writing to `<log_dir>/<app_name>.log`
pub fn init_logger(log_dir: impl AsRef<Path>, app_name: &str) -> Result<(), LoggerError> {
    if WRITER.get().is_some() {
        return Err(LoggerError::AlreadyInitialized);
    }
    let writer = RollingWriter::open(log_dir, app_name)?;

    let file_layer = fmt::layer()
        .with_ansi(false)
        .with_target(true)
        .with_writer(writer.clone());
    let stderr_layer = fmt::layer().with_writer(io::stderr);

    Registry::default()
        .with(LevelFilter::INFO)
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .map_err(|_| LoggerError::AlreadyInitialized)?;

    let path = writer.path();
    WRITER
        .set(writer)
        .map_err(|_| LoggerError::AlreadyInitialized)?;
    tracing::info!(
        "{} logging to {} (started {})",
        app_name,
        path.map(|p| p.display().to_string()).unwrap_or_default(),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    Ok(())
}

/// Recent lines written by the global logger, oldest first
pub fn recent_lines() -> Vec<String> {
    WRITER.get().map(|w| w.recent_lines()).unwrap_or_default()
}

fn ensure_init() -> Result<(), LoggerError> {
    WRITER.get().map(|_| ()).ok_or(LoggerError::NotInitialized)
}

pub fn info(msg: &str) -> Result<(), LoggerError> {
    ensure_init()?;
    log::info!("{}", msg);
    Ok(())
}

pub fn warn(msg: &str) -> Result<(), LoggerError> {
    ensure_init()?;
    log::warn!("{}", msg);
    Ok(())
}

pub fn error(msg: &str) -> Result<(), LoggerError> {
    ensure_init()?;
    log::error!("{}", msg);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_buffer_drops_oldest() {
        let mut buf = LineBuffer::new(2);
        buf.push("a".into());
        buf.push("b".into());
        buf.push("c".into());
        assert_eq!(buf.lines(), vec!["b".to_string(), "c".to_string()]);
    }

    #[test]
    fn test_writer_rotates_by_size() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = RollingWriter::with_limits(dir.path(), "board", 16, 2, 10).unwrap();

        writer.write_all(b"0123456789\n").unwrap();
        writer.write_all(b"abcdefghij\n").unwrap();
        writer.write_all(b"klmnopqrst\n").unwrap();
        writer.write_all(b"uvwxyz0000\n").unwrap();
        writer.flush().unwrap();

        let active = fs::read_to_string(dir.path().join("board.log")).unwrap();
        assert_eq!(active, "uvwxyz0000\n");
        assert_eq!(fs::read_to_string(dir.path().join("board.log.1")).unwrap(), "klmnopqrst\n");
        assert_eq!(fs::read_to_string(dir.path().join("board.log.2")).unwrap(), "abcdefghij\n");
        assert!(!dir.path().join("board.log.3").exists());
        assert_eq!(writer.recent_lines().len(), 4);
    }

    #[test]
    fn test_reopen_appends() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut writer = RollingWriter::open(dir.path(), "board").unwrap();
            writer.write_all(b"first\n").unwrap();
        }
        let mut writer = RollingWriter::open(dir.path(), "board").unwrap();
        writer.write_all(b"second\n").unwrap();
        writer.flush().unwrap();
        let text = fs::read_to_string(dir.path().join("board.log")).unwrap();
        assert_eq!(text, "first\nsecond\n");
    }

    #[test]
    fn test_helpers_require_init() {
        if WRITER.get().is_none() {
            assert!(matches!(info("x"), Err(LoggerError::NotInitialized)));
        }
    }
}
