//! File writer with optional size-based rotation
//!
//! Rotation shifts `app.log.1 .. app.log.N-1` up by one, moves the active
//! file to `app.log.1` and starts a fresh `app.log`. The oldest backup
//! beyond `max_backups` is deleted. With compression enabled each new
//! backup is gzipped to `app.log.1.gz` once it has been moved aside.
//!
//! A failed rotation never stops the writer: the active file is reopened
//! either way, the failure goes to the diagnostic handler, and the next
//! write past the size limit tries again. A backup that could not be
//! compressed stays in place uncompressed.

use crate::core::diagnostics::{stderr_handler, Diagnostic, DiagnosticHandler};
use crate::core::{LogEvent, LogFormatter, LogWriter, LoggerError, Result};
use crate::formatters::PlainTextFormatter;
use flate2::write::GzEncoder;
use flate2::Compression;
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// When and how the active file is rotated
///
/// # Examples
///
/// ```
/// use logflow::writers::RotationPolicy;
///
/// // Rotate at 50 MB, keep 7 gzipped backups
/// let policy = RotationPolicy::new(50 * 1024 * 1024)
///     .with_max_backups(7)
///     .with_compression(true);
/// assert_eq!(policy.max_backups, 7);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationPolicy {
    /// Rotate once the active file reaches this size
    pub max_bytes: u64,
    /// Number of rotated files kept
    pub max_backups: usize,
    pub compress: bool,
}

impl RotationPolicy {
    pub fn new(max_bytes: u64) -> Self {
        Self {
            max_bytes,
            max_backups: 5,
            compress: false,
        }
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_max_backups(mut self, count: usize) -> Self {
        self.max_backups = count;
        self
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_compression(mut self, enabled: bool) -> Self {
        self.compress = enabled;
        self
    }
}

impl Default for RotationPolicy {
    fn default() -> Self {
        Self::new(10 * 1024 * 1024)
    }
}

struct ActiveFile {
    writer: Option<BufWriter<File>>,
    current_size: u64,
}

/// Appends one line per event to a file
///
/// Writes from any number of threads are serialized internally, so one
/// instance can be shared by the direct and the queued delivery paths.
///
/// # Examples
///
/// ```no_run
/// use logflow::writers::{FileWriter, RotationPolicy};
///
/// let writer = FileWriter::new("/var/log/app/app.log")
///     .unwrap()
///     .with_rotation(RotationPolicy::new(10 * 1024 * 1024).with_compression(true));
/// ```
pub struct FileWriter {
    path: PathBuf,
    rotation: Option<RotationPolicy>,
    formatter: Arc<dyn LogFormatter>,
    diagnostics: DiagnosticHandler,
    active: Mutex<ActiveFile>,
}

impl FileWriter {
    /// Open `path` for appending, creating missing parent directories
    ///
    /// # Errors
    ///
    /// Returns error if the directory or the file cannot be created
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                LoggerError::io_operation(
                    "create log directory",
                    format!("Failed to create directory '{}'", parent.display()),
                    e,
                )
            })?;
        }

        let file = open_append(&path)?;
        let current_size = file.metadata().map(|m| m.len()).unwrap_or(0);

        Ok(Self {
            path,
            rotation: None,
            formatter: Arc::new(PlainTextFormatter::new()),
            diagnostics: stderr_handler(),
            active: Mutex::new(ActiveFile {
                writer: Some(BufWriter::new(file)),
                current_size,
            }),
        })
    }

    #[must_use]
    pub fn with_rotation(mut self, policy: RotationPolicy) -> Self {
        self.rotation = Some(policy);
        self
    }

    #[must_use]
    pub fn with_formatter<F: LogFormatter + 'static>(mut self, formatter: F) -> Self {
        self.formatter = Arc::new(formatter);
        self
    }

    /// Where rotation failures are reported; stderr by default
    #[must_use]
    pub fn with_diagnostics(mut self, handler: DiagnosticHandler) -> Self {
        self.diagnostics = handler;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes written to the active file, including what is still buffered
    pub fn current_size(&self) -> u64 {
        self.active.lock().current_size
    }

    fn rotate(&self, active: &mut ActiveFile, policy: &RotationPolicy) -> Result<()> {
        let shifted = self.shift_backups(active, policy);
        let reopened = self.reopen(active);
        shifted.and(reopened)
    }

    fn shift_backups(&self, active: &mut ActiveFile, policy: &RotationPolicy) -> Result<()> {
        if let Some(mut writer) = active.writer.take() {
            writer.flush().map_err(|e| {
                LoggerError::file_rotation(
                    self.path.display().to_string(),
                    format!("Failed to flush before rotation: {}", e),
                )
            })?;
        }

        if policy.max_backups == 0 {
            return remove_if_exists(&self.path);
        }

        let oldest = self.backup_path(policy.max_backups);
        remove_if_exists(&oldest)?;
        remove_if_exists(&gz_path(&oldest))?;

        for index in (1..policy.max_backups).rev() {
            let from = self.backup_path(index);
            let to = self.backup_path(index + 1);
            rename_if_exists(&from, &to)?;
            rename_if_exists(&gz_path(&from), &gz_path(&to))?;
        }

        let first = self.backup_path(1);
        rename_if_exists(&self.path, &first)?;
        if policy.compress {
            if let Err(e) = compress_file(&first) {
                self.report(&first, &e);
            }
        }
        Ok(())
    }

    /// Open the active path again, sizing it from what is already on disk
    fn reopen(&self, active: &mut ActiveFile) -> Result<()> {
        let file = open_append(&self.path)?;
        active.current_size = file.metadata().map(|m| m.len()).unwrap_or(0);
        active.writer = Some(BufWriter::new(file));
        Ok(())
    }

    fn report(&self, path: &Path, error: &LoggerError) {
        (self.diagnostics)(&Diagnostic::RotationFailed {
            path: path.display().to_string(),
            error: error.to_string(),
        });
    }

    fn backup_path(&self, index: usize) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "app.log".into());
        name.push(format!(".{}", index));
        self.path.with_file_name(name)
    }
}

impl LogWriter for FileWriter {
    fn write(&self, event: &LogEvent) -> Result<()> {
        let mut line = self.formatter.format(event);
        line.push('\n');

        let mut active = self.active.lock();
        if let Some(policy) = &self.rotation {
            if active.current_size >= policy.max_bytes {
                if let Err(e) = self.rotate(&mut active, policy) {
                    self.report(&self.path, &e);
                }
            }
        }
        if active.writer.is_none() {
            self.reopen(&mut active)?;
        }

        let writer = active
            .writer
            .as_mut()
            .ok_or_else(|| LoggerError::writer("File writer not initialized"))?;
        writer.write_all(line.as_bytes())?;
        active.current_size += line.len() as u64;
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        if let Some(writer) = self.active.lock().writer.as_mut() {
            writer.flush()?;
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "file"
    }
}

impl Drop for FileWriter {
    fn drop(&mut self) {
        let _ = LogWriter::flush(self);
    }
}

fn open_append(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| {
            LoggerError::io_operation(
                "open log file",
                format!("Failed to open '{}'", path.display()),
                e,
            )
        })
}

fn gz_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".gz");
    PathBuf::from(name)
}

fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(LoggerError::file_rotation(
            path.display().to_string(),
            format!("Failed to remove old backup: {}", e),
        )),
        _ => Ok(()),
    }
}

fn rename_if_exists(from: &Path, to: &Path) -> Result<()> {
    if !from.exists() {
        return Ok(());
    }
    fs::rename(from, to).map_err(|e| {
        LoggerError::file_rotation(
            from.display().to_string(),
            format!("Failed to rotate to '{}': {}", to.display(), e),
        )
    })
}

/// Gzip `path` to `path.gz`, removing the original only once the
/// compressed copy is complete
fn compress_file(path: &Path) -> Result<()> {
    let target = gz_path(path);
    let mut temp = target.as_os_str().to_os_string();
    temp.push(".tmp");
    let temp = PathBuf::from(temp);

    let compress = || -> std::io::Result<()> {
        let mut reader = BufReader::with_capacity(64 * 1024, File::open(path)?);
        let output = BufWriter::with_capacity(64 * 1024, File::create(&temp)?);
        let mut encoder = GzEncoder::new(output, Compression::default());
        std::io::copy(&mut reader, &mut encoder)?;
        encoder.finish()?.flush()?;
        fs::rename(&temp, &target)
    };

    if let Err(e) = compress() {
        let _ = fs::remove_file(&temp);
        return Err(LoggerError::io_operation(
            "compress log file",
            format!("Failed to compress '{}'", path.display()),
            e,
        ));
    }

    // The compressed copy is complete; a leftover original is only wasted space
    let _ = fs::remove_file(path);
    Ok(())
}
