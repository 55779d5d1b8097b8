//! The append-only failure log file

use crate::config::{FailureLogConfig, LogFormat};
use crate::failure_log::entry::FailureLogEntry;
use crate::failure_log::format::{to_json_line, to_legacy_line};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Receives abandoned tasks
///
/// The crawl engine writes to the on-disk log during a traversal and to an
/// in-memory collector while replaying, where it only needs to know whether
/// anything failed.
pub trait FailureRecorder {
    fn record(&mut self, entry: FailureLogEntry);
}

impl FailureRecorder for Vec<FailureLogEntry> {
    fn record(&mut self, entry: FailureLogEntry) {
        self.push(entry);
    }
}

/// Failure log file at a fixed path
#[derive(Debug, Clone)]
pub struct FailureLog {
    path: PathBuf,
    format: LogFormat,
}

impl FailureLog {
    pub fn new(path: impl Into<PathBuf>, format: LogFormat) -> Self {
        Self {
            path: path.into(),
            format,
        }
    }

    pub fn from_config(config: &FailureLogConfig) -> Self {
        Self::new(&config.path, config.format)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> LogFormat {
        self.format
    }

    /// Renders an entry in this log's format
    pub fn render(&self, entry: &FailureLogEntry) -> io::Result<String> {
        let line = match self.format {
            LogFormat::JsonLines => to_json_line(entry),
            LogFormat::LegacyText => to_legacy_line(entry),
        };
        line.map_err(io::Error::from)
    }

    /// Appends one entry as a single line
    pub fn append(&self, entry: &FailureLogEntry) -> io::Result<()> {
        let line = self.render(entry)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", line)
    }

    /// All non-blank lines, or `None` when the file does not exist
    pub fn read_lines(&self) -> io::Result<Option<Vec<String>>> {
        match fs::read_to_string(&self.path) {
            Ok(content) => Ok(Some(
                content
                    .lines()
                    .filter(|line| !line.trim().is_empty())
                    .map(str::to_string)
                    .collect(),
            )),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Atomically replaces the file with `lines`
    ///
    /// Writes a temporary file next to the log and renames it over the original.
    pub fn rewrite(&self, lines: &[String]) -> io::Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut temp = NamedTempFile::new_in(dir)?;
        for line in lines {
            writeln!(temp, "{}", line)?;
        }
        temp.flush()?;
        temp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}

impl FailureRecorder for FailureLog {
    fn record(&mut self, entry: FailureLogEntry) {
        tracing::warn!(
            "Recording failed {} request to {}",
            entry.request_type,
            self.path.display()
        );
        if let Err(e) = self.append(&entry) {
            tracing::error!("Failed to write failure log {}: {}", self.path.display(), e);
        }
    }
}
