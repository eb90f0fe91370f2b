//! Error-log sinks.
//!
//! The pipeline writes one log artifact per failed pass, named by the
//! pass's sequence number. The sink is a plain append/write target, not a
//! structured format; sink failures are logged and never abort the run.

use chrono::Utc;
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

/// Destination for per-pass error text.
pub trait ErrorSink {
    /// Persist the accumulated error text for the pass with the given
    /// 1-based sequence number.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the artifact cannot be written.
    fn write(&mut self, pass_index: usize, text: &str) -> std::io::Result<()>;
}

/// Writes one `error{index}.log` file per failed pass into a directory.
pub struct FileErrorSink {
    dir: PathBuf,
}

impl FileErrorSink {
    /// A sink writing into `dir`. The directory is created on first write
    /// if it does not exist.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path of the artifact for a pass.
    pub fn log_path(&self, pass_index: usize) -> PathBuf {
        self.dir.join(format!("error{pass_index}.log"))
    }
}

impl ErrorSink for FileErrorSink {
    fn write(&mut self, pass_index: usize, text: &str) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let mut file = File::create(self.log_path(pass_index))?;
        writeln!(file, "# pass {pass_index} errors, {}", Utc::now().to_rfc3339())?;
        file.write_all(text.as_bytes())?;
        if !text.ends_with('\n') {
            writeln!(file)?;
        }
        Ok(())
    }
}

/// In-memory sink for tests. Clones share the same entry list.
#[derive(Clone, Default)]
pub struct MemoryErrorSink {
    entries: Arc<Mutex<Vec<(usize, String)>>>,
}

impl MemoryErrorSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all `(pass_index, text)` entries written so far.
    pub fn entries(&self) -> Vec<(usize, String)> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ErrorSink for MemoryErrorSink {
    fn write(&mut self, pass_index: usize, text: &str) -> std::io::Result<()> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((pass_index, text.to_string()));
        Ok(())
    }
}
