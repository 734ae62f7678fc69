//! Transcript persistence.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use super::TranscriptRecord;
use crate::error::{EfficodeError, Result};

/// Destination for finished transcripts
pub trait TranscriptSink: Send {
    /// Store a record. Called once per session.
    fn persist(&mut self, record: &TranscriptRecord) -> Result<()>;
}

impl<T: TranscriptSink + ?Sized> TranscriptSink for Box<T> {
    fn persist(&mut self, record: &TranscriptRecord) -> Result<()> {
        (**self).persist(record)
    }
}

/// Persist `record` on a worker thread and wait at most `timeout`.
///
/// A write that outlives the bound is reported as
/// [`EfficodeError::StorageWriteFailed`]; the worker is left to finish or
/// hang on its own.
pub fn persist_within(
    mut sink: Box<dyn TranscriptSink>,
    record: TranscriptRecord,
    timeout: Duration,
) -> Result<()> {
    let (tx, rx) = mpsc::channel();
    thread::Builder::new()
        .name("transcript-writer".to_string())
        .spawn(move || {
            let _ = tx.send(sink.persist(&record));
        })
        .map_err(|e| EfficodeError::StorageWriteFailed(format!("writer thread: {e}")))?;

    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(RecvTimeoutError::Timeout) => Err(EfficodeError::StorageWriteFailed(format!(
            "write did not finish within {timeout:?}"
        ))),
        Err(RecvTimeoutError::Disconnected) => Err(EfficodeError::StorageWriteFailed(
            "writer thread exited without a result".to_string(),
        )),
    }
}

/// Writes `<stem>.json` and `<stem>.spl` into a directory
#[derive(Debug, Clone)]
pub struct FileSink {
    dir: PathBuf,
}

impl FileSink {
    /// Sink rooted at `dir` (created on first write)
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Target directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Paths a record will be written to (structured, flat)
    pub fn paths_for(&self, record: &TranscriptRecord) -> (PathBuf, PathBuf) {
        let stem = record.file_stem();
        (
            self.dir.join(format!("{stem}.json")),
            self.dir.join(format!("{stem}.spl")),
        )
    }
}

fn write(path: &Path, contents: &str) -> Result<()> {
    std::fs::write(path, contents)
        .map_err(|e| EfficodeError::StorageWriteFailed(format!("{}: {}", path.display(), e)))
}

impl TranscriptSink for FileSink {
    fn persist(&mut self, record: &TranscriptRecord) -> Result<()> {
        std::fs::create_dir_all(&self.dir).map_err(|e| {
            EfficodeError::StorageWriteFailed(format!("{}: {}", self.dir.display(), e))
        })?;

        let (json_path, flat_path) = self.paths_for(record);
        write(&json_path, &record.to_json_pretty()?)?;
        tracing::info!("Transcript saved to {}", json_path.display());

        write(&flat_path, &record.to_flat_text())?;
        tracing::info!("Flat transcript saved to {}", flat_path.display());
        Ok(())
    }
}

/// Keeps records in memory; clones share the same storage
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<TranscriptRecord>>>,
}

impl MemorySink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Records persisted so far
    pub fn records(&self) -> Vec<TranscriptRecord> {
        self.records
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

impl TranscriptSink for MemorySink {
    fn persist(&mut self, record: &TranscriptRecord) -> Result<()> {
        self.records
            .lock()
            .map_err(|_| EfficodeError::StorageWriteFailed("memory sink poisoned".to_string()))?
            .push(record.clone());
        Ok(())
    }
}
