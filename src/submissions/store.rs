//! Durable storage of submission records.
//!
//! All mutation goes through [`SubmissionStore::update`], which applies a
//! read-modify-write to one `(student, task)` record as a unit.
use super::{SubmissionRecord, TaskNumber};
use crate::error::{Error, Result};
use serde_derive::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{create_dir_all, read_to_string};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tempfile::NamedTempFile;

/// Persistent mapping from `(student, task)` to [`SubmissionRecord`].
pub trait SubmissionStore: Send + Sync {
    /// The record for `(student, task)`, if one exists.
    ///
    /// # Errors
    /// Errors if the store cannot be read.
    fn read(&self, student: &str, task: TaskNumber) -> Result<Option<SubmissionRecord>>;

    /// Every task record of `student`.
    ///
    /// # Errors
    /// Errors if the store cannot be read.
    fn student(&self, student: &str) -> Result<BTreeMap<TaskNumber, SubmissionRecord>>;

    /// Atomically replace the record for `(student, task)` with what `mutator`
    /// returns. `mutator` receives the current record, or an empty one.
    ///
    /// Concurrent updates are serialized. If `mutator` or the durable write
    /// fails, the stored record is left unchanged.
    ///
    /// # Errors
    /// Errors with whatever `mutator` returns, or [`Error::Storage`] if the
    /// write fails.
    fn update<F>(&self, student: &str, task: TaskNumber, mutator: F) -> Result<SubmissionRecord>
    where
        F: FnOnce(SubmissionRecord) -> Result<SubmissionRecord>;
}

/// On-disk document, `{"students": {"<handle>": {"<task>": record}}}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Records per student, then per task.
    #[serde(default)]
    pub students: BTreeMap<String, BTreeMap<TaskNumber, SubmissionRecord>>,
}

impl Document {
    /// Validate every record.
    ///
    /// # Errors
    /// Errors with the first [`Error::Integrity`] found.
    pub fn validate(&self) -> Result<()> {
        for (student, tasks) in &self.students {
            for record in tasks.values() {
                record.validate(student)?;
            }
        }
        Ok(())
    }
}

/// [`SubmissionStore`] persisted as one JSON document per organization.
///
/// The parsed document is kept in memory; every update rewrites the file
/// through a temporary file and an atomic rename.
#[derive(Debug)]
pub struct JsonStore {
    /// Path of the JSON document.
    path: PathBuf,
    /// Current contents, always equal to what is on disk.
    document: Mutex<Document>,
}

impl JsonStore {
    /// Load the store at `path`, creating an empty one if it does not exist.
    ///
    /// # Errors
    /// Errors if the file cannot be created or read, or holds a malformed record.
    pub fn open(path: &Path) -> Result<Self> {
        let store = Self {
            path: path.to_path_buf(),
            document: Mutex::new(Document::default()),
        };
        if path.exists() {
            let text = read_to_string(path)?;
            let document: Document = if text.trim().is_empty() {
                Document::default()
            } else {
                serde_json::from_str(&text)?
            };
            document.validate()?;
            *store.lock() = document;
        } else {
            store.write(&Document::default())?;
            tracing::debug!("Created new submission store at {}", path.display());
        }
        Ok(store)
    }

    /// Path of the JSON document.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Snapshot of the whole document.
    #[must_use]
    pub fn document(&self) -> Document {
        self.lock().clone()
    }

    /// Lock the in-memory document. A poisoned lock still holds the last
    /// written state, since the document only changes after a successful write.
    fn lock(&self) -> MutexGuard<'_, Document> {
        self.document.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Durably replace the file with `document`.
    fn write(&self, document: &Document) -> Result<()> {
        let dir = self
            .path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        create_dir_all(dir)?;
        let mut file = NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(&mut file, document)?;
        file.as_file().sync_all()?;
        file.persist(&self.path)
            .map_err(|err| Error::Storage(format!("{}: {}", self.path.display(), err.error)))?;
        Ok(())
    }
}

impl SubmissionStore for JsonStore {
    fn read(&self, student: &str, task: TaskNumber) -> Result<Option<SubmissionRecord>> {
        Ok(self
            .lock()
            .students
            .get(student)
            .and_then(|tasks| tasks.get(&task))
            .cloned())
    }

    fn student(&self, student: &str) -> Result<BTreeMap<TaskNumber, SubmissionRecord>> {
        Ok(self.lock().students.get(student).cloned().unwrap_or_default())
    }

    fn update<F>(&self, student: &str, task: TaskNumber, mutator: F) -> Result<SubmissionRecord>
    where
        F: FnOnce(SubmissionRecord) -> Result<SubmissionRecord>,
    {
        let mut document = self.lock();
        let current = document
            .students
            .get(student)
            .and_then(|tasks| tasks.get(&task))
            .cloned()
            .unwrap_or_default();
        let record = mutator(current)?;
        record.validate(student)?;

        let mut next = document.clone();
        next.students
            .entry(student.to_owned())
            .or_default()
            .insert(task, record.clone());
        self.write(&next)?;
        *document = next;
        tracing::trace!(student, task, "Wrote submission record");
        Ok(record)
    }
}
