//! Bring the recorded state of a student repository in line with its remote.
//!
//! A sync either clones a fresh working copy or fetches and fast-forwards the
//! existing one, then records the new head in the `clone` or `pull` slot.
//! The working copy and the store change together or not at all.
use super::store::SubmissionStore;
use super::{clone_url, ensure_author, repo_name, Slot, SyncResult, TaskNumber};
use crate::config::Config;
use crate::error::Result;
use crate::utils::batch::run_bounded;
use crate::utils::git::VersionControl;
use crate::utils::paths::{validate_key, working_copy_path};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

/// Per-key locks guarding working copies.
type KeyLocks = Mutex<HashMap<(String, TaskNumber), Arc<Mutex<()>>>>;

/// Orchestrates [`VersionControl`] and [`SubmissionStore`] for one organization.
#[derive(Debug)]
pub struct SyncEngine<V, S> {
    /// Working copy operations.
    vcs: V,
    /// Shared submission store.
    store: Arc<S>,
    /// Root of all working copies.
    repos_dir: PathBuf,
    /// Clone URL prefix.
    vcs_host: String,
    /// Organization name.
    org: String,
    /// One lock per `(student, task)`, so a working copy has a single writer.
    locks: KeyLocks,
}

impl<V: VersionControl, S: SubmissionStore> SyncEngine<V, S> {
    /// Create an engine for the organization in `config`.
    pub fn new(vcs: V, store: Arc<S>, config: &Config) -> Self {
        Self {
            vcs,
            store,
            repos_dir: config.repos_dir(),
            vcs_host: config.vcs_host.clone(),
            org: config.org.clone(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// The store this engine writes to.
    pub const fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Clone or update the repository of `student` for `task` and record its head.
    ///
    /// Never returns an error: every failure becomes a `failed` result and
    /// leaves both the working copy and the store as they were.
    #[tracing::instrument(skip(self))]
    pub fn sync(&self, student: &str, task: TaskNumber) -> SyncResult {
        match self.try_sync(student, task) {
            Ok(result) => result,
            Err(err) => {
                tracing::error!(
                    "Error handling repo for {}: {err}",
                    repo_name(student, task)
                );
                SyncResult::failed(&err)
            }
        }
    }

    /// [`Self::sync`] for every student, at most `jobs` at a time.
    pub fn sync_many(
        &self,
        students: &[String],
        task: TaskNumber,
        jobs: usize,
    ) -> Vec<(String, SyncResult)> {
        let results = run_bounded(students, jobs, |student| self.sync(student, task));
        students.iter().cloned().zip(results).collect()
    }

    /// The sync pipeline under the key's lock, errors propagated.
    fn try_sync(&self, student: &str, task: TaskNumber) -> Result<SyncResult> {
        validate_key(student, task)?;
        let key_lock = self.key_lock(student, task);
        let result = {
            let _guard = key_lock.lock().unwrap_or_else(PoisonError::into_inner);
            self.sync_locked(student, task)
        };
        self.release_key_lock(student, task, key_lock);
        result
    }

    /// Clone or pull and record, with the key's lock held.
    fn sync_locked(&self, student: &str, task: TaskNumber) -> Result<SyncResult> {
        let name = repo_name(student, task);
        let path = working_copy_path(&self.repos_dir, student, task);
        let previous = if self.vcs.exists(&path) {
            let remote = self.vcs.fetch_remote_head(&path)?;
            let local = self.vcs.local_head(&path)?;
            if remote == local {
                tracing::info!("No updates for {name}, latest commit hash is the same");
                return Ok(SyncResult::no_updates());
            }
            Some(local)
        } else {
            None
        };

        let advanced = match previous {
            Some(_) => self.vcs.pull(&path).map(|pulled| {
                tracing::info!(hash = %pulled.hash, "Pulled repo for {name}");
            }),
            None => {
                let url = clone_url(&self.vcs_host, &self.org, student, task);
                self.vcs.clone_remote(&url, &path).map(|cloned| {
                    tracing::info!(hash = %cloned.hash, "Cloned repo for {name}");
                })
            }
        };
        advanced
            .and_then(|()| self.record(student, task, &path))
            .map_err(|err| {
                self.rollback(&path, previous.as_deref());
                err
            })
    }

    /// Read the new head and write it to the next free slot.
    fn record(&self, student: &str, task: TaskNumber, path: &Path) -> Result<SyncResult> {
        let snapshot = self.vcs.head_snapshot(path)?;
        ensure_author(student, &snapshot.author)?;
        let mut slot = Slot::Clone;
        self.store.update(student, task, |mut record| {
            slot = record.record_snapshot(snapshot.clone());
            Ok(record)
        })?;
        tracing::info!("Stored {slot} commit for {}", repo_name(student, task));
        Ok(SyncResult::recorded(slot, &snapshot))
    }

    /// Undo a clone or pull whose snapshot could not be recorded.
    fn rollback(&self, path: &Path, previous: Option<&str>) {
        let undone = match previous {
            Some(hash) => self.vcs.reset(path, hash),
            None => self.vcs.discard(path),
        };
        if let Err(err) = undone {
            tracing::error!("Could not roll back {}: {err}", path.display());
        }
    }

    /// The lock for `(student, task)`, created on first use.
    fn key_lock(&self, student: &str, task: TaskNumber) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry((student.to_owned(), task)).or_default())
    }

    /// Drop our handle on the key's lock, and its map entry once nobody else
    /// holds or waits for it. Handles are only cloned under the map lock, so
    /// the count cannot grow while it is checked.
    fn release_key_lock(&self, student: &str, task: TaskNumber, key_lock: Arc<Mutex<()>>) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        let key = (student.to_owned(), task);
        if locks
            .get(&key)
            .is_some_and(|entry| Arc::ptr_eq(entry, &key_lock) && Arc::strong_count(entry) == 2)
        {
            locks.remove(&key);
        }
    }
}
