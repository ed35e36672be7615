//! Submission records and grading summaries, keyed by `(student, task)`.
//!
//! A record holds at most two snapshots of a repository's head. `clone` is
//! the initial hand-in and is never replaced; `pull` is the latest
//! resubmission ("Komplettering") and every later sync overwrites it.

use crate::error::{Error, ErrorKind, Result};
use chrono::{DateTime, FixedOffset, Utc};
use derive_more::Display;
use serde_derive::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub mod grading;
pub mod store;
pub mod sync;

/// Assignment number, the `{task}` in `{student}-task-{task}`.
pub type TaskNumber = u32;

/// One observed repository head.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitSnapshot {
    /// Author-reported commit time.
    #[serde(rename = "commit_timestamp")]
    pub timestamp: DateTime<FixedOffset>,
    /// Normalized author handle, email domain stripped.
    #[serde(rename = "commit_author")]
    pub author: String,
    /// Full hexadecimal commit id.
    #[serde(rename = "commit_hash")]
    pub hash: String,
}

/// Recognized grading verdicts. Issue titles must match exactly.
#[derive(
    Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Category {
    /// Accepted.
    Pass,
    /// Needs a resubmission.
    Komplettera,
    /// Rejected.
    Fail,
}

impl Category {
    /// Every recognized category.
    pub const ALL: [Self; 3] = [Self::Pass, Self::Komplettera, Self::Fail];

    /// Parse an issue title. Case-sensitive, no surrounding whitespace allowed.
    #[must_use]
    pub fn from_title(title: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|category| category.to_string() == title)
    }
}

/// The grader's latest issue for one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueSummary {
    /// Issue title, equal to the category name.
    pub title: String,
    /// Free text.
    pub body: String,
    /// `open` or `closed`, as reported by the issue tracker.
    pub state: String,
    /// Creation time.
    pub date: DateTime<Utc>,
}

/// Which snapshot slot a sync wrote to.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Slot {
    /// Initial hand-in.
    #[display(fmt = "clone")]
    Clone,
    /// Latest resubmission.
    #[display(fmt = "pull")]
    Pull,
}

/// Everything recorded for one `(student, task)`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionRecord {
    /// First recorded snapshot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clone: Option<CommitSnapshot>,
    /// Latest snapshot recorded after `clone`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pull: Option<CommitSnapshot>,
    /// Latest grader issue per category.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub issues: BTreeMap<Category, IssueSummary>,
}

impl SubmissionRecord {
    /// The slot the next snapshot will be written to.
    #[must_use]
    pub const fn next_slot(&self) -> Slot {
        match self.clone {
            None => Slot::Clone,
            Some(_) => Slot::Pull,
        }
    }

    /// Store `snapshot` in `clone` if empty, otherwise overwrite `pull`.
    pub fn record_snapshot(&mut self, snapshot: CommitSnapshot) -> Slot {
        let slot = self.next_slot();
        match slot {
            Slot::Clone => self.clone = Some(snapshot),
            Slot::Pull => self.pull = Some(snapshot),
        }
        slot
    }

    /// The most recent snapshot, if any.
    #[must_use]
    pub fn latest(&self) -> Option<&CommitSnapshot> {
        self.pull.as_ref().or(self.clone.as_ref())
    }

    /// Whether nothing at all has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clone.is_none() && self.pull.is_none() && self.issues.is_empty()
    }

    /// Check the record invariants for a record stored under `student`.
    ///
    /// # Errors
    /// Errors if `pull` is set without `clone`, if a snapshot's author is not
    /// `student`, or if an issue summary is filed under the wrong category.
    pub fn validate(&self, student: &str) -> Result<()> {
        match (&self.clone, &self.pull) {
            (None, Some(_)) => {
                return Err(Error::Integrity(format!(
                    "record for {student} has a pull snapshot but no clone snapshot"
                )))
            }
            (clone, pull) => {
                for snapshot in clone.iter().chain(pull.iter()) {
                    ensure_author(student, &snapshot.author)?;
                }
            }
        }
        for (category, summary) in &self.issues {
            if Category::from_title(&summary.title) != Some(*category) {
                return Err(Error::Integrity(format!(
                    "issue titled '{}' stored under {category} for {student}",
                    summary.title
                )));
            }
        }
        Ok(())
    }
}

/// Reduce a commit author email to a handle: lower-cased, `@{domain}` stripped.
#[must_use]
pub fn normalize_author(email: &str, domain: &str) -> String {
    let email = email.trim().to_lowercase();
    let suffix = format!("@{}", domain.to_lowercase());
    match email.strip_suffix(&suffix) {
        Some(handle) => handle.to_owned(),
        None => email,
    }
}

/// Check that a snapshot author is the student it is recorded for.
///
/// # Errors
/// Errors with [`Error::Integrity`] on mismatch.
pub fn ensure_author(student: &str, author: &str) -> Result<()> {
    if student.to_lowercase() == author.to_lowercase() {
        Ok(())
    } else {
        Err(Error::Integrity(format!(
            "commit author mismatch: expected '{student}', but got '{author}'"
        )))
    }
}

/// Remote repository name, `{student}-task-{task}`.
#[must_use]
pub fn repo_name(student: &str, task: TaskNumber) -> String {
    format!("{student}-task-{task}")
}

/// Clone URL, `{vcs_host}:{org}/{student}-task-{task}.git`.
#[must_use]
pub fn clone_url(vcs_host: &str, org: &str, student: &str, task: TaskNumber) -> String {
    format!("{vcs_host}:{org}/{}.git", repo_name(student, task))
}

/// Issue listing URL, `{api_base}/repos/{org}/{student}-task-{task}/issues`.
#[must_use]
pub fn issues_url(api_base: &str, org: &str, student: &str, task: TaskNumber) -> String {
    format!(
        "{}/repos/{org}/{}/issues",
        api_base.trim_end_matches('/'),
        repo_name(student, task)
    )
}

/// Outcome of an engine operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// The operation completed.
    Success,
    /// The operation failed; nothing was changed.
    Failed,
}

/// Result of [`sync::SyncEngine::sync`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncResult {
    /// Success or failure.
    pub status: Status,
    /// Human-readable detail, or the failure reason.
    pub detail: String,
    /// Slot written, absent on "no updates" and on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slot: Option<Slot>,
    /// Commit recorded by this sync.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    /// Kind of failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<ErrorKind>,
}

/// Detail reported when the remote head equals the local head.
pub const NO_UPDATES: &str = "No updates, latest commit hash is the same.";

impl SyncResult {
    /// Nothing changed remotely.
    #[must_use]
    pub fn no_updates() -> Self {
        Self {
            status: Status::Success,
            detail: NO_UPDATES.into(),
            slot: None,
            hash: None,
            kind: None,
        }
    }

    /// A snapshot was written to `slot`.
    #[must_use]
    pub fn recorded(slot: Slot, snapshot: &CommitSnapshot) -> Self {
        Self {
            status: Status::Success,
            detail: format!("Stored {slot} commit {}", snapshot.hash),
            slot: Some(slot),
            hash: Some(snapshot.hash.clone()),
            kind: None,
        }
    }

    /// The sync failed with `err`.
    #[must_use]
    pub fn failed(err: &Error) -> Self {
        Self {
            status: Status::Failed,
            detail: err.to_string(),
            slot: None,
            hash: None,
            kind: Some(err.kind()),
        }
    }

    /// Whether the sync succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }
}

/// Result of [`grading::GradeEngine::refresh`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefreshResult {
    /// Success or failure.
    pub status: Status,
    /// Stored issue summary, empty on failure.
    pub issues: BTreeMap<Category, IssueSummary>,
    /// Failure reason.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Kind of failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<ErrorKind>,
}

impl RefreshResult {
    /// Whether the refresh succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }
}

/// Result of operations with no payload, such as issue creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Outcome {
    /// Success or failure.
    pub status: Status,
    /// Failure reason.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Kind of failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<ErrorKind>,
}

impl From<Result<()>> for Outcome {
    fn from(res: Result<()>) -> Self {
        match res {
            Ok(()) => Self {
                status: Status::Success,
                reason: None,
                kind: None,
            },
            Err(err) => Self {
                status: Status::Failed,
                reason: Some(err.to_string()),
                kind: Some(err.kind()),
            },
        }
    }
}
