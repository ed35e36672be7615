//! Utility functions for working with paths
use crate::error::{Error, Result};
use crate::submissions::{repo_name, TaskNumber};
use lazy_static::lazy_static;
use regex::Regex;
use std::path::{Path, PathBuf};

#[allow(clippy::expect_used)]
/// Check `student` is a plain hosting-service handle and `task` a positive number.
///
/// Both end up in filesystem paths and URLs.
///
/// # Errors
/// Errors with [`Error::Integrity`] on anything else.
pub fn validate_key(student: &str, task: TaskNumber) -> Result<()> {
    lazy_static! {
        static ref HANDLE: Regex =
            Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_-]*$").expect("Failed to compile regex!?!");
    }
    if !HANDLE.is_match(student) {
        return Err(Error::Integrity(format!(
            "invalid student handle '{student}'"
        )));
    }
    if task == 0 {
        return Err(Error::Integrity("task number must be positive".into()));
    }
    Ok(())
}

/// Local working copy for `(student, task)`:
/// `{repos_dir}/task-{task}/{student}-task-{task}`.
#[must_use]
pub fn working_copy_path(repos_dir: &Path, student: &str, task: TaskNumber) -> PathBuf {
    repos_dir
        .join(format!("task-{task}"))
        .join(repo_name(student, task))
}
