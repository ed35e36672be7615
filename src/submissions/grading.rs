//! Reduce a repository's issue stream to the grader's latest verdict per category.
use super::store::SubmissionStore;
use super::{repo_name, Category, IssueSummary, Outcome, RefreshResult, Status, TaskNumber};
use crate::error::{Error, Result};
use crate::utils::batch::run_bounded;
use crate::utils::issues::{IssueTracker, RawIssue};
use crate::utils::paths::validate_key;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Keep, per category, the latest issue opened by `grader`.
///
/// Issues with an unrecognized title or another author are skipped. On equal
/// dates the issue seen first is kept.
#[must_use]
pub fn reduce_issues<'a, I>(issues: I, grader: &str) -> BTreeMap<Category, IssueSummary>
where
    I: IntoIterator<Item = &'a RawIssue>,
{
    let mut latest: BTreeMap<Category, IssueSummary> = BTreeMap::new();
    for issue in issues {
        let Some(category) = Category::from_title(&issue.title) else {
            tracing::debug!("Skipping issue with title: {}", issue.title);
            continue;
        };
        if issue.author != grader {
            tracing::debug!("Skipping issue by non TA: {}", issue.author);
            continue;
        }
        let summary = IssueSummary {
            title: issue.title.clone(),
            body: issue.body.clone(),
            state: issue.state.clone(),
            date: issue.created_at,
        };
        match latest.entry(category) {
            Entry::Vacant(entry) => {
                entry.insert(summary);
            }
            Entry::Occupied(mut entry) => {
                if summary.date > entry.get().date {
                    entry.insert(summary);
                }
            }
        }
    }
    latest
}

/// Orchestrates [`IssueTracker`] and [`SubmissionStore`] for one organization.
#[derive(Debug)]
pub struct GradeEngine<T, S> {
    /// Issue listing and creation.
    tracker: T,
    /// Shared submission store.
    store: Arc<S>,
    /// Handle whose issues count.
    grader: String,
}

impl<T: IssueTracker, S: SubmissionStore> GradeEngine<T, S> {
    /// Create an engine trusting issues authored by `grader`.
    pub fn new(tracker: T, store: Arc<S>, grader: &str) -> Self {
        Self {
            tracker,
            store,
            grader: grader.to_owned(),
        }
    }

    /// Recompute and store the grading summary of `student`'s `task`.
    ///
    /// The stored summary is replaced as a whole; a category without a
    /// qualifying issue disappears from it.
    #[tracing::instrument(skip(self))]
    pub fn refresh(&self, student: &str, task: TaskNumber) -> RefreshResult {
        match self.try_refresh(student, task) {
            Ok(issues) => RefreshResult {
                status: Status::Success,
                issues,
                reason: None,
                kind: None,
            },
            Err(err) => {
                tracing::error!(
                    "Error fetching issues for {}: {err}",
                    repo_name(student, task)
                );
                RefreshResult {
                    status: Status::Failed,
                    issues: BTreeMap::new(),
                    reason: Some(err.to_string()),
                    kind: Some(err.kind()),
                }
            }
        }
    }

    /// [`Self::refresh`] for every student, at most `jobs` at a time.
    pub fn refresh_many(
        &self,
        students: &[String],
        task: TaskNumber,
        jobs: usize,
    ) -> Vec<(String, RefreshResult)> {
        let results = run_bounded(students, jobs, |student| self.refresh(student, task));
        students.iter().cloned().zip(results).collect()
    }

    /// Open an issue on `student`'s `task` repository, assigned to the student.
    ///
    /// Nothing is stored locally; the issue shows up on the next refresh.
    #[tracing::instrument(skip(self, body))]
    pub fn create_issue(&self, student: &str, task: TaskNumber, title: &str, body: &str) -> Outcome {
        let created = validate_key(student, task).and_then(|()| {
            self.tracker
                .create_issue(&repo_name(student, task), title, body, student)
        });
        match created {
            Ok(()) => tracing::info!("Created issue '{title}' for {}", repo_name(student, task)),
            Err(ref err) => tracing::error!(
                "Error creating issue for {}: {err}",
                repo_name(student, task)
            ),
        }
        Outcome::from(created)
    }

    /// The refresh pipeline, errors propagated.
    fn try_refresh(&self, student: &str, task: TaskNumber) -> Result<BTreeMap<Category, IssueSummary>> {
        validate_key(student, task)?;
        let name = repo_name(student, task);
        tracing::info!("Fetching issues for {name}");
        let raw = match self.tracker.list_issues(&name) {
            Ok(raw) => raw,
            Err(Error::NotFound(reason)) => {
                tracing::debug!("No issues for {name}: {reason}");
                Vec::new()
            }
            Err(err) => return Err(err),
        };
        let issues = reduce_issues(&raw, &self.grader);

        if issues.is_empty() && self.store.read(student, task)?.is_none() {
            return Ok(issues);
        }
        self.store.update(student, task, |mut record| {
            record.issues = issues.clone();
            Ok(record)
        })?;
        tracing::info!(categories = issues.len(), "Stored issues for {name}");
        Ok(issues)
    }
}
