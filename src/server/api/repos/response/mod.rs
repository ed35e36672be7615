use std::collections::BTreeMap;

use serde_derive::Serialize;

use crate::submissions::{Category, IssueSummary, RefreshResult, Status, SyncResult};

/// Top-level keys of a [`BatchReport`] that are not student handles.
pub const RESERVED_KEYS: [&str; 2] = ["reasons", "issues"];

/// The first handle in `users` that would collide with a report key.
#[must_use]
pub fn reserved_handle(users: &[String]) -> Option<&str> {
    users
        .iter()
        .map(String::as_str)
        .find(|user| RESERVED_KEYS.contains(user))
}

/// Response of batch operations:
/// `{"<user>": "success"|"failed", ..., "reasons": {"<user>": "<reason>"}}`,
/// plus `"issues": {"<user>": {...}}` for issue refreshes.
#[derive(Serialize, Debug, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Status per student.
    #[serde(flatten)]
    pub statuses: BTreeMap<String, Status>,
    /// Failure reason per failed student.
    pub reasons: BTreeMap<String, String>,
    /// Stored grading summary per successfully refreshed student.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issues: Option<BTreeMap<String, BTreeMap<Category, IssueSummary>>>,
}

impl BatchReport {
    /// Summarize sync results.
    #[must_use]
    pub fn from_sync(results: Vec<(String, SyncResult)>) -> Self {
        let mut report = Self::default();
        for (user, result) in results {
            if !result.is_success() {
                report.reasons.insert(user.clone(), result.detail);
            }
            report.statuses.insert(user, result.status);
        }
        report
    }

    /// Summarize issue refreshes, keeping each successful user's issues.
    #[must_use]
    pub fn from_refresh(results: Vec<(String, RefreshResult)>) -> Self {
        let mut report = Self::default();
        let mut issues = BTreeMap::new();
        for (user, result) in results {
            let succeeded = result.is_success();
            match result.reason {
                Some(reason) if !succeeded => {
                    report.reasons.insert(user.clone(), reason);
                }
                _ => {
                    issues.insert(user.clone(), result.issues);
                }
            }
            report.statuses.insert(user, result.status);
        }
        report.issues = Some(issues);
        report
    }
}
