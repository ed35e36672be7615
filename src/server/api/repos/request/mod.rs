use serde_derive::Deserialize;

use crate::submissions::TaskNumber;

/// Task identifier as sent by clients, either `1` or `"1"`.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum TaskId {
    /// Numeric form.
    Number(TaskNumber),
    /// String form.
    Text(String),
}

impl TaskId {
    /// The task number.
    ///
    /// # Errors
    /// Errors with a message for the client if the id is not a positive integer.
    pub fn number(&self) -> Result<TaskNumber, String> {
        let number = match *self {
            Self::Number(number) => Some(number),
            Self::Text(ref text) => text.trim().parse().ok(),
        };
        number
            .filter(|number| *number > 0)
            .ok_or_else(|| format!("invalid task_id: {self:?}"))
    }
}

/// Request for the clone-repos endpoint.
#[derive(Deserialize, Debug)]
pub struct CloneRepos {
    /// Task to sync.
    pub task_id: TaskId,
    /// Student handles.
    pub users: Vec<String>,
    /// Concurrency limit, defaults to the configured one.
    pub jobs: Option<usize>,
}

/// Request for the update-repos endpoint.
#[derive(Deserialize, Debug)]
pub struct UpdateRepo {
    /// Student handle.
    pub user: String,
    /// Task to sync.
    pub task_id: TaskId,
}
