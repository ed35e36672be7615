use serde_derive::Deserialize;

use crate::server::api::repos::request::TaskId;

/// Request for the fetch-issues endpoint.
#[derive(Deserialize, Debug)]
pub struct FetchIssues {
    /// Student handle.
    pub user: String,
    /// Task whose issues to refresh.
    pub task_id: TaskId,
}

/// Request for the create-issue endpoint.
#[derive(Deserialize, Debug)]
pub struct CreateIssue {
    /// Student handle, also the assignee.
    pub user: String,
    /// Task repository to open the issue on.
    pub task_id: TaskId,
    /// Issue title.
    pub title: String,
    /// Issue body.
    #[serde(default)]
    pub body: String,
}
