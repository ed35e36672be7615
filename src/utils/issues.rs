//! Listing and creating issues on student repositories through the hosting
//! service's REST API.
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::ACCEPT;
use reqwest::StatusCode;
use serde_derive::Deserialize;
use std::time::Duration;

/// Issues requested per page.
const PER_PAGE: usize = 100;
/// Hard stop for pagination.
const MAX_PAGES: usize = 50;
/// Media type requested from the API.
const API_MEDIA_TYPE: &str = "application/vnd.github+json";

/// An issue as listed by the tracker, before any filtering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawIssue {
    /// Issue title.
    pub title: String,
    /// Issue body, empty when the issue has none.
    pub body: String,
    /// `open` or `closed`.
    pub state: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Handle of the issue's author.
    pub author: String,
}

/// Issue operations against the repository named `repo` in the configured organization.
pub trait IssueTracker: Send + Sync {
    /// Every issue of `repo`, open and closed.
    ///
    /// # Errors
    /// [`Error::NotFound`] when the repository does not exist,
    /// [`Error::Transport`] or [`Error::Timeout`] otherwise.
    fn list_issues(&self, repo: &str) -> Result<Vec<RawIssue>>;

    /// Open a new issue on `repo` assigned to `assignee`.
    ///
    /// # Errors
    /// Errors unless the tracker reports the issue as created.
    fn create_issue(&self, repo: &str, title: &str, body: &str, assignee: &str) -> Result<()>;
}

/// Issue as returned by the REST API.
#[derive(Debug, Deserialize)]
struct ApiIssue {
    /// Issue title.
    title: String,
    /// Issue body, `null` when empty.
    body: Option<String>,
    /// Issue state.
    state: String,
    /// Creation time.
    created_at: DateTime<Utc>,
    /// Issue author.
    user: ApiUser,
}

/// User as returned by the REST API.
#[derive(Debug, Deserialize)]
struct ApiUser {
    /// Handle.
    login: String,
}

impl From<ApiIssue> for RawIssue {
    fn from(issue: ApiIssue) -> Self {
        Self {
            title: issue.title,
            body: issue.body.unwrap_or_default(),
            state: issue.state,
            created_at: issue.created_at,
            author: issue.user.login,
        }
    }
}

/// Error body returned by the REST API.
#[derive(Debug, Deserialize)]
struct ApiMessage {
    /// Human-readable reason.
    message: String,
}

/// [`IssueTracker`] speaking the GitHub (Enterprise) v3 REST API.
#[derive(Debug, Clone)]
pub struct GithubIssues {
    /// HTTP client with the network timeout applied.
    client: Client,
    /// API base, without trailing slash.
    api_base: String,
    /// Organization owning the repositories.
    org: String,
    /// Bearer token.
    token: Option<String>,
}

impl GithubIssues {
    /// Create a client for `org` at `api_base`.
    ///
    /// # Errors
    /// Errors if the HTTP client cannot be constructed.
    pub fn new(api_base: &str, org: &str, token: Option<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_owned(),
            org: org.to_owned(),
            token,
        })
    }

    /// `{api_base}/repos/{org}/{repo}/issues`
    fn issues_url(&self, repo: &str) -> String {
        format!("{}/repos/{}/{repo}/issues", self.api_base, self.org)
    }

    /// Add the headers every request carries.
    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request.header(ACCEPT, API_MEDIA_TYPE);
        match self.token {
            Some(ref token) => request.bearer_auth(token),
            None => request,
        }
    }
}

/// Turn a non-2xx response into an error, preferring the API's own message.
fn status_error(repo: &str, response: Response) -> Error {
    let status = response.status();
    let reason = response
        .text()
        .ok()
        .and_then(|text| {
            serde_json::from_str::<ApiMessage>(&text)
                .map(|body| body.message)
                .ok()
                .or_else(|| (!text.is_empty()).then_some(text))
        })
        .unwrap_or_else(|| status.to_string());
    if status == StatusCode::NOT_FOUND {
        Error::NotFound(format!("{repo}: {reason}"))
    } else {
        Error::Transport(format!("{repo}: {status}: {reason}"))
    }
}

impl IssueTracker for GithubIssues {
    #[tracing::instrument(level = "debug", skip(self))]
    fn list_issues(&self, repo: &str) -> Result<Vec<RawIssue>> {
        let url = self.issues_url(repo);
        let per_page = PER_PAGE.to_string();
        let mut issues = Vec::new();
        for page in 1..=MAX_PAGES {
            let page = page.to_string();
            let response = self
                .authorize(self.client.get(&url))
                .query(&[
                    ("state", "all"),
                    ("per_page", per_page.as_str()),
                    ("page", page.as_str()),
                ])
                .send()?;
            if !response.status().is_success() {
                return Err(status_error(repo, response));
            }
            let batch: Vec<ApiIssue> = response.json()?;
            let full_page = batch.len() == PER_PAGE;
            issues.extend(batch.into_iter().map(RawIssue::from));
            if !full_page {
                break;
            }
        }
        tracing::debug!(count = issues.len(), "Listed issues");
        Ok(issues)
    }

    #[tracing::instrument(level = "debug", skip(self, body))]
    fn create_issue(&self, repo: &str, title: &str, body: &str, assignee: &str) -> Result<()> {
        let payload = serde_json::json!({
            "title": title,
            "body": body,
            "assignees": [assignee],
        });
        let response = self
            .authorize(self.client.post(self.issues_url(repo)))
            .json(&payload)
            .send()?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(status_error(repo, response))
        }
    }
}
