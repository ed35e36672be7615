//! Centralized state shared by the CLI and the Actix web server
use std::sync::Arc;

use crate::config::Config;
use crate::error::Result;
use crate::submissions::{
    grading::GradeEngine, store::JsonStore, store::SubmissionStore, sync::SyncEngine,
};
use crate::utils::{
    git::{GitClient, VersionControl},
    issues::{GithubIssues, IssueTracker},
};

/// Both engines of one organization, sharing a submission store.
#[derive(Debug)]
pub struct App<V, T, S> {
    /// Repository sync.
    pub sync: SyncEngine<V, S>,
    /// Grading correlation.
    pub grading: GradeEngine<T, S>,
    /// Default concurrency limit for batch requests.
    pub jobs: usize,
}

/// Application state wired to git, the hosting service's API and the JSON store.
pub type Production = App<GitClient, GithubIssues, JsonStore>;

impl<V: VersionControl, T: IssueTracker, S: SubmissionStore> App<V, T, S> {
    /// Assemble the engines from their collaborators.
    pub fn new(vcs: V, tracker: T, store: Arc<S>, config: &Config) -> Self {
        let grader = config.grader_handle.clone().unwrap_or_default();
        Self {
            sync: SyncEngine::new(vcs, Arc::clone(&store), config),
            grading: GradeEngine::new(tracker, store, &grader),
            jobs: config.jobs.max(1),
        }
    }

    /// The shared store.
    pub fn store(&self) -> &S {
        self.sync.store()
    }
}

impl Production {
    /// Validate `config` and open everything it points at.
    ///
    /// # Errors
    /// Errors if the configuration is invalid, the store cannot be loaded, or
    /// the git or HTTP client cannot be set up.
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;
        let store = Arc::new(JsonStore::open(&config.store_path())?);
        let vcs = GitClient::new(&config.email_domain, config.timeout(), config.ssh_key.clone())?;
        let tracker = GithubIssues::new(
            &config.api_base,
            &config.org,
            config.token.clone(),
            config.timeout(),
        )?;
        if config.token.is_none() {
            tracing::warn!("No API token configured, issue requests are unauthenticated");
        }
        tracing::debug!(
            org = %config.org,
            store = %config.store_path().display(),
            "Initialized engines"
        );
        Ok(Self::new(vcs, tracker, store, config))
    }
}
