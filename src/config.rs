//! Engine configuration, read from a TOML file with environment overrides.

use crate::error::{Error, Result};
use serde_derive::{Deserialize, Serialize};
use std::fs::read_to_string;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default location of the configuration file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "gradesync.toml";
/// Environment variable overriding [`Config::grader_handle`].
pub const GRADER_HANDLE_ENV: &str = "TA_HANDLE";
/// Environment variable overriding [`Config::token`].
pub const TOKEN_ENV: &str = "GITHUB_PAT";

/// Configuration for one organization.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Organization owning every student repository.
    pub org: String,
    /// Prefix of clone URLs, e.g. `git@gits-15.sys.kth.se`.
    pub vcs_host: String,
    /// Base URL of the hosting service's REST API.
    pub api_base: String,
    /// Handle whose issues are authoritative for grading.
    pub grader_handle: Option<String>,
    /// Bearer token for the REST API.
    pub token: Option<String>,
    /// Email domain stripped from commit authors.
    pub email_domain: String,
    /// Root for working copies (`repos/`) and the store (`info/students.json`).
    pub data_dir: PathBuf,
    /// Directory of the rolling log file.
    pub log_dir: PathBuf,
    /// Timeout in seconds for network operations.
    pub timeout_secs: u64,
    /// Default concurrency limit for batch operations.
    pub jobs: usize,
    /// Private key used for ssh clone and fetch. Falls back to ssh-agent.
    pub ssh_key: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            org: "inda-24".into(),
            vcs_host: "git@gits-15.sys.kth.se".into(),
            api_base: "https://gits-15.sys.kth.se/api/v3".into(),
            grader_handle: None,
            token: None,
            email_domain: "kth.se".into(),
            data_dir: PathBuf::from("data"),
            log_dir: PathBuf::from("logs"),
            timeout_secs: 30,
            jobs: 4,
            ssh_key: None,
        }
    }
}

impl Config {
    /// Load the configuration at `path`, then apply environment overrides.
    ///
    /// A missing file is not an error, defaults are used instead.
    ///
    /// # Errors
    /// Will error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let mut conf = if path.exists() {
            let conf_str = read_to_string(path)
                .map_err(|err| Error::Config(format!("{}: {err}", path.display())))?;
            toml::from_str(&conf_str)
                .map_err(|err| Error::Config(format!("{}: {err}", path.display())))?
        } else {
            tracing::debug!("No config file at {}, using defaults", path.display());
            Self::default()
        };
        conf.apply_env(|key| std::env::var(key).ok());
        Ok(conf)
    }

    /// Override secrets and the grader handle from the environment.
    pub fn apply_env<F: Fn(&str) -> Option<String>>(&mut self, lookup: F) {
        if let Some(handle) = lookup(GRADER_HANDLE_ENV).filter(|val| !val.is_empty()) {
            self.grader_handle = Some(handle);
        }
        if let Some(token) = lookup(TOKEN_ENV).filter(|val| !val.is_empty()) {
            self.token = Some(token);
        }
    }

    /// Check the configuration is usable by the engines.
    ///
    /// # Errors
    /// Errors on an empty organization, missing grader handle, zero timeout
    /// or an unparsable API base URL.
    pub fn validate(&self) -> Result<()> {
        if self.org.trim().is_empty() {
            return Err(Error::Config("`org` must not be empty".into()));
        }
        if self.grader_handle.as_deref().map_or(true, str::is_empty) {
            return Err(Error::Config(format!(
                "`grader_handle` is not set; set it in the config file or via {GRADER_HANDLE_ENV}"
            )));
        }
        if self.timeout_secs == 0 {
            return Err(Error::Config("`timeout_secs` must be positive".into()));
        }
        url::Url::parse(&self.api_base)
            .map_err(|err| Error::Config(format!("`api_base` {}: {err}", self.api_base)))?;
        Ok(())
    }

    /// Network timeout as a [`Duration`].
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Directory holding every working copy.
    #[must_use]
    pub fn repos_dir(&self) -> PathBuf {
        self.data_dir.join("repos")
    }

    /// Path of the durable submission store.
    #[must_use]
    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join("info").join("students.json")
    }
}
