//! The git module abstracts the clone, fetch and inspect-head operations on a
//! single local working copy of a remote student repository.
use crate::error::{Error, Result};
use crate::submissions::{normalize_author, CommitSnapshot};
use chrono::{FixedOffset, TimeZone};
use git2::build::{CheckoutBuilder, RepoBuilder};
use git2::{Cred, CredentialType, FetchOptions, Oid, RemoteCallbacks, Repository, ResetType};
use std::fs::{create_dir_all, remove_dir_all};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Name of the remote every working copy tracks.
const ORIGIN: &str = "origin";
/// Credential callback attempts before giving up, libgit2 retries forever otherwise.
const MAX_CREDENTIAL_ATTEMPTS: u32 = 3;

/// Operations on one local working copy of a remote repository.
pub trait VersionControl: Send + Sync {
    /// Whether a working copy exists at `path`.
    fn exists(&self, path: &Path) -> bool;

    /// Clone `remote_url` into `path` and return the new head.
    ///
    /// # Errors
    /// Errors if the clone fails; nothing is left behind at `path`.
    fn clone_remote(&self, remote_url: &str, path: &Path) -> Result<CommitSnapshot>;

    /// Fetch remote refs and return the hash the remote branch points at.
    ///
    /// # Errors
    /// Errors on network failure or when the fetch exceeds the timeout.
    fn fetch_remote_head(&self, path: &Path) -> Result<String>;

    /// Hash of the local head.
    ///
    /// # Errors
    /// Errors if `path` is not a readable working copy.
    fn local_head(&self, path: &Path) -> Result<String>;

    /// Fast-forward the working copy to the remote head and return it.
    ///
    /// # Errors
    /// Errors on network failure or when the local branch has diverged.
    fn pull(&self, path: &Path) -> Result<CommitSnapshot>;

    /// Snapshot of the current local head.
    ///
    /// # Errors
    /// Errors if the head cannot be read.
    fn head_snapshot(&self, path: &Path) -> Result<CommitSnapshot>;

    /// Remove the working copy at `path`.
    ///
    /// # Errors
    /// Errors if the directory cannot be removed.
    fn discard(&self, path: &Path) -> Result<()>;

    /// Hard-reset the local branch and work tree to `hash`.
    ///
    /// # Errors
    /// Errors if `hash` is unknown or the reset fails.
    fn reset(&self, path: &Path, hash: &str) -> Result<()>;
}

/// [`VersionControl`] backed by libgit2.
#[derive(Debug, Clone)]
pub struct GitClient {
    /// Domain stripped from author emails.
    email_domain: String,
    /// Upper bound for a fetch, and for any single socket wait.
    timeout: Duration,
    /// Private key for ssh remotes, ssh-agent is used when absent.
    ssh_key: Option<PathBuf>,
}

impl GitClient {
    /// Create a client normalizing authors against `email_domain`.
    ///
    /// Also bounds libgit2's socket connect and read waits by `timeout`. Those
    /// limits are process-wide; every client in a process should share one.
    ///
    /// # Errors
    /// Errors if libgit2 rejects the socket timeouts.
    pub fn new(email_domain: &str, timeout: Duration, ssh_key: Option<PathBuf>) -> Result<Self> {
        set_socket_timeouts(timeout)?;
        Ok(Self {
            email_domain: email_domain.to_owned(),
            timeout,
            ssh_key,
        })
    }

    /// Fetch options carrying credentials and, when given, a transfer deadline.
    fn fetch_options(&self, deadline: Option<Instant>) -> FetchOptions<'static> {
        let mut callbacks = RemoteCallbacks::new();
        let ssh_key = self.ssh_key.clone();
        let mut attempts = 0;
        callbacks.credentials(move |_url, username, allowed| {
            attempts += 1;
            if attempts > MAX_CREDENTIAL_ATTEMPTS {
                return Err(git2::Error::from_str("authentication failed"));
            }
            let user = username.unwrap_or("git");
            if allowed.contains(CredentialType::SSH_KEY) {
                match ssh_key {
                    Some(ref key) => Cred::ssh_key(user, None, key, None),
                    None => Cred::ssh_key_from_agent(user),
                }
            } else {
                Cred::default()
            }
        });
        if let Some(deadline) = deadline {
            callbacks.transfer_progress(move |_| Instant::now() < deadline);
        }
        let mut options = FetchOptions::new();
        options.remote_callbacks(callbacks);
        options
    }

    /// Fetch `origin`, reporting a stalled socket or an aborted transfer past
    /// the deadline as a timeout.
    fn fetch_origin(&self, repo: &Repository) -> Result<()> {
        let started = Instant::now();
        let mut remote = repo.find_remote(ORIGIN)?;
        let mut options = self.fetch_options(Some(started + self.timeout));
        remote
            .fetch(&[] as &[&str], Some(&mut options), None)
            .map_err(|err| match Error::from(err) {
                Error::Timeout(reason) => Error::Timeout(format!("fetch stalled: {reason}")),
                _ if started.elapsed() >= self.timeout => Error::Timeout(format!(
                    "fetch did not finish within {}ms",
                    self.timeout.as_millis()
                )),
                other => other,
            })
    }

    /// Build a snapshot from the commit HEAD points at.
    fn snapshot(&self, repo: &Repository) -> Result<CommitSnapshot> {
        let commit = repo.head()?.peel_to_commit()?;
        let author = commit.author();
        let email = author.email().ok_or_else(|| {
            Error::Integrity(format!("author email of {} is not valid UTF-8", commit.id()))
        })?;
        let when = author.when();
        let timestamp = FixedOffset::east_opt(when.offset_minutes() * 60)
            .and_then(|offset| offset.timestamp_opt(when.seconds(), 0).single())
            .ok_or_else(|| Error::Vcs(format!("commit {} has an invalid timestamp", commit.id())))?;
        Ok(CommitSnapshot {
            timestamp,
            author: normalize_author(email, &self.email_domain),
            hash: commit.id().to_string(),
        })
    }
}

/// Bound libgit2's socket connect and read waits. A remote that accepts the
/// connection and then goes silent never reaches the transfer callbacks.
fn set_socket_timeouts(timeout: Duration) -> Result<()> {
    let millis = i32::try_from(timeout.as_millis()).unwrap_or(i32::MAX).max(1);
    // SAFETY: stores an integer in libgit2's global settings, read when a
    // socket stream is opened.
    unsafe { git2::opts::set_server_connect_timeout_in_milliseconds(millis) }?;
    // SAFETY: as above.
    unsafe { git2::opts::set_server_timeout_in_milliseconds(millis) }?;
    Ok(())
}

/// Open the working copy at `path`.
fn open(path: &Path) -> Result<Repository> {
    tracing::trace!("Opening working copy at {}", path.display());
    Ok(Repository::open(path)?)
}

/// The commit `refs/remotes/origin/<branch>` points at, `<branch>` being the local HEAD branch.
fn remote_head(repo: &Repository) -> Result<Oid> {
    let head = repo.head()?;
    let branch = head
        .shorthand()
        .ok_or_else(|| Error::Vcs("HEAD is not a valid UTF-8 branch name".into()))?;
    let refname = format!("refs/remotes/{ORIGIN}/{branch}");
    let reference = repo.find_reference(&refname)?;
    reference
        .target()
        .ok_or_else(|| Error::Vcs(format!("{refname} is not a direct reference")))
}

impl VersionControl for GitClient {
    fn exists(&self, path: &Path) -> bool {
        path.join(".git").is_dir()
    }

    fn clone_remote(&self, remote_url: &str, path: &Path) -> Result<CommitSnapshot> {
        if let Some(parent) = path.parent() {
            create_dir_all(parent).map_err(|err| Error::Vcs(err.to_string()))?;
        }
        tracing::debug!(remote_url, "Cloning into {}", path.display());
        let mut builder = RepoBuilder::new();
        builder.fetch_options(self.fetch_options(None));
        match builder.clone(remote_url, path) {
            Ok(repo) => self.snapshot(&repo),
            Err(err) => {
                if path.exists() {
                    if let Err(cleanup) = remove_dir_all(path) {
                        tracing::warn!(
                            "Could not remove partial clone at {}: {cleanup}",
                            path.display()
                        );
                    }
                }
                Err(err.into())
            }
        }
    }

    fn fetch_remote_head(&self, path: &Path) -> Result<String> {
        let repo = open(path)?;
        self.fetch_origin(&repo)?;
        Ok(remote_head(&repo)?.to_string())
    }

    fn local_head(&self, path: &Path) -> Result<String> {
        let repo = open(path)?;
        let oid = repo.head()?.peel_to_commit()?.id();
        Ok(oid.to_string())
    }

    fn pull(&self, path: &Path) -> Result<CommitSnapshot> {
        let repo = open(path)?;
        self.fetch_origin(&repo)?;
        let target = remote_head(&repo)?;
        let annotated = repo.find_annotated_commit(target)?;
        let (analysis, _) = repo.merge_analysis(&[&annotated])?;
        if analysis.is_fast_forward() {
            let mut head = repo.head()?;
            head.set_target(target, &format!("pull: fast-forward to {target}"))?;
            repo.checkout_head(Some(CheckoutBuilder::new().force()))?;
            tracing::debug!("Fast-forwarded {} to {target}", path.display());
        } else if !analysis.is_up_to_date() {
            return Err(Error::Vcs(format!(
                "{} has diverged from {ORIGIN}, cannot fast-forward",
                path.display()
            )));
        }
        self.snapshot(&repo)
    }

    fn head_snapshot(&self, path: &Path) -> Result<CommitSnapshot> {
        self.snapshot(&open(path)?)
    }

    fn discard(&self, path: &Path) -> Result<()> {
        if path.exists() {
            remove_dir_all(path).map_err(|err| Error::Vcs(err.to_string()))?;
        }
        Ok(())
    }

    fn reset(&self, path: &Path, hash: &str) -> Result<()> {
        let repo = open(path)?;
        let target = repo.revparse_single(hash)?;
        repo.reset(&target, ResetType::Hard, None)?;
        Ok(())
    }
}
