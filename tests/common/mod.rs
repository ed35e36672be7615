#![allow(dead_code)]
use chrono::{DateTime, FixedOffset, Utc};
use git2::{Commit, Oid, Repository, RepositoryInitOptions, Signature, Time};
use gradesync::config::Config;
use gradesync::error::{Error, Result};
use gradesync::submissions::store::JsonStore;
use gradesync::submissions::{repo_name, CommitSnapshot, TaskNumber};
use gradesync::utils::git::VersionControl;
use gradesync::utils::issues::{IssueTracker, RawIssue};
use std::collections::HashMap;
use std::io::Read as _;
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

pub const ORG: &str = "inda-24";
pub const GRADER: &str = "ta1";
/// 2024-01-15T10:00:00+01:00
pub const JAN_15: i64 = 1_705_309_200;
/// Network timeout of every `GitClient` in the tests. libgit2's socket
/// timeouts are process-wide, so all clients share this value.
pub const GIT_TIMEOUT: Duration = Duration::from_secs(1);

/// `git://` URL of a server that accepts connections and never answers.
pub fn stalled_remote() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    std::thread::spawn(move || {
        let mut open = Vec::new();
        for mut stream in listener.incoming().flatten() {
            let mut request = [0_u8; 512];
            let _ = stream.read(&mut request);
            open.push(stream);
        }
    });
    format!("git://127.0.0.1:{port}/{ORG}/stalled.git")
}

/// Point `origin` of the working copy at `path` to `url`.
pub fn retarget_origin(path: &Path, url: &str) {
    Repository::open(path)
        .unwrap()
        .remote_set_url("origin", url)
        .unwrap();
}

/// Config rooted in `dir`, with a grader and a local file remote host.
pub fn test_config(dir: &Path) -> Config {
    Config {
        org: ORG.into(),
        vcs_host: format!("file://{}", dir.join("remotes").display()),
        grader_handle: Some(GRADER.into()),
        data_dir: dir.join("data"),
        log_dir: dir.join("logs"),
        timeout_secs: 5,
        jobs: 2,
        ..Config::default()
    }
}

pub fn open_store(config: &Config) -> Arc<JsonStore> {
    Arc::new(JsonStore::open(&config.store_path()).unwrap())
}

pub fn tempdir() -> TempDir {
    tempfile::Builder::new().prefix("gradesync").tempdir().unwrap()
}

pub fn snapshot(author: &str, hash: &str, seconds: i64) -> CommitSnapshot {
    CommitSnapshot {
        timestamp: DateTime::<Utc>::from_timestamp(seconds, 0)
            .unwrap()
            .with_timezone(&FixedOffset::east_opt(3600).unwrap()),
        author: author.into(),
        hash: hash.into(),
    }
}

pub fn raw_issue(title: &str, author: &str, created_at: &str) -> RawIssue {
    RawIssue {
        title: title.into(),
        body: format!("{title} from {author}"),
        state: "open".into(),
        created_at: created_at.parse::<DateTime<Utc>>().unwrap(),
        author: author.into(),
    }
}

/// Non-bare repository standing in for the hosted `{student}-task-{task}`,
/// at the location `test_config(root).vcs_host` resolves to.
pub fn init_remote(root: &Path, student: &str, task: TaskNumber) -> Repository {
    let path = root
        .join(format!("remotes:{ORG}"))
        .join(format!("{}.git", repo_name(student, task)));
    std::fs::create_dir_all(&path).unwrap();
    let mut opts = RepositoryInitOptions::new();
    opts.initial_head("master");
    Repository::init_opts(&path, &opts).unwrap()
}

/// Commit `content` to `file` on the current branch of `repo`.
pub fn commit_file(repo: &Repository, file: &str, content: &str, email: &str, seconds: i64) -> Oid {
    let workdir = repo.workdir().unwrap();
    std::fs::write(workdir.join(file), content).unwrap();
    let mut index = repo.index().unwrap();
    index.add_path(Path::new(file)).unwrap();
    index.write().unwrap();
    let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
    let signature = Signature::new("Student", email, &Time::new(seconds, 60)).unwrap();
    let parent = repo.head().ok().and_then(|head| head.peel_to_commit().ok());
    let parents: Vec<&Commit> = parent.iter().collect();
    repo.commit(
        Some("HEAD"),
        &signature,
        &signature,
        "Submit",
        &tree,
        &parents,
    )
    .unwrap()
}

/// In-memory remotes and working copies.
///
/// Remotes are keyed by repository name; working copies by path, holding the
/// hash they are checked out at.
#[derive(Clone, Default)]
pub struct FakeVcs {
    remotes: Arc<Mutex<HashMap<String, Vec<CommitSnapshot>>>>,
    local: Arc<Mutex<HashMap<PathBuf, String>>>,
    offline: Arc<AtomicBool>,
    pub clones: Arc<AtomicUsize>,
}

impl FakeVcs {
    /// Append a commit to the remote `repo`.
    pub fn push(&self, repo: &str, snapshot: CommitSnapshot) {
        self.remotes
            .lock()
            .unwrap()
            .entry(repo.into())
            .or_default()
            .push(snapshot);
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn checked_out(&self, path: &Path) -> Option<String> {
        self.local.lock().unwrap().get(path).cloned()
    }

    fn online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            Err(Error::Transport("network unreachable".into()))
        } else {
            Ok(())
        }
    }

    fn remote_of(path: &Path) -> String {
        path.file_name().unwrap().to_string_lossy().into_owned()
    }

    fn remote_head(&self, repo: &str) -> Result<CommitSnapshot> {
        self.remotes
            .lock()
            .unwrap()
            .get(repo)
            .and_then(|history| history.last().cloned())
            .ok_or_else(|| Error::NotFound(format!("repository {repo}")))
    }

    fn find(&self, path: &Path, hash: &str) -> Result<CommitSnapshot> {
        self.remotes
            .lock()
            .unwrap()
            .get(&Self::remote_of(path))
            .and_then(|history| history.iter().find(|snap| snap.hash == hash).cloned())
            .ok_or_else(|| Error::Vcs(format!("unknown commit {hash}")))
    }
}

impl VersionControl for FakeVcs {
    fn exists(&self, path: &Path) -> bool {
        self.local.lock().unwrap().contains_key(path)
    }

    fn clone_remote(&self, remote_url: &str, path: &Path) -> Result<CommitSnapshot> {
        self.online()?;
        self.clones.fetch_add(1, Ordering::SeqCst);
        let repo = remote_url
            .rsplit('/')
            .next()
            .and_then(|name| name.strip_suffix(".git"))
            .unwrap();
        let head = self.remote_head(repo)?;
        self.local
            .lock()
            .unwrap()
            .insert(path.to_path_buf(), head.hash.clone());
        Ok(head)
    }

    fn fetch_remote_head(&self, path: &Path) -> Result<String> {
        self.online()?;
        Ok(self.remote_head(&Self::remote_of(path))?.hash)
    }

    fn local_head(&self, path: &Path) -> Result<String> {
        self.checked_out(path)
            .ok_or_else(|| Error::Vcs(format!("no working copy at {}", path.display())))
    }

    fn pull(&self, path: &Path) -> Result<CommitSnapshot> {
        self.online()?;
        let head = self.remote_head(&Self::remote_of(path))?;
        self.local
            .lock()
            .unwrap()
            .insert(path.to_path_buf(), head.hash.clone());
        Ok(head)
    }

    fn head_snapshot(&self, path: &Path) -> Result<CommitSnapshot> {
        let hash = self.local_head(path)?;
        self.find(path, &hash)
    }

    fn discard(&self, path: &Path) -> Result<()> {
        self.local.lock().unwrap().remove(path);
        Ok(())
    }

    fn reset(&self, path: &Path, hash: &str) -> Result<()> {
        self.find(path, hash)?;
        self.local
            .lock()
            .unwrap()
            .insert(path.to_path_buf(), hash.into());
        Ok(())
    }
}

/// What a [`FakeTracker`] answers to `list_issues`.
#[derive(Clone)]
pub enum Listing {
    Issues(Vec<RawIssue>),
    Missing,
    Offline,
}

/// Canned issue listings per repository, recording created issues.
#[derive(Clone)]
pub struct FakeTracker {
    listings: Arc<Mutex<HashMap<String, Listing>>>,
    pub created: Arc<Mutex<Vec<CreatedIssue>>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedIssue {
    pub repo: String,
    pub title: String,
    pub body: String,
    pub assignee: String,
}

impl Default for FakeTracker {
    fn default() -> Self {
        Self {
            listings: Arc::new(Mutex::new(HashMap::new())),
            created: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl FakeTracker {
    pub fn set(&self, repo: &str, listing: Listing) {
        self.listings.lock().unwrap().insert(repo.into(), listing);
    }
}

impl IssueTracker for FakeTracker {
    fn list_issues(&self, repo: &str) -> Result<Vec<RawIssue>> {
        match self.listings.lock().unwrap().get(repo).cloned() {
            Some(Listing::Issues(issues)) => Ok(issues),
            Some(Listing::Offline) => Err(Error::Transport(format!("{repo}: 502 Bad Gateway"))),
            Some(Listing::Missing) | None => Err(Error::NotFound(format!("{repo}: Not Found"))),
        }
    }

    fn create_issue(&self, repo: &str, title: &str, body: &str, assignee: &str) -> Result<()> {
        if matches!(self.listings.lock().unwrap().get(repo), Some(Listing::Offline)) {
            return Err(Error::Transport(format!("{repo}: 502 Bad Gateway")));
        }
        self.created.lock().unwrap().push(CreatedIssue {
            repo: repo.into(),
            title: title.into(),
            body: body.into(),
            assignee: assignee.into(),
        });
        Ok(())
    }
}
