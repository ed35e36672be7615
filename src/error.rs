//! Error taxonomy shared by the sync and grading engines.
//!
//! Engine operations never hand these errors to their callers directly. They
//! are converted into `failed` results at the operation boundary, carrying the
//! message and the [`ErrorKind`].

use serde_derive::Serialize;

/// Crate-wide result alias.
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Everything that can go wrong while syncing a repository or refreshing its issues.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Network or API failure, including non-2xx responses.
    #[error("transport error: {0}")]
    Transport(String),
    /// A network operation exceeded the configured timeout.
    #[error("timed out: {0}")]
    Timeout(String),
    /// Remote repository or issue list does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// Author/student mismatch, invalid key or malformed persisted record.
    #[error("integrity error: {0}")]
    Integrity(String),
    /// Durable write or read of the submission store failed.
    #[error("storage error: {0}")]
    Storage(String),
    /// Local git failure that is not a network transport problem.
    #[error("git error: {0}")]
    Vcs(String),
    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Serializable discriminant of [`Error`], reported alongside `failed` results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// See [`Error::Transport`].
    Transport,
    /// See [`Error::Timeout`].
    Timeout,
    /// See [`Error::NotFound`].
    NotFound,
    /// See [`Error::Integrity`].
    Integrity,
    /// See [`Error::Storage`].
    Storage,
    /// See [`Error::Vcs`].
    Vcs,
    /// See [`Error::Config`].
    Config,
}

impl Error {
    /// The kind of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match *self {
            Self::Transport(_) => ErrorKind::Transport,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Integrity(_) => ErrorKind::Integrity,
            Self::Storage(_) => ErrorKind::Storage,
            Self::Vcs(_) => ErrorKind::Vcs,
            Self::Config(_) => ErrorKind::Config,
        }
    }
}

/// libgit2's `GIT_ETIMEOUT`, returned when a socket wait exceeds the server timeout.
const GIT_ETIMEOUT: i32 = -37;

impl From<git2::Error> for Error {
    fn from(err: git2::Error) -> Self {
        if err.raw_code() == GIT_ETIMEOUT {
            return Self::Timeout(err.message().to_owned());
        }
        match err.class() {
            git2::ErrorClass::Net | git2::ErrorClass::Ssh | git2::ErrorClass::Http => {
                Self::Transport(err.message().to_owned())
            }
            _ => Self::Vcs(err.message().to_owned()),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        if err.is_data() || err.is_syntax() || err.is_eof() {
            Self::Integrity(format!("malformed submission record: {err}"))
        } else {
            Self::Storage(err.to_string())
        }
    }
}

impl From<Error> for std::io::Error {
    fn from(err: Error) -> Self {
        Self::new(std::io::ErrorKind::Other, err)
    }
}
