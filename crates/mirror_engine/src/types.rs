use std::fmt;
use std::path::PathBuf;

use mirror_core::ArtifactKind;

/// Progress notifications emitted by the crawl and archive jobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    PageScraped { page: u32, new_rows: usize },
    PageSkipped { page: u32 },
    ArtifactFinished {
        kind: ArtifactKind,
        url: String,
        outcome: DownloadOutcome,
    },
    RepositoryDone {
        plugin_page: String,
        processed: usize,
        tags: bool,
        master: bool,
    },
}

/// Response of a plain GET. Any status is returned; callers decide policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    pub link: Option<String>,
    pub body: String,
}

impl FetchResponse {
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    Downloaded { path: PathBuf, bytes: u64 },
    AlreadyPresent { path: PathBuf },
    Failed { reason: String },
}

impl DownloadOutcome {
    /// The archive is on disk, either from this run or an earlier one.
    pub fn is_obtained(&self) -> bool {
        !matches!(self, DownloadOutcome::Failed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct FetchError {
    pub kind: FailureKind,
    pub message: String,
}

impl FetchError {
    pub(crate) fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    HttpStatus(u16),
    Timeout,
    RedirectLimitExceeded,
    TooLarge { max_bytes: u64, actual: Option<u64> },
    Network,
    Io,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::RedirectLimitExceeded => write!(f, "redirect limit exceeded"),
            FailureKind::TooLarge { max_bytes, actual } => {
                write!(f, "response too large (max {max_bytes}, actual {actual:?})")
            }
            FailureKind::Network => write!(f, "network error"),
            FailureKind::Io => write!(f, "io error"),
        }
    }
}
