use std::collections::VecDeque;

use crate::{ArchiveRecord, RepoRef};

/// Where a repository is in its archive run.
///
/// `Pending -> ResolvingOwnerRepo -> SkippedUnresolved`, or
/// `ResolvingOwnerRepo -> FetchingTags -> [DownloadingArtifact]* -> FetchingDefaultBranch -> Done`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RepoStage {
    #[default]
    Pending,
    ResolvingOwnerRepo,
    SkippedUnresolved,
    FetchingTags,
    DownloadingArtifact,
    FetchingDefaultBranch,
    Done,
}

/// Hosts the state machine derives URLs from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub repository_host: String,
    pub api_base: String,
    pub archive_base: String,
}

/// Archive progress for a single listing row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoJob {
    pub(crate) record: ArchiveRecord,
    pub(crate) endpoints: Endpoints,
    pub(crate) repo: Option<RepoRef>,
    pub(crate) stage: RepoStage,
    pub(crate) queued: VecDeque<String>,
    pub(crate) next_page: Option<String>,
}

impl RepoJob {
    pub fn new(record: ArchiveRecord, endpoints: Endpoints) -> Self {
        Self {
            record,
            endpoints,
            repo: None,
            stage: RepoStage::Pending,
            queued: VecDeque::new(),
            next_page: None,
        }
    }

    pub fn stage(&self) -> RepoStage {
        self.stage
    }

    pub fn repo(&self) -> Option<&RepoRef> {
        self.repo.as_ref()
    }

    pub fn record(&self) -> &ArchiveRecord {
        &self.record
    }

    pub fn into_record(self) -> ArchiveRecord {
        self.record
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.stage, RepoStage::Done | RepoStage::SkippedUnresolved)
    }
}
