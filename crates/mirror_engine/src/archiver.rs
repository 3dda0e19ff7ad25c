use std::collections::{HashMap, VecDeque};
use std::path::Path;

use engine_logging::{engine_debug, engine_info, engine_warn};
use mirror_core::{
    archive_file_name, next_link, update, ArchiveRecord, ArtifactKind, PluginRecord, RepoEffect,
    RepoJob, RepoMsg, RepoStage,
};
use serde::Deserialize;
use thiserror::Error;

use crate::persist::{ensure_output_dir, read_rows, CsvRowWriter, PersistError};
use crate::{DownloadOutcome, Fetcher, PipelineConfig, PipelineEvent, ProgressSink};

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error(transparent)]
    Persist(#[from] PersistError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ArchiveOptions {
    /// Row index into the listing CSV to resume from.
    pub start: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ArchiveSummary {
    pub rows_written: usize,
    pub carried_rows: usize,
    pub repositories: usize,
    pub unresolved: usize,
    pub tag_archives: usize,
    pub default_branch_archives: usize,
    pub failed_artifacts: usize,
}

/// One entry of the tag-listing API.
#[derive(Debug, Clone, Deserialize)]
struct TagEntry {
    #[serde(default)]
    name: String,
    zipball_url: String,
}

/// Downloads tag and default-branch archives for every listed repository
/// and writes the archive CSV.
pub struct Archiver<'a> {
    config: &'a PipelineConfig,
    fetcher: &'a dyn Fetcher,
    sink: &'a dyn ProgressSink,
}

impl<'a> Archiver<'a> {
    pub fn new(
        config: &'a PipelineConfig,
        fetcher: &'a dyn Fetcher,
        sink: &'a dyn ProgressSink,
    ) -> Self {
        Self {
            config,
            fetcher,
            sink,
        }
    }

    pub async fn run(&self, options: ArchiveOptions) -> Result<ArchiveSummary, ArchiveError> {
        let input: Vec<PluginRecord> = read_rows(&self.config.listing_csv)?;
        if input.is_empty() {
            engine_warn!("no listing rows found in {:?}", self.config.listing_csv);
        }

        let previous: HashMap<String, ArchiveRecord> = if options.start > 0 {
            read_rows::<ArchiveRecord>(&self.config.archive_csv)?
                .into_iter()
                .map(|record| (record.plugin_page.clone(), record))
                .collect()
        } else {
            HashMap::new()
        };

        let mut writer = CsvRowWriter::create(&self.config.archive_csv, &ArchiveRecord::HEADER)?;
        let mut summary = ArchiveSummary::default();

        let start = options.start.min(input.len());
        for row in &input[..start] {
            if let Some(record) = previous.get(&row.plugin_page) {
                writer.write(record)?;
                summary.carried_rows += 1;
            }
        }

        let mut processed = options.start;
        for row in &input[start..] {
            let record = ArchiveRecord::from(row.clone());
            if record.repository_url().is_none() {
                engine_info!(
                    "repository not found, maybe mirror was cloning {}",
                    record.plugin_page
                );
                writer.write(&record)?;
                continue;
            }

            processed += 1;
            if processed % self.config.archive_progress_every.max(1) == 0 {
                engine_info!("processed {} repositories", processed);
            }

            let (mut record, resolved) = self.archive_repository(record, &mut summary).await;
            if let Some(prior) = previous.get(&record.plugin_page) {
                record.merge_flags(prior);
            }
            writer.write(&record)?;

            self.sink.emit(PipelineEvent::RepositoryDone {
                plugin_page: record.plugin_page.clone(),
                processed,
                tags: record.tags == Some(true),
                master: record.master == Some(true),
            });

            if resolved {
                summary.repositories += 1;
                tokio::time::sleep(self.config.request_interval).await;
            } else {
                summary.unresolved += 1;
            }
        }

        summary.rows_written = writer.rows_written();
        engine_info!(
            "Archive finished: {} repositories, {} unresolved, {} tag archives, {} default-branch archives, {} failed downloads",
            summary.repositories,
            summary.unresolved,
            summary.tag_archives,
            summary.default_branch_archives,
            summary.failed_artifacts
        );
        Ok(summary)
    }

    /// Drive one repository through tag pages, tag archives and the default
    /// branch. Returns the updated record and whether owner/repo resolved.
    async fn archive_repository(
        &self,
        record: ArchiveRecord,
        summary: &mut ArchiveSummary,
    ) -> (ArchiveRecord, bool) {
        let (mut job, effects) = update(
            RepoJob::new(record, self.config.endpoints()),
            RepoMsg::Start,
        );
        let mut queue: VecDeque<RepoEffect> = effects.into();

        while let Some(effect) = queue.pop_front() {
            let msg = match effect {
                RepoEffect::FetchTagPage { url } => {
                    self.fetch_tag_page(&url, job.record()).await
                }
                RepoEffect::Download { url, kind } => {
                    let outcome = match job.repo() {
                        Some(repo) => {
                            let dir = repo.archive_dir(&self.config.archive_root);
                            download_archive(self.fetcher, &dir, &url).await
                        }
                        None => DownloadOutcome::Failed {
                            reason: "repository not resolved".to_string(),
                        },
                    };
                    match (&outcome, kind) {
                        (DownloadOutcome::Failed { .. }, _) => summary.failed_artifacts += 1,
                        (_, ArtifactKind::Tag) => summary.tag_archives += 1,
                        (_, ArtifactKind::DefaultBranch) => summary.default_branch_archives += 1,
                    }
                    let obtained = outcome.is_obtained();
                    self.sink.emit(PipelineEvent::ArtifactFinished {
                        kind,
                        url,
                        outcome,
                    });
                    RepoMsg::ArtifactFinished { kind, obtained }
                }
                RepoEffect::Finished => break,
            };
            let (next, effects) = update(job, msg);
            job = next;
            queue.extend(effects);
        }

        let resolved = job.stage() != RepoStage::SkippedUnresolved;
        if !resolved {
            engine_warn!(
                "could not extract owner and repo from repository url {}",
                job.record().repository_url().unwrap_or_default()
            );
        }
        (job.into_record(), resolved)
    }

    async fn fetch_tag_page(&self, url: &str, record: &ArchiveRecord) -> RepoMsg {
        let repository = record.repository_url().unwrap_or_default();
        let response = match self
            .fetcher
            .get(url, self.config.github_token.as_deref())
            .await
        {
            Ok(response) => response,
            Err(err) => {
                engine_warn!("tag listing {} failed for repo {}: {}", url, repository, err);
                return RepoMsg::TagPageFailed;
            }
        };
        if !response.is_ok() {
            engine_warn!(
                "unexpected status_code {} for repo {}",
                response.status,
                repository
            );
            return RepoMsg::TagPageFailed;
        }

        let tags: Vec<TagEntry> = match serde_json::from_str(&response.body) {
            Ok(tags) => tags,
            Err(err) => {
                engine_warn!("unreadable tag listing for repo {}: {}", repository, err);
                return RepoMsg::TagPageFailed;
            }
        };
        let next = response.link.as_deref().and_then(next_link);
        if let Some(next) = next.as_deref() {
            engine_debug!("next tag page {}", next);
        }
        engine_debug!(
            "{} tags on {}: {:?}",
            tags.len(),
            url,
            tags.iter().map(|tag| tag.name.as_str()).collect::<Vec<_>>()
        );

        RepoMsg::TagPageLoaded {
            archive_urls: tags.into_iter().map(|tag| tag.zipball_url).collect(),
            next,
        }
    }
}

/// Download `url` into `dir` under its sanitized archive name.
///
/// An existing file short-circuits without any request. Every failure is
/// reported as [`DownloadOutcome::Failed`] and logged; nothing is retried.
pub async fn download_archive(fetcher: &dyn Fetcher, dir: &Path, url: &str) -> DownloadOutcome {
    if let Err(err) = ensure_output_dir(dir) {
        engine_warn!("cannot prepare {:?} for {}: {}", dir, url, err);
        return DownloadOutcome::Failed {
            reason: err.to_string(),
        };
    }

    let path = dir.join(archive_file_name(url));
    if path.is_file() {
        engine_debug!("{:?} already present, skipping {}", path, url);
        return DownloadOutcome::AlreadyPresent { path };
    }

    match fetcher.download(url, &path).await {
        Ok(bytes) => DownloadOutcome::Downloaded { path, bytes },
        Err(err) => {
            engine_warn!("error while downloading {}: {}, skipping", url, err);
            DownloadOutcome::Failed {
                reason: err.to_string(),
            }
        }
    }
}
