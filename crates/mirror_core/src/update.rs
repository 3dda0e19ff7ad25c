use crate::{ArtifactKind, RepoEffect, RepoJob, RepoMsg, RepoRef, RepoStage};

/// Pure update function: applies a message to a repository job and returns
/// the IO the caller must perform next.
///
/// Messages that do not fit the current stage leave the job untouched.
pub fn update(mut job: RepoJob, msg: RepoMsg) -> (RepoJob, Vec<RepoEffect>) {
    let effects = match (job.stage, msg) {
        (RepoStage::Pending, RepoMsg::Start) => {
            job.stage = RepoStage::ResolvingOwnerRepo;
            let resolved = job.record.repository_url().and_then(|url| {
                RepoRef::parse(url, &job.endpoints.repository_host)
            });
            match resolved {
                Some(repo) => {
                    let url = repo.tags_api_url(&job.endpoints.api_base);
                    job.repo = Some(repo);
                    job.stage = RepoStage::FetchingTags;
                    vec![RepoEffect::FetchTagPage { url }]
                }
                None => {
                    job.stage = RepoStage::SkippedUnresolved;
                    vec![RepoEffect::Finished]
                }
            }
        }
        (RepoStage::FetchingTags, RepoMsg::TagPageLoaded { archive_urls, next }) => {
            if archive_urls.is_empty() {
                fetch_default_branch(&mut job)
            } else {
                job.queued = archive_urls.into();
                job.next_page = next;
                download_next_tag(&mut job)
            }
        }
        (RepoStage::FetchingTags, RepoMsg::TagPageFailed) => fetch_default_branch(&mut job),
        (
            RepoStage::DownloadingArtifact,
            RepoMsg::ArtifactFinished {
                kind: ArtifactKind::Tag,
                obtained,
            },
        ) => {
            if obtained {
                job.record.tags = Some(true);
            }
            download_next_tag(&mut job)
        }
        (
            RepoStage::FetchingDefaultBranch,
            RepoMsg::ArtifactFinished {
                kind: ArtifactKind::DefaultBranch,
                obtained,
            },
        ) => {
            if obtained {
                job.record.master = Some(true);
            }
            job.stage = RepoStage::Done;
            vec![RepoEffect::Finished]
        }
        _ => Vec::new(),
    };

    (job, effects)
}

fn download_next_tag(job: &mut RepoJob) -> Vec<RepoEffect> {
    if let Some(url) = job.queued.pop_front() {
        job.stage = RepoStage::DownloadingArtifact;
        return vec![RepoEffect::Download {
            url,
            kind: ArtifactKind::Tag,
        }];
    }
    match job.next_page.take() {
        Some(url) => {
            job.stage = RepoStage::FetchingTags;
            vec![RepoEffect::FetchTagPage { url }]
        }
        None => fetch_default_branch(job),
    }
}

fn fetch_default_branch(job: &mut RepoJob) -> Vec<RepoEffect> {
    job.queued.clear();
    job.next_page = None;
    let Some(repo) = job.repo.as_ref() else {
        job.stage = RepoStage::Done;
        return vec![RepoEffect::Finished];
    };
    let url = repo.default_branch_archive_url(&job.endpoints.archive_base);
    job.stage = RepoStage::FetchingDefaultBranch;
    vec![RepoEffect::Download {
        url,
        kind: ArtifactKind::DefaultBranch,
    }]
}
