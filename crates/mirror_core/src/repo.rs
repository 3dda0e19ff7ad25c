use std::fmt;
use std::path::{Path, PathBuf};

use url::Url;

/// Owner/repository pair resolved from a repository URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRef {
    pub owner: String,
    pub repo: String,
}

impl RepoRef {
    /// Resolve `https://<host>/<owner>/<repo>[/...]`.
    ///
    /// Anything else (other scheme, other host, explicit port, fewer than two
    /// path segments) yields `None`.
    pub fn parse(repository_url: &str, host: &str) -> Option<Self> {
        let url = Url::parse(repository_url.trim()).ok()?;
        if url.scheme() != "https" || url.port().is_some() {
            return None;
        }
        if !url.host_str()?.eq_ignore_ascii_case(host) {
            return None;
        }
        let mut segments = url.path_segments()?;
        let owner = segments.next().filter(|s| !s.is_empty())?;
        let repo = segments.next().filter(|s| !s.is_empty())?;
        Some(Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
        })
    }

    /// First page of the tag-listing API.
    pub fn tags_api_url(&self, api_base: &str) -> String {
        format!(
            "{}/repos/{}/{}/tags",
            api_base.trim_end_matches('/'),
            self.owner,
            self.repo
        )
    }

    /// Archive of the default branch, always addressed as `master`.
    pub fn default_branch_archive_url(&self, archive_base: &str) -> String {
        format!(
            "{}/{}/{}/archive/master.zip",
            archive_base.trim_end_matches('/'),
            self.owner,
            self.repo
        )
    }

    /// Directory holding every archive of this repository.
    pub fn archive_dir(&self, root: &Path) -> PathBuf {
        root.join(&self.owner).join(&self.repo)
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}
