use std::path::{Path, PathBuf};
use std::time::Duration;

use mirror_core::Endpoints;

use crate::FetchSettings;

pub const LISTING_FILE: &str = "pluginmirror_list.csv";
pub const ARCHIVE_FILE: &str = "pluginmirror_list_download.csv";

/// Everything both jobs need, assembled once by the caller.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Origin of the plugin directory, e.g. `http://www.pluginmirror.com`.
    pub site_root: String,
    pub api_base: String,
    pub archive_base: String,
    /// Host whose repository URLs are archived.
    pub repository_host: String,
    pub github_token: Option<String>,
    /// Crawler output, archiver input.
    pub listing_csv: PathBuf,
    pub archive_csv: PathBuf,
    /// Archives land in `<archive_root>/<owner>/<repo>/`.
    pub archive_root: PathBuf,
    /// Pause between listing pages and after each repository.
    pub request_interval: Duration,
    /// Wait before the single retry of a rate-limited listing page.
    pub rate_limit_backoff: Duration,
    /// Listing pages never fetched (known broken markup on the live site).
    pub skipped_pages: Vec<u32>,
    pub crawl_progress_every: usize,
    pub archive_progress_every: usize,
    pub fetch: FetchSettings,
}

impl PipelineConfig {
    pub fn with_data_dir(data_dir: impl AsRef<Path>) -> Self {
        let data_dir = data_dir.as_ref();
        Self {
            site_root: "http://www.pluginmirror.com".to_string(),
            api_base: "https://api.github.com".to_string(),
            archive_base: "https://github.com".to_string(),
            repository_host: "github.com".to_string(),
            github_token: None,
            listing_csv: data_dir.join(LISTING_FILE),
            archive_csv: data_dir.join(ARCHIVE_FILE),
            archive_root: data_dir.to_path_buf(),
            request_interval: Duration::from_millis(1100),
            rate_limit_backoff: Duration::from_secs(5 * 60),
            skipped_pages: vec![2344],
            crawl_progress_every: 100,
            archive_progress_every: 50,
            fetch: FetchSettings::default(),
        }
    }

    pub fn listing_root(&self) -> String {
        format!("{}/plugins", self.site_root.trim_end_matches('/'))
    }

    /// Listing page `page`, oldest plugins first.
    pub fn listing_page_url(&self, page: u32) -> String {
        format!(
            "{}?page={page}&sort=created&direction=asc",
            self.listing_root()
        )
    }

    pub fn endpoints(&self) -> Endpoints {
        Endpoints {
            repository_host: self.repository_host.clone(),
            api_base: self.api_base.clone(),
            archive_base: self.archive_base.clone(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::with_data_dir("data")
    }
}
