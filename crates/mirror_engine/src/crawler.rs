use engine_logging::{engine_info, engine_warn};
use mirror_core::{PluginRecord, SeenPages};
use thiserror::Error;

use crate::listing::{ListingError, ListingParser};
use crate::persist::{read_rows, CsvRowWriter, PersistError};
use crate::{FetchError, Fetcher, PipelineConfig, PipelineEvent, ProgressSink};

const TOO_MANY_REQUESTS: u16 = 429;

#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("fetching {url} failed: {source}")]
    Fetch {
        url: String,
        #[source]
        source: FetchError,
    },
    #[error("{url} answered with status {status}")]
    HttpStatus { url: String, status: u16 },
    #[error("{url} is still rate limited after backing off")]
    RateLimited { url: String },
    #[error("unreadable listing at {url}: {source}")]
    Listing {
        url: String,
        #[source]
        source: ListingError,
    },
    #[error(transparent)]
    Persist(#[from] PersistError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrawlOptions {
    /// Reuse rows from the previous listing CSV and skip their plugin pages.
    pub use_cache: bool,
    pub start_page: u32,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            use_cache: true,
            start_page: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CrawlSummary {
    pub total_pages: u32,
    pub pages_visited: usize,
    pub carried_rows: usize,
    pub new_rows: usize,
}

/// Walks the plugin directory listing and writes the listing CSV.
pub struct Crawler<'a> {
    config: &'a PipelineConfig,
    fetcher: &'a dyn Fetcher,
    parser: &'a dyn ListingParser,
    sink: &'a dyn ProgressSink,
}

impl<'a> Crawler<'a> {
    pub fn new(
        config: &'a PipelineConfig,
        fetcher: &'a dyn Fetcher,
        parser: &'a dyn ListingParser,
        sink: &'a dyn ProgressSink,
    ) -> Self {
        Self {
            config,
            fetcher,
            parser,
            sink,
        }
    }

    pub async fn run(&self, options: CrawlOptions) -> Result<CrawlSummary, CrawlError> {
        let previous: Vec<PluginRecord> = if options.use_cache {
            read_rows(&self.config.listing_csv)?
        } else {
            Vec::new()
        };
        let mut seen = SeenPages::from_records(&previous);

        // Discover the page count before truncating the previous output.
        let total_pages = self.total_pages().await?;
        engine_info!(
            "Crawling listing pages {}..={} ({} cached plugin pages)",
            options.start_page,
            total_pages,
            seen.len()
        );

        let mut writer = CsvRowWriter::create(&self.config.listing_csv, &PluginRecord::HEADER)?;
        writer.write_all(&previous)?;

        let mut summary = CrawlSummary {
            total_pages,
            carried_rows: previous.len(),
            ..CrawlSummary::default()
        };

        for page in options.start_page.max(1)..=total_pages {
            summary.pages_visited += 1;
            if summary.pages_visited % self.config.crawl_progress_every.max(1) == 0 {
                engine_info!("processed {} plugin mirror pages", summary.pages_visited);
            }
            if self.config.skipped_pages.contains(&page) {
                engine_warn!("skipping listing page {} (known broken markup)", page);
                self.sink.emit(PipelineEvent::PageSkipped { page });
                continue;
            }

            let rows = self.scrape_page(page, &seen).await?;
            let mut new_rows = 0;
            for row in rows {
                if seen.insert(row.plugin_page.clone()) {
                    writer.write(&row)?;
                    new_rows += 1;
                }
            }
            summary.new_rows += new_rows;
            self.sink.emit(PipelineEvent::PageScraped { page, new_rows });

            tokio::time::sleep(self.config.request_interval).await;
        }

        engine_info!(
            "Crawl finished: {} pages visited, {} new rows, {} carried rows",
            summary.pages_visited,
            summary.new_rows,
            summary.carried_rows
        );
        Ok(summary)
    }

    /// Highest page number of the listing. Any failure here is fatal.
    pub async fn total_pages(&self) -> Result<u32, CrawlError> {
        let url = self.config.listing_root();
        let html = self.fetch_listing(&url).await?;
        self.parser
            .total_pages(&html)
            .map_err(|source| CrawlError::Listing { url, source })
    }

    /// Rows of one listing page whose plugin page is not in `seen`.
    pub async fn scrape_page(
        &self,
        page: u32,
        seen: &SeenPages,
    ) -> Result<Vec<PluginRecord>, CrawlError> {
        let url = self.config.listing_page_url(page);
        let html = self.fetch_listing(&url).await?;
        let rows = self
            .parser
            .plugin_rows(&html)
            .map_err(|source| CrawlError::Listing { url, source })?;
        Ok(rows
            .into_iter()
            .filter(|row| !seen.contains(&row.plugin_page))
            .collect())
    }

    /// GET a listing page. A 429 is retried once after the configured backoff;
    /// the site sends no Retry-After.
    async fn fetch_listing(&self, url: &str) -> Result<String, CrawlError> {
        let mut response = self.get(url).await?;
        if response.status == TOO_MANY_REQUESTS {
            engine_warn!(
                "rate limited on {}, retrying in {:?}",
                url,
                self.config.rate_limit_backoff
            );
            tokio::time::sleep(self.config.rate_limit_backoff).await;
            response = self.get(url).await?;
        }
        match response.status {
            200 => Ok(response.body),
            TOO_MANY_REQUESTS => Err(CrawlError::RateLimited {
                url: url.to_string(),
            }),
            status => Err(CrawlError::HttpStatus {
                url: url.to_string(),
                status,
            }),
        }
    }

    async fn get(&self, url: &str) -> Result<crate::FetchResponse, CrawlError> {
        self.fetcher
            .get(url, None)
            .await
            .map_err(|source| CrawlError::Fetch {
                url: url.to_string(),
                source,
            })
    }
}
