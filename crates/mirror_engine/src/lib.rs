//! Pluginmirror engine: HTTP, HTML and CSV IO plus the crawl and archive jobs.
mod archiver;
mod config;
mod crawler;
mod decode;
mod fetch;
mod listing;
mod persist;
mod types;

pub use archiver::{download_archive, ArchiveError, ArchiveOptions, ArchiveSummary, Archiver};
pub use config::{PipelineConfig, ARCHIVE_FILE, LISTING_FILE};
pub use crawler::{CrawlError, CrawlOptions, CrawlSummary, Crawler};
pub use decode::decode_body;
pub use fetch::{FetchSettings, Fetcher, LogProgressSink, ProgressSink, ReqwestFetcher};
pub use listing::{ListingError, ListingParser, PluginMirrorParser};
pub use persist::{ensure_output_dir, read_rows, CsvRowWriter, PersistError};
pub use types::{DownloadOutcome, FailureKind, FetchError, FetchResponse, PipelineEvent};
