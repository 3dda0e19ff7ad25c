//! Command-line entry point: `pluginmirror crawl` and `pluginmirror archive`.

mod logging;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use engine_logging::{engine_info, engine_warn};
use mirror_engine::{
    ArchiveOptions, Archiver, CrawlOptions, Crawler, LogProgressSink, PipelineConfig,
    PluginMirrorParser, ReqwestFetcher,
};

const TOKEN_VAR: &str = "GITHUB_TOKEN";

/// Scrape the pluginmirror.com directory and archive the mirrored repositories.
#[derive(Debug, Parser)]
#[command(name = "pluginmirror")]
#[command(about = "Scrape http://www.pluginmirror.com/plugins and archive mirrored repositories", long_about = None)]
pub struct Cli {
    /// Directory holding the CSV files and downloaded archives.
    #[arg(long, global = true, default_value = "data", value_name = "DIR")]
    pub data_dir: PathBuf,

    /// Log debug output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Also write the log to this file.
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Crawl the plugin listing into the listing CSV.
    Crawl {
        /// Ignore the previous listing CSV and start fresh.
        #[arg(long)]
        no_cache: bool,
        /// The starting page.
        #[arg(short, long, default_value_t = 1)]
        start: u32,
    },

    /// Download tag and default-branch archives for every listed repository.
    Archive {
        /// The starting row of the listing CSV.
        #[arg(short, long, default_value_t = 0)]
        start: usize,
    },
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    logging::initialize(cli.verbose, cli.log_file.as_deref());

    let config = build_config(&cli, std::env::var(TOKEN_VAR).ok());
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    runtime.block_on(execute(&cli.command, &config))
}

pub(crate) fn build_config(cli: &Cli, token: Option<String>) -> PipelineConfig {
    let mut config = PipelineConfig::with_data_dir(&cli.data_dir);
    config.github_token = token.filter(|value| !value.trim().is_empty());
    config
}

async fn execute(command: &CliCommand, config: &PipelineConfig) -> Result<()> {
    let fetcher = ReqwestFetcher::new(config.fetch.clone()).context("failed to build HTTP client")?;
    let sink = LogProgressSink;

    match *command {
        CliCommand::Crawl { no_cache, start } => {
            let parser = PluginMirrorParser::new(&config.site_root)?;
            let options = CrawlOptions {
                use_cache: !no_cache,
                start_page: start,
            };
            let summary = Crawler::new(config, &fetcher, &parser, &sink)
                .run(options)
                .await
                .context("crawl aborted")?;
            engine_info!(
                "Wrote {} rows to {:?}",
                summary.carried_rows + summary.new_rows,
                config.listing_csv
            );
        }
        CliCommand::Archive { start } => {
            if config.github_token.is_none() {
                engine_warn!("{} is not set; tag API calls are unauthenticated", TOKEN_VAR);
            }
            let summary = Archiver::new(config, &fetcher, &sink)
                .run(ArchiveOptions { start })
                .await
                .context("archive aborted")?;
            engine_info!(
                "Wrote {} rows to {:?}",
                summary.rows_written,
                config.archive_csv
            );
        }
    }
    Ok(())
}
