use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use mirror_core::{MirrorStatus, PluginRecord};
use mirror_engine::{
    read_rows, CrawlError, CrawlOptions, CrawlSummary, Crawler, CsvRowWriter, FetchSettings,
    ListingError, PipelineConfig, PipelineEvent, PluginMirrorParser, ProgressSink, ReqwestFetcher,
};
use pretty_assertions::assert_eq;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Default)]
struct TestSink {
    events: Arc<Mutex<Vec<PipelineEvent>>>,
}

impl TestSink {
    fn take(&self) -> Vec<PipelineEvent> {
        self.events.lock().unwrap().drain(..).collect()
    }
}

impl ProgressSink for TestSink {
    fn emit(&self, event: PipelineEvent) {
        self.events.lock().unwrap().push(event);
    }
}

fn listing_html(total_pages: u32, rows: &[(&str, &str)]) -> String {
    let rows: String = rows
        .iter()
        .map(|(slug, mirror)| {
            format!(
                r#"<div class="row">
                     <div class="large-9 columns"><a href="/plugins/{slug}">{slug}</a></div>
                     <div class="large-3 columns"><a class="button" href="{mirror}">Mirror</a></div>
                   </div>"#
            )
        })
        .collect();
    format!(
        r#"<html><body><div class="large-9 columns">{rows}
           <ul class="pagination"><li>&laquo;</li><li>1</li><li>{total_pages}</li><li>&raquo;</li></ul>
           </div></body></html>"#
    )
}

fn config(server: &MockServer, dir: &Path) -> PipelineConfig {
    engine_logging::initialize_for_tests();
    let mut config = PipelineConfig::with_data_dir(dir);
    config.site_root = server.uri();
    config.request_interval = Duration::ZERO;
    config.rate_limit_backoff = Duration::ZERO;
    config.fetch = FetchSettings {
        request_timeout: Duration::from_secs(5),
        ..FetchSettings::default()
    };
    config
}

async fn mount_page(server: &MockServer, page: u32, html: String) {
    Mock::given(method("GET"))
        .and(path("/plugins"))
        .and(query_param("page", page.to_string()))
        .and(query_param("sort", "created"))
        .and(query_param("direction", "asc"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(html, "text/html; charset=utf-8"))
        .mount(server)
        .await;
}

/// The listing root matches every `/plugins` request, so it is mounted with
/// the lowest priority.
async fn mount_root(server: &MockServer, total_pages: u32) {
    Mock::given(method("GET"))
        .and(path("/plugins"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(listing_html(total_pages, &[]), "text/html; charset=utf-8"),
        )
        .with_priority(10)
        .mount(server)
        .await;
}

async fn crawl(
    config: &PipelineConfig,
    options: CrawlOptions,
) -> Result<(CrawlSummary, Vec<PipelineEvent>), CrawlError> {
    let fetcher = ReqwestFetcher::new(config.fetch.clone()).unwrap();
    let parser = PluginMirrorParser::new(&config.site_root).unwrap();
    let sink = TestSink::default();
    let summary = Crawler::new(config, &fetcher, &parser, &sink).run(options).await?;
    Ok((summary, sink.take()))
}

#[tokio::test]
async fn fresh_crawl_writes_every_row_in_page_order() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        1,
        listing_html(
            2,
            &[
                ("widget", "https://github.com/acme/widget"),
                ("gadget", "javascript:void(0)"),
            ],
        ),
    )
    .await;
    mount_page(&server, 2, listing_html(2, &[("gizmo", "https://github.com/acme/gizmo")])).await;
    mount_root(&server, 2).await;

    let temp = TempDir::new().unwrap();
    let config = config(&server, temp.path());
    let options = CrawlOptions {
        use_cache: false,
        start_page: 1,
    };
    let (summary, events) = crawl(&config, options).await.expect("crawl ok");

    assert_eq!(summary.total_pages, 2);
    assert_eq!(summary.pages_visited, 2);
    assert_eq!(summary.new_rows, 3);
    assert_eq!(summary.carried_rows, 0);
    assert_eq!(
        events,
        vec![
            PipelineEvent::PageScraped { page: 1, new_rows: 2 },
            PipelineEvent::PageScraped { page: 2, new_rows: 1 },
        ]
    );

    let text = fs::read_to_string(&config.listing_csv).unwrap();
    let root = server.uri();
    assert_eq!(
        text,
        format!(
            "plugin_name,plugin_page,mirror_status,repository_url\n\
             widget,{root}/plugins/widget,ok,https://github.com/acme/widget\n\
             gadget,{root}/plugins/gadget,ko,\n\
             gizmo,{root}/plugins/gizmo,ok,https://github.com/acme/gizmo\n"
        )
    );
}

#[tokio::test]
async fn resumed_crawl_carries_previous_rows_without_duplicates() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        1,
        listing_html(
            1,
            &[
                ("widget", "https://github.com/acme/widget"),
                ("gadget", "javascript:void(0)"),
            ],
        ),
    )
    .await;
    mount_root(&server, 1).await;

    let temp = TempDir::new().unwrap();
    let config = config(&server, temp.path());
    let previous = PluginRecord {
        plugin_name: "widget (old name)".to_string(),
        plugin_page: format!("{}/plugins/widget", server.uri()),
        mirror_status: MirrorStatus::Ok,
        repository_url: Some("https://github.com/acme/widget".to_string()),
    };
    let mut writer = CsvRowWriter::create(&config.listing_csv, &PluginRecord::HEADER).unwrap();
    writer.write(&previous).unwrap();
    drop(writer);

    let (summary, _) = crawl(&config, CrawlOptions::default()).await.expect("crawl ok");
    assert_eq!(summary.carried_rows, 1);
    assert_eq!(summary.new_rows, 1);

    let rows: Vec<PluginRecord> = read_rows(&config.listing_csv).unwrap();
    assert_eq!(rows[0], previous);
    assert_eq!(rows.len(), 2);
    let unique: HashSet<_> = rows.iter().map(|r| r.plugin_page.as_str()).collect();
    assert_eq!(unique.len(), rows.len());

    // A second identical run keeps the same row set.
    crawl(&config, CrawlOptions::default()).await.expect("second crawl ok");
    let again: Vec<PluginRecord> = read_rows(&config.listing_csv).unwrap();
    assert_eq!(again, rows);
}

#[tokio::test]
async fn rate_limited_page_is_retried_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/plugins"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    mount_page(&server, 1, listing_html(1, &[("widget", "javascript:void(0)")])).await;
    mount_root(&server, 1).await;

    let temp = TempDir::new().unwrap();
    let config = config(&server, temp.path());
    let (summary, _) = crawl(&config, CrawlOptions::default()).await.expect("crawl ok");
    assert_eq!(summary.new_rows, 1);

    let rows: Vec<PluginRecord> = read_rows(&config.listing_csv).unwrap();
    assert_eq!(rows[0].mirror_status, MirrorStatus::Ko);
    assert_eq!(rows[0].repository_url, None);
}

#[tokio::test]
async fn second_rate_limit_aborts_the_crawl() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/plugins"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(429))
        .expect(2)
        .mount(&server)
        .await;
    mount_root(&server, 1).await;

    let temp = TempDir::new().unwrap();
    let config = config(&server, temp.path());
    let err = crawl(&config, CrawlOptions::default()).await.unwrap_err();
    assert!(matches!(err, CrawlError::RateLimited { .. }), "{err:?}");
}

#[tokio::test]
async fn other_error_status_aborts_without_retry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/plugins"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;
    mount_root(&server, 1).await;

    let temp = TempDir::new().unwrap();
    let config = config(&server, temp.path());
    let err = crawl(&config, CrawlOptions::default()).await.unwrap_err();
    assert!(
        matches!(err, CrawlError::HttpStatus { status: 500, .. }),
        "{err:?}"
    );
}

#[tokio::test]
async fn skipped_page_is_never_requested() {
    let server = MockServer::start().await;
    mount_page(&server, 1, listing_html(3, &[("widget", "javascript:void(0)")])).await;
    Mock::given(method("GET"))
        .and(path("/plugins"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;
    mount_page(&server, 3, listing_html(3, &[("gizmo", "javascript:void(0)")])).await;
    mount_root(&server, 3).await;

    let temp = TempDir::new().unwrap();
    let mut config = config(&server, temp.path());
    config.skipped_pages = vec![2];
    let (summary, events) = crawl(&config, CrawlOptions::default()).await.expect("crawl ok");

    assert_eq!(summary.pages_visited, 3);
    assert_eq!(summary.new_rows, 2);
    assert!(events.contains(&PipelineEvent::PageSkipped { page: 2 }));
}

#[tokio::test]
async fn start_page_skips_earlier_pages() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/plugins"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;
    mount_page(&server, 2, listing_html(2, &[("gizmo", "javascript:void(0)")])).await;
    mount_root(&server, 2).await;

    let temp = TempDir::new().unwrap();
    let config = config(&server, temp.path());
    let options = CrawlOptions {
        use_cache: true,
        start_page: 2,
    };
    let (summary, _) = crawl(&config, options).await.expect("crawl ok");
    assert_eq!(summary.pages_visited, 1);
}

#[tokio::test]
async fn missing_pagination_fails_before_touching_previous_output() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/plugins"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<html></html>", "text/html"))
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    let config = config(&server, temp.path());
    fs::write(
        &config.listing_csv,
        "plugin_name,plugin_page,mirror_status,repository_url\nw,http://p/w,ko,\n",
    )
    .unwrap();

    let err = crawl(&config, CrawlOptions::default()).await.unwrap_err();
    assert!(
        matches!(
            err,
            CrawlError::Listing {
                source: ListingError::MissingPagination,
                ..
            }
        ),
        "{err:?}"
    );
    assert_eq!(
        fs::read_to_string(&config.listing_csv).unwrap(),
        "plugin_name,plugin_page,mirror_status,repository_url\nw,http://p/w,ko,\n"
    );
}
