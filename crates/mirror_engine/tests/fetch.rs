use std::fs;
use std::time::Duration;

use mirror_engine::{decode_body, FailureKind, FetchSettings, Fetcher, ReqwestFetcher};
use pretty_assertions::assert_eq;
use tempfile::TempDir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fetcher(settings: FetchSettings) -> ReqwestFetcher {
    engine_logging::initialize_for_tests();
    ReqwestFetcher::new(settings).expect("client")
}

#[tokio::test]
async fn get_sends_token_and_returns_link_header() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/widget/tags"))
        .and(header("authorization", "token secret"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("link", "<http://next>; rel=\"next\"")
                .set_body_raw("[]", "application/json; charset=utf-8"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let url = format!("{}/repos/acme/widget/tags", server.uri());
    let response = fetcher(FetchSettings::default())
        .get(&url, Some("secret"))
        .await
        .expect("fetch ok");

    assert_eq!(response.status, 200);
    assert!(response.is_ok());
    assert_eq!(response.link.as_deref(), Some("<http://next>; rel=\"next\""));
    assert_eq!(response.body, "[]");
}

#[tokio::test]
async fn get_reports_error_statuses_as_data() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/busy"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let url = format!("{}/busy", server.uri());
    let response = fetcher(FetchSettings::default())
        .get(&url, None)
        .await
        .expect("status is not an error");
    assert_eq!(response.status, 429);
    assert!(!response.is_ok());
}

#[tokio::test]
async fn get_rejects_too_large_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/large"))
        .respond_with(ResponseTemplate::new(200).set_body_string("01234567890"))
        .mount(&server)
        .await;

    let settings = FetchSettings {
        max_bytes: 10,
        ..FetchSettings::default()
    };
    let url = format!("{}/large", server.uri());
    let err = fetcher(settings).get(&url, None).await.unwrap_err();
    assert_eq!(
        err.kind,
        FailureKind::TooLarge {
            max_bytes: 10,
            actual: Some(11)
        }
    );
}

#[tokio::test]
async fn get_times_out_on_slow_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(250))
                .set_body_string("slow"),
        )
        .mount(&server)
        .await;

    let settings = FetchSettings {
        request_timeout: Duration::from_millis(50),
        ..FetchSettings::default()
    };
    let url = format!("{}/slow", server.uri());
    let err = fetcher(settings).get(&url, None).await.unwrap_err();
    assert_eq!(err.kind, FailureKind::Timeout);
}

#[tokio::test]
async fn get_rejects_invalid_url() {
    let err = fetcher(FetchSettings::default())
        .get("not a url", None)
        .await
        .unwrap_err();
    assert_eq!(err.kind, FailureKind::InvalidUrl);
}

#[tokio::test]
async fn download_streams_body_to_destination() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/acme/widget/archive/master.zip"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"PK\x03\x04data".to_vec()))
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    let dest = temp.path().join("master.zip");
    let url = format!("{}/acme/widget/archive/master.zip", server.uri());

    let bytes = fetcher(FetchSettings::default())
        .download(&url, &dest)
        .await
        .expect("download ok");
    assert_eq!(bytes, 8);
    assert_eq!(fs::read(&dest).unwrap(), b"PK\x03\x04data");
}

#[tokio::test]
async fn download_is_bounded_by_download_timeout_not_request_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/big.zip"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(250))
                .set_body_bytes(b"PK\x03\x04slow".to_vec()),
        )
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    let url = format!("{}/big.zip", server.uri());
    let settings = FetchSettings {
        request_timeout: Duration::from_millis(50),
        download_timeout: Duration::from_secs(5),
        ..FetchSettings::default()
    };
    let client = fetcher(settings);

    let dest = temp.path().join("big.zip");
    let bytes = client.download(&url, &dest).await.expect("download ok");
    assert_eq!(bytes, 8);
    assert_eq!(fs::read(&dest).unwrap(), b"PK\x03\x04slow");

    let short = FetchSettings {
        download_timeout: Duration::from_millis(50),
        ..FetchSettings::default()
    };
    let other = temp.path().join("other.zip");
    let err = fetcher(short).download(&url, &other).await.unwrap_err();
    assert_eq!(err.kind, FailureKind::Timeout);
    assert!(!other.exists());
}

#[tokio::test]
async fn failed_download_leaves_no_file() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing.zip"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    let dest = temp.path().join("missing.zip");
    let url = format!("{}/missing.zip", server.uri());

    let err = fetcher(FetchSettings::default())
        .download(&url, &dest)
        .await
        .unwrap_err();
    assert_eq!(err.kind, FailureKind::HttpStatus(404));
    assert!(!dest.exists());
    assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 0);
}

#[test]
fn decode_respects_declared_charset() {
    let decoded = decode_body(b"caf\xe9", Some("text/html; charset=ISO-8859-1"));
    assert_eq!(decoded, "café");
}

#[test]
fn decode_strips_utf8_bom_and_defaults_to_utf8() {
    assert_eq!(decode_body(b"\xEF\xBB\xBFhello", None), "hello");
    assert_eq!(decode_body("plain ü".as_bytes(), Some("text/html")), "plain ü");
}
