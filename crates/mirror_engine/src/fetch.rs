use std::fs;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use engine_logging::engine_debug;
use futures_util::StreamExt;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, LINK};
use tempfile::NamedTempFile;

use crate::decode::decode_body;
use crate::{FailureKind, FetchError, FetchResponse, PipelineEvent};

#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub connect_timeout: Duration,
    /// Whole-request limit for listing pages and API calls.
    pub request_timeout: Duration,
    /// Whole-request limit for archive downloads.
    pub download_timeout: Duration,
    pub redirect_limit: usize,
    /// Upper bound for listing pages and API bodies. Archives are not capped.
    pub max_bytes: u64,
    pub user_agent: String,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(300),
            download_timeout: Duration::from_secs(3600),
            redirect_limit: 10,
            max_bytes: 5 * 1024 * 1024,
            user_agent: concat!("pluginmirror-harvester/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: PipelineEvent);
}

/// Sink that reports events at debug level.
#[derive(Debug, Default)]
pub struct LogProgressSink;

impl ProgressSink for LogProgressSink {
    fn emit(&self, event: PipelineEvent) {
        engine_debug!("{:?}", event);
    }
}

#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    /// GET `url`, sending `Authorization: token <auth>` when given.
    async fn get(&self, url: &str, auth: Option<&str>) -> Result<FetchResponse, FetchError>;

    /// Stream `url` into `dest`. The file only appears once the body is complete.
    async fn download(&self, url: &str, dest: &Path) -> Result<u64, FetchError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    client: reqwest::Client,
    settings: FetchSettings,
}

impl ReqwestFetcher {
    pub fn new(settings: FetchSettings) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .redirect(reqwest::redirect::Policy::limited(settings.redirect_limit))
            .user_agent(settings.user_agent.clone())
            .build()
            .map_err(|err| FetchError::new(FailureKind::Network, err.to_string()))?;
        Ok(Self { client, settings })
    }
}

#[async_trait::async_trait]
impl Fetcher for ReqwestFetcher {
    async fn get(&self, url: &str, auth: Option<&str>) -> Result<FetchResponse, FetchError> {
        let parsed = reqwest::Url::parse(url)
            .map_err(|err| FetchError::new(FailureKind::InvalidUrl, err.to_string()))?;

        let mut request = self
            .client
            .get(parsed)
            .timeout(self.settings.request_timeout);
        if let Some(token) = auth {
            request = request.header(AUTHORIZATION, format!("token {token}"));
        }
        let response = request.send().await.map_err(map_reqwest_error)?;

        let status = response.status().as_u16();
        let link = header_string(&response, LINK);
        let content_type = header_string(&response, CONTENT_TYPE);

        if let Some(content_len) = response.content_length() {
            if content_len > self.settings.max_bytes {
                return Err(too_large(self.settings.max_bytes, content_len));
            }
        }

        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            let next_len = bytes.len() as u64 + chunk.len() as u64;
            if next_len > self.settings.max_bytes {
                return Err(too_large(self.settings.max_bytes, next_len));
            }
            bytes.extend_from_slice(&chunk);
        }

        engine_debug!("GET {} -> {} ({} bytes)", url, status, bytes.len());
        let body = decode_body(&bytes, content_type.as_deref());
        Ok(FetchResponse { status, link, body })
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<u64, FetchError> {
        let parsed = reqwest::Url::parse(url)
            .map_err(|err| FetchError::new(FailureKind::InvalidUrl, err.to_string()))?;
        let dir = dest
            .parent()
            .ok_or_else(|| FetchError::new(FailureKind::Io, "destination has no parent"))?;

        let response = self
            .client
            .get(parsed)
            .timeout(self.settings.download_timeout)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if status.as_u16() != 200 {
            return Err(FetchError::new(
                FailureKind::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }

        let mut tmp = NamedTempFile::new_in(dir).map_err(map_io_error)?;
        let mut written: u64 = 0;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            tmp.write_all(&chunk).map_err(map_io_error)?;
            written += chunk.len() as u64;
        }
        tmp.flush().map_err(map_io_error)?;

        if dest.exists() {
            fs::remove_file(dest).map_err(map_io_error)?;
        }
        tmp.persist(dest).map_err(|err| map_io_error(err.error))?;
        engine_debug!("saved {} ({} bytes) to {:?}", url, written, dest);
        Ok(written)
    }
}

fn header_string(
    response: &reqwest::Response,
    name: reqwest::header::HeaderName,
) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string())
}

fn too_large(max_bytes: u64, actual: u64) -> FetchError {
    FetchError::new(
        FailureKind::TooLarge {
            max_bytes,
            actual: Some(actual),
        },
        "response too large",
    )
}

fn map_io_error(err: std::io::Error) -> FetchError {
    FetchError::new(FailureKind::Io, err.to_string())
}

fn map_reqwest_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        return FetchError::new(FailureKind::Timeout, err.to_string());
    }
    if err.is_redirect() {
        return FetchError::new(FailureKind::RedirectLimitExceeded, err.to_string());
    }
    FetchError::new(FailureKind::Network, err.to_string())
}
