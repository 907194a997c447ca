use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, USER_AGENT};
use url::Url;
use url2md_logging::{conv_debug, conv_warn};

use crate::{ConversionError, FailureKind, FetchMetadata, FetchOutput};

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (compatible; MCP-URL-Converter/1.0)";
const DEFAULT_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
const DEFAULT_ACCEPT_LANGUAGE: &str = "en-US,en;q=0.5";

#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub connect_timeout: Duration,
    /// Hard wall-clock bound on the whole fetch, body included.
    pub request_timeout: Duration,
    pub redirect_limit: usize,
    pub max_bytes: u64,
    /// A response without a Content-Type header is always accepted.
    pub allowed_content_types: Vec<String>,
    pub user_agent: String,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            redirect_limit: 5,
            max_bytes: 5 * 1024 * 1024,
            allowed_content_types: [
                "text/html",
                "application/xhtml+xml",
                "application/xml",
                "text/xml",
                "text/plain",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchOutput, ConversionError>;
}

/// Parses `url` and accepts only absolute http/https addresses.
pub fn validate_url(url: &str) -> Result<Url, ConversionError> {
    let parsed = Url::parse(url.trim())
        .map_err(|err| ConversionError::new(FailureKind::InvalidUrl, format!("Invalid URL: {err}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        _ => Err(ConversionError::new(
            FailureKind::InvalidUrl,
            "Only HTTP and HTTPS URLs are supported",
        )),
    }
}

#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    settings: FetchSettings,
}

impl Default for ReqwestFetcher {
    fn default() -> Self {
        Self::new(FetchSettings::default())
    }
}

impl ReqwestFetcher {
    pub fn new(settings: FetchSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &FetchSettings {
        &self.settings
    }

    fn build_client(
        &self,
        redirect_counter: Arc<AtomicUsize>,
    ) -> Result<reqwest::Client, ConversionError> {
        let redirect_limit = self.settings.redirect_limit;
        let policy = reqwest::redirect::Policy::custom(move |attempt| {
            let count = attempt.previous().len();
            redirect_counter.store(count, Ordering::Relaxed);
            if count > redirect_limit {
                attempt.error("redirect limit exceeded")
            } else {
                attempt.follow()
            }
        });

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(DEFAULT_ACCEPT));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static(DEFAULT_ACCEPT_LANGUAGE));
        let user_agent = HeaderValue::from_str(&self.settings.user_agent)
            .unwrap_or_else(|_| HeaderValue::from_static(DEFAULT_USER_AGENT));
        headers.insert(USER_AGENT, user_agent);

        reqwest::Client::builder()
            .connect_timeout(self.settings.connect_timeout)
            .timeout(self.settings.request_timeout)
            .default_headers(headers)
            .redirect(policy)
            .build()
            .map_err(|err| ConversionError::new(FailureKind::Network, err.to_string()))
    }

    fn is_content_type_allowed(&self, content_type: &str) -> bool {
        let ct = content_type.split(';').next().unwrap_or(content_type).trim();
        self.settings
            .allowed_content_types
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(ct))
    }

    async fn fetch_inner(&self, url: Url) -> Result<FetchOutput, ConversionError> {
        let original_url = url.to_string();
        let redirect_counter = Arc::new(AtomicUsize::new(0));
        let client = self.build_client(redirect_counter.clone())?;

        let response = client.get(url).send().await.map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            let reason = status.canonical_reason().unwrap_or("Unknown Status");
            return Err(ConversionError::new(
                FailureKind::HttpStatus(status.as_u16()),
                format!("HTTP {}: {}", status.as_u16(), reason),
            ));
        }

        if let Some(content_len) = response.content_length() {
            if content_len > self.settings.max_bytes {
                return Err(too_large(self.settings.max_bytes, content_len));
            }
        }

        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        if let Some(ct) = content_type.as_deref() {
            if !self.is_content_type_allowed(ct) {
                return Err(ConversionError::new(
                    FailureKind::UnsupportedContentType {
                        content_type: ct.to_string(),
                    },
                    format!("Unsupported content type: {ct}"),
                ));
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

        let metadata = FetchMetadata {
            original_url,
            final_url,
            redirect_count: redirect_counter.load(Ordering::Relaxed),
            content_type,
            byte_len: bytes.len() as u64,
        };
        conv_debug!(
            "Fetched {} bytes from {} ({} redirects)",
            metadata.byte_len,
            metadata.final_url,
            metadata.redirect_count
        );

        Ok(FetchOutput { bytes, metadata })
    }
}

#[async_trait::async_trait]
impl Fetcher for ReqwestFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchOutput, ConversionError> {
        let parsed = validate_url(url)?;
        let limit = self.settings.request_timeout;
        match tokio::time::timeout(limit, self.fetch_inner(parsed)).await {
            Ok(result) => result,
            Err(_) => {
                conv_warn!("Fetch of {} exceeded {:?}", url, limit);
                Err(timed_out(limit))
            }
        }
    }
}

fn timed_out(limit: Duration) -> ConversionError {
    ConversionError::new(
        FailureKind::Timeout,
        format!("Request timed out after {} ms", limit.as_millis()),
    )
}

fn too_large(max_bytes: u64, actual: u64) -> ConversionError {
    ConversionError::new(
        FailureKind::TooLarge {
            max_bytes,
            actual: Some(actual),
        },
        format!("Response too large: {actual} bytes exceeds limit of {max_bytes}"),
    )
}

fn map_reqwest_error(err: reqwest::Error) -> ConversionError {
    if err.is_timeout() {
        return ConversionError::new(FailureKind::Timeout, err.to_string());
    }
    if err.is_redirect() {
        return ConversionError::new(FailureKind::Network, format!("Too many redirects: {err}"));
    }
    ConversionError::new(FailureKind::Network, err.to_string())
}
