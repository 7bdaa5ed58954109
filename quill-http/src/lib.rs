//! Minimal HTTP client for fetching web pages with safe logging and retries.
//!
//! - Request options: headers, timeout, retries
//! - Accepts only HTML responses and decodes them using the header or `<meta>` charset
//! - Caps response bodies so a hostile page cannot exhaust memory
//! - Retries 429/5xx with exponential backoff and `Retry-After` support
//! - Optional *raw* request logging via `QUILL_HTTP_RAW=1`
//!
//! Example (no_run):
//! ```no_run
//! # async fn demo() -> Result<(), quill_http::HttpError> {
//! let client = quill_http::HttpClient::new()?;
//! let page = client
//!     .get_html("https://medium.com/@someone/post", quill_http::RequestOpts::default())
//!     .await?;
//! println!("{} bytes of HTML", page.html.len());
//! # Ok(()) }
//! ```
//!
//! Observability: structured `tracing` events are emitted for request start,
//! response headers, retries and final errors. Query parameters that look like
//! credentials are redacted before they reach any log line.

use reqwest::header::{ACCEPT, CONTENT_LENGTH, CONTENT_TYPE, HeaderMap, RETRY_AFTER, USER_AGENT};
use regex::Regex;
use reqwest::{Client, Method, Response, StatusCode, Url};
use std::env;
use std::sync::LazyLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;

// ==============================
// Raw logging toggles
// ==============================

const RAW_ENV: &str = "QUILL_HTTP_RAW";

const ACCEPT_HTML: &str = "text/html,application/xhtml+xml;q=0.9,*/*;q=0.1";
const HTML_MIME_TYPES: &[&str] = &["text/html", "application/xhtml+xml"];
const DEFAULT_MAX_BODY_BYTES: usize = 5 * 1024 * 1024;
/// How far into the body to look for a `<meta>` charset declaration.
const META_SNIFF_BYTES: usize = 1024;

/// `<meta charset="...">`, and the `charset=` inside an `http-equiv` content attribute.
#[allow(clippy::expect_used)]
static META_CHARSET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<meta[^>]+charset\s*=\s*["']?([^"'\s;/>]+)"#).expect("valid charset regex")
});

const SNIPPET_LEN: usize = 200;

static REQUEST_COUNTER: AtomicU64 = AtomicU64::new(1);

fn raw_enabled() -> bool {
    matches!(
        env::var(RAW_ENV).as_deref(),
        Ok("1") | Ok("true") | Ok("yes")
    )
}

/// Render a best-effort curl command for repro/debug, with secrets redacted.
fn make_curl(method: &Method, url: &Url, headers: &HeaderMap) -> String {
    let mut parts = vec!["curl".to_string(), format!("-X{}", method)];
    for (name, val) in headers.iter() {
        let mut v = val.to_str().unwrap_or("").to_string();
        if name.as_str().eq_ignore_ascii_case("authorization")
            || name.as_str().eq_ignore_ascii_case("cookie")
        {
            v = "<redacted>".into();
        }
        parts.push(format!(
            "-H '{}: {}'",
            name.as_str(),
            v.replace('\'', r"'\''")
        ));
    }
    let (host_path, query) = redact_query(url);
    let mut target = format!("{}://{}", url.scheme(), host_path);
    if !query.is_empty() {
        let pairs: Vec<String> = query.iter().map(|(k, v)| format!("{k}={v}")).collect();
        target.push('?');
        target.push_str(&pairs.join("&"));
    }
    parts.push(format!("'{}'", target.replace('\'', r"'\''")));
    parts.join(" ")
}

// ==============================
// Errors
// ==============================

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("invalid URL: {0}")]
    Url(String),
    #[error("request build failed: {0}")]
    Build(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("expected an HTML page but the server returned content type {content_type}")]
    NotHtml { content_type: String },
    #[error("response body exceeds the {limit} byte limit")]
    TooLarge { limit: usize },
    #[error("server returned {status}: {message}")]
    Status { status: StatusCode, message: String },
}

// ==============================
// Request Options & Response
// ==============================

/// Per-request tuning knobs for the HTTP client.
///
/// ```
/// use quill_http::RequestOpts;
/// use std::time::Duration;
///
/// let opts = RequestOpts {
///     timeout: Some(Duration::from_secs(30)),
///     retries: Some(1),
///     ..Default::default()
/// };
///
/// assert_eq!(opts.timeout.unwrap().as_secs(), 30);
/// assert!(opts.headers.is_none());
/// ```
#[derive(Clone, Debug, Default)]
pub struct RequestOpts {
    pub timeout: Option<Duration>,
    pub retries: Option<usize>,
    pub headers: Option<HeaderMap>,
}

/// A successfully fetched HTML document.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Final URL after redirects.
    pub url: Url,
    pub status: StatusCode,
    pub content_type: Option<String>,
    /// Body decoded to UTF-8.
    pub html: String,
}

// ==============================
// Client
// ==============================

#[derive(Clone)]
pub struct HttpClient {
    inner: Client,
    default_timeout: Duration,
    max_retries: usize,
    max_body_bytes: usize,
    user_agent: String,
}

impl HttpClient {
    /// Construct a client with a 5 second connect timeout, a 15 second
    /// request timeout and no retries.
    pub fn new() -> Result<Self, HttpError> {
        Self::with_connect_timeout(Duration::from_secs(5))
    }

    /// Construct a client whose TCP/TLS connect phase is bounded by `connect`.
    pub fn with_connect_timeout(connect: Duration) -> Result<Self, HttpError> {
        let inner = Client::builder()
            .connect_timeout(connect)
            .build()
            .map_err(|e| HttpError::Build(e.to_string()))?;
        Ok(Self {
            inner,
            default_timeout: Duration::from_secs(15),
            max_retries: 0,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            user_agent: concat!("quill/", env!("CARGO_PKG_VERSION")).to_string(),
        })
    }

    /// Override the default whole-request timeout.
    pub fn with_timeout(mut self, dur: Duration) -> Self {
        self.default_timeout = dur;
        self
    }

    /// Override the default retry budget (0 means a single attempt).
    pub fn with_retries(mut self, n: usize) -> Self {
        self.max_retries = n;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = limit;
        self
    }

    /// GET an absolute `http(s)` URL and return its HTML.
    ///
    /// Non-HTML responses, oversized bodies and non-2xx statuses are errors.
    pub async fn get_html(&self, url: &str, opts: RequestOpts) -> Result<FetchedPage, HttpError> {
        let url = parse_page_url(url)?;
        let method = Method::GET;
        let max_retries = opts.retries.unwrap_or(self.max_retries);
        let timeout = opts.timeout.unwrap_or(self.default_timeout);
        let req_id = format!("r{}", REQUEST_COUNTER.fetch_add(1, Ordering::Relaxed));
        let mut attempt = 0usize;

        loop {
            // ----- Build request -----
            let mut headers = HeaderMap::new();
            headers.insert(ACCEPT, ACCEPT_HTML.parse().map_err(build_err)?);
            headers.insert(USER_AGENT, self.user_agent.parse().map_err(build_err)?);
            if let Some(extra) = &opts.headers {
                for (k, v) in extra.iter() {
                    headers.insert(k, v.clone());
                }
            }

            let (host_path, redacted_q) = redact_query(&url);
            tracing::debug!(
                req_id=%req_id,
                attempt=attempt + 1,
                max_retries,
                method=%method,
                host_path=%host_path,
                query=?redacted_q,
                timeout_ms=timeout.as_millis() as u64,
                "http.request.start"
            );

            if raw_enabled() {
                let curl = make_curl(&method, &url, &headers);
                tracing::debug!(target: "http.raw", %req_id, %curl, "request");
            }

            let rb = self
                .inner
                .request(method.clone(), url.clone())
                .timeout(timeout)
                .headers(headers);

            // ----- Send -----
            let t0 = std::time::Instant::now();
            let resp = match rb.send().await {
                Ok(resp) => resp,
                Err(err) => {
                    let message = err.to_string();
                    if attempt < max_retries {
                        attempt += 1;
                        let delay = backoff(attempt, None, false, timeout);
                        tracing::warn!(
                            req_id=%req_id,
                            attempt,
                            max_retries,
                            backoff_ms=delay.as_millis() as u64,
                            message=%message,
                            "http.retrying.network_send"
                        );
                        sleep(delay).await;
                        continue;
                    }
                    tracing::warn!(req_id=%req_id, attempt, message=%message, "http.network_error.send");
                    return Err(HttpError::Network(message));
                }
            };

            let status = resp.status();
            let headers = resp.headers().clone();
            let final_url = resp.url().clone();
            let content_type = headers
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);

            tracing::debug!(
                req_id=%req_id,
                %status,
                duration_ms=t0.elapsed().as_millis() as u64,
                content_type=?content_type,
                content_length=?declared_len(&headers),
                final_url=%final_url,
                "http.response.headers"
            );

            // ----- Success path -----
            if status.is_success() {
                if let Some(ct) = content_type.as_deref() {
                    if !is_html(ct) {
                        tracing::warn!(req_id=%req_id, content_type=%ct, "http.error.not_html");
                        return Err(HttpError::NotHtml {
                            content_type: ct.to_string(),
                        });
                    }
                }
                if declared_len(&headers).is_some_and(|len| len > self.max_body_bytes) {
                    return Err(HttpError::TooLarge {
                        limit: self.max_body_bytes,
                    });
                }

                let bytes = match read_body(resp, self.max_body_bytes).await {
                    Ok(bytes) => bytes,
                    Err(HttpError::Network(message)) if attempt < max_retries => {
                        attempt += 1;
                        let delay = backoff(attempt, None, false, timeout);
                        tracing::warn!(
                            req_id=%req_id,
                            attempt,
                            max_retries,
                            backoff_ms=delay.as_millis() as u64,
                            message=%message,
                            "http.retrying.network_body"
                        );
                        sleep(delay).await;
                        continue;
                    }
                    Err(err) => {
                        tracing::warn!(req_id=%req_id, error=%err, "http.error.body");
                        return Err(err);
                    }
                };

                let html = decode_body(&bytes, content_type.as_deref());
                tracing::trace!(
                    req_id=%req_id,
                    body_len=bytes.len(),
                    body_snippet=%snip(&html),
                    "http.response.body_snippet"
                );

                return Ok(FetchedPage {
                    url: final_url,
                    status,
                    content_type,
                    html,
                });
            }

            // ----- Non-success: maybe retry -----
            let bytes = read_body(resp, self.max_body_bytes)
                .await
                .unwrap_or_default();
            let message = snip(&String::from_utf8_lossy(&bytes));

            let is_429 = status == StatusCode::TOO_MANY_REQUESTS;
            if (is_429 || status.is_server_error()) && attempt < max_retries {
                attempt += 1;
                let delay = backoff(attempt, Some(&headers), is_429, timeout);
                tracing::warn!(
                    req_id=%req_id,
                    %status,
                    attempt,
                    max_retries,
                    backoff_ms=delay.as_millis() as u64,
                    retry_after_secs=?retry_after_delay_secs(&headers),
                    "http.retrying"
                );
                sleep(delay).await;
                continue;
            }

            tracing::warn!(
                req_id=%req_id,
                %status,
                body_snippet=%message,
                "http.error"
            );
            return Err(HttpError::Status { status, message });
        }
    }
}

// ==============================
// Helpers
// ==============================

fn build_err<E: std::fmt::Display>(e: E) -> HttpError {
    HttpError::Build(e.to_string())
}

fn parse_page_url(raw: &str) -> Result<Url, HttpError> {
    let url = Url::parse(raw.trim()).map_err(|e| HttpError::Url(format!("{raw}: {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(HttpError::Url(format!(
            "{raw}: unsupported scheme {other}"
        ))),
    }
}

async fn read_body(mut resp: Response, limit: usize) -> Result<Vec<u8>, HttpError> {
    let mut body = Vec::new();
    while let Some(chunk) = resp
        .chunk()
        .await
        .map_err(|e| HttpError::Network(e.to_string()))?
    {
        if body.len() + chunk.len() > limit {
            return Err(HttpError::TooLarge { limit });
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body)
}

/// Delay before the next attempt, never longer than `ceiling` (the per-attempt timeout).
fn backoff(
    attempt: usize,
    headers: Option<&HeaderMap>,
    is_429: bool,
    ceiling: Duration,
) -> Duration {
    if let Some(secs) = headers.and_then(retry_after_delay_secs) {
        return Duration::from_secs(secs).min(ceiling);
    }
    let shift = (attempt.saturating_sub(1)).min(16) as u32;
    let exp = Duration::from_millis(200u64.saturating_mul(1 << shift));
    let delay = if is_429 {
        exp.max(Duration::from_millis(1100))
    } else {
        exp
    };
    delay.min(ceiling)
}

fn retry_after_delay_secs(h: &HeaderMap) -> Option<u64> {
    h.get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())?
        .trim()
        .parse()
        .ok()
}

fn declared_len(headers: &HeaderMap) -> Option<usize> {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<usize>().ok())
}

fn mime_essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase()
}

fn is_html(content_type: &str) -> bool {
    HTML_MIME_TYPES.contains(&mime_essence(content_type).as_str())
}

fn charset_label(content_type: &str) -> Option<&str> {
    content_type.split(';').skip(1).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim().trim_matches('"'))
    })
}

fn meta_charset(bytes: &[u8]) -> Option<&'static encoding_rs::Encoding> {
    let head = String::from_utf8_lossy(&bytes[..bytes.len().min(META_SNIFF_BYTES)]);
    let caps = META_CHARSET_RE.captures(&head)?;
    encoding_rs::Encoding::for_label(caps.get(1)?.as_str().as_bytes())
}

/// Decode using the `Content-Type` charset, else a `<meta>` declaration near the top
/// of the page, else UTF-8. A BOM still wins, per `encoding_rs`.
fn decode_body(bytes: &[u8], content_type: Option<&str>) -> String {
    let encoding = content_type
        .and_then(charset_label)
        .and_then(|label| encoding_rs::Encoding::for_label(label.as_bytes()))
        .or_else(|| meta_charset(bytes))
        .unwrap_or(encoding_rs::UTF_8);
    let (text, _, _) = encoding.decode(bytes);
    text.into_owned()
}

fn snip(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.len() <= SNIPPET_LEN {
        return trimmed.to_string();
    }
    let mut end = SNIPPET_LEN;
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &trimmed[..end])
}

fn redact_query(url: &Url) -> (String, Vec<(String, String)>) {
    let host_path = format!("{}{}", url.host_str().unwrap_or("-"), url.path());
    let redacted = url
        .query_pairs()
        .map(|(k, v)| {
            let k = k.to_string();
            let is_secret = matches!(
                k.to_ascii_lowercase().as_str(),
                "access_token"
                    | "authorization"
                    | "auth"
                    | "key"
                    | "api_key"
                    | "token"
                    | "secret"
                    | "client_secret"
                    | "bearer"
            );
            (
                k,
                if is_secret {
                    "<redacted>".into()
                } else {
                    v.to_string()
                },
            )
        })
        .collect::<Vec<_>>();
    (host_path, redacted)
}
