//! Bounded page fetching.
//!
//! Metadata extraction only needs a page's `<head>`, so the bounded fetch
//! streams the body in fixed-size chunks and stops as soon as the closing
//! `</head>` tag has arrived, or once a hard size cap is exceeded. The
//! connection is released on every exit path; the remainder of the body is
//! never drained.
//!
//! Decoding always runs charset detection over the fetched bytes themselves.
//! The transport-declared charset is ignored, misdeclared charsets being
//! common enough on the open web that sniffing wins.

use futures::TryStreamExt;
use reqwest::cookie::Jar;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::{Client, Proxy};
use std::collections::HashMap;
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::io::StreamReader;
use tracing::{debug, warn};
use url::Url;

use linkvault_core::defaults::{
    FETCH_CHUNK_SIZE, FETCH_TIMEOUT_SECS, FULL_FETCH_TIMEOUT_SECS, MAX_CONTENT_LIMIT,
};
use linkvault_core::{defaults, Error, Result};

use crate::config::OverrideConfig;

/// Closing tag that ends the bounded read.
const HEAD_MARKER: &[u8] = b"</head>";

// =============================================================================
// PER-CALL OPTIONS
// =============================================================================

/// Fetch parameters derived from an [`OverrideConfig`], with defaults for
/// everything the config does not set.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub timeout: Option<Duration>,
    pub headers: HashMap<String, String>,
    /// Cookie pairs split out of an explicit `Cookie` header; they go into
    /// the client's cookie jar, not the raw header set.
    pub cookies: Vec<(String, String)>,
    pub proxy: Option<String>,
    pub chunk_size: usize,
    pub max_content_limit: usize,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self::from_config(None)
    }
}

impl FetchOptions {
    pub fn from_config(config: Option<&OverrideConfig>) -> Self {
        let mut headers = config.map(|c| c.headers()).unwrap_or_default();

        let cookie_key = headers
            .keys()
            .find(|k| k.eq_ignore_ascii_case("cookie"))
            .cloned();
        let cookies = cookie_key
            .and_then(|key| headers.remove(&key))
            .map(|raw| parse_cookie_header(&raw))
            .unwrap_or_default();

        Self {
            timeout: config.and_then(|c| c.timeout()),
            headers,
            cookies,
            proxy: config.and_then(|c| c.proxy()),
            chunk_size: config.and_then(|c| c.chunk_size()).unwrap_or(FETCH_CHUNK_SIZE),
            max_content_limit: config
                .and_then(|c| c.max_content_limit())
                .unwrap_or(MAX_CONTENT_LIMIT),
        }
    }
}

/// Split a raw `Cookie` header into name/value pairs. Malformed segments are
/// skipped.
fn parse_cookie_header(raw: &str) -> Vec<(String, String)> {
    raw.split(';')
        .filter_map(|segment| {
            let (name, value) = segment.split_once('=')?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            Some((name.to_string(), value.trim().to_string()))
        })
        .collect()
}

// =============================================================================
// FETCHER
// =============================================================================

/// HTTP page fetcher. Clients are built per call because proxy and timeout
/// are per-domain settings in reqwest's client, not per-request.
#[derive(Debug, Default, Clone)]
pub struct PageFetcher;

impl PageFetcher {
    pub fn new() -> Self {
        Self
    }

    /// Fetch at most enough of the page to cover its `<head>`.
    ///
    /// The body is read in `chunk_size` chunks; once the cumulative buffer
    /// contains `</head>` it is truncated just past the tag and the stream
    /// is abandoned. Without the marker, reading stops when the buffer
    /// exceeds `max_content_limit` (content kept untruncated). The buffer
    /// never grows beyond the limit plus one chunk.
    pub async fn fetch(&self, url: &str, config: Option<&OverrideConfig>) -> Result<String> {
        let options = FetchOptions::from_config(config);
        let timeout = options.timeout.unwrap_or(Duration::from_secs(FETCH_TIMEOUT_SECS));
        let client = build_client(url, &options, timeout)?;

        let started = Instant::now();
        let response = client.get(url).send().await?;
        let stream = response
            .bytes_stream()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e));
        let mut reader = StreamReader::new(stream);

        let bytes = read_bounded(&mut reader, options.chunk_size, options.max_content_limit).await;
        debug!(
            url,
            bytes_read = bytes.len(),
            duration_ms = started.elapsed().as_millis() as u64,
            "bounded fetch complete"
        );
        Ok(decode_bytes(&bytes))
    }

    /// Fetch the whole page. Non-2xx statuses and transport errors
    /// propagate as [`Error::Request`].
    pub async fn fetch_full(&self, url: &str, config: Option<&OverrideConfig>) -> Result<String> {
        let options = FetchOptions::from_config(config);
        let timeout = options
            .timeout
            .unwrap_or(Duration::from_secs(FULL_FETCH_TIMEOUT_SECS));
        let client = build_client(url, &options, timeout)?;

        let started = Instant::now();
        let response = client.get(url).send().await?.error_for_status()?;
        let bytes = response.bytes().await?;
        debug!(
            url,
            bytes_read = bytes.len(),
            duration_ms = started.elapsed().as_millis() as u64,
            "full fetch complete"
        );
        Ok(decode_bytes(&bytes))
    }
}

/// Read chunks until `</head>` appears in the cumulative buffer, the size
/// limit is exceeded, or the stream ends. A mid-stream read error keeps the
/// bytes received so far rather than failing the whole fetch.
pub(crate) async fn read_bounded<R>(reader: &mut R, chunk_size: usize, limit: usize) -> Vec<u8>
where
    R: AsyncRead + Unpin,
{
    let mut buffer: Vec<u8> = Vec::new();
    let mut chunk = vec![0u8; chunk_size.max(1)];
    let mut chunk_count = 0u64;

    loop {
        let n = match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                warn!(error = %e, bytes_read = buffer.len(), "read error, keeping partial content");
                break;
            }
        };
        buffer.extend_from_slice(&chunk[..n]);
        chunk_count += 1;

        // The marker may straddle the chunk boundary, so search a window
        // covering the new bytes plus marker-length-minus-one old bytes.
        let window_start = buffer
            .len()
            .saturating_sub(n + HEAD_MARKER.len() - 1);
        if let Some(rel) = find_subslice(&buffer[window_start..], HEAD_MARKER) {
            buffer.truncate(window_start + rel + HEAD_MARKER.len());
            debug!(bytes_read = buffer.len(), chunk_count, "head closing tag found");
            return buffer;
        }

        if buffer.len() > limit {
            debug!(bytes_read = buffer.len(), chunk_count, "content limit reached");
            break;
        }
    }
    buffer
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Detect the encoding from the bytes themselves and decode.
fn decode_bytes(bytes: &[u8]) -> String {
    let mut detector = chardetng::EncodingDetector::new();
    detector.feed(bytes, true);
    let encoding: &'static encoding_rs::Encoding = detector.guess(None, true);
    let (text, _, _) = encoding.decode(bytes);
    text.into_owned()
}

/// Browser-like defaults sent with every fetch; sites commonly block
/// requests carrying a bare synthetic header set.
fn default_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(defaults::USER_AGENT));
    headers.insert(ACCEPT, HeaderValue::from_static(defaults::ACCEPT));
    headers.insert(
        HeaderName::from_static("dnt"),
        HeaderValue::from_static(defaults::DNT),
    );
    headers.insert(
        HeaderName::from_static("upgrade-insecure-requests"),
        HeaderValue::from_static(defaults::UPGRADE_INSECURE_REQUESTS),
    );
    headers
}

/// Build a per-call client with default headers, cookie jar, timeout, and
/// optional proxy.
fn build_client(url: &str, options: &FetchOptions, timeout: Duration) -> Result<Client> {
    let mut headers = default_headers();
    for (name, value) in &options.headers {
        let name = match HeaderName::from_bytes(name.as_bytes()) {
            Ok(name) => name,
            Err(_) => {
                warn!(header = %name, "skipping invalid header name in override config");
                continue;
            }
        };
        let value = match HeaderValue::from_str(value) {
            Ok(value) => value,
            Err(_) => {
                warn!(header = %name, "skipping invalid header value in override config");
                continue;
            }
        };
        headers.insert(name, value);
    }

    let jar = Arc::new(Jar::default());
    if !options.cookies.is_empty() {
        if let Ok(parsed) = Url::parse(url) {
            for (name, value) in &options.cookies {
                jar.add_cookie_str(&format!("{}={}", name, value), &parsed);
            }
        }
    }

    let mut builder = Client::builder()
        .default_headers(headers)
        .cookie_provider(jar)
        .timeout(timeout);
    if let Some(proxy) = &options.proxy {
        builder = builder.proxy(
            Proxy::all(proxy).map_err(|e| Error::Config(format!("invalid proxy {}: {}", proxy, e)))?,
        );
    }
    builder.build().map_err(Error::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tokio::io::ReadBuf;

    async fn read_all(data: &[u8], chunk_size: usize, limit: usize) -> Vec<u8> {
        let mut reader = data;
        read_bounded(&mut reader, chunk_size, limit).await
    }

    #[tokio::test]
    async fn test_truncates_just_past_head_marker() {
        let page = b"<html><head><title>t</title></head><body>never read</body>".to_vec();
        let result = read_all(&page, 8, 1024).await;
        assert_eq!(result, b"<html><head><title>t</title></head>");
    }

    #[tokio::test]
    async fn test_marker_straddling_chunk_boundary_is_found() {
        // With a chunk size of 4 the marker spans several chunks.
        let page = b"aaaa</head>zzzz".to_vec();
        for chunk_size in 1..=8 {
            let result = read_all(&page, chunk_size, 1024).await;
            assert_eq!(result, b"aaaa</head>", "chunk_size {}", chunk_size);
        }
    }

    #[tokio::test]
    async fn test_without_marker_stops_at_limit_untruncated() {
        let page = vec![b'x'; 100];
        let result = read_all(&page, 16, 40).await;
        // Stops after the chunk that crossed the limit; content kept as-is.
        assert_eq!(result, vec![b'x'; 48]);
    }

    #[tokio::test]
    async fn test_buffer_exactly_at_limit_keeps_reading() {
        // The cap is exclusive: a buffer equal to the limit has not
        // exceeded it yet, so the next chunk is still read.
        let page = vec![b'x'; 64];
        let result = read_all(&page, 16, 32).await;
        assert_eq!(result.len(), 48);
    }

    #[test]
    fn test_default_headers_carry_browser_set() {
        let headers = default_headers();
        assert_eq!(headers.get(USER_AGENT).unwrap(), defaults::USER_AGENT);
        assert_eq!(headers.get(ACCEPT).unwrap(), defaults::ACCEPT);
        assert_eq!(headers.get("dnt").unwrap(), defaults::DNT);
        assert_eq!(
            headers.get("upgrade-insecure-requests").unwrap(),
            defaults::UPGRADE_INSECURE_REQUESTS
        );
    }

    #[tokio::test]
    async fn test_never_buffers_more_than_limit_plus_one_chunk() {
        let page = vec![b'x'; 10_000];
        let chunk_size = 64;
        let limit = 256;
        let result = read_all(&page, chunk_size, limit).await;
        assert!(result.len() <= limit + chunk_size);
    }

    #[tokio::test]
    async fn test_short_page_without_marker_reads_to_eof() {
        let page = b"<html><body>tiny".to_vec();
        let result = read_all(&page, 64, 1024).await;
        assert_eq!(result, page);
    }

    /// Yields some bytes, then fails.
    struct FailAfter {
        data: Vec<u8>,
        offset: usize,
    }

    impl AsyncRead for FailAfter {
        fn poll_read(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            if self.offset >= self.data.len() {
                return Poll::Ready(Err(io::Error::new(
                    io::ErrorKind::ConnectionReset,
                    "peer reset",
                )));
            }
            let n = buf.remaining().min(self.data.len() - self.offset);
            let offset = self.offset;
            buf.put_slice(&self.data[offset..offset + n]);
            self.offset += n;
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn test_mid_stream_error_keeps_partial_content() {
        let mut reader = FailAfter {
            data: b"partial content before the reset".to_vec(),
            offset: 0,
        };
        let result = read_bounded(&mut reader, 8, 1024).await;
        assert_eq!(result, b"partial content before the reset");
    }

    #[test]
    fn test_cookie_header_parsed_and_stripped() {
        let config = OverrideConfig::from_value(json!({
            "headers": {
                "Cookie": "session=abc; theme=dark; malformed",
                "X-Custom": "1"
            }
        }));
        let options = FetchOptions::from_config(Some(&config));
        assert_eq!(
            options.cookies,
            vec![
                ("session".to_string(), "abc".to_string()),
                ("theme".to_string(), "dark".to_string()),
            ]
        );
        assert!(!options.headers.keys().any(|k| k.eq_ignore_ascii_case("cookie")));
        assert_eq!(options.headers.get("X-Custom").map(String::as_str), Some("1"));
    }

    #[test]
    fn test_options_defaults_without_config() {
        let options = FetchOptions::from_config(None);
        assert_eq!(options.timeout, None);
        assert_eq!(options.chunk_size, FETCH_CHUNK_SIZE);
        assert_eq!(options.max_content_limit, MAX_CONTENT_LIMIT);
        assert!(options.proxy.is_none());
    }

    #[test]
    fn test_options_from_config_values() {
        let config = OverrideConfig::from_value(json!({
            "timeout": 5,
            "proxy": "http://localhost:8080",
            "chunk_size": 1024,
            "max_content_limit": 4096
        }));
        let options = FetchOptions::from_config(Some(&config));
        assert_eq!(options.timeout, Some(Duration::from_secs(5)));
        assert_eq!(options.proxy.as_deref(), Some("http://localhost:8080"));
        assert_eq!(options.chunk_size, 1024);
        assert_eq!(options.max_content_limit, 4096);
    }

    #[test]
    fn test_decode_utf8() {
        assert_eq!(decode_bytes("héllo".as_bytes()), "héllo");
    }

    #[test]
    fn test_decode_latin1_misdeclared_as_nothing() {
        // 0xE9 is é in windows-1252; invalid as UTF-8.
        let bytes = b"caf\xe9 culture and more latin text to guide detection";
        let decoded = decode_bytes(bytes);
        assert!(decoded.contains("café"), "decoded: {}", decoded);
    }

    #[test]
    fn test_build_client_rejects_bad_proxy() {
        let options = FetchOptions {
            proxy: Some("::not a proxy::".to_string()),
            ..FetchOptions::default()
        };
        let err = build_client("https://example.com", &options, Duration::from_secs(1));
        assert!(matches!(err, Err(Error::Config(_))));
    }
}
