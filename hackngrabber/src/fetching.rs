use encoding_rs::{Encoding, UTF_8};
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use crate::error::GrabError;

/// HTTP client for the front page. Built once and reused across poll cycles.
#[derive(Clone)]
pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    /// `timeout_secs == 0` leaves requests unbounded, so a stalled upstream
    /// blocks the poll cycle until the transport gives up.
    pub fn new(timeout_secs: u64, user_agent: &str) -> Result<Self, GrabError> {
        let mut builder = Client::builder().user_agent(user_agent.to_string());
        if timeout_secs > 0 {
            builder = builder.timeout(Duration::from_secs(timeout_secs));
        }

        let client = builder
            .build()
            .map_err(|source| GrabError::ClientSetup { source })?;

        Ok(Self { client })
    }

    /// Issue one GET and return the decoded body.
    ///
    /// The body is decoded strictly with the charset from `Content-Type`
    /// (UTF-8 when absent or unknown); a malformed byte sequence is a
    /// `Decode` error. No retry here; the poller decides what a failure means.
    pub async fn fetch(&self, url: &str) -> Result<String, GrabError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| GrabError::Network {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(GrabError::HttpStatus {
                url: url.to_string(),
                status,
            });
        }

        let encoding = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .and_then(charset_label)
            .and_then(|label| Encoding::for_label(label.as_bytes()))
            .unwrap_or(UTF_8);

        let bytes = response.bytes().await.map_err(|source| GrabError::Network {
            url: url.to_string(),
            source,
        })?;

        let body = encoding
            .decode_without_bom_handling_and_without_replacement(&bytes)
            .ok_or_else(|| GrabError::Decode {
                url: url.to_string(),
                charset: encoding.name().to_string(),
            })?
            .into_owned();

        debug!(%url, bytes = body.len(), "fetched page");
        Ok(body)
    }
}

/// `charset` parameter of a `Content-Type` value, unquoted.
fn charset_label(content_type: &str) -> Option<String> {
    content_type.split(';').skip(1).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim().trim_matches('"').to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn returns_body_on_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/")
            .with_status(200)
            .with_header("content-type", "text/html; charset=utf-8")
            .with_body("<html><body>hi</body></html>")
            .create_async()
            .await;

        let fetcher = Fetcher::new(5, "test-agent").expect("client");
        let body = fetcher.fetch(&format!("{}/", server.url())).await.expect("fetch");

        assert_eq!(body, "<html><body>hi</body></html>");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn non_success_status_is_a_network_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/")
            .with_status(503)
            .with_body("busy")
            .create_async()
            .await;

        let fetcher = Fetcher::new(5, "test-agent").expect("client");
        let err = fetcher
            .fetch(&format!("{}/", server.url()))
            .await
            .expect_err("503 must fail");

        assert!(err.is_network());
        assert!(matches!(err, GrabError::HttpStatus { status, .. } if status.as_u16() == 503));
    }

    #[tokio::test]
    async fn malformed_body_is_a_network_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/")
            .with_status(200)
            .with_header("content-type", "text/html; charset=utf-8")
            .with_body(b"<a>\xFF\xFEX</a>".to_vec())
            .create_async()
            .await;

        let fetcher = Fetcher::new(5, "test-agent").expect("client");
        let err = fetcher
            .fetch(&format!("{}/", server.url()))
            .await
            .expect_err("invalid utf-8 must fail");

        assert!(err.is_network());
        assert!(matches!(err, GrabError::Decode { ref charset, .. } if charset == "UTF-8"));
    }

    #[tokio::test]
    async fn declared_charset_is_honoured() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/")
            .with_status(200)
            .with_header("content-type", "text/html; charset=\"ISO-8859-1\"")
            .with_body(b"<a>caf\xE9</a>".to_vec())
            .create_async()
            .await;

        let fetcher = Fetcher::new(5, "test-agent").expect("client");
        let body = fetcher.fetch(&format!("{}/", server.url())).await.expect("fetch");

        assert_eq!(body, "<a>caf\u{e9}</a>");
    }

    #[test]
    fn invalid_user_agent_fails_client_setup() {
        let err = Fetcher::new(5, "bad\nagent").err().expect("header value must be rejected");
        assert!(matches!(err, GrabError::ClientSetup { .. }));
        assert!(!err.is_network());
    }

    #[test]
    fn charset_label_reads_content_type() {
        assert_eq!(charset_label("text/html; charset=utf-8").as_deref(), Some("utf-8"));
        assert_eq!(charset_label("text/html;Charset=\"latin1\"").as_deref(), Some("latin1"));
        assert_eq!(charset_label("text/html"), None);
    }

    #[tokio::test]
    async fn unreachable_host_is_a_network_error() {
        let fetcher = Fetcher::new(2, "test-agent").expect("client");
        // Port 9 (discard) on localhost is almost never listening.
        let err = fetcher
            .fetch("http://127.0.0.1:9/")
            .await
            .expect_err("connection must fail");

        assert!(err.is_network());
    }
}
