//! Blocking HTTP client shared by both providers: User-Agent, timeout, JSON POST.

use super::ProviderError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, error};

const DEFAULT_USER_AGENT: &str = concat!("novelgen/", env!("CARGO_PKG_VERSION"));
/// Chapter calls with a 4000-token budget routinely take minutes.
const DEFAULT_TIMEOUT_SECS: u64 = 600;

/// Thin wrapper over `reqwest::blocking::Client` that turns responses into [ProviderError]s.
#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: reqwest::blocking::Client,
}

impl HttpClient {
    /// Build a client with the default User-Agent and timeout.
    pub fn new() -> Result<Self, reqwest::Error> {
        Self::builder().build()
    }

    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::default()
    }

    /// POST `body` as JSON and decode a JSON response.
    ///
    /// Non-success statuses become [ProviderError::Status] with the response body attached;
    /// undecodable bodies become [ProviderError::Malformed].
    pub fn post_json<B, R>(
        &self,
        provider: &'static str,
        url: &str,
        headers: &[(&str, &str)],
        body: &B,
    ) -> Result<R, ProviderError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        debug!(provider, url, "Sending request");
        let mut request = self
            .inner
            .post(url)
            .header("content-type", "application/json")
            .json(body);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        let response = request.send().map_err(|e| {
            error!(provider, url, error = %e, "Request failed");
            ProviderError::Network {
                provider,
                url: url.to_string(),
                source: e,
            }
        })?;

        let status = response.status();
        let text = response.text().map_err(|e| ProviderError::Malformed {
            provider,
            reason: format!("could not read response body: {}", e),
        })?;
        if !status.is_success() {
            error!(provider, status = status.as_u16(), body = %text, "Provider returned error");
            return Err(ProviderError::Status {
                provider,
                status: status.as_u16(),
                body: text,
            });
        }
        serde_json::from_str(&text).map_err(|e| ProviderError::Malformed {
            provider,
            reason: e.to_string(),
        })
    }
}

/// Builder for [HttpClient] with optional User-Agent and timeout.
#[derive(Debug)]
pub struct HttpClientBuilder {
    user_agent: Option<String>,
    timeout_secs: u64,
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self {
            user_agent: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl HttpClientBuilder {
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }

    /// Request timeout in seconds. Default 600.
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn build(self) -> Result<HttpClient, reqwest::Error> {
        let user_agent = self
            .user_agent
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());
        let inner = reqwest::blocking::Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(self.timeout_secs))
            .build()?;
        Ok(HttpClient { inner })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::thread;

    /// Serve one canned response on a local port and return the base URL.
    fn serve_once(status_line: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream);
            let mut content_length = 0usize;
            loop {
                let mut line = String::new();
                if reader.read_line(&mut line).unwrap() == 0 || line == "\r\n" {
                    break;
                }
                let lower = line.to_ascii_lowercase();
                if let Some(value) = lower.strip_prefix("content-length:") {
                    content_length = value.trim().parse().unwrap();
                }
            }
            let mut request_body = vec![0u8; content_length];
            reader.read_exact(&mut request_body).unwrap();
            let response = format!(
                "HTTP/1.1 {}\r\ncontent-type: application/json\r\n\
                 content-length: {}\r\nconnection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            let mut stream = reader.into_inner();
            stream.write_all(response.as_bytes()).unwrap();
            stream.flush().unwrap();
        });
        format!("http://{}/generate", addr)
    }

    fn client() -> HttpClient {
        HttpClient::builder().timeout_secs(10).build().unwrap()
    }

    #[derive(Debug, serde::Deserialize)]
    struct Reply {
        ok: bool,
    }

    #[test]
    fn error_status_keeps_code_and_body() {
        let url = serve_once("500 Internal Server Error", r#"{"error":"boom"}"#);
        let result: Result<Reply, _> =
            client().post_json("stability", &url, &[], &serde_json::json!({"prompt": "x"}));
        match result {
            Err(ProviderError::Status {
                provider,
                status,
                body,
            }) => {
                assert_eq!(provider, "stability");
                assert_eq!(status, 500);
                assert_eq!(body, r#"{"error":"boom"}"#);
            }
            other => panic!("expected Status error, got {:?}", other),
        }
    }

    #[test]
    fn undecodable_success_body_is_malformed() {
        let url = serve_once("200 OK", "not json at all");
        let result: Result<Reply, _> =
            client().post_json("anthropic", &url, &[("x-api-key", "k")], &serde_json::json!({}));
        assert!(
            matches!(
                result,
                Err(ProviderError::Malformed {
                    provider: "anthropic",
                    ..
                })
            ),
            "got {:?}",
            result
        );
    }

    #[test]
    fn success_body_is_decoded() {
        let url = serve_once("200 OK", r#"{"ok":true}"#);
        let reply: Reply = client()
            .post_json("anthropic", &url, &[], &serde_json::json!({}))
            .unwrap();
        assert!(reply.ok);
    }
}
