//! HTTP Client Implementation using Reqwest

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    http::{ByteStream, HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy},
};
use bytes::Bytes;
use futures::stream::{self, BoxStream};
use futures::{StreamExt, TryStreamExt};
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

/// Reqwest-based HTTP client implementation
///
/// Request/response calls retry 5xx and 429 answers with exponential
/// backoff. Download streams are never retried here; a body that sends
/// nothing for the idle timeout ends with a network error.
pub struct ReqwestHttpClient {
    client: Client,
    idle_timeout: Duration,
}

const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30);

impl ReqwestHttpClient {
    pub fn new() -> Result<Self> {
        Self::with_connect_timeout(Duration::from_secs(10))
    }

    /// No overall timeout is set on the client so long downloads are not
    /// cut off. Plain requests can set their own with
    /// [`HttpRequest::timeout`].
    pub fn with_connect_timeout(connect_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .pool_max_idle_per_host(10)
            .user_agent(concat!("ivor-core/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| BridgeError::OperationFailed(format!("HTTP client: {e}")))?;

        Ok(Self::with_client(client))
    }

    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }

    /// Longest wait for the next chunk of a download body.
    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    fn convert_method(method: HttpMethod) -> reqwest::Method {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Delete => reqwest::Method::DELETE,
            HttpMethod::Head => reqwest::Method::HEAD,
        }
    }

    fn build_request(&self, request: HttpRequest) -> reqwest::RequestBuilder {
        let method = Self::convert_method(request.method);
        let mut req = self.client.request(method, &request.url);

        for (key, value) in request.headers {
            req = req.header(key, value);
        }
        if let Some(body) = request.body {
            req = req.body(body);
        }
        if let Some(timeout) = request.timeout {
            req = req.timeout(timeout);
        }

        req
    }

    fn classify(error: &reqwest::Error) -> BridgeError {
        if error.is_timeout() {
            BridgeError::Network("request timed out".to_string())
        } else if error.is_connect() {
            BridgeError::Network(format!("connection failed: {error}"))
        } else {
            BridgeError::Network(error.to_string())
        }
    }
}

/// Ends `chunks` with a network error once no chunk arrives within `idle`.
fn idle_limited(
    chunks: BoxStream<'static, Result<Bytes>>,
    idle: Duration,
) -> BoxStream<'static, Result<Bytes>> {
    stream::unfold(Some(chunks), move |state| async move {
        let mut chunks = state?;
        match timeout(idle, chunks.next()).await {
            Ok(Some(chunk)) => Some((chunk, Some(chunks))),
            Ok(None) => None,
            Err(_) => {
                warn!(idle_ms = idle.as_millis(), "Download stalled");
                let error = BridgeError::Network(format!(
                    "no data received for {} ms",
                    idle.as_millis()
                ));
                Some((Err(error), None))
            }
        }
    })
    .boxed()
}

/// Signed stream URLs carry credentials in the query string.
fn without_query(url: &str) -> &str {
    url.split(['?', '#']).next().unwrap_or(url)
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.execute_with_retry(request, RetryPolicy::default())
            .await
    }

    async fn execute_with_retry(
        &self,
        request: HttpRequest,
        policy: RetryPolicy,
    ) -> Result<HttpResponse> {
        let mut attempt = 0;
        let mut last_error = None;

        while attempt < policy.max_attempts {
            debug!(
                attempt = attempt + 1,
                max_attempts = policy.max_attempts,
                url = without_query(&request.url),
                "Executing HTTP request"
            );

            match self.build_request(request.clone()).send().await {
                Ok(response) => {
                    let status = response.status().as_u16();

                    if status >= 500 || status == 429 {
                        warn!(status, attempt = attempt + 1, "Retryable HTTP status");
                        last_error = Some(BridgeError::HttpStatus {
                            status,
                            url: request.url.clone(),
                        });
                    } else {
                        let headers: HashMap<String, String> = response
                            .headers()
                            .iter()
                            .filter_map(|(k, v)| {
                                v.to_str().ok().map(|s| (k.to_string(), s.to_string()))
                            })
                            .collect();

                        let body = response.bytes().await.map_err(|e| Self::classify(&e))?;

                        return Ok(HttpResponse {
                            status,
                            headers,
                            body,
                        });
                    }
                }
                Err(e) => {
                    warn!(error = %e, attempt = attempt + 1, "HTTP request failed");
                    last_error = Some(Self::classify(&e));
                }
            }

            attempt += 1;

            if attempt < policy.max_attempts {
                let delay = policy.delay_for(attempt);
                debug!(delay_ms = delay.as_millis(), "Retrying after delay");
                sleep(delay).await;
            }
        }

        Err(last_error.unwrap_or_else(|| {
            BridgeError::OperationFailed("All retry attempts exhausted".to_string())
        }))
    }

    async fn download_stream(&self, url: &str) -> Result<ByteStream> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Self::classify(&e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(BridgeError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let content_length = response.content_length();
        debug!(
            url = without_query(url),
            content_length = ?content_length,
            "Download stream opened"
        );

        let chunks = response
            .bytes_stream()
            .map_err(|e| Self::classify(&e))
            .boxed();

        Ok(ByteStream::new(
            content_length,
            idle_limited(chunks, self.idle_timeout),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_client_creation() {
        assert!(ReqwestHttpClient::new().is_ok());
    }

    #[test]
    fn test_method_conversion() {
        assert_eq!(
            ReqwestHttpClient::convert_method(HttpMethod::Get),
            reqwest::Method::GET
        );
        assert_eq!(
            ReqwestHttpClient::convert_method(HttpMethod::Head),
            reqwest::Method::HEAD
        );
    }

    #[test]
    fn test_logged_url_drops_query() {
        assert_eq!(
            without_query("https://cdn.example/a.mp3?sig=abc"),
            "https://cdn.example/a.mp3"
        );
        assert_eq!(without_query("https://cdn.example/a.mp3"), "https://cdn.example/a.mp3");
    }

    #[tokio::test]
    async fn test_stalled_body_ends_with_network_error() {
        let chunks = stream::iter([Ok(Bytes::from_static(b"head"))])
            .chain(stream::pending())
            .boxed();
        let mut limited = idle_limited(chunks, Duration::from_millis(50));

        assert_eq!(limited.next().await.unwrap().unwrap(), Bytes::from_static(b"head"));
        let err = limited.next().await.unwrap().unwrap_err();
        assert!(err.is_network());
        assert!(limited.next().await.is_none());
    }

    #[tokio::test]
    async fn test_finished_body_passes_through() {
        let chunks = stream::iter([
            Ok(Bytes::from_static(b"a")),
            Ok(Bytes::from_static(b"b")),
        ])
        .boxed();
        let collected: Vec<Bytes> = idle_limited(chunks, Duration::from_secs(1))
            .try_collect()
            .await
            .unwrap();
        assert_eq!(collected.len(), 2);
    }

    #[tokio::test]
    async fn test_unreachable_host_is_network_error() {
        let client = ReqwestHttpClient::with_connect_timeout(Duration::from_millis(200)).unwrap();
        let err = client
            .download_stream("http://127.0.0.1:9/never")
            .await
            .unwrap_err();
        assert!(err.is_network());
    }
}
