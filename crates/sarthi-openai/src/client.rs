// SPDX-FileCopyrightText: 2026 Sarthi Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for OpenAI-compatible chat completion APIs.
//!
//! The client makes exactly one request per call. Retrying and falling back
//! are the orchestrator's job, so every failure is mapped to a typed
//! [`SarthiError`] and returned immediately.

use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue, RETRY_AFTER};
use sarthi_core::SarthiError;
use tracing::debug;

use crate::types::{ApiErrorResponse, ChatCompletionRequest, ChatCompletionResponse};

/// HTTP client bound to one provider endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiCompatClient {
    client: reqwest::Client,
    provider_id: String,
    endpoint: String,
    timeout: Duration,
}

impl OpenAiCompatClient {
    /// Build a client for `base_url` (e.g. `https://api.groq.com/openai/v1`).
    ///
    /// `extra_headers` are sent on every request, e.g. OpenRouter's `X-Title`.
    pub fn new(
        provider_id: impl Into<String>,
        base_url: &str,
        api_key: Option<&str>,
        timeout: Duration,
        extra_headers: &[(&'static str, &str)],
    ) -> Result<Self, SarthiError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(key) = api_key {
            let value = HeaderValue::from_str(&format!("Bearer {key}"))
                .map_err(|e| SarthiError::Config(format!("invalid API key header value: {e}")))?;
            headers.insert(AUTHORIZATION, value);
        }
        for &(name, value) in extra_headers {
            let value = HeaderValue::from_str(value)
                .map_err(|e| SarthiError::Config(format!("invalid `{name}` header value: {e}")))?;
            headers.insert(HeaderName::from_static(name), value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| SarthiError::Provider {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            provider_id: provider_id.into(),
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            timeout,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Send one non-streaming completion request.
    pub async fn complete(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, SarthiError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        debug!(provider = %self.provider_id, status = %status, "completion response received");

        if status.is_success() {
            let body = response.text().await.map_err(|e| self.transport_error(e))?;
            return serde_json::from_str(&body).map_err(|e| SarthiError::Provider {
                message: format!("failed to parse response from `{}`: {e}", self.provider_id),
                source: Some(Box::new(e)),
            });
        }

        let retry_after = parse_retry_after(response.headers());
        let body = response.text().await.unwrap_or_default();
        Err(self.status_error(status, retry_after, &body))
    }

    fn transport_error(&self, e: reqwest::Error) -> SarthiError {
        if e.is_timeout() {
            return SarthiError::Timeout {
                provider: self.provider_id.clone(),
                duration: self.timeout,
            };
        }
        SarthiError::Provider {
            message: format!("HTTP request to `{}` failed: {e}", self.provider_id),
            source: Some(Box::new(e)),
        }
    }

    fn status_error(
        &self,
        status: StatusCode,
        retry_after: Option<Duration>,
        body: &str,
    ) -> SarthiError {
        match status {
            StatusCode::TOO_MANY_REQUESTS => SarthiError::RateLimited {
                provider: self.provider_id.clone(),
                retry_after,
            },
            StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => SarthiError::Timeout {
                provider: self.provider_id.clone(),
                duration: self.timeout,
            },
            _ => {
                let message = match serde_json::from_str::<ApiErrorResponse>(body) {
                    Ok(api_err) => match api_err.error.type_ {
                        Some(kind) => format!(
                            "`{}` API error {status} ({kind}): {}",
                            self.provider_id, api_err.error.message
                        ),
                        None => format!(
                            "`{}` API error {status}: {}",
                            self.provider_id, api_err.error.message
                        ),
                    },
                    Err(_) => format!("`{}` returned {status}: {body}", self.provider_id),
                };
                SarthiError::provider(message)
            }
        }
    }
}

/// `Retry-After` in delta-seconds form. HTTP-date values are ignored.
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::types::WireMessage;

    fn test_client(base_url: &str, timeout: Duration) -> OpenAiCompatClient {
        OpenAiCompatClient::new("groq", base_url, Some("test-key"), timeout, &[]).unwrap()
    }

    fn test_request() -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: "llama-3.3-70b-versatile".into(),
            messages: vec![WireMessage {
                role: "user".into(),
                content: "What is osmosis?".into(),
            }],
            max_tokens: 256,
            temperature: None,
            stream: false,
        }
    }

    fn success_body() -> serde_json::Value {
        serde_json::json!({
            "id": "chatcmpl-1",
            "model": "llama-3.3-70b-versatile",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": "Water moves across a membrane."},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 12, "completion_tokens": 7, "total_tokens": 19}
        })
    }

    #[tokio::test]
    async fn success_parses_choices_and_sends_bearer_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(success_body()))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server.uri(), Duration::from_secs(5));
        let resp = client.complete(&test_request()).await.unwrap();
        assert_eq!(
            resp.choices[0].message.content.as_deref(),
            Some("Water moves across a membrane.")
        );
        assert_eq!(resp.usage.unwrap().completion_tokens, 7);
    }

    #[tokio::test]
    async fn too_many_requests_maps_to_rate_limited_with_hint() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "7"))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server.uri(), Duration::from_secs(5));
        match client.complete(&test_request()).await {
            Err(SarthiError::RateLimited {
                provider,
                retry_after,
            }) => {
                assert_eq!(provider, "groq");
                assert_eq!(retry_after, Some(Duration::from_secs(7)));
            }
            other => panic!("expected RateLimited, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn gateway_timeout_maps_to_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(504))
            .mount(&server)
            .await;

        let client = test_client(&server.uri(), Duration::from_secs(5));
        let err = client.complete(&test_request()).await.unwrap_err();
        assert!(matches!(err, SarthiError::Timeout { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn slow_upstream_maps_to_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(success_body())
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let client = test_client(&server.uri(), Duration::from_millis(100));
        let err = client.complete(&test_request()).await.unwrap_err();
        match err {
            SarthiError::Timeout { duration, .. } => {
                assert_eq!(duration, Duration::from_millis(100));
            }
            other => panic!("expected Timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn server_error_carries_api_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({
                "error": {"type": "server_error", "message": "upstream overloaded"}
            })))
            .mount(&server)
            .await;

        let client = test_client(&server.uri(), Duration::from_secs(5));
        let err = client.complete(&test_request()).await.unwrap_err();
        let text = err.to_string();
        assert!(matches!(err, SarthiError::Provider { .. }));
        assert!(text.contains("upstream overloaded"), "got: {text}");
        assert!(text.contains("server_error"), "got: {text}");
    }

    #[tokio::test]
    async fn garbage_success_body_is_a_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let client = test_client(&server.uri(), Duration::from_secs(5));
        let err = client.complete(&test_request()).await.unwrap_err();
        assert!(matches!(err, SarthiError::Provider { .. }), "got {err:?}");
    }

    #[test]
    fn endpoint_joins_without_double_slash() {
        let client =
            OpenAiCompatClient::new("x", "http://localhost:11434/v1/", None, Duration::from_secs(1), &[])
                .unwrap();
        assert_eq!(client.endpoint(), "http://localhost:11434/v1/chat/completions");
    }

    #[test]
    fn retry_after_ignores_http_dates() {
        let mut headers = HeaderMap::new();
        headers.insert(
            RETRY_AFTER,
            HeaderValue::from_static("Wed, 21 Oct 2026 07:28:00 GMT"),
        );
        assert_eq!(parse_retry_after(&headers), None);
        headers.insert(RETRY_AFTER, HeaderValue::from_static(" 30 "));
        assert_eq!(parse_retry_after(&headers), Some(Duration::from_secs(30)));
    }
}
