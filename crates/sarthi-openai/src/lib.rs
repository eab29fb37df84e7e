// SPDX-FileCopyrightText: 2026 Sarthi Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! OpenAI-compatible provider adapter for the Sarthi query router.
//!
//! Groq, OpenRouter, Together, Gemini, Cohere and local Ollama all expose a
//! `/chat/completions` endpoint with the same shape, so one adapter serves
//! every [`ProviderKind`]. Each configured provider gets its own client.

pub mod client;
pub mod types;

use async_trait::async_trait;
use sarthi_core::error::SarthiError;
use sarthi_core::traits::{PluginAdapter, ProviderAdapter};
use sarthi_core::types::{
    AdapterType, HealthStatus, ProviderDescriptor, ProviderKind, ProviderRequest,
    ProviderResponse, Role, TokenUsage,
};
use tracing::{info, warn};

use crate::client::OpenAiCompatClient;
use crate::types::{ChatCompletionRequest, WireMessage};

/// One configured provider speaking the OpenAI chat completions API.
pub struct OpenAiCompatProvider {
    id: String,
    client: OpenAiCompatClient,
    has_key: bool,
    needs_key: bool,
}

impl OpenAiCompatProvider {
    /// Build the adapter for `descriptor`, reading its API key from the
    /// environment variable the descriptor names.
    ///
    /// A missing key is not fatal: the provider still registers, its calls
    /// fail upstream and the chain falls through to the next tier.
    pub fn new(descriptor: &ProviderDescriptor) -> Result<Self, SarthiError> {
        let api_key = resolve_api_key(descriptor.api_key_env.as_deref());
        if api_key.is_none() && needs_api_key(descriptor.kind) {
            warn!(
                provider = %descriptor.id,
                env = descriptor.api_key_env.as_deref().unwrap_or("<unset>"),
                "API key not found in environment"
            );
        }
        Self::with_api_key(descriptor, api_key.as_deref())
    }

    /// Build the adapter with an explicit key.
    pub fn with_api_key(
        descriptor: &ProviderDescriptor,
        api_key: Option<&str>,
    ) -> Result<Self, SarthiError> {
        let base_url = descriptor.resolved_base_url().ok_or_else(|| {
            SarthiError::Config(format!(
                "provider `{}` has no base_url and its kind has no default",
                descriptor.id
            ))
        })?;

        let extra_headers: &[(&'static str, &str)] = match descriptor.kind {
            ProviderKind::OpenRouter => &[("x-title", "Sarthi")],
            _ => &[],
        };

        let client = OpenAiCompatClient::new(
            descriptor.id.clone(),
            base_url,
            api_key,
            descriptor.rate_limit.timeout,
            extra_headers,
        )?;

        info!(
            provider = %descriptor.id,
            kind = %descriptor.kind,
            endpoint = client.endpoint(),
            "provider adapter initialized"
        );

        Ok(Self {
            id: descriptor.id.clone(),
            client,
            has_key: api_key.is_some(),
            needs_key: needs_api_key(descriptor.kind),
        })
    }

    fn to_wire_request(request: &ProviderRequest) -> ChatCompletionRequest {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if !request.system_prompt.is_empty() {
            messages.push(WireMessage {
                role: Role::System.to_string(),
                content: request.system_prompt.clone(),
            });
        }
        messages.extend(request.messages.iter().map(|m| WireMessage {
            role: m.role.to_string(),
            content: m.content.clone(),
        }));

        ChatCompletionRequest {
            model: request.model.clone(),
            messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            stream: false,
        }
    }
}

#[async_trait]
impl PluginAdapter for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.id
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Provider
    }

    async fn health_check(&self) -> Result<HealthStatus, SarthiError> {
        // No live call: probing would spend free-tier quota.
        if self.needs_key && !self.has_key {
            return Ok(HealthStatus::Degraded("API key not set".into()));
        }
        Ok(HealthStatus::Healthy)
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiCompatProvider {
    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, SarthiError> {
        let wire = Self::to_wire_request(&request);
        let response = self.client.complete(&wire).await?;

        let choice = response.choices.into_iter().next().ok_or_else(|| {
            SarthiError::provider(format!("`{}` returned no choices", self.id))
        })?;
        let usage = response.usage.unwrap_or_default();

        Ok(ProviderResponse {
            content: choice.message.content.unwrap_or_default(),
            model: response.model.unwrap_or(request.model),
            usage: TokenUsage {
                input_tokens: usage.prompt_tokens,
                output_tokens: usage.completion_tokens,
            },
            finish_reason: choice.finish_reason,
        })
    }
}

/// Hosted free tiers require a key; local and self-hosted endpoints may not.
fn needs_api_key(kind: ProviderKind) -> bool {
    !matches!(kind, ProviderKind::Ollama | ProviderKind::OpenAiCompatible)
}

/// Read the API key from `env_var`, treating empty values as unset.
fn resolve_api_key(env_var: Option<&str>) -> Option<String> {
    let value = std::env::var(env_var?).ok()?;
    (!value.trim().is_empty()).then_some(value)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use sarthi_core::types::{Capabilities, ChatMessage, RateLimitConfig, Tier};
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn descriptor(kind: ProviderKind, base_url: Option<String>) -> ProviderDescriptor {
        ProviderDescriptor {
            id: "groq".into(),
            kind,
            tier: Tier::new(1).unwrap(),
            capabilities: Capabilities::default(),
            models: vec!["llama-3.3-70b-versatile".into()],
            model_fallback: false,
            rate_limit: RateLimitConfig {
                windows: vec![],
                timeout: Duration::from_secs(5),
            },
            enabled: true,
            base_url,
            api_key_env: Some("SARTHI_TEST_KEY_THAT_IS_NEVER_SET".into()),
        }
    }

    fn request() -> ProviderRequest {
        ProviderRequest {
            model: "llama-3.3-70b-versatile".into(),
            system_prompt: "You are Sarthi.".into(),
            messages: vec![ChatMessage {
                role: Role::User,
                content: "What is osmosis?".into(),
            }],
            max_tokens: 128,
            temperature: None,
        }
    }

    #[test]
    fn system_prompt_leads_the_wire_messages() {
        let wire = OpenAiCompatProvider::to_wire_request(&request());
        assert_eq!(wire.messages.len(), 2);
        assert_eq!(wire.messages[0].role, "system");
        assert_eq!(wire.messages[1].role, "user");
        assert!(!wire.stream);
    }

    #[test]
    fn unset_key_env_resolves_to_none() {
        assert_eq!(resolve_api_key(Some("SARTHI_TEST_KEY_THAT_IS_NEVER_SET")), None);
        assert_eq!(resolve_api_key(None), None);
    }

    #[test]
    fn compatible_kind_without_url_is_a_config_error() {
        let result = OpenAiCompatProvider::new(&descriptor(ProviderKind::OpenAiCompatible, None));
        assert!(matches!(result, Err(SarthiError::Config(_))));
    }

    #[tokio::test]
    async fn missing_key_reports_degraded_health() {
        let provider = OpenAiCompatProvider::new(&descriptor(ProviderKind::Groq, None)).unwrap();
        assert_eq!(
            provider.health_check().await.unwrap(),
            HealthStatus::Degraded("API key not set".into())
        );
        assert_eq!(provider.name(), "groq");
    }

    #[tokio::test]
    async fn complete_maps_choice_and_usage() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer k"))
            .and(body_partial_json(serde_json::json!({
                "model": "llama-3.3-70b-versatile",
                "max_tokens": 128
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "model": "llama-3.3-70b-versatile",
                "choices": [{"message": {"role": "assistant", "content": "Diffusion of water."}, "finish_reason": "stop"}],
                "usage": {"prompt_tokens": 20, "completion_tokens": 4}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let provider = OpenAiCompatProvider::with_api_key(
            &descriptor(ProviderKind::OpenAiCompatible, Some(server.uri())),
            Some("k"),
        )
        .unwrap();
        let resp = provider.complete(request()).await.unwrap();
        assert_eq!(resp.content, "Diffusion of water.");
        assert_eq!(resp.usage.input_tokens, 20);
        assert_eq!(resp.usage.output_tokens, 4);
        assert_eq!(resp.finish_reason.as_deref(), Some("stop"));
    }

    #[tokio::test]
    async fn empty_choices_is_a_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"choices": []})),
            )
            .mount(&server)
            .await;

        let provider = OpenAiCompatProvider::with_api_key(
            &descriptor(ProviderKind::OpenAiCompatible, Some(server.uri())),
            None,
        )
        .unwrap();
        let err = provider.complete(request()).await.unwrap_err();
        assert!(matches!(err, SarthiError::Provider { .. }));
    }

    #[tokio::test]
    async fn openrouter_sends_title_header() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("x-title", "Sarthi"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"content": "ok"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let provider = OpenAiCompatProvider::with_api_key(
            &descriptor(ProviderKind::OpenRouter, Some(server.uri())),
            Some("k"),
        )
        .unwrap();
        let resp = provider.complete(request()).await.unwrap();
        assert_eq!(resp.content, "ok");
        assert_eq!(resp.model, "llama-3.3-70b-versatile");
    }
}
