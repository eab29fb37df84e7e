// SPDX-FileCopyrightText: 2026 Sarthi Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scripted provider adapter for deterministic fallback tests.
//!
//! `ScriptedProvider` pops one [`Step`] per call from a FIFO queue. When the
//! queue is empty it repeats its fallback step, which by default answers with
//! `"scripted answer from <id>"`. Every request is captured for assertions.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use sarthi_core::traits::{PluginAdapter, ProviderAdapter};
use sarthi_core::types::{AdapterType, HealthStatus, ProviderRequest, ProviderResponse, TokenUsage};
use sarthi_core::SarthiError;

/// What the provider does on one call.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Answer immediately.
    Reply(String),
    /// Answer after a delay (measured on the tokio clock).
    ReplyAfter(Duration, String),
    /// Remote quota error, as an HTTP 429 would produce.
    RateLimited,
    /// Remote timeout, as an HTTP 504 would produce.
    Timeout,
    /// Any other upstream failure.
    Fail(String),
    /// Never answer. Only the caller's timeout ends the call.
    Hang,
}

impl Step {
    pub fn reply(text: impl Into<String>) -> Self {
        Step::Reply(text.into())
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Step::Fail(message.into())
    }
}

/// A provider that follows a script.
pub struct ScriptedProvider {
    id: String,
    steps: Mutex<VecDeque<Step>>,
    fallback: Step,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        let fallback = Step::Reply(format!("scripted answer from {id}"));
        Self {
            id,
            steps: Mutex::new(VecDeque::new()),
            fallback,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue `steps` to be played in order.
    pub fn with_steps(self, steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            steps: Mutex::new(steps.into_iter().collect()),
            ..self
        }
    }

    /// Step repeated once the queue is empty.
    pub fn always(self, step: Step) -> Self {
        Self {
            fallback: step,
            ..self
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Append a step to the queue.
    pub async fn push(&self, step: Step) {
        self.steps.lock().await.push_back(step);
    }

    /// Every request received so far, in order.
    pub async fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().await.clone()
    }

    /// Number of calls received, including ones that failed or hung.
    pub async fn call_count(&self) -> usize {
        self.requests.lock().await.len()
    }

    async fn next_step(&self) -> Step {
        self.steps
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }

    fn reply(&self, request: &ProviderRequest, text: String) -> ProviderResponse {
        let prompt_chars: usize = request.messages.iter().map(|m| m.content.len()).sum::<usize>()
            + request.system_prompt.len();
        ProviderResponse {
            usage: TokenUsage {
                input_tokens: approx_tokens(prompt_chars),
                output_tokens: approx_tokens(text.len()),
            },
            content: text,
            model: request.model.clone(),
            finish_reason: Some("stop".to_string()),
        }
    }
}

/// Roughly four bytes per token.
fn approx_tokens(bytes: usize) -> u32 {
    u32::try_from(bytes.div_ceil(4)).unwrap_or(u32::MAX)
}

#[async_trait]
impl PluginAdapter for ScriptedProvider {
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
        Ok(HealthStatus::Healthy)
    }
}

#[async_trait]
impl ProviderAdapter for ScriptedProvider {
    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, SarthiError> {
        self.requests.lock().await.push(request.clone());

        match self.next_step().await {
            Step::Reply(text) => Ok(self.reply(&request, text)),
            Step::ReplyAfter(delay, text) => {
                tokio::time::sleep(delay).await;
                Ok(self.reply(&request, text))
            }
            Step::RateLimited => Err(SarthiError::RateLimited {
                provider: self.id.clone(),
                retry_after: Some(Duration::from_secs(60)),
            }),
            Step::Timeout => Err(SarthiError::Timeout {
                provider: self.id.clone(),
                duration: Duration::from_secs(30),
            }),
            Step::Fail(message) => Err(SarthiError::provider(message)),
            Step::Hang => std::future::pending().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use sarthi_core::types::{ChatMessage, Role};

    use super::*;

    fn request(model: &str) -> ProviderRequest {
        ProviderRequest {
            model: model.into(),
            system_prompt: "sys".into(),
            messages: vec![ChatMessage {
                role: Role::User,
                content: "hello".into(),
            }],
            max_tokens: 16,
            temperature: None,
        }
    }

    #[tokio::test]
    async fn plays_steps_then_repeats_fallback() {
        let provider = ScriptedProvider::new("groq")
            .with_steps([Step::RateLimited, Step::reply("second")]);

        assert!(matches!(
            provider.complete(request("m")).await,
            Err(SarthiError::RateLimited { .. })
        ));
        assert_eq!(provider.complete(request("m")).await.unwrap().content, "second");
        assert_eq!(
            provider.complete(request("m")).await.unwrap().content,
            "scripted answer from groq"
        );
        assert_eq!(provider.call_count().await, 3);
    }

    #[tokio::test]
    async fn echoes_requested_model() {
        let provider = ScriptedProvider::new("gemini").always(Step::reply("ok"));
        let resp = provider.complete(request("gemini-2.0-flash")).await.unwrap();
        assert_eq!(resp.model, "gemini-2.0-flash");
        assert!(resp.usage.output_tokens > 0);
        assert_eq!(provider.requests().await[0].model, "gemini-2.0-flash");
    }

    #[tokio::test(start_paused = true)]
    async fn hang_is_ended_by_caller_timeout() {
        let provider = ScriptedProvider::new("slow").always(Step::Hang);
        let result =
            tokio::time::timeout(Duration::from_secs(5), provider.complete(request("m"))).await;
        assert!(result.is_err());
        assert_eq!(provider.call_count().await, 1);
    }
}
