// SPDX-FileCopyrightText: 2026 Sarthi Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types used across adapter traits and the Sarthi router.

use std::collections::BTreeSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tokio::time::Instant;

use crate::error::SarthiError;

/// Hard cap on conversation turns forwarded to a provider.
///
/// Longer histories measurably degraded answer quality, so the window is
/// never unlimited.
pub const HISTORY_LIMIT: usize = 4;

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the type of adapter plugged into the orchestrator.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Provider,
    Storage,
    Retrieval,
}

// --- Request side ---

/// Which chat surface a query came from.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ChatType {
    /// Open-ended general chat.
    General,
    /// Study assistant with access to the student's own study data.
    StudyAssistant,
}

/// Speaker of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One prior turn of the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Origin of a structured context block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ContextKind {
    /// Student profile or gamification data.
    Profile,
    /// A retrieved study document.
    Document,
    /// A web search result.
    SearchResult,
}

/// Structured context supplied by the caller or gathered by augmentation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextBlock {
    pub kind: ContextKind,
    #[serde(default)]
    pub title: Option<String>,
    pub content: String,
}

/// The logical request consumed by the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteRequest {
    pub user_id: String,
    pub conversation_id: String,
    pub message: String,
    pub chat_type: ChatType,
    /// Pin a specific provider, bypassing tier selection.
    #[serde(default)]
    pub provider: Option<String>,
    /// Pin a specific model of the selected provider.
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub recent_history: Vec<Turn>,
    #[serde(default)]
    pub context_blocks: Vec<ContextBlock>,
    /// Caller explicitly asks for search/retrieval augmentation.
    #[serde(default)]
    pub augment: bool,
}

impl RouteRequest {
    /// Minimal request with no history, context, or pinning.
    pub fn new(
        user_id: impl Into<String>,
        conversation_id: impl Into<String>,
        message: impl Into<String>,
        chat_type: ChatType,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            conversation_id: conversation_id.into(),
            message: message.into(),
            chat_type,
            provider: None,
            model: None,
            recent_history: Vec::new(),
            context_blocks: Vec::new(),
            augment: false,
        }
    }
}

/// A validated, immutable query for a single routing attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub user_id: String,
    pub conversation_id: String,
    pub text: String,
    pub chat_type: ChatType,
    /// At most [`HISTORY_LIMIT`] most recent turns, oldest first.
    pub recent_history: Vec<Turn>,
    pub context_blocks: Vec<ContextBlock>,
    pub augment: bool,
}

impl Query {
    /// Validate a request and build the query the orchestrator routes.
    ///
    /// `history_limit` is clamped to [`HISTORY_LIMIT`]; empty turns are dropped
    /// before the window is applied.
    pub fn from_request(
        request: &RouteRequest,
        history_limit: usize,
        max_message_chars: usize,
    ) -> Result<Self, SarthiError> {
        if request.user_id.trim().is_empty() {
            return Err(SarthiError::InvalidRequest(
                "user_id must not be empty".into(),
            ));
        }

        let text = request.message.trim();
        if text.is_empty() {
            return Err(SarthiError::InvalidRequest(
                "message must not be empty".into(),
            ));
        }

        let chars = text.chars().count();
        if chars > max_message_chars {
            return Err(SarthiError::InvalidRequest(format!(
                "message is {chars} characters, limit is {max_message_chars}"
            )));
        }

        let limit = history_limit.min(HISTORY_LIMIT);
        let turns: Vec<&Turn> = request
            .recent_history
            .iter()
            .filter(|t| !t.content.trim().is_empty())
            .collect();
        let recent_history = turns[turns.len().saturating_sub(limit)..]
            .iter()
            .map(|t| (*t).clone())
            .collect();

        Ok(Self {
            user_id: request.user_id.trim().to_string(),
            conversation_id: request.conversation_id.clone(),
            text: text.to_string(),
            chat_type: request.chat_type,
            recent_history,
            context_blocks: request.context_blocks.clone(),
            augment: request.augment,
        })
    }

    /// Lower-cased, whitespace-collapsed query text.
    pub fn normalized_text(&self) -> String {
        normalize_text(&self.text)
    }
}

/// Lower-case text and collapse every whitespace run into a single space.
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

// --- Classification ---

/// Classification label steering augmentation and caching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum QueryType {
    /// Dates, deadlines, exam results: answers go stale quickly.
    TimeSensitive,
    /// Questions about the student's own study records.
    AppData,
    /// Everything else.
    General,
}

/// Result of classifying a query. Derived per request, never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryClassification {
    pub query_type: QueryType,
    /// Fraction of matched keywords over a normalizing constant, in `[0, 1]`.
    pub confidence: f32,
    pub matched_keywords: BTreeSet<String>,
    pub recommend_augmentation: bool,
}

// --- Providers ---

/// Rank of a provider group. Lower tiers are always tried first.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "u8", into = "u8")]
pub struct Tier(u8);

impl Tier {
    /// Returns `None` for tier 0; tiers are 1-based.
    pub fn new(n: u8) -> Option<Self> {
        (n >= 1).then_some(Self(n))
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Tier {
    type Error = String;

    fn try_from(n: u8) -> Result<Self, Self::Error> {
        Tier::new(n).ok_or_else(|| "tier must be at least 1".to_string())
    }
}

impl From<Tier> for u8 {
    fn from(tier: Tier) -> u8 {
        tier.0
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The tier that produced the final response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "TierUsedRepr", into = "TierUsedRepr")]
pub enum TierUsed {
    Tier(Tier),
    /// Graceful degradation: no provider produced the content.
    Terminal,
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum TierUsedRepr {
    Number(u8),
    Label(String),
}

impl From<TierUsed> for TierUsedRepr {
    fn from(tier: TierUsed) -> Self {
        match tier {
            TierUsed::Tier(t) => TierUsedRepr::Number(t.get()),
            TierUsed::Terminal => TierUsedRepr::Label("terminal".into()),
        }
    }
}

impl TryFrom<TierUsedRepr> for TierUsed {
    type Error = String;

    fn try_from(repr: TierUsedRepr) -> Result<Self, Self::Error> {
        match repr {
            TierUsedRepr::Number(n) => Tier::try_from(n).map(TierUsed::Tier),
            TierUsedRepr::Label(s) if s == "terminal" => Ok(TierUsed::Terminal),
            TierUsedRepr::Label(s) => Err(format!("unknown tier label `{s}`")),
        }
    }
}

impl std::fmt::Display for TierUsed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TierUsed::Tier(t) => write!(f, "{t}"),
            TierUsed::Terminal => write!(f, "terminal"),
        }
    }
}

/// Closed set of supported provider families.
///
/// Every family is reached through an OpenAI-compatible chat completions
/// endpoint; the kind only fixes defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ProviderKind {
    Groq,
    OpenRouter,
    Together,
    Gemini,
    Cohere,
    Ollama,
    /// Any other OpenAI-compatible endpoint. Requires an explicit `base_url`.
    OpenAiCompatible,
}

impl ProviderKind {
    /// Default API base URL, if the family has a well-known one.
    pub fn default_base_url(&self) -> Option<&'static str> {
        match self {
            ProviderKind::Groq => Some("https://api.groq.com/openai/v1"),
            ProviderKind::OpenRouter => Some("https://openrouter.ai/api/v1"),
            ProviderKind::Together => Some("https://api.together.xyz/v1"),
            ProviderKind::Gemini => {
                Some("https://generativelanguage.googleapis.com/v1beta/openai")
            }
            ProviderKind::Cohere => Some("https://api.cohere.ai/compatibility/v1"),
            ProviderKind::Ollama => Some("http://localhost:11434/v1"),
            ProviderKind::OpenAiCompatible => None,
        }
    }

    /// Default environment variable holding the API key.
    pub fn default_api_key_env(&self) -> Option<&'static str> {
        match self {
            ProviderKind::Groq => Some("GROQ_API_KEY"),
            ProviderKind::OpenRouter => Some("OPENROUTER_API_KEY"),
            ProviderKind::Together => Some("TOGETHER_API_KEY"),
            ProviderKind::Gemini => Some("GEMINI_API_KEY"),
            ProviderKind::Cohere => Some("COHERE_API_KEY"),
            ProviderKind::Ollama | ProviderKind::OpenAiCompatible => None,
        }
    }
}

/// Optional features a provider supports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub supports_streaming: bool,
    pub supports_function_calling: bool,
}

/// One sliding window quota, e.g. 30 requests per 60 seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowLimit {
    pub size: Duration,
    pub limit: u32,
}

/// Quota windows and call timeout for one provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub windows: Vec<WindowLimit>,
    pub timeout: Duration,
}

/// A validated provider entry owned by the provider registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderDescriptor {
    pub id: String,
    pub kind: ProviderKind,
    pub tier: Tier,
    pub capabilities: Capabilities,
    /// Ordered from most to least capable. Never empty.
    pub models: Vec<String>,
    /// Whether failed calls may be retried in-tier with the next model.
    pub model_fallback: bool,
    pub rate_limit: RateLimitConfig,
    pub enabled: bool,
    pub base_url: Option<String>,
    pub api_key_env: Option<String>,
}

impl ProviderDescriptor {
    /// The preferred model for this provider.
    pub fn primary_model(&self) -> &str {
        self.models.first().map(String::as_str).unwrap_or_default()
    }

    /// Base URL from the descriptor, falling back to the family default.
    pub fn resolved_base_url(&self) -> Option<&str> {
        self.base_url
            .as_deref()
            .or_else(|| self.kind.default_base_url())
    }
}

/// Chat message forwarded to a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

/// A fully assembled request to one provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderRequest {
    pub model: String,
    pub system_prompt: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    #[serde(default)]
    pub temperature: Option<f32>,
}

/// Token accounting for one response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    #[serde(rename = "input")]
    pub input_tokens: u32,
    #[serde(rename = "output")]
    pub output_tokens: u32,
}

/// A completed provider response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderResponse {
    pub content: String,
    pub model: String,
    pub usage: TokenUsage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

// --- Retrieval ---

/// A ranked document returned by a retrieval collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedDocument {
    pub id: String,
    pub title: String,
    pub snippet: String,
    pub score: f32,
}

// --- Rate limiting ---

/// Health of a provider's quota, ordered from least to most restrictive.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Display,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum WindowStatus {
    /// Below 80% of the limit.
    Healthy,
    /// At or above 80%.
    Warning,
    /// At or above 95%.
    Critical,
    /// At or above 100%. Calls are skipped without network I/O.
    Blocked,
}

impl WindowStatus {
    /// Status for `count` requests against `limit`. A zero limit is always blocked.
    pub fn from_usage(count: u32, limit: u32) -> Self {
        let count = u64::from(count) * 100;
        let limit = u64::from(limit);
        if count >= limit * 100 {
            WindowStatus::Blocked
        } else if count >= limit * 95 {
            WindowStatus::Critical
        } else if count >= limit * 80 {
            WindowStatus::Warning
        } else {
            WindowStatus::Healthy
        }
    }
}

/// Usage counter for one provider window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitWindow {
    pub provider_id: String,
    pub window_start: Instant,
    pub window_size: Duration,
    pub request_count: u32,
    pub limit: u32,
    pub status: WindowStatus,
}

impl RateLimitWindow {
    /// Fraction of the limit consumed (may exceed 1.0 after `mark_exhausted`).
    pub fn utilization(&self) -> f64 {
        if self.limit == 0 {
            return 1.0;
        }
        f64::from(self.request_count) / f64::from(self.limit)
    }

    /// Time until the window rolls over.
    pub fn resets_in(&self, now: Instant) -> Duration {
        (self.window_start + self.window_size).saturating_duration_since(now)
    }
}

// --- Attempts ---

/// Outcome of one provider attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AttemptOutcome {
    Success,
    RateLimited,
    Timeout,
    ProviderError,
    InvalidOutput,
}

impl AttemptOutcome {
    /// Map an adapter error to the outcome the orchestrator records.
    pub fn from_error(err: &SarthiError) -> Self {
        match err {
            SarthiError::RateLimited { .. } => AttemptOutcome::RateLimited,
            SarthiError::Timeout { .. } => AttemptOutcome::Timeout,
            SarthiError::Validation(_) => AttemptOutcome::InvalidOutput,
            _ => AttemptOutcome::ProviderError,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, AttemptOutcome::Success)
    }
}

/// One entry of a request's attempt log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub request_id: String,
    pub provider_id: String,
    pub model: String,
    pub tier: Tier,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub outcome: AttemptOutcome,
    #[serde(default)]
    pub error: Option<String>,
}

// --- Response side ---

/// The logical response returned to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteResponse {
    pub content: String,
    pub provider_used: Option<String>,
    pub model_used: Option<String>,
    pub tier_used: TierUsed,
    pub cached: bool,
    pub fallback_used: bool,
    pub tokens_used: TokenUsage,
    pub latency_ms: u64,
    pub query_type: QueryType,
    /// Attempts made while serving this request. Empty on cache hits.
    pub attempts: Vec<AttemptRecord>,
}

impl RouteResponse {
    /// Whether the content came from graceful degradation.
    pub fn is_degraded(&self) -> bool {
        self.tier_used == TierUsed::Terminal
    }
}

// --- Caching ---

/// Namespaced cache key. The digest never contains raw user text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    pub namespace: ChatType,
    pub digest: String,
}

/// The part of a response worth replaying from cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedResponse {
    pub content: String,
    pub provider_used: Option<String>,
    pub model_used: Option<String>,
    pub tier_used: TierUsed,
    pub fallback_used: bool,
    pub tokens_used: TokenUsage,
    pub query_type: QueryType,
}

impl CachedResponse {
    /// Rebuild a caller-facing response from a cache hit.
    pub fn into_response(self, latency_ms: u64) -> RouteResponse {
        RouteResponse {
            content: self.content,
            provider_used: self.provider_used,
            model_used: self.model_used,
            tier_used: self.tier_used,
            cached: true,
            fallback_used: self.fallback_used,
            tokens_used: self.tokens_used,
            latency_ms,
            query_type: self.query_type,
            attempts: Vec::new(),
        }
    }
}

impl From<&RouteResponse> for CachedResponse {
    fn from(response: &RouteResponse) -> Self {
        Self {
            content: response.content.clone(),
            provider_used: response.provider_used.clone(),
            model_used: response.model_used.clone(),
            tier_used: response.tier_used,
            fallback_used: response.fallback_used,
            tokens_used: response.tokens_used,
            query_type: response.query_type,
        }
    }
}

/// A stored cache entry.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub user_id: String,
    pub response: CachedResponse,
    pub created_at: Instant,
    pub expires_at: Instant,
    pub hit_count: u64,
}

impl CacheEntry {
    pub fn is_expired(&self, now: Instant) -> bool {
        now > self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(message: &str) -> RouteRequest {
        RouteRequest::new("u1", "c1", message, ChatType::General)
    }

    #[test]
    fn empty_message_is_rejected() {
        let err = Query::from_request(&request("   \n\t"), 4, 4000).unwrap_err();
        assert!(matches!(err, SarthiError::InvalidRequest(_)));
    }

    #[test]
    fn empty_user_is_rejected() {
        let mut req = request("hello");
        req.user_id = " ".into();
        assert!(Query::from_request(&req, 4, 4000).is_err());
    }

    #[test]
    fn oversized_message_is_rejected() {
        let long = "a".repeat(11);
        let err = Query::from_request(&request(&long), 4, 10).unwrap_err();
        assert!(err.to_string().contains("limit is 10"));
    }

    #[test]
    fn history_is_capped_to_most_recent_four() {
        let mut req = request("next question");
        req.recent_history = (0..10).map(|i| Turn::user(format!("turn {i}"))).collect();
        let query = Query::from_request(&req, 50, 4000).unwrap();
        assert_eq!(query.recent_history.len(), HISTORY_LIMIT);
        assert_eq!(query.recent_history[0].content, "turn 6");
        assert_eq!(query.recent_history[3].content, "turn 9");
    }

    #[test]
    fn empty_turns_do_not_consume_history_slots() {
        let mut req = request("q");
        req.recent_history = vec![
            Turn::user("a"),
            Turn::assistant("b"),
            Turn::user("  "),
            Turn::assistant("c"),
        ];
        let query = Query::from_request(&req, 2, 4000).unwrap();
        let contents: Vec<_> = query.recent_history.iter().map(|t| t.content.as_str()).collect();
        assert_eq!(contents, vec!["b", "c"]);
    }

    #[test]
    fn normalization_lowercases_and_collapses_whitespace() {
        assert_eq!(normalize_text("  What IS\tthe\n\nExam  date? "), "what is the exam date?");
    }

    #[test]
    fn tier_zero_is_invalid() {
        assert!(Tier::new(0).is_none());
        assert_eq!(Tier::new(2).map(Tier::get), Some(2));
        assert!(serde_json::from_str::<Tier>("0").is_err());
    }

    #[test]
    fn tier_used_serializes_as_number_or_terminal() {
        let t2 = TierUsed::Tier(Tier::new(2).unwrap());
        assert_eq!(serde_json::to_string(&t2).unwrap(), "2");
        assert_eq!(serde_json::to_string(&TierUsed::Terminal).unwrap(), "\"terminal\"");
        let parsed: TierUsed = serde_json::from_str("\"terminal\"").unwrap();
        assert_eq!(parsed, TierUsed::Terminal);
        assert!(serde_json::from_str::<TierUsed>("\"bogus\"").is_err());
    }

    #[test]
    fn window_status_thresholds() {
        assert_eq!(WindowStatus::from_usage(79, 100), WindowStatus::Healthy);
        assert_eq!(WindowStatus::from_usage(80, 100), WindowStatus::Warning);
        assert_eq!(WindowStatus::from_usage(95, 100), WindowStatus::Critical);
        assert_eq!(WindowStatus::from_usage(100, 100), WindowStatus::Blocked);
        assert_eq!(WindowStatus::from_usage(140, 100), WindowStatus::Blocked);
        assert_eq!(WindowStatus::from_usage(0, 0), WindowStatus::Blocked);
    }

    #[test]
    fn worst_status_orders_last() {
        let worst = [WindowStatus::Warning, WindowStatus::Blocked, WindowStatus::Healthy]
            .into_iter()
            .max();
        assert_eq!(worst, Some(WindowStatus::Blocked));
    }

    #[test]
    fn outcome_mapping_from_errors() {
        let rl = SarthiError::RateLimited {
            provider: "p".into(),
            retry_after: None,
        };
        assert_eq!(AttemptOutcome::from_error(&rl), AttemptOutcome::RateLimited);
        let to = SarthiError::Timeout {
            provider: "p".into(),
            duration: Duration::from_millis(10),
        };
        assert_eq!(AttemptOutcome::from_error(&to), AttemptOutcome::Timeout);
        assert_eq!(
            AttemptOutcome::from_error(&SarthiError::provider("500")),
            AttemptOutcome::ProviderError
        );
    }

    #[test]
    fn token_usage_uses_short_field_names() {
        let usage = TokenUsage {
            input_tokens: 3,
            output_tokens: 7,
        };
        let json = serde_json::to_value(usage).unwrap();
        assert_eq!(json, serde_json::json!({"input": 3, "output": 7}));
    }

    #[test]
    fn provider_kind_defaults() {
        assert_eq!(
            ProviderKind::Groq.default_base_url(),
            Some("https://api.groq.com/openai/v1")
        );
        assert!(ProviderKind::OpenAiCompatible.default_base_url().is_none());
        assert_eq!("open_router".parse::<ProviderKind>().unwrap(), ProviderKind::OpenRouter);
    }

    proptest::proptest! {
        #[test]
        fn status_is_monotonic_in_usage(limit in 1u32..10_000, a in 0u32..20_000, b in 0u32..20_000) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            proptest::prop_assert!(WindowStatus::from_usage(lo, limit) <= WindowStatus::from_usage(hi, limit));
        }
    }
}
