// SPDX-FileCopyrightText: 2026 Sarthi Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The fallback state machine.
//!
//! `Classify -> CacheLookup -> AttemptTier(i)... -> Done | GracefulDegradation`.
//! Provider failures never reach the caller: they become attempt records and
//! a move to the next tier. Only malformed requests and internal faults (a
//! poisoned lock) are returned as errors.
//!
//! Every await on a collaborator is bounded: provider calls by their timeout,
//! the profile lookup and retrieval by `context_timeout_ms`, usage log appends
//! by `usage_log_timeout_ms`, and all of them by the remaining budget.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use sarthi_cache::cache_key;
use sarthi_config::{CacheConfig, RoutingConfig, SarthiConfig};
use sarthi_core::error::SarthiError;
use sarthi_core::traits::{Admission, Cache, RateLimiter, RetrievalAdapter, UsageStore};
use sarthi_core::types::{
    AttemptOutcome, AttemptRecord, CacheKey, CachedResponse, ChatType, ContextBlock,
    ContextKind, ProviderResponse, Query, QueryClassification, QueryType, RouteRequest,
    RouteResponse, Tier, TierUsed, TokenUsage,
};
use sarthi_router::{ProviderRegistry, QueryClassifier, RegisteredProvider, RegistrySnapshot};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::chain::FallbackChain;
use crate::prompt::PromptBuilder;
use crate::validator::{OutputIssue, OutputPolicy, validate};

/// Longest document body pulled into a study-assistant prompt.
const MAX_DOCUMENT_CHARS: usize = 2000;

/// Routes queries across the provider chain.
pub struct Orchestrator {
    registry: Arc<ProviderRegistry>,
    limiter: Arc<dyn RateLimiter>,
    cache: Arc<dyn Cache>,
    usage_store: Option<Arc<dyn UsageStore>>,
    retrieval: Option<Arc<dyn RetrievalAdapter>>,
    classifier: QueryClassifier,
    prompts: PromptBuilder,
    routing: RoutingConfig,
    cache_config: CacheConfig,
}

/// Mutable state of one `route` call.
struct RouteRun<'a> {
    request_id: String,
    query: &'a Query,
    context: Vec<ContextBlock>,
    policy: OutputPolicy,
    deadline: Instant,
    attempts: Vec<AttemptRecord>,
    script_retry_used: bool,
}

impl RouteRun<'_> {
    fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// `limit`, shortened to what is left of the budget.
    fn bounded(&self, limit: Duration) -> Duration {
        limit.min(self.remaining())
    }
}

/// A provider answer that passed validation.
struct Served {
    provider_id: String,
    model: String,
    tier: Tier,
    response: ProviderResponse,
}

enum TierResult {
    Served(Served),
    /// The provider's quota was spent before its first call.
    Blocked,
    Failed,
    BudgetSpent,
}

/// When a provider call started and how long it took.
struct Timing {
    started_at: chrono::DateTime<Utc>,
    duration_ms: u64,
}

impl Orchestrator {
    pub fn new(
        config: &SarthiConfig,
        registry: Arc<ProviderRegistry>,
        limiter: Arc<dyn RateLimiter>,
        cache: Arc<dyn Cache>,
    ) -> Self {
        Self {
            registry,
            limiter,
            cache,
            usage_store: None,
            retrieval: None,
            classifier: QueryClassifier::new(),
            prompts: PromptBuilder::new(&config.agent.name, config.routing.max_tokens),
            routing: config.routing.clone(),
            cache_config: config.cache.clone(),
        }
    }

    /// Attach the usage log and profile source.
    pub fn with_usage_store(mut self, store: Arc<dyn UsageStore>) -> Self {
        self.usage_store = Some(store);
        self
    }

    /// Attach a search/document retrieval collaborator.
    pub fn with_retrieval(mut self, retrieval: Arc<dyn RetrievalAdapter>) -> Self {
        self.retrieval = Some(retrieval);
        self
    }

    /// Drop every cached answer for a user, e.g. after new study activity.
    pub fn invalidate_user(&self, user_id: &str) -> Result<usize, SarthiError> {
        self.cache.invalidate_user(user_id)
    }

    /// Route one request to completion.
    ///
    /// Always returns non-empty content for a valid request: a provider answer,
    /// a cached answer, or the degraded message.
    pub async fn route(&self, request: RouteRequest) -> Result<RouteResponse, SarthiError> {
        let started = Instant::now();
        let query = Query::from_request(
            &request,
            self.routing.history_limit,
            self.routing.max_message_chars,
        )?;
        let classification = self.classifier.classify(&query.text);
        let query_type = classification.query_type;

        let snapshot = self.registry.snapshot();
        let pin = resolve_pin(&snapshot, &request)?;

        let key = (self.cache_config.enabled && pin.is_none()).then(|| cache_key(&query));
        if let Some(key) = &key {
            if let Some(entry) = self.cache.get(key)? {
                debug!(
                    namespace = %key.namespace,
                    hits = entry.hit_count,
                    query_type = %query_type,
                    "cache hit"
                );
                return Ok(entry.response.into_response(elapsed_ms(started)));
            }
            debug!(namespace = %key.namespace, query_type = %query_type, "cache miss");
        }

        let mut run = RouteRun {
            request_id: uuid::Uuid::new_v4().to_string(),
            query: &query,
            context: Vec::new(),
            policy: OutputPolicy::for_chat_type(query.chat_type),
            deadline: started + self.routing.total_budget(),
            attempts: Vec::new(),
            script_retry_used: false,
        };
        run.context = self.gather_context(&run, &classification).await;

        let (mut chain, pinned_model) = match pin {
            Some((provider, model)) => (FallbackChain::pinned(query_type, provider), model),
            None => (FallbackChain::new(query_type, snapshot.tiers()), None),
        };

        let served = self
            .run_chain(&mut chain, &mut run, pinned_model.as_deref())
            .await;

        let response = match served {
            Ok(served) => {
                let fallback_used = run
                    .attempts
                    .first()
                    .is_some_and(|first| {
                        first.provider_id != served.provider_id || first.model != served.model
                    });
                info!(
                    request_id = %run.request_id,
                    provider = %served.provider_id,
                    model = %served.model,
                    tier = served.tier.get(),
                    query_type = %query_type,
                    fallback_used,
                    latency_ms = elapsed_ms(started),
                    "query routed"
                );
                RouteResponse {
                    content: served.response.content,
                    provider_used: Some(served.provider_id),
                    model_used: Some(served.model),
                    tier_used: TierUsed::Tier(served.tier),
                    cached: false,
                    fallback_used,
                    tokens_used: served.response.usage,
                    latency_ms: elapsed_ms(started),
                    query_type,
                    attempts: run.attempts,
                }
            }
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                info!(
                    request_id = %run.request_id,
                    query_type = %chain.query_type(),
                    attempts = run.attempts.len(),
                    calls = chain.total_calls(),
                    tiers_left = !chain.is_exhausted(),
                    last_error = chain.last_error().unwrap_or("none"),
                    reason = %e,
                    latency_ms = elapsed_ms(started),
                    "serving degraded response"
                );
                RouteResponse {
                    content: self.routing.degraded_message.clone(),
                    provider_used: None,
                    model_used: None,
                    tier_used: TierUsed::Terminal,
                    cached: false,
                    fallback_used: true,
                    tokens_used: TokenUsage::default(),
                    latency_ms: elapsed_ms(started),
                    query_type,
                    attempts: run.attempts,
                }
            }
        };

        if let Some(key) = key {
            self.write_through(key, &query, &response)?;
        }
        Ok(response)
    }

    /// Walk the chain until a provider serves. Running out of tiers or of
    /// budget is [`SarthiError::ExhaustedChain`]; the caller degrades.
    async fn run_chain(
        &self,
        chain: &mut FallbackChain,
        run: &mut RouteRun<'_>,
        pinned_model: Option<&str>,
    ) -> Result<Served, SarthiError> {
        while let Some((tier, providers)) = chain.current() {
            let providers = providers.to_vec();

            if run.remaining().is_zero() {
                chain.set_last_error("total time budget spent");
                return Err(SarthiError::ExhaustedChain);
            }

            // First provider of the tier with quota left gets the call.
            for provider in providers {
                match self
                    .attempt_provider(chain, run, tier, &provider, pinned_model)
                    .await?
                {
                    TierResult::Served(served) => return Ok(served),
                    TierResult::Blocked => {
                        let model = pinned_model.unwrap_or_else(|| provider.descriptor.primary_model());
                        self.record_local_skip(chain, run, tier, &provider, model).await;
                    }
                    TierResult::Failed => break,
                    TierResult::BudgetSpent => {
                        chain.set_last_error("total time budget spent");
                        return Err(SarthiError::ExhaustedChain);
                    }
                }
            }

            chain.advance();
        }
        Err(SarthiError::ExhaustedChain)
    }

    /// Try one provider: its primary model, then same-tier model fallbacks.
    async fn attempt_provider(
        &self,
        chain: &mut FallbackChain,
        run: &mut RouteRun<'_>,
        tier: Tier,
        provider: &RegisteredProvider,
        pinned_model: Option<&str>,
    ) -> Result<TierResult, SarthiError> {
        let descriptor = &provider.descriptor;
        let models: Vec<&str> = match pinned_model {
            Some(model) => vec![model],
            None if descriptor.model_fallback => descriptor
                .models
                .iter()
                .take(1 + self.routing.max_model_retries as usize)
                .map(String::as_str)
                .collect(),
            None => vec![descriptor.primary_model()],
        };

        for (index, model) in models.into_iter().enumerate() {
            if run.remaining().is_zero() {
                return Ok(TierResult::BudgetSpent);
            }
            let Some((timing, result)) = self.invoke(chain, run, tier, provider, model, false).await?
            else {
                if index == 0 {
                    return Ok(TierResult::Blocked);
                }
                self.record_local_skip(chain, run, tier, provider, model).await;
                return Ok(TierResult::Failed);
            };

            let response = match result {
                Ok(response) => response,
                Err(err) => {
                    let outcome = self
                        .record_failure(chain, run, tier, provider, model, &timing, err)
                        .await?;
                    // A remote quota answer blocks the whole provider.
                    if outcome == AttemptOutcome::RateLimited {
                        return Ok(TierResult::Failed);
                    }
                    continue;
                }
            };

            match validate(&response.content, run.policy).issue {
                None => {
                    self.record_success(run, tier, provider, model, &timing).await;
                    return Ok(TierResult::Served(served(provider, model, tier, response)));
                }
                Some(OutputIssue::Empty) => {
                    self.record_invalid(chain, run, tier, provider, model, &timing, OutputIssue::Empty)
                        .await;
                    return Ok(TierResult::Failed);
                }
                Some(OutputIssue::NonRomanScript) if run.script_retry_used => {
                    // The single retry for this request is spent; accept as-is.
                    self.record_success(run, tier, provider, model, &timing).await;
                    return Ok(TierResult::Served(served(provider, model, tier, response)));
                }
                Some(issue @ OutputIssue::NonRomanScript) => {
                    self.record_invalid(chain, run, tier, provider, model, &timing, issue)
                        .await;
                    run.script_retry_used = true;
                    if run.remaining().is_zero() {
                        return Ok(TierResult::BudgetSpent);
                    }

                    let Some((timing, result)) =
                        self.invoke(chain, run, tier, provider, model, true).await?
                    else {
                        self.record_local_skip(chain, run, tier, provider, model).await;
                        return Ok(TierResult::Failed);
                    };
                    match result {
                        Ok(response) if !response.content.trim().is_empty() => {
                            self.record_success(run, tier, provider, model, &timing).await;
                            return Ok(TierResult::Served(served(provider, model, tier, response)));
                        }
                        Ok(_) => {
                            self.record_invalid(chain, run, tier, provider, model, &timing, OutputIssue::Empty)
                                .await;
                            return Ok(TierResult::Failed);
                        }
                        Err(err) => {
                            let outcome = self
                                .record_failure(chain, run, tier, provider, model, &timing, err)
                                .await?;
                            if outcome == AttemptOutcome::RateLimited {
                                return Ok(TierResult::Failed);
                            }
                        }
                    }
                }
            }
        }
        Ok(TierResult::Failed)
    }

    /// Admit, time-box and perform one provider call. `None` when the
    /// provider's quota is spent and no call was made.
    async fn invoke(
        &self,
        chain: &mut FallbackChain,
        run: &RouteRun<'_>,
        tier: Tier,
        provider: &RegisteredProvider,
        model: &str,
        script_retry: bool,
    ) -> Result<Option<(Timing, Result<ProviderResponse, SarthiError>)>, SarthiError> {
        let descriptor = &provider.descriptor;
        if self.limiter.try_acquire(&descriptor.id)? == Admission::Blocked {
            return Ok(None);
        }
        chain.record_call(tier);

        let request = self
            .prompts
            .build(run.query, &run.context, model, script_retry);
        let timeout = run.bounded(descriptor.rate_limit.timeout);

        let started_at = Utc::now();
        let started = Instant::now();
        let result = match tokio::time::timeout(timeout, provider.adapter.complete(request)).await {
            Ok(result) => result,
            Err(_) => Err(SarthiError::Timeout {
                provider: descriptor.id.clone(),
                duration: timeout,
            }),
        };

        let timing = Timing {
            started_at,
            duration_ms: elapsed_ms(started),
        };
        Ok(Some((timing, result)))
    }

    /// A local `rate_limited` record: no call was made.
    async fn record_local_skip(
        &self,
        chain: &mut FallbackChain,
        run: &mut RouteRun<'_>,
        tier: Tier,
        provider: &RegisteredProvider,
        model: &str,
    ) {
        debug!(provider = %provider.descriptor.id, tier = tier.get(), "provider blocked locally, skipping");
        chain.set_last_error(format!("{} blocked locally", provider.descriptor.id));
        let record = AttemptRecord {
            request_id: run.request_id.clone(),
            provider_id: provider.descriptor.id.clone(),
            model: model.to_string(),
            tier,
            started_at: Utc::now(),
            duration_ms: 0,
            outcome: AttemptOutcome::RateLimited,
            error: Some("local quota exhausted".into()),
        };
        self.log_attempt(run, record).await;
    }

    async fn record_success(
        &self,
        run: &mut RouteRun<'_>,
        tier: Tier,
        provider: &RegisteredProvider,
        model: &str,
        timing: &Timing,
    ) {
        let record = attempt_record(run, tier, provider, model, timing, AttemptOutcome::Success, None);
        self.log_attempt(run, record).await;
    }

    #[allow(clippy::too_many_arguments)]
    async fn record_invalid(
        &self,
        chain: &mut FallbackChain,
        run: &mut RouteRun<'_>,
        tier: Tier,
        provider: &RegisteredProvider,
        model: &str,
        timing: &Timing,
        issue: OutputIssue,
    ) {
        let err = SarthiError::Validation(issue.to_string());
        let outcome = AttemptOutcome::from_error(&err);
        warn!(
            provider = %provider.descriptor.id,
            model,
            tier = tier.get(),
            outcome = %outcome,
            duration_ms = timing.duration_ms,
            error = %err,
            "provider output rejected"
        );
        chain.set_last_error(err.to_string());
        let record = attempt_record(
            run,
            tier,
            provider,
            model,
            timing,
            outcome,
            Some(issue.to_string()),
        );
        self.log_attempt(run, record).await;
    }

    #[allow(clippy::too_many_arguments)]
    async fn record_failure(
        &self,
        chain: &mut FallbackChain,
        run: &mut RouteRun<'_>,
        tier: Tier,
        provider: &RegisteredProvider,
        model: &str,
        timing: &Timing,
        err: SarthiError,
    ) -> Result<AttemptOutcome, SarthiError> {
        let outcome = AttemptOutcome::from_error(&err);
        warn!(
            provider = %provider.descriptor.id,
            model,
            tier = tier.get(),
            outcome = %outcome,
            duration_ms = timing.duration_ms,
            error = %err,
            "provider attempt failed"
        );
        if outcome == AttemptOutcome::RateLimited {
            self.limiter.mark_exhausted(&provider.descriptor.id)?;
        }
        chain.set_last_error(err.to_string());
        let record = attempt_record(
            run,
            tier,
            provider,
            model,
            timing,
            outcome,
            Some(err.to_string()),
        );
        self.log_attempt(run, record).await;
        Ok(outcome)
    }

    /// Append to the in-memory log and the usage store. Store failures and
    /// slow stores are logged and swallowed.
    async fn log_attempt(&self, run: &mut RouteRun<'_>, record: AttemptRecord) {
        if let Some(store) = &self.usage_store {
            let wait = run.bounded(self.routing.usage_log_timeout());
            match tokio::time::timeout(wait, store.append_usage_log(&record)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(
                    request_id = %record.request_id,
                    provider = %record.provider_id,
                    error = %e,
                    "failed to append usage log"
                ),
                Err(_) => warn!(
                    request_id = %record.request_id,
                    provider = %record.provider_id,
                    waited_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX),
                    "usage log append timed out, record dropped"
                ),
            }
        }
        run.attempts.push(record);
    }

    /// Caller context plus profile data and retrieved documents.
    async fn gather_context(
        &self,
        run: &RouteRun<'_>,
        classification: &QueryClassification,
    ) -> Vec<ContextBlock> {
        let query = run.query;
        let mut context = query.context_blocks.clone();

        if classification.query_type == QueryType::AppData
            && let Some(store) = &self.usage_store
        {
            let wait = run.bounded(self.routing.context_timeout());
            match tokio::time::timeout(wait, store.user_profile(&query.user_id)).await {
                Ok(Ok(Some(profile))) => context.push(ContextBlock {
                    kind: ContextKind::Profile,
                    title: None,
                    content: profile,
                }),
                Ok(Ok(None)) => debug!(user_id = %query.user_id, "no profile for app data query"),
                Ok(Err(e)) => warn!(error = %e, "profile lookup failed, continuing without it"),
                Err(_) => warn!(user_id = %query.user_id, "profile lookup timed out, continuing without it"),
            }
        }

        if (classification.recommend_augmentation || query.augment)
            && let Some(retrieval) = &self.retrieval
        {
            let wait = run.bounded(self.routing.context_timeout());
            match tokio::time::timeout(wait, self.retrieve(retrieval.as_ref(), query)).await {
                Ok(Ok(blocks)) => context.extend(blocks),
                Ok(Err(e)) => warn!(error = %e, "retrieval failed, continuing without it"),
                Err(_) => warn!("retrieval timed out, continuing without it"),
            }
        }

        context
    }

    async fn retrieve(
        &self,
        retrieval: &dyn RetrievalAdapter,
        query: &Query,
    ) -> Result<Vec<ContextBlock>, SarthiError> {
        let documents = retrieval
            .search(&query.text, self.routing.retrieval_limit)
            .await?;

        let mut blocks = Vec::with_capacity(documents.len());
        for (rank, doc) in documents.into_iter().enumerate() {
            // Study questions get the full body of the best match.
            let (kind, content) = if query.chat_type == ChatType::StudyAssistant && rank == 0 {
                match retrieval.fetch_document(&doc.id).await {
                    Ok(text) => (
                        ContextKind::Document,
                        text.chars().take(MAX_DOCUMENT_CHARS).collect(),
                    ),
                    Err(e) => {
                        debug!(document = %doc.id, error = %e, "document fetch failed, using snippet");
                        (ContextKind::Document, doc.snippet)
                    }
                }
            } else if query.chat_type == ChatType::StudyAssistant {
                (ContextKind::Document, doc.snippet)
            } else {
                (ContextKind::SearchResult, doc.snippet)
            };
            blocks.push(ContextBlock {
                kind,
                title: Some(doc.title),
                content,
            });
        }
        Ok(blocks)
    }

    fn write_through(
        &self,
        key: CacheKey,
        query: &Query,
        response: &RouteResponse,
    ) -> Result<(), SarthiError> {
        let ttl = if response.is_degraded() {
            self.cache_config.degraded_ttl_secs
        } else {
            match query.chat_type {
                ChatType::General => self.cache_config.general_ttl_secs,
                ChatType::StudyAssistant => self.cache_config.study_assistant_ttl_secs,
            }
        };
        self.cache.set(
            key,
            &query.user_id,
            CachedResponse::from(response),
            Duration::from_secs(ttl),
        )
    }
}

/// Resolve `provider` / `model` pins against the registry.
fn resolve_pin(
    snapshot: &RegistrySnapshot,
    request: &RouteRequest,
) -> Result<Option<(Arc<RegisteredProvider>, Option<String>)>, SarthiError> {
    let provider = request.provider.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let model = request
        .model
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    match (provider, model) {
        (None, None) => Ok(None),
        (Some(id), model) => {
            let provider = snapshot
                .get(id)
                .ok_or_else(|| SarthiError::InvalidRequest(format!("unknown provider `{id}`")))?;
            if !provider.descriptor.enabled {
                return Err(SarthiError::InvalidRequest(format!(
                    "provider `{id}` is disabled"
                )));
            }
            Ok(Some((provider, model)))
        }
        (None, Some(model)) => snapshot
            .providers()
            .iter()
            .find(|p| p.descriptor.enabled && p.descriptor.models.contains(&model))
            .cloned()
            .map(|p| Some((p, Some(model.clone()))))
            .ok_or_else(|| {
                SarthiError::InvalidRequest(format!("no enabled provider serves model `{model}`"))
            }),
    }
}

fn served(provider: &RegisteredProvider, model: &str, tier: Tier, response: ProviderResponse) -> Served {
    Served {
        provider_id: provider.descriptor.id.clone(),
        model: model.to_string(),
        tier,
        response,
    }
}

fn attempt_record(
    run: &RouteRun<'_>,
    tier: Tier,
    provider: &RegisteredProvider,
    model: &str,
    timing: &Timing,
    outcome: AttemptOutcome,
    error: Option<String>,
) -> AttemptRecord {
    AttemptRecord {
        request_id: run.request_id.clone(),
        provider_id: provider.descriptor.id.clone(),
        model: model.to_string(),
        tier,
        started_at: timing.started_at,
        duration_ms: timing.duration_ms,
        outcome,
        error,
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
