// SPDX-FileCopyrightText: 2026 Sarthi Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fixed-corpus [`RetrievalAdapter`] for augmentation tests.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use sarthi_core::traits::{PluginAdapter, RetrievalAdapter};
use sarthi_core::types::{AdapterType, HealthStatus, RetrievedDocument};
use sarthi_core::SarthiError;

/// Returns the same ranked documents for every search.
#[derive(Default)]
pub struct StaticRetrieval {
    documents: Vec<(RetrievedDocument, String)>,
    failing: bool,
    searches: AtomicUsize,
}

impl StaticRetrieval {
    pub fn new() -> Self {
        Self::default()
    }

    /// A retrieval backend whose searches always fail.
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    /// Add a document. `score` orders results, highest first.
    pub fn with_document(
        mut self,
        id: impl Into<String>,
        title: impl Into<String>,
        body: impl Into<String>,
        score: f32,
    ) -> Self {
        let body = body.into();
        let snippet: String = body.chars().take(120).collect();
        self.documents.push((
            RetrievedDocument {
                id: id.into(),
                title: title.into(),
                snippet,
                score,
            },
            body,
        ));
        self
    }

    pub fn search_count(&self) -> usize {
        self.searches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PluginAdapter for StaticRetrieval {
    fn name(&self) -> &str {
        "static-retrieval"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Retrieval
    }

    async fn health_check(&self) -> Result<HealthStatus, SarthiError> {
        if self.failing {
            return Ok(HealthStatus::Unhealthy("scripted failure".into()));
        }
        Ok(HealthStatus::Healthy)
    }
}

#[async_trait]
impl RetrievalAdapter for StaticRetrieval {
    async fn search(&self, _query: &str, limit: usize) -> Result<Vec<RetrievedDocument>, SarthiError> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        if self.failing {
            return Err(SarthiError::Retrieval {
                message: "search backend unavailable".into(),
            });
        }
        let mut ranked: Vec<RetrievedDocument> =
            self.documents.iter().map(|(doc, _)| doc.clone()).collect();
        ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
        ranked.truncate(limit);
        Ok(ranked)
    }

    async fn fetch_document(&self, id: &str) -> Result<String, SarthiError> {
        self.documents
            .iter()
            .find(|(doc, _)| doc.id == id)
            .map(|(_, body)| body.clone())
            .ok_or_else(|| SarthiError::Retrieval {
                message: format!("unknown document `{id}`"),
            })
    }
}
