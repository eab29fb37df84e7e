// SPDX-FileCopyrightText: 2026 Sarthi Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Retrieval adapter trait for search and document augmentation.

use async_trait::async_trait;

use crate::error::SarthiError;
use crate::traits::adapter::PluginAdapter;
use crate::types::RetrievedDocument;

/// Optional context provider consulted before the prompt is built.
#[async_trait]
pub trait RetrievalAdapter: PluginAdapter {
    /// Returns documents ranked by relevance, best first.
    async fn search(&self, query: &str, limit: usize)
    -> Result<Vec<RetrievedDocument>, SarthiError>;

    /// Fetches the full text of one document.
    async fn fetch_document(&self, id: &str) -> Result<String, SarthiError>;
}
