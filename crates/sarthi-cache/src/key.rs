// SPDX-FileCopyrightText: 2026 Sarthi Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deterministic cache keys.
//!
//! The digest covers the user, the chat type, the normalized message and a
//! fingerprint of everything else that shapes the answer (context blocks and
//! the capped history). Raw text never appears in a key.

use sarthi_core::types::{CacheKey, Query};
use sha2::{Digest, Sha256};

/// Field separator inside the hashed preimage. Cannot occur in UTF-8 text.
const SEP: &[u8] = &[0xff];

/// Build the cache key for a validated query.
pub fn cache_key(query: &Query) -> CacheKey {
    let mut hasher = Sha256::new();
    hasher.update(query.user_id.as_bytes());
    hasher.update(SEP);
    hasher.update(query.chat_type.to_string().as_bytes());
    hasher.update(SEP);
    hasher.update(query.normalized_text().as_bytes());
    hasher.update(SEP);
    hasher.update(context_fingerprint(query).as_bytes());

    CacheKey {
        namespace: query.chat_type,
        digest: hex::encode(hasher.finalize()),
    }
}

/// Hex SHA-256 of the context blocks and recent history, in order.
pub fn context_fingerprint(query: &Query) -> String {
    let mut hasher = Sha256::new();
    for block in &query.context_blocks {
        hasher.update(b"block");
        hasher.update(block.kind.to_string().as_bytes());
        hasher.update(SEP);
        hasher.update(block.title.as_deref().unwrap_or_default().as_bytes());
        hasher.update(SEP);
        hasher.update(block.content.as_bytes());
        hasher.update(SEP);
    }
    for turn in &query.recent_history {
        hasher.update(b"turn");
        hasher.update(turn.role.to_string().as_bytes());
        hasher.update(SEP);
        hasher.update(turn.content.as_bytes());
        hasher.update(SEP);
    }
    hex::encode(hasher.finalize())
}
