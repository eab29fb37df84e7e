// SPDX-FileCopyrightText: 2026 Sarthi Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the [`UsageStore`] trait.

use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::OptionalExtension;
use rusqlite::types::Type;
use tokio_rusqlite::Connection;
use tracing::debug;

use sarthi_config::model::StorageConfig;
use sarthi_core::{
    AdapterType, AttemptOutcome, AttemptRecord, HealthStatus, PluginAdapter, SarthiError, Tier,
    UsageStore,
};

use crate::migrations;

/// Convert a tokio-rusqlite error into `SarthiError::Storage`.
fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> SarthiError {
    SarthiError::Storage {
        source: Box::new(e),
    }
}

/// Usage log and profile store backed by one SQLite database.
///
/// Every statement goes through the connection's background thread, so
/// writes are serialized without extra locking.
pub struct SqliteUsageStore {
    conn: Connection,
}

impl SqliteUsageStore {
    /// Open (or create) the database at `path` and apply migrations.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, SarthiError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| SarthiError::Storage {
                source: Box::new(e),
            })?;
        }

        let conn = Connection::open(path)
            .await
            .map_err(|e| SarthiError::Storage {
                source: Box::new(e),
            })?;

        conn.call(|conn| -> Result<(), rusqlite::Error> {
            conn.busy_timeout(Duration::from_secs(5))?;
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
                row.get::<_, String>(0)
            })?;
            conn.pragma_update(None, "synchronous", "NORMAL")?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;

        let store = Self::with_connection(conn).await?;
        debug!(path = %path.display(), "usage store opened");
        Ok(store)
    }

    /// Open the database named by the `[storage]` section.
    pub async fn from_config(config: &StorageConfig) -> Result<Self, SarthiError> {
        Self::open(&config.database_path).await
    }

    /// A private in-memory database, used by tests and dry runs.
    pub async fn open_in_memory() -> Result<Self, SarthiError> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| SarthiError::Storage {
                source: Box::new(e),
            })?;
        Self::with_connection(conn).await
    }

    async fn with_connection(conn: Connection) -> Result<Self, SarthiError> {
        conn.call(|conn| -> Result<(), SarthiError> { migrations::run_migrations(conn) })
            .await
            .map_err(|e| SarthiError::Storage {
                source: Box::new(e),
            })?;
        Ok(Self { conn })
    }

    /// Insert or replace the profile text for `user_id`.
    pub async fn upsert_profile(&self, user_id: &str, profile: &str) -> Result<(), SarthiError> {
        let user_id = user_id.to_string();
        let profile = profile.to_string();
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);

        self.conn
            .call(move |conn| -> Result<(), rusqlite::Error> {
                conn.execute(
                    "INSERT INTO user_profiles (user_id, profile, updated_at) \
                     VALUES (?1, ?2, ?3) \
                     ON CONFLICT(user_id) DO UPDATE SET \
                     profile = excluded.profile, updated_at = excluded.updated_at",
                    rusqlite::params![user_id, profile, now],
                )?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }

    /// The newest `limit` attempt records, newest first.
    pub async fn recent_usage(&self, limit: usize) -> Result<Vec<AttemptRecord>, SarthiError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.conn
            .call(move |conn| -> Result<Vec<AttemptRecord>, rusqlite::Error> {
                let mut stmt = conn.prepare(
                    "SELECT request_id, provider_id, model, tier, started_at, duration_ms, \
                     outcome, error FROM usage_log ORDER BY id DESC LIMIT ?1",
                )?;
                let rows = stmt.query_map(rusqlite::params![limit], attempt_from_row)?;
                rows.collect()
            })
            .await
            .map_err(map_tr_err)
    }

    /// Attempt counts per outcome for one provider.
    pub async fn provider_outcome_counts(
        &self,
        provider_id: &str,
    ) -> Result<HashMap<AttemptOutcome, u64>, SarthiError> {
        let provider_id = provider_id.to_string();
        self.conn
            .call(move |conn| -> Result<HashMap<AttemptOutcome, u64>, rusqlite::Error> {
                let mut stmt = conn.prepare(
                    "SELECT outcome, COUNT(*) FROM usage_log \
                     WHERE provider_id = ?1 GROUP BY outcome",
                )?;
                let mut rows = stmt.query(rusqlite::params![provider_id])?;
                let mut counts = HashMap::new();
                while let Some(row) = rows.next()? {
                    let outcome = parse_outcome(row, 0)?;
                    let count: i64 = row.get(1)?;
                    counts.insert(outcome, u64::try_from(count).unwrap_or(0));
                }
                Ok(counts)
            })
            .await
            .map_err(map_tr_err)
    }
}

fn conversion_error(
    idx: usize,
    err: impl Into<Box<dyn std::error::Error + Send + Sync>>,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, err.into())
}

fn parse_outcome(row: &rusqlite::Row<'_>, idx: usize) -> Result<AttemptOutcome, rusqlite::Error> {
    let raw: String = row.get(idx)?;
    AttemptOutcome::from_str(&raw).map_err(|e| conversion_error(idx, e))
}

fn attempt_from_row(row: &rusqlite::Row<'_>) -> Result<AttemptRecord, rusqlite::Error> {
    let tier: u8 = row.get(3)?;
    let tier = Tier::new(tier).ok_or_else(|| conversion_error(3, "tier must be at least 1"))?;

    let started_at: String = row.get(4)?;
    let started_at = DateTime::parse_from_rfc3339(&started_at)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(4, e))?;

    let duration_ms: i64 = row.get(5)?;

    Ok(AttemptRecord {
        request_id: row.get(0)?,
        provider_id: row.get(1)?,
        model: row.get(2)?,
        tier,
        started_at,
        duration_ms: u64::try_from(duration_ms).unwrap_or(0),
        outcome: parse_outcome(row, 6)?,
        error: row.get(7)?,
    })
}

#[async_trait]
impl PluginAdapter for SqliteUsageStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, SarthiError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }
}

#[async_trait]
impl UsageStore for SqliteUsageStore {
    async fn append_usage_log(&self, record: &AttemptRecord) -> Result<(), SarthiError> {
        let request_id = record.request_id.clone();
        let provider_id = record.provider_id.clone();
        let model = record.model.clone();
        let tier = record.tier.get();
        let started_at = record
            .started_at
            .to_rfc3339_opts(SecondsFormat::Millis, true);
        let duration_ms = i64::try_from(record.duration_ms).unwrap_or(i64::MAX);
        let outcome = record.outcome.to_string();
        let error = record.error.clone();

        self.conn
            .call(move |conn| -> Result<(), rusqlite::Error> {
                conn.execute(
                    "INSERT INTO usage_log (request_id, provider_id, model, tier, \
                     started_at, duration_ms, outcome, error) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    rusqlite::params![
                        request_id,
                        provider_id,
                        model,
                        tier,
                        started_at,
                        duration_ms,
                        outcome,
                        error,
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }

    async fn user_profile(&self, user_id: &str) -> Result<Option<String>, SarthiError> {
        let user_id = user_id.to_string();
        self.conn
            .call(move |conn| -> Result<Option<String>, rusqlite::Error> {
                conn.query_row(
                    "SELECT profile FROM user_profiles WHERE user_id = ?1",
                    rusqlite::params![user_id],
                    |row| row.get(0),
                )
                .optional()
            })
            .await
            .map_err(map_tr_err)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn record(request_id: &str, provider: &str, outcome: AttemptOutcome) -> AttemptRecord {
        AttemptRecord {
            request_id: request_id.into(),
            provider_id: provider.into(),
            model: "llama-3.3-70b-versatile".into(),
            tier: Tier::new(1).unwrap(),
            started_at: Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap(),
            duration_ms: 420,
            outcome,
            error: (!outcome.is_success()).then(|| "upstream said no".to_string()),
        }
    }

    #[tokio::test]
    async fn appended_records_read_back_newest_first() {
        let store = SqliteUsageStore::open_in_memory().await.unwrap();
        store
            .append_usage_log(&record("r1", "groq", AttemptOutcome::RateLimited))
            .await
            .unwrap();
        store
            .append_usage_log(&record("r1", "gemini", AttemptOutcome::Success))
            .await
            .unwrap();

        let recent = store.recent_usage(10).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0], record("r1", "gemini", AttemptOutcome::Success));
        assert_eq!(recent[1].outcome, AttemptOutcome::RateLimited);
        assert_eq!(recent[1].error.as_deref(), Some("upstream said no"));

        assert_eq!(store.recent_usage(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn outcome_counts_are_per_provider() {
        let store = SqliteUsageStore::open_in_memory().await.unwrap();
        for outcome in [
            AttemptOutcome::Timeout,
            AttemptOutcome::Timeout,
            AttemptOutcome::Success,
        ] {
            store
                .append_usage_log(&record("r", "groq", outcome))
                .await
                .unwrap();
        }
        store
            .append_usage_log(&record("r", "gemini", AttemptOutcome::ProviderError))
            .await
            .unwrap();

        let counts = store.provider_outcome_counts("groq").await.unwrap();
        assert_eq!(counts.get(&AttemptOutcome::Timeout), Some(&2));
        assert_eq!(counts.get(&AttemptOutcome::Success), Some(&1));
        assert!(!counts.contains_key(&AttemptOutcome::ProviderError));

        assert!(store
            .provider_outcome_counts("nobody")
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn profile_upsert_replaces_previous_text() {
        let store = SqliteUsageStore::open_in_memory().await.unwrap();
        assert_eq!(store.user_profile("u1").await.unwrap(), None);

        store.upsert_profile("u1", "streak: 3 days").await.unwrap();
        store.upsert_profile("u1", "streak: 4 days").await.unwrap();

        assert_eq!(
            store.user_profile("u1").await.unwrap().as_deref(),
            Some("streak: 4 days")
        );
    }

    #[tokio::test]
    async fn file_database_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("sarthi.db");

        {
            let store = SqliteUsageStore::open(&path).await.unwrap();
            store.upsert_profile("u1", "class 10, CBSE").await.unwrap();
            store
                .append_usage_log(&record("r1", "groq", AttemptOutcome::Success))
                .await
                .unwrap();
        }

        let config = StorageConfig {
            database_path: path.to_string_lossy().into_owned(),
        };
        let reopened = SqliteUsageStore::from_config(&config).await.unwrap();
        assert_eq!(
            reopened.user_profile("u1").await.unwrap().as_deref(),
            Some("class 10, CBSE")
        );
        assert_eq!(reopened.recent_usage(5).await.unwrap().len(), 1);
        assert_eq!(
            reopened.health_check().await.unwrap(),
            HealthStatus::Healthy
        );
    }
}
