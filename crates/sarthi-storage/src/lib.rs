// SPDX-FileCopyrightText: 2026 Sarthi Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence for the Sarthi query router.
//!
//! Holds the attempt usage log and the student profiles used to enrich
//! `app_data` queries. All statements run on tokio-rusqlite's single
//! background thread; the schema is managed by embedded refinery migrations.

pub mod migrations;
pub mod store;

pub use store::SqliteUsageStore;
