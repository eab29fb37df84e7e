// SPDX-FileCopyrightText: 2026 Sarthi Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedded schema migrations, applied on every open.

use sarthi_core::SarthiError;

mod embedded {
    use refinery::embed_migrations;
    embed_migrations!("migrations");
}

/// Apply pending migrations. Refinery records applied versions in
/// `refinery_schema_history`.
pub fn run_migrations(conn: &mut rusqlite::Connection) -> Result<(), SarthiError> {
    embedded::migrations::runner()
        .run(conn)
        .map_err(|e| SarthiError::Storage {
            source: Box::new(e),
        })?;
    Ok(())
}
