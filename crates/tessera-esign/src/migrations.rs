// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Database migrations for tessera-esign.
//!
//! Hosts that own their SQLite pool apply the schema with [`run_sqlite`]
//! before handing the pool to [`SqliteStore`](crate::store::SqliteStore).
//!
//! # Example
//!
//! ```ignore
//! let pool = SqlitePool::connect("sqlite:esign.db?mode=rwc").await?;
//! tessera_esign::migrations::run_sqlite(&pool).await?;
//! ```

use sqlx::migrate::MigrateError;

/// SQLite migrator with the job run, email log and audit schema embedded.
pub static SQLITE: sqlx::migrate::Migrator = sqlx::migrate!("./migrations/sqlite");

/// Run SQLite migrations. Already-applied migrations are skipped.
pub async fn run_sqlite(pool: &sqlx::SqlitePool) -> Result<(), MigrateError> {
    SQLITE.run(pool).await
}
