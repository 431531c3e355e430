//! Schema definitions and migration utilities.
//!
//! This module provides embedded SQL schema definitions and utilities
//! for managing database migrations.

use sqlx::PgPool;

use crate::error::{StoreError, StoreResult};

/// Embedded migration SQL for the notes table (001_notes.sql).
pub const NOTES_MIGRATION: &str = include_str!("../../../migrations/001_notes.sql");

/// Embedded migration SQL for share grants (002_share_grants.sql).
pub const SHARE_GRANTS_MIGRATION: &str =
    include_str!("../../../migrations/002_share_grants.sql");

/// Run all pending migrations against the database.
///
/// This function is idempotent - it can be run multiple times safely.
/// Migrations check for existing objects before creating them.
pub async fn run_migrations(pool: &PgPool) -> StoreResult<()> {
    tracing::info!("Running database migrations...");

    tracing::debug!("Running notes migration (001_notes.sql)...");
    sqlx::raw_sql(NOTES_MIGRATION)
        .execute(pool)
        .await
        .map_err(|e| StoreError::MigrationError(format!("Notes migration failed: {}", e)))?;

    tracing::debug!("Running share grants migration (002_share_grants.sql)...");
    sqlx::raw_sql(SHARE_GRANTS_MIGRATION)
        .execute(pool)
        .await
        .map_err(|e| {
            StoreError::MigrationError(format!("Share grants migration failed: {}", e))
        })?;

    tracing::info!("Migrations completed successfully");
    Ok(())
}

/// Check if the schema has been initialized.
///
/// Returns true if the `share_grants` table exists.
pub async fn is_schema_initialized(pool: &PgPool) -> StoreResult<bool> {
    let result: (bool,) = sqlx::query_as(
        r#"
        SELECT EXISTS (
            SELECT FROM information_schema.tables
            WHERE table_schema = 'public'
            AND table_name = 'share_grants'
        )
        "#,
    )
    .fetch_one(pool)
    .await?;

    Ok(result.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notes_migration_embedded() {
        assert!(NOTES_MIGRATION.contains("CREATE TABLE IF NOT EXISTS notes"));
        assert!(NOTES_MIGRATION.contains("owner_id"));
    }

    #[test]
    fn test_share_grants_migration_embedded() {
        assert!(SHARE_GRANTS_MIGRATION.contains("CREATE TABLE IF NOT EXISTS share_grants"));
        assert!(SHARE_GRANTS_MIGRATION.contains("token         TEXT PRIMARY KEY"));
        assert!(SHARE_GRANTS_MIGRATION.contains("'read', 'write', 'full'"));
    }
}
