//! Database schema migrations for SQLite.
//!
//! We use a simple versioned migration system. Each migration is a SQL string
//! that transforms the schema from version N to N+1.

use rusqlite::Connection;

use crate::error::{Result, StoreError};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

/// Initialize or migrate the database schema.
///
/// This function is idempotent - it can be called multiple times safely.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let current: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;

    if current > CURRENT_VERSION {
        return Err(StoreError::Migration(format!(
            "database schema version {} is newer than supported version {}",
            current, CURRENT_VERSION
        )));
    }

    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;

        for version in (current + 1)..=CURRENT_VERSION {
            apply_migration(&tx, version)?;

            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, now_millis()],
            )?;
            tracing::debug!(version, "applied schema migration");
        }

        tx.commit()?;
    }

    Ok(())
}

/// Apply a specific migration version.
fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => apply_v1(conn),
        _ => Err(StoreError::Migration(format!(
            "unknown migration version: {}",
            version
        ))),
    }
}

/// Migration v1: Initial schema.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Every code this installation has redeemed. Rows are never deleted.
        CREATE TABLE redeemed_codes (
            code TEXT PRIMARY KEY,             -- normalized 12-character code
            code_type TEXT NOT NULL,           -- CodeType::as_str
            granted_features INTEGER NOT NULL, -- PremiumFeature bitmask
            duration_days INTEGER,             -- NULL = never expires
            redeemed_at INTEGER NOT NULL,      -- Unix ms
            expires_at INTEGER,                -- Unix ms, NULL = never
            usage_limit INTEGER,               -- NULL = unlimited
            usage_count INTEGER NOT NULL DEFAULT 0,
            is_active INTEGER NOT NULL DEFAULT 1,
            deactivation_reason TEXT,          -- DeactivationReason::as_str
            deactivated_at INTEGER             -- Unix ms
        );

        -- Last published entitlement state (single row)
        CREATE TABLE entitlement_snapshots (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            computed_at INTEGER NOT NULL,
            active_features INTEGER NOT NULL,  -- bitmask, for inspection
            state BLOB NOT NULL                -- CBOR EntitlementState
        );

        CREATE INDEX idx_redeemed_codes_active ON redeemed_codes(is_active);
        CREATE INDEX idx_redeemed_codes_redeemed ON redeemed_codes(redeemed_at);
        "#,
    )?;

    Ok(())
}

/// Get current time in milliseconds.
fn now_millis() -> i64 {
    use entitle_core::{Clock, SystemClock};
    SystemClock.now_millis()
}
