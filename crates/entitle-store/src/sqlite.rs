//! SQLite implementation of the AccessCodeStore trait.
//!
//! This is the durable backend for redemption state. It uses rusqlite with
//! bundled SQLite, wrapped in async via tokio::spawn_blocking.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};

use entitle_core::{
    features_from_bitmask, features_to_bitmask, redact, AccessCode, CodeType, EntitlementState,
};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::record::{DeactivationReason, RedeemedCodeRecord};
use crate::snapshot::{decode_snapshot, encode_snapshot};
use crate::traits::AccessCodeStore;

const RECORD_COLUMNS: &str = "code, code_type, granted_features, duration_days, redeemed_at,
    expires_at, usage_limit, usage_count, is_active, deactivation_reason, deactivated_at";

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn run<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = lock(&conn)?;
            f(&mut guard)
        })
        .await
        .map_err(|e| StoreError::Unavailable(format!("spawn_blocking failed: {}", e)))?
    }
}

fn lock(conn: &Mutex<Connection>) -> Result<MutexGuard<'_, Connection>> {
    conn.lock()
        .map_err(|e| StoreError::Unavailable(format!("mutex poisoned: {}", e)))
}

/// Column values exactly as stored, before domain validation.
struct RawRecord {
    code: String,
    code_type: String,
    granted_features: u32,
    duration_days: Option<u32>,
    redeemed_at: i64,
    expires_at: Option<i64>,
    usage_limit: Option<u32>,
    usage_count: u32,
    is_active: bool,
    deactivation_reason: Option<String>,
    deactivated_at: Option<i64>,
}

impl RawRecord {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            code: row.get("code")?,
            code_type: row.get("code_type")?,
            granted_features: row.get("granted_features")?,
            duration_days: row.get("duration_days")?,
            redeemed_at: row.get("redeemed_at")?,
            expires_at: row.get("expires_at")?,
            usage_limit: row.get("usage_limit")?,
            usage_count: row.get("usage_count")?,
            is_active: row.get("is_active")?,
            deactivation_reason: row.get("deactivation_reason")?,
            deactivated_at: row.get("deactivated_at")?,
        })
    }

    fn into_record(self) -> Result<RedeemedCodeRecord> {
        let redacted = redact(&self.code);
        let code_type = CodeType::parse(&self.code_type).ok_or_else(|| {
            StoreError::Corrupted(format!(
                "unknown code type {:?} for {}",
                self.code_type, redacted
            ))
        })?;
        let features = features_from_bitmask(self.granted_features).ok_or_else(|| {
            StoreError::Corrupted(format!(
                "invalid feature mask {:#x} for {}",
                self.granted_features, redacted
            ))
        })?;
        let deactivation_reason = match self.deactivation_reason.as_deref() {
            None => None,
            Some(s) => Some(DeactivationReason::parse(s).ok_or_else(|| {
                StoreError::Corrupted(format!(
                    "unknown deactivation reason {:?} for {}",
                    s, redacted
                ))
            })?),
        };

        Ok(RedeemedCodeRecord {
            access_code: AccessCode::from_parts(
                self.code,
                code_type,
                features,
                self.duration_days,
                self.usage_limit,
            ),
            redeemed_at: self.redeemed_at,
            expires_at: self.expires_at,
            usage_count: self.usage_count,
            is_active: self.is_active,
            deactivation_reason,
            deactivated_at: self.deactivated_at,
        })
    }
}

fn find_record(conn: &Connection, code: &str) -> Result<Option<RedeemedCodeRecord>> {
    let sql = format!("SELECT {} FROM redeemed_codes WHERE code = ?1", RECORD_COLUMNS);
    conn.query_row(&sql, params![code], RawRecord::from_row)
        .optional()?
        .map(RawRecord::into_record)
        .transpose()
}

#[async_trait]
impl AccessCodeStore for SqliteStore {
    async fn find(&self, code: &str) -> Result<Option<RedeemedCodeRecord>> {
        let code = code.to_string();
        self.run(move |conn| find_record(conn, &code)).await
    }

    async fn insert(&self, record: &RedeemedCodeRecord) -> Result<()> {
        let record = record.clone();

        self.run(move |conn| {
            let code = &record.access_code;
            let result = conn.execute(
                "INSERT INTO redeemed_codes (
                    code, code_type, granted_features, duration_days, redeemed_at,
                    expires_at, usage_limit, usage_count, is_active,
                    deactivation_reason, deactivated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    code.code(),
                    code.code_type().as_str(),
                    features_to_bitmask(code.granted_features()),
                    code.duration_days(),
                    record.redeemed_at,
                    record.expires_at,
                    code.usage_limit(),
                    record.usage_count,
                    record.is_active,
                    record.deactivation_reason.map(DeactivationReason::as_str),
                    record.deactivated_at,
                ],
            );

            match result {
                Ok(_) => Ok(()),
                Err(rusqlite::Error::SqliteFailure(failure, _))
                    if failure.code == ErrorCode::ConstraintViolation =>
                {
                    Err(StoreError::Duplicate(code.redacted()))
                }
                Err(e) => Err(e.into()),
            }
        })
        .await
    }

    async fn increment_usage(&self, code: &str) -> Result<u32> {
        let code = code.to_string();

        self.run(move |conn| {
            let tx = conn.transaction()?;
            let changed = tx.execute(
                "UPDATE redeemed_codes SET usage_count = usage_count + 1 WHERE code = ?1",
                params![code],
            )?;
            if changed == 0 {
                return Err(StoreError::NotFound(redact(&code)));
            }

            let count: u32 = tx.query_row(
                "SELECT usage_count FROM redeemed_codes WHERE code = ?1",
                params![code],
                |row| row.get(0),
            )?;
            tx.commit()?;
            Ok(count)
        })
        .await
    }

    async fn deactivate(&self, code: &str, reason: DeactivationReason, at: i64) -> Result<()> {
        let code = code.to_string();

        self.run(move |conn| {
            // The first deactivation wins; later calls leave reason and time alone.
            let changed = conn.execute(
                "UPDATE redeemed_codes SET
                    is_active = 0,
                    deactivation_reason = COALESCE(deactivation_reason, ?2),
                    deactivated_at = COALESCE(deactivated_at, ?3)
                 WHERE code = ?1",
                params![code, reason.as_str(), at],
            )?;
            if changed == 0 {
                return Err(StoreError::NotFound(redact(&code)));
            }
            Ok(())
        })
        .await
    }

    async fn list_records(&self) -> Result<Vec<RedeemedCodeRecord>> {
        self.run(|conn| {
            let sql = format!(
                "SELECT {} FROM redeemed_codes ORDER BY redeemed_at ASC, code ASC",
                RECORD_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let raws = stmt
                .query_map([], RawRecord::from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            raws.into_iter().map(RawRecord::into_record).collect()
        })
        .await
    }

    async fn save_snapshot(&self, state: &EntitlementState) -> Result<()> {
        let bytes = encode_snapshot(state)?;
        let computed_at = state.last_recomputed_at;
        let mask = features_to_bitmask(&state.active_features);

        self.run(move |conn| {
            conn.execute(
                "INSERT INTO entitlement_snapshots (id, computed_at, active_features, state)
                 VALUES (1, ?1, ?2, ?3)
                 ON CONFLICT(id) DO UPDATE SET
                    computed_at = excluded.computed_at,
                    active_features = excluded.active_features,
                    state = excluded.state",
                params![computed_at, mask, bytes],
            )?;
            Ok(())
        })
        .await
    }

    async fn load_snapshot(&self) -> Result<Option<EntitlementState>> {
        self.run(|conn| {
            let bytes: Option<Vec<u8>> = conn
                .query_row(
                    "SELECT state FROM entitlement_snapshots WHERE id = 1",
                    [],
                    |row| row.get(0),
                )
                .optional()?;
            bytes.map(|b| decode_snapshot(&b)).transpose()
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use entitle_core::{issue_code_with_payload, resolve, validate_format, PremiumFeature};
    use tempfile::tempdir;

    fn record_for(code_type: CodeType, payload: &str, now: i64) -> RedeemedCodeRecord {
        let code = issue_code_with_payload(code_type, payload).unwrap();
        RedeemedCodeRecord::new(validate_format(&code).unwrap(), now)
    }

    #[tokio::test]
    async fn test_insert_and_find() {
        let store = SqliteStore::open_memory().unwrap();
        let record = record_for(CodeType::Press, "3F7K9P2Q", 1_000);

        store.insert(&record).await.unwrap();
        let found = store.find(record.code()).await.unwrap().unwrap();
        assert_eq!(found, record);
    }

    #[tokio::test]
    async fn test_unlimited_code_roundtrips_nulls() {
        let store = SqliteStore::open_memory().unwrap();
        let record = record_for(CodeType::Unlimited, "ZZZZZZZZ", 1_000);
        assert_eq!(record.expires_at, None);

        store.insert(&record).await.unwrap();
        let found = store.find(record.code()).await.unwrap().unwrap();
        assert_eq!(found.expires_at, None);
        assert_eq!(found.access_code.usage_limit(), None);
        assert_eq!(found.access_code.granted_features(), &PremiumFeature::all());
    }

    #[tokio::test]
    async fn test_duplicate_insert() {
        let store = SqliteStore::open_memory().unwrap();
        let record = record_for(CodeType::Demo, "ABCDEFGH", 1_000);

        store.insert(&record).await.unwrap();
        assert!(matches!(
            store.insert(&record).await.unwrap_err(),
            StoreError::Duplicate(_)
        ));
    }

    #[tokio::test]
    async fn test_increment_and_deactivate() {
        let store = SqliteStore::open_memory().unwrap();
        let record = record_for(CodeType::Reviewer, "3F7K9P2Q", 1_000);
        store.insert(&record).await.unwrap();

        assert_eq!(store.increment_usage(record.code()).await.unwrap(), 1);
        assert_eq!(store.increment_usage(record.code()).await.unwrap(), 2);

        store
            .deactivate(record.code(), DeactivationReason::Revoked, 5_000)
            .await
            .unwrap();
        store
            .deactivate(record.code(), DeactivationReason::Expired, 9_000)
            .await
            .unwrap();

        let found = store.find(record.code()).await.unwrap().unwrap();
        assert!(!found.is_active);
        assert_eq!(found.usage_count, 2);
        assert_eq!(found.deactivation_reason, Some(DeactivationReason::Revoked));
        assert_eq!(found.deactivated_at, Some(5_000));
    }

    #[tokio::test]
    async fn test_missing_code_is_not_found() {
        let store = SqliteStore::open_memory().unwrap();
        assert!(matches!(
            store.increment_usage("RV3F7K9P2QHB").await.unwrap_err(),
            StoreError::NotFound(_)
        ));
        assert!(matches!(
            store
                .deactivate("RV3F7K9P2QHB", DeactivationReason::Expired, 0)
                .await
                .unwrap_err(),
            StoreError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("entitlements.db");
        let record = record_for(CodeType::Reviewer, "3F7K9P2Q", 1_000);
        let mut used = record.clone();
        used.usage_count = 1;
        let state = resolve(&[used.to_grant()], 2_000);

        {
            let store = SqliteStore::open(&path).unwrap();
            store.insert(&record).await.unwrap();
            store.increment_usage(record.code()).await.unwrap();
            store.save_snapshot(&state).await.unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        let records = store.list_records().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].usage_count, 1);
        assert_eq!(store.load_snapshot().await.unwrap(), Some(state));
    }

    #[tokio::test]
    async fn test_snapshot_overwrites() {
        let store = SqliteStore::open_memory().unwrap();
        assert!(store.load_snapshot().await.unwrap().is_none());

        let first = EntitlementState::empty(1);
        let code = issue_code_with_payload(CodeType::Demo, "ABCDEFGH").unwrap();
        let record = RedeemedCodeRecord::activated(validate_format(&code).unwrap(), 0);
        let second = resolve(&[record.to_grant()], 2);
        assert!(!second.is_free_tier());

        store.save_snapshot(&first).await.unwrap();
        store.save_snapshot(&second).await.unwrap();
        assert_eq!(store.load_snapshot().await.unwrap(), Some(second));
    }

    #[tokio::test]
    async fn test_unknown_code_type_is_corrupted() {
        let store = SqliteStore::open_memory().unwrap();
        {
            let conn = lock(&store.conn).unwrap();
            conn.execute(
                "INSERT INTO redeemed_codes (code, code_type, granted_features, redeemed_at)
                 VALUES ('XX3F7K9P2QAA', 'bogus', 0, 0)",
                [],
            )
            .unwrap();
        }

        assert!(matches!(
            store.find("XX3F7K9P2QAA").await.unwrap_err(),
            StoreError::Corrupted(_)
        ));
        assert!(matches!(
            store.list_records().await.unwrap_err(),
            StoreError::Corrupted(_)
        ));
    }
}
