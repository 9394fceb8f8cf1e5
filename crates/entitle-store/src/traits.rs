//! AccessCodeStore trait: the abstract interface for redemption state.
//!
//! This trait allows the validator to be storage-agnostic. Implementations
//! include SQLite (primary) and in-memory (for tests).

use std::sync::Arc;

use async_trait::async_trait;

use entitle_core::EntitlementState;

use crate::error::Result;
use crate::record::{DeactivationReason, RedeemedCodeRecord};

/// The AccessCodeStore trait: async interface for redeemed code persistence.
///
/// All methods are async so that blocking backends can move work off the
/// runtime. For SQLite, we use `spawn_blocking` internally.
///
/// # Design Notes
///
/// - **Atomic insert**: `insert` either writes the whole record or nothing,
///   and fails with `Duplicate` if the code is already present.
/// - **Atomic increment**: concurrent `increment_usage` calls never lose an update.
/// - **No deletes**: records are retained to block replays.
/// - **No silent success**: every failure surfaces as a [`crate::StoreError`].
#[async_trait]
pub trait AccessCodeStore: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Code Records
    // ─────────────────────────────────────────────────────────────────────────

    /// Look up a record by normalized code.
    async fn find(&self, code: &str) -> Result<Option<RedeemedCodeRecord>>;

    /// Insert a new record.
    ///
    /// # Returns
    /// - `Ok(())` if the record was written.
    /// - `Err(Duplicate)` if a record with the same code exists.
    async fn insert(&self, record: &RedeemedCodeRecord) -> Result<()>;

    /// Increment the usage count, returning the new count.
    async fn increment_usage(&self, code: &str) -> Result<u32>;

    /// Permanently deactivate a record.
    ///
    /// Deactivating an inactive record is a no-op that keeps the original
    /// reason and time.
    async fn deactivate(&self, code: &str, reason: DeactivationReason, at: i64) -> Result<()>;

    /// All records, active or not, ordered by redemption time.
    async fn list_records(&self) -> Result<Vec<RedeemedCodeRecord>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Entitlement Snapshots
    // ─────────────────────────────────────────────────────────────────────────

    /// Persist the most recently published entitlement state.
    async fn save_snapshot(&self, state: &EntitlementState) -> Result<()>;

    /// Load the most recently persisted entitlement state.
    async fn load_snapshot(&self) -> Result<Option<EntitlementState>>;
}

/// Shared stores are stores.
#[async_trait]
impl<S: AccessCodeStore + ?Sized> AccessCodeStore for Arc<S> {
    async fn find(&self, code: &str) -> Result<Option<RedeemedCodeRecord>> {
        (**self).find(code).await
    }

    async fn insert(&self, record: &RedeemedCodeRecord) -> Result<()> {
        (**self).insert(record).await
    }

    async fn increment_usage(&self, code: &str) -> Result<u32> {
        (**self).increment_usage(code).await
    }

    async fn deactivate(&self, code: &str, reason: DeactivationReason, at: i64) -> Result<()> {
        (**self).deactivate(code, reason, at).await
    }

    async fn list_records(&self) -> Result<Vec<RedeemedCodeRecord>> {
        (**self).list_records().await
    }

    async fn save_snapshot(&self, state: &EntitlementState) -> Result<()> {
        (**self).save_snapshot(state).await
    }

    async fn load_snapshot(&self) -> Result<Option<EntitlementState>> {
        (**self).load_snapshot().await
    }
}
