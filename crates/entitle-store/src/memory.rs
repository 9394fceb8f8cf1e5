//! In-memory implementation of the AccessCodeStore trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use entitle_core::EntitlementState;

use crate::error::{Result, StoreError};
use crate::record::{DeactivationReason, RedeemedCodeRecord};
use crate::traits::AccessCodeStore;

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock; every
/// mutation happens under a single write lock, so each operation is atomic.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    /// Records indexed by normalized code.
    records: HashMap<String, RedeemedCodeRecord>,

    /// Last saved entitlement snapshot.
    snapshot: Option<EntitlementState>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner::default()),
        }
    }

    /// Number of records held.
    pub fn len(&self) -> usize {
        self.read().map(|inner| inner.records.len()).unwrap_or(0)
    }

    /// Whether the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryStoreInner>> {
        self.inner
            .read()
            .map_err(|e| StoreError::Unavailable(format!("lock poisoned: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryStoreInner>> {
        self.inner
            .write()
            .map_err(|e| StoreError::Unavailable(format!("lock poisoned: {}", e)))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AccessCodeStore for MemoryStore {
    async fn find(&self, code: &str) -> Result<Option<RedeemedCodeRecord>> {
        let inner = self.read()?;
        Ok(inner.records.get(code).cloned())
    }

    async fn insert(&self, record: &RedeemedCodeRecord) -> Result<()> {
        let mut inner = self.write()?;

        if inner.records.contains_key(record.code()) {
            return Err(StoreError::Duplicate(record.access_code.redacted()));
        }

        inner
            .records
            .insert(record.code().to_string(), record.clone());
        Ok(())
    }

    async fn increment_usage(&self, code: &str) -> Result<u32> {
        let mut inner = self.write()?;
        let record = inner
            .records
            .get_mut(code)
            .ok_or_else(|| StoreError::NotFound(entitle_core::redact(code)))?;

        record.usage_count = record.usage_count.saturating_add(1);
        Ok(record.usage_count)
    }

    async fn deactivate(&self, code: &str, reason: DeactivationReason, at: i64) -> Result<()> {
        let mut inner = self.write()?;
        let record = inner
            .records
            .get_mut(code)
            .ok_or_else(|| StoreError::NotFound(entitle_core::redact(code)))?;

        record.deactivate(reason, at);
        Ok(())
    }

    async fn list_records(&self) -> Result<Vec<RedeemedCodeRecord>> {
        let inner = self.read()?;
        let mut records: Vec<RedeemedCodeRecord> = inner.records.values().cloned().collect();
        records.sort_by(|a, b| {
            a.redeemed_at
                .cmp(&b.redeemed_at)
                .then_with(|| a.code().cmp(b.code()))
        });
        Ok(records)
    }

    async fn save_snapshot(&self, state: &EntitlementState) -> Result<()> {
        let mut inner = self.write()?;
        inner.snapshot = Some(state.clone());
        Ok(())
    }

    async fn load_snapshot(&self) -> Result<Option<EntitlementState>> {
        let inner = self.read()?;
        Ok(inner.snapshot.clone())
    }
}
