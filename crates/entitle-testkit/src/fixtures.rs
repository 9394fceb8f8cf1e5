//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use entitle_core::{issue_code, issue_code_with_payload, CodeType, EntitlementState, ManualClock};
use entitle_engine::{Engine, EngineConfig};
use entitle_store::{
    AccessCodeStore, DeactivationReason, MemoryStore, RedeemedCodeRecord, Result, StoreError,
};

/// 2025-06-15T15:06:40Z, an arbitrary fixed starting point.
pub const T0: i64 = 1_750_000_000_000;

/// A manual clock and a shared in-memory store.
pub struct TestFixture {
    pub clock: Arc<ManualClock>,
    pub store: Arc<MemoryStore>,
}

impl TestFixture {
    pub fn new() -> Self {
        Self::at(T0)
    }

    /// Start the clock at `now`.
    pub fn at(now: i64) -> Self {
        Self {
            clock: Arc::new(ManualClock::new(now)),
            store: Arc::new(MemoryStore::new()),
        }
    }

    /// Open an engine over the fixture's store and clock.
    pub async fn engine(&self, config: EngineConfig) -> Engine<Arc<MemoryStore>> {
        match Engine::open_with_clock(self.store.clone(), self.clock.clone(), config).await {
            Ok(engine) => engine,
            Err(e) => panic!("engine failed to open on a memory store: {e}"),
        }
    }

    pub fn advance_days(&self, days: i64) {
        self.clock.advance_days(days);
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// A valid code of the given type. Panics if `payload` is not 8 alphabet characters.
pub fn make_code(code_type: CodeType, payload: &str) -> String {
    match issue_code_with_payload(code_type, payload) {
        Ok(code) => code,
        Err(e) => panic!("bad fixture payload {payload:?}: {e}"),
    }
}

/// A fresh random code of the given type.
pub fn random_code(code_type: CodeType) -> String {
    issue_code(code_type, &mut rand::thread_rng())
}

/// A store wrapper that injects `Unavailable` faults and counts calls.
pub struct FlakyStore<S> {
    inner: S,
    /// Number of upcoming calls that will fail.
    fail_next: AtomicU32,
    /// Fail every call while set.
    offline: AtomicBool,
    /// Fail every call once this many have been received.
    offline_after: AtomicUsize,
    calls: AtomicUsize,
}

impl<S: AccessCodeStore> FlakyStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            fail_next: AtomicU32::new(0),
            offline: AtomicBool::new(false),
            offline_after: AtomicUsize::new(usize::MAX),
            calls: AtomicUsize::new(0),
        }
    }

    /// Fail the next `n` calls.
    pub fn fail_next(&self, n: u32) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Let `calls` more calls through, then fail everything.
    pub fn offline_after(&self, calls: usize) {
        let seen = self.calls.load(Ordering::SeqCst);
        let limit = seen.saturating_add(calls);
        self.offline_after.store(limit, Ordering::SeqCst);
    }

    /// Clear every injected fault.
    pub fn restore(&self) {
        self.fail_next.store(0, Ordering::SeqCst);
        self.offline.store(false, Ordering::SeqCst);
        self.offline_after.store(usize::MAX, Ordering::SeqCst);
    }

    /// Total calls received, failed or not.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn check(&self, op: &str) -> Result<()> {
        let index = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst)
            || index >= self.offline_after.load(Ordering::SeqCst)
        {
            return Err(StoreError::Unavailable(format!("injected fault in {op}")));
        }
        let consumed = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if consumed.is_ok() {
            return Err(StoreError::Unavailable(format!("injected fault in {op}")));
        }
        Ok(())
    }
}

#[async_trait]
impl<S: AccessCodeStore> AccessCodeStore for FlakyStore<S> {
    async fn find(&self, code: &str) -> Result<Option<RedeemedCodeRecord>> {
        self.check("find")?;
        self.inner.find(code).await
    }

    async fn insert(&self, record: &RedeemedCodeRecord) -> Result<()> {
        self.check("insert")?;
        self.inner.insert(record).await
    }

    async fn increment_usage(&self, code: &str) -> Result<u32> {
        self.check("increment_usage")?;
        self.inner.increment_usage(code).await
    }

    async fn deactivate(&self, code: &str, reason: DeactivationReason, at: i64) -> Result<()> {
        self.check("deactivate")?;
        self.inner.deactivate(code, reason, at).await
    }

    async fn list_records(&self) -> Result<Vec<RedeemedCodeRecord>> {
        self.check("list_records")?;
        self.inner.list_records().await
    }

    async fn save_snapshot(&self, state: &EntitlementState) -> Result<()> {
        self.check("save_snapshot")?;
        self.inner.save_snapshot(state).await
    }

    async fn load_snapshot(&self) -> Result<Option<EntitlementState>> {
        self.check("load_snapshot")?;
        self.inner.load_snapshot().await
    }
}
