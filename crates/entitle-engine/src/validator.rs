//! The code validation state machine.
//!
//! ```text
//! Unvalidated -> FormatChecked -> ChecksumVerified -> Resolved{New|Existing}
//!                                                  -> Activated | Rejected
//! ```
//!
//! Format and checksum failures are rejected before the store is touched.
//! Everything after that runs under a per-code lock, so two concurrent
//! validations of one code are serialized while different codes proceed
//! independently.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::Mutex as AsyncMutex;

use entitle_core::{redact, validate_format, AccessCode, Clock, CodeType, FeatureSet, Grant};
use entitle_store::{AccessCodeStore, DeactivationReason, RedeemedCodeRecord, StoreError};

use crate::error::ValidationError;

/// When a successful validation consumes one use of a code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UsagePolicy {
    /// Only the validation that first redeems the code on this installation.
    #[default]
    FirstRedemptionOnly,
    /// Every successful validation, including re-validation of an active code.
    EveryValidation,
}

/// How the store lookup resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// First redemption; a record was created.
    New,
    /// The code was redeemed before and is still active.
    Existing,
}

/// A successful validation.
#[derive(Debug, Clone)]
pub struct Activation {
    pub access_code: AccessCode,
    pub record: RedeemedCodeRecord,
    pub grant: Grant,
    pub resolution: Resolution,
}

impl Activation {
    pub fn is_new(&self) -> bool {
        self.resolution == Resolution::New
    }
}

/// Validator settings.
#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    pub timeout: Duration,
    pub usage_policy: UsagePolicy,
    /// Feature overrides for `SpecialAccess` codes, keyed by normalized code.
    pub special_access: HashMap<String, FeatureSet>,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            usage_policy: UsagePolicy::default(),
            special_access: HashMap::new(),
        }
    }
}

/// Per-code mutual exclusion.
///
/// Entries are dropped once no validation holds them.
#[derive(Default)]
pub(crate) struct CodeLocks {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

/// A claim on one code's lock. Releases its table entry on drop, including
/// when the owning future is cancelled.
pub(crate) struct CodeLockHandle<'a> {
    table: &'a CodeLocks,
    code: String,
    mutex: Arc<AsyncMutex<()>>,
}

impl CodeLocks {
    fn table(&self) -> MutexGuard<'_, HashMap<String, Arc<AsyncMutex<()>>>> {
        match self.locks.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub(crate) fn acquire(&self, code: &str) -> CodeLockHandle<'_> {
        let mutex = self
            .table()
            .entry(code.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone();
        CodeLockHandle {
            table: self,
            code: code.to_string(),
            mutex,
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.table().len()
    }
}

impl Drop for CodeLockHandle<'_> {
    fn drop(&mut self) {
        let mut table = self.table.table();
        // Held by the table and by this handle only.
        if Arc::strong_count(&self.mutex) == 2 {
            table.remove(&self.code);
        }
    }
}

/// Validates user-entered codes against the redemption store.
pub struct CodeValidator<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    config: ValidatorConfig,
    locks: CodeLocks,
}

impl<S: AccessCodeStore> CodeValidator<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>, config: ValidatorConfig) -> Self {
        Self {
            store,
            clock,
            config,
            locks: CodeLocks::default(),
        }
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// Validate raw user input.
    ///
    /// Cancelling the returned future never leaves a partial record: each
    /// store mutation is a single atomic operation.
    pub async fn validate(&self, input: &str) -> Result<Activation, ValidationError> {
        let access_code = validate_format(input).map_err(|e| {
            tracing::warn!(error = %e, "access code rejected before lookup");
            ValidationError::Format(e)
        })?;
        let access_code = self.apply_overrides(access_code);
        tracing::debug!(code = %access_code.redacted(), "checksum verified");

        let timeout = self.config.timeout;
        match tokio::time::timeout(timeout, self.validate_locked(access_code)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(?timeout, "access code validation timed out");
                Err(ValidationError::TimedOut(timeout))
            }
        }
    }

    /// Hold the per-code lock for the duration of an operation on one record.
    pub(crate) async fn with_code_lock<F, T>(&self, code: &str, f: F) -> T
    where
        F: std::future::Future<Output = T>,
    {
        let handle = self.locks.acquire(code);
        let _guard = handle.mutex.lock().await;
        f.await
    }

    fn apply_overrides(&self, access_code: AccessCode) -> AccessCode {
        match self.config.special_access.get(access_code.code()) {
            Some(features) if access_code.code_type() == CodeType::SpecialAccess => {
                access_code.with_features(features.clone())
            }
            _ => access_code,
        }
    }

    async fn validate_locked(
        &self,
        access_code: AccessCode,
    ) -> Result<Activation, ValidationError> {
        let code = access_code.code().to_string();
        let result = self
            .with_code_lock(&code, self.resolve_and_activate(access_code))
            .await;

        match &result {
            Err(ValidationError::StoreUnavailable(e)) => {
                tracing::warn!(code = %redact(&code), error = %e, "store fault during validation");
            }
            Err(e) => {
                tracing::info!(code = %redact(&code), error = %e, "access code rejected");
            }
            Ok(_) => {}
        }
        result
    }

    async fn resolve_and_activate(
        &self,
        access_code: AccessCode,
    ) -> Result<Activation, ValidationError> {
        let now = self.clock.now_millis();
        let (mut record, resolution) = self.load_or_create(&access_code, now).await?;
        tracing::debug!(code = %access_code.redacted(), ?resolution, "code resolved");

        if resolution == Resolution::Existing {
            if let Some(expires_at) = record.expires_at.filter(|_| record.is_expired(now)) {
                self.store
                    .deactivate(record.code(), DeactivationReason::Expired, now)
                    .await?;
                return Err(ValidationError::CodeExpired(expires_at));
            }

            let exhausted_at = record
                .access_code
                .usage_limit()
                .filter(|_| record.is_usage_exhausted());
            if let Some(limit) = exhausted_at {
                self.store
                    .deactivate(record.code(), DeactivationReason::UsageExhausted, now)
                    .await?;
                return Err(ValidationError::UsageLimitReached(limit));
            }

            // A stored record with no counted use was never activated.
            let consume = record.usage_count == 0
                || self.config.usage_policy == UsagePolicy::EveryValidation;
            if consume {
                record.usage_count = self.store.increment_usage(record.code()).await?;
            }
        }

        let grant = record.to_grant();
        tracing::info!(
            code = %access_code.redacted(),
            code_type = access_code.code_type().as_str(),
            ?resolution,
            usage_count = record.usage_count,
            "access code activated"
        );

        Ok(Activation {
            access_code: record.access_code.clone(),
            record,
            grant,
            resolution,
        })
    }

    async fn load_or_create(
        &self,
        access_code: &AccessCode,
        now: i64,
    ) -> Result<(RedeemedCodeRecord, Resolution), ValidationError> {
        let existing = match self.store.find(access_code.code()).await? {
            Some(record) => record,
            None => {
                // The insert carries the first use, so redemption is one write.
                let record = RedeemedCodeRecord::activated(access_code.clone(), now);
                match self.store.insert(&record).await {
                    Ok(()) => return Ok((record, Resolution::New)),
                    // Another process redeemed it between find and insert.
                    Err(StoreError::Duplicate(_)) => self
                        .store
                        .find(access_code.code())
                        .await?
                        .ok_or_else(|| StoreError::NotFound(access_code.redacted()))?,
                    Err(e) => return Err(e.into()),
                }
            }
        };

        if !existing.is_active {
            return Err(ValidationError::CodeInactive {
                reason: existing.deactivation_reason,
            });
        }
        Ok((existing, Resolution::Existing))
    }
}
