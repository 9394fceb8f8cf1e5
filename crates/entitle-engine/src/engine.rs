//! The Engine: one entitlement authority per installation.
//!
//! The Engine owns the redemption store, the transaction ledger, the code
//! validator and the publisher. Consumers receive it by injection (usually
//! as an `Arc<Engine<S>>`) rather than through any global.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use entitle_core::{
    resolve, validate_format, Clock, EntitlementState, FeatureSet, Grant, PremiumFeature,
    SystemClock,
};
use entitle_ledger::{LedgerChange, ProductCatalog, TransactionLedger, VerifiedTransaction};
use entitle_store::{AccessCodeStore, DeactivationReason, RedeemedCodeRecord};

use crate::error::{EngineError, Result, ValidationError};
use crate::publisher::EntitlementPublisher;
use crate::validator::{Activation, CodeValidator, UsagePolicy, ValidatorConfig};

/// Configuration for the Engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Upper bound on a single code validation.
    pub validation_timeout: Duration,
    /// How often the refresh loop re-checks passive expiry.
    pub refresh_interval: Duration,
    /// When a validation consumes a use.
    pub usage_policy: UsagePolicy,
    /// Product id to feature mapping.
    pub catalog: ProductCatalog,
    /// Feature overrides for `SpecialAccess` codes, keyed by normalized code.
    pub special_access: HashMap<String, FeatureSet>,
    /// Whether each published state is also written to the store.
    pub persist_snapshots: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            validation_timeout: Duration::from_secs(5),
            refresh_interval: Duration::from_secs(60),
            usage_policy: UsagePolicy::FirstRedemptionOnly,
            catalog: ProductCatalog::default(),
            special_access: HashMap::new(),
            persist_snapshots: true,
        }
    }
}

impl EngineConfig {
    pub fn with_validation_timeout(mut self, timeout: Duration) -> Self {
        self.validation_timeout = timeout;
        self
    }

    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    pub fn with_usage_policy(mut self, policy: UsagePolicy) -> Self {
        self.usage_policy = policy;
        self
    }

    pub fn with_catalog(mut self, catalog: ProductCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Override the features of one `SpecialAccess` code. The code is
    /// normalized first; invalid codes are ignored at validation time.
    pub fn with_special_access(
        mut self,
        code: &str,
        features: impl IntoIterator<Item = PremiumFeature>,
    ) -> Self {
        self.special_access
            .insert(entitle_core::normalize(code), features.into_iter().collect());
        self
    }

    pub fn with_snapshots(mut self, persist: bool) -> Self {
        self.persist_snapshots = persist;
        self
    }

    fn validator_config(&self) -> ValidatorConfig {
        ValidatorConfig {
            timeout: self.validation_timeout,
            usage_policy: self.usage_policy,
            special_access: self.special_access.clone(),
        }
    }
}

/// The entitlement engine.
///
/// Provides:
/// - Code redemption through the validator state machine
/// - Ingestion of verified purchase transactions
/// - Recomputation and publication of the entitlement state
/// - Feature-access queries
pub struct Engine<S: AccessCodeStore> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
    validator: CodeValidator<S>,
    publisher: EntitlementPublisher,
    ledger: Mutex<TransactionLedger>,
    /// Serializes recomputations so a stale state never overwrites a newer one.
    recompute: Mutex<()>,
}

impl<S: AccessCodeStore> Engine<S> {
    /// Open the engine on the system clock.
    pub async fn open(store: S, config: EngineConfig) -> Result<Self> {
        Self::open_with_clock(store, Arc::new(SystemClock), config).await
    }

    /// Open the engine.
    ///
    /// The last persisted snapshot, if any, is re-resolved against the current
    /// time and published immediately; a full recomputation then replaces it.
    /// If the store is temporarily unavailable the snapshot state stays
    /// published until the next successful refresh.
    pub async fn open_with_clock(
        store: S,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
    ) -> Result<Self> {
        let store = Arc::new(store);
        let now = clock.now_millis();

        let initial = match store.load_snapshot().await {
            Ok(Some(snapshot)) => resolve(&snapshot.active_grants, now),
            Ok(None) => EntitlementState::empty(now),
            Err(e) => {
                tracing::warn!(error = %e, "ignoring unreadable entitlement snapshot");
                EntitlementState::empty(now)
            }
        };

        let validator = CodeValidator::new(store.clone(), clock.clone(), config.validator_config());
        let engine = Self {
            store,
            clock,
            config,
            validator,
            publisher: EntitlementPublisher::new(initial),
            ledger: Mutex::new(TransactionLedger::new()),
            recompute: Mutex::new(()),
        };

        match engine.refresh().await {
            Ok(_) => {}
            Err(EngineError::Store(e)) if e.is_transient() => {
                tracing::warn!(error = %e, "store unavailable at open, serving last snapshot");
            }
            Err(e) => return Err(e),
        }
        tracing::info!("entitlement engine opened");
        Ok(engine)
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Code Redemption
    // ─────────────────────────────────────────────────────────────────────────

    /// Validate a user-entered code and, on success, publish the new state.
    pub async fn redeem_code(
        &self,
        input: &str,
    ) -> std::result::Result<Activation, ValidationError> {
        let activation = self.validator.validate(input).await?;

        if let Err(e) = self.refresh().await {
            // The redemption is already durable; publish what we know.
            tracing::warn!(error = %e, "recomputation after redemption failed");
            let _guard = self.recompute.lock().await;
            let mut grants = self.publisher.current().active_grants.clone();
            grants.push(activation.grant.clone());
            self.publisher
                .publish(resolve(&grants, self.clock.now_millis()));
        }

        Ok(activation)
    }

    /// Permanently withdraw a redeemed code.
    pub async fn revoke_code(&self, input: &str) -> Result<()> {
        let access_code = validate_format(input).map_err(ValidationError::from)?;
        let now = self.clock.now_millis();

        self.validator
            .with_code_lock(
                access_code.code(),
                self.store
                    .deactivate(access_code.code(), DeactivationReason::Revoked, now),
            )
            .await?;
        tracing::info!(code = %access_code.redacted(), "access code revoked");

        self.refresh().await?;
        Ok(())
    }

    /// Every code ever redeemed on this installation.
    pub async fn redeemed_codes(&self) -> Result<Vec<RedeemedCodeRecord>> {
        Ok(self.store.list_records().await?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Transactions
    // ─────────────────────────────────────────────────────────────────────────

    /// Record a verified transaction and recompute if anything changed.
    pub async fn apply_transaction(&self, tx: VerifiedTransaction) -> Result<LedgerChange> {
        let transaction_id = tx.transaction_id;
        let change = self.ledger.lock().await.apply(tx);
        tracing::debug!(transaction_id, ?change, "transaction applied");

        if change.is_change() {
            self.refresh().await?;
        }
        Ok(change)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Entitlement State
    // ─────────────────────────────────────────────────────────────────────────

    /// Recompute the entitlement state from every known grant and publish it.
    pub async fn refresh(&self) -> Result<Arc<EntitlementState>> {
        let _guard = self.recompute.lock().await;

        let records = self.store.list_records().await?;
        let mut grants: Vec<Grant> = records.iter().map(RedeemedCodeRecord::to_grant).collect();
        grants.extend(self.ledger.lock().await.grants(&self.config.catalog));

        let state = resolve(&grants, self.clock.now_millis());
        tracing::info!(
            features = state.active_features.len(),
            grants = state.active_grants.len(),
            "entitlements recomputed"
        );

        if self.config.persist_snapshots {
            if let Err(e) = self.store.save_snapshot(&state).await {
                tracing::warn!(error = %e, "failed to persist entitlement snapshot");
            }
        }

        self.publisher.publish(state);
        Ok(self.publisher.current())
    }

    pub fn has_access(&self, feature: PremiumFeature) -> bool {
        self.publisher.has_access(feature)
    }

    pub fn current_state(&self) -> Arc<EntitlementState> {
        self.publisher.current()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<EntitlementState>> {
        self.publisher.subscribe()
    }
}

impl<S: AccessCodeStore + 'static> Engine<S> {
    /// Periodically recompute so grants that lapse with no external event
    /// drop out of the published state.
    ///
    /// The task ends once the engine is dropped.
    pub fn spawn_refresh_loop(self: &Arc<Self>) -> JoinHandle<()> {
        let weak = Arc::downgrade(self);
        let period = self.config.refresh_interval.max(Duration::from_millis(1));

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let Some(engine) = Weak::upgrade(&weak) else {
                    break;
                };
                if let Err(e) = engine.refresh().await {
                    tracing::warn!(error = %e, "periodic entitlement refresh failed");
                }
            }
            tracing::debug!("refresh loop stopped");
        })
    }

    /// Feed transactions from the platform purchase subsystem into the engine.
    ///
    /// The task ends when the sender side closes or the engine is dropped.
    pub fn spawn_transaction_listener(
        self: &Arc<Self>,
        mut transactions: mpsc::Receiver<VerifiedTransaction>,
    ) -> JoinHandle<()> {
        let weak = Arc::downgrade(self);

        tokio::spawn(async move {
            while let Some(tx) = transactions.recv().await {
                let Some(engine) = Weak::upgrade(&weak) else {
                    break;
                };
                if let Err(e) = engine.apply_transaction(tx).await {
                    tracing::warn!(error = %e, "failed to apply transaction");
                }
            }
            tracing::debug!("transaction listener stopped");
        })
    }
}
