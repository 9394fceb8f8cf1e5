//! The single authoritative entitlement state.
//!
//! Each recomputation produces a new immutable [`EntitlementState`] that
//! replaces the previous one in a single swap. Readers hold an `Arc` to
//! whichever state was current when they looked and never see a mix.

use std::sync::Arc;

use tokio::sync::watch;

use entitle_core::{EntitlementState, PremiumFeature};

/// Holds the current state and notifies observers of replacements.
#[derive(Debug)]
pub struct EntitlementPublisher {
    sender: watch::Sender<Arc<EntitlementState>>,
}

impl EntitlementPublisher {
    pub fn new(initial: EntitlementState) -> Self {
        let (sender, _) = watch::channel(Arc::new(initial));
        Self { sender }
    }

    /// Replace the current state, returning the previous one.
    pub fn publish(&self, state: EntitlementState) -> Arc<EntitlementState> {
        let features = state.active_features.len();
        let grants = state.active_grants.len();
        let previous = self.sender.send_replace(Arc::new(state));
        tracing::debug!(features, grants, "entitlement state published");
        previous
    }

    pub fn current(&self) -> Arc<EntitlementState> {
        self.sender.borrow().clone()
    }

    pub fn has_access(&self, feature: PremiumFeature) -> bool {
        self.sender.borrow().has_access(feature)
    }

    /// Observe every future replacement.
    pub fn subscribe(&self) -> watch::Receiver<Arc<EntitlementState>> {
        self.sender.subscribe()
    }
}
