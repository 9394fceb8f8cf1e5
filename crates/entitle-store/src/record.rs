//! Redeemed code records.

use std::fmt;

use serde::{Deserialize, Serialize};

use entitle_core::{AccessCode, Grant};

/// Why a record stopped producing activations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DeactivationReason {
    /// The validity window passed.
    Expired,
    /// Every permitted use has been consumed.
    UsageExhausted,
    /// Withdrawn by support or the issuer.
    Revoked,
}

impl DeactivationReason {
    /// Stable identifier used for persistence.
    pub const fn as_str(self) -> &'static str {
        match self {
            DeactivationReason::Expired => "expired",
            DeactivationReason::UsageExhausted => "usageExhausted",
            DeactivationReason::Revoked => "revoked",
        }
    }

    /// Parse the persisted identifier.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "expired" => Some(DeactivationReason::Expired),
            "usageExhausted" => Some(DeactivationReason::UsageExhausted),
            "revoked" => Some(DeactivationReason::Revoked),
            _ => None,
        }
    }
}

impl fmt::Display for DeactivationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A code this installation has redeemed.
///
/// Created on first successful validation and never deleted, so a burned
/// code cannot validate again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedeemedCodeRecord {
    /// The code and its grant parameters as of redemption.
    pub access_code: AccessCode,

    /// First redemption time (Unix milliseconds).
    pub redeemed_at: i64,

    /// `redeemed_at + duration`, or `None` for codes that never expire.
    pub expires_at: Option<i64>,

    /// Number of activations consumed.
    pub usage_count: u32,

    /// False once the record has been deactivated.
    pub is_active: bool,

    /// Why the record was deactivated.
    pub deactivation_reason: Option<DeactivationReason>,

    /// When the record was deactivated.
    pub deactivated_at: Option<i64>,
}

impl RedeemedCodeRecord {
    /// A fresh record for a code redeemed at `now`.
    pub fn new(access_code: AccessCode, now: i64) -> Self {
        let expires_at = access_code.expires_at(now);
        Self {
            access_code,
            redeemed_at: now,
            expires_at,
            usage_count: 0,
            is_active: true,
            deactivation_reason: None,
            deactivated_at: None,
        }
    }

    /// The record of a first redemption, with its first use already counted.
    ///
    /// Inserting this record is the whole redemption, so there is no window
    /// in which the code is stored but unused.
    pub fn activated(access_code: AccessCode, now: i64) -> Self {
        Self {
            usage_count: 1,
            ..Self::new(access_code, now)
        }
    }

    /// The normalized code, which is also the record key.
    pub fn code(&self) -> &str {
        self.access_code.code()
    }

    /// Whether the validity window has passed.
    pub fn is_expired(&self, now: i64) -> bool {
        matches!(self.expires_at, Some(expires) if now > expires)
    }

    /// Whether every permitted use has been consumed.
    pub fn is_usage_exhausted(&self) -> bool {
        matches!(self.access_code.usage_limit(), Some(limit) if self.usage_count >= limit)
    }

    /// The grant this record contributes to entitlement resolution.
    ///
    /// A record deactivated for exhaustion keeps the grant it already made
    /// until that grant expires; expired and revoked records contribute a
    /// revoked grant. A record with no consumed use was never activated and
    /// grants nothing.
    pub fn to_grant(&self) -> Grant {
        let grant = Grant::access_code(&self.access_code, self.expires_at);
        if self.usage_count == 0 {
            return grant.revoked();
        }
        match (self.is_active, self.deactivation_reason) {
            (true, _) | (false, Some(DeactivationReason::UsageExhausted)) => grant,
            _ => grant.revoked(),
        }
    }

    /// Apply a deactivation in place. The first reason is kept.
    pub fn deactivate(&mut self, reason: DeactivationReason, at: i64) {
        if self.is_active {
            self.is_active = false;
            self.deactivation_reason = Some(reason);
            self.deactivated_at = Some(at);
        }
    }
}
