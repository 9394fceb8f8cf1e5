//! # Entitle Core
//!
//! Pure primitives for the entitlement engine: access codes, checksums,
//! grants, and entitlement resolution.
//!
//! This crate contains no I/O, no storage, no clocks that read the system
//! time implicitly. Everything that depends on "now" takes it as an argument.
//!
//! ## Key Types
//!
//! - [`PremiumFeature`] - The closed set of capabilities that can be unlocked
//! - [`AccessCode`] - A structurally valid, checksum-verified promotional code
//! - [`CodeType`] - The code family, derived from the two-character prefix
//! - [`Grant`] - "This installation has features X until time T"
//! - [`EntitlementState`] - The union of all live grants at a point in time
//!
//! ## Checksums
//!
//! Codes carry a two-character checksum over their first ten characters.
//! The issuing side ([`issue_code`]) and the validating side
//! ([`validate_format`]) share [`compute_checksum`], so the two can never drift.

pub mod code;
pub mod entitlement;
pub mod error;
pub mod feature;
pub mod grant;
pub mod time;

pub use code::{
    compute_checksum, issue_code, issue_code_with_payload, normalize, redact, validate_format,
    AccessCode, CodeType, ALPHABET, CHECKSUM_LEN, CHECKSUM_VERSION, CODE_LEN, PAYLOAD_LEN,
    PREFIX_LEN,
};
pub use entitlement::{resolve, EntitlementState};
pub use error::{FormatError, Result};
pub use feature::{features_from_bitmask, features_to_bitmask, FeatureSet, PremiumFeature};
pub use grant::{Grant, GrantSource};
pub use time::{Clock, ManualClock, SystemClock, DAY_MS};
