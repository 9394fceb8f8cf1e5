//! # Entitle Engine
//!
//! Access-code validation and entitlement publishing.
//!
//! ## Overview
//!
//! Two kinds of proof unlock premium features: verified purchase
//! transactions and redeemed access codes. The engine turns both into
//! grants, resolves them into one [`EntitlementState`](entitle_core::EntitlementState),
//! and publishes that state to feature gates.
//!
//! - [`CodeValidator`] runs the redemption state machine against the store
//! - [`EntitlementPublisher`] holds the current state behind an atomic swap
//! - [`Engine`] wires them together with the transaction ledger
//!
//! ## Usage
//!
//! ```rust,no_run
//! use entitle_engine::{Engine, EngineConfig};
//! use entitle_engine::core::PremiumFeature;
//! use entitle_engine::store::SqliteStore;
//!
//! async fn example() -> entitle_engine::Result<()> {
//!     let store = SqliteStore::open("entitlements.db")?;
//!     let engine = Engine::open(store, EngineConfig::default()).await?;
//!
//!     match engine.redeem_code("RV3F-7K9P-2QHB").await {
//!         Ok(activation) => println!("unlocked {:?}", activation.grant.features),
//!         Err(e) => println!("{} {}", e.user_message(), e.recovery_suggestion()),
//!     }
//!
//!     if engine.has_access(PremiumFeature::OfflineReading) {
//!         // ...
//!     }
//!     Ok(())
//! }
//! ```

pub mod engine;
pub mod error;
pub mod message;
pub mod publisher;
pub mod validator;

pub use entitle_core as core;
pub use entitle_ledger as ledger;
pub use entitle_store as store;

pub use engine::{Engine, EngineConfig};
pub use error::{EngineError, ErrorClass, Result, ValidationError};
pub use publisher::EntitlementPublisher;
pub use validator::{Activation, CodeValidator, Resolution, UsagePolicy, ValidatorConfig};
