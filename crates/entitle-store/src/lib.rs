//! # Entitle Store
//!
//! Storage abstraction for redeemed access codes. Provides a trait-based
//! interface with SQLite and in-memory implementations.
//!
//! ## Overview
//!
//! The [`AccessCodeStore`] trait keeps the validator storage-agnostic. The
//! primary implementation is [`SqliteStore`], with [`MemoryStore`] for tests.
//! Besides code records, the store keeps the last published entitlement
//! snapshot so a cold start can show the previous state immediately.
//!
//! ## Key Types
//!
//! - [`AccessCodeStore`] - The async trait for all storage operations
//! - [`RedeemedCodeRecord`] - One redeemed code and its lifecycle
//! - [`DeactivationReason`] - Why a record stopped producing activations
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`MemoryStore`] - In-memory storage for tests
//!
//! ## Usage
//!
//! ```rust,no_run
//! use entitle_core::validate_format;
//! use entitle_store::{AccessCodeStore, RedeemedCodeRecord, SqliteStore};
//!
//! async fn example() {
//!     let store = SqliteStore::open("entitlements.db").unwrap();
//!
//!     let code = validate_format("RV3F-7K9P-2QHB").unwrap();
//!     let record = RedeemedCodeRecord::new(code, 1_700_000_000_000);
//!     store.insert(&record).await.unwrap();
//!
//!     let uses = store.increment_usage("RV3F7K9P2QHB").await.unwrap();
//!     assert_eq!(uses, 1);
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Records are never deleted**: a burned code stays burned.
//! - **Insert is atomic and exclusive**: inserting an existing code fails with `Duplicate`.
//! - **Deactivation is permanent**: the first recorded reason wins.

pub mod error;
pub mod memory;
pub mod migration;
pub mod record;
pub mod snapshot;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use record::{DeactivationReason, RedeemedCodeRecord};
pub use sqlite::SqliteStore;
pub use traits::AccessCodeStore;
