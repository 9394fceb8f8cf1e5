//! # Entitle Testkit
//!
//! Testing utilities for the entitlement engine.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Golden vectors**: Known base codes with the checksums every build must produce
//! - **Generators**: Proptest strategies for codes, grants and transactions
//! - **Fixtures**: A manual clock, a shared store, and a fault-injecting store wrapper
//!
//! ## Golden Vectors
//!
//! ```rust
//! use entitle_testkit::vectors::{all_vectors, verify_vector};
//!
//! for vector in all_vectors() {
//!     verify_vector(&vector).unwrap();
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use entitle_testkit::generators::valid_code;
//!
//! proptest! {
//!     #[test]
//!     fn issued_codes_validate((code_type, code) in valid_code()) {
//!         let parsed = entitle_core::validate_format(&code).unwrap();
//!         prop_assert_eq!(parsed.code_type(), code_type);
//!     }
//! }
//! ```
//!
//! ## Fault Injection
//!
//! ```rust
//! use entitle_store::MemoryStore;
//! use entitle_testkit::fixtures::FlakyStore;
//!
//! let store = FlakyStore::new(MemoryStore::new());
//! store.fail_next(1);
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{make_code, random_code, FlakyStore, TestFixture, T0};
