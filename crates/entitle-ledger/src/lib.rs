//! # Entitlement Ledger
//!
//! Turns platform purchase transactions into [`Grant`](entitle_core::Grant)s.
//!
//! Transactions arrive already verified; this crate does no signature
//! checking and persists nothing. The platform keeps the purchase history,
//! so the [`TransactionLedger`] only needs to hold the latest delivery of
//! each transaction for the life of the process.
//!
//! ```rust
//! use entitle_ledger::{to_grant, ProductCatalog, VerifiedTransaction};
//!
//! let tx = VerifiedTransaction::new(1, "com.qtm.magicalstories.themes", 0);
//! let grant = to_grant(&tx, &ProductCatalog::default()).unwrap();
//! assert_eq!(grant.expires_at, None);
//! ```

pub mod adapter;
pub mod catalog;
pub mod error;
pub mod ledger;
pub mod transaction;

pub use adapter::{to_grant, try_to_grant};
pub use catalog::{Product, ProductCatalog, ProductKind};
pub use error::{LedgerError, Result};
pub use ledger::{LedgerChange, TransactionLedger};
pub use transaction::VerifiedTransaction;
