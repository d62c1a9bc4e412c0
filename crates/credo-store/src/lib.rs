//! Credo Store
//!
//! Durable state for the trust engine:
//! - `identifier_scores`, `identifier_ledger`, `policy_rules` and
//!   `recovery_cases` column families in a single RocksDB database
//! - optimistic transactions with per-key conflict detection
//! - the persistence coordinator that retries conflicting transactions
//!   with capped exponential backoff

pub mod coordinator;
pub mod keys;
pub mod store;

pub use coordinator::{with_deadline, PersistenceCoordinator};
pub use store::{LedgerHead, LedgerIter, StoreTxn, TrustStore};
