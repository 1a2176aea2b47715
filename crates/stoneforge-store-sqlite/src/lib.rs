// crates/stoneforge-store-sqlite/src/lib.rs
// ============================================================================
// Module: Stoneforge SQLite Store
// Description: Crate root re-exporting the durable SQLite-backed Store.
// Purpose: Give callers a single import surface for the durable backend.
// Dependencies: crate::store
// ============================================================================

//! # stoneforge-store-sqlite
//!
//! A durable [`stoneforge_core::interfaces::Store`] implementation backed by
//! `SQLite`. Writers serialize on a single mutex-guarded connection
//! (spec.md §5 "Ordering guarantees"); readers go through the same
//! connection, since the `Transaction` seam gives every caller read-your-writes
//! semantics over one in-flight transaction at a time.

#![forbid(unsafe_code)]

mod store;

pub use store::SqliteStore;
pub use store::SqliteStoreConfig;
pub use store::SqliteStoreError;
pub use store::SqliteStoreMode;
pub use store::SqliteSyncMode;
pub use store::SqliteTransaction;
