// crates/stoneforge-core/src/lib.rs
// ============================================================================
// Module: Stoneforge Core
// Description: Typed element store, dependency graph, blocked cache, gate
// engine, and priority engine for coordinating dependent units of work.
// Purpose: Crate root wiring the data model, store interfaces, and runtime
// engines together.
// Dependencies: serde, serde_json, sha2, thiserror, time
// ============================================================================

//! ## Overview
//! `stoneforge-core` is the dependency-and-blocking engine underneath a
//! larger workspace platform. It owns four concerns:
//!
//! - a typed element store (tasks, plans, documents, channels, messages,
//!   entities) addressed by content-derived identifiers;
//! - a four-kind dependency graph (`blocks`, `parent-child`, `awaits`,
//!   `relates-to`) with cycle rejection on the first two kinds;
//! - a materialized blocked cache driving automatic task status transitions;
//! - an effective-priority propagation engine and a gate engine (timer,
//!   approval, external, webhook).
//!
//! This crate is storage-agnostic: it defines [`interfaces::Store`] as the
//! seam a backend implements (see `stoneforge-store-sqlite` for the
//! reference embedded backend) and never touches the filesystem or network
//! itself. CLI, HTTP, orchestration, and provider-adapter layers live
//! outside this crate entirely.

#![forbid(unsafe_code)]

pub mod error;
pub mod interfaces;
pub mod model;
pub mod runtime;

pub use error::CoreError;
pub use error::CoreResult;
pub use interfaces::ElementFilter;
pub use interfaces::OrderBy;
pub use interfaces::RecordingStatusCallback;
pub use interfaces::Store;
pub use interfaces::StoreStats;
pub use interfaces::StatusTransitionCallback;
pub use interfaces::Transaction;
pub use interfaces::DEFAULT_PAGE_LIMIT;
pub use runtime::EngineConfig;
pub use runtime::IdGeneratorConfig;
pub use runtime::PriorityConfig;
pub use runtime::StoneforgeEngine;
pub use runtime::TaskFilter;
pub use runtime::memory::InMemoryStore;
