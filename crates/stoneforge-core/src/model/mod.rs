// crates/stoneforge-core/src/model/mod.rs
// ============================================================================
// Module: Stoneforge Data Model
// Description: Element, dependency, event, and blocked-cache row types.
// Purpose: Canonical, serializable types for the Stoneforge dependency graph.
// Dependencies: serde, sha2, time
// ============================================================================

//! ## Overview
//! The data model defines the typed element store (spec.md §3): elements
//! and their six payload kinds, the four dependency relation kinds and
//! their gate metadata, the append-only event log, and the blocked-cache
//! row shape.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod blocked;
pub mod dependency;
pub mod element;
pub mod event;
pub mod hashing;
pub mod identifiers;
pub mod time;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use blocked::BlockReason;
pub use blocked::BlockedCacheRow;
pub use dependency::ApprovalGate;
pub use dependency::AwaitsMetadata;
pub use dependency::Dependency;
pub use dependency::DependencyKind;
pub use dependency::DependencyMetadata;
pub use dependency::ExternalGate;
pub use dependency::GateKind;
pub use dependency::TimerGate;
pub use element::Channel;
pub use element::Complexity;
pub use element::ContentType;
pub use element::Document;
pub use element::Element;
pub use element::ElementKind;
pub use element::ElementPayload;
pub use element::EntityRecord;
pub use element::Message;
pub use element::Metadata;
pub use element::Plan;
pub use element::PlanStatus;
pub use element::Priority;
pub use element::Task;
pub use element::TaskStatus;
pub use element::TaskType;
pub use event::Event;
pub use event::EventKind;
pub use hashing::derive_element_id_candidates;
pub use hashing::sha256_hex;
pub use identifiers::ElementId;
pub use identifiers::EntityId;
pub use identifiers::EventId;
pub use time::ClockSource;
pub use time::FixedClock;
pub use time::SystemClock;
pub use time::Timestamp;
