// crates/stoneforge-core/src/model/event.rs
// ============================================================================
// Module: Stoneforge Event Model
// Description: Append-only event log entries recorded for every mutation.
// Purpose: Give callers an immutable audit trail of create/update/status/
// dependency/gate changes.
// Dependencies: serde, serde_json, crate::model::{identifiers, time}
// ============================================================================

//! ## Overview
//! Every mutation appends exactly one [`Event`] (spec.md §3, §8 invariant 5),
//! written in the same transaction as the mutation it records. Events are
//! immutable once appended; there is no update or delete path.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::model::identifiers::ElementId;
use crate::model::identifiers::EntityId;
use crate::model::identifiers::EventId;
use crate::model::time::Timestamp;

// ============================================================================
// SECTION: Event Kind
// ============================================================================

/// The kinds of mutation an [`Event`] may record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// An element was created.
    Created,
    /// An element's payload was updated.
    Updated,
    /// An element was soft-deleted.
    Deleted,
    /// A task's status changed.
    StatusChanged,
    /// A dependency edge was added.
    DependencyAdded,
    /// A dependency edge was removed.
    DependencyRemoved,
    /// An external/webhook/timer gate became satisfied.
    GateSatisfied,
    /// An approval was recorded on an approval gate.
    ApprovalAdded,
    /// An approval was withdrawn from an approval gate.
    ApprovalRemoved,
}

// ============================================================================
// SECTION: Event
// ============================================================================

/// A single immutable append-only log entry (spec.md §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Event identifier.
    pub id: EventId,
    /// Element the event concerns.
    pub element_id: ElementId,
    /// The kind of mutation recorded.
    pub event_type: EventKind,
    /// Acting entity.
    pub actor: EntityId,
    /// When the event was recorded.
    pub timestamp: Timestamp,
    /// Prior value, if applicable (e.g. old status, old payload fragment).
    pub old_value: Option<Value>,
    /// New value, if applicable.
    pub new_value: Option<Value>,
}
