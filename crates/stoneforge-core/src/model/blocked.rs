// crates/stoneforge-core/src/model/blocked.rs
// ============================================================================
// Module: Stoneforge Blocked Cache Row
// Description: The materialized per-element blocking state row.
// Purpose: Back O(1) "is X blocked, by whom, why" queries.
// Dependencies: serde, crate::model::{element, identifiers}
// ============================================================================

//! ## Overview
//! One [`BlockedCacheRow`] exists per currently-blocked element (spec.md
//! §3, §4.4). `previous_status` preserves the task status at the moment of
//! automatic transition to `blocked`, so unblocking can restore it exactly.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::model::dependency::DependencyKind;
use crate::model::element::TaskStatus;
use crate::model::identifiers::ElementId;

// ============================================================================
// SECTION: Block Reason
// ============================================================================

/// Why an element is blocked, carrying enough detail to render a reason
/// string and to know which dependency kind produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockReason {
    /// The dependency kind whose edge produced the block.
    pub kind: DependencyKind,
    /// Human-readable explanation, e.g. "blocked by open task el-abc123".
    pub description: String,
}

impl BlockReason {
    /// Builds a reason for a `blocks` edge from an incomplete blocker.
    #[must_use]
    pub fn blocked_by(blocker: &ElementId) -> Self {
        Self {
            kind: DependencyKind::Blocks,
            description: format!("blocked by incomplete blocker {blocker}"),
        }
    }

    /// Builds a reason for a `parent-child` edge blocked through the parent.
    #[must_use]
    pub fn blocked_by_parent(parent: &ElementId) -> Self {
        Self {
            kind: DependencyKind::ParentChild,
            description: format!("blocked by parent {parent}"),
        }
    }

    /// Builds a reason for an unsatisfied gate.
    #[must_use]
    pub fn blocked_by_gate(blocker: &ElementId) -> Self {
        Self {
            kind: DependencyKind::Awaits,
            description: format!("blocked by unsatisfied gate on {blocker}"),
        }
    }

    /// Builds the conservative reason used when gate metadata is malformed
    /// (spec.md §4.4 "Failure semantics").
    #[must_use]
    pub fn invalid_gate_metadata(blocker: &ElementId) -> Self {
        Self {
            kind: DependencyKind::Awaits,
            description: format!("blocked by gate (invalid metadata) on {blocker}"),
        }
    }
}

// ============================================================================
// SECTION: Blocked Cache Row
// ============================================================================

/// A materialized blocking-state row (spec.md §3, §6 persisted layout).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockedCacheRow {
    /// The blocked element.
    pub element_id: ElementId,
    /// The element whose incomplete state is the proximate cause.
    pub blocked_by: ElementId,
    /// Why the element is blocked.
    pub reason: BlockReason,
    /// The task status to restore when the element unblocks, if this
    /// element is a task that was auto-transitioned into `blocked`.
    pub previous_status: Option<TaskStatus>,
}
