// crates/stoneforge-core/src/model/dependency.rs
// ============================================================================
// Module: Stoneforge Dependency Model
// Description: Typed edges between elements and their gate-specific metadata.
// Purpose: Represent the four relation kinds and the awaits gate shapes.
// Dependencies: serde, crate::model::{identifiers, time}
// ============================================================================

//! ## Overview
//! A [`Dependency`] relates a `blocked` element to a `blocker` element under
//! one of four [`DependencyKind`]s. Only `awaits` edges carry gate metadata
//! ([`AwaitsMetadata`]); the other three kinds carry none.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;

use crate::error::CoreError;
use crate::error::CoreResult;
use crate::model::identifiers::ElementId;
use crate::model::identifiers::EntityId;
use crate::model::time::Timestamp;

// ============================================================================
// SECTION: Dependency Kind
// ============================================================================

/// The four relation kinds a dependency edge may carry (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyKind {
    /// `blocker` must clear before `blocked` may proceed.
    Blocks,
    /// `blocked` is a child of `blocker`.
    ParentChild,
    /// `blocked` waits on a gate condition described by [`AwaitsMetadata`].
    Awaits,
    /// A non-blocking relation for cross-reference purposes only.
    RelatesTo,
}

impl DependencyKind {
    /// Returns true for the two kinds over which cycle detection runs
    /// (spec.md §3 invariant 3).
    #[must_use]
    pub const fn is_acyclic_checked(self) -> bool {
        matches!(self, Self::Blocks | Self::ParentChild)
    }

    /// The order in which dependency kinds are scanned when computing
    /// blocking state: `blocks`, then `parent-child`, then `awaits`
    /// (spec.md §4.4, §9 "Open Questions" — preserved for test
    /// compatibility).
    pub const SCAN_ORDER: [Self; 3] = [Self::Blocks, Self::ParentChild, Self::Awaits];
}

// ============================================================================
// SECTION: Gate Metadata
// ============================================================================

/// Gate type discriminant for an `awaits` edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateKind {
    /// Satisfied once a wall-clock deadline passes.
    Timer,
    /// Satisfied once enough named approvers have recorded approval.
    Approval,
    /// Satisfied by an out-of-band system flipping a flag.
    External,
    /// Satisfied by an inbound webhook flipping a flag.
    Webhook,
}

/// Timer gate metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerGate {
    /// UTC instant at or after which the gate is satisfied.
    pub wait_until: Timestamp,
}

/// Approval (N-of-M) gate metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalGate {
    /// Entities whose approval counts toward satisfaction.
    pub required_approvers: BTreeSet<EntityId>,
    /// Number of approvals required; defaults to `required_approvers.len()`.
    pub approval_count: Option<u32>,
    /// Approvers who have recorded approval so far; grows monotonically
    /// until explicitly removed.
    pub current_approvers: BTreeSet<EntityId>,
}

impl ApprovalGate {
    /// Returns the effective required approval count.
    #[must_use]
    pub fn required_count(&self) -> u32 {
        self.approval_count.unwrap_or_else(|| u32::try_from(self.required_approvers.len()).unwrap_or(u32::MAX))
    }

    /// Returns true iff enough required approvers have approved.
    #[must_use]
    pub fn is_satisfied(&self) -> bool {
        let matched = self.current_approvers.intersection(&self.required_approvers).count();
        u32::try_from(matched).unwrap_or(u32::MAX) >= self.required_count()
    }

    /// Validates that `approval_count`, if set, does not exceed the number
    /// of required approvers.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Gate`] when `approval_count` exceeds
    /// `required_approvers.len()`.
    pub fn validate(&self) -> CoreResult<()> {
        if let Some(count) = self.approval_count {
            let required = u32::try_from(self.required_approvers.len()).unwrap_or(u32::MAX);
            if count > required {
                return Err(CoreError::Gate(format!(
                    "approval_count {count} exceeds required_approvers size {required}"
                )));
            }
        }
        Ok(())
    }
}

/// External / webhook gate metadata; both kinds share this shape and differ
/// only in who is expected to flip `satisfied` (spec.md §3 "Awaits
/// metadata").
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExternalGate {
    /// Whether the gate has been satisfied.
    pub satisfied: bool,
    /// Timestamp at which the gate was satisfied.
    pub satisfied_at: Option<Timestamp>,
    /// Entity that satisfied the gate.
    pub satisfied_by: Option<EntityId>,
}

/// Gate-specific metadata carried by an `awaits` dependency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "gate_type", rename_all = "snake_case")]
pub enum AwaitsMetadata {
    /// A timer gate.
    Timer(TimerGate),
    /// An approval gate.
    Approval(ApprovalGate),
    /// An external-system gate.
    External(ExternalGate),
    /// A webhook-driven gate.
    Webhook(ExternalGate),
}

impl AwaitsMetadata {
    /// Returns the [`GateKind`] discriminant.
    #[must_use]
    pub const fn kind(&self) -> GateKind {
        match self {
            Self::Timer(_) => GateKind::Timer,
            Self::Approval(_) => GateKind::Approval,
            Self::External(_) => GateKind::External,
            Self::Webhook(_) => GateKind::Webhook,
        }
    }

    /// Validates the gate-specific shape invariants.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Gate`] when an approval gate's `approval_count`
    /// exceeds its approver set.
    pub fn validate(&self) -> CoreResult<()> {
        match self {
            Self::Approval(gate) => gate.validate(),
            Self::Timer(_) | Self::External(_) | Self::Webhook(_) => Ok(()),
        }
    }
}

// ============================================================================
// SECTION: Dependency Metadata
// ============================================================================

/// Per-edge metadata; only `awaits` edges carry a payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DependencyMetadata {
    /// No metadata (`blocks`, `parent-child`, `relates-to`).
    None,
    /// Gate metadata (`awaits`).
    Awaits(AwaitsMetadata),
}

impl DependencyMetadata {
    /// Returns the awaits metadata, if present.
    #[must_use]
    pub const fn as_awaits(&self) -> Option<&AwaitsMetadata> {
        match self {
            Self::Awaits(meta) => Some(meta),
            Self::None => None,
        }
    }
}

// ============================================================================
// SECTION: Dependency
// ============================================================================

/// A typed edge relating two elements (spec.md §3).
///
/// # Invariants
/// - `(blocked_id, blocker_id, kind)` is unique.
/// - `blocked_id != blocker_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dependency {
    /// The element that waits.
    pub blocked_id: ElementId,
    /// The element that blocks.
    pub blocker_id: ElementId,
    /// The relation kind.
    pub kind: DependencyKind,
    /// Kind-specific metadata.
    pub metadata: DependencyMetadata,
    /// Creation timestamp.
    pub created_at: Timestamp,
    /// Acting entity that created the edge.
    pub created_by: EntityId,
}

impl Dependency {
    /// Validates the edge invariants that do not require consulting the
    /// store (self-dependency, metadata shape matching kind).
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ConstraintViolation`] for a self-dependency, or
    /// [`CoreError::Validation`] when `metadata` does not match `kind`.
    pub fn validate_shape(&self) -> CoreResult<()> {
        if self.blocked_id == self.blocker_id {
            return Err(CoreError::ConstraintViolation(
                "an element cannot depend on itself".to_string(),
            ));
        }
        match (self.kind, &self.metadata) {
            (DependencyKind::Awaits, DependencyMetadata::Awaits(gate)) => gate.validate(),
            (DependencyKind::Awaits, DependencyMetadata::None) => Err(CoreError::validation(
                "metadata",
                "awaits dependencies require gate metadata",
            )),
            (_, DependencyMetadata::None) => Ok(()),
            (_, DependencyMetadata::Awaits(_)) => Err(CoreError::validation(
                "metadata",
                "only awaits dependencies carry gate metadata",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(id: &str) -> EntityId {
        EntityId::new(id)
    }

    #[test]
    fn approval_gate_satisfied_requires_intersection_not_just_count() {
        let gate = ApprovalGate {
            required_approvers: BTreeSet::from([entity("u1"), entity("u2"), entity("u3")]),
            approval_count: Some(2),
            current_approvers: BTreeSet::from([entity("u1"), entity("outsider")]),
        };
        assert!(!gate.is_satisfied());
    }

    #[test]
    fn approval_gate_satisfied_when_enough_required_approve() {
        let gate = ApprovalGate {
            required_approvers: BTreeSet::from([entity("u1"), entity("u2"), entity("u3")]),
            approval_count: Some(2),
            current_approvers: BTreeSet::from([entity("u1"), entity("u2")]),
        };
        assert!(gate.is_satisfied());
    }

    #[test]
    fn approval_gate_defaults_count_to_all_required() {
        let gate = ApprovalGate {
            required_approvers: BTreeSet::from([entity("u1"), entity("u2")]),
            approval_count: None,
            current_approvers: BTreeSet::from([entity("u1")]),
        };
        assert_eq!(gate.required_count(), 2);
        assert!(!gate.is_satisfied());
    }

    #[test]
    fn validate_shape_rejects_self_dependency() {
        let dep = Dependency {
            blocked_id: ElementId::from_raw("el-abc"),
            blocker_id: ElementId::from_raw("el-abc"),
            kind: DependencyKind::Blocks,
            metadata: DependencyMetadata::None,
            created_at: Timestamp::from_unix_millis(0),
            created_by: entity("u1"),
        };
        assert!(dep.validate_shape().is_err());
    }
}
