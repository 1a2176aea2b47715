// crates/stoneforge-core/src/runtime/gate.rs
// ============================================================================
// Module: Gate Engine
// Description: Satisfaction checks and mutation operations for awaits gates.
// Purpose: Implement spec.md §4.5 (timer, approval, external, webhook gates).
// Dependencies: crate::{error, interfaces, model}
// ============================================================================

//! ## Overview
//! [`GateEngine`] answers "is this gate satisfied" for all four
//! [`GateKind`]s and applies the two mutations gates support: recording or
//! withdrawing an approval, and flipping an external/webhook flag. Both
//! mutations are idempotent, matching spec.md §4.5 "Approval and satisfy are
//! idempotent."

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::error::CoreError;
use crate::error::CoreResult;
use crate::interfaces::Transaction;
use crate::model::ApprovalGate;
use crate::model::AwaitsMetadata;
use crate::model::ClockSource;
use crate::model::Dependency;
use crate::model::DependencyKind;
use crate::model::DependencyMetadata;
use crate::model::ElementId;
use crate::model::EntityId;
use crate::model::ExternalGate;

// ============================================================================
// SECTION: Gate Engine
// ============================================================================

/// Stateless gate satisfaction and mutation logic (spec.md §4.5).
#[derive(Debug, Clone, Copy, Default)]
pub struct GateEngine;

impl GateEngine {
    /// Creates a gate engine.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Returns true iff `gate` is currently satisfied.
    ///
    /// - Timer: `clock.now() >= wait_until`.
    /// - Approval: enough required approvers have approved.
    /// - External / Webhook: the `satisfied` flag is set.
    #[must_use]
    pub fn is_satisfied(&self, gate: &AwaitsMetadata, clock: &dyn ClockSource) -> bool {
        match gate {
            AwaitsMetadata::Timer(timer) => clock.now() >= timer.wait_until,
            AwaitsMetadata::Approval(approval) => approval.is_satisfied(),
            AwaitsMetadata::External(external) | AwaitsMetadata::Webhook(external) => external.satisfied,
        }
    }

    /// Records `approver`'s approval on the `awaits` edge from `blocked_id`
    /// to `blocker_id`. A no-op if `approver` is not in `required_approvers`;
    /// idempotent if they are already recorded (spec.md §4.5 "recordApproval
    /// adds the approver iff they are in requiredApprovers and not already
    /// present").
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] if no matching `awaits` edge exists,
    /// or [`CoreError::Gate`] if it is not an approval gate.
    pub fn record_approval(
        &self,
        tx: &mut impl Transaction,
        blocked_id: &ElementId,
        blocker_id: &ElementId,
        approver: EntityId,
    ) -> CoreResult<Dependency> {
        self.mutate_approval(tx, blocked_id, blocker_id, |approval| {
            if approval.required_approvers.contains(&approver) {
                approval.current_approvers.insert(approver);
            }
        })
    }

    /// Withdraws `approver`'s approval on the `awaits` edge from
    /// `blocked_id` to `blocker_id`. Idempotent: removing an absent approver
    /// is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] if no matching `awaits` edge exists,
    /// or [`CoreError::Gate`] if it is not an approval gate.
    pub fn remove_approval(
        &self,
        tx: &mut impl Transaction,
        blocked_id: &ElementId,
        blocker_id: &ElementId,
        approver: &EntityId,
    ) -> CoreResult<Dependency> {
        self.mutate_approval(tx, blocked_id, blocker_id, |approval| {
            approval.current_approvers.remove(approver);
        })
    }

    /// Flips the `satisfied` flag on an external or webhook gate. Idempotent:
    /// satisfying an already-satisfied gate leaves `satisfied_at` and
    /// `satisfied_by` unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] if no matching `awaits` edge exists,
    /// or [`CoreError::Gate`] if it is a timer or approval gate.
    pub fn satisfy_gate(
        &self,
        tx: &mut impl Transaction,
        blocked_id: &ElementId,
        blocker_id: &ElementId,
        satisfied_by: EntityId,
        clock: &dyn ClockSource,
    ) -> CoreResult<Dependency> {
        let mut dependency = self.get_awaits_edge(tx, blocked_id, blocker_id)?;
        let external = Self::external_gate_mut(&mut dependency)?;
        if !external.satisfied {
            external.satisfied = true;
            external.satisfied_at = Some(clock.now());
            external.satisfied_by = Some(satisfied_by);
        }
        tx.update_dependency(&dependency)?;
        Ok(dependency)
    }

    /// Applies `mutate` to an approval gate's metadata and persists it.
    fn mutate_approval(
        &self,
        tx: &mut impl Transaction,
        blocked_id: &ElementId,
        blocker_id: &ElementId,
        mutate: impl FnOnce(&mut ApprovalGate),
    ) -> CoreResult<Dependency> {
        let mut dependency = self.get_awaits_edge(tx, blocked_id, blocker_id)?;
        let DependencyMetadata::Awaits(AwaitsMetadata::Approval(approval)) = &mut dependency.metadata else {
            return Err(CoreError::Gate(format!(
                "dependency {blocked_id} <- {blocker_id} is not an approval gate"
            )));
        };
        mutate(approval);
        approval.validate()?;
        tx.update_dependency(&dependency)?;
        Ok(dependency)
    }

    /// Fetches the unique `awaits` edge between `blocked_id` and
    /// `blocker_id`.
    fn get_awaits_edge(&self, tx: &mut impl Transaction, blocked_id: &ElementId, blocker_id: &ElementId) -> CoreResult<Dependency> {
        tx.get_dependencies(blocked_id, Some(&[DependencyKind::Awaits]))?
            .into_iter()
            .find(|dependency| &dependency.blocker_id == blocker_id)
            .ok_or_else(|| CoreError::NotFound(blocked_id.clone()))
    }

    /// Borrows the external/webhook gate payload mutably, or fails if the
    /// edge is a timer or approval gate.
    fn external_gate_mut(dependency: &mut Dependency) -> CoreResult<&mut ExternalGate> {
        match &mut dependency.metadata {
            DependencyMetadata::Awaits(AwaitsMetadata::External(gate) | AwaitsMetadata::Webhook(gate)) => Ok(gate),
            _ => Err(CoreError::Gate(format!(
                "dependency {} <- {} is not an external or webhook gate",
                dependency.blocked_id, dependency.blocker_id
            ))),
        }
    }
}
