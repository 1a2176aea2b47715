// crates/stoneforge-core/src/error.rs
// ============================================================================
// Module: Stoneforge Error Taxonomy
// Description: Tagged error kinds shared across the registry, graph, cache,
// gate, and priority engines.
// Purpose: Give callers a stable, programmatically matchable error surface.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! Every public mutation returns [`CoreError`] on failure. Errors are never
//! swallowed or logged by the core; the one deliberate exception is
//! malformed `awaits` metadata during cache computation, which degrades to a
//! conservative "blocked by invalid gate" reason rather than propagating
//! (spec.md §7).

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

use crate::model::identifiers::ElementId;

// ============================================================================
// SECTION: Core Error
// ============================================================================

/// Tagged error kinds returned by the Stoneforge core.
///
/// # Invariants
/// - Variants are stable for programmatic handling; callers may match on
///   kind without inspecting the message.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Malformed input: missing required field, value out of range, or
    /// wrong shape.
    #[error("validation error on field `{field}`: {reason}")]
    Validation {
        /// Name of the offending field.
        field: String,
        /// Human-readable description of the expected form.
        reason: String,
    },

    /// The target id is absent or has been tombstoned and the caller did
    /// not opt into `include_deleted`.
    #[error("not found: {0}")]
    NotFound(ElementId),

    /// A duplicate key was supplied (element id collision, or a dependency
    /// edge that already exists).
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// A domain rule was broken: a cycle, a write to an immutable field or
    /// element type, or a self-dependency.
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    /// Invalid gate metadata or an unauthorized approver.
    #[error("gate error: {0}")]
    Gate(String),

    /// The underlying store failed; wraps the cause.
    #[error("storage error: {0}")]
    Storage(String),

    /// The id generator could not find a unique id within
    /// [`ELEMENT_ID_MAX_LEN`](crate::model::identifiers::ELEMENT_ID_MAX_LEN)
    /// characters.
    #[error("id space exhausted while generating an identifier for `{0}`")]
    IdExhausted(String),
}

impl CoreError {
    /// Builds a [`CoreError::Validation`] for a field/reason pair.
    #[must_use]
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Convenience alias for results returned by the Stoneforge core.
pub type CoreResult<T> = Result<T, CoreError>;
