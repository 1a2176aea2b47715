// crates/stoneforge-core/src/model/identifiers.rs
// ============================================================================
// Module: Stoneforge Identifiers
// Description: Canonical opaque identifiers for elements, entities, and events.
// Purpose: Provide strongly typed, serializable identifiers with stable wire forms.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Identifiers are opaque, content-addressed strings. [`ElementId`] and
//! [`EventId`] carry a fixed prefix and a base36 body; [`EntityId`] is an
//! opaque string supplied by the caller (no generation rules are imposed on
//! who acts as an entity).

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Element Identifier
// ============================================================================

/// Minimum length of the base36 body of a generated [`ElementId`].
pub const ELEMENT_ID_MIN_LEN: usize = 3;
/// Maximum length of the base36 body of a generated [`ElementId`].
pub const ELEMENT_ID_MAX_LEN: usize = 8;
/// Wire prefix for element identifiers.
pub const ELEMENT_ID_PREFIX: &str = "el-";

/// Content-addressed identifier for an [`Element`](crate::model::element::Element).
///
/// # Invariants
/// - Always begins with [`ELEMENT_ID_PREFIX`].
/// - The body is 3-8 lowercase base36 characters.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementId(String);

impl ElementId {
    /// Wraps a raw string as an [`ElementId`] without validation.
    ///
    /// Used by generation and storage round-trips where the value is known
    /// to already satisfy the invariants.
    #[must_use]
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if the identifier has the expected prefix and body
    /// length range.
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        let Some(body) = self.0.strip_prefix(ELEMENT_ID_PREFIX) else {
            return false;
        };
        let len = body.len();
        (ELEMENT_ID_MIN_LEN..=ELEMENT_ID_MAX_LEN).contains(&len)
            && body.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// SECTION: Entity Identifier
// ============================================================================

/// Identifier of the acting entity (human or agent) recorded on every mutation.
///
/// # Invariants
/// - Opaque, non-empty UTF-8 string; no normalization is applied by this type.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    /// Creates a new entity identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// SECTION: Event Identifier
// ============================================================================

/// Wire prefix for event identifiers.
pub const EVENT_ID_PREFIX: &str = "ev-";

/// Identifier for an [`Event`](crate::model::event::Event) row.
///
/// # Invariants
/// - Always begins with [`EVENT_ID_PREFIX`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(String);

impl EventId {
    /// Wraps a raw string as an [`EventId`] without validation.
    #[must_use]
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
