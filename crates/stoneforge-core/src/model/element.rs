// crates/stoneforge-core/src/model/element.rs
// ============================================================================
// Module: Stoneforge Element Model
// Description: The base element envelope and its six typed payload variants.
// Purpose: Represent every addressable object (task, plan, document, channel,
// message, entity) as a tagged variant over a common envelope.
// Dependencies: serde, serde_json, crate::model::{identifiers, time}
// ============================================================================

//! ## Overview
//! [`Element`] is the envelope every addressable object shares: identity,
//! timestamps, acting entity, tags, free-form metadata, and soft-delete
//! state. [`ElementPayload`] is the tagged variant over the six element
//! kinds (spec.md §3). Persistence still serializes the payload to JSON
//! (spec.md §9 "Design Notes"), but in-process code works with the typed
//! variant, never a dynamic map.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::error::CoreError;
use crate::error::CoreResult;
use crate::model::identifiers::ElementId;
use crate::model::identifiers::EntityId;
use crate::model::time::Timestamp;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum number of tags per element.
pub const MAX_TAGS: usize = 20;
/// Maximum length of a single tag.
pub const MAX_TAG_LEN: usize = 50;
/// Maximum encoded size of an element's metadata map, in bytes.
pub const MAX_METADATA_BYTES: usize = 64 * 1024;
/// Minimum length of a task title.
pub const MIN_TITLE_LEN: usize = 1;
/// Maximum length of a task title.
pub const MAX_TITLE_LEN: usize = 200;
/// Maximum size of document content, in bytes.
pub const MAX_DOCUMENT_BYTES: usize = 10 * 1024 * 1024;

// ============================================================================
// SECTION: Element Kind
// ============================================================================

/// Discriminant for the six element kinds recognized by the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    /// A unit of work.
    Task,
    /// A collection of tasks that does not itself block its children.
    Plan,
    /// Stored content with a content type and hash.
    Document,
    /// Opaque channel element; domain rules enforced by a thin validation pass.
    Channel,
    /// Opaque, immutable message element.
    Message,
    /// Opaque entity (human or agent) element.
    Entity,
}

impl ElementKind {
    /// Returns every element kind, in a stable order used for default
    /// `stats()` ordering.
    #[must_use]
    pub const fn all() -> [Self; 6] {
        [Self::Task, Self::Plan, Self::Document, Self::Channel, Self::Message, Self::Entity]
    }
}

// ============================================================================
// SECTION: Metadata
// ============================================================================

/// Free-form metadata attached to an element: a mapping from string keys to
/// arbitrary JSON-compatible values, capped at [`MAX_METADATA_BYTES`] when
/// encoded.
pub type Metadata = BTreeMap<String, Value>;

/// Validates a metadata map against the encoded size cap.
///
/// # Errors
///
/// Returns [`CoreError::Validation`] when the JSON encoding of `metadata`
/// exceeds [`MAX_METADATA_BYTES`].
pub fn validate_metadata(metadata: &Metadata) -> CoreResult<()> {
    let encoded = serde_json::to_vec(metadata)
        .map_err(|err| CoreError::validation("metadata", err.to_string()))?;
    if encoded.len() > MAX_METADATA_BYTES {
        return Err(CoreError::validation(
            "metadata",
            format!("encoded size {} exceeds {MAX_METADATA_BYTES} bytes", encoded.len()),
        ));
    }
    Ok(())
}

/// Validates and deduplicates a tag list in place, preserving first
/// occurrence order.
///
/// # Errors
///
/// Returns [`CoreError::Validation`] when there are more than [`MAX_TAGS`]
/// tags, a tag exceeds [`MAX_TAG_LEN`], or a tag is not a lowercase slug.
pub fn validate_tags(tags: &mut Vec<String>) -> CoreResult<()> {
    let mut seen = std::collections::BTreeSet::new();
    tags.retain(|tag| seen.insert(tag.clone()));
    if tags.len() > MAX_TAGS {
        return Err(CoreError::validation("tags", format!("at most {MAX_TAGS} tags are allowed")));
    }
    for tag in tags.iter() {
        if tag.is_empty() || tag.len() > MAX_TAG_LEN {
            return Err(CoreError::validation(
                "tags",
                format!("tag `{tag}` must be 1-{MAX_TAG_LEN} characters"),
            ));
        }
        let is_slug = tag.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-');
        if !is_slug {
            return Err(CoreError::validation(
                "tags",
                format!("tag `{tag}` must be a lowercase slug"),
            ));
        }
    }
    Ok(())
}

// ============================================================================
// SECTION: Task
// ============================================================================

/// Task lifecycle status.
///
/// # Invariants
/// - `tombstone` is reached only via [`ElementKind`] deletion and is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Ready to start, not yet picked up.
    Open,
    /// Actively being worked.
    InProgress,
    /// Automatically or explicitly blocked; see the blocked cache.
    Blocked,
    /// Submitted for review.
    Review,
    /// Intentionally postponed; exempt from auto-block transitions.
    Deferred,
    /// Done.
    Closed,
    /// Soft-deleted.
    Tombstone,
}

impl TaskStatus {
    /// Returns true for statuses considered "completed" for the purposes of
    /// `blocks` and `parent-child` blocking evaluation (spec.md §4.4).
    #[must_use]
    pub const fn is_completion_status(self) -> bool {
        matches!(self, Self::Closed | Self::Tombstone)
    }

    /// Returns true for the statuses the query layer considers "ready"
    /// candidates (before the blocked-cache check).
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Open | Self::InProgress)
    }

    /// Returns true when auto-block transitions should not apply (spec.md
    /// §4.4: `blocked`, `closed`, `tombstone`, `deferred` are excluded).
    #[must_use]
    pub const fn exempt_from_auto_block(self) -> bool {
        matches!(self, Self::Blocked | Self::Closed | Self::Tombstone | Self::Deferred)
    }
}

/// Task priority; ordered inversely to urgency (1 = most urgent).
///
/// See spec.md §9 "Design Notes" — priority ordering. Use
/// [`Priority::more_urgent`] rather than scattering `min`/`max` inversions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum Priority {
    /// 1: critical.
    Critical = 1,
    /// 2: high.
    High = 2,
    /// 3: medium (default).
    Medium = 3,
    /// 4: low.
    Low = 4,
    /// 5: trivial.
    Trivial = 5,
}

impl Priority {
    /// Returns the more urgent (numerically smaller) of two priorities.
    #[must_use]
    pub fn more_urgent(self, other: Self) -> Self {
        if self <= other { self } else { other }
    }

    /// Converts a raw 1-5 integer into a [`Priority`].
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Critical),
            2 => Some(Self::High),
            3 => Some(Self::Medium),
            4 => Some(Self::Low),
            5 => Some(Self::Trivial),
            _ => None,
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::Medium
    }
}

/// Task complexity, 1 (trivial) to 5 (very complex).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum Complexity {
    /// 1: trivial.
    Trivial = 1,
    /// 2: simple.
    Simple = 2,
    /// 3: medium.
    Medium = 3,
    /// 4: complex.
    Complex = 4,
    /// 5: very complex.
    VeryComplex = 5,
}

impl Complexity {
    /// Converts a raw 1-5 integer into a [`Complexity`].
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Trivial),
            2 => Some(Self::Simple),
            3 => Some(Self::Medium),
            4 => Some(Self::Complex),
            5 => Some(Self::VeryComplex),
            _ => None,
        }
    }

    /// Returns the raw 1-5 integer value.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Task type / issue category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    /// A general task.
    Task,
    /// A defect.
    Bug,
    /// A user story.
    Story,
    /// A large, multi-task initiative.
    Epic,
}

/// Task-specific fields layered on [`Element`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Human-readable title, 1-200 characters.
    pub title: String,
    /// Current lifecycle status.
    pub status: TaskStatus,
    /// Scheduling priority.
    pub priority: Priority,
    /// Estimated complexity.
    pub complexity: Complexity,
    /// Issue category.
    pub task_type: TaskType,
    /// Assigned entity, if any.
    pub assignee: Option<EntityId>,
    /// Optional acceptance criteria text.
    pub acceptance_criteria: Option<String>,
    /// Timestamp at which the task was closed, if it has been.
    pub closed_at: Option<Timestamp>,
}

impl Task {
    /// Validates the fixed-shape invariants on a task payload (title length;
    /// cross-field rules like `closed_at` live in the registry, which has
    /// the surrounding transition context).
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] when `title` is out of range.
    pub fn validate(&self) -> CoreResult<()> {
        let len = self.title.chars().count();
        if !(MIN_TITLE_LEN..=MAX_TITLE_LEN).contains(&len) {
            return Err(CoreError::validation(
                "title",
                format!("must be {MIN_TITLE_LEN}-{MAX_TITLE_LEN} characters"),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Plan
// ============================================================================

/// Plan lifecycle status; distinct from [`TaskStatus`] because plans are
/// never driven by the blocked cache (spec.md §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    /// Plan is active.
    Open,
    /// Plan has completed.
    Closed,
    /// Soft-deleted.
    Tombstone,
}

/// Plan-specific fields layered on [`Element`]. A plan groups tasks via
/// `parent-child` edges but is never itself a blocker (spec.md §4.4).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    /// Human-readable title.
    pub title: String,
    /// Overall plan status.
    pub status: PlanStatus,
}

impl Plan {
    /// Validates the fixed-shape invariants on a plan payload.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] when `title` is out of range.
    pub fn validate(&self) -> CoreResult<()> {
        let len = self.title.chars().count();
        if !(MIN_TITLE_LEN..=MAX_TITLE_LEN).contains(&len) {
            return Err(CoreError::validation(
                "title",
                format!("must be {MIN_TITLE_LEN}-{MAX_TITLE_LEN} characters"),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Document
// ============================================================================

/// Content type of a [`Document`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    /// Plain text.
    Text,
    /// Markdown.
    Markdown,
    /// JSON.
    Json,
    /// HTML.
    Html,
    /// Any other MIME-ish label not covered above.
    Other(String),
}

/// Document-specific fields layered on [`Element`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Raw content bytes, at most [`MAX_DOCUMENT_BYTES`].
    pub content: Vec<u8>,
    /// Declared content type.
    pub content_type: ContentType,
    /// Lowercase hex SHA-256 of `content`, kept in sync by the registry.
    pub hash: String,
    /// Optional document title.
    pub title: Option<String>,
}

impl Document {
    /// Validates the fixed-shape invariants on a document payload.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] when `content` exceeds
    /// [`MAX_DOCUMENT_BYTES`] or `hash` does not match `content`.
    pub fn validate(&self) -> CoreResult<()> {
        if self.content.len() > MAX_DOCUMENT_BYTES {
            return Err(CoreError::validation(
                "content",
                format!("exceeds {MAX_DOCUMENT_BYTES} bytes"),
            ));
        }
        let expected = crate::model::hashing::sha256_hex(&self.content);
        if self.hash != expected {
            return Err(CoreError::validation("hash", "does not match sha-256 of content"));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Opaque Elements (Channel, Message, Entity)
// ============================================================================

/// Opaque channel element. Membership and other domain rules are enforced
/// by a thin validation pass at insertion time, not specified further here
/// (spec.md §3).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Channel;

/// Opaque, immutable message element. Update/delete attempts raise
/// [`CoreError::ConstraintViolation`] (spec.md §3 "Lifecycles").
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Message;

/// Opaque entity element (a human or agent participant).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord;

// ============================================================================
// SECTION: Element Payload
// ============================================================================

/// Tagged variant over the six element kinds (spec.md §9 "Design Notes").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ElementPayload {
    /// A task payload.
    Task(Task),
    /// A plan payload.
    Plan(Plan),
    /// A document payload.
    Document(Document),
    /// A channel payload.
    Channel(Channel),
    /// A message payload.
    Message(Message),
    /// An entity payload.
    Entity(EntityRecord),
}

impl ElementPayload {
    /// Returns the [`ElementKind`] discriminant for this payload.
    #[must_use]
    pub const fn kind(&self) -> ElementKind {
        match self {
            Self::Task(_) => ElementKind::Task,
            Self::Plan(_) => ElementKind::Plan,
            Self::Document(_) => ElementKind::Document,
            Self::Channel(_) => ElementKind::Channel,
            Self::Message(_) => ElementKind::Message,
            Self::Entity(_) => ElementKind::Entity,
        }
    }

    /// Returns true if this element kind is immutable once created
    /// (messages only, spec.md §3 "Lifecycles").
    #[must_use]
    pub const fn is_immutable(&self) -> bool {
        matches!(self, Self::Message(_))
    }

    /// Returns the task payload, if this is a task.
    #[must_use]
    pub const fn as_task(&self) -> Option<&Task> {
        match self {
            Self::Task(task) => Some(task),
            _ => None,
        }
    }

    /// Returns the task payload mutably, if this is a task.
    #[must_use]
    pub fn as_task_mut(&mut self) -> Option<&mut Task> {
        match self {
            Self::Task(task) => Some(task),
            _ => None,
        }
    }

    /// Validates the fixed-shape invariants for whichever variant this is.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] per the variant's own validation.
    pub fn validate(&self) -> CoreResult<()> {
        match self {
            Self::Task(task) => task.validate(),
            Self::Plan(plan) => plan.validate(),
            Self::Document(document) => document.validate(),
            Self::Channel(_) | Self::Message(_) | Self::Entity(_) => Ok(()),
        }
    }
}

// ============================================================================
// SECTION: Element Envelope
// ============================================================================

/// The base record for every addressable object (spec.md §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    /// Content-addressed identifier.
    pub id: ElementId,
    /// Creation timestamp.
    pub created_at: Timestamp,
    /// Last-update timestamp; equals `created_at` for messages.
    pub updated_at: Timestamp,
    /// Acting entity that created this element.
    pub created_by: EntityId,
    /// Ordered, deduplicated lowercase slugs, at most [`MAX_TAGS`].
    pub tags: Vec<String>,
    /// Free-form metadata, at most [`MAX_METADATA_BYTES`] encoded.
    pub metadata: Metadata,
    /// Soft-delete marker; presence means tombstoned.
    pub deleted_at: Option<Timestamp>,
    /// Type-specific payload.
    pub payload: ElementPayload,
}

impl Element {
    /// Returns the element kind.
    #[must_use]
    pub const fn kind(&self) -> ElementKind {
        self.payload.kind()
    }

    /// Returns true if the element has been soft-deleted.
    #[must_use]
    pub const fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Validates the full set of envelope-level invariants (tags, metadata
    /// size) plus the payload's own invariants.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] on the first violated invariant.
    pub fn validate(&self) -> CoreResult<()> {
        if self.tags.len() > MAX_TAGS {
            return Err(CoreError::validation("tags", format!("at most {MAX_TAGS} tags")));
        }
        for tag in &self.tags {
            if tag.is_empty() || tag.len() > MAX_TAG_LEN {
                return Err(CoreError::validation("tags", format!("tag `{tag}` out of range")));
            }
        }
        validate_metadata(&self.metadata)?;
        if matches!(self.payload, ElementPayload::Message(_)) && self.updated_at != self.created_at {
            return Err(CoreError::ConstraintViolation(
                "message elements are immutable: updated_at must equal created_at".to_string(),
            ));
        }
        self.payload.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_task() -> Task {
        Task {
            title: "Fix the bug".to_string(),
            status: TaskStatus::Open,
            priority: Priority::Medium,
            complexity: Complexity::Simple,
            task_type: TaskType::Bug,
            assignee: None,
            acceptance_criteria: None,
            closed_at: None,
        }
    }

    #[test]
    fn priority_more_urgent_picks_smaller_number() {
        assert_eq!(Priority::Critical.more_urgent(Priority::Trivial), Priority::Critical);
        assert_eq!(Priority::Low.more_urgent(Priority::Medium), Priority::Medium);
    }

    #[test]
    fn task_validate_rejects_empty_title() {
        let mut task = sample_task();
        task.title = String::new();
        assert!(task.validate().is_err());
    }

    #[test]
    fn document_validate_checks_hash() {
        let content = b"hello world".to_vec();
        let hash = crate::model::hashing::sha256_hex(&content);
        let good = Document {
            content: content.clone(),
            content_type: ContentType::Text,
            hash,
            title: None,
        };
        assert!(good.validate().is_ok());

        let bad = Document {
            content,
            content_type: ContentType::Text,
            hash: "deadbeef".to_string(),
            title: None,
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn validate_tags_dedupes_and_enforces_slug_shape() {
        let mut tags = vec!["a".to_string(), "a".to_string(), "b-2".to_string()];
        validate_tags(&mut tags).expect("valid");
        assert_eq!(tags, vec!["a".to_string(), "b-2".to_string()]);

        let mut bad = vec!["Not-A-Slug".to_string()];
        assert!(validate_tags(&mut bad).is_err());
    }
}
