// crates/stoneforge-core/src/runtime/registry.rs
// ============================================================================
// Module: Element Registry
// Description: CRUD over typed elements, soft-delete, and content-addressed
// ID generation.
// Purpose: Implement spec.md §4.2 over the `Store` abstraction.
// Dependencies: crate::{error, interfaces, model}, crate::runtime::engine
// ============================================================================

//! ## Overview
//! [`ElementRegistry`] owns element creation, lookup, patch-based update, and
//! soft-delete. It does not know about dependency edges or the blocked
//! cache; [`super::engine::StoneforgeEngine`] composes it with
//! [`super::graph::DependencyGraph`] and [`super::blocked_cache::BlockedCache`]
//! to get the full cascading behavior spec.md §4.2/§4.4 describe.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::error::CoreError;
use crate::error::CoreResult;
use crate::interfaces::ElementFilter;
use crate::interfaces::Transaction;
use crate::model::ClockSource;
use crate::model::Complexity;
use crate::model::ContentType;
use crate::model::Document;
use crate::model::Element;
use crate::model::ElementId;
use crate::model::ElementPayload;
use crate::model::EntityId;
use crate::model::Event;
use crate::model::EventId;
use crate::model::EventKind;
use crate::model::Metadata;
use crate::model::Plan;
use crate::model::PlanStatus;
use crate::model::Priority;
use crate::model::Task;
use crate::model::TaskStatus;
use crate::model::TaskType;
use crate::model::derive_element_id_candidates;
use crate::model::element::validate_metadata;
use crate::model::element::validate_tags;
use crate::runtime::engine::IdGeneratorConfig;

// ============================================================================
// SECTION: Patch Types
// ============================================================================

/// Task-specific partial update. Fields wrapped in an outer `Option` are
/// unchanged when `None`; `assignee`/`acceptance_criteria` are nested
/// `Option<Option<_>>` so callers can distinguish "leave as-is" from
/// "clear to null".
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    /// New title, if changing.
    pub title: Option<String>,
    /// New status, if changing.
    pub status: Option<TaskStatus>,
    /// New priority, if changing.
    pub priority: Option<Priority>,
    /// New complexity, if changing.
    pub complexity: Option<Complexity>,
    /// New task type, if changing.
    pub task_type: Option<TaskType>,
    /// New assignee; `Some(None)` clears it.
    pub assignee: Option<Option<EntityId>>,
    /// New acceptance criteria; `Some(None)` clears it.
    pub acceptance_criteria: Option<Option<String>>,
}

/// Plan-specific partial update.
#[derive(Debug, Clone, Default)]
pub struct PlanPatch {
    /// New title, if changing.
    pub title: Option<String>,
    /// New status, if changing.
    pub status: Option<PlanStatus>,
}

/// Document-specific partial update. Changing `content` recomputes `hash`.
#[derive(Debug, Clone, Default)]
pub struct DocumentPatch {
    /// New content bytes, if changing.
    pub content: Option<Vec<u8>>,
    /// New content type, if changing.
    pub content_type: Option<ContentType>,
    /// New title; `Some(None)` clears it.
    pub title: Option<Option<String>>,
}

/// Payload-specific half of an [`ElementPatch`]. Channel, message, and entity
/// payloads carry no mutable fields: messages are immutable by spec.md §3
/// "Lifecycles", and channel/entity validation is a thin pass with nothing
/// further to patch.
#[derive(Debug, Clone)]
pub enum PayloadPatch {
    /// Patch a task payload.
    Task(TaskPatch),
    /// Patch a plan payload.
    Plan(PlanPatch),
    /// Patch a document payload.
    Document(DocumentPatch),
}

/// A partial update to an [`Element`] (spec.md §4.2 `Update`).
#[derive(Debug, Clone, Default)]
pub struct ElementPatch {
    /// Replacement tag list, if changing.
    pub tags: Option<Vec<String>>,
    /// Replacement metadata map, if changing.
    pub metadata: Option<Metadata>,
    /// Payload-specific fields to patch.
    pub payload: Option<PayloadPatch>,
}

/// The outcome of [`ElementRegistry::update`]: the updated element plus the
/// task status transition, if any, so the caller can feed
/// [`super::blocked_cache::BlockedCache::on_status_changed`].
#[derive(Debug, Clone)]
pub struct UpdateOutcome {
    /// The element after the patch was applied.
    pub element: Element,
    /// `(old, new)` task status, present only when a task's status changed.
    pub status_change: Option<(TaskStatus, TaskStatus)>,
}

// ============================================================================
// SECTION: Element Registry
// ============================================================================

/// Stateless element-CRUD operations over a [`Transaction`] (spec.md §4.2).
#[derive(Debug, Clone, Copy, Default)]
pub struct ElementRegistry;

impl ElementRegistry {
    /// Creates a registry handle.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Creates a new element, generating its id from `identifier` and
    /// `created_by` (spec.md §4.2 "ID generation").
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] on malformed tags/metadata/payload,
    /// [`CoreError::IdExhausted`] if no unused id is found within
    /// `id_config`'s range, or [`CoreError::Storage`] on backend failure.
    #[allow(clippy::too_many_arguments, reason = "mirrors the registry create() contract's distinct fields")]
    pub fn create(
        &self,
        tx: &mut impl Transaction,
        identifier: &str,
        created_by: EntityId,
        payload: ElementPayload,
        mut tags: Vec<String>,
        metadata: Metadata,
        clock: &dyn ClockSource,
        id_config: IdGeneratorConfig,
    ) -> CoreResult<Element> {
        validate_tags(&mut tags)?;
        validate_metadata(&metadata)?;
        payload.validate()?;

        let id = self.generate_id(tx, identifier, created_by.as_str(), id_config)?;
        let now = clock.now();
        let element = Element {
            id,
            created_at: now,
            updated_at: now,
            created_by: created_by.clone(),
            tags,
            metadata,
            deleted_at: None,
            payload,
        };
        element.validate()?;
        tx.insert_element(&element)?;
        tx.append_event(&Event {
            id: EventId::from_raw(format!("ev-{}-created", element.id)),
            element_id: element.id.clone(),
            event_type: EventKind::Created,
            actor: created_by,
            timestamp: now,
            old_value: None,
            new_value: serde_json::to_value(&element.payload).ok(),
        })?;
        Ok(element)
    }

    /// Fetches an element (spec.md §4.2 `Get`).
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Storage`] on backend failure.
    pub fn get(
        &self,
        tx: &mut impl Transaction,
        id: &ElementId,
        include_deleted: bool,
    ) -> CoreResult<Option<Element>> {
        let element = tx.get_element(id)?;
        Ok(element.filter(|element| include_deleted || !element.is_deleted()))
    }

    /// Lists elements matching `filter` (spec.md §4.2 "List/filter").
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Storage`] on backend failure.
    pub fn list(&self, tx: &mut impl Transaction, filter: &ElementFilter) -> CoreResult<Vec<Element>> {
        tx.list_elements(filter)
    }

    /// Applies a partial update (spec.md §4.2 `Update`).
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] if `id` is absent or tombstoned,
    /// [`CoreError::ConstraintViolation`] when patching an immutable message
    /// element, or [`CoreError::Validation`] on a malformed patch.
    pub fn update(
        &self,
        tx: &mut impl Transaction,
        id: &ElementId,
        patch: ElementPatch,
        actor: EntityId,
        clock: &dyn ClockSource,
    ) -> CoreResult<UpdateOutcome> {
        let mut element = tx.get_element(id)?.filter(|e| !e.is_deleted()).ok_or_else(|| CoreError::NotFound(id.clone()))?;

        if element.payload.is_immutable() {
            return Err(CoreError::ConstraintViolation(
                "message elements are immutable".to_string(),
            ));
        }

        let old_payload = serde_json::to_value(&element.payload).ok();
        let now = clock.now();
        let status_change = apply_patch(&mut element, patch, now)?;
        element.updated_at = now;
        element.validate()?;

        tx.replace_element(&element)?;
        tx.append_event(&Event {
            id: EventId::from_raw(format!("ev-{}-updated-{}", element.id, element.updated_at)),
            element_id: element.id.clone(),
            event_type: EventKind::Updated,
            actor: actor.clone(),
            timestamp: element.updated_at,
            old_value: old_payload,
            new_value: serde_json::to_value(&element.payload).ok(),
        })?;

        if let Some((old_status, new_status)) = status_change {
            tx.append_event(&Event {
                id: EventId::from_raw(format!("ev-{}-status-{}", element.id, element.updated_at)),
                element_id: element.id.clone(),
                event_type: EventKind::StatusChanged,
                actor,
                timestamp: element.updated_at,
                old_value: serde_json::to_value(old_status).ok(),
                new_value: serde_json::to_value(new_status).ok(),
            })?;
        }

        Ok(UpdateOutcome { element, status_change })
    }

    /// Soft-deletes an element (spec.md §4.2 `Delete`). Cascading dependency
    /// removal and cache invalidation are the caller's responsibility (see
    /// [`super::engine::StoneforgeEngine::delete_element`]).
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] if `id` is absent or already
    /// tombstoned, or [`CoreError::ConstraintViolation`] for a message
    /// element (spec.md §3 "Lifecycles": messages are immutable, and
    /// `updated_at == created_at` must hold for the life of the element).
    pub fn delete(
        &self,
        tx: &mut impl Transaction,
        id: &ElementId,
        actor: EntityId,
        clock: &dyn ClockSource,
    ) -> CoreResult<Element> {
        let mut element = tx.get_element(id)?.filter(|e| !e.is_deleted()).ok_or_else(|| CoreError::NotFound(id.clone()))?;

        if element.payload.is_immutable() {
            return Err(CoreError::ConstraintViolation(
                "message elements are immutable".to_string(),
            ));
        }

        let now = clock.now();
        element.deleted_at = Some(now);
        element.updated_at = now;
        tx.replace_element(&element)?;
        tx.append_event(&Event {
            id: EventId::from_raw(format!("ev-{}-deleted", element.id)),
            element_id: element.id.clone(),
            event_type: EventKind::Deleted,
            actor,
            timestamp: now,
            old_value: None,
            new_value: None,
        })?;
        Ok(element)
    }

    /// Generates a fresh content-addressed id by probing
    /// [`derive_element_id_candidates`] in growing-length order (spec.md
    /// §4.2 "ID generation").
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::IdExhausted`] once every candidate length is
    /// already in use.
    fn generate_id(
        &self,
        tx: &mut impl Transaction,
        identifier: &str,
        created_by: &str,
        id_config: IdGeneratorConfig,
    ) -> CoreResult<ElementId> {
        let candidates =
            derive_element_id_candidates(identifier, created_by, id_config.min_len, id_config.max_len);
        for candidate in candidates {
            if tx.get_element(&candidate)?.is_none() {
                return Ok(candidate);
            }
        }
        Err(CoreError::IdExhausted(identifier.to_string()))
    }
}

// ============================================================================
// SECTION: Patch Application
// ============================================================================

/// Applies `patch` to `element` in place, returning the task status
/// transition, if any. `now` stamps `closed_at` when a task transitions into
/// or out of [`TaskStatus::Closed`].
fn apply_patch(
    element: &mut Element,
    patch: ElementPatch,
    now: crate::model::Timestamp,
) -> CoreResult<Option<(TaskStatus, TaskStatus)>> {
    if let Some(mut tags) = patch.tags {
        validate_tags(&mut tags)?;
        element.tags = tags;
    }
    if let Some(metadata) = patch.metadata {
        validate_metadata(&metadata)?;
        element.metadata = metadata;
    }

    let Some(payload_patch) = patch.payload else {
        return Ok(None);
    };

    match (&mut element.payload, payload_patch) {
        (ElementPayload::Task(task), PayloadPatch::Task(task_patch)) => Ok(apply_task_patch(task, task_patch, now)),
        (ElementPayload::Plan(plan), PayloadPatch::Plan(plan_patch)) => {
            apply_plan_patch(plan, plan_patch);
            Ok(None)
        }
        (ElementPayload::Document(document), PayloadPatch::Document(document_patch)) => {
            apply_document_patch(document, document_patch);
            Ok(None)
        }
        _ => Err(CoreError::ConstraintViolation(
            "patch payload kind does not match element kind".to_string(),
        )),
    }
}

/// Applies a [`TaskPatch`], returning the `(old, new)` status pair if the
/// status changed. Stamps `closed_at` with `now` on transition into
/// [`TaskStatus::Closed`] and clears it on transition back out.
fn apply_task_patch(task: &mut Task, patch: TaskPatch, now: crate::model::Timestamp) -> Option<(TaskStatus, TaskStatus)> {
    if let Some(title) = patch.title {
        task.title = title;
    }
    let status_change = patch.status.filter(|&new_status| new_status != task.status).map(|new_status| {
        let old_status = task.status;
        task.status = new_status;
        task.closed_at = (new_status == TaskStatus::Closed).then_some(now);
        (old_status, new_status)
    });
    if let Some(priority) = patch.priority {
        task.priority = priority;
    }
    if let Some(complexity) = patch.complexity {
        task.complexity = complexity;
    }
    if let Some(task_type) = patch.task_type {
        task.task_type = task_type;
    }
    if let Some(assignee) = patch.assignee {
        task.assignee = assignee;
    }
    if let Some(acceptance_criteria) = patch.acceptance_criteria {
        task.acceptance_criteria = acceptance_criteria;
    }
    status_change
}

/// Applies a [`PlanPatch`] in place.
fn apply_plan_patch(plan: &mut Plan, patch: PlanPatch) {
    if let Some(title) = patch.title {
        plan.title = title;
    }
    if let Some(status) = patch.status {
        plan.status = status;
    }
}

/// Applies a [`DocumentPatch`] in place, recomputing `hash` when `content`
/// changes.
fn apply_document_patch(document: &mut Document, patch: DocumentPatch) {
    if let Some(content) = patch.content {
        document.hash = crate::model::sha256_hex(&content);
        document.content = content;
    }
    if let Some(content_type) = patch.content_type {
        document.content_type = content_type;
    }
    if let Some(title) = patch.title {
        document.title = title;
    }
}
