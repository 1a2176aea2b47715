// crates/stoneforge-core/src/runtime/engine.rs
// ============================================================================
// Module: Stoneforge Engine
// Description: The top-level facade composing the registry, dependency
// graph, blocked cache, gate engine, priority engine, and query layer over
// one transactional `Store`.
// Purpose: Implement spec.md §4's public operation surface with correct
// transactional cascading (spec.md §5 "Ordering guarantees").
// Dependencies: crate::{error, interfaces, model}, crate::runtime::*
// ============================================================================

//! ## Overview
//! [`StoneforgeEngine`] is the only type application code is expected to
//! hold. Every public method opens one [`Transaction`], drives the relevant
//! runtime modules over it — including cascading blocked-cache invalidation
//! and the automatic status transitions it decides on — and commits
//! atomically, or rolls back on the first error (spec.md §5).
//!
//! Automatic status transitions are applied via [`RecordingStatusCallback`]:
//! the blocked cache only *decides* block/unblock; this engine is the one
//! place that turns those decisions into a registry update, attributed to
//! the synthetic [`SYSTEM_ACTOR`] entity.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::error::CoreResult;
use crate::interfaces::ElementFilter;
use crate::interfaces::RecordingStatusCallback;
use crate::interfaces::Store;
use crate::interfaces::StoreStats;
use crate::interfaces::Transaction;
use crate::model::BlockedCacheRow;
use crate::model::ClockSource;
use crate::model::Dependency;
use crate::model::DependencyKind;
use crate::model::Element;
use crate::model::ElementId;
use crate::model::ElementKind;
use crate::model::ElementPayload;
use crate::model::EntityId;
use crate::model::Event;
use crate::model::EventId;
use crate::model::EventKind;
use crate::model::Metadata;
use crate::model::SystemClock;
use crate::model::TaskStatus;
use crate::model::identifiers::ELEMENT_ID_MAX_LEN;
use crate::model::identifiers::ELEMENT_ID_MIN_LEN;
use crate::runtime::blocked_cache::BlockedCache;
use crate::runtime::blocked_cache::RebuildReport;
use crate::runtime::gate::GateEngine;
use crate::runtime::graph::DependencyGraph;
use crate::runtime::graph::DependencyTree;
pub use crate::runtime::priority::PriorityConfig;
use crate::runtime::priority::PrioritizedElement;
use crate::runtime::priority::PriorityEngine;
use crate::runtime::query::QueryLayer;
use crate::runtime::query::ReadyFilter;
use crate::runtime::query::TaskFilter;
use crate::runtime::registry::ElementPatch;
use crate::runtime::registry::ElementRegistry;
use crate::runtime::registry::PayloadPatch;
use crate::runtime::registry::TaskPatch;

/// Acting entity recorded against automatic status transitions the blocked
/// cache drives (spec.md §4.4 "Notifications").
const SYSTEM_ACTOR: &str = "system";

// ============================================================================
// SECTION: Id Generator Config
// ============================================================================

/// Content-addressed id length range (spec.md §6 `idGenerator.minLen` /
/// `idGenerator.maxLen`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdGeneratorConfig {
    /// Shortest id body length tried first.
    pub min_len: usize,
    /// Longest id body length tried before failing with `IdExhausted`.
    pub max_len: usize,
}

impl Default for IdGeneratorConfig {
    fn default() -> Self {
        Self { min_len: ELEMENT_ID_MIN_LEN, max_len: ELEMENT_ID_MAX_LEN }
    }
}

// ============================================================================
// SECTION: Engine Config
// ============================================================================

/// Top-level engine configuration (spec.md §6).
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    /// Content-addressed id generation range.
    pub id_generator: IdGeneratorConfig,
    /// Effective-priority propagation bound.
    pub priority: PriorityConfig,
    /// Whether the blocked cache drives automatic task status transitions
    /// (spec.md §6 `cache.autoTransitionStatus`).
    pub auto_transition_status: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            id_generator: IdGeneratorConfig::default(),
            priority: PriorityConfig::default(),
            auto_transition_status: true,
        }
    }
}

// ============================================================================
// SECTION: Stoneforge Engine
// ============================================================================

/// The composed runtime engine over one `Store` backend (spec.md §4).
pub struct StoneforgeEngine<S: Store> {
    store: S,
    clock: Box<dyn ClockSource>,
    config: EngineConfig,
    registry: ElementRegistry,
    graph: DependencyGraph,
    blocked_cache: BlockedCache,
    gate: GateEngine,
    priority: PriorityEngine,
    query: QueryLayer,
}

impl<S: Store> StoneforgeEngine<S> {
    /// Creates an engine over `store` with an explicit clock source and
    /// configuration.
    pub fn new(store: S, clock: Box<dyn ClockSource>, config: EngineConfig) -> Self {
        Self {
            store,
            clock,
            blocked_cache: BlockedCache::new(config.auto_transition_status),
            config,
            registry: ElementRegistry::new(),
            graph: DependencyGraph::new(),
            gate: GateEngine::new(),
            priority: PriorityEngine::new(),
            query: QueryLayer::new(),
        }
    }

    /// Creates an engine with the wall clock and default configuration.
    pub fn with_defaults(store: S) -> Self {
        Self::new(store, Box::new(SystemClock), EngineConfig::default())
    }

    // -- elements ---------------------------------------------------------

    /// Creates a new element (spec.md §4.2 `Create`).
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::CoreError::Validation`] on malformed input,
    /// [`crate::error::CoreError::IdExhausted`] if the id range is spent, or
    /// [`crate::error::CoreError::Storage`] on backend failure.
    pub fn create_element(
        &self,
        identifier: &str,
        created_by: EntityId,
        payload: ElementPayload,
        tags: Vec<String>,
        metadata: Metadata,
    ) -> CoreResult<Element> {
        self.with_tx(|tx| {
            self.registry.create(tx, identifier, created_by, payload, tags, metadata, self.clock.as_ref(), self.config.id_generator)
        })
    }

    /// Fetches an element by id (spec.md §4.2 `Get`).
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::CoreError::Storage`] on backend failure.
    pub fn get_element(&self, id: &ElementId, include_deleted: bool) -> CoreResult<Option<Element>> {
        self.with_tx(|tx| self.registry.get(tx, id, include_deleted))
    }

    /// Lists elements matching `filter` (spec.md §4.2 "List/filter").
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::CoreError::Storage`] on backend failure.
    pub fn list_elements(&self, filter: &ElementFilter) -> CoreResult<Vec<Element>> {
        self.with_tx(|tx| self.registry.list(tx, filter))
    }

    /// Applies a partial update, cascading blocked-cache invalidation and
    /// automatic status transitions when the patch changes a task's status
    /// across the completion boundary (spec.md §4.2 `Update`, §4.4
    /// `onStatusChanged`).
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::CoreError::NotFound`] if `id` is absent, or
    /// [`crate::error::CoreError::ConstraintViolation`] on an immutable
    /// payload or status/kind mismatch.
    pub fn update_element(&self, id: &ElementId, patch: ElementPatch, actor: EntityId) -> CoreResult<Element> {
        self.with_tx(|tx| {
            let outcome = self.registry.update(tx, id, patch, actor, self.clock.as_ref())?;
            if let Some((old, new)) = outcome.status_change {
                let mut callback = RecordingStatusCallback::default();
                self.blocked_cache.on_status_changed(tx, id, old, new, self.clock.as_ref(), &mut callback)?;
                self.apply_transitions(tx, callback)?;
            }
            Ok(outcome.element)
        })
    }

    /// Soft-deletes an element, cascading dependency edge removal and
    /// blocked-cache invalidation (spec.md §4.2 `Delete`, §4.4
    /// `onElementDeleted`).
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::CoreError::NotFound`] if `id` is absent or
    /// already tombstoned.
    pub fn delete_element(&self, id: &ElementId, actor: EntityId) -> CoreResult<Element> {
        self.with_tx(|tx| {
            let element = self.registry.delete(tx, id, actor, self.clock.as_ref())?;
            // Cascade while dependency edges still exist, so dependents of
            // `id` can be found; each dependent's re-evaluation already sees
            // `id` as tombstoned (blocks_edge_blocks reads `is_deleted()`).
            let mut callback = RecordingStatusCallback::default();
            self.blocked_cache.on_element_deleted(tx, id, self.clock.as_ref(), &mut callback)?;
            self.apply_transitions(tx, callback)?;
            tx.remove_dependencies_touching(id)?;
            Ok(element)
        })
    }

    // -- dependencies -------------------------------------------------------

    /// Adds a dependency edge, cascading blocked-cache invalidation (spec.md
    /// §4.3 `AddDependency`, §4.4 `onDependencyAdded`).
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::CoreError::ConstraintViolation`] for a
    /// self-dependency or a cycle, or [`crate::error::CoreError::NotFound`]
    /// for a missing endpoint.
    pub fn add_dependency(&self, dependency: Dependency) -> CoreResult<Dependency> {
        self.add_dependency_with_options(dependency, false)
    }

    /// As [`Self::add_dependency`], allowing a `relates-to` edge to a
    /// not-yet-existing endpoint.
    ///
    /// # Errors
    ///
    /// See [`Self::add_dependency`].
    pub fn add_dependency_with_options(&self, dependency: Dependency, allow_forward_reference: bool) -> CoreResult<Dependency> {
        self.with_tx(|tx| {
            let kind = dependency.kind;
            let blocked_id = dependency.blocked_id.clone();
            let inserted = self.graph.add_dependency_with_options(tx, dependency, allow_forward_reference)?;
            let mut callback = RecordingStatusCallback::default();
            self.blocked_cache.on_dependency_added(tx, &blocked_id, kind, self.clock.as_ref(), &mut callback)?;
            self.apply_transitions(tx, callback)?;
            tx.append_event(&Event {
                id: EventId::from_raw(format!("ev-{blocked_id}-dep-added-{}", self.clock.now())),
                element_id: blocked_id,
                event_type: EventKind::DependencyAdded,
                actor: inserted.created_by.clone(),
                timestamp: inserted.created_at,
                old_value: None,
                new_value: serde_json::to_value(&inserted).ok(),
            })?;
            Ok(inserted)
        })
    }

    /// Removes a dependency edge, cascading blocked-cache invalidation
    /// (spec.md §4.3 `RemoveDependency`, §4.4 `onDependencyRemoved`).
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::CoreError::Storage`] on backend failure.
    pub fn remove_dependency(
        &self,
        blocked_id: &ElementId,
        blocker_id: &ElementId,
        kind: DependencyKind,
        actor: EntityId,
    ) -> CoreResult<bool> {
        self.with_tx(|tx| {
            let removed = self.graph.remove_dependency(tx, blocked_id, blocker_id, kind)?;
            if removed {
                let mut callback = RecordingStatusCallback::default();
                self.blocked_cache.on_dependency_removed(tx, blocked_id, kind, self.clock.as_ref(), &mut callback)?;
                self.apply_transitions(tx, callback)?;
                tx.append_event(&Event {
                    id: EventId::from_raw(format!("ev-{blocked_id}-dep-removed-{}", self.clock.now())),
                    element_id: blocked_id.clone(),
                    event_type: EventKind::DependencyRemoved,
                    actor,
                    timestamp: self.clock.now(),
                    old_value: None,
                    new_value: None,
                })?;
            }
            Ok(removed)
        })
    }

    /// Returns edges where `id` is the blocked endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::CoreError::Storage`] on backend failure.
    pub fn get_dependencies(&self, id: &ElementId, kinds: Option<&[DependencyKind]>) -> CoreResult<Vec<Dependency>> {
        self.with_tx(|tx| self.graph.get_dependencies(tx, id, kinds))
    }

    /// Returns edges where `id` is the blocker endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::CoreError::Storage`] on backend failure.
    pub fn get_dependents(&self, id: &ElementId, kinds: Option<&[DependencyKind]>) -> CoreResult<Vec<Dependency>> {
        self.with_tx(|tx| self.graph.get_dependents(tx, id, kinds))
    }

    /// Returns the reachability tree rooted at `root` (spec.md §4.3
    /// `GetDependencyTree`).
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::CoreError::NotFound`] if `root` is absent.
    pub fn get_dependency_tree(&self, root: &ElementId, max_depth: u32) -> CoreResult<DependencyTree> {
        self.with_tx(|tx| self.query.get_dependency_tree(tx, root, max_depth))
    }

    // -- gates ---------------------------------------------------------------

    /// Records an approval on an `awaits` approval gate, re-evaluating the
    /// blocked element's cache row (spec.md §4.5 `RecordApproval`).
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::CoreError::NotFound`] if no matching edge
    /// exists, or [`crate::error::CoreError::Gate`] if it is not an approval
    /// gate.
    pub fn record_approval(&self, blocked_id: &ElementId, blocker_id: &ElementId, approver: EntityId) -> CoreResult<Dependency> {
        self.with_tx(|tx| {
            let dependency = self.gate.record_approval(tx, blocked_id, blocker_id, approver.clone())?;
            self.reevaluate_gate(tx, blocked_id)?;
            self.append_gate_event(tx, &dependency, EventKind::ApprovalAdded, approver)?;
            Ok(dependency)
        })
    }

    /// Withdraws an approval on an `awaits` approval gate.
    ///
    /// # Errors
    ///
    /// See [`Self::record_approval`].
    pub fn remove_approval(&self, blocked_id: &ElementId, blocker_id: &ElementId, approver: EntityId) -> CoreResult<Dependency> {
        self.with_tx(|tx| {
            let dependency = self.gate.remove_approval(tx, blocked_id, blocker_id, &approver)?;
            self.reevaluate_gate(tx, blocked_id)?;
            self.append_gate_event(tx, &dependency, EventKind::ApprovalRemoved, approver)?;
            Ok(dependency)
        })
    }

    /// Flips an external/webhook gate's `satisfied` flag (spec.md §4.5
    /// `SatisfyGate`).
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::CoreError::NotFound`] if no matching edge
    /// exists, or [`crate::error::CoreError::Gate`] if it is a timer or
    /// approval gate.
    pub fn satisfy_gate(&self, blocked_id: &ElementId, blocker_id: &ElementId, satisfied_by: EntityId) -> CoreResult<Dependency> {
        self.with_tx(|tx| {
            let dependency = self.gate.satisfy_gate(tx, blocked_id, blocker_id, satisfied_by.clone(), self.clock.as_ref())?;
            self.reevaluate_gate(tx, blocked_id)?;
            self.append_gate_event(tx, &dependency, EventKind::GateSatisfied, satisfied_by)?;
            Ok(dependency)
        })
    }

    // -- blocked cache --------------------------------------------------------

    /// Clears and fully recomputes the blocked cache, applying any resulting
    /// automatic status transitions (spec.md §4.4 `rebuild()`).
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::CoreError::Storage`] on backend failure.
    pub fn rebuild_blocked_cache(&self) -> CoreResult<RebuildReport> {
        self.with_tx(|tx| {
            let mut callback = RecordingStatusCallback::default();
            let report = self.blocked_cache.rebuild(tx, self.clock.as_ref(), &mut callback)?;
            self.apply_transitions(tx, callback)?;
            Ok(report)
        })
    }

    /// Returns the blocked-cache row for `id`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::CoreError::Storage`] on backend failure.
    pub fn get_blocked_row(&self, id: &ElementId) -> CoreResult<Option<BlockedCacheRow>> {
        self.with_tx(|tx| tx.get_blocked_row(id))
    }

    // -- queries --------------------------------------------------------------

    /// Returns active, unblocked tasks sorted most urgent first (spec.md
    /// §4.7 `ready()`).
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::CoreError::Storage`] on backend failure.
    pub fn ready(&self, filter: &ReadyFilter) -> CoreResult<Vec<PrioritizedElement>> {
        self.with_tx(|tx| self.query.ready(tx, filter, self.config.priority))
    }

    /// Returns tasks matching `filter` (spec.md §4.2 "List/filter").
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::CoreError::Storage`] on backend failure.
    pub fn tasks(&self, filter: &TaskFilter) -> CoreResult<Vec<Element>> {
        self.with_tx(|tx| self.query.tasks(tx, filter))
    }

    /// Returns every currently-blocked-cache row, paginated (spec.md §4.7
    /// `blocked()`).
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::CoreError::Storage`] on backend failure.
    pub fn blocked(&self, limit: usize, offset: usize) -> CoreResult<Vec<BlockedCacheRow>> {
        self.with_tx(|tx| self.query.blocked(tx, limit, offset))
    }

    /// Full-text / substring search (spec.md §4.7 `search()`).
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::CoreError::Storage`] on backend failure.
    pub fn search(&self, query: &str, kind: Option<ElementKind>) -> CoreResult<Vec<Element>> {
        self.with_tx(|tx| self.query.search(tx, query, kind))
    }

    /// Returns aggregate counters (spec.md §4.7 `stats()`).
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::CoreError::Storage`] on backend failure.
    pub fn stats(&self) -> CoreResult<StoreStats> {
        self.with_tx(|tx| self.query.stats(tx))
    }

    /// Computes `id`'s effective priority (spec.md §4.6).
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::CoreError::Storage`] on backend failure.
    pub fn effective_priority(&self, id: &ElementId) -> CoreResult<crate::runtime::priority::EffectivePriorityResult> {
        self.with_tx(|tx| self.priority.effective_priority(tx, id, self.config.priority))
    }

    // -- internal helpers -----------------------------------------------------

    /// Runs `f` inside a fresh transaction, committing on success and
    /// rolling back on the first error (spec.md §5 "Ordering guarantees").
    fn with_tx<R>(&self, f: impl FnOnce(&mut S::Tx<'_>) -> CoreResult<R>) -> CoreResult<R> {
        let mut tx = self.store.begin()?;
        match f(&mut tx) {
            Ok(value) => {
                tx.commit()?;
                Ok(value)
            }
            Err(err) => {
                let _ = tx.rollback();
                Err(err)
            }
        }
    }

    /// Re-evaluates `blocked_id`'s cache row after a gate mutation, applying
    /// any resulting automatic status transition. Gate edges are never
    /// `parent-child`, so no descendant recursion is needed.
    fn reevaluate_gate(&self, tx: &mut S::Tx<'_>, blocked_id: &ElementId) -> CoreResult<()> {
        let mut callback = RecordingStatusCallback::default();
        self.blocked_cache.reevaluate_one(tx, blocked_id, self.clock.as_ref(), &mut callback)?;
        self.apply_transitions(tx, callback)
    }

    /// Turns recorded block/unblock decisions into registry status updates,
    /// attributed to [`SYSTEM_ACTOR`].
    fn apply_transitions(&self, tx: &mut S::Tx<'_>, callback: RecordingStatusCallback) -> CoreResult<()> {
        for (id, _previous) in callback.blocked {
            self.apply_status(tx, &id, TaskStatus::Blocked)?;
        }
        for (id, restore_to) in callback.unblocked {
            self.apply_status(tx, &id, restore_to)?;
        }
        Ok(())
    }

    /// Applies a single automatic task status transition via the registry.
    fn apply_status(&self, tx: &mut S::Tx<'_>, id: &ElementId, status: TaskStatus) -> CoreResult<()> {
        let patch = ElementPatch {
            payload: Some(PayloadPatch::Task(TaskPatch { status: Some(status), ..Default::default() })),
            ..Default::default()
        };
        self.registry.update(tx, id, patch, EntityId::new(SYSTEM_ACTOR), self.clock.as_ref())?;
        Ok(())
    }

    /// Appends an event for a gate mutation.
    fn append_gate_event(&self, tx: &mut S::Tx<'_>, dependency: &Dependency, kind: EventKind, actor: EntityId) -> CoreResult<()> {
        tx.append_event(&Event {
            id: EventId::from_raw(format!("ev-{}-gate-{}", dependency.blocked_id, self.clock.now())),
            element_id: dependency.blocked_id.clone(),
            event_type: kind,
            actor,
            timestamp: self.clock.now(),
            old_value: None,
            new_value: serde_json::to_value(&dependency.metadata).ok(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Complexity;
    use crate::model::DependencyMetadata;
    use crate::model::FixedClock;
    use crate::model::Priority;
    use crate::model::Task;
    use crate::model::TaskType;
    use crate::runtime::memory::InMemoryStore;

    fn task_payload(title: &str) -> ElementPayload {
        ElementPayload::Task(Task {
            title: title.to_string(),
            status: TaskStatus::Open,
            priority: Priority::Medium,
            complexity: Complexity::Medium,
            task_type: TaskType::Task,
            assignee: None,
            acceptance_criteria: None,
            closed_at: None,
        })
    }

    fn engine() -> StoneforgeEngine<InMemoryStore> {
        StoneforgeEngine::new(InMemoryStore::new(), Box::new(FixedClock::new(0)), EngineConfig::default())
    }

    #[test]
    fn adding_a_blocks_edge_auto_blocks_the_dependent_task() {
        let engine = engine();
        let blocker = engine.create_element("blocker", EntityId::new("tester"), task_payload("blocker"), Vec::new(), Metadata::new()).expect("blocker");
        let blocked = engine.create_element("blocked", EntityId::new("tester"), task_payload("blocked"), Vec::new(), Metadata::new()).expect("blocked");

        engine
            .add_dependency(Dependency {
                blocked_id: blocked.id.clone(),
                blocker_id: blocker.id.clone(),
                kind: DependencyKind::Blocks,
                metadata: DependencyMetadata::None,
                created_at: crate::model::Timestamp::from_unix_millis(0),
                created_by: EntityId::new("tester"),
            })
            .expect("add dependency");

        let refreshed = engine.get_element(&blocked.id, false).expect("get").expect("some");
        let task = refreshed.payload.as_task().expect("task");
        assert_eq!(task.status, TaskStatus::Blocked);
        assert!(engine.get_blocked_row(&blocked.id).expect("row").is_some());
    }

    #[test]
    fn closing_the_blocker_auto_unblocks_and_restores_status() {
        let engine = engine();
        let blocker = engine.create_element("blocker", EntityId::new("tester"), task_payload("blocker"), Vec::new(), Metadata::new()).expect("blocker");
        let blocked = engine.create_element("blocked", EntityId::new("tester"), task_payload("blocked"), Vec::new(), Metadata::new()).expect("blocked");
        engine
            .add_dependency(Dependency {
                blocked_id: blocked.id.clone(),
                blocker_id: blocker.id.clone(),
                kind: DependencyKind::Blocks,
                metadata: DependencyMetadata::None,
                created_at: crate::model::Timestamp::from_unix_millis(0),
                created_by: EntityId::new("tester"),
            })
            .expect("add dependency");

        engine
            .update_element(
                &blocker.id,
                ElementPatch {
                    payload: Some(PayloadPatch::Task(TaskPatch { status: Some(TaskStatus::Closed), ..Default::default() })),
                    ..Default::default()
                },
                EntityId::new("tester"),
            )
            .expect("close blocker");

        let refreshed = engine.get_element(&blocked.id, false).expect("get").expect("some");
        assert_eq!(refreshed.payload.as_task().expect("task").status, TaskStatus::Open);
        assert!(engine.get_blocked_row(&blocked.id).expect("row").is_none());
    }

    #[test]
    fn deleting_a_blocker_removes_its_edges_and_unblocks_dependents() {
        let engine = engine();
        let blocker = engine.create_element("blocker", EntityId::new("tester"), task_payload("blocker"), Vec::new(), Metadata::new()).expect("blocker");
        let blocked = engine.create_element("blocked", EntityId::new("tester"), task_payload("blocked"), Vec::new(), Metadata::new()).expect("blocked");
        engine
            .add_dependency(Dependency {
                blocked_id: blocked.id.clone(),
                blocker_id: blocker.id.clone(),
                kind: DependencyKind::Blocks,
                metadata: DependencyMetadata::None,
                created_at: crate::model::Timestamp::from_unix_millis(0),
                created_by: EntityId::new("tester"),
            })
            .expect("add dependency");

        engine.delete_element(&blocker.id, EntityId::new("tester")).expect("delete");

        assert!(engine.get_dependencies(&blocked.id, None).expect("deps").is_empty());
        assert!(engine.get_blocked_row(&blocked.id).expect("row").is_none());
    }
}
