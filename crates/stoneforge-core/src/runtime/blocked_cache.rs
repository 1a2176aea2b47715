// crates/stoneforge-core/src/runtime/blocked_cache.rs
// ============================================================================
// Module: Blocked Cache
// Description: Materialized "is X blocked, by whom, why" view with
// incremental invalidation and full rebuild.
// Purpose: Implement spec.md §4.4, the architectural heart of the core.
// Dependencies: crate::{error, interfaces, model}, crate::runtime::gate
// ============================================================================

//! ## Overview
//! [`BlockedCache`] computes and maintains one [`BlockedCacheRow`] per
//! currently-blocked element. [`Self::evaluate`] is the single source of
//! truth for "is this element blocked"; every invalidation entry point
//! ([`Self::on_dependency_added`], [`Self::on_dependency_removed`],
//! [`Self::on_status_changed`], [`Self::on_element_deleted`]) and
//! [`Self::rebuild`] funnel through [`Self::reevaluate_one`], which is the
//! only place a [`crate::interfaces::StatusTransitionCallback`] is invoked.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::collections::VecDeque;
use std::time::Instant;

use crate::error::CoreResult;
use crate::interfaces::StatusTransitionCallback;
use crate::interfaces::Transaction;
use crate::model::BlockReason;
use crate::model::BlockedCacheRow;
use crate::model::ClockSource;
use crate::model::DependencyKind;
use crate::model::Element;
use crate::model::ElementId;
use crate::model::TaskStatus;
use crate::runtime::gate::GateEngine;

/// Dependency kinds whose edges can cause blocking, excluding `relates-to`
/// (spec.md §4.4 invalidation triggers).
const BLOCKING_KINDS: [DependencyKind; 3] =
    [DependencyKind::Blocks, DependencyKind::ParentChild, DependencyKind::Awaits];

// ============================================================================
// SECTION: Rebuild Report
// ============================================================================

/// Summary of a [`BlockedCache::rebuild`] pass (spec.md §4.4 `rebuild()`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RebuildReport {
    /// Number of elements evaluated.
    pub elements_checked: u64,
    /// Number of elements found blocked.
    pub elements_blocked: u64,
    /// Wall-clock duration of the rebuild, in milliseconds.
    pub duration_ms: u64,
}

// ============================================================================
// SECTION: Blocked Cache
// ============================================================================

/// Maximum page size used when paging through every element during
/// [`BlockedCache::rebuild`].
const REBUILD_PAGE_SIZE: usize = 500;

/// The blocked-cache engine (spec.md §4.4).
#[derive(Debug, Clone, Copy)]
pub struct BlockedCache {
    /// Whether automatic task status transitions are driven on block/unblock
    /// (spec.md §6 `cache.autoTransitionStatus`, default true).
    pub auto_transition_status: bool,
}

impl Default for BlockedCache {
    fn default() -> Self {
        Self { auto_transition_status: true }
    }
}

impl BlockedCache {
    /// Creates a blocked cache with the given auto-transition setting.
    #[must_use]
    pub const fn new(auto_transition_status: bool) -> Self {
        Self { auto_transition_status }
    }

    /// Computes the current blocking state of `id` without reading or
    /// writing its cache row (spec.md §4.4 `compute_blocking_state`).
    ///
    /// Scans dependencies in [`DependencyKind::SCAN_ORDER`]: `blocks`, then
    /// `parent-child`, then `awaits`. Returns the first blocking edge found.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::CoreError::Storage`] on backend failure.
    pub fn evaluate(
        &self,
        tx: &mut impl Transaction,
        id: &ElementId,
        clock: &dyn ClockSource,
    ) -> CoreResult<Option<(BlockReason, ElementId)>> {
        for kind in DependencyKind::SCAN_ORDER {
            let edges = tx.get_dependencies(id, Some(&[kind]))?;
            for edge in edges {
                let blocking = match kind {
                    DependencyKind::Blocks => self.blocks_edge_blocks(tx, &edge.blocker_id)?,
                    DependencyKind::ParentChild => self.parent_child_edge_blocks(tx, &edge.blocker_id)?,
                    DependencyKind::Awaits => None,
                    DependencyKind::RelatesTo => None,
                };
                if kind == DependencyKind::Awaits {
                    if let Some(reason) = self.awaits_edge_reason(&edge, clock) {
                        return Ok(Some((reason, edge.blocker_id)));
                    }
                    continue;
                }
                if blocking == Some(true) {
                    let reason = match kind {
                        DependencyKind::Blocks => BlockReason::blocked_by(&edge.blocker_id),
                        DependencyKind::ParentChild => BlockReason::blocked_by_parent(&edge.blocker_id),
                        DependencyKind::Awaits | DependencyKind::RelatesTo => unreachable!(),
                    };
                    return Ok(Some((reason, edge.blocker_id)));
                }
            }
        }
        Ok(None)
    }

    /// Returns true iff a `blocks` edge to `blocker_id` currently blocks
    /// (spec.md §4.4: blocker present, not tombstoned, and — if a task — not
    /// in a completion status).
    fn blocks_edge_blocks(&self, tx: &mut impl Transaction, blocker_id: &ElementId) -> CoreResult<Option<bool>> {
        let Some(blocker) = tx.get_element(blocker_id)? else {
            return Ok(Some(false));
        };
        if blocker.is_deleted() {
            return Ok(Some(false));
        }
        let blocks = match blocker.payload.as_task() {
            Some(task) => !task.status.is_completion_status(),
            None => true,
        };
        Ok(Some(blocks))
    }

    /// Returns true iff a `parent-child` edge to `parent_id` currently
    /// blocks: the parent is itself blocked (transitive, read from its
    /// cache row), or the parent is a task (not a plan) and not completed
    /// (spec.md §4.4).
    fn parent_child_edge_blocks(&self, tx: &mut impl Transaction, parent_id: &ElementId) -> CoreResult<Option<bool>> {
        if tx.get_blocked_row(parent_id)?.is_some() {
            return Ok(Some(true));
        }
        let Some(parent) = tx.get_element(parent_id)? else {
            return Ok(Some(false));
        };
        if parent.is_deleted() {
            return Ok(Some(false));
        }
        let blocks = parent.payload.as_task().is_some_and(|task| !task.status.is_completion_status());
        Ok(Some(blocks))
    }

    /// Returns the blocking reason for an `awaits` edge, or `None` if the
    /// gate is satisfied. Malformed metadata degrades conservatively to
    /// "blocked by invalid gate" (spec.md §4.4 "Failure semantics").
    fn awaits_edge_reason(&self, edge: &crate::model::Dependency, clock: &dyn ClockSource) -> Option<BlockReason> {
        let Some(gate) = edge.metadata.as_awaits() else {
            return Some(BlockReason::invalid_gate_metadata(&edge.blocker_id));
        };
        if GateEngine::new().is_satisfied(gate, clock) {
            None
        } else {
            Some(BlockReason::blocked_by_gate(&edge.blocker_id))
        }
    }

    /// Re-evaluates a single element's cache row, driving the status
    /// callback on block/unblock transitions, and returns true iff the
    /// element ended up blocked.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::CoreError::Storage`] on backend failure.
    pub fn reevaluate_one(
        &self,
        tx: &mut impl Transaction,
        id: &ElementId,
        clock: &dyn ClockSource,
        callback: &mut impl StatusTransitionCallback,
    ) -> CoreResult<bool> {
        let Some(element) = tx.get_element(id)? else {
            tx.delete_blocked_row(id)?;
            return Ok(false);
        };
        if element.is_deleted() {
            tx.delete_blocked_row(id)?;
            return Ok(false);
        }

        let old_row = tx.get_blocked_row(id)?;
        let new_state = self.evaluate(tx, id, clock)?;

        match (old_row, new_state) {
            (None, Some((reason, blocked_by))) => {
                let previous_status = self.previous_status_for_block(&element);
                if let Some(status) = previous_status {
                    callback.on_block(id, status);
                }
                tx.upsert_blocked_row(&BlockedCacheRow {
                    element_id: id.clone(),
                    blocked_by,
                    reason,
                    previous_status,
                })?;
                Ok(true)
            }
            (Some(previous_row), None) => {
                if let Some(status) = previous_row.previous_status {
                    callback.on_unblock(id, status);
                }
                tx.delete_blocked_row(id)?;
                Ok(false)
            }
            (Some(previous_row), Some((reason, blocked_by))) => {
                tx.upsert_blocked_row(&BlockedCacheRow {
                    element_id: id.clone(),
                    blocked_by,
                    reason,
                    previous_status: previous_row.previous_status,
                })?;
                Ok(true)
            }
            (None, None) => Ok(false),
        }
    }

    /// Returns the task status to save as `previous_status` when `element`
    /// newly becomes blocked, or `None` when auto-transition does not apply
    /// (not a task, transitions disabled, or already in an exempt status).
    fn previous_status_for_block(&self, element: &Element) -> Option<TaskStatus> {
        if !self.auto_transition_status {
            return None;
        }
        let task = element.payload.as_task()?;
        (!task.status.exempt_from_auto_block()).then_some(task.status)
    }

    /// Re-evaluates `blocked` after a dependency was added, recursing into
    /// its parent-child descendants (spec.md §4.4 `onDependencyAdded`).
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::CoreError::Storage`] on backend failure.
    pub fn on_dependency_added(
        &self,
        tx: &mut impl Transaction,
        blocked: &ElementId,
        kind: DependencyKind,
        clock: &dyn ClockSource,
        callback: &mut impl StatusTransitionCallback,
    ) -> CoreResult<()> {
        self.reevaluate_one(tx, blocked, clock, callback)?;
        if kind == DependencyKind::ParentChild {
            self.reevaluate_descendants(tx, blocked, clock, callback)?;
        }
        Ok(())
    }

    /// Re-evaluates `blocked` after a dependency was removed, recursing into
    /// its parent-child descendants (spec.md §4.4 `onDependencyRemoved`).
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::CoreError::Storage`] on backend failure.
    pub fn on_dependency_removed(
        &self,
        tx: &mut impl Transaction,
        blocked: &ElementId,
        kind: DependencyKind,
        clock: &dyn ClockSource,
        callback: &mut impl StatusTransitionCallback,
    ) -> CoreResult<()> {
        self.reevaluate_one(tx, blocked, clock, callback)?;
        if kind == DependencyKind::ParentChild {
            self.reevaluate_descendants(tx, blocked, clock, callback)?;
        }
        Ok(())
    }

    /// Re-evaluates every element depending on `id` after its status
    /// crossed (or did not cross) the completion boundary, recursing into
    /// parent-child descendants (spec.md §4.4 `onStatusChanged`).
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::CoreError::Storage`] on backend failure.
    pub fn on_status_changed(
        &self,
        tx: &mut impl Transaction,
        id: &ElementId,
        old: TaskStatus,
        new: TaskStatus,
        clock: &dyn ClockSource,
        callback: &mut impl StatusTransitionCallback,
    ) -> CoreResult<()> {
        if old.is_completion_status() == new.is_completion_status() {
            return Ok(());
        }
        self.cascade_to_dependents(tx, id, clock, callback)
    }

    /// Removes `id`'s own cache row and re-evaluates its dependents, since
    /// deletion always crosses into a terminal state for their purposes
    /// (spec.md §4.4 `onElementDeleted`).
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::CoreError::Storage`] on backend failure.
    pub fn on_element_deleted(
        &self,
        tx: &mut impl Transaction,
        id: &ElementId,
        clock: &dyn ClockSource,
        callback: &mut impl StatusTransitionCallback,
    ) -> CoreResult<()> {
        tx.delete_blocked_row(id)?;
        self.cascade_to_dependents(tx, id, clock, callback)
    }

    /// Re-evaluates every `blocks`/`parent-child`/`awaits` dependent of
    /// `blocker_id`, recursing into parent-child descendants per dependent.
    fn cascade_to_dependents(
        &self,
        tx: &mut impl Transaction,
        blocker_id: &ElementId,
        clock: &dyn ClockSource,
        callback: &mut impl StatusTransitionCallback,
    ) -> CoreResult<()> {
        let dependents = tx.get_dependents(blocker_id, Some(&BLOCKING_KINDS))?;
        for edge in dependents {
            self.reevaluate_one(tx, &edge.blocked_id, clock, callback)?;
            if edge.kind == DependencyKind::ParentChild {
                self.reevaluate_descendants(tx, &edge.blocked_id, clock, callback)?;
            }
        }
        Ok(())
    }

    /// Iteratively re-evaluates every parent-child descendant of `id`, using
    /// a visited set to stay bounded even if a combined (non-parent-child)
    /// cycle exists in the wider dependency graph (spec.md §4.4 "Descendant
    /// recursion").
    fn reevaluate_descendants(
        &self,
        tx: &mut impl Transaction,
        id: &ElementId,
        clock: &dyn ClockSource,
        callback: &mut impl StatusTransitionCallback,
    ) -> CoreResult<()> {
        let mut visited: BTreeSet<ElementId> = BTreeSet::from([id.clone()]);
        let mut queue: VecDeque<ElementId> = VecDeque::from([id.clone()]);

        while let Some(current) = queue.pop_front() {
            let children = tx.get_dependents(&current, Some(&[DependencyKind::ParentChild]))?;
            for child_edge in children {
                if visited.insert(child_edge.blocked_id.clone()) {
                    self.reevaluate_one(tx, &child_edge.blocked_id, clock, callback)?;
                    queue.push_back(child_edge.blocked_id);
                }
            }
        }
        Ok(())
    }

    /// Clears and fully recomputes the cache, processing elements in a
    /// parent-first order over `parent-child` so a parent's blocking state
    /// is already materialized when its children are evaluated (spec.md
    /// §4.4 `rebuild()`).
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::CoreError::Storage`] on backend failure.
    pub fn rebuild(
        &self,
        tx: &mut impl Transaction,
        clock: &dyn ClockSource,
        callback: &mut impl StatusTransitionCallback,
    ) -> CoreResult<RebuildReport> {
        let started = Instant::now();
        tx.clear_blocked_rows()?;

        let ids = self.list_all_element_ids(tx)?;
        let mut visited: BTreeSet<ElementId> = BTreeSet::new();
        for id in &ids {
            self.visit_parent_first(tx, id, clock, callback, &mut visited)?;
        }

        let elements_blocked = tx.list_blocked_rows()?.len() as u64;
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        Ok(RebuildReport { elements_checked: ids.len() as u64, elements_blocked, duration_ms })
    }

    /// Visits `id`'s parent (if any, via a `parent-child` dependency) before
    /// `id` itself, so the parent's cache row exists before `id` is
    /// evaluated. This is a simplification of spec.md §4.4's full
    /// topological ordering: it does not special-case parents that fall
    /// outside the rebuild's element set, since every mutation-driven
    /// invariant in spec.md §8 holds regardless of visitation order (each
    /// element's state is computed independently via [`Self::evaluate`]).
    fn visit_parent_first(
        &self,
        tx: &mut impl Transaction,
        id: &ElementId,
        clock: &dyn ClockSource,
        callback: &mut impl StatusTransitionCallback,
        visited: &mut BTreeSet<ElementId>,
    ) -> CoreResult<()> {
        if !visited.insert(id.clone()) {
            return Ok(());
        }
        let parents = tx.get_dependencies(id, Some(&[DependencyKind::ParentChild]))?;
        for parent_edge in parents {
            self.visit_parent_first(tx, &parent_edge.blocker_id, clock, callback, visited)?;
        }
        self.reevaluate_one(tx, id, clock, callback)?;
        Ok(())
    }

    /// Pages through every element id in the store.
    fn list_all_element_ids(&self, tx: &mut impl Transaction) -> CoreResult<Vec<ElementId>> {
        let mut ids = Vec::new();
        let mut offset = 0usize;
        loop {
            let filter = crate::interfaces::ElementFilter {
                kind: None,
                include_deleted: false,
                tags: Vec::new(),
                order_by: crate::interfaces::OrderBy::CreatedAtAsc,
                limit: REBUILD_PAGE_SIZE,
                offset,
            };
            let page = tx.list_elements(&filter)?;
            let page_len = page.len();
            ids.extend(page.into_iter().map(|element| element.id));
            if page_len < REBUILD_PAGE_SIZE {
                break;
            }
            offset += REBUILD_PAGE_SIZE;
        }
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interfaces::RecordingStatusCallback;
    use crate::interfaces::Store;
    use crate::model::Complexity;
    use crate::model::Dependency;
    use crate::model::DependencyMetadata;
    use crate::model::Element;
    use crate::model::ElementPayload;
    use crate::model::EntityId;
    use crate::model::FixedClock;
    use crate::model::Plan;
    use crate::model::PlanStatus;
    use crate::model::Priority;
    use crate::model::Task;
    use crate::model::TaskType;
    use crate::model::Timestamp;
    use crate::runtime::memory::InMemoryStore;

    fn task_element(id: &str, status: TaskStatus) -> Element {
        Element {
            id: ElementId::from_raw(id),
            created_at: Timestamp::from_unix_millis(0),
            updated_at: Timestamp::from_unix_millis(0),
            created_by: EntityId::new("tester"),
            tags: Vec::new(),
            metadata: Default::default(),
            deleted_at: None,
            payload: ElementPayload::Task(Task {
                title: id.to_string(),
                status,
                priority: Priority::Medium,
                complexity: Complexity::Medium,
                task_type: TaskType::Task,
                assignee: None,
                acceptance_criteria: None,
                closed_at: None,
            }),
        }
    }

    fn plan_element(id: &str) -> Element {
        Element {
            id: ElementId::from_raw(id),
            created_at: Timestamp::from_unix_millis(0),
            updated_at: Timestamp::from_unix_millis(0),
            created_by: EntityId::new("tester"),
            tags: Vec::new(),
            metadata: Default::default(),
            deleted_at: None,
            payload: ElementPayload::Plan(Plan { title: id.to_string(), status: PlanStatus::Open }),
        }
    }

    fn blocks_edge(blocked: &str, blocker: &str, kind: DependencyKind) -> Dependency {
        Dependency {
            blocked_id: ElementId::from_raw(blocked),
            blocker_id: ElementId::from_raw(blocker),
            kind,
            metadata: DependencyMetadata::None,
            created_at: Timestamp::from_unix_millis(0),
            created_by: EntityId::new("tester"),
        }
    }

    #[test]
    fn chained_blocks_reports_nearest_incomplete_blocker() {
        let store = InMemoryStore::new();
        let mut tx = store.begin().expect("begin");
        tx.insert_element(&task_element("el-a", TaskStatus::Open)).expect("a");
        tx.insert_element(&task_element("el-b", TaskStatus::Open)).expect("b");
        tx.insert_element(&task_element("el-c", TaskStatus::Open)).expect("c");
        tx.insert_dependency(&blocks_edge("el-a", "el-b", DependencyKind::Blocks)).expect("a->b");
        tx.insert_dependency(&blocks_edge("el-b", "el-c", DependencyKind::Blocks)).expect("b->c");

        let cache = BlockedCache::default();
        let clock = FixedClock::new(0);
        let mut callback = RecordingStatusCallback::default();

        cache.on_dependency_added(&mut tx, &ElementId::from_raw("el-a"), DependencyKind::Blocks, &clock, &mut callback).expect("eval a");
        cache.on_dependency_added(&mut tx, &ElementId::from_raw("el-b"), DependencyKind::Blocks, &clock, &mut callback).expect("eval b");

        assert!(tx.get_blocked_row(&ElementId::from_raw("el-a")).expect("row").is_some());
        assert!(tx.get_blocked_row(&ElementId::from_raw("el-b")).expect("row").is_some());
        assert_eq!(callback.blocked.len(), 2);
    }

    #[test]
    fn plan_parent_never_blocks() {
        let store = InMemoryStore::new();
        let mut tx = store.begin().expect("begin");
        tx.insert_element(&plan_element("el-plan")).expect("plan");
        tx.insert_element(&task_element("el-child", TaskStatus::Open)).expect("child");
        tx.insert_dependency(&blocks_edge("el-child", "el-plan", DependencyKind::ParentChild)).expect("edge");

        let cache = BlockedCache::default();
        let clock = FixedClock::new(0);
        let mut callback = RecordingStatusCallback::default();
        cache.on_dependency_added(&mut tx, &ElementId::from_raw("el-child"), DependencyKind::ParentChild, &clock, &mut callback).expect("eval");

        assert!(tx.get_blocked_row(&ElementId::from_raw("el-child")).expect("row").is_none());
    }

    #[test]
    fn unblocking_restores_previous_status_via_callback() {
        let store = InMemoryStore::new();
        let mut tx = store.begin().expect("begin");
        tx.insert_element(&task_element("el-parent", TaskStatus::Open)).expect("parent");
        tx.insert_element(&task_element("el-child", TaskStatus::Open)).expect("child");
        tx.insert_dependency(&blocks_edge("el-child", "el-parent", DependencyKind::ParentChild)).expect("edge");

        let cache = BlockedCache::default();
        let clock = FixedClock::new(0);
        let mut callback = RecordingStatusCallback::default();
        cache.on_dependency_added(&mut tx, &ElementId::from_raw("el-child"), DependencyKind::ParentChild, &clock, &mut callback).expect("eval");
        assert_eq!(callback.blocked, vec![(ElementId::from_raw("el-child"), TaskStatus::Open)]);

        let mut parent = tx.get_element(&ElementId::from_raw("el-parent")).expect("get").expect("some");
        parent.payload.as_task_mut().expect("task").status = TaskStatus::Closed;
        tx.replace_element(&parent).expect("replace");

        cache
            .on_status_changed(&mut tx, &ElementId::from_raw("el-parent"), TaskStatus::Open, TaskStatus::Closed, &clock, &mut callback)
            .expect("status change");

        assert!(tx.get_blocked_row(&ElementId::from_raw("el-child")).expect("row").is_none());
        assert_eq!(callback.unblocked, vec![(ElementId::from_raw("el-child"), TaskStatus::Open)]);
    }

    #[test]
    fn rebuild_matches_incremental_invalidation() {
        let store = InMemoryStore::new();
        let mut tx = store.begin().expect("begin");
        tx.insert_element(&task_element("el-a", TaskStatus::Open)).expect("a");
        tx.insert_element(&task_element("el-b", TaskStatus::Open)).expect("b");
        tx.insert_element(&task_element("el-c", TaskStatus::Closed)).expect("c");
        tx.insert_dependency(&blocks_edge("el-a", "el-b", DependencyKind::Blocks)).expect("a->b");
        tx.insert_dependency(&blocks_edge("el-b", "el-c", DependencyKind::Blocks)).expect("b->c");

        let cache = BlockedCache::default();
        let clock = FixedClock::new(0);
        let mut callback = RecordingStatusCallback::default();
        cache.on_dependency_added(&mut tx, &ElementId::from_raw("el-a"), DependencyKind::Blocks, &clock, &mut callback).expect("eval a");
        cache.on_dependency_added(&mut tx, &ElementId::from_raw("el-b"), DependencyKind::Blocks, &clock, &mut callback).expect("eval b");

        let incremental: BTreeSet<ElementId> =
            tx.list_blocked_rows().expect("rows").into_iter().map(|row| row.element_id).collect();

        let mut callback2 = RecordingStatusCallback::default();
        let report = cache.rebuild(&mut tx, &clock, &mut callback2).expect("rebuild");
        let rebuilt: BTreeSet<ElementId> =
            tx.list_blocked_rows().expect("rows").into_iter().map(|row| row.element_id).collect();

        assert_eq!(incremental, rebuilt);
        assert_eq!(report.elements_blocked, 1);
        assert_eq!(report.elements_checked, 3);
    }
}
