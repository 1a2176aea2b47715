// crates/stoneforge-core/src/interfaces/mod.rs
// ============================================================================
// Module: Stoneforge Store Interfaces
// Description: Backend-agnostic transactional store contract and the
// status-transition notification callback.
// Purpose: Let the runtime engine operate over any embedded store backend.
// Dependencies: crate::{error, model}
// ============================================================================

//! ## Overview
//! [`Store`] is the single seam between the runtime engine and persistence.
//! A backend provides [`Transaction`] implementations that give the engine
//! atomic, typed access to elements, dependencies, events, and the blocked
//! cache (spec.md §4.1, §6 "Persisted state layout"). All mutating engine
//! operations open one transaction, perform every write it triggers
//! (including cascading cache invalidation), and commit atomically
//! (spec.md §5 "Ordering guarantees").

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::error::CoreResult;
use crate::model::BlockedCacheRow;
use crate::model::Dependency;
use crate::model::DependencyKind;
use crate::model::Element;
use crate::model::ElementId;
use crate::model::ElementKind;
use crate::model::Event;
use crate::model::TaskStatus;

// ============================================================================
// SECTION: Element Filter
// ============================================================================

/// Ordering for `List`-style queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderBy {
    /// Ascending by `created_at`.
    CreatedAtAsc,
    /// Descending by `created_at`.
    CreatedAtDesc,
    /// Ascending by `updated_at`.
    UpdatedAtAsc,
    /// Descending by `updated_at`.
    UpdatedAtDesc,
}

/// Filter + pagination for [`Transaction::list_elements`] (spec.md §4.2
/// "List/filter").
#[derive(Debug, Clone)]
pub struct ElementFilter {
    /// Restrict to a single element kind.
    pub kind: Option<ElementKind>,
    /// Include soft-deleted (tombstoned) elements.
    pub include_deleted: bool,
    /// Require every listed tag to be present.
    pub tags: Vec<String>,
    /// Result ordering.
    pub order_by: OrderBy,
    /// Maximum rows to return.
    pub limit: usize,
    /// Rows to skip before collecting `limit`.
    pub offset: usize,
}

/// Default page size for list operations (spec.md §6 `page.defaultLimit`).
pub const DEFAULT_PAGE_LIMIT: usize = 50;

impl Default for ElementFilter {
    fn default() -> Self {
        Self {
            kind: None,
            include_deleted: false,
            tags: Vec::new(),
            order_by: OrderBy::CreatedAtAsc,
            limit: DEFAULT_PAGE_LIMIT,
            offset: 0,
        }
    }
}

// ============================================================================
// SECTION: Stats
// ============================================================================

/// Aggregate counters returned by `stats()` (spec.md §4.7).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Element count per kind.
    pub elements_by_type: Vec<(ElementKind, u64)>,
    /// Task count per status.
    pub tasks_by_status: Vec<(TaskStatus, u64)>,
    /// Task count per priority.
    pub tasks_by_priority: Vec<(crate::model::Priority, u64)>,
    /// Total dependency edge count.
    pub dependency_count: u64,
    /// Total blocked-cache row count.
    pub blocked_count: u64,
}

// ============================================================================
// SECTION: Transaction
// ============================================================================

/// A single atomic unit of work over the store (spec.md §4.1).
///
/// All methods observe the transaction's own uncommitted writes
/// (read-your-writes) so that, e.g., a registry create followed by an event
/// append within the same transaction is consistent.
pub trait Transaction {
    // -- elements --------------------------------------------------------
    /// Inserts a brand-new element row.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::CoreError::AlreadyExists`] on id collision,
    /// or [`crate::error::CoreError::Storage`] on backend failure.
    fn insert_element(&mut self, element: &Element) -> CoreResult<()>;

    /// Fetches an element by id, tombstoned or not.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::CoreError::Storage`] on backend failure.
    fn get_element(&mut self, id: &ElementId) -> CoreResult<Option<Element>>;

    /// Replaces an element's full row (payload, tags, metadata, timestamps,
    /// soft-delete marker).
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::CoreError::NotFound`] if the id is absent, or
    /// [`crate::error::CoreError::Storage`] on backend failure.
    fn replace_element(&mut self, element: &Element) -> CoreResult<()>;

    /// Lists elements matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::CoreError::Storage`] on backend failure.
    fn list_elements(&mut self, filter: &ElementFilter) -> CoreResult<Vec<Element>>;

    /// Full-text / substring search over title and document content.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::CoreError::Storage`] on backend failure.
    fn search_elements(&mut self, query: &str, kind: Option<ElementKind>) -> CoreResult<Vec<Element>>;

    /// Returns aggregate counters (spec.md §4.7 `stats()`).
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::CoreError::Storage`] on backend failure.
    fn stats(&mut self) -> CoreResult<StoreStats>;

    // -- dependencies ------------------------------------------------------
    /// Inserts a dependency edge.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::CoreError::AlreadyExists`] if the
    /// `(blocked, blocker, kind)` triple already exists.
    fn insert_dependency(&mut self, dependency: &Dependency) -> CoreResult<()>;

    /// Removes a dependency edge, returning true iff a row was removed.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::CoreError::Storage`] on backend failure.
    fn remove_dependency(
        &mut self,
        blocked_id: &ElementId,
        blocker_id: &ElementId,
        kind: DependencyKind,
    ) -> CoreResult<bool>;

    /// Overwrites the metadata of an existing `awaits` edge (gate mutation).
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::CoreError::NotFound`] if the edge is absent.
    fn update_dependency(&mut self, dependency: &Dependency) -> CoreResult<()>;

    /// Returns edges where `id = blocked_id`, optionally restricted to
    /// `kinds`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::CoreError::Storage`] on backend failure.
    fn get_dependencies(&mut self, id: &ElementId, kinds: Option<&[DependencyKind]>) -> CoreResult<Vec<Dependency>>;

    /// Returns edges where `id = blocker_id`, optionally restricted to
    /// `kinds`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::CoreError::Storage`] on backend failure.
    fn get_dependents(&mut self, id: &ElementId, kinds: Option<&[DependencyKind]>) -> CoreResult<Vec<Dependency>>;

    /// Removes every dependency edge mentioning `id` as either endpoint,
    /// returning the removed rows (used for cascading delete).
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::CoreError::Storage`] on backend failure.
    fn remove_dependencies_touching(&mut self, id: &ElementId) -> CoreResult<Vec<Dependency>>;

    // -- events --------------------------------------------------------
    /// Appends an immutable event row.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::CoreError::Storage`] on backend failure.
    fn append_event(&mut self, event: &Event) -> CoreResult<()>;

    /// Lists events for a single element, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::CoreError::Storage`] on backend failure.
    fn list_events_for_element(&mut self, id: &ElementId) -> CoreResult<Vec<Event>>;

    /// Lists events globally, oldest first, paginated.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::CoreError::Storage`] on backend failure.
    fn list_events(&mut self, limit: usize, offset: usize) -> CoreResult<Vec<Event>>;

    // -- blocked cache --------------------------------------------------
    /// Inserts or overwrites the blocked-cache row for `row.element_id`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::CoreError::Storage`] on backend failure.
    fn upsert_blocked_row(&mut self, row: &BlockedCacheRow) -> CoreResult<()>;

    /// Removes the blocked-cache row for `id`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::CoreError::Storage`] on backend failure.
    fn delete_blocked_row(&mut self, id: &ElementId) -> CoreResult<()>;

    /// Fetches the blocked-cache row for `id`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::CoreError::Storage`] on backend failure.
    fn get_blocked_row(&mut self, id: &ElementId) -> CoreResult<Option<BlockedCacheRow>>;

    /// Lists every blocked-cache row.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::CoreError::Storage`] on backend failure.
    fn list_blocked_rows(&mut self) -> CoreResult<Vec<BlockedCacheRow>>;

    /// Lists blocked-cache rows whose `blocked_by` equals `blocker_id`
    /// (used to find dependents to re-evaluate on status change).
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::CoreError::Storage`] on backend failure.
    fn list_blocked_by(&mut self, blocker_id: &ElementId) -> CoreResult<Vec<BlockedCacheRow>>;

    /// Removes every blocked-cache row (used by `rebuild()`).
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::CoreError::Storage`] on backend failure.
    fn clear_blocked_rows(&mut self) -> CoreResult<()>;

    // -- transaction control ---------------------------------------------
    /// Commits the transaction, making all writes visible atomically.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::CoreError::Storage`] on backend failure.
    fn commit(self) -> CoreResult<()>;

    /// Rolls back the transaction, discarding all writes.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::CoreError::Storage`] on backend failure.
    fn rollback(self) -> CoreResult<()>;
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// An embedded transactional store backend (spec.md §4.1).
///
/// Readers may proceed in parallel; writers serialize on a single lane
/// (spec.md §5). A backend is free to implement that serialization however
/// it likes (a mutex, a writer thread) as long as `begin` blocks until a
/// write lease is available for mutating transactions.
pub trait Store: Send + Sync {
    /// The transaction type this backend hands out.
    type Tx<'a>: Transaction
    where
        Self: 'a;

    /// Opens a new transaction.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::CoreError::Storage`] if the backend cannot
    /// open a transaction (e.g. connection failure).
    fn begin(&self) -> CoreResult<Self::Tx<'_>>;
}

// ============================================================================
// SECTION: Status Transition Callback
// ============================================================================

/// Notification interface the blocked cache uses to drive automatic task
/// status transitions (spec.md §4.4, §6 "Notifications").
///
/// Implementations run inside the same transaction as the cache mutation
/// and must not perform arbitrary work (no I/O, no blocking) — they exist
/// to let the registry apply the status change the cache has already
/// decided on.
pub trait StatusTransitionCallback {
    /// A task has just been automatically blocked; the registry should set
    /// its status to `blocked`.
    fn on_block(&mut self, element_id: &ElementId, previous_status: TaskStatus);

    /// A previously auto-blocked task has just unblocked; the registry
    /// should restore `status_to_restore`.
    fn on_unblock(&mut self, element_id: &ElementId, status_to_restore: TaskStatus);
}

/// A [`StatusTransitionCallback`] that records calls without side effects,
/// for composing with a registry that applies them afterward.
#[derive(Debug, Default)]
pub struct RecordingStatusCallback {
    /// Recorded `on_block` invocations.
    pub blocked: Vec<(ElementId, TaskStatus)>,
    /// Recorded `on_unblock` invocations.
    pub unblocked: Vec<(ElementId, TaskStatus)>,
}

impl StatusTransitionCallback for RecordingStatusCallback {
    fn on_block(&mut self, element_id: &ElementId, previous_status: TaskStatus) {
        self.blocked.push((element_id.clone(), previous_status));
    }

    fn on_unblock(&mut self, element_id: &ElementId, status_to_restore: TaskStatus) {
        self.unblocked.push((element_id.clone(), status_to_restore));
    }
}
