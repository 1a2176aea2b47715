// crates/stoneforge-core/src/runtime/query.rs
// ============================================================================
// Module: Query Layer
// Description: Read-only composite queries over elements, the blocked
// cache, and the dependency graph.
// Purpose: Implement spec.md §4.7: ready(), blocked(), search(), stats(),
// getDependencyTree().
// Dependencies: crate::{error, interfaces, model}, crate::runtime::{graph, priority}
// ============================================================================

//! ## Overview
//! [`QueryLayer`] never mutates; it composes [`PriorityEngine`] and
//! [`DependencyGraph`] reads with the store's element, blocked-cache, and
//! stats accessors to answer the four read-side operations spec.md §4.7
//! names, plus a general task filter used to back them.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::error::CoreResult;
use crate::interfaces::ElementFilter;
use crate::interfaces::OrderBy;
use crate::interfaces::StoreStats;
use crate::interfaces::Transaction;
use crate::model::BlockedCacheRow;
use crate::model::Element;
use crate::model::ElementId;
use crate::model::ElementKind;
use crate::model::EntityId;
use crate::model::Priority;
use crate::model::TaskStatus;
use crate::runtime::graph::DependencyGraph;
use crate::runtime::graph::DependencyTree;
use crate::runtime::priority::PrioritizedElement;
use crate::runtime::priority::PriorityConfig;
use crate::runtime::priority::PriorityEngine;

/// Page size used when paging through tasks to build a filtered result set.
const SCAN_PAGE_SIZE: usize = 200;

// ============================================================================
// SECTION: Filters
// ============================================================================

/// Filter for [`QueryLayer::ready`] (spec.md §4.7 `ready()`).
#[derive(Debug, Clone, Default)]
pub struct ReadyFilter {
    /// Restrict to tasks assigned to this entity.
    pub assignee: Option<EntityId>,
    /// Require every listed tag to be present.
    pub tags: Vec<String>,
    /// Maximum rows to return after sorting.
    pub limit: usize,
    /// Rows to skip before collecting `limit`.
    pub offset: usize,
}

/// General-purpose task filter used by [`QueryLayer::tasks`].
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    /// Restrict to a single task status.
    pub status: Option<TaskStatus>,
    /// Restrict to tasks assigned to this entity.
    pub assignee: Option<EntityId>,
    /// Restrict to a single priority level.
    pub priority: Option<Priority>,
    /// Require every listed tag to be present.
    pub tags: Vec<String>,
    /// Maximum rows to return.
    pub limit: usize,
    /// Rows to skip before collecting `limit`.
    pub offset: usize,
}

impl TaskFilter {
    /// Returns true iff `element` matches every set field of this filter.
    /// Assumes `element` is already known to be a task.
    fn matches(&self, element: &Element) -> bool {
        let Some(task) = element.payload.as_task() else {
            return false;
        };
        if self.status.is_some_and(|status| status != task.status) {
            return false;
        }
        if let Some(assignee) = &self.assignee {
            if task.assignee.as_ref() != Some(assignee) {
                return false;
            }
        }
        if self.priority.is_some_and(|priority| priority != task.priority) {
            return false;
        }
        true
    }
}

// ============================================================================
// SECTION: Query Layer
// ============================================================================

/// Read-only composite queries (spec.md §4.7).
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryLayer;

impl QueryLayer {
    /// Creates a query layer.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Returns active (open/in-progress), unblocked tasks matching `filter`,
    /// sorted most urgent effective priority first (spec.md §4.6, §4.7
    /// `ready()`).
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::CoreError::Storage`] on backend failure.
    pub fn ready(
        &self,
        tx: &mut impl Transaction,
        filter: &ReadyFilter,
        priority_config: PriorityConfig,
    ) -> CoreResult<Vec<PrioritizedElement>> {
        let task_filter = TaskFilter {
            status: None,
            assignee: filter.assignee.clone(),
            priority: None,
            tags: filter.tags.clone(),
            limit: usize::MAX,
            offset: 0,
        };
        let mut candidates = Vec::new();
        for element in self.scan_tasks(tx, &task_filter.tags)? {
            if !task_filter.matches(&element) {
                continue;
            }
            let Some(task) = element.payload.as_task() else { continue };
            if !task.status.is_active() {
                continue;
            }
            if tx.get_blocked_row(&element.id)?.is_some() {
                continue;
            }
            candidates.push(element);
        }

        let priority_engine = PriorityEngine::new();
        let mut enhanced = priority_engine.enhance_tasks_with_effective_priority(tx, candidates, priority_config)?;
        priority_engine.sort_by_effective_priority(&mut enhanced);

        Ok(enhanced.into_iter().skip(filter.offset).take(page_limit(filter.limit)).collect())
    }

    /// Returns tasks matching `filter`, in `created_at` order.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::CoreError::Storage`] on backend failure.
    pub fn tasks(&self, tx: &mut impl Transaction, filter: &TaskFilter) -> CoreResult<Vec<Element>> {
        let matches: Vec<Element> =
            self.scan_tasks(tx, &filter.tags)?.into_iter().filter(|element| filter.matches(element)).collect();
        Ok(matches.into_iter().skip(filter.offset).take(page_limit(filter.limit)).collect())
    }

    /// Returns every currently-blocked-cache row, paginated.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::CoreError::Storage`] on backend failure.
    pub fn blocked(&self, tx: &mut impl Transaction, limit: usize, offset: usize) -> CoreResult<Vec<BlockedCacheRow>> {
        let rows = tx.list_blocked_rows()?;
        Ok(rows.into_iter().skip(offset).take(page_limit(limit)).collect())
    }

    /// Full-text / substring search over title and document content.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::CoreError::Storage`] on backend failure.
    pub fn search(&self, tx: &mut impl Transaction, query: &str, kind: Option<ElementKind>) -> CoreResult<Vec<Element>> {
        tx.search_elements(query, kind)
    }

    /// Returns aggregate counters.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::CoreError::Storage`] on backend failure.
    pub fn stats(&self, tx: &mut impl Transaction) -> CoreResult<StoreStats> {
        tx.stats()
    }

    /// Returns the flattened reachability tree rooted at `root`, delegating
    /// to [`DependencyGraph::get_dependency_tree`].
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::CoreError::Storage`] on backend failure.
    pub fn get_dependency_tree(&self, tx: &mut impl Transaction, root: &ElementId, max_depth: u32) -> CoreResult<DependencyTree> {
        DependencyGraph::new().get_dependency_tree(tx, root, max_depth)
    }

    /// Pages through every non-tombstoned task, optionally restricted to
    /// elements carrying every tag in `tags`.
    fn scan_tasks(&self, tx: &mut impl Transaction, tags: &[String]) -> CoreResult<Vec<Element>> {
        let mut tasks = Vec::new();
        let mut offset = 0usize;
        loop {
            let filter = ElementFilter {
                kind: Some(ElementKind::Task),
                include_deleted: false,
                tags: tags.to_vec(),
                order_by: OrderBy::CreatedAtAsc,
                limit: SCAN_PAGE_SIZE,
                offset,
            };
            let page = tx.list_elements(&filter)?;
            let page_len = page.len();
            tasks.extend(page);
            if page_len < SCAN_PAGE_SIZE {
                break;
            }
            offset += SCAN_PAGE_SIZE;
        }
        Ok(tasks)
    }
}

/// Clamps a caller-supplied page limit of zero up to "unlimited" so an
/// un-set `Default::default()` filter (`limit: 0`) does not silently return
/// nothing.
fn page_limit(limit: usize) -> usize {
    if limit == 0 { usize::MAX } else { limit }
}
