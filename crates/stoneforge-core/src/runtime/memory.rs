// crates/stoneforge-core/src/runtime/memory.rs
// ============================================================================
// Module: In-Memory Store
// Description: A `Store` implementation backed by a mutex-guarded snapshot,
// for unit and property tests.
// Purpose: Exercise the runtime engines without a SQLite dependency.
// Dependencies: crate::{error, interfaces, model}
// ============================================================================

//! ## Overview
//! [`InMemoryStore`] snapshots its state into each [`InMemoryTransaction`] at
//! `begin()` and only writes it back on `commit()`, giving callers the same
//! read-your-writes-until-commit semantics a real embedded store provides.
//! It is not safe for concurrent writers (a real backend enforces the
//! single-writer lane at the connection layer; this one is single-threaded
//! test scaffolding only).

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::error::CoreError;
use crate::error::CoreResult;
use crate::interfaces::ElementFilter;
use crate::interfaces::OrderBy;
use crate::interfaces::Store;
use crate::interfaces::StoreStats;
use crate::interfaces::Transaction;
use crate::model::BlockedCacheRow;
use crate::model::Dependency;
use crate::model::DependencyKind;
use crate::model::Element;
use crate::model::ElementId;
use crate::model::ElementKind;
use crate::model::Event;

// ============================================================================
// SECTION: In-Memory Data
// ============================================================================

#[derive(Debug, Clone, Default)]
struct InMemoryData {
    elements: BTreeMap<ElementId, Element>,
    dependencies: Vec<Dependency>,
    events: Vec<Event>,
    blocked: BTreeMap<ElementId, BlockedCacheRow>,
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// An in-process, mutex-guarded [`Store`] for tests.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    data: Mutex<InMemoryData>,
}

impl InMemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for InMemoryStore {
    type Tx<'a> = InMemoryTransaction<'a>;

    fn begin(&self) -> CoreResult<Self::Tx<'_>> {
        let guard = self
            .data
            .lock()
            .map_err(|_| CoreError::Storage("in-memory store mutex poisoned".to_string()))?;
        let working = guard.clone();
        Ok(InMemoryTransaction { store: self, working })
    }
}

// ============================================================================
// SECTION: Transaction
// ============================================================================

/// A snapshot-isolated transaction over an [`InMemoryStore`].
#[derive(Debug)]
pub struct InMemoryTransaction<'a> {
    store: &'a InMemoryStore,
    working: InMemoryData,
}

impl Transaction for InMemoryTransaction<'_> {
    fn insert_element(&mut self, element: &Element) -> CoreResult<()> {
        if self.working.elements.contains_key(&element.id) {
            return Err(CoreError::AlreadyExists(element.id.to_string()));
        }
        self.working.elements.insert(element.id.clone(), element.clone());
        Ok(())
    }

    fn get_element(&mut self, id: &ElementId) -> CoreResult<Option<Element>> {
        Ok(self.working.elements.get(id).cloned())
    }

    fn replace_element(&mut self, element: &Element) -> CoreResult<()> {
        if !self.working.elements.contains_key(&element.id) {
            return Err(CoreError::NotFound(element.id.clone()));
        }
        self.working.elements.insert(element.id.clone(), element.clone());
        Ok(())
    }

    fn list_elements(&mut self, filter: &ElementFilter) -> CoreResult<Vec<Element>> {
        let mut rows: Vec<Element> = self
            .working
            .elements
            .values()
            .filter(|element| filter.include_deleted || !element.is_deleted())
            .filter(|element| filter.kind.is_none_or(|kind| element.kind() == kind))
            .filter(|element| filter.tags.iter().all(|tag| element.tags.contains(tag)))
            .cloned()
            .collect();
        match filter.order_by {
            OrderBy::CreatedAtAsc => rows.sort_by_key(|element| element.created_at),
            OrderBy::CreatedAtDesc => rows.sort_by_key(|element| std::cmp::Reverse(element.created_at)),
            OrderBy::UpdatedAtAsc => rows.sort_by_key(|element| element.updated_at),
            OrderBy::UpdatedAtDesc => rows.sort_by_key(|element| std::cmp::Reverse(element.updated_at)),
        }
        Ok(rows.into_iter().skip(filter.offset).take(filter.limit).collect())
    }

    fn search_elements(&mut self, query: &str, kind: Option<ElementKind>) -> CoreResult<Vec<Element>> {
        let needle = query.to_lowercase();
        let rows = self
            .working
            .elements
            .values()
            .filter(|element| !element.is_deleted())
            .filter(|element| kind.is_none_or(|k| element.kind() == k))
            .filter(|element| element_matches_query(element, &needle))
            .cloned()
            .collect();
        Ok(rows)
    }

    fn stats(&mut self) -> CoreResult<StoreStats> {
        let mut stats = StoreStats::default();
        for kind in ElementKind::all() {
            let count = self
                .working
                .elements
                .values()
                .filter(|element| !element.is_deleted() && element.kind() == kind)
                .count();
            stats.elements_by_type.push((kind, count as u64));
        }
        for element in self.working.elements.values() {
            if element.is_deleted() {
                continue;
            }
            if let Some(task) = element.payload.as_task() {
                bump(&mut stats.tasks_by_status, task.status);
                bump(&mut stats.tasks_by_priority, task.priority);
            }
        }
        stats.dependency_count = self.working.dependencies.len() as u64;
        stats.blocked_count = self.working.blocked.len() as u64;
        Ok(stats)
    }

    fn insert_dependency(&mut self, dependency: &Dependency) -> CoreResult<()> {
        let exists = self.working.dependencies.iter().any(|existing| {
            existing.blocked_id == dependency.blocked_id
                && existing.blocker_id == dependency.blocker_id
                && existing.kind == dependency.kind
        });
        if exists {
            return Err(CoreError::AlreadyExists(format!(
                "{} -{:?}-> {}",
                dependency.blocked_id, dependency.kind, dependency.blocker_id
            )));
        }
        self.working.dependencies.push(dependency.clone());
        Ok(())
    }

    fn remove_dependency(
        &mut self,
        blocked_id: &ElementId,
        blocker_id: &ElementId,
        kind: DependencyKind,
    ) -> CoreResult<bool> {
        let before = self.working.dependencies.len();
        self.working
            .dependencies
            .retain(|dep| !(&dep.blocked_id == blocked_id && &dep.blocker_id == blocker_id && dep.kind == kind));
        Ok(self.working.dependencies.len() != before)
    }

    fn update_dependency(&mut self, dependency: &Dependency) -> CoreResult<()> {
        let slot = self.working.dependencies.iter_mut().find(|existing| {
            existing.blocked_id == dependency.blocked_id
                && existing.blocker_id == dependency.blocker_id
                && existing.kind == dependency.kind
        });
        match slot {
            Some(slot) => {
                *slot = dependency.clone();
                Ok(())
            }
            None => Err(CoreError::NotFound(dependency.blocked_id.clone())),
        }
    }

    fn get_dependencies(&mut self, id: &ElementId, kinds: Option<&[DependencyKind]>) -> CoreResult<Vec<Dependency>> {
        Ok(self
            .working
            .dependencies
            .iter()
            .filter(|dep| &dep.blocked_id == id)
            .filter(|dep| kinds.is_none_or(|kinds| kinds.contains(&dep.kind)))
            .cloned()
            .collect())
    }

    fn get_dependents(&mut self, id: &ElementId, kinds: Option<&[DependencyKind]>) -> CoreResult<Vec<Dependency>> {
        Ok(self
            .working
            .dependencies
            .iter()
            .filter(|dep| &dep.blocker_id == id)
            .filter(|dep| kinds.is_none_or(|kinds| kinds.contains(&dep.kind)))
            .cloned()
            .collect())
    }

    fn remove_dependencies_touching(&mut self, id: &ElementId) -> CoreResult<Vec<Dependency>> {
        let (removed, kept): (Vec<_>, Vec<_>) = self
            .working
            .dependencies
            .drain(..)
            .partition(|dep| &dep.blocked_id == id || &dep.blocker_id == id);
        self.working.dependencies = kept;
        Ok(removed)
    }

    fn append_event(&mut self, event: &Event) -> CoreResult<()> {
        self.working.events.push(event.clone());
        Ok(())
    }

    fn list_events_for_element(&mut self, id: &ElementId) -> CoreResult<Vec<Event>> {
        Ok(self.working.events.iter().filter(|event| &event.element_id == id).cloned().collect())
    }

    fn list_events(&mut self, limit: usize, offset: usize) -> CoreResult<Vec<Event>> {
        Ok(self.working.events.iter().skip(offset).take(limit).cloned().collect())
    }

    fn upsert_blocked_row(&mut self, row: &BlockedCacheRow) -> CoreResult<()> {
        self.working.blocked.insert(row.element_id.clone(), row.clone());
        Ok(())
    }

    fn delete_blocked_row(&mut self, id: &ElementId) -> CoreResult<()> {
        self.working.blocked.remove(id);
        Ok(())
    }

    fn get_blocked_row(&mut self, id: &ElementId) -> CoreResult<Option<BlockedCacheRow>> {
        Ok(self.working.blocked.get(id).cloned())
    }

    fn list_blocked_rows(&mut self) -> CoreResult<Vec<BlockedCacheRow>> {
        Ok(self.working.blocked.values().cloned().collect())
    }

    fn list_blocked_by(&mut self, blocker_id: &ElementId) -> CoreResult<Vec<BlockedCacheRow>> {
        Ok(self.working.blocked.values().filter(|row| &row.blocked_by == blocker_id).cloned().collect())
    }

    fn clear_blocked_rows(&mut self) -> CoreResult<()> {
        self.working.blocked.clear();
        Ok(())
    }

    fn commit(self) -> CoreResult<()> {
        let mut guard = self
            .store
            .data
            .lock()
            .map_err(|_| CoreError::Storage("in-memory store mutex poisoned".to_string()))?;
        *guard = self.working;
        Ok(())
    }

    fn rollback(self) -> CoreResult<()> {
        Ok(())
    }
}

fn element_matches_query(element: &Element, needle: &str) -> bool {
    use crate::model::ElementPayload;
    match &element.payload {
        ElementPayload::Task(task) => task.title.to_lowercase().contains(needle),
        ElementPayload::Plan(plan) => plan.title.to_lowercase().contains(needle),
        ElementPayload::Document(document) => {
            document.title.as_deref().is_some_and(|title| title.to_lowercase().contains(needle))
                || String::from_utf8_lossy(&document.content).to_lowercase().contains(needle)
        }
        ElementPayload::Channel(_) | ElementPayload::Message(_) | ElementPayload::Entity(_) => false,
    }
}

fn bump<K: PartialEq>(rows: &mut Vec<(K, u64)>, key: K) {
    match rows.iter_mut().find(|(existing, _)| *existing == key) {
        Some((_, count)) => *count += 1,
        None => rows.push((key, 1)),
    }
}
