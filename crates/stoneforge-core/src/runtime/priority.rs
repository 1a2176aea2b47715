// crates/stoneforge-core/src/runtime/priority.rs
// ============================================================================
// Module: Priority Engine
// Description: Effective-priority propagation across `blocks` edges.
// Purpose: Implement spec.md §4.6: a task inherits the urgency of whatever
// it transitively blocks.
// Dependencies: crate::{error, interfaces, model}
// ============================================================================

//! ## Overview
//! A task's *effective* priority is the most urgent priority among itself
//! and everything that directly or transitively depends on it clearing via
//! a `blocks` edge: `eff(t, depth) = min(base(t), min over d in
//! dependents_blocks(t) of eff(d, depth + 1))`, bounded by `max_depth`
//! (spec.md §4.6). Urgency is numerically smaller-is-more-urgent
//! ([`Priority::more_urgent`]).

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use crate::error::CoreResult;
use crate::interfaces::Transaction;
use crate::model::DependencyKind;
use crate::model::Element;
use crate::model::ElementId;
use crate::model::Priority;

// ============================================================================
// SECTION: Config
// ============================================================================

/// Configuration for effective-priority propagation (spec.md §6
/// `priority.maxDepth`, `priority.includeComplexity`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriorityConfig {
    /// Maximum recursion depth; propagation stops beyond this many hops.
    pub max_depth: u32,
    /// Whether [`PriorityEngine::aggregate_complexity`] is computed
    /// alongside effective priority. Off by default: it is a heuristic
    /// ordering aid with no invariants riding on it (spec.md §4.6).
    pub include_complexity: bool,
}

impl Default for PriorityConfig {
    fn default() -> Self {
        Self { max_depth: 10, include_complexity: false }
    }
}

// ============================================================================
// SECTION: Result
// ============================================================================

/// The outcome of computing one element's effective priority.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectivePriorityResult {
    /// The element's own declared priority.
    pub base_priority: Priority,
    /// The propagated (possibly more urgent) priority.
    pub effective_priority: Priority,
    /// True iff a dependent raised the urgency above `base_priority`.
    pub is_influenced: bool,
    /// Immediate `blocks` dependents whose propagated urgency matches
    /// `effective_priority`, i.e. the proximate cause of the elevation.
    pub dependent_influencers: Vec<ElementId>,
    /// Sum of this element's own complexity plus every transitive `blocks`
    /// blocker's complexity, present only when
    /// [`PriorityConfig::include_complexity`] is set (spec.md §4.6
    /// "Aggregate complexity"). Heuristic only; no invariant depends on it.
    pub aggregate_complexity: Option<u64>,
}

/// An element paired with its computed effective priority.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrioritizedElement {
    /// The underlying element.
    pub element: Element,
    /// Its effective priority computation.
    pub effective: EffectivePriorityResult,
}

// ============================================================================
// SECTION: Priority Engine
// ============================================================================

/// Effective-priority propagation over the `blocks` subgraph (spec.md §4.6).
#[derive(Debug, Clone, Copy, Default)]
pub struct PriorityEngine;

impl PriorityEngine {
    /// Creates a priority engine.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Computes `id`'s effective priority and its immediate influencers.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::CoreError::Storage`] on backend failure.
    pub fn effective_priority(
        &self,
        tx: &mut impl Transaction,
        id: &ElementId,
        config: PriorityConfig,
    ) -> CoreResult<EffectivePriorityResult> {
        let base = self.base_priority(tx, id)?;
        let mut visited = BTreeSet::from([id.clone()]);
        let effective = self.eff(tx, id, 0, config.max_depth, &mut visited)?;
        let influencers = self.immediate_influencers(tx, id, effective, config.max_depth)?;
        let aggregate_complexity =
            config.include_complexity.then(|| self.aggregate_complexity(tx, id, config)).transpose()?;
        Ok(EffectivePriorityResult {
            base_priority: base,
            effective_priority: effective,
            is_influenced: effective < base,
            dependent_influencers: influencers,
            aggregate_complexity,
        })
    }

    /// Sums `id`'s own complexity plus that of every transitive `blocks`
    /// blocker up to `max_depth`, treating absent or non-task elements as
    /// contributing 0 (spec.md §4.6 "Aggregate complexity").
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::CoreError::Storage`] on backend failure.
    pub fn aggregate_complexity(
        &self,
        tx: &mut impl Transaction,
        id: &ElementId,
        config: PriorityConfig,
    ) -> CoreResult<u64> {
        let mut visited = BTreeSet::from([id.clone()]);
        self.complexity_sum(tx, id, 0, config.max_depth, &mut visited)
    }

    /// Returns `id`'s own complexity, or 0 if missing, tombstoned, or not a
    /// task.
    fn complexity_of(&self, tx: &mut impl Transaction, id: &ElementId) -> CoreResult<u64> {
        let Some(element) = tx.get_element(id)? else {
            return Ok(0);
        };
        if element.is_deleted() {
            return Ok(0);
        }
        Ok(element.payload.as_task().map_or(0, |task| task.complexity as u64))
    }

    /// Recursively sums `id`'s own complexity plus its transitive `blocks`
    /// blockers', stopping at `max_depth` and guarding against cycles with
    /// `visited`.
    fn complexity_sum(
        &self,
        tx: &mut impl Transaction,
        id: &ElementId,
        depth: u32,
        max_depth: u32,
        visited: &mut BTreeSet<ElementId>,
    ) -> CoreResult<u64> {
        let own = self.complexity_of(tx, id)?;
        if depth >= max_depth {
            return Ok(own);
        }
        let mut total = own;
        for edge in tx.get_dependencies(id, Some(&[DependencyKind::Blocks]))? {
            if visited.insert(edge.blocker_id.clone()) {
                total += self.complexity_sum(tx, &edge.blocker_id, depth + 1, max_depth, visited)?;
            }
        }
        Ok(total)
    }

    /// Computes effective priorities for every id in `ids`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::CoreError::Storage`] on backend failure.
    pub fn calculate_effective_priorities(
        &self,
        tx: &mut impl Transaction,
        ids: &[ElementId],
        config: PriorityConfig,
    ) -> CoreResult<Vec<EffectivePriorityResult>> {
        ids.iter().map(|id| self.effective_priority(tx, id, config)).collect()
    }

    /// Pairs each element with its effective-priority computation.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::CoreError::Storage`] on backend failure.
    pub fn enhance_tasks_with_effective_priority(
        &self,
        tx: &mut impl Transaction,
        tasks: Vec<Element>,
        config: PriorityConfig,
    ) -> CoreResult<Vec<PrioritizedElement>> {
        tasks
            .into_iter()
            .map(|element| {
                let effective = self.effective_priority(tx, &element.id, config)?;
                Ok(PrioritizedElement { element, effective })
            })
            .collect()
    }

    /// Sorts `elements` most urgent first, breaking ties by base priority
    /// then by `created_at` (spec.md §4.6
    /// "sortByEffectivePriority(tasks) orders by (effectivePriority,
    /// basePriority, createdAt) ascending"), then by element id as a final
    /// deterministic tiebreaker for elements created in the same instant.
    pub fn sort_by_effective_priority(&self, elements: &mut [PrioritizedElement]) {
        elements.sort_by(|a, b| {
            a.effective
                .effective_priority
                .cmp(&b.effective.effective_priority)
                .then_with(|| a.effective.base_priority.cmp(&b.effective.base_priority))
                .then_with(|| a.element.created_at.cmp(&b.element.created_at))
                .then_with(|| a.element.id.as_str().cmp(b.element.id.as_str()))
        });
    }

    /// Returns `id`'s own declared priority, defaulting to
    /// [`Priority::Medium`] when the element is missing, tombstoned, or not
    /// a task (spec.md §4.6 "missing elements default to medium").
    fn base_priority(&self, tx: &mut impl Transaction, id: &ElementId) -> CoreResult<Priority> {
        let Some(element) = tx.get_element(id)? else {
            return Ok(Priority::default());
        };
        if element.is_deleted() {
            return Ok(Priority::default());
        }
        Ok(element.payload.as_task().map_or(Priority::default(), |task| task.priority))
    }

    /// Recursively computes `eff(id, depth)`, stopping at `max_depth` and
    /// guarding against cycles defensively via `visited` (insertion-time
    /// cycle checks already forbid `blocks` cycles; this bound keeps the
    /// engine correct even over a corrupted or externally-loaded graph).
    fn eff(
        &self,
        tx: &mut impl Transaction,
        id: &ElementId,
        depth: u32,
        max_depth: u32,
        visited: &mut BTreeSet<ElementId>,
    ) -> CoreResult<Priority> {
        let base = self.base_priority(tx, id)?;
        if depth >= max_depth {
            return Ok(base);
        }
        let mut best = base;
        for edge in tx.get_dependents(id, Some(&[DependencyKind::Blocks]))? {
            if !visited.insert(edge.blocked_id.clone()) {
                continue;
            }
            let child = self.eff(tx, &edge.blocked_id, depth + 1, max_depth, visited)?;
            best = best.more_urgent(child);
        }
        Ok(best)
    }

    /// Returns the immediate `blocks` dependents of `id` whose own
    /// effective priority equals `effective`, i.e. the direct cause of any
    /// elevation above `id`'s base priority.
    fn immediate_influencers(
        &self,
        tx: &mut impl Transaction,
        id: &ElementId,
        effective: Priority,
        max_depth: u32,
    ) -> CoreResult<Vec<ElementId>> {
        if max_depth == 0 {
            return Ok(Vec::new());
        }
        let mut influencers = Vec::new();
        for edge in tx.get_dependents(id, Some(&[DependencyKind::Blocks]))? {
            let mut visited = BTreeSet::from([id.clone(), edge.blocked_id.clone()]);
            let child = self.eff(tx, &edge.blocked_id, 1, max_depth, &mut visited)?;
            if child == effective {
                influencers.push(edge.blocked_id);
            }
        }
        Ok(influencers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interfaces::Store;
    use crate::model::Complexity;
    use crate::model::Dependency;
    use crate::model::DependencyMetadata;
    use crate::model::ElementPayload;
    use crate::model::EntityId;
    use crate::model::Task;
    use crate::model::TaskStatus;
    use crate::model::TaskType;
    use crate::model::Timestamp;
    use crate::runtime::memory::InMemoryStore;

    fn task(id: &str, priority: Priority) -> Element {
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
                status: TaskStatus::Open,
                priority,
                complexity: Complexity::Medium,
                task_type: TaskType::Task,
                assignee: None,
                acceptance_criteria: None,
                closed_at: None,
            }),
        }
    }

    fn blocks(blocked: &str, blocker: &str) -> Dependency {
        Dependency {
            blocked_id: ElementId::from_raw(blocked),
            blocker_id: ElementId::from_raw(blocker),
            kind: DependencyKind::Blocks,
            metadata: DependencyMetadata::None,
            created_at: Timestamp::from_unix_millis(0),
            created_by: EntityId::new("tester"),
        }
    }

    #[test]
    fn low_priority_task_inherits_urgency_of_what_it_blocks() {
        let store = InMemoryStore::new();
        let mut tx = store.begin().expect("begin");
        tx.insert_element(&task("el-low", Priority::Low)).expect("low");
        tx.insert_element(&task("el-critical", Priority::Critical)).expect("critical");
        tx.insert_dependency(&blocks("el-critical", "el-low")).expect("edge");

        let engine = PriorityEngine::new();
        let result = engine
            .effective_priority(&mut tx, &ElementId::from_raw("el-low"), PriorityConfig::default())
            .expect("effective");

        assert_eq!(result.base_priority, Priority::Low);
        assert_eq!(result.effective_priority, Priority::Critical);
        assert!(result.is_influenced);
        assert_eq!(result.dependent_influencers, vec![ElementId::from_raw("el-critical")]);
    }

    #[test]
    fn propagation_stops_at_max_depth() {
        let store = InMemoryStore::new();
        let mut tx = store.begin().expect("begin");
        tx.insert_element(&task("el-a", Priority::Low)).expect("a");
        tx.insert_element(&task("el-b", Priority::Critical)).expect("b");
        tx.insert_dependency(&blocks("el-b", "el-a")).expect("edge");

        let engine = PriorityEngine::new();
        let result = engine
            .effective_priority(&mut tx, &ElementId::from_raw("el-a"), PriorityConfig { max_depth: 0, include_complexity: false })
            .expect("effective");

        assert_eq!(result.effective_priority, Priority::Low);
        assert!(!result.is_influenced);
    }

    #[test]
    fn sort_orders_most_urgent_effective_priority_first() {
        let store = InMemoryStore::new();
        let mut tx = store.begin().expect("begin");
        tx.insert_element(&task("el-low", Priority::Low)).expect("low");
        tx.insert_element(&task("el-critical", Priority::Critical)).expect("critical");
        tx.insert_dependency(&blocks("el-critical", "el-low")).expect("edge");

        let engine = PriorityEngine::new();
        let tasks = vec![
            tx.get_element(&ElementId::from_raw("el-critical")).expect("get").expect("some"),
            tx.get_element(&ElementId::from_raw("el-low")).expect("get").expect("some"),
        ];
        let mut enhanced = engine.enhance_tasks_with_effective_priority(&mut tx, tasks, PriorityConfig::default()).expect("enhance");
        engine.sort_by_effective_priority(&mut enhanced);

        assert_eq!(enhanced[0].element.id, ElementId::from_raw("el-critical"));
        assert_eq!(enhanced[1].element.id, ElementId::from_raw("el-low"));
    }

    fn task_with_complexity(id: &str, complexity: Complexity) -> Element {
        let mut element = task(id, Priority::Medium);
        element.payload.as_task_mut().expect("task").complexity = complexity;
        element
    }

    #[test]
    fn aggregate_complexity_sums_self_and_transitive_blockers() {
        let store = InMemoryStore::new();
        let mut tx = store.begin().expect("begin");
        tx.insert_element(&task_with_complexity("el-leaf", Complexity::VeryComplex)).expect("leaf");
        tx.insert_element(&task_with_complexity("el-mid", Complexity::Complex)).expect("mid");
        tx.insert_element(&task_with_complexity("el-top", Complexity::Trivial)).expect("top");
        tx.insert_dependency(&blocks("el-mid", "el-leaf")).expect("mid blocked by leaf");
        tx.insert_dependency(&blocks("el-top", "el-mid")).expect("top blocked by mid");

        let engine = PriorityEngine::new();
        let total = engine
            .aggregate_complexity(&mut tx, &ElementId::from_raw("el-top"), PriorityConfig::default())
            .expect("aggregate");

        assert_eq!(total, Complexity::Trivial as u64 + Complexity::Complex as u64 + Complexity::VeryComplex as u64);
    }

    #[test]
    fn effective_priority_includes_aggregate_complexity_only_when_configured() {
        let store = InMemoryStore::new();
        let mut tx = store.begin().expect("begin");
        tx.insert_element(&task_with_complexity("el-solo", Complexity::Simple)).expect("solo");

        let engine = PriorityEngine::new();
        let config = PriorityConfig { max_depth: 10, include_complexity: false };
        let without = engine.effective_priority(&mut tx, &ElementId::from_raw("el-solo"), config).expect("effective");
        assert_eq!(without.aggregate_complexity, None);

        let config = PriorityConfig { max_depth: 10, include_complexity: true };
        let with = engine.effective_priority(&mut tx, &ElementId::from_raw("el-solo"), config).expect("effective");
        assert_eq!(with.aggregate_complexity, Some(Complexity::Simple as u64));
    }
}
