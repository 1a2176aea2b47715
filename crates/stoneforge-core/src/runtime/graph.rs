// crates/stoneforge-core/src/runtime/graph.rs
// ============================================================================
// Module: Dependency Graph
// Description: Typed-edge insertion, removal, cycle detection, and tree
// queries over the `blocks`/`parent-child`/`awaits`/`relates-to` relations.
// Purpose: Implement spec.md §4.3 over the `Store` abstraction.
// Dependencies: crate::{error, interfaces, model}
// ============================================================================

//! ## Overview
//! [`DependencyGraph`] is a stateless wrapper around the dependency-edge
//! operations of a [`Transaction`]: existence checks, self-dependency and
//! duplicate rejection (enforced by the store / [`Dependency::validate_shape`]),
//! cycle detection for the two acyclic-checked kinds, and the dependency-tree
//! query. It holds no store handle itself; callers pass a transaction into
//! every method.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::collections::VecDeque;

use crate::error::CoreError;
use crate::error::CoreResult;
use crate::interfaces::Transaction;
use crate::model::Dependency;
use crate::model::DependencyKind;
use crate::model::Element;
use crate::model::ElementId;

// ============================================================================
// SECTION: Dependency Tree
// ============================================================================

/// A flattened reachable subgraph rooted at one element (spec.md §4.3
/// `GetDependencyTree`). Flattened rather than nested, since consumers
/// typically want the node and edge sets rather than a recursive structure.
#[derive(Debug, Clone, PartialEq)]
pub struct DependencyTree {
    /// The root element the tree was queried from.
    pub root: ElementId,
    /// Every element reachable within the depth bound, duplicate-eliminated,
    /// including the root itself.
    pub nodes: Vec<Element>,
    /// Every `blocks`/`parent-child` edge encountered during the traversal.
    pub edges: Vec<(ElementId, ElementId, DependencyKind)>,
}

// ============================================================================
// SECTION: Dependency Graph
// ============================================================================

/// Dependency kinds considered by tree traversal and cycle detection
/// (spec.md §4.3, §4.4).
const TRAVERSABLE_KINDS: [DependencyKind; 2] = [DependencyKind::Blocks, DependencyKind::ParentChild];

/// Stateless dependency-graph operations over a [`Transaction`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DependencyGraph;

impl DependencyGraph {
    /// Creates a dependency graph handle.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Adds a dependency edge (spec.md §4.3 `AddDependency`).
    ///
    /// Validates edge shape, checks that both endpoints exist (unless `kind`
    /// is `relates-to` and `allow_forward_reference` is set), and runs cycle
    /// detection for `blocks`/`parent-child` edges.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ConstraintViolation`] for a self-dependency or a
    /// cycle, [`CoreError::NotFound`] for a missing endpoint,
    /// [`CoreError::Validation`] for malformed gate metadata, or
    /// [`CoreError::AlreadyExists`] if the edge is already present.
    pub fn add_dependency(
        &self,
        tx: &mut impl Transaction,
        dependency: Dependency,
    ) -> CoreResult<Dependency> {
        self.add_dependency_with_options(tx, dependency, false)
    }

    /// As [`Self::add_dependency`], but allows a `relates-to` edge to name an
    /// endpoint that does not yet exist when `allow_forward_reference` is set
    /// (spec.md §4.3).
    ///
    /// # Errors
    ///
    /// See [`Self::add_dependency`].
    pub fn add_dependency_with_options(
        &self,
        tx: &mut impl Transaction,
        dependency: Dependency,
        allow_forward_reference: bool,
    ) -> CoreResult<Dependency> {
        dependency.validate_shape()?;

        let skip_existence_check =
            dependency.kind == DependencyKind::RelatesTo && allow_forward_reference;
        if !skip_existence_check {
            if tx.get_element(&dependency.blocked_id)?.is_none() {
                return Err(CoreError::NotFound(dependency.blocked_id.clone()));
            }
            if tx.get_element(&dependency.blocker_id)?.is_none() {
                return Err(CoreError::NotFound(dependency.blocker_id.clone()));
            }
        }

        if dependency.kind.is_acyclic_checked() && self.would_create_cycle(tx, &dependency)? {
            return Err(CoreError::ConstraintViolation(format!(
                "adding {} -{:?}-> {} would create a cycle",
                dependency.blocked_id, dependency.kind, dependency.blocker_id
            )));
        }

        tx.insert_dependency(&dependency)?;
        Ok(dependency)
    }

    /// Removes a dependency edge (spec.md §4.3 `RemoveDependency`).
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Storage`] on backend failure.
    pub fn remove_dependency(
        &self,
        tx: &mut impl Transaction,
        blocked_id: &ElementId,
        blocker_id: &ElementId,
        kind: DependencyKind,
    ) -> CoreResult<bool> {
        tx.remove_dependency(blocked_id, blocker_id, kind)
    }

    /// Returns edges where `id = blocked_id` (spec.md §4.3 `GetDependencies`).
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Storage`] on backend failure.
    pub fn get_dependencies(
        &self,
        tx: &mut impl Transaction,
        id: &ElementId,
        kinds: Option<&[DependencyKind]>,
    ) -> CoreResult<Vec<Dependency>> {
        tx.get_dependencies(id, kinds)
    }

    /// Returns edges where `id = blocker_id` (spec.md §4.3 `GetDependents`).
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Storage`] on backend failure.
    pub fn get_dependents(
        &self,
        tx: &mut impl Transaction,
        id: &ElementId,
        kinds: Option<&[DependencyKind]>,
    ) -> CoreResult<Vec<Dependency>> {
        tx.get_dependents(id, kinds)
    }

    /// Returns the `blocks` + `parent-child` subgraph reachable from `root`,
    /// bounded by `max_depth` (spec.md §4.3 `GetDependencyTree`).
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] if `root` does not exist, or
    /// [`CoreError::Storage`] on backend failure.
    pub fn get_dependency_tree(
        &self,
        tx: &mut impl Transaction,
        root: &ElementId,
        max_depth: u32,
    ) -> CoreResult<DependencyTree> {
        let root_element =
            tx.get_element(root)?.ok_or_else(|| CoreError::NotFound(root.clone()))?;

        let mut visited: BTreeSet<ElementId> = BTreeSet::from([root.clone()]);
        let mut nodes = vec![root_element];
        let mut edges = Vec::new();
        let mut queue: VecDeque<(ElementId, u32)> = VecDeque::from([(root.clone(), 0)]);

        while let Some((current, depth)) = queue.pop_front() {
            if depth >= max_depth {
                continue;
            }
            let outgoing = tx.get_dependencies(&current, Some(&TRAVERSABLE_KINDS))?;
            for edge in outgoing {
                edges.push((edge.blocked_id.clone(), edge.blocker_id.clone(), edge.kind));
                if visited.insert(edge.blocker_id.clone()) {
                    if let Some(element) = tx.get_element(&edge.blocker_id)? {
                        nodes.push(element);
                    }
                    queue.push_back((edge.blocker_id, depth + 1));
                }
            }
        }

        Ok(DependencyTree { root: root.clone(), nodes, edges })
    }

    /// Returns true iff adding `dependency` would close a cycle in its kind's
    /// subgraph: a BFS from `blocker_id` over the same-kind "depends on"
    /// edges that reaches `blocked_id` means `blocker_id` already
    /// (transitively) depends on `blocked_id`, so the new edge would close a
    /// loop (spec.md §4.3 "cycle check").
    fn would_create_cycle(
        &self,
        tx: &mut impl Transaction,
        dependency: &Dependency,
    ) -> CoreResult<bool> {
        let kinds = [dependency.kind];
        let mut visited: BTreeSet<ElementId> = BTreeSet::from([dependency.blocker_id.clone()]);
        let mut queue: VecDeque<ElementId> = VecDeque::from([dependency.blocker_id.clone()]);

        while let Some(current) = queue.pop_front() {
            if current == dependency.blocked_id {
                return Ok(true);
            }
            for edge in tx.get_dependencies(&current, Some(&kinds))? {
                if visited.insert(edge.blocker_id.clone()) {
                    queue.push_back(edge.blocker_id);
                }
            }
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interfaces::Store;
    use crate::model::Complexity;
    use crate::model::DependencyMetadata;
    use crate::model::ElementPayload;
    use crate::model::EntityId;
    use crate::model::Priority;
    use crate::model::Task;
    use crate::model::TaskStatus;
    use crate::model::TaskType;
    use crate::model::Timestamp;
    use crate::runtime::memory::InMemoryStore;

    fn task_element(id: &str) -> Element {
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
                priority: Priority::Medium,
                complexity: Complexity::Medium,
                task_type: TaskType::Task,
                assignee: None,
                acceptance_criteria: None,
                closed_at: None,
            }),
        }
    }

    fn edge(blocked: &str, blocker: &str, kind: DependencyKind) -> Dependency {
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
    fn rejects_cycle_in_blocks_subgraph() {
        let store = InMemoryStore::new();
        let mut tx = store.begin().expect("begin");
        tx.insert_element(&task_element("el-aaa")).expect("insert a");
        tx.insert_element(&task_element("el-bbb")).expect("insert b");
        tx.insert_element(&task_element("el-ccc")).expect("insert c");

        let graph = DependencyGraph::new();
        graph.add_dependency(&mut tx, edge("el-aaa", "el-bbb", DependencyKind::Blocks)).expect("a->b");
        graph.add_dependency(&mut tx, edge("el-bbb", "el-ccc", DependencyKind::Blocks)).expect("b->c");

        let result = graph.add_dependency(&mut tx, edge("el-ccc", "el-aaa", DependencyKind::Blocks));
        assert!(matches!(result, Err(CoreError::ConstraintViolation(_))));
    }

    #[test]
    fn rejects_self_dependency() {
        let store = InMemoryStore::new();
        let mut tx = store.begin().expect("begin");
        tx.insert_element(&task_element("el-aaa")).expect("insert a");

        let graph = DependencyGraph::new();
        let result = graph.add_dependency(&mut tx, edge("el-aaa", "el-aaa", DependencyKind::Blocks));
        assert!(result.is_err());
    }

    #[test]
    fn dependency_tree_collects_reachable_nodes() {
        let store = InMemoryStore::new();
        let mut tx = store.begin().expect("begin");
        tx.insert_element(&task_element("el-aaa")).expect("insert a");
        tx.insert_element(&task_element("el-bbb")).expect("insert b");
        tx.insert_element(&task_element("el-ccc")).expect("insert c");

        let graph = DependencyGraph::new();
        graph.add_dependency(&mut tx, edge("el-aaa", "el-bbb", DependencyKind::Blocks)).expect("a->b");
        graph.add_dependency(&mut tx, edge("el-bbb", "el-ccc", DependencyKind::Blocks)).expect("b->c");

        let tree = graph
            .get_dependency_tree(&mut tx, &ElementId::from_raw("el-aaa"), 10)
            .expect("tree");
        assert_eq!(tree.nodes.len(), 3);
        assert_eq!(tree.edges.len(), 2);
    }

    #[test]
    fn dependency_tree_respects_max_depth() {
        let store = InMemoryStore::new();
        let mut tx = store.begin().expect("begin");
        tx.insert_element(&task_element("el-aaa")).expect("insert a");
        tx.insert_element(&task_element("el-bbb")).expect("insert b");
        tx.insert_element(&task_element("el-ccc")).expect("insert c");

        let graph = DependencyGraph::new();
        graph.add_dependency(&mut tx, edge("el-aaa", "el-bbb", DependencyKind::Blocks)).expect("a->b");
        graph.add_dependency(&mut tx, edge("el-bbb", "el-ccc", DependencyKind::Blocks)).expect("b->c");

        let tree = graph
            .get_dependency_tree(&mut tx, &ElementId::from_raw("el-aaa"), 1)
            .expect("tree");
        assert_eq!(tree.nodes.len(), 2);
    }
}
