// crates/stoneforge-core/tests/engine_lifecycle.rs
// ============================================================================
// Module: Engine Lifecycle Integration Tests
// Description: Cross-module scenarios exercising `StoneforgeEngine` over the
// in-memory store end to end.
// Purpose: Verify spec.md §4's cascades compose correctly, not just in
// isolation per runtime module.
// ============================================================================

//! Integration tests for `StoneforgeEngine`'s composed operations.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

use stoneforge_core::EngineConfig;
use stoneforge_core::InMemoryStore;
use stoneforge_core::StoneforgeEngine;
use stoneforge_core::model::Complexity;
use stoneforge_core::model::Dependency;
use stoneforge_core::model::DependencyKind;
use stoneforge_core::model::DependencyMetadata;
use stoneforge_core::model::ElementPayload;
use stoneforge_core::model::EntityId;
use stoneforge_core::model::FixedClock;
use stoneforge_core::model::Priority;
use stoneforge_core::model::Task;
use stoneforge_core::model::TaskStatus;
use stoneforge_core::model::TaskType;
use stoneforge_core::model::Timestamp;
use stoneforge_core::runtime::ReadyFilter;

fn engine() -> StoneforgeEngine<InMemoryStore> {
    StoneforgeEngine::new(InMemoryStore::new(), Box::new(FixedClock::new(0)), EngineConfig::default())
}

fn task(title: &str, priority: Priority) -> ElementPayload {
    ElementPayload::Task(Task {
        title: title.to_string(),
        status: TaskStatus::Open,
        priority,
        complexity: Complexity::Medium,
        task_type: TaskType::Task,
        assignee: None,
        acceptance_criteria: None,
        closed_at: None,
    })
}

fn blocks(blocked: &stoneforge_core::model::ElementId, blocker: &stoneforge_core::model::ElementId) -> Dependency {
    Dependency {
        blocked_id: blocked.clone(),
        blocker_id: blocker.clone(),
        kind: DependencyKind::Blocks,
        metadata: DependencyMetadata::None,
        created_at: Timestamp::from_unix_millis(0),
        created_by: EntityId::new("tester"),
    }
}

#[test]
fn a_three_task_chain_surfaces_only_the_root_as_ready_and_propagates_urgency() {
    let engine = engine();
    let actor = EntityId::new("tester");

    let root = engine.create_element("root", actor.clone(), task("root", Priority::Low), Vec::new(), Default::default()).expect("root");
    let middle = engine.create_element("middle", actor.clone(), task("middle", Priority::Low), Vec::new(), Default::default()).expect("middle");
    let leaf = engine.create_element("leaf", actor.clone(), task("leaf", Priority::Critical), Vec::new(), Default::default()).expect("leaf");

    // leaf blocks middle, middle blocks root: root can't start until middle
    // closes, middle can't start until leaf closes.
    engine.add_dependency(blocks(&middle.id, &leaf.id)).expect("middle blocked by leaf");
    engine.add_dependency(blocks(&root.id, &middle.id)).expect("root blocked by middle");

    let ready = engine.ready(&ReadyFilter::default()).expect("ready");
    let ready_ids: Vec<_> = ready.iter().map(|p| p.element.id.as_str().to_string()).collect();
    assert_eq!(ready_ids, vec![leaf.id.as_str().to_string()]);

    // leaf's own priority is Critical, but root's urgency propagates
    // backwards through the chain since closing leaf is on the path to
    // closing root.
    let leaf_priority = engine.effective_priority(&leaf.id).expect("priority");
    assert_eq!(leaf_priority.effective_priority, Priority::Critical);

    let middle_priority = engine.effective_priority(&middle.id).expect("priority");
    assert_eq!(middle_priority.base_priority, Priority::Low);
    assert_eq!(middle_priority.effective_priority, Priority::Low);

    // Close the leaf: middle should auto-unblock and become ready, root
    // remains blocked behind middle.
    engine
        .update_element(
            &leaf.id,
            stoneforge_core::runtime::registry::ElementPatch {
                payload: Some(stoneforge_core::runtime::registry::PayloadPatch::Task(
                    stoneforge_core::runtime::registry::TaskPatch { status: Some(TaskStatus::Closed), ..Default::default() },
                )),
                ..Default::default()
            },
            actor.clone(),
        )
        .expect("close leaf");

    let ready = engine.ready(&ReadyFilter::default()).expect("ready after close");
    let ready_ids: Vec<_> = ready.iter().map(|p| p.element.id.as_str().to_string()).collect();
    assert_eq!(ready_ids, vec![middle.id.as_str().to_string()]);
    assert!(engine.get_blocked_row(&root.id).expect("row").is_some());
}

#[test]
fn an_approval_gate_blocks_until_enough_required_approvers_sign_off() {
    let engine = engine();
    let actor = EntityId::new("tester");

    let blocker = engine.create_element("change", actor.clone(), task("change", Priority::Medium), Vec::new(), Default::default()).expect("blocker");
    let blocked = engine.create_element("rollout", actor.clone(), task("rollout", Priority::Medium), Vec::new(), Default::default()).expect("blocked");

    let alice = EntityId::new("alice");
    let bob = EntityId::new("bob");
    let required = std::collections::BTreeSet::from([alice.clone(), bob.clone()]);

    let gate = stoneforge_core::model::AwaitsMetadata::Approval(stoneforge_core::model::ApprovalGate {
        required_approvers: required,
        approval_count: Some(1),
        current_approvers: std::collections::BTreeSet::new(),
    });

    engine
        .add_dependency(Dependency {
            blocked_id: blocked.id.clone(),
            blocker_id: blocker.id.clone(),
            kind: DependencyKind::Awaits,
            metadata: DependencyMetadata::Awaits(gate),
            created_at: Timestamp::from_unix_millis(0),
            created_by: actor.clone(),
        })
        .expect("add awaits edge");

    assert!(engine.get_blocked_row(&blocked.id).expect("row").is_some());

    engine.record_approval(&blocked.id, &blocker.id, alice).expect("alice approves");

    assert!(engine.get_blocked_row(&blocked.id).expect("row").is_none());
}

#[test]
fn deleting_a_task_cascades_dependency_removal_and_unblocks_dependents() {
    let engine = engine();
    let actor = EntityId::new("tester");

    let blocker = engine.create_element("blocker", actor.clone(), task("blocker", Priority::Medium), Vec::new(), Default::default()).expect("blocker");
    let blocked = engine.create_element("blocked", actor.clone(), task("blocked", Priority::Medium), Vec::new(), Default::default()).expect("blocked");

    engine.add_dependency(blocks(&blocked.id, &blocker.id)).expect("add dependency");
    assert!(engine.get_blocked_row(&blocked.id).expect("row").is_some());

    engine.delete_element(&blocker.id, actor).expect("delete blocker");

    assert!(engine.get_dependencies(&blocked.id, None).expect("deps").is_empty());
    assert!(engine.get_blocked_row(&blocked.id).expect("row").is_none());
}
