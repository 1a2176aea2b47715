// crates/stoneforge-store-sqlite/tests/engine_over_sqlite.rs
// ============================================================================
// Module: Engine-Over-SQLite Integration Tests
// Description: Runs `StoneforgeEngine` end to end over the real SQLite
// backend instead of stubbed `Transaction` calls.
// Purpose: Catch mismatches between the in-memory reference store and the
// durable backend that per-module unit tests in `store.rs` cannot see.
// ============================================================================

//! Integration tests driving `stoneforge-core`'s engine over `SqliteStore`.

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
use stoneforge_store_sqlite::SqliteStore;
use stoneforge_store_sqlite::SqliteStoreConfig;

fn task(title: &str) -> ElementPayload {
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

#[test]
fn create_block_and_unblock_round_trips_through_a_real_sqlite_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = SqliteStoreConfig { path: dir.path().join("stoneforge.db"), ..Default::default() };
    let store = SqliteStore::open(&config).expect("open");
    let engine = StoneforgeEngine::new(store, Box::new(FixedClock::new(0)), EngineConfig::default());
    let actor = EntityId::new("tester");

    let blocker = engine.create_element("blocker", actor.clone(), task("blocker"), Vec::new(), Default::default()).expect("blocker");
    let blocked = engine.create_element("blocked", actor.clone(), task("blocked"), Vec::new(), Default::default()).expect("blocked");

    engine
        .add_dependency(Dependency {
            blocked_id: blocked.id.clone(),
            blocker_id: blocker.id.clone(),
            kind: DependencyKind::Blocks,
            metadata: DependencyMetadata::None,
            created_at: Timestamp::from_unix_millis(0),
            created_by: actor.clone(),
        })
        .expect("add dependency");

    assert!(engine.ready(&ReadyFilter::default()).expect("ready").iter().all(|p| p.element.id != blocked.id));
    assert!(engine.get_blocked_row(&blocked.id).expect("row").is_some());

    engine
        .update_element(
            &blocker.id,
            stoneforge_core::runtime::registry::ElementPatch {
                payload: Some(stoneforge_core::runtime::registry::PayloadPatch::Task(
                    stoneforge_core::runtime::registry::TaskPatch { status: Some(TaskStatus::Closed), ..Default::default() },
                )),
                ..Default::default()
            },
            actor,
        )
        .expect("close blocker");

    assert!(engine.get_blocked_row(&blocked.id).expect("row").is_none());
    let ready = engine.ready(&ReadyFilter::default()).expect("ready after close");
    assert!(ready.iter().any(|p| p.element.id == blocked.id));
}

#[test]
fn reopening_the_same_database_file_preserves_elements_and_blocked_state() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = SqliteStoreConfig { path: dir.path().join("stoneforge.db"), ..Default::default() };
    let actor = EntityId::new("tester");

    let blocked_id = {
        let store = SqliteStore::open(&config).expect("open");
        let engine = StoneforgeEngine::new(store, Box::new(FixedClock::new(0)), EngineConfig::default());
        let blocker = engine.create_element("blocker", actor.clone(), task("blocker"), Vec::new(), Default::default()).expect("blocker");
        let blocked = engine.create_element("blocked", actor.clone(), task("blocked"), Vec::new(), Default::default()).expect("blocked");
        engine
            .add_dependency(Dependency {
                blocked_id: blocked.id.clone(),
                blocker_id: blocker.id.clone(),
                kind: DependencyKind::Blocks,
                metadata: DependencyMetadata::None,
                created_at: Timestamp::from_unix_millis(0),
                created_by: actor.clone(),
            })
            .expect("add dependency");
        blocked.id
    };

    let store = SqliteStore::open(&config).expect("reopen");
    let engine = StoneforgeEngine::new(store, Box::new(FixedClock::new(0)), EngineConfig::default());

    assert!(engine.get_element(&blocked_id, false).expect("get").is_some());
    assert!(engine.get_blocked_row(&blocked_id).expect("row").is_some());
}
