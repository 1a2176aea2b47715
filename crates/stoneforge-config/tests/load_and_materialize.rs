// crates/stoneforge-config/tests/load_and_materialize.rs
// ============================================================================
// Module: Config Load-And-Materialize Integration Tests
// Description: End-to-end tests of `StoneforgeConfig::load` against real
// files on disk, including `STONEFORGE_CONFIG` override resolution, and of
// the materializer methods bridging into `stoneforge-core`/`stoneforge-store-sqlite`.
// Purpose: Catch path-resolution and cross-crate wiring bugs the embedded
// unit tests in `config.rs` do not exercise.
// ============================================================================

//! Integration tests for [`stoneforge_config::StoneforgeConfig`].

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

use std::fs;

use stoneforge_config::StoneforgeConfig;
use stoneforge_store_sqlite::SqliteStoreMode;

#[test]
fn load_resolves_an_explicit_path_and_materializes_engine_and_store_config() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("stoneforge.toml");
    fs::write(
        &path,
        r#"
        [priority]
        max_depth = 4
        include_complexity = true

        [page]
        default_limit = 25

        [id_generator]
        min_len = 4
        max_len = 6

        [cache]
        auto_transition_status = false

        [store]
        path = "data/stoneforge.db"
        busy_timeout_ms = 2000
        journal_mode = "wal"
        sync_mode = "normal"
        "#,
    )
    .expect("write config");

    let config = StoneforgeConfig::load(Some(&path)).expect("load");

    let engine_config = config.engine_config();
    assert_eq!(engine_config.priority.max_depth, 4);
    assert!(engine_config.priority.include_complexity);
    assert_eq!(engine_config.id_generator.min_len, 4);
    assert_eq!(engine_config.id_generator.max_len, 6);
    assert!(!engine_config.auto_transition_status);

    let store_config = config.sqlite_store_config();
    assert_eq!(store_config.path, std::path::PathBuf::from("data/stoneforge.db"));
    assert_eq!(store_config.busy_timeout_ms, 2000);
    assert_eq!(store_config.journal_mode, SqliteStoreMode::Wal);

    let _clock = config.clock_source();
}

#[test]
#[allow(unsafe_code, reason = "test-only env var mutation to exercise path resolution")]
fn load_falls_back_to_the_stoneforge_config_env_var_when_no_path_is_given() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("from-env.toml");
    fs::write(&path, "[priority]\nmax_depth = 7\n").expect("write config");

    // SAFETY (test-only): this file is the sole test in this binary that
    // touches `STONEFORGE_CONFIG`, so there is no cross-test race.
    unsafe {
        std::env::set_var("STONEFORGE_CONFIG", &path);
    }
    let result = StoneforgeConfig::load(None);
    unsafe {
        std::env::remove_var("STONEFORGE_CONFIG");
    }

    let config = result.expect("load via env var");
    assert_eq!(config.engine_config().priority.max_depth, 7);
}

#[test]
fn load_rejects_a_file_that_fails_semantic_validation() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("invalid.toml");
    fs::write(&path, "[id_generator]\nmin_len = 8\nmax_len = 3\n").expect("write config");

    let result = StoneforgeConfig::load(Some(&path));
    assert!(result.is_err());
}
