// crates/stoneforge-config/src/lib.rs
// ============================================================================
// Module: Stoneforge Config
// Description: Crate root re-exporting the TOML configuration loader.
// Purpose: Give callers a single import surface for startup configuration.
// Dependencies: crate::config
// ============================================================================

//! # stoneforge-config
//!
//! Fail-closed TOML configuration loading for Stoneforge (spec.md §6
//! "Enumerated configuration"). Missing or invalid configuration is an error,
//! never a silent fallback to defaults chosen at call time — every default is
//! baked into [`StoneforgeConfig`]'s `Deserialize` impl instead.

#![forbid(unsafe_code)]

mod config;

pub use config::CacheConfig;
pub use config::ClockSourceKind;
pub use config::ConfigError;
pub use config::GateConfig;
pub use config::IdGeneratorSettings;
pub use config::PageConfig;
pub use config::PrioritySettings;
pub use config::StoneforgeConfig;
pub use config::StoreConfig;
