// crates/stoneforge-config/src/config.rs
// ============================================================================
// Module: Stoneforge Configuration
// Description: Configuration loading and validation for Stoneforge.
// Purpose: Provide strict, fail-closed TOML config parsing with hard limits.
// Dependencies: stoneforge-core, stoneforge-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path
//! limits. Missing or invalid configuration fails closed: a malformed or
//! out-of-range value is a startup error, not a silently-corrected default.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use stoneforge_core::model::ClockSource;
use stoneforge_core::model::SystemClock;
use stoneforge_core::runtime::EngineConfig;
use stoneforge_core::runtime::IdGeneratorConfig;
use stoneforge_core::runtime::PriorityConfig;
use stoneforge_store_sqlite::SqliteStoreConfig;
use stoneforge_store_sqlite::SqliteStoreMode;
use stoneforge_store_sqlite::SqliteSyncMode;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "stoneforge.toml";
/// Environment variable used to override the config path.
pub(crate) const CONFIG_ENV_VAR: &str = "STONEFORGE_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Lower bound accepted for `priority.maxDepth` (spec.md §6).
pub(crate) const MIN_PRIORITY_MAX_DEPTH: u32 = 1;
/// Upper bound accepted for `priority.maxDepth`; beyond this a misconfigured
/// depth would make effective-priority computation unboundedly expensive on
/// a deep `blocks` chain.
pub(crate) const MAX_PRIORITY_MAX_DEPTH: u32 = 1_000;
/// Upper bound accepted for `page.defaultLimit`.
pub(crate) const MAX_PAGE_DEFAULT_LIMIT: usize = 10_000;
/// Lower bound accepted for `idGenerator.minLen` / `maxLen` (spec.md §4.2
/// floor: below 3 characters the base36 namespace collides too readily).
pub(crate) const MIN_ID_LEN: usize = 3;
/// Upper bound accepted for `idGenerator.minLen` / `maxLen`.
pub(crate) const MAX_ID_LEN: usize = 32;
/// Upper bound accepted for `store.busyTimeoutMs`.
pub(crate) const MAX_BUSY_TIMEOUT_MS: u64 = 300_000;

// ============================================================================
// SECTION: Configuration Root
// ============================================================================

/// Top-level Stoneforge configuration (spec.md §6 "Enumerated configuration").
#[derive(Debug, Clone, Deserialize)]
pub struct StoneforgeConfig {
    /// Effective-priority propagation settings.
    #[serde(default)]
    pub priority: PrioritySettings,
    /// List/query pagination defaults.
    #[serde(default)]
    pub page: PageConfig,
    /// Content-addressed id generation range.
    #[serde(default)]
    pub id_generator: IdGeneratorSettings,
    /// Blocked-cache behavior.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Gate clock source selection.
    #[serde(default)]
    pub gate: GateConfig,
    /// `SQLite` store settings.
    #[serde(default)]
    pub store: StoreConfig,
}

impl Default for StoneforgeConfig {
    fn default() -> Self {
        Self {
            priority: PrioritySettings::default(),
            page: PageConfig::default(),
            id_generator: IdGeneratorSettings::default(),
            cache: CacheConfig::default(),
            gate: GateConfig::default(),
            store: StoreConfig::default(),
        }
    }
}

impl StoneforgeConfig {
    /// Loads configuration from disk using the default resolution rules:
    /// an explicit `path`, else `STONEFORGE_CONFIG`, else `stoneforge.toml`
    /// in the working directory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the path cannot be read, the file
    /// exceeds [`MAX_CONFIG_FILE_SIZE`], the TOML is malformed, or
    /// validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content =
            std::str::from_utf8(&bytes).map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        let config: Self = toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency and hard limits.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when any setting is out of range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.priority.validate()?;
        self.page.validate()?;
        self.id_generator.validate()?;
        self.store.validate()?;
        Ok(())
    }

    /// Builds the [`EngineConfig`] consumed by `StoneforgeEngine::new`.
    #[must_use]
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            id_generator: IdGeneratorConfig { min_len: self.id_generator.min_len, max_len: self.id_generator.max_len },
            priority: PriorityConfig {
                max_depth: self.priority.max_depth,
                include_complexity: self.priority.include_complexity,
            },
            auto_transition_status: self.cache.auto_transition_status,
        }
    }

    /// Builds the [`SqliteStoreConfig`] for the durable backend.
    #[must_use]
    pub fn sqlite_store_config(&self) -> SqliteStoreConfig {
        SqliteStoreConfig {
            path: self.store.path.clone(),
            busy_timeout_ms: self.store.busy_timeout_ms,
            journal_mode: self.store.journal_mode,
            sync_mode: self.store.sync_mode,
        }
    }

    /// Materializes the configured clock source.
    ///
    /// Only [`ClockSourceKind::System`] is representable in TOML; tests that
    /// need a [`stoneforge_core::model::FixedClock`] construct one directly
    /// rather than through configuration.
    #[must_use]
    pub fn clock_source(&self) -> Box<dyn ClockSource> {
        match self.gate.clock_source {
            ClockSourceKind::System => Box::new(SystemClock),
        }
    }
}

// ============================================================================
// SECTION: Priority Settings
// ============================================================================

/// `priority.*` settings (spec.md §6).
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PrioritySettings {
    /// Traversal bound for effective-priority and aggregate-complexity
    /// computation. Default 10.
    #[serde(default = "default_priority_max_depth")]
    pub max_depth: u32,
    /// Whether aggregate-complexity is computed alongside priority. Default
    /// false.
    #[serde(default)]
    pub include_complexity: bool,
}

impl Default for PrioritySettings {
    fn default() -> Self {
        Self { max_depth: default_priority_max_depth(), include_complexity: false }
    }
}

impl PrioritySettings {
    /// Validates `priority.maxDepth` is within the accepted range.
    fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_PRIORITY_MAX_DEPTH..=MAX_PRIORITY_MAX_DEPTH).contains(&self.max_depth) {
            return Err(ConfigError::Invalid(format!(
                "priority.maxDepth must be between {MIN_PRIORITY_MAX_DEPTH} and {MAX_PRIORITY_MAX_DEPTH}"
            )));
        }
        Ok(())
    }
}

/// Default value for `priority.maxDepth`.
const fn default_priority_max_depth() -> u32 {
    10
}

// ============================================================================
// SECTION: Page Settings
// ============================================================================

/// `page.*` settings (spec.md §6).
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PageConfig {
    /// Default `limit` for list operations. Default 50.
    #[serde(default = "default_page_limit")]
    pub default_limit: usize,
}

impl Default for PageConfig {
    fn default() -> Self {
        Self { default_limit: default_page_limit() }
    }
}

impl PageConfig {
    /// Validates `page.defaultLimit` is within the accepted range.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.default_limit == 0 || self.default_limit > MAX_PAGE_DEFAULT_LIMIT {
            return Err(ConfigError::Invalid(format!(
                "page.defaultLimit must be between 1 and {MAX_PAGE_DEFAULT_LIMIT}"
            )));
        }
        Ok(())
    }
}

/// Default value for `page.defaultLimit`.
const fn default_page_limit() -> usize {
    stoneforge_core::DEFAULT_PAGE_LIMIT
}

// ============================================================================
// SECTION: Id Generator Settings
// ============================================================================

/// `idGenerator.*` settings (spec.md §6, §4.2).
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct IdGeneratorSettings {
    /// Shortest id body length tried first. Default 3.
    #[serde(default = "default_id_min_len")]
    pub min_len: usize,
    /// Longest id body length tried before failing with `IdExhausted`.
    /// Default 8.
    #[serde(default = "default_id_max_len")]
    pub max_len: usize,
}

impl Default for IdGeneratorSettings {
    fn default() -> Self {
        Self { min_len: default_id_min_len(), max_len: default_id_max_len() }
    }
}

impl IdGeneratorSettings {
    /// Validates `idGenerator.minLen`/`maxLen` are within range and ordered.
    fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_ID_LEN..=MAX_ID_LEN).contains(&self.min_len) {
            return Err(ConfigError::Invalid(format!(
                "idGenerator.minLen must be between {MIN_ID_LEN} and {MAX_ID_LEN}"
            )));
        }
        if !(MIN_ID_LEN..=MAX_ID_LEN).contains(&self.max_len) {
            return Err(ConfigError::Invalid(format!(
                "idGenerator.maxLen must be between {MIN_ID_LEN} and {MAX_ID_LEN}"
            )));
        }
        if self.min_len > self.max_len {
            return Err(ConfigError::Invalid("idGenerator.minLen must not exceed idGenerator.maxLen".to_string()));
        }
        Ok(())
    }
}

/// Default value for `idGenerator.minLen`.
const fn default_id_min_len() -> usize {
    3
}

/// Default value for `idGenerator.maxLen`.
const fn default_id_max_len() -> usize {
    8
}

// ============================================================================
// SECTION: Cache Settings
// ============================================================================

/// `cache.*` settings (spec.md §6).
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct CacheConfig {
    /// Whether to drive auto block/unblock transitions on tasks. Default
    /// true.
    #[serde(default = "default_auto_transition_status")]
    pub auto_transition_status: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { auto_transition_status: default_auto_transition_status() }
    }
}

/// Default value for `cache.autoTransitionStatus`.
const fn default_auto_transition_status() -> bool {
    true
}

// ============================================================================
// SECTION: Gate Settings
// ============================================================================

/// `gate.*` settings (spec.md §6).
#[derive(Debug, Clone, Copy, Deserialize, Default)]
pub struct GateConfig {
    /// Injectable time source for deterministic testing.
    #[serde(default)]
    pub clock_source: ClockSourceKind,
}

/// The clock sources representable in configuration. Only the wall clock is
/// offered here; a `FixedClock` is a test construct built directly in test
/// code, never wired through a config file (spec.md §6 `gate.clockSource`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ClockSourceKind {
    /// The wall clock (`stoneforge_core::model::SystemClock`).
    #[default]
    System,
}

// ============================================================================
// SECTION: Store Settings
// ============================================================================

/// `store.*` settings: the durable `SQLite` backend (spec.md §5, §6).
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Path to the `SQLite` database file.
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

impl StoreConfig {
    /// Validates the `SQLite` store path and busy-timeout settings.
    fn validate(&self) -> Result<(), ConfigError> {
        let text = self.path.to_string_lossy();
        if text.is_empty() {
            return Err(ConfigError::Invalid("store.path must be non-empty".to_string()));
        }
        if text.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("store.path exceeds max length".to_string()));
        }
        for component in self.path.components() {
            if component.as_os_str().len() > MAX_PATH_COMPONENT_LENGTH {
                return Err(ConfigError::Invalid("store.path component too long".to_string()));
            }
        }
        if self.busy_timeout_ms == 0 || self.busy_timeout_ms > MAX_BUSY_TIMEOUT_MS {
            return Err(ConfigError::Invalid(format!(
                "store.busyTimeoutMs must be between 1 and {MAX_BUSY_TIMEOUT_MS}"
            )));
        }
        Ok(())
    }
}

/// Default value for `store.path`.
fn default_store_path() -> PathBuf {
    PathBuf::from("stoneforge.db")
}

/// Default value for `store.busyTimeoutMs`.
const fn default_busy_timeout_ms() -> u64 {
    5_000
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading or validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Path Resolution Helpers
// ============================================================================

/// Resolves the config path from an explicit argument or environment
/// defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against security limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}
