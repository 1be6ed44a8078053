use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Result, TreeError};
use crate::types::{ItemMode, ScopeTable, DEFAULT_SCOPE_TABLE};

pub const NAVIGATOR_CONFIG_FILENAME: &str = "navigator.json";
pub const NAVIGATOR_CONFIG_VERSION: &str = "1.0.0";

/// What a walk does when it lands on a container with no visible children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyContainerPolicy {
    /// Return the container itself.
    #[default]
    Yield,
    /// Keep stepping past it.
    Skip,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigatorConfig {
    pub version: String,
    /// Scope table for collections that do not name one.
    pub default_scope_table: ScopeTable,
    /// Tables holding rows of several collections.
    pub shared_scope_tables: Vec<ScopeTable>,
    /// Raw mode bits whose rows are visible under every filter.
    pub always_visible_mode: u32,
    pub empty_containers: EmptyContainerPolicy,
    /// Upper bound on store queries per lookup.
    pub max_hops: u64,
}

impl Default for NavigatorConfig {
    fn default() -> Self {
        Self {
            version: NAVIGATOR_CONFIG_VERSION.to_string(),
            default_scope_table: ScopeTable::new(DEFAULT_SCOPE_TABLE),
            shared_scope_tables: vec![
                ScopeTable::new(DEFAULT_SCOPE_TABLE),
                ScopeTable::new("uploadtree_a"),
            ],
            always_visible_mode: ItemMode::CONTAINER.bits(),
            empty_containers: EmptyContainerPolicy::Yield,
            max_hops: 100_000,
        }
    }
}

impl NavigatorConfig {
    #[inline]
    pub fn always_visible(&self) -> ItemMode {
        ItemMode::from_raw(self.always_visible_mode)
    }

    pub fn is_shared_table(&self, table: &ScopeTable) -> bool {
        self.shared_scope_tables.contains(table)
    }
}

/// Reads the config file in `dir`, falling back to defaults when it is absent.
pub fn load_navigator_config(dir: &Path) -> Result<NavigatorConfig> {
    let path = navigator_config_path(dir);
    if !path.exists() {
        log::debug!(
            "no navigator config at {}, using defaults",
            path.display()
        );
        return Ok(NavigatorConfig::default());
    }

    let data = std::fs::read_to_string(&path).map_err(|error| {
        TreeError::Internal(format!(
            "failed to read navigator config {}: {error}",
            path.display()
        ))
    })?;
    let config: NavigatorConfig = serde_json::from_str(&data).map_err(|error| {
        TreeError::Serialization(format!(
            "failed to parse navigator config {}: {error}",
            path.display()
        ))
    })?;

    if config.version != NAVIGATOR_CONFIG_VERSION {
        return Err(TreeError::InvalidInput(format!(
            "unsupported navigator config version {} in {}",
            config.version,
            path.display()
        )));
    }
    Ok(config)
}

pub fn write_navigator_config(dir: &Path, config: &NavigatorConfig) -> Result<()> {
    std::fs::create_dir_all(dir).map_err(|error| {
        TreeError::Internal(format!(
            "failed to create config directory {}: {error}",
            dir.display()
        ))
    })?;
    let data = serde_json::to_string_pretty(config).map_err(|error| {
        TreeError::Serialization(format!("failed to serialize navigator config: {error}"))
    })?;
    let path = navigator_config_path(dir);
    std::fs::write(&path, data).map_err(|error| {
        TreeError::Internal(format!(
            "failed to write navigator config {}: {error}",
            path.display()
        ))
    })
}

pub fn navigator_config_path(dir: &Path) -> PathBuf {
    dir.join(NAVIGATOR_CONFIG_FILENAME)
}
