use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::context::Context;
use crate::manager::AcceptancePolicy;
use crate::settings::SettingValues;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub manager: ManagerConfig,

    /// Session context attached to the tree root.
    #[serde(default)]
    pub context: Context,

    #[serde(default)]
    pub catalog: CatalogConfig,

    #[serde(default = "default_collectors")]
    pub collectors: Vec<PluginConfig>,

    #[serde(default = "default_plugins")]
    pub plugins: Vec<PluginConfig>,

    #[serde(default = "default_hooks")]
    pub hooks: Vec<PluginConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            manager: ManagerConfig::default(),
            context: Context::default(),
            catalog: CatalogConfig::default(),
            collectors: default_collectors(),
            plugins: default_plugins(),
            hooks: default_hooks(),
        }
    }
}

impl Config {
    /// Every plugin entry across all sections.
    pub fn all_plugins(&self) -> impl Iterator<Item = &PluginConfig> {
        self.collectors
            .iter()
            .chain(self.plugins.iter())
            .chain(self.hooks.iter())
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ManagerConfig {
    /// How many accepting plugins become tasks on one item
    #[serde(default)]
    pub acceptance: AcceptancePolicy,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CatalogConfig {
    /// JSON-lines file that receives registered records (`~` is expanded)
    #[serde(default = "default_catalog_path")]
    pub path: PathBuf,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            path: default_catalog_path(),
        }
    }
}

impl CatalogConfig {
    pub fn expanded_path(&self) -> PathBuf {
        let path = self.path.to_string_lossy();
        PathBuf::from(shellexpand::tilde(path.as_ref()).as_ref())
    }
}

fn default_catalog_path() -> PathBuf {
    PathBuf::from("~/.local/share/pubforge/catalog.jsonl")
}

/// Built-in plugin implementations selectable from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PluginKind {
    /// Collector: files and folders on disk
    File,
    /// Publisher: registers collected files with the catalog
    FilePublisher,
    /// Hook: saves the tree after validation
    TreeSnapshot,
    /// Hook: logs task counts after finalize
    Summary,
}

impl fmt::Display for PluginKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PluginKind::File => f.write_str("file"),
            PluginKind::FilePublisher => f.write_str("file_publisher"),
            PluginKind::TreeSnapshot => f.write_str("tree_snapshot"),
            PluginKind::Summary => f.write_str("summary"),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PluginConfig {
    /// Registry id; must be unique across all sections
    pub id: String,

    pub kind: PluginKind,

    /// Display name override
    #[serde(default)]
    pub name: Option<String>,

    /// App-level settings overrides
    #[serde(default)]
    pub settings: SettingValues,
}

impl PluginConfig {
    pub fn new(id: impl Into<String>, kind: PluginKind) -> Self {
        Self {
            id: id.into(),
            kind,
            name: None,
            settings: SettingValues::new(),
        }
    }
}

fn default_collectors() -> Vec<PluginConfig> {
    vec![PluginConfig::new("files", PluginKind::File)]
}

fn default_plugins() -> Vec<PluginConfig> {
    vec![PluginConfig::new("publish_files", PluginKind::FilePublisher)]
}

fn default_hooks() -> Vec<PluginConfig> {
    vec![PluginConfig::new("summary", PluginKind::Summary)]
}
