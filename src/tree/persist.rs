//! JSON persistence of the publish tree.
//!
//! The document is a nested item hierarchy under a version marker:
//!
//! ```json
//! { "serialization_version": 1, "root": { "id": "...", "children": [ ... ] } }
//! ```
//!
//! Pixel data is never stored; thumbnails and icons are kept as paths.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use pubforge_common::{Error, ItemId, Result, Value};
use serde::{Deserialize, Serialize};

use super::item::PublishItem;
use super::task::PublishTask;
use super::PublishTree;
use crate::context::Context;
use crate::settings::SettingValues;

/// Version written to, and required from, every persisted tree.
pub const SERIALIZATION_VERSION: u32 = 1;

#[derive(Deserialize)]
struct VersionHeader {
    serialization_version: u32,
}

#[derive(Serialize, Deserialize)]
struct TreeDocument {
    serialization_version: u32,
    root: ItemRecord,
}

#[derive(Serialize, Deserialize)]
struct ItemRecord {
    id: ItemId,
    name: String,
    type_spec: String,
    type_display: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(default)]
    properties: BTreeMap<String, Value>,
    #[serde(default)]
    local_properties: BTreeMap<String, Value>,
    #[serde(default)]
    local_settings: BTreeMap<String, SettingValues>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    context: Option<Context>,
    context_change_allowed: bool,
    checked: bool,
    enabled: bool,
    expanded: bool,
    persistent: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    thumbnail_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    icon_path: Option<PathBuf>,
    thumbnail_enabled: bool,
    #[serde(default)]
    tasks: Vec<PublishTask>,
    #[serde(default)]
    children: Vec<ItemRecord>,
}

impl ItemRecord {
    fn capture(tree: &PublishTree, item: &PublishItem) -> Self {
        let children = item
            .children
            .iter()
            .filter_map(|id| tree.items.get(id))
            .map(|child| ItemRecord::capture(tree, child))
            .collect();
        Self {
            id: item.id,
            name: item.name.clone(),
            type_spec: item.type_spec.clone(),
            type_display: item.type_display.clone(),
            description: item.description.clone(),
            properties: item.properties.clone(),
            local_properties: item.local_properties.clone(),
            local_settings: item.local_settings.clone(),
            context: item.context.clone(),
            context_change_allowed: item.context_change_allowed,
            checked: item.checked,
            enabled: item.enabled,
            expanded: item.expanded,
            persistent: item.persistent,
            thumbnail_path: item.thumbnail_path.clone(),
            icon_path: item.icon_path.clone(),
            thumbnail_enabled: item.thumbnail_enabled,
            tasks: item.tasks.clone(),
            children,
        }
    }

    /// Insert this record and its subtree, returning the record's id.
    fn restore(self, parent: Option<ItemId>, tree: &mut PublishTree) -> Result<ItemId> {
        let id = self.id;
        if tree.items.contains_key(&id) {
            return Err(Error::Serialization(format!("duplicate item id {id}")));
        }

        let mut tasks = self.tasks;
        for task in &mut tasks {
            task.item = id;
            if tree.task_index.insert(task.id, id).is_some() {
                return Err(Error::Serialization(format!(
                    "duplicate task id {}",
                    task.id
                )));
            }
        }

        let item = PublishItem {
            id,
            parent,
            children: Vec::new(),
            tasks,
            type_spec: self.type_spec,
            type_display: self.type_display,
            context: self.context,
            persistent: self.persistent,
            name: self.name,
            description: self.description,
            properties: self.properties,
            local_properties: self.local_properties,
            local_settings: self.local_settings,
            context_change_allowed: self.context_change_allowed,
            checked: self.checked,
            enabled: self.enabled,
            expanded: self.expanded,
            thumbnail_path: self.thumbnail_path,
            icon_path: self.icon_path,
            thumbnail_enabled: self.thumbnail_enabled,
        };
        tree.items.insert(id, item);

        let mut children = Vec::with_capacity(self.children.len());
        for child in self.children {
            children.push(child.restore(Some(id), tree)?);
        }
        if let Some(item) = tree.items.get_mut(&id) {
            item.children = children;
        }
        Ok(id)
    }
}

impl PublishTree {
    /// Serialize the tree to a JSON string.
    pub fn to_json(&self) -> Result<String> {
        let document = TreeDocument {
            serialization_version: SERIALIZATION_VERSION,
            root: ItemRecord::capture(self, &self.items[&self.root]),
        };
        Ok(serde_json::to_string_pretty(&document)?)
    }

    /// Rebuild a tree from a JSON string produced by [`PublishTree::to_json`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Serialization`] on malformed input, duplicate ids, or
    /// a `serialization_version` other than [`SERIALIZATION_VERSION`].
    pub fn from_json(json: &str) -> Result<Self> {
        let header: VersionHeader = serde_json::from_str(json)?;
        if header.serialization_version != SERIALIZATION_VERSION {
            return Err(Error::Serialization(format!(
                "unsupported serialization version {} (expected {})",
                header.serialization_version, SERIALIZATION_VERSION
            )));
        }

        let document: TreeDocument = serde_json::from_str(json)?;
        let mut tree = PublishTree {
            root: document.root.id,
            items: HashMap::new(),
            task_index: HashMap::new(),
        };
        tree.root = document.root.restore(None, &mut tree)?;
        Ok(tree)
    }

    /// Write the tree to `path` as JSON.
    pub fn save_file(&self, path: &Path) -> Result<()> {
        let json = self.to_json()?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, json)?;
        tracing::info!("Saved publish tree ({} items) to {:?}", self.len(), path);
        Ok(())
    }

    /// Load a tree previously written by [`PublishTree::save_file`].
    pub fn load_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let tree = Self::from_json(&json)?;
        tracing::info!("Loaded publish tree ({} items) from {:?}", tree.len(), path);
        Ok(tree)
    }
}
