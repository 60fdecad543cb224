//! Items: nodes of the publish tree, and the mutable view handed to plugins.

use std::collections::BTreeMap;
use std::path::PathBuf;

use pubforge_common::{ItemId, Result, Value};

use super::task::PublishTask;
use super::PublishTree;
use crate::context::Context;
use crate::settings::SettingValues;

/// Type spec of the tree root.
pub const ROOT_TYPE: &str = "__root__";

/// A node of the publish tree.
///
/// Structure (parent, children, tasks) and classification are owned by the
/// tree; the remaining fields are freely editable through
/// [`PublishTree::get_mut`] or an [`ItemMut`].
#[derive(Debug, Clone, PartialEq)]
pub struct PublishItem {
    pub(super) id: ItemId,
    pub(super) parent: Option<ItemId>,
    pub(super) children: Vec<ItemId>,
    pub(super) tasks: Vec<PublishTask>,
    pub(super) type_spec: String,
    pub(super) type_display: String,
    pub(super) context: Option<Context>,
    pub(super) persistent: bool,
    pub name: String,
    pub description: Option<String>,
    pub properties: BTreeMap<String, Value>,
    /// Per-item property overrides. Never inherited by children.
    pub local_properties: BTreeMap<String, Value>,
    /// Item-local settings overrides, keyed by plugin id.
    pub local_settings: BTreeMap<String, SettingValues>,
    pub context_change_allowed: bool,
    pub checked: bool,
    pub enabled: bool,
    pub expanded: bool,
    pub thumbnail_path: Option<PathBuf>,
    pub icon_path: Option<PathBuf>,
    pub thumbnail_enabled: bool,
}

impl PublishItem {
    pub(super) fn new(
        parent: Option<ItemId>,
        type_spec: &str,
        type_display: &str,
        name: &str,
    ) -> Self {
        let type_display = if type_display.is_empty() {
            derive_type_display(type_spec)
        } else {
            type_display.to_string()
        };
        Self {
            id: ItemId::new(),
            parent,
            children: Vec::new(),
            tasks: Vec::new(),
            type_spec: type_spec.to_string(),
            type_display,
            context: None,
            persistent: false,
            name: name.to_string(),
            description: None,
            properties: BTreeMap::new(),
            local_properties: BTreeMap::new(),
            local_settings: BTreeMap::new(),
            context_change_allowed: true,
            checked: true,
            enabled: true,
            expanded: true,
            thumbnail_path: None,
            icon_path: None,
            thumbnail_enabled: true,
        }
    }

    pub(super) fn root() -> Self {
        Self::new(None, ROOT_TYPE, ROOT_TYPE, ROOT_TYPE)
    }

    pub fn id(&self) -> ItemId {
        self.id
    }

    pub fn parent(&self) -> Option<ItemId> {
        self.parent
    }

    pub fn children(&self) -> &[ItemId] {
        &self.children
    }

    pub fn tasks(&self) -> &[PublishTask] {
        &self.tasks
    }

    /// Dotted classification, e.g. `file.image.sequence`.
    pub fn type_spec(&self) -> &str {
        &self.type_spec
    }

    pub fn type_display(&self) -> &str {
        &self.type_display
    }

    /// The context set explicitly on this item, if any.
    pub fn explicit_context(&self) -> Option<&Context> {
        self.context.as_ref()
    }

    pub fn persistent(&self) -> bool {
        self.persistent
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn active(&self) -> bool {
        self.checked && self.enabled
    }

    /// Local property, then property, then `default`.
    pub fn property(&self, name: &str, default: Value) -> Value {
        self.local_properties
            .get(name)
            .or_else(|| self.properties.get(name))
            .cloned()
            .unwrap_or(default)
    }

    /// Item-local settings overrides for one plugin.
    pub fn local_settings_for(&self, plugin_id: &str) -> SettingValues {
        self.local_settings.get(plugin_id).cloned().unwrap_or_default()
    }
}

/// Human label for a type spec: `file.image.sequence` becomes
/// `Image Sequence`, a single segment is capitalized.
pub fn derive_type_display(type_spec: &str) -> String {
    let segments: Vec<&str> = type_spec.split('.').filter(|s| !s.is_empty()).collect();
    let shown = if segments.len() > 1 {
        &segments[1..]
    } else {
        &segments[..]
    };
    shown
        .iter()
        .flat_map(|s| s.split('_'))
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ")
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Mutable view of one live item, handed to plugin calls.
///
/// The view borrows the whole tree, so a plugin can create children and
/// read its ancestors, but cannot hold on to anything past the call.
pub struct ItemMut<'t> {
    tree: &'t mut PublishTree,
    id: ItemId,
}

impl<'t> ItemMut<'t> {
    pub(super) fn new(tree: &'t mut PublishTree, id: ItemId) -> Self {
        Self { tree, id }
    }

    pub fn id(&self) -> ItemId {
        self.id
    }

    pub fn item(&self) -> Result<&PublishItem> {
        self.tree.get(self.id)
    }

    pub fn item_mut(&mut self) -> Result<&mut PublishItem> {
        self.tree.get_mut(self.id)
    }

    pub fn tree(&self) -> &PublishTree {
        self.tree
    }

    pub fn tree_mut(&mut self) -> &mut PublishTree {
        self.tree
    }

    /// Create a child of this item.
    pub fn create_item(&mut self, type_spec: &str, type_display: &str, name: &str) -> Result<ItemId> {
        self.tree.create_item(self.id, type_spec, type_display, name)
    }

    /// View of another live item in the same tree.
    pub fn child(&mut self, id: ItemId) -> Result<ItemMut<'_>> {
        self.tree.item_mut(id)
    }

    pub fn get_property(&self, name: &str, default: Value) -> Result<Value> {
        self.tree.get_property(self.id, name, default)
    }

    pub fn set_property(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        self.tree.set_property(self.id, name, value)
    }

    pub fn set_local_property(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        self.tree.set_local_property(self.id, name, value)
    }

    pub fn effective_context(&self) -> Result<Context> {
        self.tree.effective_context(self.id)
    }

    pub fn set_context(&mut self, context: Context) -> Result<()> {
        self.tree.set_context(self.id, context)
    }
}
