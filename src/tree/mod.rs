//! The publish tree.
//!
//! Items live in an arena keyed by [`ItemId`]. Each item keeps its parent's
//! id and an ordered list of child ids; tasks are owned by their item and
//! indexed by [`TaskId`] for direct lookup. Ids are never reused, so a
//! handle to a removed item fails with [`Error::InvalidItem`] instead of
//! pointing at something else.
//!
//! Traversal is pre-order with children in insertion order; every phase of
//! the manager visits tasks in this order.

mod item;
mod persist;
mod task;

use std::collections::HashMap;
use std::fmt::Write as _;

use pubforge_common::{Error, ItemId, Result, TaskId, Value};

use crate::context::Context;

pub use item::{derive_type_display, ItemMut, PublishItem, ROOT_TYPE};
pub use persist::SERIALIZATION_VERSION;
pub use task::{PublishTask, TaskState, DEFAULT_DESCRIPTION};

/// Reference to one task: the owning item and the task id.
pub type TaskRef = (ItemId, TaskId);

/// Ordered forest of publish items under a single root.
#[derive(Debug, Clone)]
pub struct PublishTree {
    root: ItemId,
    items: HashMap<ItemId, PublishItem>,
    task_index: HashMap<TaskId, ItemId>,
}

impl Default for PublishTree {
    fn default() -> Self {
        Self::new()
    }
}

impl PublishTree {
    /// Create a tree containing only the root.
    pub fn new() -> Self {
        let root = PublishItem::root();
        let root_id = root.id;
        let mut items = HashMap::new();
        items.insert(root_id, root);
        Self {
            root: root_id,
            items,
            task_index: HashMap::new(),
        }
    }

    pub fn root(&self) -> ItemId {
        self.root
    }

    pub fn is_root(&self, id: ItemId) -> bool {
        id == self.root
    }

    /// Whether `id` refers to a live item.
    pub fn contains(&self, id: ItemId) -> bool {
        self.items.contains_key(&id)
    }

    /// Number of items, excluding the root.
    pub fn len(&self) -> usize {
        self.items.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, id: ItemId) -> Result<&PublishItem> {
        self.items.get(&id).ok_or_else(|| Error::invalid_item(id))
    }

    pub fn get_mut(&mut self, id: ItemId) -> Result<&mut PublishItem> {
        self.items.get_mut(&id).ok_or_else(|| Error::invalid_item(id))
    }

    /// Mutable view of a live item.
    pub fn item_mut(&mut self, id: ItemId) -> Result<ItemMut<'_>> {
        if !self.contains(id) {
            return Err(Error::invalid_item(id));
        }
        Ok(ItemMut::new(self, id))
    }

    /// Create a new item as the last child of `parent`.
    ///
    /// An empty `type_display` is derived from `type_spec`.
    pub fn create_item(
        &mut self,
        parent: ItemId,
        type_spec: &str,
        type_display: &str,
        name: &str,
    ) -> Result<ItemId> {
        let item = PublishItem::new(Some(parent), type_spec, type_display, name);
        let id = item.id;
        self.get_mut(parent)?.children.push(id);
        self.items.insert(id, item);
        tracing::debug!("Created item '{}' ({}) under {}", name, type_spec, parent);
        Ok(id)
    }

    /// Read a property: local override, then property, then `default`.
    pub fn get_property(&self, id: ItemId, name: &str, default: Value) -> Result<Value> {
        Ok(self.get(id)?.property(name, default))
    }

    /// Set a property shared with plugins.
    ///
    /// # Errors
    ///
    /// [`Error::ReservedValue`] when the value is or nests a `{"$blob": ..}`
    /// mapping, which could not be told apart from a blob reference on load.
    pub fn set_property(&mut self, id: ItemId, name: &str, value: impl Into<Value>) -> Result<()> {
        let value = storable(name, value.into())?;
        self.get_mut(id)?.properties.insert(name.to_string(), value);
        Ok(())
    }

    pub fn set_local_property(
        &mut self,
        id: ItemId,
        name: &str,
        value: impl Into<Value>,
    ) -> Result<()> {
        let value = storable(name, value.into())?;
        self.get_mut(id)?
            .local_properties
            .insert(name.to_string(), value);
        Ok(())
    }

    /// Record an item-local override for one setting of one plugin.
    ///
    /// The override is type-checked when the plugin's settings are next
    /// resolved for this item.
    pub fn set_local_setting(
        &mut self,
        id: ItemId,
        plugin_id: &str,
        name: &str,
        value: impl Into<Value>,
    ) -> Result<()> {
        let value = storable(name, value.into())?;
        self.get_mut(id)?
            .local_settings
            .entry(plugin_id.to_string())
            .or_default()
            .insert(name.to_string(), value);
        Ok(())
    }

    /// Remove an item with its whole subtree and every task bound beneath
    /// it. Returns the removed ids in pre-order, starting with `id`.
    pub fn remove_item(&mut self, id: ItemId) -> Result<Vec<ItemId>> {
        if self.is_root(id) {
            return Err(Error::InvalidItem("the root item cannot be removed".into()));
        }
        let parent = self.get(id)?.parent;

        let mut removed = vec![id];
        removed.extend(self.descendants(id)?);

        if let Some(parent) = parent {
            if let Some(parent) = self.items.get_mut(&parent) {
                parent.children.retain(|child| *child != id);
            }
        }
        for item_id in &removed {
            if let Some(item) = self.items.remove(item_id) {
                for task in &item.tasks {
                    self.task_index.remove(&task.id);
                }
            }
        }

        tracing::debug!("Removed {} item(s) starting at {}", removed.len(), id);
        Ok(removed)
    }

    /// Pre-order traversal below `id`, excluding `id`.
    pub fn descendants(&self, id: ItemId) -> Result<Vec<ItemId>> {
        let mut out = Vec::new();
        let mut stack: Vec<ItemId> = self.get(id)?.children.iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            if let Some(item) = self.items.get(&next) {
                stack.extend(item.children.iter().rev().copied());
            }
        }
        Ok(out)
    }

    /// Every non-root item in pre-order.
    pub fn iter(&self) -> impl Iterator<Item = &PublishItem> + '_ {
        self.descendants(self.root)
            .unwrap_or_default()
            .into_iter()
            .filter_map(move |id| self.items.get(&id))
    }

    pub fn children(&self, id: ItemId) -> Result<&[ItemId]> {
        Ok(&self.get(id)?.children)
    }

    pub fn parent(&self, id: ItemId) -> Result<Option<ItemId>> {
        Ok(self.get(id)?.parent)
    }

    /// Ancestors of `id`, nearest first, ending with the root.
    pub fn ancestors(&self, id: ItemId) -> Result<Vec<ItemId>> {
        let mut out = Vec::new();
        let mut current = self.get(id)?.parent;
        while let Some(ancestor) = current {
            out.push(ancestor);
            current = self.items.get(&ancestor).and_then(|item| item.parent);
        }
        Ok(out)
    }

    /// Depth below the root (top-level items have depth 1).
    pub fn depth(&self, id: ItemId) -> Result<usize> {
        Ok(self.ancestors(id)?.len())
    }

    /// Top-level persistent items, in order.
    pub fn persistent_items(&self) -> Vec<ItemId> {
        self.items[&self.root]
            .children
            .iter()
            .copied()
            .filter(|id| self.items.get(id).is_some_and(|item| item.persistent))
            .collect()
    }

    /// Make a top-level item (not) persistent across [`PublishTree::clear`].
    pub fn set_persistent(&mut self, id: ItemId, persistent: bool) -> Result<()> {
        if self.get(id)?.parent != Some(self.root) {
            return Err(Error::InvalidItem(format!(
                "{id} is not a top-level item; only top-level items can be persistent"
            )));
        }
        self.get_mut(id)?.persistent = persistent;
        Ok(())
    }

    /// Replace the root with a fresh one.
    ///
    /// Unless `clear_persistent` is set, persistent top-level items and their
    /// subtrees survive and are re-parented under the new root.
    pub fn clear(&mut self, clear_persistent: bool) {
        let keep = if clear_persistent {
            Vec::new()
        } else {
            self.persistent_items()
        };

        let old_root = self.root;
        let mut new_tree = PublishTree::new();
        for id in &keep {
            let mut ids = vec![*id];
            ids.extend(self.descendants(*id).unwrap_or_default());
            for moved in ids {
                if let Some(mut item) = self.items.remove(&moved) {
                    if item.parent == Some(old_root) {
                        item.parent = Some(new_tree.root);
                    }
                    for task in &item.tasks {
                        new_tree.task_index.insert(task.id, moved);
                    }
                    new_tree.items.insert(moved, item);
                }
            }
        }
        if let Some(root) = new_tree.items.get_mut(&new_tree.root) {
            root.children = keep.clone();
        }

        tracing::debug!(
            "Cleared tree, kept {} persistent item(s)",
            keep.len()
        );
        *self = new_tree;
    }

    /// Context of `id`: its own, else the nearest ancestor's, else empty.
    pub fn effective_context(&self, id: ItemId) -> Result<Context> {
        let item = self.get(id)?;
        if let Some(ref context) = item.context {
            return Ok(context.clone());
        }
        for ancestor in self.ancestors(id)? {
            if let Some(ref context) = self.items[&ancestor].context {
                return Ok(context.clone());
            }
        }
        Ok(Context::default())
    }

    /// Replace the session context stored on the root. The root's own
    /// context lock does not apply.
    pub fn set_root_context(&mut self, context: Context) {
        if let Some(root) = self.items.get_mut(&self.root) {
            root.context = Some(context);
        }
    }

    /// Set the explicit context of an item.
    ///
    /// Refused with [`Error::ContextLocked`] when the item or one of its
    /// ancestors disallows context changes and `context` differs from that
    /// item's effective context. Nothing changes on refusal.
    pub fn set_context(&mut self, id: ItemId, context: Context) -> Result<()> {
        let mut chain = vec![id];
        chain.extend(self.ancestors(id)?);
        for locker in chain {
            if self.items[&locker].context_change_allowed {
                continue;
            }
            if self.effective_context(locker)? != context {
                return Err(Error::ContextLocked {
                    item: self.items[&id].name.clone(),
                    locked_by: self.items[&locker].name.clone(),
                });
            }
        }
        self.get_mut(id)?.context = Some(context);
        Ok(())
    }

    /// Attach a task to the item named by [`PublishTask::item`].
    pub fn add_task(&mut self, task: PublishTask) -> Result<TaskId> {
        let item_id = task.item;
        let task_id = task.id;
        self.get_mut(item_id)?.tasks.push(task);
        self.task_index.insert(task_id, item_id);
        Ok(task_id)
    }

    pub fn remove_task(&mut self, task_id: TaskId) -> Result<PublishTask> {
        let item_id = self.item_of_task(task_id)?;
        let item = self.get_mut(item_id)?;
        let pos = item
            .tasks
            .iter()
            .position(|t| t.id == task_id)
            .ok_or_else(|| Error::invalid_item(task_id))?;
        let task = item.tasks.remove(pos);
        self.task_index.remove(&task_id);
        Ok(task)
    }

    /// Drop every task of one item.
    pub fn clear_tasks(&mut self, id: ItemId) -> Result<()> {
        let tasks = std::mem::take(&mut self.get_mut(id)?.tasks);
        for task in tasks {
            self.task_index.remove(&task.id);
        }
        Ok(())
    }

    pub fn item_of_task(&self, task_id: TaskId) -> Result<ItemId> {
        self.task_index
            .get(&task_id)
            .copied()
            .ok_or_else(|| Error::invalid_item(task_id))
    }

    pub fn task(&self, task_id: TaskId) -> Result<&PublishTask> {
        let item_id = self.item_of_task(task_id)?;
        self.get(item_id)?
            .tasks
            .iter()
            .find(|t| t.id == task_id)
            .ok_or_else(|| Error::invalid_item(task_id))
    }

    pub fn task_mut(&mut self, task_id: TaskId) -> Result<&mut PublishTask> {
        let item_id = self.item_of_task(task_id)?;
        self.get_mut(item_id)?
            .tasks
            .iter_mut()
            .find(|t| t.id == task_id)
            .ok_or_else(|| Error::invalid_item(task_id))
    }

    pub fn tasks(&self, id: ItemId) -> Result<&[PublishTask]> {
        Ok(&self.get(id)?.tasks)
    }

    /// Every task in tree order.
    pub fn all_tasks(&self) -> Vec<TaskRef> {
        self.iter()
            .flat_map(|item| item.tasks.iter().map(move |t| (item.id, t.id)))
            .collect()
    }

    /// Indented debug dump of the tree. Never used for persistence.
    pub fn pformat(&self) -> String {
        let mut out = String::new();
        for item in self.iter() {
            let depth = self.depth(item.id).unwrap_or(1);
            let indent = "  ".repeat(depth - 1);
            let _ = writeln!(out, "{indent}[item] {} ({})", item.name, item.type_display);
            for task in &item.tasks {
                let _ = writeln!(out, "{indent}  [task] {}", task.name);
            }
        }
        out
    }

    pub fn pprint(&self) {
        print!("{}", self.pformat());
    }
}

/// Refuse values that would not survive a save and load unchanged.
fn storable(name: &str, value: Value) -> Result<Value> {
    if value.contains_reserved_map() {
        return Err(Error::reserved_value(name));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Settings;
    use assert_matches::assert_matches;

    fn sample() -> (PublishTree, ItemId, ItemId, ItemId) {
        let mut tree = PublishTree::new();
        let root = tree.root();
        let a = tree.create_item(root, "file.folder", "", "A").unwrap();
        let a1 = tree.create_item(a, "file.image", "", "A1").unwrap();
        let b = tree.create_item(root, "file.video", "", "B").unwrap();
        (tree, a, a1, b)
    }

    #[test]
    fn preorder_traversal() {
        let (tree, a, a1, b) = sample();
        assert_eq!(tree.descendants(tree.root()).unwrap(), vec![a, a1, b]);
        let names: Vec<_> = tree.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["A", "A1", "B"]);
        assert_eq!(tree.descendants(a).unwrap(), vec![a1]);
        assert_eq!(tree.len(), 3);
    }

    #[test]
    fn parent_and_children() {
        let (tree, a, a1, _) = sample();
        assert_eq!(tree.parent(a1).unwrap(), Some(a));
        assert_eq!(tree.children(a).unwrap(), &[a1]);
        assert_eq!(tree.parent(tree.root()).unwrap(), None);
        assert!(tree.get(tree.root()).unwrap().is_root());
        assert_eq!(tree.depth(a1).unwrap(), 2);
    }

    #[test]
    fn removal_invalidates_handles() {
        let (mut tree, a, a1, b) = sample();
        let task = PublishTask::new(a1, "p", "P", Settings::default());
        let task_id = tree.add_task(task).unwrap();

        let removed = tree.remove_item(a).unwrap();
        assert_eq!(removed, vec![a, a1]);

        assert!(tree.get(a1).unwrap_err().is_invalid_item());
        assert_matches!(tree.task(task_id), Err(Error::InvalidItem(_)));
        assert_matches!(
            tree.set_property(a, "x", 1),
            Err(Error::InvalidItem(_))
        );
        assert_eq!(tree.descendants(tree.root()).unwrap(), vec![b]);
    }

    #[test]
    fn root_cannot_be_removed() {
        let mut tree = PublishTree::new();
        let root = tree.root();
        assert_matches!(tree.remove_item(root), Err(Error::InvalidItem(_)));
    }

    #[test]
    fn property_lookup_order() {
        let (mut tree, a, _, _) = sample();
        tree.set_property(a, "frame", 10).unwrap();
        tree.set_local_property(a, "frame", 12).unwrap();
        assert_eq!(tree.get_property(a, "frame", Value::Null).unwrap(), Value::Int(12));
        assert_eq!(
            tree.get_property(a, "absent", Value::Bool(false)).unwrap(),
            Value::Bool(false)
        );
    }

    #[test]
    fn blob_shaped_mappings_are_refused() {
        use pubforge_common::{BlobRef, BLOB_KEY};
        use std::collections::BTreeMap;

        let (mut tree, a, _, _) = sample();
        let blob_shaped = Value::Map(BTreeMap::from([(BLOB_KEY.to_string(), Value::from("x"))]));

        assert_matches!(
            tree.set_property(a, "meta", blob_shaped.clone()),
            Err(Error::ReservedValue { ref name }) if name == "meta"
        );
        assert_matches!(
            tree.set_local_property(a, "meta", Value::List(vec![blob_shaped.clone()])),
            Err(Error::ReservedValue { .. })
        );
        assert_matches!(
            tree.set_local_setting(a, "p", "meta", blob_shaped),
            Err(Error::ReservedValue { .. })
        );
        assert_eq!(tree.get_property(a, "meta", Value::Null).unwrap(), Value::Null);

        tree.set_property(a, "thumb", BlobRef::new("x")).unwrap();
        assert!(tree
            .get_property(a, "thumb", Value::Null)
            .unwrap()
            .as_blob()
            .is_some());
    }

    #[test]
    fn context_inheritance() {
        let (mut tree, a, a1, b) = sample();
        let root = tree.root();
        tree.set_context(root, Context::project("demo")).unwrap();
        tree.set_context(a, Context::project("demo").with_entity("sh010"))
            .unwrap();

        assert_eq!(
            tree.effective_context(a1).unwrap().entity.as_deref(),
            Some("sh010")
        );
        assert_eq!(tree.effective_context(b).unwrap(), Context::project("demo"));
    }

    #[test]
    fn context_lock_refuses_changes() {
        let (mut tree, a, a1, _) = sample();
        let c1 = Context::project("one");
        tree.set_context(a, c1.clone()).unwrap();
        tree.get_mut(a).unwrap().context_change_allowed = false;

        let err = tree.set_context(a1, Context::project("two")).unwrap_err();
        assert_matches!(err, Error::ContextLocked { .. });
        assert_eq!(tree.effective_context(a1).unwrap(), c1);
        assert_eq!(tree.get(a1).unwrap().explicit_context(), None);

        // Restating the locked context is not a change.
        tree.set_context(a1, c1.clone()).unwrap();
        assert_matches!(
            tree.set_context(a, Context::project("two")),
            Err(Error::ContextLocked { .. })
        );
    }

    #[test]
    fn persistence_only_for_top_level() {
        let (mut tree, a, a1, _) = sample();
        tree.set_persistent(a, true).unwrap();
        assert_matches!(tree.set_persistent(a1, true), Err(Error::InvalidItem(_)));
        assert_eq!(tree.persistent_items(), vec![a]);
    }

    #[test]
    fn clear_keeps_persistent_subtrees() {
        let (mut tree, a, a1, b) = sample();
        let task_id = tree
            .add_task(PublishTask::new(a1, "p", "P", Settings::default()))
            .unwrap();
        tree.set_persistent(a, true).unwrap();
        let old_root = tree.root();

        tree.clear(false);

        assert_ne!(tree.root(), old_root);
        assert_eq!(tree.descendants(tree.root()).unwrap(), vec![a, a1]);
        assert_eq!(tree.parent(a).unwrap(), Some(tree.root()));
        assert!(!tree.contains(b));
        assert!(tree.task(task_id).is_ok());

        tree.clear(true);
        assert!(tree.is_empty());
        assert!(tree.task(task_id).is_err());
    }

    #[test]
    fn task_bookkeeping() {
        let (mut tree, a, _, _) = sample();
        let t1 = tree.add_task(PublishTask::new(a, "p1", "One", Settings::default())).unwrap();
        let t2 = tree.add_task(PublishTask::new(a, "p2", "Two", Settings::default())).unwrap();
        assert_eq!(tree.all_tasks(), vec![(a, t1), (a, t2)]);

        tree.task_mut(t1).unwrap().checked = false;
        assert!(!tree.task(t1).unwrap().active());

        let removed = tree.remove_task(t1).unwrap();
        assert_eq!(removed.name, "One");
        assert_eq!(tree.tasks(a).unwrap().len(), 1);

        tree.clear_tasks(a).unwrap();
        assert!(tree.task(t2).is_err());
    }

    #[test]
    fn pformat_layout() {
        let (mut tree, _, a1, _) = sample();
        tree.add_task(PublishTask::new(a1, "p", "Publish to catalog", Settings::default()))
            .unwrap();
        let dump = tree.pformat();
        assert_eq!(
            dump,
            "[item] A (Folder)\n  [item] A1 (Image)\n    [task] Publish to catalog\n[item] B (Video)\n"
        );
    }

    #[test]
    fn item_mut_creates_children() {
        let (mut tree, a, _, _) = sample();
        let mut view = tree.item_mut(a).unwrap();
        let child = view.create_item("file.text", "", "notes.txt").unwrap();
        view.set_property("seen", true).unwrap();
        assert_eq!(tree.parent(child).unwrap(), Some(a));
        assert_eq!(tree.get_property(a, "seen", Value::Null).unwrap(), Value::Bool(true));
    }
}
