//! Provenance of collected files: which items each source path produced.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use pubforge_common::{ItemId, Value};

use crate::tree::PublishTree;

/// Property set on every top-level item created from a file.
pub const COLLECTED_FILE_PATH: &str = "collected_file_path";

/// Source path → items created from it.
///
/// A path counts as collected only while at least one of its items is
/// still in the tree.
#[derive(Debug, Clone, Default)]
pub struct CollectedFiles {
    entries: BTreeMap<PathBuf, Vec<ItemId>>,
}

impl CollectedFiles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from the `collected_file_path` property of top-level items.
    pub fn rebuild(tree: &PublishTree) -> Self {
        let mut collected = Self::new();
        for id in tree.children(tree.root()).unwrap_or_default() {
            let path = tree
                .get_property(*id, COLLECTED_FILE_PATH, Value::Null)
                .ok()
                .and_then(|v| v.as_str().map(PathBuf::from));
            if let Some(path) = path {
                collected.record(&path, *id);
            }
        }
        collected
    }

    pub fn record(&mut self, path: &Path, item: ItemId) {
        self.entries.entry(path.to_path_buf()).or_default().push(item);
    }

    /// Live items created from `path`.
    pub fn items(&self, path: &Path, tree: &PublishTree) -> Vec<ItemId> {
        self.entries
            .get(path)
            .map(|ids| ids.iter().copied().filter(|id| tree.contains(*id)).collect())
            .unwrap_or_default()
    }

    pub fn is_collected(&self, path: &Path, tree: &PublishTree) -> bool {
        !self.items(path, tree).is_empty()
    }

    /// Forget removed items, and paths left with none.
    pub fn prune(&mut self, removed: &[ItemId]) {
        for ids in self.entries.values_mut() {
            ids.retain(|id| !removed.contains(id));
        }
        self.entries.retain(|_, ids| !ids.is_empty());
    }

    /// Paths that are currently collected.
    pub fn paths(&self, tree: &PublishTree) -> Vec<PathBuf> {
        self.entries
            .keys()
            .filter(|path| self.is_collected(path, tree))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dead_items_are_not_collected() {
        let mut tree = PublishTree::new();
        let root = tree.root();
        let a = tree.create_item(root, "file", "", "a").unwrap();
        let path = Path::new("/src/a.exr");

        let mut collected = CollectedFiles::new();
        collected.record(path, a);
        assert!(collected.is_collected(path, &tree));

        tree.remove_item(a).unwrap();
        assert!(!collected.is_collected(path, &tree));
        assert!(collected.paths(&tree).is_empty());
    }

    #[test]
    fn prune_drops_empty_paths() {
        let mut collected = CollectedFiles::new();
        let a = ItemId::new();
        collected.record(Path::new("/a"), a);
        collected.prune(&[a]);
        assert!(collected.entries.is_empty());
    }

    #[test]
    fn rebuild_from_properties() {
        let mut tree = PublishTree::new();
        let root = tree.root();
        let a = tree.create_item(root, "file", "", "a").unwrap();
        tree.set_property(a, COLLECTED_FILE_PATH, "/src/a.exr").unwrap();
        tree.create_item(root, "file", "", "b").unwrap();

        let collected = CollectedFiles::rebuild(&tree);
        assert_eq!(collected.paths(&tree), vec![PathBuf::from("/src/a.exr")]);
        assert_eq!(collected.items(Path::new("/src/a.exr"), &tree), vec![a]);
    }
}
