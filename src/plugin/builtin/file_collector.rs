//! Collector for files and folders on disk.

use std::path::Path;

use pubforge_common::paths::{classify, extension, FileKind};
use pubforge_common::{Error, ItemId, Result};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::plugin::{Collector, PluginContext};
use crate::settings::{DataType, Settings, SettingsSchema};
use crate::tree::ItemMut;

/// Type spec of a collected directory.
pub const FOLDER_TYPE: &str = "file.folder";

/// Turns each path into an item classified by extension. A directory
/// becomes a `file.folder` item with one child per contained file.
#[derive(Debug, Clone)]
pub struct FileCollector {
    name: String,
}

impl FileCollector {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    fn add_file(&self, parent: &mut ItemMut<'_>, path: &Path) -> Result<ItemId> {
        let kind = classify(path);
        let name = file_name(path);
        let id = parent.create_item(kind.type_spec(), kind.display(), &name)?;

        let mut item = parent.child(id)?;
        item.set_property("path", path)?;
        if let Some(ext) = extension(path) {
            item.set_property("extension", ext)?;
        }
        if kind == FileKind::Image {
            item.item_mut()?.thumbnail_path = Some(path.to_path_buf());
        }
        debug!("Collected {} '{}'", kind, name);
        Ok(id)
    }

    fn add_folder(&self, settings: &Settings, parent: &mut ItemMut<'_>, path: &Path) -> Result<()> {
        let skip_hidden = settings.bool("skip_hidden").unwrap_or(true);
        let folder = parent.create_item(FOLDER_TYPE, "Folder", &file_name(path))?;

        let walked = self.add_folder_entries(&mut parent.child(folder)?, path, skip_hidden);
        match walked {
            Ok(count) => {
                info!("Collected folder {:?} with {} file(s)", path, count);
                Ok(())
            }
            Err(e) => {
                // A half-walked folder is dropped whole.
                parent.tree_mut().remove_item(folder)?;
                warn!("Discarded folder {:?} after a failed walk: {}", path, e);
                Err(e)
            }
        }
    }

    fn add_folder_entries(
        &self,
        folder: &mut ItemMut<'_>,
        path: &Path,
        skip_hidden: bool,
    ) -> Result<usize> {
        folder.set_property("path", path)?;

        let mut count = 0;
        for entry in WalkDir::new(path)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|e| Error::collection(&self.name, e.to_string()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            if skip_hidden && entry.file_name().to_string_lossy().starts_with('.') {
                continue;
            }
            self.add_file(folder, entry.path())?;
            count += 1;
        }
        Ok(count)
    }
}

impl Default for FileCollector {
    fn default() -> Self {
        Self::new("File Collector")
    }
}

impl Collector for FileCollector {
    fn name(&self) -> &str {
        &self.name
    }

    fn settings_schema(&self) -> SettingsSchema {
        SettingsSchema::new().with(
            "skip_hidden",
            DataType::Boolean,
            true,
            "Ignore dot-files when collecting a folder",
        )
    }

    fn process_file(
        &self,
        _ctx: &PluginContext<'_>,
        settings: &Settings,
        parent: &mut ItemMut<'_>,
        path: &Path,
    ) -> Result<()> {
        if path.is_dir() {
            self.add_folder(settings, parent, path)
        } else if path.is_file() {
            self.add_file(parent, path).map(|_| ())
        } else {
            Err(Error::collection(
                &self.name,
                format!("path does not exist or is not readable: {}", path.display()),
            ))
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}
