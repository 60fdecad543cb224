//! Hook that saves the tree after validation, so the validated session can
//! be published later by another process.

use std::path::PathBuf;

use pubforge_common::{Result, Value};

use crate::logging::{LogAction, LogLevel};
use crate::plugin::{PluginContext, PostPhaseHook};
use crate::settings::{DataType, Settings, SettingsSchema};
use crate::tree::PublishTree;

#[derive(Debug, Clone)]
pub struct TreeSnapshotHook {
    name: String,
}

impl TreeSnapshotHook {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Default for TreeSnapshotHook {
    fn default() -> Self {
        Self::new("Tree Snapshot")
    }
}

impl PostPhaseHook for TreeSnapshotHook {
    fn name(&self) -> &str {
        &self.name
    }

    fn settings_schema(&self) -> SettingsSchema {
        SettingsSchema::new().with(
            "path",
            DataType::String,
            Value::Null,
            "Where to write the validated tree; `~` is expanded",
        )
    }

    fn post_validate(
        &self,
        ctx: &PluginContext<'_>,
        settings: &Settings,
        tree: &mut PublishTree,
    ) -> Result<()> {
        let Some(path) = settings.str("path") else {
            ctx.run.logger.warn(format!("{}: no path configured", self.name));
            return Ok(());
        };
        let path = PathBuf::from(shellexpand::tilde(path).as_ref());
        tree.save_file(&path)?;
        ctx.run.logger.log_with_action(
            LogLevel::Info,
            format!("Saved validated tree to {}", path.display()),
            LogAction::ShowFile { path },
        );
        Ok(())
    }
}
