//! Plugin capability contracts.
//!
//! A plugin is registered under one of three capabilities:
//!
//! - [`Collector`]: populates the tree from the current session or from files
//! - [`PublishPlugin`]: accepts items, then validates, publishes and
//!   finalizes them
//! - [`PostPhaseHook`]: runs once after each phase's task calls
//!
//! Every call receives a [`PluginContext`] scoped to the manager run, the
//! plugin's resolved [`Settings`], and for item-level calls an [`ItemMut`]
//! view of the item being processed.

pub mod builtin;
pub mod factory;
mod filters;
mod registry;

use std::path::Path;

use pubforge_common::{Result, TaskId};

use crate::context::{Context, RunContext};
use crate::settings::{SettingValues, Settings, SettingsSchema};
use crate::tree::{ItemMut, PublishTree, DEFAULT_DESCRIPTION};

pub use filters::ItemFilter;
pub use registry::{PluginCapability, PluginRegistry, RegisteredPlugin};

/// Opaque settings snapshot exchanged with an external settings editor.
pub type UiSettings = SettingValues;

/// Per-call context handed to plugins.
#[derive(Debug, Clone, Copy)]
pub struct PluginContext<'a> {
    /// State shared by the whole manager run.
    pub run: &'a RunContext,
    /// Effective context of the item being processed (the root context for
    /// collectors and hooks).
    pub context: &'a Context,
    /// Registry id of the plugin being called.
    pub plugin_id: &'a str,
    /// Task being executed, for validate/publish/finalize calls.
    pub task: Option<TaskId>,
}

impl<'a> PluginContext<'a> {
    pub fn new(run: &'a RunContext, context: &'a Context, plugin_id: &'a str) -> Self {
        Self {
            run,
            context,
            plugin_id,
            task: None,
        }
    }

    pub fn with_task(mut self, task: TaskId) -> Self {
        self.task = Some(task);
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.run.cancellation.is_cancelled()
    }
}

/// Result of [`PublishPlugin::accept`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcceptVerdict {
    pub accepted: bool,
    /// Initial checked state of the created task.
    pub checked: bool,
    /// Whether the user may toggle the task.
    pub enabled: bool,
    pub visible: bool,
    /// Acceptance strength; higher scores sort first on the item.
    pub score: i32,
}

impl AcceptVerdict {
    /// Accept with default flags.
    pub fn accept() -> Self {
        Self {
            accepted: true,
            checked: true,
            enabled: true,
            visible: true,
            score: 0,
        }
    }

    pub fn reject() -> Self {
        Self {
            accepted: false,
            ..Self::accept()
        }
    }

    pub fn with_score(mut self, score: i32) -> Self {
        self.score = score;
        self
    }

    pub fn unchecked(mut self) -> Self {
        self.checked = false;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }
}

/// Populates the tree.
pub trait Collector: Send + Sync {
    /// Display name.
    fn name(&self) -> &str;

    fn settings_schema(&self) -> SettingsSchema {
        SettingsSchema::new()
    }

    /// Collect items from the running session under `parent`.
    fn process_current_session(
        &self,
        _ctx: &PluginContext<'_>,
        _settings: &Settings,
        _parent: &mut ItemMut<'_>,
    ) -> Result<()> {
        Ok(())
    }

    /// Collect items for one file or directory under `parent`.
    ///
    /// Finding nothing is not an error. Unreadable or malformed input fails
    /// with [`pubforge_common::Error::Collection`].
    fn process_file(
        &self,
        _ctx: &PluginContext<'_>,
        _settings: &Settings,
        _parent: &mut ItemMut<'_>,
        _path: &Path,
    ) -> Result<()> {
        Ok(())
    }
}

/// Acts on the items it accepts.
pub trait PublishPlugin: Send + Sync {
    /// Display name; becomes the name of created tasks.
    fn name(&self) -> &str;

    fn description(&self) -> &str {
        DEFAULT_DESCRIPTION
    }

    /// Glob patterns matched against item type specs.
    fn item_filters(&self) -> Vec<String>;

    fn settings_schema(&self) -> SettingsSchema {
        SettingsSchema::new()
    }

    /// Decide whether to attach a task to `item`.
    fn accept(
        &self,
        ctx: &PluginContext<'_>,
        settings: &Settings,
        item: &mut ItemMut<'_>,
    ) -> Result<AcceptVerdict>;

    /// Check that the item can be published. `Ok(false)` blocks this task.
    fn validate(
        &self,
        ctx: &PluginContext<'_>,
        settings: &Settings,
        item: &mut ItemMut<'_>,
    ) -> Result<bool>;

    /// Perform the publish. May run again after a re-validate.
    fn publish(
        &self,
        ctx: &PluginContext<'_>,
        settings: &Settings,
        item: &mut ItemMut<'_>,
    ) -> Result<()>;

    /// Post-publish work. Errors are logged and never escalated.
    fn finalize(
        &self,
        _ctx: &PluginContext<'_>,
        _settings: &Settings,
        _item: &mut ItemMut<'_>,
    ) -> Result<()> {
        Ok(())
    }

    /// Snapshot of the settings for an external editor.
    fn get_ui_settings(&self, settings: &Settings) -> UiSettings {
        settings.values()
    }

    /// Apply an editor snapshot back onto the settings.
    fn set_ui_settings(&self, settings: &mut Settings, ui: &UiSettings) -> Result<()> {
        for (name, value) in ui {
            settings.set(name, value.clone())?;
        }
        Ok(())
    }
}

/// Runs once after each phase's task calls.
pub trait PostPhaseHook: Send + Sync {
    fn name(&self) -> &str;

    fn settings_schema(&self) -> SettingsSchema {
        SettingsSchema::new()
    }

    fn post_validate(
        &self,
        _ctx: &PluginContext<'_>,
        _settings: &Settings,
        _tree: &mut PublishTree,
    ) -> Result<()> {
        Ok(())
    }

    fn post_publish(
        &self,
        _ctx: &PluginContext<'_>,
        _settings: &Settings,
        _tree: &mut PublishTree,
    ) -> Result<()> {
        Ok(())
    }

    fn post_finalize(
        &self,
        _ctx: &PluginContext<'_>,
        _settings: &Settings,
        _tree: &mut PublishTree,
    ) -> Result<()> {
        Ok(())
    }
}
