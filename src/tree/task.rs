//! Tasks: one plugin bound to one item.

use std::fmt;

use pubforge_common::{ItemId, TaskId};
use serde::{Deserialize, Serialize};

use crate::settings::Settings;

/// Description used when a plugin does not provide one.
pub const DEFAULT_DESCRIPTION: &str = "No detailed description provided.";

/// Phase state of a task.
///
/// `Pending` is the state of a freshly accepted task. `ValidationFailed`
/// may be re-validated; `PublishFailed` is terminal and skipped by finalize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    #[default]
    Pending,
    Validated,
    ValidationFailed,
    Published,
    PublishFailed,
    Finalized,
}

impl TaskState {
    pub const ALL: [TaskState; 6] = [
        TaskState::Pending,
        TaskState::Validated,
        TaskState::ValidationFailed,
        TaskState::Published,
        TaskState::PublishFailed,
        TaskState::Finalized,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TaskState::Pending => "pending",
            TaskState::Validated => "validated",
            TaskState::ValidationFailed => "validation_failed",
            TaskState::Published => "published",
            TaskState::PublishFailed => "publish_failed",
            TaskState::Finalized => "finalized",
        }
    }

    /// Whether the publish phase may run a task in this state.
    pub fn can_publish(self) -> bool {
        self == TaskState::Validated
    }

    /// Whether the finalize phase accepts a task in this state.
    pub fn can_finalize(self) -> bool {
        matches!(self, TaskState::Published | TaskState::PublishFailed)
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A plugin instance bound to an item, with its resolved settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishTask {
    pub(super) id: TaskId,
    #[serde(skip)]
    pub(super) item: ItemId,
    pub(super) plugin_id: String,
    pub name: String,
    pub description: String,
    pub settings: Settings,
    pub checked: bool,
    pub enabled: bool,
    pub visible: bool,
    pub score: i32,
    pub state: TaskState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finalize_error: Option<String>,
}

impl PublishTask {
    /// Create a pending task for `plugin_id` on `item`.
    pub fn new(
        item: ItemId,
        plugin_id: impl Into<String>,
        name: impl Into<String>,
        settings: Settings,
    ) -> Self {
        Self {
            id: TaskId::new(),
            item,
            plugin_id: plugin_id.into(),
            name: name.into(),
            description: DEFAULT_DESCRIPTION.to_string(),
            settings,
            checked: true,
            enabled: true,
            visible: true,
            score: 0,
            state: TaskState::Pending,
            last_error: None,
            finalize_error: None,
        }
    }

    /// Builder: set the description. Empty descriptions fall back to the
    /// default text.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        let description = description.into();
        self.description = if description.is_empty() {
            DEFAULT_DESCRIPTION.to_string()
        } else {
            description
        };
        self
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    /// The item this task belongs to.
    pub fn item(&self) -> ItemId {
        self.item
    }

    /// Registry id of the plugin that runs this task.
    pub fn plugin_id(&self) -> &str {
        &self.plugin_id
    }

    pub fn active(&self) -> bool {
        self.checked && self.enabled
    }
}
