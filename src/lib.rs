//! Pubforge - hierarchical publish-pipeline orchestration
//!
//! Collectors populate a [`PublishTree`] of items; publish plugins attach
//! tasks to the items they accept; the [`PublishManager`] then drives every
//! task through validate, publish and finalize.

pub mod config;
pub mod context;
pub mod logging;
pub mod manager;
pub mod plugin;
pub mod registration;
pub mod settings;
pub mod tree;

pub use context::{Context, RunContext};
pub use manager::{AcceptancePolicy, PublishManager};
pub use pubforge_common::{Error, ItemId, Result, TaskId, Value};
pub use tree::{PublishItem, PublishTask, PublishTree, TaskState};
