//! Shared fixtures for integration tests.
//!
//! [`RecordingPublisher`] and [`RecordingHook`] log every call into a shared
//! [`CallLog`] so tests can assert on order as well as outcome.

#![allow(dead_code)]

use std::sync::Arc;

use parking_lot::Mutex;

use pubforge::context::{Context, RunContext};
use pubforge::manager::PublishManager;
use pubforge::plugin::{AcceptVerdict, PluginContext, PluginRegistry, PostPhaseHook, PublishPlugin};
use pubforge::registration::MemoryCatalog;
use pubforge::settings::{DataType, Settings, SettingsSchema};
use pubforge::tree::{ItemMut, PublishTree};
use pubforge::{Error, ItemId, Result};

/// Type spec used for hand-built test items.
pub const THING: &str = "test.thing";

/// `"<phase>:<item name>"` entries in call order.
pub type CallLog = Arc<Mutex<Vec<String>>>;

pub fn call_log() -> CallLog {
    Arc::new(Mutex::new(Vec::new()))
}

/// Publisher that records its calls and fails on demand.
pub struct RecordingPublisher {
    pub name: String,
    pub filters: Vec<String>,
    pub score: i32,
    pub calls: CallLog,
    /// Items whose validation returns `Ok(false)`.
    pub reject_validation: Vec<String>,
    /// Items whose publish returns an error.
    pub fail_publish: Vec<String>,
    /// Items whose finalize returns an error.
    pub fail_finalize: Vec<String>,
    /// Cancel the run while validating this item.
    pub cancel_on: Option<String>,
}

impl RecordingPublisher {
    pub fn new(calls: &CallLog) -> Self {
        Self {
            name: "Recording Publisher".into(),
            filters: vec!["test.*".into()],
            score: 0,
            calls: calls.clone(),
            reject_validation: Vec::new(),
            fail_publish: Vec::new(),
            fail_finalize: Vec::new(),
            cancel_on: None,
        }
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_score(mut self, score: i32) -> Self {
        self.score = score;
        self
    }

    fn record(&self, phase: &str, item: &ItemMut<'_>) -> Result<String> {
        let name = item.item()?.name.clone();
        self.calls.lock().push(format!("{phase}:{name}"));
        Ok(name)
    }
}

impl PublishPlugin for RecordingPublisher {
    fn name(&self) -> &str {
        &self.name
    }

    fn item_filters(&self) -> Vec<String> {
        self.filters.clone()
    }

    fn settings_schema(&self) -> SettingsSchema {
        SettingsSchema::new().with("label", DataType::String, "default", "free text")
    }

    fn accept(
        &self,
        _ctx: &PluginContext<'_>,
        _settings: &Settings,
        _item: &mut ItemMut<'_>,
    ) -> Result<AcceptVerdict> {
        Ok(AcceptVerdict::accept().with_score(self.score))
    }

    fn validate(
        &self,
        ctx: &PluginContext<'_>,
        _settings: &Settings,
        item: &mut ItemMut<'_>,
    ) -> Result<bool> {
        let name = self.record("validate", item)?;
        if self.cancel_on.as_deref() == Some(name.as_str()) {
            ctx.run.cancellation.cancel();
        }
        Ok(!self.reject_validation.contains(&name))
    }

    fn publish(
        &self,
        _ctx: &PluginContext<'_>,
        _settings: &Settings,
        item: &mut ItemMut<'_>,
    ) -> Result<()> {
        let name = self.record("publish", item)?;
        if self.fail_publish.contains(&name) {
            return Err(Error::publish(&self.name, format!("cannot publish {name}")));
        }
        Ok(())
    }

    fn finalize(
        &self,
        _ctx: &PluginContext<'_>,
        _settings: &Settings,
        item: &mut ItemMut<'_>,
    ) -> Result<()> {
        let name = self.record("finalize", item)?;
        if self.fail_finalize.contains(&name) {
            return Err(Error::Finalize {
                task: self.name.clone(),
                message: format!("cleanup failed for {name}"),
            });
        }
        Ok(())
    }
}

/// Hook that records `"hook:<name>:<phase>"` and optionally fails.
pub struct RecordingHook {
    pub name: String,
    pub calls: CallLog,
    pub fail: bool,
}

impl RecordingHook {
    pub fn new(name: &str, calls: &CallLog) -> Self {
        Self {
            name: name.into(),
            calls: calls.clone(),
            fail: false,
        }
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    fn record(&self, phase: &str) -> Result<()> {
        self.calls.lock().push(format!("hook:{}:{phase}", self.name));
        if self.fail {
            return Err(Error::Config(format!("{} refused {phase}", self.name)));
        }
        Ok(())
    }
}

impl PostPhaseHook for RecordingHook {
    fn name(&self) -> &str {
        &self.name
    }

    fn post_validate(
        &self,
        _ctx: &PluginContext<'_>,
        _settings: &Settings,
        _tree: &mut PublishTree,
    ) -> Result<()> {
        self.record("validate")
    }

    fn post_publish(
        &self,
        _ctx: &PluginContext<'_>,
        _settings: &Settings,
        _tree: &mut PublishTree,
    ) -> Result<()> {
        self.record("publish")
    }

    fn post_finalize(
        &self,
        _ctx: &PluginContext<'_>,
        _settings: &Settings,
        _tree: &mut PublishTree,
    ) -> Result<()> {
        self.record("finalize")
    }
}

/// Manager over an in-memory catalog.
pub fn manager(registry: PluginRegistry) -> (PublishManager, Arc<MemoryCatalog>) {
    let catalog = Arc::new(MemoryCatalog::new());
    let run = RunContext::new(Context::project("demo"), catalog.clone());
    (PublishManager::new(registry, run), catalog)
}

/// Registry holding one recording publisher under id `rec`.
pub fn registry_with(publisher: RecordingPublisher) -> PluginRegistry {
    let mut registry = PluginRegistry::new();
    registry
        .register_publisher("rec", Arc::new(publisher))
        .unwrap();
    registry
}

/// Add top-level items named `names` and attach tasks to each.
pub fn add_items(manager: &mut PublishManager, names: &[&str]) -> Vec<ItemId> {
    let root = manager.tree().root();
    names
        .iter()
        .map(|name| {
            let id = manager
                .tree_mut()
                .create_item(root, THING, "", name)
                .unwrap();
            manager.reattach_tasks(id).unwrap();
            id
        })
        .collect()
}

pub fn calls(log: &CallLog) -> Vec<String> {
    log.lock().clone()
}
