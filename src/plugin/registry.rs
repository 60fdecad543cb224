//! Registry of plugin instances keyed by id.

use std::sync::Arc;

use pubforge_common::{Error, Result};

use super::{Collector, ItemFilter, PostPhaseHook, PublishPlugin};
use crate::settings::{resolve, SettingValues, SettingsSchema};

/// A plugin instance tagged with the capability it is registered for.
#[derive(Clone)]
pub enum PluginCapability {
    Collector(Arc<dyn Collector>),
    Publisher(Arc<dyn PublishPlugin>),
    Hook(Arc<dyn PostPhaseHook>),
}

impl PluginCapability {
    pub fn kind(&self) -> &'static str {
        match self {
            PluginCapability::Collector(_) => "collector",
            PluginCapability::Publisher(_) => "publisher",
            PluginCapability::Hook(_) => "hook",
        }
    }

    pub fn name(&self) -> &str {
        match self {
            PluginCapability::Collector(c) => c.name(),
            PluginCapability::Publisher(p) => p.name(),
            PluginCapability::Hook(h) => h.name(),
        }
    }

    pub fn settings_schema(&self) -> SettingsSchema {
        match self {
            PluginCapability::Collector(c) => c.settings_schema(),
            PluginCapability::Publisher(p) => p.settings_schema(),
            PluginCapability::Hook(h) => h.settings_schema(),
        }
    }
}

/// One registry entry.
#[derive(Clone)]
pub struct RegisteredPlugin {
    id: String,
    capability: PluginCapability,
    schema: SettingsSchema,
    filter: Option<ItemFilter>,
    app_settings: SettingValues,
}

impl RegisteredPlugin {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn capability(&self) -> &PluginCapability {
        &self.capability
    }

    pub fn schema(&self) -> &SettingsSchema {
        &self.schema
    }

    /// App-level settings overrides for this plugin.
    pub fn app_settings(&self) -> &SettingValues {
        &self.app_settings
    }

    /// Whether a publisher's item filters match `type_spec`. Always false
    /// for other capabilities.
    pub fn matches(&self, type_spec: &str) -> bool {
        self.filter.as_ref().is_some_and(|f| f.is_match(type_spec))
    }
}

impl std::fmt::Debug for RegisteredPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredPlugin")
            .field("id", &self.id)
            .field("kind", &self.capability.kind())
            .field("name", &self.capability.name())
            .finish()
    }
}

/// Ordered set of registered plugins. Registration order is the order in
/// which collectors run and publishers are offered each item.
#[derive(Debug, Clone, Default)]
pub struct PluginRegistry {
    entries: Vec<RegisteredPlugin>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a plugin with its app-level settings overrides.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] for an empty or duplicate id or invalid item
    /// filters; [`Error::SchemaMismatch`] when an override is undeclared or
    /// mistyped.
    pub fn register(
        &mut self,
        id: impl Into<String>,
        capability: PluginCapability,
        app_settings: SettingValues,
    ) -> Result<&mut Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(Error::Config("plugin id cannot be empty".into()));
        }
        if self.get(&id).is_some() {
            return Err(Error::Config(format!("duplicate plugin id '{id}'")));
        }

        let schema = capability.settings_schema();
        resolve(&schema, &app_settings, &SettingValues::new())?;

        let filter = match capability {
            PluginCapability::Publisher(ref p) => Some(ItemFilter::new(p.item_filters())?),
            _ => None,
        };

        tracing::debug!(
            "Registered {} '{}' ({})",
            capability.kind(),
            id,
            capability.name()
        );
        self.entries.push(RegisteredPlugin {
            id,
            capability,
            schema,
            filter,
            app_settings,
        });
        Ok(self)
    }

    pub fn register_collector(
        &mut self,
        id: impl Into<String>,
        collector: Arc<dyn Collector>,
    ) -> Result<&mut Self> {
        self.register(id, PluginCapability::Collector(collector), SettingValues::new())
    }

    pub fn register_publisher(
        &mut self,
        id: impl Into<String>,
        plugin: Arc<dyn PublishPlugin>,
    ) -> Result<&mut Self> {
        self.register(id, PluginCapability::Publisher(plugin), SettingValues::new())
    }

    pub fn register_hook(
        &mut self,
        id: impl Into<String>,
        hook: Arc<dyn PostPhaseHook>,
    ) -> Result<&mut Self> {
        self.register(id, PluginCapability::Hook(hook), SettingValues::new())
    }

    pub fn get(&self, id: &str) -> Option<&RegisteredPlugin> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// Look up a publisher by id.
    pub fn publisher(&self, id: &str) -> Result<(&RegisteredPlugin, &Arc<dyn PublishPlugin>)> {
        match self.get(id) {
            Some(entry) => match entry.capability {
                PluginCapability::Publisher(ref plugin) => Ok((entry, plugin)),
                _ => Err(Error::PluginNotFound(format!("'{id}' is not a publish plugin"))),
            },
            None => Err(Error::PluginNotFound(id.to_string())),
        }
    }

    pub fn collectors(&self) -> impl Iterator<Item = (&RegisteredPlugin, &Arc<dyn Collector>)> {
        self.entries.iter().filter_map(|e| match e.capability {
            PluginCapability::Collector(ref c) => Some((e, c)),
            _ => None,
        })
    }

    pub fn publishers(
        &self,
    ) -> impl Iterator<Item = (&RegisteredPlugin, &Arc<dyn PublishPlugin>)> {
        self.entries.iter().filter_map(|e| match e.capability {
            PluginCapability::Publisher(ref p) => Some((e, p)),
            _ => None,
        })
    }

    pub fn hooks(&self) -> impl Iterator<Item = (&RegisteredPlugin, &Arc<dyn PostPhaseHook>)> {
        self.entries.iter().filter_map(|e| match e.capability {
            PluginCapability::Hook(ref h) => Some((e, h)),
            _ => None,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &RegisteredPlugin> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::builtin::{FileCollector, FilePublisher, SummaryHook};
    use assert_matches::assert_matches;
    use pubforge_common::Value;

    fn registry() -> PluginRegistry {
        let mut registry = PluginRegistry::new();
        registry
            .register_collector("files", Arc::new(FileCollector::default()))
            .unwrap()
            .register_publisher("publish", Arc::new(FilePublisher::default()))
            .unwrap()
            .register_hook("summary", Arc::new(SummaryHook::default()))
            .unwrap();
        registry
    }

    #[test]
    fn capabilities_are_partitioned() {
        let registry = registry();
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.collectors().count(), 1);
        assert_eq!(registry.publishers().count(), 1);
        assert_eq!(registry.hooks().count(), 1);
        assert_eq!(registry.get("summary").unwrap().capability().kind(), "hook");
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut registry = registry();
        let err = registry
            .register_hook("summary", Arc::new(SummaryHook::default()))
            .unwrap_err();
        assert_matches!(err, Error::Config(msg) if msg.contains("duplicate"));
    }

    #[test]
    fn publisher_lookup() {
        let registry = registry();
        assert!(registry.publisher("publish").is_ok());
        assert_matches!(registry.publisher("files").map(|_| ()), Err(Error::PluginNotFound(_)));
        assert_matches!(registry.publisher("nope").map(|_| ()), Err(Error::PluginNotFound(_)));
    }

    #[test]
    fn publisher_filters_are_compiled() {
        let registry = registry();
        let entry = registry.get("publish").unwrap();
        assert!(entry.matches("file.image"));
        assert!(!entry.matches("file.folder"));
        assert!(!registry.get("files").unwrap().matches("file.image"));
    }

    #[test]
    fn undeclared_app_override_is_rejected() {
        let mut registry = PluginRegistry::new();
        let overrides: SettingValues = [("bogus".to_string(), Value::Int(1))].into();
        let err = registry
            .register(
                "publish",
                PluginCapability::Publisher(Arc::new(FilePublisher::default())),
                overrides,
            )
            .unwrap_err();
        assert_matches!(err, Error::SchemaMismatch { .. });
        assert!(registry.is_empty());
    }
}
