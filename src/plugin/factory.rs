//! Build a [`PluginRegistry`] from configuration entries.

use std::sync::Arc;

use pubforge_common::{Error, Result};

use super::builtin::{FileCollector, FilePublisher, SummaryHook, TreeSnapshotHook};
use super::{PluginCapability, PluginRegistry};
use crate::config::{Config, PluginConfig, PluginKind};

/// Register every configured collector, publisher and hook, in order.
///
/// # Errors
///
/// [`Error::Config`] when an entry's kind does not provide the capability
/// of the section it is listed in, or for a bad id; [`Error::SchemaMismatch`]
/// when its settings overrides do not fit the plugin's schema.
pub fn build_registry(config: &Config) -> Result<PluginRegistry> {
    let mut registry = PluginRegistry::new();

    for entry in &config.collectors {
        let capability = match entry.kind {
            PluginKind::File => PluginCapability::Collector(Arc::new(
                entry
                    .name
                    .clone()
                    .map_or_else(FileCollector::default, FileCollector::new),
            )),
            _ => return Err(wrong_section(entry, "collector")),
        };
        registry.register(&entry.id, capability, entry.settings.clone())?;
    }

    for entry in &config.plugins {
        let capability = match entry.kind {
            PluginKind::FilePublisher => PluginCapability::Publisher(Arc::new(
                entry
                    .name
                    .clone()
                    .map_or_else(FilePublisher::default, FilePublisher::new),
            )),
            _ => return Err(wrong_section(entry, "publish plugin")),
        };
        registry.register(&entry.id, capability, entry.settings.clone())?;
    }

    for entry in &config.hooks {
        let capability = match entry.kind {
            PluginKind::TreeSnapshot => PluginCapability::Hook(Arc::new(
                entry
                    .name
                    .clone()
                    .map_or_else(TreeSnapshotHook::default, TreeSnapshotHook::new),
            )),
            PluginKind::Summary => PluginCapability::Hook(Arc::new(
                entry
                    .name
                    .clone()
                    .map_or_else(SummaryHook::default, SummaryHook::new),
            )),
            _ => return Err(wrong_section(entry, "hook")),
        };
        registry.register(&entry.id, capability, entry.settings.clone())?;
    }

    tracing::debug!("Built plugin registry with {} plugin(s)", registry.len());
    Ok(registry)
}

fn wrong_section(entry: &PluginConfig, expected: &str) -> Error {
    Error::Config(format!(
        "plugin '{}' has kind '{}', which is not a {expected}",
        entry.id, entry.kind
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use pubforge_common::Value;

    #[test]
    fn default_config_builds() {
        let registry = build_registry(&Config::default()).unwrap();
        assert_eq!(registry.collectors().count(), 1);
        assert_eq!(registry.publishers().count(), 1);
        assert_eq!(registry.hooks().count(), 1);
        assert!(registry.get("publish_files").is_some());
    }

    #[test]
    fn name_override_is_applied() {
        let mut config = Config::default();
        config.plugins[0].name = Some("Publish Plates".into());
        let registry = build_registry(&config).unwrap();
        assert_eq!(
            registry.get("publish_files").unwrap().capability().name(),
            "Publish Plates"
        );
    }

    #[test]
    fn kind_in_wrong_section() {
        let mut config = Config::default();
        config.hooks.push(PluginConfig::new("oops", PluginKind::File));
        let err = build_registry(&config).unwrap_err();
        assert_matches!(err, Error::Config(ref msg) if msg.contains("not a hook"));
    }

    #[test]
    fn unknown_override_is_reported() {
        let mut config = Config::default();
        config.plugins[0]
            .settings
            .insert("frame_rate".into(), Value::Int(24));
        assert_matches!(build_registry(&config), Err(Error::SchemaMismatch { .. }));
    }

    #[test]
    fn mistyped_override_is_reported() {
        let mut config = Config::default();
        config.plugins[0]
            .settings
            .insert("version".into(), Value::String("two".into()));
        assert_matches!(build_registry(&config), Err(Error::SchemaMismatch { .. }));
    }
}
