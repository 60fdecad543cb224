//! Publisher that registers collected files with the run's sink.

use std::path::PathBuf;

use pubforge_common::{Error, Result, Value};

use crate::logging::{LogAction, LogLevel};
use crate::plugin::{AcceptVerdict, PluginContext, PublishPlugin};
use crate::registration::{PublishRecord, RegisteredArtifact};
use crate::settings::{DataType, Settings, SettingsSchema};
use crate::tree::ItemMut;

/// Property under which the registered artifact is stored.
pub const PUBLISH_DATA: &str = "publish_data";

/// Registers every collected file as a catalog record.
#[derive(Debug, Clone)]
pub struct FilePublisher {
    name: String,
}

impl FilePublisher {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Default for FilePublisher {
    fn default() -> Self {
        Self::new("Publish to Catalog")
    }
}

fn source_path(item: &ItemMut<'_>) -> Result<Option<PathBuf>> {
    Ok(item
        .get_property("path", Value::Null)?
        .as_str()
        .map(PathBuf::from))
}

fn previous_artifact(item: &ItemMut<'_>) -> Result<Option<RegisteredArtifact>> {
    let value = item.get_property(PUBLISH_DATA, Value::Null)?;
    if value.is_null() {
        return Ok(None);
    }
    Ok(serde_json::from_value(serde_json::Value::from(value)).ok())
}

impl PublishPlugin for FilePublisher {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Registers the file with the catalog as a new version."
    }

    fn item_filters(&self) -> Vec<String> {
        [
            "file",
            "file.image*",
            "file.video*",
            "file.audio*",
            "file.geometry*",
            "file.document*",
            "file.text*",
        ]
        .into_iter()
        .map(String::from)
        .collect()
    }

    fn settings_schema(&self) -> SettingsSchema {
        SettingsSchema::new()
            .with(
                "publish_type",
                DataType::String,
                Value::Null,
                "Catalog type of the record; defaults to the item's type label",
            )
            .with("version", DataType::Number, 1, "Version number to register")
            .with(
                "dependencies",
                DataType::List,
                Vec::<Value>::new(),
                "Paths this publish depends on",
            )
            .with(
                "publish_template",
                DataType::Template,
                Value::Null,
                "Path template for the published file",
            )
    }

    fn accept(
        &self,
        _ctx: &PluginContext<'_>,
        _settings: &Settings,
        item: &mut ItemMut<'_>,
    ) -> Result<AcceptVerdict> {
        if source_path(item)?.is_none() {
            return Ok(AcceptVerdict::reject());
        }
        Ok(AcceptVerdict::accept())
    }

    fn validate(
        &self,
        ctx: &PluginContext<'_>,
        settings: &Settings,
        item: &mut ItemMut<'_>,
    ) -> Result<bool> {
        let path = source_path(item)?
            .ok_or_else(|| Error::validation("item has no 'path' property"))?;
        if !path.exists() {
            return Err(Error::validation(format!(
                "source file does not exist: {}",
                path.display()
            )));
        }
        if settings.str("publish_template").is_some_and(str::is_empty) {
            return Err(Error::validation("publish_template is set but empty"));
        }
        if !matches!(settings.i64("version"), Some(v) if v >= 1) {
            ctx.run.logger.error(format!(
                "{}: version must be a positive integer",
                item.item()?.name
            ));
            return Ok(false);
        }
        Ok(true)
    }

    fn publish(
        &self,
        ctx: &PluginContext<'_>,
        settings: &Settings,
        item: &mut ItemMut<'_>,
    ) -> Result<()> {
        let path = source_path(item)?
            .ok_or_else(|| Error::publish(&self.name, "item has no 'path' property"))?;
        let version = settings.i64("version").unwrap_or(1);

        if let Some(previous) = previous_artifact(item)? {
            if previous.record.path == path && previous.record.version == version {
                ctx.run.logger.info(format!(
                    "{} v{} is already registered; skipping",
                    previous.record.name, version
                ));
                return Ok(());
            }
        }

        let current = item.item()?;
        let record = PublishRecord {
            name: current.name.clone(),
            version,
            path,
            publish_type: settings
                .str("publish_type")
                .unwrap_or(current.type_display())
                .to_string(),
            thumbnail: current
                .thumbnail_path
                .clone()
                .filter(|_| current.thumbnail_enabled),
            dependencies: settings
                .value("dependencies")
                .and_then(Value::as_list)
                .unwrap_or_default()
                .iter()
                .filter_map(Value::as_str)
                .map(PathBuf::from)
                .collect(),
            context: ctx.context.clone(),
        };

        if ctx.run.dry_run {
            ctx.run.logger.info(format!(
                "Dry run: would register {} v{} ({})",
                record.name, record.version, record.publish_type
            ));
            return Ok(());
        }

        let artifact = ctx.run.sink.register(&record)?;
        item.set_property(PUBLISH_DATA, Value::from(serde_json::to_value(&artifact)?))?;
        ctx.run.logger.info(format!(
            "Registered {} v{} as {}",
            artifact.record.name, artifact.record.version, artifact.id
        ));
        Ok(())
    }

    fn finalize(
        &self,
        ctx: &PluginContext<'_>,
        _settings: &Settings,
        item: &mut ItemMut<'_>,
    ) -> Result<()> {
        let previous = previous_artifact(item)?;
        if previous.is_none() && ctx.run.dry_run {
            return Ok(());
        }
        let artifact = previous.ok_or_else(|| Error::Finalize {
            task: self.name.clone(),
            message: format!("no {PUBLISH_DATA} recorded on '{}'", item.id()),
        })?;
        ctx.run.logger.log_with_action(
            LogLevel::Info,
            format!(
                "Publish complete: {} v{}",
                artifact.record.name, artifact.record.version
            ),
            LogAction::ShowFile {
                path: artifact.record.path.clone(),
            },
        );
        Ok(())
    }
}
