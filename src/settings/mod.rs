//! Plugin settings: schema declarations and the three-level resolver.
//!
//! Every plugin declares a [`SettingsSchema`]. For one plugin/item pair the
//! concrete [`Settings`] are produced by [`resolve`], where the item-local
//! override beats the app-level override, which beats the schema default.

use pubforge_common::{Error, Result, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Raw override values keyed by setting name.
pub type SettingValues = BTreeMap<String, Value>;

/// Declared type of a setting.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DataType {
    String,
    Number,
    Boolean,
    List,
    /// Name of a path template; stored as a string.
    Template,
    /// Plugin-specific structured type. Any value is accepted; the plugin
    /// interprets it.
    Custom(String),
}

impl DataType {
    /// Whether `value` is acceptable for this type. `Null` means "unset" and
    /// is accepted everywhere.
    pub fn check(&self, value: &Value) -> bool {
        if value.is_null() {
            return true;
        }
        match self {
            DataType::String | DataType::Template => value.as_str().is_some(),
            DataType::Number => value.is_number(),
            DataType::Boolean => value.as_bool().is_some(),
            DataType::List => value.as_list().is_some(),
            DataType::Custom(_) => true,
        }
    }
}

impl TryFrom<String> for DataType {
    type Error = std::convert::Infallible;

    fn try_from(name: String) -> std::result::Result<Self, Self::Error> {
        Ok(match name.to_lowercase().as_str() {
            "str" | "string" => DataType::String,
            "int" | "float" | "number" => DataType::Number,
            "bool" | "boolean" => DataType::Boolean,
            "list" => DataType::List,
            "template" => DataType::Template,
            _ => DataType::Custom(name),
        })
    }
}

impl From<DataType> for String {
    fn from(data_type: DataType) -> Self {
        data_type.to_string()
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::String => f.write_str("string"),
            DataType::Number => f.write_str("number"),
            DataType::Boolean => f.write_str("bool"),
            DataType::List => f.write_str("list"),
            DataType::Template => f.write_str("template"),
            DataType::Custom(name) => f.write_str(name),
        }
    }
}

/// Declaration of one setting in a plugin schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingSpec {
    #[serde(rename = "type")]
    pub data_type: DataType,
    #[serde(default)]
    pub default: Value,
    #[serde(default)]
    pub description: Option<String>,
}

/// The settings a plugin declares, keyed by setting name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SettingsSchema(BTreeMap<String, SettingSpec>);

impl SettingsSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: declare a setting.
    pub fn with(
        mut self,
        name: impl Into<String>,
        data_type: DataType,
        default: impl Into<Value>,
        description: impl Into<String>,
    ) -> Self {
        self.0.insert(
            name.into(),
            SettingSpec {
                data_type,
                default: default.into(),
                description: Some(description.into()),
            },
        );
        self
    }

    pub fn get(&self, name: &str) -> Option<&SettingSpec> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &SettingSpec)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A resolved setting bound to a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginSetting {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: DataType,
    pub default_value: Value,
    #[serde(default)]
    pub description: Option<String>,
    pub value: Value,
}

impl PluginSetting {
    /// The value coerced to a string.
    pub fn string_value(&self) -> String {
        self.value.to_string()
    }
}

/// Resolved settings of one plugin for one item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Settings(BTreeMap<String, PluginSetting>);

impl Settings {
    pub fn get(&self, name: &str) -> Option<&PluginSetting> {
        self.0.get(name)
    }

    /// The resolved value of a setting, if declared.
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.0.get(name).map(|s| &s.value)
    }

    pub fn str(&self, name: &str) -> Option<&str> {
        self.value(name).and_then(Value::as_str)
    }

    pub fn i64(&self, name: &str) -> Option<i64> {
        self.value(name).and_then(Value::as_i64)
    }

    pub fn bool(&self, name: &str) -> Option<bool> {
        self.value(name).and_then(Value::as_bool)
    }

    /// Replace the value of a declared setting after type-checking it.
    pub fn set(&mut self, name: &str, value: Value) -> Result<()> {
        let setting = self
            .0
            .get_mut(name)
            .ok_or_else(|| Error::schema_mismatch(name, "setting is not declared"))?;
        if !setting.data_type.check(&value) {
            return Err(type_error(name, &setting.data_type, &value));
        }
        setting.value = value;
        Ok(())
    }

    /// Snapshot of the resolved values.
    pub fn values(&self) -> SettingValues {
        self.0
            .iter()
            .map(|(k, s)| (k.clone(), s.value.clone()))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &PluginSetting)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn type_error(name: &str, expected: &DataType, got: &Value) -> Error {
    Error::schema_mismatch(
        name,
        format!("expected {expected}, got {}", got.type_name()),
    )
}

fn check_overrides(schema: &SettingsSchema, overrides: &SettingValues, level: &str) -> Result<()> {
    for (name, value) in overrides {
        let spec = schema.get(name).ok_or_else(|| {
            Error::schema_mismatch(name, format!("{level} override is not declared in the schema"))
        })?;
        if !spec.data_type.check(value) {
            return Err(type_error(name, &spec.data_type, value));
        }
    }
    Ok(())
}

/// Resolve the settings of one plugin/item pair.
///
/// For every declared key the value is the item-local override if present,
/// else the app-level override, else the schema default.
///
/// # Errors
///
/// Returns [`Error::SchemaMismatch`] when an override key is undeclared or any
/// candidate value does not type-check against the declared type.
pub fn resolve(
    schema: &SettingsSchema,
    app_overrides: &SettingValues,
    local_overrides: &SettingValues,
) -> Result<Settings> {
    check_overrides(schema, app_overrides, "app")?;
    check_overrides(schema, local_overrides, "item")?;

    let mut resolved = BTreeMap::new();
    for (name, spec) in schema.iter() {
        if !spec.data_type.check(&spec.default) {
            return Err(type_error(name, &spec.data_type, &spec.default));
        }
        let value = local_overrides
            .get(name)
            .or_else(|| app_overrides.get(name))
            .unwrap_or(&spec.default)
            .clone();
        resolved.insert(
            name.clone(),
            PluginSetting {
                name: name.clone(),
                data_type: spec.data_type.clone(),
                default_value: spec.default.clone(),
                description: spec.description.clone(),
                value,
            },
        );
    }

    Ok(Settings(resolved))
}
