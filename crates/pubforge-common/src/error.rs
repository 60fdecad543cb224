//! Unified error type for the publish engine.
//!
//! Task-level variants ([`Error::Validation`], [`Error::Publish`],
//! [`Error::Finalize`]) are recorded against the failing task and never stop
//! a phase. [`Error::PhaseOrder`] signals caller misuse and is always fatal.

use std::fmt;

/// Unified error type covering every failure mode of the engine.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A setting override or default does not match the plugin's schema.
    #[error("Schema mismatch [{setting}]: {message}")]
    SchemaMismatch {
        /// The offending setting key.
        setting: String,
        /// Human-readable error description.
        message: String,
    },

    /// An item or task handle no longer refers to a live tree node.
    #[error("Invalid item: {0}")]
    InvalidItem(String),

    /// A context change was refused by an item that locks its context.
    #[error("Context change refused for '{item}': context is locked by '{locked_by}'")]
    ContextLocked {
        /// The item whose context was being changed.
        item: String,
        /// The item that disallows context changes.
        locked_by: String,
    },

    /// A collector failed on malformed or unreadable input.
    #[error("Collection error [{collector}]: {message}")]
    Collection {
        /// The collector that failed.
        collector: String,
        /// Human-readable error description.
        message: String,
    },

    /// A task did not pass validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A task's publish step failed.
    #[error("Publish failed [{task}]: {message}")]
    Publish {
        /// The failing task.
        task: String,
        /// Human-readable error description.
        message: String,
    },

    /// A task's finalize step failed. Logged, never escalated.
    #[error("Finalize failed [{task}]: {message}")]
    Finalize {
        /// The failing task.
        task: String,
        /// Human-readable error description.
        message: String,
    },

    /// A post-phase hook failed.
    #[error("Hook error [{hook}] during {phase}: {message}")]
    Hook {
        /// The hook that failed.
        hook: String,
        /// The phase the hook ran after.
        phase: String,
        /// Human-readable error description.
        message: String,
    },

    /// A phase was driven out of order (caller contract violation).
    #[error("Phase order violation: {0}")]
    PhaseOrder(String),

    /// A task references a plugin id that is not registered.
    #[error("Plugin not registered: {0}")]
    PluginNotFound(String),

    /// A value has a shape that persistence reserves for blob references.
    #[error("Reserved value [{name}]: a mapping holding only a \"$blob\" string is reserved for blob references")]
    ReservedValue {
        /// The property or setting being written.
        name: String,
    },

    /// The persisted tree could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The registration sink rejected a record.
    #[error("Registration error: {0}")]
    Registration(String),

    /// Invalid engine or plugin configuration.
    #[error("Config error: {0}")]
    Config(String),

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },
}

impl Error {
    /// Convenience constructor for [`Error::SchemaMismatch`].
    pub fn schema_mismatch(setting: impl Into<String>, message: impl Into<String>) -> Self {
        Error::SchemaMismatch {
            setting: setting.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::InvalidItem`].
    pub fn invalid_item(id: impl fmt::Display) -> Self {
        Error::InvalidItem(format!("{id} is not part of the publish tree"))
    }

    /// Convenience constructor for [`Error::Collection`].
    pub fn collection(collector: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Collection {
            collector: collector.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::Validation`].
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation(message.into())
    }

    /// Convenience constructor for [`Error::Publish`].
    pub fn publish(task: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Publish {
            task: task.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::Hook`].
    pub fn hook(
        hook: impl Into<String>,
        phase: impl fmt::Display,
        message: impl Into<String>,
    ) -> Self {
        Error::Hook {
            hook: hook.into(),
            phase: phase.to_string(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::PhaseOrder`].
    pub fn phase_order(message: impl Into<String>) -> Self {
        Error::PhaseOrder(message.into())
    }

    /// Convenience constructor for [`Error::ReservedValue`].
    pub fn reserved_value(name: impl Into<String>) -> Self {
        Error::ReservedValue { name: name.into() }
    }

    /// Whether this error belongs to the invalid-item class (dead handles and
    /// refused context changes).
    pub fn is_invalid_item(&self) -> bool {
        matches!(self, Error::InvalidItem(_) | Error::ContextLocked { .. })
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
