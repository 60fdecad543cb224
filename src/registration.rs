//! Registration sinks: where publish plugins record finished artifacts.
//!
//! The engine never talks to a catalog directly. A publish plugin builds a
//! [`PublishRecord`] and hands it to the run's [`RegistrationSink`], which
//! returns the [`RegisteredArtifact`] the plugin stores on its item.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use pubforge_common::{Error, RecordId, Result};
use serde::{Deserialize, Serialize};

use crate::context::Context;

/// One artifact to register.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishRecord {
    pub name: String,
    pub version: i64,
    pub path: PathBuf,
    pub publish_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<PathBuf>,
    #[serde(default)]
    pub context: Context,
}

/// A record accepted by a sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisteredArtifact {
    pub id: RecordId,
    pub registered_at: DateTime<Utc>,
    #[serde(flatten)]
    pub record: PublishRecord,
}

impl RegisteredArtifact {
    fn new(record: &PublishRecord) -> Self {
        Self {
            id: RecordId::new(),
            registered_at: Utc::now(),
            record: record.clone(),
        }
    }
}

/// Destination for publish records.
pub trait RegistrationSink: Send + Sync {
    /// Register one record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Registration`] when the record is rejected, or
    /// [`Error::Io`] when the backing store cannot be written.
    fn register(&self, record: &PublishRecord) -> Result<RegisteredArtifact>;
}

/// Appends one JSON line per registered artifact to a file.
#[derive(Debug)]
pub struct JsonlCatalog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonlCatalog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every artifact registered so far. A missing file reads as empty.
    pub fn read_all(&self) -> Result<Vec<RegisteredArtifact>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(Error::from))
            .collect()
    }
}

impl RegistrationSink for JsonlCatalog {
    fn register(&self, record: &PublishRecord) -> Result<RegisteredArtifact> {
        if record.name.is_empty() {
            return Err(Error::Registration("record has no name".into()));
        }
        let artifact = RegisteredArtifact::new(record);
        let line = serde_json::to_string(&artifact)?;

        let _guard = self.lock.lock();
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{line}")?;

        tracing::debug!(
            "Registered {} v{} in {:?}",
            artifact.record.name,
            artifact.record.version,
            self.path
        );
        Ok(artifact)
    }
}

/// In-process sink, used for dry runs and tests.
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    records: Mutex<Vec<RegisteredArtifact>>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the registered artifacts, in registration order.
    pub fn records(&self) -> Vec<RegisteredArtifact> {
        self.records.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl RegistrationSink for MemoryCatalog {
    fn register(&self, record: &PublishRecord) -> Result<RegisteredArtifact> {
        if record.name.is_empty() {
            return Err(Error::Registration("record has no name".into()));
        }
        let artifact = RegisteredArtifact::new(record);
        self.records.lock().push(artifact.clone());
        Ok(artifact)
    }
}
