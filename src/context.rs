//! Execution context values.
//!
//! [`Context`] is the opaque "where does this publish belong" value attached
//! to items. [`RunContext`] carries everything a plugin call may need for the
//! duration of one manager run, replacing any process-wide engine state.

use std::fmt;
use std::sync::Arc;

use pubforge_common::RunId;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::logging::PublishLogger;
use crate::registration::{MemoryCatalog, RegistrationSink};

/// Execution context of an item: which project/entity/step/task it is
/// published against, and by whom.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct Context {
    pub project: Option<String>,
    pub entity: Option<String>,
    pub step: Option<String>,
    pub task: Option<String>,
    pub user: Option<String>,
}

impl Context {
    /// Context scoped to a project only.
    pub fn project(name: impl Into<String>) -> Self {
        Self {
            project: Some(name.into()),
            ..Self::default()
        }
    }

    /// Builder: set the entity.
    pub fn with_entity(mut self, entity: impl Into<String>) -> Self {
        self.entity = Some(entity.into());
        self
    }

    /// Builder: set the pipeline step.
    pub fn with_step(mut self, step: impl Into<String>) -> Self {
        self.step = Some(step.into());
        self
    }

    /// Builder: set the task.
    pub fn with_task(mut self, task: impl Into<String>) -> Self {
        self.task = Some(task.into());
        self
    }

    /// Builder: set the user.
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<&str> = [&self.project, &self.entity, &self.step, &self.task]
            .into_iter()
            .filter_map(|p| p.as_deref())
            .collect();
        if parts.is_empty() {
            f.write_str("<empty context>")
        } else {
            f.write_str(&parts.join(" / "))
        }
    }
}

/// State shared by every plugin call of one manager run.
pub struct RunContext {
    /// Identifier of this run, stamped on registered records.
    pub run_id: RunId,
    /// Context attached to the tree root.
    pub context: Context,
    /// Where publish plugins register finished artifacts.
    pub sink: Arc<dyn RegistrationSink>,
    /// Structured log sink for plugin and engine messages.
    pub logger: Arc<PublishLogger>,
    /// Checked between task calls; when cancelled the current phase stops.
    pub cancellation: CancellationToken,
    /// When `true`, publish plugins should not write outside the sink.
    pub dry_run: bool,
}

impl RunContext {
    /// Create a run context with the given root context and sink.
    pub fn new(context: Context, sink: Arc<dyn RegistrationSink>) -> Self {
        Self {
            run_id: RunId::new(),
            context,
            sink,
            logger: Arc::new(PublishLogger::tracing_only()),
            cancellation: CancellationToken::new(),
            dry_run: false,
        }
    }

    /// Builder: attach a logger.
    pub fn with_logger(mut self, logger: PublishLogger) -> Self {
        self.logger = Arc::new(logger);
        self
    }

    /// Builder: attach a cancellation token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Builder: set dry-run mode.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new(Context::default(), Arc::new(MemoryCatalog::new()))
    }
}

impl fmt::Debug for RunContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunContext")
            .field("run_id", &self.run_id)
            .field("context", &self.context)
            .field("dry_run", &self.dry_run)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_display() {
        let ctx = Context::project("Big Buck")
            .with_entity("sh010")
            .with_step("comp");
        assert_eq!(ctx.to_string(), "Big Buck / sh010 / comp");
        assert_eq!(Context::default().to_string(), "<empty context>");
    }

    #[test]
    fn empty_context() {
        assert!(Context::default().is_empty());
        assert!(!Context::project("p").is_empty());
    }

    #[test]
    fn run_context_builders() {
        let token = CancellationToken::new();
        let run = RunContext::default()
            .with_dry_run(true)
            .with_cancellation(token.clone());
        token.cancel();
        assert!(run.dry_run);
        assert!(run.cancellation.is_cancelled());
    }
}
