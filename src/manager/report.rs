//! Reports returned by collection and by each execution phase.

use std::fmt;
use std::path::PathBuf;

use pubforge_common::{ItemId, TaskId};
use serde::Serialize;

use crate::tree::TaskRef;

/// Execution phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Validate,
    Publish,
    Finalize,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Validate => f.write_str("validate"),
            Phase::Publish => f.write_str("publish"),
            Phase::Finalize => f.write_str("finalize"),
        }
    }
}

/// A task that failed during a phase.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskFailure {
    pub item: ItemId,
    pub task: TaskId,
    pub item_name: String,
    pub task_name: String,
    pub message: String,
}

impl fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {}: {}", self.item_name, self.task_name, self.message)
    }
}

/// A post-phase hook that failed. Later hooks of the same phase did not run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HookFailure {
    pub hook: String,
    pub message: String,
}

/// What a caller should make of a phase.
#[derive(Debug, Clone, PartialEq)]
pub enum PhaseOutcome {
    /// The generator offered no tasks.
    NoActiveTasks,
    /// Every offered task succeeded.
    Succeeded { tasks: usize },
    /// Some tasks failed; the others ran normally.
    TaskFailures(Vec<TaskFailure>),
    /// A failure outside any single task, such as a post-phase hook.
    SystemicFailure { source: String, message: String },
    /// The run was cancelled; `completed` tasks ran before it stopped.
    Cancelled { completed: usize },
}

/// Result of one execution phase.
#[derive(Debug, Clone, Serialize)]
pub struct PhaseReport {
    pub phase: Phase,
    /// Tasks whose plugin call ran, in order.
    pub visited: Vec<TaskRef>,
    pub succeeded: Vec<TaskRef>,
    pub failures: Vec<TaskFailure>,
    /// Tasks offered but not run (finalize skips failed publishes).
    pub skipped: Vec<TaskRef>,
    /// Finalize errors; logged and recorded, never counted as failures.
    pub finalize_errors: Vec<TaskFailure>,
    pub hook_failure: Option<HookFailure>,
    pub cancelled: bool,
}

impl PhaseReport {
    pub fn new(phase: Phase) -> Self {
        Self {
            phase,
            visited: Vec::new(),
            succeeded: Vec::new(),
            failures: Vec::new(),
            skipped: Vec::new(),
            finalize_errors: Vec::new(),
            hook_failure: None,
            cancelled: false,
        }
    }

    pub fn outcome(&self) -> PhaseOutcome {
        if self.cancelled {
            return PhaseOutcome::Cancelled {
                completed: self.visited.len(),
            };
        }
        if let Some(ref hook) = self.hook_failure {
            return PhaseOutcome::SystemicFailure {
                source: hook.hook.clone(),
                message: hook.message.clone(),
            };
        }
        if !self.failures.is_empty() {
            return PhaseOutcome::TaskFailures(self.failures.clone());
        }
        if self.visited.is_empty() && self.skipped.is_empty() {
            return PhaseOutcome::NoActiveTasks;
        }
        PhaseOutcome::Succeeded {
            tasks: self.succeeded.len(),
        }
    }

    /// True when nothing failed and the phase was not cancelled.
    pub fn is_success(&self) -> bool {
        matches!(
            self.outcome(),
            PhaseOutcome::Succeeded { .. } | PhaseOutcome::NoActiveTasks
        )
    }
}

/// A collector call or settings resolution that failed during collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionFailure {
    /// Plugin id of the collector or publisher involved.
    pub plugin: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    pub message: String,
}

impl fmt::Display for CollectionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.path {
            Some(ref path) => write!(f, "[{}] {}: {}", self.plugin, path.display(), self.message),
            None => write!(f, "[{}] {}", self.plugin, self.message),
        }
    }
}

/// Result of a collection pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CollectionReport {
    /// Items created by this pass, in tree order.
    pub new_items: Vec<ItemId>,
    /// Paths skipped because they were already collected.
    pub skipped_paths: Vec<PathBuf>,
    pub errors: Vec<CollectionFailure>,
    /// Tasks attached to the new items.
    pub tasks_created: usize,
}

/// Result of a full validate, publish, finalize run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub validate: PhaseReport,
    /// Absent when validation did not fully succeed.
    pub publish: Option<PhaseReport>,
    /// Absent when publish did not run or stopped early.
    pub finalize: Option<PhaseReport>,
}

impl RunReport {
    /// True when all three phases ran and none of them failed.
    pub fn is_success(&self) -> bool {
        self.validate.is_success()
            && self.publish.as_ref().is_some_and(PhaseReport::is_success)
            && self.finalize.as_ref().is_some_and(PhaseReport::is_success)
    }

    /// The phases that ran, in order.
    pub fn phases(&self) -> impl Iterator<Item = &PhaseReport> {
        std::iter::once(&self.validate)
            .chain(self.publish.as_ref())
            .chain(self.finalize.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure() -> TaskFailure {
        TaskFailure {
            item: ItemId::new(),
            task: TaskId::new(),
            item_name: "a.exr".into(),
            task_name: "Publish".into(),
            message: "missing".into(),
        }
    }

    #[test]
    fn empty_report_has_no_active_tasks() {
        let report = PhaseReport::new(Phase::Validate);
        assert_eq!(report.outcome(), PhaseOutcome::NoActiveTasks);
        assert!(report.is_success());
    }

    #[test]
    fn outcome_precedence() {
        let mut report = PhaseReport::new(Phase::Publish);
        let task = (ItemId::new(), TaskId::new());
        report.visited.push(task);
        report.succeeded.push(task);
        assert_eq!(report.outcome(), PhaseOutcome::Succeeded { tasks: 1 });

        report.failures.push(failure());
        assert!(matches!(report.outcome(), PhaseOutcome::TaskFailures(ref f) if f.len() == 1));

        report.hook_failure = Some(HookFailure {
            hook: "summary".into(),
            message: "boom".into(),
        });
        assert!(matches!(report.outcome(), PhaseOutcome::SystemicFailure { .. }));

        report.cancelled = true;
        assert_eq!(report.outcome(), PhaseOutcome::Cancelled { completed: 1 });
        assert!(!report.is_success());
    }

    #[test]
    fn finalize_errors_do_not_fail_the_phase() {
        let mut report = PhaseReport::new(Phase::Finalize);
        let task = (ItemId::new(), TaskId::new());
        report.visited.push(task);
        report.succeeded.push(task);
        report.finalize_errors.push(failure());
        assert!(report.is_success());
    }

    #[test]
    fn display_formats() {
        assert_eq!(Phase::Finalize.to_string(), "finalize");
        assert_eq!(failure().to_string(), "a.exr / Publish: missing");
        let err = CollectionFailure {
            plugin: "files".into(),
            path: Some(PathBuf::from("/x")),
            message: "gone".into(),
        };
        assert_eq!(err.to_string(), "[files] /x: gone");
    }
}
