//! Hook that logs how many tasks ended in each state.

use pubforge_common::Result;

use crate::plugin::{PluginContext, PostPhaseHook};
use crate::settings::Settings;
use crate::tree::{PublishTree, TaskState};

#[derive(Debug, Clone)]
pub struct SummaryHook {
    name: String,
}

impl SummaryHook {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Default for SummaryHook {
    fn default() -> Self {
        Self::new("Publish Summary")
    }
}

/// One-line count of tasks per state, skipping empty states.
pub fn summarize(tree: &PublishTree) -> String {
    let states: Vec<TaskState> = tree
        .iter()
        .flat_map(|item| item.tasks().iter().map(|t| t.state))
        .collect();
    let parts: Vec<String> = TaskState::ALL
        .iter()
        .filter_map(|state| {
            let count = states.iter().filter(|s| *s == state).count();
            (count > 0).then(|| format!("{count} {state}"))
        })
        .collect();
    if parts.is_empty() {
        "no tasks".to_string()
    } else {
        parts.join(", ")
    }
}

impl PostPhaseHook for SummaryHook {
    fn name(&self) -> &str {
        &self.name
    }

    fn post_finalize(
        &self,
        ctx: &PluginContext<'_>,
        _settings: &Settings,
        tree: &mut PublishTree,
    ) -> Result<()> {
        ctx.run.logger.info(format!("Publish summary: {}", summarize(tree)));
        Ok(())
    }
}
