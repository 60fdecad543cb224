//! The publish manager.
//!
//! [`PublishManager`] owns one [`PublishTree`] and drives it:
//!
//! 1. collection, through the registered collectors
//! 2. plugin attachment, turning accepted plugins into tasks on new items
//! 3. the validate, publish and finalize phases over a [`TaskGenerator`]
//!
//! Task-level failures never stop a phase. They are recorded on the task and
//! in the [`PhaseReport`]. An `Err` from a phase method means the caller drove
//! the phases out of order; it is raised before any plugin runs.

mod collected;
mod generator;
mod report;

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use pubforge_common::{Error, ItemId, Result, TaskId};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::context::{Context, RunContext};
use crate::plugin::{PluginContext, PluginRegistry, RegisteredPlugin, UiSettings};
use crate::settings::{resolve, SettingValues, Settings};
use crate::tree::{PublishTask, PublishTree, TaskRef, TaskState};

pub use collected::{CollectedFiles, COLLECTED_FILE_PATH};
pub use generator::{AllActiveTasks, SubtreeTasks, TaskGenerator, TasksInState};
pub use report::{
    CollectionFailure, CollectionReport, HookFailure, Phase, PhaseOutcome, PhaseReport,
    RunReport, TaskFailure,
};

/// How many accepted plugins become tasks on one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcceptancePolicy {
    /// Every accepting plugin gets a task, highest score first.
    #[default]
    All,
    /// Only the highest-scoring plugin gets a task.
    HighestScore,
}

/// Orchestrates collection and the three execution phases over one tree.
pub struct PublishManager {
    tree: PublishTree,
    registry: PluginRegistry,
    run: RunContext,
    collected: CollectedFiles,
    acceptance: AcceptancePolicy,
}

impl PublishManager {
    pub fn new(registry: PluginRegistry, run: RunContext) -> Self {
        let mut tree = PublishTree::new();
        tree.set_root_context(run.context.clone());
        Self {
            tree,
            registry,
            run,
            collected: CollectedFiles::new(),
            acceptance: AcceptancePolicy::default(),
        }
    }

    /// Builder: set the acceptance policy.
    pub fn with_acceptance(mut self, acceptance: AcceptancePolicy) -> Self {
        self.acceptance = acceptance;
        self
    }

    pub fn tree(&self) -> &PublishTree {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut PublishTree {
        &mut self.tree
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    pub fn run_context(&self) -> &RunContext {
        &self.run
    }

    pub fn collected_files(&self) -> &CollectedFiles {
        &self.collected
    }

    pub fn acceptance(&self) -> AcceptancePolicy {
        self.acceptance
    }

    /// Token that stops the current phase between task calls.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.run.cancellation.clone()
    }

    pub fn cancel(&self) {
        self.run.cancellation.cancel();
    }

    /// Install a fresh cancellation token so phases can run again after a
    /// cancel. Tokens handed out earlier stay cancelled and no longer reach
    /// this manager.
    pub fn reset_cancellation(&mut self) {
        if self.run.cancellation.is_cancelled() {
            debug!("Resetting cancellation for run {}", self.run.run_id);
        }
        self.run.cancellation = CancellationToken::new();
    }

    // ------------------------------------------------------------------
    // Collection
    // ------------------------------------------------------------------

    /// Clear non-persistent items, then run every collector on the current
    /// session.
    pub fn collect_session(&mut self) -> Result<CollectionReport> {
        info!("Collecting from the current session");
        self.tree.clear(false);
        self.tree.set_root_context(self.run.context.clone());
        self.collected = CollectedFiles::rebuild(&self.tree);

        let before = self.live_items();
        let mut report = CollectionReport::default();
        {
            let Self {
                tree,
                registry,
                run,
                ..
            } = self;
            let root = tree.root();
            let context = tree.effective_context(root)?;
            for (entry, collector) in registry.collectors() {
                let local = tree.get(root)?.local_settings_for(entry.id());
                let settings = match resolve_for(entry, &local) {
                    Ok(settings) => settings,
                    Err(e) => {
                        record_collection_error(run, &mut report, entry.id(), None, &e);
                        continue;
                    }
                };
                let ctx = PluginContext::new(run, &context, entry.id());
                let mut parent = tree.item_mut(root)?;
                if let Err(e) = collector.process_current_session(&ctx, &settings, &mut parent) {
                    record_collection_error(run, &mut report, entry.id(), None, &e);
                }
            }
        }

        self.finish_collection(&before, &mut report)?;
        Ok(report)
    }

    /// Run every collector on each path that is not already collected.
    ///
    /// New top-level items are made persistent and tagged with the
    /// `collected_file_path` property. When a collector fails on a path,
    /// everything collected from that path is discarded and the path is not
    /// recorded as collected.
    pub fn collect_files<P: AsRef<Path>>(&mut self, paths: &[P]) -> Result<CollectionReport> {
        let before = self.live_items();
        let mut report = CollectionReport::default();
        {
            let Self {
                tree,
                registry,
                run,
                collected,
                ..
            } = self;
            let root = tree.root();
            let context = tree.effective_context(root)?;

            for path in paths {
                let path = normalize(path.as_ref());
                if collected.is_collected(&path, tree) {
                    debug!("Skipping already collected path {:?}", path);
                    report.skipped_paths.push(path);
                    continue;
                }

                let top_before = tree.children(root)?.to_vec();
                let live_before: HashSet<ItemId> = tree.iter().map(|item| item.id()).collect();
                let mut failed = false;
                for (entry, collector) in registry.collectors() {
                    let local = tree.get(root)?.local_settings_for(entry.id());
                    let settings = match resolve_for(entry, &local) {
                        Ok(settings) => settings,
                        Err(e) => {
                            let path = Some(path.as_path());
                            record_collection_error(run, &mut report, entry.id(), path, &e);
                            failed = true;
                            continue;
                        }
                    };
                    let ctx = PluginContext::new(run, &context, entry.id());
                    let mut parent = tree.item_mut(root)?;
                    let result = collector.process_file(&ctx, &settings, &mut parent, &path);
                    if let Err(e) = result {
                        let path = Some(path.as_path());
                        record_collection_error(run, &mut report, entry.id(), path, &e);
                        failed = true;
                    }
                }

                // A path with any collector error stays uncollected so it
                // can be retried from a clean tree.
                if failed {
                    let partial: Vec<ItemId> = tree
                        .iter()
                        .map(|item| item.id())
                        .filter(|id| !live_before.contains(id))
                        .collect();
                    for id in &partial {
                        if tree.contains(*id) {
                            tree.remove_item(*id)?;
                        }
                    }
                    if !partial.is_empty() {
                        warn!(
                            "Discarded {} item(s) collected from {:?} after an error",
                            partial.len(),
                            path
                        );
                    }
                    continue;
                }

                let created: Vec<ItemId> = tree
                    .children(root)?
                    .iter()
                    .copied()
                    .filter(|id| !top_before.contains(id))
                    .collect();
                for id in created {
                    tree.set_persistent(id, true)?;
                    tree.set_property(id, COLLECTED_FILE_PATH, path.as_path())?;
                    collected.record(&path, id);
                }
            }
        }

        self.finish_collection(&before, &mut report)?;
        Ok(report)
    }

    fn live_items(&self) -> HashSet<ItemId> {
        self.tree.iter().map(|item| item.id()).collect()
    }

    fn finish_collection(
        &mut self,
        before: &HashSet<ItemId>,
        report: &mut CollectionReport,
    ) -> Result<()> {
        let new_items: Vec<ItemId> = self
            .tree
            .iter()
            .map(|item| item.id())
            .filter(|id| !before.contains(id))
            .collect();

        for id in &new_items {
            report.tasks_created += attach_tasks(
                &mut self.tree,
                &self.registry,
                &self.run,
                self.acceptance,
                *id,
                &mut report.errors,
            )?;
        }
        report.new_items = new_items;

        info!(
            "Collection complete: {} new item(s), {} task(s), {} error(s)",
            report.new_items.len(),
            report.tasks_created,
            report.errors.len()
        );
        Ok(())
    }

    /// Drop the tasks of one item and offer it to the publishers again, for
    /// example after its local settings changed.
    pub fn reattach_tasks(&mut self, id: ItemId) -> Result<usize> {
        self.tree.clear_tasks(id)?;
        let mut errors = Vec::new();
        let count = attach_tasks(
            &mut self.tree,
            &self.registry,
            &self.run,
            self.acceptance,
            id,
            &mut errors,
        )?;
        match errors.into_iter().next() {
            Some(failure) => Err(Error::Config(failure.to_string())),
            None => Ok(count),
        }
    }

    // ------------------------------------------------------------------
    // Phases
    // ------------------------------------------------------------------

    /// Validate the generated tasks. Any task state may be re-validated.
    pub fn validate(&mut self, generator: impl TaskGenerator) -> Result<PhaseReport> {
        self.run_phase(Phase::Validate, &generator)
    }

    /// Publish the generated tasks.
    ///
    /// # Errors
    ///
    /// [`Error::PhaseOrder`] when a generated task is not `Validated`.
    pub fn publish(&mut self, generator: impl TaskGenerator) -> Result<PhaseReport> {
        self.run_phase(Phase::Publish, &generator)
    }

    /// Finalize the generated tasks. `PublishFailed` tasks are skipped.
    ///
    /// # Errors
    ///
    /// [`Error::PhaseOrder`] when a generated task is neither `Published`
    /// nor `PublishFailed`.
    pub fn finalize(&mut self, generator: impl TaskGenerator) -> Result<PhaseReport> {
        self.run_phase(Phase::Finalize, &generator)
    }

    /// Validate every active task; publish only if validation fully
    /// succeeded; then finalize unless publish was cancelled or hit a
    /// systemic failure.
    pub fn run(&mut self) -> Result<RunReport> {
        let validate = self.validate(AllActiveTasks)?;
        if !validate.is_success() {
            warn!("Validation did not succeed; nothing was published");
            return Ok(RunReport {
                validate,
                publish: None,
                finalize: None,
            });
        }

        let publish = self.publish(TasksInState(TaskState::Validated))?;
        if publish.cancelled || publish.hook_failure.is_some() {
            return Ok(RunReport {
                validate,
                publish: Some(publish),
                finalize: None,
            });
        }

        let finalize = self.finalize(|tree: &PublishTree| -> Vec<TaskRef> {
            AllActiveTasks
                .tasks(tree)
                .into_iter()
                .filter(|(_, task)| tree.task(*task).is_ok_and(|t| t.state.can_finalize()))
                .collect()
        })?;

        Ok(RunReport {
            validate,
            publish: Some(publish),
            finalize: Some(finalize),
        })
    }

    fn run_phase(&mut self, phase: Phase, generator: &dyn TaskGenerator) -> Result<PhaseReport> {
        let tasks = self.check_phase_order(phase, generator.tasks(&self.tree))?;
        info!("Starting {} phase with {} task(s)", phase, tasks.len());

        let mut report = PhaseReport::new(phase);
        for (item, task) in tasks {
            if self.run.cancellation.is_cancelled() {
                report.cancelled = true;
                break;
            }
            self.run_task(phase, item, task, &mut report);
        }

        if report.cancelled {
            self.run.logger.warn(format!(
                "{} phase cancelled after {} task(s)",
                phase,
                report.visited.len()
            ));
            return Ok(report);
        }

        self.run_hooks(phase, &mut report);
        info!(
            "Finished {} phase: {} succeeded, {} failed, {} skipped",
            phase,
            report.succeeded.len(),
            report.failures.len(),
            report.skipped.len()
        );
        Ok(report)
    }

    /// Check the generated sequence before any plugin call: every task must
    /// be live and in a state the phase accepts, and no task may come before
    /// a task of one of its item's ancestors. Duplicates are dropped.
    fn check_phase_order(&self, phase: Phase, tasks: Vec<TaskRef>) -> Result<Vec<TaskRef>> {
        let mut seen = HashSet::new();
        let mut ordered = Vec::with_capacity(tasks.len());

        for (item, task_id) in tasks {
            let task = self.tree.task(task_id)?;
            if task.item() != item {
                return Err(Error::phase_order(format!(
                    "task {task_id} does not belong to item {item}"
                )));
            }
            if !seen.insert(task_id) {
                debug!("Task '{}' offered twice; running it once", task.name);
                continue;
            }
            let allowed = match phase {
                Phase::Validate => true,
                Phase::Publish => task.state.can_publish(),
                Phase::Finalize => task.state.can_finalize(),
            };
            if !allowed {
                return Err(Error::phase_order(format!(
                    "cannot {phase} '{}' on '{}': task is {}",
                    task.name,
                    self.tree.get(item)?.name,
                    task.state
                )));
            }
            ordered.push((item, task_id));
        }

        let mut last: HashMap<ItemId, usize> = HashMap::new();
        for (pos, (item, _)) in ordered.iter().enumerate() {
            last.insert(*item, pos);
        }
        for (pos, (item, _)) in ordered.iter().enumerate() {
            for ancestor in self.tree.ancestors(*item)? {
                if last.get(&ancestor).is_some_and(|later| *later > pos) {
                    return Err(Error::phase_order(format!(
                        "a task of '{}' is offered before a task of its ancestor '{}'",
                        self.tree.get(*item)?.name,
                        self.tree.get(ancestor)?.name
                    )));
                }
            }
        }

        Ok(ordered)
    }

    fn run_task(
        &mut self,
        phase: Phase,
        item_id: ItemId,
        task_id: TaskId,
        report: &mut PhaseReport,
    ) {
        let Self {
            tree,
            registry,
            run,
            ..
        } = self;

        let Ok(task) = tree.task(task_id) else {
            warn!("Task {} disappeared before {}", task_id, phase);
            report.skipped.push((item_id, task_id));
            return;
        };
        if phase == Phase::Finalize && task.state == TaskState::PublishFailed {
            debug!("Skipping finalize of failed publish '{}'", task.name);
            report.skipped.push((item_id, task_id));
            return;
        }

        let plugin_id = task.plugin_id().to_string();
        let task_name = task.name.clone();
        let settings = task.settings.clone();
        let item_name = tree
            .get(item_id)
            .map(|item| item.name.clone())
            .unwrap_or_default();

        debug!("{} '{}' on '{}'", phase, task_name, item_name);
        report.visited.push((item_id, task_id));

        let result = call_plugin(
            tree, registry, run, phase, item_id, task_id, &plugin_id, &settings,
        );
        let failure = match result {
            Ok(true) => None,
            Ok(false) => Some(format!("'{task_name}' did not pass validation")),
            Err(e) => Some(e.to_string()),
        };

        let Ok(task) = tree.task_mut(task_id) else {
            run.logger
                .warn(format!("Task '{task_name}' was removed during {phase}"));
            return;
        };

        let Some(message) = failure else {
            match phase {
                Phase::Validate => {
                    task.state = TaskState::Validated;
                    task.last_error = None;
                }
                Phase::Publish => {
                    task.state = TaskState::Published;
                    task.last_error = None;
                }
                Phase::Finalize => {
                    task.state = TaskState::Finalized;
                    task.finalize_error = None;
                }
            }
            report.succeeded.push((item_id, task_id));
            return;
        };

        run.logger
            .error(format!("{phase} failed for '{task_name}' on '{item_name}': {message}"));
        let failure = TaskFailure {
            item: item_id,
            task: task_id,
            item_name,
            task_name,
            message: message.clone(),
        };
        match phase {
            Phase::Validate => {
                task.state = TaskState::ValidationFailed;
                task.last_error = Some(message);
                report.failures.push(failure);
            }
            Phase::Publish => {
                task.state = TaskState::PublishFailed;
                task.last_error = Some(message);
                report.failures.push(failure);
            }
            Phase::Finalize => {
                task.state = TaskState::Finalized;
                task.finalize_error = Some(message);
                report.finalize_errors.push(failure);
            }
        }
    }

    /// Run every hook for `phase` in registration order. The first failure
    /// stops the remaining hooks.
    fn run_hooks(&mut self, phase: Phase, report: &mut PhaseReport) {
        let Self {
            tree,
            registry,
            run,
            ..
        } = self;
        let context = tree.effective_context(tree.root()).unwrap_or_default();

        for (entry, hook) in registry.hooks() {
            let result = match resolve_for(entry, &SettingValues::new()) {
                Ok(settings) => {
                    let ctx = PluginContext::new(run, &context, entry.id());
                    match phase {
                        Phase::Validate => hook.post_validate(&ctx, &settings, tree),
                        Phase::Publish => hook.post_publish(&ctx, &settings, tree),
                        Phase::Finalize => hook.post_finalize(&ctx, &settings, tree),
                    }
                }
                Err(e) => Err(e),
            };
            if let Err(e) = result {
                run.logger
                    .error(Error::hook(entry.id(), phase, e.to_string()).to_string());
                report.hook_failure = Some(HookFailure {
                    hook: entry.id().to_string(),
                    message: e.to_string(),
                });
                break;
            }
        }
    }

    // ------------------------------------------------------------------
    // Persistence and editing
    // ------------------------------------------------------------------

    /// Replace the tree with one loaded from `path`. The manager's context is
    /// re-attached to the new root and file provenance is rebuilt.
    pub fn load(&mut self, path: &Path) -> Result<()> {
        let mut tree = PublishTree::load_file(path)?;
        tree.set_root_context(self.run.context.clone());

        for task_id in tree.all_tasks().into_iter().map(|(_, task)| task) {
            let plugin_id = tree.task(task_id)?.plugin_id().to_string();
            if self.registry.publisher(&plugin_id).is_err() {
                warn!("Loaded task uses unregistered plugin '{}'", plugin_id);
            }
        }

        self.collected = CollectedFiles::rebuild(&tree);
        self.tree = tree;
        Ok(())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        self.tree.save_file(path)
    }

    /// Remove an item with its subtree and forget its file provenance.
    pub fn remove_item(&mut self, id: ItemId) -> Result<Vec<ItemId>> {
        let removed = self.tree.remove_item(id)?;
        self.collected.prune(&removed);
        Ok(removed)
    }

    /// Settings snapshot of one task for an external editor.
    pub fn ui_settings(&self, task_id: TaskId) -> Result<UiSettings> {
        let task = self.tree.task(task_id)?;
        let (_, plugin) = self.registry.publisher(task.plugin_id())?;
        Ok(plugin.get_ui_settings(&task.settings))
    }

    /// Apply an editor snapshot to one task. Nothing changes on error.
    pub fn apply_ui_settings(&mut self, task_id: TaskId, ui: &UiSettings) -> Result<()> {
        let task = self.tree.task_mut(task_id)?;
        let (_, plugin) = self.registry.publisher(task.plugin_id())?;
        let mut settings = task.settings.clone();
        plugin.set_ui_settings(&mut settings, ui)?;
        task.settings = settings;
        Ok(())
    }

    /// Session context stored on the root.
    pub fn context(&self) -> Context {
        self.tree
            .effective_context(self.tree.root())
            .unwrap_or_default()
    }
}

fn resolve_for(entry: &RegisteredPlugin, local: &SettingValues) -> Result<Settings> {
    resolve(entry.schema(), entry.app_settings(), local)
}

fn normalize(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

fn record_collection_error(
    run: &RunContext,
    report: &mut CollectionReport,
    plugin: &str,
    path: Option<&Path>,
    error: &Error,
) {
    let failure = CollectionFailure {
        plugin: plugin.to_string(),
        path: path.map(Path::to_path_buf),
        message: error.to_string(),
    };
    run.logger.error(format!("Collection failed: {failure}"));
    report.errors.push(failure);
}

/// Offer one item to every matching publisher and attach the accepted ones
/// as tasks. Returns the number of tasks attached.
fn attach_tasks(
    tree: &mut PublishTree,
    registry: &PluginRegistry,
    run: &RunContext,
    acceptance: AcceptancePolicy,
    item_id: ItemId,
    errors: &mut Vec<CollectionFailure>,
) -> Result<usize> {
    let type_spec = tree.get(item_id)?.type_spec().to_string();
    let mut accepted: Vec<PublishTask> = Vec::new();

    for (entry, plugin) in registry.publishers() {
        if !entry.matches(&type_spec) {
            continue;
        }

        let local = tree.get(item_id)?.local_settings_for(entry.id());
        let settings = match resolve_for(entry, &local) {
            Ok(settings) => settings,
            Err(e) => {
                run.logger.warn(format!(
                    "Settings of '{}' rejected for item {}: {}",
                    entry.id(),
                    item_id,
                    e
                ));
                errors.push(CollectionFailure {
                    plugin: entry.id().to_string(),
                    path: None,
                    message: e.to_string(),
                });
                continue;
            }
        };

        let context = tree.effective_context(item_id)?;
        let ctx = PluginContext::new(run, &context, entry.id());
        let verdict = {
            let mut item = tree.item_mut(item_id)?;
            plugin.accept(&ctx, &settings, &mut item)
        };
        if !tree.contains(item_id) {
            warn!("Item {} was removed while plugins were attached", item_id);
            return Ok(0);
        }

        let verdict = match verdict {
            Ok(verdict) => verdict,
            Err(e) => {
                run.logger.warn(format!(
                    "'{}' failed to accept item {}; treating as not accepted: {}",
                    entry.id(),
                    item_id,
                    e
                ));
                continue;
            }
        };
        if !verdict.accepted {
            debug!("'{}' declined {}", entry.id(), type_spec);
            continue;
        }

        let mut task = PublishTask::new(item_id, entry.id(), plugin.name(), settings)
            .with_description(plugin.description());
        task.checked = verdict.checked;
        task.enabled = verdict.enabled;
        task.visible = verdict.visible;
        task.score = verdict.score;
        accepted.push(task);
    }

    accepted.sort_by(|a, b| b.score.cmp(&a.score));
    if acceptance == AcceptancePolicy::HighestScore {
        accepted.truncate(1);
    }

    let count = accepted.len();
    for task in accepted {
        tree.add_task(task)?;
    }
    Ok(count)
}

#[allow(clippy::too_many_arguments)]
fn call_plugin(
    tree: &mut PublishTree,
    registry: &PluginRegistry,
    run: &RunContext,
    phase: Phase,
    item_id: ItemId,
    task_id: TaskId,
    plugin_id: &str,
    settings: &Settings,
) -> Result<bool> {
    let (_, plugin) = registry.publisher(plugin_id)?;
    let context = tree.effective_context(item_id)?;
    let ctx = PluginContext::new(run, &context, plugin_id).with_task(task_id);
    let mut item = tree.item_mut(item_id)?;
    match phase {
        Phase::Validate => plugin.validate(&ctx, settings, &mut item),
        Phase::Publish => plugin.publish(&ctx, settings, &mut item).map(|()| true),
        Phase::Finalize => plugin.finalize(&ctx, settings, &mut item).map(|()| true),
    }
}
