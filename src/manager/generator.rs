//! Task generators: which tasks a phase visits, and in what order.
//!
//! A generator is asked for its sequence once per phase; asking again
//! restarts it against the current tree.

use pubforge_common::ItemId;

use crate::tree::{PublishTree, TaskRef, TaskState};

pub trait TaskGenerator {
    fn tasks(&self, tree: &PublishTree) -> Vec<TaskRef>;
}

impl<F> TaskGenerator for F
where
    F: Fn(&PublishTree) -> Vec<TaskRef>,
{
    fn tasks(&self, tree: &PublishTree) -> Vec<TaskRef> {
        self(tree)
    }
}

/// Every active task of every active item, in tree order.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllActiveTasks;

impl TaskGenerator for AllActiveTasks {
    fn tasks(&self, tree: &PublishTree) -> Vec<TaskRef> {
        active_tasks(tree, tree.iter().map(|item| item.id()))
    }
}

/// Active tasks currently in one state.
#[derive(Debug, Clone, Copy)]
pub struct TasksInState(pub TaskState);

impl TaskGenerator for TasksInState {
    fn tasks(&self, tree: &PublishTree) -> Vec<TaskRef> {
        AllActiveTasks
            .tasks(tree)
            .into_iter()
            .filter(|(_, task)| tree.task(*task).is_ok_and(|t| t.state == self.0))
            .collect()
    }
}

/// Active tasks of one item and its descendants. A removed item yields
/// nothing.
#[derive(Debug, Clone, Copy)]
pub struct SubtreeTasks(pub ItemId);

impl TaskGenerator for SubtreeTasks {
    fn tasks(&self, tree: &PublishTree) -> Vec<TaskRef> {
        let Ok(descendants) = tree.descendants(self.0) else {
            return Vec::new();
        };
        let ids = std::iter::once(self.0)
            .filter(|id| !tree.is_root(*id))
            .chain(descendants);
        active_tasks(tree, ids)
    }
}

fn active_tasks(tree: &PublishTree, items: impl Iterator<Item = ItemId>) -> Vec<TaskRef> {
    items
        .filter_map(|id| tree.get(id).ok())
        .filter(|item| item.active())
        .flat_map(|item| {
            item.tasks()
                .iter()
                .filter(|t| t.active())
                .map(move |t| (item.id(), t.id()))
        })
        .collect()
}
