//! Benchmarks for tree traversal, persistence and phase execution
//!
//! Trees are flat-ish: every top-level item has two children, and every item
//! carries one task from a publisher that accepts everything.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use pubforge::context::RunContext;
use pubforge::manager::{AllActiveTasks, PublishManager};
use pubforge::plugin::{AcceptVerdict, PluginContext, PluginRegistry, PublishPlugin};
use pubforge::settings::Settings;
use pubforge::tree::{ItemMut, PublishTree};
use pubforge::Result;
use std::sync::Arc;

struct AcceptAll;

impl PublishPlugin for AcceptAll {
    fn name(&self) -> &str {
        "Accept All"
    }

    fn item_filters(&self) -> Vec<String> {
        vec!["bench.*".to_string()]
    }

    fn accept(
        &self,
        _ctx: &PluginContext<'_>,
        _settings: &Settings,
        _item: &mut ItemMut<'_>,
    ) -> Result<AcceptVerdict> {
        Ok(AcceptVerdict::accept())
    }

    fn validate(
        &self,
        _ctx: &PluginContext<'_>,
        _settings: &Settings,
        item: &mut ItemMut<'_>,
    ) -> Result<bool> {
        Ok(!item.item()?.name.is_empty())
    }

    fn publish(
        &self,
        _ctx: &PluginContext<'_>,
        _settings: &Settings,
        item: &mut ItemMut<'_>,
    ) -> Result<()> {
        item.set_property("published", true)
    }
}

/// Build a manager whose tree holds `top_level * 3` items, each with a task.
fn build_manager(top_level: usize) -> PublishManager {
    let mut registry = PluginRegistry::new();
    registry
        .register_publisher("accept_all", Arc::new(AcceptAll))
        .unwrap();
    let mut manager = PublishManager::new(registry, RunContext::default());

    let root = manager.tree().root();
    for i in 0..top_level {
        let parent = manager
            .tree_mut()
            .create_item(root, "bench.parent", "", &format!("parent_{i}"))
            .unwrap();
        manager.reattach_tasks(parent).unwrap();
        for j in 0..2 {
            let child = manager
                .tree_mut()
                .create_item(parent, "bench.child", "", &format!("child_{i}_{j}"))
                .unwrap();
            manager.reattach_tasks(child).unwrap();
        }
    }
    manager
}

fn bench_traversal(c: &mut Criterion) {
    let mut group = c.benchmark_group("tree_traversal");

    for size in [10, 100, 1000] {
        let manager = build_manager(size);
        let tree = manager.tree();
        group.bench_with_input(BenchmarkId::new("descendants", size), tree, |b, tree| {
            b.iter(|| tree.descendants(black_box(tree.root())).unwrap());
        });
        group.bench_with_input(BenchmarkId::new("all_tasks", size), tree, |b, tree| {
            b.iter(|| black_box(tree).all_tasks());
        });
    }

    group.finish();
}

fn bench_persistence(c: &mut Criterion) {
    let mut group = c.benchmark_group("tree_persistence");

    for size in [10, 100, 1000] {
        let manager = build_manager(size);
        let json = manager.tree().to_json().unwrap();

        group.bench_with_input(BenchmarkId::new("to_json", size), manager.tree(), |b, tree| {
            b.iter(|| black_box(tree).to_json().unwrap());
        });
        group.bench_with_input(BenchmarkId::new("from_json", size), &json, |b, json| {
            b.iter(|| PublishTree::from_json(black_box(json)).unwrap());
        });
    }

    group.finish();
}

fn bench_phases(c: &mut Criterion) {
    let mut group = c.benchmark_group("phases");

    for size in [10, 100] {
        let mut manager = build_manager(size);
        group.bench_function(BenchmarkId::new("validate", size), |b| {
            b.iter(|| manager.validate(AllActiveTasks).unwrap());
        });

        group.bench_function(BenchmarkId::new("run", size), |b| {
            b.iter_with_setup(|| build_manager(size), |mut fresh| fresh.run().unwrap());
        });
    }

    group.finish();
}

criterion_group!(benches, bench_traversal, bench_persistence, bench_phases);
criterion_main!(benches);
