//! Integration tests for tree persistence, context locking and removal.

mod common;

use assert_matches::assert_matches;

use common::*;
use pubforge::manager::AllActiveTasks;
use pubforge::tree::{PublishTree, SERIALIZATION_VERSION};
use pubforge::{Context, Error, TaskState, Value};

#[test]
fn saved_tree_loads_back_identically() {
    let log = call_log();
    let (mut manager, _) = manager(registry_with(RecordingPublisher::new(&log)));
    let items = add_items(&mut manager, &["plate", "render"]);
    let child = manager
        .tree_mut()
        .create_item(items[0], THING, "Plate Layer", "layer")
        .unwrap();
    manager.reattach_tasks(child).unwrap();
    {
        let tree = manager.tree_mut();
        tree.set_property(items[0], "frames", Value::List(vec![1.into(), 2.into()]))
            .unwrap();
        tree.set_local_property(child, "note", "keep").unwrap();
        tree.set_context(items[1], Context::project("demo").with_entity("sh010"))
            .unwrap();
        tree.set_local_setting(items[1], "rec", "label", "custom")
            .unwrap();
        tree.set_persistent(items[0], true).unwrap();
    }
    manager.validate(AllActiveTasks).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tree.json");
    manager.save(&path).unwrap();

    let (mut restored, _) = common::manager(registry_with(RecordingPublisher::new(&log)));
    restored.load(&path).unwrap();

    let before = manager.tree();
    let after = restored.tree();
    assert_eq!(after.pformat(), before.pformat());
    assert_eq!(after.all_tasks(), before.all_tasks());
    for (_, task) in after.all_tasks() {
        assert_eq!(after.task(task).unwrap().state, TaskState::Validated);
    }
    assert_eq!(
        after.get_property(items[0], "frames", Value::Null).unwrap(),
        Value::List(vec![1.into(), 2.into()])
    );
    assert_eq!(
        after.get_property(child, "note", Value::Null).unwrap(),
        Value::from("keep")
    );
    assert_eq!(
        after.effective_context(items[1]).unwrap().entity.as_deref(),
        Some("sh010")
    );
    assert_eq!(after.get(items[1]).unwrap().local_settings_for("rec")["label"], Value::from("custom"));
    assert_eq!(after.persistent_items(), vec![items[0]]);
    assert_eq!(restored.context(), Context::project("demo"));
}

#[test]
fn document_carries_the_serialization_version() {
    let tree = PublishTree::new();
    let json: serde_json::Value = serde_json::from_str(&tree.to_json().unwrap()).unwrap();
    assert_eq!(json["serialization_version"], SERIALIZATION_VERSION);

    let future = tree
        .to_json()
        .unwrap()
        .replacen(
            &format!("\"serialization_version\": {SERIALIZATION_VERSION}"),
            "\"serialization_version\": 99",
            1,
        );
    assert_matches!(PublishTree::from_json(&future), Err(Error::Serialization(_)));
}

#[test]
fn locked_context_refuses_a_different_context() {
    let mut tree = PublishTree::new();
    let root = tree.root();
    let locked = tree.create_item(root, THING, "", "locked").unwrap();
    let child = tree.create_item(locked, THING, "", "child").unwrap();
    let c1 = Context::project("one");
    tree.set_context(locked, c1.clone()).unwrap();
    tree.get_mut(locked).unwrap().context_change_allowed = false;

    let err = tree.set_context(child, Context::project("two")).unwrap_err();

    assert_matches!(err, Error::ContextLocked { ref locked_by, .. } if locked_by == "locked");
    assert_eq!(tree.effective_context(child).unwrap(), c1);
}

#[test]
fn removed_item_handles_are_invalid() {
    let log = call_log();
    let (mut manager, _) = manager(registry_with(RecordingPublisher::new(&log)));
    let items = add_items(&mut manager, &["a", "b"]);
    let task = manager.tree().tasks(items[0]).unwrap()[0].id();

    manager.remove_item(items[0]).unwrap();

    assert!(manager.tree().get(items[0]).unwrap_err().is_invalid_item());
    assert_matches!(manager.tree().task(task), Err(Error::InvalidItem(_)));
    assert_matches!(
        manager.tree_mut().set_property(items[0], "x", 1),
        Err(Error::InvalidItem(_))
    );
    let report = manager.validate(AllActiveTasks).unwrap();
    assert_eq!(calls(&log), vec!["validate:b"]);
    assert_eq!(report.visited.len(), 1);
}

#[test]
fn clear_keeps_only_persistent_items_under_a_fresh_root() {
    let mut tree = PublishTree::new();
    let root = tree.root();
    let a = tree.create_item(root, THING, "", "A").unwrap();
    let b = tree.create_item(root, THING, "", "B").unwrap();
    tree.set_persistent(a, true).unwrap();
    assert_eq!(tree.persistent_items(), vec![a]);

    tree.clear(false);

    assert_ne!(tree.root(), root);
    assert_eq!(tree.children(tree.root()).unwrap(), &[a]);
    assert!(!tree.contains(b));
}
