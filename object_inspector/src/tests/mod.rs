/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Integration tests that exercise multiple modules together (tree +
//! populate + bucket + expanders + memory backend + driver). Per-module
//! unit tests live in each module's own `#[cfg(test)] mod tests` block.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use crate::config::InspectorConfig;
use crate::driver::Inspector;
use crate::driver::Update;
use crate::edit::EditError;
use crate::edit::EditOutcome;
use crate::getter::GetterOutcome;
use crate::memory::FunctionBody;
use crate::memory::Handle;
use crate::memory::MemoryRuntime;
use crate::memory::Value;
use crate::node::NodeId;
use crate::node::NodeKind;
use crate::node::PopulationState;
use crate::node::SectionOptions;
use crate::node::TreeNode;
use crate::remote::CollectionEntry;
use crate::remote::Evaluation;
use crate::remote::ObjectId;
use crate::remote::PropertyDescriptor;
use crate::remote::PropertyKey;
use crate::remote::PropertyListing;
use crate::remote::ProtocolError;
use crate::remote::RemoteFunction;
use crate::remote::RemoteObject;
use crate::remote::RuntimeAgent;
use crate::remote::ScopeRecord;
use crate::remote::ScopeRef;
use crate::remote::ScopeType;
use crate::runtime::Runtime;
use crate::test_utils::child;
use crate::test_utils::drive;
use crate::test_utils::expand_now;
use crate::test_utils::memory_tree;
use crate::test_utils::memory_tree_with_config;
use crate::test_utils::titles;
use crate::tree::ObjectTree;
use crate::tree::flatten_tree;

const ROOT: NodeId = NodeId(0);

fn bucket(from: u64, to: u64) -> String {
    format!("[{} \u{2026} {}]", from, to)
}

fn numbers(memory: &MemoryRuntime, n: usize) -> Handle {
    memory.alloc_array((0..n).map(|i| Value::Number(i as f64)).collect())
}

/// Expands every bucket below `id` and returns the leaf titles in tree
/// order.
async fn expand_all_buckets(tree: &mut ObjectTree, id: NodeId) -> Vec<String> {
    expand_now(tree, id).await;
    let mut out = Vec::new();
    let children: Vec<(NodeId, bool)> = tree
        .node(id)
        .unwrap()
        .children
        .iter()
        .map(|c| (c.id, matches!(c.kind, NodeKind::Bucket(_))))
        .collect();
    for (child_id, is_bucket) in children {
        if is_bucket {
            out.extend(Box::pin(expand_all_buckets(tree, child_id)).await);
        } else {
            out.push(tree.node(child_id).unwrap().title());
        }
    }
    out
}

// 10,000 dense elements: 100 buckets of 100.
#[tokio::test]
async fn ten_thousand_elements_make_one_hundred_buckets() {
    let memory = Arc::new(MemoryRuntime::new());
    let array = numbers(&memory, 10_000);
    let mut tree = memory_tree(&memory, array, SectionOptions::default());
    expand_now(&mut tree, ROOT).await;

    let root = tree.root();
    assert_eq!(root.children.len(), 100);
    assert!(root.children.iter().all(|c| matches!(c.kind, NodeKind::Bucket(_))));
    assert_eq!(root.children[0].title(), bucket(0, 99));
    assert_eq!(root.children[99].title(), bucket(9_900, 9_999));

    let first = root.children[0].id;
    expand_now(&mut tree, first).await;
    let leaves = titles(tree.node(first).unwrap());
    assert_eq!(leaves, (0..100).map(|i| i.to_string()).collect::<Vec<_>>());
    assert!(tree.node(first).unwrap().children.iter().all(|c| !c.has_children()));
}

// 10,050 dense elements: a 10,000 bucket that re-plans, then a 50 bucket
// fetched directly.
#[tokio::test]
async fn ten_thousand_fifty_elements_nest() {
    let memory = Arc::new(MemoryRuntime::new());
    let array = numbers(&memory, 10_050);
    let mut tree = memory_tree(&memory, array, SectionOptions::default());
    expand_now(&mut tree, ROOT).await;
    assert_eq!(
        titles(tree.root()),
        vec![bucket(0, 9_999), bucket(10_000, 10_049)]
    );

    let big = tree.root().children[0].id;
    let small = tree.root().children[1].id;
    memory.clear_calls();
    expand_now(&mut tree, big).await;
    assert_eq!(memory.calls_to("call_function_json"), 1);
    let nested = tree.node(big).unwrap();
    assert_eq!(nested.children.len(), 100);
    assert_eq!(nested.children[1].title(), bucket(100, 199));

    memory.clear_calls();
    expand_now(&mut tree, small).await;
    assert_eq!(memory.calls_to("call_function_json"), 0);
    let leaves = titles(tree.node(small).unwrap());
    assert_eq!(leaves.len(), 50);
    assert_eq!(leaves[0], "10000");
    assert_eq!(leaves[49], "10049");
}

// At the threshold the array is listed flat, with its length.
#[tokio::test]
async fn arrays_at_threshold_are_not_bucketed() {
    let memory = Arc::new(MemoryRuntime::new());
    let array = numbers(&memory, 100);
    let mut tree = memory_tree(&memory, array, SectionOptions::default());
    expand_now(&mut tree, ROOT).await;
    let children = titles(tree.root());
    assert_eq!(children.len(), 101);
    assert_eq!(children[0], "0");
    assert_eq!(children[99], "99");
    assert_eq!(children[100], "length");
    assert_eq!(memory.calls_to("call_function_json"), 0);
}

// A single trailing index is emitted as a leaf, not a bucket.
#[tokio::test]
async fn single_index_ranges_become_leaves() {
    let memory = Arc::new(MemoryRuntime::new());
    let array = numbers(&memory, 101);
    let mut tree = memory_tree(&memory, array, SectionOptions::default());
    expand_now(&mut tree, ROOT).await;
    assert_eq!(titles(tree.root()), vec![bucket(0, 99), "100".to_string()]);
    assert!(matches!(
        tree.root().children[1].kind,
        NodeKind::Property(ref p) if p.read_only
    ));
}

// Sparse arrays bucket over present indices only and full expansion
// visits each present index once, in order.
#[tokio::test]
async fn sparse_full_expansion_is_exact() {
    let memory = Arc::new(MemoryRuntime::new());
    let indices: Vec<u64> = (0..350).map(|i| i * 37 + (i % 5)).collect();
    let array = memory.alloc_sparse_array(
        20_000,
        indices.iter().map(|&i| (i, Value::Bool(true))),
    );
    let mut tree = memory_tree(&memory, array, SectionOptions::default());
    let leaves = expand_all_buckets(&mut tree, ROOT).await;
    let expected: Vec<String> = indices.iter().map(|i| i.to_string()).collect();
    assert_eq!(leaves, expected);
    assert_eq!(tree.root().children.len(), 4);
    assert_eq!(tree.root().children[0].title(), bucket(indices[0], indices[99]));
}

// Non-index properties trail the buckets at the top level only.
#[tokio::test]
async fn named_properties_trail_buckets() {
    let memory = Arc::new(MemoryRuntime::new());
    let array = numbers(&memory, 150);
    let proto = memory.alloc_object("Array");
    memory.set_proto(array, proto);
    memory.define_data(array, "name", Value::String("list".into()));
    let mut tree = memory_tree(&memory, array, SectionOptions::default());
    expand_now(&mut tree, ROOT).await;
    assert_eq!(
        titles(tree.root()),
        vec![bucket(0, 99), bucket(100, 149), "name".into(), "__proto__".into()]
    );

    let second = tree.root().children[1].id;
    expand_now(&mut tree, second).await;
    let leaves = titles(tree.node(second).unwrap());
    assert_eq!(leaves.len(), 50);
    assert!(!leaves.contains(&"name".to_string()));
}

// Huge contiguous ranges are split arithmetically and skip the scan for
// named properties.
#[tokio::test]
async fn contiguous_ranges_skip_name_scan() {
    let memory = Arc::new(MemoryRuntime::new());
    let typed = memory.alloc_typed_array(2_500);
    memory.define_data(typed, "extra", Value::Null);
    let config = InspectorConfig {
        sparse_iteration_threshold: 1_000,
        get_own_property_names_threshold: 2_000,
        ..InspectorConfig::default()
    };
    let mut tree = memory_tree_with_config(&memory, typed, SectionOptions::default(), config);
    expand_now(&mut tree, ROOT).await;
    let children = titles(tree.root());
    assert_eq!(children.len(), 25);
    assert_eq!(children[24], bucket(2_400, 2_499));

    // Below the names threshold the named property is still listed.
    let smaller = memory.alloc_typed_array(1_500);
    memory.define_data(smaller, "extra", Value::Null);
    let config = InspectorConfig {
        sparse_iteration_threshold: 1_000,
        get_own_property_names_threshold: 2_000,
        ..InspectorConfig::default()
    };
    let mut tree = memory_tree_with_config(&memory, smaller, SectionOptions::default(), config);
    expand_now(&mut tree, ROOT).await;
    let children = titles(tree.root());
    assert_eq!(children.len(), 16);
    assert_eq!(children[15], "extra");
}

// Map entries auto-expand into `{k => v}` records.
#[tokio::test]
async fn map_entries_auto_expand() {
    let memory = Arc::new(MemoryRuntime::new());
    let map = memory.alloc_map(vec![
        (Value::String("a".into()), Value::Number(1.0)),
        (Value::String("b".into()), Value::Number(2.0)),
        (Value::String("c".into()), Value::Number(3.0)),
    ]);
    let mut tree = memory_tree(&memory, map, SectionOptions::default());
    expand_now(&mut tree, ROOT).await;
    assert_eq!(titles(tree.root()), vec!["<entries>[3]"]);

    let entries = tree.root().children[0].id;
    let node = tree.node(entries).unwrap();
    assert!(node.expanded);
    assert_eq!(titles(node), vec!["0", "1", "2"]);
    assert_eq!(node.children[1].value_text().as_deref(), Some("{b => 2}"));
    assert_eq!(memory.calls_to("collection_entries"), 1);

    let first = node.children[0].id;
    expand_now(&mut tree, first).await;
    assert_eq!(titles(tree.node(first).unwrap()), vec!["key", "value"]);
    assert_eq!(tree.property_path(first).as_deref(), Some("0"));

    // Entries are snapshots and cannot be edited.
    assert!(tree.begin_edit(first).is_err());
}

// Large sets bucket their entries; empty maps show a placeholder.
#[tokio::test]
async fn set_entries_bucket_and_empty_placeholder() {
    let memory = Arc::new(MemoryRuntime::new());
    let set = memory.alloc_set((0..250).map(|i| Value::Number(i as f64)).collect());
    let mut tree = memory_tree(&memory, set, SectionOptions::default());
    expand_now(&mut tree, ROOT).await;
    let entries = tree.root().children[0].id;
    assert_eq!(tree.node(entries).unwrap().title(), "<entries>[250]");
    assert_eq!(
        titles(tree.node(entries).unwrap()),
        vec![bucket(0, 99), bucket(100, 199), bucket(200, 249)]
    );
    let last = tree.node(entries).unwrap().children[2].id;
    expand_now(&mut tree, last).await;
    let last_node = tree.node(last).unwrap();
    assert_eq!(last_node.children.len(), 50);
    assert_eq!(last_node.children[0].value_text().as_deref(), Some("200"));

    let empty = memory.alloc_map(Vec::new());
    let mut tree = memory_tree(&memory, empty, SectionOptions::default());
    expand_now(&mut tree, ROOT).await;
    let entries = tree.root().children[0].id;
    assert_eq!(tree.node(entries).unwrap().title(), "<entries>[0]");
    assert_eq!(titles(tree.node(entries).unwrap()), vec!["No Entries"]);
}

fn function_with_scopes(memory: &MemoryRuntime) -> (Handle, Handle) {
    let function = memory.alloc_function("function f() {}", FunctionBody::Returns(Value::Undefined));
    let local = memory.alloc_object("Object");
    memory.define_data(local, "count", Value::Number(0.0));
    let closure = memory.alloc_object("Object");
    memory.define_data(closure, "captured", Value::Bool(true));
    let with = memory.alloc_object("Object");
    let global = memory.alloc_object("Window");
    memory.define_data(global, "document", Value::Null);
    memory.add_scope(function, ScopeType::Local, local);
    memory.add_scope(function, ScopeType::Closure, closure);
    memory.add_scope(function, ScopeType::Unknown, memory.alloc_object("Object"));
    memory.add_scope(function, ScopeType::With, with);
    memory.add_scope(function, ScopeType::Global, global);
    (function, local)
}

// The scope chain becomes scope nodes and read-only object scopes.
#[tokio::test]
async fn function_scopes() {
    let memory = Arc::new(MemoryRuntime::new());
    let (function, local) = function_with_scopes(&memory);
    let mut tree = memory_tree(&memory, function, SectionOptions::default());
    expand_now(&mut tree, ROOT).await;
    assert_eq!(titles(tree.root()), vec!["<function scope>"]);
    assert_eq!(memory.calls_to("scope_chain"), 0);

    let scopes = tree.root().children[0].id;
    expand_now(&mut tree, scopes).await;
    assert_eq!(
        titles(tree.node(scopes).unwrap()),
        vec!["Local", "Closure", "With Block", "Global"]
    );
    let node = tree.node(scopes).unwrap();
    assert!(matches!(node.children[0].kind, NodeKind::Scope(_)));
    assert!(matches!(node.children[3].kind, NodeKind::Property(_)));
    let global = node.children[3].id;
    assert!(tree.begin_edit(global).is_err());
    expand_now(&mut tree, global).await;
    assert_eq!(titles(tree.node(global).unwrap()), vec!["document"]);

    // Variables of a scope are assigned through the scope reference.
    let local_scope = child(&tree, scopes, "Local");
    expand_now(&mut tree, local_scope).await;
    let count = child(&tree, local_scope, "count");
    tree.begin_edit(count).unwrap();
    tree.set_draft(count, "5").unwrap();
    let crate::edit::CommitOutcome::Submitted(edit) = tree.commit_edit(count).unwrap() else {
        panic!("expected a submitted edit");
    };
    let outcome = tree.complete_edit(edit.run().await);
    let EditOutcome::Updated(pending) = outcome else {
        panic!("unexpected outcome {:?}", outcome);
    };
    drive(&mut tree, pending).await;
    assert_eq!(memory.calls_to("set_variable_value"), 1);
    assert_eq!(memory.get(local, "count"), Some(Value::Number(5.0)));
    let count = child(&tree, local_scope, "count");
    assert_eq!(tree.node(count).unwrap().value_text().as_deref(), Some("5"));
}

// Bound functions have no scope child; functions without scopes show a
// placeholder.
#[tokio::test]
async fn bound_and_scopeless_functions() {
    let memory = Arc::new(MemoryRuntime::new());
    let target = memory.alloc_function("function t() {}", FunctionBody::Returns(Value::Undefined));
    let bound = memory.alloc_bound_function(target);
    let mut tree = memory_tree(&memory, bound, SectionOptions::default());
    expand_now(&mut tree, ROOT).await;
    assert_eq!(titles(tree.root()), vec!["[[TargetFunction]]"]);

    let mut tree = memory_tree(&memory, target, SectionOptions::default());
    expand_now(&mut tree, ROOT).await;
    let scopes = tree.root().children[0].id;
    expand_now(&mut tree, scopes).await;
    assert_eq!(titles(tree.node(scopes).unwrap()), vec!["No Scopes"]);
}

// Root options: placeholder caption, injected properties, inherited
// accessors.
#[tokio::test]
async fn section_options() {
    let memory = Arc::new(MemoryRuntime::new());
    let empty = memory.alloc_object("Object");
    let mut tree = memory_tree(&memory, empty, SectionOptions::default());
    expand_now(&mut tree, ROOT).await;
    assert_eq!(titles(tree.root()), vec!["No Properties"]);

    let options = SectionOptions {
        empty_placeholder: Some("Nothing here".into()),
        ..SectionOptions::default()
    };
    let mut tree = memory_tree(&memory, empty, options);
    expand_now(&mut tree, ROOT).await;
    assert_eq!(titles(tree.root()), vec!["Nothing here"]);

    let options = SectionOptions {
        extra_properties: vec![PropertyDescriptor::data(
            "injected",
            RemoteObject::string("yes"),
        )],
        ..SectionOptions::default()
    };
    let mut tree = memory_tree(&memory, empty, options);
    expand_now(&mut tree, ROOT).await;
    assert_eq!(titles(tree.root()), vec!["injected"]);

    let proto = memory.alloc_object("Proto");
    let getter = memory.alloc_function("get size() {}", FunctionBody::Returns(Value::Number(1.0)));
    memory.define_accessor(proto, "size", Some(getter), None);
    let object = memory.alloc_object("Object");
    memory.set_proto(object, proto);
    let holder = memory.alloc_object("Object");
    memory.define_data(holder, "inner", Value::Object(object));

    let mut tree = memory_tree(&memory, object, SectionOptions::default());
    expand_now(&mut tree, ROOT).await;
    assert_eq!(titles(tree.root()), vec!["__proto__"]);

    let options = SectionOptions {
        ignore_has_own_property: true,
        skip_proto: true,
        ..SectionOptions::default()
    };
    let mut tree = memory_tree(&memory, object, options);
    expand_now(&mut tree, ROOT).await;
    assert_eq!(titles(tree.root()), vec!["size"]);

    // Below the root, inherited accessors are always listed.
    let mut tree = memory_tree(&memory, holder, SectionOptions::default());
    expand_now(&mut tree, ROOT).await;
    let inner = child(&tree, ROOT, "inner");
    expand_now(&mut tree, inner).await;
    assert_eq!(titles(tree.node(inner).unwrap()), vec!["size", "__proto__"]);
}

// An indexed object whose every slot is a hole still shows the
// placeholder instead of an empty expansion.
#[tokio::test]
async fn all_holes_array_yields_placeholder() {
    let memory = Arc::new(MemoryRuntime::new());
    let root = memory.alloc_sparse_array(200, std::iter::empty());
    let mut tree = memory_tree(&memory, root, SectionOptions::default());
    expand_now(&mut tree, ROOT).await;
    assert_eq!(titles(tree.root()), vec!["No Properties"]);
}

// Properties listed beside the buckets are read from a temporary copy,
// so they can be displayed but not edited. Own accessors stay editable.
#[tokio::test]
async fn bucketed_named_accessor_is_read_only() {
    let memory = Arc::new(MemoryRuntime::new());
    let array = numbers(&memory, 200);
    let getter = memory.alloc_function("get acc() {}", FunctionBody::Returns(Value::Number(1.0)));
    let setter = memory.alloc_function("set acc(v) {}", FunctionBody::Returns(Value::Undefined));
    memory.define_accessor(array, "acc", Some(getter), Some(setter));
    let live = memory.live_objects();

    let mut tree = memory_tree(&memory, array, SectionOptions::default());
    expand_now(&mut tree, ROOT).await;
    assert_eq!(
        titles(tree.root()),
        vec![bucket(0, 99), bucket(100, 199), "acc".to_string()]
    );
    let acc = child(&tree, ROOT, "acc");
    assert_eq!(tree.begin_edit(acc), Err(EditError::NotEditable(acc)));

    // Every temporary object read for the expansion was released.
    assert!(memory.calls_to("release_object") > 0);
    assert_eq!(memory.live_objects(), live);

    let object = memory.alloc_object("Object");
    memory.define_accessor(object, "acc", Some(getter), Some(setter));
    let mut tree = memory_tree(&memory, object, SectionOptions::default());
    expand_now(&mut tree, ROOT).await;
    let acc = child(&tree, ROOT, "acc");
    assert!(tree.begin_edit(acc).is_ok());
}

// A backend that returns nothing yields a placeholder rather than an
// error.
#[tokio::test]
async fn missing_listing_yields_placeholder() {
    let memory = Arc::new(MemoryRuntime::new());
    let ghost = RemoteObject::object("mem:404", None, "Object");
    let mut tree = ObjectTree::new(
        Runtime::new(memory.clone()),
        Arc::new(InspectorConfig::default()),
        ghost,
        SectionOptions::default(),
    );
    expand_now(&mut tree, ROOT).await;
    assert_eq!(titles(tree.root()), vec!["No Properties"]);
}

#[tokio::test]
async fn children_follow_comparator_order() {
    let memory = Arc::new(MemoryRuntime::new());
    let object = memory.alloc_object("Object");
    let proto = memory.alloc_object("Object");
    memory.define_data(object, "a10", Value::Number(1.0));
    memory.define_symbol(object, "Symbol(s)", Value::Number(2.0));
    memory.define_data(object, "a2", Value::Number(3.0));
    memory.define_data(object, "a1", Value::Number(4.0));
    memory.set_proto(object, proto);
    let mut tree = memory_tree(&memory, object, SectionOptions::default());
    expand_now(&mut tree, ROOT).await;
    assert_eq!(
        titles(tree.root()),
        vec!["a1", "a2", "a10", "Symbol(s)", "__proto__"]
    );
}

fn nested(memory: &MemoryRuntime) -> Handle {
    let Value::Object(handle) = memory.load_json(&json!({
        "config": {"name": "demo", "limits": {"max": 3}},
        "items": [1, 2, 3],
        "flag": false
    })) else {
        panic!("expected an object");
    };
    handle
}

fn rows(tree: &ObjectTree) -> Vec<(String, usize)> {
    flatten_tree(tree.root())
        .into_iter()
        .map(|row| (row.node.title(), row.depth))
        .collect()
}

#[tokio::test]
async fn inspector_expands_to_depth() {
    let memory = Arc::new(MemoryRuntime::new());
    let root = nested(&memory);
    let mut inspector = Inspector::new(memory_tree(&memory, root, SectionOptions::default()));
    inspector.expand_to_depth(1).await;
    assert_eq!(inspector.in_flight(), 0);
    assert_eq!(
        rows(inspector.tree()),
        vec![
            ("config".to_string(), 0),
            ("limits".to_string(), 1),
            ("name".to_string(), 1),
            ("flag".to_string(), 0),
            ("items".to_string(), 0),
            ("0".to_string(), 1),
            ("1".to_string(), 1),
            ("2".to_string(), 1),
            ("length".to_string(), 1),
        ]
    );
    let limits = child(inspector.tree(), child(inspector.tree(), ROOT, "config"), "limits");
    assert_eq!(inspector.tree().property_path(limits).as_deref(), Some("config.limits"));
}

#[tokio::test]
async fn inspector_discards_stale_results() {
    let memory = Arc::new(MemoryRuntime::new());
    let root = nested(&memory);
    let mut inspector = Inspector::new(memory_tree(&memory, root, SectionOptions::default()));
    assert!(inspector.expand(ROOT));
    inspector.collapse(ROOT);
    assert!(inspector.expand(ROOT));
    assert!(!inspector.expand(ROOT));

    let mut applied = 0;
    let mut discarded = 0;
    while let Some(update) = inspector.process_next().await {
        match update {
            Update::Populated { applied: true, .. } => applied += 1,
            Update::Populated { applied: false, .. } => discarded += 1,
            other => panic!("unexpected update {:?}", other),
        }
    }
    assert_eq!((applied, discarded), (1, 1));
    assert_eq!(titles(inspector.tree().root()), vec!["config", "flag", "items"]);
}

#[tokio::test]
async fn inspector_getter_and_edit() {
    let memory = Arc::new(MemoryRuntime::new());
    let root = memory.alloc_object("Object");
    let getter = memory.alloc_function("get now() {}", FunctionBody::Returns(Value::Number(9.0)));
    memory.define_accessor(root, "now", Some(getter), None);
    memory.define_data(root, "x", Value::Number(1.0));
    let mut inspector = Inspector::new(memory_tree(&memory, root, SectionOptions::default()));
    inspector.expand(ROOT);
    inspector.settle().await;

    let now = child(inspector.tree(), ROOT, "now");
    assert!(inspector.invoke_getter(now));
    match inspector.process_next().await {
        Some(Update::GetterResolved {
            outcome: GetterOutcome::Resolved(_),
            ..
        }) => {}
        other => panic!("unexpected update {:?}", other),
    }
    assert_eq!(
        inspector.tree().node(now).unwrap().value_text().as_deref(),
        Some("9")
    );

    let x = child(inspector.tree(), ROOT, "x");
    inspector.begin_edit(x).unwrap();
    inspector.set_draft(x, "\"changed\"").unwrap();
    assert!(inspector.commit_edit(x).unwrap());
    inspector.settle().await;
    let x = child(inspector.tree(), ROOT, "x");
    assert_eq!(
        inspector.tree().node(x).unwrap().value_text().as_deref(),
        Some("\"changed\"")
    );
}

#[test]
fn flatten_skips_collapsed_subtrees() {
    let mut root = TreeNode::new(NodeId(0), NodeKind::placeholder("root"));
    let mut a = TreeNode::new(NodeId(1), NodeKind::placeholder("a"));
    a.children.push(TreeNode::new(NodeId(2), NodeKind::placeholder("hidden")));
    root.children.push(a);
    root.children.push(TreeNode::new(NodeId(3), NodeKind::placeholder("b")));
    let titles: Vec<String> = flatten_tree(&root).iter().map(|r| r.node.title()).collect();
    assert_eq!(titles, vec!["a", "b"]);
}

/// A backend that panics on every call.
#[derive(Debug)]
struct PanickingAgent;

#[async_trait]
impl RuntimeAgent for PanickingAgent {
    async fn enumerate_properties(&self, _: &ObjectId, _: bool) -> PropertyListing {
        panic!("enumerate_properties")
    }

    async fn get_own_properties(&self, _: &ObjectId) -> Option<Vec<PropertyDescriptor>> {
        panic!("get_own_properties")
    }

    async fn get_by_path(&self, _: &ObjectId, _: &[String]) -> Evaluation {
        panic!("get_by_path")
    }

    async fn call_function(&self, _: &ObjectId, _: &RemoteFunction) -> Evaluation {
        panic!("call_function")
    }

    async fn call_function_json(
        &self,
        _: &ObjectId,
        _: &RemoteFunction,
    ) -> Option<serde_json::Value> {
        panic!("call_function_json")
    }

    async fn set_property(
        &self,
        _: &ObjectId,
        _: &PropertyKey,
        _: &str,
    ) -> Result<(), ProtocolError> {
        panic!("set_property")
    }

    async fn delete_property(&self, _: &ObjectId, _: &PropertyKey) -> Result<(), ProtocolError> {
        panic!("delete_property")
    }

    async fn collection_entries(&self, _: &ObjectId) -> Option<Vec<CollectionEntry>> {
        panic!("collection_entries")
    }

    async fn scope_chain(&self, _: &ObjectId) -> Option<Vec<ScopeRecord>> {
        panic!("scope_chain")
    }

    async fn set_variable_value(&self, _: &ScopeRef, _: &str, _: &str) -> Result<(), ProtocolError> {
        panic!("set_variable_value")
    }
}

// A job that panics is reported as a failed population: the node
// collapses, nothing stays in flight, and it can be expanded again.
#[tokio::test]
async fn inspector_survives_panicking_job() {
    let tree = ObjectTree::new(
        Runtime::new(Arc::new(PanickingAgent)),
        Arc::new(InspectorConfig::default()),
        RemoteObject::object("mem:1", None, "Object"),
        SectionOptions::default(),
    );
    let mut inspector = Inspector::new(tree);
    assert!(inspector.expand(ROOT));
    match inspector.process_next().await {
        Some(Update::Populated {
            node: ROOT,
            applied: false,
        }) => {}
        other => panic!("unexpected update {:?}", other),
    }
    inspector.settle().await;
    assert_eq!(inspector.in_flight(), 0);
    let root = inspector.tree().root();
    assert!(!root.expanded);
    assert_eq!(root.state, PopulationState::Unpopulated);
    assert!(inspector.expand(ROOT));
    inspector.settle().await;
    assert_eq!(inspector.in_flight(), 0);
}
