/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Shared fixtures for unit tests.

use std::sync::Arc;

use crate::config::InspectorConfig;
use crate::memory::Handle;
use crate::memory::MemoryRuntime;
use crate::node::NodeId;
use crate::node::SectionOptions;
use crate::node::TreeNode;
use crate::runtime::Runtime;
use crate::tree::ApplyOutcome;
use crate::tree::ObjectTree;
use crate::tree::Pending;

pub(crate) fn memory_tree(
    memory: &Arc<MemoryRuntime>,
    root: Handle,
    options: SectionOptions,
) -> ObjectTree {
    memory_tree_with_config(memory, root, options, InspectorConfig::default())
}

pub(crate) fn memory_tree_with_config(
    memory: &Arc<MemoryRuntime>,
    root: Handle,
    options: SectionOptions,
    config: InspectorConfig,
) -> ObjectTree {
    ObjectTree::new(
        Runtime::new(memory.clone()),
        Arc::new(config),
        memory.remote_object(root),
        options,
    )
}

/// Runs `pending` and every job it triggers, applying each result.
pub(crate) async fn drive(tree: &mut ObjectTree, pending: Option<Pending>) {
    let mut queue: Vec<Pending> = pending.into_iter().collect();
    while let Some(pending) = queue.pop() {
        if let ApplyOutcome::Applied(follow_ups) = tree.complete(pending.run().await) {
            queue.extend(follow_ups);
        }
    }
}

/// Expands `id` and waits for its population.
pub(crate) async fn expand_now(tree: &mut ObjectTree, id: NodeId) {
    let pending = tree.expand(id);
    drive(tree, pending).await;
}

pub(crate) fn titles(node: &TreeNode) -> Vec<String> {
    node.children.iter().map(|c| c.title()).collect()
}

/// The child of `parent` titled `title`.
pub(crate) fn child(tree: &ObjectTree, parent: NodeId, title: &str) -> NodeId {
    tree.node(parent)
        .and_then(|p| p.children.iter().find(|c| c.title() == title))
        .map(|c| c.id)
        .unwrap_or_else(|| panic!("no child '{}' under {}", title, parent))
}
