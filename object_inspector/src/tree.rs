/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! The inspected tree and its population state machine.
//!
//! [`ObjectTree`] is the single owner of every [`TreeNode`]. Mutations
//! are synchronous; remote work is handed out as [`Pending`] jobs that
//! the caller runs (on any executor, in any order) and feeds back
//! through [`ObjectTree::complete`]. A completion only applies when its
//! captured generation still matches the node's, so collapsing or
//! invalidating a node is enough to make in-flight results inert.

use std::ops::ControlFlow;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::future::FutureExt;
use tracing::debug;

use crate::config::InspectorConfig;
use crate::node::Expandable;
use crate::node::NodeId;
use crate::node::NodeKind;
use crate::node::PopulateContext;
use crate::node::PopulationState;
use crate::node::SectionNode;
use crate::node::SectionOptions;
use crate::node::TreeNode;
use crate::populate::PopulateJob;
use crate::populate::Population;
use crate::remote::RemoteObject;
use crate::runtime::Runtime;

/// A population job detached from the tree.
#[derive(Debug)]
pub struct Pending {
    pub node: NodeId,
    /// Generation of `node` when the job was issued.
    pub generation: u64,
    job: PopulateJob,
    runtime: Runtime,
    config: Arc<InspectorConfig>,
}

impl Pending {
    pub fn job(&self) -> &PopulateJob {
        &self.job
    }

    pub fn run(self) -> BoxFuture<'static, Completion> {
        async move {
            let population = self.job.run(&self.runtime, &self.config).await;
            Completion {
                node: self.node,
                generation: self.generation,
                population,
            }
        }
        .boxed()
    }
}

/// Result of a [`Pending`] job, to be applied with
/// [`ObjectTree::complete`].
#[derive(Clone, Debug)]
pub struct Completion {
    pub node: NodeId,
    pub generation: u64,
    pub population: Population,
}

/// Why a result was dropped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Discard {
    /// The node was collapsed or invalidated after the job was issued.
    Stale,
    /// The node no longer exists.
    NodeGone,
}

#[derive(Debug)]
pub enum ApplyOutcome {
    /// Children were installed. Carries the jobs of auto-expanding
    /// children.
    Applied(Vec<Pending>),
    Discarded(Discard),
}

impl ApplyOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, ApplyOutcome::Applied(_))
    }
}

/// One visible row.
#[derive(Debug, Clone, Copy)]
pub struct FlatRow<'a> {
    pub node: &'a TreeNode,
    pub depth: usize,
}

/// The inspected tree, rooted at a section node for one value.
#[derive(Debug)]
pub struct ObjectTree {
    pub(crate) root: TreeNode,
    next_id: u64,
    pub(crate) runtime: Runtime,
    pub(crate) config: Arc<InspectorConfig>,
    skip_proto: bool,
    pub(crate) editable: bool,
}

impl ObjectTree {
    pub fn new(
        runtime: Runtime,
        config: Arc<InspectorConfig>,
        object: RemoteObject,
        options: SectionOptions,
    ) -> Self {
        let skip_proto = options.skip_proto;
        let editable = options.editable;
        let root = TreeNode::new(NodeId(0), NodeKind::Section(SectionNode { object, options }));
        Self {
            root,
            next_id: 1,
            runtime,
            config,
            skip_proto,
            editable,
        }
    }

    pub fn root(&self) -> &TreeNode {
        &self.root
    }

    pub fn config(&self) -> &Arc<InspectorConfig> {
        &self.config
    }

    pub fn node(&self, id: NodeId) -> Option<&TreeNode> {
        find_node(&self.root, id)
    }

    /// Marks `id` expanded and, if it was never populated, returns the
    /// job that populates it. Expanding a node that is already
    /// populating (or populated) issues nothing.
    pub fn expand(&mut self, id: NodeId) -> Option<Pending> {
        let node = find_node_mut(&mut self.root, id)?;
        if !node.has_children() {
            return None;
        }
        node.expanded = true;
        match node.state {
            PopulationState::Unpopulated => {
                begin_population(node, &self.runtime, &self.config, self.skip_proto)
            }
            PopulationState::Populating | PopulationState::Populated => None,
        }
    }

    /// Collapses `id`. A population in flight is left to finish but its
    /// result will be discarded.
    pub fn collapse(&mut self, id: NodeId) {
        if let Some(node) = find_node_mut(&mut self.root, id) {
            collapse_node(node);
        }
    }

    /// Collapses every node of the tree.
    pub fn collapse_all(&mut self) {
        let _ = fold_tree_mut(&mut self.root, &mut |n| {
            collapse_node(n);
            ControlFlow::<()>::Continue(())
        });
    }

    /// Drops the children of `id` and forces a fresh population. An
    /// expanded node re-populates immediately.
    pub fn invalidate(&mut self, id: NodeId) -> Option<Pending> {
        let node = find_node_mut(&mut self.root, id)?;
        node.children.clear();
        node.generation += 1;
        node.state = PopulationState::Unpopulated;
        if node.expanded && node.has_children() {
            begin_population(node, &self.runtime, &self.config, self.skip_proto)
        } else {
            None
        }
    }

    /// Applies a finished population job.
    pub fn complete(&mut self, completion: Completion) -> ApplyOutcome {
        let Completion {
            node: id,
            generation,
            population,
        } = completion;
        let Some(node) = find_node_mut(&mut self.root, id) else {
            debug!(node = %id, "discarding population for removed node");
            return ApplyOutcome::Discarded(Discard::NodeGone);
        };
        if node.generation != generation || node.state != PopulationState::Populating {
            debug!(
                node = %id,
                generation,
                current = node.generation,
                "discarding stale population"
            );
            return ApplyOutcome::Discarded(Discard::Stale);
        }

        if let (NodeKind::Entries(entries), Some(count)) = (&mut node.kind, population.entry_count) {
            entries.count = Some(count);
        }
        node.children = population
            .children
            .into_iter()
            .map(|kind| {
                let child = TreeNode::new(NodeId(self.next_id), kind);
                self.next_id += 1;
                child
            })
            .collect();
        node.state = PopulationState::Populated;

        let mut follow_ups = Vec::new();
        for child in node.children.iter_mut() {
            if child.kind.auto_expand() {
                child.expanded = true;
                follow_ups.extend(begin_population(
                    child,
                    &self.runtime,
                    &self.config,
                    self.skip_proto,
                ));
            }
        }
        ApplyOutcome::Applied(follow_ups)
    }

    /// Gives up on the population of `id` issued at `generation`: the
    /// node collapses and the next expand issues a fresh job. Returns
    /// whether the node was reset.
    pub fn abandon(&mut self, id: NodeId, generation: u64) -> bool {
        let Some(node) = find_node_mut(&mut self.root, id) else {
            return false;
        };
        if node.generation != generation || node.state != PopulationState::Populating {
            return false;
        }
        collapse_node(node);
        true
    }

    /// Dotted path of property names from the root down to `id`.
    pub fn property_path(&self, id: NodeId) -> Option<String> {
        let chain = path_to(&self.root, id)?;
        let names: Vec<&str> = chain
            .iter()
            .filter_map(|n| n.kind.property().map(|p| p.name.as_str()))
            .collect();
        Some(names.join("."))
    }

    pub fn parent_of(&self, id: NodeId) -> Option<&TreeNode> {
        let chain = path_to(&self.root, id)?;
        chain.len().checked_sub(2).map(|i| chain[i])
    }

    /// Removes `id` (and its subtree) from its parent.
    pub(crate) fn remove(&mut self, id: NodeId) -> Option<TreeNode> {
        let parent = find_parent_mut(&mut self.root, id)?;
        let index = parent.children.iter().position(|c| c.id == id)?;
        Some(parent.children.remove(index))
    }
}

fn collapse_node(node: &mut TreeNode) {
    node.expanded = false;
    if node.state == PopulationState::Populating {
        node.generation += 1;
        node.state = PopulationState::Unpopulated;
    }
}

/// Issues the population job for `node`. Nodes with nothing to fetch
/// become populated right away.
pub(crate) fn begin_population(
    node: &mut TreeNode,
    runtime: &Runtime,
    config: &Arc<InspectorConfig>,
    skip_proto: bool,
) -> Option<Pending> {
    let context = PopulateContext {
        config,
        skip_proto,
    };
    let Some(job) = node.kind.populate_job(&context) else {
        node.state = PopulationState::Populated;
        return None;
    };
    node.state = PopulationState::Populating;
    Some(Pending {
        node: node.id,
        generation: node.generation,
        job,
        runtime: runtime.clone(),
        config: Arc::clone(config),
    })
}

/// Flatten a tree into visible rows.
///
/// The root itself is not a row; only expanded nodes contribute their
/// children.
pub fn flatten_tree(root: &TreeNode) -> Vec<FlatRow<'_>> {
    root.children
        .iter()
        .flat_map(|child| flatten_visible(child, 0))
        .collect()
}

/// Includes the current node and, if it is expanded, its children.
pub(crate) fn flatten_visible<'a>(node: &'a TreeNode, depth: usize) -> Vec<FlatRow<'a>> {
    fold_tree_with_depth(node, depth, &|n, d, child_results| {
        let mut rows = vec![FlatRow { node: n, depth: d }];
        if n.expanded {
            for child_rows in child_results {
                rows.extend(child_rows);
            }
        }
        rows
    })
}

/// Immutable tree fold with depth tracking.
///
/// Applies `f` to each (node, depth) in post-order, handing it the
/// results already computed for the node's children.
pub(crate) fn fold_tree_with_depth<'a, B, F>(node: &'a TreeNode, depth: usize, f: &F) -> B
where
    F: Fn(&'a TreeNode, usize, Vec<B>) -> B,
{
    let child_results: Vec<B> = node
        .children
        .iter()
        .map(|child| fold_tree_with_depth(child, depth + 1, f))
        .collect();
    f(node, depth, child_results)
}

/// Mutable tree fold with early-exit via ControlFlow.
pub(crate) fn fold_tree_mut<B, F>(node: &mut TreeNode, f: &mut F) -> ControlFlow<B>
where
    F: for<'a> FnMut(&'a mut TreeNode) -> ControlFlow<B>,
{
    f(node)?;
    for child in &mut node.children {
        fold_tree_mut(child, f)?;
    }
    ControlFlow::Continue(())
}

pub(crate) fn find_node(node: &TreeNode, id: NodeId) -> Option<&TreeNode> {
    if node.id == id {
        return Some(node);
    }
    node.children.iter().find_map(|child| find_node(child, id))
}

pub(crate) fn find_node_mut(node: &mut TreeNode, id: NodeId) -> Option<&mut TreeNode> {
    if node.id == id {
        return Some(node);
    }
    node.children
        .iter_mut()
        .find_map(|child| find_node_mut(child, id))
}

pub(crate) fn find_parent_mut(node: &mut TreeNode, id: NodeId) -> Option<&mut TreeNode> {
    if node.children.iter().any(|c| c.id == id) {
        return Some(node);
    }
    node.children
        .iter_mut()
        .find_map(|child| find_parent_mut(child, id))
}

/// Nodes from `node` down to `id`, inclusive.
fn path_to(node: &TreeNode, id: NodeId) -> Option<Vec<&TreeNode>> {
    if node.id == id {
        return Some(vec![node]);
    }
    node.children.iter().find_map(|child| {
        let mut chain = path_to(child, id)?;
        chain.insert(0, node);
        Some(chain)
    })
}
