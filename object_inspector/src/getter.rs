/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Deferred accessor invocation.
//!
//! Getters may have side effects, so an accessor node shows `(...)` and
//! makes no remote call until it is explicitly activated.

use futures::future::BoxFuture;
use futures::future::FutureExt;
use tracing::debug;

use crate::node::NodeId;
use crate::node::NodeKind;
use crate::remote::Evaluation;
use crate::remote::RemoteObject;
use crate::runtime::Runtime;
use crate::tree::Discard;
use crate::tree::ObjectTree;
use crate::tree::Pending;
use crate::tree::find_node_mut;

/// A getter invocation waiting to be sent.
#[derive(Debug)]
pub struct PendingGetter {
    pub node: NodeId,
    pub generation: u64,
    owner: RemoteObject,
    name: String,
    runtime: Runtime,
}

impl PendingGetter {
    pub fn run(self) -> BoxFuture<'static, GetterCompletion> {
        async move {
            let evaluation = self
                .runtime
                .get_by_path(&self.owner, std::slice::from_ref(&self.name))
                .await;
            GetterCompletion {
                node: self.node,
                generation: self.generation,
                evaluation,
            }
        }
        .boxed()
    }
}

#[derive(Clone, Debug)]
pub struct GetterCompletion {
    pub node: NodeId,
    pub generation: u64,
    pub evaluation: Evaluation,
}

#[derive(Debug)]
pub enum GetterOutcome {
    /// The accessor now shows the returned value. Carries the
    /// re-population of the node, if it is expanded.
    Resolved(Option<Pending>),
    /// The getter threw; the node shows the exception and cannot be
    /// expanded.
    Failed,
    /// No value came back; the node stays deferred.
    Deferred,
    Discarded(Discard),
}

impl ObjectTree {
    /// Activates the deferred accessor `id`. Returns `None` when the
    /// node is not a deferred accessor or its getter is already
    /// running.
    pub fn invoke_getter(&mut self, id: NodeId) -> Option<PendingGetter> {
        let node = find_node_mut(&mut self.root, id)?;
        let generation = node.generation;
        let NodeKind::Accessor(accessor) = &mut node.kind else {
            return None;
        };
        if !accessor.is_deferred() || accessor.invoking {
            return None;
        }
        accessor.invoking = true;
        Some(PendingGetter {
            node: id,
            generation,
            owner: accessor.owner.clone(),
            name: accessor.property.name.clone(),
            runtime: self.runtime.clone(),
        })
    }

    pub fn complete_getter(&mut self, completion: GetterCompletion) -> GetterOutcome {
        let GetterCompletion {
            node: id,
            generation,
            evaluation,
        } = completion;
        let Some(node) = find_node_mut(&mut self.root, id) else {
            debug!(node = %id, "discarding getter result for removed node");
            return GetterOutcome::Discarded(Discard::NodeGone);
        };
        let current = node.generation;
        let NodeKind::Accessor(accessor) = &mut node.kind else {
            return GetterOutcome::Discarded(Discard::NodeGone);
        };
        accessor.invoking = false;
        if current != generation {
            debug!(node = %id, generation, current, "discarding stale getter result");
            return GetterOutcome::Discarded(Discard::Stale);
        }
        if evaluation.value.is_none() {
            return GetterOutcome::Deferred;
        }
        let thrown = evaluation.was_thrown;
        accessor.resolved = Some(evaluation);
        if thrown {
            return GetterOutcome::Failed;
        }
        GetterOutcome::Resolved(self.invalidate(id))
    }
}
