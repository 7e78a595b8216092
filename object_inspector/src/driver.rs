/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Async driver for an [`ObjectTree`].
//!
//! [`Inspector`] owns the tree, spawns every remote job on the tokio
//! runtime, and applies results one at a time, in arrival order, as
//! they come back over a channel. Responses may arrive in any order;
//! the tree's generation checks decide which of them still apply.

use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::future::FutureExt;
use tokio::sync::mpsc;
use tracing::debug;
use tracing::error;

use crate::edit::CommitOutcome;
use crate::edit::EditCompletion;
use crate::edit::EditError;
use crate::edit::EditOutcome;
use crate::getter::GetterCompletion;
use crate::getter::GetterOutcome;
use crate::node::NodeId;
use crate::remote::Evaluation;
use crate::remote::ProtocolError;
use crate::tree::ApplyOutcome;
use crate::tree::Completion;
use crate::tree::ObjectTree;
use crate::tree::Pending;
use crate::tree::flatten_tree;

#[derive(Debug)]
enum Event {
    Populated(Completion),
    /// A population task panicked.
    Abandoned { node: NodeId, generation: u64 },
    Edited(EditCompletion),
    GetterResolved(GetterCompletion),
}

/// What applying one event did to the tree.
#[derive(Debug)]
pub enum Update {
    Populated { node: NodeId, applied: bool },
    Edited { node: NodeId, outcome: EditOutcome },
    GetterResolved { node: NodeId, outcome: GetterOutcome },
}

pub struct Inspector {
    tree: ObjectTree,
    sender: mpsc::UnboundedSender<Event>,
    receiver: mpsc::UnboundedReceiver<Event>,
    in_flight: usize,
}

impl Inspector {
    pub fn new(tree: ObjectTree) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            tree,
            sender,
            receiver,
            in_flight: 0,
        }
    }

    pub fn tree(&self) -> &ObjectTree {
        &self.tree
    }

    pub fn into_tree(self) -> ObjectTree {
        self.tree
    }

    /// Number of spawned jobs whose results have not been applied.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Spawns `task`; a panic inside it is reported as `on_panic` so
    /// that every spawned task yields exactly one event.
    fn spawn<F>(&mut self, task: F, on_panic: Event)
    where
        F: Future<Output = Event> + Send + 'static,
    {
        self.in_flight += 1;
        let sender = self.sender.clone();
        tokio::spawn(async move {
            let event = match AssertUnwindSafe(task).catch_unwind().await {
                Ok(event) => event,
                Err(_) => {
                    error!("inspector task panicked");
                    on_panic
                }
            };
            // The receiver lives as long as the inspector.
            let _ = sender.send(event);
        });
    }

    fn spawn_population(&mut self, pending: Option<Pending>) {
        let Some(pending) = pending else {
            return;
        };
        let on_panic = Event::Abandoned {
            node: pending.node,
            generation: pending.generation,
        };
        self.spawn(pending.run().map(Event::Populated), on_panic);
    }

    /// Expands `id`; returns whether a population job was issued.
    pub fn expand(&mut self, id: NodeId) -> bool {
        let pending = self.tree.expand(id);
        let issued = pending.is_some();
        self.spawn_population(pending);
        issued
    }

    pub fn collapse(&mut self, id: NodeId) {
        self.tree.collapse(id);
    }

    pub fn invalidate(&mut self, id: NodeId) {
        let pending = self.tree.invalidate(id);
        self.spawn_population(pending);
    }

    pub fn begin_edit(&mut self, id: NodeId) -> Result<(), EditError> {
        self.tree.begin_edit(id).map(|_| ())
    }

    pub fn set_draft(&mut self, id: NodeId, text: &str) -> Result<(), EditError> {
        self.tree.set_draft(id, text)
    }

    pub fn cancel_edit(&mut self, id: NodeId) -> Result<(), EditError> {
        let pending = self.tree.cancel_edit(id)?;
        self.spawn_population(pending);
        Ok(())
    }

    /// Commits the draft of `id`; returns whether a mutation was sent.
    pub fn commit_edit(&mut self, id: NodeId) -> Result<bool, EditError> {
        match self.tree.commit_edit(id)? {
            CommitOutcome::Cancelled(pending) => {
                self.spawn_population(pending);
                Ok(false)
            }
            CommitOutcome::Submitted(edit) => {
                let on_panic = Event::Edited(EditCompletion {
                    node: edit.node,
                    action: edit.action.clone(),
                    result: Err(ProtocolError::new("edit task panicked")),
                });
                self.spawn(edit.run().map(Event::Edited), on_panic);
                Ok(true)
            }
        }
    }

    /// Activates the deferred accessor `id`; returns whether a getter
    /// call was issued.
    pub fn invoke_getter(&mut self, id: NodeId) -> bool {
        let Some(getter) = self.tree.invoke_getter(id) else {
            return false;
        };
        let on_panic = Event::GetterResolved(GetterCompletion {
            node: getter.node,
            generation: getter.generation,
            evaluation: Evaluation::none(),
        });
        self.spawn(getter.run().map(Event::GetterResolved), on_panic);
        true
    }

    /// Waits for the next result and applies it. Returns `None` when
    /// nothing is in flight.
    pub async fn process_next(&mut self) -> Option<Update> {
        if self.in_flight == 0 {
            return None;
        }
        let event = self.receiver.recv().await?;
        self.in_flight -= 1;
        let update = match event {
            Event::Populated(completion) => {
                let node = completion.node;
                match self.tree.complete(completion) {
                    ApplyOutcome::Applied(follow_ups) => {
                        for pending in follow_ups {
                            self.spawn_population(Some(pending));
                        }
                        Update::Populated {
                            node,
                            applied: true,
                        }
                    }
                    ApplyOutcome::Discarded(reason) => {
                        debug!(node = %node, ?reason, "population discarded");
                        Update::Populated {
                            node,
                            applied: false,
                        }
                    }
                }
            }
            Event::Abandoned { node, generation } => {
                self.tree.abandon(node, generation);
                Update::Populated {
                    node,
                    applied: false,
                }
            }
            Event::Edited(completion) => {
                let node = completion.node;
                let mut outcome = self.tree.complete_edit(completion);
                match &mut outcome {
                    EditOutcome::Updated(pending) | EditOutcome::Reverted { pending, .. } => {
                        self.spawn_population(pending.take());
                    }
                    EditOutcome::Removed | EditOutcome::Discarded => {}
                }
                Update::Edited { node, outcome }
            }
            Event::GetterResolved(completion) => {
                let node = completion.node;
                let mut outcome = self.tree.complete_getter(completion);
                if let GetterOutcome::Resolved(pending) = &mut outcome {
                    self.spawn_population(pending.take());
                }
                Update::GetterResolved { node, outcome }
            }
        };
        Some(update)
    }

    /// Applies results until nothing is in flight.
    pub async fn settle(&mut self) {
        while self.process_next().await.is_some() {}
    }

    /// Expands every expandable node up to `depth` levels below the
    /// root and waits for all populations.
    pub async fn expand_to_depth(&mut self, depth: usize) {
        self.expand(NodeId(0));
        self.settle().await;
        for level in 0..depth {
            let targets: Vec<NodeId> = flatten_tree(self.tree.root())
                .into_iter()
                .filter(|row| row.depth == level && !row.node.expanded && row.node.has_children())
                .map(|row| row.node.id)
                .collect();
            if targets.is_empty() {
                break;
            }
            for id in targets {
                self.expand(id);
            }
            self.settle().await;
        }
    }
}
