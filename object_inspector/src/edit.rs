/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! In-place editing of property values.
//!
//! A node holds at most one [`EditSession`]. Committing turns the draft
//! into a remote mutation: an empty draft deletes the property, any
//! other text is evaluated as a source expression and assigned. The
//! tree only changes once the mutation is acknowledged; a rejection
//! reverts the edit and leaves the structure alone.

use futures::future::BoxFuture;
use futures::future::FutureExt;
use tracing::debug;

use crate::node::NodeId;
use crate::node::NodeKind;
use crate::node::PopulationState;
use crate::node::TreeNode;
use crate::node::value_text;
use crate::remote::PropertyDescriptor;
use crate::remote::PropertyKey;
use crate::remote::ProtocolError;
use crate::remote::RemoteObject;
use crate::runtime::Runtime;
use crate::tree::ObjectTree;
use crate::tree::Pending;
use crate::tree::find_node_mut;

/// Editing state of one node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EditSession {
    /// Text shown when the session began.
    pub previous_text: String,
    pub draft: String,
    /// A commit is waiting for the backend.
    pub pending_commit: bool,
    /// The node was expanded when editing began.
    pub was_expanded: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EditError {
    #[error("node {0} does not exist")]
    NoSuchNode(NodeId),
    #[error("node {0} is not editable")]
    NotEditable(NodeId),
    #[error("node {0} is already being edited")]
    AlreadyEditing(NodeId),
    #[error("node {0} is not being edited")]
    NotEditing(NodeId),
    #[error("a commit for node {0} is already in flight")]
    CommitInFlight(NodeId),
}

/// The remote mutation a commit performs.
#[derive(Clone, Debug, PartialEq)]
pub enum EditAction {
    Set(String),
    Delete,
}

/// A committed edit waiting to be sent.
#[derive(Debug)]
pub struct PendingEdit {
    pub node: NodeId,
    pub owner: RemoteObject,
    pub key: PropertyKey,
    pub action: EditAction,
    runtime: Runtime,
}

impl PendingEdit {
    pub fn run(self) -> BoxFuture<'static, EditCompletion> {
        async move {
            let result = match &self.action {
                EditAction::Set(expression) => {
                    self.runtime
                        .set_property(&self.owner, &self.key, expression)
                        .await
                }
                EditAction::Delete => self.runtime.delete_property(&self.owner, &self.key).await,
            };
            EditCompletion {
                node: self.node,
                action: self.action,
                result,
            }
        }
        .boxed()
    }
}

#[derive(Clone, Debug)]
pub struct EditCompletion {
    pub node: NodeId,
    pub action: EditAction,
    pub result: Result<(), ProtocolError>,
}

#[derive(Debug)]
pub enum CommitOutcome {
    /// The draft matched the previous text; nothing was sent.
    Cancelled(Option<Pending>),
    Submitted(PendingEdit),
}

#[derive(Debug)]
pub enum EditOutcome {
    /// The property was deleted and its node removed.
    Removed,
    /// The property was assigned; carries the re-population of the
    /// parent, if it is expanded.
    Updated(Option<Pending>),
    /// The backend rejected the mutation.
    Reverted {
        error: ProtocolError,
        pending: Option<Pending>,
    },
    /// The node disappeared while the mutation was in flight.
    Discarded,
}

/// The owner and descriptor an edit writes through, if `kind` can be
/// edited at all.
fn edit_target(kind: &NodeKind) -> Option<(&RemoteObject, &PropertyDescriptor)> {
    match kind {
        NodeKind::Property(node) if node.is_editable() => {
            node.owner.as_ref().map(|owner| (owner, &node.property))
        }
        NodeKind::Accessor(node) if node.is_editable() => {
            Some((&node.owner, &node.property))
        }
        _ => None,
    }
}

/// Initial edit text: strings quoted, everything else by description.
fn edit_text(kind: &NodeKind) -> String {
    let value = match kind {
        NodeKind::Property(node) => node.property.value.as_ref(),
        NodeKind::Accessor(node) => node.value(),
        _ => None,
    };
    value.map(|v| value_text(v, false)).unwrap_or_default()
}

/// Re-expands a node whose session ended, if it was expanded before.
fn restore_expansion(tree: &mut ObjectTree, id: NodeId, was_expanded: bool) -> Option<Pending> {
    if was_expanded { tree.expand(id) } else { None }
}

impl ObjectTree {
    /// Starts editing `id`. The node hides its children while editing.
    pub fn begin_edit(&mut self, id: NodeId) -> Result<&EditSession, EditError> {
        let editable = self.editable;
        let node = find_node_mut(&mut self.root, id).ok_or(EditError::NoSuchNode(id))?;
        if node.edit.is_some() {
            return Err(EditError::AlreadyEditing(id));
        }
        if !editable || edit_target(&node.kind).is_none() {
            return Err(EditError::NotEditable(id));
        }
        let text = edit_text(&node.kind);
        let was_expanded = node.expanded;
        node.expanded = false;
        if node.state == PopulationState::Populating {
            node.generation += 1;
            node.state = PopulationState::Unpopulated;
        }
        Ok(&*node.edit.insert(EditSession {
            previous_text: text.clone(),
            draft: text,
            pending_commit: false,
            was_expanded,
        }))
    }

    pub fn edit_session(&self, id: NodeId) -> Option<&EditSession> {
        self.node(id).and_then(|node| node.edit.as_ref())
    }

    pub fn set_draft(&mut self, id: NodeId, text: &str) -> Result<(), EditError> {
        let session = session_mut(&mut self.root, id)?;
        if session.pending_commit {
            return Err(EditError::CommitInFlight(id));
        }
        session.draft = text.to_string();
        Ok(())
    }

    /// Abandons the session and restores the node's expansion.
    pub fn cancel_edit(&mut self, id: NodeId) -> Result<Option<Pending>, EditError> {
        let session = session_mut(&mut self.root, id)?;
        if session.pending_commit {
            return Err(EditError::CommitInFlight(id));
        }
        let was_expanded = session.was_expanded;
        if let Some(node) = find_node_mut(&mut self.root, id) {
            node.edit = None;
        }
        Ok(restore_expansion(self, id, was_expanded))
    }

    /// Commits the draft of `id`.
    pub fn commit_edit(&mut self, id: NodeId) -> Result<CommitOutcome, EditError> {
        let session = session_mut(&mut self.root, id)?;
        if session.pending_commit {
            return Err(EditError::CommitInFlight(id));
        }
        if session.draft == session.previous_text {
            return self.cancel_edit(id).map(CommitOutcome::Cancelled);
        }
        let expression = session.draft.trim().to_string();
        session.pending_commit = true;

        let node = find_node_mut(&mut self.root, id).ok_or(EditError::NoSuchNode(id))?;
        let (owner, property) = edit_target(&node.kind).ok_or(EditError::NotEditable(id))?;
        let action = if expression.is_empty() {
            EditAction::Delete
        } else {
            EditAction::Set(expression)
        };
        Ok(CommitOutcome::Submitted(PendingEdit {
            node: id,
            owner: owner.clone(),
            key: property.key(),
            action,
            runtime: self.runtime.clone(),
        }))
    }

    /// Applies the backend's answer to a committed edit.
    pub fn complete_edit(&mut self, completion: EditCompletion) -> EditOutcome {
        let EditCompletion { node: id, action, result } = completion;
        let Some(node) = find_node_mut(&mut self.root, id) else {
            debug!(node = %id, "discarding edit result for removed node");
            return EditOutcome::Discarded;
        };
        let was_expanded = node.edit.take().is_some_and(|s| s.was_expanded);

        if let Err(error) = result {
            debug!(node = %id, "edit rejected: {}", error);
            let pending = restore_expansion(self, id, was_expanded);
            return EditOutcome::Reverted { error, pending };
        }
        match action {
            EditAction::Delete => {
                self.remove(id);
                EditOutcome::Removed
            }
            EditAction::Set(_) => {
                let pending = self.invalidate_parent(id);
                EditOutcome::Updated(pending)
            }
        }
    }

    /// Refreshes the siblings of `id` after one of them changed.
    fn invalidate_parent(&mut self, id: NodeId) -> Option<Pending> {
        let parent = self.parent_of(id)?.id;
        self.invalidate(parent)
    }
}

fn session_mut(root: &mut TreeNode, id: NodeId) -> Result<&mut EditSession, EditError> {
    let node = find_node_mut(root, id).ok_or(EditError::NoSuchNode(id))?;
    node.edit.as_mut().ok_or(EditError::NotEditing(id))
}
