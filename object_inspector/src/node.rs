/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Tree node types.
//!
//! Every node is a [`TreeNode`] carrying a population state machine;
//! what it shows and how it populates is decided by its [`NodeKind`],
//! a closed set of variants behind the [`Expandable`] capability.

use std::fmt;

use crate::bucket::BucketRange;
use crate::config::InspectorConfig;
use crate::edit::EditSession;
use crate::populate::PopulateJob;
use crate::populate::PropertiesJob;
use crate::populate::RangeJob;
use crate::populate::ValueJob;
use crate::remote::Evaluation;
use crate::remote::PropertyDescriptor;
use crate::remote::RemoteObject;
use crate::remote::ValueType;

/// Stable identity of a node within one [`crate::tree::ObjectTree`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Population state of a node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PopulationState {
    Unpopulated,
    /// A population job is in flight for the node's current generation.
    Populating,
    Populated,
}

/// Options of the root section.
#[derive(Clone, Debug, PartialEq)]
pub struct SectionOptions {
    /// Include inherited accessors when listing the root's properties.
    pub ignore_has_own_property: bool,
    /// Descriptors appended to the root's own properties.
    pub extra_properties: Vec<PropertyDescriptor>,
    /// Caption of the placeholder shown when the root has nothing to
    /// list.
    pub empty_placeholder: Option<String>,
    /// Hide the prototype link everywhere in the tree.
    pub skip_proto: bool,
    /// Whether property values may be edited.
    pub editable: bool,
}

impl Default for SectionOptions {
    fn default() -> Self {
        Self {
            ignore_has_own_property: false,
            extra_properties: Vec::new(),
            empty_placeholder: None,
            skip_proto: false,
            editable: true,
        }
    }
}

/// Inputs shared by every node when deciding how to populate.
#[derive(Clone, Copy, Debug)]
pub struct PopulateContext<'a> {
    pub config: &'a InspectorConfig,
    pub skip_proto: bool,
}

/// The capability every node kind provides to the tree.
pub trait Expandable {
    /// Caption shown for the node.
    fn title(&self) -> String;

    /// Whether expanding the node may reveal children.
    fn has_children(&self) -> bool;

    /// The job that fetches this node's children, if any.
    fn populate_job(&self, context: &PopulateContext<'_>) -> Option<PopulateJob>;

    /// Expand as soon as the node is materialized.
    fn auto_expand(&self) -> bool {
        false
    }
}

/// The inspected value itself.
#[derive(Clone, Debug, PartialEq)]
pub struct SectionNode {
    pub object: RemoteObject,
    pub options: SectionOptions,
}

impl Expandable for SectionNode {
    fn title(&self) -> String {
        self.object.description().to_string()
    }

    fn has_children(&self) -> bool {
        true
    }

    fn populate_job(&self, context: &PopulateContext<'_>) -> Option<PopulateJob> {
        Some(PopulateJob::Value(ValueJob::for_value(
            self.object.clone(),
            context.config,
            PropertiesJob {
                object: self.object.clone(),
                include_inherited: self.options.ignore_has_own_property,
                extra_properties: self.options.extra_properties.clone(),
                skip_proto: self.options.skip_proto,
                placeholder: self.options.empty_placeholder.clone(),
            },
        )))
    }
}

/// One property of an owning value.
#[derive(Clone, Debug, PartialEq)]
pub struct PropertyNode {
    pub property: PropertyDescriptor,
    /// The value the property belongs to; `None` for synthetic entries
    /// such as global scopes.
    pub owner: Option<RemoteObject>,
    /// Never editable (bucket leaves, internal properties, ...).
    pub read_only: bool,
}

impl PropertyNode {
    /// Text shown (and edited) for the value.
    pub fn value_text(&self) -> String {
        match &self.property.value {
            Some(value) => value_text(value, self.property.was_thrown),
            None if self.property.getter.is_some() => "(...)".to_string(),
            None => "<unreadable>".to_string(),
        }
    }

    pub fn is_editable(&self) -> bool {
        !self.read_only
            && self.owner.is_some()
            && (self.property.writable || self.property.setter.is_some())
    }
}

/// Formats a value for display: quoted strings, full function source,
/// and `[Exception: ...]` for thrown values.
pub fn value_text(value: &RemoteObject, was_thrown: bool) -> String {
    if was_thrown {
        return format!("[Exception: {}]", value.description());
    }
    match value.value_type {
        ValueType::String => format!("\"{}\"", value.description()),
        _ => value.description().to_string(),
    }
}

fn job_for_property_value(
    value: &RemoteObject,
    was_thrown: bool,
    context: &PopulateContext<'_>,
) -> Option<PopulateJob> {
    if was_thrown || !value.has_children() {
        return None;
    }
    Some(PopulateJob::Value(ValueJob::for_value(
        value.clone(),
        context.config,
        PropertiesJob {
            object: value.clone(),
            include_inherited: true,
            extra_properties: Vec::new(),
            skip_proto: context.skip_proto,
            placeholder: None,
        },
    )))
}

impl Expandable for PropertyNode {
    fn title(&self) -> String {
        self.property.name.clone()
    }

    fn has_children(&self) -> bool {
        self.property
            .value
            .as_ref()
            .is_some_and(|v| v.has_children() && !self.property.was_thrown)
    }

    fn populate_job(&self, context: &PopulateContext<'_>) -> Option<PopulateJob> {
        let value = self.property.value.as_ref()?;
        job_for_property_value(value, self.property.was_thrown, context)
    }
}

/// An accessor property whose getter has not been invoked yet.
#[derive(Clone, Debug, PartialEq)]
pub struct AccessorNode {
    pub property: PropertyDescriptor,
    pub owner: RemoteObject,
    /// Outcome of the getter, once invoked.
    pub resolved: Option<Evaluation>,
    /// The getter call is in flight.
    pub invoking: bool,
    /// Never editable, even with a setter (fragment leaves).
    pub read_only: bool,
}

impl AccessorNode {
    pub fn value(&self) -> Option<&RemoteObject> {
        self.resolved.as_ref().and_then(|r| r.value.as_ref())
    }

    pub fn was_thrown(&self) -> bool {
        self.resolved.as_ref().is_some_and(|r| r.was_thrown)
    }

    pub fn is_deferred(&self) -> bool {
        self.value().is_none()
    }

    pub fn is_editable(&self) -> bool {
        !self.read_only && self.property.setter.is_some()
    }

    pub fn value_text(&self) -> String {
        match self.value() {
            Some(value) => value_text(value, self.was_thrown()),
            None => "(...)".to_string(),
        }
    }
}

impl Expandable for AccessorNode {
    fn title(&self) -> String {
        self.property.name.clone()
    }

    fn has_children(&self) -> bool {
        self.value()
            .is_some_and(|v| v.has_children() && !self.was_thrown())
    }

    fn populate_job(&self, context: &PopulateContext<'_>) -> Option<PopulateJob> {
        let value = self.value()?;
        job_for_property_value(value, self.was_thrown(), context)
    }
}

/// A window of indices of a large indexed collection.
#[derive(Clone, Debug, PartialEq)]
pub struct BucketNode {
    pub object: RemoteObject,
    pub range: BucketRange,
}

impl Expandable for BucketNode {
    fn title(&self) -> String {
        format!("[{} \u{2026} {}]", self.range.from, self.range.to)
    }

    fn has_children(&self) -> bool {
        true
    }

    fn populate_job(&self, context: &PopulateContext<'_>) -> Option<PopulateJob> {
        let BucketRange { from, to, count } = self.range;
        if count <= context.config.bucket_threshold {
            Some(PopulateJob::Fragment {
                object: self.object.clone(),
                from,
                to,
            })
        } else {
            Some(PopulateJob::Value(ValueJob::Range(RangeJob {
                object: self.object.clone(),
                from,
                to,
                top_level: false,
                placeholder: None,
            })))
        }
    }
}

/// One non-object scope of a function's scope chain.
#[derive(Clone, Debug, PartialEq)]
pub struct ScopeNode {
    pub title: String,
    /// The scope object; carries its [`crate::remote::ScopeRef`].
    pub object: RemoteObject,
}

impl Expandable for ScopeNode {
    fn title(&self) -> String {
        self.title.clone()
    }

    fn has_children(&self) -> bool {
        true
    }

    fn populate_job(&self, _context: &PopulateContext<'_>) -> Option<PopulateJob> {
        Some(PopulateJob::Value(ValueJob::Properties(PropertiesJob {
            object: self.object.clone(),
            include_inherited: true,
            extra_properties: Vec::new(),
            skip_proto: false,
            placeholder: None,
        })))
    }
}

/// `<entries>` of a keyed or iterable collection.
#[derive(Clone, Debug, PartialEq)]
pub struct EntriesNode {
    pub object: RemoteObject,
    /// Number of entries, known once populated.
    pub count: Option<usize>,
}

impl Expandable for EntriesNode {
    fn title(&self) -> String {
        match self.count {
            Some(count) => format!("<entries>[{}]", count),
            None => "<entries>".to_string(),
        }
    }

    fn has_children(&self) -> bool {
        true
    }

    fn populate_job(&self, _context: &PopulateContext<'_>) -> Option<PopulateJob> {
        Some(PopulateJob::Entries {
            object: self.object.clone(),
        })
    }

    fn auto_expand(&self) -> bool {
        true
    }
}

/// `<function scope>` of a non-bound function.
#[derive(Clone, Debug, PartialEq)]
pub struct FunctionScopesNode {
    pub function: RemoteObject,
}

impl Expandable for FunctionScopesNode {
    fn title(&self) -> String {
        "<function scope>".to_string()
    }

    fn has_children(&self) -> bool {
        true
    }

    fn populate_job(&self, _context: &PopulateContext<'_>) -> Option<PopulateJob> {
        Some(PopulateJob::Scopes {
            function: self.function.clone(),
        })
    }
}

/// Informational leaf such as "No Properties".
#[derive(Clone, Debug, PartialEq)]
pub struct PlaceholderNode {
    pub caption: String,
}

impl Expandable for PlaceholderNode {
    fn title(&self) -> String {
        self.caption.clone()
    }

    fn has_children(&self) -> bool {
        false
    }

    fn populate_job(&self, _context: &PopulateContext<'_>) -> Option<PopulateJob> {
        None
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum NodeKind {
    Section(SectionNode),
    Property(PropertyNode),
    Accessor(AccessorNode),
    Bucket(BucketNode),
    Scope(ScopeNode),
    Entries(EntriesNode),
    FunctionScopes(FunctionScopesNode),
    Placeholder(PlaceholderNode),
}

impl NodeKind {
    pub fn placeholder(caption: &str) -> Self {
        NodeKind::Placeholder(PlaceholderNode {
            caption: caption.to_string(),
        })
    }

    fn as_expandable(&self) -> &dyn Expandable {
        match self {
            NodeKind::Section(n) => n,
            NodeKind::Property(n) => n,
            NodeKind::Accessor(n) => n,
            NodeKind::Bucket(n) => n,
            NodeKind::Scope(n) => n,
            NodeKind::Entries(n) => n,
            NodeKind::FunctionScopes(n) => n,
            NodeKind::Placeholder(n) => n,
        }
    }

    /// The property this node stands for, if any.
    pub fn property(&self) -> Option<&PropertyDescriptor> {
        match self {
            NodeKind::Property(n) => Some(&n.property),
            NodeKind::Accessor(n) => Some(&n.property),
            _ => None,
        }
    }

    /// Display text of the node's value, for nodes that have one.
    pub fn value_text(&self) -> Option<String> {
        match self {
            NodeKind::Property(n) => Some(n.value_text()),
            NodeKind::Accessor(n) => Some(n.value_text()),
            _ => None,
        }
    }
}

impl Expandable for NodeKind {
    fn title(&self) -> String {
        self.as_expandable().title()
    }

    fn has_children(&self) -> bool {
        self.as_expandable().has_children()
    }

    fn populate_job(&self, context: &PopulateContext<'_>) -> Option<PopulateJob> {
        self.as_expandable().populate_job(context)
    }

    fn auto_expand(&self) -> bool {
        self.as_expandable().auto_expand()
    }
}

/// A node of the inspected tree. Owns its children.
#[derive(Clone, Debug)]
pub struct TreeNode {
    pub id: NodeId,
    pub kind: NodeKind,
    /// Bumped whenever in-flight results for this node become stale.
    pub generation: u64,
    pub state: PopulationState,
    pub expanded: bool,
    pub children: Vec<TreeNode>,
    pub(crate) edit: Option<EditSession>,
}

impl TreeNode {
    pub(crate) fn new(id: NodeId, kind: NodeKind) -> Self {
        Self {
            id,
            kind,
            generation: 0,
            state: PopulationState::Unpopulated,
            expanded: false,
            children: Vec::new(),
            edit: None,
        }
    }

    pub fn title(&self) -> String {
        self.kind.title()
    }

    /// Whether the node can be expanded. A node being edited reports
    /// no children.
    pub fn has_children(&self) -> bool {
        self.edit.is_none() && self.kind.has_children()
    }

    pub fn is_editing(&self) -> bool {
        self.edit.is_some()
    }

    /// Text currently shown for the value: the draft while editing,
    /// the value's own text otherwise.
    pub fn value_text(&self) -> Option<String> {
        match &self.edit {
            Some(session) => Some(session.draft.clone()),
            None => self.kind.value_text(),
        }
    }
}
