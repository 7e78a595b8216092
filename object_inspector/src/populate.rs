/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Population jobs: the remote work behind one node expansion.
//!
//! A [`PopulateJob`] is detached from the tree. It runs against a
//! [`Runtime`] and returns the child kinds it produced; the tree
//! decides afterwards whether the result still applies.

use tracing::debug;

use crate::bucket::RangePlan;
use crate::compare;
use crate::config::InspectorConfig;
use crate::expanders;
use crate::node::AccessorNode;
use crate::node::BucketNode;
use crate::node::EntriesNode;
use crate::node::FunctionScopesNode;
use crate::node::NodeKind;
use crate::node::PropertyNode;
use crate::remote::PropertyDescriptor;
use crate::remote::RemoteFunction;
use crate::remote::RemoteObject;
use crate::remote::TARGET_FUNCTION_PROPERTY;
use crate::runtime::Runtime;

/// Caption used when a property listing comes back empty.
pub const NO_PROPERTIES: &str = "No Properties";

/// List the properties of a value.
#[derive(Clone, Debug, PartialEq)]
pub struct PropertiesJob {
    pub object: RemoteObject,
    /// Also list accessors found on the prototype chain.
    pub include_inherited: bool,
    pub extra_properties: Vec<PropertyDescriptor>,
    pub skip_proto: bool,
    /// Placeholder caption; [`NO_PROPERTIES`] when unset.
    pub placeholder: Option<String>,
}

/// Plan and materialize the buckets of `[from, to]`.
#[derive(Clone, Debug, PartialEq)]
pub struct RangeJob {
    pub object: RemoteObject,
    pub from: u64,
    pub to: u64,
    /// The range is the whole collection; non-indexed properties are
    /// appended after the indices.
    pub top_level: bool,
    /// Placeholder caption; [`NO_PROPERTIES`] when unset.
    pub placeholder: Option<String>,
}

/// Population of a value's own contents.
#[derive(Clone, Debug, PartialEq)]
pub enum ValueJob {
    Properties(PropertiesJob),
    Range(RangeJob),
}

impl ValueJob {
    /// Buckets indexed collections longer than the array load
    /// threshold; lists everything else through `properties`.
    pub fn for_value(value: RemoteObject, config: &InspectorConfig, properties: PropertiesJob) -> Self {
        let length = value.array_length();
        if length > config.array_load_threshold {
            ValueJob::Range(RangeJob {
                object: value,
                from: 0,
                to: length - 1,
                top_level: true,
                placeholder: properties.placeholder,
            })
        } else {
            ValueJob::Properties(properties)
        }
    }

    pub(crate) async fn run(self, runtime: &Runtime, config: &InspectorConfig) -> Vec<NodeKind> {
        match self {
            ValueJob::Properties(job) => populate_properties(runtime, job).await,
            ValueJob::Range(job) => populate_range(runtime, config, job).await,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum PopulateJob {
    Value(ValueJob),
    /// Fetch one window of indices directly as leaves.
    Fragment {
        object: RemoteObject,
        from: u64,
        to: u64,
    },
    Entries {
        object: RemoteObject,
    },
    Scopes {
        function: RemoteObject,
    },
}

/// Output of a [`PopulateJob`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Population {
    pub children: Vec<NodeKind>,
    /// Entry count reported by a collection-entries job.
    pub entry_count: Option<usize>,
}

impl From<Vec<NodeKind>> for Population {
    fn from(children: Vec<NodeKind>) -> Self {
        Self {
            children,
            entry_count: None,
        }
    }
}

impl PopulateJob {
    #[tracing::instrument(level = "debug", skip_all)]
    pub async fn run(self, runtime: &Runtime, config: &InspectorConfig) -> Population {
        match self {
            PopulateJob::Value(job) => job.run(runtime, config).await.into(),
            PopulateJob::Fragment { object, from, to } => {
                let mut children = populate_fragment(runtime, config, &object, from, to).await;
                if children.is_empty() {
                    children.push(NodeKind::placeholder(NO_PROPERTIES));
                }
                children.into()
            }
            PopulateJob::Entries { object } => {
                expanders::populate_entries(runtime, config, &object).await
            }
            PopulateJob::Scopes { function } => {
                expanders::populate_scopes(runtime, &function).await.into()
            }
        }
    }
}

async fn populate_properties(runtime: &Runtime, job: PropertiesJob) -> Vec<NodeKind> {
    let placeholder = job.placeholder.as_deref().unwrap_or(NO_PROPERTIES);
    let listing = runtime
        .enumerate_properties(&job.object, job.include_inherited)
        .await;
    let Some(mut properties) = listing.own else {
        debug!(object = job.object.description(), "no property listing");
        return vec![NodeKind::placeholder(placeholder)];
    };
    properties.extend(job.extra_properties);
    property_nodes(
        properties,
        listing.internal.unwrap_or_default(),
        &job.object,
        job.skip_proto,
        placeholder,
    )
}

/// Turns descriptors of `owner` into child kinds.
pub(crate) fn property_nodes(
    mut properties: Vec<PropertyDescriptor>,
    internal: Vec<PropertyDescriptor>,
    owner: &RemoteObject,
    skip_proto: bool,
    placeholder: &str,
) -> Vec<NodeKind> {
    compare::sort_properties(&mut properties);
    let mut children = Vec::new();
    for property in properties {
        if skip_proto && property.is_proto() {
            continue;
        }
        if !property.is_accessor() {
            children.push(value_node(property, owner, false));
            continue;
        }
        if property.value.is_some() {
            children.push(value_node(property.clone(), owner, false));
        } else if property.getter.is_some() && !property.is_proto() {
            children.push(NodeKind::Accessor(AccessorNode {
                property: property.clone(),
                owner: owner.clone(),
                resolved: None,
                invoking: false,
                read_only: false,
            }));
        }
        if property.is_own {
            if let Some(getter) = &property.getter {
                children.push(accessor_function_node("get", &property, getter, owner));
            }
            if let Some(setter) = &property.setter {
                children.push(accessor_function_node("set", &property, setter, owner));
            }
        }
    }

    let bound = internal.iter().any(|p| p.name == TARGET_FUNCTION_PROPERTY);
    children.extend(internal.into_iter().map(|p| value_node(p, owner, true)));

    if owner.is_function() && !bound {
        children.push(NodeKind::FunctionScopes(FunctionScopesNode {
            function: owner.clone(),
        }));
    }
    if owner.subtype.is_some_and(|s| s.is_collection()) {
        children.push(NodeKind::Entries(EntriesNode {
            object: owner.clone(),
            count: None,
        }));
    }
    if children.is_empty() {
        children.push(NodeKind::placeholder(placeholder));
    }
    children
}

fn value_node(property: PropertyDescriptor, owner: &RemoteObject, read_only: bool) -> NodeKind {
    NodeKind::Property(PropertyNode {
        property,
        owner: Some(owner.clone()),
        read_only,
    })
}

/// `get <name>` / `set <name>` node bound to the accessor's function.
fn accessor_function_node(
    prefix: &str,
    property: &PropertyDescriptor,
    function: &RemoteObject,
    owner: &RemoteObject,
) -> NodeKind {
    let name = format!("{} {}", prefix, property.name);
    value_node(
        PropertyDescriptor {
            writable: false,
            enumerable: property.enumerable,
            ..PropertyDescriptor::data(&name, function.clone())
        },
        owner,
        true,
    )
}

/// Leaf for a property copied out of a fragment bag. The owner stays
/// the original collection so getters resolve against it.
fn leaf_node(property: PropertyDescriptor, owner: &RemoteObject) -> NodeKind {
    if property.value.is_none() && property.getter.is_some() && !property.is_proto() {
        return NodeKind::Accessor(AccessorNode {
            property,
            owner: owner.clone(),
            resolved: None,
            invoking: false,
            read_only: true,
        });
    }
    value_node(property, owner, true)
}

async fn populate_range(runtime: &Runtime, config: &InspectorConfig, job: RangeJob) -> Vec<NodeKind> {
    let RangeJob {
        object,
        from,
        to,
        top_level,
        placeholder,
    } = job;
    let placeholder = placeholder.as_deref().unwrap_or(NO_PROPERTIES);
    let function = RemoteFunction::PackRanges {
        from,
        to,
        bucket_threshold: config.bucket_threshold,
        sparse_iteration_threshold: config.sparse_iteration_threshold,
        get_own_property_names_threshold: config.get_own_property_names_threshold,
    };
    let plan = runtime
        .call_function_json(&object, &function)
        .await
        .and_then(|json| match serde_json::from_value::<RangePlan>(json) {
            Ok(plan) => Some(plan),
            Err(err) => {
                debug!(object = object.description(), "malformed range plan: {}", err);
                None
            }
        });
    let Some(plan) = plan else {
        return vec![NodeKind::placeholder(placeholder)];
    };

    let mut children = Vec::new();
    if let [range] = plan.ranges.as_slice() {
        children.extend(populate_fragment(runtime, config, &object, range.from, range.to).await);
    } else {
        for range in plan.ranges {
            if range.is_single() {
                children
                    .extend(populate_fragment(runtime, config, &object, range.from, range.to).await);
            } else {
                children.push(NodeKind::Bucket(BucketNode {
                    object: object.clone(),
                    range,
                }));
            }
        }
    }

    if top_level {
        children.extend(
            populate_named_properties(runtime, &object, plan.skip_get_own_property_names).await,
        );
    }
    if children.is_empty() {
        children.push(NodeKind::placeholder(placeholder));
    }
    children
}

/// Fetches the present indices of `[from, to]` as read-only leaves.
pub(crate) async fn populate_fragment(
    runtime: &Runtime,
    config: &InspectorConfig,
    object: &RemoteObject,
    from: u64,
    to: u64,
) -> Vec<NodeKind> {
    let function = RemoteFunction::BuildArrayFragment {
        from,
        to,
        sparse_iteration_threshold: config.sparse_iteration_threshold,
    };
    let Some(bag) = runtime.call_function(object, &function).await.ok() else {
        debug!(object = object.description(), from, to, "array fragment failed");
        return Vec::new();
    };
    let listing = runtime.enumerate_properties(&bag, false).await;
    runtime.release(&bag).await;
    let Some(mut properties) = listing.own else {
        return Vec::new();
    };
    compare::sort_properties(&mut properties);
    properties
        .into_iter()
        .map(|property| leaf_node(property, object))
        .collect()
}

/// Non-index own properties of an indexed collection.
async fn populate_named_properties(
    runtime: &Runtime,
    object: &RemoteObject,
    skip_get_own_property_names: bool,
) -> Vec<NodeKind> {
    let function = RemoteFunction::BuildObjectFragment {
        skip_get_own_property_names,
    };
    let Some(bag) = runtime.call_function(object, &function).await.ok() else {
        debug!(object = object.description(), "object fragment failed");
        return Vec::new();
    };
    let properties = runtime.get_own_properties(&bag).await;
    runtime.release(&bag).await;
    let Some(mut properties) = properties else {
        return Vec::new();
    };
    compare::sort_properties(&mut properties);
    properties
        .into_iter()
        .map(|property| leaf_node(property, object))
        .collect()
}
