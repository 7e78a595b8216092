/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Structural children: `<entries>` of collections and the scope chain
//! behind `<function scope>`.

use tracing::debug;
use tracing::error;

use crate::config::InspectorConfig;
use crate::local::LocalObject;
use crate::node::NodeKind;
use crate::node::PropertyNode;
use crate::node::ScopeNode;
use crate::populate::Population;
use crate::populate::PropertiesJob;
use crate::populate::ValueJob;
use crate::remote::PropertyDescriptor;
use crate::remote::RemoteObject;
use crate::remote::ScopeRef;
use crate::remote::ScopeType;
use crate::runtime::Runtime;

pub const NO_ENTRIES: &str = "No Entries";
pub const NO_SCOPES: &str = "No Scopes";

/// Lists the entries of a collection as a local array, so large
/// collections are bucketed like any other indexed value.
pub(crate) async fn populate_entries(
    runtime: &Runtime,
    config: &InspectorConfig,
    object: &RemoteObject,
) -> Population {
    let Some(entries) = runtime.collection_entries(object).await else {
        debug!(object = object.description(), "no collection entries");
        return Population {
            children: vec![NodeKind::placeholder(NO_ENTRIES)],
            entry_count: Some(0),
        };
    };
    let count = entries.len();
    let items = entries
        .into_iter()
        .map(|entry| match entry.key {
            Some(key) => RemoteObject::from_local(LocalObject::map_entry(key, entry.value)),
            None => entry.value,
        })
        .collect();
    let array = RemoteObject::from_local(LocalObject::Array(items));
    let job = ValueJob::for_value(
        array.clone(),
        config,
        PropertiesJob {
            object: array,
            include_inherited: false,
            extra_properties: Vec::new(),
            skip_proto: true,
            placeholder: Some(NO_ENTRIES.to_string()),
        },
    );
    Population {
        children: job.run(runtime, config).await,
        entry_count: Some(count),
    }
}

fn scope_title(scope_type: ScopeType) -> Option<(&'static str, bool)> {
    // (title, whether the scope is a real object)
    match scope_type {
        ScopeType::Local => Some(("Local", false)),
        ScopeType::Closure => Some(("Closure", false)),
        ScopeType::Catch => Some(("Catch", false)),
        ScopeType::Block => Some(("Block", false)),
        ScopeType::Script => Some(("Script", false)),
        ScopeType::With => Some(("With Block", true)),
        ScopeType::Global => Some(("Global", true)),
        ScopeType::Unknown => None,
    }
}

pub(crate) async fn populate_scopes(runtime: &Runtime, function: &RemoteObject) -> Vec<NodeKind> {
    let chain = runtime.scope_chain(function).await.unwrap_or_default();
    let mut children = Vec::new();
    for (index, record) in chain.into_iter().enumerate() {
        let Some((title, object_scope)) = scope_title(record.scope_type) else {
            error!(
                function = function.description(),
                index, "unknown scope type"
            );
            continue;
        };
        if object_scope {
            children.push(NodeKind::Property(PropertyNode {
                property: PropertyDescriptor {
                    writable: false,
                    ..PropertyDescriptor::data(title, record.object)
                },
                owner: None,
                read_only: true,
            }));
            continue;
        }
        let object = match &function.object_id {
            Some(function_id) => record.object.with_scope_ref(ScopeRef {
                index,
                function_id: function_id.clone(),
            }),
            None => record.object,
        };
        children.push(NodeKind::Scope(ScopeNode {
            title: title.to_string(),
            object,
        }));
    }
    if children.is_empty() {
        children.push(NodeKind::placeholder(NO_SCOPES));
    }
    children
}
