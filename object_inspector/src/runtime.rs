/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Single funnel for all I/O against values.
//!
//! [`Runtime`] takes [`RemoteObject`] handles and routes each
//! operation either to the [`RuntimeAgent`] (remote values) or to the
//! value itself (local values). Primitives have nothing to fetch and
//! answer with "no data".

use std::sync::Arc;

use crate::remote::CollectionEntry;
use crate::remote::Evaluation;
use crate::remote::PropertyDescriptor;
use crate::remote::PropertyKey;
use crate::remote::PropertyListing;
use crate::remote::ProtocolError;
use crate::remote::RemoteFunction;
use crate::remote::RemoteObject;
use crate::remote::RuntimeAgent;
use crate::remote::ScopeRecord;

#[derive(Clone, Debug)]
pub struct Runtime {
    agent: Arc<dyn RuntimeAgent>,
}

impl Runtime {
    pub fn new(agent: Arc<dyn RuntimeAgent>) -> Self {
        Self { agent }
    }

    pub fn agent(&self) -> &Arc<dyn RuntimeAgent> {
        &self.agent
    }

    pub async fn enumerate_properties(
        &self,
        object: &RemoteObject,
        include_inherited: bool,
    ) -> PropertyListing {
        if let Some(local) = &object.local {
            return PropertyListing {
                own: Some(local.own_properties()),
                internal: None,
            };
        }
        match &object.object_id {
            Some(id) => self.agent.enumerate_properties(id, include_inherited).await,
            None => PropertyListing::default(),
        }
    }

    pub async fn get_own_properties(&self, object: &RemoteObject) -> Option<Vec<PropertyDescriptor>> {
        if let Some(local) = &object.local {
            return Some(local.own_properties());
        }
        match &object.object_id {
            Some(id) => self.agent.get_own_properties(id).await,
            None => None,
        }
    }

    pub async fn get_by_path(&self, object: &RemoteObject, path: &[String]) -> Evaluation {
        if let Some(local) = &object.local {
            return local.get_by_path(path);
        }
        match &object.object_id {
            Some(id) => self.agent.get_by_path(id, path).await,
            None => Evaluation::none(),
        }
    }

    pub async fn call_function(&self, object: &RemoteObject, function: &RemoteFunction) -> Evaluation {
        if let Some(local) = &object.local {
            return local.call_function(function);
        }
        match &object.object_id {
            Some(id) => self.agent.call_function(id, function).await,
            None => Evaluation::none(),
        }
    }

    pub async fn call_function_json(
        &self,
        object: &RemoteObject,
        function: &RemoteFunction,
    ) -> Option<serde_json::Value> {
        if let Some(local) = &object.local {
            return local.call_function_json(function);
        }
        match &object.object_id {
            Some(id) => self.agent.call_function_json(id, function).await,
            None => None,
        }
    }

    /// Assigns `expression` to `key` on `object`. Scope objects are
    /// written through their [`crate::remote::ScopeRef`].
    pub async fn set_property(
        &self,
        object: &RemoteObject,
        key: &PropertyKey,
        expression: &str,
    ) -> Result<(), ProtocolError> {
        if object.is_local() {
            return Err(ProtocolError::new("local values are read-only"));
        }
        if let (Some(scope), PropertyKey::Name(name)) = (&object.scope_ref, key) {
            return self.agent.set_variable_value(scope, name, expression).await;
        }
        match &object.object_id {
            Some(id) => self.agent.set_property(id, key, expression).await,
            None => Err(ProtocolError::new("cannot set a property on a primitive")),
        }
    }

    pub async fn delete_property(
        &self,
        object: &RemoteObject,
        key: &PropertyKey,
    ) -> Result<(), ProtocolError> {
        if object.is_local() || object.scope_ref.is_some() {
            return Err(ProtocolError::new(format!("cannot delete '{}'", key)));
        }
        match &object.object_id {
            Some(id) => self.agent.delete_property(id, key).await,
            None => Err(ProtocolError::new("cannot delete a property of a primitive")),
        }
    }

    pub async fn collection_entries(&self, object: &RemoteObject) -> Option<Vec<CollectionEntry>> {
        match &object.object_id {
            Some(id) if !object.is_local() => self.agent.collection_entries(id).await,
            _ => None,
        }
    }

    /// Releases a temporary remote object. Local values are dropped
    /// with their last reference.
    pub async fn release(&self, object: &RemoteObject) {
        if let (Some(id), false) = (&object.object_id, object.is_local()) {
            self.agent.release_object(id).await;
        }
    }

    pub async fn scope_chain(&self, function: &RemoteObject) -> Option<Vec<ScopeRecord>> {
        match &function.object_id {
            Some(id) if function.is_function() => self.agent.scope_chain(id).await,
            _ => None,
        }
    }
}
