/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Wire-facing types exchanged with the remote evaluation backend.
//!
//! Everything the tree knows about a remote value arrives as a
//! [`RemoteObject`]: an opaque identity plus a handful of capability
//! flags. Property metadata arrives as [`PropertyDescriptor`]s. The
//! backend itself is abstracted by [`RuntimeAgent`]; this crate never
//! speaks a concrete transport.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;

use crate::local::LocalObject;

/// Name of the synthetic prototype link property.
pub const PROTO_PROPERTY: &str = "__proto__";

/// Name of the internal property that marks a bound function.
pub const TARGET_FUNCTION_PROPERTY: &str = "[[TargetFunction]]";

/// Opaque identifier of a value living in the remote context.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(pub String);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ObjectId {
    fn from(s: &str) -> Self {
        ObjectId(s.to_string())
    }
}

/// Top-level value type as reported by the backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Object,
    Function,
    String,
    Number,
    Boolean,
    Symbol,
    Bigint,
    Undefined,
}

/// Refinement of [`ValueType::Object`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Subtype {
    Array,
    Typedarray,
    Null,
    Node,
    Regexp,
    Date,
    Error,
    Map,
    Set,
    Weakmap,
    Weakset,
    Iterator,
    Generator,
}

impl Subtype {
    /// Whether values of this subtype are addressed by integer index.
    pub fn is_indexed(self) -> bool {
        matches!(self, Subtype::Array | Subtype::Typedarray)
    }

    /// Whether values of this subtype expose an entry list through
    /// [`RuntimeAgent::collection_entries`].
    pub fn is_collection(self) -> bool {
        matches!(
            self,
            Subtype::Map | Subtype::Set | Subtype::Weakmap | Subtype::Weakset | Subtype::Iterator
        )
    }
}

/// Identifies one record of a function's scope chain so that the scope
/// can be resolved again later (e.g. to assign a variable in it).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeRef {
    /// Position of the scope in the function's chain.
    pub index: usize,
    /// The function owning the chain.
    pub function_id: ObjectId,
}

/// Handle to a value, remote or local.
///
/// Primitive values carry no `object_id`. Local values (built by this
/// crate, e.g. the entries bag of a `Map`) carry their contents in
/// `local` and are served in-process by [`crate::runtime::Runtime`].
#[derive(Clone, Debug, PartialEq)]
pub struct RemoteObject {
    pub object_id: Option<ObjectId>,
    pub value_type: ValueType,
    pub subtype: Option<Subtype>,
    pub description: Option<String>,
    /// Element count, known only for indexed collections.
    pub array_length: Option<u64>,
    /// Backed by contiguous numeric storage (e.g. a typed array). The
    /// backend reports this; it cannot be inferred locally.
    pub contiguous: bool,
    /// Set for scope objects handed out by a scope chain.
    pub scope_ref: Option<ScopeRef>,
    pub(crate) local: Option<Arc<LocalObject>>,
}

impl RemoteObject {
    /// A remote object handle.
    pub fn object(id: impl Into<ObjectId>, subtype: Option<Subtype>, description: &str) -> Self {
        Self {
            object_id: Some(id.into()),
            value_type: ValueType::Object,
            subtype,
            description: Some(description.to_string()),
            array_length: None,
            contiguous: false,
            scope_ref: None,
            local: None,
        }
    }

    /// A remote function handle.
    pub fn function(id: impl Into<ObjectId>, description: &str) -> Self {
        Self {
            value_type: ValueType::Function,
            ..Self::object(id, None, description)
        }
    }

    /// A primitive value without remote identity.
    pub fn primitive(value_type: ValueType, description: &str) -> Self {
        Self {
            object_id: None,
            value_type,
            subtype: None,
            description: Some(description.to_string()),
            array_length: None,
            contiguous: false,
            scope_ref: None,
            local: None,
        }
    }

    pub fn undefined() -> Self {
        Self::primitive(ValueType::Undefined, "undefined")
    }

    pub fn string(s: &str) -> Self {
        Self::primitive(ValueType::String, s)
    }

    pub fn number(n: f64) -> Self {
        Self::primitive(ValueType::Number, &format_number(n))
    }

    pub(crate) fn from_local(local: LocalObject) -> Self {
        let (subtype, array_length, description) = match &local {
            LocalObject::Array(items) => (
                Some(Subtype::Array),
                Some(items.len() as u64),
                format!("Array[{}]", items.len()),
            ),
            LocalObject::Record(_) => (None, None, local.describe()),
        };
        Self {
            object_id: None,
            value_type: ValueType::Object,
            subtype,
            description: Some(description),
            array_length,
            contiguous: false,
            scope_ref: None,
            local: Some(Arc::new(local)),
        }
    }

    pub fn with_array_length(mut self, length: u64) -> Self {
        self.array_length = Some(length);
        self
    }

    pub fn with_contiguous(mut self, contiguous: bool) -> Self {
        self.contiguous = contiguous;
        self
    }

    pub fn with_scope_ref(mut self, scope_ref: ScopeRef) -> Self {
        self.scope_ref = Some(scope_ref);
        self
    }

    /// Whether the value may have properties worth fetching.
    pub fn has_children(&self) -> bool {
        match self.value_type {
            ValueType::Object | ValueType::Function => {
                self.subtype != Some(Subtype::Null)
                    && (self.object_id.is_some() || self.local.is_some())
            }
            _ => false,
        }
    }

    /// Element count of an indexed collection, `0` otherwise.
    pub fn array_length(&self) -> u64 {
        match self.subtype {
            Some(subtype) if subtype.is_indexed() => self.array_length.unwrap_or(0),
            _ => 0,
        }
    }

    pub fn is_local(&self) -> bool {
        self.local.is_some()
    }

    pub fn is_function(&self) -> bool {
        self.value_type == ValueType::Function
    }

    pub fn description(&self) -> &str {
        self.description.as_deref().unwrap_or("")
    }
}

/// Formats a number the way the remote context prints it.
pub(crate) fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e21 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// Metadata for one property of a remote value.
#[derive(Clone, Debug, PartialEq)]
pub struct PropertyDescriptor {
    pub name: String,
    /// Present when the key is a symbol; `name` then holds its
    /// description.
    pub symbol: Option<RemoteObject>,
    pub value: Option<RemoteObject>,
    pub getter: Option<RemoteObject>,
    pub setter: Option<RemoteObject>,
    pub writable: bool,
    pub enumerable: bool,
    pub is_own: bool,
    /// The value was produced by an evaluation that threw.
    pub was_thrown: bool,
}

impl PropertyDescriptor {
    /// A plain, writable, enumerable own data property.
    pub fn data(name: &str, value: RemoteObject) -> Self {
        Self {
            name: name.to_string(),
            symbol: None,
            value: Some(value),
            getter: None,
            setter: None,
            writable: true,
            enumerable: true,
            is_own: true,
            was_thrown: false,
        }
    }

    /// An own accessor property without a captured value.
    pub fn accessor(name: &str, getter: Option<RemoteObject>, setter: Option<RemoteObject>) -> Self {
        Self {
            name: name.to_string(),
            symbol: None,
            value: None,
            getter,
            setter,
            writable: false,
            enumerable: true,
            is_own: true,
            was_thrown: false,
        }
    }

    pub fn is_accessor(&self) -> bool {
        self.getter.is_some() || self.setter.is_some()
    }

    pub fn is_symbol(&self) -> bool {
        self.symbol.is_some()
    }

    pub fn is_proto(&self) -> bool {
        self.name == PROTO_PROPERTY
    }

    /// The key to address this property with in mutations.
    pub fn key(&self) -> PropertyKey {
        match &self.symbol {
            Some(symbol) => PropertyKey::Symbol(symbol.clone()),
            None => PropertyKey::Name(self.name.clone()),
        }
    }
}

/// Key used to address a property in set/delete requests.
#[derive(Clone, Debug, PartialEq)]
pub enum PropertyKey {
    Name(String),
    Symbol(RemoteObject),
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyKey::Name(name) => f.write_str(name),
            PropertyKey::Symbol(symbol) => f.write_str(symbol.description()),
        }
    }
}

/// Result of [`RuntimeAgent::enumerate_properties`]. Either side may be
/// `None` when the backend failed to produce it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PropertyListing {
    pub own: Option<Vec<PropertyDescriptor>>,
    pub internal: Option<Vec<PropertyDescriptor>>,
}

/// Outcome of a remote evaluation.
#[derive(Clone, Debug, PartialEq)]
pub struct Evaluation {
    pub value: Option<RemoteObject>,
    pub was_thrown: bool,
}

impl Evaluation {
    pub fn value(value: RemoteObject) -> Self {
        Self {
            value: Some(value),
            was_thrown: false,
        }
    }

    pub fn thrown(exception: RemoteObject) -> Self {
        Self {
            value: Some(exception),
            was_thrown: true,
        }
    }

    pub fn none() -> Self {
        Self {
            value: None,
            was_thrown: false,
        }
    }

    /// The value, if the evaluation produced one without throwing.
    pub fn ok(self) -> Option<RemoteObject> {
        if self.was_thrown { None } else { self.value }
    }
}

/// One entry of a keyed or iterable collection.
#[derive(Clone, Debug, PartialEq)]
pub struct CollectionEntry {
    pub key: Option<RemoteObject>,
    pub value: RemoteObject,
}

/// Kind of a scope record in a function's scope chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeType {
    Local,
    Closure,
    Catch,
    Block,
    Script,
    With,
    Global,
    /// A kind this crate does not know how to present.
    #[serde(other)]
    Unknown,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ScopeRecord {
    pub scope_type: ScopeType,
    pub object: RemoteObject,
}

/// Functions this crate asks the backend to evaluate with a remote
/// value as receiver. The backend owns their concrete source; each
/// variant carries its arguments.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "function", rename_all = "snake_case")]
pub enum RemoteFunction {
    /// Plan bucket ranges over `[from, to]`; returns a
    /// [`crate::bucket::RangePlan`] as JSON.
    PackRanges {
        from: u64,
        to: u64,
        bucket_threshold: u64,
        sparse_iteration_threshold: u64,
        get_own_property_names_threshold: u64,
    },
    /// Copy present indices of `[from, to]` into a fresh prototype-less
    /// bag and return a handle to it.
    BuildArrayFragment {
        from: u64,
        to: u64,
        sparse_iteration_threshold: u64,
    },
    /// Copy non-index own properties (and the prototype link) into a
    /// fresh bag and return a handle to it.
    BuildObjectFragment { skip_get_own_property_names: bool },
}

/// Error reported by the backend for a rejected mutation.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ProtocolError {
    pub message: String,
}

impl ProtocolError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// The seam to the remote evaluation backend.
///
/// Every method reports failure in-band (`None`, `was_thrown`, or a
/// [`ProtocolError`]); none of them is allowed to panic.
#[async_trait]
pub trait RuntimeAgent: Send + Sync + fmt::Debug {
    /// Own and internal properties of `object`. With
    /// `include_inherited`, accessor properties found on the prototype
    /// chain are included with `is_own = false`.
    async fn enumerate_properties(
        &self,
        object: &ObjectId,
        include_inherited: bool,
    ) -> PropertyListing;

    async fn get_own_properties(&self, object: &ObjectId) -> Option<Vec<PropertyDescriptor>>;

    /// Reads `object[path[0]][path[1]]...`, invoking getters.
    async fn get_by_path(&self, object: &ObjectId, path: &[String]) -> Evaluation;

    async fn call_function(&self, object: &ObjectId, function: &RemoteFunction) -> Evaluation;

    async fn call_function_json(
        &self,
        object: &ObjectId,
        function: &RemoteFunction,
    ) -> Option<serde_json::Value>;

    /// Assigns the result of evaluating `expression` to `object[key]`.
    async fn set_property(
        &self,
        object: &ObjectId,
        key: &PropertyKey,
        expression: &str,
    ) -> Result<(), ProtocolError>;

    async fn delete_property(&self, object: &ObjectId, key: &PropertyKey)
    -> Result<(), ProtocolError>;

    async fn collection_entries(&self, object: &ObjectId) -> Option<Vec<CollectionEntry>>;

    async fn scope_chain(&self, function: &ObjectId) -> Option<Vec<ScopeRecord>>;

    /// Assigns a variable in the scope identified by `scope`.
    async fn set_variable_value(
        &self,
        scope: &ScopeRef,
        name: &str,
        expression: &str,
    ) -> Result<(), ProtocolError>;

    /// Drops a temporary object (such as a fragment bag) once its
    /// properties have been read. Backends without explicit lifetimes
    /// can ignore it.
    async fn release_object(&self, _object: &ObjectId) {}
}
