/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! An in-process [`RuntimeAgent`] over a small object heap.
//!
//! `MemoryRuntime` models just enough of a dynamic object model for the
//! tree to be exercised end to end: objects with data and accessor
//! properties, prototype chains, sparse arrays, typed arrays, functions
//! with scope chains, and keyed collections. Every agent call is
//! recorded so callers can assert on remote traffic.
//!
//! Expressions accepted by `set_property` are JSON literals plus
//! `undefined`, `NaN` and `Infinity`; anything else is rejected as a
//! syntax error.

use std::collections::BTreeMap;
use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::MutexGuard;

use async_trait::async_trait;
use indexmap::IndexMap;

use crate::bucket;
use crate::bucket::BucketParams;
use crate::bucket::IndexedStorage;
use crate::remote::CollectionEntry;
use crate::remote::Evaluation;
use crate::remote::ObjectId;
use crate::remote::PROTO_PROPERTY;
use crate::remote::PropertyDescriptor;
use crate::remote::PropertyKey;
use crate::remote::PropertyListing;
use crate::remote::ProtocolError;
use crate::remote::RemoteFunction;
use crate::remote::RemoteObject;
use crate::remote::RuntimeAgent;
use crate::remote::ScopeRecord;
use crate::remote::ScopeRef;
use crate::remote::ScopeType;
use crate::remote::Subtype;
use crate::remote::TARGET_FUNCTION_PROPERTY;
use crate::remote::ValueType;

const ID_PREFIX: &str = "mem:";

/// Index of an object in the heap.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Handle(usize);

impl Handle {
    pub fn object_id(self) -> ObjectId {
        ObjectId(format!("{}{}", ID_PREFIX, self.0))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Object(Handle),
}

/// What a function does when called as a getter or setter.
#[derive(Clone, Debug, PartialEq)]
pub enum FunctionBody {
    Returns(Value),
    Throws(String),
    /// Setter storing its argument in the named data property of the
    /// receiver.
    Stores(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum Key {
    Name(String),
    Symbol(String),
}

impl Key {
    fn of(key: &PropertyKey) -> Self {
        match key {
            PropertyKey::Name(name) => Key::Name(name.clone()),
            PropertyKey::Symbol(symbol) => Key::Symbol(symbol.description().to_string()),
        }
    }
}

#[derive(Clone, Debug)]
enum Slot {
    Data {
        value: Value,
        writable: bool,
        enumerable: bool,
        configurable: bool,
    },
    Accessor {
        getter: Option<Handle>,
        setter: Option<Handle>,
        enumerable: bool,
        configurable: bool,
    },
}

impl Slot {
    fn configurable(&self) -> bool {
        match self {
            Slot::Data { configurable, .. } | Slot::Accessor { configurable, .. } => *configurable,
        }
    }
}

#[derive(Debug)]
enum Class {
    Object,
    Array {
        elements: BTreeMap<u64, Value>,
        length: u64,
    },
    TypedArray(Vec<f64>),
    Function {
        body: FunctionBody,
        scopes: Vec<(ScopeType, Handle)>,
    },
    Map(Vec<(Value, Value)>),
    Set(Vec<Value>),
    Iterator(Vec<Value>),
}

#[derive(Debug)]
struct HeapObject {
    class: Class,
    description: String,
    properties: IndexMap<Key, Slot>,
    internal: Vec<(String, Value)>,
    proto: Option<Handle>,
}

impl HeapObject {
    fn new(class: Class, description: &str) -> Self {
        Self {
            class,
            description: description.to_string(),
            properties: IndexMap::new(),
            internal: Vec::new(),
            proto: None,
        }
    }

    fn describe(&self) -> String {
        match &self.class {
            Class::Array { length, .. } => format!("Array({})", length),
            Class::TypedArray(values) => format!("Float64Array({})", values.len()),
            Class::Map(entries) => format!("Map({})", entries.len()),
            Class::Set(values) => format!("Set({})", values.len()),
            _ => self.description.clone(),
        }
    }

    fn element(&self, index: u64) -> Option<Value> {
        match &self.class {
            Class::Array { elements, .. } => elements.get(&index).cloned(),
            Class::TypedArray(values) => values.get(index as usize).map(|v| Value::Number(*v)),
            _ => None,
        }
    }
}

impl IndexedStorage for HeapObject {
    fn contains_index(&self, index: u64) -> bool {
        match &self.class {
            Class::Array { elements, .. } => elements.contains_key(&index),
            Class::TypedArray(values) => index < values.len() as u64,
            _ => self.properties.contains_key(&Key::Name(index.to_string())),
        }
    }

    fn own_property_names(&self) -> Vec<String> {
        let mut indices: Vec<u64> = match &self.class {
            Class::Array { elements, .. } => elements.keys().copied().collect(),
            Class::TypedArray(values) => (0..values.len() as u64).collect(),
            _ => Vec::new(),
        };
        let mut named = Vec::new();
        for key in self.properties.keys() {
            if let Key::Name(name) = key {
                match bucket::parse_array_index(name) {
                    Some(index) => indices.push(index),
                    None => named.push(name.clone()),
                }
            }
        }
        indices.sort_unstable();
        indices
            .into_iter()
            .map(|i| i.to_string())
            .chain(named)
            .collect()
    }

    fn is_contiguous(&self) -> bool {
        matches!(self.class, Class::TypedArray(_))
    }
}

#[derive(Debug, Default)]
struct Heap {
    objects: Vec<HeapObject>,
    /// Released slots, reused by the next allocation.
    free: Vec<usize>,
}

impl Heap {
    fn alloc(&mut self, object: HeapObject) -> Handle {
        if let Some(index) = self.free.pop() {
            self.objects[index] = object;
            return Handle(index);
        }
        self.objects.push(object);
        Handle(self.objects.len() - 1)
    }

    fn release(&mut self, handle: Handle) {
        if handle.0 < self.objects.len() && !self.free.contains(&handle.0) {
            self.objects[handle.0] = HeapObject::new(Class::Object, "");
            self.free.push(handle.0);
        }
    }

    fn live_objects(&self) -> usize {
        self.objects.len() - self.free.len()
    }

    fn get(&self, handle: Handle) -> &HeapObject {
        &self.objects[handle.0]
    }

    fn get_mut(&mut self, handle: Handle) -> &mut HeapObject {
        &mut self.objects[handle.0]
    }

    fn resolve(&self, id: &ObjectId) -> Option<Handle> {
        let index: usize = id.0.strip_prefix(ID_PREFIX)?.parse().ok()?;
        (index < self.objects.len() && !self.free.contains(&index)).then_some(Handle(index))
    }

    fn remote(&self, value: &Value) -> RemoteObject {
        match value {
            Value::Undefined => RemoteObject::undefined(),
            Value::Null => RemoteObject {
                subtype: Some(Subtype::Null),
                ..RemoteObject::primitive(ValueType::Object, "null")
            },
            Value::Bool(b) => RemoteObject::primitive(ValueType::Boolean, &b.to_string()),
            Value::Number(n) => RemoteObject::number(*n),
            Value::String(s) => RemoteObject::string(s),
            Value::Object(handle) => self.remote_object(*handle),
        }
    }

    fn remote_object(&self, handle: Handle) -> RemoteObject {
        let object = self.get(handle);
        let id = handle.object_id();
        let description = object.describe();
        match &object.class {
            Class::Object => RemoteObject::object(id, None, &description),
            Class::Array { length, .. } => {
                RemoteObject::object(id, Some(Subtype::Array), &description).with_array_length(*length)
            }
            Class::TypedArray(values) => {
                RemoteObject::object(id, Some(Subtype::Typedarray), &description)
                    .with_array_length(values.len() as u64)
                    .with_contiguous(true)
            }
            Class::Function { .. } => RemoteObject::function(id, &description),
            Class::Map(_) => RemoteObject::object(id, Some(Subtype::Map), &description),
            Class::Set(_) => RemoteObject::object(id, Some(Subtype::Set), &description),
            Class::Iterator(_) => RemoteObject::object(id, Some(Subtype::Iterator), &description),
        }
    }

    fn descriptor(&self, key: &Key, slot: &Slot, is_own: bool) -> PropertyDescriptor {
        let (name, symbol) = match key {
            Key::Name(name) => (name.clone(), None),
            Key::Symbol(description) => (
                description.clone(),
                Some(RemoteObject::primitive(ValueType::Symbol, description)),
            ),
        };
        let descriptor = match slot {
            Slot::Data {
                value,
                writable,
                enumerable,
                ..
            } => PropertyDescriptor {
                writable: *writable,
                enumerable: *enumerable,
                ..PropertyDescriptor::data(&name, self.remote(value))
            },
            Slot::Accessor {
                getter,
                setter,
                enumerable,
                ..
            } => PropertyDescriptor {
                enumerable: *enumerable,
                ..PropertyDescriptor::accessor(
                    &name,
                    getter.map(|g| self.remote_object(g)),
                    setter.map(|s| self.remote_object(s)),
                )
            },
        };
        PropertyDescriptor {
            symbol,
            is_own,
            ..descriptor
        }
    }

    fn own_descriptors(&self, handle: Handle) -> Vec<PropertyDescriptor> {
        let object = self.get(handle);
        let mut out = Vec::new();
        match &object.class {
            Class::Array { elements, length } => {
                out.extend(
                    elements
                        .iter()
                        .map(|(i, v)| PropertyDescriptor::data(&i.to_string(), self.remote(v))),
                );
                out.push(PropertyDescriptor {
                    enumerable: false,
                    ..PropertyDescriptor::data("length", RemoteObject::number(*length as f64))
                });
            }
            Class::TypedArray(values) => out.extend(
                values
                    .iter()
                    .enumerate()
                    .map(|(i, v)| PropertyDescriptor::data(&i.to_string(), RemoteObject::number(*v))),
            ),
            _ => {}
        }
        out.extend(
            object
                .properties
                .iter()
                .map(|(key, slot)| self.descriptor(key, slot, true)),
        );
        if let Some(proto) = object.proto {
            out.push(PropertyDescriptor {
                enumerable: false,
                ..PropertyDescriptor::data(PROTO_PROPERTY, self.remote_object(proto))
            });
        }
        out
    }

    /// Accessors with getters found on the prototype chain of `handle`
    /// and not shadowed by an own property.
    fn inherited_accessors(&self, handle: Handle) -> Vec<PropertyDescriptor> {
        let mut seen: HashSet<Key> = self.get(handle).properties.keys().cloned().collect();
        let mut out = Vec::new();
        let mut visited = HashSet::from([handle]);
        let mut next = self.get(handle).proto;
        while let Some(proto) = next {
            if !visited.insert(proto) {
                break;
            }
            let object = self.get(proto);
            for (key, slot) in &object.properties {
                if !seen.insert(key.clone()) {
                    continue;
                }
                if let Slot::Accessor {
                    getter: Some(_), ..
                } = slot
                {
                    out.push(self.descriptor(key, slot, false));
                }
            }
            next = object.proto;
        }
        out
    }

    /// Reads `name` on `handle`, walking the prototype chain.
    fn read(&self, handle: Handle, name: &str) -> Result<Value, String> {
        let mut visited = HashSet::new();
        let mut current = Some(handle);
        while let Some(h) = current {
            if !visited.insert(h) {
                break;
            }
            let object = self.get(h);
            if name == PROTO_PROPERTY {
                return Ok(object.proto.map_or(Value::Null, Value::Object));
            }
            if let Some(index) = bucket::parse_array_index(name)
                && let Some(value) = object.element(index)
            {
                return Ok(value);
            }
            if name == "length"
                && let Class::Array { length, .. } = &object.class
            {
                return Ok(Value::Number(*length as f64));
            }
            match object.properties.get(&Key::Name(name.to_string())) {
                Some(Slot::Data { value, .. }) => return Ok(value.clone()),
                Some(Slot::Accessor { getter, .. }) => {
                    return match getter {
                        Some(getter) => self.call_getter(*getter),
                        None => Ok(Value::Undefined),
                    };
                }
                None => current = object.proto,
            }
        }
        Ok(Value::Undefined)
    }

    fn call_getter(&self, function: Handle) -> Result<Value, String> {
        match &self.get(function).class {
            Class::Function {
                body: FunctionBody::Returns(value),
                ..
            } => Ok(value.clone()),
            Class::Function {
                body: FunctionBody::Throws(message),
                ..
            } => Err(message.clone()),
            Class::Function { .. } => Ok(Value::Undefined),
            _ => Err("TypeError: getter is not a function".to_string()),
        }
    }

    fn write(&mut self, handle: Handle, key: Key, value: Value) -> Result<(), ProtocolError> {
        if let Key::Name(name) = &key {
            if name == PROTO_PROPERTY {
                match value {
                    Value::Object(proto) => self.get_mut(handle).proto = Some(proto),
                    Value::Null => self.get_mut(handle).proto = None,
                    _ => {}
                }
                return Ok(());
            }
            if let Class::Array { elements, length } = &mut self.get_mut(handle).class
                && let Some(index) = bucket::parse_array_index(name)
            {
                elements.insert(index, value);
                *length = (*length).max(index + 1);
                return Ok(());
            }
            if let Class::TypedArray(values) = &mut self.get_mut(handle).class
                && let Some(index) = bucket::parse_array_index(name)
            {
                if let (Some(slot), Value::Number(n)) = (values.get_mut(index as usize), &value) {
                    *slot = *n;
                }
                return Ok(());
            }
        }

        let object = self.get_mut(handle);
        let setter = match object.properties.get_mut(&key) {
            Some(Slot::Data {
                writable: false, ..
            }) => {
                return Err(ProtocolError::new(format!(
                    "TypeError: Cannot assign to read only property '{}' of object",
                    key_name(&key)
                )));
            }
            Some(Slot::Data { value: slot, .. }) => {
                *slot = value;
                return Ok(());
            }
            Some(Slot::Accessor { setter: None, .. }) => {
                return Err(ProtocolError::new(format!(
                    "TypeError: Cannot set property {} of object which has only a getter",
                    key_name(&key)
                )));
            }
            Some(Slot::Accessor {
                setter: Some(setter),
                ..
            }) => *setter,
            None => {
                object.properties.insert(
                    key,
                    Slot::Data {
                        value,
                        writable: true,
                        enumerable: true,
                        configurable: true,
                    },
                );
                return Ok(());
            }
        };

        let target = match &self.get(setter).class {
            Class::Function {
                body: FunctionBody::Stores(target),
                ..
            } => target.clone(),
            Class::Function {
                body: FunctionBody::Throws(message),
                ..
            } => return Err(ProtocolError::new(message.clone())),
            _ => return Ok(()),
        };
        self.write(handle, Key::Name(target), value)
    }

    fn delete(&mut self, handle: Handle, key: Key) -> Result<(), ProtocolError> {
        let object = self.get_mut(handle);
        if let (Key::Name(name), Class::Array { elements, .. }) = (&key, &mut object.class)
            && let Some(index) = bucket::parse_array_index(name)
        {
            elements.remove(&index);
            return Ok(());
        }
        match object.properties.get(&key).map(Slot::configurable) {
            Some(false) => Err(ProtocolError::new(format!(
                "TypeError: Cannot delete property '{}' of object",
                key_name(&key)
            ))),
            Some(true) => {
                object.properties.shift_remove(&key);
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// Evaluates a literal expression, allocating for composite values.
    fn evaluate(&mut self, expression: &str) -> Result<Value, ProtocolError> {
        match expression {
            "undefined" => return Ok(Value::Undefined),
            "NaN" => return Ok(Value::Number(f64::NAN)),
            "Infinity" => return Ok(Value::Number(f64::INFINITY)),
            "-Infinity" => return Ok(Value::Number(f64::NEG_INFINITY)),
            _ => {}
        }
        let json: serde_json::Value = serde_json::from_str(expression).map_err(|_| {
            ProtocolError::new(format!("SyntaxError: Unexpected token in '{}'", expression))
        })?;
        Ok(self.load_json(&json))
    }

    fn load_json(&mut self, json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::String(s.clone()),
            serde_json::Value::Array(items) => {
                let elements: BTreeMap<u64, Value> = items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| (i as u64, self.load_json(item)))
                    .collect();
                let length = items.len() as u64;
                Value::Object(self.alloc(HeapObject::new(
                    Class::Array { elements, length },
                    "Array",
                )))
            }
            serde_json::Value::Object(map) => {
                let mut object = HeapObject::new(Class::Object, "Object");
                for (name, item) in map {
                    let value = self.load_json(item);
                    object.properties.insert(Key::Name(name.clone()), data_slot(value));
                }
                Value::Object(self.alloc(object))
            }
        }
    }

    fn array_fragment(&mut self, handle: Handle, from: u64, to: u64, sparse: u64) -> Handle {
        let source = self.get(handle);
        let mut bag = HeapObject::new(Class::Object, "Object");
        for index in bucket::present_indices(source, from, to, sparse) {
            let value = match source.element(index) {
                Some(value) => value,
                None => match source.properties.get(&Key::Name(index.to_string())) {
                    Some(Slot::Data { value, .. }) => value.clone(),
                    _ => continue,
                },
            };
            bag.properties.insert(Key::Name(index.to_string()), data_slot(value));
        }
        self.alloc(bag)
    }

    fn object_fragment(&mut self, handle: Handle, skip_get_own_property_names: bool) -> Handle {
        let source = self.get(handle);
        let mut bag = HeapObject::new(Class::Object, "Object");
        bag.proto = source.proto;
        if !skip_get_own_property_names {
            for (key, slot) in &source.properties {
                if let Key::Name(name) = key
                    && bucket::parse_array_index(name).is_some()
                {
                    continue;
                }
                bag.properties.insert(key.clone(), slot.clone());
            }
        }
        self.alloc(bag)
    }
}

fn key_name(key: &Key) -> &str {
    match key {
        Key::Name(name) | Key::Symbol(name) => name,
    }
}

fn data_slot(value: Value) -> Slot {
    Slot::Data {
        value,
        writable: true,
        enumerable: true,
        configurable: true,
    }
}

/// One recorded agent call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Call {
    pub method: &'static str,
    pub target: String,
}

#[derive(Debug, Default)]
pub struct MemoryRuntime {
    heap: Mutex<Heap>,
    calls: Mutex<Vec<Call>>,
}

impl MemoryRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    fn heap(&self) -> MutexGuard<'_, Heap> {
        self.heap.lock().expect("heap lock poisoned")
    }

    fn record(&self, method: &'static str, target: impl ToString) {
        self.calls
            .lock()
            .expect("call log lock poisoned")
            .push(Call {
                method,
                target: target.to_string(),
            });
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().expect("call log lock poisoned").clone()
    }

    pub fn calls_to(&self, method: &str) -> usize {
        self.calls
            .lock()
            .expect("call log lock poisoned")
            .iter()
            .filter(|c| c.method == method)
            .count()
    }

    /// Number of objects currently allocated on the heap.
    pub fn live_objects(&self) -> usize {
        self.heap().live_objects()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().expect("call log lock poisoned").clear();
    }

    pub fn alloc_object(&self, description: &str) -> Handle {
        self.heap().alloc(HeapObject::new(Class::Object, description))
    }

    pub fn alloc_array(&self, values: Vec<Value>) -> Handle {
        let length = values.len() as u64;
        self.alloc_sparse_array(length, values.into_iter().enumerate().map(|(i, v)| (i as u64, v)))
    }

    /// An array of `length` whose only present indices are `entries`.
    pub fn alloc_sparse_array(
        &self,
        length: u64,
        entries: impl IntoIterator<Item = (u64, Value)>,
    ) -> Handle {
        let elements: BTreeMap<u64, Value> = entries.into_iter().collect();
        let length = elements.keys().next_back().map_or(length, |last| length.max(last + 1));
        self.heap()
            .alloc(HeapObject::new(Class::Array { elements, length }, "Array"))
    }

    /// A contiguous numeric array holding `0.0, 1.0, ...`.
    pub fn alloc_typed_array(&self, length: usize) -> Handle {
        let values = (0..length).map(|i| i as f64).collect();
        self.heap()
            .alloc(HeapObject::new(Class::TypedArray(values), "Float64Array"))
    }

    pub fn alloc_function(&self, source: &str, body: FunctionBody) -> Handle {
        self.heap().alloc(HeapObject::new(
            Class::Function {
                body,
                scopes: Vec::new(),
            },
            source,
        ))
    }

    /// A function bound to `target`.
    pub fn alloc_bound_function(&self, target: Handle) -> Handle {
        let bound = self.alloc_function(
            "function () { [native code] }",
            FunctionBody::Returns(Value::Undefined),
        );
        self.define_internal(bound, TARGET_FUNCTION_PROPERTY, Value::Object(target));
        bound
    }

    pub fn alloc_map(&self, entries: Vec<(Value, Value)>) -> Handle {
        self.heap().alloc(HeapObject::new(Class::Map(entries), "Map"))
    }

    pub fn alloc_set(&self, values: Vec<Value>) -> Handle {
        self.heap().alloc(HeapObject::new(Class::Set(values), "Set"))
    }

    pub fn alloc_iterator(&self, values: Vec<Value>) -> Handle {
        self.heap()
            .alloc(HeapObject::new(Class::Iterator(values), "Iterator"))
    }

    pub fn set_proto(&self, handle: Handle, proto: Handle) {
        self.heap().get_mut(handle).proto = Some(proto);
    }

    pub fn define_data(&self, handle: Handle, name: &str, value: Value) {
        self.heap()
            .get_mut(handle)
            .properties
            .insert(Key::Name(name.to_string()), data_slot(value));
    }

    /// A non-writable, non-configurable data property.
    pub fn define_readonly(&self, handle: Handle, name: &str, value: Value) {
        self.heap().get_mut(handle).properties.insert(
            Key::Name(name.to_string()),
            Slot::Data {
                value,
                writable: false,
                enumerable: true,
                configurable: false,
            },
        );
    }

    pub fn define_symbol(&self, handle: Handle, description: &str, value: Value) {
        self.heap()
            .get_mut(handle)
            .properties
            .insert(Key::Symbol(description.to_string()), data_slot(value));
    }

    pub fn define_accessor(
        &self,
        handle: Handle,
        name: &str,
        getter: Option<Handle>,
        setter: Option<Handle>,
    ) {
        self.heap().get_mut(handle).properties.insert(
            Key::Name(name.to_string()),
            Slot::Accessor {
                getter,
                setter,
                enumerable: true,
                configurable: true,
            },
        );
    }

    pub fn define_internal(&self, handle: Handle, name: &str, value: Value) {
        self.heap()
            .get_mut(handle)
            .internal
            .push((name.to_string(), value));
    }

    /// Appends a scope to the chain of `function`.
    pub fn add_scope(&self, function: Handle, scope_type: ScopeType, scope: Handle) {
        if let Class::Function { scopes, .. } = &mut self.heap().get_mut(function).class {
            scopes.push((scope_type, scope));
        }
    }

    /// Own data value of `name` (array elements included).
    pub fn get(&self, handle: Handle, name: &str) -> Option<Value> {
        let heap = self.heap();
        let object = heap.get(handle);
        if let Some(index) = bucket::parse_array_index(name)
            && let Some(value) = object.element(index)
        {
            return Some(value);
        }
        match object.properties.get(&Key::Name(name.to_string())) {
            Some(Slot::Data { value, .. }) => Some(value.clone()),
            _ => None,
        }
    }

    pub fn remote(&self, value: &Value) -> RemoteObject {
        self.heap().remote(value)
    }

    pub fn remote_object(&self, handle: Handle) -> RemoteObject {
        self.heap().remote_object(handle)
    }

    /// Allocates `json` on the heap.
    pub fn load_json(&self, json: &serde_json::Value) -> Value {
        self.heap().load_json(json)
    }
}

fn missing(id: &ObjectId) -> ProtocolError {
    ProtocolError::new(format!("Could not find object with id {}", id))
}

#[async_trait]
impl RuntimeAgent for MemoryRuntime {
    async fn enumerate_properties(
        &self,
        object: &ObjectId,
        include_inherited: bool,
    ) -> PropertyListing {
        self.record("enumerate_properties", object);
        let heap = self.heap();
        let Some(handle) = heap.resolve(object) else {
            return PropertyListing::default();
        };
        let mut own = heap.own_descriptors(handle);
        if include_inherited {
            own.extend(heap.inherited_accessors(handle));
        }
        let internal = heap
            .get(handle)
            .internal
            .iter()
            .map(|(name, value)| PropertyDescriptor {
                writable: false,
                ..PropertyDescriptor::data(name, heap.remote(value))
            })
            .collect();
        PropertyListing {
            own: Some(own),
            internal: Some(internal),
        }
    }

    async fn get_own_properties(&self, object: &ObjectId) -> Option<Vec<PropertyDescriptor>> {
        self.record("get_own_properties", object);
        let heap = self.heap();
        let handle = heap.resolve(object)?;
        Some(heap.own_descriptors(handle))
    }

    async fn get_by_path(&self, object: &ObjectId, path: &[String]) -> Evaluation {
        self.record("get_by_path", object);
        let heap = self.heap();
        let Some(handle) = heap.resolve(object) else {
            return Evaluation::none();
        };
        let mut current = Value::Object(handle);
        for name in path {
            let Value::Object(handle) = &current else {
                return Evaluation::thrown(RemoteObject::string(&format!(
                    "TypeError: Cannot read properties of {} (reading '{}')",
                    heap.remote(&current).description(),
                    name
                )));
            };
            current = match heap.read(*handle, name) {
                Ok(value) => value,
                Err(message) => return Evaluation::thrown(RemoteObject::string(&message)),
            };
        }
        Evaluation::value(heap.remote(&current))
    }

    async fn call_function(&self, object: &ObjectId, function: &RemoteFunction) -> Evaluation {
        self.record("call_function", object);
        let mut heap = self.heap();
        let Some(handle) = heap.resolve(object) else {
            return Evaluation::none();
        };
        let bag = match function {
            RemoteFunction::BuildArrayFragment {
                from,
                to,
                sparse_iteration_threshold,
            } => heap.array_fragment(handle, *from, *to, *sparse_iteration_threshold),
            RemoteFunction::BuildObjectFragment {
                skip_get_own_property_names,
            } => heap.object_fragment(handle, *skip_get_own_property_names),
            RemoteFunction::PackRanges { .. } => {
                return Evaluation::thrown(RemoteObject::string(
                    "TypeError: range plans are returned by value",
                ));
            }
        };
        Evaluation::value(heap.remote_object(bag))
    }

    async fn call_function_json(
        &self,
        object: &ObjectId,
        function: &RemoteFunction,
    ) -> Option<serde_json::Value> {
        self.record("call_function_json", object);
        let heap = self.heap();
        let handle = heap.resolve(object)?;
        match function {
            RemoteFunction::PackRanges {
                from,
                to,
                bucket_threshold,
                sparse_iteration_threshold,
                get_own_property_names_threshold,
            } => {
                let params = BucketParams {
                    bucket_threshold: *bucket_threshold,
                    sparse_iteration_threshold: *sparse_iteration_threshold,
                    get_own_property_names_threshold: *get_own_property_names_threshold,
                };
                let plan = bucket::pack_ranges(heap.get(handle), *from, *to, &params);
                serde_json::to_value(plan).ok()
            }
            _ => None,
        }
    }

    async fn set_property(
        &self,
        object: &ObjectId,
        key: &PropertyKey,
        expression: &str,
    ) -> Result<(), ProtocolError> {
        self.record("set_property", object);
        let mut heap = self.heap();
        let handle = heap.resolve(object).ok_or_else(|| missing(object))?;
        let value = heap.evaluate(expression)?;
        heap.write(handle, Key::of(key), value)
    }

    async fn delete_property(
        &self,
        object: &ObjectId,
        key: &PropertyKey,
    ) -> Result<(), ProtocolError> {
        self.record("delete_property", object);
        let mut heap = self.heap();
        let handle = heap.resolve(object).ok_or_else(|| missing(object))?;
        heap.delete(handle, Key::of(key))
    }

    async fn collection_entries(&self, object: &ObjectId) -> Option<Vec<CollectionEntry>> {
        self.record("collection_entries", object);
        let heap = self.heap();
        let handle = heap.resolve(object)?;
        let entries = match &heap.get(handle).class {
            Class::Map(entries) => entries
                .iter()
                .map(|(k, v)| CollectionEntry {
                    key: Some(heap.remote(k)),
                    value: heap.remote(v),
                })
                .collect(),
            Class::Set(values) | Class::Iterator(values) => values
                .iter()
                .map(|v| CollectionEntry {
                    key: None,
                    value: heap.remote(v),
                })
                .collect(),
            _ => return None,
        };
        Some(entries)
    }

    async fn scope_chain(&self, function: &ObjectId) -> Option<Vec<ScopeRecord>> {
        self.record("scope_chain", function);
        let heap = self.heap();
        let handle = heap.resolve(function)?;
        let Class::Function { scopes, .. } = &heap.get(handle).class else {
            return None;
        };
        Some(
            scopes
                .iter()
                .map(|(scope_type, scope)| ScopeRecord {
                    scope_type: *scope_type,
                    object: heap.remote_object(*scope),
                })
                .collect(),
        )
    }

    async fn set_variable_value(
        &self,
        scope: &ScopeRef,
        name: &str,
        expression: &str,
    ) -> Result<(), ProtocolError> {
        self.record("set_variable_value", &scope.function_id);
        let mut heap = self.heap();
        let function = heap
            .resolve(&scope.function_id)
            .ok_or_else(|| missing(&scope.function_id))?;
        let scope_object = match &heap.get(function).class {
            Class::Function { scopes, .. } => scopes.get(scope.index).map(|(_, h)| *h),
            _ => None,
        }
        .ok_or_else(|| ProtocolError::new(format!("no scope at index {}", scope.index)))?;
        let key = Key::Name(name.to_string());
        if !heap.get(scope_object).properties.contains_key(&key) {
            return Err(ProtocolError::new(format!(
                "ReferenceError: {} is not defined",
                name
            )));
        }
        let value = heap.evaluate(expression)?;
        heap.write(scope_object, key, value)
    }

    async fn release_object(&self, object: &ObjectId) {
        self.record("release_object", object);
        let mut heap = self.heap();
        if let Some(handle) = heap.resolve(object) {
            heap.release(handle);
        }
    }
}
