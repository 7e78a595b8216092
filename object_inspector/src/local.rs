/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Values assembled in-process that still need to flow through the
//! ordinary population machinery (e.g. the entry list of a `Map`).
//!
//! They answer the same questions a backend would, without a round
//! trip.

use crate::bucket;
use crate::bucket::BucketParams;
use crate::bucket::IndexedStorage;
use crate::remote::Evaluation;
use crate::remote::PropertyDescriptor;
use crate::remote::RemoteFunction;
use crate::remote::RemoteObject;

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum LocalObject {
    Array(Vec<RemoteObject>),
    /// Named fields in declaration order.
    Record(Vec<(String, RemoteObject)>),
}

impl LocalObject {
    /// A `{key, value}` record for one keyed collection entry.
    pub(crate) fn map_entry(key: RemoteObject, value: RemoteObject) -> Self {
        LocalObject::Record(vec![("key".to_string(), key), ("value".to_string(), value)])
    }

    pub(crate) fn describe(&self) -> String {
        match self {
            LocalObject::Array(items) => format!("Array[{}]", items.len()),
            LocalObject::Record(fields) => match fields.as_slice() {
                [(k, key), (v, value)] if k == "key" && v == "value" => {
                    format!("{{{} => {}}}", key.description(), value.description())
                }
                _ => "Object".to_string(),
            },
        }
    }

    fn fields(&self) -> Vec<(String, &RemoteObject)> {
        match self {
            LocalObject::Array(items) => items
                .iter()
                .enumerate()
                .map(|(i, item)| (i.to_string(), item))
                .collect(),
            LocalObject::Record(fields) => fields.iter().map(|(k, v)| (k.clone(), v)).collect(),
        }
    }

    /// Local values are read-only snapshots.
    pub(crate) fn own_properties(&self) -> Vec<PropertyDescriptor> {
        self.fields()
            .into_iter()
            .map(|(name, value)| PropertyDescriptor {
                writable: false,
                ..PropertyDescriptor::data(&name, value.clone())
            })
            .collect()
    }

    pub(crate) fn get_by_path(&self, path: &[String]) -> Evaluation {
        let Some((first, rest)) = path.split_first() else {
            return Evaluation::none();
        };
        let found = self
            .fields()
            .into_iter()
            .find(|(name, _)| name == first)
            .map(|(_, value)| value.clone());
        match (found, rest.is_empty()) {
            (Some(value), true) => Evaluation::value(value),
            (Some(value), false) => match &value.local {
                Some(local) => local.get_by_path(rest),
                None => Evaluation::none(),
            },
            (None, true) => Evaluation::value(RemoteObject::undefined()),
            (None, false) => Evaluation::thrown(RemoteObject::string(&format!(
                "TypeError: Cannot read properties of undefined (reading '{}')",
                rest[0]
            ))),
        }
    }

    pub(crate) fn call_function_json(&self, function: &RemoteFunction) -> Option<serde_json::Value> {
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
                serde_json::to_value(bucket::pack_ranges(self, *from, *to, &params)).ok()
            }
            _ => None,
        }
    }

    pub(crate) fn call_function(&self, function: &RemoteFunction) -> Evaluation {
        match (self, function) {
            (
                LocalObject::Array(items),
                RemoteFunction::BuildArrayFragment {
                    from,
                    to,
                    sparse_iteration_threshold,
                },
            ) => {
                let fields = bucket::present_indices(self, *from, *to, *sparse_iteration_threshold)
                    .into_iter()
                    .filter_map(|i| items.get(i as usize).map(|item| (i.to_string(), item.clone())))
                    .collect();
                Evaluation::value(RemoteObject::from_local(LocalObject::Record(fields)))
            }
            (LocalObject::Array(_), RemoteFunction::BuildObjectFragment { .. }) => {
                Evaluation::value(RemoteObject::from_local(LocalObject::Record(Vec::new())))
            }
            _ => Evaluation::thrown(RemoteObject::string(
                "TypeError: receiver is not an indexed collection",
            )),
        }
    }
}

impl IndexedStorage for LocalObject {
    fn contains_index(&self, index: u64) -> bool {
        match self {
            LocalObject::Array(items) => index < items.len() as u64,
            LocalObject::Record(_) => false,
        }
    }

    fn own_property_names(&self) -> Vec<String> {
        self.fields().into_iter().map(|(name, _)| name).collect()
    }

    fn is_contiguous(&self) -> bool {
        false
    }
}
