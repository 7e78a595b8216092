/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Lazy, incrementally expandable trees over a remote object graph.
//!
//! Every property list, index range, collection entry list, and scope
//! chain is fetched on demand through a [`RuntimeAgent`]. The pieces:
//!
//! - [`tree::ObjectTree`] owns the nodes and their population state
//!   machine; remote work leaves it as detached [`tree::Pending`] jobs
//!   whose results are applied only if still current.
//! - [`bucket`] keeps huge indexed collections tractable by splitting
//!   them into nested buckets of bounded fan-out.
//! - [`compare`] fixes the order of children.
//! - [`edit`] and [`getter`] implement in-place value edits and
//!   deferred accessor invocation.
//! - [`driver::Inspector`] runs all of the above on tokio.
//! - [`memory::MemoryRuntime`] is an in-process backend.

pub mod bucket;
pub mod compare;
pub mod config;
pub mod driver;
pub mod edit;
mod expanders;
pub mod getter;
mod local;
pub mod memory;
pub mod node;
pub mod populate;
pub mod remote;
pub mod runtime;
pub mod tree;

#[cfg(test)]
mod test_utils;
#[cfg(test)]
mod tests;

pub use config::InspectorConfig;
pub use driver::Inspector;
pub use node::NodeId;
pub use node::SectionOptions;
pub use remote::RemoteObject;
pub use remote::RuntimeAgent;
pub use runtime::Runtime;
pub use tree::ObjectTree;
