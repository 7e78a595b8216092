/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Adaptive bucketing of indexed collections.
//!
//! Large arrays are never materialized flat. Instead the present
//! indices of a range are partitioned into at most `bucket_threshold`
//! buckets whose sizes are powers of `bucket_threshold`, and each bucket
//! is expanded lazily by re-running the same planning on its own
//! sub-range. Full expansion visits every present index exactly once,
//! in ascending order, and the tree depth is bounded by
//! `ceil(log_T(count))`.
//!
//! Planning itself runs where the data lives (see
//! [`crate::remote::RemoteFunction::PackRanges`]). [`pack_ranges`] is
//! the reference implementation, usable by any backend that can expose
//! its storage as an [`IndexedStorage`]; this crate uses it for local
//! values and for [`crate::memory::MemoryRuntime`].

use serde::Deserialize;
use serde::Serialize;

use crate::config::InspectorConfig;

/// Largest canonical array index (`2^32 - 2`).
pub const MAX_ARRAY_INDEX: u64 = u32::MAX as u64 - 1;

/// A planned contiguous window of present indices.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketRange {
    /// First present index in the window.
    pub from: u64,
    /// Last present index in the window.
    pub to: u64,
    /// Number of present indices in `[from, to]`.
    pub count: u64,
}

impl BucketRange {
    pub fn is_single(&self) -> bool {
        self.from == self.to
    }
}

/// Result of one planning round.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangePlan {
    pub ranges: Vec<BucketRange>,
    /// The range is so large and dense that the later scan for
    /// non-indexed properties should be skipped.
    pub skip_get_own_property_names: bool,
}

/// Planning thresholds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BucketParams {
    pub bucket_threshold: u64,
    pub sparse_iteration_threshold: u64,
    pub get_own_property_names_threshold: u64,
}

impl From<&InspectorConfig> for BucketParams {
    fn from(config: &InspectorConfig) -> Self {
        Self {
            bucket_threshold: config.bucket_threshold,
            sparse_iteration_threshold: config.sparse_iteration_threshold,
            get_own_property_names_threshold: config.get_own_property_names_threshold,
        }
    }
}

/// Read access to an indexed value, as needed by [`pack_ranges`].
pub trait IndexedStorage {
    /// Whether `index` is present (holes are absent).
    fn contains_index(&self, index: u64) -> bool;

    /// All own property names in enumeration order: canonical indices
    /// ascending, then named properties.
    fn own_property_names(&self) -> Vec<String>;

    /// Backed by contiguous numeric storage, so every index below the
    /// length is present.
    fn is_contiguous(&self) -> bool;
}

/// Parses `name` as a canonical array index.
pub fn parse_array_index(name: &str) -> Option<u64> {
    if name.is_empty() || (name.len() > 1 && name.starts_with('0')) {
        return None;
    }
    if !name.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    name.parse::<u64>().ok().filter(|&i| i <= MAX_ARRAY_INDEX)
}

/// Width of `[from, to]`.
fn span(from: u64, to: u64) -> u64 {
    to.saturating_sub(from).saturating_add(1)
}

/// Present indices of `[from, to]` in ascending order.
///
/// Below `sparse_iteration_threshold` each index is probed; above it a
/// single scan of the own property names is used instead.
pub fn present_indices<S: IndexedStorage + ?Sized>(
    storage: &S,
    from: u64,
    to: u64,
    sparse_iteration_threshold: u64,
) -> Vec<u64> {
    if from > to {
        return Vec::new();
    }
    if span(from, to) < sparse_iteration_threshold {
        (from..=to).filter(|&i| storage.contains_index(i)).collect()
    } else {
        storage
            .own_property_names()
            .iter()
            .filter_map(|name| parse_array_index(name))
            .filter(|&i| from <= i && i <= to)
            .collect()
    }
}

/// Size of each bucket for `count` present indices.
///
/// `count` fits in one bucket when it is at most `threshold`; otherwise
/// the size is `threshold^(k-1)` where `threshold^k` is the smallest
/// power of `threshold` not below `count`.
pub fn bucket_size(count: u64, threshold: u64) -> u64 {
    if count <= threshold {
        return count;
    }
    let mut size = 1u64;
    let mut capacity = threshold;
    while capacity < count {
        size = capacity;
        capacity = match capacity.checked_mul(threshold) {
            Some(next) => next,
            None => break,
        };
    }
    size
}

/// Plans the buckets for `[from, to]`.
pub fn pack_ranges<S: IndexedStorage + ?Sized>(
    storage: &S,
    from: u64,
    to: u64,
    params: &BucketParams,
) -> RangePlan {
    if from > to {
        return RangePlan::default();
    }
    let width = span(from, to);
    let consecutive_range = width >= params.sparse_iteration_threshold && storage.is_contiguous();
    let skip_get_own_property_names =
        consecutive_range && width >= params.get_own_property_names_threshold;

    let mut ranges = Vec::new();
    if consecutive_range {
        let size = bucket_size(width, params.bucket_threshold).max(1);
        let mut start = from;
        loop {
            let end = start.saturating_add(size - 1).min(to);
            ranges.push(BucketRange {
                from: start,
                to: end,
                count: end - start + 1,
            });
            if end == to {
                break;
            }
            start = end + 1;
        }
    } else {
        let indices = present_indices(storage, from, to, params.sparse_iteration_threshold);
        let size = bucket_size(indices.len() as u64, params.bucket_threshold).max(1) as usize;
        ranges.extend(indices.chunks(size).map(|group| BucketRange {
            from: group[0],
            to: group[group.len() - 1],
            count: group.len() as u64,
        }));
    }

    RangePlan {
        ranges,
        skip_get_own_property_names,
    }
}
