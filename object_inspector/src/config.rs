/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Configuration for object inspection.
//!
//! The thresholds are process-wide but immutable: build an
//! [`InspectorConfig`] once (defaults, environment, or explicit
//! `key=value` overrides) and share it behind an `Arc`.

use serde::Deserialize;
use serde::Serialize;

/// Describes how one configuration attribute is named in the
/// environment and in `key=value` overrides.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConfigAttr {
    pub env_name: &'static str,
    pub key: &'static str,
}

impl ConfigAttr {
    pub const fn new(env_name: &'static str, key: &'static str) -> Self {
        Self { env_name, key }
    }
}

/// Indexed collections longer than this are bucketed instead of being
/// listed flat.
pub const ARRAY_LOAD_THRESHOLD: ConfigAttr = ConfigAttr::new(
    "OBJECT_INSPECTOR_ARRAY_LOAD_THRESHOLD",
    "array_load_threshold",
);

/// Maximum fan-out of one bucket level.
pub const BUCKET_THRESHOLD: ConfigAttr =
    ConfigAttr::new("OBJECT_INSPECTOR_BUCKET_THRESHOLD", "bucket_threshold");

/// Ranges at least this wide are scanned by own property names rather
/// than probed index by index.
pub const SPARSE_ITERATION_THRESHOLD: ConfigAttr = ConfigAttr::new(
    "OBJECT_INSPECTOR_SPARSE_ITERATION_THRESHOLD",
    "sparse_iteration_threshold",
);

/// Contiguous ranges at least this wide skip the scan for non-indexed
/// properties.
pub const GET_OWN_PROPERTY_NAMES_THRESHOLD: ConfigAttr = ConfigAttr::new(
    "OBJECT_INSPECTOR_GET_OWN_PROPERTY_NAMES_THRESHOLD",
    "get_own_property_names_threshold",
);

const ATTRS: [ConfigAttr; 4] = [
    ARRAY_LOAD_THRESHOLD,
    BUCKET_THRESHOLD,
    SPARSE_ITERATION_THRESHOLD,
    GET_OWN_PROPERTY_NAMES_THRESHOLD,
];

/// Errors produced while building an [`InspectorConfig`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("unknown configuration key '{0}'")]
    UnknownKey(String),
    #[error("invalid value '{value}' for {key}: expected a non-negative integer")]
    InvalidValue { key: String, value: String },
    #[error("bucket_threshold must be at least 2, got {0}")]
    BucketThresholdTooSmall(u64),
}

/// Thresholds driving population and bucketing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InspectorConfig {
    pub array_load_threshold: u64,
    pub bucket_threshold: u64,
    pub sparse_iteration_threshold: u64,
    pub get_own_property_names_threshold: u64,
}

impl Default for InspectorConfig {
    fn default() -> Self {
        Self {
            array_load_threshold: 100,
            bucket_threshold: 100,
            sparse_iteration_threshold: 250_000,
            get_own_property_names_threshold: 500_000,
        }
    }
}

impl InspectorConfig {
    /// Defaults overridden by any `OBJECT_INSPECTOR_*` environment
    /// variables that are set.
    pub fn from_env() -> Result<Self, ConfigError> {
        let pairs = ATTRS.iter().filter_map(|attr| {
            std::env::var(attr.env_name)
                .ok()
                .map(|value| (attr.key.to_string(), value))
        });
        Self::default().with_pairs(pairs)
    }

    /// Defaults overridden by `key=value` pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        Self::default().with_pairs(pairs)
    }

    /// `self` overridden by `key=value` pairs, validated.
    pub fn with_pairs<I, K, V>(mut self, pairs: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (key, value) in pairs {
            let (key, value) = (key.as_ref(), value.as_ref().trim());
            let parsed: u64 = value.parse().map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                value: value.to_string(),
            })?;
            match key {
                k if k == ARRAY_LOAD_THRESHOLD.key => self.array_load_threshold = parsed,
                k if k == BUCKET_THRESHOLD.key => self.bucket_threshold = parsed,
                k if k == SPARSE_ITERATION_THRESHOLD.key => self.sparse_iteration_threshold = parsed,
                k if k == GET_OWN_PROPERTY_NAMES_THRESHOLD.key => {
                    self.get_own_property_names_threshold = parsed
                }
                _ => return Err(ConfigError::UnknownKey(key.to_string())),
            }
        }
        self.validate()
    }

    /// Rejects configurations the planner cannot work with.
    pub fn validate(self) -> Result<Self, ConfigError> {
        if self.bucket_threshold < 2 {
            return Err(ConfigError::BucketThresholdTooSmall(self.bucket_threshold));
        }
        Ok(self)
    }
}
