/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Logging setup for object_inspector binaries.
//!
//! Verbosity comes from `OBJECT_INSPECTOR_LOG` (an `EnvFilter`
//! directive, `warn` when unset) and the output format from
//! `OBJECT_INSPECTOR_LOG_FORMAT`.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;

// Environment variable holding the filter directive
pub const LOG_FILTER_ENV: &str = "OBJECT_INSPECTOR_LOG";

// Environment variable to select the log format
pub const LOG_FORMAT_ENV: &str = "OBJECT_INSPECTOR_LOG_FORMAT";

const DEFAULT_FILTER: &str = "warn";

#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    Pretty,
    Json,
    None,
}

impl LogFormat {
    pub fn from_env() -> Self {
        Self::parse(std::env::var(LOG_FORMAT_ENV).ok().as_deref())
    }

    fn parse(value: Option<&str>) -> Self {
        match value {
            Some("json") => LogFormat::Json,
            Some("none") => LogFormat::None,
            // Pretty is the default, including for unrecognized values.
            _ => LogFormat::Pretty,
        }
    }
}

/// The formatting layer for `format`, writing to stderr.
pub fn tracing_layer<S>(format: &LogFormat) -> Option<Box<dyn Layer<S> + Send + Sync>>
where
    S: tracing::Subscriber + for<'span> LookupSpan<'span>,
{
    match format {
        LogFormat::Pretty => Some(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .boxed(),
        ),
        LogFormat::Json => Some(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .boxed(),
        ),
        LogFormat::None => None,
    }
}

fn filter_from_env() -> anyhow::Result<EnvFilter> {
    match std::env::var(LOG_FILTER_ENV) {
        Ok(directive) if !directive.is_empty() => Ok(EnvFilter::try_new(directive)?),
        _ => Ok(EnvFilter::new(DEFAULT_FILTER)),
    }
}

/// Installs the global subscriber. Fails if the filter directive is
/// malformed or a subscriber is already installed.
pub fn initialize_logging() -> anyhow::Result<()> {
    let format = LogFormat::from_env();
    tracing_subscriber::registry()
        .with(filter_from_env()?)
        .with(tracing_layer(&format))
        .try_init()?;
    tracing::debug!(?format, "logging initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parse() {
        assert_eq!(LogFormat::parse(Some("json")), LogFormat::Json);
        assert_eq!(LogFormat::parse(Some("none")), LogFormat::None);
        assert_eq!(LogFormat::parse(Some("pretty")), LogFormat::Pretty);
        assert_eq!(LogFormat::parse(Some("bogus")), LogFormat::Pretty);
        assert_eq!(LogFormat::parse(None), LogFormat::Pretty);
    }

    #[test]
    fn test_none_format_has_no_layer() {
        assert!(tracing_layer::<tracing_subscriber::Registry>(&LogFormat::None).is_none());
        assert!(tracing_layer::<tracing_subscriber::Registry>(&LogFormat::Json).is_some());
    }
}
