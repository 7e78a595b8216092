/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Loads a JSON document into an in-memory runtime, expands its object
//! tree to a fixed depth, and prints the visible rows.
//!
//! Large arrays show up as nested `[from … to]` buckets exactly as an
//! interactive inspector would render them, which makes this handy for
//! checking bucketing thresholds:
//!
//! ```text
//! object_dump data.json --depth 3 --set bucket_threshold=10
//! ```

use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use object_inspector::Inspector;
use object_inspector::InspectorConfig;
use object_inspector::ObjectTree;
use object_inspector::Runtime;
use object_inspector::SectionOptions;
use object_inspector::memory::MemoryRuntime;
use object_inspector::memory::Value;
use object_inspector::tree::flatten_tree;

/// Command-line arguments for object_dump.
#[derive(Debug, Parser)]
#[command(name = "object-dump", about = "Print the lazily expanded tree of a JSON value")]
struct Args {
    /// JSON file to load; stdin when omitted
    input: Option<PathBuf>,

    /// Number of levels below the root to expand
    #[arg(long, short, default_value_t = 1)]
    depth: usize,

    /// Threshold override as key=value (repeatable); applied after
    /// OBJECT_INSPECTOR_* environment variables
    #[arg(long = "set", value_parser = parse_override)]
    overrides: Vec<(String, String)>,

    /// Hide `__proto__` rows
    #[arg(long)]
    skip_proto: bool,
}

fn parse_override(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got '{}'", raw))
}

fn read_input(path: Option<&PathBuf>) -> anyhow::Result<serde_json::Value> {
    let text = match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?,
        None => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("reading stdin")?;
            text
        }
    };
    serde_json::from_str(&text).context("parsing JSON input")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    object_inspector_telemetry::initialize_logging()?;

    let config = InspectorConfig::from_env()?.with_pairs(args.overrides.iter().cloned())?;
    tracing::debug!(?config, "effective configuration");

    let json = read_input(args.input.as_ref())?;
    let memory = Arc::new(MemoryRuntime::new());
    let value = memory.load_json(&json);
    let root = memory.remote(&value);
    if !matches!(value, Value::Object(_)) {
        println!("{}", root.description());
        return Ok(());
    }

    let options = SectionOptions {
        skip_proto: args.skip_proto,
        ..SectionOptions::default()
    };
    let tree = ObjectTree::new(Runtime::new(memory), Arc::new(config), root, options);
    let mut inspector = Inspector::new(tree);
    inspector.expand_to_depth(args.depth).await;

    for row in flatten_tree(inspector.tree().root()) {
        let indent = "  ".repeat(row.depth);
        match row.node.value_text() {
            Some(value) => println!("{}{}: {}", indent, row.node.title(), value),
            None => println!("{}{}", indent, row.node.title()),
        }
    }
    Ok(())
}
