//! Engine tuning knobs.
//!
//! Every threshold has a default matching the behaviour of the interactive
//! tool, so an empty YAML document (or no file at all) yields a working
//! configuration. Field names are `snake_case` in YAML:
//!
//! ```yaml
//! direct_read_threshold: 52428800
//! page_size: 50
//! hide_internal_fields: true
//! ```

use std::{fs, path::Path, time::Duration};

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};

const MIB: u64 = 1024 * 1024;

pub const DEFAULT_INTERNAL_FIELDS: &[&str] = &[
    "route_cost",
    "hlr_lookup_cost",
    "gateway",
    "gateway_id",
    "gateway_error_code",
    "routing_rule_seq",
    "channel",
    "srr",
    "date_submitted",
];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Inputs below this size are read in a single direct pass.
    pub direct_read_threshold: u64,
    /// Inputs above this size are parsed in streaming mode.
    pub streaming_threshold: u64,
    /// Slice size for buffered reads.
    pub read_chunk_size: u64,
    /// Slice size for streaming mode.
    pub stream_chunk_size: u64,
    /// Line count above which the row loop runs in batches.
    pub batch_threshold: usize,
    pub batch_size: usize,
    /// Row count above which inference uses the smaller sample.
    pub large_dataset_rows: usize,
    pub sample_size: usize,
    pub large_sample_size: usize,
    pub page_size: usize,
    /// Default cap for interactive previews and preset loads.
    pub preview_limit: usize,
    pub virtual_threshold: usize,
    pub row_height: u32,
    pub viewport_height: u32,
    pub buffer_rows: usize,
    pub scroll_throttle_ms: u64,
    pub timeout_secs: u64,
    pub history_limit: usize,
    pub hide_internal_fields: bool,
    pub internal_fields: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            direct_read_threshold: 50 * MIB,
            streaming_threshold: 500 * MIB,
            read_chunk_size: 50 * MIB,
            stream_chunk_size: 10 * MIB,
            batch_threshold: 5000,
            batch_size: 1000,
            large_dataset_rows: 10_000,
            sample_size: 500,
            large_sample_size: 200,
            page_size: 20,
            preview_limit: 50,
            virtual_threshold: 1000,
            row_height: 40,
            viewport_height: 400,
            buffer_rows: 5,
            scroll_throttle_ms: 16,
            timeout_secs: 30,
            history_limit: 50,
            hide_internal_fields: false,
            internal_fields: DEFAULT_INTERNAL_FIELDS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl EngineConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Opening config file {path:?}"))?;
        // An empty file means "all defaults".
        let config: EngineConfig = if raw.trim().is_empty() {
            EngineConfig::default()
        } else {
            serde_yaml::from_str(&raw)
                .with_context(|| format!("Parsing config file {path:?}"))?
        };
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let serialized = serde_yaml::to_string(self).context("Serializing engine config")?;
        fs::write(path, serialized).with_context(|| format!("Writing config file {path:?}"))
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(self.page_size > 0, "page_size must be greater than zero");
        ensure!(self.batch_size > 0, "batch_size must be greater than zero");
        ensure!(
            self.read_chunk_size > 0 && self.stream_chunk_size > 0,
            "chunk sizes must be greater than zero"
        );
        ensure!(self.row_height > 0, "row_height must be greater than zero");
        ensure!(
            self.direct_read_threshold <= self.streaming_threshold,
            "direct_read_threshold cannot exceed streaming_threshold"
        );
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn scroll_throttle(&self) -> Duration {
        Duration::from_millis(self.scroll_throttle_ms)
    }
}
