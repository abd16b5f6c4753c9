//! Classifier configuration
//!
//! Every bounded scan window and cache ceiling lives here. None of these
//! values affect correctness of the classification itself; they trade
//! completeness on pathological documents for bounded latency per keystroke.

use anyhow::Context;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;

fn default_true() -> bool {
    true
}

fn default_verbatim_lookback() -> usize {
    20
}

fn default_fenced_lookback() -> usize {
    50
}

fn default_fenced_lookahead() -> usize {
    200
}

fn default_narrow_invalidation() -> usize {
    2
}

fn default_wide_invalidation() -> usize {
    50
}

fn default_fallback_window() -> usize {
    2
}

fn default_max_argument_scan() -> usize {
    8 * 1024
}

fn default_max_receiver_scan() -> usize {
    256
}

fn default_span_cache_capacity() -> usize {
    4096
}

fn default_template_cache_capacity() -> usize {
    1024
}

fn default_tree_cache_capacity() -> usize {
    4
}

fn default_invocation_cache_capacity() -> usize {
    8192
}

fn default_line_cache_capacity() -> usize {
    16 * 1024
}

/// Tuning knobs for one document's classifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ClassifierConfig {
    /// Lines scanned backward looking for an unterminated `@"` literal
    #[serde(default = "default_verbatim_lookback")]
    pub verbatim_lookback_lines: usize,

    /// Lines scanned backward looking for a `"""` opening fence
    #[serde(default = "default_fenced_lookback")]
    pub fenced_lookback_lines: usize,

    /// Lines scanned forward from an opening fence looking for its closer
    #[serde(default = "default_fenced_lookahead")]
    pub fenced_lookahead_lines: usize,

    /// Lines invalidated on each side of an ordinary edit
    #[serde(default = "default_narrow_invalidation")]
    pub narrow_invalidation_lines: usize,

    /// Lines invalidated on each side of an edit touching a fence or `@"` marker
    #[serde(default = "default_wide_invalidation")]
    pub wide_invalidation_lines: usize,

    /// Neighbouring lines consulted by the textual fallback when no syntax tree is available
    #[serde(default = "default_fallback_window")]
    pub fallback_window_lines: usize,

    /// Maximum characters scanned inside one call's argument list
    #[serde(default = "default_max_argument_scan")]
    pub max_argument_scan_chars: usize,

    /// Maximum characters scanned backward over a call's receiver expression
    #[serde(default = "default_max_receiver_scan")]
    pub max_receiver_scan_chars: usize,

    #[serde(default = "default_span_cache_capacity")]
    pub span_cache_capacity: usize,

    #[serde(default = "default_template_cache_capacity")]
    pub template_cache_capacity: usize,

    /// Number of parsed syntax trees kept (one per snapshot)
    #[serde(default = "default_tree_cache_capacity")]
    pub tree_cache_capacity: usize,

    #[serde(default = "default_invocation_cache_capacity")]
    pub invocation_cache_capacity: usize,

    #[serde(default = "default_line_cache_capacity")]
    pub line_cache_capacity: usize,

    /// Confirm call sites against a parsed syntax tree
    /// When disabled, only the textual heuristic is used.
    #[serde(default = "default_true")]
    pub structural_confirmation: bool,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            verbatim_lookback_lines: default_verbatim_lookback(),
            fenced_lookback_lines: default_fenced_lookback(),
            fenced_lookahead_lines: default_fenced_lookahead(),
            narrow_invalidation_lines: default_narrow_invalidation(),
            wide_invalidation_lines: default_wide_invalidation(),
            fallback_window_lines: default_fallback_window(),
            max_argument_scan_chars: default_max_argument_scan(),
            max_receiver_scan_chars: default_max_receiver_scan(),
            span_cache_capacity: default_span_cache_capacity(),
            template_cache_capacity: default_template_cache_capacity(),
            tree_cache_capacity: default_tree_cache_capacity(),
            invocation_cache_capacity: default_invocation_cache_capacity(),
            line_cache_capacity: default_line_cache_capacity(),
            structural_confirmation: true,
        }
    }
}

impl ClassifierConfig {
    /// Parse a configuration from JSON; missing fields take their defaults
    pub fn from_json_str(json: &str) -> anyhow::Result<Self> {
        serde_json::from_str(json).context("invalid classifier configuration")
    }

    /// Load a configuration file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_json_str(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }

    /// JSON Schema describing this configuration
    pub fn json_schema() -> serde_json::Value {
        let schema = schemars::schema_for!(ClassifierConfig);
        serde_json::to_value(&schema).unwrap_or(serde_json::Value::Null)
    }
}
