//! Pipeline settings
//!
//! Plain serde struct with JSON file load/save. A corrupt settings file is
//! preserved next to the original and defaults are loaded instead of failing.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// How the quality gate behaves when the reviewer is unreachable or returns
/// output that cannot be parsed.
///
/// `FailOpen` preserves the original policy: a reviewer outage degrades to
/// auto-approval at score 70, trading availability for the risk of
/// unreviewed content reaching production. `FailClosed` rejects instead.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewFailurePolicy {
    #[default]
    FailOpen,
    FailClosed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Minimum review score for an approve decision to count as approved
    #[serde(default = "default_quality_threshold")]
    pub quality_threshold: u8,
    /// Reviewer-outage behavior (see [`ReviewFailurePolicy`])
    #[serde(default)]
    pub review_failure_policy: ReviewFailurePolicy,
    /// Word count that thin-content expansion aims for
    #[serde(default = "default_target_word_count")]
    pub target_word_count: u32,
    /// Cap on issues processed per pipeline run
    #[serde(default = "default_max_fixes_per_run")]
    pub max_fixes_per_run: usize,
    /// Timeout for a single generation gateway call, in seconds
    #[serde(default = "default_gateway_timeout_secs")]
    pub gateway_timeout_secs: u64,
}

fn default_quality_threshold() -> u8 {
    80
}

fn default_target_word_count() -> u32 {
    1500
}

fn default_max_fixes_per_run() -> usize {
    20
}

fn default_gateway_timeout_secs() -> u64 {
    45
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            quality_threshold: default_quality_threshold(),
            review_failure_policy: ReviewFailurePolicy::default(),
            target_word_count: default_target_word_count(),
            max_fixes_per_run: default_max_fixes_per_run(),
            gateway_timeout_secs: default_gateway_timeout_secs(),
        }
    }
}

impl Settings {
    /// Load settings from disk, or return defaults
    pub fn load(path: &Path) -> Self {
        if let Ok(content) = fs::read_to_string(path) {
            match serde_json::from_str(&content) {
                Ok(settings) => return settings,
                Err(err) => {
                    preserve_corrupt_settings(path, &content);
                    tracing::warn!(
                        "settings file was corrupted ({}); a backup was saved and defaults were loaded",
                        err
                    );
                }
            }
        }
        Self::default()
    }

    /// Save settings to disk
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}

fn preserve_corrupt_settings(path: &Path, content: &str) {
    let corrupt_path = path.with_extension("json.corrupt");
    if fs::rename(path, &corrupt_path).is_err() {
        let _ = fs::write(&corrupt_path, content);
    }
}
