//! Pass/fail scoring

use serde::Serialize;

pub const DEFAULT_THRESHOLD_PCT: f64 = 3.0;

/// Percentage of compared pixels that differ. An empty canvas scores 0.
pub fn diff_pct(diff_pixels: u64, total_pixels: u64) -> f64 {
    if total_pixels == 0 {
        0.0
    } else {
        diff_pixels as f64 / total_pixels as f64 * 100.0
    }
}

/// Headline result of a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Score {
    pub diff_pct: f64,
    pub passed: bool,
    pub threshold_pct: f64,
    pub ignored_regions_count: usize,
    pub regions_count: usize,
    pub time_ms: u64,
    pub delta_threshold: u32,
}

impl Score {
    /// `passed` holds when `diff_pct <= threshold_pct`.
    pub fn evaluate(diff_pct: f64, threshold_pct: f64) -> Self {
        Self {
            diff_pct,
            passed: diff_pct <= threshold_pct,
            threshold_pct,
            ignored_regions_count: 0,
            regions_count: 0,
            time_ms: 0,
            delta_threshold: 0,
        }
    }

    /// One-line human summary, e.g. `diff 9.77% (threshold 3.00%) FAIL`.
    pub fn summary(&self) -> String {
        format!(
            "diff {:.2}% (threshold {:.2}%) {}",
            self.diff_pct,
            self.threshold_pct,
            if self.passed { "PASS" } else { "FAIL" }
        )
    }
}
