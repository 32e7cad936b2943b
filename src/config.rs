//! Run configuration
//!
//! Every threshold the engine uses lives here. The values for hotspot
//! coverage and the mask heuristics are tuned against known flicker patterns
//! and are policy, not algorithm: override them per project as needed.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::diff::{DiffOptions, DEFAULT_BLOCK_SIZE};
use crate::heatmap::{HeatmapOptions, DEFAULT_MAX_ALPHA, DEFAULT_MIN_ALPHA};
use crate::masks::{MaskOptions, DEFAULT_FULL_RATIO, DEFAULT_MIN_SPAN_BLOCKS, DEFAULT_TOP_ROWS};
use crate::raster::Rect;
use crate::regions::{
    GroupOptions, RegionOptions, DEFAULT_GROUP_HOTSPOT_RATIO, DEFAULT_GROUP_MIN_PIXELS, DEFAULT_HOTSPOT_COVERAGE,
    DEFAULT_MIN_BLOCK_PIXELS, DEFAULT_MIN_REGION_PIXELS,
};
use crate::score::DEFAULT_THRESHOLD_PCT;
use crate::{Error, Result};

/// Channel-sum delta at or below which pixels count as unchanged in full runs.
///
/// Absorbs anti-aliasing and color-management noise between captures.
pub const DEFAULT_DELTA_THRESHOLD: u32 = 64;

/// Regions listed individually in reports.
pub const DEFAULT_TOP_REGIONS: usize = 5;

/// Configuration for a reference diff run
///
/// Deserializes from the camelCase JSON used in slide configs; missing fields
/// take their defaults.
///
/// # Examples
///
/// ```
/// let cfg = refdiff::DiffConfig::from_json_str(r#"{"diff": {"thresholdPct": 1.5}}"#).unwrap();
/// assert_eq!(cfg.threshold_pct, 1.5);
/// assert_eq!(cfg.block_size, 16);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DiffConfig {
    /// Maximum diff percentage that still passes
    pub threshold_pct: f64,
    /// Rectangles excluded from the comparison, in reference pixel space
    pub ignore_regions: Vec<Rect>,
    /// Histogram block edge in pixels
    pub block_size: u32,
    /// Per-pixel channel-sum delta that must be exceeded to count as different
    pub delta_threshold: u32,
    /// Minimum differing pixels for a block to join a cluster
    pub min_block_pixels: u32,
    /// Clusters below this many differing pixels are dropped
    pub min_region_pixels: u64,
    /// How many regions are numbered and outlined on the diff image
    pub top_regions: usize,
    /// Canvas share a lone cluster must cover to switch to per-block hotspots
    pub hotspot_coverage: f64,
    pub group_hotspot_ratio: f64,
    pub group_min_pixels: u32,
    pub mask_top_rows: u32,
    pub mask_full_ratio: f64,
    pub mask_min_span_blocks: u32,
    pub heatmap_min_alpha: f64,
    pub heatmap_max_alpha: f64,
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            threshold_pct: DEFAULT_THRESHOLD_PCT,
            ignore_regions: Vec::new(),
            block_size: DEFAULT_BLOCK_SIZE,
            delta_threshold: DEFAULT_DELTA_THRESHOLD,
            min_block_pixels: DEFAULT_MIN_BLOCK_PIXELS,
            min_region_pixels: DEFAULT_MIN_REGION_PIXELS,
            top_regions: DEFAULT_TOP_REGIONS,
            hotspot_coverage: DEFAULT_HOTSPOT_COVERAGE,
            group_hotspot_ratio: DEFAULT_GROUP_HOTSPOT_RATIO,
            group_min_pixels: DEFAULT_GROUP_MIN_PIXELS,
            mask_top_rows: DEFAULT_TOP_ROWS,
            mask_full_ratio: DEFAULT_FULL_RATIO,
            mask_min_span_blocks: DEFAULT_MIN_SPAN_BLOCKS,
            heatmap_min_alpha: DEFAULT_MIN_ALPHA,
            heatmap_max_alpha: DEFAULT_MAX_ALPHA,
        }
    }
}

impl DiffConfig {
    /// Parse either a bare config object or a document with a `diff` section.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let mut value: Value = serde_json::from_str(text)?;
        let section = if value.get("diff").is_some_and(Value::is_object) {
            value["diff"].take()
        } else {
            value
        };
        let cfg: DiffConfig = serde_json::from_value(section)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject values no run can use.
    pub fn validate(&self) -> Result<()> {
        let finite = [
            ("thresholdPct", self.threshold_pct),
            ("hotspotCoverage", self.hotspot_coverage),
            ("groupHotspotRatio", self.group_hotspot_ratio),
            ("maskFullRatio", self.mask_full_ratio),
            ("heatmapMinAlpha", self.heatmap_min_alpha),
            ("heatmapMaxAlpha", self.heatmap_max_alpha),
        ];
        for (name, v) in finite {
            if !v.is_finite() || v < 0.0 {
                return Err(Error::ConfigError(format!("{} must be a non-negative number, got {}", name, v)));
            }
        }
        if self.block_size == 0 {
            return Err(Error::ConfigError("blockSize must be at least 1".to_string()));
        }
        if self.heatmap_max_alpha > 1.0 || self.heatmap_min_alpha > self.heatmap_max_alpha {
            return Err(Error::ConfigError(format!(
                "heatmap alpha range [{}, {}] must lie within [0, 1] with min <= max",
                self.heatmap_min_alpha, self.heatmap_max_alpha
            )));
        }
        if let Some(r) = self.ignore_regions.iter().find(|r| !r.is_finite()) {
            return Err(Error::ConfigError(format!("ignore region {:?} is not finite", r)));
        }
        Ok(())
    }

    /// Set the pass threshold.
    pub fn with_threshold_pct(mut self, pct: f64) -> Self {
        self.threshold_pct = pct;
        self
    }

    /// Set the per-pixel delta threshold.
    pub fn with_delta_threshold(mut self, delta: u32) -> Self {
        self.delta_threshold = delta;
        self
    }

    /// Set the histogram block size.
    pub fn with_block_size(mut self, block_size: u32) -> Self {
        self.block_size = block_size;
        self
    }

    /// Replace the ignore regions.
    pub fn with_ignore_regions(mut self, regions: Vec<Rect>) -> Self {
        self.ignore_regions = regions;
        self
    }

    pub fn diff_options(&self) -> DiffOptions {
        DiffOptions {
            block_size: self.block_size,
            delta_threshold: self.delta_threshold,
        }
    }

    pub fn region_options(&self) -> RegionOptions {
        RegionOptions {
            min_block_pixels: self.min_block_pixels,
            min_region_pixels: self.min_region_pixels,
        }
    }

    pub fn group_options(&self) -> GroupOptions {
        GroupOptions {
            hotspot_ratio: self.group_hotspot_ratio,
            min_hotspot_pixels: self.group_min_pixels,
        }
    }

    pub fn mask_options(&self) -> MaskOptions {
        MaskOptions {
            top_rows: self.mask_top_rows,
            min_full_ratio: self.mask_full_ratio,
            min_span_blocks: self.mask_min_span_blocks,
        }
    }

    pub fn heatmap_options(&self) -> HeatmapOptions {
        HeatmapOptions {
            min_alpha: self.heatmap_min_alpha,
            max_alpha: self.heatmap_max_alpha,
        }
    }
}
