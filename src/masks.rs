//! Ignore-mask suggestions for flaky strips along the top edge
//!
//! Captures of the same slide often differ only by a thin band of
//! non-deterministic rendering at the top of the frame (toolbars, progress
//! indicators, font shimmer). This module finds runs of nearly fully changed
//! blocks in the top rows and scores what masking each run would do, so an
//! operator can decide whether to adopt it as a permanent ignore region.

use log::debug;
use serde::Serialize;

use crate::diff::DiffResult;
use crate::raster::{PixelRect, Rect};
use crate::score;

pub const DEFAULT_TOP_ROWS: u32 = 3;
pub const DEFAULT_FULL_RATIO: f64 = 0.9;
pub const DEFAULT_MIN_SPAN_BLOCKS: u32 = 4;

const STRATEGY: &str = "top-edge-full-tiles";
const RATIONALE: &str = "High-diff tiles along top edge (likely shimmer/noise)";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaskOptions {
    /// Block rows scanned from the top of the frame.
    pub top_rows: u32,
    /// Minimum block density for a column to count as hot.
    pub min_full_ratio: f64,
    /// Minimum run of adjacent hot columns worth suggesting.
    pub min_span_blocks: u32,
}

impl Default for MaskOptions {
    fn default() -> Self {
        Self {
            top_rows: DEFAULT_TOP_ROWS,
            min_full_ratio: DEFAULT_FULL_RATIO,
            min_span_blocks: DEFAULT_MIN_SPAN_BLOCKS,
        }
    }
}

/// Counterfactual effect of masking one rectangle.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MaskImpact {
    /// Compared pixels the mask would remove.
    pub masked_pixels: u64,
    /// Differing pixels among them.
    pub masked_diff_pixels: u64,
    pub diff_pct_after: f64,
    pub diff_pct_reduction: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MaskSuggestion {
    pub id: usize,
    pub rect: PixelRect,
    pub rationale: String,
    pub impact: MaskImpact,
}

impl MaskSuggestion {
    /// The suggestion as an ignore region, ready to paste into a config.
    pub fn as_ignore_region(&self) -> Rect {
        self.rect.into()
    }
}

/// All suggestions from one pass plus the parameters that produced them.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MaskReport {
    pub strategy: String,
    pub top_rows: u32,
    pub min_full_ratio: f64,
    pub min_span_blocks: u32,
    pub total_pixels: u64,
    pub diff_pixels: u64,
    pub diff_pct: f64,
    pub suggestions: Vec<MaskSuggestion>,
}

/// Recompute the diff percentage as if `rect` were an ignore region.
///
/// Already-ignored pixels inside the rectangle are not counted twice.
pub fn estimate_mask_impact(diff: &DiffResult, rect: &Rect) -> Option<MaskImpact> {
    let r = rect.clip_to(diff.width(), diff.height())?;
    let width = diff.width() as usize;
    let mut masked_pixels = 0u64;
    let mut masked_diff_pixels = 0u64;
    for y in r.y..r.bottom() {
        let row = y as usize * width;
        for x in r.x as usize..r.right() as usize {
            if diff.ignore_mask[row + x] {
                continue;
            }
            masked_pixels += 1;
            if diff.diff_mask[row + x] {
                masked_diff_pixels += 1;
            }
        }
    }
    let before = diff.diff_pct();
    let after = score::diff_pct(
        diff.diff_pixels - masked_diff_pixels,
        diff.total_pixels - masked_pixels,
    );
    Some(MaskImpact {
        masked_pixels,
        masked_diff_pixels,
        diff_pct_after: after,
        diff_pct_reduction: before - after,
    })
}

/// Suggest masks for runs of hot columns in the top block rows.
///
/// A column is hot when any of its top `top_rows` blocks has density
/// `>= min_full_ratio`. Each run of at least `min_span_blocks` hot columns
/// becomes a rectangle spanning the run and `top_rows * block_size` pixels
/// down, clipped to the canvas.
pub fn suggest_top_edge_masks(diff: &DiffResult, options: MaskOptions) -> MaskReport {
    let grid = diff.grid;
    let rows = grid.rows.min(options.top_rows.max(1));
    let mut report = MaskReport {
        strategy: STRATEGY.to_string(),
        top_rows: rows,
        min_full_ratio: options.min_full_ratio,
        min_span_blocks: options.min_span_blocks,
        total_pixels: diff.total_pixels,
        diff_pixels: diff.diff_pixels,
        diff_pct: diff.diff_pct(),
        suggestions: Vec::new(),
    };
    if diff.block_counts.len() != grid.len() || grid.is_empty() {
        return report;
    }

    let hot: Vec<bool> = (0..grid.cols)
        .map(|col| {
            (0..rows).any(|row| {
                let count = diff.block_counts[grid.index(col, row)];
                let area = grid.block_area(col, row);
                count > 0 && area > 0 && count as f64 / area as f64 >= options.min_full_ratio
            })
        })
        .collect();

    let min_span = options.min_span_blocks.max(1);
    let mut start: Option<u32> = None;
    for col in 0..=grid.cols {
        let is_hot = col < grid.cols && hot[col as usize];
        match (is_hot, start) {
            (true, None) => start = Some(col),
            (false, Some(s)) => {
                let span = col - s;
                if span >= min_span {
                    let x = s * grid.block_size;
                    let rect = Rect::new(
                        x as f64,
                        0.0,
                        (span * grid.block_size).min(grid.width - x) as f64,
                        (rows * grid.block_size).min(grid.height) as f64,
                    );
                    if let (Some(pixel_rect), Some(impact)) =
                        (rect.clip_to(grid.width, grid.height), estimate_mask_impact(diff, &rect))
                    {
                        report.suggestions.push(MaskSuggestion {
                            id: report.suggestions.len() + 1,
                            rect: pixel_rect,
                            rationale: RATIONALE.to_string(),
                            impact,
                        });
                    }
                }
                start = None;
            }
            _ => {}
        }
    }

    debug!(
        "{} mask suggestions from {} hot columns in top {} rows",
        report.suggestions.len(),
        hot.iter().filter(|&&h| h).count(),
        rows
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::{diff_images, DiffOptions};
    use crate::raster::RasterImage;

    fn strip_diff(width: u32, height: u32, strip: PixelRect, ignore: &[Rect]) -> DiffResult {
        let reference = RasterImage::filled(width, height, [0, 0, 0, 255]);
        let mut current = reference.clone();
        for y in strip.y..strip.bottom() {
            for x in strip.x..strip.right() {
                current.put_pixel(x, y, [255, 255, 255, 255]);
            }
        }
        diff_images(&reference, &current, ignore, DiffOptions::default())
    }

    #[test]
    fn full_strip_yields_one_suggestion_that_removes_the_diff() {
        // 5 blocks wide, 2 blocks tall, starting at block column 2
        let diff = strip_diff(160, 160, PixelRect::new(32, 0, 80, 32), &[]);
        let report = suggest_top_edge_masks(&diff, MaskOptions::default());
        assert_eq!(report.suggestions.len(), 1);
        let s = &report.suggestions[0];
        assert_eq!(s.id, 1);
        assert_eq!(s.rect, PixelRect::new(32, 0, 80, 48));
        assert_eq!(s.impact.masked_pixels, 80 * 48);
        assert_eq!(s.impact.masked_diff_pixels, 80 * 32);
        assert_eq!(s.impact.diff_pct_after, 0.0);
        assert!((s.impact.diff_pct_reduction - diff.diff_pct()).abs() < 1e-9);
        assert_eq!(s.as_ignore_region(), Rect::new(32.0, 0.0, 80.0, 48.0));
    }

    #[test]
    fn short_runs_and_sparse_blocks_are_skipped() {
        // three blocks wide: shorter than the default span of four
        let diff = strip_diff(160, 160, PixelRect::new(0, 0, 48, 16), &[]);
        assert!(suggest_top_edge_masks(&diff, MaskOptions::default()).suggestions.is_empty());

        // wide but only half of each block changed
        let diff = strip_diff(160, 160, PixelRect::new(0, 0, 160, 8), &[]);
        assert!(suggest_top_edge_masks(&diff, MaskOptions::default()).suggestions.is_empty());
    }

    #[test]
    fn hot_blocks_below_scanned_rows_are_ignored() {
        let diff = strip_diff(160, 160, PixelRect::new(0, 64, 160, 16), &[]);
        let report = suggest_top_edge_masks(&diff, MaskOptions::default());
        assert!(report.suggestions.is_empty());
        let report = suggest_top_edge_masks(&diff, MaskOptions { top_rows: 5, ..Default::default() });
        assert_eq!(report.suggestions.len(), 1);
        assert_eq!(report.suggestions[0].rect, PixelRect::new(0, 0, 160, 80));
    }

    #[test]
    fn run_touching_right_edge_is_clipped() {
        let diff = strip_diff(100, 100, PixelRect::new(36, 0, 64, 16), &[]);
        // columns 3..=6 are fully hot (column 2 is 12/16 = 0.75), last is 4 px wide
        let report = suggest_top_edge_masks(&diff, MaskOptions::default());
        assert_eq!(report.suggestions.len(), 1);
        assert_eq!(report.suggestions[0].rect, PixelRect::new(48, 0, 52, 48));
    }

    #[test]
    fn impact_skips_already_ignored_pixels() {
        let ignore = [Rect::new(0.0, 40.0, 160.0, 8.0)];
        let diff = strip_diff(160, 160, PixelRect::new(0, 0, 160, 16), &ignore);
        let impact = estimate_mask_impact(&diff, &Rect::new(0.0, 0.0, 160.0, 48.0)).unwrap();
        assert_eq!(impact.masked_pixels, 160 * 40);
        assert_eq!(impact.masked_diff_pixels, 160 * 16);
        assert!(estimate_mask_impact(&diff, &Rect::new(500.0, 0.0, 5.0, 5.0)).is_none());
    }

    #[test]
    fn empty_diff_reports_no_suggestions() {
        let img = RasterImage::filled(0, 0, [0, 0, 0, 0]);
        let diff = diff_images(&img, &img, &[], DiffOptions::default());
        let report = suggest_top_edge_masks(&diff, MaskOptions::default());
        assert!(report.suggestions.is_empty());
        assert_eq!(report.strategy, "top-edge-full-tiles");
    }
}
