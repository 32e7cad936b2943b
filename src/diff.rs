//! Per-pixel comparison and the block histogram everything else builds on

use log::{debug, warn};
use serde::Serialize;

use crate::raster::{byte_len, PixelRect, RasterImage, Rect};
use crate::score;

pub const DEFAULT_BLOCK_SIZE: u32 = 16;

/// A grid of `block_size` square cells laid over a `width` x `height` canvas.
///
/// The last column/row is clipped to the canvas, so blocks tile it exactly
/// without overlapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockGrid {
    pub cols: u32,
    pub rows: u32,
    pub block_size: u32,
    pub width: u32,
    pub height: u32,
}

impl BlockGrid {
    pub fn new(width: u32, height: u32, block_size: u32) -> Self {
        let block_size = block_size.max(1);
        Self {
            cols: width.div_ceil(block_size),
            rows: height.div_ceil(block_size),
            block_size,
            width,
            height,
        }
    }

    /// Number of blocks.
    pub fn len(&self) -> usize {
        self.cols as usize * self.rows as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn index(&self, col: u32, row: u32) -> usize {
        row as usize * self.cols as usize + col as usize
    }

    /// Pixel bounds of a block, clipped to the canvas.
    pub fn block_rect(&self, col: u32, row: u32) -> PixelRect {
        let x = col * self.block_size;
        let y = row * self.block_size;
        PixelRect::new(
            x,
            y,
            self.block_size.min(self.width.saturating_sub(x)),
            self.block_size.min(self.height.saturating_sub(y)),
        )
    }

    /// Pixel count of a block after clipping.
    pub fn block_area(&self, col: u32, row: u32) -> u32 {
        let r = self.block_rect(col, row);
        r.width * r.height
    }

    /// 4-connected neighbors that lie inside the grid.
    pub fn neighbors(&self, col: u32, row: u32) -> impl Iterator<Item = (u32, u32)> {
        let (cols, rows) = (self.cols, self.rows);
        [
            (row > 0).then(|| (col, row - 1)),
            (row + 1 < rows).then(|| (col, row + 1)),
            (col > 0).then(|| (col - 1, row)),
            (col + 1 < cols).then(|| (col + 1, row)),
        ]
        .into_iter()
        .flatten()
    }

    /// Bounding box, in pixels, of the blocks spanning `min..=max`.
    pub(crate) fn span_rect(&self, min_col: u32, min_row: u32, max_col: u32, max_row: u32) -> PixelRect {
        let x = min_col * self.block_size;
        let y = min_row * self.block_size;
        let right = self.width.min((max_col + 1) * self.block_size);
        let bottom = self.height.min((max_row + 1) * self.block_size);
        PixelRect::new(x, y, right.saturating_sub(x).max(1), bottom.saturating_sub(y).max(1))
    }
}

/// Tuning knobs for [`diff_images`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiffOptions {
    /// Edge length of histogram blocks in pixels.
    pub block_size: u32,
    /// A pixel differs when its channel-sum delta is strictly greater.
    pub delta_threshold: u32,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            delta_threshold: 0,
        }
    }
}

/// Output of one comparison pass.
#[derive(Debug, Clone)]
pub struct DiffResult {
    /// Visualization: current image with differing pixels tinted red.
    pub diff_image: RasterImage,
    /// One flag per canvas pixel, set where the pixel differs.
    pub diff_mask: Vec<bool>,
    /// One flag per canvas pixel, set where an ignore region covers it.
    pub ignore_mask: Vec<bool>,
    pub diff_pixels: u64,
    /// Compared pixels, ignored ones excluded.
    pub total_pixels: u64,
    /// Ignore regions that survived clipping to the canvas.
    pub ignored_regions_count: usize,
    /// Differing pixels per block, row-major over `grid`.
    pub block_counts: Vec<u32>,
    pub grid: BlockGrid,
}

impl DiffResult {
    pub fn width(&self) -> u32 {
        self.grid.width
    }

    pub fn height(&self) -> u32 {
        self.grid.height
    }

    /// Percentage of compared pixels that differ; 0 on an empty canvas.
    pub fn diff_pct(&self) -> f64 {
        score::diff_pct(self.diff_pixels, self.total_pixels)
    }

    pub fn ignored_pixels(&self) -> u64 {
        self.ignore_mask.iter().filter(|&&m| m).count() as u64
    }

    fn empty(width: u32, height: u32, block_size: u32) -> Self {
        let grid = BlockGrid::new(width, height, block_size);
        let pixels = width as usize * height as usize;
        Self {
            diff_image: RasterImage::from_raw_unchecked(width, height, vec![0; byte_len(width, height)]),
            diff_mask: vec![false; pixels],
            ignore_mask: vec![false; pixels],
            diff_pixels: 0,
            total_pixels: 0,
            ignored_regions_count: 0,
            block_counts: vec![0; grid.len()],
            grid,
        }
    }
}

/// Sum of absolute per-channel differences, 0..=1020.
#[inline]
pub fn pixel_delta(a: &[u8], b: &[u8]) -> u32 {
    a.iter().zip(b).map(|(&x, &y)| (x as i32 - y as i32).unsigned_abs()).sum()
}

/// Compare the overlapping area of two images.
///
/// The compared canvas is `min(width)` x `min(height)`. Pixels inside any
/// ignore region are excluded from both tallies and shown with the current
/// image's color. A zero-area overlap yields an empty result with no
/// differences.
pub fn diff_images(
    reference: &RasterImage,
    current: &RasterImage,
    ignore: &[Rect],
    options: DiffOptions,
) -> DiffResult {
    let width = reference.width().min(current.width());
    let height = reference.height().min(current.height());
    let mut result = DiffResult::empty(width, height, options.block_size);
    if width == 0 || height == 0 {
        warn!(
            "no overlap between {}x{} reference and {}x{} capture; nothing to compare",
            reference.width(),
            reference.height(),
            current.width(),
            current.height()
        );
        return result;
    }

    let clipped: Vec<PixelRect> = ignore.iter().filter_map(|r| r.clip_to(width, height)).collect();
    result.ignored_regions_count = clipped.len();
    for r in &clipped {
        for y in r.y..r.bottom() {
            let row = y as usize * width as usize;
            result.ignore_mask[row + r.x as usize..row + r.right() as usize].fill(true);
        }
    }

    let grid = result.grid;
    let ref_data = reference.data();
    let cur_data = current.data();
    let out = result.diff_image.data_mut();

    for y in 0..height {
        let block_row = y / grid.block_size;
        for x in 0..width {
            let mask_idx = y as usize * width as usize + x as usize;
            let ri = reference.offset(x, y);
            let ci = current.offset(x, y);
            let oi = mask_idx * 4;
            let cur = &cur_data[ci..ci + 4];

            if result.ignore_mask[mask_idx] {
                out[oi..oi + 3].copy_from_slice(&cur[..3]);
                out[oi + 3] = 255;
                continue;
            }

            result.total_pixels += 1;
            if pixel_delta(&ref_data[ri..ri + 4], cur) > options.delta_threshold {
                result.diff_pixels += 1;
                result.diff_mask[mask_idx] = true;
                result.block_counts[grid.index(x / grid.block_size, block_row)] += 1;
                out[oi] = 255;
                out[oi + 1] = (cur[1] as f64 * 0.2).round() as u8;
                out[oi + 2] = (cur[2] as f64 * 0.2).round() as u8;
            } else {
                out[oi..oi + 3].copy_from_slice(&cur[..3]);
            }
            out[oi + 3] = 255;
        }
    }

    debug!(
        "diffed {}x{} canvas: {} of {} pixels differ, {} ignore regions, {}x{} blocks",
        width,
        height,
        result.diff_pixels,
        result.total_pixels,
        result.ignored_regions_count,
        grid.cols,
        grid.rows
    );
    result
}
