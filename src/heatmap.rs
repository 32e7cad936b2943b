//! Block-density heatmap overlay

use log::debug;

use crate::diff::BlockGrid;
use crate::raster::RasterImage;

pub const DEFAULT_MIN_ALPHA: f64 = 0.12;
pub const DEFAULT_MAX_ALPHA: f64 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeatmapOptions {
    pub min_alpha: f64,
    pub max_alpha: f64,
}

impl Default for HeatmapOptions {
    fn default() -> Self {
        Self {
            min_alpha: DEFAULT_MIN_ALPHA,
            max_alpha: DEFAULT_MAX_ALPHA,
        }
    }
}

/// Blend a warm ramp over every block of `base` that holds differences.
///
/// Each block's density (`count / block area`) is normalized against the
/// densest block; the resulting intensity drives both the color
/// (`R=255, G=200*(1-intensity), B=0`) and the blend alpha, which runs from
/// `min_alpha` up to `max_alpha`. Blocks without differences are left as is.
pub fn build_heatmap_image(
    base: &RasterImage,
    block_counts: &[u32],
    grid: &BlockGrid,
    options: HeatmapOptions,
) -> RasterImage {
    let mut out = base.clone();
    if block_counts.len() != grid.len() {
        return out;
    }

    let mut max_density = 0.0f64;
    for row in 0..grid.rows {
        for col in 0..grid.cols {
            let count = block_counts[grid.index(col, row)];
            let area = grid.block_area(col, row);
            if count > 0 && area > 0 {
                max_density = max_density.max(count as f64 / area as f64);
            }
        }
    }
    if max_density <= 0.0 {
        return out;
    }

    let (width, height) = (out.width(), out.height());
    let mut blended = 0usize;
    for row in 0..grid.rows {
        for col in 0..grid.cols {
            let count = block_counts[grid.index(col, row)];
            let area = grid.block_area(col, row);
            if count == 0 || area == 0 {
                continue;
            }
            let intensity = (count as f64 / area as f64 / max_density).min(1.0);
            let alpha = (options.min_alpha + intensity * (options.max_alpha - options.min_alpha))
                .min(options.max_alpha)
                .clamp(0.0, 1.0);
            let heat = [255.0, (200.0 * (1.0 - intensity)).round().max(0.0), 0.0];

            let r = grid.block_rect(col, row);
            let data = out.data_mut();
            for y in r.y..r.bottom().min(height) {
                for x in r.x..r.right().min(width) {
                    let i = (y as usize * width as usize + x as usize) * 4;
                    for c in 0..3 {
                        let v = data[i + c] as f64 * (1.0 - alpha) + heat[c] * alpha;
                        data[i + c] = v.round().clamp(0.0, 255.0) as u8;
                    }
                    data[i + 3] = 255;
                }
            }
            blended += 1;
        }
    }
    debug!("heatmap blended {} blocks (max density {:.3})", blended, max_density);
    out
}
