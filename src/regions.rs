//! Clustering of the block histogram into reportable regions
//!
//! Two independent passes share one flood-fill: [`build_regions`] keeps every
//! block with at least one differing pixel and drops small clusters as noise,
//! while [`build_grouped_regions`] seeds only on dense blocks and yields the
//! coarser "grouped hotspots" view. Both walk the grid with an explicit stack
//! so very large grids cannot overflow the call stack.

use log::{debug, warn};
use serde::Serialize;

use crate::diff::BlockGrid;
use crate::raster::PixelRect;

pub const DEFAULT_MIN_BLOCK_PIXELS: u32 = 1;
pub const DEFAULT_MIN_REGION_PIXELS: u64 = 24;
pub const DEFAULT_HOTSPOT_COVERAGE: f64 = 0.9;
pub const DEFAULT_GROUP_HOTSPOT_RATIO: f64 = 0.35;
pub const DEFAULT_GROUP_MIN_PIXELS: u32 = 32;

/// A connected cluster of blocks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub diff_pixels: u64,
    pub block_count: u32,
    pub area: u64,
}

impl Region {
    pub fn rect(&self) -> PixelRect {
        PixelRect::new(self.x, self.y, self.width, self.height)
    }
}

/// A region with its 1-based rank, as listed in reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankedRegion {
    pub id: usize,
    #[serde(flatten)]
    pub region: Region,
}

/// Number the first `limit` regions from 1.
pub fn rank_regions(regions: &[Region], limit: usize) -> Vec<RankedRegion> {
    regions
        .iter()
        .take(limit)
        .enumerate()
        .map(|(i, r)| RankedRegion { id: i + 1, region: r.clone() })
        .collect()
}

/// How the region list in a report was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RegionsMode {
    /// Connected clusters from [`build_regions`].
    Clusters,
    /// One entry per nonzero block, see [`select_report_regions`].
    Hotspots,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionOptions {
    /// A block joins a cluster when it holds at least this many differing pixels.
    pub min_block_pixels: u32,
    /// Clusters with fewer differing pixels are discarded.
    pub min_region_pixels: u64,
}

impl Default for RegionOptions {
    fn default() -> Self {
        Self {
            min_block_pixels: DEFAULT_MIN_BLOCK_PIXELS,
            min_region_pixels: DEFAULT_MIN_REGION_PIXELS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroupOptions {
    /// Minimum `diff / block area` density for a block to seed a group.
    pub hotspot_ratio: f64,
    /// Alternatively, minimum absolute differing pixels in the block.
    pub min_hotspot_pixels: u32,
}

impl Default for GroupOptions {
    fn default() -> Self {
        Self {
            hotspot_ratio: DEFAULT_GROUP_HOTSPOT_RATIO,
            min_hotspot_pixels: DEFAULT_GROUP_MIN_PIXELS,
        }
    }
}

/// Cluster every block with at least `min_block_pixels` differing pixels.
///
/// Sorted by differing pixels, then area, both descending.
pub fn build_regions(block_counts: &[u32], grid: &BlockGrid, options: RegionOptions) -> Vec<Region> {
    let min_block = options.min_block_pixels.max(1);
    let mut regions: Vec<Region> = flood_components(block_counts, grid, |idx, _, _| block_counts[idx] >= min_block)
        .into_iter()
        .filter(|r| r.diff_pixels >= options.min_region_pixels)
        .collect();
    sort_regions(&mut regions);
    debug!("clustered {} regions", regions.len());
    regions
}

/// Cluster only dense blocks: `count / area >= hotspot_ratio` or
/// `count >= min_hotspot_pixels`.
pub fn build_grouped_regions(block_counts: &[u32], grid: &BlockGrid, options: GroupOptions) -> Vec<Region> {
    let mut groups = flood_components(block_counts, grid, |idx, col, row| {
        let count = block_counts[idx];
        if count == 0 {
            return false;
        }
        let area = grid.block_area(col, row);
        area > 0 && (count as f64 / area as f64 >= options.hotspot_ratio || count >= options.min_hotspot_pixels)
    });
    sort_regions(&mut groups);
    debug!(
        "grouped {} hotspots (ratio {}, min pixels {})",
        groups.len(),
        options.hotspot_ratio,
        options.min_hotspot_pixels
    );
    groups
}

/// One region per block with any differing pixel, same ordering as clusters.
pub fn build_block_hotspots(block_counts: &[u32], grid: &BlockGrid) -> Vec<Region> {
    if block_counts.len() != grid.len() {
        return Vec::new();
    }
    let mut hotspots = Vec::new();
    for row in 0..grid.rows {
        for col in 0..grid.cols {
            let count = block_counts[grid.index(col, row)];
            if count == 0 {
                continue;
            }
            let r = grid.block_rect(col, row);
            hotspots.push(Region {
                x: r.x,
                y: r.y,
                width: r.width,
                height: r.height,
                diff_pixels: count as u64,
                block_count: 1,
                area: r.area(),
            });
        }
    }
    sort_regions(&mut hotspots);
    hotspots
}

/// Pick the region list for reporting.
///
/// A single cluster covering at least `coverage` of the canvas (typical of a
/// document-wide style change) says nothing about where things changed, so
/// in that case each nonzero block is reported on its own instead.
pub fn select_report_regions(
    regions: Vec<Region>,
    block_counts: &[u32],
    grid: &BlockGrid,
    coverage: f64,
) -> (RegionsMode, Vec<Region>) {
    let full_area = grid.width as u64 * grid.height as u64;
    if let [only] = regions.as_slice() {
        if full_area > 0 && only.area as f64 / full_area as f64 >= coverage {
            warn!(
                "one region covers {:.1}% of the canvas; reporting per-block hotspots",
                only.area as f64 / full_area as f64 * 100.0
            );
            return (RegionsMode::Hotspots, build_block_hotspots(block_counts, grid));
        }
    }
    (RegionsMode::Clusters, regions)
}

fn sort_regions(regions: &mut [Region]) {
    regions.sort_by(|a, b| b.diff_pixels.cmp(&a.diff_pixels).then(b.area.cmp(&a.area)));
}

struct Bounds {
    min_col: u32,
    max_col: u32,
    min_row: u32,
    max_row: u32,
    diff_pixels: u64,
    block_count: u32,
}

impl Bounds {
    fn new(col: u32, row: u32) -> Self {
        Self {
            min_col: col,
            max_col: col,
            min_row: row,
            max_row: row,
            diff_pixels: 0,
            block_count: 0,
        }
    }

    fn add(&mut self, col: u32, row: u32, count: u32) {
        self.min_col = self.min_col.min(col);
        self.max_col = self.max_col.max(col);
        self.min_row = self.min_row.min(row);
        self.max_row = self.max_row.max(row);
        self.diff_pixels += count as u64;
        self.block_count += 1;
    }

    fn into_region(self, grid: &BlockGrid) -> Region {
        let r = grid.span_rect(self.min_col, self.min_row, self.max_col, self.max_row);
        Region {
            x: r.x,
            y: r.y,
            width: r.width,
            height: r.height,
            diff_pixels: self.diff_pixels,
            block_count: self.block_count,
            area: r.area(),
        }
    }
}

/// 4-connected components over blocks accepted by `qualifies(index, col, row)`.
fn flood_components<F>(block_counts: &[u32], grid: &BlockGrid, qualifies: F) -> Vec<Region>
where
    F: Fn(usize, u32, u32) -> bool,
{
    if block_counts.len() != grid.len() || grid.is_empty() {
        return Vec::new();
    }
    let mut visited = vec![false; grid.len()];
    let mut stack: Vec<(u32, u32)> = Vec::new();
    let mut out = Vec::new();

    for row in 0..grid.rows {
        for col in 0..grid.cols {
            let idx = grid.index(col, row);
            if visited[idx] || !qualifies(idx, col, row) {
                continue;
            }
            visited[idx] = true;
            stack.push((col, row));
            let mut bounds = Bounds::new(col, row);

            while let Some((c, r)) = stack.pop() {
                bounds.add(c, r, block_counts[grid.index(c, r)]);
                for (nc, nr) in grid.neighbors(c, r) {
                    let n = grid.index(nc, nr);
                    if visited[n] || !qualifies(n, nc, nr) {
                        continue;
                    }
                    visited[n] = true;
                    stack.push((nc, nr));
                }
            }
            out.push(bounds.into_region(grid));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(grid: &BlockGrid, cells: &[(u32, u32, u32)]) -> Vec<u32> {
        let mut c = vec![0; grid.len()];
        for &(col, row, n) in cells {
            c[grid.index(col, row)] = n;
        }
        c
    }

    #[test]
    fn empty_histogram_yields_nothing() {
        let grid = BlockGrid::new(64, 64, 16);
        let c = vec![0; grid.len()];
        assert!(build_regions(&c, &grid, RegionOptions::default()).is_empty());
        assert!(build_grouped_regions(&c, &grid, GroupOptions::default()).is_empty());
        assert!(build_block_hotspots(&c, &grid).is_empty());
        let empty = BlockGrid::new(0, 0, 16);
        assert!(build_regions(&[], &empty, RegionOptions::default()).is_empty());
    }

    #[test]
    fn adjacent_blocks_merge_diagonals_do_not() {
        let grid = BlockGrid::new(64, 64, 16);
        let c = counts(&grid, &[(0, 0, 30), (1, 0, 30), (3, 3, 40), (2, 2, 25)]);
        let regions = build_regions(&c, &grid, RegionOptions::default());
        assert_eq!(regions.len(), 3);
        assert_eq!(regions[0], Region { x: 0, y: 0, width: 32, height: 16, diff_pixels: 60, block_count: 2, area: 512 });
        assert_eq!(regions[1].diff_pixels, 40);
        assert_eq!(regions[2].diff_pixels, 25);
    }

    #[test]
    fn small_clusters_are_noise() {
        let grid = BlockGrid::new(64, 64, 16);
        let c = counts(&grid, &[(0, 0, 10), (3, 3, 23), (2, 0, 24)]);
        let regions = build_regions(&c, &grid, RegionOptions::default());
        assert_eq!(regions.len(), 1);
        assert_eq!((regions[0].x, regions[0].diff_pixels), (32, 24));
    }

    #[test]
    fn ties_break_on_area() {
        let grid = BlockGrid::new(64, 64, 16);
        let c = counts(&grid, &[(0, 0, 30), (2, 0, 15), (3, 0, 15)]);
        let regions = build_regions(&c, &grid, RegionOptions::default());
        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0].block_count, 2);
        assert_eq!(regions[1].block_count, 1);
    }

    #[test]
    fn edge_blocks_are_clipped() {
        let grid = BlockGrid::new(40, 20, 16);
        let c = counts(&grid, &[(2, 1, 30)]);
        let regions = build_regions(&c, &grid, RegionOptions::default());
        assert_eq!((regions[0].x, regions[0].y, regions[0].width, regions[0].height), (32, 16, 8, 4));
        assert_eq!(regions[0].area, 32);
    }

    #[test]
    fn large_grid_flood_fill_does_not_recurse() {
        // A 500x500 serpentine of connected blocks.
        let grid = BlockGrid::new(500, 500, 1);
        let mut c = vec![0; grid.len()];
        for row in 0..grid.rows {
            if row % 2 == 0 {
                for col in 0..grid.cols {
                    c[grid.index(col, row)] = 1;
                }
            } else {
                let col = if row % 4 == 1 { grid.cols - 1 } else { 0 };
                c[grid.index(col, row)] = 1;
            }
        }
        let regions = build_regions(&c, &grid, RegionOptions::default());
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].diff_pixels, 250 * 500 + 250);
    }

    #[test]
    fn grouping_seeds_on_density_or_absolute_count() {
        let grid = BlockGrid::new(64, 64, 16);
        // 90 / 256 = 0.35 qualifies on ratio; 40 on absolute count; 20 neither.
        let c = counts(&grid, &[(0, 0, 90), (1, 0, 20), (3, 3, 40)]);
        let groups = build_grouped_regions(&c, &grid, GroupOptions::default());
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].diff_pixels, 90);
        assert_eq!(groups[0].block_count, 1);
        assert_eq!(groups[1].diff_pixels, 40);
    }

    #[test]
    fn grouping_uses_clipped_area_for_density() {
        // last column is 8 px wide, so 8x16 = 128 px; 45 px is dense there.
        let grid = BlockGrid::new(40, 16, 16);
        let c = counts(&grid, &[(2, 0, 45)]);
        let opts = GroupOptions { hotspot_ratio: 0.35, min_hotspot_pixels: 1000 };
        assert_eq!(build_grouped_regions(&c, &grid, opts).len(), 1);
        let c = counts(&grid, &[(0, 0, 45)]);
        assert!(build_grouped_regions(&c, &grid, opts).is_empty());
    }

    #[test]
    fn full_frame_cluster_falls_back_to_hotspots() {
        let grid = BlockGrid::new(32, 32, 16);
        let c = counts(&grid, &[(0, 0, 100), (1, 0, 50), (0, 1, 80), (1, 1, 30)]);
        let regions = build_regions(&c, &grid, RegionOptions::default());
        assert_eq!(regions.len(), 1);
        let (mode, report) = select_report_regions(regions, &c, &grid, DEFAULT_HOTSPOT_COVERAGE);
        assert_eq!(mode, RegionsMode::Hotspots);
        assert_eq!(report.len(), 4);
        assert_eq!(report[0].diff_pixels, 100);
        assert!(report.iter().all(|r| r.block_count == 1 && r.area == 256));
    }

    #[test]
    fn partial_cluster_stays_clustered() {
        let grid = BlockGrid::new(64, 64, 16);
        let c = counts(&grid, &[(0, 0, 100), (1, 0, 100)]);
        let regions = build_regions(&c, &grid, RegionOptions::default());
        let (mode, report) = select_report_regions(regions.clone(), &c, &grid, DEFAULT_HOTSPOT_COVERAGE);
        assert_eq!(mode, RegionsMode::Clusters);
        assert_eq!(report, regions);
    }

    #[test]
    fn ranked_regions_flatten_into_json() {
        let grid = BlockGrid::new(32, 32, 16);
        let c = counts(&grid, &[(0, 0, 100)]);
        let ranked = rank_regions(&build_regions(&c, &grid, RegionOptions::default()), 5);
        let v = serde_json::to_value(&ranked).unwrap();
        assert_eq!(v[0]["id"], 1);
        assert_eq!(v[0]["diffPixels"], 100);
        assert_eq!(v[0]["blockCount"], 1);
    }
}
