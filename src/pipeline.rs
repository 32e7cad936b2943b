//! End-to-end reference diff run
//!
//! decode -> normalize -> diff -> {regions, grouped hotspots} -> overlay ->
//! heatmap -> score -> mask suggestions. Every stage is a pure function of
//! its inputs, so identical bytes and config always yield the same report
//! (apart from `time_ms`).

use std::time::Instant;

use log::{debug, info};
use serde::Serialize;

use crate::config::DiffConfig;
use crate::diff::{diff_images, BlockGrid};
use crate::heatmap::build_heatmap_image;
use crate::masks::{suggest_top_edge_masks, MaskReport};
use crate::normalize::{normalize_pair, Normalization};
use crate::overlay::draw_region_boxes;
use crate::png;
use crate::raster::RasterImage;
use crate::regions::{
    build_grouped_regions, build_regions, rank_regions, select_report_regions, RankedRegion, Region, RegionsMode,
};
use crate::score::Score;
use crate::{Error, Result, ScreenshotSource};

/// Dimensions and fingerprint of one input image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
    pub digest: String,
}

impl ImageInfo {
    fn of(image: &RasterImage) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
            digest: image.digest(),
        }
    }
}

/// Diff totals as recorded in run metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffSummary {
    #[serde(flatten)]
    pub score: Score,
    pub regions_mode: RegionsMode,
    pub regions_cluster_count: usize,
    pub diff_pixels: u64,
    pub total_pixels: u64,
    pub width: u32,
    pub height: u32,
    pub grid: BlockGrid,
}

/// Grouped-hotspot pass output.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupReport {
    pub block_size: u32,
    pub hotspot_ratio: f64,
    pub min_hotspot_pixels: u32,
    pub groups_count: usize,
    pub groups: Vec<Region>,
}

impl GroupReport {
    /// `groups=N, hotspotRatio=R, minPixels=M`
    pub fn summary(&self) -> String {
        format!(
            "groups={}, hotspotRatio={}, minPixels={}",
            self.groups_count, self.hotspot_ratio, self.min_hotspot_pixels
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeatmapInfo {
    pub min_alpha: f64,
    pub max_alpha: f64,
}

/// Everything known about a run, minus the images.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunMetadata {
    pub reference: ImageInfo,
    pub current: ImageInfo,
    pub normalization: Normalization,
    pub diff: DiffSummary,
    pub regions_top: Vec<RankedRegion>,
    pub groups_top: Vec<RankedRegion>,
    pub groups_summary: String,
    pub heatmap: HeatmapInfo,
    pub mask_suggestions: MaskReport,
}

/// Result of [`run_reference_diff`].
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Diff visualization with the top regions outlined.
    pub diff_image: RasterImage,
    /// Block-density heatmap over the current capture.
    pub heatmap: RasterImage,
    /// The reference rescaled onto the current canvas, when sizes differed.
    pub reference_match: Option<RasterImage>,
    pub score: Score,
    pub regions: Vec<Region>,
    pub regions_mode: RegionsMode,
    pub groups: GroupReport,
    pub masks: MaskReport,
    pub metadata: RunMetadata,
}

/// PNG encodings of the report's images.
#[derive(Debug, Clone)]
pub struct Artifacts {
    pub diff_png: Vec<u8>,
    pub heatmap_png: Vec<u8>,
    pub reference_match_png: Option<Vec<u8>>,
}

impl RunReport {
    pub fn passed(&self) -> bool {
        self.score.passed
    }

    /// Encode the visualization images.
    pub fn encode_artifacts(&self) -> Result<Artifacts> {
        Ok(Artifacts {
            diff_png: png::encode(&self.diff_image)?,
            heatmap_png: png::encode(&self.heatmap)?,
            reference_match_png: self.reference_match.as_ref().map(png::encode).transpose()?,
        })
    }
}

/// Decode both PNGs and compare them.
pub fn run_reference_diff(reference_png: &[u8], current_png: &[u8], config: &DiffConfig) -> Result<RunReport> {
    config.validate()?;
    let reference = png::decode(reference_png)?;
    let current = png::decode(current_png)?;
    compare_images(&reference, &current, config)
}

/// Capture from `source` and compare the capture against `reference_png`.
pub fn compare_with_source(
    source: &mut dyn ScreenshotSource,
    reference_png: &[u8],
    config: &DiffConfig,
) -> Result<RunReport> {
    config.validate()?;
    let reference = png::decode(reference_png)?;
    let bytes = source.capture_png()?;
    if bytes.is_empty() {
        return Err(Error::Capture("screenshot source returned no image data".to_string()));
    }
    let current = png::decode(&bytes)?;
    compare_images(&reference, &current, config)
}

/// Compare two decoded images.
pub fn compare_images(reference: &RasterImage, current: &RasterImage, config: &DiffConfig) -> Result<RunReport> {
    config.validate()?;
    let pair = normalize_pair(reference, current, &config.ignore_regions);
    let diff_ref = pair.reference(reference);

    let started = Instant::now();
    let diff = diff_images(diff_ref, current, &pair.ignore_regions, config.diff_options());
    let grid = diff.grid;

    let clusters = build_regions(&diff.block_counts, &grid, config.region_options());
    let cluster_count = clusters.len();
    let (regions_mode, regions) = select_report_regions(clusters, &diff.block_counts, &grid, config.hotspot_coverage);
    let regions_top = rank_regions(&regions, config.top_regions);

    let grouped = build_grouped_regions(&diff.block_counts, &grid, config.group_options());
    let groups = GroupReport {
        block_size: grid.block_size,
        hotspot_ratio: config.group_hotspot_ratio,
        min_hotspot_pixels: config.group_min_pixels,
        groups_count: grouped.len(),
        groups: grouped,
    };
    let groups_top = rank_regions(&groups.groups, config.top_regions);
    debug!("{}", groups.summary());

    let mut diff_image = diff.diff_image.clone();
    draw_region_boxes(&mut diff_image, regions_top.iter().map(|r| r.region.rect()));

    let heatmap = build_heatmap_image(current, &diff.block_counts, &grid, config.heatmap_options());

    let mut score = Score::evaluate(diff.diff_pct(), config.threshold_pct);
    score.ignored_regions_count = diff.ignored_regions_count;
    score.regions_count = regions.len();
    score.time_ms = started.elapsed().as_millis() as u64;
    score.delta_threshold = config.delta_threshold;

    let masks = suggest_top_edge_masks(&diff, config.mask_options());
    info!(
        "{} | {} regions ({:?}), {} groups, {} mask suggestions",
        score.summary(),
        score.regions_count,
        regions_mode,
        groups.groups_count,
        masks.suggestions.len()
    );

    let metadata = RunMetadata {
        reference: ImageInfo::of(reference),
        current: ImageInfo::of(current),
        normalization: pair.normalization.clone(),
        diff: DiffSummary {
            score: score.clone(),
            regions_mode,
            regions_cluster_count: cluster_count,
            diff_pixels: diff.diff_pixels,
            total_pixels: diff.total_pixels,
            width: diff.width(),
            height: diff.height(),
            grid,
        },
        regions_top,
        groups_top,
        groups_summary: groups.summary(),
        heatmap: HeatmapInfo {
            min_alpha: config.heatmap_min_alpha,
            max_alpha: config.heatmap_max_alpha,
        },
        mask_suggestions: masks.clone(),
    };

    Ok(RunReport {
        diff_image,
        heatmap,
        reference_match: pair.scaled_reference,
        score,
        regions,
        regions_mode,
        groups,
        masks,
        metadata,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StaticSource;

    fn square_pair() -> (RasterImage, RasterImage) {
        let reference = RasterImage::filled(64, 64, [0, 0, 0, 255]);
        let mut current = reference.clone();
        for y in 10..30 {
            for x in 10..30 {
                current.put_pixel(x, y, [255, 255, 255, 255]);
            }
        }
        (reference, current)
    }

    #[test]
    fn identical_images_pass_with_no_regions() {
        let (reference, _) = square_pair();
        let report = compare_images(&reference, &reference, &DiffConfig::default()).unwrap();
        assert_eq!(report.score.diff_pct, 0.0);
        assert!(report.passed());
        assert_eq!(report.score.regions_count, 0);
        assert!(report.groups.groups.is_empty());
        assert!(report.masks.suggestions.is_empty());
        assert_eq!(report.heatmap, reference);
    }

    #[test]
    fn square_outlines_top_region_on_diff_image() {
        let (reference, current) = square_pair();
        let cfg = DiffConfig::default().with_delta_threshold(0);
        let report = compare_images(&reference, &current, &cfg).unwrap();
        assert!(!report.passed());
        assert_eq!(report.regions_mode, RegionsMode::Clusters);
        let top = &report.metadata.regions_top[0];
        assert_eq!(top.id, 1);
        // the region spans blocks (0,0)..=(1,1): outline starts at its corner
        assert_eq!((top.region.x, top.region.y, top.region.width), (0, 0, 32));
        assert_eq!(report.diff_image.pixel(0, 0), Some([255, 0, 255, 255]));
        assert_eq!(report.metadata.groups_summary, "groups=1, hotspotRatio=0.35, minPixels=32");
    }

    #[test]
    fn metadata_serializes_for_reports() {
        let (reference, current) = square_pair();
        let report = compare_images(&reference, &current, &DiffConfig::default()).unwrap();
        let v = serde_json::to_value(&report.metadata).unwrap();
        assert_eq!(v["normalization"]["strategy"], "none");
        assert_eq!(v["diff"]["regionsMode"], "clusters");
        assert_eq!(v["diff"]["thresholdPct"], 3.0);
        assert_eq!(v["maskSuggestions"]["strategy"], "top-edge-full-tiles");
        assert_eq!(v["reference"]["digest"].as_str().unwrap().len(), 64);
    }

    #[test]
    fn artifacts_decode_back_to_report_images() {
        let (reference, current) = square_pair();
        let report = compare_images(&reference, &current, &DiffConfig::default()).unwrap();
        let artifacts = report.encode_artifacts().unwrap();
        assert_eq!(png::decode(&artifacts.diff_png).unwrap(), report.diff_image);
        assert_eq!(png::decode(&artifacts.heatmap_png).unwrap(), report.heatmap);
        assert!(artifacts.reference_match_png.is_none());
    }

    #[test]
    fn source_capture_feeds_the_run() {
        let (reference, current) = square_pair();
        let ref_png = png::encode(&reference).unwrap();
        let mut source = StaticSource::new(png::encode(&current).unwrap());
        let report = compare_with_source(&mut source, &ref_png, &DiffConfig::default()).unwrap();
        assert!(report.score.diff_pct > 9.0);

        let mut empty = StaticSource::new(Vec::new());
        let err = compare_with_source(&mut empty, &ref_png, &DiffConfig::default()).unwrap_err();
        assert!(matches!(err, Error::Capture(_)));
    }

    #[test]
    fn invalid_config_is_rejected_before_decoding() {
        let cfg = DiffConfig::default().with_block_size(0);
        let err = run_reference_diff(b"junk", b"junk", &cfg).unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
    }
}
