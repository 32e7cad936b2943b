//! Reference screenshot diffing
//!
//! Compares a captured screenshot against a stored reference and explains
//! where they differ. The engine decodes both PNGs, rescales the reference
//! onto the capture's canvas when the sizes disagree, and produces a per-pixel
//! diff, a block histogram, clustered regions, grouped hotspots, a density
//! heatmap and suggestions for ignore masks.
//!
//! # Features
//!
//! - **Self-contained PNG codec**: 8-bit RGB/RGBA, non-interlaced, CRC-checked
//! - **Deterministic**: identical inputs and config always give the same report
//! - **Capture seam**: anything implementing [`ScreenshotSource`] can feed a run
//!
//! # Example
//!
//! ```
//! use refdiff::{png, DiffConfig, RasterImage};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let reference = RasterImage::filled(32, 32, [255, 255, 255, 255]);
//! let current = RasterImage::filled(32, 32, [0, 0, 0, 255]);
//!
//! let config = DiffConfig::default().with_threshold_pct(1.0);
//! let report = refdiff::run_reference_diff(&png::encode(&reference)?, &png::encode(&current)?, &config)?;
//! assert!(!report.passed());
//! println!("{}", report.score.summary());
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;

pub mod error;
pub use error::{Error, Result};

pub mod config;
pub mod diff;
pub mod heatmap;
pub mod masks;
pub mod normalize;
pub mod overlay;
pub mod pipeline;
pub mod png;
pub mod raster;
pub mod regions;
pub mod score;

pub use config::DiffConfig;
pub use diff::{diff_images, BlockGrid, DiffOptions, DiffResult};
pub use masks::{MaskImpact, MaskReport, MaskSuggestion};
pub use normalize::{Normalization, NormalizedPair};
pub use pipeline::{compare_images, compare_with_source, run_reference_diff, Artifacts, GroupReport, RunMetadata, RunReport};
pub use raster::{IgnoreRegion, PixelRect, RasterImage, Rect};
pub use regions::{RankedRegion, Region, RegionsMode};
pub use score::Score;

/// Something that can produce a PNG screenshot on demand
///
/// Browser drivers, device farms and test fixtures all plug in here; the
/// engine only ever sees the encoded bytes.
pub trait ScreenshotSource {
    /// Capture the current state as PNG bytes
    fn capture_png(&mut self) -> Result<Vec<u8>>;
}

/// Source that always returns the same bytes
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    png: Vec<u8>,
}

impl StaticSource {
    pub fn new(png: Vec<u8>) -> Self {
        StaticSource { png }
    }
}

impl ScreenshotSource for StaticSource {
    fn capture_png(&mut self) -> Result<Vec<u8>> {
        if self.png.is_empty() {
            return Err(Error::Capture("static source holds no image".to_string()));
        }
        Ok(self.png.clone())
    }
}

/// Source that re-reads a PNG file on every capture
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileSource { path: path.into() }
    }
}

impl ScreenshotSource for FileSource {
    fn capture_png(&mut self) -> Result<Vec<u8>> {
        Ok(std::fs::read(&self.path)?)
    }
}
