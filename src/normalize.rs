//! Bring reference and current captures onto a common canvas
//!
//! Captured and reference screenshots routinely differ in raw pixel size
//! (different device pixel ratios, window chrome, cropping). Instead of
//! rejecting the comparison the reference is rescaled onto the current
//! capture's canvas and ignore regions are rescaled with it.

use log::{debug, warn};
use serde::Serialize;

use crate::raster::{byte_len, RasterImage, Rect};

/// Resample `image` to `target_width` x `target_height` with bilinear
/// interpolation, each channel independently.
///
/// Source coordinates come from `ratio = (src - 1) / (target - 1)` so the
/// corner pixels map onto each other exactly; a target dimension of 1 samples
/// the first row/column.
pub fn scale_image_bilinear(image: &RasterImage, target_width: u32, target_height: u32) -> RasterImage {
    let mut out = vec![0u8; byte_len(target_width, target_height)];
    if image.is_empty() {
        return RasterImage::from_raw_unchecked(target_width, target_height, out);
    }

    let src_w = image.width();
    let src_h = image.height();
    let x_ratio = axis_ratio(src_w, target_width);
    let y_ratio = axis_ratio(src_h, target_height);
    let src = image.data();

    for y in 0..target_height {
        let src_y = y as f64 * y_ratio;
        let y0 = (src_y.floor() as u32).min(src_h - 1);
        let y1 = (y0 + 1).min(src_h - 1);
        let y_lerp = src_y - y0 as f64;

        for x in 0..target_width {
            let src_x = x as f64 * x_ratio;
            let x0 = (src_x.floor() as u32).min(src_w - 1);
            let x1 = (x0 + 1).min(src_w - 1);
            let x_lerp = src_x - x0 as f64;

            let i00 = image.offset(x0, y0);
            let i10 = image.offset(x1, y0);
            let i01 = image.offset(x0, y1);
            let i11 = image.offset(x1, y1);
            let dst = (y as usize * target_width as usize + x as usize) * 4;

            for c in 0..4 {
                let p00 = src[i00 + c] as f64;
                let p10 = src[i10 + c] as f64;
                let p01 = src[i01 + c] as f64;
                let p11 = src[i11 + c] as f64;
                let top = p00 + (p10 - p00) * x_lerp;
                let bottom = p01 + (p11 - p01) * x_lerp;
                let value = top + (bottom - top) * y_lerp;
                out[dst + c] = value.round().clamp(0.0, 255.0) as u8;
            }
        }
    }

    RasterImage::from_raw_unchecked(target_width, target_height, out)
}

fn axis_ratio(src: u32, target: u32) -> f64 {
    if target > 1 {
        (src as f64 - 1.0) / (target as f64 - 1.0)
    } else {
        0.0
    }
}

/// Copy the part of `image` covered by `rect`.
///
/// The rectangle is clipped to the image first; `None` when nothing remains.
pub fn crop_image(image: &RasterImage, rect: &Rect) -> Option<RasterImage> {
    let r = rect.clip_to(image.width(), image.height())?;
    let row_bytes = r.width as usize * 4;
    let mut out = Vec::with_capacity(row_bytes * r.height as usize);
    for row in r.y..r.bottom() {
        let start = image.offset(r.x, row);
        out.extend_from_slice(&image.data()[start..start + row_bytes]);
    }
    Some(RasterImage::from_raw_unchecked(r.width, r.height, out))
}

/// Linearly rescale rectangles. Non-finite rectangles are dropped.
pub fn scale_regions(regions: &[Rect], scale_x: f64, scale_y: f64) -> Vec<Rect> {
    regions
        .iter()
        .filter(|r| r.is_finite())
        .map(|r| Rect::new(r.x * scale_x, r.y * scale_y, r.width * scale_x, r.height * scale_y))
        .collect()
}

/// Dimensions of one side of the comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub fn of(image: &RasterImage) -> Self {
        Self { width: image.width(), height: image.height() }
    }
}

/// How the pair was brought onto a common canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    None,
    ScaleReferenceToCurrent,
}

/// Metadata describing the normalization step.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Normalization {
    pub strategy: Strategy,
    pub source: Size,
    pub target: Size,
}

/// Reference image and ignore regions after normalization.
#[derive(Debug, Clone)]
pub struct NormalizedPair {
    /// The reference on the current capture's canvas. `None` when no rescale
    /// was needed and the original reference is used as is.
    pub scaled_reference: Option<RasterImage>,
    pub ignore_regions: Vec<Rect>,
    pub normalization: Normalization,
}

impl NormalizedPair {
    /// The reference image to diff against.
    pub fn reference<'a>(&'a self, original: &'a RasterImage) -> &'a RasterImage {
        self.scaled_reference.as_ref().unwrap_or(original)
    }
}

/// Scale the reference onto the current canvas when their sizes differ.
pub fn normalize_pair(reference: &RasterImage, current: &RasterImage, ignore: &[Rect]) -> NormalizedPair {
    let source = Size::of(reference);
    let target = Size::of(current);

    if source == target {
        debug!("reference and current share a {}x{} canvas", target.width, target.height);
        return NormalizedPair {
            scaled_reference: None,
            ignore_regions: ignore.to_vec(),
            normalization: Normalization { strategy: Strategy::None, source, target },
        };
    }

    warn!(
        "reference is {}x{} but capture is {}x{}; rescaling reference",
        source.width, source.height, target.width, target.height
    );
    let scaled = scale_image_bilinear(reference, target.width, target.height);
    let (sx, sy) = if reference.is_empty() {
        (1.0, 1.0)
    } else {
        (
            target.width as f64 / source.width as f64,
            target.height as f64 / source.height as f64,
        )
    };
    NormalizedPair {
        scaled_reference: Some(scaled),
        ignore_regions: scale_regions(ignore, sx, sy),
        normalization: Normalization {
            strategy: Strategy::ScaleReferenceToCurrent,
            source,
            target,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upscale_preserves_corners_and_interpolates() {
        let img = RasterImage::new(2, 1, vec![0, 0, 0, 255, 100, 200, 50, 255]).unwrap();
        let out = scale_image_bilinear(&img, 3, 1);
        assert_eq!(out.pixel(0, 0), Some([0, 0, 0, 255]));
        assert_eq!(out.pixel(1, 0), Some([50, 100, 25, 255]));
        assert_eq!(out.pixel(2, 0), Some([100, 200, 50, 255]));
    }

    #[test]
    fn single_pixel_target_samples_origin() {
        let img = RasterImage::new(2, 1, vec![9, 9, 9, 9, 200, 200, 200, 200]).unwrap();
        let out = scale_image_bilinear(&img, 1, 1);
        assert_eq!(out.data(), &[9, 9, 9, 9]);
    }

    #[test]
    fn same_size_scale_is_identity() {
        let mut data = Vec::new();
        for i in 0..(5 * 4) {
            data.extend_from_slice(&[i as u8, (i * 3) as u8, 7, 255]);
        }
        let img = RasterImage::new(5, 4, data).unwrap();
        assert_eq!(scale_image_bilinear(&img, 5, 4), img);
    }

    #[test]
    fn crop_clamps_and_copies_rows() {
        let mut data = Vec::new();
        for y in 0..4u8 {
            for x in 0..4u8 {
                data.extend_from_slice(&[x, y, 0, 255]);
            }
        }
        let img = RasterImage::new(4, 4, data).unwrap();
        let out = crop_image(&img, &Rect::new(2.0, 1.0, 10.0, 2.0)).unwrap();
        assert_eq!((out.width(), out.height()), (2, 2));
        assert_eq!(out.pixel(0, 0), Some([2, 1, 0, 255]));
        assert_eq!(out.pixel(1, 1), Some([3, 2, 0, 255]));
        assert!(crop_image(&img, &Rect::new(8.0, 8.0, 2.0, 2.0)).is_none());
    }

    #[test]
    fn regions_scale_linearly() {
        let regions = [Rect::new(10.0, 20.0, 30.0, 40.0), Rect::new(f64::INFINITY, 0.0, 1.0, 1.0)];
        let out = scale_regions(&regions, 2.0, 0.5);
        assert_eq!(out, vec![Rect::new(20.0, 10.0, 60.0, 20.0)]);
    }

    #[test]
    fn pair_rescales_reference_and_regions_to_current() {
        let reference = RasterImage::filled(800, 600, [10, 10, 10, 255]);
        let current = RasterImage::filled(1600, 1200, [10, 10, 10, 255]);
        let pair = normalize_pair(&reference, &current, &[Rect::new(0.0, 0.0, 100.0, 50.0)]);
        let scaled = pair.reference(&reference);
        assert_eq!((scaled.width(), scaled.height()), (1600, 1200));
        assert_eq!(pair.ignore_regions, vec![Rect::new(0.0, 0.0, 200.0, 100.0)]);
        assert_eq!(pair.normalization.strategy, Strategy::ScaleReferenceToCurrent);
    }

    #[test]
    fn pair_of_equal_sizes_is_untouched() {
        let img = RasterImage::filled(4, 4, [1, 2, 3, 255]);
        let pair = normalize_pair(&img, &img, &[]);
        assert!(pair.scaled_reference.is_none());
        assert_eq!(pair.normalization.strategy, Strategy::None);
        let json = serde_json::to_value(&pair.normalization).unwrap();
        assert_eq!(json["strategy"], "none");
    }
}
