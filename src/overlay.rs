//! Region outlines drawn onto the diff visualization

use crate::raster::{PixelRect, RasterImage};

/// Outline colors, cycled by region rank.
pub const BOX_COLORS: [[u8; 3]; 5] = [
    [255, 0, 255],
    [255, 165, 0],
    [0, 200, 255],
    [0, 255, 140],
    [255, 255, 0],
];

const BOX_THICKNESS: u32 = 2;

/// Outline `rect` with a `thickness`-pixel border, clipped to the image.
pub fn draw_rect(image: &mut RasterImage, rect: PixelRect, color: [u8; 3], thickness: u32) {
    if image.is_empty() || rect.width == 0 || rect.height == 0 {
        return;
    }
    let (w, h) = (image.width(), image.height());
    if rect.x >= w || rect.y >= h {
        return;
    }
    let x0 = rect.x;
    let y0 = rect.y;
    let x1 = (rect.right() - 1).min(w - 1);
    let y1 = (rect.bottom() - 1).min(h - 1);
    let rgba = [color[0], color[1], color[2], 255];

    for t in 0..thickness {
        let top = (y0 + t).min(h - 1);
        let bottom = y1.saturating_sub(t);
        for x in x0..=x1 {
            image.put_pixel(x, top, rgba);
            image.put_pixel(x, bottom, rgba);
        }
        let left = (x0 + t).min(w - 1);
        let right = x1.saturating_sub(t);
        for y in y0..=y1 {
            image.put_pixel(left, y, rgba);
            image.put_pixel(right, y, rgba);
        }
    }
}

/// Outline each rectangle in order, cycling through [`BOX_COLORS`].
pub fn draw_region_boxes<I>(image: &mut RasterImage, rects: I)
where
    I: IntoIterator<Item = PixelRect>,
{
    for (i, rect) in rects.into_iter().enumerate() {
        draw_rect(image, rect, BOX_COLORS[i % BOX_COLORS.len()], BOX_THICKNESS);
    }
}
