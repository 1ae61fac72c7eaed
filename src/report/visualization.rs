use image::{GrayImage, Rgb, RgbImage};
use imageproc::{drawing::draw_hollow_rect_mut, rect::Rect};

use crate::{BoundingBox, DetectorId};

/// Outline colour and stroke width used when burning one detector's
/// evidence into the annotated image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutlineStyle {
    pub color: Rgb<u8>,
    pub thickness: u32,
}

impl OutlineStyle {
    pub fn for_detector(detector: DetectorId) -> Self {
        match detector {
            DetectorId::Ela => Self { color: Rgb([0, 0, 255]), thickness: 5 },
            DetectorId::Layout => Self { color: Rgb([0, 255, 0]), thickness: 2 },
            DetectorId::Brightness => Self { color: Rgb([255, 255, 0]), thickness: 2 },
            DetectorId::Edge => Self { color: Rgb([255, 0, 0]), thickness: 3 },
            DetectorId::Text => Self { color: Rgb([255, 0, 255]), thickness: 2 },
        }
    }
}

/// Draws the rectangle outline growing outwards, one pixel ring per unit of
/// thickness. Pixels outside the image are skipped.
pub fn draw_outline(image: &mut RgbImage, bbox: &BoundingBox, style: OutlineStyle) {
    if bbox.is_empty() {
        return;
    }

    for t in 0..style.thickness {
        let x = bbox.x1 as i32 - t as i32;
        let y = bbox.y1 as i32 - t as i32;
        let rect = Rect::at(x, y).of_size(bbox.width() + 2 * t, bbox.height() + 2 * t);
        draw_hollow_rect_mut(image, rect, style.color);
    }
}

/// Blends `color` into every pixel set in `mask`.
pub fn overlay_mask(image: &RgbImage, mask: &GrayImage, color: Rgb<u8>, opacity: f32) -> RgbImage {
    let mut result = image.clone();
    let alpha = opacity.clamp(0.0, 1.0);

    for (x, y, m) in mask.enumerate_pixels() {
        if m[0] == 0 || x >= result.width() || y >= result.height() {
            continue;
        }
        let original = result.get_pixel(x, y);
        let blended = Rgb([
            ((1.0 - alpha) * original[0] as f32 + alpha * color[0] as f32) as u8,
            ((1.0 - alpha) * original[1] as f32 + alpha * color[1] as f32) as u8,
            ((1.0 - alpha) * original[2] as f32 + alpha * color[2] as f32) as u8,
        ]);
        result.put_pixel(x, y, blended);
    }

    result
}
