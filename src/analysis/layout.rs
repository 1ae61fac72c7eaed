use image::{GrayImage, RgbImage};
use imageproc::contours::{BorderType, find_contours};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    BoundingBox, DetectorId, DetectorVerdict,
    detection::{Detector, DocumentInput},
    error::Result,
    image_utils::{binarize_inverted, rgb_to_gray},
};

/// Block-count heuristic for pasted or re-flowed text.
///
/// Authentic documents tend to form a handful of large text blocks. Dense or
/// multi-column layouts legitimately exceed `max_block_count` and will be
/// reported as suspicious; raise the limit for such document types.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub binarize_threshold: u8,
    /// Blocks must be strictly wider than this.
    pub min_block_width: u32,
    /// Blocks must be strictly taller than this.
    pub min_block_height: u32,
    pub max_block_count: usize,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            binarize_threshold: 150,
            min_block_width: 200,
            min_block_height: 20,
            max_block_count: 5,
        }
    }
}

pub struct LayoutDetector {
    config: LayoutConfig,
}

impl LayoutDetector {
    pub fn new(config: LayoutConfig) -> Self {
        Self { config }
    }

    /// Bounding rectangles of the outermost dark regions that are large
    /// enough to be text blocks, in contour discovery order.
    pub fn text_blocks(&self, image: &RgbImage) -> Vec<BoundingBox> {
        let gray = rgb_to_gray(image);
        let binary = binarize_inverted(&gray, self.config.binarize_threshold);
        self.blocks_from_binary(&binary)
    }

    fn blocks_from_binary(&self, binary: &GrayImage) -> Vec<BoundingBox> {
        let (width, height) = binary.dimensions();

        find_contours::<u32>(binary)
            .into_iter()
            .filter(|c| matches!(c.border_type, BorderType::Outer) && c.parent.is_none())
            .filter_map(|contour| {
                let xs = contour.points.iter().map(|p| p.x);
                let ys = contour.points.iter().map(|p| p.y);
                let (x_min, x_max) = (xs.clone().min()?, xs.max()?);
                let (y_min, y_max) = (ys.clone().min()?, ys.max()?);

                let w = x_max - x_min + 1;
                let h = y_max - y_min + 1;
                if w > self.config.min_block_width && h > self.config.min_block_height {
                    Some(BoundingBox::from_rect(x_min, y_min, w, h, width, height))
                } else {
                    None
                }
            })
            .collect()
    }

    pub fn exceeds_block_limit(&self, block_count: usize) -> bool {
        block_count > self.config.max_block_count
    }

    pub fn analyze_image(&self, image: &RgbImage) -> Result<DetectorVerdict> {
        let blocks = self.text_blocks(image);
        let count = blocks.len();
        let is_tampered = self.exceeds_block_limit(count);
        debug!(
            "layout: {} large text blocks (limit {})",
            count, self.config.max_block_count
        );

        Ok(
            DetectorVerdict::evaluated(DetectorId::Layout, is_tampered, count as f64, blocks)
                .with_note(format!("{} large text blocks", count)),
        )
    }
}

impl Detector for LayoutDetector {
    fn id(&self) -> DetectorId {
        DetectorId::Layout
    }

    fn analyze(&self, input: &DocumentInput<'_>) -> Result<DetectorVerdict> {
        self.analyze_image(input.image)
    }

    fn name(&self) -> &str {
        "Layout Consistency"
    }

    fn description(&self) -> &str {
        "Counts large high-contrast text blocks; an unusual number suggests pasted content"
    }
}

#[cfg(test)]
mod tests {
    use image::Rgb;

    use super::*;

    fn page_with_bars(bars: u32) -> RgbImage {
        let mut page = RgbImage::from_pixel(400, 560, Rgb([255, 255, 255]));
        for i in 0..bars {
            let top = 10 + i * 50;
            for y in top..top + 30 {
                for x in 50..300 {
                    page.put_pixel(x, y, Rgb([20, 20, 20]));
                }
            }
        }
        page
    }

    #[test]
    fn test_bars_are_found_as_blocks() {
        let detector = LayoutDetector::new(LayoutConfig::default());
        let blocks = detector.text_blocks(&page_with_bars(3));

        assert_eq!(blocks.len(), 3);
        for block in &blocks {
            assert_eq!(block.width(), 250);
            assert_eq!(block.height(), 30);
        }
    }

    #[test]
    fn test_small_marks_are_ignored() {
        let mut page = RgbImage::from_pixel(300, 300, Rgb([255, 255, 255]));
        for y in 100..110 {
            for x in 100..290 {
                page.put_pixel(x, y, Rgb([0, 0, 0]));
            }
        }
        let detector = LayoutDetector::new(LayoutConfig::default());
        assert!(detector.text_blocks(&page).is_empty());
    }

    #[test]
    fn test_trigger_is_monotonic_in_block_count() {
        let detector = LayoutDetector::new(LayoutConfig::default());
        let mut crossed = false;

        for bars in 0..=10 {
            let verdict = detector.analyze_image(&page_with_bars(bars)).unwrap();
            assert_eq!(verdict.confidence_metric, bars as f64);
            if crossed {
                assert!(verdict.is_tampered);
            }
            crossed |= verdict.is_tampered;
            assert_eq!(verdict.is_tampered, bars > 5);
        }
    }

    #[test]
    fn test_evidence_is_kept_verbatim() {
        let detector = LayoutDetector::new(LayoutConfig::default());
        let verdict = detector.analyze_image(&page_with_bars(7)).unwrap();

        assert!(verdict.is_tampered);
        assert_eq!(verdict.evidence.len(), 7);
    }
}
