use image::GrayImage;
use serde::{Deserialize, Serialize};

use crate::{BoundingBox, image_utils::set_pixels};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalizerConfig {
    pub margin_x: u32,
    pub margin_y: u32,
    pub box_height: u32,
}

impl Default for LocalizerConfig {
    fn default() -> Self {
        Self {
            margin_x: 100,
            margin_y: 100,
            box_height: 80,
        }
    }
}

/// Collapses a mask of suspicious pixels into one reviewable rectangle.
///
/// The rectangle spans every flagged column (plus `margin_x`) but only a
/// fixed-height band vertically, and that band never starts above the
/// vertical midpoint of the page: signatures, stamps and amounts live in
/// the lower half of the documents this was tuned on. Separate clusters are
/// merged rather than reported individually.
#[derive(Debug, Clone)]
pub struct Localizer {
    config: LocalizerConfig,
}

impl Localizer {
    pub fn new(config: LocalizerConfig) -> Self {
        Self { config }
    }

    pub fn localize<I>(&self, points: I, width: u32, height: u32) -> Option<BoundingBox>
    where
        I: IntoIterator<Item = (u32, u32)>,
    {
        let mut points = points.into_iter();
        let (first_x, first_y) = points.next()?;

        let (mut min_x, mut max_x, mut min_y) = (first_x, first_x, first_y);
        for (x, y) in points {
            min_x = min_x.min(x);
            max_x = max_x.max(x);
            min_y = min_y.min(y);
        }

        let x1 = min_x.saturating_sub(self.config.margin_x).min(width);
        let x2 = max_x.saturating_add(self.config.margin_x).min(width);

        let y1 = min_y
            .saturating_sub(self.config.margin_y)
            .max(height / 2)
            .min(height);
        let y2 = y1.saturating_add(self.config.box_height).min(height);

        Some(BoundingBox::clamped(x1, y1, x2, y2, width, height))
    }

    pub fn localize_mask(&self, mask: &GrayImage) -> Option<BoundingBox> {
        let (width, height) = mask.dimensions();
        self.localize(set_pixels(mask), width, height)
    }
}

impl Default for Localizer {
    fn default() -> Self {
        Self::new(LocalizerConfig::default())
    }
}
