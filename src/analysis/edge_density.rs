use image::{GrayImage, RgbImage};
use imageproc::edges::canny;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    DetectorId, DetectorVerdict,
    detection::{Detector, DocumentInput, localizer::Localizer},
    error::{ForensicsError, Result},
    image_utils::{count_set, rgb_to_gray},
};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeDensityConfig {
    /// Canny hysteresis thresholds as fractions of the full intensity range.
    pub low_threshold: f32,
    pub high_threshold: f32,
    pub edge_count_threshold: u64,
}

impl Default for EdgeDensityConfig {
    fn default() -> Self {
        Self {
            low_threshold: 0.1,
            high_threshold: 0.2,
            edge_count_threshold: 10_000,
        }
    }
}

impl EdgeDensityConfig {
    pub fn validate(&self) -> Result<()> {
        let in_range = |v: f32| (0.0..=1.0).contains(&v);
        if !in_range(self.low_threshold)
            || !in_range(self.high_threshold)
            || self.low_threshold > self.high_threshold
        {
            return Err(ForensicsError::InvalidParameter(format!(
                "edge thresholds must satisfy 0 <= low <= high <= 1, got {} and {}",
                self.low_threshold, self.high_threshold
            )));
        }
        Ok(())
    }
}

pub struct EdgeDensityDetector {
    config: EdgeDensityConfig,
    localizer: Localizer,
}

impl EdgeDensityDetector {
    pub fn new(config: EdgeDensityConfig, localizer: Localizer) -> Self {
        Self { config, localizer }
    }

    pub fn edge_mask(&self, image: &RgbImage) -> GrayImage {
        let gray = rgb_to_gray(image);
        canny(
            &gray,
            self.config.low_threshold * 255.0,
            self.config.high_threshold * 255.0,
        )
    }

    pub fn analyze_image(&self, image: &RgbImage) -> Result<DetectorVerdict> {
        let edges = self.edge_mask(image);
        let edge_count = count_set(&edges);
        let is_tampered = edge_count > self.config.edge_count_threshold;
        debug!(
            "edge density: {} edge pixels (limit {})",
            edge_count, self.config.edge_count_threshold
        );

        let evidence = if is_tampered {
            self.localizer.localize_mask(&edges).into_iter().collect()
        } else {
            Vec::new()
        };

        Ok(
            DetectorVerdict::evaluated(DetectorId::Edge, is_tampered, edge_count as f64, evidence)
                .with_note(format!("{} edge pixels", edge_count))
                .with_mask(edges),
        )
    }
}

impl Detector for EdgeDensityDetector {
    fn id(&self) -> DetectorId {
        DetectorId::Edge
    }

    fn analyze(&self, input: &DocumentInput<'_>) -> Result<DetectorVerdict> {
        self.analyze_image(input.image)
    }

    fn name(&self) -> &str {
        "Edge Density"
    }

    fn description(&self) -> &str {
        "Counts sharp edges; an excess points at pasted or over-sharpened patches"
    }
}

#[cfg(test)]
mod tests {
    use image::Rgb;

    use super::*;

    fn checkerboard(size: u32, cell: u32) -> RgbImage {
        RgbImage::from_fn(size, size, |x, y| {
            if (x / cell + y / cell) % 2 == 0 {
                Rgb([0, 0, 0])
            } else {
                Rgb([255, 255, 255])
            }
        })
    }

    #[test]
    fn test_flat_image_has_no_edges() {
        let detector = EdgeDensityDetector::new(EdgeDensityConfig::default(), Localizer::default());
        let verdict = detector
            .analyze_image(&RgbImage::from_pixel(120, 120, Rgb([90, 90, 90])))
            .unwrap();

        assert!(!verdict.is_tampered);
        assert_eq!(verdict.confidence_metric, 0.0);
        assert!(verdict.evidence.is_empty());
    }

    #[test]
    fn test_busy_texture_triggers_with_localized_box() {
        let detector = EdgeDensityDetector::new(EdgeDensityConfig::default(), Localizer::default());
        let verdict = detector.analyze_image(&checkerboard(400, 10)).unwrap();

        assert!(verdict.is_tampered);
        assert!(verdict.confidence_metric > 10_000.0);
        assert_eq!(verdict.evidence.len(), 1);
        assert!(verdict.evidence[0].y1 >= 200);
        assert!(verdict.evidence_mask.is_some());
    }

    #[test]
    fn test_inverted_thresholds_are_rejected() {
        let config = EdgeDensityConfig {
            low_threshold: 0.5,
            high_threshold: 0.2,
            ..EdgeDensityConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
