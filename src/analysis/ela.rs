use std::io::Cursor;

use image::{DynamicImage, GrayImage, Luma, RgbImage, codecs::jpeg::JpegEncoder};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    DetectorId, DetectorVerdict,
    detection::{Detector, DocumentInput, localizer::Localizer},
    error::{ForensicsError, Result},
    image_utils::count_set,
};

/// How the recompression difference is turned into a binary error mask.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ElaMode {
    /// Luma of the absolute difference, min-max stretched to 0..=255, then
    /// thresholded.
    NormalizedGray { threshold: u8 },
    /// Each channel of the absolute difference is amplified and compared
    /// against the threshold on its own; any channel over the line flags
    /// the pixel.
    ChannelDifference { amplification: f64, threshold: u8 },
}

impl ElaMode {
    pub fn channel_difference() -> Self {
        ElaMode::ChannelDifference {
            amplification: 20.0,
            threshold: 30,
        }
    }
}

impl Default for ElaMode {
    fn default() -> Self {
        ElaMode::NormalizedGray { threshold: 20 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ElaConfig {
    pub quality: u8,
    pub mode: ElaMode,
    /// Flagged-pixel count above which the image counts as re-edited.
    /// Not scaled with resolution.
    pub pixel_count_threshold: u64,
}

impl Default for ElaConfig {
    fn default() -> Self {
        Self {
            quality: 90,
            mode: ElaMode::default(),
            pixel_count_threshold: 5000,
        }
    }
}

impl ElaConfig {
    pub fn validate(&self) -> Result<()> {
        if !(1..=100).contains(&self.quality) {
            return Err(ForensicsError::InvalidParameter(format!(
                "JPEG quality must be between 1 and 100, got {}",
                self.quality
            )));
        }

        if let ElaMode::ChannelDifference { amplification, .. } = self.mode {
            if !amplification.is_finite() || amplification <= 0.0 {
                return Err(ForensicsError::InvalidParameter(format!(
                    "ELA amplification must be positive, got {}",
                    amplification
                )));
            }
        }

        Ok(())
    }
}

pub struct ElaDetector {
    config: ElaConfig,
    localizer: Localizer,
}

impl ElaDetector {
    pub fn new(config: ElaConfig, localizer: Localizer) -> Self {
        Self { config, localizer }
    }

    /// Encodes a private copy at the configured quality and decodes it
    /// again. The caller's image is never touched.
    pub fn recompress(&self, image: &RgbImage) -> Result<RgbImage> {
        let mut buffer = Cursor::new(Vec::new());

        let encoder = JpegEncoder::new_with_quality(&mut buffer, self.config.quality);
        DynamicImage::ImageRgb8(image.clone()).write_with_encoder(encoder)?;

        let recompressed = image::load_from_memory(&buffer.into_inner())?;
        Ok(recompressed.to_rgb8())
    }

    /// Binary mask (255 = error) of the pixels whose recompression error
    /// crosses the threshold.
    pub fn error_mask(&self, original: &RgbImage, recompressed: &RgbImage) -> Result<GrayImage> {
        if original.dimensions() != recompressed.dimensions() {
            return Err(ForensicsError::DetectorFailure {
                detector: DetectorId::Ela,
                reason: format!(
                    "recompressed image is {:?}, original is {:?}",
                    recompressed.dimensions(),
                    original.dimensions()
                ),
            });
        }

        let mask = match self.config.mode {
            ElaMode::NormalizedGray { threshold } => {
                Self::normalized_gray_mask(original, recompressed, threshold)
            }
            ElaMode::ChannelDifference {
                amplification,
                threshold,
            } => Self::channel_difference_mask(original, recompressed, amplification, threshold),
        };

        Ok(mask)
    }

    fn normalized_gray_mask(original: &RgbImage, recompressed: &RgbImage, threshold: u8) -> GrayImage {
        let (width, height) = original.dimensions();

        let gray_diff = GrayImage::from_fn(width, height, |x, y| {
            let orig = original.get_pixel(x, y);
            let recomp = recompressed.get_pixel(x, y);
            let d = |c: usize| orig[c].abs_diff(recomp[c]) as f64;
            let lum = 0.299 * d(0) + 0.587 * d(1) + 0.114 * d(2);
            Luma([lum.round().min(255.0) as u8])
        });

        let (min, max) = gray_diff
            .pixels()
            .fold((u8::MAX, u8::MIN), |(lo, hi), p| (lo.min(p[0]), hi.max(p[0])));

        if max <= min {
            return GrayImage::new(width, height);
        }

        let range = (max - min) as f64;
        GrayImage::from_fn(width, height, |x, y| {
            let v = gray_diff.get_pixel(x, y)[0];
            let stretched = ((v - min) as f64 * 255.0 / range).round() as u8;
            if stretched > threshold { Luma([255]) } else { Luma([0]) }
        })
    }

    fn channel_difference_mask(
        original: &RgbImage,
        recompressed: &RgbImage,
        amplification: f64,
        threshold: u8,
    ) -> GrayImage {
        let (width, height) = original.dimensions();

        GrayImage::from_fn(width, height, |x, y| {
            let orig = original.get_pixel(x, y);
            let recomp = recompressed.get_pixel(x, y);

            let flagged = (0..3).any(|c| {
                let ela = (orig[c].abs_diff(recomp[c]) as f64 * amplification).min(255.0);
                ela > threshold as f64
            });

            if flagged { Luma([255]) } else { Luma([0]) }
        })
    }

    pub fn analyze_image(&self, image: &RgbImage) -> Result<DetectorVerdict> {
        let recompressed = self.recompress(image)?;
        let mask = self.error_mask(image, &recompressed)?;

        let error_count = count_set(&mask);
        let is_tampered = error_count > self.config.pixel_count_threshold;
        debug!(
            "ELA at quality {}: {} pixels over threshold (limit {})",
            self.config.quality, error_count, self.config.pixel_count_threshold
        );

        let evidence = if is_tampered {
            self.localizer.localize_mask(&mask).into_iter().collect()
        } else {
            Vec::new()
        };

        Ok(
            DetectorVerdict::evaluated(DetectorId::Ela, is_tampered, error_count as f64, evidence)
                .with_note(format!("{} pixels with high recompression error", error_count))
                .with_mask(mask),
        )
    }
}

impl Detector for ElaDetector {
    fn id(&self) -> DetectorId {
        DetectorId::Ela
    }

    fn analyze(&self, input: &DocumentInput<'_>) -> Result<DetectorVerdict> {
        self.analyze_image(input.image)
    }

    fn name(&self) -> &str {
        "Error Level Analysis"
    }

    fn description(&self) -> &str {
        "Re-encodes the image as JPEG and counts pixels whose recompression error stands out"
    }
}

#[cfg(test)]
mod tests {
    use image::Rgb;

    use super::*;

    fn noise_image(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            let v = (x.wrapping_mul(7919) ^ y.wrapping_mul(104729) ^ (x * y)).wrapping_mul(2654435761);
            Rgb([(v >> 8) as u8, (v >> 16) as u8, (v >> 24) as u8])
        })
    }

    #[test]
    fn test_identical_images_have_no_error() {
        let image = noise_image(64, 64);
        for mode in [ElaMode::default(), ElaMode::channel_difference()] {
            let detector = ElaDetector::new(
                ElaConfig { mode, ..ElaConfig::default() },
                Localizer::default(),
            );
            let mask = detector.error_mask(&image, &image).unwrap();
            assert_eq!(count_set(&mask), 0);
        }
    }

    #[test]
    fn test_channel_difference_flags_any_channel() {
        let original = RgbImage::from_pixel(4, 4, Rgb([100, 100, 100]));
        let mut edited = original.clone();
        edited.put_pixel(1, 1, Rgb([100, 102, 100]));

        let detector = ElaDetector::new(
            ElaConfig {
                mode: ElaMode::channel_difference(),
                ..ElaConfig::default()
            },
            Localizer::default(),
        );
        let mask = detector.error_mask(&original, &edited).unwrap();

        assert_eq!(count_set(&mask), 1);
        assert_eq!(mask.get_pixel(1, 1)[0], 255);
    }

    #[test]
    fn test_mismatched_dimensions_fail() {
        let detector = ElaDetector::new(ElaConfig::default(), Localizer::default());
        let result = detector.error_mask(&RgbImage::new(4, 4), &RgbImage::new(5, 4));
        assert!(matches!(result, Err(ForensicsError::DetectorFailure { .. })));
    }

    #[test]
    fn test_resaved_solid_image_is_clean() {
        let detector = ElaDetector::new(ElaConfig::default(), Localizer::default());
        let solid = RgbImage::from_pixel(200, 200, Rgb([180, 60, 60]));
        let resaved = detector.recompress(&solid).unwrap();

        let verdict = detector.analyze_image(&resaved).unwrap();
        assert!(!verdict.is_tampered);
        assert!(verdict.evidence.is_empty());
        assert!(verdict.evidence_mask.is_none());
    }

    #[test]
    fn test_noisy_image_is_flagged_with_one_box() {
        let detector = ElaDetector::new(ElaConfig::default(), Localizer::default());
        let image = noise_image(300, 300);
        let before = image.clone();

        let verdict = detector.analyze_image(&image).unwrap();

        assert_eq!(image, before);
        assert!(verdict.is_tampered);
        assert!(verdict.confidence_metric > 5000.0);
        assert_eq!(verdict.evidence.len(), 1);
        assert!(verdict.evidence[0].y1 >= 150);
    }

    #[test]
    fn test_channel_difference_counts_against_threshold_and_localizes() {
        let image = noise_image(300, 300);
        let with_threshold = |pixel_count_threshold| {
            ElaDetector::new(
                ElaConfig {
                    mode: ElaMode::channel_difference(),
                    pixel_count_threshold,
                    ..ElaConfig::default()
                },
                Localizer::default(),
            )
        };

        let verdict = with_threshold(5000).analyze_image(&image).unwrap();
        assert!(verdict.is_tampered);
        assert!(verdict.confidence_metric > 5000.0);
        assert_eq!(verdict.evidence.len(), 1);
        let bbox = verdict.evidence[0];
        assert!(bbox.y1 >= 150);
        assert!(bbox.y2 <= 300 && bbox.x2 <= 300);
        assert!(!bbox.is_empty());

        let count = verdict.confidence_metric as u64;
        let at_limit = with_threshold(count).analyze_image(&image).unwrap();
        assert!(!at_limit.is_tampered);
        assert!(at_limit.evidence.is_empty());
        assert_eq!(at_limit.confidence_metric, verdict.confidence_metric);

        let below_limit = with_threshold(count - 1).analyze_image(&image).unwrap();
        assert!(below_limit.is_tampered);
        assert_eq!(below_limit.evidence, verdict.evidence);
    }

    #[test]
    fn test_quality_out_of_range_is_rejected() {
        let config = ElaConfig {
            quality: 101,
            ..ElaConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
