use image::RgbImage;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    DetectorId, DetectorVerdict,
    detection::{Detector, DocumentInput},
    error::{ForensicsError, Result},
    image_utils::{gray_to_array, value_channel},
};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrightnessConfig {
    pub std_dev_threshold: f64,
}

impl Default for BrightnessConfig {
    fn default() -> Self {
        Self {
            std_dev_threshold: 50.0,
        }
    }
}

/// Global lighting check. It only ever yields a whole-image verdict and
/// never spatial evidence.
pub struct BrightnessDetector {
    config: BrightnessConfig,
}

impl BrightnessDetector {
    pub fn new(config: BrightnessConfig) -> Self {
        Self { config }
    }

    /// Mean and population standard deviation of the HSV value channel.
    pub fn brightness_stats(&self, image: &RgbImage) -> Result<(f64, f64)> {
        let values = gray_to_array(&value_channel(image));

        let mean = values.mean().ok_or_else(|| ForensicsError::DetectorFailure {
            detector: DetectorId::Brightness,
            reason: "image has no pixels".into(),
        })?;
        let std_dev = values.std(0.0);

        Ok((mean, std_dev))
    }

    pub fn analyze_image(&self, image: &RgbImage) -> Result<DetectorVerdict> {
        let (mean, std_dev) = self.brightness_stats(image)?;
        let is_tampered = std_dev > self.config.std_dev_threshold;
        debug!("brightness: mean {:.2}, std-dev {:.2}", mean, std_dev);

        Ok(
            DetectorVerdict::evaluated(DetectorId::Brightness, is_tampered, std_dev, Vec::new())
                .with_note(format!(
                    "brightness std-dev {:.2}, mean brightness {:.2}",
                    std_dev, mean
                )),
        )
    }
}

impl Detector for BrightnessDetector {
    fn id(&self) -> DetectorId {
        DetectorId::Brightness
    }

    fn analyze(&self, input: &DocumentInput<'_>) -> Result<DetectorVerdict> {
        self.analyze_image(input.image)
    }

    fn name(&self) -> &str {
        "Brightness/Contrast"
    }

    fn description(&self) -> &str {
        "Flags images whose brightness varies more than a single lighting condition would explain"
    }
}
