pub mod aggregator;
pub mod localizer;

use std::panic::{AssertUnwindSafe, catch_unwind};

use image::RgbImage;
use log::warn;

use crate::{DetectorId, DetectorVerdict, error::Result};

/// Everything a detector may look at. Detectors share nothing else.
#[derive(Debug, Clone, Copy)]
pub struct DocumentInput<'a> {
    pub image: &'a RgbImage,
    pub reference_text: Option<&'a str>,
}

impl<'a> DocumentInput<'a> {
    pub fn new(image: &'a RgbImage) -> Self {
        Self {
            image,
            reference_text: None,
        }
    }

    pub fn with_reference(mut self, reference_text: &'a str) -> Self {
        self.reference_text = Some(reference_text);
        self
    }
}

pub trait Detector: Send + Sync {
    fn id(&self) -> DetectorId;

    fn analyze(&self, input: &DocumentInput<'_>) -> Result<DetectorVerdict>;

    fn name(&self) -> &str;

    fn description(&self) -> &str;
}

/// Runs one detector and turns any error or panic into a failed verdict,
/// so one broken signal never takes the rest of the report down with it.
pub fn evaluate(detector: &dyn Detector, input: &DocumentInput<'_>) -> DetectorVerdict {
    let id = detector.id();

    match catch_unwind(AssertUnwindSafe(|| detector.analyze(input))) {
        Ok(Ok(verdict)) => verdict,
        Ok(Err(e)) => {
            warn!("{} failed: {}", detector.name(), e);
            DetectorVerdict::failed(id, e)
        }
        Err(_) => {
            warn!("{} panicked", detector.name());
            DetectorVerdict::failed(id, "internal panic")
        }
    }
}

#[cfg(test)]
mod tests {
    use image::Rgb;

    use super::*;
    use crate::{VerdictStatus, error::ForensicsError};

    struct BrokenDetector;

    impl Detector for BrokenDetector {
        fn id(&self) -> DetectorId {
            DetectorId::Edge
        }

        fn analyze(&self, _input: &DocumentInput<'_>) -> Result<DetectorVerdict> {
            Err(ForensicsError::DetectorFailure {
                detector: DetectorId::Edge,
                reason: "mask allocation failed".into(),
            })
        }

        fn name(&self) -> &str {
            "Broken"
        }

        fn description(&self) -> &str {
            "Always fails"
        }
    }

    struct PanickingDetector;

    impl Detector for PanickingDetector {
        fn id(&self) -> DetectorId {
            DetectorId::Layout
        }

        fn analyze(&self, _input: &DocumentInput<'_>) -> Result<DetectorVerdict> {
            panic!("index out of bounds")
        }

        fn name(&self) -> &str {
            "Panicking"
        }

        fn description(&self) -> &str {
            "Always panics"
        }
    }

    #[test]
    fn test_error_becomes_failed_verdict() {
        let image = RgbImage::from_pixel(8, 8, Rgb([0, 0, 0]));
        let verdict = evaluate(&BrokenDetector, &DocumentInput::new(&image));

        assert_eq!(verdict.detector, DetectorId::Edge);
        assert_eq!(verdict.status, VerdictStatus::Failed);
        assert!(!verdict.is_tampered);
        assert_eq!(verdict.confidence_metric, 0.0);
        assert!(verdict.note.unwrap().contains("mask allocation failed"));
    }

    #[test]
    fn test_panic_becomes_failed_verdict() {
        let image = RgbImage::from_pixel(8, 8, Rgb([0, 0, 0]));
        let verdict = evaluate(&PanickingDetector, &DocumentInput::new(&image));

        assert_eq!(verdict.detector, DetectorId::Layout);
        assert_eq!(verdict.status, VerdictStatus::Failed);
        assert!(verdict.evidence.is_empty());
    }
}
