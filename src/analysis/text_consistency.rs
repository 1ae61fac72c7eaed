use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use image::RgbImage;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    DetectorId, DetectorVerdict,
    detection::{Detector, DocumentInput},
    error::{ForensicsError, Result},
    ocr::OcrEngine,
};

pub const NO_REFERENCE_NOTE: &str = "No reference text provided for comparison";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextComparison {
    /// Byte-for-byte after trimming both ends. Sensitive to OCR noise.
    Exact,
    /// Every run of whitespace counts as a single space.
    WhitespaceInsensitive,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TextConfig {
    pub ocr_timeout_ms: u64,
    pub comparison: TextComparison,
}

impl Default for TextConfig {
    fn default() -> Self {
        Self {
            ocr_timeout_ms: 30_000,
            comparison: TextComparison::Exact,
        }
    }
}

impl TextConfig {
    pub fn validate(&self) -> Result<()> {
        if self.ocr_timeout_ms == 0 {
            return Err(ForensicsError::InvalidParameter(
                "OCR timeout must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    pub fn ocr_timeout(&self) -> Duration {
        Duration::from_millis(self.ocr_timeout_ms)
    }
}

pub struct TextConsistencyDetector {
    config: TextConfig,
    engine: Option<Arc<dyn OcrEngine>>,
}

impl TextConsistencyDetector {
    pub fn new(config: TextConfig, engine: Option<Arc<dyn OcrEngine>>) -> Self {
        Self { config, engine }
    }

    pub fn texts_match(&self, reference: &str, extracted: &str) -> bool {
        match self.config.comparison {
            TextComparison::Exact => reference.trim() == extracted.trim(),
            TextComparison::WhitespaceInsensitive => reference
                .split_whitespace()
                .eq(extracted.split_whitespace()),
        }
    }

    /// The engine runs on the calling thread and is handed the deadline.
    /// A result that arrives after the deadline is discarded.
    fn extract_within_deadline(&self, engine: &dyn OcrEngine, image: &RgbImage) -> Result<String> {
        let timeout = self.config.ocr_timeout();
        let deadline = Instant::now() + timeout;

        let extracted = engine.extract_text(image, deadline)?;
        if Instant::now() > deadline {
            return Err(ForensicsError::CollaboratorTimeout {
                collaborator: "OCR engine",
                timeout,
            });
        }
        Ok(extracted)
    }

    pub fn check(&self, image: &RgbImage, reference_text: Option<&str>) -> Result<DetectorVerdict> {
        let Some(reference) = reference_text.filter(|r| !r.trim().is_empty()) else {
            return Ok(DetectorVerdict::not_evaluated(DetectorId::Text, NO_REFERENCE_NOTE));
        };

        let engine = self.engine.as_ref().ok_or_else(|| ForensicsError::DetectorFailure {
            detector: DetectorId::Text,
            reason: "no OCR engine configured".into(),
        })?;

        let extracted = self.extract_within_deadline(engine.as_ref(), image)?;
        let consistent = self.texts_match(reference, &extracted);
        debug!(
            "text consistency: {} extracted characters, consistent = {}",
            extracted.trim().chars().count(),
            consistent
        );

        let verdict = if consistent {
            DetectorVerdict::evaluated(DetectorId::Text, false, 0.0, Vec::new())
                .with_note("Text is consistent with the reference")
        } else {
            DetectorVerdict::evaluated(DetectorId::Text, true, 1.0, Vec::new())
                .with_note("Text mismatch detected, possible tampering")
        };

        Ok(verdict)
    }
}

impl Detector for TextConsistencyDetector {
    fn id(&self) -> DetectorId {
        DetectorId::Text
    }

    fn analyze(&self, input: &DocumentInput<'_>) -> Result<DetectorVerdict> {
        self.check(input.image, input.reference_text)
    }

    fn name(&self) -> &str {
        "Text Consistency"
    }

    fn description(&self) -> &str {
        "Compares OCR output against a known-good reference text"
    }
}
