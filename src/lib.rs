use std::{fmt, fs, path::Path, sync::Arc};

use image::{GrayImage, RgbImage};
use log::{info, warn};
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use serde::{Deserialize, Serialize};

use crate::{
    analysis::{
        brightness::{BrightnessConfig, BrightnessDetector},
        edge_density::{EdgeDensityConfig, EdgeDensityDetector},
        ela::{ElaConfig, ElaDetector},
        layout::{LayoutConfig, LayoutDetector},
        text_consistency::{TextConfig, TextConsistencyDetector},
    },
    detection::{
        Detector, DocumentInput,
        aggregator::EvidenceAggregator,
        evaluate,
        localizer::{Localizer, LocalizerConfig},
    },
    error::{ForensicsError, Result},
    metadata::{MetadataFindings, MetadataReader, exif::ExifMetadataReader},
    ocr::OcrEngine,
};

pub mod analysis;
pub mod detection;
pub mod error;
pub mod image_utils;
pub mod metadata;
pub mod ocr;
pub mod report;

/// Tunable thresholds for every detector. The defaults reproduce the
/// uncalibrated constants the document checker has always shipped with.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub ela: ElaConfig,
    pub layout: LayoutConfig,
    pub brightness: BrightnessConfig,
    pub edge: EdgeDensityConfig,
    pub text: TextConfig,
    pub localizer: LocalizerConfig,
    pub parallel: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            ela: ElaConfig::default(),
            layout: LayoutConfig::default(),
            brightness: BrightnessConfig::default(),
            edge: EdgeDensityConfig::default(),
            text: TextConfig::default(),
            localizer: LocalizerConfig::default(),
            parallel: true,
        }
    }
}

impl AnalysisConfig {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        let config: AnalysisConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.ela.validate()?;
        self.edge.validate()?;
        self.text.validate()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorId {
    Ela,
    Layout,
    Brightness,
    Edge,
    Text,
}

impl DetectorId {
    pub const ALL: [DetectorId; 5] = [
        DetectorId::Ela,
        DetectorId::Layout,
        DetectorId::Brightness,
        DetectorId::Edge,
        DetectorId::Text,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            DetectorId::Ela => "ELA",
            DetectorId::Layout => "Layout",
            DetectorId::Brightness => "Brightness",
            DetectorId::Edge => "Edge density",
            DetectorId::Text => "Text consistency",
        }
    }
}

impl fmt::Display for DetectorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Axis-aligned rectangle in source-image pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
}

impl BoundingBox {
    /// Orders the corners and clamps them to `[0, width] x [0, height]`.
    pub fn clamped(x1: u32, y1: u32, x2: u32, y2: u32, width: u32, height: u32) -> Self {
        Self {
            x1: x1.min(x2).min(width),
            y1: y1.min(y2).min(height),
            x2: x1.max(x2).min(width),
            y2: y1.max(y2).min(height),
        }
    }

    pub fn from_rect(x: u32, y: u32, w: u32, h: u32, width: u32, height: u32) -> Self {
        Self::clamped(
            x,
            y,
            x.saturating_add(w),
            y.saturating_add(h),
            width,
            height,
        )
    }

    pub fn width(&self) -> u32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> u32 {
        self.y2 - self.y1
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictStatus {
    /// The detector ran to completion.
    Evaluated,
    /// The detector had nothing to compare against, e.g. no reference text.
    NotEvaluated,
    /// The detector could not complete; the note carries the reason.
    Failed,
}

#[derive(Debug, Clone)]
pub struct DetectorVerdict {
    pub detector: DetectorId,
    pub is_tampered: bool,
    pub confidence_metric: f64,
    pub evidence: Vec<BoundingBox>,
    pub evidence_mask: Option<GrayImage>,
    pub status: VerdictStatus,
    pub note: Option<String>,
}

impl DetectorVerdict {
    /// Evidence is dropped for clean verdicts so that only triggered
    /// detectors ever carry rectangles.
    pub fn evaluated(
        detector: DetectorId,
        is_tampered: bool,
        confidence_metric: f64,
        evidence: Vec<BoundingBox>,
    ) -> Self {
        Self {
            detector,
            is_tampered,
            confidence_metric,
            evidence: if is_tampered { evidence } else { Vec::new() },
            evidence_mask: None,
            status: VerdictStatus::Evaluated,
            note: None,
        }
    }

    pub fn not_evaluated(detector: DetectorId, note: impl Into<String>) -> Self {
        Self {
            detector,
            is_tampered: false,
            confidence_metric: 0.0,
            evidence: Vec::new(),
            evidence_mask: None,
            status: VerdictStatus::NotEvaluated,
            note: Some(note.into()),
        }
    }

    pub fn failed(detector: DetectorId, reason: impl fmt::Display) -> Self {
        Self {
            detector,
            is_tampered: false,
            confidence_metric: 0.0,
            evidence: Vec::new(),
            evidence_mask: None,
            status: VerdictStatus::Failed,
            note: Some(format!("{} detector failed: {}", detector, reason)),
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn with_mask(mut self, mask: GrayImage) -> Self {
        if self.is_tampered {
            self.evidence_mask = Some(mask);
        }
        self
    }
}

#[derive(Debug, Clone)]
pub struct TamperReport {
    pub composite_score: u8,
    pub verdicts: Vec<DetectorVerdict>,
    pub final_verdict: bool,
    pub annotated_image: RgbImage,
    pub metadata: Option<MetadataFindings>,
}

impl TamperReport {
    pub fn verdict(&self, detector: DetectorId) -> Option<&DetectorVerdict> {
        self.verdicts.iter().find(|v| v.detector == detector)
    }

    pub fn triggered(&self) -> impl Iterator<Item = &DetectorVerdict> {
        self.verdicts.iter().filter(|v| v.is_tampered)
    }

    pub fn save_annotated<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.annotated_image.save(path)?;
        Ok(())
    }
}

/// Entry point for the HTTP and CLI layers: runs every detector over one
/// document image and folds the verdicts into a [`TamperReport`].
pub struct DocumentAnalyzer {
    config: AnalysisConfig,
    ocr: Option<Arc<dyn OcrEngine>>,
}

impl DocumentAnalyzer {
    pub fn new() -> Self {
        Self {
            config: AnalysisConfig::default(),
            ocr: None,
        }
    }

    pub fn with_config(mut self, config: AnalysisConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_ocr(mut self, engine: Arc<dyn OcrEngine>) -> Self {
        self.ocr = Some(engine);
        self
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Detectors in evaluation order. The order fixes both the verdict
    /// sequence and the overlay drawing order.
    pub fn detectors(&self) -> Vec<Box<dyn Detector>> {
        let localizer = Localizer::new(self.config.localizer.clone());

        vec![
            Box::new(ElaDetector::new(self.config.ela.clone(), localizer.clone())),
            Box::new(LayoutDetector::new(self.config.layout.clone())),
            Box::new(BrightnessDetector::new(self.config.brightness.clone())),
            Box::new(EdgeDensityDetector::new(self.config.edge.clone(), localizer)),
            Box::new(TextConsistencyDetector::new(
                self.config.text.clone(),
                self.ocr.clone(),
            )),
        ]
    }

    pub fn analyze_document(
        &self,
        image: RgbImage,
        reference_text: Option<&str>,
    ) -> Result<TamperReport> {
        self.config.validate()?;

        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(ForensicsError::InputError(format!(
                "image has zero area ({}x{})",
                width, height
            )));
        }

        let detectors = self.detectors();
        let input = DocumentInput {
            image: &image,
            reference_text,
        };

        let verdicts = if self.config.parallel {
            detectors
                .par_iter()
                .map(|detector| evaluate(detector.as_ref(), &input))
                .collect::<Vec<_>>()
        } else {
            detectors
                .iter()
                .map(|detector| evaluate(detector.as_ref(), &input))
                .collect::<Vec<_>>()
        };

        let report = EvidenceAggregator::new().aggregate(image, verdicts);
        info!(
            "analysis of {}x{} image finished with composite score {}",
            width, height, report.composite_score
        );

        Ok(report)
    }

    pub fn analyze_bytes(&self, bytes: &[u8], reference_text: Option<&str>) -> Result<TamperReport> {
        let image = image::load_from_memory(bytes)
            .map_err(|e| ForensicsError::InputError(format!("cannot decode image: {}", e)))?;
        self.analyze_document(image.to_rgb8(), reference_text)
    }

    /// Decodes the file, runs the detectors and attaches the EXIF findings
    /// when the container carries any.
    pub fn analyze_file<P: AsRef<Path>>(
        &self,
        path: P,
        reference_text: Option<&str>,
    ) -> Result<TamperReport> {
        let path = path.as_ref();
        let image = image::open(path).map_err(|e| {
            ForensicsError::InputError(format!("cannot decode {}: {}", path.display(), e))
        })?;

        let mut report = self.analyze_document(image.to_rgb8(), reference_text)?;

        match ExifMetadataReader.read(path) {
            Ok(findings) => report.metadata = Some(findings),
            Err(e) => warn!("metadata unavailable for {}: {}", path.display(), e),
        }

        Ok(report)
    }
}

impl Default for DocumentAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}
