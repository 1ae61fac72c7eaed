pub mod visualization;

use serde::Serialize;

use crate::{BoundingBox, DetectorId, TamperReport, VerdictStatus, metadata::MetadataFindings};

/// Transport form of a [`TamperReport`] for the HTTP layer. The annotated
/// image is served separately.
#[derive(Serialize)]
pub struct JsonReport<'a> {
    pub composite_score: u8,
    pub final_verdict: bool,
    pub verdicts: Vec<VerdictSection<'a>>,
    pub metadata: Option<&'a MetadataFindings>,
}

#[derive(Serialize)]
pub struct VerdictSection<'a> {
    pub detector: DetectorId,
    pub is_tampered: bool,
    pub confidence_metric: f64,
    pub status: VerdictStatus,
    pub note: Option<&'a str>,
    pub evidence: &'a [BoundingBox],
}

impl<'a> From<&'a TamperReport> for JsonReport<'a> {
    fn from(report: &'a TamperReport) -> Self {
        Self {
            composite_score: report.composite_score,
            final_verdict: report.final_verdict,
            verdicts: report
                .verdicts
                .iter()
                .map(|v| VerdictSection {
                    detector: v.detector,
                    is_tampered: v.is_tampered,
                    confidence_metric: v.confidence_metric,
                    status: v.status,
                    note: v.note.as_deref(),
                    evidence: &v.evidence,
                })
                .collect(),
            metadata: report.metadata.as_ref(),
        }
    }
}

impl JsonReport<'_> {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
