use image::RgbImage;
use log::{info, warn};

use crate::{
    DetectorVerdict, TamperReport, VerdictStatus,
    report::visualization::{OutlineStyle, draw_outline},
};

/// Score contributed by each triggered detector. Five detectors at 20 each
/// give the 0/20/40/60/80/100 scale.
pub const DETECTOR_WEIGHT: u8 = 20;

pub const MAX_SCORE: u8 = 100;

#[derive(Debug, Default, Clone, Copy)]
pub struct EvidenceAggregator;

impl EvidenceAggregator {
    pub fn new() -> Self {
        Self
    }

    pub fn composite_score(verdicts: &[DetectorVerdict]) -> u8 {
        let triggered = verdicts.iter().filter(|v| v.is_tampered).count() as u32;
        (triggered * DETECTOR_WEIGHT as u32).min(MAX_SCORE as u32) as u8
    }

    /// Folds the verdicts into a report and burns every triggered
    /// detector's rectangles into `source`, in verdict order. Nothing is
    /// dropped or reordered; later outlines are drawn over earlier ones.
    pub fn aggregate(&self, source: RgbImage, verdicts: Vec<DetectorVerdict>) -> TamperReport {
        let composite_score = Self::composite_score(&verdicts);

        for verdict in verdicts.iter().filter(|v| v.status == VerdictStatus::Failed) {
            warn!(
                "{} contributed no signal: {}",
                verdict.detector,
                verdict.note.as_deref().unwrap_or("unknown failure")
            );
        }

        let mut annotated_image = source;
        for verdict in verdicts.iter().filter(|v| v.is_tampered) {
            let style = OutlineStyle::for_detector(verdict.detector);
            for bbox in &verdict.evidence {
                draw_outline(&mut annotated_image, bbox, style);
            }
        }

        info!(
            "{} of {} detectors triggered, composite score {}",
            verdicts.iter().filter(|v| v.is_tampered).count(),
            verdicts.len(),
            composite_score
        );

        TamperReport {
            composite_score,
            final_verdict: composite_score > 0,
            verdicts,
            annotated_image,
            metadata: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use image::Rgb;

    use super::*;
    use crate::{BoundingBox, DetectorId};

    fn verdict(detector: DetectorId, is_tampered: bool) -> DetectorVerdict {
        DetectorVerdict::evaluated(detector, is_tampered, 1.0, Vec::new())
    }

    #[test]
    fn test_score_is_twenty_per_triggered_detector() {
        for triggered in 0..=5 {
            let verdicts = DetectorId::ALL
                .iter()
                .enumerate()
                .map(|(i, &id)| verdict(id, i < triggered))
                .collect::<Vec<_>>();

            let report = EvidenceAggregator::new().aggregate(RgbImage::new(10, 10), verdicts);
            assert_eq!(report.composite_score as usize, 20 * triggered);
            assert_eq!(report.final_verdict, triggered > 0);
        }
    }

    #[test]
    fn test_failed_verdict_does_not_abort_or_score() {
        let verdicts = vec![
            verdict(DetectorId::Ela, true),
            DetectorVerdict::failed(DetectorId::Layout, "contour extraction failed"),
            verdict(DetectorId::Brightness, true),
        ];
        let report = EvidenceAggregator::new().aggregate(RgbImage::new(10, 10), verdicts);

        assert_eq!(report.composite_score, 40);
        assert_eq!(report.verdicts.len(), 3);
        assert_eq!(report.verdicts[1].status, VerdictStatus::Failed);
    }

    #[test]
    fn test_overlay_follows_verdict_order() {
        let shared = BoundingBox { x1: 5, y1: 5, x2: 25, y2: 25 };
        let verdicts = vec![
            DetectorVerdict::evaluated(DetectorId::Layout, true, 6.0, vec![shared]),
            DetectorVerdict::evaluated(DetectorId::Ela, true, 9000.0, vec![shared]),
        ];
        let source = RgbImage::from_pixel(40, 40, Rgb([0, 0, 0]));
        let report = EvidenceAggregator::new().aggregate(source, verdicts);

        // ELA is drawn last, so its blue wins where the outlines overlap.
        assert_eq!(*report.annotated_image.get_pixel(5, 5), Rgb([0, 0, 255]));
        assert_eq!(report.verdicts[0].evidence, vec![shared]);
        assert_eq!(report.verdicts[1].evidence, vec![shared]);
    }

    #[test]
    fn test_clean_report_leaves_image_unchanged() {
        let source = RgbImage::from_pixel(12, 12, Rgb([7, 8, 9]));
        let verdicts = DetectorId::ALL.iter().map(|&id| verdict(id, false)).collect();
        let report = EvidenceAggregator::new().aggregate(source.clone(), verdicts);

        assert_eq!(report.composite_score, 0);
        assert!(!report.final_verdict);
        assert_eq!(report.annotated_image, source);
    }
}
