use std::{env, fs, sync::Arc};

use doc_forensics::{
    AnalysisConfig, DocumentAnalyzer, VerdictStatus,
    error::Result,
    ocr::tesseract::TesseractOcr,
    report::{
        JsonReport,
        visualization::{OutlineStyle, overlay_mask},
    },
};

fn main() -> Result<()> {
    let mut args = env::args().skip(1);
    let Some(image_path) = args.next() else {
        eprintln!("usage: analyze_document <image> [reference-text] [config.json]");
        std::process::exit(2);
    };
    let reference = args.next();
    let config = match args.next() {
        Some(path) => AnalysisConfig::from_json_file(path)?,
        None => AnalysisConfig::default(),
    };

    let analyzer = DocumentAnalyzer::new()
        .with_config(config)
        .with_ocr(Arc::new(TesseractOcr::new()));

    let report = analyzer.analyze_file(&image_path, reference.as_deref())?;

    println!("Tampering score: {}%", report.composite_score);
    for verdict in &report.verdicts {
        let state = match (verdict.status, verdict.is_tampered) {
            (VerdictStatus::Failed, _) => "failed",
            (VerdictStatus::NotEvaluated, _) => "skipped",
            (_, true) => "TAMPERED",
            (_, false) => "ok",
        };
        println!(
            "  {:<18} {:<9} {}",
            verdict.detector.name(),
            state,
            verdict.note.as_deref().unwrap_or("")
        );
    }

    fs::create_dir_all("output")?;
    report.save_annotated("output/annotated.png")?;

    for verdict in report.triggered() {
        if let Some(mask) = &verdict.evidence_mask {
            let style = OutlineStyle::for_detector(verdict.detector);
            let overlay = overlay_mask(&report.annotated_image, mask, style.color, 0.6);
            overlay.save(format!("output/{:?}_mask.png", verdict.detector).to_lowercase())?;
        }
    }

    println!("{}", JsonReport::from(&report).to_json()?);
    println!(
        "\nImage is {}tampered!",
        if report.final_verdict { "" } else { "NOT " }
    );

    Ok(())
}
