pub mod tesseract;

use std::time::Instant;

use image::RgbImage;
use serde::Serialize;

use crate::{
    BoundingBox,
    error::{ForensicsError, Result},
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OcrWord {
    pub text: String,
    pub bbox: BoundingBox,
    pub confidence: f32,
}

/// Text recognition is provided from outside the core. Implementations
/// must be shareable across the detector worker threads.
///
/// Every call carries a deadline. An engine must give up by then, release
/// whatever it started (threads, child processes, temporary files) and
/// return [`ForensicsError::CollaboratorTimeout`].
pub trait OcrEngine: Send + Sync {
    fn extract_text(&self, image: &RgbImage, deadline: Instant) -> Result<String>;

    fn extract_words_with_boxes(&self, _image: &RgbImage, _deadline: Instant) -> Result<Vec<OcrWord>> {
        Err(ForensicsError::Ocr(
            "word-level extraction is not supported by this engine".into(),
        ))
    }
}
