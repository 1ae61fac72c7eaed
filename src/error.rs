use std::time::Duration;

use thiserror::Error;

use crate::DetectorId;

#[derive(Error, Debug)]
pub enum ForensicsError {
    #[error("Image loading error: {0}")]
    ImageLoad(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid input image: {0}")]
    InputError(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("{detector} detector failed: {reason}")]
    DetectorFailure { detector: DetectorId, reason: String },

    #[error("{collaborator} did not respond within {timeout:?}")]
    CollaboratorTimeout {
        collaborator: &'static str,
        timeout: Duration,
    },

    #[error("OCR error: {0}")]
    Ocr(String),

    #[error("Metadata extraction error: {0}")]
    MetadataError(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ForensicsError>;
