pub mod exif;
pub mod fingerprint;

use std::{collections::BTreeMap, path::Path};

use serde::Serialize;

use crate::error::Result;

/// What the container metadata says about a document's history. It is
/// reported next to the detector verdicts but never scored.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MetadataFindings {
    pub tags: BTreeMap<String, String>,
    pub software: Option<String>,
    pub modified_at: Option<String>,
    pub suspicious_indicators: Vec<String>,
}

impl MetadataFindings {
    pub fn is_suspicious(&self) -> bool {
        !self.suspicious_indicators.is_empty()
    }
}

pub trait MetadataReader {
    fn read(&self, path: &Path) -> Result<MetadataFindings>;
}
