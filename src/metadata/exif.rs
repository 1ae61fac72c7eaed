use std::{collections::BTreeMap, fs::File, io::BufReader, path::Path};

use exif::{Exif, In, Tag};

use crate::{
    error::Result,
    metadata::{MetadataFindings, MetadataReader},
};

const EDITING_SOFTWARE: [&str; 4] = ["photoshop", "gimp", "paint", "lightroom"];

pub struct ExifMetadataReader;

impl ExifMetadataReader {
    fn field(exif: &Exif, tag: Tag) -> Option<String> {
        exif.get_field(tag, In::PRIMARY)
            .map(|f| f.display_value().to_string())
    }

    fn findings(exif: &Exif) -> MetadataFindings {
        let tags = exif
            .fields()
            .map(|field| (field.tag.to_string(), field.display_value().to_string()))
            .collect::<BTreeMap<_, _>>();

        let software = Self::field(exif, Tag::Software).filter(|s| !s.trim().is_empty());
        let modified_at = Self::field(exif, Tag::DateTime);
        let original = Self::field(exif, Tag::DateTimeOriginal);
        let digitized = Self::field(exif, Tag::DateTimeDigitized);

        let mut suspicious_indicators = Vec::new();

        if let Some(ref sw) = software {
            let lower = sw.to_lowercase();
            if EDITING_SOFTWARE.iter().any(|name| lower.contains(name)) {
                suspicious_indicators.push(format!("Edited with: {}", sw));
            } else {
                suspicious_indicators.push(format!("Processed by software: {}", sw));
            }
        }

        if original.is_none() && modified_at.is_some() {
            suspicious_indicators.push("Original datetime missing (may be stripped)".into());
        }

        if let (Some(orig), Some(digi)) = (&original, &digitized) {
            if orig != digi {
                suspicious_indicators.push("Inconsistent date time values".into());
            }
        }

        if let (Some(orig), Some(modified)) = (&original, &modified_at) {
            if orig != modified {
                suspicious_indicators.push(format!("Modified after capture: {}", modified));
            }
        }

        MetadataFindings {
            tags,
            software,
            modified_at,
            suspicious_indicators,
        }
    }
}

impl MetadataReader for ExifMetadataReader {
    fn read(&self, path: &Path) -> Result<MetadataFindings> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);

        match exif::Reader::new().read_from_container(&mut reader) {
            Ok(exif) => Ok(Self::findings(&exif)),
            Err(_) => Ok(MetadataFindings {
                suspicious_indicators: vec![
                    "No EXIF metadata found; it may have been removed by an editor".into(),
                ],
                ..MetadataFindings::default()
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use image::{Rgb, RgbImage};

    use super::*;

    #[test]
    fn test_image_without_exif_is_flagged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.png");
        RgbImage::from_pixel(8, 8, Rgb([1, 2, 3])).save(&path).unwrap();

        let findings = ExifMetadataReader.read(&path).unwrap();
        assert!(findings.tags.is_empty());
        assert!(findings.is_suspicious());
        assert!(findings.software.is_none());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(ExifMetadataReader.read(Path::new("/nonexistent/scan.jpg")).is_err());
    }
}
