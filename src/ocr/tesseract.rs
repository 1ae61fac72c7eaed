use std::{
    io::{self, Read, Write},
    path::{Path, PathBuf},
    process::{Child, Command, ExitStatus, Stdio},
    thread,
    time::{Duration, Instant},
};

use image::{GrayImage, ImageFormat, Luma, RgbImage};
use imageproc::contrast::otsu_level;
use log::debug;

use crate::{
    BoundingBox,
    error::{ForensicsError, Result},
    image_utils::rgb_to_gray,
    ocr::{OcrEngine, OcrWord},
};

/// Runs the `tesseract` command-line tool on a temporary PNG.
#[derive(Debug, Clone)]
pub struct TesseractOcr {
    binary: PathBuf,
    language: String,
    binarize: bool,
}

impl TesseractOcr {
    pub fn new() -> Self {
        Self {
            binary: PathBuf::from("tesseract"),
            language: "eng".into(),
            binarize: true,
        }
    }

    pub fn with_binary<P: Into<PathBuf>>(mut self, binary: P) -> Self {
        self.binary = binary.into();
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// Otsu-binarize (white text on black) before recognition.
    pub fn with_binarize(mut self, binarize: bool) -> Self {
        self.binarize = binarize;
        self
    }

    fn prepare(&self, image: &RgbImage) -> GrayImage {
        let gray = rgb_to_gray(image);
        if !self.binarize {
            return gray;
        }

        let level = otsu_level(&gray);
        let (width, height) = gray.dimensions();
        GrayImage::from_fn(width, height, |x, y| {
            if gray.get_pixel(x, y)[0] > level { Luma([0]) } else { Luma([255]) }
        })
    }

    /// The temporary PNG lives until this returns; a child still running at
    /// the deadline is killed and reaped first.
    fn run(&self, image: &RgbImage, output_kind: Option<&str>, deadline: Instant) -> Result<String> {
        let started = Instant::now();
        let mut tmp = tempfile::Builder::new().suffix(".png").tempfile()?;
        self.prepare(image).write_to(&mut tmp, ImageFormat::Png)?;
        tmp.flush()?;

        let mut child = self
            .command(tmp.path(), output_kind)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let (polled, stdout, stderr) = thread::scope(|s| {
            let out = s.spawn(move || drain(stdout));
            let err = s.spawn(move || drain(stderr));

            let polled = poll_until(&mut child, deadline);
            if !matches!(polled, Ok(Some(_))) {
                let _ = child.kill();
                let _ = child.wait();
            }

            (
                polled,
                out.join().unwrap_or_default(),
                err.join().unwrap_or_default(),
            )
        });

        match polled? {
            Some(status) if status.success() => Ok(String::from_utf8_lossy(&stdout).into_owned()),
            Some(_) => Err(ForensicsError::Ocr(format!(
                "tesseract failed: {}",
                String::from_utf8_lossy(&stderr).trim()
            ))),
            None => Err(ForensicsError::CollaboratorTimeout {
                collaborator: "tesseract",
                timeout: deadline.saturating_duration_since(started),
            }),
        }
    }

    fn command(&self, path: &Path, output_kind: Option<&str>) -> Command {
        let mut command = Command::new(&self.binary);
        command.arg(path).arg("stdout").arg("-l").arg(&self.language);
        if let Some(kind) = output_kind {
            command.arg(kind);
        }
        debug!("running {:?}", command);
        command
    }
}

impl Default for TesseractOcr {
    fn default() -> Self {
        Self::new()
    }
}

impl OcrEngine for TesseractOcr {
    fn extract_text(&self, image: &RgbImage, deadline: Instant) -> Result<String> {
        self.run(image, None, deadline)
    }

    fn extract_words_with_boxes(&self, image: &RgbImage, deadline: Instant) -> Result<Vec<OcrWord>> {
        let tsv = self.run(image, Some("tsv"), deadline)?;
        let (width, height) = image.dimensions();
        Ok(parse_tsv_words(&tsv, width, height))
    }
}

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// `Ok(None)` once the deadline passes with the child still running.
fn poll_until(child: &mut Child, deadline: Instant) -> io::Result<Option<ExitStatus>> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

fn drain<R: Read>(pipe: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        let _ = pipe.read_to_end(&mut buf);
    }
    buf
}

/// Word rows (level 5) of Tesseract's TSV output. Rows without text or
/// with a negative confidence are skipped.
pub fn parse_tsv_words(tsv: &str, width: u32, height: u32) -> Vec<OcrWord> {
    tsv.lines()
        .skip(1)
        .filter_map(|row| {
            let cols = row.split('\t').collect::<Vec<_>>();
            if cols.len() < 12 || cols[0].parse::<u32>().ok()? != 5 {
                return None;
            }

            let left = cols[6].parse::<u32>().ok()?;
            let top = cols[7].parse::<u32>().ok()?;
            let w = cols[8].parse::<u32>().ok()?;
            let h = cols[9].parse::<u32>().ok()?;
            let confidence = cols[10].parse::<f32>().unwrap_or(-1.0);
            let text = cols[11].trim();

            if text.is_empty() || confidence < 0.0 {
                return None;
            }

            Some(OcrWord {
                text: text.to_string(),
                bbox: BoundingBox::from_rect(left, top, w, h, width, height),
                confidence,
            })
        })
        .collect()
}
