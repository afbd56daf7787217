//! Text recognition
//!
//! The [`TextRecognizer`] seam keeps the OCR engine swappable; the shipped
//! backend runs the `ocrs` detection and recognition models.

use std::path::Path;

use image::RgbImage;
use ocrs::{ImageSource, OcrEngine, OcrEngineParams, TextItem};
use rten::Model;

use super::region::Region;
use super::VisionError;

/// One line of recognized text
#[derive(Debug, Clone, PartialEq)]
pub struct ScanResult {
    pub text: String,
    pub score: f32,
    /// Where the text sits, in the coordinates of the scanned image
    pub bbox: Option<Region>,
}

impl ScanResult {
    pub fn new(text: impl Into<String>, bbox: Option<Region>) -> Self {
        Self {
            text: text.into(),
            score: 1.0,
            bbox,
        }
    }
}

/// Anything that can turn an image into lines of text
pub trait TextRecognizer {
    /// Recognize every text line in `image`, top to bottom
    fn recognize(&self, image: &RgbImage) -> Result<Vec<ScanResult>, VisionError>;
}

/// OCR backed by the `ocrs` models of one server variant
pub struct OcrsRecognizer {
    engine: OcrEngine,
}

impl OcrsRecognizer {
    /// Load `text-detection.rten` and `text-recognition.rten` from `model_dir`
    pub fn load(model_dir: &Path) -> Result<Self, VisionError> {
        let load = |file: &str| {
            let path = model_dir.join(file);
            Model::load_file(&path)
                .map_err(|e| VisionError::Model(format!("{}: {}", path.display(), e)))
        };

        let engine = OcrEngine::new(OcrEngineParams {
            detection_model: Some(load("text-detection.rten")?),
            recognition_model: Some(load("text-recognition.rten")?),
            ..Default::default()
        })
        .map_err(|e| VisionError::Model(e.to_string()))?;

        log::info!("Loaded OCR models from {}", model_dir.display());
        Ok(Self { engine })
    }
}

impl TextRecognizer for OcrsRecognizer {
    fn recognize(&self, image: &RgbImage) -> Result<Vec<ScanResult>, VisionError> {
        let source = ImageSource::from_bytes(image.as_raw(), image.dimensions())
            .map_err(|e| VisionError::Ocr(e.to_string()))?;
        let input = self
            .engine
            .prepare_input(source)
            .map_err(|e| VisionError::Ocr(e.to_string()))?;
        let words = self
            .engine
            .detect_words(&input)
            .map_err(|e| VisionError::Ocr(e.to_string()))?;
        let lines = self.engine.find_text_lines(&input, &words);
        let texts = self
            .engine
            .recognize_text(&input, &lines)
            .map_err(|e| VisionError::Ocr(e.to_string()))?;

        // ocrs reports no per-line confidence
        let results = texts
            .iter()
            .flatten()
            .filter(|line| !line.chars().is_empty())
            .map(|line| {
                let rect = line.bounding_rect();
                let bbox = Region::new(
                    rect.left(),
                    rect.top(),
                    rect.right() - rect.left(),
                    rect.bottom() - rect.top(),
                );
                ScanResult::new(line.to_string().trim(), Some(bbox))
            })
            .filter(|r| !r.text.is_empty())
            .collect();
        Ok(results)
    }
}

/// Outcome of looking for a word among scan results
#[derive(Debug, Clone, PartialEq)]
pub enum WordMatch {
    /// Where the word was found
    Found(Region),
    /// Not found; carries the last text seen, a hint for which way to scroll
    Missing(Option<String>),
}

fn normalize(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// First result equal to `word` ignoring case and spaces
pub fn match_word(results: &[ScanResult], word: &str, fallback: Region) -> WordMatch {
    let wanted = normalize(word);
    for result in results {
        if normalize(&result.text) == wanted {
            return WordMatch::Found(result.bbox.unwrap_or(fallback));
        }
    }
    WordMatch::Missing(results.last().map(|r| r.text.clone()))
}
