//! Licence plate reading: locate the plate, enhance it, classify characters,
//! and assemble the printed string.

use crate::detector::{DetectorError, ObjectDetector};
use crate::enhance;
use crate::labels::LabelTable;
use crate::types::PixelRect;
use image::{DynamicImage, GrayImage, RgbImage};
use std::str::FromStr;

/// Separator placed between characters in the plate string.
pub const PLATE_SEPARATOR: &str = " ";

/// Pixels added around the detected plate before cropping.
pub const DEFAULT_PLATE_PADDING: u32 = 5;

/// How letters are ordered after the digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LetterOrder {
    /// Sort descending by x, then reverse: ascending x, ties in reverse
    /// detection order. This is what deployed callers already parse.
    #[default]
    Observed,
    /// Descending x, ties in detection order: true right-to-left reading.
    RightToLeft,
}

impl FromStr for LetterOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "observed" | "ltr" => Ok(LetterOrder::Observed),
            "rtl" | "right-to-left" => Ok(LetterOrder::RightToLeft),
            other => Err(format!("unknown letter order {other:?}, expected \"observed\" or \"rtl\"")),
        }
    }
}

/// One classified character on the plate crop.
#[derive(Debug, Clone, PartialEq)]
pub struct PlateCharacter {
    pub rect: PixelRect,
    /// Mapped glyph (or the raw class name when unmapped).
    pub glyph: String,
}

/// A label counts as a digit when every char is numeric, so Arabic-Indic
/// digits qualify as well as ASCII ones.
pub fn is_digit_label(label: &str) -> bool {
    !label.is_empty() && label.chars().all(char::is_numeric)
}

/// Join characters into the plate string: digits ascending by left edge,
/// then letters in `order`.
pub fn assemble_plate_text(characters: &[PlateCharacter], order: LetterOrder) -> String {
    let (mut digits, mut letters): (Vec<&PlateCharacter>, Vec<&PlateCharacter>) =
        characters.iter().partition(|c| is_digit_label(&c.glyph));

    digits.sort_by_key(|c| c.rect.x1);
    letters.sort_by(|a, b| b.rect.x1.cmp(&a.rect.x1));
    if order == LetterOrder::Observed {
        letters.reverse();
    }

    digits
        .iter()
        .chain(letters.iter())
        .map(|c| c.glyph.as_str())
        .collect::<Vec<_>>()
        .join(PLATE_SEPARATOR)
}

/// Settings for [`read_plate`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlateOptions {
    pub padding: u32,
    pub letter_order: LetterOrder,
    /// Classify characters on the enhanced crop instead of the raw crop.
    pub classify_enhanced: bool,
}

impl Default for PlateOptions {
    fn default() -> Self {
        Self {
            padding: DEFAULT_PLATE_PADDING,
            letter_order: LetterOrder::default(),
            classify_enhanced: false,
        }
    }
}

/// Everything produced while reading one image.
#[derive(Debug, Clone, Default)]
pub struct PlateReading {
    /// Assembled plate string, empty when nothing was read.
    pub text: String,
    /// Padded plate region in the source image.
    pub region: Option<PixelRect>,
    pub crop: Option<RgbImage>,
    pub enhanced: Option<GrayImage>,
    pub characters: Vec<PlateCharacter>,
}

/// Read the highest-confidence plate in `image`.
pub fn read_plate(
    image: &RgbImage,
    plate_detector: &mut dyn ObjectDetector,
    char_detector: &mut dyn ObjectDetector,
    labels: &LabelTable,
    options: &PlateOptions,
) -> Result<PlateReading, DetectorError> {
    let plates = plate_detector.detect(image)?;
    let Some(plate) = plates.first() else {
        tracing::warn!("no licence plate detected");
        return Ok(PlateReading::default());
    };

    let region = plate
        .bbox
        .to_pixels()
        .pad(options.padding, image.width(), image.height());
    let Some(crop) = region.crop_from(image) else {
        tracing::warn!(?region, "plate region is empty");
        return Ok(PlateReading::default());
    };
    tracing::debug!(?region, confidence = plate.bbox.confidence, "plate located");

    let enhanced = enhance::enhance_plate(&crop);

    let detections = if options.classify_enhanced {
        let enhanced_rgb = DynamicImage::ImageLuma8(enhanced.clone()).to_rgb8();
        char_detector.detect(&enhanced_rgb)?
    } else {
        char_detector.detect(&crop)?
    };

    let characters: Vec<PlateCharacter> = detections
        .iter()
        .filter_map(|det| match labels.resolve(det.class_id) {
            Some(glyph) => Some(PlateCharacter {
                rect: det.bbox.to_pixels(),
                glyph: glyph.to_string(),
            }),
            None => {
                tracing::warn!(class_id = det.class_id, "character class missing from label table");
                None
            }
        })
        .collect();

    if characters.is_empty() {
        tracing::warn!("no characters detected");
    }

    let text = assemble_plate_text(&characters, options.letter_order);
    tracing::info!(%text, characters = characters.len(), "detected licence plate text");

    Ok(PlateReading {
        text,
        region: Some(region),
        crop: Some(crop),
        enhanced: Some(enhanced),
        characters,
    })
}
