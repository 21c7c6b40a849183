//! Shared plumbing for the `gatekeeper-face` and `gatekeeper-plate` helpers.
//!
//! Both helpers print exactly one JSON value on stdout. Any processing
//! failure is logged to stderr and reported as the empty result (`{}` or
//! `""`) so the calling application never sees a partial payload.

pub mod config;

use anyhow::{bail, Context, Result};
use gatekeeper_core::annotate::{self, LabelFont};
use gatekeeper_core::roster::parse_roster;
use gatekeeper_core::{
    read_plate, recognize_faces, CosineMatcher, FaceRecognizer, LabelTable, PlateReading, YoloDetector,
};
use std::collections::BTreeMap;
use std::path::Path;
use tracing_subscriber::EnvFilter;

pub use config::Config;

/// Install the stderr tracing subscriber. stdout is reserved for the result.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
}

/// Recognise faces in `image_path` against the JSON roster and return the
/// `{"<user id>": "<display name>"}` object as a JSON string.
pub fn run_face(image_path: &Path, roster_json: &str, config: &Config) -> String {
    let identities = match recognize(image_path, roster_json, config) {
        Ok(identities) => identities,
        Err(err) => {
            tracing::error!(error = %format!("{err:#}"), "face recognition failed");
            BTreeMap::new()
        }
    };
    serde_json::to_string(&identities).unwrap_or_else(|_| "{}".to_string())
}

/// Read the licence plate in `image_path` and return it as a JSON string literal.
pub fn run_plate(image_path: &Path, config: &Config) -> String {
    let text = match read(image_path, config) {
        Ok(reading) => reading.text,
        Err(err) => {
            tracing::error!(error = %format!("{err:#}"), "plate recognition failed");
            String::new()
        }
    };
    serde_json::to_string(&text).unwrap_or_else(|_| "\"\"".to_string())
}

fn load_image(image_path: &Path) -> Result<image::RgbImage> {
    if !image_path.exists() {
        bail!("image file {} not found", image_path.display());
    }
    let image = image::open(image_path)
        .with_context(|| format!("cannot decode image {}", image_path.display()))?;
    Ok(image.to_rgb8())
}

fn recognize(image_path: &Path, roster_json: &str, config: &Config) -> Result<BTreeMap<String, String>> {
    let image = load_image(image_path)?;
    let roster = parse_roster(roster_json)?;
    tracing::info!(
        image = %image_path.display(),
        width = image.width(),
        height = image.height(),
        users = roster.len(),
        "recognising faces"
    );

    let mut detector = YoloDetector::load(&config.face_model.to_string_lossy(), config.face_detector_options())?;
    let mut recognizer = FaceRecognizer::load(&config.arcface_model.to_string_lossy())?;

    let report = recognize_faces(
        &image,
        &mut detector,
        &mut recognizer,
        &CosineMatcher,
        &roster,
        config.similarity_threshold,
    )?;

    let font = config.font_path.as_deref().and_then(LabelFont::load);
    let mut annotated = image;
    annotate::annotate_faces(&mut annotated, &report, font.as_ref());
    match annotated.save(&config.output_image) {
        Ok(()) => tracing::info!(path = %config.output_image.display(), "annotated image written"),
        Err(err) => tracing::warn!(
            path = %config.output_image.display(),
            error = %err,
            "cannot write annotated image"
        ),
    }

    Ok(report.identities)
}

fn read(image_path: &Path, config: &Config) -> Result<PlateReading> {
    let image = load_image(image_path)?;

    let mut plate_detector = YoloDetector::load(&config.plate_model.to_string_lossy(), config.plate_detector_options())?;
    let mut char_detector = YoloDetector::load(&config.char_model.to_string_lossy(), config.char_detector_options())?;

    let labels = character_labels(config, char_detector.class_names())?;

    let reading = read_plate(
        &image,
        &mut plate_detector,
        &mut char_detector,
        &labels,
        &config.plate_options(),
    )?;

    if let Some(dir) = &config.plate_debug_dir {
        if let Err(err) = write_debug_crops(dir, &reading) {
            tracing::warn!(dir = %dir.display(), error = %format!("{err:#}"), "cannot write plate debug crops");
        }
    }

    Ok(reading)
}

/// An explicit label file wins; otherwise the character model's own class
/// names set the order and the embedded table supplies the glyphs.
fn character_labels(config: &Config, model_classes: Option<&[String]>) -> Result<LabelTable> {
    if let Some(path) = &config.labels_path {
        return Ok(LabelTable::load(path)?);
    }
    Ok(match model_classes {
        Some(names) => {
            tracing::debug!(classes = names.len(), "using class names from character model");
            LabelTable::builtin().with_classes(names.to_vec())
        }
        None => LabelTable::builtin().clone(),
    })
}

fn write_debug_crops(dir: &Path, reading: &PlateReading) -> Result<()> {
    std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    if let Some(crop) = &reading.crop {
        crop.save(dir.join("plate.png")).context("saving plate crop")?;
    }
    if let Some(enhanced) = &reading.enhanced {
        enhanced.save(dir.join("plate-enhanced.png")).context("saving enhanced plate")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatekeeper_core::PixelRect;
    use image::{GrayImage, RgbImage};

    #[test]
    fn test_write_debug_crops() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nested");
        let reading = PlateReading {
            text: "٣ ج".into(),
            region: Some(PixelRect { x1: 0, y1: 0, x2: 8, y2: 4 }),
            crop: Some(RgbImage::new(8, 4)),
            enhanced: Some(GrayImage::new(8, 4)),
            characters: vec![],
        };
        write_debug_crops(&out, &reading).unwrap();
        assert!(out.join("plate.png").exists());
        assert!(out.join("plate-enhanced.png").exists());
    }

    #[test]
    fn test_character_labels_prefers_model_names() {
        let config = Config::from_lookup(|_| None);
        let names = vec!["baa".to_string(), "1".to_string()];
        let labels = character_labels(&config, Some(&names)).unwrap();
        assert_eq!(labels.resolve(0), Some("ب"));
        assert_eq!(labels.resolve(1), Some("١"));

        let fallback = character_labels(&config, None).unwrap();
        assert_eq!(fallback.classes.len(), 32);
    }

    #[test]
    fn test_character_labels_file_overrides_model() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("labels.toml");
        std::fs::write(&path, "classes = [\"x\"]\n[glyphs]\nx = \"ص\"\n").unwrap();
        let path_str = path.to_string_lossy().into_owned();
        let config = Config::from_lookup(move |key| (key == "GATEKEEPER_LABELS_PATH").then(|| path_str.clone()));

        let names = vec!["baa".to_string()];
        let labels = character_labels(&config, Some(&names)).unwrap();
        assert_eq!(labels.resolve(0), Some("ص"));
    }

    #[test]
    fn test_load_image_missing() {
        let err = load_image(Path::new("/nonexistent/car.jpg")).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
