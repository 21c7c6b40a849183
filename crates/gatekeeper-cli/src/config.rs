use gatekeeper_core::{DetectorOptions, LetterOrder, PlateOptions};
use std::path::PathBuf;

/// Helper configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// YOLO face detector.
    pub face_model: PathBuf,
    /// ArcFace embedding model.
    pub arcface_model: PathBuf,
    /// YOLO plate detector.
    pub plate_model: PathBuf,
    /// YOLO plate character detector.
    pub char_model: PathBuf,
    /// Cosine similarity a face must exceed to be recognised.
    pub similarity_threshold: f32,
    pub face_input_size: u32,
    pub face_confidence: f32,
    pub max_faces: usize,
    /// Where the annotated face image is written.
    pub output_image: PathBuf,
    /// Font used for box labels; boxes are unlabelled without one.
    pub font_path: Option<PathBuf>,
    pub plate_padding: u32,
    pub classify_enhanced: bool,
    /// When set, raw and enhanced plate crops are written here.
    pub plate_debug_dir: Option<PathBuf>,
    pub letter_order: LetterOrder,
    /// TOML label table replacing the built-in one.
    pub labels_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from `GATEKEEPER_*` environment variables with defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let model_dir = lookup("GATEKEEPER_MODEL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("models"));

        let model = |key: &str, file: &str| {
            lookup(key)
                .map(PathBuf::from)
                .unwrap_or_else(|| model_dir.join(file))
        };

        let letter_order = match lookup("GATEKEEPER_LETTER_ORDER") {
            Some(v) => v.parse().unwrap_or_else(|e| {
                tracing::warn!(error = %e, "ignoring GATEKEEPER_LETTER_ORDER");
                LetterOrder::default()
            }),
            None => LetterOrder::default(),
        };

        Self {
            face_model: model("GATEKEEPER_FACE_MODEL", "yolov11m-face.onnx"),
            arcface_model: model("GATEKEEPER_ARCFACE_MODEL", "arcface.onnx"),
            plate_model: model("GATEKEEPER_PLATE_MODEL", "plate-detector.onnx"),
            char_model: model("GATEKEEPER_CHAR_MODEL", "plate-chars.onnx"),
            similarity_threshold: parsed(&lookup, "GATEKEEPER_SIMILARITY_THRESHOLD", 0.3),
            face_input_size: parsed(&lookup, "GATEKEEPER_FACE_INPUT_SIZE", 1280),
            face_confidence: parsed(&lookup, "GATEKEEPER_FACE_CONFIDENCE", 0.25),
            max_faces: parsed(&lookup, "GATEKEEPER_MAX_FACES", 1000),
            output_image: lookup("GATEKEEPER_OUTPUT_IMAGE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("output_with_faces.jpg")),
            font_path: lookup("GATEKEEPER_FONT_PATH").map(PathBuf::from),
            plate_padding: parsed(&lookup, "GATEKEEPER_PLATE_PADDING", gatekeeper_core::plate::DEFAULT_PLATE_PADDING),
            classify_enhanced: lookup("GATEKEEPER_PLATE_CLASSIFY_ENHANCED")
                .map(|v| v != "0")
                .unwrap_or(false),
            plate_debug_dir: lookup("GATEKEEPER_PLATE_DEBUG_DIR").map(PathBuf::from),
            letter_order,
            labels_path: lookup("GATEKEEPER_LABELS_PATH").map(PathBuf::from),
        }
    }

    pub fn face_detector_options(&self) -> DetectorOptions {
        DetectorOptions {
            input_size: self.face_input_size,
            confidence_threshold: self.face_confidence,
            max_detections: self.max_faces,
            ..DetectorOptions::default()
        }
    }

    pub fn plate_detector_options(&self) -> DetectorOptions {
        DetectorOptions::default()
    }

    pub fn char_detector_options(&self) -> DetectorOptions {
        DetectorOptions::default()
    }

    pub fn plate_options(&self) -> PlateOptions {
        PlateOptions {
            padding: self.plate_padding,
            letter_order: self.letter_order,
            classify_enhanced: self.classify_enhanced,
        }
    }
}

fn parsed<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    lookup(key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_with(vars: &[(&str, &str)]) -> Config {
        let map: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_with(&[]);
        assert_eq!(config.similarity_threshold, 0.3);
        assert_eq!(config.face_model, PathBuf::from("models/yolov11m-face.onnx"));
        assert_eq!(config.char_model, PathBuf::from("models/plate-chars.onnx"));
        assert_eq!(config.face_input_size, 1280);
        assert_eq!(config.max_faces, 1000);
        assert_eq!(config.plate_padding, 5);
        assert!(!config.classify_enhanced);
        assert_eq!(config.letter_order, LetterOrder::Observed);
        assert!(config.font_path.is_none());
    }

    #[test]
    fn test_model_dir_and_overrides() {
        let config = config_with(&[
            ("GATEKEEPER_MODEL_DIR", "/opt/gate"),
            ("GATEKEEPER_PLATE_MODEL", "/srv/plates.onnx"),
            ("GATEKEEPER_SIMILARITY_THRESHOLD", "0.45"),
            ("GATEKEEPER_PLATE_CLASSIFY_ENHANCED", "1"),
            ("GATEKEEPER_LETTER_ORDER", "rtl"),
        ]);
        assert_eq!(config.arcface_model, PathBuf::from("/opt/gate/arcface.onnx"));
        assert_eq!(config.plate_model, PathBuf::from("/srv/plates.onnx"));
        assert!((config.similarity_threshold - 0.45).abs() < 1e-6);
        assert!(config.classify_enhanced);
        assert_eq!(config.letter_order, LetterOrder::RightToLeft);
    }

    #[test]
    fn test_unparseable_values_fall_back() {
        let config = config_with(&[
            ("GATEKEEPER_SIMILARITY_THRESHOLD", "high"),
            ("GATEKEEPER_LETTER_ORDER", "diagonal"),
        ]);
        assert_eq!(config.similarity_threshold, 0.3);
        assert_eq!(config.letter_order, LetterOrder::Observed);
    }

    #[test]
    fn test_face_detector_options() {
        let opts = config_with(&[("GATEKEEPER_FACE_CONFIDENCE", "0.4")]).face_detector_options();
        assert_eq!(opts.input_size, 1280);
        assert!((opts.confidence_threshold - 0.4).abs() < 1e-6);
        assert_eq!(opts.max_detections, 1000);
        assert_eq!(opts.iou_threshold, 0.7);
    }
}
