//! YOLO object detector via ONNX Runtime.
//!
//! Runs ultralytics-exported YOLO models (faces, plates, plate characters)
//! with letterbox preprocessing, single-head anchor-free decoding and
//! class-aware NMS post-processing.

use crate::labels;
use crate::types::{BoundingBox, Detection};
use image::imageops::FilterType;
use image::RgbImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

// --- Named constants (ultralytics defaults) ---
const YOLO_PAD_VALUE: f32 = 114.0;
const YOLO_PIXEL_SCALE: f32 = 255.0;
const YOLO_BOX_CHANNELS: usize = 4;
const YOLO_DEFAULT_INPUT_SIZE: u32 = 640;
const YOLO_DEFAULT_CONFIDENCE: f32 = 0.25;
const YOLO_DEFAULT_IOU: f32 = 0.7;
const YOLO_DEFAULT_MAX_DETECTIONS: usize = 300;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("model file not found: {0} — export the YOLO weights to ONNX and place them in models/")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("input size must be positive, got {0}")]
    InvalidInputSize(u32),
    #[error("unexpected output shape {0:?}, expected [1, 4 + classes, proposals]")]
    UnexpectedShape(Vec<i64>),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Anything that finds labelled boxes in an RGB image.
pub trait ObjectDetector {
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<Detection>, DetectorError>;
}

/// Inference settings for one YOLO model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectorOptions {
    /// Square network input side, in pixels.
    pub input_size: u32,
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    pub max_detections: usize,
}

impl Default for DetectorOptions {
    fn default() -> Self {
        Self {
            input_size: YOLO_DEFAULT_INPUT_SIZE,
            confidence_threshold: YOLO_DEFAULT_CONFIDENCE,
            iou_threshold: YOLO_DEFAULT_IOU,
            max_detections: YOLO_DEFAULT_MAX_DETECTIONS,
        }
    }
}

/// Metadata for coordinate de-mapping after letterbox resize.
#[derive(Debug, Clone, Copy)]
struct LetterboxInfo {
    scale: f32,
    pad_x: f32,
    pad_y: f32,
}

impl LetterboxInfo {
    fn compute(width: u32, height: u32, input_size: u32) -> (Self, u32, u32) {
        let scale = (input_size as f32 / width as f32).min(input_size as f32 / height as f32);
        let new_w = ((width as f32 * scale).round() as u32).clamp(1, input_size);
        let new_h = ((height as f32 * scale).round() as u32).clamp(1, input_size);
        let pad_x = ((input_size - new_w) as f32 / 2.0).floor();
        let pad_y = ((input_size - new_h) as f32 / 2.0).floor();
        (Self { scale, pad_x, pad_y }, new_w, new_h)
    }

    /// Map a letterboxed coordinate back into source-image space.
    fn unmap(&self, x: f32, y: f32) -> (f32, f32) {
        ((x - self.pad_x) / self.scale, (y - self.pad_y) / self.scale)
    }
}

/// YOLO detector backed by an ONNX session.
pub struct YoloDetector {
    session: Session,
    options: DetectorOptions,
    class_names: Option<Vec<String>>,
}

impl YoloDetector {
    /// Load a YOLO ONNX model from the given path.
    pub fn load(model_path: &str, options: DetectorOptions) -> Result<Self, DetectorError> {
        if options.input_size == 0 {
            return Err(DetectorError::InvalidInputSize(options.input_size));
        }
        if !Path::new(model_path).exists() {
            return Err(DetectorError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(1)?
            .commit_from_file(model_path)?;

        // ultralytics exports store `names` as a Python dict literal
        let class_names = session
            .metadata()
            .ok()
            .and_then(|meta| meta.custom("names"))
            .and_then(|raw| labels::parse_model_names(&raw));

        tracing::info!(
            path = model_path,
            input_size = options.input_size,
            classes = class_names.as_ref().map(Vec::len),
            inputs = ?session.inputs().iter().map(|i| (i.name(), i.dtype())).collect::<Vec<_>>(),
            outputs = ?session.outputs().iter().map(|o| o.name()).collect::<Vec<_>>(),
            "loaded YOLO model"
        );

        Ok(Self { session, options, class_names })
    }

    /// Class names embedded in the model metadata, in class-index order.
    pub fn class_names(&self) -> Option<&[String]> {
        self.class_names.as_deref()
    }
}

impl ObjectDetector for YoloDetector {
    /// Detect objects, returning boxes in source pixels sorted by confidence.
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<Detection>, DetectorError> {
        if image.width() == 0 || image.height() == 0 {
            return Ok(Vec::new());
        }

        let (input, letterbox) = preprocess(image, self.options.input_size);

        let outputs = self.session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (shape, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| DetectorError::InferenceFailed(format!("output extraction: {e}")))?;
        let dims: Vec<i64> = shape.iter().copied().collect();

        let candidates = decode_output(
            &dims,
            data,
            &letterbox,
            image.width(),
            image.height(),
            self.options.confidence_threshold,
        )?;

        let mut result = nms(candidates, self.options.iou_threshold);
        result.truncate(self.options.max_detections);

        tracing::debug!(count = result.len(), "YOLO detections after NMS");
        Ok(result)
    }
}

/// Letterbox an RGB image into a NCHW float tensor scaled to [0, 1].
fn preprocess(image: &RgbImage, input_size: u32) -> (Array4<f32>, LetterboxInfo) {
    let (letterbox, new_w, new_h) = LetterboxInfo::compute(image.width(), image.height(), input_size);
    let resized = image::imageops::resize(image, new_w, new_h, FilterType::Triangle);

    let size = input_size as usize;
    let pad_value = YOLO_PAD_VALUE / YOLO_PIXEL_SCALE;
    let mut tensor = Array4::<f32>::from_elem((1, 3, size, size), pad_value);

    let pad_x = letterbox.pad_x as usize;
    let pad_y = letterbox.pad_y as usize;
    for (x, y, pixel) in resized.enumerate_pixels() {
        let (tx, ty) = (x as usize + pad_x, y as usize + pad_y);
        for c in 0..3 {
            tensor[[0, c, ty, tx]] = pixel[c] as f32 / YOLO_PIXEL_SCALE;
        }
    }

    (tensor, letterbox)
}

/// Decode a `[1, 4 + classes, proposals]` YOLO head into source-space detections.
///
/// Each proposal keeps only its best class. Proposals at or below
/// `threshold` are dropped. Boxes are clamped to the source image.
fn decode_output(
    dims: &[i64],
    data: &[f32],
    letterbox: &LetterboxInfo,
    width: u32,
    height: u32,
    threshold: f32,
) -> Result<Vec<Detection>, DetectorError> {
    if dims.len() != 3 || dims[0] != 1 || dims[1] <= YOLO_BOX_CHANNELS as i64 {
        return Err(DetectorError::UnexpectedShape(dims.to_vec()));
    }
    let channels = dims[1] as usize;
    let proposals = dims[2] as usize;
    if data.len() < channels * proposals {
        return Err(DetectorError::UnexpectedShape(dims.to_vec()));
    }
    let num_classes = channels - YOLO_BOX_CHANNELS;

    // Channel-major layout: value(channel, i) = data[channel * proposals + i]
    let at = |channel: usize, i: usize| data[channel * proposals + i];

    let mut detections = Vec::new();
    for i in 0..proposals {
        let mut class_id = 0;
        let mut score = f32::NEG_INFINITY;
        for c in 0..num_classes {
            let s = at(YOLO_BOX_CHANNELS + c, i);
            if s > score {
                score = s;
                class_id = c;
            }
        }
        if score <= threshold {
            continue;
        }

        let (cx, cy, w, h) = (at(0, i), at(1, i), at(2, i), at(3, i));
        let (x1, y1) = letterbox.unmap(cx - w / 2.0, cy - h / 2.0);
        let (x2, y2) = letterbox.unmap(cx + w / 2.0, cy + h / 2.0);

        detections.push(Detection {
            bbox: BoundingBox {
                x1: x1.clamp(0.0, width as f32),
                y1: y1.clamp(0.0, height as f32),
                x2: x2.clamp(0.0, width as f32),
                y2: y2.clamp(0.0, height as f32),
                confidence: score,
            },
            class_id,
        });
    }

    Ok(detections)
}

/// Class-aware Non-Maximum Suppression. Output is sorted by confidence.
fn nms(mut detections: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    detections.sort_by(|a, b| {
        b.bbox
            .confidence
            .partial_cmp(&a.bbox.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep = Vec::new();
    let mut suppressed = vec![false; detections.len()];

    for i in 0..detections.len() {
        if suppressed[i] {
            continue;
        }
        keep.push(detections[i]);

        for j in (i + 1)..detections.len() {
            if suppressed[j] || detections[j].class_id != detections[i].class_id {
                continue;
            }
            if detections[i].bbox.iou(&detections[j].bbox) > iou_threshold {
                suppressed[j] = true;
            }
        }
    }

    keep
}
