//! Per-image face recognition: detect, crop, embed, match against the roster.

use crate::detector::{DetectorError, ObjectDetector};
use crate::recognizer::{FaceEmbedder, RecognizerError};
use crate::types::{Embedding, Matcher, PixelRect, RosterEntry};
use image::RgbImage;
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors that fail a single face without failing the image.
#[derive(Error, Debug)]
pub enum FaceError {
    #[error("face box {0:?} lies outside the image")]
    EmptyCrop(PixelRect),
    #[error("embedding failed: {0}")]
    Embedding(#[from] RecognizerError),
}

/// The kept box for one recognised display name.
#[derive(Debug, Clone, PartialEq)]
pub struct RecognizedFace {
    pub user_id: String,
    pub name: String,
    pub rect: PixelRect,
    pub similarity: f32,
}

/// Everything found in one image.
#[derive(Debug, Clone, Default)]
pub struct FaceReport {
    /// `user id → display name`, the helper's stdout payload.
    pub identities: BTreeMap<String, String>,
    /// Best box per display name, in first-recognised order.
    pub recognized: Vec<RecognizedFace>,
    /// Every detected face box, recognised or not.
    pub detected: Vec<PixelRect>,
}

impl FaceReport {
    /// Detected boxes that did not end up as the kept box for any name.
    pub fn unrecognized(&self) -> impl Iterator<Item = &PixelRect> {
        self.detected
            .iter()
            .filter(move |rect| !self.recognized.iter().any(|r| &r.rect == *rect))
    }
}

/// Detect faces in `image` and match each one against `roster`.
///
/// Per display name only the most similar box is kept; a later box replaces
/// it only on a strictly greater similarity. A face that cannot be embedded
/// is logged and skipped but still counts as detected.
pub fn recognize_faces(
    image: &RgbImage,
    detector: &mut dyn ObjectDetector,
    embedder: &mut dyn FaceEmbedder,
    matcher: &dyn Matcher,
    roster: &[RosterEntry],
    threshold: f32,
) -> Result<FaceReport, DetectorError> {
    let detections = detector.detect(image)?;
    tracing::info!(faces = detections.len(), "faces detected");

    let mut report = FaceReport::default();

    for detection in &detections {
        let rect = detection.bbox.to_pixels();
        report.detected.push(rect);

        let result = match embed_face(image, rect, embedder) {
            Ok(embedding) => matcher.compare(&embedding, roster, threshold),
            Err(err) => {
                tracing::warn!(error = %err, ?rect, "face recognition failed");
                continue;
            }
        };

        let (Some(user_id), Some(name)) = (result.user_id, result.user_name) else {
            tracing::debug!(?rect, similarity = result.similarity, "face not recognised");
            continue;
        };

        match report.recognized.iter().position(|r| r.name == name) {
            Some(idx) if report.recognized[idx].similarity < result.similarity => {
                tracing::info!(%name, similarity = result.similarity, "better box for known face");
                let existing = &mut report.recognized[idx];
                existing.rect = rect;
                existing.similarity = result.similarity;
                existing.user_id = user_id.clone();
                report.identities.insert(user_id, name);
            }
            Some(_) => {}
            None => {
                tracing::info!(%name, similarity = result.similarity, "face recognised");
                report.identities.insert(user_id.clone(), name.clone());
                report.recognized.push(RecognizedFace {
                    user_id,
                    name,
                    rect,
                    similarity: result.similarity,
                });
            }
        }
    }

    Ok(report)
}

fn embed_face(
    image: &RgbImage,
    rect: PixelRect,
    embedder: &mut dyn FaceEmbedder,
) -> Result<Embedding, FaceError> {
    let face = rect.crop_from(image).ok_or(FaceError::EmptyCrop(rect))?;
    Ok(embedder.embed(&face)?)
}
