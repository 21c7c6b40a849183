use image::RgbImage;
use serde::{Deserialize, Serialize};

/// Axis-aligned detection box in source-image pixels (top-left, bottom-right).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub confidence: f32,
}

impl BoundingBox {
    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    /// Integer pixel corners, truncated toward zero.
    pub fn to_pixels(&self) -> PixelRect {
        PixelRect {
            x1: self.x1 as i32,
            y1: self.y1 as i32,
            x2: self.x2 as i32,
            y2: self.y2 as i32,
        }
    }

    /// Compute Intersection-over-Union with another box.
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let x1 = self.x1.max(other.x1);
        let y1 = self.y1.max(other.y1);
        let x2 = self.x2.min(other.x2);
        let y2 = self.y2.min(other.y2);

        let inter_area = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
        let union_area = self.width() * self.height() + other.width() * other.height() - inter_area;

        if union_area > 0.0 {
            inter_area / union_area
        } else {
            0.0
        }
    }
}

/// Integer box used for cropping and drawing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PixelRect {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl PixelRect {
    /// Clamp to `[0, width] x [0, height]`. Returns `None` when nothing is left.
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<PixelRect> {
        let x1 = self.x1.clamp(0, width as i32);
        let y1 = self.y1.clamp(0, height as i32);
        let x2 = self.x2.clamp(0, width as i32);
        let y2 = self.y2.clamp(0, height as i32);
        if x2 <= x1 || y2 <= y1 {
            return None;
        }
        Some(PixelRect { x1, y1, x2, y2 })
    }

    /// Grow by `padding` pixels on every side, clamped to the image.
    pub fn pad(&self, padding: u32, width: u32, height: u32) -> PixelRect {
        let p = padding as i32;
        PixelRect {
            x1: (self.x1 - p).max(0),
            y1: (self.y1 - p).max(0),
            x2: (self.x2 + p).min(width as i32),
            y2: (self.y2 + p).min(height as i32),
        }
    }

    /// Copy the pixels under this rect, clamped to the image.
    pub fn crop_from(&self, image: &RgbImage) -> Option<RgbImage> {
        let r = self.clamp_to(image.width(), image.height())?;
        Some(image::imageops::crop_imm(image, r.x1 as u32, r.y1 as u32, r.width(), r.height()).to_image())
    }

    pub fn width(&self) -> u32 {
        (self.x2 - self.x1).max(0) as u32
    }

    pub fn height(&self) -> u32 {
        (self.y2 - self.y1).max(0) as u32
    }
}

/// One object found by a detector: a box plus the winning class index.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub class_id: usize,
}

/// Face embedding vector (512-dimensional for ArcFace).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    pub values: Vec<f32>,
}

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    /// Compute cosine similarity between two embeddings.
    ///
    /// Returns a value in [-1, 1]. Higher = more similar. A zero vector
    /// is similar to nothing (0.0). Embeddings of different dimensions
    /// are not comparable and yield `None`.
    pub fn similarity(&self, other: &Embedding) -> Option<f32> {
        if self.values.len() != other.values.len() {
            return None;
        }

        let mut dot = 0.0f32;
        let mut norm_a = 0.0f32;
        let mut norm_b = 0.0f32;

        for (a, b) in self.values.iter().zip(other.values.iter()) {
            dot += a * b;
            norm_a += a * a;
            norm_b += b * b;
        }

        let denom = norm_a.sqrt() * norm_b.sqrt();
        Some(if denom > 0.0 { dot / denom } else { 0.0 })
    }
}

/// A known user from the caller-supplied roster.
#[derive(Debug, Clone)]
pub struct RosterEntry {
    pub id: String,
    /// Display name, `"{firstname} {lastname}"`.
    pub name: String,
    pub embedding: Embedding,
}

/// Result of matching a probe embedding against the roster.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub matched: bool,
    /// Best similarity seen, floored at 0.0.
    pub similarity: f32,
    /// ID of the matched user (if any).
    pub user_id: Option<String>,
    /// Display name of the matched user (if any).
    pub user_name: Option<String>,
}

impl MatchResult {
    fn no_match(similarity: f32) -> Self {
        Self {
            matched: false,
            similarity,
            user_id: None,
            user_name: None,
        }
    }
}

/// Strategy for comparing a probe embedding against the roster.
pub trait Matcher {
    fn compare(&self, probe: &Embedding, roster: &[RosterEntry], threshold: f32) -> MatchResult;
}

/// Cosine similarity matcher.
///
/// The running best starts at 0.0 and only a strictly greater similarity
/// replaces it, so the first entry wins an exact tie and non-positive
/// similarities never match. A match also needs `best > threshold`.
/// Entries of a different dimension than the probe are skipped.
pub struct CosineMatcher;

impl Matcher for CosineMatcher {
    fn compare(&self, probe: &Embedding, roster: &[RosterEntry], threshold: f32) -> MatchResult {
        let mut best_sim = 0.0f32;
        let mut best_idx: Option<usize> = None;

        for (i, entry) in roster.iter().enumerate() {
            let Some(sim) = probe.similarity(&entry.embedding) else {
                tracing::warn!(
                    id = %entry.id,
                    probe_dim = probe.values.len(),
                    roster_dim = entry.embedding.values.len(),
                    "skipping roster entry with mismatched embedding size"
                );
                continue;
            };
            if sim > best_sim {
                best_sim = sim;
                best_idx = Some(i);
            }
        }

        match best_idx {
            Some(idx) if best_sim > threshold => MatchResult {
                matched: true,
                similarity: best_sim,
                user_id: Some(roster[idx].id.clone()),
                user_name: Some(roster[idx].name.clone()),
            },
            _ => MatchResult::no_match(best_sim),
        }
    }
}
