//! Overlay recognition results onto the source image.

use crate::faces::FaceReport;
use crate::types::PixelRect;
use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use std::path::Path;

pub const RECOGNIZED_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
pub const UNRECOGNIZED_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const BOX_THICKNESS: i32 = 2;
const LABEL_SCALE: f32 = 24.0;
const LABEL_OFFSET: i32 = 10;
const UNRECOGNIZED_LABEL: &str = ".";

/// Optional font for box labels.
pub struct LabelFont {
    font: FontVec,
}

impl LabelFont {
    /// Load a TTF/OTF font file.
    pub fn load(path: &Path) -> Option<Self> {
        let bytes = match std::fs::read(path) {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "cannot read label font");
                return None;
            }
        };
        match FontVec::try_from_vec(bytes) {
            Ok(font) => Some(Self { font }),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "invalid label font");
                None
            }
        }
    }
}

/// Draw a `BOX_THICKNESS`-pixel hollow rectangle.
pub fn draw_box(image: &mut RgbImage, rect: PixelRect, color: Rgb<u8>) {
    for inset in 0..BOX_THICKNESS {
        let w = rect.width() as i32 - 2 * inset;
        let h = rect.height() as i32 - 2 * inset;
        if w <= 0 || h <= 0 {
            break;
        }
        let r = Rect::at(rect.x1 + inset, rect.y1 + inset).of_size(w as u32, h as u32);
        draw_hollow_rect_mut(image, r, color);
    }
}

fn draw_label(image: &mut RgbImage, rect: PixelRect, text: &str, color: Rgb<u8>, font: Option<&LabelFont>) {
    let Some(font) = font else {
        return;
    };
    let y = (rect.y1 - LABEL_OFFSET - LABEL_SCALE as i32).max(0);
    draw_text_mut(image, color, rect.x1, y, PxScale::from(LABEL_SCALE), &font.font, text);
}

/// Draw recognised faces in green with their names and the rest in red.
pub fn annotate_faces(image: &mut RgbImage, report: &FaceReport, font: Option<&LabelFont>) {
    for face in &report.recognized {
        draw_box(image, face.rect, RECOGNIZED_COLOR);
        draw_label(image, face.rect, &face.name, RECOGNIZED_COLOR, font);
    }
    for rect in report.unrecognized() {
        draw_box(image, *rect, UNRECOGNIZED_COLOR);
        draw_label(image, *rect, UNRECOGNIZED_LABEL, UNRECOGNIZED_COLOR, font);
    }
}
