//! Plate crop enhancement: grayscale, CLAHE, sharpen, bilateral denoise.

use image::{GrayImage, RgbImage};
use imageproc::filter::{bilateral_filter, sharpen3x3};

const CLAHE_CLIP_LIMIT: f32 = 3.0;
const CLAHE_TILES: u32 = 8;
const BILATERAL_DIAMETER: u32 = 9;
const BILATERAL_SIGMA_COLOR: f32 = 75.0;
const BILATERAL_SIGMA_SPACE: f32 = 75.0;

/// Run the full enhancement chain on a plate crop.
///
/// The sharpen step is the `[[0,-1,0],[-1,5,-1],[0,-1,0]]` kernel with
/// replicated borders.
pub fn enhance_plate(plate: &RgbImage) -> GrayImage {
    let mut gray = image::imageops::grayscale(plate);
    let (w, h) = gray.dimensions();
    if w == 0 || h == 0 {
        return gray;
    }
    clahe_enhance(&mut gray, w, h, CLAHE_TILES, CLAHE_CLIP_LIMIT);
    let sharpened = sharpen3x3(&gray);
    bilateral_filter(&sharpened, BILATERAL_DIAMETER, BILATERAL_SIGMA_COLOR, BILATERAL_SIGMA_SPACE)
}

/// Apply Contrast-Limited Adaptive Histogram Equalization (CLAHE) in-place.
///
/// `clip_limit` is relative to a flat histogram: each bin is capped at
/// `clip_limit * tile_pixels / 256` before the excess is redistributed.
/// Tile CDFs are blended bilinearly. The grid shrinks for tiny crops.
pub fn clahe_enhance(gray: &mut [u8], width: u32, height: u32, tiles: u32, clip_limit: f32) {
    let w = width as usize;
    let h = height as usize;
    if w == 0 || h == 0 || gray.len() < w * h {
        return;
    }

    let tiles = (tiles as usize).min(w).min(h).max(1);
    let (tx, ty) = (tiles, tiles);
    let tile_w = w / tx;
    let tile_h = h / ty;
    let tile_pixels = tile_w * tile_h;
    let clip = ((clip_limit * tile_pixels as f32 / 256.0) as u32).max(1);

    let mut cdfs: Vec<[f32; 256]> = Vec::with_capacity(tx * ty);

    for row in 0..ty {
        for col in 0..tx {
            let mut hist = [0u32; 256];
            let y0 = row * tile_h;
            let x0 = col * tile_w;

            for y in y0..y0 + tile_h {
                for x in x0..x0 + tile_w {
                    hist[gray[y * w + x] as usize] += 1;
                }
            }

            let mut excess = 0u32;
            for bin in hist.iter_mut() {
                if *bin > clip {
                    excess += *bin - clip;
                    *bin = clip;
                }
            }
            let redist = excess / 256;
            let leftover = (excess % 256) as usize;
            for (i, bin) in hist.iter_mut().enumerate() {
                *bin += redist;
                if i < leftover {
                    *bin += 1;
                }
            }

            let mut cdf = [0f32; 256];
            let mut running = 0u32;
            for (i, &count) in hist.iter().enumerate() {
                running += count;
                cdf[i] = running as f32 * 255.0 / tile_pixels as f32;
            }
            cdfs.push(cdf);
        }
    }

    for y in 0..h {
        for x in 0..w {
            let pixel = gray[y * w + x] as usize;

            let fy = ((y as f32 / tile_h as f32) - 0.5).clamp(0.0, (ty - 1) as f32);
            let fx = ((x as f32 / tile_w as f32) - 0.5).clamp(0.0, (tx - 1) as f32);

            let r0 = fy as usize;
            let c0 = fx as usize;
            let r1 = (r0 + 1).min(ty - 1);
            let c1 = (c0 + 1).min(tx - 1);

            let dy = fy - r0 as f32;
            let dx = fx - c0 as f32;

            let top = cdfs[r0 * tx + c0][pixel] * (1.0 - dx) + cdfs[r0 * tx + c1][pixel] * dx;
            let bot = cdfs[r1 * tx + c0][pixel] * (1.0 - dx) + cdfs[r1 * tx + c1][pixel] * dx;
            let val = top * (1.0 - dy) + bot * dy;

            gray[y * w + x] = val.round().clamp(0.0, 255.0) as u8;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgb};

    fn stddev(data: &[u8]) -> f32 {
        let n = data.len() as f32;
        let mean = data.iter().map(|&b| b as f32).sum::<f32>() / n;
        let variance = data.iter().map(|&b| (b as f32 - mean).powi(2)).sum::<f32>() / n;
        variance.sqrt()
    }

    #[test]
    fn test_clahe_increases_contrast() {
        // Low-contrast 64x64 image: all pixels between 100–110
        let w = 64u32;
        let h = 64u32;
        let mut gray: Vec<u8> = (0..(w * h) as usize).map(|i| 100 + (i % 11) as u8).collect();

        let orig_stddev = stddev(&gray);
        clahe_enhance(&mut gray, w, h, 8, 3.0);
        let new_stddev = stddev(&gray);

        assert!(
            new_stddev > orig_stddev,
            "CLAHE should increase contrast: orig={orig_stddev:.2}, new={new_stddev:.2}"
        );
    }

    #[test]
    fn test_clahe_tiny_image_does_not_panic() {
        let mut gray = vec![10u8, 200, 30, 90, 120, 255];
        clahe_enhance(&mut gray, 3, 2, 8, 3.0);
        clahe_enhance(&mut [], 0, 0, 8, 3.0);
    }

    #[test]
    fn test_bilateral_settings_preserve_strong_edge() {
        // Left half 20, right half 230: a 210-step edge is far outside sigma_color
        let gray = GrayImage::from_fn(20, 10, |x, _| if x < 10 { Luma([20]) } else { Luma([230]) });
        let out = bilateral_filter(&gray, BILATERAL_DIAMETER, BILATERAL_SIGMA_COLOR, BILATERAL_SIGMA_SPACE);
        assert!(out.get_pixel(9, 5)[0] < 40, "dark side bled: {}", out.get_pixel(9, 5)[0]);
        assert!(out.get_pixel(10, 5)[0] > 210, "bright side bled: {}", out.get_pixel(10, 5)[0]);
    }

    #[test]
    fn test_bilateral_settings_smooth_noise() {
        let gray = GrayImage::from_fn(15, 15, |x, y| Luma([if (x + y) % 2 == 0 { 120 } else { 130 }]));
        let out = bilateral_filter(&gray, BILATERAL_DIAMETER, BILATERAL_SIGMA_COLOR, BILATERAL_SIGMA_SPACE);
        assert!(stddev(out.as_raw()) < stddev(gray.as_raw()));
    }

    #[test]
    fn test_enhance_plate_empty_crop() {
        let enhanced = enhance_plate(&RgbImage::new(0, 0));
        assert_eq!(enhanced.dimensions(), (0, 0));
    }

    #[test]
    fn test_enhance_plate_keeps_dark_glyph_on_light_plate() {
        let plate = RgbImage::from_fn(40, 20, |x, _| {
            if (15..25).contains(&x) { Rgb([30, 30, 30]) } else { Rgb([220, 220, 220]) }
        });
        let enhanced = enhance_plate(&plate);
        assert!(enhanced.get_pixel(20, 10)[0] < enhanced.get_pixel(5, 10)[0]);
    }

    #[test]
    fn test_enhance_plate_output_dimensions() {
        let plate = RgbImage::from_fn(48, 16, |x, _| Rgb([(x * 5) as u8, 80, 40]));
        let enhanced = enhance_plate(&plate);
        assert_eq!(enhanced.dimensions(), (48, 16));
    }
}
