//! Fixed-point convolution: separable Gaussian blur and 3x3 sharpen.
//!
//! Blurring happens on premultiplied pixels so transparent neighbours don't
//! bleed their (meaningless) colour into visible edges.

use crate::pixel;
use image::RgbaImage;

/// Largest blur radius accepted; anything bigger is clamped.
pub const MAX_BLUR_RADIUS: u32 = 64;

const ONE_Q16: u32 = 1 << 16;
const SHARPEN: [i32; 9] = [0, -1, 0, -1, 5, -1, 0, -1, 0];

#[derive(Clone, Copy)]
enum Axis {
    Horizontal,
    Vertical,
}

/// Gaussian blur with the given pixel radius.
pub fn blur(image: &RgbaImage, radius: u32) -> RgbaImage {
    let radius = radius.min(MAX_BLUR_RADIUS);
    if radius == 0 || image.width() == 0 || image.height() == 0 {
        return image.clone();
    }
    let (width, height) = image.dimensions();
    let kernel = gaussian_kernel_q16(radius, (radius as f32 / 2.0).max(0.5));
    let mut src = image.as_raw().clone();
    pixel::premultiply(&mut src);
    let mut tmp = vec![0u8; src.len()];
    pass(&src, &mut tmp, width, height, &kernel, Axis::Horizontal);
    pass(&tmp, &mut src, width, height, &kernel, Axis::Vertical);
    pixel::demultiply(&mut src);
    // Buffer length is unchanged from the input, so this can't fail.
    RgbaImage::from_raw(width, height, src).unwrap_or_else(|| image.clone())
}

/// Normalized Gaussian weights in Q16 that sum to exactly `1 << 16`.
fn gaussian_kernel_q16(radius: u32, sigma: f32) -> Vec<u32> {
    let r = radius as i32;
    let denom = 2.0 * f64::from(sigma) * f64::from(sigma);
    let raw: Vec<f64> = (-r..=r).map(|i| (-(f64::from(i) * f64::from(i)) / denom).exp()).collect();
    let sum: f64 = raw.iter().sum();
    let mut weights: Vec<u32> = raw.iter().map(|w| ((w / sum) * f64::from(ONE_Q16)).round() as u32).collect();
    // Push rounding drift into the centre tap so flat regions stay flat.
    let total: i64 = weights.iter().map(|&w| i64::from(w)).sum();
    let mid = weights.len() / 2;
    weights[mid] = (i64::from(weights[mid]) + i64::from(ONE_Q16) - total).clamp(0, i64::from(ONE_Q16)) as u32;
    weights
}

fn pass(src: &[u8], dst: &mut [u8], width: u32, height: u32, kernel: &[u32], axis: Axis) {
    let (w, h) = (width as i64, height as i64);
    let radius = (kernel.len() / 2) as i64;
    for y in 0..h {
        for x in 0..w {
            let mut acc = [0u64; 4];
            for (k, &weight) in kernel.iter().enumerate() {
                let offset = k as i64 - radius;
                let (sx, sy) = match axis {
                    Axis::Horizontal => ((x + offset).clamp(0, w - 1), y),
                    Axis::Vertical => (x, (y + offset).clamp(0, h - 1)),
                };
                let idx = ((sy * w + sx) * 4) as usize;
                for (c, a) in acc.iter_mut().enumerate() {
                    *a += u64::from(weight) * u64::from(src[idx + c]);
                }
            }
            let out = ((y * w + x) * 4) as usize;
            for (c, a) in acc.into_iter().enumerate() {
                dst[out + c] = ((a + (1 << 15)) >> 16).min(255) as u8;
            }
        }
    }
}

/// Apply the 3x3 sharpen kernel to the colour channels. Alpha is untouched
/// and edge pixels are clamped.
pub fn sharpen(image: &RgbaImage) -> RgbaImage {
    let (width, height) = image.dimensions();
    let (w, h) = (width as i64, height as i64);
    let mut out = image.clone();
    for y in 0..h {
        for x in 0..w {
            let mut acc = [0i32; 3];
            for (k, &weight) in SHARPEN.iter().enumerate() {
                if weight == 0 {
                    continue;
                }
                let sx = (x + k as i64 % 3 - 1).clamp(0, w - 1);
                let sy = (y + k as i64 / 3 - 1).clamp(0, h - 1);
                let px = image.get_pixel(sx as u32, sy as u32).0;
                for (c, a) in acc.iter_mut().enumerate() {
                    *a += weight * i32::from(px[c]);
                }
            }
            let px = out.get_pixel_mut(x as u32, y as u32);
            for (c, a) in acc.into_iter().enumerate() {
                px.0[c] = a.clamp(0, 255) as u8;
            }
        }
    }
    out
}
