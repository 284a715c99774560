//! Colour adjustments and effects.

use crate::convolve;
use crate::pixel::{clamp_u8, luma};
use image::RgbaImage;
use serde::{Deserialize, Serialize};

/// A stack of filters applied in a fixed order: tone (brightness, contrast,
/// saturation, hue), then colour effects (sepia, grayscale, invert), then
/// blur and sharpen.
///
/// Zero/false fields are skipped. Out-of-range values are clamped.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Filters {
    /// -100..=100
    pub brightness: f32,
    /// -100..=100
    pub contrast: f32,
    /// -100..=100; -100 is fully desaturated.
    pub saturation: f32,
    /// Hue rotation in degrees, -180..=180.
    pub hue: f32,
    /// Gaussian blur radius in pixels.
    pub blur: u32,
    pub sharpen: bool,
    pub sepia: bool,
    pub grayscale: bool,
    pub invert: bool,
}
impl Filters {
    #[must_use]
    pub fn is_noop(&self) -> bool {
        *self == Self::default()
    }

    pub fn apply(&self, image: &RgbaImage) -> RgbaImage {
        let brightness = self.brightness.clamp(-100.0, 100.0) * 2.55;
        let contrast = {
            let c = self.contrast.clamp(-100.0, 100.0) * 2.55;
            (259.0 * (c + 255.0)) / (255.0 * (259.0 - c))
        };
        let saturation = 1.0 + self.saturation.clamp(-100.0, 100.0) / 100.0;
        let hue = self.hue.clamp(-180.0, 180.0);

        let mut out = image.clone();
        for px in out.pixels_mut() {
            let [r, g, b, _] = &mut px.0;
            let mut rgb = [f32::from(*r), f32::from(*g), f32::from(*b)];
            if brightness != 0.0 {
                rgb = rgb.map(|c| c + brightness);
            }
            if self.contrast != 0.0 {
                rgb = rgb.map(|c| contrast * (c - 128.0) + 128.0);
            }
            if saturation != 1.0 {
                let y = luma(rgb[0], rgb[1], rgb[2]);
                rgb = rgb.map(|c| y + (c - y) * saturation);
            }
            if hue != 0.0 {
                rgb = rotate_hue(rgb.map(|c| c.clamp(0.0, 255.0)), hue);
            }
            if self.sepia {
                let [r, g, b] = rgb;
                rgb = [
                    0.393 * r + 0.769 * g + 0.189 * b,
                    0.349 * r + 0.686 * g + 0.168 * b,
                    0.272 * r + 0.534 * g + 0.131 * b,
                ];
            }
            if self.grayscale {
                rgb = [luma(rgb[0], rgb[1], rgb[2]); 3];
            }
            if self.invert {
                rgb = rgb.map(|c| 255.0 - c.clamp(0.0, 255.0));
            }
            [*r, *g, *b] = rgb.map(clamp_u8);
        }
        if self.blur > 0 {
            out = convolve::blur(&out, self.blur);
        }
        if self.sharpen {
            out = convolve::sharpen(&out);
        }
        out
    }
}

/// Rotate the hue of an RGB triple (0..=255 channels) by `degrees`, via HSL.
fn rotate_hue([r, g, b]: [f32; 3], degrees: f32) -> [f32; 3] {
    let (r, g, b) = (r / 255.0, g / 255.0, b / 255.0);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let l = (max + min) / 2.0;
    let d = max - min;
    if d == 0.0 {
        return [r * 255.0, g * 255.0, b * 255.0];
    }
    let s = if l > 0.5 { d / (2.0 - max - min) } else { d / (max + min) };
    let sector = if max == r {
        ((g - b) / d).rem_euclid(6.0)
    } else if max == g {
        (b - r) / d + 2.0
    } else {
        (r - g) / d + 4.0
    };
    let h = (sector * 60.0 + degrees).rem_euclid(360.0);

    let c = (1.0 - (2.0 * l - 1.0).abs()) * s;
    let x = c * (1.0 - ((h / 60.0).rem_euclid(2.0) - 1.0).abs());
    let m = l - c / 2.0;
    let (r, g, b) = match (h / 60.0) as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    [(r + m) * 255.0, (g + m) * 255.0, (b + m) * 255.0]
}
