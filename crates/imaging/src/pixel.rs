//! Small per-pixel helpers shared by the processors.

use image::{Rgb, RgbImage, RgbaImage};

/// Premultiply straight-alpha RGBA8 in place.
pub(crate) fn premultiply(data: &mut [u8]) {
    for px in data.chunks_exact_mut(4) {
        let a = u16::from(px[3]);
        if a == 255 {
            continue;
        }
        for c in &mut px[..3] {
            *c = ((u16::from(*c) * a + 127) / 255) as u8;
        }
    }
}

/// Undo [`premultiply`] in place.
pub(crate) fn demultiply(data: &mut [u8]) {
    for px in data.chunks_exact_mut(4) {
        let a = u16::from(px[3]);
        match a {
            255 => {},
            0 => px[..3].fill(0),
            _ => {
                for c in &mut px[..3] {
                    *c = ((u16::from(*c) * 255 + a / 2) / a).min(255) as u8;
                }
            },
        }
    }
}

/// Source-over composite of a premultiplied `layer` onto straight-alpha
/// `base`, both the same size.
pub(crate) fn composite_premultiplied(base: &mut RgbaImage, layer: &[u8]) {
    for (dst, src) in base.as_mut().chunks_exact_mut(4).zip(layer.chunks_exact(4)) {
        let sa = u32::from(src[3]);
        if sa == 0 {
            continue;
        }
        let da = u32::from(dst[3]);
        let inv = 255 - sa;
        // Work in premultiplied space, then convert back.
        let out_a = sa + (da * inv + 127) / 255;
        for i in 0..3 {
            let d = (u32::from(dst[i]) * da + 127) / 255;
            let c = u32::from(src[i]) + (d * inv + 127) / 255;
            dst[i] = if out_a == 0 { 0 } else { ((c * 255 + out_a / 2) / out_a).min(255) as u8 };
        }
        dst[3] = out_a.min(255) as u8;
    }
}

/// Drop the alpha channel, blending translucent pixels onto white.
pub(crate) fn flatten_onto_white(image: &RgbaImage) -> RgbImage {
    RgbImage::from_fn(image.width(), image.height(), |x, y| {
        let [r, g, b, a] = image.get_pixel(x, y).0;
        let a = u32::from(a);
        let blend = |c: u8| ((u32::from(c) * a + 255 * (255 - a) + 127) / 255) as u8;
        Rgb([blend(r), blend(g), blend(b)])
    })
}

/// Rec.601 luma of an RGB triple.
#[inline]
pub(crate) fn luma(r: f32, g: f32, b: f32) -> f32 {
    0.299 * r + 0.587 * g + 0.114 * b
}

#[inline]
pub(crate) fn clamp_u8(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_premultiply_round_trip_keeps_opaque_and_clears_transparent() {
        let mut data = vec![200, 100, 50, 255, 200, 100, 50, 0, 200, 100, 50, 128];
        premultiply(&mut data);
        assert_eq!(&data[..4], &[200, 100, 50, 255]);
        assert_eq!(&data[4..8], &[0, 0, 0, 0]);
        assert_eq!(&data[8..12], &[100, 50, 25, 128]);
        demultiply(&mut data);
        assert_eq!(&data[..4], &[200, 100, 50, 255]);
        assert_eq!(&data[4..8], &[0, 0, 0, 0]);
        // Half alpha loses at most one step of precision.
        assert!(data[8].abs_diff(200) <= 1 && data[9].abs_diff(100) <= 1 && data[10].abs_diff(50) <= 1);
    }

    #[test]
    fn test_composite_opaque_layer_replaces_base() {
        let mut base = RgbaImage::from_pixel(2, 1, Rgba([0, 0, 255, 255]));
        let layer = [255, 0, 0, 255, 0, 0, 0, 0];
        composite_premultiplied(&mut base, &layer);
        assert_eq!(base.get_pixel(0, 0).0, [255, 0, 0, 255]);
        assert_eq!(base.get_pixel(1, 0).0, [0, 0, 255, 255]);
    }

    #[test]
    fn test_flatten_onto_white() {
        let image = RgbaImage::from_pixel(1, 1, Rgba([0, 0, 0, 0]));
        assert_eq!(flatten_onto_white(&image).get_pixel(0, 0).0, [255, 255, 255]);
    }
}
