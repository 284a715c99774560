//! Dominant colour extraction by median cut.

use image::RgbaImage;
use serde::{Deserialize, Serialize};

/// Cap on the number of pixels considered; larger images are sampled evenly.
const MAX_SAMPLES: usize = 65_536;
/// Pixels at least this transparent don't count towards the palette.
const MIN_ALPHA: u8 = 128;

/// One palette entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Swatch {
    /// `#rrggbb`
    pub hex: String,
    pub rgb: [u8; 3],
    /// Number of sampled pixels this swatch stands for.
    pub population: usize,
}
impl Swatch {
    fn new(pixels: &[[u8; 3]]) -> Self {
        let mut sum = [0u64; 3];
        for px in pixels {
            for (s, &c) in sum.iter_mut().zip(px) {
                *s += u64::from(c);
            }
        }
        let n = pixels.len().max(1) as u64;
        let rgb = sum.map(|s| ((s + n / 2) / n) as u8);
        Self { hex: format!("#{:02x}{:02x}{:02x}", rgb[0], rgb[1], rgb[2]), rgb, population: pixels.len() }
    }
}

/// Extract up to `count` dominant colours, most populous first.
///
/// Fully transparent images give an empty palette.
#[tracing::instrument(skip(image), fields(width = image.width(), height = image.height()))]
pub fn extract(image: &RgbaImage, count: usize) -> Vec<Swatch> {
    let total = image.width() as usize * image.height() as usize;
    let step = total.div_ceil(MAX_SAMPLES).max(1);
    let pixels: Vec<[u8; 3]> =
        image.pixels().step_by(step).filter(|px| px.0[3] >= MIN_ALPHA).map(|px| [px.0[0], px.0[1], px.0[2]]).collect();
    if pixels.is_empty() || count == 0 {
        return vec![];
    }

    let mut boxes = vec![pixels];
    while boxes.len() < count {
        // Split the box with the widest channel range; stop once nothing can
        // be split further.
        let Some((index, channel)) = boxes
            .iter()
            .enumerate()
            .filter(|(_, b)| b.len() > 1)
            .map(|(i, b)| {
                let (channel, range) = widest_channel(b);
                (i, channel, range)
            })
            .filter(|&(_, _, range)| range > 0)
            .max_by_key(|&(_, _, range)| range)
            .map(|(i, channel, _)| (i, channel))
        else {
            break;
        };
        let mut target = boxes.swap_remove(index);
        target.sort_unstable_by_key(|px| px[channel]);
        let upper = target.split_off(target.len() / 2);
        boxes.push(target);
        boxes.push(upper);
    }

    // Boxes split from a flat region average to the same colour; merge them.
    let mut swatches: Vec<Swatch> = Vec::with_capacity(boxes.len());
    for swatch in boxes.iter().map(|b| Swatch::new(b)) {
        match swatches.iter_mut().find(|s| s.rgb == swatch.rgb) {
            Some(existing) => existing.population += swatch.population,
            None => swatches.push(swatch),
        }
    }
    swatches.sort_by(|a, b| b.population.cmp(&a.population).then_with(|| a.hex.cmp(&b.hex)));
    swatches
}

fn widest_channel(pixels: &[[u8; 3]]) -> (usize, u8) {
    (0..3)
        .map(|c| {
            let (min, max) = pixels.iter().fold((u8::MAX, u8::MIN), |(lo, hi), px| (lo.min(px[c]), hi.max(px[c])));
            (c, max - min)
        })
        .max_by_key(|&(_, range)| range)
        .unwrap_or((0, 0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn two_tone() -> RgbaImage {
        // 3/4 red, 1/4 blue.
        RgbaImage::from_fn(8, 8, |x, _| match x < 6 {
            true => Rgba([255, 0, 0, 255]),
            false => Rgba([0, 0, 255, 255]),
        })
    }

    #[test]
    fn test_extract_two_colours_most_populous_first() {
        let swatches = extract(&two_tone(), 5);
        assert_eq!(swatches[0].hex, "#ff0000");
        assert_eq!(swatches[0].population, 48);
        assert_eq!(swatches[1].hex, "#0000ff");
        assert_eq!(swatches.len(), 2);
        assert_eq!(swatches.iter().map(|s| s.population).sum::<usize>(), 64);
    }

    #[test]
    fn test_extract_respects_count() {
        let image = RgbaImage::from_fn(16, 16, |x, y| Rgba([(x * 16) as u8, (y * 16) as u8, 0, 255]));
        assert_eq!(extract(&image, 3).len(), 3);
        assert_eq!(extract(&image, 0).len(), 0);
    }

    #[test]
    fn test_extract_single_colour() {
        let image = RgbaImage::from_pixel(4, 4, Rgba([1, 2, 3, 255]));
        let swatches = extract(&image, 5);
        assert_eq!(swatches, vec![Swatch { hex: "#010203".to_string(), rgb: [1, 2, 3], population: 16 }]);
    }

    #[test]
    fn test_extract_ignores_transparent() {
        let image = RgbaImage::from_pixel(4, 4, Rgba([255, 255, 255, 0]));
        assert!(extract(&image, 5).is_empty());
    }
}
