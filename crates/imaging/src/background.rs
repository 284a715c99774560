//! Flat background removal.
//!
//! The background colour is taken to be the per-channel median of the border
//! pixels. Everything reachable from the border through pixels within
//! `tolerance` of that colour is made transparent.

use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoveBackground {
    /// Maximum Euclidean RGB distance from the background colour, 0..=255.
    pub tolerance: u8,
}
impl Default for RemoveBackground {
    fn default() -> Self {
        Self { tolerance: 32 }
    }
}
impl RemoveBackground {
    pub fn apply(&self, image: &RgbaImage) -> RgbaImage {
        let (width, height) = image.dimensions();
        let mut out = image.clone();
        if width == 0 || height == 0 {
            return out;
        }
        let background = border_median(image);
        let limit = u32::from(self.tolerance).pow(2);
        let matches = |x: u32, y: u32| {
            let px = image.get_pixel(x, y).0;
            px[3] == 0 || distance_sq([px[0], px[1], px[2]], background) <= limit
        };

        let idx = |x: u32, y: u32| (y as usize) * (width as usize) + x as usize;
        let mut visited = vec![false; width as usize * height as usize];
        let mut queue = VecDeque::new();
        for (x, y) in border(width, height) {
            if !visited[idx(x, y)] && matches(x, y) {
                visited[idx(x, y)] = true;
                queue.push_back((x, y));
            }
        }
        let mut cleared = 0usize;
        while let Some((x, y)) = queue.pop_front() {
            out.get_pixel_mut(x, y).0[3] = 0;
            cleared += 1;
            let neighbours = [
                (x.checked_sub(1), Some(y)),
                (x.checked_add(1).filter(|&nx| nx < width), Some(y)),
                (Some(x), y.checked_sub(1)),
                (Some(x), y.checked_add(1).filter(|&ny| ny < height)),
            ];
            for (nx, ny) in neighbours {
                let (Some(nx), Some(ny)) = (nx, ny) else { continue };
                if !visited[idx(nx, ny)] && matches(nx, ny) {
                    visited[idx(nx, ny)] = true;
                    queue.push_back((nx, ny));
                }
            }
        }
        tracing::debug!(?background, cleared, total = visited.len(), "Background removed");
        out
    }
}

fn border(width: u32, height: u32) -> impl Iterator<Item = (u32, u32)> {
    let horizontal = (0..width).flat_map(move |x| [(x, 0), (x, height - 1)]);
    let vertical = (0..height).flat_map(move |y| [(0, y), (width - 1, y)]);
    horizontal.chain(vertical)
}

fn border_median(image: &RgbaImage) -> [u8; 3] {
    let mut channels: [Vec<u8>; 3] = Default::default();
    for (x, y) in border(image.width(), image.height()) {
        let px = image.get_pixel(x, y).0;
        for (c, values) in channels.iter_mut().enumerate() {
            values.push(px[c]);
        }
    }
    channels.map(|mut values| {
        values.sort_unstable();
        values[values.len() / 2]
    })
}

fn distance_sq(a: [u8; 3], b: [u8; 3]) -> u32 {
    a.iter().zip(b).map(|(&a, b)| u32::from(a.abs_diff(b)).pow(2)).sum()
}
