//! Resizing, cropping and social media presets.

use crate::error::{ErrorKind, Result};
use image::DynamicImage;
use image::imageops::FilterType;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// Upper bound on any output dimension.
pub const MAX_DIMENSION: u32 = 16_384;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "kebab-case")]
pub enum Resize {
    /// Stretch to exactly `width`x`height`.
    Exact { width: u32, height: u32 },
    /// Scale down or up to fit inside the box, keeping the aspect ratio.
    Fit { width: u32, height: u32 },
    /// Fill the box, keeping the aspect ratio, and centre-crop the overflow.
    Cover { width: u32, height: u32 },
    /// Scale both dimensions by a percentage.
    Percent { percent: f32 },
}
impl Resize {
    pub fn apply(&self, image: &DynamicImage) -> Result<DynamicImage> {
        Ok(match *self {
            Self::Exact { width, height } => {
                check_dimensions(width, height)?;
                image.resize_exact(width, height, FilterType::Lanczos3)
            },
            Self::Fit { width, height } => {
                check_dimensions(width, height)?;
                image.resize(width, height, FilterType::Lanczos3)
            },
            Self::Cover { width, height } => {
                check_dimensions(width, height)?;
                image.resize_to_fill(width, height, FilterType::Lanczos3)
            },
            Self::Percent { percent } => {
                if !percent.is_finite() || percent <= 0.0 {
                    exn::bail!(ErrorKind::InvalidParameter(format!("resize percentage must be positive, got {percent}")));
                }
                let scale = |v: u32| ((v as f32 * percent / 100.0).round() as u32).max(1);
                let (width, height) = (scale(image.width()), scale(image.height()));
                check_dimensions(width, height)?;
                image.resize_exact(width, height, FilterType::Lanczos3)
            },
        })
    }
}

fn check_dimensions(width: u32, height: u32) -> Result<()> {
    if width == 0 || height == 0 {
        exn::bail!(ErrorKind::InvalidParameter(format!("dimensions must be non-zero, got {width}x{height}")));
    }
    if width > MAX_DIMENSION || height > MAX_DIMENSION {
        exn::bail!(ErrorKind::InvalidParameter(format!(
            "dimensions exceed {MAX_DIMENSION}x{MAX_DIMENSION}, got {width}x{height}"
        )));
    }
    Ok(())
}

/// A sub-rectangle to keep. Anything hanging over the image edge is clipped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Crop {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}
impl Crop {
    pub fn apply(&self, image: &DynamicImage) -> Result<DynamicImage> {
        let width = self.width.min(image.width().saturating_sub(self.x));
        let height = self.height.min(image.height().saturating_sub(self.y));
        if width == 0 || height == 0 {
            exn::bail!(ErrorKind::InvalidParameter(format!(
                "crop {}x{}+{}+{} does not overlap the {}x{} image",
                self.width,
                self.height,
                self.x,
                self.y,
                image.width(),
                image.height()
            )));
        }
        Ok(image.crop_imm(self.x, self.y, width, height))
    }
}

/// Named output sizes for social networks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SocialPreset {
    InstagramSquare,
    InstagramPortrait,
    InstagramStory,
    FacebookCover,
    TwitterPost,
    TwitterHeader,
    LinkedinBanner,
    YoutubeThumbnail,
    PinterestPin,
}
impl SocialPreset {
    pub const ALL: [SocialPreset; 9] = [
        SocialPreset::InstagramSquare,
        SocialPreset::InstagramPortrait,
        SocialPreset::InstagramStory,
        SocialPreset::FacebookCover,
        SocialPreset::TwitterPost,
        SocialPreset::TwitterHeader,
        SocialPreset::LinkedinBanner,
        SocialPreset::YoutubeThumbnail,
        SocialPreset::PinterestPin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InstagramSquare => "instagram-square",
            Self::InstagramPortrait => "instagram-portrait",
            Self::InstagramStory => "instagram-story",
            Self::FacebookCover => "facebook-cover",
            Self::TwitterPost => "twitter-post",
            Self::TwitterHeader => "twitter-header",
            Self::LinkedinBanner => "linkedin-banner",
            Self::YoutubeThumbnail => "youtube-thumbnail",
            Self::PinterestPin => "pinterest-pin",
        }
    }

    /// Target `(width, height)` in pixels.
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            Self::InstagramSquare => (1080, 1080),
            Self::InstagramPortrait => (1080, 1350),
            Self::InstagramStory => (1080, 1920),
            Self::FacebookCover => (820, 312),
            Self::TwitterPost => (1600, 900),
            Self::TwitterHeader => (1500, 500),
            Self::LinkedinBanner => (1584, 396),
            Self::YoutubeThumbnail => (1280, 720),
            Self::PinterestPin => (1000, 1500),
        }
    }

    pub fn apply(&self, image: &DynamicImage) -> Result<DynamicImage> {
        let (width, height) = self.dimensions();
        Resize::Cover { width, height }.apply(image)
    }
}
impl Display for SocialPreset {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}
impl FromStr for SocialPreset {
    type Err = crate::error::Error;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace('_', "-");
        match Self::ALL.into_iter().find(|preset| preset.as_str() == wanted) {
            Some(preset) => Ok(preset),
            None => exn::bail!(ErrorKind::InvalidParameter(format!("unknown preset: {s}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;
    use rstest::rstest;

    fn image(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::new(width, height))
    }

    #[rstest]
    #[case(Resize::Exact { width: 50, height: 10 }, (50, 10))]
    #[case(Resize::Fit { width: 50, height: 50 }, (50, 25))]
    #[case(Resize::Cover { width: 50, height: 50 }, (50, 50))]
    #[case(Resize::Percent { percent: 50.0 }, (100, 50))]
    fn test_resize_modes(#[case] resize: Resize, #[case] expected: (u32, u32)) {
        let out = resize.apply(&image(200, 100)).unwrap();
        assert_eq!((out.width(), out.height()), expected);
    }

    #[rstest]
    #[case(Resize::Exact { width: 0, height: 10 })]
    #[case(Resize::Cover { width: 10, height: MAX_DIMENSION + 1 })]
    #[case(Resize::Percent { percent: 0.0 })]
    #[case(Resize::Percent { percent: f32::NAN })]
    fn test_resize_rejects_bad_dimensions(#[case] resize: Resize) {
        let err = resize.apply(&image(20, 20)).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidParameter(_)));
    }

    #[test]
    fn test_resize_deserializes_from_tagged_json() {
        let resize: Resize = serde_json::from_str(r#"{"mode":"fit","width":10,"height":20}"#).unwrap();
        assert_eq!(resize, Resize::Fit { width: 10, height: 20 });
    }

    #[test]
    fn test_crop_is_clamped_to_image() {
        let out = Crop { x: 80, y: 40, width: 100, height: 100 }.apply(&image(100, 50)).unwrap();
        assert_eq!((out.width(), out.height()), (20, 10));
    }

    #[test]
    fn test_crop_outside_image() {
        let err = Crop { x: 100, y: 0, width: 10, height: 10 }.apply(&image(100, 50)).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidParameter(_)));
    }

    #[test]
    fn test_preset_covers_target() {
        let out = SocialPreset::TwitterHeader.apply(&image(300, 300)).unwrap();
        assert_eq!((out.width(), out.height()), (1500, 500));
    }

    #[rstest]
    #[case("instagram-square", SocialPreset::InstagramSquare)]
    #[case("YOUTUBE_THUMBNAIL", SocialPreset::YoutubeThumbnail)]
    fn test_preset_from_str(#[case] input: &str, #[case] expected: SocialPreset) {
        assert_eq!(input.parse::<SocialPreset>().unwrap(), expected);
    }
}
