use crate::adjust::Filters;
use crate::background::RemoveBackground;
use crate::codec::{self, DEFAULT_QUALITY, OutputFormat};
use crate::error::{ErrorKind, Result};
use crate::geometry::{Crop, Resize, SocialPreset};
use crate::text::{TextOverlay, Watermark};
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use tracing::instrument;

fn default_quality() -> u8 {
    DEFAULT_QUALITY
}

/// One parameterised effect, applied to every file in a batch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "kebab-case")]
pub enum Operation {
    Resize(Resize),
    Crop(Crop),
    /// Re-encode at `quality`, optionally switching format.
    Compress {
        #[serde(default = "default_quality")]
        quality: u8,
        #[serde(default)]
        format: Option<OutputFormat>,
    },
    Convert {
        format: OutputFormat,
        #[serde(default)]
        quality: Option<u8>,
    },
    Filter(Filters),
    Watermark(Watermark),
    Text(TextOverlay),
    Preset {
        preset: SocialPreset,
    },
    RemoveBackground(RemoveBackground),
}

/// The encoded output of a single [`Operation`].
#[derive(Clone, Debug)]
pub struct Processed {
    pub bytes: Vec<u8>,
    pub format: OutputFormat,
    pub width: u32,
    pub height: u32,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Resize(_) => "resize",
            Self::Crop(_) => "crop",
            Self::Compress { .. } => "compress",
            Self::Convert { .. } => "convert",
            Self::Filter(_) => "filter",
            Self::Watermark(_) => "watermark",
            Self::Text(_) => "text",
            Self::Preset { .. } => "preset",
            Self::RemoveBackground(_) => "remove-background",
        }
    }

    /// The format the result is written in. Operations that pick a format
    /// win; otherwise the input's own format is kept, with PNG for inputs we
    /// can read but not write (SVG).
    fn output_format(&self, input: Option<OutputFormat>) -> OutputFormat {
        match self {
            Self::Convert { format, .. } => *format,
            Self::Compress { format: Some(format), .. } => *format,
            // Transparency is the whole point here.
            Self::RemoveBackground(_) => OutputFormat::Png,
            _ => input.unwrap_or(OutputFormat::Png),
        }
    }

    fn quality(&self) -> u8 {
        match self {
            Self::Compress { quality, .. } => *quality,
            Self::Convert { quality: Some(quality), .. } => *quality,
            _ => DEFAULT_QUALITY,
        }
    }

    /// Apply the effect to already-decoded pixels.
    pub fn apply(&self, image: DynamicImage) -> Result<DynamicImage> {
        Ok(match self {
            Self::Resize(resize) => resize.apply(&image)?,
            Self::Crop(crop) => crop.apply(&image)?,
            Self::Compress { quality, .. } | Self::Convert { quality: Some(quality), .. } => {
                if !(1..=100).contains(quality) {
                    exn::bail!(ErrorKind::InvalidParameter(format!("quality must be within 1-100, got {quality}")));
                }
                image
            },
            Self::Convert { quality: None, .. } => image,
            Self::Filter(filters) if filters.is_noop() => {
                tracing::debug!("No filters set, skipping");
                image
            },
            Self::Filter(filters) => DynamicImage::ImageRgba8(filters.apply(&image.to_rgba8())),
            Self::Watermark(watermark) => DynamicImage::ImageRgba8(watermark.apply(&image.to_rgba8())?),
            Self::Text(overlay) => DynamicImage::ImageRgba8(overlay.apply(&image.to_rgba8())?),
            Self::Preset { preset } => preset.apply(&image)?,
            Self::RemoveBackground(remove) => DynamicImage::ImageRgba8(remove.apply(&image.to_rgba8())),
        })
    }

    /// Decode `input`, apply the effect and encode the result.
    ///
    /// Stateless: the same bytes and parameters always give the same output.
    #[instrument(skip(self, input), fields(op = self.as_str(), input_size = input.len(), output_size))]
    pub fn process(&self, input: &[u8], mime: &str) -> Result<Processed> {
        let decoded = codec::decode(input, mime)?;
        let format = self.output_format(decoded.format);
        let image = self.apply(decoded.image)?;
        let bytes = codec::encode(&image, format, self.quality())?;
        tracing::Span::current().record("output_size", bytes.len());
        Ok(Processed { bytes, format, width: image.width(), height: image.height() })
    }
}
