//! Decoding uploads into pixels and encoding results back into files.

use crate::error::{ErrorKind, Result};
use crate::pixel;
use exn::{OptionExt, ResultExt};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::codecs::webp::WebPEncoder;
use image::{DynamicImage, ImageFormat, RgbaImage};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::io::Cursor;
use std::str::FromStr;
use std::sync::{Arc, LazyLock};
use tracing::instrument;

/// Quality used when nothing more specific was asked for.
pub const DEFAULT_QUALITY: u8 = 80;
/// Refuse to rasterize vector input larger than this in either dimension.
const MAX_RASTER_DIMENSION: u32 = 16_384;

/// System fonts are only enumerated once per process; it's slow.
pub(crate) static FONTS: LazyLock<Arc<usvg::fontdb::Database>> = LazyLock::new(|| {
    let mut db = usvg::fontdb::Database::new();
    db.load_system_fonts();
    tracing::debug!(faces = db.len(), "Loaded system fonts");
    Arc::new(db)
});

/// A format processed images can be written in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Jpeg,
    Png,
    Webp,
    Gif,
    Bmp,
    Tiff,
}
impl OutputFormat {
    pub const ALL: [OutputFormat; 6] = [
        OutputFormat::Jpeg,
        OutputFormat::Png,
        OutputFormat::Webp,
        OutputFormat::Gif,
        OutputFormat::Bmp,
        OutputFormat::Tiff,
    ];

    /// Returns the file extension for this format (without a leading dot).
    #[inline]
    #[must_use]
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Webp => "webp",
            Self::Gif => "gif",
            Self::Bmp => "bmp",
            Self::Tiff => "tiff",
        }
    }

    #[must_use]
    pub fn mime(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Webp => "image/webp",
            Self::Gif => "image/gif",
            Self::Bmp => "image/bmp",
            Self::Tiff => "image/tiff",
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::Webp => "webp",
            Self::Gif => "gif",
            Self::Bmp => "bmp",
            Self::Tiff => "tiff",
        }
    }

    /// Whether the format can carry an alpha channel.
    #[must_use]
    pub fn supports_alpha(&self) -> bool {
        !matches!(self, Self::Jpeg)
    }

    fn from_image_format(format: ImageFormat) -> Option<Self> {
        Some(match format {
            ImageFormat::Jpeg => Self::Jpeg,
            ImageFormat::Png => Self::Png,
            ImageFormat::WebP => Self::Webp,
            ImageFormat::Gif => Self::Gif,
            ImageFormat::Bmp => Self::Bmp,
            ImageFormat::Tiff => Self::Tiff,
            _ => return None,
        })
    }

    fn image_format(&self) -> ImageFormat {
        match self {
            Self::Jpeg => ImageFormat::Jpeg,
            Self::Png => ImageFormat::Png,
            Self::Webp => ImageFormat::WebP,
            Self::Gif => ImageFormat::Gif,
            Self::Bmp => ImageFormat::Bmp,
            Self::Tiff => ImageFormat::Tiff,
        }
    }
}
impl Display for OutputFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}
impl FromStr for OutputFormat {
    type Err = crate::error::Error;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s.trim().trim_start_matches('.').to_lowercase().as_str() {
            "jpeg" | "jpg" => Self::Jpeg,
            "png" => Self::Png,
            "webp" => Self::Webp,
            "gif" => Self::Gif,
            "bmp" => Self::Bmp,
            "tif" | "tiff" => Self::Tiff,
            _ => exn::bail!(ErrorKind::Unsupported(s.to_string())),
        })
    }
}

/// A decoded upload.
#[derive(Debug)]
pub struct Decoded {
    pub image: DynamicImage,
    /// The raster format the input was stored in, if it was one we can also
    /// write. Vector input has none.
    pub format: Option<OutputFormat>,
}

/// Decode `bytes` into pixels.
///
/// The declared MIME type only decides between the raster and vector paths;
/// raster decoding always goes by the content's own signature.
#[instrument(skip(bytes), fields(input_size = bytes.len()))]
pub fn decode(bytes: &[u8], mime: &str) -> Result<Decoded> {
    let mime = mime.trim().to_lowercase();
    if mime.starts_with("application/pdf") || bytes.starts_with(b"%PDF") {
        exn::bail!(ErrorKind::Unsupported("application/pdf".to_string()));
    }
    if mime.starts_with("image/svg") {
        return Ok(Decoded { image: DynamicImage::ImageRgba8(rasterize_svg(bytes)?), format: None });
    }
    let detected = image::guess_format(bytes).or_raise(|| ErrorKind::Decode)?;
    let image = image::load_from_memory_with_format(bytes, detected).or_raise(|| ErrorKind::Decode)?;
    Ok(Decoded { image, format: OutputFormat::from_image_format(detected) })
}

/// Rasterize an SVG document at its intrinsic size.
pub fn rasterize_svg(bytes: &[u8]) -> Result<RgbaImage> {
    let mut options = usvg::Options::default();
    options.fontdb = FONTS.clone();
    let tree = usvg::Tree::from_data(bytes, &options).or_raise(|| ErrorKind::Decode)?;
    let size = tree.size().to_int_size();
    let (width, height) = (size.width(), size.height());
    if width > MAX_RASTER_DIMENSION || height > MAX_RASTER_DIMENSION {
        exn::bail!(ErrorKind::InvalidParameter(format!(
            "svg raster size too large: {width}x{height} (max {MAX_RASTER_DIMENSION}x{MAX_RASTER_DIMENSION})"
        )));
    }
    let mut pixmap =
        resvg::tiny_skia::Pixmap::new(width, height).ok_or_raise(|| ErrorKind::Allocation(width, height))?;
    resvg::render(&tree, resvg::tiny_skia::Transform::default(), &mut pixmap.as_mut());
    let mut data = pixmap.take();
    pixel::demultiply(&mut data);
    RgbaImage::from_raw(width, height, data).ok_or_raise(|| ErrorKind::Allocation(width, height))
}

/// Encode `image` as `format`.
///
/// `quality` (1–100) drives JPEG quality directly and picks the PNG
/// compression effort; the other formats are lossless and ignore it.
#[instrument(skip(image), fields(
    width = image.width(),
    height = image.height(),
    output_size
))]
pub fn encode(image: &DynamicImage, format: OutputFormat, quality: u8) -> Result<Vec<u8>> {
    let quality = quality.clamp(1, 100);
    let mut output = Vec::new();
    match format {
        OutputFormat::Jpeg => {
            // JPEG has no alpha channel; flatten onto white rather than
            // letting transparent pixels turn black.
            let flattened = DynamicImage::ImageRgb8(pixel::flatten_onto_white(&image.to_rgba8()));
            let encoder = JpegEncoder::new_with_quality(&mut output, quality);
            flattened.write_with_encoder(encoder).or_raise(|| ErrorKind::Encode(format.as_str()))?;
        },
        OutputFormat::Png => {
            let compression = match quality {
                0..=33 => CompressionType::Best,
                34..=66 => CompressionType::Default,
                _ => CompressionType::Fast,
            };
            let encoder = PngEncoder::new_with_quality(&mut output, compression, PngFilter::Adaptive);
            normalize_color(image).write_with_encoder(encoder).or_raise(|| ErrorKind::Encode(format.as_str()))?;
        },
        OutputFormat::Webp => {
            let encoder = WebPEncoder::new_lossless(&mut output);
            normalize_color(image).write_with_encoder(encoder).or_raise(|| ErrorKind::Encode(format.as_str()))?;
        },
        OutputFormat::Gif | OutputFormat::Bmp | OutputFormat::Tiff => {
            let mut cursor = Cursor::new(&mut output);
            normalize_color(image)
                .write_to(&mut cursor, format.image_format())
                .or_raise(|| ErrorKind::Encode(format.as_str()))?;
        },
    }
    tracing::Span::current().record("output_size", output.len());
    Ok(output)
}

/// Every encoder we use accepts 8-bit RGB(A); higher bit depths and
/// grayscale variants are converted so no format trips over its input.
fn normalize_color(image: &DynamicImage) -> DynamicImage {
    match image.color().has_alpha() {
        true => DynamicImage::ImageRgba8(image.to_rgba8()),
        false => DynamicImage::ImageRgb8(image.to_rgb8()),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use rstest::rstest;

    pub(crate) fn sample_png(width: u32, height: u32) -> Vec<u8> {
        let image = RgbaImage::from_fn(width, height, |x, y| image::Rgba([(x * 40) as u8, (y * 40) as u8, 128, 255]));
        encode(&DynamicImage::ImageRgba8(image), OutputFormat::Png, DEFAULT_QUALITY).unwrap()
    }

    #[rstest]
    #[case("jpg", OutputFormat::Jpeg)]
    #[case(".JPEG", OutputFormat::Jpeg)]
    #[case("tif", OutputFormat::Tiff)]
    #[case("webp", OutputFormat::Webp)]
    fn test_format_from_str(#[case] input: &str, #[case] expected: OutputFormat) {
        assert_eq!(input.parse::<OutputFormat>().unwrap(), expected);
    }

    #[test]
    fn test_format_from_str_invalid() {
        let err = "heic".parse::<OutputFormat>().unwrap_err();
        assert_eq!(*err, ErrorKind::Unsupported("heic".to_string()));
    }

    #[rstest]
    #[case(OutputFormat::Jpeg)]
    #[case(OutputFormat::Png)]
    #[case(OutputFormat::Webp)]
    #[case(OutputFormat::Gif)]
    #[case(OutputFormat::Bmp)]
    #[case(OutputFormat::Tiff)]
    fn test_encoded_output_decodes_as_same_format(#[case] format: OutputFormat) {
        let decoded = decode(&sample_png(4, 3), "image/png").unwrap();
        let bytes = encode(&decoded.image, format, 90).unwrap();
        let again = decode(&bytes, format.mime()).unwrap();
        assert_eq!(again.format, Some(format));
        assert_eq!((again.image.width(), again.image.height()), (4, 3));
    }

    #[test]
    fn test_decode_ignores_wrong_declared_raster_type() {
        // Declared as JPEG, actually PNG: the decoder goes by content.
        let decoded = decode(&sample_png(2, 2), "image/jpeg").unwrap();
        assert_eq!(decoded.format, Some(OutputFormat::Png));
    }

    #[test]
    fn test_decode_garbage() {
        let err = decode(b"definitely not an image", "image/png").unwrap_err();
        assert_eq!(*err, ErrorKind::Decode);
    }

    #[test]
    fn test_decode_pdf_is_unsupported() {
        let err = decode(b"%PDF-1.7\n...", "application/pdf").unwrap_err();
        assert!(matches!(&*err, ErrorKind::Unsupported(_)));
    }

    #[test]
    fn test_decode_svg() {
        let svg = br##"<svg xmlns="http://www.w3.org/2000/svg" width="8" height="4"><rect width="8" height="4" fill="#ff0000"/></svg>"##;
        let decoded = decode(svg, "image/svg+xml").unwrap();
        assert_eq!(decoded.format, None);
        let rgba = decoded.image.to_rgba8();
        assert_eq!(rgba.dimensions(), (8, 4));
        assert_eq!(rgba.get_pixel(3, 2).0, [255, 0, 0, 255]);
    }

    #[test]
    fn test_jpeg_quality_changes_size() {
        let image = DynamicImage::ImageRgba8(RgbaImage::from_fn(64, 64, |x, y| {
            image::Rgba([((x * 7) ^ (y * 13)) as u8, (x * 3) as u8, (y * 5) as u8, 255])
        }));
        let low = encode(&image, OutputFormat::Jpeg, 10).unwrap();
        let high = encode(&image, OutputFormat::Jpeg, 95).unwrap();
        assert!(low.len() < high.len());
    }
}
