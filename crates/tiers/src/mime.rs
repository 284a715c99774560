//! MIME types accepted by the upload validator, and the magic bytes used to
//! cross-check them when content sniffing is enabled.

pub const JPEG: &str = "image/jpeg";
pub const PNG: &str = "image/png";
pub const WEBP: &str = "image/webp";
pub const GIF: &str = "image/gif";
pub const BMP: &str = "image/bmp";
pub const TIFF: &str = "image/tiff";
pub const SVG: &str = "image/svg+xml";
pub const PDF: &str = "application/pdf";

/// Raster formats every plan can upload.
pub const BASIC: [&str; 5] = [JPEG, PNG, WEBP, GIF, BMP];
/// Additional formats unlocked by the Pro plan.
pub const EXTENDED: [&str; 3] = [TIFF, SVG, PDF];

const JPEG_MAGIC: [u8; 3] = [0xFF, 0xD8, 0xFF];
const PNG_MAGIC: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
const GIF_MAGIC: [u8; 4] = *b"GIF8";
const BMP_MAGIC: [u8; 2] = *b"BM";
const TIFF_LE_MAGIC: [u8; 4] = [0x49, 0x49, 0x2A, 0x00];
const TIFF_BE_MAGIC: [u8; 4] = [0x4D, 0x4D, 0x00, 0x2A];
const PDF_MAGIC: [u8; 4] = *b"%PDF";
/// How far into a text document to look for an `<svg` root element.
const SVG_SNIFF_WINDOW: usize = 1024;

/// Lower-cases and strips any parameters (`; charset=...`) from a MIME type,
/// and folds the common non-standard aliases browsers still report.
#[must_use]
pub fn normalize(mime: &str) -> String {
    let essence = mime.split(';').next().unwrap_or_default().trim().to_lowercase();
    match essence.as_str() {
        "image/jpg" | "image/pjpeg" => JPEG.to_string(),
        "image/x-ms-bmp" => BMP.to_string(),
        "image/x-png" => PNG.to_string(),
        _ => essence,
    }
}

/// Detect the MIME type of `bytes` from their magic bytes.
///
/// Returns `None` when nothing matches, or when the input is too short to
/// detect any format.
#[must_use]
pub fn sniff(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(&JPEG_MAGIC) {
        return Some(JPEG);
    }
    if bytes.starts_with(&PNG_MAGIC) {
        return Some(PNG);
    }
    if bytes.starts_with(&GIF_MAGIC) {
        return Some(GIF);
    }
    if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        return Some(WEBP);
    }
    if bytes.starts_with(&BMP_MAGIC) {
        return Some(BMP);
    }
    if bytes.starts_with(&TIFF_LE_MAGIC) || bytes.starts_with(&TIFF_BE_MAGIC) {
        return Some(TIFF);
    }
    if bytes.starts_with(&PDF_MAGIC) {
        return Some(PDF);
    }
    let head = &bytes[..bytes.len().min(SVG_SNIFF_WINDOW)];
    if head.windows(4).any(|w| w.eq_ignore_ascii_case(b"<svg")) {
        return Some(SVG);
    }
    None
}

/// Guess a MIME type from a file extension, for uploads that arrive without
/// one (files read from disk).
#[must_use]
pub fn from_extension(extension: &str) -> Option<&'static str> {
    Some(match extension.trim_start_matches('.').to_lowercase().as_str() {
        "jpg" | "jpeg" | "jpe" => JPEG,
        "png" => PNG,
        "webp" => WEBP,
        "gif" => GIF,
        "bmp" => BMP,
        "tif" | "tiff" => TIFF,
        "svg" => SVG,
        "pdf" => PDF,
        _ => return None,
    })
}

/// Verify that `bytes` start with the expected magic bytes for `declared`.
#[must_use]
pub fn matches_content(declared: &str, bytes: &[u8]) -> bool {
    sniff(bytes).is_some_and(|detected| detected == normalize(declared))
}
