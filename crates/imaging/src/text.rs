//! Watermarks and free-form text overlays.
//!
//! Text is laid out as an SVG `<text>` element covering the whole image,
//! rasterized with the system fonts and composited on top.

use crate::codec::FONTS;
use crate::error::{ErrorKind, Result};
use crate::pixel;
use exn::{OptionExt, ResultExt};
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use std::str::FromStr;

const MIN_WATERMARK_FONT_SIZE: f32 = 12.0;

/// Where a watermark sits.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Anchor {
    TopLeft,
    Top,
    TopRight,
    Left,
    Center,
    Right,
    BottomLeft,
    Bottom,
    #[default]
    BottomRight,
}
impl Anchor {
    pub const ALL: [Anchor; 9] = [
        Self::TopLeft,
        Self::Top,
        Self::TopRight,
        Self::Left,
        Self::Center,
        Self::Right,
        Self::BottomLeft,
        Self::Bottom,
        Self::BottomRight,
    ];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TopLeft => "top-left",
            Self::Top => "top",
            Self::TopRight => "top-right",
            Self::Left => "left",
            Self::Center => "center",
            Self::Right => "right",
            Self::BottomLeft => "bottom-left",
            Self::Bottom => "bottom",
            Self::BottomRight => "bottom-right",
        }
    }

    /// Horizontal and vertical position as 0 (start), 1 (middle) or 2 (end).
    fn grid(&self) -> (u8, u8) {
        match self {
            Self::TopLeft => (0, 0),
            Self::Top => (1, 0),
            Self::TopRight => (2, 0),
            Self::Left => (0, 1),
            Self::Center => (1, 1),
            Self::Right => (2, 1),
            Self::BottomLeft => (0, 2),
            Self::Bottom => (1, 2),
            Self::BottomRight => (2, 2),
        }
    }
}

impl FromStr for Anchor {
    type Err = crate::error::Error;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace(['_', ' '], "-");
        match Self::ALL.into_iter().find(|anchor| anchor.as_str() == wanted) {
            Some(anchor) => Ok(anchor),
            None => exn::bail!(ErrorKind::InvalidParameter(format!("unknown anchor: {s}"))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Watermark {
    pub text: String,
    pub anchor: Anchor,
    /// 0.0..=1.0
    pub opacity: f32,
    /// Font size relative to the shorter image side.
    pub scale: f32,
    pub color: String,
    /// Distance from the edges in pixels.
    pub margin: u32,
}
impl Default for Watermark {
    fn default() -> Self {
        Self {
            text: String::new(),
            anchor: Anchor::default(),
            opacity: 0.5,
            scale: 0.05,
            color: "#ffffff".to_string(),
            margin: 16,
        }
    }
}
impl Watermark {
    pub fn apply(&self, image: &RgbaImage) -> Result<RgbaImage> {
        let (width, height) = image.dimensions();
        let size = (width.min(height) as f32 * self.scale.clamp(0.001, 1.0)).max(MIN_WATERMARK_FONT_SIZE);
        let margin = self.margin as f32;
        let (col, row) = self.anchor.grid();
        let (x, text_anchor) = match col {
            0 => (margin, "start"),
            1 => (width as f32 / 2.0, "middle"),
            _ => (width as f32 - margin, "end"),
        };
        let y = match row {
            0 => margin + size * 0.8,
            1 => height as f32 / 2.0 + size * 0.35,
            _ => height as f32 - margin,
        };
        let label = Label {
            text: &self.text,
            x,
            y,
            size,
            color: parse_color(&self.color)?,
            family: "sans-serif",
            opacity: self.opacity,
            text_anchor,
        };
        overlay(image, &label)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextOverlay {
    pub text: String,
    /// Left edge in pixels.
    pub x: f32,
    /// Top edge in pixels.
    pub y: f32,
    /// Font size in pixels.
    pub size: f32,
    pub color: String,
    pub font_family: String,
    pub opacity: f32,
}
impl Default for TextOverlay {
    fn default() -> Self {
        Self {
            text: String::new(),
            x: 0.0,
            y: 0.0,
            size: 32.0,
            color: "#000000".to_string(),
            font_family: "sans-serif".to_string(),
            opacity: 1.0,
        }
    }
}
impl TextOverlay {
    pub fn apply(&self, image: &RgbaImage) -> Result<RgbaImage> {
        if !(self.size.is_finite() && self.size > 0.0) {
            exn::bail!(ErrorKind::InvalidParameter(format!("font size must be positive, got {}", self.size)));
        }
        let label = Label {
            text: &self.text,
            x: self.x,
            y: self.y + self.size * 0.8,
            size: self.size,
            color: parse_color(&self.color)?,
            family: &self.font_family,
            opacity: self.opacity,
            text_anchor: "start",
        };
        overlay(image, &label)
    }
}

struct Label<'a> {
    text: &'a str,
    /// Baseline position.
    x: f32,
    y: f32,
    size: f32,
    color: [u8; 3],
    family: &'a str,
    opacity: f32,
    text_anchor: &'static str,
}
impl Label<'_> {
    fn to_svg(&self, width: u32, height: u32) -> String {
        let [r, g, b] = self.color;
        let mut svg = String::new();
        // Writing into a String never fails.
        let _ = write!(
            svg,
            r##"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="{height}"><text x="{x}" y="{y}" font-size="{size}" font-family="{family}" fill="#{r:02x}{g:02x}{b:02x}" fill-opacity="{opacity}" text-anchor="{anchor}">{text}</text></svg>"##,
            x = self.x,
            y = self.y,
            size = self.size,
            family = escape(self.family),
            opacity = self.opacity.clamp(0.0, 1.0),
            anchor = self.text_anchor,
            text = escape(self.text),
        );
        svg
    }
}

fn overlay(image: &RgbaImage, label: &Label<'_>) -> Result<RgbaImage> {
    if label.text.trim().is_empty() {
        exn::bail!(ErrorKind::InvalidParameter("text must not be empty".to_string()));
    }
    let (width, height) = image.dimensions();
    let svg = label.to_svg(width, height);
    let mut options = usvg::Options::default();
    options.fontdb = FONTS.clone();
    let tree =
        usvg::Tree::from_str(&svg, &options).or_raise(|| ErrorKind::InvalidParameter("text layout".to_string()))?;
    let mut pixmap =
        resvg::tiny_skia::Pixmap::new(width, height).ok_or_raise(|| ErrorKind::Allocation(width, height))?;
    resvg::render(&tree, resvg::tiny_skia::Transform::default(), &mut pixmap.as_mut());
    let mut out = image.clone();
    pixel::composite_premultiplied(&mut out, pixmap.data());
    Ok(out)
}

/// Parse `#rgb` or `#rrggbb`.
pub(crate) fn parse_color(input: &str) -> Result<[u8; 3]> {
    let hex = input.trim().trim_start_matches('#');
    let invalid = || ErrorKind::InvalidParameter(format!("invalid colour: {input}"));
    if !hex.is_ascii() {
        exn::bail!(invalid());
    }
    let expanded: String = match hex.len() {
        3 => hex.chars().flat_map(|c| [c, c]).collect(),
        6 => hex.to_string(),
        _ => exn::bail!(invalid()),
    };
    let channel = |i: usize| u8::from_str_radix(&expanded[i..i + 2], 16).or_raise(invalid);
    Ok([channel(0)?, channel(2)?, channel(4)?])
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use rstest::rstest;

    #[rstest]
    #[case("top-left", Anchor::TopLeft)]
    #[case("Bottom_Right", Anchor::BottomRight)]
    #[case(" center ", Anchor::Center)]
    fn test_anchor_from_str(#[case] input: &str, #[case] expected: Anchor) {
        assert_eq!(input.parse::<Anchor>().unwrap(), expected);
    }

    #[test]
    fn test_anchor_unknown() {
        let err = "middle".parse::<Anchor>().unwrap_err();
        assert_eq!(*err, ErrorKind::InvalidParameter("unknown anchor: middle".to_string()));
    }

    #[rstest]
    #[case("#fff", [255, 255, 255])]
    #[case("#1a2B3c", [0x1a, 0x2b, 0x3c])]
    #[case("000000", [0, 0, 0])]
    fn test_parse_color(#[case] input: &str, #[case] expected: [u8; 3]) {
        assert_eq!(parse_color(input).unwrap(), expected);
    }

    #[rstest]
    #[case("#ff")]
    #[case("#gggggg")]
    #[case("#ééé")]
    #[case("red")]
    fn test_parse_color_invalid(#[case] input: &str) {
        assert!(matches!(&*parse_color(input).unwrap_err(), ErrorKind::InvalidParameter(_)));
    }

    #[test]
    fn test_label_svg_escapes_markup() {
        let label = Label {
            text: "<b>Tom & \"Jerry\"</b>",
            x: 1.0,
            y: 2.0,
            size: 10.0,
            color: [255, 0, 16],
            family: "Sans",
            opacity: 2.0,
            text_anchor: "end",
        };
        let svg = label.to_svg(20, 10);
        assert!(svg.contains("&lt;b&gt;Tom &amp; &quot;Jerry&quot;&lt;/b&gt;"));
        assert!(svg.contains(r##"fill="#ff0010""##));
        assert!(svg.contains(r#"fill-opacity="1""#));
        assert!(svg.contains(r#"text-anchor="end""#));
    }

    #[test]
    fn test_watermark_keeps_dimensions() {
        let image = RgbaImage::from_pixel(64, 32, Rgba([10, 10, 10, 255]));
        let out = Watermark { text: "© me".to_string(), ..Default::default() }.apply(&image).unwrap();
        assert_eq!(out.dimensions(), (64, 32));
        // The anchor corner opposite the watermark is untouched.
        assert_eq!(out.get_pixel(0, 0).0, [10, 10, 10, 255]);
    }

    #[test]
    fn test_empty_text_rejected() {
        let image = RgbaImage::new(4, 4);
        let err = TextOverlay { text: "  ".to_string(), ..Default::default() }.apply(&image).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidParameter(_)));
    }

    #[test]
    fn test_watermark_deserializes_with_defaults() {
        let watermark: Watermark = serde_json::from_str(r#"{"text":"hi","anchor":"top-left"}"#).unwrap();
        assert_eq!(watermark.anchor, Anchor::TopLeft);
        assert_eq!(watermark.opacity, 0.5);
        assert_eq!(watermark.margin, 16);
    }
}
