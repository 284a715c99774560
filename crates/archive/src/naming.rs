//! Output file naming.
//!
//! A [`NamingTemplate`] comes in two flavours:
//!
//! - **Parts** (the default): the non-empty parts `[prefix, original stem (if
//!   `keep_original`), date (if `date_format`), number, suffix]` joined by
//!   `separator`, followed by the output extension. If every part is empty
//!   the original stem is used on its own.
//! - **Pattern**: a user-supplied [upon] template, rendered per file. The
//!   extension is always appended afterwards.
//!
//! # Pattern Variables
//!
//! | Variable    | Type     | Description                                    |
//! |-------------|----------|------------------------------------------------|
//! | `name`      | `String` | Original file name without its extension        |
//! | `index`     | `u64`    | Zero-based position in the archive              |
//! | `number`    | `String` | Formatted number according to `numbering`       |
//! | `date`      | `String` | Current date, in `date_format` or `YYYY-MM-DD`  |
//! | `timestamp` | `i64`    | Current Unix timestamp in seconds               |
//! | `ext`       | `String` | Output extension, without the dot               |
//! | `hash`      | `String` | Zero-padded 8-hex-digit CRC32 of the contents   |
//!
//! Patterns also get the `slug` formatter and the `truncate` function.
//!
//! ```
//! use resizesuite_archive::{Namer, NamingTemplate, Numbering};
//! use time::UtcDateTime;
//!
//! let template = NamingTemplate { prefix: "img_".into(), numbering: Numbering::Sequential, ..Default::default() };
//! let namer = Namer::new(&template, UtcDateTime::now()).unwrap();
//! assert_eq!(namer.name(0, "photo.png", "png", b"").unwrap(), "img_-001.png");
//! ```

use crate::error::{ErrorKind, Result};
use crate::path::validate_name;
use exn::ResultExt;
use serde::{Deserialize, Serialize};
use std::path::Path;
use time::UtcDateTime;
use time::format_description::OwnedFormatItem;
use time::macros::format_description;
use tracing::instrument;
use upon::{Engine, Template};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Numbering {
    None,
    /// `start + index`, zero-padded to `padding` digits.
    #[default]
    Sequential,
    /// Unix time in milliseconds plus the index, so names stay unique and
    /// sort in archive order.
    Timestamp,
}

fn default_start() -> u64 {
    1
}
fn default_padding() -> usize {
    3
}
fn default_separator() -> String {
    "-".to_string()
}

/// User-facing naming settings, as stored in config or a project.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamingTemplate {
    pub prefix: String,
    pub suffix: String,
    pub numbering: Numbering,
    #[serde(default = "default_start")]
    pub start: u64,
    #[serde(default = "default_padding")]
    pub padding: usize,
    /// A `time` format description, e.g. `[year][month][day]`.
    pub date_format: Option<String>,
    #[serde(default = "default_separator")]
    pub separator: String,
    pub keep_original: bool,
    /// Custom [upon] pattern. Overrides every other part when set.
    pub pattern: Option<String>,
}
impl Default for NamingTemplate {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            suffix: String::new(),
            numbering: Numbering::default(),
            start: default_start(),
            padding: default_padding(),
            date_format: None,
            separator: default_separator(),
            keep_original: false,
            pattern: None,
        }
    }
}
impl NamingTemplate {
    /// Whether this template uses a custom pattern, which is a gated feature.
    #[must_use]
    pub fn is_custom(&self) -> bool {
        self.pattern.as_deref().is_some_and(|p| !p.trim().is_empty())
    }
}

/// A compiled [`NamingTemplate`], bound to a single point in time so every
/// name in one archive shares the same date.
pub struct Namer {
    template: NamingTemplate,
    date_format: Option<OwnedFormatItem>,
    pattern: Option<(Engine<'static>, Template<'static>)>,
    now: UtcDateTime,
}
impl Namer {
    /// Compile `template`. Date formats and patterns are checked here, so
    /// syntax errors surface before anything is written.
    pub fn new(template: &NamingTemplate, now: UtcDateTime) -> Result<Self> {
        let date_format = match &template.date_format {
            Some(format) if !format.trim().is_empty() => {
                Some(time::format_description::parse_owned::<2>(format).or_raise(|| ErrorKind::Template)?)
            },
            _ => None,
        };
        let pattern = match &template.pattern {
            Some(pattern) if template.is_custom() => {
                let mut engine = Engine::new();
                addons::configure(&mut engine);
                let compiled = engine.compile(pattern.clone()).or_raise(|| ErrorKind::Template)?;
                Some((engine, compiled))
            },
            _ => None,
        };
        Ok(Self { template: template.clone(), date_format, pattern, now })
    }

    fn date(&self) -> Result<String> {
        match &self.date_format {
            Some(format) => self.now.format(format).or_raise(|| ErrorKind::Template),
            None => self.now.format(format_description!("[year]-[month]-[day]")).or_raise(|| ErrorKind::Template),
        }
    }

    fn number(&self, index: usize) -> String {
        let index = index as u64;
        match self.template.numbering {
            Numbering::None => String::new(),
            Numbering::Sequential => {
                format!("{:0width$}", self.template.start.saturating_add(index), width = self.template.padding)
            },
            Numbering::Timestamp => {
                let millis = (self.now.unix_timestamp_nanos() / 1_000_000) as u64;
                millis.saturating_add(index).to_string()
            },
        }
    }

    /// The entry name for the file at `index` (its position in the archive).
    #[instrument(skip(self, contents), fields(custom = self.pattern.is_some()))]
    pub fn name(&self, index: usize, original: &str, extension: &str, contents: &[u8]) -> Result<String> {
        let stem = Path::new(original).file_stem().and_then(|s| s.to_str()).unwrap_or(original).trim();
        let extension = extension.trim().trim_matches('.');
        let base = match &self.pattern {
            Some((engine, template)) => {
                let parameters = upon::value! {
                    name: stem,
                    index: index as u64,
                    number: self.number(index),
                    date: self.date()?,
                    timestamp: self.now.unix_timestamp(),
                    ext: extension,
                    hash: format!("{:08x}", crc32fast::hash(contents)),
                };
                template.render(engine, parameters).to_string().or_raise(|| ErrorKind::Template)?
            },
            None => {
                let date = match self.date_format {
                    Some(_) => self.date()?,
                    None => String::new(),
                };
                let keep = match self.template.keep_original {
                    true => stem,
                    false => "",
                };
                let number = self.number(index);
                let parts: Vec<&str> =
                    [self.template.prefix.as_str(), keep, date.as_str(), number.as_str(), self.template.suffix.as_str()]
                        .into_iter()
                        .filter(|p| !p.is_empty())
                        .collect();
                match parts.is_empty() {
                    true => stem.to_string(),
                    false => parts.join(&self.template.separator),
                }
            },
        };
        let name = match extension.is_empty() {
            true => base,
            false => format!("{}.{extension}", base.trim()),
        };
        validate_name(&name)
    }
}

/// Custom [`upon`] extensions for file-name-safe string manipulation.
mod addons {
    use rslug::slugify;
    use std::fmt::Write;
    use upon::{Engine, Value, fmt as upon_fmt};

    /// Slugify strings, stripping quotation marks first so `"hello"` doesn't
    /// come out as `-hello-`.
    fn slug_formatter(f: &mut upon_fmt::Formatter<'_>, value: &Value) -> upon_fmt::Result {
        match value {
            Value::String(s) => {
                let marks = ['\'', '"', '\u{2018}', '\u{2019}', '\u{201C}', '\u{201D}', '\u{201E}', '`', '«', '»'];
                let stripped: String = s.chars().filter(|c| !marks.contains(c)).collect();
                write!(f, "{}", slugify!(&stripped))?
            },
            v => upon_fmt::default(f, v)?,
        };
        Ok(())
    }

    /// Cut a string to at most `max_bytes`, never splitting a character.
    fn truncate(s: &str, max_bytes: usize) -> String {
        s[..s.floor_char_boundary(max_bytes)].to_string()
    }

    pub(crate) fn configure(engine: &mut Engine<'_>) {
        engine.add_formatter("slug", slug_formatter);
        engine.add_function("truncate", truncate);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    /// 2024-03-09 12:30:00 UTC
    fn now() -> UtcDateTime {
        UtcDateTime::from_unix_timestamp(1_709_987_400).unwrap()
    }

    fn name(template: NamingTemplate, index: usize, original: &str, ext: &str) -> String {
        Namer::new(&template, now()).unwrap().name(index, original, ext, b"hello").unwrap()
    }

    #[test]
    fn test_prefix_and_sequential_number() {
        let template = NamingTemplate { prefix: "img_".into(), ..Default::default() };
        assert_eq!(name(template, 0, "photo.png", "png"), "img_-001.png");
    }

    #[rstest]
    #[case(NamingTemplate { numbering: Numbering::None, ..Default::default() }, "photo.jpg")]
    #[case(NamingTemplate { keep_original: true, ..Default::default() }, "photo-005.jpg")]
    #[case(NamingTemplate { keep_original: true, numbering: Numbering::None, suffix: "small".into(), ..Default::default() }, "photo-small.jpg")]
    #[case(NamingTemplate { start: 10, padding: 0, separator: "_".into(), prefix: "x".into(), ..Default::default() }, "x_14.jpg")]
    #[case(NamingTemplate { date_format: Some("[year][month][day]".into()), ..Default::default() }, "20240309-005.jpg")]
    fn test_parts(#[case] template: NamingTemplate, #[case] expected: &str) {
        assert_eq!(name(template, 4, "dir/photo.png", ".jpg"), expected);
    }

    #[test]
    fn test_timestamp_numbering_is_unique_per_index() {
        let template = NamingTemplate { numbering: Numbering::Timestamp, ..Default::default() };
        let millis = now().unix_timestamp() * 1000;
        assert_eq!(name(template.clone(), 0, "a.png", "png"), format!("{millis}.png"));
        assert_eq!(name(template, 2, "a.png", "png"), format!("{}.png", millis + 2));
    }

    #[test]
    fn test_pattern_variables() {
        let template = NamingTemplate {
            pattern: Some("{{ date }}/{{ name|slug }}-{{ number }}-{{ hash }}".into()),
            ..Default::default()
        };
        assert_eq!(name(template, 1, "My \"Best\" Shot.jpeg", "webp"), "2024-03-09/my-best-shot-002-3610a686.webp");
    }

    #[test]
    fn test_pattern_truncate() {
        let template = NamingTemplate { pattern: Some("{{ truncate(name, 5)|slug }}".into()), ..Default::default() };
        assert_eq!(name(template, 0, "Holiday Photos.png", "png"), "holid.png");
    }

    #[test]
    fn test_pattern_cannot_escape_root() {
        let template = NamingTemplate { pattern: Some("../{{ name }}".into()), ..Default::default() };
        let err = Namer::new(&template, now()).unwrap().name(0, "a.png", "png", b"").unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidName(_)));
    }

    #[test]
    fn test_bad_pattern_fails_at_construction() {
        let template = NamingTemplate { pattern: Some("{{ name ".into()), ..Default::default() };
        assert_eq!(*Namer::new(&template, now()).err().unwrap(), ErrorKind::Template);
    }

    #[test]
    fn test_bad_date_format_fails_at_construction() {
        let template = NamingTemplate { date_format: Some("[nonsense]".into()), ..Default::default() };
        assert_eq!(*Namer::new(&template, now()).err().unwrap(), ErrorKind::Template);
    }

    #[test]
    fn test_blank_pattern_is_not_custom() {
        assert!(!NamingTemplate { pattern: Some("  ".into()), ..Default::default() }.is_custom());
        assert!(NamingTemplate { pattern: Some("{{ name }}".into()), ..Default::default() }.is_custom());
    }

    #[test]
    fn test_deserialize_defaults() {
        let template: NamingTemplate = serde_json::from_str(r#"{"prefix":"img_"}"#).unwrap();
        assert_eq!(template.start, 1);
        assert_eq!(template.padding, 3);
        assert_eq!(template.separator, "-");
        assert_eq!(template.numbering, Numbering::Sequential);
    }
}
