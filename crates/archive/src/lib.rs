//! Packaging processed images into a single downloadable zip.
//!
//! - **[`NamingTemplate`]** decides what each entry is called, either by
//!   joining prefix/stem/date/number/suffix parts or by rendering a custom
//!   [upon] pattern.
//! - **[`build_archive`]** writes every successful result into an in-memory
//!   zip, deduplicating names. It either returns the whole archive or fails;
//!   there are no partial archives.
//!
//! Stored and Deflated entries are always available. Bzip2 and Zstd are
//! behind the `bzip2` and `zstd` feature flags.

pub mod error;
mod naming;
mod pack;
mod path;

use crate::error::{Error, ErrorKind};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

pub use crate::naming::{Namer, NamingTemplate, Numbering};
pub use crate::pack::{Packable, archive_file_name, build_archive};
pub use crate::path::validate_name;

/// How each zip entry is compressed. Defaults to [`Deflated`](Self::Deflated).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    /// No compression; images are usually compressed already.
    Stored,
    #[default]
    Deflated,
    #[cfg(feature = "bzip2")]
    Bzip2,
    #[cfg(feature = "zstd")]
    Zstd,
}
impl Compression {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stored => "stored",
            Self::Deflated => "deflated",
            #[cfg(feature = "bzip2")]
            Self::Bzip2 => "bzip2",
            #[cfg(feature = "zstd")]
            Self::Zstd => "zstd",
        }
    }

    pub(crate) fn method(&self) -> zip::CompressionMethod {
        match self {
            Self::Stored => zip::CompressionMethod::Stored,
            Self::Deflated => zip::CompressionMethod::Deflated,
            #[cfg(feature = "bzip2")]
            Self::Bzip2 => zip::CompressionMethod::Bzip2,
            #[cfg(feature = "zstd")]
            Self::Zstd => zip::CompressionMethod::Zstd,
        }
    }
}
impl Display for Compression {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}
impl FromStr for Compression {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "stored" | "store" | "none" => Ok(Self::Stored),
            "deflated" | "deflate" => Ok(Self::Deflated),
            #[cfg(feature = "bzip2")]
            "bzip2" | "bz2" => Ok(Self::Bzip2),
            #[cfg(not(feature = "bzip2"))]
            "bzip2" | "bz2" => exn::bail!(ErrorKind::DisabledFormat(s.to_string())),
            #[cfg(feature = "zstd")]
            "zstd" | "zst" => Ok(Self::Zstd),
            #[cfg(not(feature = "zstd"))]
            "zstd" | "zst" => exn::bail!(ErrorKind::DisabledFormat(s.to_string())),
            _ => exn::bail!(ErrorKind::UnsupportedFormat(s.to_string())),
        }
    }
}
