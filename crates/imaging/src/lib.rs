//! Stateless per-image processors.
//!
//! Every [`Operation`] is decode → one parameterised effect → encode, and
//! never keeps state between calls. Raster input goes through `image`; SVG
//! input (and all text rendering) goes through `usvg`/`resvg`.
//!
//! ```no_run
//! use resizesuite_imaging::{Operation, Resize};
//!
//! # fn main() -> resizesuite_imaging::error::Result<()> {
//! let input = std::fs::read("photo.jpg").unwrap();
//! let operation = Operation::Resize(Resize::Fit { width: 800, height: 600 });
//! let processed = operation.process(&input, "image/jpeg")?;
//! std::fs::write(format!("photo-small.{}", processed.format.extension()), processed.bytes).unwrap();
//! # Ok(())
//! # }
//! ```

mod adjust;
mod background;
pub mod codec;
mod convolve;
pub mod error;
mod geometry;
mod ops;
pub mod palette;
mod pixel;
mod text;

pub use crate::adjust::Filters;
pub use crate::background::RemoveBackground;
pub use crate::codec::{DEFAULT_QUALITY, OutputFormat};
pub use crate::convolve::MAX_BLUR_RADIUS;
pub use crate::geometry::{Crop, MAX_DIMENSION, Resize, SocialPreset};
pub use crate::ops::{Operation, Processed};
pub use crate::palette::Swatch;
pub use crate::text::{Anchor, TextOverlay, Watermark};
