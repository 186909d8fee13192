//! Image codec collaborator.
//!
//! The pipeline only needs three operations from a codec: decode bytes into a
//! raster, encode a raster in a format at a quality, and resample a raster.
//! [`ImageCodec`] implements them with the `image` crate.

mod image_codec;

pub use image_codec::ImageCodec;

use std::fmt;
use std::path::Path;

use thiserror::Error;

/// Decoded pixels.
pub type Raster = image::DynamicImage;

/// Image formats found in presentation archives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    Jpeg,
    Png,
    Tiff,
    Gif,
}

impl ImageFormat {
    /// Recognize a format by file extension (case-insensitive).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "tif" | "tiff" => Some(Self::Tiff),
            "gif" => Some(Self::Gif),
            _ => None,
        }
    }

    /// Recognize a format from a file name.
    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        path.as_ref()
            .extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    /// Canonical extension written when a file changes format.
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Tiff => "tiff",
            Self::Gif => "gif",
        }
    }

    /// Formats that are kept as they are by format normalization.
    pub const fn is_accepted(self) -> bool {
        !matches!(self, Self::Tiff)
    }

    /// Formats the pipeline may resample and re-encode.
    pub const fn is_reencodable(self) -> bool {
        matches!(self, Self::Jpeg | Self::Png)
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Jpeg => "JPEG",
            Self::Png => "PNG",
            Self::Tiff => "TIFF",
            Self::Gif => "GIF",
        };
        f.write_str(name)
    }
}

/// Pixel dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// True when `self` is strictly smaller than `other` in at least one axis
    /// and not larger in any.
    pub const fn is_smaller_than(self, other: Self) -> bool {
        self.width <= other.width
            && self.height <= other.height
            && (self.width < other.width || self.height < other.height)
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("cannot decode image: {0}")]
    Unsupported(String),

    #[error("cannot encode {format}: {reason}")]
    Encoding {
        format: ImageFormat,
        reason: String,
    },
}

/// Codec operations used by the pipeline.
pub trait Codec: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> Result<Raster, CodecError>;

    /// Encode `raster`. `quality` (0–100) only matters for lossy formats.
    fn encode(&self, raster: &Raster, format: ImageFormat, quality: u8)
    -> Result<Vec<u8>, CodecError>;

    fn resize(&self, raster: &Raster, target: Dimensions) -> Raster;
}

/// Dimensions of a decoded raster.
pub fn dimensions(raster: &Raster) -> Dimensions {
    Dimensions::new(raster.width(), raster.height())
}
