//! Quality presets.
//!
//! | level | resize factor | jpeg quality | png convert | optimize |
//! |-------|---------------|--------------|-------------|----------|
//! | 0     | none          | 85           | no          | no       |
//! | 1     | 2.0           | 80           | yes         | yes      |
//! | 2     | 1.5           | 75           | yes         | yes      |
//! | 3     | 1.0           | 70           | yes         | yes      |

use std::fmt;

/// Quality used when a stage has to re-encode without a user setting
/// (format conversion and resampling).
pub const CONVERT_QUALITY: u8 = 95;

/// Highest preset level.
pub const MAX_PRESET: u8 = 3;

/// Resize factors below this may look blurry on high-density displays.
pub const SAFE_RESIZE_FACTOR: f64 = 2.0;

/// JPEG qualities below this show visible artifacts.
pub const SAFE_JPEG_QUALITY: u8 = 80;

const DEFAULT_JPEG_QUALITY: u8 = 85;

/// Effective pipeline settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Settings {
    /// `Some` enables the resize stage.
    pub resize_factor: Option<f64>,
    pub jpeg_quality: u8,
    /// Convert opaque PNGs to JPEG during format normalization.
    pub png_convert: bool,
    /// Run the optimize stage.
    pub optimize: bool,
}

/// Values given explicitly by the user. Only level 0 honours them.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Overrides {
    pub resize_factor: Option<f64>,
    pub jpeg_quality: Option<u8>,
    pub png_convert: bool,
}

impl Overrides {
    pub fn is_empty(&self) -> bool {
        self.resize_factor.is_none() && self.jpeg_quality.is_none() && !self.png_convert
    }
}

impl Settings {
    /// Table lookup. `None` for levels above [`MAX_PRESET`].
    pub const fn preset(level: u8) -> Option<Self> {
        let settings = match level {
            0 => Self {
                resize_factor: None,
                jpeg_quality: DEFAULT_JPEG_QUALITY,
                png_convert: false,
                optimize: false,
            },
            1 => Self::lossy(2.0, 80),
            2 => Self::lossy(1.5, 75),
            3 => Self::lossy(1.0, 70),
            _ => return None,
        };
        Some(settings)
    }

    const fn lossy(resize_factor: f64, jpeg_quality: u8) -> Self {
        Self {
            resize_factor: Some(resize_factor),
            jpeg_quality,
            png_convert: true,
            optimize: true,
        }
    }

    /// Settings for `level`, with `overrides` applied on level 0.
    pub fn resolve(level: u8, overrides: Overrides) -> Option<Self> {
        let mut settings = Self::preset(level)?;
        if level == 0 {
            settings.resize_factor = overrides.resize_factor;
            if let Some(quality) = overrides.jpeg_quality {
                settings.jpeg_quality = quality;
                settings.optimize = true;
            }
            settings.png_convert = overrides.png_convert;
        }
        Some(settings)
    }

    /// Settings that are likely to degrade visible quality.
    pub fn warnings(&self) -> Vec<QualityWarning> {
        let mut warnings = Vec::new();
        if let Some(factor) = self.resize_factor
            && factor < SAFE_RESIZE_FACTOR
        {
            warnings.push(QualityWarning::ResizeFactor(factor));
        }
        if self.optimize && self.jpeg_quality < SAFE_JPEG_QUALITY {
            warnings.push(QualityWarning::JpegQuality(self.jpeg_quality));
        }
        warnings
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            resize_factor: None,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            png_convert: false,
            optimize: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum QualityWarning {
    ResizeFactor(f64),
    JpegQuality(u8),
}

impl fmt::Display for QualityWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ResizeFactor(factor) => write!(
                f,
                "resize factor {factor} is below {SAFE_RESIZE_FACTOR}, images may look blurry on high resolution displays"
            ),
            Self::JpegQuality(quality) => write!(
                f,
                "JPEG quality {quality} is below {SAFE_JPEG_QUALITY}, compression artifacts may become visible"
            ),
        }
    }
}
