//! Configuration management for `deckslim.toml`.
//!
//! # Sections
//!
//! | Section     | Purpose                                           |
//! |-------------|---------------------------------------------------|
//! | `[quality]` | Preset level and explicit quality overrides       |
//! | `[scan]`    | Fallback slide size, dangling style fill warnings |
//!
//! # Example
//!
//! ```toml
//! [quality]
//! preset = 0            # 0-3, higher is smaller
//! resize_factor = 2.0   # pixels per point; enables resizing at preset 0
//! jpeg_quality = 85     # enables recompression at preset 0
//! png_convert = false   # convert opaque PNGs to JPEG
//!
//! [scan]
//! slide_width = 1920
//! slide_height = 1080
//! warn_dangling_styles = false
//! ```
//!
//! The file is optional. Command-line flags override file values.

mod error;

pub use error::ConfigError;

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::cli::SlimArgs;
use crate::log;
use crate::metadata::Size;
use crate::pipeline::settings::MAX_PRESET;
use crate::pipeline::{Overrides, Settings};
use crate::scan::{DEFAULT_SLIDE_SIZE, ScanOptions};

/// Config file looked up when `--config` is not given.
pub const DEFAULT_CONFIG: &str = "deckslim.toml";

// ============================================================================
// root configuration
// ============================================================================

/// Root configuration structure representing deckslim.toml
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeckConfig {
    /// Absolute path to the config file, if one was loaded (internal use only)
    #[serde(skip)]
    pub config_path: Option<PathBuf>,

    pub quality: QualityConfig,

    pub scan: ScanConfig,
}

/// `[quality]` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    /// Preset level 0-3.
    pub preset: u8,
    /// Honoured at preset 0 only.
    pub resize_factor: Option<f64>,
    /// Honoured at preset 0 only.
    pub jpeg_quality: Option<u8>,
    /// Honoured at preset 0 only.
    pub png_convert: bool,
}

/// `[scan]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Slide size used when the document does not declare one.
    pub slide_width: u32,
    pub slide_height: u32,
    /// Warn about style fills naming unknown images.
    pub warn_dangling_styles: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            slide_width: DEFAULT_SLIDE_SIZE.width,
            slide_height: DEFAULT_SLIDE_SIZE.height,
            warn_dangling_styles: false,
        }
    }
}

impl DeckConfig {
    /// Load configuration.
    ///
    /// An explicit path must exist. Without one, [`DEFAULT_CONFIG`] is searched
    /// upward from the current directory and defaults apply when none is found.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => find_config_file(Path::new(DEFAULT_CONFIG)),
        };

        let Some(path) = path else {
            return Ok(Self::default());
        };

        let mut config = Self::from_path(&path)?;
        config.config_path = Some(path);
        Ok(config)
    }

    /// Parse configuration from TOML string
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration from file path with unknown field detection.
    fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;

        let (config, ignored) = Self::parse_with_ignored(&content)?;
        if !ignored.is_empty() {
            log!(
                "warning";
                "ignoring unknown fields in {}: {}",
                path.display(),
                ignored.join(", ")
            );
        }
        Ok(config)
    }

    /// Parse TOML content, collecting any unknown fields.
    fn parse_with_ignored(content: &str) -> Result<(Self, Vec<String>), ConfigError> {
        let mut ignored = Vec::new();
        let deserializer = toml::Deserializer::new(content);
        let config = serde_ignored::deserialize(deserializer, |path: serde_ignored::Path| {
            ignored.push(path.to_string());
        })?;
        Ok((config, ignored))
    }

    // ========================================================================
    // cli configuration updates
    // ========================================================================

    /// Apply `slim` arguments from CLI. Flags win over file values.
    pub fn apply_args(&mut self, args: &SlimArgs) {
        Self::update_option(&mut self.quality.preset, args.quality.as_ref());
        if args.resize_factor.is_some() {
            self.quality.resize_factor = args.resize_factor;
        }
        if args.jpeg_quality.is_some() {
            self.quality.jpeg_quality = args.jpeg_quality;
        }
        self.quality.png_convert |= args.png_convert;
    }

    /// Update config option if CLI value is provided
    fn update_option<T: Clone>(config_option: &mut T, cli_option: Option<&T>) {
        if let Some(option) = cli_option {
            *config_option = option.clone();
        }
    }

    // ========================================================================
    // validation
    // ========================================================================

    pub fn validate(&self) -> Result<(), ConfigError> {
        let quality = &self.quality;
        if quality.preset > MAX_PRESET {
            return Err(ConfigError::Validation(format!(
                "quality.preset must be 0-{MAX_PRESET}, got {}",
                quality.preset
            )));
        }
        if let Some(q) = quality.jpeg_quality
            && q > 100
        {
            return Err(ConfigError::Validation(format!(
                "quality.jpeg_quality must be 0-100, got {q}"
            )));
        }
        if let Some(factor) = quality.resize_factor
            && !(factor.is_finite() && factor > 0.0)
        {
            return Err(ConfigError::Validation(format!(
                "quality.resize_factor must be a positive number, got {factor}"
            )));
        }
        if self.scan.slide_width == 0 || self.scan.slide_height == 0 {
            return Err(ConfigError::Validation(
                "scan.slide_width and scan.slide_height must be non-zero".into(),
            ));
        }
        Ok(())
    }

    // ========================================================================
    // derived settings
    // ========================================================================

    pub fn overrides(&self) -> Overrides {
        Overrides {
            resize_factor: self.quality.resize_factor,
            jpeg_quality: self.quality.jpeg_quality,
            png_convert: self.quality.png_convert,
        }
    }

    /// Effective pipeline settings.
    pub fn settings(&self) -> Result<Settings, ConfigError> {
        Settings::resolve(self.quality.preset, self.overrides()).ok_or_else(|| {
            ConfigError::Validation(format!("unknown quality preset {}", self.quality.preset))
        })
    }

    /// Scan options, preferring the slide size the document declares.
    pub fn scan_options(&self, declared: Option<Size>) -> ScanOptions {
        ScanOptions {
            slide_size: declared
                .unwrap_or(Size::new(self.scan.slide_width, self.scan.slide_height)),
            warn_dangling_styles: self.scan.warn_dangling_styles,
        }
    }
}

/// Find config file by searching upward from current directory
fn find_config_file(config_name: &Path) -> Option<PathBuf> {
    let cwd = std::env::current_dir().ok()?;
    cwd.ancestors()
        .map(|dir| dir.join(config_name))
        .find(|candidate| candidate.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;

    fn slim_args(args: &[&str]) -> SlimArgs {
        let cli = crate::cli::Cli::parse_from(
            ["deckslim", "slim", "deck"].iter().chain(args).copied(),
        );
        match cli.command {
            crate::cli::Commands::Slim { args } => args,
        }
    }

    #[test]
    fn test_defaults() {
        let config = DeckConfig::from_str("").unwrap();
        assert_eq!(config.quality.preset, 0);
        assert_eq!(config.scan.slide_width, 1920);
        assert!(config.validate().is_ok());
        assert_eq!(config.settings().unwrap(), Settings::default());
    }

    #[test]
    fn test_parse_sections() {
        let config = DeckConfig::from_str(
            "[quality]\npreset = 2\njpeg_quality = 60\n\n[scan]\nslide_width = 1024\nslide_height = 768\nwarn_dangling_styles = true",
        )
        .unwrap();
        assert_eq!(config.quality.preset, 2);
        assert_eq!(config.quality.jpeg_quality, Some(60));
        // Preset 2 ignores the explicit quality
        assert_eq!(config.settings().unwrap().jpeg_quality, 75);

        let options = config.scan_options(None);
        assert_eq!(options.slide_size, Size::new(1024, 768));
        assert!(options.warn_dangling_styles);
        assert_eq!(
            config.scan_options(Some(Size::new(800, 600))).slide_size,
            Size::new(800, 600)
        );
    }

    #[test]
    fn test_cli_overrides_file() {
        let mut config =
            DeckConfig::from_str("[quality]\npreset = 3\nresize_factor = 4.0").unwrap();
        config.apply_args(&slim_args(&["-q", "0", "--jpeg-quality", "90", "--png-convert"]));

        assert_eq!(config.quality.preset, 0);
        let settings = config.settings().unwrap();
        assert_eq!(settings.resize_factor, Some(4.0));
        assert_eq!(settings.jpeg_quality, 90);
        assert!(settings.optimize);
        assert!(settings.png_convert);
    }

    #[test]
    fn test_validation() {
        let invalid = [
            "[quality]\npreset = 4",
            "[quality]\njpeg_quality = 101",
            "[quality]\nresize_factor = 0.0",
            "[quality]\nresize_factor = -1.5",
            "[scan]\nslide_width = 0",
        ];
        for content in invalid {
            let config = DeckConfig::from_str(content).unwrap();
            assert!(
                matches!(config.validate(), Err(ConfigError::Validation(_))),
                "{content}"
            );
        }
        assert!(DeckConfig::from_str("[quality]\npreset = \"high\"").is_err());
    }

    #[test]
    fn test_load_reports_unknown_fields_and_missing_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("deckslim.toml");
        let mut file = fs::File::create(&path).unwrap();
        writeln!(file, "[quality]\npreset = 1\ncolour = \"red\"").unwrap();

        let (config, ignored) =
            DeckConfig::parse_with_ignored(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(config.quality.preset, 1);
        assert_eq!(ignored, vec!["quality.colour".to_string()]);

        let config = DeckConfig::load(Some(&path)).unwrap();
        assert_eq!(config.config_path.as_deref(), Some(path.as_path()));

        let missing = DeckConfig::load(Some(&dir.path().join("nope.toml")));
        assert!(matches!(missing, Err(ConfigError::Io(..))));
    }
}
