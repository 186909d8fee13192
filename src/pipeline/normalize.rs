//! Format normalization.
//!
//! TIFF is always converted: to JPEG, or to PNG when the image has an alpha
//! channel. Opaque PNGs are converted to JPEG only when `png_convert` is set,
//! at the configured JPEG quality. Every other format passes through.

use super::settings::CONVERT_QUALITY;
use super::{Pipeline, StageError};
use crate::codec::{ImageFormat, dimensions};
use crate::index::{ImageRecord, Payload, Stage, StageSize};

impl Pipeline<'_> {
    pub fn normalize_format(&self, record: &mut ImageRecord) -> Result<StageSize, StageError> {
        let payload = record.payload.as_ref().ok_or(StageError::MissingPayload)?;
        let format = payload.format;

        let convertible =
            !format.is_accepted() || (format == ImageFormat::Png && self.settings.png_convert);
        if !convertible {
            return self.commit(Stage::Normalize, record, None);
        }

        let raster = self.codec.decode(&payload.bytes)?;
        let has_alpha = raster.color().has_alpha();
        let target = match (format, has_alpha) {
            (ImageFormat::Tiff, true) => ImageFormat::Png,
            // Transparent PNGs stay PNG
            (_, true) => return self.commit(Stage::Normalize, record, None),
            (_, false) => ImageFormat::Jpeg,
        };

        let quality = match format {
            ImageFormat::Png => self.settings.jpeg_quality,
            _ => CONVERT_QUALITY,
        };
        let mut next = Payload::new(self.codec.encode(&raster, target, quality)?, target);
        next.dimensions = Some(dimensions(&raster));
        self.commit(Stage::Normalize, record, Some(next))
    }
}
