//! Downsampling to the largest display size.
//!
//! An image shown at 400×300 points with factor 2.0 needs at most 800×600
//! pixels. The scale keeps the aspect ratio and covers both axes, so the
//! larger of the two per-axis ratios wins. Images are never upscaled.

use super::settings::CONVERT_QUALITY;
use super::{Pipeline, StageError};
use crate::codec::{Dimensions, dimensions};
use crate::index::{ImageRecord, Payload, Stage, StageSize};
use crate::metadata::Size;

impl Pipeline<'_> {
    pub fn resize(
        &self,
        record: &mut ImageRecord,
        max_ratio_factor: f64,
    ) -> Result<StageSize, StageError> {
        let payload = record.payload.as_ref().ok_or(StageError::MissingPayload)?;
        let format = payload.format;

        let Some(display) = record.display_size() else {
            return self.commit(Stage::Resize, record, None);
        };
        if !format.is_reencodable() {
            return self.commit(Stage::Resize, record, None);
        }

        let raster = self.codec.decode(&payload.bytes)?;
        let Some(target) = resize_target(dimensions(&raster), display, max_ratio_factor) else {
            return self.commit(Stage::Resize, record, None);
        };

        let resized = self.codec.resize(&raster, target);
        let mut next = Payload::new(self.codec.encode(&resized, format, CONVERT_QUALITY)?, format);
        next.dimensions = Some(target);
        self.commit(Stage::Resize, record, Some(next))
    }
}

/// Pixel size needed to show `current` at `display` points with `factor`
/// pixels per point, or `None` when the image is already small enough.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub(crate) fn resize_target(current: Dimensions, display: Size, factor: f64) -> Option<Dimensions> {
    if current.width == 0 || current.height == 0 {
        return None;
    }

    let width = f64::from(current.width);
    let height = f64::from(current.height);
    let scale = (f64::from(display.width) * factor / width)
        .max(f64::from(display.height) * factor / height);
    if scale.is_nan() || scale >= 1.0 {
        return None;
    }

    let target = Dimensions::new(
        ((width * scale).ceil() as u32).clamp(1, current.width),
        ((height * scale).ceil() as u32).clamp(1, current.height),
    );
    target.is_smaller_than(current).then_some(target)
}
