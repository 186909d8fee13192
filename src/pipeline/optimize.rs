//! Recompression in the current format.

use super::{Pipeline, StageError};
use crate::codec::ImageFormat;
use crate::index::{ImageRecord, Payload, Stage, StageSize};

impl Pipeline<'_> {
    /// Re-encode JPEG at `quality` and PNG at maximum compression.
    pub fn optimize(&self, record: &mut ImageRecord, quality: u8) -> Result<StageSize, StageError> {
        let payload = record.payload.as_ref().ok_or(StageError::MissingPayload)?;
        let format = payload.format;
        if !matches!(format, ImageFormat::Jpeg | ImageFormat::Png) {
            return self.commit(Stage::Optimize, record, None);
        }

        let raster = self.codec.decode(&payload.bytes)?;
        let mut next = Payload::new(self.codec.encode(&raster, format, quality)?, format);
        next.dimensions = payload.dimensions;
        self.commit(Stage::Optimize, record, Some(next))
    }
}
