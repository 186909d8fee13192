//! [`Codec`] on top of the `image` crate.
//!
//! JPEG is encoded at the requested quality after dropping alpha, PNG at the
//! best compression with adaptive filtering. Resampling uses Lanczos3.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::imageops::FilterType;
use image::DynamicImage;

use super::{Codec, CodecError, Dimensions, ImageFormat, Raster};

/// Codec backed by the `image` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageCodec;

impl Codec for ImageCodec {
    fn decode(&self, bytes: &[u8]) -> Result<Raster, CodecError> {
        image::load_from_memory(bytes).map_err(|e| CodecError::Unsupported(e.to_string()))
    }

    fn encode(
        &self,
        raster: &Raster,
        format: ImageFormat,
        quality: u8,
    ) -> Result<Vec<u8>, CodecError> {
        let encoding = |e: image::ImageError| CodecError::Encoding {
            format,
            reason: e.to_string(),
        };
        let mut buf = Vec::new();

        match format {
            ImageFormat::Jpeg => {
                // JPEG has no alpha channel
                let rgb = DynamicImage::ImageRgb8(raster.to_rgb8());
                let encoder = JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100));
                rgb.write_with_encoder(encoder).map_err(encoding)?;
            }
            ImageFormat::Png => {
                let encoder = PngEncoder::new_with_quality(
                    &mut buf,
                    CompressionType::Best,
                    PngFilter::Adaptive,
                );
                raster.write_with_encoder(encoder).map_err(encoding)?;
            }
            ImageFormat::Tiff | ImageFormat::Gif => {
                raster
                    .write_to(&mut Cursor::new(&mut buf), to_image_format(format))
                    .map_err(encoding)?;
            }
        }

        Ok(buf)
    }

    fn resize(&self, raster: &Raster, target: Dimensions) -> Raster {
        raster.resize_exact(target.width, target.height, FilterType::Lanczos3)
    }
}

fn to_image_format(format: ImageFormat) -> image::ImageFormat {
    match format {
        ImageFormat::Jpeg => image::ImageFormat::Jpeg,
        ImageFormat::Png => image::ImageFormat::Png,
        ImageFormat::Tiff => image::ImageFormat::Tiff,
        ImageFormat::Gif => image::ImageFormat::Gif,
    }
}
