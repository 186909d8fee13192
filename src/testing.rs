//! Test doubles and fixture builders shared by the unit tests.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use image::DynamicImage;
use parking_lot::Mutex;
use serde_json::{Value, json};

use crate::archive::{Archive, ArchiveError, DirectoryArchive, PayloadUpdate};
use crate::codec::{Codec, CodecError, Dimensions, ImageFormat, Raster};
use crate::index::ImageIndex;
use crate::metadata::Fragment;
use crate::report::{Reporter, StageEvent, Warning};

// ============================================================================
// Fake codec
// ============================================================================

const MAGIC: &[u8; 4] = b"FAKE";
const HEADER_LEN: usize = 13;

/// Bytes the fake codec decodes as a `width`×`height` raster, padded to `len`.
pub fn fake_image(width: u32, height: u32, alpha: bool, len: usize) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(len.max(HEADER_LEN));
    bytes.extend_from_slice(MAGIC);
    bytes.push(u8::from(alpha));
    bytes.extend_from_slice(&width.to_le_bytes());
    bytes.extend_from_slice(&height.to_le_bytes());
    bytes.resize(len.max(HEADER_LEN), 0);
    bytes
}

/// Deterministic codec: output size depends only on pixel count, format and
/// quality, so tests can predict every stage result.
#[derive(Debug, Default)]
pub struct FakeCodec {
    failing: Option<ImageFormat>,
    failing_quality: Option<u8>,
}

impl FakeCodec {
    /// A codec whose encoder fails for `format`.
    pub fn failing(format: ImageFormat) -> Self {
        Self {
            failing: Some(format),
            failing_quality: None,
        }
    }

    /// A codec whose encoder fails for `format` at `quality` only.
    pub fn failing_at(format: ImageFormat, quality: u8) -> Self {
        Self {
            failing: Some(format),
            failing_quality: Some(quality),
        }
    }

    pub fn encoded_len(width: u32, height: u32, format: ImageFormat, quality: u8) -> u64 {
        let area = u64::from(width) * u64::from(height);
        let body = match format {
            ImageFormat::Jpeg => area * u64::from(quality) / 100,
            ImageFormat::Png => area * 2,
            ImageFormat::Tiff | ImageFormat::Gif => area * 4,
        };
        HEADER_LEN as u64 + body
    }
}

impl Codec for FakeCodec {
    fn decode(&self, bytes: &[u8]) -> Result<Raster, CodecError> {
        if bytes.len() < HEADER_LEN || &bytes[..4] != MAGIC {
            return Err(CodecError::Unsupported("unknown signature".into()));
        }
        let word = |at: usize| {
            u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
        };
        let (width, height) = (word(5), word(9));
        Ok(if bytes[4] != 0 {
            DynamicImage::new_rgba8(width, height)
        } else {
            DynamicImage::new_rgb8(width, height)
        })
    }

    fn encode(
        &self,
        raster: &Raster,
        format: ImageFormat,
        quality: u8,
    ) -> Result<Vec<u8>, CodecError> {
        if self.failing == Some(format) && self.failing_quality.is_none_or(|q| q == quality) {
            return Err(CodecError::Encoding {
                format,
                reason: "encoder unavailable".into(),
            });
        }
        let alpha = raster.color().has_alpha() && format != ImageFormat::Jpeg;
        let len = Self::encoded_len(raster.width(), raster.height(), format, quality);
        Ok(fake_image(raster.width(), raster.height(), alpha, len as usize))
    }

    fn resize(&self, raster: &Raster, target: Dimensions) -> Raster {
        if raster.color().has_alpha() {
            DynamicImage::new_rgba8(target.width, target.height)
        } else {
            DynamicImage::new_rgb8(target.width, target.height)
        }
    }
}

// ============================================================================
// Recording reporter
// ============================================================================

#[derive(Debug, Default)]
pub struct RecordingReporter {
    events: Mutex<Vec<StageEvent>>,
    warnings: Mutex<Vec<Warning>>,
}

impl RecordingReporter {
    pub fn events(&self) -> Vec<StageEvent> {
        self.events.lock().clone()
    }

    pub fn warnings(&self) -> Vec<Warning> {
        self.warnings.lock().clone()
    }
}

impl Reporter for RecordingReporter {
    fn stage(&self, event: &StageEvent) {
        self.events.lock().push(event.clone());
    }

    fn warning(&self, warning: &Warning) {
        self.warnings.lock().push(warning.clone());
    }
}

// ============================================================================
// In-memory archive
// ============================================================================

#[derive(Debug, Clone)]
pub struct MemoryArchive {
    metadata: Fragment,
    fragments: Vec<Fragment>,
    files: BTreeMap<String, Vec<u8>>,
}

impl MemoryArchive {
    pub fn new(metadata: Fragment) -> Self {
        Self {
            metadata,
            fragments: Vec::new(),
            files: BTreeMap::new(),
        }
    }

    pub fn with_image(mut self, filename: &str, bytes: Vec<u8>) -> Self {
        self.files.insert(filename.to_string(), bytes);
        self
    }

    pub fn with_fragment(mut self, fragment: Fragment) -> Self {
        self.fragments.push(fragment);
        self
    }

    pub fn file(&self, filename: &str) -> Option<&[u8]> {
        self.files.get(filename).map(Vec::as_slice)
    }
}

impl Archive for MemoryArchive {
    fn metadata(&self) -> Result<Fragment, ArchiveError> {
        Ok(self.metadata.clone())
    }

    fn fragments(&self) -> Result<Vec<Fragment>, ArchiveError> {
        let mut fragments = self.fragments.clone();
        fragments.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(fragments)
    }

    fn image_files(&self) -> Result<Vec<String>, ArchiveError> {
        Ok(self
            .files
            .keys()
            .filter(|name| ImageFormat::from_path(name).is_some())
            .cloned()
            .collect())
    }

    fn read_image(&self, filename: &str) -> Result<Vec<u8>, ArchiveError> {
        self.files
            .get(filename)
            .cloned()
            .ok_or_else(|| ArchiveError::Layout(format!("no file `{filename}`")))
    }

    fn write_back(&mut self, updates: &[PayloadUpdate<'_>]) -> Result<(), ArchiveError> {
        for update in updates {
            if update.is_renamed() {
                self.files.remove(update.source_filename);
            }
            self.files
                .insert(update.filename.to_string(), update.bytes.to_vec());
        }
        Ok(())
    }
}

// ============================================================================
// Fixtures
// ============================================================================

/// Wrap objects into a one-chunk, one-archive fragment.
pub fn fragment(name: &str, objects: Vec<Value>) -> Fragment {
    Fragment::from_value(name, &fragment_json(objects)).unwrap()
}

fn fragment_json(objects: Vec<Value>) -> Value {
    json!({ "chunks": [ { "archives": [ { "objects": objects } ] } ] })
}

/// Root metadata listing `(identifier, fileName)` data entries.
pub fn metadata_fragment(entries: &[(Option<u64>, Option<&str>)]) -> Fragment {
    let datas: Vec<Value> = entries
        .iter()
        .map(|(id, name)| {
            let mut entry = serde_json::Map::new();
            if let Some(id) = id {
                entry.insert("identifier".into(), json!(id));
            }
            if let Some(name) = name {
                entry.insert("fileName".into(), json!(name));
            }
            Value::Object(entry)
        })
        .collect();
    fragment("Metadata", vec![package_metadata_object(datas)])
}

fn package_metadata_object(datas: Vec<Value>) -> Value {
    json!({ "_pbtype": "TSP.PackageMetadata", "datas": datas })
}

/// Image placed on a slide at `width`×`height` points.
pub fn image_object(id: u64, width: f64, height: f64) -> Value {
    json!({
        "_pbtype": "TSD.ImageArchive",
        "super": { "geometry": { "size": { "width": width, "height": height } } },
        "data": { "identifier": id }
    })
}

/// Slide style with an image fill.
pub fn style_object(id: u64) -> Value {
    json!({
        "_pbtype": "KN.SlideStyleArchive",
        "slideProperties": { "fill": { "image": { "imagedata": { "identifier": id } } } }
    })
}

/// Slide style with a color fill.
pub fn color_style_object() -> Value {
    json!({
        "_pbtype": "KN.SlideStyleArchive",
        "slideProperties": { "fill": { "color": { "r": 0.2, "g": 0.2, "b": 0.2, "a": 1.0 } } }
    })
}

/// Document root declaring the slide size.
pub fn show_object(width: u32, height: u32) -> Value {
    json!({ "_pbtype": "KN.ShowArchive", "size": { "width": width, "height": height } })
}

/// Index over `(identifier, fileName, bytes)` with payloads attached.
pub fn loaded_index(images: Vec<(u64, &str, Vec<u8>)>) -> ImageIndex {
    let entries: Vec<_> = images.iter().map(|(id, name, _)| (Some(*id), Some(*name))).collect();
    let metadata = metadata_fragment(&entries);
    let mut index = ImageIndex::build(&metadata).unwrap();
    let archive = images
        .into_iter()
        .fold(MemoryArchive::new(metadata), |archive, (_, name, bytes)| {
            archive.with_image(name, bytes)
        });
    index.load_payloads(&archive).unwrap();
    index
}

/// Writes an unpacked archive directory.
#[derive(Debug, Default)]
pub struct DeckBuilder {
    files: Vec<(u64, String, Vec<u8>)>,
    fragments: Vec<(String, Value)>,
}

impl DeckBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// A data file listed in the package metadata.
    pub fn image(mut self, id: u64, filename: &str, bytes: &[u8]) -> Self {
        self.files.push((id, filename.to_string(), bytes.to_vec()));
        self
    }

    pub fn fragment(mut self, name: &str, value: Value) -> Self {
        self.fragments.push((name.to_string(), value));
        self
    }

    /// A fragment made of `objects`.
    pub fn slide(self, name: &str, objects: Vec<Value>) -> Self {
        self.fragment(name, fragment_json(objects))
    }

    pub fn write(self, root: &Path) -> DirectoryArchive {
        let index = root.join("Index");
        let data = root.join("Data");
        fs::create_dir_all(&index).unwrap();
        fs::create_dir_all(&data).unwrap();

        let datas: Vec<Value> = self
            .files
            .iter()
            .map(|(id, name, bytes)| {
                json!({
                    "identifier": id.to_string(),
                    "fileName": name,
                    "preferredFileName": name,
                    "size": bytes.len(),
                })
            })
            .collect();
        let metadata = fragment_json(vec![package_metadata_object(datas)]);
        fs::write(
            index.join("Metadata.json"),
            serde_json::to_string_pretty(&metadata).unwrap(),
        )
        .unwrap();

        for (name, value) in &self.fragments {
            fs::write(
                index.join(format!("{name}.json")),
                serde_json::to_string_pretty(value).unwrap(),
            )
            .unwrap();
        }
        for (_, name, bytes) in &self.files {
            fs::write(data.join(name), bytes).unwrap();
        }

        DirectoryArchive::open(root).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fake_codec_predicts_sizes() {
        let codec = FakeCodec::default();
        let raster = codec.decode(&fake_image(500, 500, false, 1_000_000)).unwrap();
        let jpeg = codec.encode(&raster, ImageFormat::Jpeg, 95).unwrap();
        assert_eq!(jpeg.len(), 237_513);
        assert_eq!(codec.decode(&jpeg).unwrap().width(), 500);
        assert!(codec.decode(b"garbage").is_err());
    }
}
