//! One embedded image and its transformation lineage.

use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;

use crate::codec::{Dimensions, ImageFormat};
use crate::metadata::{ObjectPath, Size};

/// Identifier assigned to an image by the archive format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ImageId(pub u64);

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    Normalize,
    Resize,
    Optimize,
}

impl Stage {
    pub const ALL: [Self; 3] = [Self::Normalize, Self::Resize, Self::Optimize];

    pub const fn name(self) -> &'static str {
        match self {
            Self::Normalize => "convert",
            Self::Resize => "resize",
            Self::Optimize => "optimize",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How an image is referenced from a fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ReferenceKind {
    /// Image placed on a slide.
    Slide,
    /// Image used as a slide style fill (background).
    Style,
}

/// A structural location that uses an image.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Reference {
    pub fragment: String,
    pub path: ObjectPath,
    pub kind: ReferenceKind,
    /// Size the image is displayed at, in points.
    pub display: Option<Size>,
}

/// Current image content, exclusively owned by its record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    pub bytes: Vec<u8>,
    pub format: ImageFormat,
    /// Known once the payload has been decoded.
    pub dimensions: Option<Dimensions>,
}

impl Payload {
    pub fn new(bytes: Vec<u8>, format: ImageFormat) -> Self {
        Self {
            bytes,
            format,
            dimensions: None,
        }
    }

    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Size after a stage that ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageSize {
    pub bytes: u64,
    /// `false` marks a no-op: the stage ran and kept the prior payload.
    pub applied: bool,
}

impl StageSize {
    pub const fn applied(bytes: u64) -> Self {
        Self {
            bytes,
            applied: true,
        }
    }

    pub const fn noop(bytes: u64) -> Self {
        Self {
            bytes,
            applied: false,
        }
    }
}

/// Byte sizes along the pipeline. `None` means the stage did not run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Lineage {
    pub original: u64,
    pub converted: Option<StageSize>,
    pub resized: Option<StageSize>,
    pub optimized: Option<StageSize>,
}

impl Lineage {
    pub const fn new(original: u64) -> Self {
        Self {
            original,
            converted: None,
            resized: None,
            optimized: None,
        }
    }

    pub fn converted_bytes(&self) -> u64 {
        self.converted.map_or(self.original, |s| s.bytes)
    }

    pub fn resized_bytes(&self) -> u64 {
        self.resized.map_or(self.converted_bytes(), |s| s.bytes)
    }

    pub fn optimized_bytes(&self) -> u64 {
        self.optimized.map_or(self.resized_bytes(), |s| s.bytes)
    }

    /// Size after the last stage that ran.
    pub fn current_bytes(&self) -> u64 {
        self.optimized_bytes()
    }

    /// `optimized ≤ resized ≤ converted ≤ original`.
    pub fn is_non_increasing(&self) -> bool {
        self.optimized_bytes() <= self.resized_bytes()
            && self.resized_bytes() <= self.converted_bytes()
            && self.converted_bytes() <= self.original
    }

    pub fn get(&self, stage: Stage) -> Option<StageSize> {
        match stage {
            Stage::Normalize => self.converted,
            Stage::Resize => self.resized,
            Stage::Optimize => self.optimized,
        }
    }

    pub(crate) fn set(&mut self, stage: Stage, size: StageSize) {
        let slot = match stage {
            Stage::Normalize => &mut self.converted,
            Stage::Resize => &mut self.resized,
            Stage::Optimize => &mut self.optimized,
        };
        *slot = Some(size);
    }

    /// Size entering `stage`.
    pub fn before(&self, stage: Stage) -> u64 {
        match stage {
            Stage::Normalize => self.original,
            Stage::Resize => self.converted_bytes(),
            Stage::Optimize => self.resized_bytes(),
        }
    }
}

/// Stage error recorded on a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageFailure {
    pub stage: Stage,
    pub message: String,
}

/// One embedded image.
#[derive(Debug, Clone)]
pub struct ImageRecord {
    id: ImageId,
    /// File name inside the archive's data area.
    pub filename: String,
    /// File name the record was indexed under (before any extension change).
    source_filename: String,
    pub lineage: Lineage,
    pub references: BTreeSet<Reference>,
    pub payload: Option<Payload>,
    pub failure: Option<StageFailure>,
}

impl ImageRecord {
    pub fn new(id: ImageId, filename: impl Into<String>, declared_size: u64) -> Self {
        let filename = filename.into();
        Self {
            id,
            source_filename: filename.clone(),
            filename,
            lineage: Lineage::new(declared_size),
            references: BTreeSet::new(),
            payload: None,
            failure: None,
        }
    }

    pub fn id(&self) -> ImageId {
        self.id
    }

    pub fn source_filename(&self) -> &str {
        &self.source_filename
    }

    /// Format of the current payload, or the one implied by the file name.
    pub fn format(&self) -> Option<ImageFormat> {
        self.payload
            .as_ref()
            .map(|p| p.format)
            .or_else(|| ImageFormat::from_path(&self.filename))
    }

    /// Attach the physical bytes. The original size becomes the physical length.
    pub fn attach(&mut self, bytes: Vec<u8>, format: ImageFormat) {
        let payload = Payload::new(bytes, format);
        self.lineage = Lineage::new(payload.len());
        self.payload = Some(payload);
    }

    /// Whether any stage changed the payload.
    pub fn is_modified(&self) -> bool {
        Stage::ALL
            .iter()
            .any(|stage| self.lineage.get(*stage).is_some_and(|s| s.applied))
    }

    pub fn is_renamed(&self) -> bool {
        self.filename != self.source_filename
    }

    /// Switch the file name to `format`'s extension.
    pub(crate) fn rename_for(&mut self, format: ImageFormat) {
        self.filename = Path::new(&self.filename)
            .with_extension(format.extension())
            .to_string_lossy()
            .into_owned();
    }

    /// Source name with the current format's extension.
    pub fn natural_filename(&self) -> String {
        match self.format() {
            Some(format) => Path::new(&self.source_filename)
                .with_extension(format.extension())
                .to_string_lossy()
                .into_owned(),
            None => self.filename.clone(),
        }
    }

    /// Largest display size over all references.
    pub fn display_size(&self) -> Option<Size> {
        self.references
            .iter()
            .filter_map(|r| r.display)
            .reduce(|a, b| Size::new(a.width.max(b.width), a.height.max(b.height)))
    }
}
