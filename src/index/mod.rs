//! Identifier → image record mapping.
//!
//! Records live in an arena in metadata order; lookups go through a hash map
//! from identifier to arena slot. The index is written while it is built and
//! while payloads are attached, then only the records themselves change.

mod error;
mod record;

pub use error::IndexError;
pub use record::{
    ImageId, ImageRecord, Lineage, Payload, Reference, ReferenceKind, Stage, StageFailure,
    StageSize,
};

use std::path::Path;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::archive::Archive;
use crate::codec::ImageFormat;
use crate::metadata::Fragment;

#[derive(Debug, Clone, Default)]
pub struct ImageIndex {
    records: Vec<ImageRecord>,
    slots: FxHashMap<ImageId, usize>,
}

impl ImageIndex {
    /// Build the index from the root metadata fragment.
    ///
    /// Data entries that are not images (movies, fonts, ...) are skipped.
    pub fn build(metadata: &Fragment) -> Result<Self, IndexError> {
        let entries = metadata
            .package_metadata()
            .ok_or_else(|| IndexError::MissingPackageMetadata {
                fragment: metadata.name.clone(),
            })?;

        let mut index = Self::default();
        let mut by_id: FxHashMap<ImageId, &str> = FxHashMap::default();
        let mut by_filename: FxHashMap<&str, ImageId> = FxHashMap::default();

        for (position, entry) in entries.iter().enumerate() {
            let id = ImageId(
                entry
                    .identifier
                    .ok_or(IndexError::MissingIdentifier { position })?,
            );
            let filename = entry
                .file_name
                .as_deref()
                .ok_or(IndexError::MissingFilename { id })?;

            if let Some(first) = by_id.insert(id, filename) {
                return Err(IndexError::DuplicateIdentifier {
                    id,
                    first: first.to_string(),
                    second: filename.to_string(),
                });
            }

            if ImageFormat::from_path(filename).is_none() {
                continue;
            }

            if let Some(&first) = by_filename.get(filename) {
                return Err(IndexError::DuplicateFilename {
                    filename: filename.to_string(),
                    first,
                    second: id,
                });
            }
            by_filename.insert(filename, id);

            index.slots.insert(id, index.records.len());
            index
                .records
                .push(ImageRecord::new(id, filename, entry.size.unwrap_or(0)));
        }

        Ok(index)
    }

    /// Read every record's bytes from the archive and check that records and
    /// physical image files match one to one.
    pub fn load_payloads(&mut self, archive: &dyn Archive) -> Result<(), IndexError> {
        let known: FxHashSet<&str> = self.records.iter().map(|r| r.filename.as_str()).collect();
        let files = archive.image_files().map_err(|e| IndexError::Unreadable {
            filename: "data area".into(),
            reason: e.to_string(),
        })?;

        if let Some(orphan) = files.iter().find(|f| !known.contains(f.as_str())) {
            return Err(IndexError::OrphanImage {
                filename: orphan.clone(),
            });
        }

        let present: FxHashSet<&str> = files.iter().map(String::as_str).collect();
        if let Some(missing) = self
            .records
            .iter()
            .find(|r| !present.contains(r.filename.as_str()))
        {
            return Err(IndexError::MissingImage {
                id: missing.id(),
                filename: missing.filename.clone(),
            });
        }

        for record in &mut self.records {
            let bytes =
                archive
                    .read_image(&record.filename)
                    .map_err(|e| IndexError::Unreadable {
                        filename: record.filename.clone(),
                        reason: e.to_string(),
                    })?;
            // Indexed records always have an image extension
            let format = ImageFormat::from_path(&record.filename).unwrap_or(ImageFormat::Jpeg);
            record.attach(bytes, format);
        }

        Ok(())
    }

    /// Give every renamed record a file name no other record uses or used.
    ///
    /// Names compare case-insensitively. A taken name gets a numbered stem
    /// (`photo.jpg` → `photo-1.jpg`). Returns the records whose name changed;
    /// calling it again changes nothing.
    pub fn claim_filenames(&mut self) -> Vec<ImageId> {
        let mut taken: FxHashSet<String> = self
            .records
            .iter()
            .map(|r| r.source_filename().to_lowercase())
            .collect();

        let mut moved = Vec::new();
        for record in self.records.iter_mut().filter(|r| r.is_renamed()) {
            let natural = record.natural_filename();
            let mut candidate = natural.clone();
            let mut n = 0;
            while taken.contains(&candidate.to_lowercase()) {
                n += 1;
                candidate = numbered(&natural, n);
            }
            taken.insert(candidate.to_lowercase());
            if candidate != record.filename {
                moved.push(record.id());
                record.filename = candidate;
            }
        }
        moved
    }

    pub fn get(&self, id: ImageId) -> Option<&ImageRecord> {
        self.slots.get(&id).map(|&slot| &self.records[slot])
    }

    pub fn get_mut(&mut self, id: ImageId) -> Option<&mut ImageRecord> {
        self.slots.get(&id).map(|&slot| &mut self.records[slot])
    }

    pub fn contains(&self, id: ImageId) -> bool {
        self.slots.contains_key(&id)
    }

    /// Records in metadata order.
    pub fn records(&self) -> &[ImageRecord] {
        &self.records
    }

    /// Records in metadata order, for in-place stage execution.
    pub fn records_mut(&mut self) -> &mut [ImageRecord] {
        &mut self.records
    }

    pub fn ids(&self) -> impl Iterator<Item = ImageId> + '_ {
        self.records.iter().map(ImageRecord::id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// `dir/stem.ext` → `dir/stem-n.ext`.
fn numbered(filename: &str, n: usize) -> String {
    let path = Path::new(filename);
    let stem = path.file_stem().unwrap_or_default().to_string_lossy();
    let name = match path.extension() {
        Some(ext) => format!("{stem}-{n}.{}", ext.to_string_lossy()),
        None => format!("{stem}-{n}"),
    };
    path.with_file_name(name).to_string_lossy().into_owned()
}
