//! Archive collaborator.
//!
//! The pipeline never packs or unpacks containers itself. It reads metadata,
//! fragments and image bytes through [`Archive`] and hands back the changed
//! payloads as [`PayloadUpdate`]s.

mod dir;

pub use dir::DirectoryArchive;

use std::path::PathBuf;

use thiserror::Error;

use crate::index::{ImageId, ImageRecord};
use crate::metadata::Fragment;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("IO error at `{0}`")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("invalid metadata in `{0}`")]
    Json(PathBuf, #[source] serde_json::Error),

    #[error("{0}")]
    Layout(String),
}

/// A changed image to be written back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadUpdate<'a> {
    pub id: ImageId,
    /// Name the image was read from.
    pub source_filename: &'a str,
    /// Name to write it under (differs after a format change).
    pub filename: &'a str,
    pub bytes: &'a [u8],
}

impl<'a> PayloadUpdate<'a> {
    pub fn is_renamed(&self) -> bool {
        self.source_filename != self.filename
    }

    /// Updates for every record whose payload a stage changed.
    pub fn collect(records: &'a [ImageRecord]) -> Vec<Self> {
        records
            .iter()
            .filter(|r| r.is_modified())
            .filter_map(|r| {
                let payload = r.payload.as_ref()?;
                Some(Self {
                    id: r.id(),
                    source_filename: r.source_filename(),
                    filename: &r.filename,
                    bytes: &payload.bytes,
                })
            })
            .collect()
    }
}

/// Source and sink of one document's metadata and images.
pub trait Archive {
    /// Root metadata fragment listing the data files.
    fn metadata(&self) -> Result<Fragment, ArchiveError>;

    /// All other fragments, ordered by name.
    fn fragments(&self) -> Result<Vec<Fragment>, ArchiveError>;

    /// Image files physically present in the data area.
    fn image_files(&self) -> Result<Vec<String>, ArchiveError>;

    fn read_image(&self, filename: &str) -> Result<Vec<u8>, ArchiveError>;

    /// Store changed payloads and record file name changes in the metadata.
    fn write_back(&mut self, updates: &[PayloadUpdate<'_>]) -> Result<(), ArchiveError>;
}
