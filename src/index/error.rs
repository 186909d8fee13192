//! Index construction errors.
//!
//! All of them mean the archive's image set is inconsistent, so the run stops
//! before any image is touched.

use thiserror::Error;

use super::ImageId;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IndexError {
    #[error("no package metadata object in `{fragment}`")]
    MissingPackageMetadata { fragment: String },

    #[error("data entry {position} has no identifier")]
    MissingIdentifier { position: usize },

    #[error("data entry {id} has no file name")]
    MissingFilename { id: ImageId },

    #[error("identifier {id} is used by both `{first}` and `{second}`")]
    DuplicateIdentifier {
        id: ImageId,
        first: String,
        second: String,
    },

    #[error("`{filename}` is claimed by both {first} and {second}")]
    DuplicateFilename {
        filename: String,
        first: ImageId,
        second: ImageId,
    },

    #[error("image file `{filename}` is not listed in the package metadata")]
    OrphanImage { filename: String },

    #[error("image {id} (`{filename}`) is missing from the data area")]
    MissingImage { id: ImageId, filename: String },

    #[error("cannot read `{filename}`: {reason}")]
    Unreadable { filename: String, reason: String },
}
