//! Archive metadata as a typed tree.
//!
//! A fragment is one unit of metadata (a slide, the document, the package
//! metadata). Its JSON form nests `chunks → archives → objects`:
//!
//! ```json
//! { "chunks": [ { "archives": [ { "objects": [ { "_pbtype": "TSD.ImageArchive", ... } ] } ] } ] }
//! ```
//!
//! Objects are classified once, at load time, into [`Object`] variants so
//! consumers never do untyped lookups.

mod object;

pub use object::{DataEntry, Fill, Object, Size};

use serde_json::Value;
use thiserror::Error;

/// Errors for fragments whose shape does not follow `chunks → archives → objects`.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("fragment `{fragment}`: expected {expected} at {at}")]
    Shape {
        fragment: String,
        expected: &'static str,
        at: String,
    },
}

/// Position of an object inside its fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectPath {
    pub chunk: usize,
    pub archive: usize,
    pub object: usize,
}

impl std::fmt::Display for ObjectPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "chunks[{}].archives[{}].objects[{}]",
            self.chunk, self.archive, self.object
        )
    }
}

/// One named metadata fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub name: String,
    pub chunks: Vec<Chunk>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Chunk {
    pub archives: Vec<ArchiveBlock>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ArchiveBlock {
    pub objects: Vec<Object>,
}

impl Fragment {
    /// Build the typed tree from parsed JSON.
    ///
    /// Missing `chunks`/`archives`/`objects` keys mean "empty"; present keys of
    /// the wrong JSON type are a [`MetadataError`].
    pub fn from_value(name: impl Into<String>, value: &Value) -> Result<Self, MetadataError> {
        let name = name.into();
        let shape = |expected: &'static str, at: String| MetadataError::Shape {
            fragment: name.clone(),
            expected,
            at,
        };

        let root = value
            .as_object()
            .ok_or_else(|| shape("an object", "root".into()))?;

        let mut chunks = Vec::new();
        for (ci, chunk) in array(root.get("chunks"))
            .ok_or_else(|| shape("an array", "chunks".into()))?
            .iter()
            .enumerate()
        {
            let chunk = chunk
                .as_object()
                .ok_or_else(|| shape("an object", format!("chunks[{ci}]")))?;

            let mut archives = Vec::new();
            for (ai, archive) in array(chunk.get("archives"))
                .ok_or_else(|| shape("an array", format!("chunks[{ci}].archives")))?
                .iter()
                .enumerate()
            {
                let archive = archive
                    .as_object()
                    .ok_or_else(|| shape("an object", format!("chunks[{ci}].archives[{ai}]")))?;

                let objects = array(archive.get("objects"))
                    .ok_or_else(|| {
                        shape("an array", format!("chunks[{ci}].archives[{ai}].objects"))
                    })?
                    .iter()
                    .enumerate()
                    .map(|(oi, object)| {
                        object.as_object().map(Object::from_map).ok_or_else(|| {
                            shape(
                                "an object",
                                format!("chunks[{ci}].archives[{ai}].objects[{oi}]"),
                            )
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;

                archives.push(ArchiveBlock { objects });
            }
            chunks.push(Chunk { archives });
        }

        Ok(Self { name, chunks })
    }

    /// Parse a fragment from JSON text.
    pub fn from_json(name: impl Into<String>, json: &str) -> Result<Self, serde_json::Error> {
        let value: Value = serde_json::from_str(json)?;
        Self::from_value(name, &value).map_err(serde::de::Error::custom)
    }

    /// All objects in insertion order, with their positions.
    pub fn objects(&self) -> impl Iterator<Item = (ObjectPath, &Object)> {
        self.chunks.iter().enumerate().flat_map(|(chunk, c)| {
            c.archives.iter().enumerate().flat_map(move |(archive, a)| {
                a.objects.iter().enumerate().map(move |(object, o)| {
                    (
                        ObjectPath {
                            chunk,
                            archive,
                            object,
                        },
                        o,
                    )
                })
            })
        })
    }

    /// The data entries of the first package metadata object, if any.
    pub fn package_metadata(&self) -> Option<&[DataEntry]> {
        self.objects().find_map(|(_, object)| match object {
            Object::PackageMetadata { datas } => Some(datas.as_slice()),
            _ => None,
        })
    }
}

/// Slide size declared by the first document object that has one.
pub fn slide_size(fragments: &[Fragment]) -> Option<Size> {
    fragments
        .iter()
        .flat_map(Fragment::objects)
        .find_map(|(_, object)| match object {
            Object::Show { size } => *size,
            _ => None,
        })
}

/// Absent keys read as an empty array.
fn array(value: Option<&Value>) -> Option<&[Value]> {
    match value {
        None | Some(Value::Null) => Some(&[]),
        Some(Value::Array(items)) => Some(items.as_slice()),
        Some(_) => None,
    }
}
