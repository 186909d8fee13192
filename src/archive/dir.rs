//! Unpacked archive directory.
//!
//! ```text
//! deck/
//! ├── Index/
//! │   ├── Metadata.json    # package metadata (data file list)
//! │   ├── Document.json
//! │   └── Slide-*.json
//! └── Data/
//!     └── *.png, *.jpg, *.tif, ...
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use jwalk::WalkDir;
use serde_json::Value;

use super::{Archive, ArchiveError, PayloadUpdate};
use crate::codec::ImageFormat;
use crate::log;
use crate::metadata::Fragment;

const INDEX_DIR: &str = "Index";
const DATA_DIR: &str = "Data";
const METADATA_FILE: &str = "Metadata.json";
const METADATA_NAME: &str = "Metadata";

#[derive(Debug, Clone)]
pub struct DirectoryArchive {
    root: PathBuf,
}

impl DirectoryArchive {
    /// Open an unpacked archive, checking its layout.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, ArchiveError> {
        let root = root.into();
        let metadata = root.join(INDEX_DIR).join(METADATA_FILE);
        if !metadata.is_file() {
            return Err(ArchiveError::Layout(format!(
                "`{}` is not an unpacked archive (missing {INDEX_DIR}/{METADATA_FILE})",
                root.display()
            )));
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Copy the whole archive to `dest` and open the copy.
    pub fn copy_to(&self, dest: &Path) -> Result<Self, ArchiveError> {
        if dest.exists() {
            return Err(ArchiveError::Layout(format!(
                "output `{}` already exists",
                dest.display()
            )));
        }
        copy_dir_recursive(&self.root, dest)?;
        Self::open(dest)
    }

    /// Total size of the data area in bytes.
    pub fn data_size(&self) -> Result<u64, ArchiveError> {
        let mut total = 0;
        for name in list_files(&self.data_dir()) {
            let path = self.data_dir().join(&name);
            total += fs::metadata(&path).map_err(|e| ArchiveError::Io(path, e))?.len();
        }
        Ok(total)
    }

    fn index_dir(&self) -> PathBuf {
        self.root.join(INDEX_DIR)
    }

    fn data_dir(&self) -> PathBuf {
        self.root.join(DATA_DIR)
    }

    fn metadata_path(&self) -> PathBuf {
        self.index_dir().join(METADATA_FILE)
    }

    fn read_fragment(path: &Path, name: &str) -> Result<Fragment, ArchiveError> {
        let text = fs::read_to_string(path).map_err(|e| ArchiveError::Io(path.to_path_buf(), e))?;
        Fragment::from_json(name, &text).map_err(|e| ArchiveError::Json(path.to_path_buf(), e))
    }

    /// Rewrite `fileName` (and `preferredFileName`) of renamed data entries.
    fn patch_metadata(&self, renamed: &[&PayloadUpdate<'_>]) -> Result<(), ArchiveError> {
        let path = self.metadata_path();
        let text = fs::read_to_string(&path).map_err(|e| ArchiveError::Io(path.clone(), e))?;
        let mut root: Value =
            serde_json::from_str(&text).map_err(|e| ArchiveError::Json(path.clone(), e))?;

        for entry in data_entries_mut(&mut root) {
            let Some(update) = renamed
                .iter()
                .find(|u| entry.get("identifier").and_then(as_u64) == Some(u.id.0))
            else {
                continue;
            };
            entry.insert("fileName".into(), Value::from(update.filename));
            if let Some(Value::String(preferred)) = entry.get_mut("preferredFileName") {
                *preferred = Path::new(preferred.as_str())
                    .with_extension(
                        Path::new(update.filename)
                            .extension()
                            .unwrap_or_default(),
                    )
                    .to_string_lossy()
                    .into_owned();
            }
        }

        let json =
            serde_json::to_string_pretty(&root).map_err(|e| ArchiveError::Json(path.clone(), e))?;
        let staged = staging_path(&path);
        fs::write(&staged, json).map_err(|e| ArchiveError::Io(staged.clone(), e))?;
        fs::rename(&staged, &path).map_err(|e| {
            remove_quietly([&staged]);
            ArchiveError::Io(path, e)
        })
    }
}

impl Archive for DirectoryArchive {
    fn metadata(&self) -> Result<Fragment, ArchiveError> {
        Self::read_fragment(&self.metadata_path(), METADATA_NAME)
    }

    fn fragments(&self) -> Result<Vec<Fragment>, ArchiveError> {
        let dir = self.index_dir();
        let mut names: Vec<String> = list_files(&dir)
            .into_iter()
            .filter(|name| name.ends_with(".json") && name != METADATA_FILE)
            .collect();
        names.sort();

        names
            .iter()
            .map(|name| {
                let stem = name.trim_end_matches(".json");
                Self::read_fragment(&dir.join(name), stem)
            })
            .collect()
    }

    fn image_files(&self) -> Result<Vec<String>, ArchiveError> {
        let mut files: Vec<String> = list_files(&self.data_dir())
            .into_iter()
            .filter(|name| ImageFormat::from_path(name).is_some())
            .collect();
        files.sort();
        Ok(files)
    }

    fn read_image(&self, filename: &str) -> Result<Vec<u8>, ArchiveError> {
        let path = self.data_dir().join(filename);
        fs::read(&path).map_err(|e| ArchiveError::Io(path, e))
    }

    /// Stage every payload, move the staged files into place, patch the
    /// metadata, then remove the files replaced by a rename.
    ///
    /// A failure before the metadata is patched removes every staged file and
    /// every file placed under a new name, so the metadata still matches the
    /// data area. A replaced file that cannot be removed is only logged.
    fn write_back(&mut self, updates: &[PayloadUpdate<'_>]) -> Result<(), ArchiveError> {
        let data = self.data_dir();

        let mut staged: Vec<(PathBuf, &PayloadUpdate<'_>)> = Vec::with_capacity(updates.len());
        for update in updates {
            let temp = staging_path(&data.join(update.filename));
            if let Err(e) = fs::write(&temp, update.bytes) {
                remove_quietly(staged.iter().map(|(temp, _)| temp).chain([&temp]));
                return Err(ArchiveError::Io(temp, e));
            }
            staged.push((temp, update));
        }

        // Files under names that did not exist before
        let mut placed: Vec<PathBuf> = Vec::new();
        for (i, (temp, update)) in staged.iter().enumerate() {
            let target = data.join(update.filename);
            if let Err(e) = fs::rename(temp, &target) {
                remove_quietly(staged[i..].iter().map(|(temp, _)| temp).chain(&placed));
                return Err(ArchiveError::Io(target, e));
            }
            if update.is_renamed() {
                placed.push(target);
            }
        }

        let renamed: Vec<&PayloadUpdate<'_>> = updates.iter().filter(|u| u.is_renamed()).collect();
        if renamed.is_empty() {
            return Ok(());
        }
        if let Err(e) = self.patch_metadata(&renamed) {
            remove_quietly(&placed);
            return Err(e);
        }

        for update in renamed {
            let old = data.join(update.source_filename);
            if let Err(e) = fs::remove_file(&old) {
                log!("warning"; "cannot remove replaced `{}`: {}", old.display(), e);
            }
        }
        Ok(())
    }
}

/// All package metadata `datas` entries, wherever they sit in the fragment.
fn data_entries_mut(root: &mut Value) -> impl Iterator<Item = &mut serde_json::Map<String, Value>> {
    root.get_mut("chunks")
        .and_then(Value::as_array_mut)
        .into_iter()
        .flatten()
        .filter_map(|chunk| chunk.get_mut("archives").and_then(Value::as_array_mut))
        .flatten()
        .filter_map(|archive| archive.get_mut("objects").and_then(Value::as_array_mut))
        .flatten()
        .filter(|object| {
            object.get("_pbtype").and_then(Value::as_str) == Some("TSP.PackageMetadata")
        })
        .filter_map(|object| object.get_mut("datas").and_then(Value::as_array_mut))
        .flatten()
        .filter_map(Value::as_object_mut)
}

fn as_u64(value: &Value) -> Option<u64> {
    value
        .as_u64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
}

const IGNORED_FILES: &[&str] = &[".DS_Store"];

/// Relative paths (with `/`) of all files below `dir`. Hidden files are skipped.
fn list_files(dir: &Path) -> Vec<String> {
    WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            let name = e.file_name().to_str().unwrap_or_default();
            !IGNORED_FILES.contains(&name)
        })
        .filter_map(|e| {
            let path = e.path();
            let rel = path.strip_prefix(dir).ok()?;
            Some(
                rel.components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/"),
            )
        })
        .collect()
}

/// Hidden sibling that a file is written to before it is moved into place.
fn staging_path(target: &Path) -> PathBuf {
    let name = target.file_name().unwrap_or_default().to_string_lossy();
    target.with_file_name(format!(".{name}.partial"))
}

fn remove_quietly<'a>(paths: impl IntoIterator<Item = &'a PathBuf>) {
    for path in paths {
        let _ = fs::remove_file(path);
    }
}

/// Recursively copy directory contents.
fn copy_dir_recursive(src_dir: &Path, dest_dir: &Path) -> Result<(), ArchiveError> {
    fs::create_dir_all(dest_dir).map_err(|e| ArchiveError::Io(dest_dir.to_path_buf(), e))?;
    let entries = fs::read_dir(src_dir).map_err(|e| ArchiveError::Io(src_dir.to_path_buf(), e))?;
    for entry in entries {
        let entry = entry.map_err(|e| ArchiveError::Io(src_dir.to_path_buf(), e))?;
        let src_path = entry.path();
        let dest_path = dest_dir.join(entry.file_name());

        if src_path.is_dir() {
            copy_dir_recursive(&src_path, &dest_path)?;
        } else {
            fs::copy(&src_path, &dest_path).map_err(|e| ArchiveError::Io(src_path.clone(), e))?;
        }
    }
    Ok(())
}
