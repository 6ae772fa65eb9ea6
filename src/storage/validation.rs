//! Path validation
//!
//! Maps client-supplied logical paths to storage names and keeps every
//! resolved path inside the storage root.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use crate::error::StorageError;

/// Name of the persisted version index inside the storage root
pub const INDEX_FILE_NAME: &str = ".rax-index.json";

/// Scratch file the index is written to before being renamed into place
pub const INDEX_TEMP_NAME: &str = ".rax-index.json.tmp";

/// Suffix carried by uploads that have not been committed yet
pub const PARTIAL_SUFFIX: &str = ".part";

/// Marker between stem and version number in a stored name
const VERSION_MARKER: &str = "_v";

/// A validated client-visible path, split into stem and final extension.
///
/// The stem keeps its directory prefix (`a/b/notes` for `a/b/notes.txt`) and
/// always uses `/` as separator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalPath {
    stem: String,
    ext: String,
}

impl LogicalPath {
    /// Parses and normalizes `raw`.
    ///
    /// Rejects empty, oversized, absolute and reserved paths, and any `..`
    /// segment. `.` segments and repeated separators are dropped.
    pub fn parse(raw: &str, max_len: usize) -> Result<Self, StorageError> {
        if raw.is_empty() {
            return Err(StorageError::InvalidPath("Empty path".into()));
        }
        if raw.len() > max_len {
            return Err(StorageError::InvalidPath(format!(
                "Path exceeds {} bytes",
                max_len
            )));
        }
        if raw.chars().any(|c| c == '\\' || c.is_control()) {
            return Err(StorageError::InvalidPath(format!(
                "Path contains forbidden characters: {:?}",
                raw
            )));
        }
        if raw.starts_with('/') {
            return Err(StorageError::InvalidPath(format!(
                "Absolute paths are not allowed: {}",
                raw
            )));
        }

        let mut segments = Vec::new();
        for segment in raw.split('/') {
            match segment {
                "" | "." => continue,
                ".." => return Err(StorageError::PathTraversal(raw.to_string())),
                s => segments.push(s),
            }
        }

        let Some(file_name) = segments.pop() else {
            return Err(StorageError::InvalidPath(format!("No file name in {}", raw)));
        };
        if file_name == INDEX_FILE_NAME || file_name.ends_with(PARTIAL_SUFFIX) {
            return Err(StorageError::InvalidPath(format!(
                "Reserved file name: {}",
                file_name
            )));
        }

        let (name_stem, ext) = split_extension(file_name);
        let stem = if segments.is_empty() {
            name_stem.to_string()
        } else {
            format!("{}/{}", segments.join("/"), name_stem)
        };

        Ok(Self {
            stem,
            ext: ext.to_string(),
        })
    }

    pub fn stem(&self) -> &str {
        &self.stem
    }

    pub fn ext(&self) -> &str {
        &self.ext
    }

    /// The stored entry this path maps to at `version`
    pub fn entry(&self, version: u32) -> VersionedEntry {
        VersionedEntry {
            stem: self.stem.clone(),
            version,
            ext: self.ext.clone(),
        }
    }
}

/// One stored revision: `{stem}_v{version}{ext}` on disk.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionedEntry {
    pub stem: String,
    pub version: u32,
    pub ext: String,
}

impl VersionedEntry {
    /// Name relative to the storage root, `/`-separated
    pub fn storage_name(&self) -> String {
        format!("{}{}{}{}", self.stem, VERSION_MARKER, self.version, self.ext)
    }

    /// Parses a stored name back into its parts.
    ///
    /// Returns `None` for names that do not follow the versioned naming rule.
    pub fn parse(name: &str) -> Option<Self> {
        let (dir, file_name) = match name.rsplit_once('/') {
            Some((dir, file_name)) => (Some(dir), file_name),
            None => (None, name),
        };

        let (base, ext) = split_extension(file_name);
        let (stem_part, digits) = base.rsplit_once(VERSION_MARKER)?;
        // Only the canonical form `storage_name` produces: no sign, no leading zero
        if stem_part.is_empty()
            || digits.starts_with('0')
            || !digits.bytes().all(|b| b.is_ascii_digit())
        {
            return None;
        }
        let version: u32 = digits.parse().ok()?;

        let stem = match dir {
            Some(dir) => format!("{}/{}", dir, stem_part),
            None => stem_part.to_string(),
        };

        Some(Self {
            stem,
            version,
            ext: ext.to_string(),
        })
    }
}

/// Splits a file name at its final `.`; a leading dot does not start an extension.
fn split_extension(file_name: &str) -> (&str, &str) {
    match file_name.rfind('.') {
        None | Some(0) => (file_name, ""),
        Some(i) => (&file_name[..i], &file_name[i..]),
    }
}

/// Joins a `/`-separated storage name onto the root
pub fn resolve_storage_path(root: &Path, storage_name: &str) -> PathBuf {
    let mut path = root.to_path_buf();
    path.extend(storage_name.split('/').filter(|s| !s.is_empty()));
    path
}

/// Path of the in-flight file for an upload destined for `final_path`
pub fn partial_path(final_path: &Path) -> PathBuf {
    let mut name = final_path.as_os_str().to_os_string();
    name.push(PARTIAL_SUFFIX);
    PathBuf::from(name)
}

/// Creates any missing directories between `root` and the parent of `path`.
///
/// Each existing ancestor is canonicalized and must stay under `root` (which
/// must itself be canonical), so a symlinked directory cannot redirect the
/// write outside the storage tree.
pub async fn prepare_parent_dirs(root: &Path, path: &Path) -> Result<(), StorageError> {
    let relative = path
        .strip_prefix(root)
        .map_err(|_| StorageError::PathTraversal(path.display().to_string()))?;

    let Some(parent) = relative.parent() else {
        return Ok(());
    };

    let mut current = root.to_path_buf();
    for component in parent.components() {
        let Component::Normal(segment) = component else {
            return Err(StorageError::PathTraversal(path.display().to_string()));
        };
        current.push(segment);

        match tokio::fs::symlink_metadata(&current).await {
            Ok(_) => {
                let canonical = tokio::fs::canonicalize(&current).await?;
                if !canonical.starts_with(root) {
                    return Err(StorageError::PathTraversal(path.display().to_string()));
                }
                if !tokio::fs::metadata(&canonical).await?.is_dir() {
                    return Err(StorageError::InvalidPath(format!(
                        "Not a directory: {}",
                        current.display()
                    )));
                }
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                match tokio::fs::create_dir(&current).await {
                    Ok(()) => {}
                    // Another upload created it first
                    Err(e) if e.kind() == ErrorKind::AlreadyExists => {}
                    Err(e) => return Err(e.into()),
                }
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(())
}

/// Verifies an existing file resolves to a location under `root`
pub async fn ensure_within_root(root: &Path, path: &Path) -> Result<(), StorageError> {
    let canonical = match tokio::fs::canonicalize(path).await {
        Ok(canonical) => canonical,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(StorageError::FileNotFound(path.display().to_string()));
        }
        Err(e) => return Err(e.into()),
    };

    if canonical.starts_with(root) {
        Ok(())
    } else {
        Err(StorageError::PathTraversal(path.display().to_string()))
    }
}
