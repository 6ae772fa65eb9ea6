//! Version index
//!
//! In-memory map from stem to its stored versions, persisted as JSON in the
//! storage root and rebuilt from a directory scan at startup.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::Path;
use walkdir::WalkDir;

use crate::error::StorageError;
use crate::storage::validation::{
    INDEX_FILE_NAME, INDEX_TEMP_NAME, PARTIAL_SUFFIX, VersionedEntry,
};

/// Versions known for one stem
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct StemRecord {
    /// Highest version ever handed out. Never decreases, even after deletes.
    pub high_water: u32,
    /// Committed versions and the extension each was stored with
    pub versions: BTreeMap<u32, String>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionIndex {
    stems: BTreeMap<String, StemRecord>,
}

impl VersionIndex {
    /// Highest committed version of `stem` stored with `ext`, or 0 if none.
    ///
    /// Matching is on the exact stem key, so `report` never sees `report2`.
    pub fn latest_version(&self, stem: &str, ext: &str) -> u32 {
        self.stems
            .get(stem)
            .and_then(|record| {
                record
                    .versions
                    .iter()
                    .rev()
                    .find(|(_, e)| e.as_str() == ext)
                    .map(|(v, _)| *v)
            })
            .unwrap_or(0)
    }

    /// Version the next upload of `stem` would receive
    pub fn next_version(&self, stem: &str) -> u32 {
        self.stems.get(stem).map_or(0, |r| r.high_water) + 1
    }

    /// Hands out the next version of `stem` and records it as used
    pub fn reserve(&mut self, stem: &str) -> u32 {
        let record = self.stems.entry(stem.to_string()).or_default();
        record.high_water += 1;
        record.high_water
    }

    /// Records a committed entry
    pub fn insert(&mut self, entry: &VersionedEntry) {
        let record = self.stems.entry(entry.stem.clone()).or_default();
        record.high_water = record.high_water.max(entry.version);
        record.versions.insert(entry.version, entry.ext.clone());
    }

    /// Forgets a committed entry; the stem's high-water mark is kept
    pub fn remove(&mut self, entry: &VersionedEntry) -> bool {
        match self.stems.get_mut(&entry.stem) {
            Some(record) if record.versions.get(&entry.version) == Some(&entry.ext) => {
                record.versions.remove(&entry.version);
                true
            }
            _ => false,
        }
    }

    pub fn contains(&self, entry: &VersionedEntry) -> bool {
        self.stems
            .get(&entry.stem)
            .and_then(|r| r.versions.get(&entry.version))
            .is_some_and(|ext| ext == &entry.ext)
    }

    /// Every committed version of `stem` stored with `ext`, oldest first
    pub fn versions_of(&self, stem: &str, ext: &str) -> Vec<VersionedEntry> {
        let Some(record) = self.stems.get(stem) else {
            return Vec::new();
        };
        record
            .versions
            .iter()
            .filter(|(_, e)| e.as_str() == ext)
            .map(|(version, ext)| VersionedEntry {
                stem: stem.to_string(),
                version: *version,
                ext: ext.clone(),
            })
            .collect()
    }

    /// Stored names of every committed entry, sorted
    pub fn storage_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .stems
            .iter()
            .flat_map(|(stem, record)| {
                record.versions.iter().map(move |(version, ext)| {
                    VersionedEntry {
                        stem: stem.clone(),
                        version: *version,
                        ext: ext.clone(),
                    }
                    .storage_name()
                })
            })
            .collect();
        names.sort();
        names
    }

    /// Loads the persisted index; a missing file yields an empty index
    pub async fn load(path: &Path) -> Result<Self, StorageError> {
        match tokio::fs::read(path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| StorageError::IndexCorrupt(e.to_string())),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Writes the index next to its final location, then renames it into place
    pub async fn persist(&self, path: &Path) -> Result<(), StorageError> {
        let bytes = serde_json::to_vec_pretty(self)
            .map_err(|e| StorageError::IndexCorrupt(e.to_string()))?;
        let tmp = path.with_file_name(INDEX_TEMP_NAME);
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, path).await?;
        debug!("Persisted version index to {}", path.display());
        Ok(())
    }

    /// Scans `root` once and reconciles the result with the persisted index.
    ///
    /// The directory contents decide which versions exist. High-water marks
    /// take the larger of the persisted and observed values, so a version
    /// removed before the restart is still never handed out again.
    pub fn rebuild(root: &Path, persisted: &VersionIndex) -> Result<Self, StorageError> {
        let mut index = VersionIndex::default();
        let mut orphans = 0usize;

        for dir_entry in WalkDir::new(root).min_depth(1) {
            let dir_entry = dir_entry.map_err(|e| {
                StorageError::IoError(
                    e.into_io_error()
                        .unwrap_or_else(|| std::io::Error::other("directory walk failed")),
                )
            })?;
            if !dir_entry.file_type().is_file() {
                continue;
            }

            let Some(name) = relative_storage_name(root, dir_entry.path()) else {
                warn!("Skipping non UTF-8 path {}", dir_entry.path().display());
                continue;
            };
            if name == INDEX_FILE_NAME || name == INDEX_TEMP_NAME {
                continue;
            }

            if let Some(unfinished) = name.strip_suffix(PARTIAL_SUFFIX) {
                warn!("Found unfinished upload {}", name);
                orphans += 1;
                // Its version was handed out before the restart
                if let Some(entry) = VersionedEntry::parse(unfinished) {
                    let record = index.stems.entry(entry.stem).or_default();
                    record.high_water = record.high_water.max(entry.version);
                }
                continue;
            }

            match VersionedEntry::parse(&name) {
                Some(entry) => index.insert(&entry),
                None => debug!("Ignoring unversioned file {}", name),
            }
        }

        for (stem, persisted_record) in &persisted.stems {
            let record = index.stems.entry(stem.clone()).or_default();
            record.high_water = record.high_water.max(persisted_record.high_water);
        }

        info!(
            "Version index rebuilt: {} stems, {} entries, {} unfinished uploads",
            index.stems.len(),
            index.storage_names().len(),
            orphans
        );

        Ok(index)
    }
}

/// `/`-joined path of `path` relative to `root`
fn relative_storage_name(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let segments: Option<Vec<&str>> = relative.iter().map(|s| s.to_str()).collect();
    Some(segments?.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(stem: &str, version: u32, ext: &str) -> VersionedEntry {
        VersionedEntry {
            stem: stem.into(),
            version,
            ext: ext.into(),
        }
    }

    #[test]
    fn test_empty_index() {
        let index = VersionIndex::default();
        assert_eq!(index.latest_version("report", ".txt"), 0);
        assert_eq!(index.next_version("report"), 1);
    }

    #[test]
    fn test_reserve_is_monotonic() {
        let mut index = VersionIndex::default();
        assert_eq!(index.reserve("report"), 1);
        assert_eq!(index.reserve("report"), 2);
        assert_eq!(index.reserve("other"), 1);
        // Reserved but uncommitted versions are not "latest"
        assert_eq!(index.latest_version("report", ".txt"), 0);
    }

    #[test]
    fn test_exact_stem_matching() {
        let mut index = VersionIndex::default();
        index.insert(&entry("report2", 7, ".txt"));
        index.insert(&entry("report", 1, ".txt"));
        assert_eq!(index.latest_version("report", ".txt"), 1);
        assert_eq!(index.latest_version("repor", ".txt"), 0);
    }

    #[test]
    fn test_latest_filters_by_extension() {
        let mut index = VersionIndex::default();
        index.insert(&entry("report", 1, ".txt"));
        index.insert(&entry("report", 2, ".md"));
        assert_eq!(index.latest_version("report", ".txt"), 1);
        assert_eq!(index.latest_version("report", ".md"), 2);
        assert_eq!(index.versions_of("report", ".txt").len(), 1);
    }

    #[test]
    fn test_remove_keeps_high_water() {
        let mut index = VersionIndex::default();
        index.insert(&entry("report", 1, ".txt"));
        index.insert(&entry("report", 2, ".txt"));
        assert!(index.remove(&entry("report", 2, ".txt")));
        assert!(!index.remove(&entry("report", 2, ".txt")));
        assert_eq!(index.latest_version("report", ".txt"), 1);
        assert_eq!(index.next_version("report"), 3);
    }

    #[test]
    fn test_storage_names_sorted() {
        let mut index = VersionIndex::default();
        index.insert(&entry("b", 1, ""));
        index.insert(&entry("a/x", 2, ".bin"));
        assert_eq!(index.storage_names(), vec!["a/x_v2.bin", "b_v1"]);
    }

    #[tokio::test]
    async fn test_persist_and_load() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(INDEX_FILE_NAME);

        let mut index = VersionIndex::default();
        index.insert(&entry("report", 3, ".txt"));
        index.persist(&path).await.unwrap();

        let loaded = VersionIndex::load(&path).await.unwrap();
        assert_eq!(loaded, index);
    }

    #[tokio::test]
    async fn test_load_missing_and_corrupt() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(INDEX_FILE_NAME);
        assert_eq!(
            VersionIndex::load(&path).await.unwrap(),
            VersionIndex::default()
        );

        std::fs::write(&path, b"{not json").unwrap();
        assert!(matches!(
            VersionIndex::load(&path).await,
            Err(StorageError::IndexCorrupt(_))
        ));
    }

    #[test]
    fn test_rebuild_from_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        std::fs::create_dir_all(root.join("docs")).unwrap();
        std::fs::write(root.join("report_v1.txt"), b"a").unwrap();
        std::fs::write(root.join("report_v4.txt"), b"b").unwrap();
        std::fs::write(root.join("docs/plan_v2.md"), b"c").unwrap();
        std::fs::write(root.join("docs/plan_v5.md.part"), b"d").unwrap();
        std::fs::write(root.join("stray.txt"), b"e").unwrap();
        std::fs::write(root.join(INDEX_FILE_NAME), b"{}").unwrap();
        std::fs::write(root.join(INDEX_TEMP_NAME), b"{}").unwrap();
        // Shares the index name as a prefix but is an ordinary entry
        std::fs::write(root.join(".rax-index.json_v1.txt"), b"f").unwrap();

        let mut persisted = VersionIndex::default();
        persisted.stems.insert(
            "report".into(),
            StemRecord {
                high_water: 9,
                versions: BTreeMap::new(),
            },
        );

        let index = VersionIndex::rebuild(root, &persisted).unwrap();
        assert_eq!(
            index.storage_names(),
            vec![
                ".rax-index.json_v1.txt",
                "docs/plan_v2.md",
                "report_v1.txt",
                "report_v4.txt"
            ]
        );
        assert_eq!(index.latest_version("report", ".txt"), 4);
        assert_eq!(index.next_version("report"), 10);
        assert_eq!(index.next_version("docs/plan"), 6);
    }
}
