//! Storage operations
//!
//! The storage engine: version-aware create, read, delete and list under the
//! storage root. Every filesystem touch happens while holding the stem lock
//! of the entry involved; the lock is released between chunks so it is never
//! held across network I/O.

use log::{debug, info, warn};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::Mutex;

use crate::error::StorageError;
use crate::storage::index::VersionIndex;
use crate::storage::locks::StemLocks;
use crate::storage::results::{Download, EntryListing, Upload};
use crate::storage::validation::{
    INDEX_FILE_NAME, LogicalPath, VersionedEntry, ensure_within_root, partial_path,
    prepare_parent_dirs, resolve_storage_path,
};
use crate::transfer::ByteCipher;

/// Version-aware store rooted at one directory
pub struct Storage {
    root: PathBuf,
    index_path: PathBuf,
    cipher: ByteCipher,
    max_path_length: usize,
    index: Mutex<VersionIndex>,
    locks: StemLocks,
}

impl Storage {
    /// Opens (creating if needed) the storage root and rebuilds the version index.
    pub async fn open(
        root: impl AsRef<Path>,
        cipher: ByteCipher,
        max_path_length: usize,
    ) -> Result<Self, StorageError> {
        tokio::fs::create_dir_all(root.as_ref()).await?;
        let root = tokio::fs::canonicalize(root.as_ref()).await?;
        let index_path = root.join(INDEX_FILE_NAME);

        let persisted = match VersionIndex::load(&index_path).await {
            Ok(index) => index,
            Err(StorageError::IndexCorrupt(msg)) => {
                warn!("Discarding unreadable version index ({}), rescanning", msg);
                VersionIndex::default()
            }
            Err(e) => return Err(e),
        };

        let scan_root = root.clone();
        let index =
            tokio::task::spawn_blocking(move || VersionIndex::rebuild(&scan_root, &persisted))
                .await
                .map_err(|e| StorageError::IoError(std::io::Error::other(e)))??;
        index.persist(&index_path).await?;

        info!("Storage root: {}", root.display());

        Ok(Self {
            root,
            index_path,
            cipher,
            max_path_length,
            index: Mutex::new(index),
            locks: StemLocks::new(),
        })
    }

    /// Canonical storage root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Validates a client-supplied path against this store's limits
    pub fn parse_path(&self, raw: &str) -> Result<LogicalPath, StorageError> {
        LogicalPath::parse(raw, self.max_path_length)
    }

    /// Highest committed version of `path`, 0 if none
    pub async fn latest_version(&self, path: &LogicalPath) -> u32 {
        let _guard = self.locks.acquire(path.stem()).await;
        self.index
            .lock()
            .await
            .latest_version(path.stem(), path.ext())
    }

    /// Version the next upload of `path` would receive
    pub async fn next_version(&self, path: &LogicalPath) -> u32 {
        let _guard = self.locks.acquire(path.stem()).await;
        self.index.lock().await.next_version(path.stem())
    }

    /// Reserves the next version of `path` and opens its `.part` file.
    ///
    /// Never overwrites an existing file; a collision is `FileAlreadyExists`.
    pub async fn begin_upload(
        &self,
        path: &LogicalPath,
        declared_size: u64,
    ) -> Result<Upload, StorageError> {
        let _guard = self.locks.acquire(path.stem()).await;

        let entry = {
            let mut index = self.index.lock().await;
            let version = index.reserve(path.stem());
            index.persist(&self.index_path).await?;
            path.entry(version)
        };

        let final_path = resolve_storage_path(&self.root, &entry.storage_name());
        prepare_parent_dirs(&self.root, &final_path).await?;

        if tokio::fs::try_exists(&final_path).await? {
            return Err(StorageError::FileAlreadyExists(entry.storage_name()));
        }

        let temp_path = partial_path(&final_path);
        let file = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp_path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(StorageError::FileAlreadyExists(entry.storage_name()));
            }
            Err(e) => return Err(e.into()),
        };

        info!(
            "Prepared upload of {} ({} bytes) at {}",
            entry.storage_name(),
            declared_size,
            temp_path.display()
        );

        Ok(Upload {
            entry,
            file,
            final_path,
            temp_path,
            declared_size,
            written: 0,
        })
    }

    /// Enciphers `data` in place and appends it to the upload
    pub async fn write_chunk(
        &self,
        upload: &mut Upload,
        data: &mut [u8],
    ) -> Result<(), StorageError> {
        let _guard = self.locks.acquire(&upload.entry.stem).await;
        self.cipher.apply(data, upload.written);
        upload.file.write_all(data).await?;
        upload.written += data.len() as u64;
        Ok(())
    }

    /// Moves a fully received upload to its final name and records it
    pub async fn commit_upload(&self, upload: Upload) -> Result<VersionedEntry, StorageError> {
        let Upload {
            entry,
            mut file,
            final_path,
            temp_path,
            written,
            ..
        } = upload;

        let _guard = self.locks.acquire(&entry.stem).await;

        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        if tokio::fs::try_exists(&final_path).await? {
            return Err(StorageError::FileAlreadyExists(entry.storage_name()));
        }
        tokio::fs::rename(&temp_path, &final_path).await?;

        {
            let mut index = self.index.lock().await;
            index.insert(&entry);
            index.persist(&self.index_path).await?;
        }

        info!("Stored {} ({} bytes)", entry.storage_name(), written);
        Ok(entry)
    }

    /// Stops an upload that will not complete. The `.part` file stays on disk
    /// and its version stays consumed.
    pub async fn abandon_upload(&self, upload: Upload) -> PathBuf {
        let Upload {
            entry,
            mut file,
            temp_path,
            declared_size,
            written,
            ..
        } = upload;

        let _guard = self.locks.acquire(&entry.stem).await;
        if let Err(e) = file.flush().await {
            warn!("Failed to flush partial upload {}: {}", temp_path.display(), e);
        }
        drop(file);

        warn!(
            "Upload of {} stopped after {} of {} bytes; partial data kept at {}",
            entry.storage_name(),
            written,
            declared_size,
            temp_path.display()
        );
        temp_path
    }

    /// Opens `path` at `version` (latest when `None`) for streaming
    pub async fn open_for_read(
        &self,
        path: &LogicalPath,
        version: Option<u32>,
    ) -> Result<Download, StorageError> {
        let _guard = self.locks.acquire(path.stem()).await;

        let entry = {
            let index = self.index.lock().await;
            let version = match version {
                Some(v) => v,
                None => index.latest_version(path.stem(), path.ext()),
            };
            let entry = path.entry(version);
            if version == 0 || !index.contains(&entry) {
                return Err(StorageError::FileNotFound(entry.storage_name()));
            }
            entry
        };

        let file_path = resolve_storage_path(&self.root, &entry.storage_name());
        ensure_within_root(&self.root, &file_path).await?;

        let file = match File::open(&file_path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StorageError::FileNotFound(entry.storage_name()));
            }
            Err(e) => return Err(e.into()),
        };
        let size = file.metadata().await?.len();

        debug!("Opened {} for reading ({} bytes)", entry.storage_name(), size);

        Ok(Download {
            entry,
            file,
            size,
            sent: 0,
        })
    }

    /// Reads the next chunk into `buf` and deciphers it. Returns 0 at end of file.
    pub async fn read_chunk(
        &self,
        download: &mut Download,
        buf: &mut [u8],
    ) -> Result<usize, StorageError> {
        let _guard = self.locks.acquire(&download.entry.stem).await;
        let n = download.file.read(buf).await?;
        self.cipher.apply(&mut buf[..n], download.sent);
        download.sent += n as u64;
        Ok(n)
    }

    /// Deletes stored entries addressed by `raw` and returns their names.
    ///
    /// * with `version`, exactly that version of the logical path
    /// * a committed stored name (as printed by LS) deletes that entry
    /// * otherwise every version of the logical path
    pub async fn delete(
        &self,
        raw: &str,
        version: Option<u32>,
    ) -> Result<Vec<String>, StorageError> {
        let path = self.parse_path(raw)?;

        if let Some(version) = version {
            let _guard = self.locks.acquire(path.stem()).await;
            let entry = path.entry(version);
            if !self.index.lock().await.contains(&entry) {
                return Err(StorageError::FileNotFound(entry.storage_name()));
            }
            return self.remove_entries(&[entry]).await;
        }

        let normalized = format!("{}{}", path.stem(), path.ext());
        if let Some(stored) = VersionedEntry::parse(&normalized) {
            let _guard = self.locks.acquire(&stored.stem).await;
            if self.index.lock().await.contains(&stored) {
                return self.remove_entries(&[stored]).await;
            }
        }

        let _guard = self.locks.acquire(path.stem()).await;
        let entries = self
            .index
            .lock()
            .await
            .versions_of(path.stem(), path.ext());
        if entries.is_empty() {
            return Err(StorageError::FileNotFound(normalized));
        }
        self.remove_entries(&entries).await
    }

    /// Removes files and index records. Caller holds the stem lock.
    async fn remove_entries(
        &self,
        entries: &[VersionedEntry],
    ) -> Result<Vec<String>, StorageError> {
        let mut removed = Vec::with_capacity(entries.len());

        for entry in entries {
            let name = entry.storage_name();
            let file_path = resolve_storage_path(&self.root, &name);

            match ensure_within_root(&self.root, &file_path).await {
                Ok(()) => tokio::fs::remove_file(&file_path).await?,
                Err(StorageError::FileNotFound(_)) => {
                    warn!("Indexed entry {} was already missing on disk", name);
                }
                Err(e) => return Err(e),
            }

            let mut index = self.index.lock().await;
            index.remove(entry);
            index.persist(&self.index_path).await?;

            info!("Deleted {}", name);
            removed.push(name);
        }

        Ok(removed)
    }

    /// Committed stored names containing `filter`, sorted
    pub async fn list(&self, filter: Option<&str>) -> EntryListing {
        let names = self.index.lock().await.storage_names();
        EntryListing::new(names, filter)
    }
}
