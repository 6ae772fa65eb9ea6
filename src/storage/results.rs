//! Storage result types
//!
//! Handles returned by storage operations. Each one is driven to completion
//! through the owning [`Storage`](crate::storage::Storage).

use std::path::PathBuf;
use tokio::fs::File;

use crate::storage::validation::VersionedEntry;

/// An upload in progress, writing to its `.part` file
#[derive(Debug)]
pub struct Upload {
    pub(crate) entry: VersionedEntry,
    pub(crate) file: File,
    pub(crate) final_path: PathBuf,
    pub(crate) temp_path: PathBuf,
    pub(crate) declared_size: u64,
    pub(crate) written: u64,
}

impl Upload {
    pub fn declared_size(&self) -> u64 {
        self.declared_size
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    /// Bytes still expected from the client
    pub fn remaining(&self) -> u64 {
        self.declared_size.saturating_sub(self.written)
    }
}

/// An entry opened for streaming to a client
#[derive(Debug)]
pub struct Download {
    pub(crate) entry: VersionedEntry,
    pub(crate) file: File,
    pub(crate) size: u64,
    pub(crate) sent: u64,
}

impl Download {
    pub fn entry(&self) -> &VersionedEntry {
        &self.entry
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn sent(&self) -> u64 {
        self.sent
    }
}

/// Snapshot of stored names, filtered lazily. Finite and not restartable.
#[derive(Debug)]
pub struct EntryListing {
    names: std::vec::IntoIter<String>,
    filter: Option<String>,
}

impl EntryListing {
    pub(crate) fn new(names: Vec<String>, filter: Option<&str>) -> Self {
        Self {
            names: names.into_iter(),
            filter: filter.filter(|f| !f.is_empty()).map(str::to_owned),
        }
    }
}

impl Iterator for EntryListing {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        let filter = self.filter.as_deref();
        self.names
            .by_ref()
            .find(|name| filter.is_none_or(|f| name.contains(f)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listing_filters_by_substring() {
        let names = vec!["a_v1.txt".to_string(), "b_v1.md".into(), "ab_v2.txt".into()];
        let listed: Vec<String> = EntryListing::new(names, Some(".txt")).collect();
        assert_eq!(listed, vec!["a_v1.txt", "ab_v2.txt"]);
    }

    #[test]
    fn test_listing_without_filter_yields_all() {
        let names = vec!["a_v1".to_string(), "b_v1".into()];
        assert_eq!(EntryListing::new(names.clone(), None).count(), 2);
        assert_eq!(EntryListing::new(names, Some("")).count(), 2);
    }

    #[test]
    fn test_listing_is_not_restartable() {
        let mut listing = EntryListing::new(vec!["a_v1".to_string()], None);
        assert!(listing.next().is_some());
        assert!(listing.next().is_none());
        assert!(listing.next().is_none());
    }
}
