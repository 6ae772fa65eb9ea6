//! File system storage management
//!
//! Handles versioned entries, path validation, the version index and locking.

pub mod index;
pub mod locks;
pub mod operations;
pub mod results;
pub mod validation;

// Re-export commonly used types
pub use operations::Storage;
pub use results::{Download, EntryListing, Upload};
pub use validation::{LogicalPath, VersionedEntry};
