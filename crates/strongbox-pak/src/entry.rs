//! Public entry metadata.

use std::path::Path;

use crate::format::IndexEntry;

/// An entry (named blob) within a PAK archive.
///
/// This contains metadata about the entry, not its contents.
/// Use [`PakReader::load`](crate::PakReader::load) to get the bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PakEntry {
    /// Normalized entry name.
    name: String,
    /// Payload size in bytes.
    size: u64,
}

impl PakEntry {
    /// Create a new entry description.
    pub fn new(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            size,
        }
    }

    /// Get the entry name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the payload size in bytes.
    #[inline]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Get the file extension, if any.
    pub fn extension(&self) -> Option<&str> {
        Path::new(&self.name)
            .extension()
            .and_then(|ext| ext.to_str())
    }
}

impl From<&IndexEntry> for PakEntry {
    fn from(entry: &IndexEntry) -> Self {
        Self::new(entry.name.clone(), entry.size)
    }
}
