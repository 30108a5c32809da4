//! Error types for the PAK crate.

use thiserror::Error;

/// Errors that can occur when working with PAK archives.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error against the underlying file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The archive bytes do not follow the PAK0 layout.
    #[error("format error: {0}")]
    Format(#[from] FormatError),

    /// A name, path or entry failed a safety check.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// A fixed format limit would be exceeded.
    #[error("capacity error: {0}")]
    Capacity(#[from] CapacityError),

    /// No entry with the requested name.
    #[error("entry not found: {0}")]
    NotFound(String),

    /// Extraction of a single entry failed; earlier entries stay on disk.
    #[error("failed to extract {name}: {source}")]
    Extract {
        name: String,
        #[source]
        source: Box<Error>,
    },
}

/// Malformed or unsupported archive structure.
#[derive(Debug, Error)]
pub enum FormatError {
    /// The first four bytes are not `PAK0`.
    #[error("invalid magic: expected \"PAK0\", got {actual:02x?}")]
    BadMagic { actual: [u8; 4] },

    /// Header version other than the supported one.
    #[error("unsupported version: {0}")]
    UnsupportedVersion(u32),

    /// Header entry count above the format cap.
    #[error("too many entries in header: {0}")]
    TooManyEntries(u32),

    /// A header or index record ended early or has a zero-length name.
    #[error("truncated record: {0}")]
    Truncated(String),

    /// An index record decoded but its name is unusable.
    #[error("invalid index entry {name:?}: {reason}")]
    InvalidEntry { name: String, reason: String },

    /// The header points the index outside the file.
    #[error("index offset {index_offset} outside archive of {file_size} bytes")]
    IndexOutOfRange { index_offset: u64, file_size: u64 },
}

/// Untrusted input rejected by a safety check.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// Entry names must not be empty.
    #[error("empty entry name")]
    EmptyName,

    /// The name would resolve outside its root.
    #[error("path escapes its root: {0}")]
    PathEscape(String),

    /// The name contains a NUL byte.
    #[error("entry name contains NUL: {0:?}")]
    NulByte(String),

    /// The name contains one of `< > : " | ? *`.
    #[error("entry name {name:?} contains reserved character {ch:?}")]
    ReservedCharacter { name: String, ch: char },

    /// The payload range does not lie inside the archive.
    #[error("entry {name} at offset {offset} with size {size} exceeds archive of {file_size} bytes")]
    OutOfBounds {
        name: String,
        offset: u64,
        size: u64,
        file_size: u64,
    },

    /// The header claims more index records than the file can hold.
    #[error("{num_files} index records cannot fit in {available} bytes")]
    IndexOverrun { num_files: u32, available: u64 },

    /// An entry with this name already exists.
    #[error("duplicate entry name: {0}")]
    DuplicateName(String),
}

/// Fixed format limits.
#[derive(Debug, Error)]
pub enum CapacityError {
    /// More entries than `MAX_FILES_IN_PAK`.
    #[error("{count} entries exceed the limit of {limit}")]
    TooManyEntries { count: usize, limit: u32 },

    /// Encoded name longer than `MAX_FILENAME_LENGTH` bytes.
    #[error("entry name of {len} bytes exceeds the limit of {limit}")]
    NameTooLong { len: usize, limit: usize },
}

impl From<strongbox_common::Error> for FormatError {
    fn from(err: strongbox_common::Error) -> Self {
        match err {
            strongbox_common::Error::UnexpectedEof { needed, available } => FormatError::Truncated(
                format!("needed {needed} bytes but only {available} available"),
            ),
        }
    }
}

impl Error {
    /// Wrap an error with the name of the entry being extracted.
    pub(crate) fn extracting(name: &str, source: Error) -> Self {
        Error::Extract {
            name: name.to_string(),
            source: Box::new(source),
        }
    }
}

/// Result type for PAK operations.
pub type Result<T> = std::result::Result<T, Error>;
