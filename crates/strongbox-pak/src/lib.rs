//! PAK0 archive reader and writer.
//!
//! A PAK0 archive bundles many named byte blobs into one file:
//!
//! - A fixed 36-byte little-endian header (`"PAK0"`, version, entry count,
//!   index offset, reserved words)
//! - The payload region: every blob, masked with a repeating-key XOR
//! - A trailing index of `(name, offset, size)` records
//!
//! Every read re-validates what it finds: entry names are checked for
//! traversal and reserved characters, payload ranges are checked against the
//! file size without integer overflow, and counts are capped before
//! anything is allocated.
//!
//! The XOR mask deters casual inspection only. It is not encryption.
//!
//! # Example
//!
//! ```no_run
//! use strongbox_pak::{PakReader, PakWriter, SecretKey};
//!
//! let key = SecretKey::new("night-shift");
//! let writer = PakWriter::new(key.clone());
//! writer.build("assets.pak", [("a.txt", b"hello".to_vec())])?;
//!
//! let reader = PakReader::new(key);
//! assert_eq!(reader.load("assets.pak", "a.txt")?, b"hello");
//! assert!(!reader.file_exists("assets.pak", "missing")?);
//! # Ok::<(), strongbox_pak::Error>(())
//! ```

mod cipher;
mod entry;
mod error;
mod format;
mod reader;
mod writer;

pub mod path;

pub use cipher::{transform, SecretKey};
pub use entry::PakEntry;
pub use error::{CapacityError, Error, FormatError, Result, ValidationError};
pub use format::{
    Header, IndexEntry, HEADER_SIZE, MAGIC, MAX_FILENAME_LENGTH, MAX_FILES_IN_PAK,
    MIN_INDEX_RECORD_SIZE, SUPPORTED_VERSION,
};
pub use reader::{PakFile, PakReader};
pub use writer::PakWriter;
