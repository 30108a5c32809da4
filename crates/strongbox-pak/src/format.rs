//! PAK0 on-disk layout.
//!
//! ```text
//! offset 0  : magic[4]        = "PAK0"
//! offset 4  : version u32     = 1
//! offset 8  : num_files u32
//! offset 12 : index_offset u64
//! offset 20 : reserved u32[4]
//! -- payload region: obfuscated blobs in write order --
//! -- index at index_offset, num_files records of: --
//!   name_len u16
//!   name[name_len]   (UTF-8, no NUL)
//!   offset u64
//!   size u64
//! ```
//!
//! Every integer is little-endian. The header is a `#[repr(C)]` struct of
//! unaligned little-endian integers, so its byte image is identical on every
//! host and has no padding.

use std::io::Write;

use byteorder::{LittleEndian, WriteBytesExt};
use strongbox_common::BinaryReader;
use zerocopy::little_endian::{U32, U64};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::error::{CapacityError, FormatError, ValidationError};
use crate::Result;

/// Archive magic bytes.
pub const MAGIC: [u8; 4] = *b"PAK0";

/// The only format version this crate reads or writes.
pub const SUPPORTED_VERSION: u32 = 1;

/// Maximum number of entries in one archive.
pub const MAX_FILES_IN_PAK: u32 = 1_000_000;

/// Maximum encoded length of an entry name in bytes.
pub const MAX_FILENAME_LENGTH: usize = u16::MAX as usize;

/// Size of the fixed header in bytes.
pub const HEADER_SIZE: usize = 36;

/// Smallest possible index record: a one-byte name plus length, offset and size.
pub const MIN_INDEX_RECORD_SIZE: u64 = 2 + 1 + 8 + 8;

#[derive(FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
#[repr(C)]
struct RawHeader {
    magic: [u8; 4],
    version: U32,
    num_files: U32,
    index_offset: U64,
    reserved: [U32; 4],
}

const _: () = assert!(std::mem::size_of::<RawHeader>() == HEADER_SIZE);

/// Decoded archive header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Format version, always [`SUPPORTED_VERSION`] once decoded.
    pub version: u32,
    /// Number of index records.
    pub num_files: u32,
    /// Absolute file offset of the first index record.
    pub index_offset: u64,
    /// Reserved words, preserved verbatim.
    pub reserved: [u32; 4],
}

impl Header {
    /// Create a header for the supported version with zeroed reserved words.
    pub fn new(num_files: u32, index_offset: u64) -> Self {
        Self {
            version: SUPPORTED_VERSION,
            num_files,
            index_offset,
            reserved: [0; 4],
        }
    }

    /// Encode to the exact 36-byte on-disk image.
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let raw = RawHeader {
            magic: MAGIC,
            version: U32::new(self.version),
            num_files: U32::new(self.num_files),
            index_offset: U64::new(self.index_offset),
            reserved: self.reserved.map(U32::new),
        };

        let mut out = [0u8; HEADER_SIZE];
        out.copy_from_slice(raw.as_bytes());
        out
    }

    /// Decode and validate a header from the start of `data`.
    pub fn decode(data: &[u8]) -> std::result::Result<Self, FormatError> {
        let mut reader = BinaryReader::new(data);
        let raw: RawHeader = reader.read_struct()?;

        if raw.magic != MAGIC {
            return Err(FormatError::BadMagic { actual: raw.magic });
        }

        let version = raw.version.get();
        if version != SUPPORTED_VERSION {
            return Err(FormatError::UnsupportedVersion(version));
        }

        let num_files = raw.num_files.get();
        if num_files > MAX_FILES_IN_PAK {
            return Err(FormatError::TooManyEntries(num_files));
        }

        Ok(Self {
            version,
            num_files,
            index_offset: raw.index_offset.get(),
            reserved: raw.reserved.map(|word| word.get()),
        })
    }
}

/// One index record: where a named blob lives in the payload region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    /// Normalized entry name.
    pub name: String,
    /// Absolute file offset of the payload.
    pub offset: u64,
    /// Payload length in bytes.
    pub size: u64,
}

impl IndexEntry {
    /// Number of bytes [`IndexEntry::encode`] writes.
    #[inline]
    pub fn encoded_len(&self) -> usize {
        2 + self.name.len() + 8 + 8
    }

    /// End of the payload range, or `None` if `offset + size` overflows.
    #[inline]
    pub fn end(&self) -> Option<u64> {
        self.offset.checked_add(self.size)
    }

    /// Check that the payload range lies inside a file of `file_size` bytes.
    pub fn check_bounds(&self, file_size: u64) -> std::result::Result<(), ValidationError> {
        let fits = self.size <= file_size && self.offset <= file_size - self.size;
        if !fits {
            return Err(ValidationError::OutOfBounds {
                name: self.name.clone(),
                offset: self.offset,
                size: self.size,
                file_size,
            });
        }
        Ok(())
    }

    /// Write the record to `writer`.
    pub fn encode<W: Write>(&self, writer: &mut W) -> Result<()> {
        let name = self.name.as_bytes();
        if name.is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        if name.len() > MAX_FILENAME_LENGTH {
            return Err(CapacityError::NameTooLong {
                len: name.len(),
                limit: MAX_FILENAME_LENGTH,
            }
            .into());
        }

        writer.write_u16::<LittleEndian>(name.len() as u16)?;
        writer.write_all(name)?;
        writer.write_u64::<LittleEndian>(self.offset)?;
        writer.write_u64::<LittleEndian>(self.size)?;
        Ok(())
    }

    /// Read one record. Name contents are not validated here.
    pub fn decode(reader: &mut BinaryReader<'_>) -> std::result::Result<Self, FormatError> {
        let name_len = reader.read_u16()? as usize;
        if name_len == 0 {
            return Err(FormatError::Truncated(format!(
                "zero-length entry name at index byte {}",
                reader.position() - 2
            )));
        }

        let name_bytes = reader.read_bytes(name_len)?;
        let name = String::from_utf8(name_bytes.to_vec()).map_err(|e| FormatError::InvalidEntry {
            name: String::from_utf8_lossy(name_bytes).into_owned(),
            reason: e.to_string(),
        })?;

        let offset = reader.read_u64()?;
        let size = reader.read_u64()?;

        Ok(Self { name, offset, size })
    }
}

/// Decode `count` consecutive index records from `data`.
pub(crate) fn decode_index(
    data: &[u8],
    count: u32,
) -> std::result::Result<Vec<IndexEntry>, FormatError> {
    // The header count is untrusted; never reserve more than the buffer could hold.
    let fit = (data.len() as u64 / MIN_INDEX_RECORD_SIZE) as usize;
    let mut entries = Vec::with_capacity((count as usize).min(fit));

    let mut reader = BinaryReader::new(data);
    for _ in 0..count {
        entries.push(IndexEntry::decode(&mut reader)?);
    }

    Ok(entries)
}

/// Write every record of `entries` in order, returning the bytes written.
pub(crate) fn encode_index<W: Write>(writer: &mut W, entries: &[IndexEntry]) -> Result<u64> {
    let mut written = 0u64;
    for entry in entries {
        entry.encode(writer)?;
        written += entry.encoded_len() as u64;
    }
    Ok(written)
}
