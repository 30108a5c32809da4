//! PAK archive reader.
//!
//! Every public operation opens its own handle, so a reader holds no state
//! between calls besides its key and concurrent readers of a stable archive
//! never interfere.

use std::fs::{self, File};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::cipher::SecretKey;
use crate::entry::PakEntry;
use crate::error::{FormatError, ValidationError};
use crate::format::{self, Header, IndexEntry, HEADER_SIZE, MIN_INDEX_RECORD_SIZE};
use crate::path;
use crate::{Error, Result};

/// An open archive file.
///
/// Opening does not parse anything; call [`PakFile::read_header`] and
/// [`PakFile::read_index`] to decode the structure.
#[derive(Debug)]
pub struct PakFile {
    file: File,
    path: PathBuf,
    size: u64,
}

impl PakFile {
    fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let size = file.metadata()?.len();

        tracing::debug!("Opened archive {} ({} bytes)", path.display(), size);

        Ok(Self {
            file,
            path: path.to_path_buf(),
            size,
        })
    }

    /// Get the archive path.
    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get the archive size in bytes, as seen when it was opened.
    #[inline]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Read and validate the fixed header.
    pub fn read_header(&mut self) -> Result<Header> {
        if self.size < HEADER_SIZE as u64 {
            return Err(FormatError::Truncated(format!(
                "archive of {} bytes is smaller than the {HEADER_SIZE}-byte header",
                self.size
            ))
            .into());
        }

        let mut buf = [0u8; HEADER_SIZE];
        self.file.seek(SeekFrom::Start(0))?;
        self.file.read_exact(&mut buf)?;

        Ok(Header::decode(&buf)?)
    }

    /// Read the index and validate every entry name.
    ///
    /// A single unsafe name anywhere in the index fails the whole read.
    pub fn read_index(&mut self, header: &Header) -> Result<Vec<IndexEntry>> {
        let entries = self.read_index_unchecked(header)?;

        for entry in &entries {
            if let Err(err) = path::validate(&entry.name) {
                return Err(FormatError::InvalidEntry {
                    name: entry.name.clone(),
                    reason: err.to_string(),
                }
                .into());
            }
        }

        Ok(entries)
    }

    /// Read the index without checking names. Callers must validate each
    /// name before using it.
    pub(crate) fn read_index_unchecked(&mut self, header: &Header) -> Result<Vec<IndexEntry>> {
        let index_offset = header.index_offset;
        if index_offset < HEADER_SIZE as u64 || index_offset > self.size {
            return Err(FormatError::IndexOutOfRange {
                index_offset,
                file_size: self.size,
            }
            .into());
        }

        let mut buf = Vec::new();
        self.file.seek(SeekFrom::Start(index_offset))?;
        (&mut self.file)
            .take(self.size - index_offset)
            .read_to_end(&mut buf)?;

        Ok(format::decode_index(&buf, header.num_files)?)
    }

    /// Read the raw (still masked) payload of `entry` after checking its
    /// range against the file size.
    pub(crate) fn read_payload(&mut self, entry: &IndexEntry) -> Result<Vec<u8>> {
        entry.check_bounds(self.size)?;

        let mut data = Vec::new();
        self.file.seek(SeekFrom::Start(entry.offset))?;
        (&mut self.file).take(entry.size).read_to_end(&mut data)?;

        // The file shrank underneath us.
        if data.len() as u64 != entry.size {
            return Err(ValidationError::OutOfBounds {
                name: entry.name.clone(),
                offset: entry.offset,
                size: entry.size,
                file_size: entry.offset + data.len() as u64,
            }
            .into());
        }

        Ok(data)
    }

    /// Copy the whole archive into `dst`, returning the number of bytes copied.
    pub(crate) fn copy_into(&mut self, dst: &mut File) -> Result<u64> {
        self.file.seek(SeekFrom::Start(0))?;
        let copied = io::copy(&mut (&mut self.file).take(self.size), dst)?;

        if copied != self.size {
            return Err(FormatError::Truncated(format!(
                "archive shrank from {} to {} bytes while copying",
                self.size, copied
            ))
            .into());
        }

        Ok(copied)
    }
}

/// Reads PAK archives.
///
/// # Example
///
/// ```no_run
/// use strongbox_pak::{PakReader, SecretKey};
///
/// let reader = PakReader::new(SecretKey::new("night-shift"));
///
/// for entry in reader.list_entries("assets.pak")? {
///     println!("{}: {} bytes", entry.name(), entry.size());
/// }
///
/// let bytes = reader.load("assets.pak", "textures/office.png")?;
/// # Ok::<(), strongbox_pak::Error>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct PakReader {
    key: SecretKey,
}

impl PakReader {
    /// Create a reader that unmasks payloads with `key`.
    pub fn new(key: SecretKey) -> Self {
        Self { key }
    }

    /// Open an archive without parsing it.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<PakFile> {
        PakFile::open(path.as_ref())
    }

    /// List every entry's name and size. No payload is read.
    pub fn list_entries<P: AsRef<Path>>(&self, path: P) -> Result<Vec<PakEntry>> {
        let (_, index) = Self::open_index(path.as_ref())?;
        Ok(index.iter().map(PakEntry::from).collect())
    }

    /// Read and unmask the payload of entry `name`.
    pub fn load<P: AsRef<Path>>(&self, path: P, name: &str) -> Result<Vec<u8>> {
        let name = path::normalize(name);
        let (mut pak, index) = Self::open_index(path.as_ref())?;

        let entry = index
            .iter()
            .find(|e| e.name == name)
            .ok_or_else(|| Error::NotFound(name.clone()))?;

        let mut data = pak.read_payload(entry)?;
        self.key.apply(&mut data);

        tracing::debug!("Loaded {} ({} bytes) from {}", name, data.len(), pak.path().display());

        Ok(data)
    }

    /// Number of entries according to the header. The index is not read.
    pub fn file_count<P: AsRef<Path>>(&self, path: P) -> Result<u32> {
        let mut pak = PakFile::open(path.as_ref())?;
        Ok(pak.read_header()?.num_files)
    }

    /// Check whether entry `name` exists.
    pub fn file_exists<P: AsRef<Path>>(&self, path: P, name: &str) -> Result<bool> {
        Ok(self.get_info(path, name)?.is_some())
    }

    /// Look up entry `name` without reading its payload.
    pub fn get_info<P: AsRef<Path>>(&self, path: P, name: &str) -> Result<Option<PakEntry>> {
        let name = path::normalize(name);
        let (_, index) = Self::open_index(path.as_ref())?;

        Ok(index.iter().find(|e| e.name == name).map(PakEntry::from))
    }

    /// Extract every entry below `output_dir`, creating directories as needed.
    ///
    /// Stops at the first entry that fails, reporting its name. Files
    /// written before the failure are left in place. Returns the number of
    /// files written.
    pub fn extract_all<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        path: P,
        output_dir: Q,
    ) -> Result<usize> {
        let output_dir = output_dir.as_ref();

        let mut pak = PakFile::open(path.as_ref())?;
        let header = pak.read_header()?;
        // Names are checked one by one below so that a hostile name is
        // reported as a path escape for that entry.
        let index = pak.read_index_unchecked(&header)?;

        fs::create_dir_all(output_dir)?;
        let root = fs::canonicalize(output_dir)?;

        for entry in &index {
            self.extract_entry(&mut pak, &root, entry)
                .map_err(|err| Error::extracting(&entry.name, err))?;
        }

        tracing::info!(
            "Extracted {} entries from {} to {}",
            index.len(),
            pak.path().display(),
            root.display()
        );

        Ok(index.len())
    }

    /// Extract entry `name` to exactly `output_path`.
    pub fn extract_one<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        path: P,
        name: &str,
        output_path: Q,
    ) -> Result<()> {
        let output_path = output_path.as_ref();
        let data = self.load(path, name)?;

        if let Some(parent) = output_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(output_path, &data)?;

        tracing::debug!("Extracted {} to {}", name, output_path.display());

        Ok(())
    }

    /// Check the archive's structure without extracting anything.
    ///
    /// Verifies the header, that the index offset lies inside the file, that
    /// the claimed entry count can fit between the index offset and the end
    /// of the file, that every name is safe and that every payload range is
    /// in bounds. An index that ends before its last record is an
    /// [`ValidationError::IndexOverrun`]. Returns the number of entries
    /// checked.
    pub fn validate<P: AsRef<Path>>(&self, path: P) -> Result<u32> {
        let mut pak = PakFile::open(path.as_ref())?;
        let header = pak.read_header()?;
        let size = pak.size();

        // An empty archive may end exactly where its (empty) index starts.
        let offset_ok = header.index_offset >= HEADER_SIZE as u64
            && (header.index_offset < size
                || (header.num_files == 0 && header.index_offset == size));
        if !offset_ok {
            return Err(FormatError::IndexOutOfRange {
                index_offset: header.index_offset,
                file_size: size,
            }
            .into());
        }

        let available = size - header.index_offset;
        if u64::from(header.num_files) * MIN_INDEX_RECORD_SIZE > available {
            return Err(ValidationError::IndexOverrun {
                num_files: header.num_files,
                available,
            }
            .into());
        }

        // Records longer than the minimum can still run off the end.
        let index = match pak.read_index(&header) {
            Err(Error::Format(FormatError::Truncated(_))) => {
                return Err(ValidationError::IndexOverrun {
                    num_files: header.num_files,
                    available,
                }
                .into())
            }
            other => other?,
        };
        for entry in &index {
            entry.check_bounds(size)?;
        }

        tracing::debug!("Validated {} ({} entries)", pak.path().display(), index.len());

        Ok(header.num_files)
    }

    fn open_index(path: &Path) -> Result<(PakFile, Vec<IndexEntry>)> {
        let mut pak = PakFile::open(path)?;
        let header = pak.read_header()?;
        let index = pak.read_index(&header)?;
        Ok((pak, index))
    }

    fn extract_entry(&self, pak: &mut PakFile, root: &Path, entry: &IndexEntry) -> Result<()> {
        let target = path::resolve_output(root, &entry.name)?;

        let mut data = pak.read_payload(entry)?;
        self.key.apply(&mut data);

        path::prepare_target(root, &target, &entry.name)?;
        fs::write(&target, &data)?;

        tracing::debug!("Extracted {} ({} bytes)", entry.name, data.len());

        Ok(())
    }
}
