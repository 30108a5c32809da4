//! PAK archive writer.
//!
//! [`PakWriter::build`] writes a whole archive from scratch;
//! [`PakWriter::append_entry`] grows an existing one without touching the
//! payloads already in it.

use std::fs::{self, File};
use std::io::{self, BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

use tempfile::NamedTempFile;
use walkdir::WalkDir;

use crate::cipher::SecretKey;
use crate::error::{CapacityError, ValidationError};
use crate::format::{self, Header, IndexEntry, HEADER_SIZE, MAX_FILES_IN_PAK};
use crate::path;
use crate::reader::PakReader;
use crate::{Error, Result};

/// Writes PAK archives.
///
/// # Example
///
/// ```no_run
/// use std::collections::BTreeMap;
/// use strongbox_pak::{PakWriter, SecretKey};
///
/// let writer = PakWriter::new(SecretKey::new("night-shift"));
///
/// let mut entries = BTreeMap::new();
/// entries.insert("a.txt", b"hello".to_vec());
/// entries.insert("dir/b.bin", vec![0x00, 0xFF, 0x10]);
/// writer.build("assets.pak", entries)?;
///
/// writer.append_entry("assets.pak", "c.txt", b"world")?;
/// # Ok::<(), strongbox_pak::Error>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct PakWriter {
    key: SecretKey,
}

impl PakWriter {
    /// Create a writer that masks payloads with `key`.
    pub fn new(key: SecretKey) -> Self {
        Self { key }
    }

    /// Build a new archive at `path` from `(name, bytes)` pairs.
    ///
    /// Names are normalized and validated before anything is written, and
    /// entries are laid out sorted by name so the same input always
    /// produces the same file. An existing file at `path` is replaced.
    pub fn build<P, I, K, V>(&self, path: P, entries: I) -> Result<()>
    where
        P: AsRef<Path>,
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<[u8]>,
    {
        let path = path.as_ref();
        let entries: Vec<(K, V)> = entries.into_iter().collect();
        check_capacity(entries.len())?;

        let mut staged = Vec::with_capacity(entries.len());
        for (name, data) in entries {
            staged.push((path::sanitize(name.as_ref())?, data));
        }

        staged.sort_by(|a, b| a.0.cmp(&b.0));
        if let Some(pair) = staged.windows(2).find(|pair| pair[0].0 == pair[1].0) {
            return Err(ValidationError::DuplicateName(pair[0].0.clone()).into());
        }

        let size = self.write_archive(path, &staged)?;

        tracing::info!(
            "Built {} with {} entries ({} bytes)",
            path.display(),
            staged.len(),
            size
        );

        Ok(())
    }

    /// Build an archive from every regular file below `source_dir`.
    ///
    /// Entry names are the file paths relative to `source_dir`. Files whose
    /// name is not valid UTF-8 or fails validation are skipped with a
    /// warning. Symlinks are not followed. Returns the number of entries
    /// written.
    pub fn build_from_directory<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        path: P,
        source_dir: Q,
    ) -> Result<usize> {
        let path = path.as_ref();
        let source_dir = source_dir.as_ref();

        // A previous build of this archive may sit inside the source tree.
        let archive = fs::canonicalize(path).ok();

        let mut files: Vec<(String, Vec<u8>)> = Vec::new();
        for ent in WalkDir::new(source_dir)
            .follow_links(false)
            .sort_by_file_name()
        {
            let ent = ent.map_err(walk_error)?;
            if !ent.file_type().is_file() {
                continue;
            }

            if let Some(archive) = &archive {
                if Some(ent.file_name()) == archive.file_name()
                    && fs::canonicalize(ent.path()).ok().as_ref() == Some(archive)
                {
                    tracing::debug!("Skipping output archive {}", ent.path().display());
                    continue;
                }
            }

            let Some(name) = path::relative_name(source_dir, ent.path()) else {
                tracing::warn!("Skipping {}: path is not valid UTF-8", ent.path().display());
                continue;
            };
            if let Err(err) = path::validate(&name) {
                tracing::warn!("Skipping {}: {}", ent.path().display(), err);
                continue;
            }

            let data = fs::read(ent.path())?;
            files.push((name, data));
        }

        let count = files.len();
        self.build(path, files)?;
        Ok(count)
    }

    /// Add one entry to an existing archive.
    ///
    /// The payload is appended at the end of the file, followed by the grown
    /// index, and the header is rewritten to point at it. The update is
    /// staged in a temporary file next to the archive and renamed over it,
    /// so a failure at any step leaves the original archive unchanged.
    pub fn append_entry<P: AsRef<Path>>(&self, path: P, name: &str, data: &[u8]) -> Result<()> {
        let path = path.as_ref();
        let name = path::sanitize(name)?;

        let mut pak = PakReader::open(path)?;
        let header = pak.read_header()?;
        let mut index = pak.read_index(&header)?;

        if index.iter().any(|e| e.name == name) {
            return Err(ValidationError::DuplicateName(name).into());
        }
        check_capacity(index.len() + 1)?;

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut staging = NamedTempFile::new_in(dir)?;
        let offset = pak.copy_into(staging.as_file_mut())?;

        let mut payload = data.to_vec();
        self.key.apply(&mut payload);

        index.push(IndexEntry {
            name: name.clone(),
            offset,
            size: payload.len() as u64,
        });

        let mut updated = header;
        updated.num_files = index.len() as u32;
        updated.index_offset = offset + payload.len() as u64;

        {
            let mut out = BufWriter::new(staging.as_file_mut());
            out.seek(SeekFrom::Start(offset))?;
            out.write_all(&payload)?;
            format::encode_index(&mut out, &index)?;
            out.seek(SeekFrom::Start(0))?;
            out.write_all(&updated.encode())?;
            out.flush()?;
        }

        let permissions = fs::metadata(path)?.permissions();
        staging.as_file().set_permissions(permissions)?;
        staging.as_file().sync_all()?;

        // Release our handle before replacing the file.
        drop(pak);
        staging.persist(path).map_err(|err| Error::Io(err.error))?;

        tracing::info!(
            "Appended {} ({} bytes) to {}, now {} entries",
            name,
            data.len(),
            path.display(),
            updated.num_files
        );

        Ok(())
    }

    /// Write header placeholder, payloads, index, then the final header.
    /// Returns the archive size.
    fn write_archive<V: AsRef<[u8]>>(&self, path: &Path, entries: &[(String, V)]) -> Result<u64> {
        let mut out = BufWriter::new(File::create(path)?);

        // Until the final header lands, the file reads as an empty archive.
        out.write_all(&Header::new(0, HEADER_SIZE as u64).encode())?;

        let mut position = HEADER_SIZE as u64;
        let mut index = Vec::with_capacity(entries.len());

        for (name, data) in entries {
            let mut payload = data.as_ref().to_vec();
            self.key.apply(&mut payload);
            out.write_all(&payload)?;

            index.push(IndexEntry {
                name: name.clone(),
                offset: position,
                size: payload.len() as u64,
            });
            position += payload.len() as u64;

            tracing::debug!("Wrote {} ({} bytes)", name, payload.len());
        }

        let index_offset = position;
        let index_len = format::encode_index(&mut out, &index)?;

        out.seek(SeekFrom::Start(0))?;
        out.write_all(&Header::new(index.len() as u32, index_offset).encode())?;
        out.flush()?;

        let file = out.into_inner().map_err(|err| Error::Io(err.into_error()))?;
        file.sync_all()?;

        Ok(index_offset + index_len)
    }
}

fn check_capacity(count: usize) -> Result<()> {
    if count > MAX_FILES_IN_PAK as usize {
        return Err(CapacityError::TooManyEntries {
            count,
            limit: MAX_FILES_IN_PAK,
        }
        .into());
    }
    Ok(())
}

fn walk_error(err: walkdir::Error) -> Error {
    let msg = err.to_string();
    let io = err.into_io_error().unwrap_or_else(|| io::Error::other(msg));
    Error::Io(io)
}
