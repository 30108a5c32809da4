//! Entry name normalization and validation.
//!
//! Names are checked twice: before they enter an index, and again when they
//! are read back from a file and joined onto an extraction directory. An
//! index record is never trusted merely because it parsed.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use strongbox_common::bytes;

use crate::error::{CapacityError, ValidationError};
use crate::format::MAX_FILENAME_LENGTH;
use crate::Result;

/// Characters rejected anywhere in an entry name.
pub const RESERVED_CHARS: [u8; 7] = [b'<', b'>', b':', b'"', b'|', b'?', b'*'];

/// Turn a caller-supplied path into an entry name.
///
/// Backslashes become forward slashes and every leading slash is stripped,
/// so absolute paths cannot become absolute entries.
pub fn normalize(path: &str) -> String {
    let name = path.replace('\\', "/");
    name.trim_start_matches('/').to_string()
}

/// Check that `name` is a safe entry name.
///
/// Length violations are [`CapacityError::NameTooLong`]; everything else is
/// a [`ValidationError`].
pub fn validate(name: &str) -> Result<()> {
    let raw = name.as_bytes();

    if raw.is_empty() {
        return Err(ValidationError::EmptyName.into());
    }
    if raw.len() > MAX_FILENAME_LENGTH {
        return Err(CapacityError::NameTooLong {
            len: raw.len(),
            limit: MAX_FILENAME_LENGTH,
        }
        .into());
    }
    if bytes::find_pattern(b"..", raw).is_some() || raw[0] == b'/' || raw[0] == b'\\' {
        return Err(ValidationError::PathEscape(name.to_string()).into());
    }
    if bytes::find_null(raw).is_some() {
        return Err(ValidationError::NulByte(name.to_string()).into());
    }
    if let Some(pos) = find_reserved(raw) {
        return Err(ValidationError::ReservedCharacter {
            name: name.to_string(),
            ch: raw[pos] as char,
        }
        .into());
    }

    Ok(())
}

/// `true` if [`validate`] accepts `name`.
#[inline]
pub fn is_valid(name: &str) -> bool {
    validate(name).is_ok()
}

/// Normalize then validate, returning the name to store.
pub fn sanitize(path: &str) -> Result<String> {
    let name = normalize(path);
    validate(&name)?;
    Ok(name)
}

fn find_reserved(raw: &[u8]) -> Option<usize> {
    let [a, b, c, d, e, f, g] = RESERVED_CHARS;
    let first = bytes::find_any3(a, b, c, raw);
    let second = bytes::find_any3(d, e, f, raw);
    let third = bytes::find_any3(g, g, g, raw);
    [first, second, third].into_iter().flatten().min()
}

/// Derive an entry name from a file below `root`.
///
/// Returns `None` when the path is not below `root` or is not valid UTF-8.
pub fn relative_name(root: &Path, file: &Path) -> Option<String> {
    let rel = file.strip_prefix(root).ok()?;

    let mut parts = Vec::new();
    for component in rel.components() {
        parts.push(component.as_os_str().to_str()?);
    }

    Some(normalize(&parts.join("/")))
}

/// Resolve where entry `name` is written below the extraction `root`.
///
/// `root` must already be canonical. The name is re-validated, joined one
/// normal component at a time, and the result must stay lexically inside
/// `root`.
pub fn resolve_output(root: &Path, name: &str) -> Result<PathBuf> {
    validate(name)?;

    let mut out = root.to_path_buf();
    for component in Path::new(name).components() {
        match component {
            Component::Normal(part) => out.push(part),
            _ => return Err(ValidationError::PathEscape(name.to_string()).into()),
        }
    }

    if !out.starts_with(root) || out == root {
        return Err(ValidationError::PathEscape(name.to_string()).into());
    }

    Ok(out)
}

/// Create the parent directories of `target` below the canonical `root`.
///
/// Each directory is inspected before it is entered or created: an
/// existing symlink anywhere on the way, or at `target` itself, is a
/// [`ValidationError::PathEscape`] and nothing further is created.
pub fn prepare_target(root: &Path, target: &Path, name: &str) -> Result<()> {
    let escape = || ValidationError::PathEscape(name.to_string());

    let rel = target.strip_prefix(root).map_err(|_| escape())?;
    let parent = rel.parent().ok_or_else(escape)?;

    let mut current = root.to_path_buf();
    for component in parent.components() {
        let Component::Normal(part) = component else {
            return Err(escape().into());
        };
        current.push(part);

        match fs::symlink_metadata(&current) {
            Ok(meta) if meta.file_type().is_symlink() => return Err(escape().into()),
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => {
                return Err(io::Error::other(format!(
                    "{} exists and is not a directory",
                    current.display()
                ))
                .into())
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => fs::create_dir(&current)?,
            Err(err) => return Err(err.into()),
        }
    }

    if let Ok(meta) = fs::symlink_metadata(target) {
        if meta.file_type().is_symlink() {
            return Err(escape().into());
        }
    }

    Ok(())
}
