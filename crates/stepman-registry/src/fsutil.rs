//! Filesystem helpers: local collection copy, directory swap and tolerant
//! cleanup.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// Copy the contents of `src` into `dest`, recursively.
///
/// `dest` is created if missing and must not lie inside `src`. Existing
/// files are replaced when `overwrite` is set; otherwise an existing file
/// is an error.
pub fn copy_dir(src: &Path, dest: &Path, overwrite: bool) -> io::Result<()> {
    if !src.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("{} is not a directory", src.display()),
        ));
    }
    let src_root = src.canonicalize()?;
    if resolve_lenient(dest)?.starts_with(&src_root) {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("cannot copy {} into itself ({})", src.display(), dest.display()),
        ));
    }
    fs::create_dir_all(dest)?;

    for entry in WalkDir::new(&src_root).min_depth(1) {
        let entry = entry.map_err(io::Error::from)?;
        let relative = entry
            .path()
            .strip_prefix(&src_root)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        let to = dest.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&to)?;
            continue;
        }

        if to.exists() && !overwrite {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{} already exists", to.display()),
            ));
        }
        fs::copy(entry.path(), &to)?;
    }
    Ok(())
}

/// Replace the directory `dest` with `staged`.
///
/// The previous `dest` is kept aside until `staged` is in place and put
/// back if the swap fails.
pub fn replace_dir(staged: &Path, dest: &Path) -> io::Result<()> {
    let backup = sibling(dest, "old");
    remove_dir_tolerant(&backup)?;

    let had_previous = dest.exists();
    if had_previous {
        fs::rename(dest, &backup)?;
    }
    if let Err(e) = fs::rename(staged, dest) {
        if had_previous {
            fs::rename(&backup, dest)?;
        }
        return Err(e);
    }
    remove_dir_tolerant(&backup)?;
    Ok(())
}

/// A hidden sibling of `path`: `<parent>/.<name>.<suffix>`.
pub fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.{suffix}"))
}

/// Canonical form of `path` even when its tail does not exist yet: the
/// deepest existing ancestor is canonicalized and the rest appended.
fn resolve_lenient(path: &Path) -> io::Result<PathBuf> {
    let absolute = std::path::absolute(path)?;
    let mut tail = Vec::new();
    let mut current = absolute.as_path();
    loop {
        match current.canonicalize() {
            Ok(base) => {
                return Ok(tail.iter().rev().fold(base, |acc, part| acc.join(part)));
            }
            Err(_) => match (current.parent(), current.file_name()) {
                (Some(parent), Some(name)) => {
                    tail.push(name.to_os_string());
                    current = parent;
                }
                _ => return Ok(absolute),
            },
        }
    }
}

/// Copy one file, creating the destination's parent directories.
pub fn copy_file(src: &Path, dest: &Path) -> io::Result<()> {
    if let Some(parent) = dest.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::copy(src, dest).map(|_| ())
}

/// Remove a directory tree. An already absent tree is not an error.
///
/// Returns whether anything was removed.
pub fn remove_dir_tolerant(path: &Path) -> io::Result<bool> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}
