//! Filesystem helpers shared by the codec and the engine

use std::{
    fs::{self, File, OpenOptions},
    io::{self, Read, Write},
    path::{Path, PathBuf},
};

use tracing::{debug, warn};

/// Returns true if path has one of the allowed extensions.
pub fn has_allowed_extension(path: &Path, allowed: &[&str]) -> bool {
    match path.extension() {
        Some(ext) => allowed.iter().any(|e| ext.eq_ignore_ascii_case(*e)),
        None => false,
    }
}

/// Ensures parent directory exists for a file path.
pub fn ensure_parent_dir(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent),
        _ => Ok(()),
    }
}

/// Reads up to `len` bytes from the start of a file.
pub fn read_prefix(path: &Path, len: usize) -> io::Result<Vec<u8>> {
    let file = File::open(path)?;
    let mut buffer = Vec::with_capacity(len);
    file.take(len as u64).read_to_end(&mut buffer)?;
    Ok(buffer)
}

/// Hidden sibling of `final_path` used while writing.
pub fn temp_path_for(final_path: &Path) -> PathBuf {
    let name = final_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    let temp_name = format!(".{}.{}.part", name, uuid::Uuid::new_v4().simple());
    final_path.with_file_name(temp_name)
}

/// Writes `data` to a temporary sibling, syncs it, then renames it over
/// `path`. The destination either keeps its old content or gets all of
/// `data`.
pub fn atomic_write(path: &Path, data: &[u8]) -> io::Result<()> {
    ensure_parent_dir(path)?;
    let temp = temp_path_for(path);

    let result = write_synced(&temp, data).and_then(|_| rename_replace(&temp, path));
    if let Err(err) = &result {
        warn!(path = %path.display(), error = %err, "atomic write failed");
        if temp.exists() {
            let _ = fs::remove_file(&temp);
        }
    } else {
        debug!(path = %path.display(), bytes = data.len(), "atomic write complete");
    }
    result
}

fn write_synced(path: &Path, data: &[u8]) -> io::Result<()> {
    let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
    file.write_all(data)?;
    file.sync_all()
}

fn rename_replace(from: &Path, to: &Path) -> io::Result<()> {
    // rename over an existing file fails on Windows
    if cfg!(windows) && to.exists() {
        fs::remove_file(to)?;
    }
    fs::rename(from, to)
}
