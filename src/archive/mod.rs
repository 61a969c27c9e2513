// src/archive/mod.rs
use crate::error::{Error, Result};
use std::{
    fs::{self, File},
    io,
    path::{Path, PathBuf},
};
use tracing::{debug, instrument};
use zip::ZipArchive;

/// Extract every file entry of a zip (or KMZ) archive into `destination_dir`
/// and return the written paths in archive order.
///
/// Entries whose names would escape `destination_dir` are rejected.
#[instrument(level = "info", skip(archive_path, destination_dir), fields(path = %archive_path.as_ref().display()))]
pub fn extract(
    archive_path: impl AsRef<Path>,
    destination_dir: impl AsRef<Path>,
) -> Result<Vec<PathBuf>> {
    let archive_path = archive_path.as_ref();
    let dest = destination_dir.as_ref();

    let file = File::open(archive_path).map_err(|e| Error::source_read(archive_path, e))?;
    let mut archive = ZipArchive::new(file).map_err(|e| Error::source_read(archive_path, e))?;
    fs::create_dir_all(dest).map_err(|e| Error::source_read(dest, e))?;

    let mut written = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(|e| {
            Error::source_read(archive_path, format!("entry #{}: {}", i, e))
        })?;
        let rel = entry.enclosed_name().ok_or_else(|| {
            Error::source_read(archive_path, format!("unsafe entry name {:?}", entry.name()))
        })?;
        if entry.is_dir() {
            continue;
        }

        let out_path = dest.join(rel);
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::source_read(parent, e))?;
        }
        let mut out = File::create(&out_path).map_err(|e| Error::source_read(&out_path, e))?;
        io::copy(&mut entry, &mut out).map_err(|e| Error::source_read(&out_path, e))?;
        debug!(entry = %out_path.display(), "extracted");
        written.push(out_path);
    }
    Ok(written)
}

/// First extracted path with the given extension (case-insensitive).
pub fn find_by_extension<'a>(paths: &'a [PathBuf], extension: &str) -> Option<&'a PathBuf> {
    paths.iter().find(|p| {
        p.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(extension))
    })
}
