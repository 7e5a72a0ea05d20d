//! Directory reading through `std::fs`, used where the rustix backend is unavailable.

use crate::epoch_seconds;
use crate::models::{DirectoryListing, FileEntry, SubdirEntry};
use std::fs;
use std::path::Path;
use std::time::UNIX_EPOCH;

fn mtime_of(metadata: &fs::Metadata) -> i64 {
    metadata.modified().map_or(0, |time| {
        if time < UNIX_EPOCH { 0 } else { epoch_seconds(time) }
    })
}

pub(super) fn read_directory(dir: &Path) -> DirectoryListing {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            log::warn!("Cannot read {}: {err}", dir.display());
            return DirectoryListing::failure();
        }
    };

    let mut directories = Vec::new();
    let mut files = Vec::new();
    let mut skipped = 0usize;
    for entry_result in entries {
        let found = match entry_result.and_then(|entry| {
            let metadata = fs::symlink_metadata(entry.path())?;
            Ok((entry.file_name(), metadata))
        }) {
            Ok(found) => found,
            Err(err) => {
                log::warn!("Listing of {} interrupted: {err}", dir.display());
                return DirectoryListing::partial(directories, files);
            }
        };

        let (name, metadata) = found;
        let name = match name.into_string() {
            Ok(name) => name,
            Err(raw) => {
                log::warn!(
                    "Skipping non UTF-8 name {} in {}",
                    raw.to_string_lossy(),
                    dir.display()
                );
                skipped += 1;
                continue;
            }
        };
        if metadata.is_dir() {
            directories.push(SubdirEntry::new(name, mtime_of(&metadata)));
        } else if metadata.is_file() {
            files.push(FileEntry::new(name, metadata.len(), mtime_of(&metadata)));
        }
    }

    if skipped > 0 {
        return DirectoryListing::partial(directories, files);
    }
    DirectoryListing::success(directories, files)
}
