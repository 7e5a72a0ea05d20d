//! Directory reading on Unix through `rustix` directory streams.

use crate::models::{DirectoryListing, FileEntry, SubdirEntry};
use rustix::fs::{self as rfs, Dir, Mode, OFlags};
use std::ffi::OsStr;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::MetadataExt;
use std::path::Path;

/// List one directory. Entries read before a failure are kept in a partial
/// listing; names that are not UTF-8 also make the listing partial.
pub(super) fn read_directory(dir: &Path) -> DirectoryListing {
    let dir_fd = match rfs::openat(
        rfs::CWD,
        dir,
        OFlags::RDONLY | OFlags::DIRECTORY | OFlags::CLOEXEC,
        Mode::empty(),
    ) {
        Ok(fd) => fd,
        Err(err) => {
            log::warn!("Cannot open {}: {}", dir.display(), std::io::Error::from(err));
            return DirectoryListing::failure();
        }
    };

    let entries = match Dir::read_from(&dir_fd) {
        Ok(entries) => entries,
        Err(err) => {
            log::warn!("Cannot read {}: {}", dir.display(), std::io::Error::from(err));
            return DirectoryListing::failure();
        }
    };

    let mut directories = Vec::new();
    let mut files = Vec::new();
    let mut skipped = 0usize;
    for entry_result in entries {
        let entry = match entry_result {
            Ok(entry) => entry,
            Err(err) => {
                log::warn!(
                    "Listing of {} interrupted: {}",
                    dir.display(),
                    std::io::Error::from(err)
                );
                return DirectoryListing::partial(directories, files);
            }
        };

        let name_bytes = entry.file_name().to_bytes();
        if name_bytes == b"." || name_bytes == b".." {
            continue;
        }

        let Ok(name) = std::str::from_utf8(name_bytes) else {
            log::warn!(
                "Skipping non UTF-8 name {} in {}",
                OsStr::from_bytes(name_bytes).to_string_lossy(),
                dir.display()
            );
            skipped += 1;
            continue;
        };
        let child_path = dir.join(name);
        let metadata = match std::fs::symlink_metadata(&child_path) {
            Ok(meta) => meta,
            Err(err) => {
                log::warn!("Cannot stat {}: {err}", child_path.display());
                return DirectoryListing::partial(directories, files);
            }
        };

        if metadata.is_dir() {
            directories.push(SubdirEntry::new(name, metadata.mtime()));
        } else if metadata.is_file() {
            files.push(FileEntry::new(name, metadata.len(), metadata.mtime()));
        }
    }

    if skipped > 0 {
        return DirectoryListing::partial(directories, files);
    }
    DirectoryListing::success(directories, files)
}
