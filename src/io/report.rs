//! Plain-text report files for missing and orphan files

use crate::services::reconcile::Reconciliation;
use std::fs::File;
use std::io::{BufWriter, Result, Write};
use std::path::{Path, PathBuf};

/// Write `{base}_missing.txt` and `{base}_orphan.txt`, one LFN per line.
///
/// Returns the two paths written.
pub fn write_report(base: &str, reconciliation: &Reconciliation) -> Result<(PathBuf, PathBuf)> {
    let missing = PathBuf::from(format!("{base}_missing.txt"));
    let orphan = PathBuf::from(format!("{base}_orphan.txt"));

    if let Some(parent) = missing.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }

    write_lines(&missing, &reconciliation.missing)?;
    write_lines(&orphan, &reconciliation.orphan)?;
    log::info!(
        "Wrote {} missing and {} orphan files to {} and {}",
        reconciliation.missing.len(),
        reconciliation.orphan.len(),
        missing.display(),
        orphan.display()
    );
    Ok((missing, orphan))
}

fn write_lines(path: &Path, lines: &[String]) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    for line in lines {
        writeln!(writer, "{line}")?;
    }
    writer.flush()
}
