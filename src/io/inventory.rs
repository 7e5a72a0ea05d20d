//! Line-oriented inventory and dump files: `lfn size [mtime]`

use crate::models::InventoryRecord;
use crate::tree::join_path;
use std::fs::File;
use std::io::{BufRead, BufReader, Error, ErrorKind, Result};
use std::path::Path;

/// Parse inventory lines lazily. Blank lines and `#` comments are skipped.
pub fn parse_inventory<R: BufRead>(reader: R) -> impl Iterator<Item = Result<InventoryRecord>> {
    reader
        .lines()
        .enumerate()
        .filter_map(|(index, line)| match line {
            Err(err) => Some(Err(err)),
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() || trimmed.starts_with('#') {
                    None
                } else {
                    Some(parse_line(trimmed, index + 1))
                }
            }
        })
}

fn parse_line(line: &str, number: usize) -> Result<InventoryRecord> {
    let invalid = |what: &str| {
        Error::new(
            ErrorKind::InvalidData,
            format!("line {number}: {what}: {line}"),
        )
    };

    let mut fields = line.split_whitespace();
    let lfn = fields.next().ok_or_else(|| invalid("missing path"))?;
    let size = fields
        .next()
        .ok_or_else(|| invalid("missing size"))?
        .parse::<u64>()
        .map_err(|_| invalid("invalid size"))?;
    let mtime = match fields.next() {
        Some(value) => value.parse::<i64>().map_err(|_| invalid("invalid mtime"))?,
        None => 0,
    };
    if fields.next().is_some() {
        return Err(invalid("unexpected trailing fields"));
    }

    Ok(InventoryRecord::new(lfn, size, mtime))
}

/// Read and parse a whole inventory file.
pub fn read_inventory_file(path: &Path) -> Result<Vec<InventoryRecord>> {
    let file = File::open(path)?;
    let records = parse_inventory(BufReader::new(file)).collect::<Result<Vec<_>>>()?;
    log::info!("Read {} inventory records from {}", records.len(), path.display());
    Ok(records)
}

/// Keep only records below `location/<directory>/` for one of `directories`.
pub fn filter_to_directories<I>(
    records: I,
    location: &str,
    directories: &[String],
) -> impl Iterator<Item = InventoryRecord> + use<I>
where
    I: IntoIterator<Item = InventoryRecord>,
{
    let prefixes: Vec<String> = directories
        .iter()
        .map(|directory| format!("{}/", join_path(location, directory).trim_end_matches('/')))
        .collect();
    records
        .into_iter()
        .filter(move |record| prefixes.iter().any(|prefix| record.lfn.starts_with(prefix.as_str())))
}
