//! Parquet snapshot read/write operations
//!
//! A snapshot stores a whole [`DirectoryInfo`] as flat rows: one metadata
//! row first, then one row per directory (pre-order, so parents come before
//! children) and one row per file. Hashes and summaries are not stored;
//! they are recomputed after loading.

use crate::models::{FileEntry, SnapshotMeta};
use crate::tree::{DirectoryInfo, join_path};
use crate::epoch_seconds;
use arrow_array::{
    Array, ArrayRef, ArrowPrimitiveType, BooleanArray, Int64Array, PrimitiveArray, RecordBatch,
    StringArray, UInt32Array, UInt64Array,
};
use arrow_schema::{DataType, Field, Schema};
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::file::properties::WriterProperties;
use std::fs::File;
use std::io::{Error, ErrorKind, Result};
use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;

/// Current snapshot layout; other versions are rejected on read.
pub const FORMAT_VERSION: u32 = 1;

/// Rows per record batch when writing.
const BATCH_ROWS: usize = 4_096;

const KIND_META: &str = "meta";
const KIND_DIR: &str = "dir";
const KIND_FILE: &str = "file";

/// Return the Arrow schema shared by snapshot writers and readers.
#[must_use]
pub fn snapshot_schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("kind", DataType::Utf8, false),
        Field::new("path", DataType::Utf8, true),
        Field::new("size", DataType::UInt64, true),
        Field::new("mtime", DataType::Int64, true),
        Field::new("listed", DataType::Boolean, true),
        Field::new("meta_root", DataType::Utf8, true),
        Field::new("meta_site", DataType::Utf8, true),
        Field::new("meta_created_at", DataType::Int64, true),
        Field::new("meta_format_version", DataType::UInt32, true),
    ]))
}

/// Metadata for a snapshot of `tree` taken now.
#[must_use]
pub fn meta_for(site: &str, tree: &DirectoryInfo) -> SnapshotMeta {
    SnapshotMeta {
        root: tree.name().to_string(),
        site: site.to_string(),
        created_at: epoch_seconds(SystemTime::now()),
        format_version: FORMAT_VERSION,
    }
}

/// One directory or file row
struct TreeRow {
    kind: &'static str,
    path: String,
    size: Option<u64>,
    mtime: i64,
    listed: Option<bool>,
}

fn collect_rows(node: &DirectoryInfo, relative: &str, rows: &mut Vec<TreeRow>) {
    rows.push(TreeRow {
        kind: KIND_DIR,
        path: relative.to_string(),
        size: None,
        mtime: node.mtime(),
        listed: Some(node.is_listed()),
    });
    for (name, info) in node.files() {
        rows.push(TreeRow {
            kind: KIND_FILE,
            path: join_path(relative, name),
            size: Some(info.size),
            mtime: info.mtime,
            listed: None,
        });
    }
    for child in node.directories() {
        collect_rows(child, &join_path(relative, child.name()), rows);
    }
}

/// Write a tree snapshot to a Parquet file.
pub fn write_tree(path: &str, meta: &SnapshotMeta, tree: &DirectoryInfo) -> Result<()> {
    let file_path = Path::new(path);

    if let Some(parent) = file_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = File::create(file_path)?;
    let schema = snapshot_schema();
    let props = WriterProperties::builder().build();
    let mut writer =
        ArrowWriter::try_new(file, schema.clone(), Some(props)).map_err(Error::other)?;

    let metadata_batch = create_metadata_batch(&schema, meta)?;
    writer.write(&metadata_batch).map_err(Error::other)?;

    let mut rows = Vec::new();
    collect_rows(tree, "", &mut rows);
    for chunk in rows.chunks(BATCH_ROWS) {
        let batch = create_rows_batch(&schema, chunk)?;
        writer.write(&batch).map_err(Error::other)?;
    }

    writer.close().map_err(Error::other)?;
    log::debug!("Wrote snapshot {path} with {} rows", rows.len() + 1);
    Ok(())
}

/// Read a tree snapshot from a Parquet file.
pub fn read_tree(path: &str) -> Result<(SnapshotMeta, DirectoryInfo)> {
    let file = File::open(path)?;

    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .map_err(|e| Error::new(ErrorKind::InvalidData, e))?;

    let mut reader = builder
        .build()
        .map_err(|e| Error::new(ErrorKind::InvalidData, e))?;

    let mut meta: Option<SnapshotMeta> = None;
    let mut tree: Option<DirectoryInfo> = None;

    for batch_result in &mut reader {
        let batch = batch_result.map_err(|e| Error::new(ErrorKind::InvalidData, e))?;
        let kinds = column::<StringArray>(&batch, "kind")?;
        let paths = column::<StringArray>(&batch, "path")?;
        let sizes = column::<UInt64Array>(&batch, "size")?;
        let mtimes = column::<Int64Array>(&batch, "mtime")?;
        let listed = column::<BooleanArray>(&batch, "listed")?;

        for row in 0..batch.num_rows() {
            let kind = kinds.value(row);
            if kind == KIND_META {
                let found = extract_metadata(&batch, row)?;
                tree = Some(DirectoryInfo::new(found.root.as_str()));
                meta = Some(found);
                continue;
            }

            let tree = tree.as_mut().ok_or_else(|| {
                Error::new(ErrorKind::InvalidData, "Tree row before metadata row")
            })?;
            let path = string_value(paths, row).unwrap_or_default();
            let mtime = primitive_value(mtimes, row).unwrap_or_default();

            match kind {
                KIND_DIR => {
                    if let Some(node) = tree.get_node_mut(path, true) {
                        node.set_mtime(mtime);
                        if !listed.is_null(row) && listed.value(row) {
                            node.mark_listed();
                        }
                    }
                }
                KIND_FILE => {
                    let (dir, name) = path.rsplit_once('/').unwrap_or(("", path));
                    let size = primitive_value(sizes, row).ok_or_else(|| {
                        Error::new(ErrorKind::InvalidData, format!("Missing size for {path}"))
                    })?;
                    if let Some(node) = tree.get_node_mut(dir, true) {
                        node.add_files([FileEntry::new(name, size, mtime)]);
                    }
                }
                other => {
                    return Err(Error::new(
                        ErrorKind::InvalidData,
                        format!("Unknown row kind: {other}"),
                    ));
                }
            }
        }
    }

    let meta = meta.ok_or_else(|| Error::new(ErrorKind::InvalidData, "No metadata found"))?;
    let tree = tree.ok_or_else(|| Error::new(ErrorKind::InvalidData, "No tree found"))?;
    Ok((meta, tree))
}

fn create_rows_batch(schema: &Arc<Schema>, rows: &[TreeRow]) -> Result<RecordBatch> {
    let len = rows.len();

    let kinds: ArrayRef = Arc::new(StringArray::from(
        rows.iter().map(|r| Some(r.kind)).collect::<Vec<_>>(),
    ));
    let paths: ArrayRef = Arc::new(StringArray::from(
        rows.iter()
            .map(|r| Some(r.path.as_str()))
            .collect::<Vec<_>>(),
    ));
    let sizes: ArrayRef = Arc::new(UInt64Array::from(
        rows.iter().map(|r| r.size).collect::<Vec<_>>(),
    ));
    let mtimes: ArrayRef = Arc::new(Int64Array::from(
        rows.iter().map(|r| Some(r.mtime)).collect::<Vec<_>>(),
    ));
    let listed: ArrayRef = Arc::new(BooleanArray::from(
        rows.iter().map(|r| r.listed).collect::<Vec<_>>(),
    ));

    let meta_roots: ArrayRef = Arc::new(StringArray::from(vec![None::<&str>; len]));
    let meta_sites: ArrayRef = Arc::new(StringArray::from(vec![None::<&str>; len]));
    let meta_created: ArrayRef = Arc::new(Int64Array::from(vec![None::<i64>; len]));
    let meta_versions: ArrayRef = Arc::new(UInt32Array::from(vec![None::<u32>; len]));

    RecordBatch::try_new(
        schema.clone(),
        vec![
            kinds,
            paths,
            sizes,
            mtimes,
            listed,
            meta_roots,
            meta_sites,
            meta_created,
            meta_versions,
        ],
    )
    .map_err(Error::other)
}

fn create_metadata_batch(schema: &Arc<Schema>, meta: &SnapshotMeta) -> Result<RecordBatch> {
    let kinds: ArrayRef = Arc::new(StringArray::from(vec![Some(KIND_META)]));
    let paths: ArrayRef = Arc::new(StringArray::from(vec![None::<&str>]));
    let sizes: ArrayRef = Arc::new(UInt64Array::from(vec![None::<u64>]));
    let mtimes: ArrayRef = Arc::new(Int64Array::from(vec![None::<i64>]));
    let listed: ArrayRef = Arc::new(BooleanArray::from(vec![None::<bool>]));

    let meta_roots: ArrayRef = Arc::new(StringArray::from(vec![Some(meta.root.as_str())]));
    let meta_sites: ArrayRef = Arc::new(StringArray::from(vec![Some(meta.site.as_str())]));
    let meta_created: ArrayRef = Arc::new(Int64Array::from(vec![Some(meta.created_at)]));
    let meta_versions: ArrayRef = Arc::new(UInt32Array::from(vec![Some(meta.format_version)]));

    RecordBatch::try_new(
        schema.clone(),
        vec![
            kinds,
            paths,
            sizes,
            mtimes,
            listed,
            meta_roots,
            meta_sites,
            meta_created,
            meta_versions,
        ],
    )
    .map_err(Error::other)
}

fn extract_metadata(batch: &RecordBatch, row: usize) -> Result<SnapshotMeta> {
    let format_version = primitive_value(column::<UInt32Array>(batch, "meta_format_version")?, row)
        .ok_or_else(|| Error::new(ErrorKind::InvalidData, "Missing format_version"))?;
    if format_version != FORMAT_VERSION {
        return Err(Error::new(
            ErrorKind::InvalidData,
            format!("Unsupported snapshot format version {format_version}, expected {FORMAT_VERSION}"),
        ));
    }

    let root = string_value(column::<StringArray>(batch, "meta_root")?, row)
        .ok_or_else(|| Error::new(ErrorKind::InvalidData, "Missing root"))?;
    let site = string_value(column::<StringArray>(batch, "meta_site")?, row).unwrap_or_default();
    let created_at =
        primitive_value(column::<Int64Array>(batch, "meta_created_at")?, row).unwrap_or_default();

    Ok(SnapshotMeta {
        root: root.to_string(),
        site: site.to_string(),
        created_at,
        format_version,
    })
}

fn column<'b, A: Array + 'static>(batch: &'b RecordBatch, col_name: &str) -> Result<&'b A> {
    let col = batch.column_by_name(col_name).ok_or_else(|| {
        Error::new(
            ErrorKind::InvalidData,
            format!("Missing column: {col_name}"),
        )
    })?;

    col.as_any().downcast_ref::<A>().ok_or_else(|| {
        Error::new(
            ErrorKind::InvalidData,
            format!("Invalid type for: {col_name}"),
        )
    })
}

fn string_value(array: &StringArray, row: usize) -> Option<&str> {
    if array.is_null(row) {
        None
    } else {
        Some(array.value(row))
    }
}

fn primitive_value<T: ArrowPrimitiveType>(
    array: &PrimitiveArray<T>,
    row: usize,
) -> Option<T::Native> {
    if array.is_null(row) {
        None
    } else {
        Some(array.value(row))
    }
}
