// src/header/mod.rs
//! Column labels split across two physical rows.
//!
//! Election results and similar spreadsheets exported as CSV often carry a
//! group label on one row ("Erststimmen") and a sub-label on the next
//! ("Anzahl", "Gültig"). Both rows are read, normalized, and joined by
//! column position into one label per column.

pub mod clean;

use crate::error::{Error, Result};
use crate::table::{read_csv, read_records, Table};
use std::{collections::HashMap, path::Path};
use tracing::{debug, instrument};

pub use clean::{clean_name, SENTINEL, SEPARATOR};

/// Read `row_count` rows after skipping `skip_rows` and return one normalized
/// label per column position. The source's delimiter is sniffed.
pub fn extract_header_row(
    source_path: impl AsRef<Path>,
    skip_rows: usize,
    row_count: usize,
) -> Result<Vec<String>> {
    extract_header_row_with_delimiter(source_path, skip_rows, row_count, None)
}

/// Like [`extract_header_row`] with an explicit delimiter. With more than one
/// row, the cells of a column are joined by a space before normalization.
#[instrument(level = "debug", skip(source_path), fields(path = %source_path.as_ref().display()))]
pub fn extract_header_row_with_delimiter(
    source_path: impl AsRef<Path>,
    skip_rows: usize,
    row_count: usize,
    delimiter: Option<u8>,
) -> Result<Vec<String>> {
    let path = source_path.as_ref();
    if row_count == 0 {
        return Err(Error::source_read(path, "header row count must be at least 1"));
    }
    let records = read_records(path, skip_rows, Some(row_count), delimiter)?;
    let width = records.iter().map(Vec::len).max().unwrap_or(0);

    let labels: Vec<String> = (0..width)
        .map(|col| {
            let joined = records
                .iter()
                .filter_map(|r| r.get(col))
                .map(|cell| cell.trim())
                .filter(|cell| !cell.is_empty())
                .collect::<Vec<_>>()
                .join(" ");
            clean_name(&joined)
        })
        .collect();
    debug!(?labels, "extracted header row");
    Ok(labels)
}

/// Join two aligned header rows: `row1[i]` alone where `row2[i]` is the
/// sentinel, else `row1[i] + "_" + row2[i]`.
///
/// No uniqueness check is made on the result; see [`ensure_unique`].
pub fn merge_headers<A, B>(row1: &[A], row2: &[B], sentinel: &str) -> Result<Vec<String>>
where
    A: AsRef<str>,
    B: AsRef<str>,
{
    if row1.len() != row2.len() {
        return Err(Error::length_mismatch("header rows", row1.len(), row2.len()));
    }
    Ok(row1
        .iter()
        .zip(row2)
        .map(|(top, bottom)| {
            let (top, bottom) = (top.as_ref(), bottom.as_ref());
            if bottom == sentinel {
                top.to_string()
            } else {
                format!("{}{}{}", top, SEPARATOR, bottom)
            }
        })
        .collect())
}

/// Fail on the first label that repeats an earlier one.
pub fn ensure_unique<S: AsRef<str>>(header: &[S]) -> Result<()> {
    let mut seen: HashMap<&str, usize> = HashMap::with_capacity(header.len());
    for (i, label) in header.iter().enumerate() {
        if let Some(&first) = seen.get(label.as_ref()) {
            return Err(Error::DuplicateLabel {
                label: label.as_ref().to_string(),
                first,
                second: i,
            });
        }
        seen.insert(label.as_ref(), i);
    }
    Ok(())
}

/// Relabel the table's columns positionally.
pub fn apply_header<S: AsRef<str>>(table: &mut Table, header: &[S]) -> Result<()> {
    table.set_columns(header.iter().map(|s| s.as_ref().to_string()).collect())
}

/// Read a CSV whose labels span rows `header_skip` and `header_skip + 1` and
/// whose data starts after `data_skip` rows.
#[instrument(level = "info", skip(path), fields(path = %path.as_ref().display()))]
pub fn read_split_header_csv(
    path: impl AsRef<Path>,
    header_skip: usize,
    data_skip: usize,
    sentinel: &str,
    delimiter: Option<u8>,
) -> Result<Table> {
    let path = path.as_ref();
    let top = extract_header_row_with_delimiter(path, header_skip, 1, delimiter)?;
    let bottom = extract_header_row_with_delimiter(path, header_skip + 1, 1, delimiter)?;
    let merged = merge_headers(&top, &bottom, sentinel)?;

    let mut table = read_csv(path, data_skip, None, delimiter)?;
    apply_header(&mut table, &merged)?;
    Ok(table)
}
