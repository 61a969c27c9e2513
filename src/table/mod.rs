// src/table/mod.rs
pub mod reader;
pub mod reshape;

use crate::error::{Error, Result};

pub use reader::{read_csv, read_records, sniff_delimiter};

/// An in-memory table of string cells.
///
/// Every row has exactly `columns.len()` cells.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    /// Build a table from labels and rows. Short rows are padded with empty
    /// cells; a row wider than the header is rejected.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<String>>) -> Result<Self> {
        let width = columns.len();
        let mut padded = Vec::with_capacity(rows.len());
        for (i, mut row) in rows.into_iter().enumerate() {
            if row.len() > width {
                return Err(Error::length_mismatch(
                    format!("row {} vs header", i),
                    width,
                    row.len(),
                ));
            }
            row.resize(width, String::new());
            padded.push(row);
        }
        Ok(Self {
            columns,
            rows: padded,
        })
    }

    /// Headerless records: the widest record sets the column count and
    /// columns are named `x1`, `x2`, … by position.
    pub fn from_records(records: Vec<Vec<String>>) -> Self {
        let width = records.iter().map(Vec::len).max().unwrap_or(0);
        let columns = (1..=width).map(|i| format!("x{}", i)).collect();
        let rows = records
            .into_iter()
            .map(|mut r| {
                r.resize(width, String::new());
                r
            })
            .collect();
        Self { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Replace every column label positionally.
    pub fn set_columns(&mut self, columns: Vec<String>) -> Result<()> {
        if columns.len() != self.columns.len() {
            return Err(Error::length_mismatch(
                "header vs table columns",
                self.columns.len(),
                columns.len(),
            ));
        }
        self.columns = columns;
        Ok(())
    }

    /// Position of the first column labelled `name`.
    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| Error::UnknownColumn(name.to_string()))
    }

    pub fn column_values(&self, name: &str) -> Result<Vec<&str>> {
        let idx = self.column_index(name)?;
        Ok(self.rows.iter().map(|r| r[idx].as_str()).collect())
    }
}
