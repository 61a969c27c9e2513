//! Row/column reshaping steps applied after a table is parsed.

use crate::error::{Error, Result};
use crate::table::Table;
use std::collections::HashMap;
use tracing::warn;

/// Parse a numeric cell, accepting a decimal comma (`"3,5"`).
pub fn parse_number(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.contains(',') && !trimmed.contains('.') {
        trimmed.replace(',', ".").parse().ok()
    } else {
        trimmed.parse().ok()
    }
}

impl Table {
    /// Keep rows whose `column` cell satisfies `keep`.
    pub fn filter_rows<F>(&self, column: &str, keep: F) -> Result<Table>
    where
        F: Fn(&str) -> bool,
    {
        let idx = self.column_index(column)?;
        let rows = self
            .rows()
            .iter()
            .filter(|r| keep(&r[idx]))
            .cloned()
            .collect();
        Table::new(self.columns().to_vec(), rows)
    }

    pub fn rename(&self, from: &str, to: &str) -> Result<Table> {
        let idx = self.column_index(from)?;
        let mut out = self.clone();
        let mut columns = self.columns().to_vec();
        columns[idx] = to.to_string();
        out.set_columns(columns)?;
        Ok(out)
    }

    /// Keep only `columns`, in the given order.
    pub fn select(&self, columns: &[&str]) -> Result<Table> {
        let idxs = columns
            .iter()
            .map(|c| self.column_index(c))
            .collect::<Result<Vec<_>>>()?;
        let rows = self
            .rows()
            .iter()
            .map(|r| idxs.iter().map(|&i| r[i].clone()).collect())
            .collect();
        Table::new(columns.iter().map(|c| c.to_string()).collect(), rows)
    }

    /// Wide → long: every non-id column becomes a (name, value) row.
    pub fn pivot_longer(&self, id_columns: &[&str], names_to: &str, values_to: &str) -> Result<Table> {
        let id_idxs = id_columns
            .iter()
            .map(|c| self.column_index(c))
            .collect::<Result<Vec<_>>>()?;
        let value_idxs: Vec<usize> = (0..self.column_count())
            .filter(|i| !id_idxs.contains(i))
            .collect();

        let mut columns: Vec<String> = id_columns.iter().map(|c| c.to_string()).collect();
        columns.push(names_to.to_string());
        columns.push(values_to.to_string());

        let mut rows = Vec::with_capacity(self.row_count() * value_idxs.len());
        for row in self.rows() {
            for &vi in &value_idxs {
                let mut out: Vec<String> = id_idxs.iter().map(|&i| row[i].clone()).collect();
                out.push(self.columns()[vi].clone());
                out.push(row[vi].clone());
                rows.push(out);
            }
        }
        Table::new(columns, rows)
    }

    /// Long → wide. Every column other than `names_from`/`values_from`
    /// identifies a row. Rows and new columns keep first-appearance order;
    /// absent combinations are empty cells.
    pub fn pivot_wider(&self, names_from: &str, values_from: &str) -> Result<Table> {
        let name_idx = self.column_index(names_from)?;
        let value_idx = self.column_index(values_from)?;
        let id_idxs: Vec<usize> = (0..self.column_count())
            .filter(|&i| i != name_idx && i != value_idx)
            .collect();

        let mut new_names: Vec<String> = Vec::new();
        let mut name_pos: HashMap<String, usize> = HashMap::new();
        let mut keys: Vec<Vec<String>> = Vec::new();
        let mut key_pos: HashMap<Vec<String>, usize> = HashMap::new();
        let mut cells: HashMap<(usize, usize), String> = HashMap::new();

        for row in self.rows() {
            let key: Vec<String> = id_idxs.iter().map(|&i| row[i].clone()).collect();
            let k = match key_pos.get(&key) {
                Some(&k) => k,
                None => {
                    keys.push(key.clone());
                    key_pos.insert(key, keys.len() - 1);
                    keys.len() - 1
                }
            };
            let name = &row[name_idx];
            let n = match name_pos.get(name) {
                Some(&n) => n,
                None => {
                    new_names.push(name.clone());
                    name_pos.insert(name.clone(), new_names.len() - 1);
                    new_names.len() - 1
                }
            };
            if cells.insert((k, n), row[value_idx].clone()).is_some() {
                warn!(name = %name, "duplicate cell in pivot_wider, keeping last value");
            }
        }

        let mut columns: Vec<String> = id_idxs.iter().map(|&i| self.columns()[i].clone()).collect();
        columns.extend(new_names.iter().cloned());

        let rows = keys
            .into_iter()
            .enumerate()
            .map(|(k, mut key)| {
                for n in 0..new_names.len() {
                    key.push(cells.remove(&(k, n)).unwrap_or_default());
                }
                key
            })
            .collect();
        Table::new(columns, rows)
    }

    /// `v * factor + offset` for every numeric cell of `column`; empty cells stay empty.
    pub fn convert_units(&self, column: &str, factor: f64, offset: f64) -> Result<Table> {
        let idx = self.column_index(column)?;
        let mut rows = self.rows().to_vec();
        for row in rows.iter_mut() {
            let cell = &mut row[idx];
            if cell.trim().is_empty() {
                continue;
            }
            let v = parse_number(cell).ok_or_else(|| Error::NotNumeric {
                column: column.to_string(),
                value: cell.clone(),
            })?;
            *cell = (v * factor + offset).to_string();
        }
        Table::new(self.columns().to_vec(), rows)
    }
}
