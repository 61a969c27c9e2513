// src/recipe/mod.rs
//! A document described as data: where the file comes from, how to read it,
//! and which reshaping steps to apply before rendering.
//!
//! ```yaml
//! name: btw21-erststimmen
//! source:
//!   url: https://example.org/btw21_kerg2.csv
//! format:
//!   kind: csv
//!   delimiter: ";"
//!   header: { skip_rows: 2, rows: 2 }
//!   data_skip: 4
//! steps:
//!   - { op: select, columns: [gebiet, erststimmen_anzahl] }
//! ```

pub mod run;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

pub use run::{apply_steps, process, run, RunReport};

fn default_max_rows() -> usize {
    20
}

fn default_sentinel() -> String {
    crate::header::SENTINEL.to_string()
}

fn default_header_rows() -> usize {
    2
}

fn yes() -> bool {
    true
}

fn one() -> f64 {
    1.0
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Recipe {
    pub name: String,
    pub source: Source,
    pub format: Format,
    #[serde(default)]
    pub steps: Vec<Step>,
    /// Rows shown by the table renderer.
    #[serde(default = "default_max_rows")]
    pub max_rows: usize,
}

/// Exactly one of `url` or `path`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Default)]
pub struct Source {
    pub url: Option<String>,
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Format {
    Csv {
        /// Single character; sniffed when absent.
        delimiter: Option<char>,
        header: Option<HeaderSpec>,
        /// Rows before the data block.
        #[serde(default)]
        data_skip: usize,
    },
    Netcdf {
        variable: String,
        /// Dimensions fixed at an index before rendering.
        #[serde(default)]
        slice: BTreeMap<String, usize>,
        convert: Option<GridConversion>,
    },
    Kmz {
        dissolve_by: Option<String>,
    },
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct HeaderSpec {
    pub skip_rows: usize,
    /// 1 for a plain header row, 2 for a label split across two rows.
    #[serde(default = "default_header_rows")]
    pub rows: usize,
    #[serde(default = "default_sentinel")]
    pub sentinel: String,
    /// Reject repeated labels after merging.
    #[serde(default = "yes")]
    pub unique: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct GridConversion {
    #[serde(default = "one")]
    pub factor: f64,
    #[serde(default)]
    pub offset: f64,
    pub units: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct LabelPattern {
    pub name: String,
    pub pattern: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    /// Keep rows passing every given condition.
    Filter {
        column: String,
        equals: Option<String>,
        pattern: Option<String>,
        #[serde(default)]
        non_empty: bool,
    },
    Rename {
        from: String,
        to: String,
    },
    Select {
        columns: Vec<String>,
    },
    PivotLonger {
        id_columns: Vec<String>,
        names_to: String,
        values_to: String,
    },
    PivotWider {
        names_from: String,
        values_from: String,
    },
    ConvertUnits {
        column: String,
        #[serde(default = "one")]
        factor: f64,
        #[serde(default)]
        offset: f64,
    },
    /// Parse `column` with the first matching pattern and append its named
    /// fields as new columns.
    SplitLabel {
        column: String,
        patterns: Vec<LabelPattern>,
    },
}

impl Recipe {
    pub fn from_yaml(text: &str) -> Result<Self> {
        let recipe: Recipe =
            serde_yaml::from_str(text).map_err(|e| Error::Recipe(e.to_string()))?;
        recipe.validate()?;
        Ok(recipe)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| Error::source_read(path, e))?;
        Self::from_yaml(&text)
    }

    pub fn validate(&self) -> Result<()> {
        match (&self.source.url, &self.source.path) {
            (Some(_), None) | (None, Some(_)) => {}
            _ => {
                return Err(Error::Recipe(
                    "source needs exactly one of `url` or `path`".into(),
                ))
            }
        }
        if let Format::Csv {
            delimiter, header, ..
        } = &self.format
        {
            if delimiter.is_some_and(|d| !d.is_ascii()) {
                return Err(Error::Recipe("delimiter must be an ASCII character".into()));
            }
            if let Some(h) = header {
                if !(1..=2).contains(&h.rows) {
                    return Err(Error::Recipe(format!(
                        "header rows must be 1 or 2, got {}",
                        h.rows
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ELECTION: &str = r#"
name: btw21
source:
  url: https://example.org/btw21_kerg2.csv
format:
  kind: csv
  delimiter: ";"
  header: { skip_rows: 2 }
  data_skip: 4
steps:
  - { op: filter, column: gebiet, non_empty: true }
  - { op: convert_units, column: anteil, factor: 100 }
"#;

    #[test]
    fn parses_with_defaults() {
        let r = Recipe::from_yaml(ELECTION).unwrap();
        assert_eq!(r.max_rows, 20);
        match &r.format {
            Format::Csv {
                delimiter,
                header: Some(h),
                data_skip,
            } => {
                assert_eq!(*delimiter, Some(';'));
                assert_eq!(h.rows, 2);
                assert_eq!(h.sentinel, "x");
                assert!(h.unique);
                assert_eq!(*data_skip, 4);
            }
            other => panic!("unexpected format {:?}", other),
        }
        assert_eq!(
            r.steps[1],
            Step::ConvertUnits {
                column: "anteil".into(),
                factor: 100.0,
                offset: 0.0
            }
        );
    }

    #[test]
    fn netcdf_and_kmz_formats() {
        let r = Recipe::from_yaml(
            "name: t\nsource: { path: tas.nc }\nformat:\n  kind: netcdf\n  variable: tas\n  slice: { time: 0 }\n  convert: { offset: -273.15, units: degC }\n",
        )
        .unwrap();
        assert!(matches!(r.format, Format::Netcdf { ref slice, .. } if slice["time"] == 0));

        let r = Recipe::from_yaml("name: k\nsource: { path: a.kmz }\nformat: { kind: kmz, dissolve_by: land }\n")
            .unwrap();
        assert_eq!(
            r.format,
            Format::Kmz {
                dissolve_by: Some("land".into())
            }
        );
    }

    #[test]
    fn source_must_be_unambiguous() {
        let err = Recipe::from_yaml("name: x\nsource: {}\nformat: { kind: kmz }\n").unwrap_err();
        assert!(matches!(err, Error::Recipe(_)));
        let err = Recipe::from_yaml(
            "name: x\nsource: { url: 'http://a/b', path: b }\nformat: { kind: kmz }\n",
        )
        .unwrap_err();
        assert!(matches!(err, Error::Recipe(_)));
    }

    #[test]
    fn rejects_three_header_rows() {
        let err = Recipe::from_yaml(
            "name: x\nsource: { path: a.csv }\nformat: { kind: csv, header: { skip_rows: 0, rows: 3 } }\n",
        )
        .unwrap_err();
        assert!(matches!(err, Error::Recipe(_)));
    }

    #[test]
    fn unknown_step_is_rejected() {
        let err = Recipe::from_yaml(
            "name: x\nsource: { path: a.csv }\nformat: { kind: csv }\nsteps: [{ op: explode }]\n",
        )
        .unwrap_err();
        assert!(matches!(err, Error::Recipe(_)));
    }
}
