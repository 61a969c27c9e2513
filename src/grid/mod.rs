// src/grid/mod.rs
//! Gridded (netCDF-like) datasets.
//!
//! A [`GridSource`] hands out raw values and attributes; [`GridSource::read_variable`]
//! decodes them following CF conventions: cells equal to `_FillValue` (or
//! `missing_value`) become missing, then `scale_factor`/`add_offset` apply.

pub mod memory;
#[cfg(feature = "netcdf")]
pub mod nc;

use crate::error::{Error, Result};
use crate::table::Table;
use ndarray::{ArrayD, Axis, Dimension, IxDyn};
use std::path::Path;

pub use memory::MemoryGrid;
#[cfg(feature = "netcdf")]
pub use nc::NetcdfGrid;

#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Number(f64),
    Numbers(Vec<f64>),
    Text(String),
}

impl AttributeValue {
    /// Scalar view: a number, or the first of several.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttributeValue::Number(v) => Some(*v),
            AttributeValue::Numbers(vs) => vs.first().copied(),
            AttributeValue::Text(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariableInfo {
    pub name: String,
    /// `long_name`, else `description`
    pub description: Option<String>,
    pub dimensions: Vec<String>,
}

/// Undecoded variable contents, as stored.
#[derive(Debug, Clone)]
pub struct RawVariable {
    pub dimensions: Vec<String>,
    pub values: ArrayD<f64>,
}

pub trait GridSource {
    fn list_variables(&self) -> Result<Vec<VariableInfo>>;

    fn read_raw(&self, name: &str) -> Result<RawVariable>;

    /// `Ok(None)` when the variable exists but lacks the attribute.
    fn attribute(&self, variable: &str, attribute: &str) -> Result<Option<AttributeValue>>;

    /// Like [`GridSource::attribute`], but a missing attribute is an error.
    fn read_attribute(&self, variable: &str, attribute: &str) -> Result<AttributeValue> {
        self.attribute(variable, attribute)?.ok_or_else(|| {
            Error::source_read(
                variable,
                format!("variable has no attribute {:?}", attribute),
            )
        })
    }

    /// Read and decode a variable. Fill cells are reported as missing.
    fn read_variable(&self, name: &str) -> Result<GridVariable> {
        let raw = self.read_raw(name)?;
        let number = |attr: &str| -> Result<Option<f64>> {
            Ok(self.attribute(name, attr)?.and_then(|v| v.as_f64()))
        };
        let fill = number("_FillValue")?;
        let missing = number("missing_value")?;
        let scale = number("scale_factor")?.unwrap_or(1.0);
        let offset = number("add_offset")?.unwrap_or(0.0);
        let units = self
            .attribute(name, "units")?
            .and_then(|v| v.as_str().map(str::to_string));

        let values = mask_fill(raw.values, fill.or(missing))
            .mapv(|v| if v.is_nan() { v } else { v * scale + offset });
        Ok(GridVariable {
            name: name.to_string(),
            dimensions: raw.dimensions,
            values,
            units,
        })
    }
}

/// Replace every cell equal to `fill` with `NaN`, the missing marker.
pub fn mask_fill(values: ArrayD<f64>, fill: Option<f64>) -> ArrayD<f64> {
    match fill {
        Some(fill) => values.mapv(|v| {
            if v == fill || (fill.is_nan() && v.is_nan()) {
                f64::NAN
            } else {
                v
            }
        }),
        None => values,
    }
}

/// Open a netCDF file as a grid source.
#[cfg(feature = "netcdf")]
pub fn open_grid(path: impl AsRef<Path>) -> Result<Box<dyn GridSource>> {
    Ok(Box::new(NetcdfGrid::open(path.as_ref())?))
}

/// Open a netCDF file as a grid source. This build has no netCDF support.
#[cfg(not(feature = "netcdf"))]
pub fn open_grid(path: impl AsRef<Path>) -> Result<Box<dyn GridSource>> {
    Err(Error::source_read(
        path,
        "built without netCDF support (enable the `netcdf` feature)",
    ))
}

#[derive(Debug, Clone, PartialEq)]
pub struct GridSummary {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
    pub valid: usize,
    pub missing: usize,
}

/// A decoded variable. Missing cells hold `NaN`.
#[derive(Debug, Clone)]
pub struct GridVariable {
    pub name: String,
    pub dimensions: Vec<String>,
    pub values: ArrayD<f64>,
    pub units: Option<String>,
}

impl GridVariable {
    pub fn shape(&self) -> &[usize] {
        self.values.shape()
    }

    /// `None` for missing cells and out-of-range indices.
    pub fn value(&self, index: &[usize]) -> Option<f64> {
        self.values
            .get(IxDyn(index))
            .copied()
            .filter(|v| !v.is_nan())
    }

    fn axis_of(&self, dimension: &str) -> Result<usize> {
        self.dimensions
            .iter()
            .position(|d| d == dimension)
            .ok_or_else(|| Error::UnknownColumn(dimension.to_string()))
    }

    /// `v * factor + offset` on every present cell.
    pub fn convert_units(&self, factor: f64, offset: f64, units: Option<&str>) -> GridVariable {
        GridVariable {
            name: self.name.clone(),
            dimensions: self.dimensions.clone(),
            values: self.values.mapv(|v| v * factor + offset),
            units: units.map(str::to_string).or_else(|| self.units.clone()),
        }
    }

    /// Fix `dimension` at `index`, dropping that axis.
    pub fn slice(&self, dimension: &str, index: usize) -> Result<GridVariable> {
        let axis = self.axis_of(dimension)?;
        let len = self.values.len_of(Axis(axis));
        if index >= len {
            return Err(Error::IndexOutOfRange {
                dimension: dimension.to_string(),
                index,
                len,
            });
        }
        let mut dimensions = self.dimensions.clone();
        dimensions.remove(axis);
        Ok(GridVariable {
            name: self.name.clone(),
            dimensions,
            values: self.values.index_axis(Axis(axis), index).to_owned(),
            units: self.units.clone(),
        })
    }

    /// Long table: one index column per dimension plus `value`; missing
    /// cells are empty.
    pub fn to_table(&self) -> Result<Table> {
        let mut columns = self.dimensions.clone();
        columns.push("value".to_string());
        let rows = self
            .values
            .indexed_iter()
            .map(|(idx, v)| {
                let mut row: Vec<String> = idx.slice().iter().map(|i| i.to_string()).collect();
                row.push(if v.is_nan() { String::new() } else { v.to_string() });
                row
            })
            .collect();
        Table::new(columns, rows)
    }

    pub fn summary(&self) -> GridSummary {
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut sum = 0.0;
        let mut valid = 0usize;
        for &v in self.values.iter() {
            if v.is_nan() {
                continue;
            }
            min = min.min(v);
            max = max.max(v);
            sum += v;
            valid += 1;
        }
        let any = valid > 0;
        GridSummary {
            min: any.then_some(min),
            max: any.then_some(max),
            mean: any.then(|| sum / valid as f64),
            valid,
            missing: self.values.len() - valid,
        }
    }
}
