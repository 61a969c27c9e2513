//! netCDF files through libnetcdf.

use super::{AttributeValue, GridSource, RawVariable, VariableInfo};
use crate::error::{Error, Result};
use ndarray::{ArrayD, IxDyn};
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

pub struct NetcdfGrid {
    path: PathBuf,
    file: netcdf::File,
}

impl std::fmt::Debug for NetcdfGrid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetcdfGrid").field("path", &self.path).finish()
    }
}

fn convert(value: netcdf::AttributeValue) -> AttributeValue {
    use netcdf::AttributeValue as V;
    match value {
        V::Uchar(v) => AttributeValue::Number(v as f64),
        V::Schar(v) => AttributeValue::Number(v as f64),
        V::Ushort(v) => AttributeValue::Number(v as f64),
        V::Short(v) => AttributeValue::Number(v as f64),
        V::Uint(v) => AttributeValue::Number(v as f64),
        V::Int(v) => AttributeValue::Number(v as f64),
        V::Ulonglong(v) => AttributeValue::Number(v as f64),
        V::Longlong(v) => AttributeValue::Number(v as f64),
        V::Float(v) => AttributeValue::Number(v as f64),
        V::Double(v) => AttributeValue::Number(v),
        V::Uchars(v) => AttributeValue::Numbers(v.into_iter().map(f64::from).collect()),
        V::Schars(v) => AttributeValue::Numbers(v.into_iter().map(f64::from).collect()),
        V::Ushorts(v) => AttributeValue::Numbers(v.into_iter().map(f64::from).collect()),
        V::Shorts(v) => AttributeValue::Numbers(v.into_iter().map(f64::from).collect()),
        V::Uints(v) => AttributeValue::Numbers(v.into_iter().map(f64::from).collect()),
        V::Ints(v) => AttributeValue::Numbers(v.into_iter().map(f64::from).collect()),
        V::Ulonglongs(v) => AttributeValue::Numbers(v.into_iter().map(|x| x as f64).collect()),
        V::Longlongs(v) => AttributeValue::Numbers(v.into_iter().map(|x| x as f64).collect()),
        V::Floats(v) => AttributeValue::Numbers(v.into_iter().map(f64::from).collect()),
        V::Doubles(v) => AttributeValue::Numbers(v),
        V::Str(v) => AttributeValue::Text(v),
        V::Strs(v) => AttributeValue::Text(v.join(", ")),
    }
}

impl NetcdfGrid {
    #[instrument(level = "info", fields(path = %path.display()))]
    pub fn open(path: &Path) -> Result<Self> {
        let file = netcdf::open(path).map_err(|e| Error::source_read(path, e))?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    fn variable(&self, name: &str) -> Result<netcdf::Variable<'_>> {
        self.file
            .variable(name)
            .ok_or_else(|| Error::source_read(&self.path, format!("no variable {:?}", name)))
    }

    fn text_attribute(var: &netcdf::Variable<'_>, name: &str) -> Option<String> {
        match var.attribute(name)?.value().ok()? {
            netcdf::AttributeValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl GridSource for NetcdfGrid {
    fn list_variables(&self) -> Result<Vec<VariableInfo>> {
        Ok(self
            .file
            .variables()
            .map(|var| VariableInfo {
                name: var.name(),
                description: Self::text_attribute(&var, "long_name")
                    .or_else(|| Self::text_attribute(&var, "description")),
                dimensions: var.dimensions().iter().map(|d| d.name()).collect(),
            })
            .collect())
    }

    fn read_raw(&self, name: &str) -> Result<RawVariable> {
        let var = self.variable(name)?;
        let shape: Vec<usize> = var.dimensions().iter().map(|d| d.len()).collect();
        let dimensions: Vec<String> = var.dimensions().iter().map(|d| d.name()).collect();

        // libnetcdf converts every numeric type to double on read
        let values: Vec<f64> = var
            .get_values(..)
            .map_err(|e| Error::source_read(&self.path, format!("reading {}: {}", name, e)))?;
        debug!(variable = name, cells = values.len(), "read raw values");
        let values = ArrayD::from_shape_vec(IxDyn(&shape), values)
            .map_err(|e| Error::source_read(&self.path, format!("shape of {}: {}", name, e)))?;
        Ok(RawVariable { dimensions, values })
    }

    fn attribute(&self, variable: &str, attribute: &str) -> Result<Option<AttributeValue>> {
        let var = self.variable(variable)?;
        let Some(attr) = var.attribute(attribute) else {
            return Ok(None);
        };
        let value = attr.value().map_err(|e| {
            Error::source_read(&self.path, format!("{}:{}: {}", variable, attribute, e))
        })?;
        Ok(Some(convert(value)))
    }
}
