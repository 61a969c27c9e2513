use super::{AttributeValue, GridSource, RawVariable, VariableInfo};
use crate::error::{Error, Result};
use ndarray::ArrayD;
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
struct MemoryVariable {
    name: String,
    dimensions: Vec<String>,
    values: ArrayD<f64>,
    attributes: BTreeMap<String, AttributeValue>,
}

/// A grid held entirely in memory, e.g. values already decoded elsewhere.
/// Variables keep insertion order.
#[derive(Debug, Clone, Default)]
pub struct MemoryGrid {
    variables: Vec<MemoryVariable>,
}

impl MemoryGrid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a variable; `dimensions` must name every axis of `values`.
    pub fn with_variable(
        mut self,
        name: &str,
        dimensions: &[&str],
        values: ArrayD<f64>,
        attributes: BTreeMap<String, AttributeValue>,
    ) -> Result<Self> {
        if dimensions.len() != values.ndim() {
            return Err(Error::length_mismatch(
                format!("dimensions of {}", name),
                values.ndim(),
                dimensions.len(),
            ));
        }
        self.variables.retain(|v| v.name != name);
        self.variables.push(MemoryVariable {
            name: name.to_string(),
            dimensions: dimensions.iter().map(|d| d.to_string()).collect(),
            values,
            attributes,
        });
        Ok(self)
    }

    fn get(&self, name: &str) -> Result<&MemoryVariable> {
        self.variables
            .iter()
            .find(|v| v.name == name)
            .ok_or_else(|| Error::source_read(name, "no such variable"))
    }
}

impl GridSource for MemoryGrid {
    fn list_variables(&self) -> Result<Vec<VariableInfo>> {
        Ok(self
            .variables
            .iter()
            .map(|v| VariableInfo {
                name: v.name.clone(),
                description: v
                    .attributes
                    .get("long_name")
                    .or_else(|| v.attributes.get("description"))
                    .and_then(|a| a.as_str())
                    .map(str::to_string),
                dimensions: v.dimensions.clone(),
            })
            .collect())
    }

    fn read_raw(&self, name: &str) -> Result<RawVariable> {
        let v = self.get(name)?;
        Ok(RawVariable {
            dimensions: v.dimensions.clone(),
            values: v.values.clone(),
        })
    }

    fn attribute(&self, variable: &str, attribute: &str) -> Result<Option<AttributeValue>> {
        Ok(self.get(variable)?.attributes.get(attribute).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::IxDyn;

    #[test]
    fn rejects_wrong_dimension_count() {
        let values = ArrayD::zeros(IxDyn(&[2, 3]));
        let err = MemoryGrid::new()
            .with_variable("v", &["x"], values, BTreeMap::new())
            .unwrap_err();
        assert!(matches!(
            err,
            Error::LengthMismatch {
                expected: 2,
                actual: 1,
                ..
            }
        ));
    }

    #[test]
    fn replacing_a_variable_keeps_one_entry() {
        let grid = MemoryGrid::new()
            .with_variable("v", &["x"], ArrayD::zeros(IxDyn(&[1])), BTreeMap::new())
            .unwrap()
            .with_variable("v", &["x"], ArrayD::ones(IxDyn(&[2])), BTreeMap::new())
            .unwrap();
        assert_eq!(grid.list_variables().unwrap().len(), 1);
        assert_eq!(grid.read_raw("v").unwrap().values.len(), 2);
    }
}
