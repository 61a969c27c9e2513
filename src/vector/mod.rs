// src/vector/mod.rs
//! Vector features read from KML/KMZ.

pub mod area;
pub mod kml;

use crate::error::{Error, Result};
use crate::table::Table;
use std::{collections::BTreeMap, fmt};

pub use area::EqualArea;
pub use kml::{read_kml, read_kml_str, read_kmz};

/// (longitude, latitude) in degrees.
pub type Coord = (f64, f64);

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Polygon {
    pub exterior: Vec<Coord>,
    pub holes: Vec<Vec<Coord>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Point(Coord),
    LineString(Vec<Coord>),
    Polygon(Polygon),
    /// Several disjoint polygon parts forming one feature.
    MultiPolygon(Vec<Polygon>),
    /// Mixed parts, e.g. a point plus a polygon.
    Collection(Vec<Geometry>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryType {
    Point,
    LineString,
    Polygon,
    MultiPolygon,
    Collection,
}

impl fmt::Display for GeometryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            GeometryType::Point => "POINT",
            GeometryType::LineString => "LINESTRING",
            GeometryType::Polygon => "POLYGON",
            GeometryType::MultiPolygon => "MULTIPOLYGON",
            GeometryType::Collection => "GEOMETRYCOLLECTION",
        };
        f.write_str(s)
    }
}

impl Geometry {
    pub fn geometry_type(&self) -> GeometryType {
        match self {
            Geometry::Point(_) => GeometryType::Point,
            Geometry::LineString(_) => GeometryType::LineString,
            Geometry::Polygon(_) => GeometryType::Polygon,
            Geometry::MultiPolygon(_) => GeometryType::MultiPolygon,
            Geometry::Collection(_) => GeometryType::Collection,
        }
    }

    /// Group the parts of a KML `MultiGeometry`. Polygon-only groups become a
    /// [`Geometry::MultiPolygon`].
    pub fn from_parts(parts: Vec<Geometry>) -> Geometry {
        if !parts.is_empty() && parts.iter().all(|g| matches!(g, Geometry::Polygon(_))) {
            Geometry::MultiPolygon(
                parts
                    .into_iter()
                    .filter_map(|g| match g {
                        Geometry::Polygon(p) => Some(p),
                        _ => None,
                    })
                    .collect(),
            )
        } else {
            Geometry::Collection(parts)
        }
    }

    /// Every polygon part, recursing into collections.
    pub fn polygons(&self) -> Vec<&Polygon> {
        match self {
            Geometry::Polygon(p) => vec![p],
            Geometry::MultiPolygon(ps) => ps.iter().collect(),
            Geometry::Collection(parts) => parts.iter().flat_map(|g| g.polygons()).collect(),
            Geometry::Point(_) | Geometry::LineString(_) => Vec::new(),
        }
    }

    /// Area of all polygon parts in square meters (zero for points and lines).
    pub fn area(&self, proj: &EqualArea) -> f64 {
        // a bare `sum()` of no parts is -0.0
        self.polygons()
            .into_iter()
            .fold(0.0, |acc, p| acc + proj.polygon_area(p))
    }
}

const FIXED_COLUMNS: [&str; 3] = ["name", "geometry_type", "area_km2"];

fn attribute_column(key: &str) -> String {
    if FIXED_COLUMNS.contains(&key) {
        format!("attr_{}", key)
    } else {
        key.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Feature {
    pub name: Option<String>,
    pub attributes: BTreeMap<String, String>,
    pub geometry: Option<Geometry>,
}

/// Geometry plus attribute rows, in document order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FeatureTable {
    pub features: Vec<Feature>,
}

impl FeatureTable {
    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Merge the polygon parts of all features sharing a value of `attribute`
    /// into one multipolygon feature per value. Groups keep first-appearance
    /// order; features without the attribute fall into the `""` group.
    ///
    /// Parts are collected, not topologically unioned: shared borders stay.
    pub fn dissolve(&self, attribute: &str) -> Result<FeatureTable> {
        if !self
            .features
            .iter()
            .any(|f| f.attributes.contains_key(attribute))
        {
            return Err(Error::UnknownColumn(attribute.to_string()));
        }

        let mut groups: Vec<(String, Vec<Polygon>)> = Vec::new();
        for feature in &self.features {
            let key = feature.attributes.get(attribute).cloned().unwrap_or_default();
            let parts = feature
                .geometry
                .as_ref()
                .map(|g| g.polygons().into_iter().cloned().collect::<Vec<_>>())
                .unwrap_or_default();
            match groups.iter_mut().find(|(k, _)| *k == key) {
                Some((_, polys)) => polys.extend(parts),
                None => groups.push((key, parts)),
            }
        }

        let features = groups
            .into_iter()
            .map(|(key, polys)| Feature {
                name: Some(key.clone()),
                attributes: BTreeMap::from([(attribute.to_string(), key)]),
                geometry: (!polys.is_empty()).then_some(Geometry::MultiPolygon(polys)),
            })
            .collect();
        Ok(FeatureTable { features })
    }

    /// Flatten to a table: `name`, `geometry_type`, `area_km2`, then every
    /// attribute key seen (sorted). An attribute named like one of the fixed
    /// columns gets an `attr_` prefix.
    pub fn to_table(&self, proj: &EqualArea) -> Result<Table> {
        let mut keys: Vec<&String> = self
            .features
            .iter()
            .flat_map(|f| f.attributes.keys())
            .collect();
        keys.sort();
        keys.dedup();

        let mut columns: Vec<String> = FIXED_COLUMNS.iter().map(|c| c.to_string()).collect();
        columns.extend(keys.iter().map(|k| attribute_column(k)));

        let rows = self
            .features
            .iter()
            .map(|f| {
                let mut row = vec![
                    f.name.clone().unwrap_or_default(),
                    f.geometry
                        .as_ref()
                        .map(|g| g.geometry_type().to_string())
                        .unwrap_or_default(),
                    f.geometry
                        .as_ref()
                        .map(|g| format!("{:.3}", g.area(proj) / 1e6))
                        .unwrap_or_default(),
                ];
                row.extend(
                    keys.iter()
                        .map(|k| f.attributes.get(*k).cloned().unwrap_or_default()),
                );
                row
            })
            .collect();
        Table::new(columns, rows)
    }
}
