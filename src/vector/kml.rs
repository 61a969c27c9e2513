use super::{Coord, Feature, FeatureTable, Geometry, Polygon};
use crate::archive;
use crate::error::{Error, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument};

/// Parse `lon,lat[,alt]` tuples separated by whitespace.
fn parse_coordinates(text: &str) -> std::result::Result<Vec<Coord>, String> {
    text.split_whitespace()
        .map(|tuple| {
            let mut parts = tuple.split(',');
            let lon = parts.next().and_then(|v| v.trim().parse::<f64>().ok());
            let lat = parts.next().and_then(|v| v.trim().parse::<f64>().ok());
            match (lon, lat) {
                (Some(lon), Some(lat)) => Ok((lon, lat)),
                _ => Err(format!("bad coordinate tuple {:?}", tuple)),
            }
        })
        .collect()
}

fn name_attr(e: &BytesStart<'_>) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == b"name")
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

/// Parser state for one document.
#[derive(Default)]
struct KmlState {
    /// local names of the open elements
    path: Vec<String>,
    text: String,
    features: Vec<Feature>,
    current: Option<Feature>,
    data_key: Option<String>,
    polygon: Option<Polygon>,
    /// one entry per open MultiGeometry
    parts: Vec<Vec<Geometry>>,
}

impl KmlState {
    fn parent(&self) -> Option<&str> {
        self.path.len().checked_sub(2).map(|i| self.path[i].as_str())
    }

    fn inside(&self, name: &str) -> bool {
        self.path.iter().any(|p| p == name)
    }

    fn emit(&mut self, geom: Geometry) {
        if let Some(top) = self.parts.last_mut() {
            top.push(geom);
        } else if let Some(feature) = self.current.as_mut() {
            feature.geometry = Some(geom);
        }
    }

    fn start(&mut self, e: &BytesStart<'_>) {
        let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
        match name.as_str() {
            "Placemark" => self.current = Some(Feature::default()),
            "Data" | "SimpleData" => self.data_key = name_attr(e),
            "Polygon" if self.current.is_some() => self.polygon = Some(Polygon::default()),
            "MultiGeometry" if self.current.is_some() => self.parts.push(Vec::new()),
            _ => {}
        }
        self.path.push(name);
        self.text.clear();
    }

    fn end(&mut self) -> std::result::Result<(), String> {
        let Some(name) = self.path.last().cloned() else {
            return Ok(());
        };
        let text = std::mem::take(&mut self.text);
        if self.current.is_some() {
            match name.as_str() {
                "name" if self.parent() == Some("Placemark") => {
                    if let Some(f) = self.current.as_mut() {
                        f.name = Some(text.trim().to_string());
                    }
                }
                "value" if self.parent() == Some("Data") => self.push_attribute(text),
                "SimpleData" => self.push_attribute(text),
                "coordinates" => self.coordinates(&text)?,
                "Polygon" => {
                    if let Some(p) = self.polygon.take() {
                        self.emit(Geometry::Polygon(p));
                    }
                }
                "MultiGeometry" => {
                    if let Some(parts) = self.parts.pop() {
                        self.emit(Geometry::from_parts(parts));
                    }
                }
                "Placemark" => {
                    if let Some(f) = self.current.take() {
                        self.features.push(f);
                    }
                }
                _ => {}
            }
        }
        self.path.pop();
        Ok(())
    }

    fn push_attribute(&mut self, text: String) {
        if let (Some(key), Some(f)) = (self.data_key.take(), self.current.as_mut()) {
            f.attributes.insert(key, text.trim().to_string());
        }
    }

    fn coordinates(&mut self, text: &str) -> std::result::Result<(), String> {
        let coords = parse_coordinates(text)?;
        let parent = self.parent().map(str::to_string);
        match parent.as_deref() {
            Some("Point") => {
                let first = *coords.first().ok_or("empty Point coordinates")?;
                self.emit(Geometry::Point(first));
            }
            Some("LineString") => self.emit(Geometry::LineString(coords)),
            Some("LinearRing") => {
                let inner = self.inside("innerBoundaryIs");
                if let Some(p) = self.polygon.as_mut() {
                    if inner {
                        p.holes.push(coords);
                    } else {
                        p.exterior = coords;
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }
}

/// Parse KML text into features. Namespace prefixes are ignored.
pub fn read_kml_str(xml: &str) -> std::result::Result<FeatureTable, String> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut state = KmlState::default();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => state.start(&e),
            Ok(Event::Empty(e)) => {
                state.start(&e);
                state.end()?;
            }
            Ok(Event::Text(t)) => {
                let text = t.unescape().map_err(|e| e.to_string())?;
                state.text.push_str(&text);
            }
            Ok(Event::CData(c)) => {
                state.text.push_str(&String::from_utf8_lossy(&c.into_inner()));
            }
            Ok(Event::End(_)) => state.end()?,
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(format!(
                    "XML error at position {}: {}",
                    reader.buffer_position(),
                    e
                ))
            }
            _ => {}
        }
        buf.clear();
    }
    Ok(FeatureTable {
        features: state.features,
    })
}

/// Vector reader: every `Placemark` of a KML file as a feature.
#[instrument(level = "info", skip(path), fields(path = %path.as_ref().display()))]
pub fn read_kml(path: impl AsRef<Path>) -> Result<FeatureTable> {
    let path = path.as_ref();
    let xml = fs::read_to_string(path).map_err(|e| Error::source_read(path, e))?;
    let table = read_kml_str(&xml).map_err(|e| Error::source_read(path, e))?;
    debug!(features = table.len(), "parsed KML");
    Ok(table)
}

/// Extract a KMZ into `destination_dir` and read its first `.kml` entry.
/// Also returns every path this call extracted.
pub fn read_kmz(
    archive_path: impl AsRef<Path>,
    destination_dir: impl AsRef<Path>,
) -> Result<(FeatureTable, Vec<PathBuf>)> {
    let archive_path = archive_path.as_ref();
    let extracted = archive::extract(archive_path, destination_dir)?;
    let kml = archive::find_by_extension(&extracted, "kml")
        .ok_or_else(|| Error::source_read(archive_path, "archive contains no .kml file"))?;
    info!(kml = %kml.display(), "reading extracted KML");
    let table = read_kml(kml)?;
    Ok((table, extracted))
}
