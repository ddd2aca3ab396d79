//! GeoJSON vector input and output.

use crate::{CostPath, GeoprocError, NetworkLine, RoundTripPath, Site};
use geo::{coord, LineString};
use geojson::{feature::Id, Feature, FeatureCollection, GeoJson, Geometry, JsonObject, Value};
use log::debug;
use serde_json::json;
use std::{
    fs::{self, File},
    io::BufReader,
    path::Path,
};

/// Reads the points of every Point or MultiPoint feature in `path`.
///
/// A point's id is its feature id, else its `id` property, else its
/// feature index.
pub fn read_sites(path: &Path) -> Result<Vec<Site>, GeoprocError> {
    let mut sites = Vec::new();
    for (index, feature) in read_features(path)?.into_iter().enumerate() {
        let id = feature_id(&feature).unwrap_or_else(|| index.to_string());
        let points = match feature.geometry.map(|g| g.value) {
            Some(Value::Point(position)) => vec![position],
            Some(Value::MultiPoint(positions)) => positions,
            other => return Err(unsupported(path, index, other.as_ref())),
        };
        let many = points.len() > 1;
        for (n, position) in points.iter().enumerate() {
            sites.push(Site {
                id: if many { format!("{id}_{n}") } else { id.clone() },
                coord: to_coord(path, index, position)?,
            });
        }
    }
    debug!("read {} sites from {path:?}", sites.len());
    Ok(sites)
}

/// Reads every LineString or MultiLineString feature in `path`, taking
/// each line's value from the numeric (or numeric string) property
/// `field`.
pub fn read_lines(path: &Path, field: &str) -> Result<Vec<NetworkLine>, GeoprocError> {
    let mut lines = Vec::new();
    for (index, feature) in read_features(path)?.into_iter().enumerate() {
        let value = feature
            .property(field)
            .and_then(|v| match v {
                serde_json::Value::Number(n) => n.as_f64(),
                serde_json::Value::String(s) => s.trim().parse().ok(),
                _ => None,
            })
            .filter(|v: &f64| v.is_finite())
            .ok_or_else(|| GeoprocError::MissingAttribute {
                path: path.to_owned(),
                feature: index,
                field: field.to_owned(),
            })?;
        #[allow(clippy::cast_possible_truncation)]
        let value = value as f32;
        let parts = match feature.geometry.map(|g| g.value) {
            Some(Value::LineString(positions)) => vec![positions],
            Some(Value::MultiLineString(parts)) => parts,
            other => return Err(unsupported(path, index, other.as_ref())),
        };
        for positions in parts {
            let coords = positions
                .iter()
                .map(|p| to_coord(path, index, p))
                .collect::<Result<Vec<_>, _>>()?;
            lines.push(NetworkLine {
                geometry: LineString::new(coords),
                value,
            });
        }
    }
    debug!("read {} lines from {path:?}", lines.len());
    Ok(lines)
}

/// Writes `features` to `path` as a FeatureCollection.
pub fn write_features(path: &Path, features: Vec<Feature>) -> Result<(), GeoprocError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let collection = GeoJson::FeatureCollection(FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    });
    fs::write(path, collection.to_string())?;
    Ok(())
}

impl From<&CostPath> for Feature {
    fn from(path: &CostPath) -> Self {
        feature(
            Value::from(&path.path),
            json!({
                "destination": path.destination,
                "time": path.time,
                "capped": path.capped,
            }),
        )
    }
}

impl From<&RoundTripPath> for Feature {
    fn from(path: &RoundTripPath) -> Self {
        feature(
            Value::from(&path.lines),
            json!({
                "destination": path.destination,
                "time_out": path.time_out,
                "time_back": path.time_back,
                "time_total": path.total_time(),
                "capped": path.capped,
            }),
        )
    }
}

fn feature(value: Value, properties: serde_json::Value) -> Feature {
    let properties: Option<JsonObject> = match properties {
        serde_json::Value::Object(map) => Some(map),
        _ => None,
    };
    Feature {
        bbox: None,
        geometry: Some(Geometry::new(value)),
        id: None,
        properties,
        foreign_members: None,
    }
}

fn read_features(path: &Path) -> Result<Vec<Feature>, GeoprocError> {
    let reader = BufReader::new(File::open(path)?);
    match GeoJson::from_reader(reader)? {
        GeoJson::FeatureCollection(collection) => Ok(collection.features),
        GeoJson::Feature(feature) => Ok(vec![feature]),
        GeoJson::Geometry(_) => Err(GeoprocError::NotFeatureCollection {
            path: path.to_owned(),
        }),
    }
}

fn feature_id(feature: &Feature) -> Option<String> {
    match &feature.id {
        Some(Id::String(s)) => Some(s.clone()),
        Some(Id::Number(n)) => Some(n.to_string()),
        None => match feature.property("id")? {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        },
    }
}

fn to_coord(path: &Path, index: usize, position: &[f64]) -> Result<geo::Coord<f64>, GeoprocError> {
    match position {
        [x, y, ..] => Ok(coord! { x: *x, y: *y }),
        _ => Err(unsupported(path, index, None)),
    }
}

fn unsupported(path: &Path, feature: usize, value: Option<&Value>) -> GeoprocError {
    GeoprocError::UnsupportedGeometry {
        path: path.to_owned(),
        feature,
        kind: value.map_or("empty", type_name).to_owned(),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Point(_) => "Point",
        Value::MultiPoint(_) => "MultiPoint",
        Value::LineString(_) => "LineString",
        Value::MultiLineString(_) => "MultiLineString",
        Value::Polygon(_) => "Polygon",
        Value::MultiPolygon(_) => "MultiPolygon",
        Value::GeometryCollection(_) => "GeometryCollection",
    }
}
