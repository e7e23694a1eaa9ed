//! GeoJSON provider (`type=geojson`).

use super::{Datasource, Feature, Value, VectorDatasource, read_input};
use crate::engine::error::{Error, Result};
use crate::engine::geometry::{Coord, Geometry};
use crate::engine::params::Parameters;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;

const KIND: &str = "geojson";

#[derive(Debug, Deserialize)]
struct FeatureJson {
    #[serde(default)]
    id: Option<serde_json::Value>,
    #[serde(default)]
    geometry: Option<GeometryJson>,
    #[serde(default)]
    properties: Option<serde_json::Map<String, serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum GeometryJson {
    Point {
        coordinates: Vec<f64>,
    },
    MultiPoint {
        coordinates: Vec<Vec<f64>>,
    },
    LineString {
        coordinates: Vec<Vec<f64>>,
    },
    MultiLineString {
        coordinates: Vec<Vec<Vec<f64>>>,
    },
    Polygon {
        coordinates: Vec<Vec<Vec<f64>>>,
    },
    MultiPolygon {
        coordinates: Vec<Vec<Vec<Vec<f64>>>>,
    },
    GeometryCollection {
        geometries: Vec<GeometryJson>,
    },
}

pub(super) fn create(params: &Parameters) -> Result<Arc<dyn Datasource>> {
    let text = read_input(KIND, params)?;
    let features = parse(&text)?;
    Ok(Arc::new(VectorDatasource::new(KIND, features, params)?))
}

fn parse(text: &str) -> Result<Vec<Feature>> {
    let doc: serde_json::Value = serde_json::from_str(text)?;
    let kind = doc
        .get("type")
        .and_then(|t| t.as_str())
        .map(str::to_owned);
    let raw = match kind.as_deref() {
        Some("FeatureCollection") => {
            let features = doc.get("features").cloned().unwrap_or_default();
            serde_json::from_value::<Vec<FeatureJson>>(features)?
        }
        Some("Feature") => vec![serde_json::from_value::<FeatureJson>(doc)?],
        Some(_) => vec![FeatureJson {
            id: None,
            geometry: Some(serde_json::from_value::<GeometryJson>(doc)?),
            properties: None,
        }],
        None => return Err(invalid("document has no 'type' member")),
    };

    let mut features = Vec::with_capacity(raw.len());
    for (index, f) in raw.into_iter().enumerate() {
        // Features without geometry carry nothing to render.
        let Some(geometry) = f.geometry else {
            continue;
        };
        let id = f
            .id
            .as_ref()
            .and_then(serde_json::Value::as_u64)
            .unwrap_or(index as u64 + 1);
        let attributes = f
            .properties
            .unwrap_or_default()
            .into_iter()
            .map(|(k, v)| (k, convert_value(v)))
            .collect::<BTreeMap<_, _>>();
        features.push(Feature {
            id,
            geometry: convert_geometry(geometry)?,
            attributes,
        });
    }
    Ok(features)
}

fn convert_value(v: serde_json::Value) -> Value {
    match v {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(b),
        serde_json::Value::Number(n) => n.as_f64().map_or(Value::Null, Value::Number),
        serde_json::Value::String(s) => Value::String(s),
        other => Value::String(other.to_string()),
    }
}

fn coord(c: &[f64]) -> Result<Coord> {
    match c {
        [x, y, ..] => Ok((*x, *y)),
        _ => Err(invalid("position needs at least two numbers")),
    }
}

fn line(cs: &[Vec<f64>]) -> Result<Vec<Coord>> {
    cs.iter().map(|c| coord(c)).collect()
}

fn rings(rs: &[Vec<Vec<f64>>]) -> Result<Vec<Vec<Coord>>> {
    rs.iter().map(|r| line(r)).collect()
}

fn convert_geometry(g: GeometryJson) -> Result<Geometry> {
    Ok(match g {
        GeometryJson::Point { coordinates } => Geometry::Point(coord(&coordinates)?),
        GeometryJson::MultiPoint { coordinates } => Geometry::MultiPoint(line(&coordinates)?),
        GeometryJson::LineString { coordinates } => Geometry::LineString(line(&coordinates)?),
        GeometryJson::MultiLineString { coordinates } => {
            Geometry::MultiLineString(rings(&coordinates)?)
        }
        GeometryJson::Polygon { coordinates } => Geometry::Polygon(rings(&coordinates)?),
        GeometryJson::MultiPolygon { coordinates } => Geometry::MultiPolygon(
            coordinates
                .iter()
                .map(|p| rings(p))
                .collect::<Result<_>>()?,
        ),
        GeometryJson::GeometryCollection { geometries } => Geometry::Collection(
            geometries
                .into_iter()
                .map(convert_geometry)
                .collect::<Result<_>>()?,
        ),
    })
}

fn invalid(message: &str) -> Error {
    Error::Datasource {
        kind: KIND,
        message: message.to_string(),
    }
}
