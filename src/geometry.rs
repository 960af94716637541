//! GeoJSON payloads to `geo` shapes, and unions of shapes sharing a key.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use geo::{BooleanOps, MultiPolygon, Point};
use serde_json::Value;

use crate::error::{Error, Result};

/// Characters of a census block identifier that name its block group.
pub const BLOCK_GROUP_LEN: usize = 12;

#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Area(MultiPolygon<f64>),
    Point(Point<f64>),
}

/// Converts a GeoJSON geometry object into a `Shape`.
///
/// Polygons are widened to multi-polygons so every area has one type.
pub fn normalize(raw: &Value) -> Result<Shape> {
    let geometry: geojson::Geometry =
        serde_json::from_value(raw.clone()).map_err(|e| Error::Geometry(e.to_string()))?;
    let geometry =
        geo::Geometry::<f64>::try_from(geometry).map_err(|e| Error::Geometry(e.to_string()))?;
    match geometry {
        geo::Geometry::Polygon(polygon) => Ok(Shape::Area(MultiPolygon::new(vec![polygon]))),
        geo::Geometry::MultiPolygon(area) => Ok(Shape::Area(area)),
        geo::Geometry::Point(point) => Ok(Shape::Point(point)),
        _ => Err(Error::Geometry(
            "expected a Polygon, MultiPolygon or Point".into(),
        )),
    }
}

pub fn area(raw: &Value) -> Result<MultiPolygon<f64>> {
    match normalize(raw)? {
        Shape::Area(area) => Ok(area),
        Shape::Point(_) => Err(Error::Geometry("expected an area, got a Point".into())),
    }
}

/// Builds a point from the string coordinates the crime feed uses.
pub fn point(longitude: &str, latitude: &str) -> Result<Point<f64>> {
    let parse = |s: &str| {
        s.trim()
            .parse::<f64>()
            .map_err(|_| Error::Geometry(format!("bad coordinate {s:?}")))
    };
    Ok(Point::new(parse(longitude)?, parse(latitude)?))
}

/// The block group a census block belongs to.
pub fn block_group_key(block: &str) -> Result<String> {
    block
        .get(..BLOCK_GROUP_LEN)
        .map(str::to_owned)
        .ok_or_else(|| Error::Decode(format!("block identifier {block:?} is too short")))
}

/// Unions every area whose identifier maps to the same group key.
pub fn merge<I, F>(areas: I, group_key: F) -> Result<BTreeMap<String, MultiPolygon<f64>>>
where
    I: IntoIterator<Item = (String, MultiPolygon<f64>)>,
    F: Fn(&str) -> Result<String>,
{
    let mut groups = BTreeMap::new();
    for (id, area) in areas {
        match groups.entry(group_key(&id)?) {
            Entry::Vacant(entry) => {
                entry.insert(area);
            }
            Entry::Occupied(mut entry) => {
                let merged = entry.get().union(&area);
                entry.insert(merged);
            }
        }
    }
    Ok(groups)
}

pub fn to_geojson_text(area: &MultiPolygon<f64>) -> Result<String> {
    let geometry = geojson::Geometry::new(geojson::Value::from(area));
    Ok(serde_json::to_string(&geometry)?)
}

pub fn from_geojson_text(text: &str) -> Result<MultiPolygon<f64>> {
    let raw: Value = serde_json::from_str(text).map_err(|e| Error::Geometry(e.to_string()))?;
    area(&raw)
}
