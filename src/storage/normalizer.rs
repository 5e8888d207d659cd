//! Mapping between the persisted `polygon` column and the in-memory
//! list-of-polygons.
//!
//! Legacy rows hold either a bare polygon `[[lat, lng], ...]` or a list of
//! polygons `[[[lat, lng], ...], ...]`. New writes always use the list form,
//! so the read-side disambiguation only exists for old data.

use serde_json::Value;

use crate::models::{GeometryError, LatLng, Polygon, ZoneDisplay};

/// Storage conversion errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StorageError {
    #[error("polygon data must be an array, got {0}")]
    NotAnArray(&'static str),

    #[error("polygon {polygon}: point {point} is not a [lat, lng] number pair")]
    MalformedPoint { polygon: usize, point: usize },

    #[error("polygon {index}: {source}")]
    InvalidPolygon {
        index: usize,
        #[source]
        source: GeometryError,
    },

    #[error("service area has no polygons and is not marked as a draft")]
    EmptyArea,
}

/// Polygons supplied by a caller in either accepted shape
#[derive(Debug, Clone, PartialEq)]
pub enum PolygonInput {
    Single(Polygon),
    Many(Vec<Polygon>),
}

impl PolygonInput {
    pub fn into_list(self) -> Vec<Polygon> {
        match self {
            PolygonInput::Single(p) => vec![p],
            PolygonInput::Many(list) => list,
        }
    }
}

impl From<Polygon> for PolygonInput {
    fn from(p: Polygon) -> Self {
        PolygonInput::Single(p)
    }
}

impl From<Vec<Polygon>> for PolygonInput {
    fn from(list: Vec<Polygon>) -> Self {
        PolygonInput::Many(list)
    }
}

/// A `[lat, lng]`-like element: an array of at least two entries whose
/// first entry is a number.
fn is_coordinate_pair(value: &Value) -> bool {
    value
        .as_array()
        .map(|pair| pair.len() >= 2 && pair[0].is_number())
        .unwrap_or(false)
}

fn point_from_value(value: &Value) -> Option<LatLng> {
    let pair = value.as_array()?;
    if pair.len() < 2 {
        return None;
    }
    let point = LatLng::new(pair[0].as_f64()?, pair[1].as_f64()?);
    point.is_finite().then_some(point)
}

/// Lenient polygon read: malformed points are skipped, and the polygon is
/// kept only if at least three valid points remain.
fn polygon_from_value(value: &Value) -> Option<Polygon> {
    let items = value.as_array()?;
    if !items.first().map(is_coordinate_pair).unwrap_or(false) {
        return None;
    }
    let points: Vec<LatLng> = items.iter().filter_map(point_from_value).collect();
    Polygon::new(points).ok()
}

/// Read a stored `polygon` value into the canonical list of polygons.
///
/// Never fails: anything that is not a usable polygon is dropped, so one bad
/// element never hides the rest of a row.
pub fn to_canonical_list(stored: &Value) -> Vec<Polygon> {
    to_canonical_indexed(stored)
        .into_iter()
        .map(|(_, polygon)| polygon)
        .collect()
}

/// Like [`to_canonical_list`], but each polygon keeps the index of the
/// stored element it came from, so parallel metadata stays aligned when
/// malformed elements are dropped.
pub fn to_canonical_indexed(stored: &Value) -> Vec<(usize, Polygon)> {
    let Some(items) = stored.as_array() else {
        return Vec::new();
    };
    let Some(first) = items.first() else {
        return Vec::new();
    };

    if is_coordinate_pair(first) {
        return polygon_from_value(stored)
            .map(|polygon| (0, polygon))
            .into_iter()
            .collect();
    }

    items
        .iter()
        .enumerate()
        .filter_map(|(i, item)| polygon_from_value(item).map(|polygon| (i, polygon)))
        .collect()
}

/// Shape polygons for storage. Always the list-of-polygons form.
pub fn to_stored_shape(input: impl Into<PolygonInput>) -> Value {
    Value::Array(
        input
            .into()
            .into_list()
            .iter()
            .map(|polygon| {
                Value::Array(
                    polygon
                        .points()
                        .iter()
                        .map(|p| Value::Array(vec![Value::from(p.lat), Value::from(p.lng)]))
                        .collect(),
                )
            })
            .collect(),
    )
}

/// Strict read of caller-supplied polygons (drawn on a map or posted as JSON).
///
/// Unlike [`to_canonical_list`], a polygon with fewer than three points or a
/// non-numeric coordinate is an error, so it can be reported before storage.
pub fn parse_polygon_input(value: &Value) -> Result<PolygonInput, StorageError> {
    let items = value
        .as_array()
        .ok_or_else(|| StorageError::NotAnArray(json_kind(value)))?;

    if items.first().map(is_coordinate_pair).unwrap_or(false) {
        return strict_polygon(0, value).map(PolygonInput::Single);
    }

    items
        .iter()
        .enumerate()
        .map(|(i, item)| strict_polygon(i, item))
        .collect::<Result<Vec<_>, _>>()
        .map(PolygonInput::Many)
}

fn strict_polygon(index: usize, value: &Value) -> Result<Polygon, StorageError> {
    let items = value
        .as_array()
        .ok_or_else(|| StorageError::NotAnArray(json_kind(value)))?;

    let points = items
        .iter()
        .enumerate()
        .map(|(point, v)| {
            point_from_value(v).ok_or(StorageError::MalformedPoint {
                polygon: index,
                point,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Polygon::new(points).map_err(|source| StorageError::InvalidPolygon { index, source })
}

/// Read stored zone metadata, aligned to `polygon_count` entries.
///
/// Missing, `null` or malformed entries become `None`; extra entries are
/// ignored.
pub fn zone_display_from_stored(
    stored: Option<&Value>,
    polygon_count: usize,
) -> Vec<Option<ZoneDisplay>> {
    let indices: Vec<usize> = (0..polygon_count).collect();
    zone_display_at(stored, &indices)
}

/// Read the stored zone metadata entries at `indices`, in that order.
pub fn zone_display_at(stored: Option<&Value>, indices: &[usize]) -> Vec<Option<ZoneDisplay>> {
    let items = stored.and_then(Value::as_array);
    indices
        .iter()
        .map(|&i| {
            let raw = items?.get(i)?;
            let zone: ZoneDisplay = serde_json::from_value(raw.clone()).ok()?;
            let zone = ZoneDisplay::new(zone.label, zone.color);
            (!zone.is_empty()).then_some(zone)
        })
        .collect()
}

/// Shape zone metadata for storage; `None` when no zone carries metadata.
pub fn zone_display_to_stored(zones: &[Option<ZoneDisplay>]) -> Option<Value> {
    if zones.iter().all(|z| z.as_ref().map_or(true, ZoneDisplay::is_empty)) {
        return None;
    }

    let items = zones
        .iter()
        .map(|zone| match zone {
            Some(z) if !z.is_empty() => serde_json::to_value(z).unwrap_or(Value::Null),
            _ => Value::Null,
        })
        .collect();
    Some(Value::Array(items))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
