//! Coordinate and polygon types shared by every ingestion path.

use geo::{BoundingRect, Coord, LineString};
use serde::{Deserialize, Serialize};

/// Minimum number of vertices for a usable ring.
pub const MIN_POLYGON_POINTS: usize = 3;

/// Geometry validation errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GeometryError {
    #[error("polygon needs at least 3 points, got {0}")]
    TooFewPoints(usize),

    #[error("point {index} is not a finite coordinate pair ({lat}, {lng})")]
    NonFinite { index: usize, lat: f64, lng: f64 },
}

/// Geographic point stored latitude first.
///
/// Serialized as a two element array `[lat, lng]`, which is the shape the
/// persisted `polygon` column uses.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.lng.is_finite()
    }
}

impl From<[f64; 2]> for LatLng {
    fn from([lat, lng]: [f64; 2]) -> Self {
        Self { lat, lng }
    }
}

impl From<LatLng> for [f64; 2] {
    fn from(p: LatLng) -> Self {
        [p.lat, p.lng]
    }
}

/// A coverage ring of at least three finite points.
///
/// Closure is implied: the first and last point may differ. The only way to
/// build one is through [`Polygon::new`], so every instance in memory is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<LatLng>", into = "Vec<LatLng>")]
pub struct Polygon {
    points: Vec<LatLng>,
}

impl Polygon {
    pub fn new(points: Vec<LatLng>) -> Result<Self, GeometryError> {
        if points.len() < MIN_POLYGON_POINTS {
            return Err(GeometryError::TooFewPoints(points.len()));
        }
        if let Some((index, p)) = points.iter().enumerate().find(|(_, p)| !p.is_finite()) {
            return Err(GeometryError::NonFinite {
                index,
                lat: p.lat,
                lng: p.lng,
            });
        }
        Ok(Self { points })
    }

    /// Build from `[lat, lng]` pairs
    pub fn from_pairs(pairs: &[[f64; 2]]) -> Result<Self, GeometryError> {
        Self::new(pairs.iter().copied().map(LatLng::from).collect())
    }

    pub fn points(&self) -> &[LatLng] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn into_points(self) -> Vec<LatLng> {
        self.points
    }

    /// Convert to a `geo` polygon (x = longitude, y = latitude)
    pub fn to_geo(&self) -> geo::Polygon<f64> {
        let coords: Vec<Coord<f64>> = self
            .points
            .iter()
            .map(|p| Coord { x: p.lng, y: p.lat })
            .collect();
        // LineString is closed by geo::Polygon::new
        geo::Polygon::new(LineString::new(coords), vec![])
    }

    /// Bounding box as (min_lng, min_lat, max_lng, max_lat)
    pub fn bbox(&self) -> Option<(f64, f64, f64, f64)> {
        self.to_geo()
            .bounding_rect()
            .map(|rect| (rect.min().x, rect.min().y, rect.max().x, rect.max().y))
    }
}

impl TryFrom<Vec<LatLng>> for Polygon {
    type Error = GeometryError;

    fn try_from(points: Vec<LatLng>) -> Result<Self, Self::Error> {
        Self::new(points)
    }
}

impl From<Polygon> for Vec<LatLng> {
    fn from(p: Polygon) -> Self {
        p.points
    }
}

/// Optional display metadata for one zone, parallel to the polygon list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ZoneDisplay {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl ZoneDisplay {
    /// Build metadata, dropping a color that is not `#RGB` or `#RRGGBB`
    pub fn new(label: Option<String>, color: Option<String>) -> Self {
        let label = label
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty());
        let color = color.filter(|c| is_hex_color(c));
        Self { label, color }
    }

    pub fn labeled(label: impl Into<String>) -> Self {
        Self::new(Some(label.into()), None)
    }

    pub fn is_empty(&self) -> bool {
        self.label.is_none() && self.color.is_none()
    }
}

pub fn is_hex_color(value: &str) -> bool {
    match value.strip_prefix('#') {
        Some(hex) => {
            matches!(hex.len(), 3 | 6) && hex.chars().all(|c| c.is_ascii_hexdigit())
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_polygon_rejects_short_ring() {
        let err = Polygon::from_pairs(&[[0.0, 0.0], [1.0, 1.0]]).unwrap_err();
        assert_eq!(err, GeometryError::TooFewPoints(2));
    }

    #[test]
    fn test_polygon_rejects_non_finite() {
        let err = Polygon::from_pairs(&[[0.0, 0.0], [f64::NAN, 1.0], [1.0, 0.0]]).unwrap_err();
        assert!(matches!(err, GeometryError::NonFinite { index: 1, .. }));
    }

    #[test]
    fn test_polygon_serializes_as_pairs() {
        let poly = Polygon::from_pairs(&[[35.7, -78.6], [35.8, -78.6], [35.8, -78.7]]).unwrap();
        let json = serde_json::to_string(&poly).unwrap();
        assert_eq!(json, "[[35.7,-78.6],[35.8,-78.6],[35.8,-78.7]]");

        let back: Polygon = serde_json::from_str(&json).unwrap();
        assert_eq!(back, poly);
    }

    #[test]
    fn test_polygon_deserialize_validates() {
        let res: Result<Polygon, _> = serde_json::from_str("[[1.0,2.0],[3.0,4.0]]");
        assert!(res.is_err());
    }

    #[test]
    fn test_bbox_is_lng_lat_ordered() {
        let poly = Polygon::from_pairs(&[[1.0, 10.0], [2.0, 10.0], [2.0, 12.0]]).unwrap();
        assert_eq!(poly.bbox(), Some((10.0, 1.0, 12.0, 2.0)));
    }

    #[test]
    fn test_zone_display_drops_bad_color() {
        let zone = ZoneDisplay::new(Some(" North ".into()), Some("red".into()));
        assert_eq!(zone.label.as_deref(), Some("North"));
        assert!(zone.color.is_none());

        let zone = ZoneDisplay::new(None, Some("#1a2B3c".into()));
        assert_eq!(zone.color.as_deref(), Some("#1a2B3c"));
        assert!(is_hex_color("#fff"));
        assert!(!is_hex_color("#ffff"));
    }
}
