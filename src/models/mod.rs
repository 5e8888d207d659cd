//! Core data models for service-area geofencing.

pub mod area;
pub mod polygon;

pub use area::{AreaGeometry, NetworkLinkSource, ServiceArea};
pub use polygon::{is_hex_color, GeometryError, LatLng, Polygon, ZoneDisplay, MIN_POLYGON_POINTS};
