//! Geofence - service-area geofencing for field operations
//!
//! Ingests coverage polygons from KML documents (inline or remote) and ZIP
//! code lists, stores them in a backward compatible JSON shape, and answers
//! "is this coordinate inside the area" queries.

pub mod config;
pub mod kml;
pub mod models;
pub mod pip;
pub mod postal;
pub mod remote;
pub mod storage;

pub use config::GeofenceConfig;
pub use models::{AreaGeometry, LatLng, Polygon, ServiceArea, ZoneDisplay};
pub use pip::{is_inside, MatchPolicy, ZoneLookup};
pub use storage::ServiceAreaRecord;
