//! Persisted polygon shapes and service-area rows.

mod normalizer;
mod record;

pub use normalizer::{
    parse_polygon_input, to_canonical_indexed, to_canonical_list, to_stored_shape, zone_display_at,
    zone_display_from_stored, zone_display_to_stored, PolygonInput, StorageError,
};
pub use record::ServiceAreaRecord;
