//! Point-in-Polygon (PIP) containment for service-area zones.
//!
//! Planar ray casting over (lat, lng) pairs, a boundary-proximity test, and
//! an R-tree backed lookup for areas with several named zones.

mod geometry;
mod index;
mod service;

pub use geometry::{
    contains_with_tolerance, distance_to_segment, is_inside, is_near_boundary,
    DEFAULT_BOUNDARY_TOLERANCE,
};
pub use index::ZoneIndex;
pub use service::{MatchPolicy, ZoneHit, ZoneLookup};
