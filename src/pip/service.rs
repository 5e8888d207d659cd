//! Zone lookup service for evaluating a coordinate against a service area.

use serde::Serialize;
use tracing::debug;

use super::geometry::DEFAULT_BOUNDARY_TOLERANCE;
use super::ZoneIndex;
use crate::models::{LatLng, Polygon, ZoneDisplay};

/// How overlapping zones are reported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchPolicy {
    /// Lowest-index matching zone only
    #[default]
    First,
    /// Every matching zone, in zone order
    All,
}

/// A zone that contains the queried point
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZoneHit {
    pub index: usize,
    pub label: Option<String>,
}

/// Point-in-zone lookup service
pub struct ZoneLookup {
    index: ZoneIndex,
    labels: Vec<Option<String>>,
    tolerance: Option<f64>,
}

impl ZoneLookup {
    /// Create a lookup from zone polygons and their parallel metadata
    pub fn new(polygons: Vec<Polygon>, zones: &[Option<ZoneDisplay>]) -> Self {
        let labels = (0..polygons.len())
            .map(|i| zones.get(i).cloned().flatten().and_then(|z| z.label))
            .collect();

        Self {
            index: ZoneIndex::build(polygons),
            labels,
            tolerance: None,
        }
    }

    /// Also accept points within `tolerance` degrees of a zone edge
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = Some(tolerance);
        self
    }

    /// Accept points within the default boundary tolerance
    pub fn with_default_tolerance(self) -> Self {
        self.with_tolerance(DEFAULT_BOUNDARY_TOLERANCE)
    }

    /// Zones containing `point`, reported according to `policy`
    pub fn locate(&self, point: LatLng, policy: MatchPolicy) -> Vec<ZoneHit> {
        let indices = match self.tolerance {
            Some(t) => self.index.lookup_with_tolerance(point, t),
            None => self.index.lookup(point),
        };

        debug!(
            "Zone lookup at ({}, {}): {} matching zones",
            point.lat,
            point.lng,
            indices.len()
        );

        let take = match policy {
            MatchPolicy::First => 1,
            MatchPolicy::All => indices.len(),
        };

        indices
            .into_iter()
            .take(take)
            .map(|index| ZoneHit {
                index,
                label: self.labels.get(index).cloned().flatten(),
            })
            .collect()
    }

    /// Whether any zone contains `point`
    pub fn contains(&self, point: LatLng) -> bool {
        !self.locate(point, MatchPolicy::First).is_empty()
    }

    /// Get the spatial index (for stats/debugging)
    pub fn index(&self) -> &ZoneIndex {
        &self.index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zones() -> (Vec<Polygon>, Vec<Option<ZoneDisplay>>) {
        let a = Polygon::from_pairs(&[[0.0, 0.0], [0.0, 10.0], [10.0, 10.0], [10.0, 0.0]]).unwrap();
        let b = Polygon::from_pairs(&[[5.0, 5.0], [5.0, 15.0], [15.0, 15.0], [15.0, 5.0]]).unwrap();
        (vec![a, b], vec![Some(ZoneDisplay::labeled("Core")), None])
    }

    #[test]
    fn test_first_match_policy() {
        let (polys, meta) = zones();
        let lookup = ZoneLookup::new(polys, &meta);
        let hits = lookup.locate(LatLng::new(7.0, 7.0), MatchPolicy::First);
        assert_eq!(
            hits,
            vec![ZoneHit {
                index: 0,
                label: Some("Core".into())
            }]
        );
    }

    #[test]
    fn test_all_matches_policy() {
        let (polys, meta) = zones();
        let lookup = ZoneLookup::new(polys, &meta);
        let hits = lookup.locate(LatLng::new(7.0, 7.0), MatchPolicy::All);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[1].index, 1);
        assert_eq!(hits[1].label, None);
    }

    #[test]
    fn test_tolerance_lookup() {
        let (polys, meta) = zones();
        let strict = ZoneLookup::new(polys.clone(), &meta);
        let lenient = ZoneLookup::new(polys, &meta).with_default_tolerance();
        let on_edge = LatLng::new(15.0, 10.0);
        assert!(!strict.contains(on_edge));
        assert!(lenient.contains(on_edge));
        assert!(!lenient.contains(LatLng::new(40.0, 40.0)));
    }

    #[test]
    fn test_short_metadata_list_is_padded() {
        let (polys, _) = zones();
        let lookup = ZoneLookup::new(polys, &[]);
        let hits = lookup.locate(LatLng::new(12.0, 12.0), MatchPolicy::All);
        assert_eq!(hits, vec![ZoneHit { index: 1, label: None }]);
    }
}
