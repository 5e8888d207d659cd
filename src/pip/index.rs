//! Spatial index for fast zone lookups.

use rstar::{RTree, RTreeObject, AABB};
use std::sync::Arc;
use tracing::debug;

use super::geometry::{contains_with_tolerance, is_inside};
use crate::models::{LatLng, Polygon};

/// Wrapper for R-tree indexing of one zone polygon
#[derive(Clone)]
pub struct IndexedZone {
    /// Position of the zone in the service area's polygon list
    pub index: usize,
    pub polygon: Arc<Polygon>,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for IndexedZone {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

impl IndexedZone {
    pub fn new(index: usize, polygon: Polygon) -> Option<Self> {
        let (min_x, min_y, max_x, max_y) = polygon.bbox()?;
        Some(Self {
            index,
            polygon: Arc::new(polygon),
            envelope: AABB::from_corners([min_x, min_y], [max_x, max_y]),
        })
    }
}

/// Zones of a service area indexed by bounding box (x = lng, y = lat)
pub struct ZoneIndex {
    tree: RTree<IndexedZone>,
}

impl ZoneIndex {
    /// Build the index; zone indices follow the order of `polygons`
    pub fn build(polygons: Vec<Polygon>) -> Self {
        let indexed: Vec<IndexedZone> = polygons
            .into_iter()
            .enumerate()
            .filter_map(|(i, p)| IndexedZone::new(i, p))
            .collect();

        let tree = RTree::bulk_load(indexed);
        debug!("Zone index built with {} entries", tree.size());

        Self { tree }
    }

    /// Indices of every zone containing the point, ascending
    pub fn lookup(&self, point: LatLng) -> Vec<usize> {
        let mut hits: Vec<usize> = self
            .candidates(point, 0.0)
            .filter(|z| is_inside(point, z.polygon.points()))
            .map(|z| z.index)
            .collect();
        hits.sort_unstable();
        hits
    }

    /// Like [`ZoneIndex::lookup`] but also accepts points within `tolerance`
    /// degrees of a zone edge
    pub fn lookup_with_tolerance(&self, point: LatLng, tolerance: f64) -> Vec<usize> {
        let mut hits: Vec<usize> = self
            .candidates(point, tolerance)
            .filter(|z| contains_with_tolerance(point, z.polygon.points(), tolerance))
            .map(|z| z.index)
            .collect();
        hits.sort_unstable();
        hits
    }

    fn candidates(&self, point: LatLng, pad: f64) -> impl Iterator<Item = &IndexedZone> {
        let query_envelope = AABB::from_corners(
            [point.lng - pad, point.lat - pad],
            [point.lng + pad, point.lat + pad],
        );
        self.tree.locate_in_envelope_intersecting(&query_envelope)
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}
