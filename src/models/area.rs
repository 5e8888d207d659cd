//! Service area owned by one organization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{LatLng, Polygon, ZoneDisplay};
use crate::pip::{MatchPolicy, ZoneHit, ZoneLookup};

/// Where polygons came from when they were resolved from a remote document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkLinkSource {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fetched_at: Option<DateTime<Utc>>,
}

/// Output of any ingestion path: polygons with their parallel metadata.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AreaGeometry {
    pub polygons: Vec<Polygon>,
    /// Parallel to `polygons`; shorter lists are padded with `None`
    pub zones: Vec<Option<ZoneDisplay>>,
    pub network_link: Option<NetworkLinkSource>,
}

impl AreaGeometry {
    pub fn new(polygons: Vec<Polygon>) -> Self {
        Self {
            polygons,
            zones: Vec::new(),
            network_link: None,
        }
    }

    /// Attach labels, one per polygon
    pub fn with_labels(mut self, labels: Vec<Option<String>>) -> Self {
        self.zones = labels
            .into_iter()
            .map(|l| l.map(ZoneDisplay::labeled).filter(|z| !z.is_empty()))
            .collect();
        self
    }

    pub fn with_zones(mut self, zones: Vec<Option<ZoneDisplay>>) -> Self {
        self.zones = zones;
        self
    }

    pub fn with_network_link(mut self, url: impl Into<String>, fetched_at: DateTime<Utc>) -> Self {
        self.network_link = Some(NetworkLinkSource {
            url: url.into(),
            fetched_at: Some(fetched_at),
        });
        self
    }

    /// Metadata list aligned to the polygon count
    fn aligned_zones(&self) -> Vec<Option<ZoneDisplay>> {
        (0..self.polygons.len())
            .map(|i| self.zones.get(i).cloned().flatten().filter(|z| !z.is_empty()))
            .collect()
    }
}

/// A coverage area: one or more zones, each a polygon with optional metadata
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceArea {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    /// A draft may be stored without polygons
    pub draft: bool,
    polygons: Vec<Polygon>,
    zones: Vec<Option<ZoneDisplay>>,
    network_link: Option<NetworkLinkSource>,
}

impl ServiceArea {
    pub fn new(organization_id: Uuid, name: impl Into<String>, geometry: AreaGeometry) -> Self {
        Self::from_parts(Uuid::new_v4(), organization_id, name, geometry, false)
    }

    /// An empty area that can be saved before any geometry is supplied
    pub fn draft(organization_id: Uuid, name: impl Into<String>) -> Self {
        Self::from_parts(
            Uuid::new_v4(),
            organization_id,
            name,
            AreaGeometry::default(),
            true,
        )
    }

    pub fn from_parts(
        id: Uuid,
        organization_id: Uuid,
        name: impl Into<String>,
        geometry: AreaGeometry,
        draft: bool,
    ) -> Self {
        let zones = geometry.aligned_zones();
        Self {
            id,
            organization_id,
            name: name.into(),
            draft,
            polygons: geometry.polygons,
            zones,
            network_link: geometry.network_link,
        }
    }

    /// Replace polygons, metadata and source link wholesale
    pub fn replace_geometry(&mut self, geometry: AreaGeometry) {
        self.zones = geometry.aligned_zones();
        self.polygons = geometry.polygons;
        self.network_link = geometry.network_link;
        if !self.polygons.is_empty() {
            self.draft = false;
        }
    }

    pub fn polygons(&self) -> &[Polygon] {
        &self.polygons
    }

    pub fn zones(&self) -> &[Option<ZoneDisplay>] {
        &self.zones
    }

    pub fn network_link(&self) -> Option<&NetworkLinkSource> {
        self.network_link.as_ref()
    }

    /// Build a zone lookup for repeated queries against this area
    pub fn lookup(&self) -> ZoneLookup {
        ZoneLookup::new(self.polygons.clone(), &self.zones)
    }

    /// Zones containing `point`
    pub fn locate(&self, point: LatLng, policy: MatchPolicy) -> Vec<ZoneHit> {
        self.lookup().locate(point, policy)
    }

    pub fn contains(&self, point: LatLng) -> bool {
        self.lookup().contains(point)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(lat0: f64, lng0: f64) -> Polygon {
        Polygon::from_pairs(&[
            [lat0, lng0],
            [lat0, lng0 + 1.0],
            [lat0 + 1.0, lng0 + 1.0],
            [lat0 + 1.0, lng0],
        ])
        .unwrap()
    }

    #[test]
    fn test_zones_aligned_to_polygons() {
        let geometry = AreaGeometry::new(vec![square(0.0, 0.0), square(5.0, 5.0)])
            .with_zones(vec![Some(ZoneDisplay::labeled("A"))]);
        let area = ServiceArea::new(Uuid::new_v4(), "Test", geometry);
        assert_eq!(area.zones().len(), 2);
        assert!(area.zones()[1].is_none());

        let geometry = AreaGeometry::new(vec![square(0.0, 0.0)]).with_labels(vec![
            Some("A".into()),
            Some("B".into()),
        ]);
        let area = ServiceArea::new(Uuid::new_v4(), "Test", geometry);
        assert_eq!(area.zones(), &[Some(ZoneDisplay::labeled("A"))]);
    }

    #[test]
    fn test_replace_geometry_is_wholesale() {
        let geometry = AreaGeometry::new(vec![square(0.0, 0.0)])
            .with_labels(vec![Some("Old".into())])
            .with_network_link("https://example.com/a.kml", Utc::now());
        let mut area = ServiceArea::new(Uuid::new_v4(), "Test", geometry);
        assert!(area.network_link().is_some());

        area.replace_geometry(AreaGeometry::new(vec![square(5.0, 5.0), square(9.0, 9.0)]));
        assert_eq!(area.polygons().len(), 2);
        assert_eq!(area.zones(), &[None, None]);
        assert!(area.network_link().is_none());
    }

    #[test]
    fn test_draft_becomes_live_with_polygons() {
        let mut area = ServiceArea::draft(Uuid::new_v4(), "Draft");
        assert!(area.draft);
        assert!(!area.contains(LatLng::new(0.5, 0.5)));

        area.replace_geometry(AreaGeometry::new(vec![square(0.0, 0.0)]));
        assert!(!area.draft);
        assert!(area.contains(LatLng::new(0.5, 0.5)));
    }

    #[test]
    fn test_locate_reports_labels() {
        let geometry = AreaGeometry::new(vec![square(0.0, 0.0), square(0.5, 0.5)])
            .with_labels(vec![Some("West".into()), Some("East".into())]);
        let area = ServiceArea::new(Uuid::new_v4(), "Test", geometry);

        let hits = area.locate(LatLng::new(0.75, 0.75), MatchPolicy::All);
        let labels: Vec<_> = hits.iter().map(|h| h.label.as_deref()).collect();
        assert_eq!(labels, vec![Some("West"), Some("East")]);

        let hits = area.locate(LatLng::new(1.25, 1.25), MatchPolicy::First);
        assert_eq!(hits[0].label.as_deref(), Some("East"));
    }
}
