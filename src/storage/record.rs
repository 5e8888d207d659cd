//! Row shape exchanged with the persistence layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::normalizer::{
    to_canonical_indexed, to_stored_shape, zone_display_at, zone_display_to_stored, StorageError,
};
use crate::models::{AreaGeometry, NetworkLinkSource, ServiceArea};

/// A service area as the persistence layer stores it.
///
/// `polygon` keeps the loosely typed JSON column so legacy rows in either
/// shape can be read back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceAreaRecord {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub polygon: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone_display: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_link_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_link_fetched_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub draft: bool,
}

impl ServiceAreaRecord {
    /// Shape a service area for storage.
    ///
    /// An area with no polygons is only writable as a draft.
    pub fn from_area(area: &ServiceArea) -> Result<Self, StorageError> {
        if area.polygons().is_empty() && !area.draft {
            return Err(StorageError::EmptyArea);
        }

        let link = area.network_link();

        Ok(Self {
            id: area.id,
            organization_id: area.organization_id,
            name: area.name.clone(),
            polygon: to_stored_shape(area.polygons().to_vec()),
            zone_display: zone_display_to_stored(area.zones()),
            network_link_url: link.map(|l| l.url.clone()),
            network_link_fetched_at: link.and_then(|l| l.fetched_at),
            draft: area.draft,
        })
    }

    /// Rebuild the in-memory service area. Malformed polygons and metadata
    /// entries are dropped rather than failing the whole row; metadata stays
    /// with the polygon it was stored alongside.
    pub fn into_area(self) -> ServiceArea {
        let (indices, polygons): (Vec<usize>, Vec<_>) =
            to_canonical_indexed(&self.polygon).into_iter().unzip();
        let zones = zone_display_at(self.zone_display.as_ref(), &indices);

        let fetched_at = self.network_link_fetched_at;
        let network_link = self
            .network_link_url
            .map(|url| NetworkLinkSource { url, fetched_at });

        let geometry = AreaGeometry {
            polygons,
            zones,
            network_link,
        };

        ServiceArea::from_parts(
            self.id,
            self.organization_id,
            self.name,
            geometry,
            self.draft,
        )
    }
}
