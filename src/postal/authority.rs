//! External boundary authority for ZIP code (ZCTA) polygons.

use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::PostalError;
use crate::config::PostalConfig;
use crate::models::{LatLng, Polygon, MIN_POLYGON_POINTS};

/// GeoJSON geometry of a boundary, positions in (lng, lat) order
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", content = "coordinates")]
pub enum BoundaryGeometry {
    Polygon(Vec<Vec<Vec<f64>>>),
    MultiPolygon(Vec<Vec<Vec<Vec<f64>>>>),
}

impl BoundaryGeometry {
    /// Outer ring of the polygon, or of the first part of a multipolygon
    pub fn outer_ring(&self) -> Option<&[Vec<f64>]> {
        match self {
            BoundaryGeometry::Polygon(rings) => rings.first().map(Vec::as_slice),
            BoundaryGeometry::MultiPolygon(parts) => parts
                .first()
                .and_then(|rings| rings.first())
                .map(Vec::as_slice),
        }
    }

    /// Convert the outer ring to a closed (lat, lng) polygon.
    ///
    /// Positions that are not two finite numbers are skipped. Fewer than
    /// three usable points is an error.
    pub fn to_polygon(&self) -> Option<Polygon> {
        let ring = self.outer_ring()?;

        let mut points: Vec<LatLng> = ring
            .iter()
            .filter(|pos| pos.len() >= 2)
            .map(|pos| LatLng::new(pos[1], pos[0]))
            .filter(LatLng::is_finite)
            .collect();

        if points.len() < MIN_POLYGON_POINTS {
            return None;
        }
        if points.first() != points.last() {
            points.push(points[0]);
        }

        Polygon::new(points).ok()
    }
}

/// Looks up the boundary for one five digit code.
///
/// `Ok(None)` means the authority answered but has no feature for the code.
pub trait BoundaryAuthority: Send + Sync {
    fn lookup(
        &self,
        code: &str,
    ) -> impl Future<Output = Result<Option<BoundaryGeometry>, PostalError>> + Send;
}

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    #[serde(default)]
    features: Vec<Feature>,
    #[serde(default)]
    error: Option<ArcGisError>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    #[serde(default)]
    geometry: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ArcGisError {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    message: String,
}

/// US Census TIGERweb ZCTA layer (ArcGIS REST query, GeoJSON output)
#[derive(Clone)]
pub struct TigerwebAuthority {
    client: Client,
    endpoint: String,
    timeout: Duration,
}

impl TigerwebAuthority {
    pub fn new(config: &PostalConfig) -> reqwest::Result<Self> {
        let client = Client::builder()
            .user_agent(format!("geofence/{}", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout())
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            timeout: config.timeout(),
        })
    }
}

impl BoundaryAuthority for TigerwebAuthority {
    fn lookup(
        &self,
        code: &str,
    ) -> impl Future<Output = Result<Option<BoundaryGeometry>, PostalError>> + Send {
        let client = self.client.clone();
        let endpoint = self.endpoint.clone();
        let timeout = self.timeout;
        let code = code.to_string();

        async move {
            debug!("Querying boundary authority for {}", code);

            let url = query_url(&endpoint, &code)?;
            let response = client
                .get(url)
                .send()
                .await
                .map_err(|e| transport_error(&code, e, timeout))?;

            if !response.status().is_success() {
                return Err(PostalError::HttpStatus {
                    code,
                    status: response.status().as_u16(),
                });
            }

            let body = response
                .text()
                .await
                .map_err(|e| transport_error(&code, e, timeout))?;

            parse_feature_collection(&code, &body)
        }
    }
}

/// ArcGIS query URL for one ZCTA, asking for WGS84 GeoJSON
pub fn query_url(endpoint: &str, code: &str) -> Result<Url, PostalError> {
    let mut url = Url::parse(endpoint).map_err(|e| {
        PostalError::Client(format!("invalid boundary endpoint '{}': {}", endpoint, e))
    })?;
    url.query_pairs_mut()
        .append_pair("where", &format!("ZCTA5='{}'", code))
        .append_pair("outFields", "ZCTA5")
        .append_pair("returnGeometry", "true")
        .append_pair("outSR", "4326")
        .append_pair("f", "geojson");
    Ok(url)
}

/// Read the first feature's geometry from a GeoJSON FeatureCollection
pub fn parse_feature_collection(
    code: &str,
    body: &str,
) -> Result<Option<BoundaryGeometry>, PostalError> {
    let collection: FeatureCollection =
        serde_json::from_str(body).map_err(|e| PostalError::Authority {
            code: code.to_string(),
            message: format!("unreadable response: {}", e),
        })?;

    if let Some(err) = collection.error {
        return Err(PostalError::Authority {
            code: code.to_string(),
            message: match err.code {
                Some(c) => format!("{} (code {})", err.message, c),
                None => err.message,
            },
        });
    }

    let Some(geometry) = collection.features.into_iter().find_map(|f| f.geometry) else {
        return Ok(None);
    };

    serde_json::from_value(geometry)
        .map(Some)
        .map_err(|e| PostalError::Authority {
            code: code.to_string(),
            message: format!("unsupported geometry: {}", e),
        })
}

fn transport_error(code: &str, err: reqwest::Error, timeout: Duration) -> PostalError {
    if err.is_timeout() {
        PostalError::Timeout {
            code: code.to_string(),
            secs: timeout.as_secs(),
        }
    } else {
        PostalError::Transport {
            code: code.to_string(),
            reason: err.to_string(),
        }
    }
}
