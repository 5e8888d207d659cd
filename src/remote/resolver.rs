//! Resolve a remote KML link into polygons.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

use super::cache::{CachedDocument, Clock, DocumentCache, MemoryDocumentCache, SystemClock};
use super::fetcher::{DocumentFetcher, HttpFetcher};
use crate::config::RemoteConfig;
use crate::kml::{parse_document, KmlDocument, KmlError};
use crate::models::{AreaGeometry, Polygon};

/// Remote document errors. Every variant names the URL involved.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("could not build HTTP client: {0}")]
    Client(String),

    #[error("fetching {url} failed with HTTP status {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("fetching {url} timed out after {secs}s")]
    Timeout { url: String, secs: u64 },

    #[error("fetching {url} failed: {reason}")]
    Transport { url: String, reason: String },

    #[error("{url} returned an empty document")]
    EmptyBody { url: String },

    #[error("could not read the document at {url}: {source}")]
    Parse {
        url: String,
        #[source]
        source: KmlError,
    },

    #[error("the document at {url} contains no polygons")]
    NoPolygons { url: String },

    #[error("network link in {url} points to an invalid URL '{target}': {reason}")]
    BadNetworkLinkTarget {
        url: String,
        target: String,
        reason: String,
    },

    #[error(
        "network link in {url} points to {target}, which is itself a network link; \
         link directly to a document that contains the polygons"
    )]
    NestedNetworkLink { url: String, target: String },
}

/// Polygons resolved from a remote document
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteDocument {
    /// The URL as the caller supplied it (also the cache key)
    pub url: String,
    pub polygons: Vec<Polygon>,
    pub labels: Vec<Option<String>>,
    pub fetched_at: DateTime<Utc>,
    pub from_cache: bool,
}

impl RemoteDocument {
    fn from_cached(url: &str, cached: CachedDocument) -> Self {
        Self {
            url: url.to_string(),
            polygons: cached.polygons,
            labels: cached.labels,
            fetched_at: cached.fetched_at,
            from_cache: true,
        }
    }

    /// Geometry ready to store, carrying the source link and fetch time
    pub fn into_geometry(self) -> AreaGeometry {
        AreaGeometry::new(self.polygons)
            .with_labels(self.labels)
            .with_network_link(self.url, self.fetched_at)
    }
}

/// Fetches remote KML with a TTL cache and at most one NetworkLink hop
pub struct RemoteResolver<F> {
    fetcher: F,
    cache: Arc<dyn DocumentCache>,
    clock: Arc<dyn Clock>,
}

impl RemoteResolver<HttpFetcher> {
    /// HTTP resolver backed by the process-wide cache
    pub fn from_config(config: &RemoteConfig) -> Result<Self, RemoteError> {
        let fetcher = HttpFetcher::new(config).map_err(|e| RemoteError::Client(e.to_string()))?;
        Ok(Self::new(
            fetcher,
            MemoryDocumentCache::shared(config.cache_ttl()),
        ))
    }
}

impl<F: DocumentFetcher> RemoteResolver<F> {
    pub fn new(fetcher: F, cache: Arc<dyn DocumentCache>) -> Self {
        Self {
            fetcher,
            cache,
            clock: Arc::new(SystemClock),
        }
    }

    /// Use a custom clock for fetch timestamps
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Resolve `raw_url` into polygons.
    ///
    /// A fresh cache entry for the exact URL string is returned without any
    /// network call. A document that is a NetworkLink is followed once; a
    /// link to another link is an error.
    pub async fn resolve(&self, raw_url: &str) -> Result<RemoteDocument, RemoteError> {
        let key = raw_url.trim();
        let url = validate_url(key)?;

        if let Some(cached) = self.cache.get(key) {
            debug!("Cache hit for {}", key);
            return Ok(RemoteDocument::from_cached(key, cached));
        }

        info!("Fetching remote document {}", key);

        let (polygons, labels) = match self.fetch_document(&export_url(&url)).await? {
            KmlDocument::Polygons { polygons, labels } => (polygons, labels),
            KmlDocument::NetworkLink(target) => {
                info!("{} is a network link, following to {}", key, target);

                let target_url =
                    validate_url(&target).map_err(|e| RemoteError::BadNetworkLinkTarget {
                        url: key.to_string(),
                        target: target.clone(),
                        reason: match e {
                            RemoteError::InvalidUrl { reason, .. } => reason,
                            other => other.to_string(),
                        },
                    })?;

                match self.fetch_document(&export_url(&target_url)).await? {
                    KmlDocument::Polygons { polygons, labels } => (polygons, labels),
                    KmlDocument::NetworkLink(next) => {
                        warn!(
                            "Refusing to follow second network link {} -> {} -> {}",
                            key, target, next
                        );
                        return Err(RemoteError::NestedNetworkLink {
                            url: key.to_string(),
                            target,
                        });
                    }
                }
            }
        };

        let fetched_at = self.clock.now();
        info!("Resolved {} polygons from {}", polygons.len(), key);

        self.cache.put(
            key,
            CachedDocument {
                polygons: polygons.clone(),
                labels: labels.clone(),
                fetched_at,
            },
        );

        Ok(RemoteDocument {
            url: key.to_string(),
            polygons,
            labels,
            fetched_at,
            from_cache: false,
        })
    }

    /// Drop one cached document so the next resolve refetches it
    pub fn evict(&self, url: &str) -> bool {
        self.cache.evict(url.trim())
    }

    /// Drop every cached document
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    async fn fetch_document(&self, url: &Url) -> Result<KmlDocument, RemoteError> {
        let fetched = self.fetcher.fetch(url).await?;

        if !fetched.is_success() {
            return Err(RemoteError::HttpStatus {
                url: url.to_string(),
                status: fetched.status,
            });
        }

        if fetched.body.trim().is_empty() {
            return Err(RemoteError::EmptyBody {
                url: url.to_string(),
            });
        }

        parse_document(&fetched.body).map_err(|source| match source {
            KmlError::Empty => RemoteError::EmptyBody {
                url: url.to_string(),
            },
            KmlError::NoGeometry => RemoteError::NoPolygons {
                url: url.to_string(),
            },
            source => RemoteError::Parse {
                url: url.to_string(),
                source,
            },
        })
    }
}

/// Syntactic check: absolute http(s) URL with a host
pub fn validate_url(raw: &str) -> Result<Url, RemoteError> {
    let invalid = |reason: String| RemoteError::InvalidUrl {
        url: raw.to_string(),
        reason,
    };

    let url = Url::parse(raw).map_err(|e| invalid(e.to_string()))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!(
            "unsupported scheme '{}', expected http or https",
            url.scheme()
        )));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(invalid("missing host".to_string()));
    }

    Ok(url)
}

/// Rewrite Google My Maps viewer/edit/embed links to their KML export.
///
/// Other URLs are returned unchanged.
pub fn export_url(url: &Url) -> Url {
    let is_google = url
        .host_str()
        .is_some_and(|h| h == "google.com" || h.ends_with(".google.com"));
    if !is_google || !url.path().starts_with("/maps/d/") {
        return url.clone();
    }

    let Some(mid) = url
        .query_pairs()
        .find(|(k, _)| k == "mid")
        .map(|(_, v)| v.into_owned())
    else {
        return url.clone();
    };

    let mut export = url.clone();
    export.set_path("/maps/d/kml");
    export
        .query_pairs_mut()
        .clear()
        .append_pair("mid", &mid)
        .append_pair("forcekml", "1");
    export
}
