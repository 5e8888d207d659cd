//! Batch resolution of ZIP codes into boundary polygons.

use futures::stream::{self, StreamExt};
use tracing::{info, warn};

use super::authority::{BoundaryAuthority, TigerwebAuthority};
use super::codes::{normalize_codes, scan_codes};
use crate::config::PostalConfig;
use crate::models::{AreaGeometry, Polygon, ZoneDisplay};

/// Default cap on unique codes per import
pub const DEFAULT_MAX_BATCH: usize = 150;

/// Postal boundary errors
#[derive(Debug, thiserror::Error)]
pub enum PostalError {
    #[error("{count} ZIP codes requested, at most {max} are accepted per import")]
    BatchTooLarge { count: usize, max: usize },

    #[error("could not build HTTP client: {0}")]
    Client(String),

    #[error("no boundary found for ZIP code {code}")]
    NotFound { code: String },

    #[error("boundary lookup for {code} timed out after {secs}s")]
    Timeout { code: String, secs: u64 },

    #[error("boundary lookup for {code} failed: {reason}")]
    Transport { code: String, reason: String },

    #[error("boundary lookup for {code} failed with HTTP status {status}")]
    HttpStatus { code: String, status: u16 },

    #[error("boundary authority rejected {code}: {message}")]
    Authority { code: String, message: String },

    #[error("boundary for {code} has fewer than 3 usable points")]
    DegenerateBoundary { code: String },
}

/// Outcome of one batch. A failed code never aborts the batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostalBatch {
    pub polygons: Vec<Polygon>,
    /// Source code of each polygon, parallel to `polygons`
    pub labels: Vec<String>,
    /// Well-formed codes the authority could not resolve
    pub failed: Vec<String>,
    /// Inputs that repeated an earlier code
    pub duplicates: usize,
    /// Inputs that were not five digit codes
    pub invalid: Vec<String>,
}

impl PostalBatch {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// Zone metadata labelling each polygon with its code
    pub fn zone_display(&self) -> Vec<Option<ZoneDisplay>> {
        self.labels
            .iter()
            .map(|code| Some(ZoneDisplay::labeled(code.clone())))
            .collect()
    }

    /// One-line report for the operator
    pub fn summary(&self) -> String {
        let mut parts = vec![format!("{} ZIP codes resolved", self.polygons.len())];
        if !self.failed.is_empty() {
            parts.push(format!(
                "{} not found ({})",
                self.failed.len(),
                self.failed.join(", ")
            ));
        }
        if self.duplicates > 0 {
            parts.push(format!("{} duplicates skipped", self.duplicates));
        }
        if !self.invalid.is_empty() {
            parts.push(format!("{} invalid entries ignored", self.invalid.len()));
        }
        parts.join("; ")
    }

    pub fn into_geometry(self) -> AreaGeometry {
        let zones = self.zone_display();
        AreaGeometry::new(self.polygons).with_zones(zones)
    }
}

/// Resolves ZIP codes through a boundary authority
pub struct PostalResolver<A> {
    authority: A,
    max_batch: usize,
    concurrency: usize,
}

impl PostalResolver<TigerwebAuthority> {
    pub fn from_config(config: &PostalConfig) -> Result<Self, PostalError> {
        let authority =
            TigerwebAuthority::new(config).map_err(|e| PostalError::Client(e.to_string()))?;
        Ok(Self::new(authority)
            .with_max_batch(config.max_batch)
            .with_concurrency(config.concurrency))
    }
}

impl<A: BoundaryAuthority> PostalResolver<A> {
    /// Sequential resolver with the default batch cap
    pub fn new(authority: A) -> Self {
        Self {
            authority,
            max_batch: DEFAULT_MAX_BATCH,
            concurrency: 1,
        }
    }

    pub fn with_max_batch(mut self, max_batch: usize) -> Self {
        self.max_batch = max_batch;
        self
    }

    /// Number of lookups in flight at once. Output order is unaffected.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Extract codes from free text and resolve them as one batch.
    /// Repeated codes in the text are counted as duplicates.
    pub async fn resolve_text(&self, text: &str) -> Result<PostalBatch, PostalError> {
        self.resolve_batch(&scan_codes(text)).await
    }

    /// Resolve an import, rejecting it whole when it exceeds the batch cap
    pub async fn resolve_batch<S: AsRef<str>>(
        &self,
        codes: &[S],
    ) -> Result<PostalBatch, PostalError> {
        let unique = normalize_codes(codes).codes.len();
        if unique > self.max_batch {
            return Err(PostalError::BatchTooLarge {
                count: unique,
                max: self.max_batch,
            });
        }
        Ok(self.resolve_all(codes).await)
    }

    /// Resolve every unique well-formed code. Failures are collected, not
    /// raised.
    pub async fn resolve_all<S: AsRef<str>>(&self, codes: &[S]) -> PostalBatch {
        let normalized = normalize_codes(codes);

        info!(
            "Resolving {} ZIP codes ({} duplicates, {} invalid)",
            normalized.codes.len(),
            normalized.duplicates,
            normalized.invalid.len()
        );

        let outcomes: Vec<(String, Result<Polygon, PostalError>)> =
            stream::iter(normalized.codes)
                .map(|code| async move {
                    let outcome = self.resolve_code(&code).await;
                    (code, outcome)
                })
                .buffered(self.concurrency)
                .collect()
                .await;

        let mut batch = PostalBatch {
            duplicates: normalized.duplicates,
            invalid: normalized.invalid,
            ..Default::default()
        };

        for (code, outcome) in outcomes {
            match outcome {
                Ok(polygon) => {
                    batch.polygons.push(polygon);
                    batch.labels.push(code);
                }
                Err(e) => {
                    warn!("{}", e);
                    batch.failed.push(code);
                }
            }
        }

        info!("{}", batch.summary());
        batch
    }

    async fn resolve_code(&self, code: &str) -> Result<Polygon, PostalError> {
        let geometry = self
            .authority
            .lookup(code)
            .await?
            .ok_or_else(|| PostalError::NotFound {
                code: code.to_string(),
            })?;

        geometry
            .to_polygon()
            .ok_or_else(|| PostalError::DegenerateBoundary {
                code: code.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::postal::BoundaryGeometry;
    use std::collections::HashMap;
    use std::future::Future;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    enum Answer {
        Found(BoundaryGeometry),
        Missing,
        Timeout,
    }

    /// Canned boundaries; unknown codes have no feature
    #[derive(Default)]
    struct FakeAuthority {
        answers: HashMap<String, Answer>,
        /// Per-code response delay, to scramble completion order
        delays: HashMap<String, u64>,
        calls: AtomicUsize,
    }

    impl FakeAuthority {
        fn found(mut self, code: &str, lng: f64, lat: f64) -> Self {
            let ring = vec![
                vec![lng, lat],
                vec![lng + 0.1, lat],
                vec![lng + 0.1, lat + 0.1],
                vec![lng, lat],
            ];
            self.answers
                .insert(code.to_string(), Answer::Found(BoundaryGeometry::Polygon(vec![ring])));
            self
        }

        fn answer(mut self, code: &str, answer: Answer) -> Self {
            self.answers.insert(code.to_string(), answer);
            self
        }

        fn delay(mut self, code: &str, millis: u64) -> Self {
            self.delays.insert(code.to_string(), millis);
            self
        }
    }

    impl BoundaryAuthority for FakeAuthority {
        fn lookup(
            &self,
            code: &str,
        ) -> impl Future<Output = Result<Option<BoundaryGeometry>, PostalError>> + Send {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let result = match self.answers.get(code) {
                Some(Answer::Found(g)) => Ok(Some(g.clone())),
                Some(Answer::Missing) | None => Ok(None),
                Some(Answer::Timeout) => Err(PostalError::Timeout {
                    code: code.to_string(),
                    secs: 15,
                }),
            };
            let delay = self.delays.get(code).copied().unwrap_or(0);
            async move {
                if delay > 0 {
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                }
                result
            }
        }
    }

    #[tokio::test]
    async fn test_partial_failure_is_reported() {
        let authority = FakeAuthority::default()
            .found("27601", -78.64, 35.77)
            .answer("27513", Answer::Timeout);
        let resolver = PostalResolver::new(authority);

        let batch = resolver
            .resolve_all(&["27601", "00000-0000", "27601", "27513"])
            .await;

        assert_eq!(batch.polygons.len(), 1);
        assert_eq!(batch.labels, vec!["27601"]);
        assert_eq!(batch.failed, vec!["00000", "27513"]);
        assert_eq!(batch.duplicates, 1);
        assert!(!batch.is_complete());
        assert_eq!(resolver.authority.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_degenerate_boundary_fails_one_code() {
        let authority = FakeAuthority::default().found("27601", -78.64, 35.77).answer(
            "27502",
            Answer::Found(BoundaryGeometry::Polygon(vec![vec![vec![1.0, 2.0], vec![3.0, 4.0]]])),
        );
        let batch = PostalResolver::new(authority)
            .resolve_all(&["27502", "27601"])
            .await;
        assert_eq!(batch.labels, vec!["27601"]);
        assert_eq!(batch.failed, vec!["27502"]);
    }

    #[tokio::test]
    async fn test_concurrent_resolution_keeps_order() {
        let authority = FakeAuthority::default()
            .found("10001", -74.0, 40.7)
            .found("10002", -73.9, 40.7)
            .found("10003", -73.8, 40.7)
            .answer("10004", Answer::Missing)
            .delay("10001", 30)
            .delay("10002", 10);
        let resolver = PostalResolver::new(authority).with_concurrency(4);

        let batch = resolver
            .resolve_all(&["10001", "10002", "10004", "10003"])
            .await;
        assert_eq!(batch.labels, vec!["10001", "10002", "10003"]);
        assert_eq!(batch.failed, vec!["10004"]);
        assert_eq!(batch.polygons[0].points()[0].lng, -74.0);
    }

    #[tokio::test]
    async fn test_batch_cap_rejects_whole_request() {
        let resolver = PostalResolver::new(FakeAuthority::default()).with_max_batch(2);

        let err = resolver
            .resolve_batch(&["10001", "10002", "10003"])
            .await
            .unwrap_err();
        assert!(matches!(err, PostalError::BatchTooLarge { count: 3, max: 2 }));
        assert_eq!(resolver.authority.calls.load(Ordering::SeqCst), 0);

        // Duplicates do not count against the cap
        let batch = resolver
            .resolve_batch(&["10001", "10002", "10001", "10002-0001"])
            .await
            .unwrap();
        assert_eq!(batch.failed.len(), 2);
        assert_eq!(batch.duplicates, 2);
    }

    #[tokio::test]
    async fn test_resolve_text() {
        let authority = FakeAuthority::default().found("27601", -78.64, 35.77);
        let batch = PostalResolver::new(authority)
            .resolve_text("zip\n27601\n27601-4400\nbad\n")
            .await
            .unwrap();
        assert_eq!(batch.labels, vec!["27601"]);
        assert!(batch.failed.is_empty());
        assert_eq!(batch.duplicates, 1);

        let geometry = batch.into_geometry();
        assert_eq!(geometry.zones, vec![Some(ZoneDisplay::labeled("27601"))]);
    }

    #[tokio::test]
    async fn test_resolve_text_counts_repeats() {
        let authority = FakeAuthority::default().found("27601", -78.64, 35.77);
        let batch = PostalResolver::new(authority)
            .resolve_text("27601\n27601\n00000-0000\n27601-1234")
            .await
            .unwrap();
        assert_eq!(batch.labels, vec!["27601"]);
        assert_eq!(batch.failed, vec!["00000"]);
        assert_eq!(batch.duplicates, 2);
        assert!(batch.summary().contains("2 duplicates skipped"));
    }

    #[test]
    fn test_summary() {
        let batch = PostalBatch {
            polygons: vec![],
            labels: vec![],
            failed: vec!["00000".into()],
            duplicates: 2,
            invalid: vec!["abc".into()],
        };
        assert_eq!(
            batch.summary(),
            "0 ZIP codes resolved; 1 not found (00000); 2 duplicates skipped; 1 invalid entries ignored"
        );
    }
}
