//! Remote KML documents: fetch, follow one NetworkLink, cache.

mod cache;
mod fetcher;
mod resolver;

pub use cache::{
    CachedDocument, Clock, DocumentCache, MemoryDocumentCache, NoopCache, SystemClock,
    DEFAULT_CACHE_TTL,
};
pub use fetcher::{DocumentFetcher, FetchedBody, HttpFetcher};
pub use resolver::{export_url, validate_url, RemoteDocument, RemoteError, RemoteResolver};
