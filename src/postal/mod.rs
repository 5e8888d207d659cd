//! ZIP code ingestion: extract codes from text and resolve each into its
//! ZCTA boundary polygon through an external authority.

mod authority;
mod codes;
mod resolver;

pub use authority::{
    parse_feature_collection, query_url, BoundaryAuthority, BoundaryGeometry, TigerwebAuthority,
};
pub use codes::{extract_codes, normalize_codes, NormalizedCodes};
pub use resolver::{PostalBatch, PostalError, PostalResolver, DEFAULT_MAX_BATCH};
