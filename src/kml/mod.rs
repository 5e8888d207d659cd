//! KML coordinate reader.

mod parser;

pub use parser::{network_link_target, parse_coordinates, parse_document, KmlDocument, KmlError};
