//! Tag-scanning KML reader.
//!
//! KML exports in the wild are loose enough (namespace prefixes, CDATA,
//! stray elements, label-only placemarks) that a full XML parse buys little.
//! The reader only looks for `<coordinates>` blocks, the `<name>` of the
//! enclosing `<Placemark>`, and `<NetworkLink>` targets.

use regex::Regex;
use std::ops::Range;
use std::sync::LazyLock;
use tracing::debug;

use crate::models::{LatLng, Polygon, MIN_POLYGON_POINTS};

static COORDINATES_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(?:[\w-]+:)?coordinates\b[^>]*>(.*?)</(?:[\w-]+:)?coordinates\s*>")
        .expect("coordinates pattern")
});

static PLACEMARK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(?:[\w-]+:)?Placemark\b[^>]*>(.*?)</(?:[\w-]+:)?Placemark\s*>")
        .expect("placemark pattern")
});

static NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(?:[\w-]+:)?name\b[^>]*>(.*?)</(?:[\w-]+:)?name\s*>").expect("name pattern")
});

static NETWORK_LINK_OPEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<(?:[\w-]+:)?NetworkLink\b[^>]*>").expect("network link pattern")
});

static NETWORK_LINK_CLOSE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)</(?:[\w-]+:)?NetworkLink\s*>").expect("network link close pattern")
});

static HREF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(?:[\w-]+:)?href\b[^>]*>(.*?)</(?:[\w-]+:)?href\s*>").expect("href pattern")
});

static CDATA_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^\s*<!\[CDATA\[(.*?)\]\]>\s*$").expect("cdata pattern")
});

/// Result of reading a KML document
#[derive(Debug, Clone, PartialEq)]
pub enum KmlDocument {
    /// Geometry found. `labels` is parallel to `polygons`.
    Polygons {
        polygons: Vec<Polygon>,
        labels: Vec<Option<String>>,
    },
    /// The document is only a pointer to another document
    NetworkLink(String),
}

/// KML parse errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KmlError {
    #[error("document is empty")]
    Empty,

    #[error(
        "no polygon data found: the document has no coordinate block with at least \
         3 valid points and no network link"
    )]
    NoGeometry,

    #[error(
        "document contains a network link but its target URL could not be found; \
         point the link at a document that contains the polygons directly"
    )]
    UnresolvableNetworkLink,
}

/// Parse a KML document into polygons, or detect a NetworkLink pointer.
///
/// Polygon data always wins over a NetworkLink in the same document.
pub fn parse_document(text: &str) -> Result<KmlDocument, KmlError> {
    if text.trim().is_empty() {
        return Err(KmlError::Empty);
    }

    let placemarks = placemark_spans(text);

    let mut polygons = Vec::new();
    let mut labels = Vec::new();
    let mut blocks = 0usize;

    for caps in COORDINATES_RE.captures_iter(text) {
        blocks += 1;
        let (Some(whole), Some(body)) = (caps.get(0), caps.get(1)) else {
            continue;
        };

        let points = parse_coordinates(body.as_str());
        if points.len() < MIN_POLYGON_POINTS {
            continue;
        }
        let Ok(polygon) = Polygon::new(points) else {
            continue;
        };

        let label = placemarks
            .iter()
            .find(|(span, _)| span.contains(&whole.start()))
            .and_then(|(_, name)| name.clone());

        polygons.push(polygon);
        labels.push(label);
    }

    debug!(
        "Parsed {} polygons from {} coordinate blocks",
        polygons.len(),
        blocks
    );

    if !polygons.is_empty() {
        return Ok(KmlDocument::Polygons { polygons, labels });
    }

    if NETWORK_LINK_OPEN_RE.is_match(text) {
        return match network_link_target(text) {
            Some(url) => Ok(KmlDocument::NetworkLink(url)),
            None => Err(KmlError::UnresolvableNetworkLink),
        };
    }

    Err(KmlError::NoGeometry)
}

/// Parse the body of a `<coordinates>` element into (lat, lng) points.
///
/// Tuples are `lng,lat[,alt]` separated by whitespace. Malformed tuples are
/// skipped.
pub fn parse_coordinates(body: &str) -> Vec<LatLng> {
    body.split_whitespace()
        .filter_map(|token| {
            let mut fields = token.split(',');
            let lng: f64 = fields.next()?.trim().parse().ok()?;
            let lat: f64 = fields.next()?.trim().parse().ok()?;
            let point = LatLng::new(lat, lng);
            point.is_finite().then_some(point)
        })
        .collect()
}

/// Extract the `<href>` of the first NetworkLink that has one
pub fn network_link_target(text: &str) -> Option<String> {
    for open in NETWORK_LINK_OPEN_RE.find_iter(text) {
        let rest = &text[open.end()..];
        // An unclosed element runs to the end of the document
        let body = match NETWORK_LINK_CLOSE_RE.find(rest) {
            Some(close) => &rest[..close.start()],
            None => rest,
        };

        let target = HREF_RE
            .captures(body)
            .and_then(|caps| caps.get(1))
            .map(|m| element_text(m.as_str()))
            .filter(|href| !href.is_empty());

        if target.is_some() {
            return target;
        }
    }
    None
}

/// Byte ranges of each Placemark with its (optional) name
fn placemark_spans(text: &str) -> Vec<(Range<usize>, Option<String>)> {
    PLACEMARK_RE
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let name = caps
                .get(1)
                .and_then(|body| NAME_RE.captures(body.as_str()))
                .and_then(|n| n.get(1))
                .map(|n| element_text(n.as_str()))
                .filter(|n| !n.is_empty());
            Some((whole.range(), name))
        })
        .collect()
}

/// Text content of an element: CDATA unwrapped or entities decoded, trimmed
fn element_text(raw: &str) -> String {
    if let Some(inner) = CDATA_RE.captures(raw).and_then(|c| c.get(1)) {
        return inner.as_str().trim().to_string();
    }
    decode_entities(raw.trim())
}

fn decode_entities(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRIANGLE: &str = "-78.64,35.77,0 -78.60,35.80,0 -78.58,35.75,0 -78.64,35.77,0";

    fn kml(body: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<kml xmlns="http://www.opengis.net/kml/2.2"><Document>{}</Document></kml>"#,
            body
        )
    }

    fn polygons(doc: KmlDocument) -> (Vec<Polygon>, Vec<Option<String>>) {
        match doc {
            KmlDocument::Polygons { polygons, labels } => (polygons, labels),
            other => panic!("expected polygons, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_swaps_to_lat_lng() {
        let text = kml(&format!(
            "<Placemark><name>Raleigh</name><Polygon><outerBoundaryIs><LinearRing>\
             <coordinates>{}</coordinates></LinearRing></outerBoundaryIs></Polygon></Placemark>",
            TRIANGLE
        ));
        let (polys, labels) = polygons(parse_document(&text).unwrap());
        assert_eq!(polys.len(), 1);
        assert_eq!(polys[0].len(), 4);
        assert_eq!(polys[0].points()[0], LatLng::new(35.77, -78.64));
        assert_eq!(labels, vec![Some("Raleigh".to_string())]);
    }

    #[test]
    fn test_short_blocks_are_dropped() {
        let text = kml(&format!(
            "<Placemark><name>Office</name><Point><coordinates>-78.6,35.7,0</coordinates></Point></Placemark>\
             <Placemark><name>Area</name><Polygon><coordinates>{}</coordinates></Polygon></Placemark>\
             <Placemark><Polygon><coordinates>\n  {}\n</coordinates></Polygon></Placemark>",
            TRIANGLE, TRIANGLE
        ));
        let (polys, labels) = polygons(parse_document(&text).unwrap());
        assert_eq!(polys.len(), 2);
        assert_eq!(labels, vec![Some("Area".to_string()), None]);
    }

    #[test]
    fn test_malformed_tokens_skipped() {
        let body = "-78.64,35.77 garbage -78.60,abc -78.60,35.80,10 1.0 -78.58,35.75 ,";
        let points = parse_coordinates(body);
        assert_eq!(
            points,
            vec![
                LatLng::new(35.77, -78.64),
                LatLng::new(35.80, -78.60),
                LatLng::new(35.75, -78.58),
            ]
        );
    }

    #[test]
    fn test_non_finite_tokens_skipped() {
        let points = parse_coordinates("NaN,1.0 inf,2.0 1.0,2.0");
        assert_eq!(points, vec![LatLng::new(2.0, 1.0)]);
    }

    #[test]
    fn test_namespaced_tags() {
        let text = format!(
            "<kml:kml><kml:Placemark><kml:name><![CDATA[ Zone A ]]></kml:name>\
             <kml:coordinates>{}</kml:coordinates></kml:Placemark></kml:kml>",
            TRIANGLE
        );
        let (polys, labels) = polygons(parse_document(&text).unwrap());
        assert_eq!(polys.len(), 1);
        assert_eq!(labels[0].as_deref(), Some("Zone A"));
    }

    #[test]
    fn test_network_link_plain_href() {
        let text = kml(
            "<NetworkLink><name>Live</name><Link>\
             <href>https://example.com/area.kml?a=1&amp;b=2</href></Link></NetworkLink>",
        );
        assert_eq!(
            parse_document(&text).unwrap(),
            KmlDocument::NetworkLink("https://example.com/area.kml?a=1&b=2".into())
        );
    }

    #[test]
    fn test_network_link_cdata_href() {
        let text = kml(
            "<NetworkLink><Link><href><![CDATA[https://example.com/x.kml?a=1&b=2]]></href>\
             </Link></NetworkLink>",
        );
        assert_eq!(
            parse_document(&text).unwrap(),
            KmlDocument::NetworkLink("https://example.com/x.kml?a=1&b=2".into())
        );
    }

    #[test]
    fn test_network_link_control_is_not_a_link() {
        let text = kml("<NetworkLinkControl><minRefreshPeriod>60</minRefreshPeriod></NetworkLinkControl>");
        assert_eq!(parse_document(&text), Err(KmlError::NoGeometry));
    }

    #[test]
    fn test_polygons_win_over_network_link() {
        let text = kml(&format!(
            "<NetworkLink><Link><href>https://example.com/other.kml</href></Link></NetworkLink>\
             <Placemark><Polygon><coordinates>{}</coordinates></Polygon></Placemark>",
            TRIANGLE
        ));
        let (polys, _) = polygons(parse_document(&text).unwrap());
        assert_eq!(polys.len(), 1);
    }

    #[test]
    fn test_network_link_without_href() {
        let text = kml("<NetworkLink><Link><href>   </href></Link></NetworkLink>");
        assert_eq!(parse_document(&text), Err(KmlError::UnresolvableNetworkLink));
    }

    #[test]
    fn test_no_geometry_is_error() {
        let text = kml("<Placemark><name>Label only</name></Placemark>");
        assert_eq!(parse_document(&text), Err(KmlError::NoGeometry));
        assert_eq!(parse_document("  \n"), Err(KmlError::Empty));
    }

    #[test]
    fn test_block_count_matches_valid_blocks() {
        let text = kml(&format!(
            "<coordinates>{t}</coordinates><coordinates>1,2 3,4</coordinates>\
             <coordinates>{t}</coordinates><coordinates>x,y z,w q,r</coordinates>\
             <coordinates>{t}</coordinates>",
            t = TRIANGLE
        ));
        let (polys, labels) = polygons(parse_document(&text).unwrap());
        assert_eq!(polys.len(), 3);
        assert_eq!(labels, vec![None, None, None]);
    }
}
