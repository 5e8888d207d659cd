//! ZIP code extraction and normalization.

use hashbrown::HashSet;
use regex::Regex;
use std::sync::LazyLock;

/// Five digits, optionally followed by a ZIP+4 extension, not embedded in a
/// longer run of word characters.
static ZIP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{5})(?:-\d{4})?\b").expect("zip pattern"));

/// Pull every ZIP code out of free text (CSV cells, pasted lists, addresses).
///
/// Extensions are dropped and duplicates removed, keeping first-seen order.
pub fn extract_codes(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    scan_codes(text)
        .into_iter()
        .filter(|code| seen.insert(code.clone()))
        .collect()
}

/// Every code occurrence in order, repeats included, extensions dropped
pub(crate) fn scan_codes(text: &str) -> Vec<String> {
    ZIP_RE
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Candidate codes after cleanup
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedCodes {
    /// Unique well-formed codes in first-seen order
    pub codes: Vec<String>,
    /// Inputs that repeated an earlier code
    pub duplicates: usize,
    /// Inputs that are not a five digit code, as given
    pub invalid: Vec<String>,
}

/// Trim, cut to five characters, keep only five digit codes, de-duplicate.
pub fn normalize_codes<S: AsRef<str>>(candidates: &[S]) -> NormalizedCodes {
    let mut seen = HashSet::new();
    let mut out = NormalizedCodes::default();

    for raw in candidates {
        let raw = raw.as_ref();
        let code: String = raw.trim().chars().take(5).collect();

        if code.len() != 5 || !code.bytes().all(|b| b.is_ascii_digit()) {
            out.invalid.push(raw.to_string());
            continue;
        }

        if seen.insert(code.clone()) {
            out.codes.push(code);
        } else {
            out.duplicates += 1;
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_strips_extension_and_dedupes() {
        let input = ["27601", "00000-0000", "27601"].join("\n");
        assert_eq!(extract_codes(&input), vec!["27601", "00000"]);
    }

    #[test]
    fn test_extract_from_messy_text() {
        let text = "zip,city\n27601,Raleigh\n27513-2210,Cary\n\"27601\",Raleigh\nphone 9195551234, ref 123456";
        assert_eq!(extract_codes(text), vec!["27601", "27513"]);
    }

    #[test]
    fn test_extract_keeps_first_seen_order() {
        assert_eq!(
            extract_codes("90210 10001 90210 60601"),
            vec!["90210", "10001", "60601"]
        );
        assert!(extract_codes("no codes here 1234").is_empty());
    }

    #[test]
    fn test_scan_keeps_repeats() {
        assert_eq!(
            scan_codes("27601\n27601\n00000-0000\n27601-1234"),
            vec!["27601", "27601", "00000", "27601"]
        );
    }

    #[test]
    fn test_normalize_codes() {
        let norm = normalize_codes(&[" 27601 ", "27601-1234", "2760", "abcde", "27513", "27513"]);
        assert_eq!(norm.codes, vec!["27601", "27513"]);
        assert_eq!(norm.duplicates, 2);
        assert_eq!(norm.invalid, vec!["2760", "abcde"]);
    }
}
