//! Marker tables for promotional and external-attribution content. Plain
//! substring matching over lowercased text — the markers are short tokens,
//! not patterns.

/// Caption/label fragments that identify paid or injected content.
const PROMOTIONAL_MARKERS: &[&str] = &[
    "#ad",
    "#pr",
    "#sponsored",
    "sponsored",
    "paid partnership",
    "promotion",
];

/// Fragments that credit the content to someone other than the owner.
const ATTRIBUTION_MARKERS: &[&str] = &["repost", "regram", "via @", "credit:", "photo by"];

pub fn is_promotional(text: &str) -> bool {
    let lower = text.to_lowercase();
    PROMOTIONAL_MARKERS.iter().any(|m| lower.contains(m))
}

pub fn has_external_attribution(text: &str) -> bool {
    let lower = text.to_lowercase();
    ATTRIBUTION_MARKERS.iter().any(|m| lower.contains(m))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_promotional_markers() {
        assert!(is_promotional("New drop! #AD"));
        assert!(is_promotional("Paid Partnership with examplebrand"));
        assert!(!is_promotional("a day at the beach"));
    }

    #[test]
    fn test_attribution_markers() {
        assert!(has_external_attribution("Repost from @someone_else"));
        assert!(has_external_attribution("photo by alex"));
        assert!(!has_external_attribution("my own shot"));
    }
}
