//! Static bilingual synonym index
//!
//! Maps a canonical (Cyrillic) category token to the Latin surface forms used
//! in product names. Only the canonical side is a key.

/// Canonical category token -> alternates, in declared order
pub const SYNONYMS: &[(&str, &[&str])] = &[
    ("ноутбук", &["laptop", "notebook"]),
    ("наушники", &["headphone", "earphone", "earbud"]),
    ("колонка", &["speaker"]),
    ("телефон", &["phone", "smartphone"]),
    ("камера", &["camera"]),
    ("планшет", &["tablet", "ipad"]),
];

/// Alternates for a canonical token (case-insensitive key lookup)
pub fn alternates(token: &str) -> Option<&'static [&'static str]> {
    let lowered = token.to_lowercase();
    SYNONYMS
        .iter()
        .find(|(key, _)| *key == lowered)
        .map(|(_, alts)| *alts)
}

/// The key plus its alternates for a known token, otherwise the token alone
pub fn expand(token: &str) -> Vec<String> {
    let lowered = token.to_lowercase();
    match alternates(&lowered) {
        Some(alts) => std::iter::once(lowered)
            .chain(alts.iter().map(|a| a.to_string()))
            .collect(),
        None => vec![token.to_string()],
    }
}

/// First category key (in declared order) contained anywhere in the query
pub fn category_in(query: &str) -> Option<(&'static str, &'static [&'static str])> {
    let lowered = query.to_lowercase();
    SYNONYMS
        .iter()
        .find(|(key, _)| lowered.contains(key))
        .copied()
}
