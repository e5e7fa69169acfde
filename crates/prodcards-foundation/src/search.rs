//! Catalog search
//!
//! Two entry points over the resolved name column:
//!
//! - [`find_one`]: exact (case-insensitive) match on the whole query, then a
//!   synonym-expanded keyword pass returning the first hit in catalog order.
//! - [`find_many`]: category listing returning up to `limit` matches, in
//!   catalog order or as a random sample of the first [`RANDOM_WINDOW`].
//!
//! Keywords are matched as escaped literals, case-insensitively. A keyword
//! whose matcher cannot be built is logged and skipped; it never aborts the
//! search.

use crate::schema::{NameColumn, resolve_name_column};
use crate::synonyms;
use prodcards_kernel::{Catalog, Record};
use regex::{Regex, RegexBuilder};
use std::sync::Arc;
use tracing::{debug, warn};

/// Upper bound on any listing, whatever limit the caller asks for
pub const HARD_LIMIT: usize = 50;

/// Random listings sample from at most this many leading matches
pub const RANDOM_WINDOW: usize = 100;

/// Tokens of at most this many characters are noise words
pub const MIN_KEYWORD_CHARS: usize = 3;

/// How [`find_many`] picks records out of the matches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListingMode {
    /// First matches in catalog order
    #[default]
    InOrder,
    /// Uniform random sample of the first [`RANDOM_WINDOW`] matches
    Random,
}

/// Ordered keyword candidates for the keyword pass.
///
/// Each query token is followed by its synonym alternates; noise words
/// (fewer than [`MIN_KEYWORD_CHARS`] characters) are dropped.
pub fn keyword_candidates(query: &str) -> Vec<String> {
    query
        .to_lowercase()
        .split_whitespace()
        .flat_map(synonyms::expand)
        .filter(|kw| is_keyword(kw))
        .collect()
}

fn is_keyword(token: &str) -> bool {
    token.chars().count() >= MIN_KEYWORD_CHARS
}

fn keyword_matcher(keyword: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(&regex::escape(keyword))
        .case_insensitive(true)
        .build()
}

fn name_text(record: &Record, name_column: &NameColumn) -> String {
    record
        .value(name_column.index)
        .map(|v| v.to_string())
        .unwrap_or_default()
}

/// All records whose name contains `keyword`, or `None` if the matcher failed
fn keyword_matches<'a>(
    keyword: &str,
    catalog: &'a Catalog,
    name_column: &NameColumn,
) -> Option<Vec<&'a Record>> {
    let matcher = match keyword_matcher(keyword) {
        Ok(m) => m,
        Err(e) => {
            warn!("Search by keyword '{}' failed: {}", keyword, e);
            return None;
        }
    };

    Some(
        catalog
            .records()
            .iter()
            .filter(|r| {
                r.value(name_column.index)
                    .is_some_and(|v| !v.is_empty() && matcher.is_match(&v.to_string()))
            })
            .collect(),
    )
}

/// Find the single best record for a free-text query
pub fn find_one<'a>(
    query: &str,
    catalog: &'a Catalog,
    name_column: &NameColumn,
) -> Option<&'a Record> {
    let lowered = query.to_lowercase();
    if let Some(record) = catalog
        .records()
        .iter()
        .find(|r| name_text(r, name_column).to_lowercase() == lowered)
    {
        debug!("Exact match for '{}'", query);
        return Some(record);
    }

    for keyword in keyword_candidates(query) {
        let Some(matches) = keyword_matches(&keyword, catalog, name_column) else {
            continue;
        };
        if let Some(&first) = matches.first() {
            debug!(
                "Found {} products for keyword '{}', taking the first",
                matches.len(),
                keyword
            );
            return Some(first);
        }
    }

    None
}

/// Keywords used by a category listing.
///
/// If the query contains a synonym key anywhere, only that key's alternates
/// are used; otherwise the raw query tokens.
pub fn listing_keywords(query: &str) -> Vec<String> {
    match synonyms::category_in(query) {
        Some((_, alternates)) => alternates.iter().map(|a| a.to_string()).collect(),
        None => query
            .to_lowercase()
            .split_whitespace()
            .map(str::to_string)
            .collect(),
    }
}

/// List up to `limit` records for a category query
pub fn find_many<'a>(
    query: &str,
    catalog: &'a Catalog,
    name_column: &NameColumn,
    limit: usize,
    mode: ListingMode,
) -> Vec<&'a Record> {
    let limit = limit.min(HARD_LIMIT);
    if limit == 0 {
        return Vec::new();
    }

    for keyword in listing_keywords(query) {
        if !is_keyword(&keyword) {
            continue;
        }
        let Some(matches) = keyword_matches(&keyword, catalog, name_column) else {
            continue;
        };
        if matches.is_empty() {
            continue;
        }
        debug!(
            "Listing '{}': {} matches for keyword '{}'",
            query,
            matches.len(),
            keyword
        );
        return select(matches, limit, mode);
    }

    Vec::new()
}

fn select(mut matches: Vec<&Record>, limit: usize, mode: ListingMode) -> Vec<&Record> {
    match mode {
        ListingMode::InOrder => matches.into_iter().take(limit).collect(),
        ListingMode::Random => {
            matches.truncate(RANDOM_WINDOW);
            sample(matches, limit)
        }
    }
}

fn sample(items: Vec<&Record>, limit: usize) -> Vec<&Record> {
    let amount = limit.min(items.len());
    let mut rng = rand::thread_rng();
    rand::seq::index::sample(&mut rng, items.len(), amount)
        .into_iter()
        .map(|i| items[i])
        .collect()
}

/// Search engine bound to one catalog and its resolved name column
#[derive(Debug, Clone)]
pub struct SearchEngine {
    catalog: Arc<Catalog>,
    name_column: NameColumn,
}

impl SearchEngine {
    /// Resolve the name column once and keep it for the engine's lifetime
    pub fn new(catalog: Arc<Catalog>) -> Self {
        let name_column = resolve_name_column(&catalog);
        debug!(
            "Name column resolved to '{}' ({:?})",
            name_column.name, name_column.rule
        );
        Self {
            catalog,
            name_column,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn name_column(&self) -> &NameColumn {
        &self.name_column
    }

    /// Display name of a record
    pub fn name_of(&self, record: &Record) -> String {
        name_text(record, &self.name_column)
    }

    pub fn find_one(&self, query: &str) -> Option<&Record> {
        find_one(query, &self.catalog, &self.name_column)
    }

    pub fn find_many(&self, query: &str, limit: usize, mode: ListingMode) -> Vec<&Record> {
        find_many(query, &self.catalog, &self.name_column, limit, mode)
    }

    /// Uniform random sample of the whole catalog
    pub fn sample(&self, limit: usize) -> Vec<&Record> {
        sample(self.catalog.records().iter().collect(), limit.min(HARD_LIMIT))
    }

    /// First `limit` records in catalog order
    pub fn head(&self, limit: usize) -> &[Record] {
        self.catalog.head(limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Arc<Catalog> {
        Arc::new(
            Catalog::from_string_rows(
                vec!["id", "name", "price"],
                vec![
                    vec!["1", "Sony Speaker", "100"],
                    vec!["2", "Wireless Earbuds Pro", "59"],
                    vec!["3", "Lenovo Laptop X1", "1200"],
                    vec!["4", "Apple iPad Air", "700"],
                    vec!["5", "JBL Speaker Mini", "45"],
                    vec!["6", "Моя камера (c++) edition", "300"],
                ],
            )
            .unwrap(),
        )
    }

    fn names<'a>(engine: &SearchEngine, records: &[&'a Record]) -> Vec<String> {
        records.iter().map(|r| engine.name_of(r)).collect()
    }

    #[test]
    fn exact_match_is_case_insensitive() {
        let engine = SearchEngine::new(catalog());
        let hit = engine.find_one("SONY SPEAKER").unwrap();
        assert_eq!(engine.name_of(hit), "Sony Speaker");
    }

    #[test]
    fn synonym_expansion_finds_latin_names() {
        let engine = SearchEngine::new(catalog());
        let hit = engine.find_one("наушники").unwrap();
        assert_eq!(engine.name_of(hit), "Wireless Earbuds Pro");

        let hit = engine.find_one("планшет").unwrap();
        assert_eq!(engine.name_of(hit), "Apple iPad Air");
    }

    #[test]
    fn first_keyword_hit_wins_in_catalog_order() {
        let engine = SearchEngine::new(catalog());
        // "mini" is a keyword too, but "speaker" is tried first
        let hit = engine.find_one("speaker mini").unwrap();
        assert_eq!(engine.name_of(hit), "Sony Speaker");
    }

    #[test]
    fn short_tokens_are_noise() {
        let engine = SearchEngine::new(catalog());
        assert!(engine.find_one("я").is_none());
        assert!(engine.find_one("x1").is_none());
        assert_eq!(keyword_candidates("я и ты колонка"), vec!["колонка", "speaker"]);
    }

    #[test]
    fn regex_metacharacters_are_literal() {
        let engine = SearchEngine::new(catalog());
        let hit = engine.find_one("(c++)").unwrap();
        assert_eq!(engine.name_of(hit), "Моя камера (c++) edition");
        assert!(engine.find_one("s.ny").is_none());
    }

    #[test]
    fn miss_returns_none() {
        let engine = SearchEngine::new(catalog());
        assert!(engine.find_one("холодильник").is_none());
    }

    #[test]
    fn keyword_candidates_interleave_synonyms() {
        assert_eq!(
            keyword_candidates("Ноутбук Lenovo"),
            vec!["ноутбук", "laptop", "notebook", "lenovo"]
        );
    }

    #[test]
    fn find_many_prefers_category_alternates() {
        let engine = SearchEngine::new(catalog());
        let found = engine.find_many("покажи колонка", 10, ListingMode::InOrder);
        assert_eq!(names(&engine, &found), vec!["Sony Speaker", "JBL Speaker Mini"]);
    }

    #[test]
    fn find_many_falls_back_to_raw_tokens() {
        let engine = SearchEngine::new(catalog());
        let found = engine.find_many("apple", 10, ListingMode::InOrder);
        assert_eq!(names(&engine, &found), vec!["Apple iPad Air"]);
        assert!(engine.find_many("zzz", 10, ListingMode::InOrder).is_empty());
    }

    #[test]
    fn find_many_respects_limit_and_hard_cap() {
        let engine = speakers(80);

        assert_eq!(engine.find_many("speaker", 7, ListingMode::InOrder).len(), 7);
        assert_eq!(engine.find_many("speaker", 500, ListingMode::InOrder).len(), HARD_LIMIT);
        assert_eq!(engine.find_many("speaker", 500, ListingMode::Random).len(), HARD_LIMIT);
        assert_eq!(engine.sample(500).len(), HARD_LIMIT);
    }

    #[test]
    fn random_listing_samples_distinct_matches() {
        let engine = SearchEngine::new(catalog());
        let found = engine.find_many("колонка", 5, ListingMode::Random);
        let mut got = names(&engine, &found);
        got.sort();
        assert_eq!(got, vec!["JBL Speaker Mini", "Sony Speaker"]);
    }

    fn speakers(count: usize) -> SearchEngine {
        let rows: Vec<Vec<String>> = (0..count)
            .map(|i| vec![format!("Speaker {}", i)])
            .collect();
        SearchEngine::new(Arc::new(
            Catalog::from_string_rows(vec!["name"], rows).unwrap(),
        ))
    }

    #[test]
    fn random_listing_stays_within_leading_matches() {
        let engine = speakers(150);
        for _ in 0..200 {
            let found = engine.find_many("колонка", 10, ListingMode::Random);
            assert_eq!(found.len(), 10);
            for record in found {
                let name = engine.name_of(record);
                let n: usize = name["Speaker ".len()..].parse().unwrap();
                assert!(n < RANDOM_WINDOW, "{} is past the leading matches", name);
            }
        }
    }

    #[test]
    fn catalog_sample_covers_every_record() {
        let engine = speakers(150);
        let beyond_window = (0..200)
            .flat_map(|_| engine.sample(10))
            .any(|r| {
                let name = engine.name_of(r);
                name["Speaker ".len()..].parse::<usize>().unwrap() >= RANDOM_WINDOW
            });
        assert!(beyond_window);
    }

    #[test]
    fn keyword_with_unbuildable_matcher_is_skipped() {
        let engine = SearchEngine::new(catalog());
        // Over the default compiled-size limit of the regex crate
        let oversized = "7".repeat(1_000_000);
        assert!(keyword_matches(&oversized, engine.catalog(), engine.name_column()).is_none());

        let query = format!("{} speaker", oversized);
        let hit = engine.find_one(&query).unwrap();
        assert_eq!(engine.name_of(hit), "Sony Speaker");

        let found = engine.find_many(&query, 10, ListingMode::InOrder);
        assert_eq!(names(&engine, &found), vec!["Sony Speaker", "JBL Speaker Mini"]);
    }
}
