//! Search query composition

use regex::Regex;
use std::collections::{BTreeSet, HashSet};
use std::sync::OnceLock;

use crate::schema::Schema;

fn year_pattern() -> &'static Regex {
    static YEAR: OnceLock<Regex> = OnceLock::new();
    YEAR.get_or_init(|| Regex::new(r"\b(?:19|20)\d{2}\b").expect("valid year pattern"))
}

/// Collapse whitespace and trim
pub fn normalize(query: &str) -> String {
    query.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// First four-digit year in `text`, if any
pub fn extract_year(text: &str) -> Option<String> {
    year_pattern().find(text).map(|m| m.as_str().to_string())
}

/// Remove every year from `text`
pub fn strip_years(text: &str) -> String {
    normalize(&year_pattern().replace_all(text, " "))
}

/// Query for one field of `topic`.
///
/// A year mentioned in the hint takes precedence over years in the topic,
/// so "Acme 2019" asking for "revenue 2023" searches "Acme revenue 2023".
pub fn compose(topic: &str, hint: &str) -> String {
    match extract_year(hint) {
        Some(year) => normalize(&format!(
            "{} {} {}",
            strip_years(topic),
            strip_years(hint),
            year
        )),
        None => normalize(&format!("{} {}", topic, hint)),
    }
}

/// Drop empty and case-insensitive duplicate queries, keeping first occurrences
pub fn dedupe(queries: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    queries
        .into_iter()
        .map(|q| normalize(&q))
        .filter(|q| !q.is_empty() && seen.insert(q.to_lowercase()))
        .collect()
}

/// One query per missing field, in schema order
pub fn follow_ups_for(topic: &str, schema: &Schema, missing: &BTreeSet<String>) -> Vec<String> {
    let queries = schema
        .fields
        .iter()
        .filter(|f| missing.contains(&f.name))
        .map(|f| compose(topic, &f.hint()));
    dedupe(queries)
}

/// Rephrasings tried once `query` itself has already run, in order
pub fn variants(query: &str) -> Vec<String> {
    let query = normalize(query);
    vec![
        format!("{} official site", query),
        format!("{} wikipedia", query),
    ]
}
