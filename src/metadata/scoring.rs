//! Confidence scoring for search candidates.
//!
//! Confidence is a weighted average of normalized-title similarity and
//! release-year proximity:
//!
//! ```text
//! confidence = 0.7 * title_similarity + 0.3 * year_match
//! ```
//!
//! With these weights an exact title and year score 1.0, an exact title with
//! no query year scores 0.91, and a title sharing nothing with the query can
//! reach at most 0.3 even with a perfect year.
//!
//! Everything here is pure and synchronous; providers' network calls happen
//! before scoring, never during.

use std::cmp::Ordering;

use chrono::NaiveDate;

use super::normalize::normalize;
use super::types::{ScoredSearchResult, SearchResult};

/// Share of the confidence contributed by title similarity.
pub const TITLE_WEIGHT: f64 = 0.7;

/// Share of the confidence contributed by year proximity.
pub const YEAR_WEIGHT: f64 = 0.3;

/// Year score used when either side has no year.
pub const UNKNOWN_YEAR_SCORE: f64 = 0.7;

/// Classic Levenshtein edit distance over Unicode scalar values.
///
/// ```
/// use reelmatch::metadata::scoring::levenshtein_distance;
///
/// assert_eq!(levenshtein_distance("matrix", "matrix"), 0);
/// assert_eq!(levenshtein_distance("abc", "xyz"), 3);
/// assert_eq!(levenshtein_distance("", "dune"), 4);
/// ```
pub fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0usize; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != cb);
            let insertion = current[j] + 1;
            let deletion = previous[j + 1] + 1;
            current[j + 1] = substitution.min(insertion).min(deletion);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[b.len()]
}

/// Similarity of two titles in `[0.0, 1.0]` after [`normalize`]-ing both.
///
/// Returns 0.0 when either normalized title is empty.
pub fn string_similarity(a: &str, b: &str) -> f64 {
    let a = normalize(a);
    let b = normalize(b);
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }

    let longest = a.chars().count().max(b.chars().count());
    let distance = levenshtein_distance(&a, &b);
    1.0 - distance as f64 / longest as f64
}

/// Pull a year out of an ISO date (`1999-03-31`) or a bare year (`1999`).
///
/// Anything else, including malformed dates, yields `None`.
pub fn extract_year(date_or_year: &str) -> Option<i32> {
    let s = date_or_year.trim();
    if s.len() == 4 && s.bytes().all(|b| b.is_ascii_digit()) {
        return s.parse().ok();
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .map(|date| chrono::Datelike::year(&date))
}

/// Score how well two years agree.
///
/// | difference | score |
/// |---|---|
/// | 0 | 1.0 |
/// | 1 | 0.8 |
/// | 2 | 0.5 |
/// | more | 0.0 |
/// | either unknown | 0.7 |
pub fn year_match_score(a: Option<i32>, b: Option<i32>) -> f64 {
    match (a, b) {
        (Some(a), Some(b)) => match a.abs_diff(b) {
            0 => 1.0,
            1 => 0.8,
            2 => 0.5,
            _ => 0.0,
        },
        _ => UNKNOWN_YEAR_SCORE,
    }
}

/// Confidence that a candidate is the title the query describes.
///
/// `candidate_date` may be a full release date or a bare year.
pub fn calculate_confidence(
    query_title: &str,
    query_year: Option<i32>,
    candidate_title: &str,
    candidate_date: Option<&str>,
) -> f64 {
    let title = string_similarity(query_title, candidate_title);
    let year = year_match_score(query_year, candidate_date.and_then(extract_year));
    (TITLE_WEIGHT * title + YEAR_WEIGHT * year).clamp(0.0, 1.0)
}

/// Best of the candidate's display and original titles.
fn result_confidence(query_title: &str, query_year: Option<i32>, result: &SearchResult) -> f64 {
    let date = result.date_or_year();
    let primary = calculate_confidence(query_title, query_year, &result.title, date.as_deref());
    match result.original_title.as_deref() {
        Some(original) if original != result.title => primary.max(calculate_confidence(
            query_title,
            query_year,
            original,
            date.as_deref(),
        )),
        _ => primary,
    }
}

/// Attach a confidence to every result and sort best-first.
///
/// Ties on confidence are broken by provider popularity (higher first,
/// missing popularity last); remaining ties keep their input order.
pub fn score_search_results(
    query_title: &str,
    query_year: Option<i32>,
    results: Vec<SearchResult>,
) -> Vec<ScoredSearchResult> {
    let mut scored: Vec<ScoredSearchResult> = results
        .into_iter()
        .map(|result| ScoredSearchResult {
            confidence: result_confidence(query_title, query_year, &result),
            result,
        })
        .collect();

    scored.sort_by(compare_scored);
    scored
}

fn compare_scored(a: &ScoredSearchResult, b: &ScoredSearchResult) -> Ordering {
    b.confidence.total_cmp(&a.confidence).then_with(|| {
        let pa = a.result.popularity.unwrap_or(f64::NEG_INFINITY);
        let pb = b.result.popularity.unwrap_or(f64::NEG_INFINITY);
        pb.total_cmp(&pa)
    })
}

/// The top-scored result, if it reaches `threshold`.
///
/// The threshold is per call so auto-matching and suggestion lists can use
/// different bars.
pub fn find_best_match(
    query_title: &str,
    query_year: Option<i32>,
    results: Vec<SearchResult>,
    threshold: f64,
) -> Option<ScoredSearchResult> {
    score_search_results(query_title, query_year, results)
        .into_iter()
        .next()
        .filter(|best| best.confidence >= threshold)
}
