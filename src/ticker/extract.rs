//! Ticker extraction from free-text answers
//!
//! Search answers are prose ("The stock ticker symbol for ABB Group in the US
//! OTC market is ABBNY."), so the ticker is picked out with an ordered set of
//! shape patterns. Candidates that merely echo a word of the company's own name
//! are discarded, and the longest survivor wins.

use once_cell::sync::Lazy;
use regex::Regex;

/// Longest string accepted as a ticker
pub const MAX_TICKER_LEN: usize = 10;

/// Answers meaning "this company has no listing"
const NULL_ANSWERS: [&str; 4] = ["null", "none", "-", "n/a"];

/// Candidate shapes, most specific first
static CANDIDATE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        // ADR: 4-6 letters ending in Y
        r"\b[A-Z]{3,5}Y\b",
        // Foreign ordinary: 2-6 letters ending in F
        r"\b[A-Z]{1,5}F\b",
        // 4-6 letters, optional share-class suffix
        r"\b[A-Z]{4,6}(?:\.[A-Z]{1,2})?\b",
        // Letters followed by digits, optional suffix
        r"\b[A-Z]{1,4}\d{1,2}(?:\.[A-Z]{1,2})?\b",
        // Plain 1-5 letters; last, it also matches ordinary capitalised words
        r"\b[A-Z]{1,5}\b",
    ])
});

/// Accepted ticker shapes
static TICKER_SHAPES: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"^[A-Z]{1,5}$",
        r"^[A-Z]{4,5}Y$",
        r"^[A-Z]{2,6}F$",
        r"^[A-Z]{4,6}(\.[A-Z]{1,2})?$",
        r"^[A-Z]{1,4}\d{1,2}(\.[A-Z]{1,2})?$",
    ])
});

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|pattern| Regex::new(pattern).expect("ticker pattern is valid"))
        .collect()
}

/// Returns true if `candidate` is shaped like a US-traded ticker
///
/// Purely syntactic: nothing checks that the symbol actually trades.
pub fn is_valid_ticker(candidate: &str) -> bool {
    !candidate.is_empty()
        && candidate.len() <= MAX_TICKER_LEN
        && TICKER_SHAPES.iter().any(|shape| shape.is_match(candidate))
}

/// Returns true if the answer explicitly says there is no ticker
pub fn is_null_answer(content: &str) -> bool {
    let answer = content.trim().trim_end_matches('.').trim();
    NULL_ANSWERS
        .iter()
        .any(|null| answer.eq_ignore_ascii_case(null))
}

/// Strips the punctuation that trips up search queries ("Apple Inc." -> "Apple Inc")
pub fn normalize_company_name(name: &str) -> String {
    name.replace(['.', ','], "")
}

/// Picks the most plausible ticker out of a free-text answer
///
/// Falls back to the answer's first whitespace-delimited token when no pattern
/// survives filtering; the result still needs [`is_valid_ticker`].
pub fn extract_ticker(content: &str, company_name: &str) -> Option<String> {
    let name_words: Vec<String> = company_name
        .split_whitespace()
        .map(|word| {
            word.trim_matches(|c: char| !c.is_alphanumeric())
                .to_uppercase()
        })
        .filter(|word| !word.is_empty())
        .collect();

    let mut best: Option<&str> = None;
    for pattern in CANDIDATE_PATTERNS.iter() {
        for found in pattern.find_iter(content) {
            let candidate = found.as_str();
            if name_words.iter().any(|word| word == candidate) {
                continue;
            }
            // Strictly longer only, so the first candidate found wins ties
            if best.map_or(true, |current| candidate.len() > current.len()) {
                best = Some(candidate);
            }
        }
    }

    best.or_else(|| content.split_whitespace().next())
        .map(str::to_string)
}
