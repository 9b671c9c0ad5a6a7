//! Answer normalization and puzzle answer checking
//!
//! Answers are compared as sets of significant words: both sides are
//! upper-cased, split on whitespace and punctuation, and words of two
//! characters or fewer are dropped.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;

/// Words this short (in characters) carry no meaning for matching
const MIN_TOKEN_CHARS: usize = 3;

lazy_static! {
    static ref TOKEN_SEPARATORS: Regex =
        Regex::new(r#"[\s+|()\[\].,:;"!?]+"#).expect("separator pattern is valid");
}

/// Split free text into its significant upper-cased tokens
pub fn normalize(text: &str) -> HashSet<String> {
    TOKEN_SEPARATORS
        .split(&text.to_uppercase())
        .filter(|word| word.chars().count() >= MIN_TOKEN_CHARS)
        .map(str::to_string)
        .collect()
}

/// A submission is correct when its token set is non-empty and equals the
/// token set of all accepted answers combined
pub fn is_correct<S: AsRef<str>>(submitted: &str, accepted: &[S]) -> bool {
    let submitted = normalize(submitted);
    if submitted.is_empty() {
        return false;
    }

    let accepted: HashSet<String> = accepted
        .iter()
        .flat_map(|answer| normalize(answer.as_ref()))
        .collect();

    submitted == accepted
}
