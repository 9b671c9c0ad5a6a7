//! Phone number check against the +7 numbering plan (Russia and Kazakhstan)

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // Optional trunk/country prefix, then a ten digit national number
    // starting with a geographic (3, 4, 8), mobile (9) or Kazakh (7) code
    static ref RU_NATIONAL_NUMBER: Regex =
        Regex::new(r"^(?:\+?7|8)?([34789]\d{9})$").expect("phone pattern is valid");
}

/// Validate a phone number and return it in E.164 form (`+7XXXXXXXXXX`)
pub fn normalize_ru(raw: &str) -> Option<String> {
    let compact: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')' | '\u{a0}'))
        .collect();

    RU_NATIONAL_NUMBER
        .captures(&compact)
        .and_then(|caps| caps.get(1))
        .map(|national| format!("+7{}", national.as_str()))
}

pub fn is_valid_ru(raw: &str) -> bool {
    normalize_ru(raw).is_some()
}
