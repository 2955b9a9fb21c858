//! Internal helpers for model validation and conversion.
//!
//! These utilities are **not** part of the public API. They centralize
//! validation and mapping logic so the engine enforces consistent invariants.

use chrono::NaiveDate;
use unicode_normalization::{UnicodeNormalization, char::is_combining_mark};
use uuid::Uuid;

use crate::{EngineError, ResultEngine};

/// Parse a UUID from storage and return a labeled error on failure.
pub(crate) fn parse_uuid(value: &str, label: &str) -> ResultEngine<Uuid> {
    Uuid::parse_str(value).map_err(|_| EngineError::InvalidId(format!("invalid {label} id")))
}

/// Normalize a name for matching: NFKD, strip combining marks, lowercase,
/// collapse internal whitespace.
///
/// This is the single normalization used for counterparty names and aliases
/// on both the stored and the lookup side, so matching is insensitive to
/// width, case, and accent spelling differences in statement text.
pub(crate) fn normalize_match_key(value: &str) -> String {
    let stripped: String = value
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Validate and echo back a `YYYY-MM` period key.
pub(crate) fn validate_year_month(value: &str) -> ResultEngine<String> {
    let valid = value.len() == 7
        && value.as_bytes()[4] == b'-'
        && NaiveDate::parse_from_str(&format!("{value}-01"), "%Y-%m-%d").is_ok();
    if !valid {
        return Err(EngineError::InvalidName(format!(
            "invalid year_month (expected YYYY-MM): {value}"
        )));
    }
    Ok(value.to_string())
}

/// The `YYYY-MM` period key a date falls into.
pub(crate) fn year_month_of(date: NaiveDate) -> String {
    date.format("%Y-%m").to_string()
}

pub(crate) fn normalize_required_name(value: &str, label: &str) -> ResultEngine<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(EngineError::InvalidName(format!(
            "{label} must not be empty"
        )));
    }
    Ok(trimmed.to_string())
}

pub(crate) fn normalize_optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_match_key_folds_width_case_and_spacing() {
        assert_eq!(normalize_match_key("  Supplier   X "), "supplier x");
        assert_eq!(normalize_match_key("ＡＣＭＥ Ｃｏ"), "acme co");
        assert_eq!(normalize_match_key("Café"), "cafe");
    }

    #[test]
    fn year_month_validation() {
        assert!(validate_year_month("2026-03").is_ok());
        assert!(validate_year_month("2026-13").is_err());
        assert!(validate_year_month("2026/03").is_err());
        assert!(validate_year_month("26-03").is_err());
    }

    #[test]
    fn year_month_of_formats_with_zero_padding() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 9).unwrap();
        assert_eq!(year_month_of(date), "2026-03");
    }
}
