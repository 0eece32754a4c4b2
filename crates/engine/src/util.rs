//! Internal helpers for input validation.
//!
//! These utilities are **not** part of the public API. They centralize
//! validation so every operation rejects malformed input the same way.

use crate::{EngineError, ResultEngine};

/// Reject non-positive ids before they reach the database.
pub(crate) fn validate_id(value: i64, label: &str) -> ResultEngine<i64> {
    if value <= 0 {
        return Err(EngineError::InvalidInput(format!(
            "invalid {label} id: {value}"
        )));
    }
    Ok(value)
}

pub(crate) fn validate_ids(values: &[i64], label: &str) -> ResultEngine<()> {
    for value in values {
        validate_id(*value, label)?;
    }
    Ok(())
}

pub(crate) fn normalize_required_text(value: &str, label: &str) -> ResultEngine<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(EngineError::InvalidInput(format!(
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

/// Accepts `#rgb` or `#rrggbb` hex colors.
pub(crate) fn validate_color(value: &str) -> ResultEngine<String> {
    let trimmed = value.trim();
    let valid = trimmed
        .strip_prefix('#')
        .is_some_and(|hex| matches!(hex.len(), 3 | 6) && hex.chars().all(|c| c.is_ascii_hexdigit()));
    if !valid {
        return Err(EngineError::InvalidInput(format!(
            "invalid color: {trimmed}"
        )));
    }
    Ok(trimmed.to_ascii_lowercase())
}
