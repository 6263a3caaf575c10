// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Caller input validation.
//!
//! Everything here runs before the store is touched:
//! - Article id parsing
//! - Limit parsing and clamping
//! - Filter and search term extraction (percent-decoding, OR-term splitting)
//!
//! Terms produced here are always bound as query parameters, never spliced
//! into query text.

use std::num::IntErrorKind;
use thiserror::Error;
use tracing::debug;

/// Validation error types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Malformed article id: {0:?}")]
    MalformedId(String),

    #[error("Invalid limit: {0:?}")]
    InvalidLimit(String),

    #[error("Unable to decode the search string")]
    UndecodableSearch,

    #[error("Search string is empty")]
    EmptySearch,
}

/// Parse a caller-supplied article id.
pub fn parse_article_id(raw: &str) -> Result<i64, ValidationError> {
    match raw.trim().parse::<i64>() {
        Ok(id) if id >= 0 => Ok(id),
        _ => {
            debug!(id = %raw, "Rejecting malformed article id");
            Err(ValidationError::MalformedId(raw.to_string()))
        }
    }
}

/// Parse an optional limit parameter, falling back to `default` when absent.
///
/// Zero and non-numeric values are rejected; clamping happens separately so
/// that engine callers passing numbers get the same treatment.
pub fn parse_limit(raw: Option<&str>, default: u32) -> Result<u32, ValidationError> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(default);
    };
    match raw.parse::<u32>() {
        Ok(0) => Err(ValidationError::InvalidLimit(raw.to_string())),
        Ok(limit) => Ok(limit),
        // Too large to represent, but still a number: clamped later.
        Err(e) if *e.kind() == IntErrorKind::PosOverflow => Ok(u32::MAX),
        Err(_) => Err(ValidationError::InvalidLimit(raw.to_string())),
    }
}

/// Clamp a limit to the configured maximum. Zero is a caller error.
pub fn clamp_limit(limit: u32, max_limit: u32) -> Result<u32, ValidationError> {
    if limit == 0 {
        return Err(ValidationError::InvalidLimit(limit.to_string()));
    }
    Ok(limit.min(max_limit.max(1)))
}

/// Split a comma-separated filter into lower-cased OR terms.
pub fn filter_terms(filter: &str) -> Vec<String> {
    collect_terms(filter.split(','))
}

/// Decode a search string and split it on whitespace into OR terms.
///
/// Accepts `+` as an encoded space. A `%` that does not start a two-digit
/// hex escape, or an escape sequence that is not UTF-8, is undecodable.
pub fn search_terms(search: &str) -> Result<Vec<String>, ValidationError> {
    if !escapes_well_formed(search) {
        return Err(ValidationError::UndecodableSearch);
    }
    let spaced = search.replace('+', " ");
    let decoded =
        urlencoding::decode(&spaced).map_err(|_| ValidationError::UndecodableSearch)?;
    let terms = collect_terms(decoded.split_whitespace());
    if terms.is_empty() {
        return Err(ValidationError::EmptySearch);
    }
    Ok(terms)
}

/// Title keywords for single-message delivery; short keywords are ignored.
pub fn keyword_terms(keyword: &str) -> Vec<String> {
    if keyword.trim().chars().count() > 3 {
        collect_terms(keyword.split_whitespace())
    } else {
        Vec::new()
    }
}

fn collect_terms<'a>(parts: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();
    for part in parts {
        let term = part.trim().to_lowercase();
        if !term.is_empty() && !terms.contains(&term) {
            terms.push(term);
        }
    }
    terms
}

fn escapes_well_formed(s: &str) -> bool {
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let valid = bytes
                .get(i + 1..i + 3)
                .is_some_and(|hex| hex.iter().all(u8::is_ascii_hexdigit));
            if !valid {
                return false;
            }
            i += 3;
        } else {
            i += 1;
        }
    }
    true
}
