//! Normalization and comparison primitives for lookup fields.
//!
//! Provides pure functions for the comparisons the resolver is built on:
//! - Code normalization (trim + case fold)
//! - Identifier scheme-prefix stripping
//! - Registry-key parsing
//!
//! Malformed input never produces an error here; a value that cannot be
//! parsed simply fails to match.

use uuid::Uuid;

/// URN-style wrappers stripped from identifiers before comparison.
const SCHEME_PREFIXES: &[&str] = &["urn:uuid:", "urn:lsid:"];

/// Normalize a code for comparison: trim and uppercase.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

/// Case-insensitive, trimmed code equality.
///
/// Empty codes never match anything, including each other.
pub fn codes_equal(a: &str, b: &str) -> bool {
    let a = normalize_code(a);
    let b = normalize_code(b);
    !a.is_empty() && a == b
}

/// Strip a known scheme prefix from an identifier, if present.
pub fn strip_scheme(identifier: &str) -> &str {
    let trimmed = identifier.trim();
    for prefix in SCHEME_PREFIXES {
        match trimmed.get(..prefix.len()) {
            Some(head) if head.eq_ignore_ascii_case(prefix) => return &trimmed[prefix.len()..],
            _ => {}
        }
    }
    trimmed
}

/// Normalize an identifier for comparison: strip scheme, trim, lowercase.
pub fn normalize_identifier(identifier: &str) -> String {
    strip_scheme(identifier).to_lowercase()
}

/// Scheme-prefix-stripped, case-insensitive identifier equality.
pub fn identifiers_equal(a: &str, b: &str) -> bool {
    let a = normalize_identifier(a);
    let b = normalize_identifier(b);
    !a.is_empty() && a == b
}

/// Parse an identifier as a registry key, tolerating a scheme wrapper.
///
/// Returns `None` for anything that is not a UUID; unparseable keys are a
/// non-match, not an error.
pub fn parse_key(identifier: &str) -> Option<Uuid> {
    Uuid::parse_str(strip_scheme(identifier)).ok()
}

/// Case-insensitive ISO country code equality.
pub fn countries_equal(a: &str, b: &str) -> bool {
    let a = a.trim();
    let b = b.trim();
    !a.is_empty() && a.eq_ignore_ascii_case(b)
}
