//! Shared-token authentication for both endpoints.

const BEARER_PREFIX: &str = "Bearer ";

/// Compares two tokens without short-circuiting on the first differing byte.
///
/// Only the length is allowed to leak.
pub fn tokens_equal(provided: &str, expected: &str) -> bool {
    let (a, b) = (provided.as_bytes(), expected.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    let diff = a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y));
    diff == 0
}

/// Checks a token against the configured one.
///
/// An empty configured token disables authentication. Otherwise the provided
/// token must be non-empty and equal.
pub fn is_authorized(configured: &str, provided: Option<&str>) -> bool {
    if configured.is_empty() {
        return true;
    }
    match provided {
        Some(token) if !token.is_empty() => tokens_equal(token, configured),
        _ => false,
    }
}

/// Extracts the token of an `Authorization: Bearer <token>` header value.
///
/// The scheme must be exactly `Bearer ` (case-sensitive, single space).
pub fn bearer_token(header: &str) -> Option<&str> {
    header.strip_prefix(BEARER_PREFIX)
}
