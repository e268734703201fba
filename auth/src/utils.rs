//! Utility functions for the sign-in flow.

use base64::Engine;

/// Generate a random 256-bit token, base64url-encoded without padding.
///
/// Used for CSRF tokens and OAuth state parameters.
///
/// # Examples
///
/// ```
/// use portal_auth::utils::generate_token;
///
/// let token = generate_token();
/// assert_eq!(token.len(), 43);
/// assert_ne!(token, generate_token());
/// ```
#[must_use]
pub fn generate_token() -> String {
    let bytes: [u8; 32] = rand::random();
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Compare two secret tokens in constant time.
///
/// Empty tokens never match.
///
/// # Examples
///
/// ```
/// use portal_auth::utils::tokens_match;
///
/// assert!(tokens_match("abc", "abc"));
/// assert!(!tokens_match("abc", "abd"));
/// assert!(!tokens_match("", ""));
/// ```
#[must_use]
pub fn tokens_match(expected: &str, provided: &str) -> bool {
    !expected.is_empty() && constant_time_eq::constant_time_eq(expected.as_bytes(), provided.as_bytes())
}
