//! The internal-header denylist.
//!
//! Transport trace and vendor `X-*` headers leak infrastructure details and
//! tracking metadata, so they are removed wholesale. Gmail's `X-Gm*` headers
//! are the one carve-out: label and thread metadata worth keeping. Both
//! matches are case-insensitive *prefix* matches. The carve-out is
//! intentionally broad, see DESIGN.md.

use crate::model::header::HeaderField;

/// Header-name prefixes that are stripped from the output.
const STRIP_PREFIXES: &[&str] = &["received", "arc", "x-"];

/// Header-name prefixes exempted from stripping.
const KEEP_PREFIXES: &[&str] = &["x-gm"];

/// Whether a header name matches the denylist (and not the carve-out).
pub fn is_internal(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    if KEEP_PREFIXES.iter().any(|p| lower.starts_with(p)) {
        return false;
    }
    STRIP_PREFIXES.iter().any(|p| lower.starts_with(p))
}

/// Remove every denylisted header in place. Returns the number removed.
pub fn strip_internal_headers(headers: &mut Vec<HeaderField>) -> usize {
    let before = headers.len();
    headers.retain(|h| !is_internal(&h.name));
    before - headers.len()
}
