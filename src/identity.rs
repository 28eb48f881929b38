//! Canonical article identity.
//!
//! Every article is keyed by its canonical URL: `scheme://host[:port]/path`
//! with query, fragment and trailing slashes removed. Two links that differ
//! only in tracking parameters or a trailing slash therefore map to the same
//! key, which is what the dedup index relies on.

use crate::error::IdentityError;
use url::Url;

/// Canonicalize an absolute article URL into its dedup key.
///
/// The result is stable under re-application:
/// `normalize(&normalize(x)?)? == normalize(x)?`.
///
/// # Errors
///
/// Returns [`IdentityError`] for input that does not parse as an absolute URL
/// or that has no host.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(normalize(" https://example.org/a/?ref=x ")?, "https://example.org/a");
/// ```
pub fn normalize(raw: &str) -> Result<String, IdentityError> {
    let trimmed = raw.trim();
    let parsed = Url::parse(trimmed).map_err(|e| IdentityError {
        raw: raw.to_string(),
        reason: e.to_string(),
    })?;

    let host = parsed.host_str().ok_or_else(|| IdentityError {
        raw: raw.to_string(),
        reason: "no host".to_string(),
    })?;

    let authority = match parsed.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    };

    let canonical = format!("{}://{}{}", parsed.scheme(), authority, parsed.path());
    Ok(canonical.trim_end_matches('/').to_string())
}

/// Resolve a possibly root-relative link against the site origin.
///
/// Absolute links are returned unchanged (modulo URL serialization).
pub fn resolve(base: &Url, href: &str) -> Result<String, IdentityError> {
    base.join(href.trim())
        .map(|u| u.to_string())
        .map_err(|e| IdentityError {
            raw: href.to_string(),
            reason: e.to_string(),
        })
}
