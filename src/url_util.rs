//! URL normalization and host-scope checks.
//!
//! Every discovered `href`/`src` is resolved against the referring page,
//! its fragment is dropped, and only URLs that land on the same host are
//! kept in scope.

use url::Url;

/// Resolves `raw` against `base`, drops any fragment, and returns `None` if
/// `raw` doesn't parse as a URL (absolute or base-relative) at all.
pub fn normalize(base: &Url, raw: &str) -> Option<Url> {
    let mut resolved = base.join(raw).ok()?;
    resolved.set_fragment(None);
    Some(resolved)
}

/// True if `url` shares `base`'s host. Scheme and port are intentionally
/// ignored: `resolveLinksAndAssets` only ever compares `Host`.
pub fn in_scope(url: &Url, base: &Url) -> bool {
    url.host_str().is_some() && url.host_str() == base.host_str()
}
