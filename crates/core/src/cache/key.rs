//! Cache key generation.

use url::Url;

use crate::http::Method;

/// Compute the cache key for a request: method and URL without fragment.
///
/// The host is already lowercased by the URL parser for http(s); the query
/// string is kept verbatim so `?v=2` busts a cached asset.
pub fn request_key(method: Method, url: &Url) -> String {
    let mut url = url.clone();
    url.set_fragment(None);
    format!("{method} {url}")
}
