//! Interception scope.
//!
//! Only same-origin requests and requests to a short list of trusted asset
//! hosts are handled by the strategies. Everything else passes through to
//! the network untouched: never cached, never queued.

use url::{Origin, Url};

/// The origin a worker controls plus its external allow-list.
#[derive(Debug, Clone)]
pub struct Scope {
    origin: Url,
    allowed_hosts: Vec<String>,
}

impl Scope {
    pub fn new(origin: Url, allowed_hosts: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let allowed_hosts = allowed_hosts
            .into_iter()
            .map(|h| {
                let h: String = h.into();
                h.trim().trim_end_matches('.').to_ascii_lowercase()
            })
            .filter(|h| !h.is_empty())
            .collect();
        Self { origin, allowed_hosts }
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    pub fn is_same_origin(&self, url: &Url) -> bool {
        let origin: Origin = self.origin.origin();
        url.origin() == origin
    }

    /// A host is allowed if it equals an entry or is a subdomain of one.
    pub fn is_allowed_external(&self, url: &Url) -> bool {
        let Some(host) = url.host_str() else {
            return false;
        };
        let host = host.to_ascii_lowercase();
        self.allowed_hosts
            .iter()
            .any(|allowed| host == *allowed || host.ends_with(&format!(".{allowed}")))
    }

    /// Whether the request may be cached or queued.
    pub fn admits(&self, url: &Url) -> bool {
        matches!(url.scheme(), "http" | "https") && (self.is_same_origin(url) || self.is_allowed_external(url))
    }
}
