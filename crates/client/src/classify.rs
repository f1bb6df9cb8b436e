//! Request classification.
//!
//! Maps a GET request to the category that picks its caching strategy.
//! Pure: the result depends only on method, URL and headers.

use std::fmt;

use tether_core::{Method, Request};

const STATIC_EXTENSIONS: &[&str] = &["css", "js", "woff", "woff2", "ttf", "eot"];
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "svg", "ico"];
const MARKUP_TYPES: &[&str] = &["text/html", "application/xhtml+xml"];
const API_PREFIXES: &[&str] = &["/api/", "/form/"];

/// Strategy category of an intercepted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Document,
    StaticAsset,
    Image,
    Api,
    Generic,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Category::Document => "document",
            Category::StaticAsset => "static-asset",
            Category::Image => "image",
            Category::Api => "api",
            Category::Generic => "generic",
        };
        f.write_str(name)
    }
}

/// Classify a request; first matching rule wins.
///
/// Non-GET requests never reach a cache strategy (the worker routes them
/// before classification); if one is passed here it lands in `Api` when it
/// targets an API path and `Generic` otherwise, so it is never served from
/// the app shell or image cache.
pub fn classify(request: &Request) -> Category {
    let accept = request.accept().map(str::to_ascii_lowercase).unwrap_or_default();
    let path = request.url.path();
    let extension = extension(path);

    if request.method == Method::Get {
        if MARKUP_TYPES.iter().any(|t| accept.contains(t)) {
            return Category::Document;
        }
        if extension.as_deref().is_some_and(|ext| STATIC_EXTENSIONS.contains(&ext)) {
            return Category::StaticAsset;
        }
        if accept.contains("image/") || extension.as_deref().is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext)) {
            return Category::Image;
        }
    }

    if API_PREFIXES.iter().any(|p| path.starts_with(p)) || accept.contains("application/json") {
        return Category::Api;
    }

    Category::Generic
}

/// Lowercased extension of the last path segment.
fn extension(path: &str) -> Option<String> {
    let segment = path.rsplit('/').next()?;
    let (stem, ext) = segment.rsplit_once('.')?;
    if stem.is_empty() && ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}
