//! Generated responses for when neither network nor cache can answer.

use tether_core::Response;

const OFFLINE_HTML: &str = "<!DOCTYPE html>\
<html lang=\"en\"><head><meta charset=\"utf-8\"><title>Offline</title></head>\
<body><h1>Offline</h1><p>This page is not available offline. Check your connection and try again.</p></body></html>";

const IMAGE_SVG: &str = "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"300\" height=\"200\" viewBox=\"0 0 300 200\">\
<rect width=\"300\" height=\"200\" fill=\"#f3f4f6\"/>\
<text x=\"50%\" y=\"50%\" text-anchor=\"middle\" dominant-baseline=\"middle\" fill=\"#9ca3af\" \
font-family=\"sans-serif\" font-size=\"14\">Image unavailable</text></svg>";

/// Minimal offline document, served with status 200.
pub fn offline_page() -> Response {
    Response::new(200, OFFLINE_HTML).with_header("content-type", "text/html; charset=utf-8")
}

/// Neutral 300x200 image stand-in.
pub fn image() -> Response {
    Response::new(200, IMAGE_SVG)
        .with_header("content-type", "image/svg+xml")
        .with_header("cache-control", "no-store")
}

/// Acknowledgement for a write captured into the pending queue.
pub fn queued(id: i64) -> Response {
    let body = serde_json::json!({ "queued": true, "id": id }).to_string();
    Response::new(202, body).with_header("content-type", "application/json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offline_page_is_html_200() {
        let resp = offline_page();
        assert_eq!(resp.status, 200);
        assert!(resp.content_type().unwrap().starts_with("text/html"));
        assert!(String::from_utf8_lossy(&resp.body).contains("<h1>Offline</h1>"));
    }

    #[test]
    fn test_image_placeholder_is_svg() {
        let resp = image();
        assert_eq!(resp.status, 200);
        assert_eq!(resp.content_type(), Some("image/svg+xml"));
        assert!(resp.body.starts_with(b"<svg"));
    }

    #[test]
    fn test_queued_body() {
        let resp = queued(7);
        assert_eq!(resp.status, 202);
        let value: serde_json::Value = serde_json::from_slice(&resp.body).unwrap();
        assert_eq!(value["queued"], true);
        assert_eq!(value["id"], 7);
    }
}
