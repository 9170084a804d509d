//! The persisted snapshot of one inbound request.

use std::borrow::Cow;
use std::net::SocketAddr;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::http::{request::Parts, HeaderMap, HeaderName, HeaderValue};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use uuid::Uuid;

/// Prefix of every capture id.
pub const ID_PREFIX: &str = "request-";

/// Generate a fresh capture id.
///
/// Ids are UUIDv7, which sort by creation time within one process, so
/// listing a store by id yields receipt order.
pub fn new_capture_id() -> String {
    format!("{ID_PREFIX}{}", Uuid::now_v7().simple())
}

/// Seconds since the Unix epoch.
pub fn unix_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// One header line. Values are kept as raw bytes since HTTP does not
/// require them to be UTF-8.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderEntry {
    pub name: String,
    pub value: Vec<u8>,
}

/// An inbound request as it was received.
///
/// The body is drained once at receipt and kept as an immutable buffer.
/// A stored capture is never modified; the `with_*` methods return copies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capture {
    id: String,
    received_at_seconds: u64,
    method: String,
    uri: String,
    path: String,
    query: Vec<(String, String)>,
    version: String,
    headers: Vec<HeaderEntry>,
    remote_addr: Option<String>,
    body: Vec<u8>,
}

impl Capture {
    /// A capture with a fresh id and the current time, mostly useful in tests.
    pub fn new(method: impl Into<String>, uri: &str, body: impl Into<Vec<u8>>) -> Self {
        let (path, query) = split_uri(uri);
        Self {
            id: new_capture_id(),
            received_at_seconds: unix_seconds(),
            method: method.into(),
            uri: uri.to_string(),
            path,
            query,
            version: "HTTP/1.1".to_string(),
            headers: Vec::new(),
            remote_addr: None,
            body: body.into(),
        }
    }

    /// Snapshot a request from its head and fully drained body.
    pub fn from_request(parts: &Parts, body: impl Into<Vec<u8>>, remote_addr: Option<SocketAddr>) -> Self {
        let uri = parts.uri.to_string();
        let (path, query) = split_uri(&uri);
        let headers = parts
            .headers
            .iter()
            .map(|(name, value)| HeaderEntry {
                name: name.as_str().to_string(),
                value: value.as_bytes().to_vec(),
            })
            .collect();

        Self {
            id: new_capture_id(),
            received_at_seconds: unix_seconds(),
            method: parts.method.as_str().to_string(),
            uri,
            path,
            query,
            version: format!("{:?}", parts.version),
            headers,
            remote_addr: remote_addr.map(|a| a.to_string()),
            body: body.into(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn received_at_seconds(&self) -> u64 {
        self.received_at_seconds
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    /// Request target as sent, including the query string.
    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Decoded query parameters in their original order.
    pub fn query_params(&self) -> &[(String, String)] {
        &self.query
    }

    /// First value of query parameter `name`.
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn remote_addr(&self) -> Option<&str> {
        self.remote_addr.as_deref()
    }

    pub fn header_entries(&self) -> &[HeaderEntry] {
        &self.headers
    }

    /// First value of header `name` (case-insensitive), if it is valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .and_then(|h| std::str::from_utf8(&h.value).ok())
    }

    /// Headers rebuilt as an HTTP header map. Entries that are no longer
    /// valid header names or values are skipped.
    pub fn headers(&self) -> HeaderMap {
        let mut map = HeaderMap::with_capacity(self.headers.len());
        for entry in &self.headers {
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(entry.name.as_bytes()),
                HeaderValue::from_bytes(&entry.value),
            ) {
                map.append(name, value);
            }
        }
        map
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// The body as text, if it is valid UTF-8.
    pub fn body_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.body).ok()
    }

    /// The body as text, replacing invalid UTF-8 sequences.
    pub fn body_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// Deserialize a JSON body.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    /// A copy of this capture carrying a different body.
    pub fn with_body(&self, body: impl Into<Vec<u8>>) -> Self {
        Self {
            body: body.into(),
            ..self.clone()
        }
    }

    /// A copy of this capture with one more header.
    pub fn with_header(&self, name: &str, value: impl Into<Vec<u8>>) -> Self {
        let mut copy = self.clone();
        copy.headers.push(HeaderEntry {
            name: name.to_ascii_lowercase(),
            value: value.into(),
        });
        copy
    }

    /// A copy of this capture with a different receipt time.
    pub fn with_received_at(&self, seconds: u64) -> Self {
        Self {
            received_at_seconds: seconds,
            ..self.clone()
        }
    }
}

fn split_uri(uri: &str) -> (String, Vec<(String, String)>) {
    // Absolute-form targets carry scheme and authority in front of the path.
    let target = match uri.find("://") {
        Some(scheme_end) => {
            let rest = &uri[scheme_end + 3..];
            rest.find('/').map_or("/", |i| &rest[i..])
        }
        None => uri,
    };

    match target.split_once('?') {
        Some((path, query)) => (
            path.to_string(),
            url::form_urlencoded::parse(query.as_bytes())
                .into_owned()
                .collect(),
        ),
        None => (target.to_string(), Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{Method, Request};

    #[test]
    fn test_ids_are_unique_and_ordered() {
        let ids: Vec<String> = (0..100).map(|_| new_capture_id()).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted, ids);
        assert!(ids[0].starts_with(ID_PREFIX));
    }

    #[test]
    fn test_from_request_keeps_metadata() {
        let request = Request::builder()
            .method(Method::PUT)
            .uri("/webhook?event=push&event=tag&repo=a%20b")
            .header("content-type", "application/json")
            .header("x-signature", "abc")
            .body(())
            .unwrap();
        let (parts, _) = request.into_parts();
        let remote: SocketAddr = "127.0.0.1:40000".parse().unwrap();

        let capture = Capture::from_request(&parts, b"{\"a\":1}".to_vec(), Some(remote));

        assert_eq!(capture.method(), "PUT");
        assert_eq!(capture.path(), "/webhook");
        assert_eq!(capture.query_param("event"), Some("push"));
        assert_eq!(capture.query_param("repo"), Some("a b"));
        assert_eq!(capture.query_params().len(), 3);
        assert_eq!(capture.header("Content-Type"), Some("application/json"));
        assert_eq!(capture.headers().get("x-signature").unwrap(), "abc");
        assert_eq!(capture.remote_addr(), Some("127.0.0.1:40000"));
        assert_eq!(capture.version(), "HTTP/1.1");
        assert_eq!(capture.json::<serde_json::Value>().unwrap()["a"], 1);
    }

    #[test]
    fn test_with_body_leaves_original_untouched() {
        let original = Capture::new("POST", "/webhook", "first");
        let replaced = original.with_body("second");

        assert_eq!(original.body(), b"first");
        assert_eq!(replaced.body(), b"second");
        assert_eq!(replaced.id(), original.id());
    }

    #[test]
    fn test_non_utf8_body_is_preserved() {
        let capture = Capture::new("POST", "/webhook", vec![0xff, 0x00, 0x41]);
        assert_eq!(capture.body_str(), None);
        assert_eq!(capture.body_text(), "\u{fffd}\u{0}A");
        assert_eq!(capture.body(), &[0xff, 0x00, 0x41]);
    }

    #[test]
    fn test_absolute_form_uri() {
        let capture = Capture::new("GET", "http://localhost:5000/webhook?x=1", "");
        assert_eq!(capture.path(), "/webhook");
        assert_eq!(capture.query_param("x"), Some("1"));
    }
}
