//! WebSocket opening handshake (RFC 6455 Section 4.2).
//!
//! [`UpgradeRequest::parse`] does HTTP-level parsing only. Whether the request
//! is an acceptable upgrade is decided by [`attempt_upgrade`], a pure function
//! of the request: no configuration or shared state is consulted.

use std::collections::HashMap;

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use sha1::{Digest, Sha1};

use crate::error::{Error, Result};

/// The WebSocket GUID used in the Sec-WebSocket-Accept calculation (RFC 6455).
pub const WS_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// The only protocol version this server speaks.
pub const WS_VERSION: &str = "13";

const SECURITY_HEADERS: [&str; 5] = [
    "host",
    "upgrade",
    "connection",
    "sec-websocket-key",
    "sec-websocket-version",
];

/// Computes the Sec-WebSocket-Accept value from the client's Sec-WebSocket-Key.
///
/// The accept key is calculated as: Base64(SHA-1(key + GUID))
///
/// # Example
///
/// ```
/// use wsengine::protocol::handshake::compute_accept_key;
///
/// let key = "dGhlIHNhbXBsZSBub25jZQ==";
/// assert_eq!(compute_accept_key(key), "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
/// ```
#[must_use]
pub fn compute_accept_key(key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(key.as_bytes());
    hasher.update(WS_GUID.as_bytes());
    BASE64.encode(hasher.finalize())
}

/// Position just past the `\r\n\r\n` that ends an HTTP head, if present.
#[must_use]
pub fn find_head_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n").map(|i| i + 4)
}

/// Standard reason phrase for the statuses this module produces.
#[must_use]
pub const fn reason_phrase(status: u16) -> &'static str {
    match status {
        101 => "Switching Protocols",
        400 => "Bad Request",
        405 => "Method Not Allowed",
        408 => "Request Timeout",
        426 => "Upgrade Required",
        431 => "Request Header Fields Too Large",
        _ => "Error",
    }
}

/// A parsed HTTP/1.1 request head.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeRequest {
    method: String,
    path: String,
    headers: HashMap<String, String>,
}

impl UpgradeRequest {
    /// Parse a request head (request line plus headers).
    ///
    /// Header names are matched case-insensitively. A repeated Host, Upgrade,
    /// Connection, Sec-WebSocket-Key or Sec-WebSocket-Version header is
    /// rejected.
    ///
    /// # Errors
    ///
    /// Returns [`Error::HandshakeRejected`] with status 400 when the head is
    /// not UTF-8, the request line is malformed, the HTTP version is not 1.1,
    /// or a security-critical header is duplicated.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(data).map_err(|_| Error::rejected(400, "invalid UTF-8"))?;
        let mut lines = text.split("\r\n");

        let request_line = lines
            .next()
            .filter(|l| !l.is_empty())
            .ok_or_else(|| Error::rejected(400, "empty request"))?;
        let parts: Vec<&str> = request_line.split_whitespace().collect();
        let [method, path, version] = parts[..] else {
            return Err(Error::rejected(400, "invalid request line"));
        };
        if version != "HTTP/1.1" {
            return Err(Error::rejected(400, format!("unsupported HTTP version: {version}")));
        }

        let mut headers = HashMap::new();
        for line in lines {
            if line.is_empty() {
                break;
            }
            let Some((name, value)) = line.split_once(':') else {
                return Err(Error::rejected(400, "malformed header line"));
            };
            let name = name.trim().to_ascii_lowercase();
            if SECURITY_HEADERS.contains(&name.as_str()) && headers.contains_key(&name) {
                return Err(Error::rejected(400, format!("duplicate header: {name}")));
            }
            headers.insert(name, value.trim().to_string());
        }

        Ok(Self {
            method: method.to_string(),
            path: path.to_string(),
            headers,
        })
    }

    /// Request method.
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Request target.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Header value by case-insensitive name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    fn header_has_token(&self, name: &str, token: &str) -> bool {
        self.header(name)
            .is_some_and(|v| v.split(',').any(|t| t.trim().eq_ignore_ascii_case(token)))
    }
}

/// Successful upgrade: the 101 response to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeResponse {
    /// Sec-WebSocket-Accept value.
    pub accept: String,
}

impl HandshakeResponse {
    /// Build the response for a client key.
    #[must_use]
    pub fn for_key(key: &str) -> Self {
        Self {
            accept: compute_accept_key(key),
        }
    }

    /// Serialize the 101 response.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        format!(
            "HTTP/1.1 101 Switching Protocols\r\n\
             Upgrade: websocket\r\n\
             Connection: Upgrade\r\n\
             Sec-WebSocket-Accept: {}\r\n\
             \r\n",
            self.accept
        )
        .into_bytes()
    }
}

/// Outcome of [`attempt_upgrade`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeResult {
    /// The request is a valid upgrade.
    Accepted(HandshakeResponse),
    /// The request is refused with an HTTP error status.
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Diagnostic reason, not sent to the client.
        reason: String,
    },
}

impl HandshakeResult {
    /// Rejection with the given status.
    #[must_use]
    pub fn rejected(status: u16, reason: impl Into<String>) -> Self {
        HandshakeResult::Rejected {
            status,
            reason: reason.into(),
        }
    }

    /// Returns `true` for [`HandshakeResult::Accepted`].
    #[must_use]
    pub const fn is_accepted(&self) -> bool {
        matches!(self, HandshakeResult::Accepted(_))
    }

    /// Response bytes to write to the transport.
    ///
    /// A rejection is a `text/plain` response whose body is the status line,
    /// sent with `Connection: close`. A 426 also advertises the supported version.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            HandshakeResult::Accepted(response) => response.to_bytes(),
            HandshakeResult::Rejected { status, .. } => {
                let body = format!("{} {}", status, reason_phrase(*status));
                let version = if *status == 426 {
                    format!("Sec-WebSocket-Version: {WS_VERSION}\r\n")
                } else {
                    String::new()
                };
                format!(
                    "HTTP/1.1 {body}\r\n\
                     Content-Type: text/plain; charset=utf-8\r\n\
                     Content-Length: {}\r\n\
                     Connection: close\r\n\
                     {version}\
                     \r\n\
                     {body}",
                    body.len()
                )
                .into_bytes()
            }
        }
    }
}

/// Decide whether `request` is an acceptable WebSocket upgrade.
#[must_use]
pub fn attempt_upgrade(request: &UpgradeRequest) -> HandshakeResult {
    if !request
        .header("upgrade")
        .is_some_and(|u| u.eq_ignore_ascii_case("websocket"))
    {
        return HandshakeResult::rejected(400, "missing or invalid Upgrade header");
    }
    if request.method() != "GET" {
        return HandshakeResult::rejected(405, format!("method {} not allowed", request.method()));
    }
    if !request.header_has_token("connection", "upgrade") {
        return HandshakeResult::rejected(400, "Connection header lacks upgrade token");
    }
    if request.header("host").is_none_or(str::is_empty) {
        return HandshakeResult::rejected(400, "missing Host header");
    }
    match request.header("sec-websocket-version") {
        Some(WS_VERSION) => {}
        Some(other) => {
            return HandshakeResult::rejected(426, format!("unsupported version: {other}"));
        }
        None => return HandshakeResult::rejected(426, "missing Sec-WebSocket-Version header"),
    }
    let Some(key) = request.header("sec-websocket-key") else {
        return HandshakeResult::rejected(400, "missing Sec-WebSocket-Key header");
    };
    if !BASE64.decode(key).is_ok_and(|raw| raw.len() == 16) {
        return HandshakeResult::rejected(400, "Sec-WebSocket-Key is not a 16-byte base64 value");
    }

    HandshakeResult::Accepted(HandshakeResponse::for_key(key))
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "dGhlIHNhbXBsZSBub25jZQ==";

    fn request(extra: &str) -> Vec<u8> {
        format!("GET /chat HTTP/1.1\r\nHost: example.com\r\n{extra}\r\n").into_bytes()
    }

    fn valid() -> Vec<u8> {
        request(&format!(
            "Upgrade: websocket\r\nConnection: keep-alive, Upgrade\r\n\
             Sec-WebSocket-Key: {KEY}\r\nSec-WebSocket-Version: 13\r\n"
        ))
    }

    fn status_of(result: &HandshakeResult) -> Option<u16> {
        match result {
            HandshakeResult::Accepted(_) => None,
            HandshakeResult::Rejected { status, .. } => Some(*status),
        }
    }

    #[test]
    fn test_compute_accept_key_rfc_example() {
        assert_eq!(compute_accept_key(KEY), "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
    }

    #[test]
    fn test_accepts_valid_request() {
        let req = UpgradeRequest::parse(&valid()).unwrap();
        assert_eq!(req.path(), "/chat");
        assert_eq!(req.header("HOST"), Some("example.com"));

        let result = attempt_upgrade(&req);
        assert_eq!(
            result,
            HandshakeResult::Accepted(HandshakeResponse {
                accept: "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=".into()
            })
        );
        let bytes = String::from_utf8(result.to_bytes()).unwrap();
        assert!(bytes.starts_with("HTTP/1.1 101 Switching Protocols\r\n"));
        assert!(bytes.contains("Sec-WebSocket-Accept: s3pPLMBiTxaQ9kYGzzhZRbK+xOo=\r\n"));
        assert!(bytes.ends_with("\r\n\r\n"));
    }

    #[test]
    fn test_rejects_non_websocket_upgrade() {
        let raw = request(&format!(
            "Upgrade: h2c\r\nConnection: Upgrade\r\nSec-WebSocket-Key: {KEY}\r\nSec-WebSocket-Version: 13\r\n"
        ));
        let req = UpgradeRequest::parse(&raw).unwrap();
        let result = attempt_upgrade(&req);
        assert_eq!(status_of(&result), Some(400));

        let bytes = String::from_utf8(result.to_bytes()).unwrap();
        assert!(bytes.starts_with("HTTP/1.1 400 Bad Request\r\n"));
        assert!(bytes.contains("Connection: close\r\n"));
        assert!(bytes.ends_with("\r\n\r\n400 Bad Request"));
    }

    #[test]
    fn test_rejects_unsupported_version_with_426() {
        let raw = request(&format!(
            "Upgrade: websocket\r\nConnection: Upgrade\r\nSec-WebSocket-Key: {KEY}\r\nSec-WebSocket-Version: 8\r\n"
        ));
        let result = attempt_upgrade(&UpgradeRequest::parse(&raw).unwrap());
        assert_eq!(status_of(&result), Some(426));
        let bytes = String::from_utf8(result.to_bytes()).unwrap();
        assert!(bytes.contains("Sec-WebSocket-Version: 13\r\n"));
    }

    #[test]
    fn test_rejects_post() {
        let raw = valid();
        let raw = [b"POST".as_slice(), &raw[3..]].concat();
        let result = attempt_upgrade(&UpgradeRequest::parse(&raw).unwrap());
        assert_eq!(status_of(&result), Some(405));
    }

    #[test]
    fn test_rejects_bad_key() {
        let raw = request(
            "Upgrade: websocket\r\nConnection: Upgrade\r\nSec-WebSocket-Key: c2hvcnQ=\r\nSec-WebSocket-Version: 13\r\n",
        );
        let result = attempt_upgrade(&UpgradeRequest::parse(&raw).unwrap());
        assert_eq!(status_of(&result), Some(400));
    }

    #[test]
    fn test_rejects_missing_connection_token() {
        let raw = request(&format!(
            "Upgrade: websocket\r\nConnection: keep-alive\r\nSec-WebSocket-Key: {KEY}\r\nSec-WebSocket-Version: 13\r\n"
        ));
        let result = attempt_upgrade(&UpgradeRequest::parse(&raw).unwrap());
        assert_eq!(status_of(&result), Some(400));
    }

    #[test]
    fn test_parse_rejects_duplicate_security_header() {
        let raw = request(&format!(
            "Upgrade: websocket\r\nSec-WebSocket-Key: {KEY}\r\nSec-WebSocket-Key: {KEY}\r\n"
        ));
        assert!(matches!(
            UpgradeRequest::parse(&raw),
            Err(Error::HandshakeRejected { status: 400, .. })
        ));
    }

    #[test]
    fn test_parse_rejects_malformed_request_line() {
        assert!(UpgradeRequest::parse(b"GET /\r\n\r\n").is_err());
        assert!(UpgradeRequest::parse(b"GET / HTTP/1.0\r\n\r\n").is_err());
        assert!(UpgradeRequest::parse(b"\r\n\r\n").is_err());
    }

    #[test]
    fn test_find_head_end() {
        assert_eq!(find_head_end(b"GET / HTTP/1.1\r\n\r\nrest"), Some(18));
        assert_eq!(find_head_end(b"GET / HTTP/1.1\r\n"), None);
    }
}
