//! Canonical request construction.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

use sha2::{Digest, Sha256};

use super::{HEADER_CONTENT_SHA256, SignableRequest, SignatureError};

/// Percent-encode `s` with the RFC 3986 unreserved set (`A-Z a-z 0-9 - . _ ~`)
/// passed through and every other byte emitted as uppercase `%XX`.
pub fn escape(s: &str) -> Cow<'_, str> {
    urlencoding::encode(s)
}

/// Lowercase hex SHA-256.
pub(crate) fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Deterministic form of a request used as signature input.
///
/// ```text
/// METHOD
/// CANONICAL_URI
/// CANONICAL_QUERY
/// CONTENT_SHA256_HEX
/// ```
///
/// Always rebuilt from the request; never cached between sign and verify.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalRequest {
    method: String,
    canonical_uri: String,
    canonical_query: String,
    content_sha256: String,
}

impl CanonicalRequest {
    /// Build the canonical form without touching the request.
    pub fn from_request<R>(request: &R) -> Result<Self, SignatureError>
    where
        R: SignableRequest + ?Sized,
    {
        Ok(Self {
            method: request.http_method().as_str().to_ascii_uppercase(),
            canonical_uri: canonical_uri(request.uri_path())?,
            canonical_query: canonical_query(request.raw_query().unwrap_or_default())?,
            content_sha256: content_sha256(request)?,
        })
    }

    /// Build the canonical form and rewrite the request's query string to
    /// the canonical query, so that what is sent is exactly what was signed.
    pub fn canonicalize<R>(request: &mut R) -> Result<Self, SignatureError>
    where
        R: SignableRequest + ?Sized,
    {
        let canonical = Self::from_request(request)?;
        request.replace_query(&canonical.canonical_query)?;
        Ok(canonical)
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn canonical_uri(&self) -> &str {
        &self.canonical_uri
    }

    pub fn canonical_query(&self) -> &str {
        &self.canonical_query
    }

    pub fn content_sha256(&self) -> &str {
        &self.content_sha256
    }

    /// The four-line string that is hashed into the string to sign.
    pub fn canonical_string(&self) -> String {
        format!(
            "{}\n{}\n{}\n{}",
            self.method, self.canonical_uri, self.canonical_query, self.content_sha256
        )
    }

    /// Lowercase hex SHA-256 of [`canonical_string`](Self::canonical_string).
    pub fn hashed(&self) -> String {
        sha256_hex(self.canonical_string().as_bytes())
    }
}

impl fmt::Display for CanonicalRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical_string())
    }
}

/// Escape each `/`-separated segment and ensure a trailing `/`.
///
/// Segments are percent-decoded first so that an already-encoded path and its
/// raw form canonicalize identically.
fn canonical_uri(path: &str) -> Result<String, SignatureError> {
    let mut uri = String::with_capacity(path.len() + 1);
    for (i, segment) in path.split('/').enumerate() {
        if i > 0 {
            uri.push('/');
        }
        let decoded = urlencoding::decode(segment)
            .map_err(|e| SignatureError::InvalidUriPath(format!("{segment}: {e}")))?;
        uri.push_str(&escape(&decoded));
    }
    if !uri.ends_with('/') {
        uri.push('/');
    }
    Ok(uri)
}

/// Sort keys, sort values within each key, escape both, join with `&`.
fn canonical_query(raw: &str) -> Result<String, SignatureError> {
    let mut params: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for pair in raw.split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        params
            .entry(decode_query_component(key)?)
            .or_default()
            .push(decode_query_component(value)?);
    }

    let mut parts = Vec::with_capacity(params.len());
    for (key, mut values) in params {
        values.sort_unstable();
        let key = escape(&key);
        for value in values {
            parts.push(format!("{key}={}", escape(&value)));
        }
    }
    Ok(parts.join("&"))
}

/// Form-style decoding: `+` is a space, then percent escapes.
fn decode_query_component(s: &str) -> Result<String, SignatureError> {
    let spaced = s.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(Cow::into_owned)
        .map_err(|e| SignatureError::MalformedQueryString(format!("{s}: {e}")))
}

/// Pre-hash header verbatim when present, else the hash of the full body.
fn content_sha256<R>(request: &R) -> Result<String, SignatureError>
where
    R: SignableRequest + ?Sized,
{
    if let Some(value) = request.header_map().get(HEADER_CONTENT_SHA256) {
        return value
            .to_str()
            .map(str::to_string)
            .map_err(|e| SignatureError::MalformedHeader {
                header: HEADER_CONTENT_SHA256.to_string(),
                detail: e.to_string(),
            });
    }
    Ok(sha256_hex(request.payload()?))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::sign::SHA256_EMPTY;
    use bytes::Bytes;
    use http::{HeaderValue, Method};

    fn request(method: Method, uri: &str, body: &'static [u8]) -> http::Request<Bytes> {
        http::Request::builder()
            .method(method)
            .uri(uri)
            .body(Bytes::from_static(body))
            .unwrap()
    }

    // ============ Escaping ============

    #[test]
    fn escape_passes_unreserved() {
        assert_eq!(escape("AZaz09-._~"), "AZaz09-._~");
    }

    #[test]
    fn escape_uses_uppercase_hex() {
        assert_eq!(escape("a b/c*d"), "a%20b%2Fc%2Ad");
        assert_eq!(escape("é"), "%C3%A9");
        assert_eq!(escape("+=&"), "%2B%3D%26");
    }

    // ============ URI ============

    #[test]
    fn uri_gets_trailing_slash() {
        assert_eq!(canonical_uri("/api/v5/domains").unwrap(), "/api/v5/domains/");
        assert_eq!(canonical_uri("/api/v5/domains/").unwrap(), "/api/v5/domains/");
    }

    #[test]
    fn uri_empty_and_root() {
        assert_eq!(canonical_uri("").unwrap(), "/");
        assert_eq!(canonical_uri("/").unwrap(), "/");
    }

    #[test]
    fn uri_segments_escaped_once() {
        assert_eq!(canonical_uri("/a b/c").unwrap(), "/a%20b/c/");
        assert_eq!(canonical_uri("/a%20b/c").unwrap(), "/a%20b/c/");
        assert_eq!(canonical_uri("/x%2Fy").unwrap(), "/x%2Fy/");
    }

    #[test]
    fn uri_rejects_non_utf8_segment() {
        assert!(matches!(
            canonical_uri("/%FF%FE"),
            Err(SignatureError::InvalidUriPath(_))
        ));
    }

    // ============ Query ============

    #[test]
    fn query_empty() {
        assert_eq!(canonical_query("").unwrap(), "");
        assert_eq!(canonical_query("&&").unwrap(), "");
    }

    #[test]
    fn query_sorted_by_key() {
        assert_eq!(canonical_query("b=2&a=1").unwrap(), "a=1&b=2");
        assert_eq!(
            canonical_query("page=1&domain=example.com").unwrap(),
            "domain=example.com&page=1"
        );
    }

    #[test]
    fn query_values_sorted_within_key() {
        assert_eq!(
            canonical_query("tag=b&z=0&tag=a&tag=c").unwrap(),
            "tag=a&tag=b&tag=c&z=0"
        );
    }

    #[test]
    fn query_key_without_value() {
        assert_eq!(canonical_query("flag&a=1").unwrap(), "a=1&flag=");
    }

    #[test]
    fn query_plus_and_escapes_normalized() {
        assert_eq!(
            canonical_query("name=hello+world").unwrap(),
            "name=hello%20world"
        );
        assert_eq!(
            canonical_query("name=hello%20world").unwrap(),
            "name=hello%20world"
        );
        assert_eq!(canonical_query("k=a%2bb").unwrap(), "k=a%2Bb");
    }

    #[test]
    fn query_rejects_non_utf8() {
        assert!(matches!(
            canonical_query("k=%FF"),
            Err(SignatureError::MalformedQueryString(_))
        ));
    }

    // ============ Content hash ============

    #[test]
    fn empty_body_hash() {
        let req = request(Method::GET, "/", b"");
        let canonical = CanonicalRequest::from_request(&req).unwrap();
        assert_eq!(canonical.content_sha256(), SHA256_EMPTY);
        assert_eq!(sha256_hex(b""), SHA256_EMPTY);
    }

    #[test]
    fn body_hash() {
        let req = request(Method::POST, "/api/v5/domains", br#"{"domain":"example.com"}"#);
        let canonical = CanonicalRequest::from_request(&req).unwrap();
        assert_eq!(
            canonical.content_sha256(),
            "b9e2a80fa92f8d5059ab90188e0691ad6730871a209cc337c7565593597fbd58"
        );
    }

    #[test]
    fn prehash_header_used_verbatim() {
        let mut req = request(Method::POST, "/upload", b"ignored");
        req.headers_mut().insert(
            HEADER_CONTENT_SHA256,
            HeaderValue::from_static("UNSIGNED-PAYLOAD"),
        );
        let canonical = CanonicalRequest::from_request(&req).unwrap();
        assert_eq!(canonical.content_sha256(), "UNSIGNED-PAYLOAD");
    }

    /// A request whose body is a stream that cannot be borrowed as bytes.
    struct StreamingRequest {
        inner: http::Request<Bytes>,
    }

    impl SignableRequest for StreamingRequest {
        fn http_method(&self) -> &Method {
            self.inner.method()
        }

        fn uri_path(&self) -> &str {
            self.inner.uri().path()
        }

        fn raw_query(&self) -> Option<&str> {
            self.inner.uri().query()
        }

        fn replace_query(&mut self, query: &str) -> Result<(), SignatureError> {
            self.inner.replace_query(query)
        }

        fn header_map(&self) -> &http::HeaderMap {
            self.inner.headers()
        }

        fn header_map_mut(&mut self) -> &mut http::HeaderMap {
            self.inner.headers_mut()
        }

        fn payload(&self) -> Result<&[u8], SignatureError> {
            Err(SignatureError::UnreadableBody("stream".to_string()))
        }
    }

    #[test]
    fn streaming_body_without_prehash_is_error() {
        let req = StreamingRequest {
            inner: request(Method::PUT, "/upload", b""),
        };
        assert!(matches!(
            CanonicalRequest::from_request(&req),
            Err(SignatureError::UnreadableBody(_))
        ));
    }

    #[test]
    fn streaming_body_with_prehash_is_accepted() {
        let mut req = StreamingRequest {
            inner: request(Method::PUT, "/upload", b""),
        };
        req.header_map_mut()
            .insert(HEADER_CONTENT_SHA256, HeaderValue::from_static(SHA256_EMPTY));
        let canonical = CanonicalRequest::from_request(&req);
        assert!(matches!(canonical, Ok(c) if c.content_sha256() == SHA256_EMPTY));
    }

    // ============ Assembly ============

    #[test]
    fn canonical_string_layout() {
        let mut req = request(
            Method::GET,
            "/api/v5/domains?page=1&domain=example.com",
            b"",
        );
        let canonical = CanonicalRequest::canonicalize(&mut req).unwrap();
        assert_eq!(
            canonical.canonical_string(),
            "GET\n/api/v5/domains/\ndomain=example.com&page=1\n\
             e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(canonical.to_string(), canonical.canonical_string());
    }

    #[test]
    fn canonicalize_rewrites_live_query() {
        let mut req = request(Method::GET, "/a?b=2&a=1&a=0", b"");
        assert!(CanonicalRequest::canonicalize(&mut req).is_ok());
        assert_eq!(req.uri().query(), Some("a=0&a=1&b=2"));
    }

    #[test]
    fn from_request_leaves_query_untouched() {
        let req = request(Method::GET, "/a?b=2&a=1", b"");
        assert!(CanonicalRequest::from_request(&req).is_ok());
        assert_eq!(req.uri().query(), Some("b=2&a=1"));
    }

    #[test]
    fn method_uppercased() {
        let req = request(Method::from_bytes(b"patch").unwrap(), "/", b"");
        let canonical = CanonicalRequest::from_request(&req).unwrap();
        assert_eq!(canonical.method(), "PATCH");
    }
}
