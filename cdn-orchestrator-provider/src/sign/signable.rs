//! Request abstraction the signer operates on.

use bytes::Bytes;
use http::uri::PathAndQuery;
use http::{HeaderMap, Method, Uri};

use super::SignatureError;

/// An HTTP request that can be canonicalized and signed.
///
/// Implemented for [`reqwest::Request`] on the client side and for
/// [`http::Request<Bytes>`] on the verifying side. Both expose the same
/// `http` header and method types, so signer and verifier share one code path.
pub trait SignableRequest {
    fn http_method(&self) -> &Method;

    /// Path component, still percent-encoded.
    fn uri_path(&self) -> &str;

    /// Raw query string without the leading `?`.
    fn raw_query(&self) -> Option<&str>;

    /// Overwrite the live query string. An empty string removes it.
    fn replace_query(&mut self, query: &str) -> Result<(), SignatureError>;

    fn header_map(&self) -> &HeaderMap;

    fn header_map_mut(&mut self) -> &mut HeaderMap;

    /// Full body bytes, borrowed. An absent body is the empty slice.
    ///
    /// Streaming bodies cannot be hashed and yield
    /// [`SignatureError::UnreadableBody`].
    fn payload(&self) -> Result<&[u8], SignatureError>;
}

impl SignableRequest for reqwest::Request {
    fn http_method(&self) -> &Method {
        self.method()
    }

    fn uri_path(&self) -> &str {
        self.url().path()
    }

    fn raw_query(&self) -> Option<&str> {
        self.url().query()
    }

    fn replace_query(&mut self, query: &str) -> Result<(), SignatureError> {
        if query.is_empty() {
            self.url_mut().set_query(None);
        } else {
            self.url_mut().set_query(Some(query));
        }
        Ok(())
    }

    fn header_map(&self) -> &HeaderMap {
        self.headers()
    }

    fn header_map_mut(&mut self) -> &mut HeaderMap {
        self.headers_mut()
    }

    fn payload(&self) -> Result<&[u8], SignatureError> {
        match self.body() {
            None => Ok(&[]),
            Some(body) => body.as_bytes().ok_or_else(|| {
                SignatureError::UnreadableBody(
                    "streaming body without x-sdk-content-sha256".to_string(),
                )
            }),
        }
    }
}

impl SignableRequest for http::Request<Bytes> {
    fn http_method(&self) -> &Method {
        self.method()
    }

    fn uri_path(&self) -> &str {
        self.uri().path()
    }

    fn raw_query(&self) -> Option<&str> {
        self.uri().query()
    }

    fn replace_query(&mut self, query: &str) -> Result<(), SignatureError> {
        let path = self.uri().path();
        let path_and_query = if query.is_empty() {
            path.to_string()
        } else {
            format!("{path}?{query}")
        };

        let mut parts = self.uri().clone().into_parts();
        parts.path_and_query = Some(
            PathAndQuery::try_from(path_and_query)
                .map_err(|e| SignatureError::InvalidUriPath(e.to_string()))?,
        );
        *self.uri_mut() =
            Uri::from_parts(parts).map_err(|e| SignatureError::InvalidUriPath(e.to_string()))?;
        Ok(())
    }

    fn header_map(&self) -> &HeaderMap {
        self.headers()
    }

    fn header_map_mut(&mut self) -> &mut HeaderMap {
        self.headers_mut()
    }

    fn payload(&self) -> Result<&[u8], SignatureError> {
        Ok(self.body().as_ref())
    }
}
