use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while canonicalizing, signing or verifying a request.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail")]
pub enum SignatureError {
    /// The body is a stream and no `X-Sdk-Content-Sha256` header was supplied.
    #[error("Request body cannot be read for hashing: {0}")]
    UnreadableBody(String),

    /// A query key or value does not decode to UTF-8.
    #[error("Malformed query string: {0}")]
    MalformedQueryString(String),

    /// A path segment does not decode to UTF-8, or the rewritten URI is invalid.
    #[error("Invalid URI path: {0}")]
    InvalidUriPath(String),

    /// A computed header value cannot be represented as an HTTP header.
    #[error("Invalid header value for '{0}'")]
    InvalidHeaderValue(String),

    /// The HMAC primitive rejected its key.
    #[error("HMAC computation failed: {0}")]
    Hmac(String),

    /// A header required for verification is absent.
    #[error("Missing required header '{0}'")]
    MissingHeader(String),

    /// A header required for verification is present but unparsable.
    #[error("Malformed header '{header}': {detail}")]
    MalformedHeader { header: String, detail: String },

    /// The recomputed signature differs from the supplied one.
    #[error("The request signature we calculated does not match the signature you provided")]
    SignatureMismatch,

    /// The request timestamp is older than the allowed window.
    #[error("Signature expired: {request_time} is now earlier than {earliest_allowed}")]
    RequestExpired {
        request_time: String,
        earliest_allowed: String,
    },

    /// The request timestamp lies too far in the future.
    #[error("Signature not yet current: {request_time} is still later than {latest_allowed}")]
    RequestNotYetValid {
        request_time: String,
        latest_allowed: String,
    },
}

impl SignatureError {
    /// Whether the error means "the caller is not authenticated" rather than
    /// "the request could not be processed".
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            Self::MissingHeader(_)
                | Self::MalformedHeader { .. }
                | Self::SignatureMismatch
                | Self::RequestExpired { .. }
                | Self::RequestNotYetValid { .. }
        )
    }
}
