//! SDK-HMAC-SHA256 request signing
//!
//! Every outbound API call is authenticated by an HMAC over a canonical form of
//! the request:
//!
//! ```text
//! CanonicalRequest = METHOD \n CANONICAL_URI \n CANONICAL_QUERY \n HEX(SHA256(body))
//! StringToSign     = "SDK-HMAC-SHA256" \n X-Sdk-Date \n HEX(SHA256(CanonicalRequest))
//! Signature        = HEX(HMAC-SHA256(app_secret, StringToSign))
//! ```
//!
//! The signature is attached as `Authorization: Bearer <sig>` and
//! `X-Auth-Sign: <sig>`. Headers are not part of the canonical form.

mod canonical;
mod error;
mod signable;
mod signer;

pub use canonical::{CanonicalRequest, escape};
pub use error::SignatureError;
pub use signable::SignableRequest;
pub use signer::{DEFAULT_ALLOWED_SKEW, Signer};

/// Algorithm identifier, first line of the string to sign.
pub const SDK_HMAC_SHA256: &str = "SDK-HMAC-SHA256";

/// Request timestamp header (`YYYYMMDDTHHMMSSZ`, UTC).
pub const HEADER_SDK_DATE: &str = "x-sdk-date";

/// Optional pre-computed body hash header. Used verbatim when present.
pub const HEADER_CONTENT_SHA256: &str = "x-sdk-content-sha256";

/// Duplicate of the signature for gateways that strip `Authorization`.
pub const HEADER_AUTH_SIGN: &str = "x-auth-sign";

/// Lowercase hex SHA-256 of the empty byte string.
pub const SHA256_EMPTY: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";
