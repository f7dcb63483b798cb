use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::sign::SignatureError;

/// Unified error type for every API operation.
///
/// Variants fall into three classes:
///
/// - **transport** ([`is_transport`](Self::is_transport)): the request did not
///   produce a well-formed API envelope: [`NetworkError`](Self::NetworkError),
///   [`Timeout`](Self::Timeout), [`RateLimited`](Self::RateLimited),
///   [`HttpStatus`](Self::HttpStatus), [`ParseError`](Self::ParseError),
///   [`MissingStatus`](Self::MissingStatus)
/// - **business** ([`is_business`](Self::is_business)): the API answered with
///   `status.code != 1`: [`Api`](Self::Api)
/// - **local**: the request was never sent (signing, serialization, invalid
///   input or configuration)
///
/// # Retryable Errors
///
/// `NetworkError`, `Timeout`, `RateLimited` and gateway errors (HTTP 502–504)
/// are transient. The client retries them with exponential backoff and
/// re-signs every attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "error")]
pub enum ProviderError {
    /// Connection refused, DNS failure, reset, unreadable body.
    NetworkError { provider: String, detail: String },

    /// The HTTP request timed out.
    Timeout { provider: String, detail: String },

    /// HTTP 429.
    RateLimited {
        provider: String,
        /// Seconds from `Retry-After`, if sent.
        retry_after: Option<u64>,
        raw_message: Option<String>,
    },

    /// Any HTTP status other than 200 (429 excepted).
    HttpStatus {
        provider: String,
        status: u16,
        body: String,
    },

    /// The response body is not a JSON envelope.
    ParseError { provider: String, detail: String },

    /// The envelope has no usable `status` object.
    MissingStatus { provider: String, body: String },

    /// Business failure: `status.code != 1`. Code and message are the vendor's.
    Api {
        provider: String,
        code: i64,
        message: String,
        /// Classification derived from `code`, then from `message`.
        kind: ApiErrorKind,
    },

    /// The request could not be canonicalized or signed.
    Signing {
        provider: String,
        source: SignatureError,
    },

    /// Failed to serialize request parameters.
    SerializationError { provider: String, detail: String },

    /// Caller input rejected before sending.
    InvalidParameter {
        provider: String,
        param: String,
        detail: String,
    },

    /// Client configuration rejected (bad endpoint, HTTP client build failure).
    InvalidConfig { provider: String, detail: String },
}

impl ProviderError {
    /// The request failed below the business layer.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::NetworkError { .. }
                | Self::Timeout { .. }
                | Self::RateLimited { .. }
                | Self::HttpStatus { .. }
                | Self::ParseError { .. }
                | Self::MissingStatus { .. }
        )
    }

    /// The API processed the request and rejected it.
    pub fn is_business(&self) -> bool {
        matches!(self, Self::Api { .. })
    }

    /// Vendor status code of a business error.
    pub fn business_code(&self) -> Option<i64> {
        match self {
            Self::Api { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Transient failures worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::NetworkError { .. } | Self::Timeout { .. } | Self::RateLimited { .. } => true,
            Self::HttpStatus { status, .. } => matches!(status, 502..=504),
            _ => false,
        }
    }

    /// Business classification, `None` for non-business errors.
    pub fn api_error_kind(&self) -> Option<ApiErrorKind> {
        match self {
            Self::Api { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.api_error_kind() == Some(ApiErrorKind::NotFound)
    }

    /// Business rate limiting or HTTP 429.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
            || self.api_error_kind() == Some(ApiErrorKind::RateLimited)
    }

    pub fn is_auth_failure(&self) -> bool {
        self.api_error_kind() == Some(ApiErrorKind::AuthFailed)
    }

    /// 是否为预期行为（用户输入、资源不存在等），用于日志分级。
    ///
    /// `true` → `warn`, `false` → `error`.
    pub fn is_expected(&self) -> bool {
        matches!(self, Self::Api { .. } | Self::InvalidParameter { .. })
    }
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NetworkError { provider, detail } => {
                write!(f, "[{provider}] Network error: {detail}")
            }
            Self::Timeout { provider, detail } => {
                write!(f, "[{provider}] Request timeout: {detail}")
            }
            Self::RateLimited {
                provider,
                retry_after,
                ..
            } => {
                if let Some(secs) = retry_after {
                    write!(f, "[{provider}] Rate limited (retry after {secs}s)")
                } else {
                    write!(f, "[{provider}] Rate limited")
                }
            }
            Self::HttpStatus {
                provider, status, ..
            } => {
                write!(f, "[{provider}] Unexpected HTTP status {status}")
            }
            Self::ParseError { provider, detail } => {
                write!(f, "[{provider}] Parse error: {detail}")
            }
            Self::MissingStatus { provider, .. } => {
                write!(f, "[{provider}] Response envelope has no status")
            }
            Self::Api {
                provider,
                code,
                message,
                ..
            } => {
                write!(f, "[{provider}] API error {code}: {message}")
            }
            Self::Signing { provider, source } => {
                write!(f, "[{provider}] Signing failed: {source}")
            }
            Self::SerializationError { provider, detail } => {
                write!(f, "[{provider}] Serialization error: {detail}")
            }
            Self::InvalidParameter {
                provider,
                param,
                detail,
            } => {
                write!(f, "[{provider}] Invalid parameter '{param}': {detail}")
            }
            Self::InvalidConfig { provider, detail } => {
                write!(f, "[{provider}] Invalid configuration: {detail}")
            }
        }
    }
}

impl std::error::Error for ProviderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Signing { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Convenience type alias for `Result<T, ProviderError>`.
pub type Result<T> = std::result::Result<T, ProviderError>;

// ============ Business error classification ============

/// Coarse meaning of a business status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiErrorKind {
    NotFound,
    RateLimited,
    AuthFailed,
    Other,
}

impl ApiErrorKind {
    /// Case-insensitive substring match on the vendor message.
    pub fn from_message(message: &str) -> Self {
        let lower = message.to_lowercase();
        let has = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));

        if has(&["not found", "not exist", "no such"]) {
            Self::NotFound
        } else if has(&["rate limit", "too many", "frequen", "throttl"]) {
            Self::RateLimited
        } else if has(&[
            "auth",
            "signature",
            "permission",
            "forbidden",
            "unauthorized",
            "access denied",
        ]) {
            Self::AuthFailed
        } else {
            Self::Other
        }
    }
}

/// Known vendor status codes.
///
/// Consulted before message matching; empty by default.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorCodeTable {
    codes: HashMap<i64, ApiErrorKind>,
}

impl ErrorCodeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `code` as meaning `kind`.
    #[must_use]
    pub fn with(mut self, code: i64, kind: ApiErrorKind) -> Self {
        self.codes.insert(code, kind);
        self
    }

    pub fn lookup(&self, code: i64) -> Option<ApiErrorKind> {
        self.codes.get(&code).copied()
    }

    /// Code table first, message substrings as fallback.
    pub fn classify(&self, code: i64, message: &str) -> ApiErrorKind {
        self.lookup(code)
            .unwrap_or_else(|| ApiErrorKind::from_message(message))
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

impl FromIterator<(i64, ApiErrorKind)> for ErrorCodeTable {
    fn from_iter<I: IntoIterator<Item = (i64, ApiErrorKind)>>(iter: I) -> Self {
        Self {
            codes: iter.into_iter().collect(),
        }
    }
}
