//! # cdn-orchestrator-provider
//!
//! Signed request client for the CDN vendor REST API.
//!
//! Every call is authenticated with **SDK-HMAC-SHA256**:
//!
//! ```text
//! CanonicalRequest = METHOD \n CANONICAL_URI \n CANONICAL_QUERY \n HEX(SHA256(body))
//! StringToSign     = SDK-HMAC-SHA256 \n X-Sdk-Date \n HEX(SHA256(CanonicalRequest))
//! Signature        = HEX(HMAC-SHA256(app_secret, StringToSign))
//! ```
//!
//! and carries `Authorization: Bearer <sig>` and `X-Auth-Sign: <sig>`.
//!
//! ## Feature Flags
//!
//! - **`native-tls`** *(default)*: the platform's native TLS implementation.
//! - **`rustls`**: rustls.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use cdn_orchestrator_provider::{CdnClient, CdnProvider, Credentials, PaginationParams};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = CdnClient::builder(Credentials::new("app-id", "app-secret"))
//!         .endpoint("https://api.cdn.example.com")
//!         .build()?;
//!
//!     if !client.validate_credentials().await? {
//!         return Err("credentials rejected".into());
//!     }
//!
//!     let page = client.list_domains(&PaginationParams::default()).await?;
//!     for domain in &page.items {
//!         println!("{} -> {:?}", domain.domain, domain.cname);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Signing without sending
//!
//! [`Signer`] works on any [`SignableRequest`]: a [`reqwest::Request`] before
//! it is sent, or an [`http::Request<bytes::Bytes>`] received by a server.
//!
//! ```rust
//! use cdn_orchestrator_provider::{Credentials, Signer};
//!
//! let signer = Signer::new(Credentials::new("app-id", "testsecret"));
//! let mut request = http::Request::builder()
//!     .uri("/api/v5/domains?page=1&domain=example.com")
//!     .header("x-sdk-date", "20250101T000000Z")
//!     .body(bytes::Bytes::new())?;
//!
//! let authorization = signer.sign(&mut request)?;
//! assert_eq!(
//!     authorization,
//!     "Bearer d80971a8b64840b8df1520b2fe52de9315835f3f51ef355ae51184058739c4a8"
//! );
//! assert!(signer.verify(&request).is_ok());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Error Handling
//!
//! All operations return [`Result<T, ProviderError>`](ProviderError).
//! [`ProviderError::is_transport`] covers failures below the API
//! (network, timeouts, non-200 statuses, malformed envelopes);
//! [`ProviderError::is_business`] covers `status.code != 1` and carries the
//! vendor's code and message. Transient errors are retried with exponential
//! backoff, re-signing every attempt.

mod api;
mod client;
mod config;
mod error;
mod http_client;
mod sign;
mod traits;
mod types;
mod utils;

pub use api::{DOMAINS_PATH, MAX_PAGE_SIZE};

pub use client::{
    CdnClient, CdnClientBuilder, PARAM_APP_ID, PARAM_CLIENT_IP, PARAM_SIGN_TYPE, PARAM_TIMESTAMP,
    PARAM_USER_AGENT, SIGN_TYPE_HMAC_SHA256,
};

pub use config::{
    ClientConfig, DEFAULT_CLIENT_IP, DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_ENDPOINT,
    DEFAULT_MAX_RETRIES, DEFAULT_REQUEST_TIMEOUT_SECS, SDK_VERSION, default_user_agent,
};

// Re-export error types
pub use error::{ApiErrorKind, ErrorCodeTable, ProviderError, Result};

pub use sign::{
    CanonicalRequest, DEFAULT_ALLOWED_SKEW, HEADER_AUTH_SIGN, HEADER_CONTENT_SHA256,
    HEADER_SDK_DATE, SDK_HMAC_SHA256, SHA256_EMPTY, SignableRequest, SignatureError, Signer,
    escape,
};

// Re-export core trait only (internal traits are not exported)
pub use traits::CdnProvider;

pub use types::{
    ApiEnvelope, ApiStatus, Credentials, Domain, DomainStatus, PaginatedResponse,
    PaginationParams, Params, STATUS_CODE_SUCCESS,
};

pub use utils::datetime;
pub use utils::log_sanitizer::mask_secret;
