//! SDK-HMAC-SHA256 signer and verifier

use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use http::HeaderValue;
use http::header::AUTHORIZATION;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::types::Credentials;
use crate::utils::datetime::{format_sdk_date, parse_sdk_date};
use crate::utils::log_sanitizer::truncate_for_log;

use super::canonical::CanonicalRequest;
use super::{
    HEADER_AUTH_SIGN, HEADER_SDK_DATE, SDK_HMAC_SHA256, SignableRequest, SignatureError,
};

type HmacSha256 = Hmac<Sha256>;

/// Default tolerance between request timestamp and server clock.
pub const DEFAULT_ALLOWED_SKEW: Duration = Duration::minutes(15);

const BEARER_PREFIX: &str = "Bearer ";

/// Signs outbound requests with an app secret and verifies inbound ones.
///
/// Stateless apart from the credentials; safe to share across tasks.
#[derive(Debug, Clone)]
pub struct Signer {
    credentials: Credentials,
}

impl Signer {
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Sign `request` in place using the current time when no valid
    /// `X-Sdk-Date` is present. Returns the `Authorization` header value.
    pub fn sign<R>(&self, request: &mut R) -> Result<String, SignatureError>
    where
        R: SignableRequest + ?Sized,
    {
        self.sign_at(request, Utc::now())
    }

    /// Same as [`sign`](Self::sign) with an explicit clock.
    ///
    /// 1. Reuse a valid `X-Sdk-Date`, otherwise stamp `now`.
    /// 2. Canonicalize (rewrites the query string).
    /// 3. HMAC the string to sign.
    /// 4. Set `Authorization: Bearer <sig>` and `X-Auth-Sign: <sig>`.
    pub fn sign_at<R>(&self, request: &mut R, now: DateTime<Utc>) -> Result<String, SignatureError>
    where
        R: SignableRequest + ?Sized,
    {
        let timestamp = stamp_date(request, now)?;
        let canonical = CanonicalRequest::canonicalize(request)?;
        let signature = self.signature_for(&timestamp, &canonical)?;

        let authorization = format!("{BEARER_PREFIX}{signature}");
        let headers = request.header_map_mut();
        headers.insert(AUTHORIZATION, header_value(AUTHORIZATION.as_str(), &authorization)?);
        headers.insert(HEADER_AUTH_SIGN, header_value(HEADER_AUTH_SIGN, &signature)?);

        Ok(authorization)
    }

    /// `SDK-HMAC-SHA256 \n timestamp \n hex(sha256(canonical))`
    pub fn string_to_sign(timestamp: &str, canonical: &CanonicalRequest) -> String {
        format!("{SDK_HMAC_SHA256}\n{timestamp}\n{}", canonical.hashed())
    }

    /// Lowercase hex HMAC-SHA256 of `string_to_sign` keyed by the app secret.
    pub fn compute_signature(&self, string_to_sign: &str) -> Result<String, SignatureError> {
        let mut mac = HmacSha256::new_from_slice(self.credentials.app_secret().as_bytes())
            .map_err(|e| SignatureError::Hmac(e.to_string()))?;
        mac.update(string_to_sign.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Recompute the signature of a received request and compare it in
    /// constant time with `X-Auth-Sign` (or the `Authorization` bearer token).
    ///
    /// The request is not modified; its query is canonicalized on the fly.
    pub fn verify<R>(&self, request: &R) -> Result<(), SignatureError>
    where
        R: SignableRequest + ?Sized,
    {
        self.verify_inner(request).map(|_| ())
    }

    /// [`verify`](Self::verify) plus a clock-skew check: the request date must
    /// lie within `allowed` of `server_time` in either direction.
    ///
    /// A negative `allowed` is treated as zero. A side of the window that
    /// falls outside the representable date range is unbounded.
    pub fn verify_with_skew<R>(
        &self,
        request: &R,
        server_time: DateTime<Utc>,
        allowed: Duration,
    ) -> Result<(), SignatureError>
    where
        R: SignableRequest + ?Sized,
    {
        let request_time = self.verify_inner(request)?;
        let allowed = allowed.max(Duration::zero());

        if let Some(earliest) = server_time.checked_sub_signed(allowed)
            && request_time < earliest
        {
            return Err(SignatureError::RequestExpired {
                request_time: format_sdk_date(request_time),
                earliest_allowed: format_sdk_date(earliest),
            });
        }

        if let Some(latest) = server_time.checked_add_signed(allowed)
            && request_time > latest
        {
            return Err(SignatureError::RequestNotYetValid {
                request_time: format_sdk_date(request_time),
                latest_allowed: format_sdk_date(latest),
            });
        }

        Ok(())
    }

    fn verify_inner<R>(&self, request: &R) -> Result<DateTime<Utc>, SignatureError>
    where
        R: SignableRequest + ?Sized,
    {
        let timestamp = required_header(request, HEADER_SDK_DATE)?;
        let request_time =
            parse_sdk_date(timestamp).ok_or_else(|| SignatureError::MalformedHeader {
                header: HEADER_SDK_DATE.to_string(),
                detail: format!("expected YYYYMMDDTHHMMSSZ, got '{timestamp}'"),
            })?;
        let provided = provided_signature(request)?;

        let canonical = CanonicalRequest::from_request(request)?;
        let expected = self.signature_for(timestamp, &canonical)?;

        if bool::from(expected.as_bytes().ct_eq(provided.as_bytes())) {
            Ok(request_time)
        } else {
            log::debug!("Signature mismatch for app_id={}", self.credentials.app_id());
            Err(SignatureError::SignatureMismatch)
        }
    }

    fn signature_for(
        &self,
        timestamp: &str,
        canonical: &CanonicalRequest,
    ) -> Result<String, SignatureError> {
        log::debug!(
            "CanonicalRequest:\n{}",
            truncate_for_log(&canonical.canonical_string())
        );
        let string_to_sign = Self::string_to_sign(timestamp, canonical);
        log::debug!("StringToSign:\n{string_to_sign}");
        self.compute_signature(&string_to_sign)
    }
}

/// Return the request's valid `X-Sdk-Date`, or stamp `now` into it.
fn stamp_date<R>(request: &mut R, now: DateTime<Utc>) -> Result<String, SignatureError>
where
    R: SignableRequest + ?Sized,
{
    if let Some(existing) = request.header_map().get(HEADER_SDK_DATE) {
        match existing.to_str().ok().filter(|s| parse_sdk_date(s).is_some()) {
            Some(valid) => return Ok(valid.to_string()),
            None => log::warn!("Ignoring malformed {HEADER_SDK_DATE} header {existing:?}, restamping"),
        }
    }

    let timestamp = format_sdk_date(now);
    request
        .header_map_mut()
        .insert(HEADER_SDK_DATE, header_value(HEADER_SDK_DATE, &timestamp)?);
    Ok(timestamp)
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue, SignatureError> {
    HeaderValue::from_str(value).map_err(|_| SignatureError::InvalidHeaderValue(name.to_string()))
}

fn required_header<'a, R>(request: &'a R, name: &str) -> Result<&'a str, SignatureError>
where
    R: SignableRequest + ?Sized,
{
    let value = request
        .header_map()
        .get(name)
        .ok_or_else(|| SignatureError::MissingHeader(name.to_string()))?;
    value.to_str().map_err(|e| SignatureError::MalformedHeader {
        header: name.to_string(),
        detail: e.to_string(),
    })
}

/// `X-Auth-Sign`, falling back to the bearer token in `Authorization`.
fn provided_signature<R>(request: &R) -> Result<&str, SignatureError>
where
    R: SignableRequest + ?Sized,
{
    if request.header_map().contains_key(HEADER_AUTH_SIGN) {
        return required_header(request, HEADER_AUTH_SIGN);
    }
    match request.header_map().get(AUTHORIZATION) {
        Some(_) => {
            let authorization = required_header(request, AUTHORIZATION.as_str())?;
            authorization
                .strip_prefix(BEARER_PREFIX)
                .ok_or_else(|| SignatureError::MalformedHeader {
                    header: AUTHORIZATION.to_string(),
                    detail: "expected 'Bearer <signature>'".to_string(),
                })
        }
        None => Err(SignatureError::MissingHeader(HEADER_AUTH_SIGN.to_string())),
    }
}
