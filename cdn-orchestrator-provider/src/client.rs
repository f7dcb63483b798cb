//! Signed request dispatch
//!
//! Every call goes through [`CdnClient::request`]:
//!
//! 1. common parameters are injected (`app_id`, `client_ip`, `user_agent`,
//!    `sign_type`, `timestamp`);
//! 2. GET parameters go to the query string, POST/PUT/DELETE parameters to a
//!    JSON body;
//! 3. the request is signed;
//! 4. the response envelope is decoded, separating transport failures from
//!    business errors.
//!
//! Steps 1–3 run again for each retry.

use chrono::{DateTime, Utc};
use reqwest::header::{CONTENT_TYPE, HeaderValue, USER_AGENT};
use reqwest::{Client, Method, Request, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::ClientConfig;
use crate::error::{ErrorCodeTable, ProviderError, Result};
use crate::http_client::HttpUtils;
use crate::sign::Signer;
use crate::traits::{ProviderErrorMapper, RawApiError};
use crate::types::{ApiEnvelope, Credentials, Params};
use crate::utils::log_sanitizer::truncate_for_log;

/// Provider identifier carried by errors and log lines.
pub(crate) const PROVIDER_NAME: &str = "cdn";

/// Caller identity.
pub const PARAM_APP_ID: &str = "app_id";
/// Client address placeholder.
pub const PARAM_CLIENT_IP: &str = "client_ip";
/// SDK user agent.
pub const PARAM_USER_AGENT: &str = "user_agent";
/// Signing algorithm tag.
pub const PARAM_SIGN_TYPE: &str = "sign_type";
/// Issued-at, Unix seconds.
pub const PARAM_TIMESTAMP: &str = "timestamp";

/// Value of [`PARAM_SIGN_TYPE`].
pub const SIGN_TYPE_HMAC_SHA256: &str = "HMAC-SHA256";

const APPLICATION_JSON: &str = "application/json";

/// Client for the CDN vendor API.
///
/// Cheap to share: the underlying connection pool is reference counted and
/// signing holds no mutable state.
///
/// ```rust,no_run
/// use cdn_orchestrator_provider::{CdnClient, Credentials, Params};
///
/// # async fn example() -> cdn_orchestrator_provider::Result<()> {
/// let client = CdnClient::builder(Credentials::new("app-id", "app-secret"))
///     .endpoint("https://api.cdn.example.com")
///     .max_retries(3)
///     .build()?;
///
/// let data: serde_json::Value = client.get("/api/v5/domains", Params::new()).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct CdnClient {
    http: Client,
    signer: Signer,
    config: ClientConfig,
    base_url: Url,
}

/// Builder for [`CdnClient`].
pub struct CdnClientBuilder {
    credentials: Credentials,
    config: ClientConfig,
}

impl CdnClientBuilder {
    fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            config: ClientConfig::default(),
        }
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.endpoint = endpoint.into();
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    pub fn client_ip(mut self, client_ip: impl Into<String>) -> Self {
        self.config.client_ip = client_ip.into();
        self
    }

    pub fn connect_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    pub fn request_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Set the maximum number of automatic retries for transient errors (default: 2).
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.max_retries = retries;
        self
    }

    pub fn error_codes(mut self, table: ErrorCodeTable) -> Self {
        self.config.error_codes = table;
        self
    }

    /// Validate the configuration and build the client.
    pub fn build(self) -> Result<CdnClient> {
        let base_url = self.config.base_url(PROVIDER_NAME)?;
        let http = self.config.http_client(PROVIDER_NAME)?;
        Ok(CdnClient {
            http,
            signer: Signer::new(self.credentials),
            config: self.config,
            base_url,
        })
    }
}

impl CdnClient {
    /// Client with default configuration.
    pub fn new(credentials: Credentials) -> Result<Self> {
        Self::builder(credentials).build()
    }

    pub fn builder(credentials: Credentials) -> CdnClientBuilder {
        CdnClientBuilder::new(credentials)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn signer(&self) -> &Signer {
        &self.signer
    }

    // ==================== 请求构建 ====================

    /// Build and sign one attempt of a call.
    ///
    /// `params` are copied; the common parameters overwrite caller values
    /// of the same name.
    pub fn prepare_request(
        &self,
        method: &Method,
        path: &str,
        params: &Params,
        now: DateTime<Utc>,
    ) -> Result<Request> {
        check_method(self, method)?;

        let mut params = params.clone();
        self.inject_common_params(&mut params, now);

        let mut url = self.url_for(path);
        let body = if *method == Method::GET {
            append_query(&mut url, &params);
            None
        } else {
            let payload =
                serde_json::to_vec(&params).map_err(|e| ProviderError::SerializationError {
                    provider: self.provider_name().to_string(),
                    detail: e.to_string(),
                })?;
            log::debug!(
                "[{}] Request Body: {}",
                self.provider_name(),
                truncate_for_log(&String::from_utf8_lossy(&payload))
            );
            Some(payload)
        };

        let mut request = Request::new(method.clone(), url);
        let headers = request.headers_mut();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&self.config.user_agent).map_err(|e| {
                ProviderError::InvalidConfig {
                    provider: self.provider_name().to_string(),
                    detail: format!("user agent: {e}"),
                }
            })?,
        );
        if let Some(payload) = body {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(APPLICATION_JSON));
            *request.body_mut() = Some(payload.into());
        }

        self.signer
            .sign_at(&mut request, now)
            .map_err(|e| self.signing_error(e))?;

        Ok(request)
    }

    fn inject_common_params(&self, params: &mut Params, now: DateTime<Utc>) {
        params.insert(
            PARAM_APP_ID.to_string(),
            Value::from(self.signer.credentials().app_id()),
        );
        params.insert(
            PARAM_CLIENT_IP.to_string(),
            Value::from(self.config.client_ip.as_str()),
        );
        params.insert(
            PARAM_USER_AGENT.to_string(),
            Value::from(self.config.user_agent.as_str()),
        );
        params.insert(
            PARAM_SIGN_TYPE.to_string(),
            Value::from(SIGN_TYPE_HMAC_SHA256),
        );
        params.insert(PARAM_TIMESTAMP.to_string(), Value::from(now.timestamp()));
    }

    /// Endpoint joined with `path`, keeping any endpoint path prefix.
    fn url_for(&self, path: &str) -> Url {
        let mut url = self.base_url.clone();
        let prefix = url.path().trim_end_matches('/').to_string();
        url.set_path(&format!("{prefix}/{}", path.trim_start_matches('/')));
        url
    }

    // ==================== 响应解析 ====================

    /// Decode an HTTP response into the envelope's `data`.
    ///
    /// - status other than 200 → [`ProviderError::HttpStatus`]
    /// - body not a JSON envelope → [`ProviderError::ParseError`]
    /// - no `status` object → [`ProviderError::MissingStatus`]
    /// - `status.code != 1` → [`ProviderError::Api`]
    pub fn decode_response<T>(&self, status: u16, body: &str) -> Result<T>
    where
        T: DeserializeOwned,
    {
        if status == 429 {
            return Err(ProviderError::RateLimited {
                provider: self.provider_name().to_string(),
                retry_after: None,
                raw_message: Some(truncate_for_log(body)),
            });
        }
        if status != 200 {
            log::error!(
                "[{}] HTTP {status}: {}",
                self.provider_name(),
                truncate_for_log(body)
            );
            return Err(ProviderError::HttpStatus {
                provider: self.provider_name().to_string(),
                status,
                body: truncate_for_log(body),
            });
        }

        let envelope: ApiEnvelope = HttpUtils::parse_json(body, self.provider_name())?;

        let Some(api_status) = envelope.status else {
            log::error!(
                "[{}] Response without status: {}",
                self.provider_name(),
                truncate_for_log(body)
            );
            return Err(ProviderError::MissingStatus {
                provider: self.provider_name().to_string(),
                body: truncate_for_log(body),
            });
        };

        if !api_status.is_success() {
            let error = self.map_error(RawApiError::with_code(api_status.code, api_status.message));
            log::warn!("{error}");
            return Err(error);
        }

        serde_json::from_value(envelope.data).map_err(|e| {
            log::error!("[{}] Unexpected data shape: {e}", self.provider_name());
            self.parse_error(e)
        })
    }

    // ==================== 公开 API 方法 ====================

    /// Send a signed call and decode its `data`.
    ///
    /// Only GET, POST, PUT and DELETE are accepted. Transient failures are
    /// retried up to [`ClientConfig::max_retries`] times; each attempt is
    /// rebuilt and re-signed with a fresh timestamp.
    pub async fn request<T>(&self, method: Method, path: &str, params: Params) -> Result<T>
    where
        T: DeserializeOwned,
    {
        check_method(self, &method)?;

        let (status, body) = HttpUtils::execute_with_retry(
            &self.http,
            self.provider_name(),
            self.config.max_retries,
            |_| self.prepare_request(&method, path, &params, Utc::now()),
        )
        .await?;

        self.decode_response(status, &body)
    }

    /// 执行 GET 请求
    pub async fn get<T: DeserializeOwned>(&self, path: &str, params: Params) -> Result<T> {
        self.request(Method::GET, path, params).await
    }

    /// 执行 POST 请求
    pub async fn post<T: DeserializeOwned>(&self, path: &str, params: Params) -> Result<T> {
        self.request(Method::POST, path, params).await
    }

    /// 执行 PUT 请求
    pub async fn put<T: DeserializeOwned>(&self, path: &str, params: Params) -> Result<T> {
        self.request(Method::PUT, path, params).await
    }

    /// 执行 DELETE 请求
    pub async fn delete<T: DeserializeOwned>(&self, path: &str, params: Params) -> Result<T> {
        self.request(Method::DELETE, path, params).await
    }
}

impl ProviderErrorMapper for CdnClient {
    fn provider_name(&self) -> &'static str {
        PROVIDER_NAME
    }

    fn error_codes(&self) -> &ErrorCodeTable {
        &self.config.error_codes
    }
}

fn check_method(client: &CdnClient, method: &Method) -> Result<()> {
    if matches!(
        *method,
        Method::GET | Method::POST | Method::PUT | Method::DELETE
    ) {
        Ok(())
    } else {
        Err(client.invalid_parameter(
            "method",
            format!("{method} is not supported, use GET, POST, PUT or DELETE"),
        ))
    }
}

/// Serialize params into the query string.
///
/// Strings verbatim, numbers and booleans via `to_string`, arrays as repeated
/// keys, objects as JSON text; `null` is skipped.
fn append_query(url: &mut Url, params: &Params) {
    let mut pairs = url.query_pairs_mut();
    for (key, value) in params {
        match value {
            Value::Array(items) => {
                for item in items {
                    if let Some(text) = query_value(item) {
                        pairs.append_pair(key, &text);
                    }
                }
            }
            other => {
                if let Some(text) = query_value(other) {
                    pairs.append_pair(key, &text);
                }
            }
        }
    }
}

fn query_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(_) | Value::Object(_) => Some(value.to_string()),
    }
}
