//! Client configuration
//!
//! Everything the dispatch layer needs besides credentials. The SDK user agent
//! is part of the configuration, not a process-wide value.

use std::time::Duration;

use reqwest::{Client, Url};

use crate::error::{ErrorCodeTable, ProviderError, Result};

/// Version reported in the default user agent.
pub const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default API endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://api.cdn.example.com";

/// Placeholder sent as `client_ip`; the gateway records the real peer address.
pub const DEFAULT_CLIENT_IP: &str = "127.0.0.1";

/// 默认连接超时（秒）
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
/// 默认请求超时（秒）
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
/// Automatic retries for transient failures.
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// `cdn-orchestrator/<version>`
pub fn default_user_agent() -> String {
    format!("cdn-orchestrator/{SDK_VERSION}")
}

/// Dispatch configuration of a [`CdnClient`](crate::CdnClient).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Scheme and host, optionally with a path prefix.
    pub endpoint: String,
    /// Sent as the `User-Agent` header and the `user_agent` parameter.
    pub user_agent: String,
    /// Sent as the `client_ip` parameter.
    pub client_ip: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    /// Retries after the first attempt (0 disables retrying).
    pub max_retries: u32,
    /// Known business status codes, consulted before message matching.
    pub error_codes: ErrorCodeTable,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            user_agent: default_user_agent(),
            client_ip: DEFAULT_CLIENT_IP.to_string(),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            max_retries: DEFAULT_MAX_RETRIES,
            error_codes: ErrorCodeTable::default(),
        }
    }
}

impl ClientConfig {
    /// Parse and check the endpoint: absolute `http(s)` URL, no query or fragment.
    pub(crate) fn base_url(&self, provider: &str) -> Result<Url> {
        let invalid = |detail: String| ProviderError::InvalidConfig {
            provider: provider.to_string(),
            detail,
        };

        let url = Url::parse(&self.endpoint)
            .map_err(|e| invalid(format!("endpoint '{}': {e}", self.endpoint)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(invalid(format!(
                "endpoint '{}': scheme must be http or https",
                self.endpoint
            )));
        }
        if url.cannot_be_a_base() || url.host_str().is_none() {
            return Err(invalid(format!("endpoint '{}': missing host", self.endpoint)));
        }
        if url.query().is_some() || url.fragment().is_some() {
            return Err(invalid(format!(
                "endpoint '{}': must not carry a query or fragment",
                self.endpoint
            )));
        }
        if self.user_agent.trim().is_empty() {
            return Err(invalid("user agent must not be empty".to_string()));
        }
        Ok(url)
    }

    /// 创建带超时配置的 HTTP Client
    pub(crate) fn http_client(&self, provider: &str) -> Result<Client> {
        Client::builder()
            .connect_timeout(self.connect_timeout)
            .timeout(self.request_timeout)
            .build()
            .map_err(|e| ProviderError::InvalidConfig {
                provider: provider.to_string(),
                detail: format!("failed to create HTTP client: {e}"),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.client_ip, "127.0.0.1");
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert!(config.user_agent.starts_with("cdn-orchestrator/"));
        assert!(config.error_codes.is_empty());
    }

    #[test]
    fn base_url_accepts_prefix() {
        let config = ClientConfig {
            endpoint: "http://127.0.0.1:8080/gateway".to_string(),
            ..ClientConfig::default()
        };
        let url = config.base_url("cdn");
        assert!(matches!(url, Ok(u) if u.path() == "/gateway"));
    }

    #[test]
    fn base_url_rejects_bad_endpoints() {
        for endpoint in [
            "not a url",
            "ftp://example.com",
            "mailto:ops@example.com",
            "https://example.com/?a=1",
        ] {
            let config = ClientConfig {
                endpoint: endpoint.to_string(),
                ..ClientConfig::default()
            };
            assert!(
                matches!(config.base_url("cdn"), Err(ProviderError::InvalidConfig { .. })),
                "{endpoint} should be rejected"
            );
        }
    }

    #[test]
    fn base_url_rejects_empty_user_agent() {
        let config = ClientConfig {
            user_agent: "  ".to_string(),
            ..ClientConfig::default()
        };
        assert!(matches!(
            config.base_url("cdn"),
            Err(ProviderError::InvalidConfig { .. })
        ));
    }
}
