use async_trait::async_trait;

use crate::error::{ErrorCodeTable, ProviderError, Result};
use crate::sign::SignatureError;
use crate::types::{Domain, PaginatedResponse, PaginationParams};

/// 原始 API 错误（内部使用）
#[derive(Debug, Clone)]
pub(crate) struct RawApiError {
    /// `status.code` from the envelope
    pub code: i64,
    /// `status.message` from the envelope
    pub message: String,
}

impl RawApiError {
    pub fn with_code(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Maps raw envelope failures onto [`ProviderError`] (内部使用)
pub(crate) trait ProviderErrorMapper {
    /// Provider identifier carried by every error.
    fn provider_name(&self) -> &'static str;

    /// Known business codes.
    fn error_codes(&self) -> &ErrorCodeTable;

    /// Business error with the vendor code and message kept verbatim.
    fn map_error(&self, raw: RawApiError) -> ProviderError {
        let kind = self.error_codes().classify(raw.code, &raw.message);
        ProviderError::Api {
            provider: self.provider_name().to_string(),
            code: raw.code,
            message: raw.message,
            kind,
        }
    }

    /// 快捷方法：解析错误
    fn parse_error(&self, detail: impl ToString) -> ProviderError {
        ProviderError::ParseError {
            provider: self.provider_name().to_string(),
            detail: detail.to_string(),
        }
    }

    fn signing_error(&self, source: SignatureError) -> ProviderError {
        ProviderError::Signing {
            provider: self.provider_name().to_string(),
            source,
        }
    }

    fn invalid_parameter(&self, param: &str, detail: impl ToString) -> ProviderError {
        ProviderError::InvalidParameter {
            provider: self.provider_name().to_string(),
            param: param.to_string(),
            detail: detail.to_string(),
        }
    }
}

/// CDN 提供商 Trait
///
/// Typed operations over the signed dispatch layer.
#[async_trait]
pub trait CdnProvider: Send + Sync {
    /// 提供商标识符
    fn id(&self) -> &'static str;

    /// Largest page size the list endpoints accept.
    fn max_page_size(&self) -> u32 {
        100
    }

    /// 验证凭证是否有效
    ///
    /// `Ok(false)` when the API rejects the credentials; transport failures
    /// and other business errors are returned as errors.
    async fn validate_credentials(&self) -> Result<bool>;

    /// 获取域名列表 (分页)
    async fn list_domains(&self, params: &PaginationParams) -> Result<PaginatedResponse<Domain>>;

    /// 获取域名详情
    async fn get_domain(&self, domain: &str) -> Result<Domain>;

    /// Walk every page of [`list_domains`](Self::list_domains).
    ///
    /// Stops at the last page, at an empty page, when a page starts with the
    /// same domain as the one before it (the server ignored `page`), or
    /// after `u32::MAX / page_size` pages.
    async fn list_all_domains(&self) -> Result<Vec<Domain>> {
        let page_size = self.max_page_size().max(1);
        let max_pages = u32::MAX / page_size;
        let mut params = PaginationParams { page: 1, page_size };
        let mut domains = Vec::new();
        let mut previous_first: Option<String> = None;

        loop {
            let page = self.list_domains(&params).await?;
            let Some(first) = page.items.first().map(|d| d.domain.clone()) else {
                break;
            };
            if previous_first.as_deref() == Some(first.as_str()) {
                log::warn!(
                    "[{}] Page {} repeats the previous page, stopping",
                    self.id(),
                    params.page
                );
                break;
            }

            let has_more = page.has_more;
            domains.extend(page.items);
            if !has_more || params.page >= max_pages {
                break;
            }
            previous_first = Some(first);
            params.page += 1;
        }

        Ok(domains)
    }
}
