//! `CdnProvider` trait 实现：accelerated domains

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::client::CdnClient;
use crate::error::Result;
use crate::sign::escape;
use crate::traits::{CdnProvider, ProviderErrorMapper};
use crate::types::{Domain, PaginatedResponse, PaginationParams, Params};

/// Collection endpoint for accelerated domains.
pub const DOMAINS_PATH: &str = "/api/v5/domains";

/// Maximum page size of the domain list endpoint.
pub const MAX_PAGE_SIZE: u32 = 100;

/// `data` of the list endpoint.
#[derive(Debug, Deserialize)]
struct ListDomainsData {
    #[serde(default)]
    domains: Vec<Domain>,
    #[serde(default)]
    total: Option<u32>,
}

fn page_params(params: &PaginationParams) -> Params {
    let mut map = Params::new();
    map.insert("page".to_string(), Value::from(params.page));
    map.insert("page_size".to_string(), Value::from(params.page_size));
    map
}

#[async_trait]
impl CdnProvider for CdnClient {
    fn id(&self) -> &'static str {
        self.provider_name()
    }

    fn max_page_size(&self) -> u32 {
        MAX_PAGE_SIZE
    }

    async fn validate_credentials(&self) -> Result<bool> {
        let smallest_page = PaginationParams {
            page: 1,
            page_size: 1,
        };
        match self.list_domains(&smallest_page).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_auth_failure() => {
                log::warn!("Credential validation failed: {e}");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    async fn list_domains(&self, params: &PaginationParams) -> Result<PaginatedResponse<Domain>> {
        let params = params.validated(MAX_PAGE_SIZE);
        let data: ListDomainsData = self.get(DOMAINS_PATH, page_params(&params)).await?;

        let fetched = u32::try_from(data.domains.len()).unwrap_or(u32::MAX);
        let Some(total) = data.total else {
            // No total reported: a full page means there may be more.
            let offset = (params.page - 1).saturating_mul(params.page_size);
            return Ok(PaginatedResponse {
                has_more: fetched == params.page_size,
                items: data.domains,
                page: params.page,
                page_size: params.page_size,
                total_count: offset.saturating_add(fetched),
            });
        };

        Ok(PaginatedResponse::new(
            data.domains,
            params.page,
            params.page_size,
            total,
        ))
    }

    async fn get_domain(&self, domain: &str) -> Result<Domain> {
        let domain = domain.trim().trim_end_matches('.');
        if domain.is_empty() {
            return Err(self.invalid_parameter("domain", "must not be empty"));
        }
        let path = format!("{DOMAINS_PATH}/{}", escape(domain));
        self.get(&path, Params::new()).await
    }
}
