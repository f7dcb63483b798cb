use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::utils::log_sanitizer::mask_secret;

/// Schema-less request parameters, used only at the transport boundary.
pub type Params = serde_json::Map<String, serde_json::Value>;

// ============ Credentials ============

/// Caller identity used to sign requests.
///
/// `Debug` masks the secret; it is never logged or serialized.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    app_id: String,
    app_secret: String,
}

impl Credentials {
    pub fn new(app_id: impl Into<String>, app_secret: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            app_secret: app_secret.into(),
        }
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    pub(crate) fn app_secret(&self) -> &str {
        &self.app_secret
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("app_id", &self.app_id)
            .field("app_secret", &mask_secret(&self.app_secret))
            .finish()
    }
}

// ============ Response envelope ============

/// Business status code that marks success.
pub const STATUS_CODE_SUCCESS: i64 = 1;

/// `status` object of every API response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiStatus {
    pub code: i64,
    #[serde(default)]
    pub message: String,
}

impl ApiStatus {
    pub fn is_success(&self) -> bool {
        self.code == STATUS_CODE_SUCCESS
    }
}

/// `{ "status": { "code", "message" }, "data": ... }`
///
/// `status` is optional here so that its absence can be reported as a
/// protocol error instead of a generic parse failure.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEnvelope {
    pub status: Option<ApiStatus>,
    #[serde(default)]
    pub data: serde_json::Value,
}

// ============ Pagination ============

/// Pagination parameters for list operations. Pages are 1-indexed.
///
/// The default is `page = 1, page_size = 20`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationParams {
    /// Page number (1-indexed).
    pub page: u32,
    /// Number of items per page.
    pub page_size: u32,
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: 20,
        }
    }
}

impl PaginationParams {
    /// Clamp `page` to `>= 1` and `page_size` to `1..=max_page_size`.
    #[must_use]
    pub fn validated(&self, max_page_size: u32) -> Self {
        Self {
            page: self.page.max(1),
            page_size: self.page_size.clamp(1, max_page_size),
        }
    }
}

/// One page of a list operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    /// Items in the current page.
    pub items: Vec<T>,
    /// Current page number.
    pub page: u32,
    /// Page size used for this request.
    pub page_size: u32,
    /// Total number of items across all pages.
    pub total_count: u32,
    /// Whether more pages follow.
    pub has_more: bool,
}

impl<T> PaginatedResponse<T> {
    pub fn new(items: Vec<T>, page: u32, page_size: u32, total_count: u32) -> Self {
        let has_more = u64::from(page) * u64::from(page_size) < u64::from(total_count);
        Self {
            items,
            page,
            page_size,
            total_count,
            has_more,
        }
    }
}

// ============ Domain ============

/// Serving state of an accelerated domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainStatus {
    Online,
    Offline,
    Configuring,
    Unknown,
}

impl DomainStatus {
    /// Map the vendor's free-form status string.
    pub fn from_vendor(status: Option<&str>) -> Self {
        match status.map(str::to_ascii_lowercase).as_deref() {
            Some("online" | "active" | "enabled" | "running") => Self::Online,
            Some("offline" | "disabled" | "stopped" | "suspended") => Self::Offline,
            Some("configuring" | "pending" | "deploying" | "checking") => Self::Configuring,
            _ => Self::Unknown,
        }
    }
}

/// An accelerated domain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Domain {
    /// Domain name, e.g. `static.example.com`.
    pub domain: String,
    /// CNAME target assigned by the CDN.
    #[serde(default)]
    pub cname: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, with = "crate::utils::datetime")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, with = "crate::utils::datetime")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Domain {
    pub fn domain_status(&self) -> DomainStatus {
        DomainStatus::from_vendor(self.status.as_deref())
    }
}
