//! Configuration types for catalog client construction.

use std::collections::BTreeMap;
use std::time::Duration;

use crate::retry::RetryPolicy;

pub const DEFAULT_CATALOG_URL: &str = "https://api.jikan.moe/v4";

/// Configuration for catalog client construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogClientConfig {
    /// Base URL for the catalog API.
    pub catalog_url: String,
    /// User agent sent with every request.
    pub user_agent: Option<String>,
    /// Additional headers to include in requests.
    pub extra_headers: BTreeMap<String, String>,
    /// Retry behaviour for rate limited and unreachable requests.
    pub retry: RetryPolicy,
    /// Upper bound for a single request.
    ///
    /// Unset by default, an unresponsive catalog blocks the request
    /// indefinitely.
    pub request_timeout: Option<Duration>,
}

impl Default for CatalogClientConfig {
    fn default() -> Self {
        Self {
            catalog_url: DEFAULT_CATALOG_URL.to_string(),
            user_agent: Some(concat!("animedex/", env!("CARGO_PKG_VERSION")).to_string()),
            extra_headers: BTreeMap::new(),
            retry: RetryPolicy::default(),
            request_timeout: None,
        }
    }
}
