//! HTTP client infrastructure for the Jikan anime catalog API.
//!
//! This crate provides:
//! - A resilient JSON-over-HTTP request executor with bounded retries and
//!   linear backoff for rate limited or unreachable requests
//! - Typed request builders for the listing, detail, relations and genre
//!   endpoints, behind the [CatalogService] trait
//! - Serde models of the response envelopes
//! - A [MockClient] serving canned responses for tests
//!
//! ## Usage
//!
//! ```ignore
//! use animedex_catalog::{CatalogClientConfig, CatalogService, JikanClient, ListingQuery};
//!
//! let client = JikanClient::new(CatalogClientConfig::default())?;
//! let listing = client.list_records(&ListingQuery::default()).await?;
//! ```

mod client;
mod config;
mod error;
mod mock;
mod retry;
pub mod types;

// Public exports
pub use client::{CatalogService, Client, JikanClient};
pub use config::{CatalogClientConfig, DEFAULT_CATALOG_URL};
pub use error::{CatalogClientError, FetchError, MockDataError, UNKNOWN_API_ERROR};
pub use mock::{
    ANIMEDEX_CATALOG_MOCK_DATA_VAR,
    MockClient,
    MockData,
    MockOutcome,
    MockRequest,
    MockResponse,
};
pub use retry::{
    Attempt,
    DEFAULT_RETRY_ATTEMPTS,
    DEFAULT_RETRY_BASE_DELAY,
    RetryFailure,
    RetryPolicy,
    with_retries,
};
pub use types::*;
