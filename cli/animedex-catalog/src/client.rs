//! HTTP client for the Jikan catalog API.

use std::collections::BTreeSet;
use std::fmt::Debug;
use std::str::FromStr;

use enum_dispatch::enum_dispatch;
use reqwest::StatusCode;
use reqwest::header::{self, HeaderMap};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};
use url::Url;

use crate::config::CatalogClientConfig;
use crate::error::{CatalogClientError, FetchError, UNKNOWN_API_ERROR};
use crate::mock::MockClient;
use crate::retry::{Attempt, with_retries};
use crate::types::*;

/// A client for the catalog service.
///
/// Every request is independent: no caching, no circuit breaking.
/// Rate limited and unreachable requests are retried according to the
/// configured [crate::RetryPolicy].
pub struct JikanClient {
    http: reqwest::Client,
    base_url: Url,
    config: CatalogClientConfig,
}

impl Debug for JikanClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JikanClient")
            .field("catalog_url", &self.config.catalog_url)
            .finish_non_exhaustive()
    }
}

impl JikanClient {
    /// Create a new catalog client from configuration.
    pub fn new(config: CatalogClientConfig) -> Result<Self, CatalogClientError> {
        let base_url = parse_base_url(&config.catalog_url)?;
        let http = build_http_client(&config)?;

        Ok(Self {
            http,
            base_url,
            config,
        })
    }

    /// Get the configured catalog URL.
    pub fn catalog_url(&self) -> &str {
        &self.config.catalog_url
    }

    /// `GET` `url` and decode the JSON response body.
    ///
    /// - 2xx responses are decoded, a body that doesn't match `T` is fatal
    /// - 429 responses are retried with linear backoff
    /// - other responses fail immediately with the `message` of their body
    /// - transport failures are retried like 429s
    #[instrument(skip(self), fields(url = %url))]
    pub async fn request<T: DeserializeOwned>(&self, url: Url) -> Result<T, FetchError> {
        let result = with_retries(&self.config.retry, |attempt| {
            self.attempt::<T>(url.clone(), attempt)
        })
        .await;
        Ok(result?)
    }

    async fn attempt<T: DeserializeOwned>(&self, url: Url, attempt: u32) -> Attempt<T, FetchError> {
        debug!(attempt, "sending catalog request");
        let response = match self.http.get(url).send().await {
            Ok(response) => response,
            Err(err) => return Attempt::Unreachable(FetchError::Network(err)),
        };

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Attempt::RateLimited;
        }

        let body = match response.bytes().await {
            Ok(body) => body,
            Err(err) => return Attempt::Unreachable(FetchError::Network(err)),
        };

        if !status.is_success() {
            let message = error_message(&body);
            debug!(%status, message, "catalog returned an error response");
            return Attempt::Fatal(FetchError::Upstream { status, message });
        }

        match serde_json::from_slice(&body) {
            Ok(value) => Attempt::Done(value),
            Err(err) => Attempt::Fatal(FetchError::Decode(err)),
        }
    }

    /// `/anime?page&limit&order_by&sort&sfw=true[&q=][&genres=]`
    pub fn listing_url(&self, query: &ListingQuery) -> Url {
        let mut url = self.endpoint(&["anime"]);
        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("page", &query.page.to_string())
                .append_pair("limit", &query.limit.to_string())
                .append_pair("order_by", query.sort.field.as_str())
                .append_pair("sort", query.sort.direction.as_str())
                .append_pair("sfw", "true");
            if !query.text.is_empty() {
                pairs.append_pair("q", &query.text);
            }
            if !query.genre_ids.is_empty() {
                pairs.append_pair("genres", &join_ids(&query.genre_ids));
            }
        }
        url
    }

    /// `/anime/{id}/full`
    pub fn detail_url(&self, id: RecordId) -> Url {
        self.endpoint(&["anime", &id.to_string(), "full"])
    }

    /// `/anime/{id}/relations`
    pub fn relations_url(&self, id: RecordId) -> Url {
        self.endpoint(&["anime", &id.to_string(), "relations"])
    }

    /// `/genres/anime?filter=genres`
    pub fn genres_url(&self) -> Url {
        let mut url = self.endpoint(&["genres", "anime"]);
        url.query_pairs_mut().append_pair("filter", "genres");
        url
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // `parse_base_url` rejects urls that cannot be a base
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }
}

/// Comma separated ids, ascending.
fn join_ids(ids: &BTreeSet<RecordId>) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

/// Extract the human readable `message` of an error response body.
fn error_message(body: &[u8]) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        message: Option<String>,
    }

    serde_json::from_slice::<ErrorBody>(body)
        .ok()
        .and_then(|body| body.message)
        .unwrap_or_else(|| UNKNOWN_API_ERROR.to_string())
}

fn parse_base_url(catalog_url: &str) -> Result<Url, CatalogClientError> {
    let url = Url::parse(catalog_url).map_err(|source| CatalogClientError::InvalidUrl {
        url: catalog_url.to_string(),
        source,
    })?;
    if url.cannot_be_a_base() {
        return Err(CatalogClientError::NotABaseUrl(catalog_url.to_string()));
    }
    Ok(url)
}

// ---------------------------------------------------------------------------
// Catalog trait
// ---------------------------------------------------------------------------

/// The catalog queries the application issues.
///
/// Each method returns the parsed response envelope unmodified.
///
/// This trait enables alternate implementations:
/// - **HTTP**: REST calls to the Jikan API via [`JikanClient`]
/// - **Mock**: canned responses without HTTP via [`MockClient`]
#[allow(async_fn_in_trait)]
#[enum_dispatch]
pub trait CatalogService {
    /// One page of records matching the query, safe-for-work only.
    async fn list_records(&self, query: &ListingQuery) -> Result<ListingResponse, FetchError>;

    /// The full detail variant of a single record.
    async fn record_detail(&self, id: RecordId) -> Result<DetailResponse, FetchError>;

    /// The relation graph of a single record.
    async fn record_relations(&self, id: RecordId) -> Result<RelationsResponse, FetchError>;

    /// The genre taxonomy.
    async fn list_genres(&self) -> Result<GenreResponse, FetchError>;
}

impl CatalogService for JikanClient {
    #[instrument(skip_all, fields(
        page = query.page,
        text = %query.text,
        genres = ?query.genre_ids,
        sort = %query.sort))]
    async fn list_records(&self, query: &ListingQuery) -> Result<ListingResponse, FetchError> {
        let response: ListingResponse = self.request(self.listing_url(query)).await?;
        debug!(
            n_records = response.data.len(),
            last_page = response.pagination.last_visible_page,
            "received listing"
        );
        Ok(response)
    }

    #[instrument(skip(self))]
    async fn record_detail(&self, id: RecordId) -> Result<DetailResponse, FetchError> {
        self.request(self.detail_url(id)).await
    }

    #[instrument(skip(self))]
    async fn record_relations(&self, id: RecordId) -> Result<RelationsResponse, FetchError> {
        self.request(self.relations_url(id)).await
    }

    #[instrument(skip_all)]
    async fn list_genres(&self) -> Result<GenreResponse, FetchError> {
        self.request(self.genres_url()).await
    }
}

/// Either a client for the actual catalog service,
/// or a mock client for testing.
#[derive(Debug)]
#[enum_dispatch(CatalogService)]
pub enum Client {
    Jikan(JikanClient),
    Mock(MockClient),
}

// ---------------------------------------------------------------------------
// HTTP client builder
// ---------------------------------------------------------------------------

/// Build the HTTP client shared by all requests.
fn build_http_client(config: &CatalogClientConfig) -> Result<reqwest::Client, CatalogClientError> {
    let mut headers = HeaderMap::new();

    for (key, value) in &config.extra_headers {
        headers.insert(
            header::HeaderName::from_str(key)
                .map_err(|e| CatalogClientError::InvalidHeader(e.to_string()))?,
            header::HeaderValue::from_str(value)
                .map_err(|e| CatalogClientError::InvalidHeader(e.to_string()))?,
        );
    }

    debug!(
        catalog_url = %config.catalog_url,
        extra_headers = config.extra_headers.len(),
        timeout = ?config.request_timeout,
        "building catalog HTTP client"
    );

    let client_builder = reqwest::Client::builder().default_headers(headers);

    let client_builder = if let Some(ref user_agent) = config.user_agent {
        client_builder.user_agent(user_agent)
    } else {
        client_builder
    };

    let client_builder = if let Some(timeout) = config.request_timeout {
        client_builder.timeout(timeout)
    } else {
        client_builder
    };

    client_builder.build().map_err(CatalogClientError::Http)
}
