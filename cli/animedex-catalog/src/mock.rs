//! A catalog that serves canned responses.
//!
//! Used by tests throughout the workspace, and by the CLI when
//! `ANIMEDEX_CATALOG_MOCK_DATA` points to a file of responses.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::client::CatalogService;
use crate::error::{FetchError, MockDataError};
use crate::retry::DEFAULT_RETRY_ATTEMPTS;
use crate::types::*;

pub const ANIMEDEX_CATALOG_MOCK_DATA_VAR: &str = "ANIMEDEX_CATALOG_MOCK_DATA";

/// What a mocked request resolves to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MockOutcome<T> {
    Ok(T),
    Error { status: u16, message: String },
    /// Resolves as if every retry was rate limited.
    RateLimited,
}

/// A canned response, optionally resolving only after a delay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MockResponse<T> {
    pub outcome: MockOutcome<T>,
    #[serde(default)]
    pub delay_ms: u64,
}

impl<T> MockResponse<T> {
    pub fn ok(value: T) -> Self {
        Self {
            outcome: MockOutcome::Ok(value),
            delay_ms: 0,
        }
    }

    pub fn error(status: u16, message: impl Into<String>) -> Self {
        Self {
            outcome: MockOutcome::Error {
                status,
                message: message.into(),
            },
            delay_ms: 0,
        }
    }

    pub fn rate_limited() -> Self {
        Self {
            outcome: MockOutcome::RateLimited,
            delay_ms: 0,
        }
    }

    /// Resolve only after `delay` has passed.
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay_ms = delay.as_millis() as u64;
        self
    }

    async fn resolve(self) -> Result<T, FetchError> {
        if self.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
        }
        match self.outcome {
            MockOutcome::Ok(value) => Ok(value),
            MockOutcome::Error { status, message } => Err(FetchError::Upstream {
                status: StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
                message,
            }),
            MockOutcome::RateLimited => Err(FetchError::RetriesExhausted {
                attempts: DEFAULT_RETRY_ATTEMPTS.get(),
            }),
        }
    }
}

/// Queued responses, one queue per endpoint.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct MockData {
    #[serde(default)]
    pub listings: VecDeque<MockResponse<ListingResponse>>,
    #[serde(default)]
    pub details: VecDeque<MockResponse<DetailResponse>>,
    #[serde(default)]
    pub relations: VecDeque<MockResponse<RelationsResponse>>,
    #[serde(default)]
    pub genres: VecDeque<MockResponse<GenreResponse>>,
}

/// A request the [MockClient] has served.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockRequest {
    Listing(ListingQuery),
    Detail(RecordId),
    Relations(RecordId),
    Genres,
}

/// A [CatalogService] answering from queues of canned responses.
///
/// Cloning shares the queues and the request log, so tests can keep a
/// handle on a client they passed on.
#[derive(Debug, Clone, Default)]
pub struct MockClient {
    // Shared so that the trait doesn't need `&mut self` just to get mock
    // responses out.
    mock_responses: Arc<Mutex<MockData>>,
    requests: Arc<Mutex<Vec<MockRequest>>>,
}

impl MockClient {
    /// Create a new mock client, potentially reading mock responses from disk
    pub fn new(mock_data_path: Option<impl AsRef<Path>>) -> Result<Self, MockDataError> {
        let mock_responses = match mock_data_path {
            Some(path) => read_mock_responses(path)?,
            None => MockData::default(),
        };
        Ok(Self {
            mock_responses: Arc::new(Mutex::new(mock_responses)),
            requests: Arc::default(),
        })
    }

    pub fn push_listing(&self, response: MockResponse<ListingResponse>) {
        self.lock().listings.push_back(response);
    }

    pub fn push_detail(&self, response: MockResponse<DetailResponse>) {
        self.lock().details.push_back(response);
    }

    pub fn push_relations(&self, response: MockResponse<RelationsResponse>) {
        self.lock().relations.push_back(response);
    }

    pub fn push_genres(&self, response: MockResponse<GenreResponse>) {
        self.lock().genres.push_back(response);
    }

    /// Every request served so far, in the order they were issued.
    pub fn requests(&self) -> Vec<MockRequest> {
        self.requests
            .lock()
            .expect("couldn't acquire mock lock")
            .clone()
    }

    /// The listing queries served so far, in the order they were issued.
    pub fn listing_queries(&self) -> Vec<ListingQuery> {
        self.requests()
            .into_iter()
            .filter_map(|request| match request {
                MockRequest::Listing(query) => Some(query),
                _ => None,
            })
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockData> {
        self.mock_responses
            .lock()
            .expect("couldn't acquire mock lock")
    }

    fn record(&self, request: MockRequest) {
        debug!(?request, "serving mock response");
        self.requests
            .lock()
            .expect("couldn't acquire mock lock")
            .push(request);
    }
}

impl CatalogService for MockClient {
    async fn list_records(&self, query: &ListingQuery) -> Result<ListingResponse, FetchError> {
        self.record(MockRequest::Listing(query.clone()));
        let response = self.lock().listings.pop_front();
        match response {
            Some(response) => response.resolve().await,
            None => panic!("no mock listing response queued for {query:?}"),
        }
    }

    async fn record_detail(&self, id: RecordId) -> Result<DetailResponse, FetchError> {
        self.record(MockRequest::Detail(id));
        let response = self.lock().details.pop_front();
        match response {
            Some(response) => response.resolve().await,
            None => panic!("no mock detail response queued for {id}"),
        }
    }

    async fn record_relations(&self, id: RecordId) -> Result<RelationsResponse, FetchError> {
        self.record(MockRequest::Relations(id));
        let response = self.lock().relations.pop_front();
        match response {
            Some(response) => response.resolve().await,
            None => panic!("no mock relations response queued for {id}"),
        }
    }

    async fn list_genres(&self) -> Result<GenreResponse, FetchError> {
        self.record(MockRequest::Genres);
        let response = self.lock().genres.pop_front();
        match response {
            Some(response) => response.resolve().await,
            None => panic!("no mock genres response queued"),
        }
    }
}

/// Reads a set of mock responses from disk.
fn read_mock_responses(path: impl AsRef<Path>) -> Result<MockData, MockDataError> {
    let contents = std::fs::read_to_string(path).map_err(MockDataError::ReadMockFile)?;
    serde_json::from_str(&contents).map_err(MockDataError::ParseJson)
}
