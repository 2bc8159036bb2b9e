//! Error handling for catalog API operations.

use std::error::Error as _;

use reqwest::StatusCode;
use thiserror::Error;

/// Fallback used when an error response carries no readable `message`.
pub const UNKNOWN_API_ERROR: &str = "Unknown API error";

/// Errors produced while fetching from the catalog.
///
/// Neither the fetch client nor the query builders swallow these;
/// they are converted into user visible state by the consumers in
/// `animedex-core`.
#[derive(Debug, Error)]
pub enum FetchError {
    /// No response reached us, even after retrying.
    #[error("could not reach the catalog")]
    Network(#[source] reqwest::Error),

    /// The catalog answered with a non-2xx, non-429 status.
    #[error("HTTP error {status}: {message}")]
    Upstream { status: StatusCode, message: String },

    /// Every attempt was rate limited.
    #[error("catalog kept rate limiting requests, gave up after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },

    /// A 2xx response whose body does not match the expected envelope.
    #[error("could not parse catalog response")]
    Decode(#[source] serde_json::Error),
}

impl FetchError {
    /// The message shown to users when a request failed.
    ///
    /// Includes the chain of sources, so transport failures say why the
    /// catalog could not be reached.
    pub fn user_message(&self) -> String {
        let mut message = self.to_string();
        let mut source = self.source();
        while let Some(err) = source {
            message.push_str(": ");
            message.push_str(&err.to_string());
            source = err.source();
        }
        message
    }

    /// The HTTP status of an upstream error response, if any.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            FetchError::Upstream { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Errors constructing a [crate::JikanClient].
#[derive(Debug, Error)]
pub enum CatalogClientError {
    #[error("invalid catalog url '{url}'")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("catalog url '{0}' cannot be used as a base url")]
    NotABaseUrl(String),
    #[error("invalid header: {0}")]
    InvalidHeader(String),
    #[error("could not build http client")]
    Http(#[source] reqwest::Error),
}

/// Errors reading canned responses for the [crate::MockClient].
#[derive(Debug, Error)]
pub enum MockDataError {
    #[error("couldn't read mock data file")]
    ReadMockFile(#[source] std::io::Error),
    #[error("couldn't parse mock data")]
    ParseJson(#[source] serde_json::Error),
}
