//! Details of a single selected record.
//!
//! A record's detail view needs two requests, the full record and its
//! relations. [fetch_detail] runs both concurrently and fails as a whole if
//! either fails. [DetailAggregator] tracks which record is selected and
//! drops results for records that are no longer selected.

use std::fmt;

use animedex_catalog::{Anime, CatalogService, FetchError, RecordId, RelationGroup};
use futures::future::try_join;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::outcome::{Completion, FetchOutcome};

/// A record together with its relations.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailBundle {
    pub record: Anime,
    pub relations: Vec<RelationGroup>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetailPart {
    Record,
    Relations,
}

impl fmt::Display for DetailPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetailPart::Record => write!(f, "record"),
            DetailPart::Relations => write!(f, "relations"),
        }
    }
}

#[derive(Debug, Error)]
pub enum DetailError {
    /// One of the two requests failed, the other one's result was dropped.
    #[error("{}", .error.user_message())]
    PartialFailure { part: DetailPart, error: FetchError },
}

impl DetailError {
    pub fn part(&self) -> DetailPart {
        match self {
            DetailError::PartialFailure { part, .. } => *part,
        }
    }
}

/// Fetch record `id` and its relations concurrently.
///
/// The first failure wins, the other request is abandoned.
#[instrument(skip(service))]
pub async fn fetch_detail<S>(service: &S, id: RecordId) -> Result<DetailBundle, DetailError>
where
    S: CatalogService + ?Sized,
{
    let record = async {
        service
            .record_detail(id)
            .await
            .map_err(|error| DetailError::PartialFailure {
                part: DetailPart::Record,
                error,
            })
    };
    let relations = async {
        service
            .record_relations(id)
            .await
            .map_err(|error| DetailError::PartialFailure {
                part: DetailPart::Relations,
                error,
            })
    };

    let (record, relations) = try_join(record, relations).await?;
    Ok(DetailBundle {
        record: record.data,
        relations: relations.data,
    })
}

/// A detail request that should be performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetailTicket {
    generation: u64,
    id: RecordId,
}

impl DetailTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn id(&self) -> RecordId {
        self.id
    }
}

#[derive(Debug, Default)]
pub struct DetailAggregator {
    generation: u64,
    selected: Option<(RecordId, FetchOutcome<DetailBundle>)>,
}

impl DetailAggregator {
    pub fn selected(&self) -> Option<RecordId> {
        self.selected.as_ref().map(|(id, _)| *id)
    }

    pub fn outcome(&self) -> Option<&FetchOutcome<DetailBundle>> {
        self.selected.as_ref().map(|(_, outcome)| outcome)
    }

    /// Open the detail view for `id`.
    ///
    /// Selecting the record that is already shown or loading does nothing.
    pub fn select(&mut self, id: RecordId) -> Option<DetailTicket> {
        match &self.selected {
            Some((current, FetchOutcome::Loading | FetchOutcome::Succeeded(_)))
                if *current == id =>
            {
                None
            },
            _ => Some(self.issue(id)),
        }
    }

    /// Close the detail view, abandoning any request in flight.
    pub fn close(&mut self) {
        self.generation += 1;
        self.selected = None;
    }

    /// Request the selected record again.
    pub fn retry(&mut self) -> Option<DetailTicket> {
        let id = self.selected()?;
        Some(self.issue(id))
    }

    pub fn complete(
        &mut self,
        generation: u64,
        result: Result<DetailBundle, DetailError>,
    ) -> Completion {
        if generation != self.generation {
            debug!(
                generation,
                current = self.generation,
                "discarding stale detail response"
            );
            return Completion::Stale;
        }
        let Some((id, outcome)) = self.selected.as_mut() else {
            return Completion::Stale;
        };

        *outcome = match result {
            Ok(bundle) => FetchOutcome::Succeeded(bundle),
            Err(err) => {
                warn!(id = *id, part = %err.part(), error = %err, "detail request failed");
                FetchOutcome::Failed(err.to_string())
            },
        };
        Completion::Applied
    }

    fn issue(&mut self, id: RecordId) -> DetailTicket {
        self.generation += 1;
        self.selected = Some((id, FetchOutcome::Loading));
        DetailTicket {
            generation: self.generation,
            id,
        }
    }
}
