//! Derive what should be displayed from controller state.

use animedex_catalog::{Anime, RecordId};
use serde::Serialize;

use crate::controller::{ListingPhase, QueryController};
use crate::detail::{DetailAggregator, DetailBundle};
use crate::filters::PageState;
use crate::outcome::FetchOutcome;

/// How the listing area should look.
#[derive(Debug, Clone, PartialEq)]
pub enum ListingView<'a> {
    /// Loading with nothing to show yet
    Skeleton { placeholders: usize },
    /// The last request failed and offers a retry
    Error { message: &'a str },
    /// The last request succeeded without results
    Empty,
    Populated {
        records: &'a [Anime],
        pagination: PaginationView,
        /// A newer request is in flight, the records are from an older one
        dimmed: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PaginationView {
    pub current_page: u32,
    pub total_pages: u32,
    pub has_previous: bool,
    pub has_next: bool,
}

impl PaginationView {
    /// Only shown when there is more than one page.
    pub fn is_visible(&self) -> bool {
        self.total_pages > 1
    }
}

impl From<&PageState> for PaginationView {
    fn from(page: &PageState) -> Self {
        Self {
            current_page: page.current_page(),
            total_pages: page.total_pages(),
            has_previous: page.has_previous(),
            has_next: page.has_next(),
        }
    }
}

impl<'a> ListingView<'a> {
    pub fn project(controller: &'a QueryController) -> Self {
        let records = controller.records();
        match controller.phase() {
            ListingPhase::Failed(message) => ListingView::Error {
                message: message.as_str(),
            },
            ListingPhase::Idle | ListingPhase::Loading if records.is_empty() => {
                ListingView::Skeleton {
                    placeholders: controller.page_size() as usize,
                }
            },
            ListingPhase::Succeeded if records.is_empty() => ListingView::Empty,
            phase => ListingView::Populated {
                records,
                pagination: controller.page().into(),
                dimmed: *phase != ListingPhase::Succeeded,
            },
        }
    }
}

/// How the detail panel should look.
#[derive(Debug, Clone, PartialEq)]
pub enum DetailView<'a> {
    Closed,
    Loading { id: RecordId },
    Error { id: RecordId, message: &'a str },
    Populated { id: RecordId, bundle: &'a DetailBundle },
}

impl<'a> DetailView<'a> {
    pub fn project(aggregator: &'a DetailAggregator) -> Self {
        let (Some(id), Some(outcome)) = (aggregator.selected(), aggregator.outcome()) else {
            return DetailView::Closed;
        };
        match outcome {
            FetchOutcome::Loading => DetailView::Loading { id },
            FetchOutcome::Failed(message) => DetailView::Error {
                id,
                message: message.as_str(),
            },
            FetchOutcome::Succeeded(bundle) => DetailView::Populated { id, bundle },
        }
    }
}
