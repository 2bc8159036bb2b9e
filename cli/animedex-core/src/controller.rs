//! Listing state and the rules for when to fetch it.
//!
//! [QueryController] is a plain state machine. Every operation that needs
//! new data returns a [ListingTicket]; the caller performs the request and
//! feeds the result back through [QueryController::complete]. Tickets carry
//! a generation, so a response that arrives after a newer request was
//! issued is recognized and dropped.

use animedex_catalog::{
    Anime,
    DEFAULT_PAGE_SIZE,
    FetchError,
    ListingQuery,
    ListingResponse,
    RecordId,
    SortOrder,
};
use tracing::{debug, warn};

use crate::debounce::{DebounceTicket, Debouncer};
use crate::error::ControllerError;
use crate::filters::{PageState, QueryFilters, Snapshot};
use crate::outcome::Completion;

/// A listing request that should be performed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingTicket {
    generation: u64,
    query: ListingQuery,
}

impl ListingTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn query(&self) -> &ListingQuery {
        &self.query
    }

    pub fn into_parts(self) -> (u64, ListingQuery) {
        (self.generation, self.query)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListingPhase {
    /// Nothing was requested yet
    Idle,
    Loading,
    Succeeded,
    Failed(String),
}

#[derive(Debug)]
pub struct QueryController {
    filters: QueryFilters,
    /// Raw search input, applied to `filters` once it settled
    search_input: String,
    debouncer: Debouncer,
    page: PageState,
    page_size: u32,
    phase: ListingPhase,
    records: Vec<Anime>,
    generation: u64,
}

impl Default for QueryController {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl QueryController {
    pub fn new(page_size: u32) -> Self {
        Self::with_filters(QueryFilters::default(), page_size)
    }

    /// A controller whose first fetch uses `filters` instead of the defaults.
    pub fn with_filters(filters: QueryFilters, page_size: u32) -> Self {
        Self {
            search_input: filters.search_text.clone(),
            filters,
            debouncer: Debouncer::default(),
            page: PageState::default(),
            page_size,
            phase: ListingPhase::Idle,
            records: Vec::new(),
            generation: 0,
        }
    }

    pub fn filters(&self) -> &QueryFilters {
        &self.filters
    }

    /// The search text as typed, which may not have been applied yet.
    pub fn search_input(&self) -> &str {
        &self.search_input
    }

    pub fn page(&self) -> &PageState {
        &self.page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn phase(&self) -> &ListingPhase {
        &self.phase
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.phase, ListingPhase::Idle | ListingPhase::Loading)
    }

    pub fn error(&self) -> Option<&str> {
        match &self.phase {
            ListingPhase::Failed(message) => Some(message),
            _ => None,
        }
    }

    /// Records of the most recent successful listing.
    pub fn records(&self) -> &[Anime] {
        &self.records
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            filters: self.filters.clone(),
            page: self.page.current_page(),
        }
    }

    /// Issue the initial listing request.
    pub fn start(&mut self) -> ListingTicket {
        self.issue()
    }

    /// Record a keystroke in the search box.
    ///
    /// Returns a ticket to redeem via [Self::settle_search_text] once the
    /// input has been stable for the debounce window.
    pub fn set_search_text(&mut self, text: impl Into<String>) -> Option<DebounceTicket<String>> {
        let text = text.into();
        if text == self.search_input {
            return None;
        }
        self.search_input = text.clone();
        Some(self.debouncer.push(text))
    }

    /// Apply debounced search text.
    ///
    /// Yields a request only if the ticket is still current and the text
    /// differs from the applied text.
    pub fn settle_search_text(&mut self, ticket: DebounceTicket<String>) -> Option<ListingTicket> {
        let text = self.debouncer.settle(ticket)?;
        if text == self.filters.search_text {
            debug!(%text, "search text settled without change");
            return None;
        }
        self.filters.search_text = text;
        Some(self.filters_changed())
    }

    pub fn toggle_genre(&mut self, id: RecordId) -> ListingTicket {
        self.filters.toggle_genre(id);
        self.filters_changed()
    }

    pub fn set_sort(&mut self, sort: SortOrder) -> Option<ListingTicket> {
        if sort == self.filters.sort {
            return None;
        }
        self.filters.sort = sort;
        Some(self.filters_changed())
    }

    /// Move to `page`, which must lie within `1..=max(total_pages, 1)`.
    pub fn set_page(&mut self, page: u32) -> Result<Option<ListingTicket>, ControllerError> {
        if !self.page.set_current(page)? {
            return Ok(None);
        }
        Ok(Some(self.issue()))
    }

    pub fn next_page(&mut self) -> Option<ListingTicket> {
        if !self.page.has_next() {
            return None;
        }
        self.set_page(self.page.current_page() + 1).ok().flatten()
    }

    pub fn previous_page(&mut self) -> Option<ListingTicket> {
        if !self.page.has_previous() {
            return None;
        }
        self.set_page(self.page.current_page() - 1).ok().flatten()
    }

    /// Clear search, genres and sort and return to the first page, all at
    /// once.
    ///
    /// A pending search keystroke is dropped. Nothing is fetched if the
    /// state was already pristine.
    pub fn reset_all(&mut self) -> Option<ListingTicket> {
        self.debouncer.cancel();
        self.search_input.clear();

        let before = self.snapshot();
        self.filters = QueryFilters::default();
        self.page.reset();
        if self.snapshot() == before {
            return None;
        }
        Some(self.issue())
    }

    /// Re-issue the request for the current filters and page.
    pub fn retry(&mut self) -> ListingTicket {
        self.issue()
    }

    /// Apply the result of the request issued with `generation`.
    ///
    /// Failures keep the records of the last successful listing around.
    pub fn complete(
        &mut self,
        generation: u64,
        result: Result<ListingResponse, FetchError>,
    ) -> Completion {
        if generation != self.generation {
            debug!(
                generation,
                current = self.generation,
                "discarding stale listing response"
            );
            return Completion::Stale;
        }

        match result {
            Ok(listing) => {
                debug!(
                    records = listing.data.len(),
                    last_page = listing.pagination.last_visible_page,
                    "listing loaded"
                );
                self.records = listing.data;
                self.page.set_total(listing.pagination.last_visible_page);
                self.phase = ListingPhase::Succeeded;
            },
            Err(err) => {
                warn!(error = %err, "listing request failed");
                self.phase = ListingPhase::Failed(err.user_message());
            },
        }
        Completion::Applied
    }

    fn filters_changed(&mut self) -> ListingTicket {
        self.page.reset();
        self.issue()
    }

    fn issue(&mut self) -> ListingTicket {
        self.generation += 1;
        self.phase = ListingPhase::Loading;
        ListingTicket {
            generation: self.generation,
            query: self.snapshot().to_query(self.page_size),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use animedex_catalog::{Pagination, SortDirection, SortField};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use reqwest::StatusCode;

    use super::*;

    fn listing(ids: &[RecordId], last_visible_page: u32) -> ListingResponse {
        ListingResponse {
            data: ids
                .iter()
                .map(|id| Anime::new(*id, format!("Record {id}")))
                .collect(),
            pagination: Pagination {
                last_visible_page,
                has_next_page: last_visible_page > 1,
                ..Default::default()
            },
        }
    }

    fn server_error() -> FetchError {
        FetchError::Upstream {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: "boom".to_string(),
        }
    }

    /// A controller that loaded `total_pages` pages and sits on `page`.
    fn loaded_on_page(total_pages: u32, page: u32) -> QueryController {
        let mut controller = QueryController::default();
        let ticket = controller.start();
        controller.complete(ticket.generation(), Ok(listing(&[1, 2], total_pages)));
        if let Some(ticket) = controller.set_page(page).unwrap() {
            controller.complete(ticket.generation(), Ok(listing(&[3, 4], total_pages)));
        }
        controller
    }

    // region: initial load

    #[test]
    fn start_requests_first_page_with_defaults() {
        let mut controller = QueryController::default();
        assert!(controller.is_loading());

        let ticket = controller.start();
        assert_eq!(ticket.query(), &ListingQuery::default());
        assert_eq!(controller.phase(), &ListingPhase::Loading);
    }

    #[test]
    fn success_replaces_records_and_total() {
        let mut controller = QueryController::default();
        let ticket = controller.start();

        let completion = controller.complete(ticket.generation(), Ok(listing(&[5, 6], 7)));

        assert_eq!(completion, Completion::Applied);
        assert_eq!(controller.phase(), &ListingPhase::Succeeded);
        assert_eq!(
            controller.records().iter().map(|r| r.mal_id).collect::<Vec<_>>(),
            vec![5, 6]
        );
        assert_eq!(controller.page().total_pages(), 7);
    }

    // endregion

    // region: filters

    #[test]
    fn filter_change_returns_to_first_page() {
        let mut controller = loaded_on_page(10, 4);
        assert_eq!(controller.page().current_page(), 4);

        let ticket = controller.toggle_genre(1);

        assert_eq!(ticket.query().page, 1);
        assert_eq!(ticket.query().genre_ids, BTreeSet::from([1]));
        assert_eq!(controller.page().current_page(), 1);
    }

    #[test]
    fn same_sort_does_not_fetch() {
        let mut controller = loaded_on_page(3, 2);
        assert_eq!(controller.set_sort(SortOrder::default()), None);
        assert_eq!(controller.page().current_page(), 2);

        let score = SortOrder::new(SortField::Score, SortDirection::Desc);
        let ticket = controller.set_sort(score).unwrap();
        assert_eq!(ticket.query().sort, score);
        assert_eq!(ticket.query().page, 1);
    }

    #[test]
    fn search_text_applies_only_latest_settled_value() {
        let mut controller = QueryController::default();
        let first = controller.set_search_text("nar").unwrap();
        let second = controller.set_search_text("naruto").unwrap();
        assert_eq!(controller.search_input(), "naruto");
        assert_eq!(controller.filters().search_text, "");

        assert_eq!(controller.settle_search_text(first), None);
        let ticket = controller.settle_search_text(second).unwrap();
        assert_eq!(ticket.query().text, "naruto");
        assert_eq!(controller.filters().search_text, "naruto");
    }

    #[test]
    fn search_text_that_settles_unchanged_does_not_fetch() {
        let mut controller = QueryController::with_filters(
            QueryFilters {
                search_text: "bebop".to_string(),
                ..Default::default()
            },
            DEFAULT_PAGE_SIZE,
        );
        controller.set_search_text("bebo").unwrap();
        let back = controller.set_search_text("bebop").unwrap();
        assert_eq!(controller.set_search_text("bebop"), None);

        assert_eq!(controller.settle_search_text(back), None);
    }

    // endregion

    // region: pagination

    #[test]
    fn set_page_validates_range() {
        let mut controller = loaded_on_page(3, 1);

        assert_eq!(
            controller.set_page(4),
            Err(ControllerError::PageOutOfRange {
                page: 4,
                last_page: 3
            })
        );
        assert_eq!(controller.set_page(1), Ok(None));
        assert_eq!(controller.set_page(3).unwrap().unwrap().query().page, 3);
    }

    #[test]
    fn next_and_previous_stop_at_edges() {
        let mut controller = loaded_on_page(2, 1);
        assert_eq!(controller.previous_page(), None);

        let ticket = controller.next_page().unwrap();
        assert_eq!(ticket.query().page, 2);
        controller.complete(ticket.generation(), Ok(listing(&[9], 2)));

        assert_eq!(controller.next_page(), None);
        assert_eq!(controller.previous_page().unwrap().query().page, 1);
    }

    #[test]
    fn shrinking_listing_clamps_page_without_refetch() {
        let mut controller = loaded_on_page(5, 5);
        let ticket = controller.retry();

        controller.complete(ticket.generation(), Ok(listing(&[1], 2)));

        assert_eq!(controller.page().current_page(), 2);
        assert_eq!(controller.page().total_pages(), 2);
    }

    // endregion

    // region: reset

    #[test]
    fn reset_all_issues_single_default_request() {
        let mut controller = QueryController::with_filters(
            QueryFilters {
                search_text: "naruto".to_string(),
                genre_ids: BTreeSet::from([1, 5]),
                sort: SortOrder::new(SortField::Score, SortDirection::Desc),
            },
            DEFAULT_PAGE_SIZE,
        );
        let ticket = controller.start();
        controller.complete(ticket.generation(), Ok(listing(&[1], 5)));
        let ticket = controller.set_page(3).unwrap().unwrap();
        controller.complete(ticket.generation(), Ok(listing(&[2], 5)));

        let ticket = controller.reset_all().unwrap();

        assert_eq!(ticket.query(), &ListingQuery::default());
        assert!(controller.filters().is_default());
        assert_eq!(controller.search_input(), "");
        assert_eq!(controller.page().current_page(), 1);
    }

    #[test]
    fn reset_all_drops_pending_search_text() {
        let mut controller = loaded_on_page(1, 1);
        let pending = controller.set_search_text("eva").unwrap();

        assert_eq!(controller.reset_all(), None);
        assert_eq!(controller.settle_search_text(pending), None);
        assert_eq!(controller.search_input(), "");
    }

    // endregion

    // region: completion

    #[test]
    fn stale_response_is_discarded() {
        let mut controller = QueryController::default();
        let first = controller.start();
        let second = controller.toggle_genre(2);

        assert_eq!(
            controller.complete(second.generation(), Ok(listing(&[20], 1))),
            Completion::Applied
        );
        assert_eq!(
            controller.complete(first.generation(), Ok(listing(&[10], 9))),
            Completion::Stale
        );

        assert_eq!(controller.records()[0].mal_id, 20);
        assert_eq!(controller.page().total_pages(), 1);
    }

    #[test]
    fn failure_keeps_previous_records() {
        let mut controller = loaded_on_page(2, 1);
        let ticket = controller.toggle_genre(8);

        controller.complete(ticket.generation(), Err(server_error()));

        assert_eq!(
            controller.error(),
            Some("HTTP error 500 Internal Server Error: boom")
        );
        assert_eq!(controller.records().len(), 2);
    }

    #[test]
    fn retry_clears_error_and_reissues_current_query() {
        let mut controller = loaded_on_page(4, 3);
        let ticket = controller.toggle_genre(8);
        controller.complete(ticket.generation(), Err(server_error()));

        let retry = controller.retry();

        assert_eq!(retry.query(), ticket.query());
        assert_eq!(controller.error(), None);
        assert!(controller.is_loading());
    }

    // endregion

    #[derive(Debug, Clone)]
    enum FilterChange {
        Genre(RecordId),
        Sort(usize),
        Search(String),
    }

    fn filter_change() -> impl Strategy<Value = FilterChange> {
        prop_oneof![
            (1..20u32).prop_map(FilterChange::Genre),
            (0..SortOrder::PRESETS.len()).prop_map(FilterChange::Sort),
            "[a-z]{0,6}".prop_map(FilterChange::Search),
        ]
    }

    proptest! {
        #[test]
        fn every_filter_driven_fetch_targets_first_page(
            start_page in 1..10u32,
            changes in proptest::collection::vec(filter_change(), 1..8),
        ) {
            let mut controller = loaded_on_page(10, start_page);
            let mut refetched = false;

            for change in changes {
                let ticket = match change {
                    FilterChange::Genre(id) => Some(controller.toggle_genre(id)),
                    FilterChange::Sort(index) => controller.set_sort(SortOrder::PRESETS[index]),
                    FilterChange::Search(text) => controller
                        .set_search_text(text)
                        .and_then(|pending| controller.settle_search_text(pending)),
                };
                if let Some(ticket) = ticket {
                    refetched = true;
                    prop_assert_eq!(ticket.query().page, 1);
                    controller.complete(ticket.generation(), Ok(listing(&[1], 10)));
                }
                if refetched {
                    prop_assert_eq!(controller.page().current_page(), 1);
                }
            }
        }
    }
}
