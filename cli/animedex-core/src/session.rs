//! Drive the state machines against a [CatalogService].
//!
//! A [Session] owns the listing controller, the detail aggregator and the
//! genre taxonomy. User actions are plain method calls that may schedule
//! work; scheduled requests and debounce timers are polled on the current
//! task by [Session::next_update], which applies one finished piece of work
//! at a time. Nothing is spawned, so a session needs neither `Send` nor a
//! multi-threaded runtime.

use std::rc::Rc;
use std::time::Duration;

use animedex_catalog::{
    CatalogService,
    DEFAULT_PAGE_SIZE,
    FetchError,
    Genre,
    GenreResponse,
    ListingResponse,
    RecordId,
    SortOrder,
};
use futures::future::LocalBoxFuture;
use futures::stream::FuturesUnordered;
use futures::{FutureExt, StreamExt};
use once_cell::unsync::OnceCell;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::controller::{ListingTicket, QueryController};
use crate::debounce::{DEFAULT_DEBOUNCE, DebounceTicket, settle_after};
use crate::detail::{DetailAggregator, DetailBundle, DetailError, DetailTicket, fetch_detail};
use crate::error::ControllerError;
use crate::filters::QueryFilters;
use crate::genres::GenreTaxonomy;
use crate::outcome::Completion;
use crate::projection::{DetailView, ListingView};

/// Minimum time between issuing a listing request and sending it.
pub const DEFAULT_LATENCY_FLOOR: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    pub page_size: u32,
    pub debounce: Duration,
    pub latency_floor: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            debounce: DEFAULT_DEBOUNCE,
            latency_floor: DEFAULT_LATENCY_FLOOR,
        }
    }
}

enum SessionEvent {
    SearchSettled(DebounceTicket<String>),
    ListingCompleted {
        generation: u64,
        result: Result<ListingResponse, FetchError>,
    },
    DetailCompleted {
        generation: u64,
        result: Result<DetailBundle, DetailError>,
    },
    GenresLoaded(Result<GenreResponse, FetchError>),
}

/// What a single step of the session changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Update {
    /// Settled search text scheduled a new listing request
    ListingRequested,
    /// A listing response was applied
    Listing,
    /// A detail response was applied
    Detail,
    /// The genre request finished, the taxonomy is empty if it failed
    Genres,
    /// A response arrived for a superseded request
    Discarded,
    Unchanged,
}

pub struct Session<S> {
    service: Rc<S>,
    settings: SessionSettings,
    controller: QueryController,
    detail: DetailAggregator,
    genres: OnceCell<GenreTaxonomy>,
    genres_loading: bool,
    in_flight: FuturesUnordered<LocalBoxFuture<'static, SessionEvent>>,
}

impl<S> std::fmt::Debug for Session<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("settings", &self.settings)
            .field("controller", &self.controller)
            .field("detail", &self.detail)
            .field("in_flight", &self.in_flight.len())
            .finish_non_exhaustive()
    }
}

impl<S: CatalogService + 'static> Session<S> {
    pub fn new(service: S, settings: SessionSettings) -> Self {
        Self::with_filters(service, settings, QueryFilters::default())
    }

    pub fn with_filters(service: S, settings: SessionSettings, filters: QueryFilters) -> Self {
        Self {
            service: Rc::new(service),
            settings,
            controller: QueryController::with_filters(filters, settings.page_size),
            detail: DetailAggregator::default(),
            genres: OnceCell::new(),
            genres_loading: false,
            in_flight: FuturesUnordered::new(),
        }
    }

    pub fn controller(&self) -> &QueryController {
        &self.controller
    }

    pub fn detail(&self) -> &DetailAggregator {
        &self.detail
    }

    pub fn listing_view(&self) -> ListingView<'_> {
        ListingView::project(&self.controller)
    }

    pub fn detail_view(&self) -> DetailView<'_> {
        DetailView::project(&self.detail)
    }

    /// Number of requests and timers that haven't finished yet.
    pub fn pending(&self) -> usize {
        self.in_flight.len()
    }

    // region: listing actions

    pub fn start(&mut self) {
        let ticket = self.controller.start();
        self.schedule_listing(ticket);
    }

    pub fn set_search_text(&mut self, text: impl Into<String>) {
        if let Some(ticket) = self.controller.set_search_text(text) {
            let window = self.settings.debounce;
            self.in_flight.push(
                settle_after(ticket, window)
                    .map(SessionEvent::SearchSettled)
                    .boxed_local(),
            );
        }
    }

    pub fn toggle_genre(&mut self, id: RecordId) {
        let ticket = self.controller.toggle_genre(id);
        self.schedule_listing(ticket);
    }

    pub fn set_sort(&mut self, sort: SortOrder) {
        if let Some(ticket) = self.controller.set_sort(sort) {
            self.schedule_listing(ticket);
        }
    }

    pub fn set_page(&mut self, page: u32) -> Result<(), ControllerError> {
        if let Some(ticket) = self.controller.set_page(page)? {
            self.schedule_listing(ticket);
        }
        Ok(())
    }

    /// Returns false if already on the last page.
    pub fn next_page(&mut self) -> bool {
        let Some(ticket) = self.controller.next_page() else {
            return false;
        };
        self.schedule_listing(ticket);
        true
    }

    /// Returns false if already on the first page.
    pub fn previous_page(&mut self) -> bool {
        let Some(ticket) = self.controller.previous_page() else {
            return false;
        };
        self.schedule_listing(ticket);
        true
    }

    pub fn reset_all(&mut self) {
        if let Some(ticket) = self.controller.reset_all() {
            self.schedule_listing(ticket);
        }
    }

    pub fn retry_listing(&mut self) {
        let ticket = self.controller.retry();
        self.schedule_listing(ticket);
    }

    // endregion

    // region: detail actions

    pub fn select_record(&mut self, id: RecordId) {
        if let Some(ticket) = self.detail.select(id) {
            self.schedule_detail(ticket);
        }
    }

    pub fn close_detail(&mut self) {
        self.detail.close();
    }

    pub fn retry_detail(&mut self) {
        if let Some(ticket) = self.detail.retry() {
            self.schedule_detail(ticket);
        }
    }

    // endregion

    // region: genres

    /// Schedule loading the genre taxonomy, unless it is loaded or loading
    /// already.
    ///
    /// The request runs next to listing and detail requests. A failed load
    /// is logged and leaves the taxonomy empty, calling this again retries.
    pub fn load_genres(&mut self) {
        if self.genres.get().is_some() || self.genres_loading {
            return;
        }
        debug!("scheduling genre request");
        self.genres_loading = true;
        let service = Rc::clone(&self.service);
        self.in_flight.push(
            async move { SessionEvent::GenresLoaded(service.list_genres().await) }.boxed_local(),
        );
    }

    pub fn genres_loading(&self) -> bool {
        self.genres_loading
    }

    /// Genres loaded so far, empty until a [Self::load_genres] request succeeded.
    pub fn genres(&self) -> &[Genre] {
        self.genres
            .get()
            .map(GenreTaxonomy::genres)
            .unwrap_or_default()
    }

    pub fn taxonomy(&self) -> Option<&GenreTaxonomy> {
        self.genres.get()
    }

    // endregion

    /// Wait for the next scheduled request or timer and apply its result.
    ///
    /// Returns `None` once nothing is scheduled.
    pub async fn next_update(&mut self) -> Option<Update> {
        let event = self.in_flight.next().await?;
        Some(self.apply(event))
    }

    /// Apply results until nothing is scheduled anymore.
    pub async fn run_until_idle(&mut self) {
        while self.next_update().await.is_some() {}
    }

    fn apply(&mut self, event: SessionEvent) -> Update {
        match event {
            SessionEvent::SearchSettled(ticket) => {
                match self.controller.settle_search_text(ticket) {
                    Some(ticket) => {
                        self.schedule_listing(ticket);
                        Update::ListingRequested
                    },
                    None => Update::Unchanged,
                }
            },
            SessionEvent::ListingCompleted { generation, result } => {
                match self.controller.complete(generation, result) {
                    Completion::Applied => Update::Listing,
                    Completion::Stale => Update::Discarded,
                }
            },
            SessionEvent::DetailCompleted { generation, result } => {
                match self.detail.complete(generation, result) {
                    Completion::Applied => Update::Detail,
                    Completion::Stale => Update::Discarded,
                }
            },
            SessionEvent::GenresLoaded(result) => {
                self.genres_loading = false;
                match result {
                    Ok(response) => {
                        debug!(count = response.data.len(), "loaded genres");
                        let _ = self.genres.set(GenreTaxonomy::from_genres(response.data));
                    },
                    Err(err) => warn!(error = %err, "could not load genres"),
                }
                Update::Genres
            },
        }
    }

    fn schedule_listing(&mut self, ticket: ListingTicket) {
        let service = Rc::clone(&self.service);
        let send_at = Instant::now() + self.settings.latency_floor;
        let (generation, query) = ticket.into_parts();
        debug!(generation, ?query, "scheduling listing request");

        self.in_flight.push(
            async move {
                tokio::time::sleep_until(send_at).await;
                let result = service.list_records(&query).await;
                SessionEvent::ListingCompleted { generation, result }
            }
            .boxed_local(),
        );
    }

    fn schedule_detail(&mut self, ticket: DetailTicket) {
        let service = Rc::clone(&self.service);
        let generation = ticket.generation();
        let id = ticket.id();
        debug!(generation, id, "scheduling detail request");

        self.in_flight.push(
            async move {
                let result = fetch_detail(service.as_ref(), id).await;
                SessionEvent::DetailCompleted { generation, result }
            }
            .boxed_local(),
        );
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use animedex_catalog::{
        Anime,
        DetailResponse,
        ListingQuery,
        MockClient,
        MockRequest,
        MockResponse,
        Pagination,
        RelationsResponse,
        SortDirection,
        SortField,
    };
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::controller::ListingPhase;
    use crate::outcome::FetchOutcome;

    fn listing(ids: &[RecordId], last_visible_page: u32) -> MockResponse<ListingResponse> {
        MockResponse::ok(ListingResponse {
            data: ids.iter().map(|id| Anime::new(*id, format!("Record {id}"))).collect(),
            pagination: Pagination {
                last_visible_page,
                has_next_page: last_visible_page > 1,
                ..Default::default()
            },
        })
    }

    fn record_ids<S: CatalogService + 'static>(session: &Session<S>) -> Vec<RecordId> {
        session
            .controller()
            .records()
            .iter()
            .map(|record| record.mal_id)
            .collect()
    }

    fn session(client: &MockClient) -> Session<MockClient> {
        Session::new(client.clone(), SessionSettings::default())
    }

    // region: listing

    #[tokio::test(start_paused = true)]
    async fn listing_waits_for_latency_floor() {
        let client = MockClient::default();
        client.push_listing(listing(&[1], 1));
        let mut session = session(&client);

        let start = Instant::now();
        session.start();
        assert_eq!(session.next_update().await, Some(Update::Listing));

        assert!(start.elapsed() >= DEFAULT_LATENCY_FLOOR);
        assert_eq!(record_ids(&session), vec![1]);
        assert_eq!(session.next_update().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_typing_fetches_once_with_final_text() {
        let client = MockClient::default();
        client.push_listing(listing(&[20], 1));
        let mut session = session(&client);

        for text in ["n", "na", "nar", "naru"] {
            session.set_search_text(text);
            tokio::time::advance(Duration::from_millis(100)).await;
        }
        session.run_until_idle().await;

        let queries = client.listing_queries();
        assert_eq!(queries.len(), 1);
        assert_eq!(queries[0].text, "naru");
        assert_eq!(session.controller().filters().search_text, "naru");
    }

    #[tokio::test(start_paused = true)]
    async fn filter_change_fetches_first_page_once() {
        let client = MockClient::default();
        client.push_listing(listing(&[1], 5));
        client.push_listing(listing(&[2], 5));
        client.push_listing(listing(&[3], 2));
        let mut session = session(&client);

        session.start();
        session.run_until_idle().await;
        session.set_page(3).unwrap();
        session.run_until_idle().await;
        assert_eq!(session.controller().page().current_page(), 3);

        session.toggle_genre(10);
        session.run_until_idle().await;

        let pages: Vec<u32> = client.listing_queries().iter().map(|q| q.page).collect();
        assert_eq!(pages, vec![1, 3, 1]);
        assert_eq!(session.controller().page().current_page(), 1);
        assert_eq!(session.controller().page().total_pages(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn late_response_for_old_filters_is_discarded() {
        let client = MockClient::default();
        client.push_listing(listing(&[1, 2, 3], 4).delayed(Duration::from_secs(1)));
        client.push_listing(listing(&[9], 1).delayed(Duration::from_millis(100)));
        let mut session = session(&client);

        session.start();
        // let the first request get sent before the filters change
        let pending = tokio::time::timeout(Duration::from_millis(300), session.next_update()).await;
        assert!(pending.is_err());

        session.toggle_genre(4);
        assert_eq!(session.next_update().await, Some(Update::Listing));
        assert_eq!(session.next_update().await, Some(Update::Discarded));
        assert_eq!(session.next_update().await, None);

        assert_eq!(record_ids(&session), vec![9]);
        assert_eq!(session.controller().phase(), &ListingPhase::Succeeded);
        assert_eq!(session.controller().page().total_pages(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_listing_keeps_records_until_retry() {
        let client = MockClient::default();
        client.push_listing(listing(&[1, 2], 1));
        client.push_listing(MockResponse::error(500, "upstream down"));
        client.push_listing(listing(&[3], 1));
        let mut session = session(&client);

        session.start();
        session.run_until_idle().await;
        session.set_sort(SortOrder::new(SortField::Score, SortDirection::Desc));
        session.run_until_idle().await;

        assert_eq!(
            session.listing_view(),
            ListingView::Error {
                message: "HTTP error 500 Internal Server Error: upstream down"
            }
        );
        assert_eq!(record_ids(&session), vec![1, 2]);

        session.retry_listing();
        session.run_until_idle().await;

        let queries = client.listing_queries();
        assert_eq!(queries[1], queries[2]);
        assert_eq!(record_ids(&session), vec![3]);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_all_issues_exactly_one_request() {
        let client = MockClient::default();
        client.push_listing(listing(&[1], 5));
        client.push_listing(listing(&[2], 5));
        client.push_listing(listing(&[3], 8));
        let mut session = Session::with_filters(
            client.clone(),
            SessionSettings::default(),
            QueryFilters {
                search_text: "naruto".to_string(),
                genre_ids: BTreeSet::from([1, 5]),
                sort: SortOrder::new(SortField::Score, SortDirection::Desc),
            },
        );

        session.start();
        session.run_until_idle().await;
        session.set_page(3).unwrap();
        session.run_until_idle().await;

        session.set_search_text("naruto shippuden");
        session.reset_all();
        session.run_until_idle().await;

        let queries = client.listing_queries();
        assert_eq!(queries.len(), 3);
        assert_eq!(queries[2], ListingQuery::default());
        assert_eq!(session.controller().search_input(), "");
    }

    // endregion

    // region: detail

    #[tokio::test(start_paused = true)]
    async fn detail_fails_when_relations_fail() {
        let client = MockClient::default();
        client.push_detail(MockResponse::ok(DetailResponse {
            data: Anime::new(7, "Seven"),
        }));
        client.push_relations(MockResponse::error(500, "relations unavailable"));
        let mut session = session(&client);

        session.select_record(7);
        assert_eq!(session.detail_view(), DetailView::Loading { id: 7 });
        session.run_until_idle().await;

        assert_eq!(session.detail_view(), DetailView::Error {
            id: 7,
            message: "HTTP error 500 Internal Server Error: relations unavailable"
        });
        assert_eq!(client.requests(), vec![
            MockRequest::Detail(7),
            MockRequest::Relations(7)
        ]);
    }

    #[tokio::test(start_paused = true)]
    async fn switching_records_discards_previous_detail() {
        let client = MockClient::default();
        let slow = Duration::from_secs(2);
        client.push_detail(MockResponse::ok(DetailResponse { data: Anime::new(1, "One") }).delayed(slow));
        client.push_relations(MockResponse::ok(RelationsResponse { data: Vec::new() }).delayed(slow));
        client.push_detail(MockResponse::ok(DetailResponse { data: Anime::new(2, "Two") }));
        client.push_relations(MockResponse::ok(RelationsResponse { data: Vec::new() }));
        let mut session = session(&client);

        session.select_record(1);
        let pending = tokio::time::timeout(Duration::from_millis(10), session.next_update()).await;
        assert!(pending.is_err());
        session.select_record(2);
        session.run_until_idle().await;

        assert_eq!(session.detail().selected(), Some(2));
        let Some(FetchOutcome::Succeeded(bundle)) = session.detail().outcome() else {
            panic!("expected loaded detail");
        };
        assert_eq!(bundle.record.title, "Two");
    }

    #[tokio::test(start_paused = true)]
    async fn closing_detail_ignores_late_result() {
        let client = MockClient::default();
        client.push_detail(MockResponse::ok(DetailResponse { data: Anime::new(1, "One") }));
        client.push_relations(MockResponse::ok(RelationsResponse { data: Vec::new() }));
        let mut session = session(&client);

        session.select_record(1);
        session.close_detail();
        assert_eq!(session.next_update().await, Some(Update::Discarded));
        assert_eq!(session.detail_view(), DetailView::Closed);
    }

    // endregion

    // region: genres

    fn genre_response(genres: Vec<Genre>) -> MockResponse<GenreResponse> {
        MockResponse::ok(GenreResponse { data: genres })
    }

    #[tokio::test]
    async fn genres_are_loaded_once_and_sorted() {
        let client = MockClient::default();
        client.push_genres(genre_response(vec![
            Genre::new(22, "Romance"),
            Genre::new(1, "Action"),
        ]));
        let mut session = session(&client);
        assert!(session.genres().is_empty());

        session.load_genres();
        session.load_genres();
        assert!(session.genres_loading());
        assert_eq!(session.next_update().await, Some(Update::Genres));

        let names: Vec<&str> = session.genres().iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, vec!["Action", "Romance"]);

        session.load_genres();
        assert_eq!(session.pending(), 0);
        assert_eq!(client.requests(), vec![MockRequest::Genres]);
    }

    #[tokio::test]
    async fn genre_failure_yields_empty_list_until_reloaded() {
        let client = MockClient::default();
        client.push_genres(MockResponse::error(503, "maintenance"));
        client.push_genres(genre_response(vec![Genre::new(1, "Action")]));
        let mut session = session(&client);

        session.load_genres();
        assert_eq!(session.next_update().await, Some(Update::Genres));
        assert!(session.genres().is_empty());
        assert!(session.taxonomy().is_none());
        assert!(!session.genres_loading());

        session.load_genres();
        session.run_until_idle().await;
        assert_eq!(session.genres().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_genres_do_not_hold_back_listing() {
        let client = MockClient::default();
        client.push_listing(listing(&[1], 1));
        client.push_genres(MockResponse::error(503, "maintenance").delayed(Duration::from_secs(5)));
        let mut session = session(&client);

        let start = Instant::now();
        session.start();
        session.load_genres();

        assert_eq!(session.next_update().await, Some(Update::Listing));
        assert!(start.elapsed() < Duration::from_secs(5));
        assert_eq!(session.controller().phase(), &ListingPhase::Succeeded);
        assert_eq!(record_ids(&session), vec![1]);
        assert_eq!(session.pending(), 1);

        assert_eq!(session.next_update().await, Some(Update::Genres));
        assert!(start.elapsed() >= Duration::from_secs(5));
        assert!(session.genres().is_empty());
    }

    // endregion
}
