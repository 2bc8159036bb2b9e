//! Browsing state for the anime catalog.
//!
//! The listing controller, detail aggregator and genre taxonomy are
//! synchronous state machines that decide when a request is needed and
//! whether a response still applies. [session::Session] connects them to a
//! [animedex_catalog::CatalogService] and owns the timers.

pub mod controller;
pub mod debounce;
pub mod detail;
mod error;
pub mod filters;
pub mod genres;
pub mod outcome;
pub mod projection;
pub mod session;

pub use controller::{ListingPhase, ListingTicket, QueryController};
pub use detail::{DetailAggregator, DetailBundle, DetailError, DetailPart, fetch_detail};
pub use error::ControllerError;
pub use filters::{PageState, QueryFilters, Snapshot};
pub use genres::GenreTaxonomy;
pub use outcome::{Completion, FetchOutcome};
pub use projection::{DetailView, ListingView, PaginationView};
pub use session::{DEFAULT_LATENCY_FLOOR, Session, SessionSettings, Update};
