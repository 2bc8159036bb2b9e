//! Filter, sort and pagination state.

use std::collections::BTreeSet;

use animedex_catalog::{ListingQuery, RecordId, SortOrder};
use serde::Serialize;

use crate::error::ControllerError;

/// The user's filter and sort selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueryFilters {
    pub search_text: String,
    pub genre_ids: BTreeSet<RecordId>,
    pub sort: SortOrder,
}

impl QueryFilters {
    /// Select `id` if it isn't selected yet, deselect it otherwise.
    ///
    /// Returns whether the genre is selected afterwards.
    pub fn toggle_genre(&mut self, id: RecordId) -> bool {
        if self.genre_ids.remove(&id) {
            false
        } else {
            self.genre_ids.insert(id);
            true
        }
    }

    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }
}

/// Position within a paginated listing.
///
/// `current_page` is 1-based and never exceeds `max(total_pages, 1)`.
/// `total_pages` is 0 until the first listing arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageState {
    current_page: u32,
    total_pages: u32,
}

impl Default for PageState {
    fn default() -> Self {
        Self {
            current_page: 1,
            total_pages: 0,
        }
    }
}

impl PageState {
    pub fn current_page(&self) -> u32 {
        self.current_page
    }

    pub fn total_pages(&self) -> u32 {
        self.total_pages
    }

    /// The highest page that may be selected.
    pub fn last_page(&self) -> u32 {
        self.total_pages.max(1)
    }

    pub fn has_previous(&self) -> bool {
        self.current_page > 1
    }

    pub fn has_next(&self) -> bool {
        self.current_page < self.total_pages
    }

    /// Go back to the first page.
    ///
    /// Returns whether the page changed.
    pub(crate) fn reset(&mut self) -> bool {
        let changed = self.current_page != 1;
        self.current_page = 1;
        changed
    }

    /// Returns whether the page changed.
    pub(crate) fn set_current(&mut self, page: u32) -> Result<bool, ControllerError> {
        if page == 0 || page > self.last_page() {
            return Err(ControllerError::PageOutOfRange {
                page,
                last_page: self.last_page(),
            });
        }
        let changed = self.current_page != page;
        self.current_page = page;
        Ok(changed)
    }

    /// Record the number of pages reported by the catalog.
    ///
    /// If the current page no longer exists it is moved to the last page.
    pub(crate) fn set_total(&mut self, total_pages: u32) {
        self.total_pages = total_pages;
        self.current_page = self.current_page.min(self.last_page());
    }
}

/// The filter and page values a listing request was issued for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub filters: QueryFilters,
    pub page: u32,
}

impl Snapshot {
    pub fn to_query(&self, page_size: u32) -> ListingQuery {
        ListingQuery {
            page: self.page,
            limit: page_size,
            text: self.filters.search_text.clone(),
            genre_ids: self.filters.genre_ids.clone(),
            sort: self.filters.sort,
        }
    }
}
