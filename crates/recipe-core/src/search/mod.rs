//! Recipe search: filter state, its URL form, the HTTP backend, and the
//! controller tying them to the lifecycle manager.

mod client;
mod controller;
mod history;
mod state;
pub mod url;

pub use client::{HttpSearchClient, SearchBackend, SearchResults, parse_search_response};
pub use controller::{
    ControllerOptions, DEFAULT_SEARCH_DEBOUNCE, PendingSearch, SEARCH_REQUEST_ID, SearchCommand,
    SearchController, SearchDispatch, SearchOutcome, SearchStateEvent,
};
pub use history::{LocationHistory, MemoryHistory};
pub use state::{
    AppliedFilter, DEFAULT_PAGE_SIZE, DEFAULT_SORT_FIELD, FilterCategory, MAX_PAGE_SIZE,
    SearchFilters, SearchState, SortDirection, Tag, TagKind, TagLogic,
};
