//! Search state controller.
//!
//! Owns the canonical [`SearchState`], issues searches through the lifecycle
//! manager and race guard, and commits settled results. Issuing and
//! committing are split so that the controller is never borrowed across an
//! await: `execute_search` hands back a [`PendingSearch`], the caller awaits
//! it, and `apply_outcome` re-checks currency before anything is recorded.

use super::client::{SearchBackend, SearchResults};
use super::history::LocationHistory;
use super::state::{
    AppliedFilter, DEFAULT_SORT_FIELD, FilterCategory, MAX_PAGE_SIZE, SearchFilters, SearchState,
    SortDirection, Tag, TagLogic,
};
use super::url::{QueryScope, merge_query_string, to_query_string};
use crate::bus::{
    BusMessage, ExecuteSearchEvent, PHASE_CACHED, PHASE_FAILED, PHASE_FINISHED, SearchBus,
    SearchSettledEvent,
};
use crate::config::AppConfig;
use crate::error::SearchError;
use crate::lifecycle::RequestLifecycleManager;
use crate::race_guard::{RaceGuard, Ticket};
use futures::FutureExt;
use futures::future::BoxFuture;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const SEARCH_REQUEST_ID: &str = "recipe-search";
pub const DEFAULT_SEARCH_DEBOUNCE: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerOptions {
    pub debounce: Duration,
    pub url_sync: bool,
    pub default_limit: u32,
    pub request_id: String,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_SEARCH_DEBOUNCE,
            url_sync: true,
            default_limit: super::state::DEFAULT_PAGE_SIZE,
            request_id: SEARCH_REQUEST_ID.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum SearchCommand {
    GetSnapshot,
    SetQuery { query: String },
    AddRequiredIngredient { tag: Tag },
    AddOptionalIngredient { tag: Tag },
    AddAvoidIngredient { tag: Tag },
    RemoveRequiredIngredient { id: String },
    RemoveOptionalIngredient { id: String },
    RemoveAvoidIngredient { id: String },
    ToggleFilter { category: FilterCategory, value: String },
    SetTagLogic { logic: TagLogic },
    SetPage { page: u32 },
    SetLimit { limit: u32 },
    SetSort { field: String, direction: SortDirection },
    ClearFilters,
}

impl SearchCommand {
    pub fn action(&self) -> &'static str {
        match self {
            Self::GetSnapshot => "search_get_snapshot",
            Self::SetQuery { .. } => "search_set_query",
            Self::AddRequiredIngredient { .. } => "search_add_required_ingredient",
            Self::AddOptionalIngredient { .. } => "search_add_optional_ingredient",
            Self::AddAvoidIngredient { .. } => "search_add_avoid_ingredient",
            Self::RemoveRequiredIngredient { .. } => "search_remove_required_ingredient",
            Self::RemoveOptionalIngredient { .. } => "search_remove_optional_ingredient",
            Self::RemoveAvoidIngredient { .. } => "search_remove_avoid_ingredient",
            Self::ToggleFilter { .. } => "search_toggle_filter",
            Self::SetTagLogic { .. } => "search_set_tag_logic",
            Self::SetPage { .. } => "search_set_page",
            Self::SetLimit { .. } => "search_set_limit",
            Self::SetSort { .. } => "search_set_sort",
            Self::ClearFilters => "search_clear_filters",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SearchStateEvent {
    pub action: &'static str,
    pub changed: bool,
    pub snapshot: SearchFilters,
}

#[derive(Debug)]
pub enum SearchDispatch {
    /// Filters match the last completed search; nothing was sent.
    Cached(SearchResults),
    Pending(PendingSearch),
}

/// A search in flight. Await [`PendingSearch::settle`] and hand the outcome
/// back to [`SearchController::apply_outcome`].
pub struct PendingSearch {
    ticket: Ticket,
    key: String,
    filters: SearchFilters,
    outcome: BoxFuture<'static, Result<SearchResults, SearchError>>,
}

impl PendingSearch {
    pub fn ticket(&self) -> Ticket {
        self.ticket
    }

    pub fn filters(&self) -> &SearchFilters {
        &self.filters
    }

    pub async fn settle(self) -> SearchOutcome {
        let result = self.outcome.await;
        SearchOutcome {
            ticket: self.ticket,
            key: self.key,
            filters: self.filters,
            result,
        }
    }
}

impl fmt::Debug for PendingSearch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingSearch")
            .field("ticket", &self.ticket)
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub ticket: Ticket,
    pub key: String,
    pub filters: SearchFilters,
    pub result: Result<SearchResults, SearchError>,
}

#[derive(Debug, Clone)]
struct CompletedSearch {
    key: String,
    results: SearchResults,
}

pub struct SearchController {
    state: SearchState,
    applied_filters: BTreeSet<AppliedFilter>,
    options: ControllerOptions,
    backend: Arc<dyn SearchBackend>,
    lifecycle: RequestLifecycleManager,
    guard: RaceGuard,
    bus: SearchBus,
    history: Box<dyn LocationHistory>,
    last_completed: Option<CompletedSearch>,
    last_error: Option<SearchError>,
    in_flight: Option<Ticket>,
}

impl SearchController {
    /// With URL sync on, initial state is hydrated from the location query.
    ///
    /// `lifecycle` is the process-wide manager: build it once at startup and
    /// hand a clone to every controller so they share one concurrency pool.
    /// Controllers on one manager need distinct `options.request_id` values.
    pub fn new(
        backend: Arc<dyn SearchBackend>,
        history: Box<dyn LocationHistory>,
        lifecycle: RequestLifecycleManager,
        options: ControllerOptions,
    ) -> Self {
        let baseline = SearchFilters {
            limit: options.default_limit.clamp(1, MAX_PAGE_SIZE),
            ..SearchFilters::default()
        };
        let location = if options.url_sync {
            history.current_query()
        } else {
            String::new()
        };
        let state = if location.is_empty() {
            SearchState::from_filters(&baseline)
        } else {
            info!(query = %location, "Hydrating search state from location");
            SearchState::from_filters(&merge_query_string(baseline, &location))
        };

        Self {
            applied_filters: state.applied_filters(),
            state,
            options,
            backend,
            lifecycle,
            guard: RaceGuard::new(),
            bus: SearchBus::default(),
            history,
            last_completed: None,
            last_error: None,
            in_flight: None,
        }
    }

    pub fn from_config(
        config: &AppConfig,
        backend: Arc<dyn SearchBackend>,
        history: Box<dyn LocationHistory>,
        lifecycle: RequestLifecycleManager,
    ) -> Self {
        Self::new(backend, history, lifecycle, config.controller_options())
    }

    pub fn with_bus(mut self, bus: SearchBus) -> Self {
        self.bus = bus;
        self
    }

    pub fn state(&self) -> &SearchState {
        &self.state
    }

    pub fn filters(&self) -> SearchFilters {
        self.state.filters()
    }

    pub fn applied_filters(&self) -> &BTreeSet<AppliedFilter> {
        &self.applied_filters
    }

    pub fn has_active_filters(&self) -> bool {
        !self.applied_filters.is_empty()
    }

    pub fn last_results(&self) -> Option<&SearchResults> {
        self.last_completed.as_ref().map(|done| &done.results)
    }

    pub fn last_error(&self) -> Option<&SearchError> {
        self.last_error.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn options(&self) -> &ControllerOptions {
        &self.options
    }

    pub fn lifecycle(&self) -> &RequestLifecycleManager {
        &self.lifecycle
    }

    pub fn bus(&self) -> &SearchBus {
        &self.bus
    }

    pub fn add_required_ingredient(&mut self, tag: Tag) -> bool {
        self.state.add_required_ingredient(tag)
    }

    pub fn add_optional_ingredient(&mut self, tag: Tag) -> bool {
        self.state.add_optional_ingredient(tag)
    }

    pub fn add_avoid_ingredient(&mut self, tag: Tag) -> bool {
        self.state.add_avoid_ingredient(tag)
    }

    pub fn remove_required_ingredient(&mut self, id: &str) -> bool {
        self.state.remove_required_ingredient(id)
    }

    pub fn remove_optional_ingredient(&mut self, id: &str) -> bool {
        self.state.remove_optional_ingredient(id)
    }

    pub fn remove_avoid_ingredient(&mut self, id: &str) -> bool {
        self.state.remove_avoid_ingredient(id)
    }

    /// Returns whether `value` is selected afterwards.
    pub fn toggle_filter(&mut self, category: FilterCategory, value: &str) -> bool {
        let selected = self.state.toggle_filter(category, value);
        self.applied_filters = self.state.applied_filters();
        selected
    }

    pub fn set_search_query(&mut self, query: impl Into<String>) {
        self.state.search_query = query.into();
    }

    pub fn set_tag_logic(&mut self, logic: TagLogic) {
        self.state.tag_logic = logic;
    }

    pub fn set_page(&mut self, page: u32) {
        self.state.page = page.max(1);
    }

    pub fn set_limit(&mut self, limit: u32) {
        self.state.limit = limit.clamp(1, MAX_PAGE_SIZE);
    }

    pub fn set_sort(&mut self, field: impl Into<String>, direction: SortDirection) {
        let field = field.into();
        self.state.sort_field = if field.trim().is_empty() {
            DEFAULT_SORT_FIELD.to_string()
        } else {
            field
        };
        self.state.sort_direction = direction;
    }

    pub fn clear_filters(&mut self) {
        self.state.clear_filters();
        self.applied_filters.clear();
    }

    pub fn apply_command(&mut self, command: SearchCommand) -> SearchStateEvent {
        let action = command.action();
        let before = self.state.filters();
        match command {
            SearchCommand::GetSnapshot => {}
            SearchCommand::SetQuery { query } => self.set_search_query(query),
            SearchCommand::AddRequiredIngredient { tag } => {
                self.add_required_ingredient(tag);
            }
            SearchCommand::AddOptionalIngredient { tag } => {
                self.add_optional_ingredient(tag);
            }
            SearchCommand::AddAvoidIngredient { tag } => {
                self.add_avoid_ingredient(tag);
            }
            SearchCommand::RemoveRequiredIngredient { id } => {
                self.remove_required_ingredient(&id);
            }
            SearchCommand::RemoveOptionalIngredient { id } => {
                self.remove_optional_ingredient(&id);
            }
            SearchCommand::RemoveAvoidIngredient { id } => {
                self.remove_avoid_ingredient(&id);
            }
            SearchCommand::ToggleFilter { category, value } => {
                self.toggle_filter(category, &value);
            }
            SearchCommand::SetTagLogic { logic } => self.set_tag_logic(logic),
            SearchCommand::SetPage { page } => self.set_page(page),
            SearchCommand::SetLimit { limit } => self.set_limit(limit),
            SearchCommand::SetSort { field, direction } => self.set_sort(field, direction),
            SearchCommand::ClearFilters => self.clear_filters(),
        }
        let snapshot = self.state.filters();
        let changed = snapshot != before;
        debug!(action, changed, "Applied search command");
        SearchStateEvent {
            action,
            changed,
            snapshot,
        }
    }

    pub fn execute_search(&mut self) -> SearchDispatch {
        let filters = self.state.filters();
        self.execute_search_with(filters)
    }

    /// Search an explicit filter snapshot without touching controller state.
    pub fn execute_search_with(&mut self, filters: SearchFilters) -> SearchDispatch {
        let key = filters.cache_key();

        if let Some(results) = self.cached_results(&key) {
            // A cache hit still outranks every search issued before it.
            let ticket = self.guard.issue();
            self.lifecycle.cancel_request(&self.options.request_id);
            self.in_flight = None;
            debug!(ticket = ticket.value(), "Serving recipe search from last result");
            self.publish_settled(ticket, PHASE_CACHED, Some(results.total), None);
            return SearchDispatch::Cached(results);
        }

        let backend = Arc::clone(&self.backend);
        let request_filters = filters.clone();
        let request = self.lifecycle.debounced_request(
            &self.options.request_id,
            self.options.debounce,
            move |signal| backend.search(request_filters, signal),
        );
        let (ticket, guarded) = self.guard.safeguard_ticketed(request);
        self.in_flight = Some(ticket);
        info!(
            ticket = ticket.value(),
            query = %filters.query,
            page = filters.page,
            "Dispatching recipe search"
        );

        SearchDispatch::Pending(PendingSearch {
            ticket,
            key,
            filters,
            outcome: guarded.boxed(),
        })
    }

    /// Commit a settled search. Cancelled and outdated outcomes resolve to
    /// `Ok(None)` and leave every field untouched; failures are recorded,
    /// published and returned.
    pub fn apply_outcome(
        &mut self,
        outcome: SearchOutcome,
    ) -> Result<Option<SearchResults>, SearchError> {
        let SearchOutcome {
            ticket,
            key,
            filters,
            result,
        } = outcome;
        if self.in_flight == Some(ticket) {
            self.in_flight = None;
        }

        match result {
            Err(err) if err.is_silent() => {
                debug!(ticket = ticket.value(), code = err.code(), "Search outcome absorbed");
                Ok(None)
            }
            _ if !self.guard.is_current(ticket) => {
                debug!(ticket = ticket.value(), "Ignoring stale search outcome");
                Ok(None)
            }
            Err(err) => {
                warn!(ticket = ticket.value(), code = err.code(), "Recipe search failed: {err}");
                self.last_error = Some(err.clone());
                self.publish_settled(ticket, PHASE_FAILED, None, Some(&err));
                Err(err)
            }
            Ok(results) => {
                info!(
                    ticket = ticket.value(),
                    total = results.total,
                    returned = results.recipes.len(),
                    "Recipe search finished"
                );
                self.last_error = None;
                self.mirror_to_location(&filters);
                self.publish_settled(ticket, PHASE_FINISHED, Some(results.total), None);
                self.last_completed = Some(CompletedSearch {
                    key,
                    results: results.clone(),
                });
                Ok(Some(results))
            }
        }
    }

    pub async fn run_search(&mut self) -> Result<Option<SearchResults>, SearchError> {
        match self.execute_search() {
            SearchDispatch::Cached(results) => Ok(Some(results)),
            SearchDispatch::Pending(search) => {
                let outcome = search.settle().await;
                self.apply_outcome(outcome)
            }
        }
    }

    /// Broadcast `execute-search` with the current snapshot.
    pub fn request_search(&self) -> usize {
        self.bus
            .publish(BusMessage::ExecuteSearch(ExecuteSearchEvent {
                filters: self.state.filters(),
            }))
    }

    /// React to a bus message. An `execute-search` snapshot from another
    /// surface is adopted before searching.
    pub fn handle_message(&mut self, message: &BusMessage) -> Option<SearchDispatch> {
        match message {
            BusMessage::ExecuteSearch(event) => {
                if event.filters != self.state.filters() {
                    self.state = self.state.adopt_filters(&event.filters);
                    self.applied_filters = self.state.applied_filters();
                }
                Some(self.execute_search())
            }
            BusMessage::SearchSettled(_) => None,
        }
    }

    /// Teardown hook: cancel everything and make any late outcome stale.
    pub fn shutdown(&mut self) {
        self.guard.issue();
        self.lifecycle.cancel_all_requests();
        self.in_flight = None;
        info!("Search controller shut down");
    }

    fn cached_results(&self, key: &str) -> Option<SearchResults> {
        self.last_completed
            .as_ref()
            .filter(|done| done.key == key)
            .map(|done| done.results.clone())
    }

    fn mirror_to_location(&mut self, filters: &SearchFilters) {
        if !self.options.url_sync {
            return;
        }
        let query = to_query_string(filters, QueryScope::Location);
        debug!(query = %query, "Replacing location query");
        self.history.replace_query(&query);
    }

    fn publish_settled(
        &self,
        ticket: Ticket,
        phase: &str,
        total: Option<u64>,
        error: Option<&SearchError>,
    ) {
        self.bus
            .publish(BusMessage::SearchSettled(SearchSettledEvent {
                request_id: ticket.value(),
                phase: phase.to_string(),
                total,
                code: error.map(|err| err.code().to_string()),
                message: error.map(ToString::to_string),
            }));
    }
}
