//! Owns filter, sort and paging state and keeps search results in sync with it.
//!
//! Every mutator validates its input, applies the state transition right away
//! (setting `loading`) and hands back a [`PendingSearch`]. The request goes
//! out when that is awaited. Results are applied only if no newer search was
//! dispatched in the meantime.

use facet_common::{
    Aggregations, ActivationContext, AuthState, Bucket, ConfigError, FacetConfig, Filter,
    SearchConfig, SortConfig,
};
use indexmap::IndexMap;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::task::{Context, Poll};

use crate::adapter::{SearchResponse, TotalRelation};
use crate::error::{SearchError, SearchResult};
use crate::executor::SearchBackend;
use crate::query::QueryParams;

/// A search dispatched by a mutator.
///
/// The state change is applied when the mutator returns, but the request is
/// only sent once this is awaited. Dropping it leaves the state loading
/// until a newer search completes.
#[must_use = "the search only runs when awaited"]
pub struct PendingSearch<'a>(Pin<Box<dyn Future<Output = SearchOutcome> + Send + 'a>>);

impl Future for PendingSearch<'_> {
    type Output = SearchOutcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<SearchOutcome> {
        self.0.as_mut().poll(cx)
    }
}

/// How a dispatched search ended.
#[derive(Debug, Clone)]
pub enum SearchOutcome {
    /// Results replaced the previous ones.
    Applied,
    /// The search failed; the error is now the controller's `error`.
    Failed(Arc<SearchError>),
    /// A newer search was dispatched first, so this result was dropped.
    Discarded,
}

impl SearchOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, SearchOutcome::Applied)
    }

    pub fn is_discarded(&self) -> bool {
        matches!(self, SearchOutcome::Discarded)
    }
}

#[derive(Debug)]
struct SearchState {
    filters: Arc<IndexMap<String, Filter>>,
    sort: Option<SortConfig>,
    page_number: usize,
    page_size: usize,
    aggregations: Arc<Aggregations>,
    hits: Arc<Vec<Value>>,
    total_hits: u64,
    total_relation: TotalRelation,
    loading: bool,
    error: Option<Arc<SearchError>>,
    auth: AuthState,
}

impl SearchState {
    fn filter_list(&self) -> Vec<Filter> {
        self.filters.values().cloned().collect()
    }
}

pub struct SearchController<B: SearchBackend> {
    config: SearchConfig,
    backend: B,
    state: RwLock<SearchState>,
    sequence: AtomicU64,
}

impl<B: SearchBackend> SearchController<B> {
    /// Creates a controller whose state starts from `config.initial`. No
    /// search is dispatched until [`refresh`](Self::refresh) or a mutator runs.
    pub fn new(config: SearchConfig, backend: B) -> SearchResult<Self> {
        config.validate()?;

        let initial = &config.initial;
        if !config.page_size_options.is_empty()
            && !config.page_size_options.contains(&initial.page_size)
        {
            return Err(ConfigError::InvalidPageSize(initial.page_size).into());
        }
        let filters: IndexMap<String, Filter> = initial
            .filters
            .iter()
            .filter(|f| !f.is_empty())
            .map(|f| (f.name().to_string(), f.clone()))
            .collect();

        let state = SearchState {
            filters: Arc::new(filters),
            sort: initial.sort.clone(),
            page_number: initial.page_number,
            page_size: initial.page_size,
            aggregations: Arc::new(Aggregations::new()),
            hits: Arc::new(Vec::new()),
            total_hits: 0,
            total_relation: TotalRelation::Eq,
            loading: false,
            error: None,
            auth: AuthState::anonymous(),
        };

        Ok(Self {
            config,
            backend,
            state: RwLock::new(state),
            sequence: AtomicU64::new(0),
        })
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    fn read(&self) -> RwLockReadGuard<'_, SearchState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, SearchState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn get_filter(&self, name: &str) -> Option<Filter> {
        self.read().filters.get(name).cloned()
    }

    pub fn has_filter(&self, name: &str) -> bool {
        self.read().filters.contains_key(name)
    }

    /// Current filters in the order they were first added.
    pub fn filters(&self) -> Vec<Filter> {
        self.read().filter_list()
    }

    pub fn aggregations(&self) -> Arc<Aggregations> {
        self.read().aggregations.clone()
    }

    pub fn hits(&self) -> Arc<Vec<Value>> {
        self.read().hits.clone()
    }

    pub fn total_hits(&self) -> u64 {
        self.read().total_hits
    }

    pub fn total_relation(&self) -> TotalRelation {
        self.read().total_relation
    }

    pub fn loading(&self) -> bool {
        self.read().loading
    }

    pub fn page_number(&self) -> usize {
        self.read().page_number
    }

    pub fn page_size(&self) -> usize {
        self.read().page_size
    }

    pub fn sort(&self) -> Option<SortConfig> {
        self.read().sort.clone()
    }

    pub fn error(&self) -> Option<Arc<SearchError>> {
        self.read().error.clone()
    }

    pub fn auth(&self) -> AuthState {
        self.read().auth.clone()
    }

    /// Replaces the auth state seen by activation predicates. Takes effect on
    /// the next dispatched search.
    pub fn set_auth(&self, auth: AuthState) {
        self.write().auth = auth;
    }

    pub fn page_size_options(&self) -> &[usize] {
        &self.config.page_size_options
    }

    /// Number of pages for the current total, at least one.
    pub fn page_count(&self) -> usize {
        let state = self.read();
        let total = usize::try_from(state.total_hits).unwrap_or(usize::MAX);
        total.div_ceil(state.page_size).max(1)
    }

    /// Facets whose `is_visible` activation holds for the current state.
    pub fn visible_facets(&self) -> Vec<&FacetConfig> {
        let state = self.read();
        let filters = state.filter_list();
        let ctx = ActivationContext::new(&filters, &state.aggregations, &state.auth);
        self.config
            .facets
            .iter()
            .filter(|facet| facet.is_visible.resolve(&ctx))
            .collect()
    }

    /// Buckets of facet `name` as they should be shown: transformed, then
    /// filtered by the facet's option predicate.
    pub fn facet_buckets(&self, name: &str) -> Vec<Bucket> {
        let Some(facet) = self.config.facet(name) else {
            return Vec::new();
        };
        let state = self.read();
        let buckets = state.aggregations.get(name).cloned().unwrap_or_default();
        let filters = state.filter_list();
        let ctx = ActivationContext::new(&filters, &state.aggregations, &state.auth);
        facet.present_buckets(buckets, &ctx)
    }

    /// Re-runs the search for the current state. Like every mutator, nothing
    /// is sent until the returned search is awaited.
    pub fn refresh(&self) -> PendingSearch<'_> {
        self.commit(|_| {})
    }

    /// Stores `filter` under facet `name`, replacing any previous filter for
    /// it. An empty filter removes the facet's filter instead.
    pub fn add_filter(&self, name: &str, filter: Filter) -> SearchResult<PendingSearch<'_>> {
        if filter.is_empty() {
            return self.remove_filter(name);
        }
        self.config.check_filter(name, &filter)?;

        let key = name.to_string();
        Ok(self.commit(move |state| {
            Arc::make_mut(&mut state.filters).insert(key, filter);
        }))
    }

    /// Adds several filters with a single search. Every filter is checked
    /// before any is stored.
    pub fn add_filters<I>(&self, filters: I) -> SearchResult<PendingSearch<'_>>
    where
        I: IntoIterator<Item = Filter>,
    {
        let filters: Vec<Filter> = filters.into_iter().collect();
        for filter in &filters {
            if filter.is_empty() {
                self.known_facet(filter.name())?;
            } else {
                self.config.check_filter(filter.name(), filter)?;
            }
        }

        Ok(self.commit(move |state| {
            let map = Arc::make_mut(&mut state.filters);
            for filter in filters {
                if filter.is_empty() {
                    map.shift_remove(filter.name());
                } else {
                    map.insert(filter.name().to_string(), filter);
                }
            }
        }))
    }

    pub fn remove_filter(&self, name: &str) -> SearchResult<PendingSearch<'_>> {
        self.remove_filters([name])
    }

    pub fn remove_filters<I, S>(&self, names: I) -> SearchResult<PendingSearch<'_>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names: Vec<String> = names
            .into_iter()
            .map(|name| name.as_ref().to_string())
            .collect();
        for name in &names {
            self.known_facet(name)?;
        }

        Ok(self.commit(move |state| {
            let map = Arc::make_mut(&mut state.filters);
            for name in &names {
                map.shift_remove(name);
            }
        }))
    }

    pub fn clear_filters(&self) -> PendingSearch<'_> {
        self.commit(|state| {
            state.filters = Arc::new(IndexMap::new());
        })
    }

    pub fn set_sort(&self, sort: Option<SortConfig>) -> PendingSearch<'_> {
        self.commit(move |state| state.sort = sort)
    }

    pub fn set_page_number(&self, page_number: usize) -> PendingSearch<'_> {
        self.commit(move |state| state.page_number = page_number)
    }

    /// Changes the page size. The page number is left as is.
    pub fn set_page_size(&self, page_size: usize) -> SearchResult<PendingSearch<'_>> {
        let options = &self.config.page_size_options;
        if page_size == 0 || (!options.is_empty() && !options.contains(&page_size)) {
            return Err(ConfigError::InvalidPageSize(page_size).into());
        }
        Ok(self.commit(move |state| state.page_size = page_size))
    }

    fn known_facet(&self, name: &str) -> SearchResult<()> {
        match self.config.facet(name) {
            Some(_) => Ok(()),
            None => Err(ConfigError::UnknownFacet(name.to_string()).into()),
        }
    }

    /// Applies `update`, marks the state as loading and takes a new sequence
    /// number, all under one write lock. The returned future runs the search
    /// on a snapshot of the new state.
    fn commit<F>(&self, update: F) -> PendingSearch<'_>
    where
        F: FnOnce(&mut SearchState),
    {
        let (sequence, filters, params) = {
            let mut state = self.write();
            update(&mut state);
            state.loading = true;
            let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
            let params = QueryParams::page(state.page_number, state.page_size)
                .with_sort(state.sort.clone())
                .with_auth(state.auth.clone());
            (sequence, state.filter_list(), params)
        };
        tracing::debug!(
            "Dispatching search #{} with {} filters (from {}, size {})",
            sequence,
            filters.len(),
            params.from,
            params.size
        );

        PendingSearch(Box::pin(async move {
            let result = self.backend.execute(&filters, &self.config, &params).await;
            self.apply(sequence, result)
        }))
    }

    fn apply(&self, sequence: u64, result: SearchResult<SearchResponse>) -> SearchOutcome {
        let mut state = self.write();
        let latest = self.sequence.load(Ordering::SeqCst);
        if sequence != latest {
            tracing::debug!(
                "Discarding result of search #{}; #{} is newer",
                sequence,
                latest
            );
            return SearchOutcome::Discarded;
        }

        state.loading = false;
        match result {
            Ok(response) => {
                tracing::info!(
                    "Search #{} returned {} hits ({} total)",
                    sequence,
                    response.hits.len(),
                    response.total_hits
                );
                state.aggregations = Arc::new(response.aggregations);
                state.hits = Arc::new(response.hits);
                state.total_hits = response.total_hits;
                state.total_relation = response.total_relation;
                state.error = None;
                SearchOutcome::Applied
            }
            Err(e) => {
                tracing::warn!("Search #{} failed: {}", sequence, e);
                let error = Arc::new(e);
                state.error = Some(error.clone());
                SearchOutcome::Failed(error)
            }
        }
    }
}
