mod builder;

pub use builder::{build_query, map_filter};

use facet_common::{AuthState, SortConfig};

/// Per-request parameters that are not part of the static configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryParams {
    pub sort: Option<SortConfig>,
    pub from: usize,
    pub size: usize,
    pub auth: AuthState,
}

impl QueryParams {
    pub fn new(from: usize, size: usize) -> Self {
        Self {
            from,
            size,
            ..Default::default()
        }
    }

    /// Offset parameters for a zero-based page.
    pub fn page(page_number: usize, page_size: usize) -> Self {
        Self::new(page_number.saturating_mul(page_size), page_size)
    }

    pub fn with_sort(mut self, sort: Option<SortConfig>) -> Self {
        self.sort = sort;
        self
    }

    pub fn with_auth(mut self, auth: AuthState) -> Self {
        self.auth = auth;
        self
    }
}
