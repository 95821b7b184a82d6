//! Query construction, response adaptation and search state for faceted
//! search over an Elasticsearch-compatible engine.

pub mod adapter;
pub mod controller;
pub mod error;
pub mod executor;
pub mod query;

pub use adapter::{adapt, adapt_with_config, fill_histogram_gaps, SearchResponse, TotalRelation};
pub use controller::{PendingSearch, SearchController, SearchOutcome};
pub use error::{SearchError, SearchResult};
pub use executor::{SearchBackend, SearchExecutor};
pub use query::{build_query, map_filter, QueryParams};
