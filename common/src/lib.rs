pub mod bucket;
pub mod config;
pub mod dsl;
pub mod error;
pub mod facet;
pub mod filter;
pub mod storage;

pub use bucket::{Aggregations, Bucket};
pub use config::{
    ConnectionConfig, InitialState, SearchConfig, SortConfig, SortOrder, TokenSource,
    TrackTotalHits,
};
pub use dsl::parse_filters;
pub use error::ConfigError;
pub use facet::{
    Activation, ActivationContext, AggregationConfig, AggregationKind, AuthState, FacetConfig,
    FacetType, HistogramBounds,
};
pub use filter::{Bound, Filter};
pub use storage::{FacetExpansion, KeyValueStore, MemoryStore};
