use facet_common::ConfigError;

pub type SearchResult<T> = std::result::Result<T, SearchError>;

/// Errors that can occur while building, executing or applying a search.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// Rejected before any state change or network call
    #[error(transparent)]
    Configuration(#[from] ConfigError),

    /// Network failure while talking to the search engine
    #[error("Search request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-2xx reply; `body` holds the engine's error payload
    #[error("Search engine error ({status}): {body}")]
    Status { status: u16, body: String },

    #[error("Malformed search response: {0}")]
    MalformedResponse(String),

    #[error("Failed to serialize search request: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SearchError {
    pub fn is_configuration(&self) -> bool {
        matches!(self, SearchError::Configuration(_))
    }
}
