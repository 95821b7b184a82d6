use std::path::PathBuf;

/// Errors raised while loading configuration or validating filters against it.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("Unknown facet: {0}")]
    UnknownFacet(String),

    #[error("Filter {name} targets field {field}, but the facet is configured for {expected}")]
    FieldMismatch {
        name: String,
        field: String,
        expected: String,
    },

    #[error("Filter stored under {key} is named {name}")]
    NameMismatch { key: String, name: String },

    #[error("Invalid bounds for filter {name}: {reason}")]
    InvalidBounds { name: String, reason: String },

    #[error("Invalid page size: {0}")]
    InvalidPageSize(usize),

    #[error("Invalid filter expression: {0}")]
    Dsl(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
