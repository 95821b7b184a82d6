use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::error::ConfigError;
use crate::facet::{AggregationKind, FacetConfig};
use crate::filter::Filter;

pub type TokenFn = dyn Fn() -> Option<String> + Send + Sync;

/// Bearer token for the search endpoint: a literal or a provider invoked on
/// every request.
#[derive(Clone)]
pub enum TokenSource {
    Static(String),
    Provider(Arc<TokenFn>),
}

impl TokenSource {
    pub fn provider<F>(provider: F) -> Self
    where
        F: Fn() -> Option<String> + Send + Sync + 'static,
    {
        TokenSource::Provider(Arc::new(provider))
    }

    /// Reads the variable at resolve time, not at construction time.
    pub fn from_env(var: &str) -> Self {
        let var = var.to_string();
        Self::provider(move || std::env::var(&var).ok())
    }

    pub fn resolve(&self) -> Option<String> {
        match self {
            TokenSource::Static(token) => Some(token.clone()),
            TokenSource::Provider(provider) => provider(),
        }
    }
}

impl fmt::Debug for TokenSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenSource::Static(_) => f.write_str("Static(<redacted>)"),
            TokenSource::Provider(_) => f.write_str("Provider(<fn>)"),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ConnectionFile {
    url: String,
    token: Option<String>,
    token_env: Option<String>,
    timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "ConnectionFile")]
pub struct ConnectionConfig {
    pub url: String,
    pub token: Option<TokenSource>,
    pub timeout_seconds: Option<u64>,
}

impl TryFrom<ConnectionFile> for ConnectionConfig {
    type Error = String;

    fn try_from(file: ConnectionFile) -> Result<Self, Self::Error> {
        let token = match (file.token, file.token_env) {
            (Some(_), Some(_)) => return Err("set either token or token_env, not both".to_string()),
            (Some(token), None) => Some(TokenSource::Static(token)),
            (None, Some(var)) => Some(TokenSource::from_env(&var)),
            (None, None) => None,
        };
        Ok(Self {
            url: file.url,
            token,
            timeout_seconds: file.timeout_seconds,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortConfig {
    pub field: String,
    #[serde(default)]
    pub order: SortOrder,
}

impl SortConfig {
    pub fn new(field: &str, order: SortOrder) -> Self {
        Self {
            field: field.to_string(),
            order,
        }
    }
}

/// `true`/`false`, or the count up to which totals are exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TrackTotalHits {
    Enabled(bool),
    UpTo(u64),
}

#[derive(Debug, Clone, Deserialize)]
pub struct InitialState {
    #[serde(default)]
    pub filters: Vec<Filter>,
    #[serde(default)]
    pub sort: Option<SortConfig>,
    #[serde(default)]
    pub page_number: usize,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

impl Default for InitialState {
    fn default() -> Self {
        Self {
            filters: Vec::new(),
            sort: None,
            page_number: 0,
            page_size: default_page_size(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub facets: Vec<FacetConfig>,
    /// Always-applied filters, AND'ed into the `must` clause.
    #[serde(default)]
    pub include: Vec<Filter>,
    /// Always-applied negative filters.
    #[serde(default)]
    pub exclude: Vec<Filter>,
    #[serde(default)]
    pub source_fields: Option<Vec<String>>,
    #[serde(default)]
    pub track_total_hits: Option<TrackTotalHits>,
    #[serde(default)]
    pub initial: InitialState,
    #[serde(default)]
    pub page_size_options: Vec<usize>,
}

impl SearchConfig {
    pub fn new(url: &str) -> Self {
        Self {
            connection: ConnectionConfig {
                url: url.to_string(),
                token: None,
                timeout_seconds: None,
            },
            facets: Vec::new(),
            include: Vec::new(),
            exclude: Vec::new(),
            source_fields: None,
            track_total_hits: None,
            initial: InitialState::default(),
            page_size_options: Vec::new(),
        }
    }

    /// Loads a TOML file, or YAML when the extension is `.yaml`/`.yml`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let is_yaml = matches!(
            path.extension().and_then(|ext| ext.to_str()),
            Some("yaml") | Some("yml")
        );
        let parsed = if is_yaml {
            serde_yaml_ng::from_str::<SearchConfig>(&content).map_err(|e| e.to_string())
        } else {
            toml::from_str::<SearchConfig>(&content).map_err(|e| e.to_string())
        };
        let config = parsed.map_err(|message| ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        })?;

        config.validate()?;
        tracing::debug!(
            "Loaded search config from {} with {} facets",
            path.display(),
            config.facets.len()
        );
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut names = HashSet::new();
        for facet in &self.facets {
            if !names.insert(facet.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate facet name: {}",
                    facet.name
                )));
            }
            if let Some(AggregationKind::Histogram {
                interval,
                extended_bounds,
                ..
            }) = facet.aggregation.as_ref().map(|a| &a.kind)
            {
                if !(interval.is_finite() && *interval > 0.0) {
                    return Err(ConfigError::Invalid(format!(
                        "histogram interval for {} must be a positive number",
                        facet.name
                    )));
                }
                if let Some(bounds) = extended_bounds {
                    if !(bounds.min.is_finite() && bounds.max.is_finite()) {
                        return Err(ConfigError::Invalid(format!(
                            "histogram bounds for {} must be finite",
                            facet.name
                        )));
                    }
                }
            }
        }

        for filter in self.include.iter().chain(&self.exclude) {
            if filter.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "static filter {} constrains nothing",
                    filter.name()
                )));
            }
            filter.validate()?;
        }

        for filter in &self.initial.filters {
            self.check_filter(filter.name(), filter)?;
        }

        if self.initial.page_size == 0 {
            return Err(ConfigError::InvalidPageSize(0));
        }
        if self.page_size_options.contains(&0) {
            return Err(ConfigError::InvalidPageSize(0));
        }
        Ok(())
    }

    pub fn facet(&self, name: &str) -> Option<&FacetConfig> {
        self.facets.iter().find(|f| f.name == name)
    }

    /// Checks that `filter` may be stored under `key`: the facet exists, the
    /// filter targets the facet's field and its bounds are ordered.
    pub fn check_filter(&self, key: &str, filter: &Filter) -> Result<(), ConfigError> {
        let facet = self
            .facet(key)
            .ok_or_else(|| ConfigError::UnknownFacet(key.to_string()))?;

        if filter.name() != key {
            return Err(ConfigError::NameMismatch {
                key: key.to_string(),
                name: filter.name().to_string(),
            });
        }
        if filter.field() != facet.field {
            return Err(ConfigError::FieldMismatch {
                name: key.to_string(),
                field: filter.field().to_string(),
                expected: facet.field.clone(),
            });
        }
        filter.validate()
    }

    pub fn with_facet(mut self, facet: FacetConfig) -> Self {
        self.facets.push(facet);
        self
    }

    pub fn with_include(mut self, filter: Filter) -> Self {
        self.include.push(filter);
        self
    }

    pub fn with_exclude(mut self, filter: Filter) -> Self {
        self.exclude.push(filter);
        self
    }

    pub fn with_token(mut self, token: TokenSource) -> Self {
        self.connection.token = Some(token);
        self
    }

    pub fn with_source_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.source_fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_track_total_hits(mut self, track: TrackTotalHits) -> Self {
        self.track_total_hits = Some(track);
        self
    }

    pub fn with_initial(mut self, initial: InitialState) -> Self {
        self.initial = initial;
        self
    }

    pub fn with_page_size_options(mut self, options: Vec<usize>) -> Self {
        self.page_size_options = options;
        self
    }
}

fn default_page_size() -> usize {
    10
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facet::{AggregationConfig, FacetType};
    use crate::filter::Bound;
    use std::fs;
    use tempfile::TempDir;

    const TOML_CONFIG: &str = r#"
source_fields = ["title", "status"]
track_total_hits = true
page_size_options = [10, 25, 50]

[connection]
url = "http://localhost:9200/books/_search"
token = "secret-token"
timeout_seconds = 15

[initial]
page_size = 25

[initial.sort]
field = "published"
order = "desc"

[[initial.filters]]
type = "term"
name = "status"
field = "status.keyword"
values = ["published"]

[[facets]]
label = "Status"
name = "status"
field = "status.keyword"
type = "term"

[facets.aggregation]
type = "terms"
size = 20

[[facets]]
label = "Year"
name = "year"
field = "year"
type = "histogram"

[facets.aggregation]
type = "histogram"
interval = 10

[[exclude]]
type = "exists"
name = "deleted"
field = "deleted_at"
"#;

    #[test]
    fn test_load_toml_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("search.toml");
        fs::write(&config_path, TOML_CONFIG).unwrap();

        let config = SearchConfig::load(&config_path).unwrap();

        assert_eq!(config.connection.url, "http://localhost:9200/books/_search");
        assert_eq!(
            config.connection.token.as_ref().and_then(|t| t.resolve()),
            Some("secret-token".to_string())
        );
        assert_eq!(config.connection.timeout_seconds, Some(15));
        assert_eq!(config.facets.len(), 2);
        assert_eq!(config.facets[1].facet_type, FacetType::Histogram);
        assert_eq!(
            config.source_fields,
            Some(vec!["title".to_string(), "status".to_string()])
        );
        assert_eq!(config.track_total_hits, Some(TrackTotalHits::Enabled(true)));
        assert_eq!(config.initial.page_size, 25);
        assert_eq!(config.initial.page_number, 0);
        assert_eq!(
            config.initial.sort,
            Some(SortConfig::new("published", SortOrder::Desc))
        );
        assert_eq!(config.initial.filters.len(), 1);
        assert_eq!(config.exclude, vec![Filter::exists("deleted", "deleted_at")]);
        assert_eq!(config.page_size_options, vec![10, 25, 50]);
    }

    #[test]
    fn test_load_yaml_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("search.yaml");
        fs::write(
            &config_path,
            r#"
connection:
  url: http://localhost:9200/_search
  token_env: FACET_TEST_YAML_TOKEN
track_total_hits: 10000
facets:
  - label: Status
    name: status
    field: status.keyword
    type: term
"#,
        )
        .unwrap();

        let config = SearchConfig::load(&config_path).unwrap();
        assert_eq!(config.track_total_hits, Some(TrackTotalHits::UpTo(10000)));
        assert_eq!(config.initial.page_size, 10);

        std::env::set_var("FACET_TEST_YAML_TOKEN", "from-env");
        let token = config.connection.token.as_ref().unwrap();
        assert_eq!(token.resolve(), Some("from-env".to_string()));
        std::env::remove_var("FACET_TEST_YAML_TOKEN");
        assert_eq!(token.resolve(), None);
    }

    #[test]
    fn test_load_missing_file() {
        let result = SearchConfig::load(Path::new("/nonexistent/search.toml"));
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn test_reject_both_token_kinds() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("search.toml");
        fs::write(
            &config_path,
            r#"
[connection]
url = "http://localhost:9200/_search"
token = "a"
token_env = "B"
"#,
        )
        .unwrap();

        let err = SearchConfig::load(&config_path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("token_env"));
    }

    #[test]
    fn test_validate_rejects_duplicates_and_bad_interval() {
        let duplicate = SearchConfig::new("http://localhost")
            .with_facet(FacetConfig::term("status", "status"))
            .with_facet(FacetConfig::term("status", "status2"));
        assert!(matches!(duplicate.validate(), Err(ConfigError::Invalid(_))));

        let bad_interval = SearchConfig::new("http://localhost").with_facet(
            FacetConfig::histogram("year", "year").with_aggregation(AggregationConfig::histogram(0.0)),
        );
        assert!(matches!(bad_interval.validate(), Err(ConfigError::Invalid(_))));

        for aggregation in [
            AggregationConfig::histogram(f64::NAN),
            AggregationConfig::histogram(f64::INFINITY),
            AggregationConfig::histogram(10.0).with_bounds(f64::NAN, 50.0),
            AggregationConfig::histogram(10.0).with_bounds(0.0, f64::INFINITY),
        ] {
            let config = SearchConfig::new("http://localhost").with_facet(
                FacetConfig::histogram("year", "year").with_aggregation(aggregation),
            );
            assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
        }
    }

    #[test]
    fn test_check_filter() {
        let config = SearchConfig::new("http://localhost")
            .with_facet(FacetConfig::term("status", "status.keyword"))
            .with_facet(FacetConfig::histogram("price", "price"));

        assert!(config
            .check_filter("status", &Filter::term("status", "status.keyword", ["A"]))
            .is_ok());
        assert!(matches!(
            config.check_filter("color", &Filter::term("color", "color", ["red"])),
            Err(ConfigError::UnknownFacet(_))
        ));
        assert!(matches!(
            config.check_filter("status", &Filter::term("status", "status", ["A"])),
            Err(ConfigError::FieldMismatch { .. })
        ));
        assert!(matches!(
            config.check_filter("status", &Filter::term("other", "status.keyword", ["A"])),
            Err(ConfigError::NameMismatch { .. })
        ));
        assert!(matches!(
            config.check_filter(
                "price",
                &Filter::histogram(
                    "price",
                    "price",
                    Some(Bound::Integer(9)),
                    Some(Bound::Integer(1))
                )
            ),
            Err(ConfigError::InvalidBounds { .. })
        ));
    }
}
