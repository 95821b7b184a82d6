//! Facet configuration: which fields are filterable, how their aggregations are
//! requested and when facets, aggregations and options are shown.

use serde::{Deserialize, Deserializer};
use std::fmt;
use std::sync::Arc;

use crate::bucket::{Aggregations, Bucket};
use crate::filter::Filter;

/// Authentication state visible to activation predicates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthState {
    pub authenticated: bool,
    pub roles: Vec<String>,
}

impl AuthState {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn authenticated<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            authenticated: true,
            roles: roles.into_iter().map(Into::into).collect(),
        }
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

/// Everything an activation predicate may look at.
#[derive(Debug, Clone, Copy)]
pub struct ActivationContext<'a> {
    pub filters: &'a [Filter],
    pub aggregations: &'a Aggregations,
    pub auth: &'a AuthState,
}

impl<'a> ActivationContext<'a> {
    pub fn new(filters: &'a [Filter], aggregations: &'a Aggregations, auth: &'a AuthState) -> Self {
        Self {
            filters,
            aggregations,
            auth,
        }
    }

    pub fn filter(&self, name: &str) -> Option<&'a Filter> {
        self.filters.iter().find(|f| f.name() == name)
    }

    pub fn has_filter(&self, name: &str) -> bool {
        self.filter(name).is_some()
    }
}

pub type PredicateFn = dyn Fn(&ActivationContext<'_>) -> bool + Send + Sync;
pub type OptionVisibleFn = dyn Fn(&Bucket, &ActivationContext<'_>) -> bool + Send + Sync;
pub type TransformFn = dyn Fn(Vec<Bucket>) -> Vec<Bucket> + Send + Sync;

/// Either a constant or a pure function of the current filters, aggregations
/// and auth state. Configuration files can only express the constant form.
#[derive(Clone)]
pub enum Activation {
    Constant(bool),
    Predicate(Arc<PredicateFn>),
}

impl Activation {
    pub fn when<F>(predicate: F) -> Self
    where
        F: Fn(&ActivationContext<'_>) -> bool + Send + Sync + 'static,
    {
        Activation::Predicate(Arc::new(predicate))
    }

    pub fn resolve(&self, ctx: &ActivationContext<'_>) -> bool {
        match self {
            Activation::Constant(value) => *value,
            Activation::Predicate(predicate) => predicate(ctx),
        }
    }
}

impl Default for Activation {
    fn default() -> Self {
        Activation::Constant(true)
    }
}

impl From<bool> for Activation {
    fn from(value: bool) -> Self {
        Activation::Constant(value)
    }
}

impl fmt::Debug for Activation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Activation::Constant(value) => f.debug_tuple("Constant").field(value).finish(),
            Activation::Predicate(_) => f.write_str("Predicate(<fn>)"),
        }
    }
}

impl<'de> Deserialize<'de> for Activation {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        bool::deserialize(deserializer).map(Activation::Constant)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FacetType {
    Term,
    Daterange,
    Histogram,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct HistogramBounds {
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AggregationKind {
    Terms {
        #[serde(default)]
        size: Option<u32>,
    },
    Histogram {
        interval: f64,
        #[serde(default)]
        min_doc_count: Option<u64>,
        #[serde(default)]
        extended_bounds: Option<HistogramBounds>,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct AggregationConfig {
    #[serde(flatten)]
    pub kind: AggregationKind,
    /// Gates whether the aggregation is requested at all.
    #[serde(default)]
    pub is_active: Activation,
}

impl AggregationConfig {
    pub fn terms(size: Option<u32>) -> Self {
        Self {
            kind: AggregationKind::Terms { size },
            is_active: Activation::default(),
        }
    }

    pub fn histogram(interval: f64) -> Self {
        Self {
            kind: AggregationKind::Histogram {
                interval,
                min_doc_count: None,
                extended_bounds: None,
            },
            is_active: Activation::default(),
        }
    }

    pub fn with_bounds(mut self, min: f64, max: f64) -> Self {
        if let AggregationKind::Histogram {
            extended_bounds, ..
        } = &mut self.kind
        {
            *extended_bounds = Some(HistogramBounds { min, max });
        }
        self
    }

    pub fn with_min_doc_count(mut self, count: u64) -> Self {
        if let AggregationKind::Histogram { min_doc_count, .. } = &mut self.kind {
            *min_doc_count = Some(count);
        }
        self
    }

    pub fn active_when(mut self, activation: Activation) -> Self {
        self.is_active = activation;
        self
    }
}

#[derive(Clone, Deserialize)]
pub struct FacetConfig {
    pub label: String,
    pub name: String,
    pub field: String,
    #[serde(rename = "type")]
    pub facet_type: FacetType,
    #[serde(default)]
    pub aggregation: Option<AggregationConfig>,
    #[serde(default)]
    pub is_visible: Activation,
    #[serde(skip)]
    pub is_option_visible: Option<Arc<OptionVisibleFn>>,
    #[serde(skip)]
    pub transform: Option<Arc<TransformFn>>,
}

impl fmt::Debug for FacetConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FacetConfig")
            .field("label", &self.label)
            .field("name", &self.name)
            .field("field", &self.field)
            .field("facet_type", &self.facet_type)
            .field("aggregation", &self.aggregation)
            .field("is_visible", &self.is_visible)
            .field("is_option_visible", &self.is_option_visible.is_some())
            .field("transform", &self.transform.is_some())
            .finish()
    }
}

impl FacetConfig {
    pub fn new(name: &str, field: &str, facet_type: FacetType) -> Self {
        Self {
            label: name.to_string(),
            name: name.to_string(),
            field: field.to_string(),
            facet_type,
            aggregation: None,
            is_visible: Activation::default(),
            is_option_visible: None,
            transform: None,
        }
    }

    pub fn term(name: &str, field: &str) -> Self {
        Self::new(name, field, FacetType::Term)
    }

    pub fn histogram(name: &str, field: &str) -> Self {
        Self::new(name, field, FacetType::Histogram)
    }

    pub fn daterange(name: &str, field: &str) -> Self {
        Self::new(name, field, FacetType::Daterange)
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.label = label.to_string();
        self
    }

    pub fn with_aggregation(mut self, aggregation: AggregationConfig) -> Self {
        self.aggregation = Some(aggregation);
        self
    }

    pub fn with_visibility(mut self, activation: Activation) -> Self {
        self.is_visible = activation;
        self
    }

    pub fn with_option_filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Bucket, &ActivationContext<'_>) -> bool + Send + Sync + 'static,
    {
        self.is_option_visible = Some(Arc::new(predicate));
        self
    }

    pub fn with_transform<F>(mut self, transform: F) -> Self
    where
        F: Fn(Vec<Bucket>) -> Vec<Bucket> + Send + Sync + 'static,
    {
        self.transform = Some(Arc::new(transform));
        self
    }

    /// Applies the facet's transform, then drops options hidden by its option predicate.
    pub fn present_buckets(&self, buckets: Vec<Bucket>, ctx: &ActivationContext<'_>) -> Vec<Bucket> {
        let buckets = match &self.transform {
            Some(transform) => transform(buckets),
            None => buckets,
        };
        match &self.is_option_visible {
            Some(visible) => buckets.into_iter().filter(|b| visible(b, ctx)).collect(),
            None => buckets,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Bound;

    #[test]
    fn test_activation_resolve() {
        let filters = vec![Filter::term("category", "category", ["books"])];
        let aggregations = Aggregations::new();
        let auth = AuthState::authenticated(["editor"]);
        let ctx = ActivationContext::new(&filters, &aggregations, &auth);

        assert!(Activation::default().resolve(&ctx));
        assert!(!Activation::from(false).resolve(&ctx));
        assert!(Activation::when(|ctx| ctx.has_filter("category")).resolve(&ctx));
        assert!(!Activation::when(|ctx| ctx.has_filter("author")).resolve(&ctx));
        assert!(Activation::when(|ctx| ctx.auth.has_role("editor")).resolve(&ctx));
    }

    #[test]
    fn test_present_buckets() {
        let facet = FacetConfig::term("status", "status.keyword")
            .with_transform(|buckets| {
                buckets
                    .into_iter()
                    .map(|mut b| {
                        b.value = serde_json::Value::String(b.label().to_uppercase());
                        b
                    })
                    .collect()
            })
            .with_option_filter(|bucket, _| bucket.count > 0);

        let filters = vec![Filter::range("price", "price", Some(Bound::Integer(1)), None)];
        let aggregations = Aggregations::new();
        let auth = AuthState::anonymous();
        let ctx = ActivationContext::new(&filters, &aggregations, &auth);

        let shown = facet.present_buckets(
            vec![Bucket::new("open", 3), Bucket::new("closed", 0)],
            &ctx,
        );
        assert_eq!(shown, vec![Bucket::new("OPEN", 3)]);
    }

    #[test]
    fn test_deserialize_facet() {
        let facet: FacetConfig = toml::from_str(
            r#"
label = "Year"
name = "year"
field = "published_year"
type = "histogram"
is_visible = false

[aggregation]
type = "histogram"
interval = 5
is_active = true
"#,
        )
        .unwrap();

        assert_eq!(facet.facet_type, FacetType::Histogram);
        assert!(matches!(facet.is_visible, Activation::Constant(false)));
        let aggregation = facet.aggregation.unwrap();
        assert_eq!(
            aggregation.kind,
            AggregationKind::Histogram {
                interval: 5.0,
                min_doc_count: None,
                extended_bounds: None
            }
        );
        assert!(matches!(aggregation.is_active, Activation::Constant(true)));
    }
}
