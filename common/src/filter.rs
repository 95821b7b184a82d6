//! Filter model shared by the query builder and the search controller.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::error::ConfigError;

/// Inclusive range bound.
///
/// Integers and floats compare numerically with each other, dates
/// (ISO-8601 strings) compare lexicographically. Bounds are serialized
/// exactly as given.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Bound {
    Integer(i64),
    Number(f64),
    Date(String),
}

impl Bound {
    fn compare(&self, other: &Bound) -> Option<Ordering> {
        match (self, other) {
            (Bound::Integer(a), Bound::Integer(b)) => Some(a.cmp(b)),
            (Bound::Integer(a), Bound::Number(b)) => (*a as f64).partial_cmp(b),
            (Bound::Number(a), Bound::Integer(b)) => a.partial_cmp(&(*b as f64)),
            (Bound::Number(a), Bound::Number(b)) => a.partial_cmp(b),
            (Bound::Date(a), Bound::Date(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Bound::Integer(i) => Some(*i as f64),
            Bound::Number(n) => Some(*n),
            Bound::Date(_) => None,
        }
    }
}

impl From<i64> for Bound {
    fn from(value: i64) -> Self {
        Bound::Integer(value)
    }
}

impl From<f64> for Bound {
    fn from(value: f64) -> Self {
        Bound::Number(value)
    }
}

impl From<&str> for Bound {
    fn from(value: &str) -> Self {
        Bound::Date(value.to_string())
    }
}

/// A concrete constraint derived from a facet.
///
/// `Histogram` filters carry the same payload as `Range` filters but are
/// applied as post-filters, so they narrow the hits without narrowing the
/// aggregation they originate from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Filter {
    Term {
        name: String,
        field: String,
        values: Vec<String>,
    },
    Exists {
        name: String,
        field: String,
    },
    Range {
        name: String,
        field: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        gte: Option<Bound>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        lte: Option<Bound>,
    },
    Histogram {
        name: String,
        field: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        gte: Option<Bound>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        lte: Option<Bound>,
    },
}

impl Filter {
    pub fn term<I, S>(name: &str, field: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Filter::Term {
            name: name.to_string(),
            field: field.to_string(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn exists(name: &str, field: &str) -> Self {
        Filter::Exists {
            name: name.to_string(),
            field: field.to_string(),
        }
    }

    pub fn range(name: &str, field: &str, gte: Option<Bound>, lte: Option<Bound>) -> Self {
        Filter::Range {
            name: name.to_string(),
            field: field.to_string(),
            gte,
            lte,
        }
    }

    pub fn histogram(name: &str, field: &str, gte: Option<Bound>, lte: Option<Bound>) -> Self {
        Filter::Histogram {
            name: name.to_string(),
            field: field.to_string(),
            gte,
            lte,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Filter::Term { name, .. }
            | Filter::Exists { name, .. }
            | Filter::Range { name, .. }
            | Filter::Histogram { name, .. } => name,
        }
    }

    pub fn field(&self) -> &str {
        match self {
            Filter::Term { field, .. }
            | Filter::Exists { field, .. }
            | Filter::Range { field, .. }
            | Filter::Histogram { field, .. } => field,
        }
    }

    /// Post-filters narrow the hits but not the aggregations.
    pub fn is_post_filter(&self) -> bool {
        matches!(self, Filter::Histogram { .. })
    }

    /// A filter with no values or no bounds constrains nothing and is never stored.
    pub fn is_empty(&self) -> bool {
        match self {
            Filter::Term { values, .. } => values.is_empty(),
            Filter::Exists { .. } => false,
            Filter::Range { gte, lte, .. } | Filter::Histogram { gte, lte, .. } => {
                gte.is_none() && lte.is_none()
            }
        }
    }

    /// Checks that numeric bounds are finite and `gte <= lte` whenever both
    /// bounds are present.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Filter::Range { gte, lte, .. } | Filter::Histogram { gte, lte, .. } = self {
            for bound in gte.iter().chain(lte) {
                if matches!(bound, Bound::Number(n) if !n.is_finite()) {
                    return Err(ConfigError::InvalidBounds {
                        name: self.name().to_string(),
                        reason: format!("bound {:?} is not a finite number", bound),
                    });
                }
            }
        }

        let (gte, lte) = match self {
            Filter::Range {
                gte: Some(gte),
                lte: Some(lte),
                ..
            }
            | Filter::Histogram {
                gte: Some(gte),
                lte: Some(lte),
                ..
            } => (gte, lte),
            _ => return Ok(()),
        };

        match gte.compare(lte) {
            Some(Ordering::Greater) => Err(ConfigError::InvalidBounds {
                name: self.name().to_string(),
                reason: format!("lower bound {:?} exceeds upper bound {:?}", gte, lte),
            }),
            Some(_) => Ok(()),
            None => Err(ConfigError::InvalidBounds {
                name: self.name().to_string(),
                reason: format!("bounds {:?} and {:?} are not comparable", gte, lte),
            }),
        }
    }
}
