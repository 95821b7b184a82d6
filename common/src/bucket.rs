use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// One `(value, count)` pair of an aggregation, normalized from the engine's
/// `key`/`doc_count` shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bucket {
    pub value: serde_json::Value,
    pub count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subvalues: Option<Vec<Bucket>>,
}

impl Bucket {
    pub fn new(value: impl Into<serde_json::Value>, count: u64) -> Self {
        Self {
            value: value.into(),
            count,
            subvalues: None,
        }
    }

    /// Bucket value rendered for display; strings lose their quotes.
    pub fn label(&self) -> String {
        match &self.value {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// Aggregation buckets keyed by facet name, in engine response order.
pub type Aggregations = IndexMap<String, Vec<Bucket>>;
