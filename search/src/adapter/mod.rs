//! Normalizes raw engine responses into the shape view components consume.

mod buckets;

pub use buckets::fill_histogram_gaps;

use facet_common::{Aggregations, AggregationKind, SearchConfig};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{SearchError, SearchResult};

/// Whether `total_hits` is exact or a lower bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TotalRelation {
    #[default]
    Eq,
    Gte,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub aggregations: Aggregations,
    pub hits: Vec<Value>,
    pub total_hits: u64,
    pub total_relation: TotalRelation,
}

fn malformed(message: &str) -> SearchError {
    SearchError::MalformedResponse(message.to_string())
}

fn read_total(total: &Value) -> SearchResult<(u64, TotalRelation)> {
    if let Some(count) = total.as_u64() {
        return Ok((count, TotalRelation::Eq));
    }
    let count = total
        .get("value")
        .and_then(Value::as_u64)
        .ok_or_else(|| malformed("hits.total.value is missing or not a count"))?;
    let relation = match total.get("relation").and_then(Value::as_str) {
        Some("gte") => TotalRelation::Gte,
        _ => TotalRelation::Eq,
    };
    Ok((count, relation))
}

/// Adapts a raw search response. The response is only read, never modified.
///
/// Missing `aggregations` yields an empty map; missing `hits.hits` or
/// `hits.total` is an error because hits are not optional.
pub fn adapt(raw: &Value) -> SearchResult<SearchResponse> {
    let hits = raw
        .get("hits")
        .ok_or_else(|| malformed("response has no hits object"))?;
    let raw_hits = hits
        .get("hits")
        .and_then(Value::as_array)
        .ok_or_else(|| malformed("hits.hits is missing or not an array"))?;
    let total = hits
        .get("total")
        .ok_or_else(|| malformed("hits.total is missing"))?;
    let (total_hits, total_relation) = read_total(total)?;

    let hits = raw_hits
        .iter()
        .map(|hit| {
            hit.get("_source")
                .cloned()
                .unwrap_or_else(|| Value::Object(Map::new()))
        })
        .collect();

    let mut aggregations = Aggregations::new();
    if let Some(raw_aggregations) = raw.get("aggregations").and_then(Value::as_object) {
        for (name, aggregation) in raw_aggregations {
            match buckets::locate_buckets(name, aggregation) {
                Some(raw_buckets) => {
                    let normalized = raw_buckets
                        .iter()
                        .map(|b| buckets::normalize_bucket(b, true))
                        .collect();
                    aggregations.insert(name.clone(), normalized);
                }
                None => tracing::debug!("Aggregation {} has no buckets; skipping", name),
            }
        }
    }

    Ok(SearchResponse {
        aggregations,
        hits,
        total_hits,
        total_relation,
    })
}

/// [`adapt`], then fills histogram gaps for facets configured with a
/// histogram aggregation. Facets asking for a positive `min_doc_count` keep
/// only the buckets the engine returned.
pub fn adapt_with_config(raw: &Value, config: &SearchConfig) -> SearchResult<SearchResponse> {
    let mut response = adapt(raw)?;

    for facet in &config.facets {
        let Some(AggregationKind::Histogram {
            interval,
            min_doc_count,
            extended_bounds,
        }) = facet.aggregation.as_ref().map(|a| &a.kind)
        else {
            continue;
        };
        if min_doc_count.is_some_and(|count| count > 0) {
            continue;
        }
        if let Some(buckets) = response.aggregations.get_mut(&facet.name) {
            *buckets = fill_histogram_gaps(buckets, *interval, *extended_bounds);
        }
    }

    Ok(response)
}
