use facet_common::{
    ActivationContext, Aggregations, AggregationKind, ConfigError, Filter, SearchConfig,
};
use serde_json::{json, Map, Value};

use super::QueryParams;
use crate::error::SearchResult;

fn keyed(key: &str, value: Value) -> Value {
    let mut map = Map::new();
    map.insert(key.to_string(), value);
    Value::Object(map)
}

/// Maps one filter to its engine query clause.
///
/// A term filter becomes a single `terms` query so its values are OR'ed;
/// absent range bounds are omitted rather than replaced by sentinels.
pub fn map_filter(filter: &Filter) -> Value {
    match filter {
        Filter::Term { field, values, .. } => json!({ "terms": keyed(field, json!(values)) }),
        Filter::Exists { field, .. } => json!({ "exists": { "field": field } }),
        Filter::Range {
            field, gte, lte, ..
        }
        | Filter::Histogram {
            field, gte, lte, ..
        } => {
            let mut bounds = Map::new();
            if let Some(gte) = gte {
                bounds.insert("gte".to_string(), json!(gte));
            }
            if let Some(lte) = lte {
                bounds.insert("lte".to_string(), json!(lte));
            }
            json!({ "range": keyed(field, Value::Object(bounds)) })
        }
    }
}

fn map_filters<'a>(filters: impl IntoIterator<Item = &'a Filter>) -> Vec<Value> {
    filters.into_iter().map(map_filter).collect()
}

fn check_filters(filters: &[Filter]) -> SearchResult<()> {
    for filter in filters {
        if filter.is_empty() {
            return Err(ConfigError::Invalid(format!(
                "filter {} constrains nothing and must be removed instead",
                filter.name()
            ))
            .into());
        }
        filter.validate()?;
    }
    Ok(())
}

/// Builds the search request body for `filters` on top of the static
/// configuration.
///
/// Histogram filters go to `post_filter`; every other filter is AND'ed into
/// the query's `filter` clause. Terms aggregations are wrapped in a `filter`
/// aggregation scoped to the post-filters (when there are any) so their
/// counts follow the narrowed hits, while histogram aggregations always see
/// the full candidate set.
pub fn build_query(
    filters: &[Filter],
    config: &SearchConfig,
    params: &QueryParams,
) -> SearchResult<Value> {
    check_filters(filters)?;

    let (post_filters, query_filters): (Vec<&Filter>, Vec<&Filter>) =
        filters.iter().partition(|f| f.is_post_filter());

    let must = if config.include.is_empty() {
        vec![json!({ "match_all": {} })]
    } else {
        map_filters(&config.include)
    };

    let mut bool_query = Map::new();
    bool_query.insert("must".to_string(), Value::Array(must));
    bool_query.insert(
        "filter".to_string(),
        Value::Array(map_filters(query_filters)),
    );
    if !config.exclude.is_empty() {
        bool_query.insert(
            "must_not".to_string(),
            Value::Array(map_filters(&config.exclude)),
        );
    }

    let post_filter = if post_filters.is_empty() {
        None
    } else {
        Some(json!({ "bool": { "filter": map_filters(post_filters) } }))
    };

    let mut body = Map::new();
    body.insert("query".to_string(), json!({ "bool": bool_query }));
    if let Some(post_filter) = &post_filter {
        body.insert("post_filter".to_string(), post_filter.clone());
    }

    let aggs = build_aggregations(filters, config, params, post_filter.as_ref());
    if !aggs.is_empty() {
        body.insert("aggs".to_string(), Value::Object(aggs));
    }

    if let Some(sort) = &params.sort {
        body.insert(
            "sort".to_string(),
            json!([keyed(&sort.field, json!({ "order": sort.order }))]),
        );
    }
    body.insert("from".to_string(), json!(params.from));
    body.insert("size".to_string(), json!(params.size));

    if let Some(fields) = &config.source_fields {
        body.insert("_source".to_string(), json!(fields));
    }
    if let Some(track) = &config.track_total_hits {
        body.insert("track_total_hits".to_string(), json!(track));
    }

    let body = Value::Object(body);
    tracing::debug!("Built search query: {}", body);
    Ok(body)
}

fn build_aggregations(
    filters: &[Filter],
    config: &SearchConfig,
    params: &QueryParams,
    post_filter: Option<&Value>,
) -> Map<String, Value> {
    let no_aggregations = Aggregations::new();
    let ctx = ActivationContext::new(filters, &no_aggregations, &params.auth);
    let mut aggs = Map::new();

    for facet in &config.facets {
        let Some(aggregation) = &facet.aggregation else {
            continue;
        };
        if !aggregation.is_active.resolve(&ctx) {
            tracing::debug!("Skipping inactive aggregation {}", facet.name);
            continue;
        }

        let body = match &aggregation.kind {
            AggregationKind::Terms { size } => {
                let mut terms = Map::new();
                terms.insert("field".to_string(), json!(facet.field));
                if let Some(size) = size {
                    terms.insert("size".to_string(), json!(size));
                }
                let terms = json!({ "terms": terms });
                match post_filter {
                    Some(post_filter) => json!({
                        "filter": post_filter,
                        "aggs": keyed(&facet.name, terms),
                    }),
                    None => terms,
                }
            }
            AggregationKind::Histogram {
                interval,
                min_doc_count,
                extended_bounds,
            } => {
                let mut histogram = Map::new();
                histogram.insert("field".to_string(), json!(facet.field));
                histogram.insert("interval".to_string(), json!(interval));
                if let Some(min_doc_count) = min_doc_count {
                    histogram.insert("min_doc_count".to_string(), json!(min_doc_count));
                }
                if let Some(bounds) = extended_bounds {
                    histogram.insert(
                        "extended_bounds".to_string(),
                        json!({ "min": bounds.min, "max": bounds.max }),
                    );
                }
                json!({ "histogram": histogram })
            }
        };
        aggs.insert(facet.name.clone(), body);
    }

    aggs
}
