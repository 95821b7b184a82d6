use anyhow::{Context, Result};
use facet_common::SearchConfig;
use facet_search::{build_query, QueryParams};
use serde_json::Value;

pub fn handle_query_command(config: &SearchConfig) -> Result<()> {
    let body = build_request(config)?;
    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}

/// Request body for the configured initial state.
fn build_request(config: &SearchConfig) -> Result<Value> {
    let initial = &config.initial;
    let params = QueryParams::page(initial.page_number, initial.page_size)
        .with_sort(initial.sort.clone());
    build_query(&initial.filters, config, &params).context("Failed to build search request")
}

#[cfg(test)]
mod tests {
    use super::*;
    use facet_common::{AggregationConfig, Bound, FacetConfig, Filter, InitialState};
    use serde_json::json;

    #[test]
    fn test_build_request_from_initial_state() {
        let config = SearchConfig::new("http://localhost:9200/_search")
            .with_facet(
                FacetConfig::histogram("price", "price")
                    .with_aggregation(AggregationConfig::histogram(10.0)),
            )
            .with_initial(InitialState {
                filters: vec![Filter::histogram(
                    "price",
                    "price",
                    Some(Bound::Integer(10)),
                    None,
                )],
                page_number: 1,
                page_size: 5,
                ..Default::default()
            });

        let body = build_request(&config).unwrap();
        assert_eq!(body["from"], json!(5));
        assert_eq!(body["size"], json!(5));
        assert_eq!(
            body["post_filter"],
            json!({ "bool": { "filter": [{ "range": { "price": { "gte": 10 } } }] } })
        );
        assert_eq!(
            body["aggs"]["price"],
            json!({ "histogram": { "field": "price", "interval": 10.0 } })
        );
    }
}
