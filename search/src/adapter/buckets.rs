use facet_common::{Bucket, HistogramBounds};
use serde_json::{json, Map, Value};

/// Keys that describe an aggregation wrapper rather than hold buckets.
const META_KEYS: &[&str] = &[
    "doc_count",
    "meta",
    "doc_count_error_upper_bound",
    "sum_other_doc_count",
    "bg_count",
];

/// Keys of a bucket that are part of the bucket itself, not a sub-aggregation.
const BUCKET_KEYS: &[&str] = &["key", "key_as_string", "doc_count", "from", "to"];

/// Upper bound on generated histogram steps.
const MAX_HISTOGRAM_STEPS: usize = 10_000;

fn bucket_array(value: &Value) -> Option<&Vec<Value>> {
    value.get("buckets").and_then(Value::as_array)
}

/// Finds the bucket list of aggregation `name`.
///
/// Precedence: the aggregation's own `buckets`, then the same-named sub-key
/// (a `filter` wrapper around the real aggregation), then the sole non-meta
/// sub-key. Returns `None` for aggregations without buckets.
pub(crate) fn locate_buckets<'a>(name: &str, aggregation: &'a Value) -> Option<&'a Vec<Value>> {
    if let Some(buckets) = bucket_array(aggregation) {
        return Some(buckets);
    }

    let object = aggregation.as_object()?;
    if let Some(buckets) = object.get(name).and_then(bucket_array) {
        return Some(buckets);
    }

    let mut candidates = object
        .iter()
        .filter(|(key, _)| !META_KEYS.contains(&key.as_str()));
    match (candidates.next(), candidates.next()) {
        (Some((_, sole)), None) => bucket_array(sole),
        _ => None,
    }
}

fn sub_buckets(bucket: &Map<String, Value>) -> Option<Vec<Bucket>> {
    bucket
        .iter()
        .filter(|(key, _)| !BUCKET_KEYS.contains(&key.as_str()))
        .find_map(|(_, value)| bucket_array(value))
        .map(|buckets| buckets.iter().map(|b| normalize_bucket(b, false)).collect())
}

/// `{key, doc_count}` becomes `{value, count}`; with `nested`, one level of
/// sub-aggregation buckets becomes `subvalues`.
pub(crate) fn normalize_bucket(bucket: &Value, nested: bool) -> Bucket {
    let value = bucket.get("key").cloned().unwrap_or(Value::Null);
    let count = bucket.get("doc_count").and_then(Value::as_u64).unwrap_or(0);
    let subvalues = if nested {
        bucket.as_object().and_then(sub_buckets)
    } else {
        None
    };

    Bucket {
        value,
        count,
        subvalues,
    }
}

fn floor_to(value: f64, interval: f64) -> f64 {
    (value / interval).floor() * interval
}

/// Inserts zero-count buckets for every missing `interval` step between the
/// first and last key, widened to `bounds` when given.
///
/// Non-numeric, descending or misaligned keys are returned unchanged.
pub fn fill_histogram_gaps(
    buckets: &[Bucket],
    interval: f64,
    bounds: Option<HistogramBounds>,
) -> Vec<Bucket> {
    if !(interval.is_finite() && interval > 0.0) {
        return buckets.to_vec();
    }
    let Some(keys) = buckets
        .iter()
        .map(|b| b.value.as_f64())
        .collect::<Option<Vec<f64>>>()
    else {
        tracing::debug!("Histogram buckets have non-numeric keys; not filling gaps");
        return buckets.to_vec();
    };

    let mut start = keys.first().copied();
    let mut end = keys.last().copied();
    if let Some(bounds) = bounds.filter(|b| b.min.is_finite() && b.max.is_finite()) {
        let min = floor_to(bounds.min, interval);
        let max = floor_to(bounds.max, interval);
        start = Some(start.map_or(min, |s| s.min(min)));
        end = Some(end.map_or(max, |e| e.max(max)));
    }
    let (Some(start), Some(end)) = (start, end) else {
        return Vec::new();
    };
    if end < start {
        return buckets.to_vec();
    }

    let steps = ((end - start) / interval).round() as usize;
    if steps > MAX_HISTOGRAM_STEPS {
        tracing::warn!(
            "Histogram spans {} steps of {}; not filling gaps",
            steps,
            interval
        );
        return buckets.to_vec();
    }

    let integral = buckets
        .first()
        .map_or(true, |b| b.value.is_i64() || b.value.is_u64());
    let tolerance = interval * 1e-6;
    let mut existing = buckets.iter().zip(keys).peekable();
    let mut filled = Vec::with_capacity(steps + 1);

    for step in 0..=steps {
        let key = start + step as f64 * interval;
        if let Some((bucket, bucket_key)) = existing.peek() {
            if (bucket_key - key).abs() < tolerance {
                filled.push((*bucket).clone());
                existing.next();
                continue;
            }
        }
        let value = if integral && key.fract() == 0.0 {
            json!(key as i64)
        } else {
            json!(key)
        };
        filled.push(Bucket::new(value, 0));
    }

    if existing.peek().is_some() {
        tracing::debug!("Histogram keys are not aligned to interval {}", interval);
        return buckets.to_vec();
    }
    filled
}
