use facet_common::Bucket;
use serde_json::Value;
use tabular::{Row, Table};

/// One facet's options with their counts; sub-buckets are indented under
/// their parent.
pub fn facet_table(label: &str, buckets: &[Bucket]) -> Table {
    #[allow(clippy::literal_string_with_formatting_args)]
    let mut table =
        Table::new("{:<}  {:>}").with_row(Row::new().with_cell(label).with_cell("Count"));

    for bucket in buckets {
        table.add_row(Row::new().with_cell(bucket.label()).with_cell(bucket.count));
        for sub in bucket.subvalues.iter().flatten() {
            table.add_row(
                Row::new()
                    .with_cell(format!("  {}", sub.label()))
                    .with_cell(sub.count),
            );
        }
    }
    table
}

/// Hits as compact JSON, numbered from `from + 1`.
pub fn hits_table(hits: &[Value], from: usize) -> Table {
    #[allow(clippy::literal_string_with_formatting_args)]
    let mut table =
        Table::new("{:>}  {:<}").with_row(Row::new().with_cell("#").with_cell("Document"));

    for (i, hit) in hits.iter().enumerate() {
        table.add_row(Row::new().with_cell(from.saturating_add(i + 1)).with_cell(hit));
    }
    table
}
