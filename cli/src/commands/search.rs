use crate::utils::{facet_table, hits_table};
use anyhow::{bail, Context, Result};
use facet_common::SearchConfig;
use facet_search::{
    SearchBackend, SearchController, SearchExecutor, SearchOutcome, TotalRelation,
};

pub async fn handle_search_command(config: SearchConfig) -> Result<()> {
    let controller = run_search(config).await?;
    print_results(&controller);
    Ok(())
}

async fn run_search(config: SearchConfig) -> Result<SearchController<SearchExecutor>> {
    let executor = SearchExecutor::from_connection(&config.connection)
        .context("Failed to create HTTP client")?;
    let controller =
        SearchController::new(config, executor).context("Invalid search configuration")?;

    match controller.refresh().await {
        SearchOutcome::Applied => Ok(controller),
        SearchOutcome::Failed(e) => bail!("Search failed: {}", e),
        SearchOutcome::Discarded => bail!("Search result was superseded by a newer search"),
    }
}

fn print_results<B: SearchBackend>(controller: &SearchController<B>) {
    for facet in controller.visible_facets() {
        let buckets = controller.facet_buckets(&facet.name);
        if buckets.is_empty() {
            continue;
        }
        print!("{}", facet_table(&facet.label, &buckets));
        println!();
    }

    let at_least = match controller.total_relation() {
        TotalRelation::Eq => "",
        TotalRelation::Gte => "at least ",
    };
    println!(
        "{}{} hits, page {} of {}",
        at_least,
        controller.total_hits(),
        controller.page_number().saturating_add(1),
        controller.page_count()
    );

    let from = page_offset(controller.page_number(), controller.page_size());
    print!("{}", hits_table(&controller.hits(), from));
}

/// Index of the first hit on a page, clamped instead of overflowing.
fn page_offset(page_number: usize, page_size: usize) -> usize {
    page_number.saturating_mul(page_size)
}
