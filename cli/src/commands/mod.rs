mod query;
mod search;

use crate::argparse::{Cli, Commands, SearchArgs};
use anyhow::{Context, Result};
use facet_common::{parse_filters, SearchConfig};
pub use query::handle_query_command;
pub use search::handle_search_command;

pub async fn handle_command(cli: Cli) -> Result<()> {
    let config = SearchConfig::load(&cli.config)
        .with_context(|| format!("Failed to load search config {}", cli.config.display()))?;

    match cli.command {
        Commands::Query(args) => handle_query_command(&apply_args(config, &args)?),
        Commands::Search(args) => handle_search_command(apply_args(config, &args)?).await,
    }
}

/// Folds command-line filters, sort and paging into the configured initial
/// state. A filter given on the command line replaces the configured filter
/// of the same facet.
fn apply_args(mut config: SearchConfig, args: &SearchArgs) -> Result<SearchConfig> {
    if let Some(expression) = &args.filters {
        let parsed = parse_filters(expression, &config.facets)
            .with_context(|| format!("Invalid filter expression: {}", expression))?;
        for filter in parsed {
            config.initial.filters.retain(|f| f.name() != filter.name());
            config.initial.filters.push(filter);
        }
    }
    if let Some(sort) = &args.sort {
        config.initial.sort = Some(sort.clone());
    }
    if let Some(page) = args.page {
        config.initial.page_number = page;
    }
    if let Some(page_size) = args.page_size {
        config.initial.page_size = page_size;
    }

    config.validate().context("Invalid search arguments")?;
    Ok(config)
}
