use clap::{Args, Parser, Subcommand};
use facet_common::{SortConfig, SortOrder};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "facet",
    about = "Build and run faceted search queries",
    version,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Search configuration file (TOML, or YAML with a .yaml/.yml extension)
    #[arg(long, short, global = true, default_value = "facet.toml")]
    pub config: PathBuf,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the request body without sending it
    Query(SearchArgs),
    /// Run one search and print facets and hits
    Search(SearchArgs),
}

#[derive(Args, Debug, Default)]
pub struct SearchArgs {
    /// Filter expression, e.g. 'status:(open OR closed) AND price:[10 TO *]'
    #[arg(long, short)]
    pub filters: Option<String>,

    /// Sort as FIELD or FIELD:asc|desc
    #[arg(long, value_parser = parse_sort)]
    pub sort: Option<SortConfig>,

    /// Zero-based page number
    #[arg(long)]
    pub page: Option<usize>,

    /// Hits per page
    #[arg(long)]
    pub page_size: Option<usize>,
}

pub fn parse_sort(value: &str) -> Result<SortConfig, String> {
    let (field, order) = match value.rsplit_once(':') {
        Some((field, "asc")) => (field, SortOrder::Asc),
        Some((field, "desc")) => (field, SortOrder::Desc),
        Some((_, other)) => return Err(format!("unknown sort order: {}", other)),
        None => (value, SortOrder::Asc),
    };
    if field.is_empty() {
        return Err("sort field is empty".to_string());
    }
    Ok(SortConfig::new(field, order))
}

pub fn parse_args() -> Cli {
    Cli::parse()
}
