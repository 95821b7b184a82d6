mod logger;
mod output;

pub use logger::init_logger;
pub use output::{facet_table, hits_table};
