//! CLI command implementations.

mod ask;
mod config;
mod ingest;
mod remove;
mod reset;
mod search;
mod serve;

pub use ask::run_ask;
pub use config::run_config;
pub use ingest::run_ingest;
pub use remove::run_remove;
pub use reset::run_reset;
pub use search::run_search;
pub use serve::run_serve;
