pub mod cli;
pub mod feeds;
pub mod images;
pub mod logging;
pub mod pipeline;

pub use cli::{handle_command, CommandContext, IngestArgs, IngestCommands};
pub use feeds::{FeedConfig, NewsDataClient};
pub use images::{ImageScreener, ScreenConfig};
pub use logging::init_logging;
pub use pipeline::{IngestConfig, IngestionPipeline, RunReport, RunStats};

pub mod prelude {
    pub use super::pipeline::{IngestConfig, IngestionPipeline, RunReport};
    pub use nh_core::{Article, Candidate, Error, Result, Topic};
}
