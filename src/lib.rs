pub mod aggregator;
pub mod config;
pub mod gait;
pub mod output;
pub mod pipeline;
pub mod reader;
pub mod record;
pub mod summary;
pub mod tally;
