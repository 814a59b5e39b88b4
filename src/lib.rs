pub mod analyzers;
pub mod config;
pub mod dedup;
pub mod error;
pub mod output;
pub mod parser;
pub mod regime;
pub mod weather;
