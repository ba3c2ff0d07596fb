//! Listing ingestion - functional pipeline for multi-source listing data

pub mod dedup;
pub mod fetch;
pub mod memory;
pub mod parse;
pub mod pipeline;
pub mod postgres;
pub mod tables;
pub mod transform;
pub mod types;
pub mod utils;
pub mod write;

pub use types::*;
