//! Normalization pipeline for Kenyan real-estate listings scraped from
//! multiple sites, plus the read API over the stored results

pub mod api;
pub mod ingestion;
