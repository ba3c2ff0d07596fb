//! Write functions - persist listings through the storage boundary
//!
//! Every insert is insert-if-absent keyed by `listing_url`. A listing that is
//! already stored counts as skipped; a storage failure on one listing is
//! logged and counted without stopping the batch.

use crate::ingestion::types::{CleanedListing, InsertOutcome, ListingStats, RawListing, WriteStats};
use anyhow::Result;
use async_trait::async_trait;
use tracing::{info, warn};

#[async_trait]
pub trait ListingStore: Send + Sync {
    async fn insert_raw(&self, listing: &RawListing) -> Result<InsertOutcome>;
    async fn insert_cleaned(&self, listing: &CleanedListing) -> Result<InsertOutcome>;

    /// Raw count, cleaned count and distinct source sites
    async fn statistics(&self) -> Result<ListingStats>;

    /// Most recently cleaned listings first
    async fn cleaned_listings(&self, limit: usize) -> Result<Vec<CleanedListing>>;
}

/// Write raw listings exactly as scraped
pub async fn write_raw_listings(
    store: &dyn ListingStore,
    listings: &[RawListing],
) -> Result<WriteStats> {
    info!("Loading {} raw listings", listings.len());

    let mut stats = WriteStats::default();

    for listing in listings {
        match store.insert_raw(listing).await {
            Ok(outcome) => record(&mut stats, outcome),
            Err(e) => {
                warn!("Failed to write raw listing {}: {:#}", listing.listing_url, e);
                stats.errors += 1;
            }
        }
    }

    info!("Raw load complete: {}", stats);

    Ok(stats)
}

/// Write cleaned listings
pub async fn write_cleaned_listings(
    store: &dyn ListingStore,
    listings: &[CleanedListing],
) -> Result<WriteStats> {
    info!("Loading {} cleaned listings", listings.len());

    let mut stats = WriteStats::default();

    for listing in listings {
        match store.insert_cleaned(listing).await {
            Ok(outcome) => record(&mut stats, outcome),
            Err(e) => {
                warn!(
                    "Failed to write cleaned listing {}: {:#}",
                    listing.listing_url, e
                );
                stats.errors += 1;
            }
        }
    }

    info!("Cleaned load complete: {}", stats);

    Ok(stats)
}

fn record(stats: &mut WriteStats, outcome: InsertOutcome) {
    match outcome {
        InsertOutcome::Inserted => stats.inserted += 1,
        InsertOutcome::Skipped => stats.skipped += 1,
    }
}
