//! Batch pipeline: raw load, transform, dedup, cleaned load

use crate::ingestion::dedup::deduplicate;
use crate::ingestion::transform::Transformer;
use crate::ingestion::types::{CleanedListing, RawListing, WriteStats};
use crate::ingestion::write::{write_cleaned_listings, write_raw_listings, ListingStore};
use anyhow::Result;
use serde::Serialize;
use tracing::{info, warn};

/// Cleaned listings ready for storage
#[derive(Debug, Clone, Default)]
pub struct PreparedBatch {
    pub listings: Vec<CleanedListing>,
    pub rejected: usize,
    pub duplicates: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub fetched: usize,
    pub raw: WriteStats,
    pub rejected: usize,
    pub duplicates: usize,
    pub cleaned: WriteStats,
}

impl BatchReport {
    /// True when the run had no input at all
    pub fn is_empty(&self) -> bool {
        self.fetched == 0
    }
}

impl std::fmt::Display for BatchReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "fetched: {}, raw [{}], rejected: {}, duplicates: {}, cleaned [{}]",
            self.fetched, self.raw, self.rejected, self.duplicates, self.cleaned
        )
    }
}

/// Transform then deduplicate. No storage access.
pub fn prepare_batch(transformer: &Transformer, raw: &[RawListing]) -> PreparedBatch {
    let outcome = transformer.transform_listings(raw);
    let before = outcome.listings.len();
    let listings = deduplicate(outcome.listings);

    PreparedBatch {
        duplicates: before - listings.len(),
        listings,
        rejected: outcome.rejected,
    }
}

/// Run one batch end to end against a store
pub async fn run_batch(
    store: &dyn ListingStore,
    transformer: &Transformer,
    raw: Vec<RawListing>,
) -> Result<BatchReport> {
    if raw.is_empty() {
        warn!("No listings extracted from any source");
        return Ok(BatchReport::default());
    }

    info!("Step 1/3: Loading {} raw listings...", raw.len());
    let raw_stats = write_raw_listings(store, &raw).await?;

    info!("Step 2/3: Transforming...");
    let prepared = prepare_batch(transformer, &raw);

    info!("Step 3/3: Loading {} cleaned listings...", prepared.listings.len());
    let cleaned_stats = write_cleaned_listings(store, &prepared.listings).await?;

    Ok(BatchReport {
        fetched: raw.len(),
        raw: raw_stats,
        rejected: prepared.rejected,
        duplicates: prepared.duplicates,
        cleaned: cleaned_stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingestion::memory::InMemoryListingStore;
    use crate::ingestion::tables::LookupTables;
    use std::sync::Arc;

    fn transformer() -> Transformer {
        Transformer::new(Arc::new(LookupTables::builtin().unwrap()))
    }

    fn listing(url: &str, price: &str) -> RawListing {
        RawListing {
            price_raw: price.to_string(),
            location_raw: "Nyali, Mombasa".to_string(),
            ..RawListing::new("buyrentkenya", url)
        }
    }

    #[test]
    fn test_prepare_batch_end_to_end() {
        let raw = vec![
            listing("u1", "N/A"),
            listing("u2", "KES 3.2M"),
            listing("u2", "KES 3.2M"),
        ];

        let prepared = prepare_batch(&transformer(), &raw);

        assert_eq!(prepared.listings.len(), 1);
        assert_eq!(prepared.listings[0].listing_url, "u2");
        assert_eq!(prepared.listings[0].price_kes, 3_200_000.0);
        assert_eq!(prepared.rejected, 1);
        assert_eq!(prepared.duplicates, 1);
    }

    #[tokio::test]
    async fn test_run_batch_empty() {
        let store = InMemoryListingStore::new();
        let report = run_batch(&store, &transformer(), Vec::new()).await.unwrap();

        assert!(report.is_empty());
        assert_eq!(report, BatchReport::default());
    }

    #[tokio::test]
    async fn test_run_batch_twice_skips_existing() {
        let store = InMemoryListingStore::new();
        let t = transformer();
        let raw = vec![
            listing("u1", "N/A"),
            listing("u2", "KES 3.2M"),
            listing("u3", "18M"),
        ];

        let first = run_batch(&store, &t, raw.clone()).await.unwrap();
        assert_eq!(first.fetched, 3);
        assert_eq!(first.raw.inserted, 3);
        assert_eq!(first.rejected, 1);
        assert_eq!(first.cleaned.inserted, 2);

        let second = run_batch(&store, &t, raw).await.unwrap();
        assert_eq!(second.raw.skipped, 3);
        assert_eq!(second.cleaned.inserted, 0);
        assert_eq!(second.cleaned.skipped, 2);

        let stats = store.statistics().await.unwrap();
        assert_eq!(stats.total_raw_listings, 3);
        assert_eq!(stats.total_cleaned_listings, 2);
        assert_eq!(stats.active_sources, vec!["buyrentkenya"]);

        let cleaned = store.cleaned_listings(10).await.unwrap();
        assert!(cleaned
            .iter()
            .all(|l| l.county.as_deref() == Some("Mombasa")
                && l.neighborhood.as_deref() == Some("Nyali")));
    }
}
