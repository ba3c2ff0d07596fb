//! In-batch deduplication by listing URL

use crate::ingestion::types::Identified;
use std::collections::HashSet;
use tracing::info;

/// Keep the first occurrence of every `listing_url`, preserving order.
/// Duplicates across batches are the store's concern, not this function's.
pub fn deduplicate<T: Identified>(records: Vec<T>) -> Vec<T> {
    let initial_count = records.len();
    let mut seen: HashSet<String> = HashSet::with_capacity(initial_count);

    let unique: Vec<T> = records
        .into_iter()
        .filter(|record| seen.insert(record.listing_url().to_string()))
        .collect();

    info!(
        "Removed {} duplicate listings based on URL",
        initial_count - unique.len()
    );

    unique
}
