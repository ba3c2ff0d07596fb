//! In-memory listing store for tests and dry runs

use crate::ingestion::types::{CleanedListing, InsertOutcome, ListingStats, RawListing};
use crate::ingestion::write::ListingStore;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::{BTreeSet, HashSet};
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

#[derive(Default)]
struct Tables {
    raw: Vec<RawListing>,
    raw_urls: HashSet<String>,
    cleaned: Vec<CleanedListing>,
    cleaned_urls: HashSet<String>,
}

#[derive(Default)]
pub struct InMemoryListingStore {
    tables: Mutex<Tables>,
}

impl InMemoryListingStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| anyhow!("in-memory store lock poisoned"))
    }

    pub fn raw_listings(&self) -> Result<Vec<RawListing>> {
        Ok(self.lock()?.raw.clone())
    }
}

#[async_trait]
impl ListingStore for InMemoryListingStore {
    async fn insert_raw(&self, listing: &RawListing) -> Result<InsertOutcome> {
        let mut tables = self.lock()?;

        if !tables.raw_urls.insert(listing.listing_url.clone()) {
            return Ok(InsertOutcome::Skipped);
        }
        tables.raw.push(listing.clone());

        debug!("Stored raw listing {}", listing.listing_url);
        Ok(InsertOutcome::Inserted)
    }

    async fn insert_cleaned(&self, listing: &CleanedListing) -> Result<InsertOutcome> {
        let mut tables = self.lock()?;

        if !tables.cleaned_urls.insert(listing.listing_url.clone()) {
            return Ok(InsertOutcome::Skipped);
        }
        tables.cleaned.push(listing.clone());

        debug!("Stored cleaned listing {}", listing.listing_url);
        Ok(InsertOutcome::Inserted)
    }

    async fn statistics(&self) -> Result<ListingStats> {
        let tables = self.lock()?;

        let sources: BTreeSet<String> = tables.raw.iter().map(|l| l.source_site.clone()).collect();

        Ok(ListingStats {
            total_raw_listings: tables.raw.len() as i64,
            total_cleaned_listings: tables.cleaned.len() as i64,
            active_sources: sources.into_iter().collect(),
        })
    }

    async fn cleaned_listings(&self, limit: usize) -> Result<Vec<CleanedListing>> {
        let tables = self.lock()?;
        Ok(tables.cleaned.iter().rev().take(limit).cloned().collect())
    }
}
