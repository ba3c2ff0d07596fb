//! Transform functions - normalize raw listings into cleaned listings

use crate::ingestion::parse::{
    parse_area, parse_count, parse_location, parse_price, standardize_property_type, FieldError,
    FieldResult,
};
use crate::ingestion::tables::LookupTables;
use crate::ingestion::types::{CleanedListing, RawListing};
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// Why a listing was left out of the cleaned batch
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Rejection {
    #[error("no price")]
    MissingPrice,

    #[error(transparent)]
    UnparseablePrice(#[from] FieldError),

    #[error("price must be positive, got {0}")]
    NonPositivePrice(f64),
}

#[derive(Debug, Clone, Default)]
pub struct TransformOutcome {
    /// Surviving listings, in input order
    pub listings: Vec<CleanedListing>,
    pub rejected: usize,
}

/// Applies the field parsers to raw listings using one set of lookup tables
#[derive(Debug, Clone)]
pub struct Transformer {
    tables: Arc<LookupTables>,
}

impl Transformer {
    pub fn new(tables: Arc<LookupTables>) -> Self {
        Transformer { tables }
    }

    /// Normalize a single listing. Individual field failures leave that
    /// field unknown; only a missing or non-positive price rejects the listing.
    pub fn clean_listing(
        &self,
        raw: &RawListing,
        cleaned_at: DateTime<Utc>,
    ) -> Result<CleanedListing, Rejection> {
        let url = raw.listing_url.as_str();

        let price_kes = match parse_price(&raw.price_raw)? {
            Some(price) if price > 0.0 => price,
            Some(price) => return Err(Rejection::NonPositivePrice(price)),
            None => return Err(Rejection::MissingPrice),
        };

        let location = parse_location(&raw.location_raw, &self.tables);

        Ok(CleanedListing {
            source_site: raw.source_site.clone(),
            listing_url: raw.listing_url.clone(),
            title: raw.title.clone(),
            description: raw.description.clone(),
            price_kes,
            county: location.county,
            neighborhood: location.neighborhood,
            bedrooms: known(url, "bedrooms", parse_count(&raw.bedrooms_raw)),
            bathrooms: known(url, "bathrooms", parse_count(&raw.bathrooms_raw)),
            area_sqm: known(url, "area", parse_area(&raw.area_raw)),
            property_type: standardize_property_type(&raw.property_type_raw, &self.tables),
            scraped_at: raw.scraped_at,
            cleaned_at,
        })
    }

    /// Normalize a batch. Listings are cleaned in parallel; survivors keep
    /// their input order.
    pub fn transform_listings(&self, raw: &[RawListing]) -> TransformOutcome {
        info!("Starting transformation of {} listings", raw.len());

        let cleaned_at = Utc::now();
        let results: Vec<Result<CleanedListing, Rejection>> = raw
            .par_iter()
            .map(|listing| self.clean_listing(listing, cleaned_at))
            .collect();

        let mut outcome = TransformOutcome {
            listings: Vec::with_capacity(results.len()),
            rejected: 0,
        };

        for (listing, result) in raw.iter().zip(results) {
            match result {
                Ok(cleaned) => outcome.listings.push(cleaned),
                Err(reason) => {
                    outcome.rejected += 1;
                    debug!("Rejected {}: {}", listing.listing_url, reason);
                }
            }
        }

        info!(
            "Transformation complete. {} listings after cleaning ({} rejected)",
            outcome.listings.len(),
            outcome.rejected
        );

        outcome
    }
}

fn known<T>(url: &str, field: &str, result: FieldResult<T>) -> Option<T> {
    match result {
        Ok(value) => value,
        Err(e) => {
            debug!("Could not parse {} for {}: {}", field, url, e);
            None
        }
    }
}
