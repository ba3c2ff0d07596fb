//! Core data types for the ingestion pipeline
//! Pure data structures with no behavior

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Placeholder scrapers emit when a field could not be found on the page
pub const NOT_AVAILABLE: &str = "N/A";

fn not_available() -> String {
    NOT_AVAILABLE.to_string()
}

/// Exporters write a missing field as `null`
fn null_as_not_available<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_else(not_available))
}

/// Listing as produced by a source adapter, before normalization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawListing {
    pub source_site: String,
    pub listing_url: String,

    #[serde(default = "not_available", deserialize_with = "null_as_not_available")]
    pub title: String,
    #[serde(default = "not_available", deserialize_with = "null_as_not_available")]
    pub description: String,

    #[serde(default = "not_available", deserialize_with = "null_as_not_available")]
    pub price_raw: String,
    #[serde(default = "not_available", deserialize_with = "null_as_not_available")]
    pub location_raw: String,
    #[serde(default = "not_available", deserialize_with = "null_as_not_available")]
    pub bedrooms_raw: String,
    #[serde(default = "not_available", deserialize_with = "null_as_not_available")]
    pub bathrooms_raw: String,
    #[serde(default = "not_available", deserialize_with = "null_as_not_available")]
    pub area_raw: String,
    #[serde(default = "not_available", deserialize_with = "null_as_not_available")]
    pub property_type_raw: String,

    #[serde(default = "Utc::now")]
    pub scraped_at: DateTime<Utc>,
}

impl RawListing {
    /// New listing with every free-text field set to the sentinel
    pub fn new(source_site: impl Into<String>, listing_url: impl Into<String>) -> Self {
        RawListing {
            source_site: source_site.into(),
            listing_url: listing_url.into(),
            title: not_available(),
            description: not_available(),
            price_raw: not_available(),
            location_raw: not_available(),
            bedrooms_raw: not_available(),
            bathrooms_raw: not_available(),
            area_raw: not_available(),
            property_type_raw: not_available(),
            scraped_at: Utc::now(),
        }
    }
}

/// Listing after normalization. `price_kes` is always positive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct CleanedListing {
    pub source_site: String,
    pub listing_url: String,
    pub title: String,
    pub description: String,

    pub price_kes: f64,
    pub county: Option<String>,
    pub neighborhood: Option<String>,
    pub bedrooms: Option<i32>,
    pub bathrooms: Option<i32>,
    pub area_sqm: Option<f64>,
    pub property_type: Option<String>,

    pub scraped_at: DateTime<Utc>,
    pub cleaned_at: DateTime<Utc>,
}

/// Result of classifying a free-text location
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Location {
    pub county: Option<String>,
    pub neighborhood: Option<String>,
}

impl Location {
    pub fn new(county: Option<&str>, neighborhood: Option<&str>) -> Self {
        Location {
            county: county.map(str::to_string),
            neighborhood: neighborhood.map(str::to_string),
        }
    }
}

/// Records that carry the listing identity key
pub trait Identified {
    fn listing_url(&self) -> &str;
}

impl Identified for RawListing {
    fn listing_url(&self) -> &str {
        &self.listing_url
    }
}

impl Identified for CleanedListing {
    fn listing_url(&self) -> &str {
        &self.listing_url
    }
}

/// Outcome of a single insert-if-absent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// `listing_url` already present in the store
    Skipped,
}

/// Write operation statistics
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct WriteStats {
    pub inserted: usize,
    pub skipped: usize,
    pub errors: usize,
}

impl WriteStats {
    pub fn total(&self) -> usize {
        self.inserted + self.skipped + self.errors
    }
}

impl std::fmt::Display for WriteStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "inserted: {}, skipped: {}, errors: {}",
            self.inserted, self.skipped, self.errors
        )
    }
}

/// Storage-wide counts
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingStats {
    pub total_raw_listings: i64,
    pub total_cleaned_listings: i64,
    pub active_sources: Vec<String>,
}
