//! PostgreSQL listing store

use crate::ingestion::types::{CleanedListing, InsertOutcome, ListingStats, RawListing};
use crate::ingestion::write::ListingStore;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::PgPool;
use tracing::info;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS raw_listings (
        id SERIAL PRIMARY KEY,
        source_site VARCHAR(100) NOT NULL,
        listing_url VARCHAR(500) NOT NULL UNIQUE,
        title TEXT,
        description TEXT,
        price_raw VARCHAR(200),
        location_raw VARCHAR(300),
        bedrooms_raw VARCHAR(50),
        bathrooms_raw VARCHAR(50),
        area_raw VARCHAR(100),
        property_type_raw VARCHAR(100),
        scraped_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS cleaned_listings (
        id SERIAL PRIMARY KEY,
        raw_listing_id INTEGER REFERENCES raw_listings (id),
        source_site VARCHAR(100) NOT NULL,
        listing_url VARCHAR(500) NOT NULL UNIQUE,
        title TEXT,
        description TEXT,
        price_kes DOUBLE PRECISION NOT NULL CHECK (price_kes > 0),
        county VARCHAR(100),
        neighborhood VARCHAR(200),
        bedrooms INTEGER,
        bathrooms INTEGER,
        area_sqm DOUBLE PRECISION,
        property_type VARCHAR(100),
        scraped_at TIMESTAMPTZ NOT NULL,
        cleaned_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
];

#[derive(Clone)]
pub struct PgListingStore {
    db: PgPool,
}

impl PgListingStore {
    pub fn new(db: PgPool) -> Self {
        PgListingStore { db }
    }

    /// Create the listing tables if they do not exist yet
    pub async fn ensure_schema(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.db)
                .await
                .context("Failed to create listing tables")?;
        }
        info!("Listing tables ready");
        Ok(())
    }
}

fn outcome(rows_affected: u64) -> InsertOutcome {
    if rows_affected > 0 {
        InsertOutcome::Inserted
    } else {
        InsertOutcome::Skipped
    }
}

#[async_trait]
impl ListingStore for PgListingStore {
    async fn insert_raw(&self, listing: &RawListing) -> Result<InsertOutcome> {
        let result = sqlx::query(
            r#"
            INSERT INTO raw_listings (
                source_site, listing_url, title, description, price_raw, location_raw,
                bedrooms_raw, bathrooms_raw, area_raw, property_type_raw, scraped_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (listing_url) DO NOTHING
            "#,
        )
        .bind(&listing.source_site)
        .bind(&listing.listing_url)
        .bind(&listing.title)
        .bind(&listing.description)
        .bind(&listing.price_raw)
        .bind(&listing.location_raw)
        .bind(&listing.bedrooms_raw)
        .bind(&listing.bathrooms_raw)
        .bind(&listing.area_raw)
        .bind(&listing.property_type_raw)
        .bind(listing.scraped_at)
        .execute(&self.db)
        .await?;

        Ok(outcome(result.rows_affected()))
    }

    async fn insert_cleaned(&self, listing: &CleanedListing) -> Result<InsertOutcome> {
        // Link back to the raw row when the raw listing was stored
        let result = sqlx::query(
            r#"
            INSERT INTO cleaned_listings (
                raw_listing_id, source_site, listing_url, title, description,
                price_kes, county, neighborhood, bedrooms, bathrooms, area_sqm,
                property_type, scraped_at, cleaned_at
            )
            VALUES (
                (SELECT id FROM raw_listings WHERE listing_url = $2),
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13
            )
            ON CONFLICT (listing_url) DO NOTHING
            "#,
        )
        .bind(&listing.source_site)
        .bind(&listing.listing_url)
        .bind(&listing.title)
        .bind(&listing.description)
        .bind(listing.price_kes)
        .bind(&listing.county)
        .bind(&listing.neighborhood)
        .bind(listing.bedrooms)
        .bind(listing.bathrooms)
        .bind(listing.area_sqm)
        .bind(&listing.property_type)
        .bind(listing.scraped_at)
        .bind(listing.cleaned_at)
        .execute(&self.db)
        .await?;

        Ok(outcome(result.rows_affected()))
    }

    async fn statistics(&self) -> Result<ListingStats> {
        let total_raw_listings = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM raw_listings")
            .fetch_one(&self.db)
            .await
            .context("Failed to count raw listings")?;

        let total_cleaned_listings =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM cleaned_listings")
                .fetch_one(&self.db)
                .await
                .context("Failed to count cleaned listings")?;

        let active_sources = sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT source_site FROM raw_listings ORDER BY source_site",
        )
        .fetch_all(&self.db)
        .await
        .context("Failed to list source sites")?;

        Ok(ListingStats {
            total_raw_listings,
            total_cleaned_listings,
            active_sources,
        })
    }

    async fn cleaned_listings(&self, limit: usize) -> Result<Vec<CleanedListing>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        let listings = sqlx::query_as::<_, CleanedListing>(
            r#"
            SELECT
                source_site, listing_url,
                COALESCE(title, 'N/A') AS title,
                COALESCE(description, 'N/A') AS description,
                price_kes, county, neighborhood, bedrooms, bathrooms, area_sqm,
                property_type, scraped_at, cleaned_at
            FROM cleaned_listings
            ORDER BY cleaned_at DESC, id DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.db)
        .await
        .context("Failed to fetch cleaned listings")?;

        Ok(listings)
    }
}
