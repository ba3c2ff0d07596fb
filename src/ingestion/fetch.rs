//! Fetch functions - retrieve raw listings from source adapters
//!
//! HTML extraction lives outside this crate. A source hands over listings
//! that an extractor already produced, either as an exported file or as a
//! paged JSON endpoint.

use crate::ingestion::types::RawListing;
use crate::ingestion::utils::{http_client, http_get};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Only the first few bad rows of a file are logged
const MAX_LOGGED_ROW_ERRORS: usize = 10;

#[async_trait]
pub trait ListingSource: Send + Sync {
    fn site_name(&self) -> &str;

    async fn fetch_listings(&self, max_pages: u32) -> Result<Vec<RawListing>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    File,
    Http,
}

/// One configured listing source
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    pub kind: SourceKind,
    /// File path for `file`, search URL for `http`
    pub location: String,
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_max_pages() -> u32 {
    5
}

fn default_enabled() -> bool {
    true
}

pub fn load_source_configs(path: &Path) -> Result<Vec<SourceConfig>> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("Failed to read source config from {:?}", path))?;
    let configs: Vec<SourceConfig> = serde_json::from_str(&json)
        .with_context(|| format!("Invalid source config in {:?}", path))?;
    Ok(configs)
}

/// Build adapters for enabled sources. A non-empty `only` restricts the
/// result to the named sources.
pub fn build_sources(
    configs: &[SourceConfig],
    only: &[String],
    timeout: Duration,
) -> Result<Vec<Box<dyn ListingSource>>> {
    let mut sources: Vec<Box<dyn ListingSource>> = Vec::new();

    for config in configs {
        if !only.is_empty() && !only.iter().any(|name| name == &config.name) {
            continue;
        }
        if !config.enabled {
            info!("Source {} is disabled, skipping", config.name);
            continue;
        }

        let source: Box<dyn ListingSource> = match config.kind {
            SourceKind::File => Box::new(FileSource::new(&config.name, &config.location)),
            SourceKind::Http => Box::new(HttpJsonSource::new(
                &config.name,
                &config.location,
                http_client(timeout)?,
            )),
        };
        sources.push(source);
    }

    for name in only {
        if !configs.iter().any(|config| &config.name == name) {
            warn!("Unknown source: {}", name);
        }
    }

    Ok(sources)
}

/// Listings exported by an extractor as a JSON array or a CSV file
pub struct FileSource {
    site_name: String,
    path: PathBuf,
}

impl FileSource {
    pub fn new(site_name: &str, path: impl Into<PathBuf>) -> Self {
        FileSource {
            site_name: site_name.to_string(),
            path: path.into(),
        }
    }

    fn read_json(&self) -> Result<(Vec<RawListing>, usize)> {
        let json = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {:?}", self.path))?;
        let rows: Vec<serde_json::Value> = serde_json::from_str(&json)
            .with_context(|| format!("{:?} is not a JSON array", self.path))?;

        Ok(decode_rows(&self.site_name, rows))
    }

    fn read_csv(&self) -> Result<(Vec<RawListing>, usize)> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_path(&self.path)
            .with_context(|| format!("Failed to open {:?}", self.path))?;

        let mut listings = Vec::new();
        let mut errors = 0;

        for (idx, result) in reader.deserialize::<CsvRow>().enumerate() {
            match result {
                Ok(row) => match row.into_listing(&self.site_name) {
                    Some(listing) => listings.push(listing),
                    None => {
                        errors += 1;
                        if errors <= MAX_LOGGED_ROW_ERRORS {
                            warn!("Row {} has no listing_url", idx);
                        }
                    }
                },
                Err(e) => {
                    errors += 1;
                    if errors <= MAX_LOGGED_ROW_ERRORS {
                        warn!("Failed to deserialize row {}: {}", idx, e);
                    }
                }
            }
        }

        Ok((listings, errors))
    }
}

#[async_trait]
impl ListingSource for FileSource {
    fn site_name(&self) -> &str {
        &self.site_name
    }

    async fn fetch_listings(&self, _max_pages: u32) -> Result<Vec<RawListing>> {
        info!("Reading {} listings from {:?}", self.site_name, self.path);

        let is_csv = self
            .path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));

        let (listings, errors) = if is_csv {
            self.read_csv()?
        } else {
            self.read_json()?
        };

        info!(
            "Read {} listings from {:?} ({} errors)",
            listings.len(),
            self.path,
            errors
        );

        Ok(listings)
    }
}

/// Decode JSON rows one at a time so a bad row costs only itself. Rows
/// without a `source_site` belong to `site_name`.
fn decode_rows(site_name: &str, rows: Vec<serde_json::Value>) -> (Vec<RawListing>, usize) {
    let mut listings = Vec::with_capacity(rows.len());
    let mut errors = 0;

    for (idx, mut row) in rows.into_iter().enumerate() {
        if let Some(object) = row.as_object_mut() {
            object
                .entry("source_site")
                .or_insert_with(|| serde_json::Value::String(site_name.to_string()));
        }

        match serde_json::from_value::<RawListing>(row) {
            Ok(listing) => listings.push(listing),
            Err(e) => {
                errors += 1;
                if errors <= MAX_LOGGED_ROW_ERRORS {
                    warn!("Failed to deserialize row {}: {}", idx, e);
                }
            }
        }
    }

    (listings, errors)
}

/// CSV exports flatten missing values to empty cells
#[derive(Debug, Deserialize)]
struct CsvRow {
    source_site: Option<String>,
    listing_url: Option<String>,
    title: Option<String>,
    description: Option<String>,
    price_raw: Option<String>,
    location_raw: Option<String>,
    bedrooms_raw: Option<String>,
    bathrooms_raw: Option<String>,
    area_raw: Option<String>,
    property_type_raw: Option<String>,
    scraped_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl CsvRow {
    fn into_listing(self, site_name: &str) -> Option<RawListing> {
        let listing_url = self.listing_url.filter(|url| !url.trim().is_empty())?;
        let source_site = self
            .source_site
            .filter(|site| !site.trim().is_empty())
            .unwrap_or_else(|| site_name.to_string());

        let mut listing = RawListing::new(source_site, listing_url);
        let fields = [
            (&mut listing.title, self.title),
            (&mut listing.description, self.description),
            (&mut listing.price_raw, self.price_raw),
            (&mut listing.location_raw, self.location_raw),
            (&mut listing.bedrooms_raw, self.bedrooms_raw),
            (&mut listing.bathrooms_raw, self.bathrooms_raw),
            (&mut listing.area_raw, self.area_raw),
            (&mut listing.property_type_raw, self.property_type_raw),
        ];
        for (slot, value) in fields {
            if let Some(value) = value.filter(|v| !v.is_empty()) {
                *slot = value;
            }
        }
        if let Some(scraped_at) = self.scraped_at {
            listing.scraped_at = scraped_at;
        }

        Some(listing)
    }
}

/// Paged JSON endpoint of an extraction service: `{url}?page=N` returns a
/// JSON array of raw listings, an empty array past the last page
pub struct HttpJsonSource {
    site_name: String,
    search_url: String,
    client: Client,
}

impl HttpJsonSource {
    pub fn new(site_name: &str, search_url: &str, client: Client) -> Self {
        HttpJsonSource {
            site_name: site_name.to_string(),
            search_url: search_url.to_string(),
            client,
        }
    }

    fn page_url(&self, page: u32) -> String {
        let separator = if self.search_url.contains('?') { '&' } else { '?' };
        format!("{}{}page={}", self.search_url, separator, page)
    }

    /// Listings on the page and the number of rows it held
    async fn fetch_page(&self, page: u32) -> Result<(Vec<RawListing>, usize)> {
        let bytes = http_get(&self.client, &self.page_url(page)).await?;
        let rows: Vec<serde_json::Value> = serde_json::from_slice(&bytes)
            .with_context(|| format!("Page {} is not a JSON array", page))?;
        let row_count = rows.len();

        let (listings, errors) = decode_rows(&self.site_name, rows);
        if errors > 0 {
            warn!("Dropped {} bad rows on page {} of {}", errors, page, self.site_name);
        }
        Ok((listings, row_count))
    }
}

#[async_trait]
impl ListingSource for HttpJsonSource {
    fn site_name(&self) -> &str {
        &self.site_name
    }

    async fn fetch_listings(&self, max_pages: u32) -> Result<Vec<RawListing>> {
        let mut all_listings = Vec::new();

        for page in 1..=max_pages {
            let (listings, row_count) = match self.fetch_page(page).await {
                Ok(page_result) => page_result,
                Err(e) => {
                    warn!("Failed to fetch page {} of {}: {:#}", page, self.site_name, e);
                    continue;
                }
            };

            info!(
                "Extracted {} listings from page {} of {}",
                listings.len(),
                page,
                self.site_name
            );

            if row_count == 0 {
                break;
            }
            all_listings.extend(listings);
        }

        Ok(all_listings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_file_source_json() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(
            file,
            r#"[
                {{"listing_url": "https://pigiame.co.ke/a", "price_raw": "KES 3.2M"}},
                {{"title": "no url here"}},
                {{"source_site": "mirror", "listing_url": "https://pigiame.co.ke/b"}}
            ]"#
        )
        .unwrap();

        let source = FileSource::new("pigiame", file.path());
        let listings = source.fetch_listings(1).await.unwrap();

        assert_eq!(listings.len(), 2);
        assert_eq!(listings[0].source_site, "pigiame");
        assert_eq!(listings[0].price_raw, "KES 3.2M");
        assert_eq!(listings[0].location_raw, "N/A");
        assert_eq!(listings[1].source_site, "mirror");
    }

    #[tokio::test]
    async fn test_file_source_json_null_fields() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(
            file,
            r#"[{{"listing_url": "u1", "price_raw": "KES 3.2M", "description": null}}]"#
        )
        .unwrap();

        let source = FileSource::new("pigiame", file.path());
        let listings = source.fetch_listings(1).await.unwrap();

        assert_eq!(listings.len(), 1);
        assert_eq!(listings[0].price_raw, "KES 3.2M");
        assert_eq!(listings[0].description, "N/A");
    }

    #[tokio::test]
    async fn test_file_source_csv() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("haofinder.csv");
        fs::write(
            &path,
            "listing_url,title,price_raw,location_raw,bedrooms_raw\n\
             https://haofinder.com/1,Maisonette,KES 18M,\"Syokimau, Machakos\",4 beds\n\
             ,Missing url,1M,Karen,\n\
             https://haofinder.com/2,Plot,,Kitengela,\n",
        )
        .unwrap();

        let source = FileSource::new("haofinder", &path);
        let listings = source.fetch_listings(1).await.unwrap();

        assert_eq!(listings.len(), 2);
        assert_eq!(listings[0].source_site, "haofinder");
        assert_eq!(listings[0].location_raw, "Syokimau, Machakos");
        assert_eq!(listings[0].bedrooms_raw, "4 beds");
        assert_eq!(listings[1].price_raw, "N/A");
        assert_eq!(listings[1].bedrooms_raw, "N/A");
    }

    #[tokio::test]
    async fn test_file_source_missing_file() {
        let source = FileSource::new("pigiame", "/nonexistent/listings.json");
        assert!(source.fetch_listings(1).await.is_err());
    }

    /// Serve fixed JSON pages on a local port, returning the search URL
    async fn serve_pages(pages: Vec<&'static str>) -> String {
        use axum::extract::Query;
        use axum::routing::get;
        use std::collections::HashMap;

        let app = axum::Router::new().route(
            "/extract",
            get(move |Query(params): Query<HashMap<String, String>>| {
                let page: usize = params
                    .get("page")
                    .and_then(|p| p.parse().ok())
                    .unwrap_or(1);
                let body = page
                    .checked_sub(1)
                    .and_then(|idx| pages.get(idx))
                    .copied()
                    .unwrap_or("[]")
                    .to_string();
                async move { body }
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        format!("http://{}/extract", addr)
    }

    #[tokio::test]
    async fn test_http_source_keeps_good_rows_on_page() {
        let url = serve_pages(vec![
            r#"[
                {"listing_url": "u1", "price_raw": "4.5M", "area_raw": null},
                {"title": "no url"},
                {"listing_url": "u2", "location_raw": null}
            ]"#,
            r#"[{"listing_url": "u3"}]"#,
        ])
        .await;

        let source = HttpJsonSource::new("buyrentkenya", &url, Client::new());
        let listings = source.fetch_listings(5).await.unwrap();

        let urls: Vec<&str> = listings.iter().map(|l| l.listing_url.as_str()).collect();
        assert_eq!(urls, vec!["u1", "u2", "u3"]);
        assert_eq!(listings[0].source_site, "buyrentkenya");
        assert_eq!(listings[0].area_raw, "N/A");
        assert_eq!(listings[1].location_raw, "N/A");
    }

    #[tokio::test]
    async fn test_http_source_page_of_bad_rows_does_not_stop_paging() {
        let url = serve_pages(vec![r#"[{"title": "no url"}]"#, r#"[{"listing_url": "u9"}]"#]).await;

        let source = HttpJsonSource::new("property24", &url, Client::new());
        let listings = source.fetch_listings(3).await.unwrap();

        assert_eq!(listings.len(), 1);
        assert_eq!(listings[0].listing_url, "u9");
    }

    #[test]
    fn test_page_url() {
        let source = HttpJsonSource::new("p24", "http://localhost:8088/extract/p24", Client::new());
        assert_eq!(source.page_url(2), "http://localhost:8088/extract/p24?page=2");

        let source = HttpJsonSource::new("p24", "http://localhost/x?type=sale", Client::new());
        assert_eq!(source.page_url(1), "http://localhost/x?type=sale&page=1");
    }

    #[test]
    fn test_build_sources_filters() {
        let configs: Vec<SourceConfig> = serde_json::from_str(
            r#"[
                {"name": "pigiame", "kind": "file", "location": "a.json"},
                {"name": "haofinder", "kind": "file", "location": "b.csv", "enabled": false},
                {"name": "property24", "kind": "http", "location": "http://localhost/p24", "max_pages": 3}
            ]"#,
        )
        .unwrap();
        assert_eq!(configs[0].max_pages, 5);
        assert_eq!(configs[2].kind, SourceKind::Http);

        let all = build_sources(&configs, &[], Duration::from_secs(5)).unwrap();
        let names: Vec<&str> = all.iter().map(|s| s.site_name()).collect();
        assert_eq!(names, vec!["pigiame", "property24"]);

        let only = vec!["property24".to_string(), "nope".to_string()];
        let some = build_sources(&configs, &only, Duration::from_secs(5)).unwrap();
        assert_eq!(some.len(), 1);
        assert_eq!(some[0].site_name(), "property24");
    }

    #[test]
    fn test_load_shipped_source_config() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/sources.json");
        let configs = load_source_configs(&path).unwrap();
        assert!(configs.iter().any(|c| c.name == "buyrentkenya"));
    }
}
