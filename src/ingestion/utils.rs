//! Utility functions for common operations

use crate::ingestion::types::NOT_AVAILABLE;
use anyhow::Result;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// True for the scraper placeholder and for blank text
pub fn is_sentinel(value: &str) -> bool {
    let trimmed = value.trim();
    trimmed.is_empty() || trimmed == NOT_AVAILABLE
}

/// Word-initial capitalization: a letter following a non-letter is
/// upper-cased, every other letter is lower-cased.
///
/// "south c" -> "South C", "murang'a" -> "Murang'A"
pub fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut prev_is_letter = false;

    for c in text.chars() {
        if c.is_alphabetic() {
            if prev_is_letter {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_is_letter = true;
        } else {
            out.push(c);
            prev_is_letter = false;
        }
    }

    out
}

/// HTTP client shared by the pages of one source
pub fn http_client(timeout: Duration) -> Result<Client> {
    let client = Client::builder()
        .timeout(timeout)
        .user_agent(concat!("kenya-real-estate-etl/", env!("CARGO_PKG_VERSION")))
        .build()?;
    Ok(client)
}

/// GET a URL and return the body
pub async fn http_get(client: &Client, url: &str) -> Result<Vec<u8>> {
    debug!("Downloading from {}", url);

    let response = client.get(url).send().await?;
    let status = response.status();

    if !status.is_success() {
        return Err(anyhow::anyhow!("HTTP request failed: {}", status));
    }

    let bytes = response.bytes().await?;
    debug!("Downloaded {} bytes", bytes.len());
    Ok(bytes.to_vec())
}
