//! Field parsers - turn one free-text listing field into one typed value
//!
//! Numeric parsers return `Ok(None)` for the scraper placeholder, `Err` when
//! the text is present but cannot be read, and `Ok(Some(_))` otherwise.
//! Classification parsers (location, property type) always produce a value.

use crate::ingestion::tables::LookupTables;
use crate::ingestion::types::Location;
use crate::ingestion::utils::{is_sentinel, title_case};
use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

static INTEGER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").unwrap());
static DECIMAL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+\.?\d*").unwrap());

const SQM_PER_ACRE: f64 = 4046.86;
const SQM_PER_HECTARE: f64 = 10_000.0;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldError {
    #[error("unparseable price: {0:?}")]
    Price(String),

    #[error("no count in: {0:?}")]
    Count(String),

    #[error("no area in: {0:?}")]
    Area(String),
}

pub type FieldResult<T> = Result<Option<T>, FieldError>;

/// Parse a price in Kenyan Shillings ("KES 4.5M", "12,500,000", "250K")
pub fn parse_price(raw: &str) -> FieldResult<f64> {
    if is_sentinel(raw) {
        return Ok(None);
    }

    let kept: String = raw
        .to_uppercase()
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '.' | 'K' | 'M' | 'B'))
        .collect();

    // Currency residue ("KES", "KSh") sits in front of the amount
    let amount = kept.trim_start_matches(|c: char| c.is_ascii_alphabetic());

    let (multiplier, suffix) = if amount.contains('K') {
        (1_000.0, Some('K'))
    } else if amount.contains('M') {
        (1_000_000.0, Some('M'))
    } else if amount.contains('B') {
        (1_000_000_000.0, Some('B'))
    } else {
        (1.0, None)
    };

    let number = match suffix {
        Some(letter) => amount.replace(letter, ""),
        None => amount.to_string(),
    };

    number
        .parse::<f64>()
        .ok()
        .map(|value| value * multiplier)
        .filter(|value| value.is_finite())
        .map(Some)
        .ok_or_else(|| FieldError::Price(raw.to_string()))
}

/// Resolve a location string to county and neighborhood.
///
/// Priority: neighborhood keyword table, then county names anywhere in the
/// text, then a "neighborhood, county" split, then the text as-is.
pub fn parse_location(raw: &str, tables: &LookupTables) -> Location {
    if is_sentinel(raw) {
        return Location::default();
    }

    let text = raw.trim().to_lowercase();

    if let Some(entry) = tables
        .neighborhoods
        .iter()
        .find(|entry| text.contains(entry.keyword.as_str()))
    {
        return Location::new(Some(entry.county.as_str()), Some(entry.neighborhood.as_str()));
    }

    if let Some(county) = find_county(&text, tables) {
        return Location::new(Some(county), Some(title_case(&text).as_str()));
    }

    let parts: Vec<&str> = text.split(',').collect();
    if parts.len() >= 2 {
        let neighborhood = title_case(parts[0].trim());
        let neighborhood = (!neighborhood.is_empty()).then_some(neighborhood.as_str());

        let county = find_county(parts[1].trim(), tables);
        return Location::new(county, neighborhood);
    }

    Location::new(None, Some(title_case(&text).as_str()))
}

fn find_county<'a>(text: &str, tables: &'a LookupTables) -> Option<&'a str> {
    tables
        .counties
        .iter()
        .find(|county| text.contains(county.to_lowercase().as_str()))
        .map(String::as_str)
}

/// First run of digits anywhere in the text ("4 bedrooms", "3-bedroom")
pub fn parse_count(raw: &str) -> FieldResult<i32> {
    if is_sentinel(raw) {
        return Ok(None);
    }

    let text = raw.to_lowercase();
    INTEGER_RE
        .find(&text)
        .and_then(|m| m.as_str().parse::<i32>().ok())
        .map(Some)
        .ok_or_else(|| FieldError::Count(raw.to_string()))
}

/// Area in square meters. Acres and hectares are converted, anything else
/// is taken to be square meters already.
pub fn parse_area(raw: &str) -> FieldResult<f64> {
    if is_sentinel(raw) {
        return Ok(None);
    }

    let text = raw.to_lowercase();
    let value = DECIMAL_RE
        .find(&text)
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .ok_or_else(|| FieldError::Area(raw.to_string()))?;

    let area = if text.contains("acre") {
        value * SQM_PER_ACRE
    } else if text.contains("hectare") || text.contains("ha") {
        value * SQM_PER_HECTARE
    } else {
        value
    };

    if area <= 0.0 {
        return Err(FieldError::Area(raw.to_string()));
    }

    Ok(Some(area))
}

/// Map a property-type label onto the canonical taxonomy, passing unknown
/// labels through title-cased
pub fn standardize_property_type(raw: &str, tables: &LookupTables) -> Option<String> {
    if is_sentinel(raw) {
        return None;
    }

    let text = raw.trim().to_lowercase();

    let label = tables
        .property_types
        .iter()
        .find(|entry| text.contains(entry.keyword.as_str()))
        .map(|entry| entry.label.clone())
        .unwrap_or_else(|| title_case(&text));

    Some(label)
}
