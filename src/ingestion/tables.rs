//! Lookup tables driving location and property-type classification
//!
//! Tables are plain data: the built-in Kenyan defaults are embedded from
//! `config/lookup_tables.json` and any other file with the same shape can be
//! swapped in at startup. Entry order matters, the first matching keyword wins.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::info;

static DEFAULT_TABLES: &str = include_str!("../../config/lookup_tables.json");

/// Well-known neighborhood keyword and where it resolves to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeighborhoodEntry {
    pub keyword: String,
    pub county: String,
    pub neighborhood: String,
}

/// Property-type keyword and its canonical label
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyTypeEntry {
    pub keyword: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupTables {
    pub counties: Vec<String>,
    pub neighborhoods: Vec<NeighborhoodEntry>,
    pub property_types: Vec<PropertyTypeEntry>,
}

impl LookupTables {
    /// Tables shipped with the crate (47 counties, curated neighborhoods)
    pub fn builtin() -> Result<Self> {
        Self::from_json_str(DEFAULT_TABLES).context("Built-in lookup tables are invalid")
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let tables: LookupTables =
            serde_json::from_str(json).context("Failed to deserialize lookup tables")?;
        tables.normalized().validate()
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("Failed to read lookup tables from {:?}", path))?;
        Self::from_json_str(&json).with_context(|| format!("Invalid lookup tables in {:?}", path))
    }

    /// Load from `path` if given, otherwise fall back to the built-in tables
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let tables = match path {
            Some(path) => Self::from_path(path)?,
            None => Self::builtin()?,
        };

        info!(
            "Lookup tables loaded: {} counties, {} neighborhoods, {} property types",
            tables.counties.len(),
            tables.neighborhoods.len(),
            tables.property_types.len()
        );

        Ok(tables)
    }

    /// Keywords are matched against lower-cased input
    fn normalized(mut self) -> Self {
        for entry in &mut self.neighborhoods {
            entry.keyword = entry.keyword.trim().to_lowercase();
        }
        for entry in &mut self.property_types {
            entry.keyword = entry.keyword.trim().to_lowercase();
        }
        self
    }

    fn validate(self) -> Result<Self> {
        if self.counties.is_empty() {
            anyhow::bail!("County list is empty");
        }

        let known: HashSet<&str> = self.counties.iter().map(String::as_str).collect();

        if let Some(county) = self.counties.iter().find(|c| c.trim().is_empty()) {
            anyhow::bail!("Blank county name in county list: {:?}", county);
        }

        for entry in &self.neighborhoods {
            if entry.keyword.is_empty() {
                anyhow::bail!("Neighborhood entry for {:?} has an empty keyword", entry.neighborhood);
            }
            if !known.contains(entry.county.as_str()) {
                anyhow::bail!(
                    "Neighborhood keyword {:?} maps to unknown county {:?}",
                    entry.keyword,
                    entry.county
                );
            }
        }

        if let Some(entry) = self.property_types.iter().find(|e| e.keyword.is_empty()) {
            anyhow::bail!("Property type entry for {:?} has an empty keyword", entry.label);
        }

        Ok(self)
    }

    pub fn is_county(&self, name: &str) -> bool {
        self.counties.iter().any(|c| c == name)
    }
}
