use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::catalog::traits::Catalog;
use crate::error::CatalogError;
use crate::filters::FilterSet;
use crate::models::Property;

/// Default cap on the number of properties a search returns
pub const DEFAULT_RESULT_LIMIT: usize = 50;

/// Catalog held entirely in memory
pub struct InMemoryCatalog {
    properties: Vec<Property>,
    limit: usize,
}

impl InMemoryCatalog {
    pub fn new(properties: Vec<Property>) -> Self {
        Self {
            properties,
            limit: DEFAULT_RESULT_LIMIT,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Load every `*.json` file in `dir`. Each file holds an array of
    /// records; records sharing an `id` are merged field by field, later
    /// files overriding earlier ones.
    pub async fn load_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        info!("Loading property data from {}", dir.display());

        let mut files = Vec::new();
        let mut entries = tokio::fs::read_dir(dir)
            .await
            .with_context(|| format!("Failed to read data directory {}", dir.display()))?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                files.push(path);
            }
        }
        files.sort();

        let mut merged: BTreeMap<u64, Map<String, Value>> = BTreeMap::new();
        for path in &files {
            let raw = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let records: Value = serde_json::from_str(&raw)
                .with_context(|| format!("Failed to parse {}", path.display()))?;

            let Value::Array(records) = records else {
                warn!("Skipping {}: not a JSON array", path.display());
                continue;
            };
            debug!("Reading {}: {} records", path.display(), records.len());

            for record in records {
                let Value::Object(fields) = record else {
                    continue;
                };
                let Some(id) = fields.get("id").and_then(Value::as_u64) else {
                    warn!("Skipping record without numeric id in {}", path.display());
                    continue;
                };
                merged.entry(id).or_default().extend(fields);
            }
        }

        let properties = merged
            .into_values()
            .map(|fields| serde_json::from_value::<Property>(Value::Object(fields)))
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to decode merged property records")?;

        info!(
            "Loaded {} properties from {} files",
            properties.len(),
            files.len()
        );
        Ok(Self::new(properties))
    }

    /// A small fixed catalog for demos and local runs
    pub fn sample() -> Self {
        info!("📋 Using built-in sample listings");
        let listing = |id: u64,
                       location: &str,
                       price: f64,
                       bedrooms: u32,
                       bathrooms: u32,
                       size_sqft: f64,
                       amenities: &[&str]| Property {
            id,
            record_id: None,
            bedrooms,
            bathrooms,
            size_sqft,
            amenities: amenities.iter().map(|a| a.to_string()).collect(),
            image_url: None,
            location: location.to_string(),
            price,
        };

        Self::new(vec![
            listing(1, "Austin, TX", 425_000.0, 3, 2, 1650.0, &["garage", "yard"]),
            listing(2, "Austin, TX", 610_000.0, 4, 3, 2300.0, &["pool", "garage"]),
            listing(3, "Denver, CO", 389_000.0, 2, 1, 980.0, &["balcony", "gym"]),
            listing(4, "Denver, CO", 525_000.0, 3, 2, 1720.0, &["fireplace", "yard"]),
            listing(5, "Seattle, WA", 799_000.0, 3, 2, 1500.0, &["balcony", "elevator"]),
            listing(6, "Portland, OR", 455_000.0, 2, 2, 1200.0, &["garden"]),
        ])
    }
}

/// Reject values no catalog query can mean
fn validate(filters: &FilterSet) -> Result<(), CatalogError> {
    let negative = [
        ("budget", filters.budget.map(|v| v < 0.0)),
        ("bedrooms", filters.bedrooms.map(|v| v < 0)),
        ("bathrooms", filters.bathrooms.map(|v| v < 0)),
        ("minSize", filters.min_size.map(|v| v < 0.0)),
        ("maxSize", filters.max_size.map(|v| v < 0.0)),
    ];
    match negative.iter().find(|(_, is_negative)| *is_negative == Some(true)) {
        Some((field, _)) => Err(CatalogError::InvalidFilter(format!(
            "{field} must not be negative"
        ))),
        None => Ok(()),
    }
}

fn matches(property: &Property, filters: &FilterSet) -> bool {
    if let Some(bedrooms) = filters.min_bedrooms() {
        if i64::from(property.bedrooms) < bedrooms {
            return false;
        }
    }
    if let Some(bathrooms) = filters.min_bathrooms() {
        if i64::from(property.bathrooms) < bathrooms {
            return false;
        }
    }
    if let Some(location) = filters.location_term() {
        if !property
            .location
            .to_lowercase()
            .contains(&location.to_lowercase())
        {
            return false;
        }
    }
    if let Some(budget) = filters.budget_limit() {
        if property.price > budget {
            return false;
        }
    }
    if let Some(min_size) = filters.min_size_bound() {
        if property.size_sqft < min_size {
            return false;
        }
    }
    if let Some(max_size) = filters.max_size_bound() {
        if property.size_sqft > max_size {
            return false;
        }
    }
    if let Some(wanted) = filters.amenity_labels() {
        let any_match = property
            .amenities
            .iter()
            .any(|have| wanted.iter().any(|w| w.eq_ignore_ascii_case(have.trim())));
        if !any_match {
            return false;
        }
    }
    true
}

#[async_trait]
impl Catalog for InMemoryCatalog {
    async fn search(&self, filters: &FilterSet) -> Result<Vec<Property>, CatalogError> {
        validate(filters)?;
        let found: Vec<Property> = self
            .properties
            .iter()
            .filter(|p| matches(p, filters))
            .take(self.limit)
            .cloned()
            .collect();
        debug!("In-memory search matched {} properties", found.len());
        Ok(found)
    }

    async fn get(&self, id: u64) -> Result<Property, CatalogError> {
        self.properties
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .ok_or(CatalogError::NotFound(id))
    }

    fn source_name(&self) -> &'static str {
        "in-memory"
    }
}
