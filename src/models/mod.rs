use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::filters::FilterSet;

/// Core property data model as surfaced by the catalog
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Property {
    /// Numeric catalog identifier
    pub id: u64,
    /// Backing-store record key, when the catalog exposes one
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub record_id: Option<String>,
    #[serde(default)]
    pub bedrooms: u32,
    #[serde(default)]
    pub bathrooms: u32,
    #[serde(default)]
    pub size_sqft: f64,
    #[serde(default)]
    pub amenities: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default = "unknown_location")]
    pub location: String,
    #[serde(default)]
    pub price: f64,
}

fn unknown_location() -> String {
    "Unknown".to_string()
}

impl Property {
    /// One-line summary used by the shell and in logs
    pub fn headline(&self) -> String {
        format!(
            "#{} {} · {} bd / {} ba · {} sqft · ${}",
            self.id, self.location, self.bedrooms, self.bathrooms, self.size_sqft, self.price
        )
    }
}

/// One recorded search, as kept in a user's history
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchHistoryEntry {
    #[serde(flatten)]
    pub filters: FilterSet,
    pub timestamp: DateTime<Utc>,
}

impl SearchHistoryEntry {
    pub fn now(filters: FilterSet) -> Self {
        Self {
            filters,
            timestamp: Utc::now(),
        }
    }
}

/// Preference profile accumulated from recorded searches
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserPreferences {
    pub max_budget: Option<f64>,
    #[serde(default)]
    pub preferred_locations: Vec<String>,
    pub min_bedrooms: Option<i64>,
    pub min_bathrooms: Option<i64>,
    #[serde(default)]
    pub required_amenities: Vec<String>,
}

impl UserPreferences {
    /// Fold a searched filter set into the profile. Fields the search left
    /// unconstrained keep their previous value.
    pub fn absorb(&mut self, filters: &FilterSet) {
        if let Some(budget) = filters.budget_limit() {
            self.max_budget = Some(budget);
        }
        if let Some(location) = filters.location_term() {
            if !self
                .preferred_locations
                .iter()
                .any(|l| l.eq_ignore_ascii_case(location))
            {
                self.preferred_locations.push(location.to_string());
            }
        }
        if let Some(bedrooms) = filters.min_bedrooms() {
            self.min_bedrooms = Some(bedrooms);
        }
        if let Some(bathrooms) = filters.min_bathrooms() {
            self.min_bathrooms = Some(bathrooms);
        }
        if let Some(amenities) = filters.amenity_labels() {
            self.required_amenities = amenities;
        }
    }
}
