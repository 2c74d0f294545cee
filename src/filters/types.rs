use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::FilterError;

/// Canonical search criteria.
///
/// Every field is optional. Absent, empty, `"any"` and zero values mean
/// "no constraint"; the accessors below apply that rule so callers never
/// have to.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FilterSet {
    /// Upper bound on price
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget: Option<f64>,
    /// Case-insensitive substring of the property location
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Minimum number of bedrooms
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bedrooms: Option<i64>,
    /// Minimum number of bathrooms
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bathrooms: Option<i64>,
    /// Inclusive lower bound on size (sqft)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_size: Option<f64>,
    /// Inclusive upper bound on size (sqft)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_size: Option<f64>,
    /// Amenity labels, matched any-of
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amenities: Option<Vec<String>>,
}

impl FilterSet {
    pub fn budget_limit(&self) -> Option<f64> {
        self.budget.filter(|b| *b != 0.0)
    }

    pub fn location_term(&self) -> Option<&str> {
        self.location
            .as_deref()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.eq_ignore_ascii_case("any"))
    }

    pub fn min_bedrooms(&self) -> Option<i64> {
        self.bedrooms.filter(|b| *b != 0)
    }

    pub fn min_bathrooms(&self) -> Option<i64> {
        self.bathrooms.filter(|b| *b != 0)
    }

    pub fn min_size_bound(&self) -> Option<f64> {
        self.min_size.filter(|s| *s != 0.0)
    }

    pub fn max_size_bound(&self) -> Option<f64> {
        self.max_size.filter(|s| *s != 0.0)
    }

    pub fn amenity_labels(&self) -> Option<Vec<String>> {
        let labels: Vec<String> = self
            .amenities
            .as_ref()?
            .iter()
            .map(|a| a.trim())
            .filter(|a| !a.is_empty() && !a.eq_ignore_ascii_case("any"))
            .map(str::to_string)
            .collect();
        (!labels.is_empty()).then_some(labels)
    }

    /// A direct search needs a budget, a bedroom count or a location.
    /// Bathrooms, size and amenities alone are not enough.
    pub fn has_minimum_criteria(&self) -> bool {
        self.budget_limit().is_some()
            || self.min_bedrooms().is_some()
            || self.location_term().is_some()
    }

    /// Query-string pairs for the constrained fields only.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(budget) = self.budget_limit() {
            pairs.push(("budget", format_number(budget)));
        }
        if let Some(location) = self.location_term() {
            pairs.push(("location", location.to_string()));
        }
        if let Some(bedrooms) = self.min_bedrooms() {
            pairs.push(("bedrooms", bedrooms.to_string()));
        }
        if let Some(bathrooms) = self.min_bathrooms() {
            pairs.push(("bathrooms", bathrooms.to_string()));
        }
        if let Some(min_size) = self.min_size_bound() {
            pairs.push(("minSize", format_number(min_size)));
        }
        if let Some(max_size) = self.max_size_bound() {
            pairs.push(("maxSize", format_number(max_size)));
        }
        if let Some(amenities) = self.amenity_labels() {
            pairs.push(("amenities", amenities.join(",")));
        }
        pairs
    }
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

/// Sparse override proposal for a [`FilterSet`].
///
/// `None` means "no opinion, keep the base value"; `Some` overrides.
/// Decoding is lenient because the values usually come from a language
/// model: numbers may be numeric strings and amenities may be a
/// comma-separated string. Scalars that cannot be read decode as `None`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PartialFilterUpdate {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub budget: Option<f64>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub location: Option<String>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub bedrooms: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub bathrooms: Option<i64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub min_size: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub max_size: Option<f64>,
    #[serde(default, deserialize_with = "lenient_labels")]
    pub amenities: Option<Vec<String>>,
}

impl PartialFilterUpdate {
    /// True when at least one field carries an override.
    pub fn has_any(&self) -> bool {
        self.budget.is_some()
            || self.location.is_some()
            || self.bedrooms.is_some()
            || self.bathrooms.is_some()
            || self.min_size.is_some()
            || self.max_size.is_some()
            || self.amenities.is_some()
    }

    /// Build a single-field update from a `field=value` style edit.
    ///
    /// Field names accept both the wire spelling (`minSize`) and snake case.
    /// An empty value sets the field to its "no constraint" form.
    pub fn from_assignment(field: &str, raw: &str) -> Result<Self, FilterError> {
        let raw = raw.trim();
        let mut update = Self::default();
        match field.trim() {
            "budget" => update.budget = Some(number_or_zero(field, raw)?),
            "location" => update.location = Some(raw.to_string()),
            "bedrooms" => update.bedrooms = Some(number_or_zero(field, raw)? as i64),
            "bathrooms" => update.bathrooms = Some(number_or_zero(field, raw)? as i64),
            "minSize" | "min_size" => update.min_size = Some(number_or_zero(field, raw)?),
            "maxSize" | "max_size" => update.max_size = Some(number_or_zero(field, raw)?),
            "amenities" => update.amenities = Some(split_labels(raw)),
            other => return Err(FilterError::UnknownField(other.to_string())),
        }
        Ok(update)
    }
}

fn number_or_zero(field: &str, raw: &str) -> Result<f64, FilterError> {
    if raw.is_empty() {
        return Ok(0.0);
    }
    parse_number(raw).ok_or_else(|| FilterError::InvalidValue {
        field: field.to_string(),
        value: raw.to_string(),
    })
}

/// Parse `"500000"`, `"$500,000"` or `" 3 "` into a number.
pub(crate) fn parse_number(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| *c != '$' && *c != ',' && *c != '_')
        .collect();
    cleaned.parse::<f64>().ok().filter(|n| n.is_finite())
}

fn split_labels(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

fn value_to_f64(value: Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_number(&s),
        _ => None,
    }
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(value_to_f64))
}

fn lenient_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(value_to_f64).map(|n| n.trunc() as i64))
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn lenient_labels<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => Some(split_labels(&s)),
        Some(Value::Array(items)) => Some(
            items
                .into_iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s.trim().to_string()),
                    _ => None,
                })
                .filter(|s| !s.is_empty())
                .collect(),
        ),
        _ => None,
    })
}
