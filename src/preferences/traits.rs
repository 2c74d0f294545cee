use async_trait::async_trait;

use crate::error::PreferenceError;
use crate::filters::FilterSet;
use crate::models::Property;

/// Per-user favorites and search history
#[async_trait]
pub trait PreferenceStore: Send + Sync {
    /// Saved properties, oldest first
    async fn get_saved(&self, user_id: &str) -> Result<Vec<Property>, PreferenceError>;

    /// Stores key the favorite however they identify listings: a backend
    /// by the record key, the in-memory store by catalog id.
    async fn save(&self, user_id: &str, property: &Property) -> Result<(), PreferenceError>;

    /// Removing a property that is not saved is not an error
    async fn remove(&self, user_id: &str, property: &Property) -> Result<(), PreferenceError>;

    async fn record_search(&self, user_id: &str, filters: &FilterSet)
        -> Result<(), PreferenceError>;
}
