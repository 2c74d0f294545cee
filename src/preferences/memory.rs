use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::catalog::Catalog;
use crate::error::{CatalogError, PreferenceError};
use crate::filters::FilterSet;
use crate::models::{Property, SearchHistoryEntry, UserPreferences};
use crate::preferences::traits::PreferenceStore;

#[derive(Debug, Default)]
struct UserRecord {
    saved: Vec<u64>,
    history: Vec<SearchHistoryEntry>,
    preferences: UserPreferences,
}

/// Preference store kept in process memory, resolving saved ids through
/// the catalog
pub struct InMemoryPreferences {
    catalog: Arc<dyn Catalog>,
    users: RwLock<HashMap<String, UserRecord>>,
}

impl InMemoryPreferences {
    pub fn new(catalog: Arc<dyn Catalog>) -> Self {
        Self {
            catalog,
            users: RwLock::new(HashMap::new()),
        }
    }

    pub async fn history(&self, user_id: &str) -> Vec<SearchHistoryEntry> {
        self.users
            .read()
            .await
            .get(user_id)
            .map(|u| u.history.clone())
            .unwrap_or_default()
    }

    pub async fn preferences(&self, user_id: &str) -> UserPreferences {
        self.users
            .read()
            .await
            .get(user_id)
            .map(|u| u.preferences.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl PreferenceStore for InMemoryPreferences {
    async fn get_saved(&self, user_id: &str) -> Result<Vec<Property>, PreferenceError> {
        let ids = self
            .users
            .read()
            .await
            .get(user_id)
            .map(|u| u.saved.clone())
            .unwrap_or_default();

        let mut saved = Vec::with_capacity(ids.len());
        for id in ids {
            match self.catalog.get(id).await {
                Ok(property) => saved.push(property),
                Err(e) => warn!("Saved property {} could not be resolved: {}", id, e),
            }
        }
        Ok(saved)
    }

    async fn save(&self, user_id: &str, property: &Property) -> Result<(), PreferenceError> {
        let property_id = property.id;
        match self.catalog.get(property_id).await {
            Ok(_) => {}
            Err(CatalogError::NotFound(id)) => return Err(PreferenceError::PropertyNotFound(id)),
            Err(e) => {
                warn!("Could not verify property {}: {}", property_id, e);
                return Err(PreferenceError::PropertyNotFound(property_id));
            }
        }

        let mut users = self.users.write().await;
        let record = users.entry(user_id.to_string()).or_default();
        if !record.saved.contains(&property_id) {
            record.saved.push(property_id);
        }
        debug!("User {} saved property {}", user_id, property_id);
        Ok(())
    }

    async fn remove(&self, user_id: &str, property: &Property) -> Result<(), PreferenceError> {
        if let Some(record) = self.users.write().await.get_mut(user_id) {
            record.saved.retain(|id| *id != property.id);
        }
        Ok(())
    }

    async fn record_search(
        &self,
        user_id: &str,
        filters: &FilterSet,
    ) -> Result<(), PreferenceError> {
        let mut users = self.users.write().await;
        let record = users.entry(user_id.to_string()).or_default();
        record.history.push(SearchHistoryEntry::now(filters.clone()));
        record.preferences.absorb(filters);
        Ok(())
    }
}
