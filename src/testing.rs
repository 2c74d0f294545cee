//! Recording fakes for the external collaborators.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::catalog::Catalog;
use crate::conversation::Message;
use crate::error::{CatalogError, NlpError, PreferenceError};
use crate::filters::FilterSet;
use crate::intent::Extraction;
use crate::models::Property;
use crate::nlp::{FilterExtractor, ResponseContext, ResponseGenerator};
use crate::preferences::PreferenceStore;

pub fn property(id: u64) -> Property {
    Property {
        id,
        record_id: None,
        bedrooms: 3,
        bathrooms: 2,
        size_sqft: 1500.0,
        amenities: vec!["garage".to_string()],
        image_url: None,
        location: "Austin, TX".to_string(),
        price: 450_000.0,
    }
}

/// Extractor returning a fixed extraction, or failing when none is set
#[derive(Default)]
pub struct FakeExtractor {
    pub reply: Mutex<Option<Extraction>>,
    pub calls: Mutex<Vec<(String, Vec<Message>)>>,
    /// Time each call spends "on the network" before answering
    pub delay: Option<Duration>,
}

impl FakeExtractor {
    pub fn returning(extraction: Extraction) -> Self {
        Self {
            reply: Mutex::new(Some(extraction)),
            ..Self::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn failing() -> Self {
        Self::default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn texts(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(text, _)| text.clone())
            .collect()
    }
}

#[async_trait]
impl FilterExtractor for FakeExtractor {
    async fn extract(&self, text: &str, history: &[Message]) -> Result<Extraction, NlpError> {
        self.calls
            .lock()
            .unwrap()
            .push((text.to_string(), history.to_vec()));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.reply
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| NlpError::Unparseable("no JSON object".to_string()))
    }
}

/// Generator echoing a canned reply, or failing when `fail` is set
#[derive(Default)]
pub struct FakeGenerator {
    pub fail: bool,
    pub calls: Mutex<Vec<(String, Option<ResponseContext>)>>,
}

impl FakeGenerator {
    pub fn failing() -> Self {
        Self {
            fail: true,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<(String, Option<ResponseContext>)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn reply_for(text: &str) -> String {
        format!("generated: {text}")
    }
}

#[async_trait]
impl ResponseGenerator for FakeGenerator {
    async fn generate(
        &self,
        text: &str,
        context: Option<ResponseContext>,
    ) -> Result<String, NlpError> {
        self.calls.lock().unwrap().push((text.to_string(), context));
        if self.fail {
            return Err(NlpError::EmptyResponse);
        }
        Ok(Self::reply_for(text))
    }

    fn provider_name(&self) -> &'static str {
        "fake"
    }
}

/// Catalog returning a fixed result list, or failing when none is set
#[derive(Default)]
pub struct FakeCatalog {
    pub results: Mutex<Option<Vec<Property>>>,
    pub calls: Mutex<Vec<FilterSet>>,
}

impl FakeCatalog {
    pub fn returning(results: Vec<Property>) -> Self {
        Self {
            results: Mutex::new(Some(results)),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<FilterSet> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Catalog for FakeCatalog {
    async fn search(&self, filters: &FilterSet) -> Result<Vec<Property>, CatalogError> {
        self.calls.lock().unwrap().push(filters.clone());
        self.results
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| CatalogError::Status {
                status: 503,
                message: "catalog unavailable".to_string(),
            })
    }

    async fn get(&self, id: u64) -> Result<Property, CatalogError> {
        Ok(property(id))
    }

    fn source_name(&self) -> &'static str {
        "fake"
    }
}

/// Preference store recording every call
#[derive(Default)]
pub struct FakePreferences {
    pub fail: bool,
    pub saved: Mutex<Vec<Property>>,
    pub recorded: Mutex<Vec<FilterSet>>,
}

impl FakePreferences {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn saved(&self) -> Vec<Property> {
        self.saved.lock().unwrap().clone()
    }

    pub fn recorded(&self) -> Vec<FilterSet> {
        self.recorded.lock().unwrap().clone()
    }

    fn check(&self) -> Result<(), PreferenceError> {
        if self.fail {
            Err(PreferenceError::Status {
                status: 503,
                message: "preferences unavailable".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl PreferenceStore for FakePreferences {
    async fn get_saved(&self, _user_id: &str) -> Result<Vec<Property>, PreferenceError> {
        self.check()?;
        Ok(self.saved())
    }

    async fn save(&self, _user_id: &str, property: &Property) -> Result<(), PreferenceError> {
        self.check()?;
        let mut saved = self.saved.lock().unwrap();
        if !saved.iter().any(|p| p.id == property.id) {
            saved.push(property.clone());
        }
        Ok(())
    }

    async fn remove(&self, _user_id: &str, property: &Property) -> Result<(), PreferenceError> {
        self.check()?;
        self.saved.lock().unwrap().retain(|p| p.id != property.id);
        Ok(())
    }

    async fn record_search(
        &self,
        _user_id: &str,
        filters: &FilterSet,
    ) -> Result<(), PreferenceError> {
        self.check()?;
        self.recorded.lock().unwrap().push(filters.clone());
        Ok(())
    }
}
