//! REST client for a property backend exposing catalog, preference and
//! NLP endpoints behind a `{success, data}` envelope.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::catalog::Catalog;
use crate::comparison::EntryId;
use crate::conversation::{render_content, Message, Role};
use crate::error::{CatalogError, NlpError, PreferenceError};
use crate::filters::FilterSet;
use crate::intent::Extraction;
use crate::models::Property;
use crate::nlp::{FilterExtractor, ResponseContext, ResponseGenerator};
use crate::preferences::PreferenceStore;

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    success: bool,
    data: Option<T>,
    #[serde(default)]
    error: Option<String>,
}

/// Transport-level failure, converted into each collaborator's error type
#[derive(Debug)]
enum ApiFailure {
    Request(reqwest::Error),
    Status { status: u16, message: String },
}

impl From<reqwest::Error> for ApiFailure {
    fn from(err: reqwest::Error) -> Self {
        ApiFailure::Request(err)
    }
}

impl From<ApiFailure> for CatalogError {
    fn from(failure: ApiFailure) -> Self {
        match failure {
            ApiFailure::Request(e) => CatalogError::Request(e),
            ApiFailure::Status { status, message } => CatalogError::Status { status, message },
        }
    }
}

impl From<ApiFailure> for PreferenceError {
    fn from(failure: ApiFailure) -> Self {
        match failure {
            ApiFailure::Request(e) => PreferenceError::Request(e),
            ApiFailure::Status { status, message } => PreferenceError::Status { status, message },
        }
    }
}

impl From<ApiFailure> for NlpError {
    fn from(failure: ApiFailure) -> Self {
        match failure {
            ApiFailure::Request(e) => NlpError::Request(e),
            ApiFailure::Status { status, message } => NlpError::Status { status, message },
        }
    }
}

/// Client for the property backend API
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// The backend keys favorites by record key; listings without one fall
    /// back to their catalog id.
    fn save_request(&self, user_id: &str, property: &Property) -> RequestBuilder {
        self.client
            .post(self.url(&format!("/preferences/{user_id}/save")))
            .json(&json!({ "propertyId": EntryId::of(property) }))
    }

    fn remove_request(&self, user_id: &str, property: &Property) -> RequestBuilder {
        let key = EntryId::of(property);
        self.client
            .delete(self.url(&format!("/preferences/{user_id}/save/{key}")))
    }

    /// Send the request and unwrap the envelope. A `success: false`
    /// envelope is reported as a status failure carrying its error text.
    async fn call<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<Option<T>, ApiFailure> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        let envelope: Envelope<T> = match serde_json::from_str(&body) {
            Ok(envelope) => envelope,
            Err(_) if !status.is_success() => {
                return Err(ApiFailure::Status {
                    status: status.as_u16(),
                    message: body,
                })
            }
            Err(e) => {
                return Err(ApiFailure::Status {
                    status: status.as_u16(),
                    message: format!("malformed response body: {e}"),
                })
            }
        };

        if !status.is_success() || !envelope.success {
            warn!("Backend returned status: {}", status);
            return Err(ApiFailure::Status {
                status: status.as_u16(),
                message: envelope
                    .error
                    .unwrap_or_else(|| status.canonical_reason().unwrap_or("").to_string()),
            });
        }
        Ok(envelope.data)
    }
}

/// History entry as the backend's NLP endpoint expects it
#[derive(Debug, Serialize, PartialEq)]
struct HistoryItem<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    text: &'a str,
}

fn history_payload(history: &[Message]) -> Vec<HistoryItem<'_>> {
    history
        .iter()
        .map(|m| HistoryItem {
            kind: match m.role {
                Role::User => "user",
                Role::Assistant => "bot",
            },
            text: &m.text,
        })
        .collect()
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PreferenceDocument {
    #[serde(default)]
    saved_properties: Vec<Value>,
}

/// Saved entries come back populated; anything that is not a full
/// property record is skipped.
fn populated_properties(document: PreferenceDocument) -> Vec<Property> {
    document
        .saved_properties
        .into_iter()
        .filter_map(|value| serde_json::from_value(value).ok())
        .collect()
}

#[async_trait]
impl Catalog for ApiClient {
    async fn search(&self, filters: &FilterSet) -> Result<Vec<Property>, CatalogError> {
        let pairs = filters.query_pairs();
        debug!("GET /properties with {} constraints", pairs.len());
        let request = self.client.get(self.url("/properties")).query(&pairs);
        Ok(self.call::<Vec<Property>>(request).await?.unwrap_or_default())
    }

    async fn get(&self, id: u64) -> Result<Property, CatalogError> {
        let request = self.client.get(self.url(&format!("/properties/{id}")));
        match self.call::<Property>(request).await {
            Ok(Some(property)) => Ok(property),
            Ok(None) => Err(CatalogError::NotFound(id)),
            Err(ApiFailure::Status { status, .. }) if status == StatusCode::NOT_FOUND.as_u16() => {
                Err(CatalogError::NotFound(id))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn source_name(&self) -> &'static str {
        "remote"
    }
}

#[async_trait]
impl PreferenceStore for ApiClient {
    async fn get_saved(&self, user_id: &str) -> Result<Vec<Property>, PreferenceError> {
        let request = self.client.get(self.url(&format!("/preferences/{user_id}")));
        let document = self.call::<PreferenceDocument>(request).await?;
        Ok(document.map(populated_properties).unwrap_or_default())
    }

    async fn save(&self, user_id: &str, property: &Property) -> Result<(), PreferenceError> {
        match self.call::<Value>(self.save_request(user_id, property)).await {
            Ok(_) => Ok(()),
            Err(ApiFailure::Status { status, .. }) if status == StatusCode::NOT_FOUND.as_u16() => {
                Err(PreferenceError::PropertyNotFound(property.id))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn remove(&self, user_id: &str, property: &Property) -> Result<(), PreferenceError> {
        self.call::<Value>(self.remove_request(user_id, property))
            .await?;
        Ok(())
    }

    async fn record_search(
        &self,
        user_id: &str,
        filters: &FilterSet,
    ) -> Result<(), PreferenceError> {
        let request = self.client.post(self.url("/preferences")).json(&json!({
            "userId": user_id,
            "searchHistory": filters,
            "preferences": filters,
        }));
        self.call::<Value>(request).await?;
        Ok(())
    }
}

#[async_trait]
impl FilterExtractor for ApiClient {
    async fn extract(&self, text: &str, history: &[Message]) -> Result<Extraction, NlpError> {
        let request = self.client.post(self.url("/nlp/extract")).json(&json!({
            "message": text,
            "conversationHistory": history_payload(history),
        }));
        self.call::<Extraction>(request)
            .await?
            .ok_or(NlpError::EmptyResponse)
    }
}

#[async_trait]
impl ResponseGenerator for ApiClient {
    async fn generate(
        &self,
        text: &str,
        context: Option<ResponseContext>,
    ) -> Result<String, NlpError> {
        let request = self.client.post(self.url("/nlp/chat")).json(&json!({
            "message": text,
            "context": context.unwrap_or_default(),
        }));
        let data = self.call::<Value>(request).await?;
        Ok(render_content(data.unwrap_or(Value::Null)))
    }

    fn provider_name(&self) -> &'static str {
        "backend"
    }
}
