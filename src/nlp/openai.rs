//! Chat-completions client for filter extraction and reply generation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::conversation::{Message, Role};
use crate::error::NlpError;
use crate::intent::Extraction;
use crate::nlp::traits::{FilterExtractor, ResponseContext, ResponseGenerator};

pub const DEFAULT_OPENAI_MODEL: &str = "gpt-3.5-turbo";
const BASE_URL: &str = "https://api.openai.com/v1/chat/completions";

const EXTRACTION_PROMPT: &str = r#"You are a real estate assistant. Extract property search criteria from user messages.
Return ONLY a valid JSON object with these fields (use null for missing values):
{
  "budget": number or null,
  "location": string or null,
  "bedrooms": number or null,
  "bathrooms": number or null,
  "minSize": number or null,
  "maxSize": number or null,
  "amenities": string (comma-separated) or null,
  "intent": "search" | "compare" | "save" | "help" | "general"
}"#;

const ASSISTANT_PROMPT: &str = "You are a friendly and helpful real estate assistant. \
You help users find their dream properties. Be conversational, helpful, and concise. \
If properties are found, mention the count. If no properties found, suggest adjusting filters.";

/// Language-model capability backed by the OpenAI chat-completions API
#[derive(Clone)]
pub struct OpenAiNlp {
    client: Client,
    api_key: String,
    model: String,
    endpoint: String,
}

impl OpenAiNlp {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, NlpError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            model: model.into(),
            endpoint: BASE_URL.to_string(),
        })
    }

    /// Point the client at a compatible endpoint instead of api.openai.com
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    async fn complete(&self, request: &ChatCompletionRequest) -> Result<String, NlpError> {
        debug!(
            "Sending {} messages to {} ({})",
            request.messages.len(),
            self.model,
            self.endpoint
        );

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            warn!("OpenAI returned status: {}", status);
            return Err(map_http_error(status, &body));
        }

        let parsed: ChatCompletionResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or(NlpError::EmptyResponse)
    }
}

fn role_name(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

fn extraction_messages(text: &str, history: &[Message]) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(ChatMessage::new("system", EXTRACTION_PROMPT));
    messages.extend(
        history
            .iter()
            .map(|m| ChatMessage::new(role_name(m.role), &m.text)),
    );
    messages.push(ChatMessage::new("user", text));
    messages
}

fn generation_messages(text: &str, context: Option<ResponseContext>) -> Vec<ChatMessage> {
    let mut messages = vec![
        ChatMessage::new("system", ASSISTANT_PROMPT),
        ChatMessage::new("user", text),
    ];
    if let Some(found) = context.map(|c| c.properties_found).filter(|n| *n > 0) {
        messages.push(ChatMessage::new(
            "assistant",
            &format!("Found {found} properties matching the criteria."),
        ));
    }
    messages
}

fn map_http_error(status: StatusCode, body: &str) -> NlpError {
    let message = serde_json::from_str::<ErrorResponse>(body)
        .map(|wrapper| wrapper.error.message)
        .unwrap_or_else(|_| body.to_string());
    NlpError::Status {
        status: status.as_u16(),
        message,
    }
}

#[async_trait]
impl FilterExtractor for OpenAiNlp {
    async fn extract(&self, text: &str, history: &[Message]) -> Result<Extraction, NlpError> {
        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages: extraction_messages(text, history),
            temperature: 0.3,
            max_tokens: 200,
        };
        let reply = self.complete(&request).await?;
        Extraction::from_model_reply(&reply)
    }
}

#[async_trait]
impl ResponseGenerator for OpenAiNlp {
    async fn generate(
        &self,
        text: &str,
        context: Option<ResponseContext>,
    ) -> Result<String, NlpError> {
        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages: generation_messages(text, context),
            temperature: 0.7,
            max_tokens: 150,
        };
        self.complete(&request).await
    }

    fn provider_name(&self) -> &'static str {
        "OpenAI"
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize, PartialEq)]
struct ChatMessage {
    role: String,
    content: String,
}

impl ChatMessage {
    fn new(role: &str, content: &str) -> Self {
        Self {
            role: role.to_string(),
            content: content.to_string(),
        }
    }
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}
