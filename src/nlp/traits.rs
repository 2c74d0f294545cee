use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::conversation::Message;
use crate::error::NlpError;
use crate::intent::Extraction;

/// Turns free text into a sparse filter update plus an intent tag
#[async_trait]
pub trait FilterExtractor: Send + Sync {
    /// `history` holds prior turns only, never the text being extracted
    async fn extract(&self, text: &str, history: &[Message]) -> Result<Extraction, NlpError>;
}

/// Extra facts handed to response generation
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ResponseContext {
    pub properties_found: usize,
}

impl ResponseContext {
    pub fn found(count: usize) -> Self {
        Self {
            properties_found: count,
        }
    }
}

/// Produces a conversational assistant reply
#[async_trait]
pub trait ResponseGenerator: Send + Sync {
    async fn generate(
        &self,
        text: &str,
        context: Option<ResponseContext>,
    ) -> Result<String, NlpError>;

    /// Name of the backing service, for logs
    fn provider_name(&self) -> &'static str;
}
