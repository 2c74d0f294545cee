//! Utterance intent: the wire shape an extractor returns and the tagged
//! variant the orchestrator branches on.

use serde::{Deserialize, Serialize};

use crate::error::NlpError;
use crate::filters::PartialFilterUpdate;

/// Raw extraction result: an optional intent tag riding alongside a sparse
/// filter update.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Extraction {
    #[serde(default)]
    pub intent: Option<String>,
    #[serde(flatten)]
    pub filters: PartialFilterUpdate,
}

impl Extraction {
    /// Parse a model reply that is expected to contain one JSON object,
    /// possibly wrapped in prose or a code fence.
    pub fn from_model_reply(reply: &str) -> Result<Self, NlpError> {
        let start = reply.find('{');
        let end = reply.rfind('}');
        let json = match (start, end) {
            (Some(start), Some(end)) if start < end => &reply[start..=end],
            _ => return Err(NlpError::Unparseable(truncate(reply, 80))),
        };
        serde_json::from_str(json).map_err(|e| NlpError::Unparseable(e.to_string()))
    }
}

fn truncate(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

/// What an utterance asks for.
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    Search(PartialFilterUpdate),
    Compare,
    Save,
    Help,
    General,
}

impl Intent {
    /// Route an extraction.
    ///
    /// A `search` tag or any filter field makes it a search, whatever the
    /// tag says. Returns `None` for an extraction with neither a tag nor a
    /// filter field, which the caller treats as unusable. Unknown tags are
    /// general conversation.
    pub fn classify(extraction: Extraction) -> Option<Intent> {
        let tag = extraction
            .intent
            .as_deref()
            .map(|t| t.trim().to_ascii_lowercase());

        if tag.as_deref() == Some("search") || extraction.filters.has_any() {
            return Some(Intent::Search(extraction.filters));
        }

        match tag.as_deref()? {
            "compare" => Some(Intent::Compare),
            "save" => Some(Intent::Save),
            "help" => Some(Intent::Help),
            _ => Some(Intent::General),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Intent::Search(_) => "search",
            Intent::Compare => "compare",
            Intent::Save => "save",
            Intent::Help => "help",
            Intent::General => "general",
        }
    }
}
