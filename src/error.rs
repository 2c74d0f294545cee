//! Error types for the search core and its collaborators.

use thiserror::Error;

/// Errors from building a filter edit.
#[derive(Debug, Error, PartialEq)]
pub enum FilterError {
    #[error("unknown filter field: {0}")]
    UnknownField(String),
    #[error("invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },
}

/// Errors from the natural-language capability.
#[derive(Debug, Error)]
pub enum NlpError {
    #[error("NLP request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("NLP service returned status {status}: {message}")]
    Status { status: u16, message: String },
    #[error("NLP service returned no content")]
    EmptyResponse,
    #[error("could not parse NLP output: {0}")]
    Unparseable(String),
}

/// Errors from the property catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("catalog returned status {status}: {message}")]
    Status { status: u16, message: String },
    #[error("invalid filter: {0}")]
    InvalidFilter(String),
    #[error("property not found: {0}")]
    NotFound(u64),
}

/// Errors from the preference store.
#[derive(Debug, Error)]
pub enum PreferenceError {
    #[error("preference request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("preference store returned status {status}: {message}")]
    Status { status: u16, message: String },
    #[error("property not found: {0}")]
    PropertyNotFound(u64),
}

/// Errors that reject an orchestration before it starts.
///
/// Everything that can go wrong once a turn is running is reported to the
/// user through the conversation log instead.
#[derive(Debug, Error, PartialEq)]
pub enum OrchestratorError {
    #[error("another request is already in progress for this session")]
    Busy,
    #[error("message cannot be empty")]
    EmptyUtterance,
    #[error("session is closed")]
    SessionClosed,
}

/// Errors from loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid value for {var}: {value}")]
    InvalidEnv { var: &'static str, value: String },
}
