//! Conversational property search: a chat front end that turns free text
//! into structured listing filters, runs searches and keeps the session's
//! filters, results, comparison table and conversation in one store.

pub mod catalog;
pub mod comparison;
pub mod config;
pub mod conversation;
pub mod error;
pub mod filters;
pub mod intent;
pub mod live_search;
pub mod models;
pub mod nlp;
pub mod orchestrator;
pub mod preferences;
pub mod remote;
pub mod replies;
pub mod session;
pub mod store;

#[cfg(test)]
mod testing;

pub use config::AppConfig;
pub use live_search::LiveSearch;
pub use orchestrator::{SearchOrchestrator, TurnOutcome};
pub use session::{Session, SessionContext};
pub use store::SessionStore;
