//! Observable per-session state.
//!
//! Each piece of state lives in its own `watch` channel. Writers replace or
//! modify the value, readers take snapshots or subscribe. The live search
//! and the orchestrator only ever talk to each other through this store.

use serde_json::Value;
use tokio::sync::watch;

use crate::comparison::{CapacityExceeded, ComparedEntry, ComparisonSet, EntryId, Toggled};
use crate::conversation::{ConversationLog, Message, Role};
use crate::filters::{FilterSet, PartialFilterUpdate};
use crate::models::Property;

pub struct SessionStore {
    filters: watch::Sender<FilterSet>,
    results: watch::Sender<Vec<Property>>,
    conversation: watch::Sender<ConversationLog>,
    comparison: watch::Sender<ComparisonSet>,
    saved: watch::Sender<Vec<Property>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::with_conversation(ConversationLog::new())
    }

    pub fn with_conversation(log: ConversationLog) -> Self {
        Self {
            filters: watch::Sender::new(FilterSet::default()),
            results: watch::Sender::new(Vec::new()),
            conversation: watch::Sender::new(log),
            comparison: watch::Sender::new(ComparisonSet::new()),
            saved: watch::Sender::new(Vec::new()),
        }
    }

    // Filters

    pub fn filters(&self) -> FilterSet {
        self.filters.borrow().clone()
    }

    /// Replace the canonical filter set
    pub fn commit_filters(&self, filters: FilterSet) {
        self.filters.send_replace(filters);
    }

    /// Merge an edit into the canonical filter set and return the new value
    pub fn apply_filter_update(&self, update: &PartialFilterUpdate) -> FilterSet {
        let mut merged = FilterSet::default();
        self.filters.send_modify(|current| {
            *current = current.merged(update);
            merged = current.clone();
        });
        merged
    }

    pub fn reset_filters(&self) {
        self.commit_filters(FilterSet::default());
    }

    pub fn subscribe_filters(&self) -> watch::Receiver<FilterSet> {
        self.filters.subscribe()
    }

    // Displayed results. Last writer wins.

    pub fn results(&self) -> Vec<Property> {
        self.results.borrow().clone()
    }

    pub fn set_results(&self, results: Vec<Property>) {
        self.results.send_replace(results);
    }

    pub fn clear_results(&self) {
        self.results.send_replace(Vec::new());
    }

    pub fn subscribe_results(&self) -> watch::Receiver<Vec<Property>> {
        self.results.subscribe()
    }

    // Conversation

    pub fn append_message(&self, role: Role, content: impl Into<Value>) {
        let content = content.into();
        self.conversation
            .send_modify(|log| log.append(role, content));
    }

    pub fn conversation(&self) -> ConversationLog {
        self.conversation.borrow().clone()
    }

    /// The most recent `window` messages, as handed to the NLP capability
    pub fn context_window(&self, window: usize) -> Vec<Message> {
        self.conversation.borrow().window(window).to_vec()
    }

    pub fn subscribe_conversation(&self) -> watch::Receiver<ConversationLog> {
        self.conversation.subscribe()
    }

    // Comparison

    pub fn comparison(&self) -> ComparisonSet {
        self.comparison.borrow().clone()
    }

    pub fn toggle_comparison(&self, entry: ComparedEntry) -> Result<Toggled, CapacityExceeded> {
        let mut outcome = Err(CapacityExceeded);
        self.comparison.send_if_modified(|set| {
            outcome = set.toggle(entry);
            outcome.is_ok()
        });
        outcome
    }

    pub fn remove_from_comparison(&self, id: &EntryId) -> bool {
        self.comparison.send_if_modified(|set| set.remove(id))
    }

    pub fn clear_comparison(&self) {
        self.comparison.send_modify(ComparisonSet::clear);
    }

    pub fn subscribe_comparison(&self) -> watch::Receiver<ComparisonSet> {
        self.comparison.subscribe()
    }

    // Saved properties

    pub fn saved(&self) -> Vec<Property> {
        self.saved.borrow().clone()
    }

    pub fn set_saved(&self, saved: Vec<Property>) {
        self.saved.send_replace(saved);
    }

    pub fn is_saved(&self, property_id: u64) -> bool {
        self.saved.borrow().iter().any(|p| p.id == property_id)
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}
