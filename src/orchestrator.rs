//! Conversational search orchestration.
//!
//! One utterance runs: log it, extract intent against the prior turns,
//! route by intent, merge and commit filters, query the catalog, summarize,
//! and record the search. Every failure after the turn has started becomes
//! an assistant message; nothing is retried.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::catalog::Catalog;
use crate::conversation::Role;
use crate::error::{CatalogError, OrchestratorError};
use crate::filters::FilterSet;
use crate::intent::Intent;
use crate::models::Property;
use crate::nlp::{FilterExtractor, ResponseContext, ResponseGenerator};
use crate::preferences::PreferenceStore;
use crate::replies;
use crate::session::Session;

/// Default number of prior messages handed to extraction
pub const DEFAULT_CONTEXT_WINDOW: usize = 20;

/// How a turn ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Extraction failed or was unusable; the help text was shown
    Fallback,
    /// A non-search intent was answered conversationally
    Replied { intent: &'static str },
    /// The search was refused for lack of a budget, bedroom count or location
    MissingCriteria,
    NoResults,
    Found(usize),
    SearchFailed,
    /// The session closed while the turn was in flight
    Discarded,
}

pub struct SearchOrchestrator {
    catalog: Arc<dyn Catalog>,
    extractor: Arc<dyn FilterExtractor>,
    generator: Arc<dyn ResponseGenerator>,
    preferences: Arc<dyn PreferenceStore>,
    context_window: usize,
}

impl SearchOrchestrator {
    pub fn new(
        catalog: Arc<dyn Catalog>,
        extractor: Arc<dyn FilterExtractor>,
        generator: Arc<dyn ResponseGenerator>,
        preferences: Arc<dyn PreferenceStore>,
    ) -> Self {
        Self {
            catalog,
            extractor,
            generator,
            preferences,
            context_window: DEFAULT_CONTEXT_WINDOW,
        }
    }

    /// Number of prior messages handed to extraction; 0 sends the whole log
    pub fn with_context_window(mut self, messages: usize) -> Self {
        self.context_window = messages;
        self
    }

    /// Handle one free-text message from the user.
    pub async fn handle_utterance(
        &self,
        session: &Session,
        text: &str,
    ) -> Result<TurnOutcome, OrchestratorError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(OrchestratorError::EmptyUtterance);
        }
        let _turn = session.begin_turn()?;
        let store = session.store();

        // Extraction sees the turns before this one only.
        let history = store.context_window(self.context_window);
        store.append_message(Role::User, text);

        let extraction = match self.extractor.extract(text, &history).await {
            Ok(extraction) => extraction,
            Err(e) => {
                warn!("Extraction failed for session {}: {}", session.context().session_id, e);
                return Ok(self.fallback(session));
            }
        };
        if session.is_closed() {
            return Ok(TurnOutcome::Discarded);
        }

        let Some(intent) = Intent::classify(extraction) else {
            debug!("Extraction carried neither intent nor filters");
            return Ok(self.fallback(session));
        };
        info!("Utterance routed as {}", intent.label());

        match intent {
            Intent::Search(update) => {
                let filters = store.apply_filter_update(&update);
                if !filters.has_minimum_criteria() {
                    store.append_message(Role::Assistant, replies::MISSING_CRITERIA);
                    return Ok(TurnOutcome::MissingCriteria);
                }
                Ok(self.execute_search(session, &filters).await)
            }
            other => {
                let reply = self.reply(text, None).await;
                if session.is_closed() {
                    return Ok(TurnOutcome::Discarded);
                }
                store.append_message(Role::Assistant, reply);
                Ok(TurnOutcome::Replied {
                    intent: other.label(),
                })
            }
        }
    }

    /// Search with structured filters from the filter panel. Explicit
    /// filters replace the session's filter set; `None` searches with the
    /// current one.
    pub async fn search(
        &self,
        session: &Session,
        filters: Option<FilterSet>,
    ) -> Result<TurnOutcome, OrchestratorError> {
        let _turn = session.begin_turn()?;
        let store = session.store();
        if let Some(filters) = filters {
            store.commit_filters(filters);
        }
        let filters = store.filters();

        if !filters.has_minimum_criteria() {
            store.append_message(Role::Assistant, replies::MISSING_CRITERIA);
            return Ok(TurnOutcome::MissingCriteria);
        }

        Ok(self.execute_search(session, &filters).await)
    }

    /// One debounced live-search pass: extract, merge into a copy of the
    /// current filters, query, display. Nothing is committed to the filter
    /// set and nothing is said in the conversation. Returns the number of
    /// displayed results, or `None` when the pass failed.
    pub async fn live_search(&self, session: &Session, query: &str) -> Option<usize> {
        let store = session.store();
        let history = store.context_window(self.context_window);

        let extraction = match self.extractor.extract(query, &history).await {
            Ok(extraction) => extraction,
            Err(e) => {
                warn!("Live search extraction failed: {}", e);
                return None;
            }
        };

        let filters = store.filters().merged(&extraction.filters);
        match self.catalog.search(&filters).await {
            Ok(found) => {
                if session.is_closed() {
                    return None;
                }
                let count = found.len();
                debug!("Live search for {:?} displayed {} properties", query, count);
                store.set_results(found);
                Some(count)
            }
            Err(e) => {
                warn!("Live search query failed: {}", e);
                None
            }
        }
    }

    async fn execute_search(&self, session: &Session, filters: &FilterSet) -> TurnOutcome {
        let store = session.store();
        store.append_message(Role::User, replies::SEARCH_REQUEST);
        store.append_message(Role::Assistant, replies::SEARCHING);

        let found = match self.catalog.search(filters).await {
            Ok(found) => found,
            Err(e) => {
                error!("Search against {} failed: {}", self.catalog.source_name(), e);
                if session.is_closed() {
                    return TurnOutcome::Discarded;
                }
                store.append_message(Role::Assistant, replies::SEARCH_FAILED);
                return TurnOutcome::SearchFailed;
            }
        };
        if session.is_closed() {
            return TurnOutcome::Discarded;
        }

        let count = found.len();
        info!("Search matched {} properties", count);

        if count == 0 {
            store.clear_results();
        } else {
            store.set_results(found);
        }

        let summary = self
            .reply(&replies::found_prompt(count), Some(ResponseContext::found(count)))
            .await;
        if session.is_closed() {
            return TurnOutcome::Discarded;
        }
        store.append_message(Role::Assistant, summary);

        if count == 0 {
            return TurnOutcome::NoResults;
        }

        if let Err(e) = self
            .preferences
            .record_search(&session.context().user_id, filters)
            .await
        {
            warn!("Could not record search history: {}", e);
        }
        TurnOutcome::Found(count)
    }

    fn fallback(&self, session: &Session) -> TurnOutcome {
        if session.is_closed() {
            return TurnOutcome::Discarded;
        }
        session
            .store()
            .append_message(Role::Assistant, replies::EXTRACTION_FALLBACK);
        TurnOutcome::Fallback
    }

    async fn reply(&self, prompt: &str, context: Option<ResponseContext>) -> String {
        match self.generator.generate(prompt, context).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(
                    "Response generation via {} failed: {}",
                    self.generator.provider_name(),
                    e
                );
                replies::GENERATION_FALLBACK.to_string()
            }
        }
    }

    // Favorites

    /// Reload the saved set. A failed load leaves it empty, never stale.
    pub async fn refresh_saved(&self, session: &Session) {
        let saved = match self.preferences.get_saved(&session.context().user_id).await {
            Ok(saved) => saved,
            Err(e) => {
                warn!("Error loading saved properties: {}", e);
                Vec::new()
            }
        };
        session.store().set_saved(saved);
    }

    pub async fn save_property(&self, session: &Session, property_id: u64) -> bool {
        let property = match self.find_property(session, property_id).await {
            Ok(property) => property,
            Err(e) => {
                warn!("Cannot save property {}: {}", property_id, e);
                return false;
            }
        };
        match self
            .preferences
            .save(&session.context().user_id, &property)
            .await
        {
            Ok(()) => {
                self.refresh_saved(session).await;
                session
                    .store()
                    .append_message(Role::Assistant, replies::FAVORITE_SAVED);
                true
            }
            Err(e) => {
                warn!("Error saving property {}: {}", property_id, e);
                false
            }
        }
    }

    pub async fn remove_saved_property(&self, session: &Session, property_id: u64) -> bool {
        let property = match self.find_property(session, property_id).await {
            Ok(property) => property,
            Err(e) => {
                warn!("Cannot remove property {}: {}", property_id, e);
                return false;
            }
        };
        match self
            .preferences
            .remove(&session.context().user_id, &property)
            .await
        {
            Ok(()) => {
                self.refresh_saved(session).await;
                session
                    .store()
                    .append_message(Role::Assistant, replies::FAVORITE_REMOVED);
                true
            }
            Err(e) => {
                warn!("Error removing property {}: {}", property_id, e);
                false
            }
        }
    }

    /// Look a property up by id: displayed results and saved properties
    /// first, then the catalog.
    pub async fn find_property(
        &self,
        session: &Session,
        property_id: u64,
    ) -> Result<Property, CatalogError> {
        let store = session.store();
        let known = store
            .results()
            .into_iter()
            .chain(store.saved())
            .find(|p| p.id == property_id);
        match known {
            Some(property) => Ok(property),
            None => self.catalog.get(property_id).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use crate::conversation::{ConversationLog, Message};
    use crate::error::NlpError;
    use crate::filters::PartialFilterUpdate;
    use crate::intent::Extraction;
    use crate::session::SessionContext;
    use crate::store::SessionStore;
    use crate::testing::{property, FakeCatalog, FakeExtractor, FakeGenerator, FakePreferences};
    use pretty_assertions::assert_eq;

    struct Harness {
        catalog: Arc<FakeCatalog>,
        extractor: Arc<FakeExtractor>,
        generator: Arc<FakeGenerator>,
        preferences: Arc<FakePreferences>,
        orchestrator: SearchOrchestrator,
    }

    impl Harness {
        fn new(catalog: FakeCatalog, extractor: FakeExtractor) -> Self {
            Self::with(
                catalog,
                extractor,
                FakeGenerator::default(),
                FakePreferences::default(),
            )
        }

        fn with(
            catalog: FakeCatalog,
            extractor: FakeExtractor,
            generator: FakeGenerator,
            preferences: FakePreferences,
        ) -> Self {
            let catalog = Arc::new(catalog);
            let extractor = Arc::new(extractor);
            let generator = Arc::new(generator);
            let preferences = Arc::new(preferences);
            let orchestrator = SearchOrchestrator::new(
                catalog.clone(),
                extractor.clone(),
                generator.clone(),
                preferences.clone(),
            );
            Self {
                catalog,
                extractor,
                generator,
                preferences,
                orchestrator,
            }
        }
    }

    fn empty_session() -> Session {
        Session::with_store(
            SessionContext::for_user("user_1"),
            SessionStore::with_conversation(ConversationLog::empty()),
        )
    }

    fn search_extraction(update: PartialFilterUpdate) -> Extraction {
        Extraction {
            intent: Some("search".to_string()),
            filters: update,
        }
    }

    fn texts(session: &Session) -> Vec<String> {
        session
            .store()
            .conversation()
            .messages()
            .iter()
            .map(|m| m.text.clone())
            .collect()
    }

    #[tokio::test]
    async fn test_utterance_commits_merge_and_searches_once() {
        let h = Harness::new(
            FakeCatalog::returning(vec![property(1), property(2)]),
            FakeExtractor::returning(search_extraction(PartialFilterUpdate {
                bedrooms: Some(3),
                budget: Some(500_000.0),
                ..Default::default()
            })),
        );
        let session = empty_session();
        let utterance = "I need a 3 bedroom house under $500000";

        let outcome = h.orchestrator.handle_utterance(&session, utterance).await;
        assert_eq!(outcome, Ok(TurnOutcome::Found(2)));

        let expected = FilterSet {
            bedrooms: Some(3),
            budget: Some(500_000.0),
            ..FilterSet::default()
        };
        assert_eq!(session.store().filters(), expected);
        assert_eq!(h.catalog.calls(), vec![expected.clone()]);

        // extraction saw the log as it was before the utterance
        let calls = h.extractor.calls.lock().unwrap().clone();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, utterance);
        assert!(calls[0].1.is_empty());

        assert_eq!(
            h.generator.calls(),
            vec![("Found 2 properties".to_string(), Some(ResponseContext::found(2)))]
        );
        assert_eq!(session.store().results().len(), 2);
        assert_eq!(h.preferences.recorded(), vec![expected]);
        assert_eq!(
            texts(&session),
            vec![
                utterance.to_string(),
                replies::SEARCH_REQUEST.to_string(),
                replies::SEARCHING.to_string(),
                FakeGenerator::reply_for("Found 2 properties"),
            ]
        );
    }

    #[tokio::test]
    async fn test_zero_results_clear_display_and_skip_history() {
        let h = Harness::new(
            FakeCatalog::returning(vec![]),
            FakeExtractor::returning(search_extraction(PartialFilterUpdate {
                location: Some("Atlantis".to_string()),
                ..Default::default()
            })),
        );
        let session = empty_session();
        session.store().set_results(vec![property(9)]);

        let outcome = h
            .orchestrator
            .handle_utterance(&session, "something in Atlantis")
            .await;
        assert_eq!(outcome, Ok(TurnOutcome::NoResults));
        assert_eq!(
            h.generator.calls(),
            vec![("No properties found".to_string(), Some(ResponseContext::found(0)))]
        );
        assert!(session.store().results().is_empty());
        assert!(h.preferences.recorded().is_empty());
    }

    #[tokio::test]
    async fn test_extraction_failure_falls_back_without_touching_filters() {
        let h = Harness::new(FakeCatalog::returning(vec![]), FakeExtractor::failing());
        let session = empty_session();
        session.store().commit_filters(FilterSet {
            bedrooms: Some(2),
            ..FilterSet::default()
        });

        let outcome = h.orchestrator.handle_utterance(&session, "hello?").await;
        assert_eq!(outcome, Ok(TurnOutcome::Fallback));
        assert_eq!(session.store().filters().bedrooms, Some(2));
        assert!(h.catalog.calls().is_empty());
        assert!(h.generator.calls().is_empty());
        assert_eq!(
            texts(&session),
            vec!["hello?".to_string(), replies::EXTRACTION_FALLBACK.to_string()]
        );
    }

    #[tokio::test]
    async fn test_unusable_extraction_falls_back() {
        let h = Harness::new(
            FakeCatalog::returning(vec![]),
            FakeExtractor::returning(Extraction::default()),
        );
        let session = empty_session();
        let outcome = h.orchestrator.handle_utterance(&session, "...").await;
        assert_eq!(outcome, Ok(TurnOutcome::Fallback));
        assert!(h.generator.calls().is_empty());
    }

    #[tokio::test]
    async fn test_general_intent_bypasses_search() {
        let h = Harness::new(
            FakeCatalog::returning(vec![property(1)]),
            FakeExtractor::returning(Extraction {
                intent: Some("general".to_string()),
                filters: PartialFilterUpdate::default(),
            }),
        );
        let session = empty_session();

        let outcome = h
            .orchestrator
            .handle_utterance(&session, "what can you do?")
            .await;
        assert_eq!(outcome, Ok(TurnOutcome::Replied { intent: "general" }));
        assert!(h.catalog.calls().is_empty());
        assert_eq!(
            h.generator.calls(),
            vec![("what can you do?".to_string(), None)]
        );
        assert_eq!(session.store().filters(), FilterSet::default());
        assert_eq!(
            texts(&session).last().cloned(),
            Some(FakeGenerator::reply_for("what can you do?"))
        );
    }

    #[tokio::test]
    async fn test_generation_failure_degrades_to_canned_reply() {
        let h = Harness::with(
            FakeCatalog::returning(vec![]),
            FakeExtractor::returning(Extraction {
                intent: Some("help".to_string()),
                filters: PartialFilterUpdate::default(),
            }),
            FakeGenerator::failing(),
            FakePreferences::default(),
        );
        let session = empty_session();

        let outcome = h.orchestrator.handle_utterance(&session, "help").await;
        assert_eq!(outcome, Ok(TurnOutcome::Replied { intent: "help" }));
        assert_eq!(
            texts(&session).last().map(String::as_str),
            Some(replies::GENERATION_FALLBACK)
        );
    }

    #[tokio::test]
    async fn test_query_failure_keeps_committed_filters() {
        let h = Harness::new(
            FakeCatalog::failing(),
            FakeExtractor::returning(search_extraction(PartialFilterUpdate {
                location: Some("Reno".to_string()),
                ..Default::default()
            })),
        );
        let session = empty_session();

        let outcome = h.orchestrator.handle_utterance(&session, "Reno please").await;
        assert_eq!(outcome, Ok(TurnOutcome::SearchFailed));
        assert_eq!(session.store().filters().location.as_deref(), Some("Reno"));
        assert!(h.generator.calls().is_empty());
        assert_eq!(
            texts(&session),
            vec![
                "Reno please".to_string(),
                replies::SEARCH_REQUEST.to_string(),
                replies::SEARCHING.to_string(),
                replies::SEARCH_FAILED.to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_partial_update_keeps_unrelated_fields() {
        let h = Harness::new(
            FakeCatalog::returning(vec![property(1)]),
            FakeExtractor::returning(search_extraction(PartialFilterUpdate {
                bedrooms: Some(4),
                ..Default::default()
            })),
        );
        let session = empty_session();
        session.store().commit_filters(FilterSet {
            location: Some("Austin".to_string()),
            amenities: Some(vec!["pool".to_string()]),
            ..FilterSet::default()
        });

        h.orchestrator
            .handle_utterance(&session, "make it 4 bedrooms")
            .await
            .unwrap();
        assert_eq!(
            session.store().filters(),
            FilterSet {
                location: Some("Austin".to_string()),
                amenities: Some(vec!["pool".to_string()]),
                bedrooms: Some(4),
                ..FilterSet::default()
            }
        );
    }

    #[tokio::test]
    async fn test_history_failure_is_not_surfaced() {
        let h = Harness::with(
            FakeCatalog::returning(vec![property(1)]),
            FakeExtractor::returning(search_extraction(PartialFilterUpdate {
                budget: Some(300_000.0),
                ..Default::default()
            })),
            FakeGenerator::default(),
            FakePreferences::failing(),
        );
        let session = empty_session();

        let outcome = h.orchestrator.handle_utterance(&session, "under 300k").await;
        assert_eq!(outcome, Ok(TurnOutcome::Found(1)));
        assert!(!texts(&session).contains(&replies::SEARCH_FAILED.to_string()));
    }

    #[tokio::test]
    async fn test_utterance_with_weak_criteria_is_guarded() {
        let h = Harness::new(
            FakeCatalog::returning(vec![property(1)]),
            FakeExtractor::returning(search_extraction(PartialFilterUpdate {
                bathrooms: Some(2),
                ..Default::default()
            })),
        );
        let session = empty_session();

        let outcome = h.orchestrator.handle_utterance(&session, "2 baths").await;
        assert_eq!(outcome, Ok(TurnOutcome::MissingCriteria));
        assert_eq!(session.store().filters().bathrooms, Some(2));
        assert!(h.catalog.calls().is_empty());
    }

    #[tokio::test]
    async fn test_direct_search_guard_makes_no_calls() {
        let h = Harness::new(
            FakeCatalog::returning(vec![property(1)]),
            FakeExtractor::failing(),
        );
        let session = empty_session();

        let outcome = h
            .orchestrator
            .search(
                &session,
                Some(FilterSet {
                    bathrooms: Some(2),
                    ..FilterSet::default()
                }),
            )
            .await;
        assert_eq!(outcome, Ok(TurnOutcome::MissingCriteria));
        assert!(h.catalog.calls().is_empty());
        assert_eq!(h.extractor.call_count(), 0);
        assert!(h.generator.calls().is_empty());
        assert_eq!(texts(&session), vec![replies::MISSING_CRITERIA.to_string()]);
    }

    #[tokio::test]
    async fn test_direct_search_with_bedrooms_proceeds() {
        let h = Harness::new(
            FakeCatalog::returning(vec![property(1)]),
            FakeExtractor::failing(),
        );
        let session = empty_session();
        let filters = FilterSet {
            bedrooms: Some(3),
            ..FilterSet::default()
        };

        let outcome = h.orchestrator.search(&session, Some(filters.clone())).await;
        assert_eq!(outcome, Ok(TurnOutcome::Found(1)));
        assert_eq!(h.catalog.calls(), vec![filters]);
        assert_eq!(session.store().filters().bedrooms, Some(3));
        assert_eq!(
            texts(&session)[..2].to_vec(),
            vec![
                replies::SEARCH_REQUEST.to_string(),
                replies::SEARCHING.to_string()
            ]
        );
    }

    #[tokio::test]
    async fn test_direct_search_uses_current_filters() {
        let h = Harness::new(
            FakeCatalog::returning(vec![]),
            FakeExtractor::failing(),
        );
        let session = empty_session();
        session.store().commit_filters(FilterSet {
            location: Some("Boise".to_string()),
            ..FilterSet::default()
        });

        let outcome = h.orchestrator.search(&session, None).await;
        assert_eq!(outcome, Ok(TurnOutcome::NoResults));
        assert_eq!(h.catalog.calls()[0].location.as_deref(), Some("Boise"));
    }

    #[tokio::test]
    async fn test_concurrent_turn_is_rejected() {
        let h = Harness::new(FakeCatalog::returning(vec![]), FakeExtractor::failing());
        let session = empty_session();
        let _running = session.begin_turn().unwrap();

        assert_eq!(
            h.orchestrator.handle_utterance(&session, "hi").await,
            Err(OrchestratorError::Busy)
        );
        assert_eq!(
            h.orchestrator.search(&session, None).await,
            Err(OrchestratorError::Busy)
        );
        assert_eq!(h.extractor.call_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_utterance_and_closed_session() {
        let h = Harness::new(FakeCatalog::returning(vec![]), FakeExtractor::failing());
        let session = empty_session();
        assert_eq!(
            h.orchestrator.handle_utterance(&session, "   ").await,
            Err(OrchestratorError::EmptyUtterance)
        );

        session.close();
        assert_eq!(
            h.orchestrator.handle_utterance(&session, "hi").await,
            Err(OrchestratorError::SessionClosed)
        );
        assert!(texts(&session).is_empty());
    }

    #[tokio::test]
    async fn test_extraction_context_is_windowed() {
        let h = Harness::new(FakeCatalog::returning(vec![]), FakeExtractor::failing());
        let orchestrator = h.orchestrator.with_context_window(2);
        let session = Session::new(SessionContext::for_user("user_1"));
        session.store().append_message(Role::User, "one");
        session.store().append_message(Role::Assistant, "two");
        session.store().append_message(Role::User, "three");

        orchestrator.handle_utterance(&session, "four").await.unwrap();

        let calls = h.extractor.calls.lock().unwrap().clone();
        let seen: Vec<&str> = calls[0].1.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(seen, vec!["two", "three"]);
        // the log itself keeps everything
        assert_eq!(session.store().conversation().len(), 6);
    }

    #[tokio::test]
    async fn test_live_search_does_not_commit_or_talk() {
        let h = Harness::new(
            FakeCatalog::returning(vec![property(1), property(2)]),
            FakeExtractor::returning(search_extraction(PartialFilterUpdate {
                bedrooms: Some(2),
                ..Default::default()
            })),
        );
        let session = empty_session();
        session.store().commit_filters(FilterSet {
            location: Some("Austin".to_string()),
            ..FilterSet::default()
        });

        let shown = h.orchestrator.live_search(&session, "two bedrooms").await;
        assert_eq!(shown, Some(2));
        assert_eq!(
            h.catalog.calls(),
            vec![FilterSet {
                location: Some("Austin".to_string()),
                bedrooms: Some(2),
                ..FilterSet::default()
            }]
        );
        assert_eq!(session.store().filters().bedrooms, None);
        assert!(texts(&session).is_empty());
        assert_eq!(session.store().results().len(), 2);
    }

    #[tokio::test]
    async fn test_save_and_remove_favorites() {
        let h = Harness::new(FakeCatalog::returning(vec![]), FakeExtractor::failing());
        let session = empty_session();

        assert!(h.orchestrator.save_property(&session, 7).await);
        assert!(session.store().is_saved(7));
        assert!(h.orchestrator.remove_saved_property(&session, 7).await);
        assert!(!session.store().is_saved(7));
        assert_eq!(
            texts(&session),
            vec![
                replies::FAVORITE_SAVED.to_string(),
                replies::FAVORITE_REMOVED.to_string()
            ]
        );
    }

    #[tokio::test]
    async fn test_favorites_hand_the_store_the_full_listing() {
        let h = Harness::new(FakeCatalog::returning(vec![]), FakeExtractor::failing());
        let session = empty_session();
        let mut shown = property(8);
        shown.record_id = Some("65a1f0c2e4".to_string());
        session.store().set_results(vec![shown]);

        assert!(h.orchestrator.save_property(&session, 8).await);
        let saved = h.preferences.saved();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].record_id.as_deref(), Some("65a1f0c2e4"));

        // removal resolves the listing from the saved set
        session.store().clear_results();
        assert!(h.orchestrator.remove_saved_property(&session, 8).await);
        assert!(h.preferences.saved().is_empty());
    }

    #[tokio::test]
    async fn test_failed_saved_reload_empties_the_set() {
        let h = Harness::with(
            FakeCatalog::returning(vec![]),
            FakeExtractor::failing(),
            FakeGenerator::default(),
            FakePreferences::failing(),
        );
        let session = empty_session();
        session.store().set_saved(vec![property(3)]);

        h.orchestrator.refresh_saved(&session).await;
        assert!(session.store().saved().is_empty());

        assert!(!h.orchestrator.save_property(&session, 3).await);
        assert!(texts(&session).is_empty());
    }

    #[tokio::test]
    async fn test_find_property_prefers_displayed_results() {
        let h = Harness::new(FakeCatalog::returning(vec![]), FakeExtractor::failing());
        let session = empty_session();
        let mut shown = property(4);
        shown.location = "Displayed".to_string();
        session.store().set_results(vec![shown]);

        let found = h.orchestrator.find_property(&session, 4).await.unwrap();
        assert_eq!(found.location, "Displayed");
        let fetched = h.orchestrator.find_property(&session, 5).await.unwrap();
        assert_eq!(fetched.id, 5);
    }

    /// Closes the session from inside whichever call it serves
    struct ClosesSession(Arc<Session>);

    #[async_trait]
    impl Catalog for ClosesSession {
        async fn search(&self, _filters: &FilterSet) -> Result<Vec<Property>, CatalogError> {
            self.0.close();
            Ok(vec![property(1)])
        }

        async fn get(&self, id: u64) -> Result<Property, CatalogError> {
            Ok(property(id))
        }

        fn source_name(&self) -> &'static str {
            "closing"
        }
    }

    #[async_trait]
    impl FilterExtractor for ClosesSession {
        async fn extract(&self, _text: &str, _history: &[Message]) -> Result<Extraction, NlpError> {
            self.0.close();
            Ok(search_extraction(PartialFilterUpdate {
                bedrooms: Some(3),
                ..Default::default()
            }))
        }
    }

    #[async_trait]
    impl ResponseGenerator for ClosesSession {
        async fn generate(
            &self,
            _text: &str,
            _context: Option<ResponseContext>,
        ) -> Result<String, NlpError> {
            self.0.close();
            Ok("too late".to_string())
        }

        fn provider_name(&self) -> &'static str {
            "closing"
        }
    }

    fn shared_session() -> Arc<Session> {
        Arc::new(empty_session())
    }

    fn bedroom_search() -> FakeExtractor {
        FakeExtractor::returning(search_extraction(PartialFilterUpdate {
            bedrooms: Some(3),
            ..Default::default()
        }))
    }

    #[tokio::test]
    async fn test_close_during_query_discards_turn() {
        let session = shared_session();
        let generator = Arc::new(FakeGenerator::default());
        let preferences = Arc::new(FakePreferences::default());
        let orchestrator = SearchOrchestrator::new(
            Arc::new(ClosesSession(session.clone())),
            Arc::new(bedroom_search()),
            generator.clone(),
            preferences.clone(),
        );

        let outcome = orchestrator.handle_utterance(&session, "3 bedrooms").await;
        assert_eq!(outcome, Ok(TurnOutcome::Discarded));
        assert_eq!(
            texts(&session),
            vec![
                "3 bedrooms".to_string(),
                replies::SEARCH_REQUEST.to_string(),
                replies::SEARCHING.to_string(),
            ]
        );
        assert!(session.store().results().is_empty());
        assert!(generator.calls().is_empty());
        assert!(preferences.recorded().is_empty());
    }

    #[tokio::test]
    async fn test_close_during_summary_discards_turn() {
        let session = shared_session();
        let preferences = Arc::new(FakePreferences::default());
        let orchestrator = SearchOrchestrator::new(
            Arc::new(FakeCatalog::returning(vec![property(1)])),
            Arc::new(bedroom_search()),
            Arc::new(ClosesSession(session.clone())),
            preferences.clone(),
        );

        let outcome = orchestrator.handle_utterance(&session, "3 bedrooms").await;
        assert_eq!(outcome, Ok(TurnOutcome::Discarded));
        assert_eq!(texts(&session).last().map(String::as_str), Some(replies::SEARCHING));
        assert!(preferences.recorded().is_empty());
    }

    #[tokio::test]
    async fn test_close_during_extraction_discards_turn() {
        let session = shared_session();
        let catalog = Arc::new(FakeCatalog::returning(vec![property(1)]));
        let orchestrator = SearchOrchestrator::new(
            catalog.clone(),
            Arc::new(ClosesSession(session.clone())),
            Arc::new(FakeGenerator::default()),
            Arc::new(FakePreferences::default()),
        );

        let outcome = orchestrator.handle_utterance(&session, "3 bedrooms").await;
        assert_eq!(outcome, Ok(TurnOutcome::Discarded));
        assert_eq!(texts(&session), vec!["3 bedrooms".to_string()]);
        assert_eq!(session.store().filters(), FilterSet::default());
        assert!(catalog.calls().is_empty());
    }

    #[tokio::test]
    async fn test_close_during_reply_discards_turn() {
        let session = shared_session();
        let orchestrator = SearchOrchestrator::new(
            Arc::new(FakeCatalog::returning(vec![])),
            Arc::new(FakeExtractor::returning(Extraction {
                intent: Some("help".to_string()),
                filters: PartialFilterUpdate::default(),
            })),
            Arc::new(ClosesSession(session.clone())),
            Arc::new(FakePreferences::default()),
        );

        let outcome = orchestrator.handle_utterance(&session, "help me").await;
        assert_eq!(outcome, Ok(TurnOutcome::Discarded));
        assert_eq!(texts(&session), vec!["help me".to_string()]);
    }
}
