//! Explicit session identity and per-session state.

use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::comparison::{CapacityExceeded, EntryId, Toggled};
use crate::conversation::Role;
use crate::error::OrchestratorError;
use crate::models::Property;
use crate::replies;
use crate::store::SessionStore;

/// Who the session belongs to. Passed to every orchestration call instead
/// of living in process-wide state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    pub session_id: Uuid,
    pub user_id: String,
}

impl SessionContext {
    /// A fresh anonymous identity (`user_<unix millis>`)
    pub fn anonymous() -> Self {
        Self::for_user(format!("user_{}", Utc::now().timestamp_millis()))
    }

    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            user_id: user_id.into(),
        }
    }
}

/// One conversation: identity, observable state and the single-turn guard
pub struct Session {
    context: SessionContext,
    store: SessionStore,
    turn: Mutex<()>,
    closed: AtomicBool,
}

impl Session {
    pub fn new(context: SessionContext) -> Self {
        Self::with_store(context, SessionStore::new())
    }

    pub fn with_store(context: SessionContext, store: SessionStore) -> Self {
        Self {
            context,
            store,
            turn: Mutex::new(()),
            closed: AtomicBool::new(false),
        }
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Claim the session for one orchestrated turn. Fails instead of
    /// queueing when a turn is already running.
    pub(crate) fn begin_turn(&self) -> Result<MutexGuard<'_, ()>, OrchestratorError> {
        if self.is_closed() {
            return Err(OrchestratorError::SessionClosed);
        }
        self.turn.try_lock().map_err(|_| OrchestratorError::Busy)
    }

    /// Mark the session gone. Work still in flight discards its results.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    // Comparison actions, each acknowledged in the conversation

    pub fn toggle_comparison(&self, property: Property) -> Result<Toggled, CapacityExceeded> {
        let outcome = self.store.toggle_comparison(property.into());
        let reply = match outcome {
            Ok(Toggled::Added) => replies::COMPARISON_ADDED,
            Ok(Toggled::Removed) => replies::COMPARISON_REMOVED,
            Err(CapacityExceeded) => replies::COMPARISON_FULL,
        };
        self.store.append_message(Role::Assistant, reply);
        outcome
    }

    /// Drop one entry from the comparison table. Silent.
    pub fn remove_from_comparison(&self, id: &EntryId) -> bool {
        self.store.remove_from_comparison(id)
    }

    pub fn clear_comparison(&self) {
        self.store.clear_comparison();
        self.store
            .append_message(Role::Assistant, replies::COMPARISON_CLEARED);
    }
}
