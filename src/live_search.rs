//! Debounced search-as-you-type.
//!
//! Every value of the live query box is pushed into a background task.
//! The task waits for the typing to settle for the debounce delay and then
//! spawns one live-search pass with the latest value. The loop keeps
//! reading values while a pass runs: an empty value or a newer query
//! aborts the pass in flight. Dropping the handle aborts the loop and,
//! with it, any pending or running pass.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tracing::debug;

use crate::orchestrator::SearchOrchestrator;
use crate::session::Session;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// Queries this short never fire
const MIN_QUERY_CHARS: usize = 2;

pub struct LiveSearch {
    tx: mpsc::UnboundedSender<String>,
    task: JoinHandle<()>,
}

impl LiveSearch {
    pub fn spawn(
        orchestrator: Arc<SearchOrchestrator>,
        session: Arc<Session>,
        delay: Duration,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(orchestrator, session, delay, rx));
        Self { tx, task }
    }

    /// Report the current value of the query box
    pub fn update(&self, query: impl Into<String>) {
        // A closed channel means the session ended; nothing left to update.
        let _ = self.tx.send(query.into());
    }
}

impl Drop for LiveSearch {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// A running pass, aborted when replaced or dropped
struct InFlight(JoinHandle<()>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.abort();
    }
}

async fn run(
    orchestrator: Arc<SearchOrchestrator>,
    session: Arc<Session>,
    delay: Duration,
    mut rx: mpsc::UnboundedReceiver<String>,
) {
    let timer = sleep(delay);
    tokio::pin!(timer);
    let mut pending: Option<String> = None;
    let mut in_flight: Option<InFlight> = None;

    loop {
        tokio::select! {
            value = rx.recv() => {
                let Some(value) = value else { break };
                let query = value.trim();
                if query.is_empty() {
                    pending = None;
                    in_flight = None;
                    session.store().clear_results();
                } else if query.chars().count() > MIN_QUERY_CHARS {
                    pending = Some(query.to_string());
                    in_flight = None;
                    timer.as_mut().reset(Instant::now() + delay);
                } else {
                    pending = None;
                    in_flight = None;
                }
            }
            () = &mut timer, if pending.is_some() => {
                let Some(query) = pending.take() else { continue };
                if session.is_closed() {
                    break;
                }
                debug!("Live search firing for {:?}", query);
                let orchestrator = orchestrator.clone();
                let session = session.clone();
                in_flight = Some(InFlight(tokio::spawn(async move {
                    orchestrator.live_search(&session, &query).await;
                })));
            }
        }
    }
    debug!("Live search stopped");
}
