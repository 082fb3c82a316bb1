//! Debounced search-history recording.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, warn};

use whisper_types::api::RecordSearchRequest;
use whisper_types::models::CategoryFilter;

use crate::cache::{QueryCache, QueryScope};
use crate::session::Session;
use crate::store::WallStore;

enum Input {
    Term(String),
    Category(CategoryFilter),
}

/// Records the search box into the user's history once typing pauses.
///
/// One timer, reset by every term or category change. When it fires, the
/// current term is saved if it is non-empty and the user typed something
/// since the last save. Dropping the recorder cancels any pending save.
pub struct SearchRecorder {
    tx: mpsc::UnboundedSender<Input>,
    task: JoinHandle<()>,
}

impl SearchRecorder {
    pub fn spawn<S: WallStore + 'static>(
        store: Arc<S>,
        session: Session,
        cache: QueryCache,
        debounce: Duration,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(store, session, cache, debounce, rx));
        Self { tx, task }
    }

    pub fn set_term(&self, term: impl Into<String>) {
        let _ = self.tx.send(Input::Term(term.into()));
    }

    pub fn set_category(&self, filter: CategoryFilter) {
        let _ = self.tx.send(Input::Category(filter));
    }
}

impl Drop for SearchRecorder {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run<S: WallStore>(
    store: Arc<S>,
    session: Session,
    cache: QueryCache,
    debounce: Duration,
    mut rx: mpsc::UnboundedReceiver<Input>,
) {
    let mut term = String::new();
    let mut category = CategoryFilter::All;
    let mut has_searched = false;
    let mut deadline: Option<Instant> = None;

    loop {
        let wait = deadline;
        let timer = async move {
            match wait {
                Some(at) => sleep_until(at).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            input = rx.recv() => {
                match input {
                    Some(Input::Term(next)) => {
                        if !next.trim().is_empty() {
                            has_searched = true;
                        }
                        term = next;
                    }
                    Some(Input::Category(next)) => category = next,
                    None => break,
                }
                deadline = Some(Instant::now() + debounce);
            }
            _ = timer => {
                deadline = None;
                let trimmed = term.trim();
                if !has_searched || trimmed.is_empty() {
                    continue;
                }

                let req = RecordSearchRequest {
                    search_term: trimmed.to_string(),
                    category: category.category(),
                };
                match store.record_search(&session, &req).await {
                    Ok(item) => {
                        debug!("Recorded search '{}'", item.search_term);
                        has_searched = false;
                        cache.invalidate(QueryScope::SearchHistory);
                    }
                    Err(e) => warn!("Failed to record search '{}': {}", req.search_term, e),
                }
            }
        }
    }
}
