//! Keeps the local view of the ledger consistent with the server.
//!
//! Reads replace the cached entries and summary wholesale; there is no
//! incremental merge, so out-of-order responses can never leave a
//! partially updated view. Writes go through the API and, on success,
//! trigger a full refresh instead of patching the cache locally: the
//! summary is server-computed and cannot be recomputed here without
//! drifting. Each refresh carries a generation tag so a late response
//! from a superseded refresh is discarded rather than overwriting newer
//! data.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;

use api_types::summary::Summary;
use api_types::transaction::{ListFilters, Transaction, TransactionDraft, TransactionPatch};

use crate::error::LedgerError;
use crate::ledger::LedgerApi;
use crate::session::SessionState;

/// Read-only snapshot handed to the presentation layer.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LedgerView {
    pub entries: Vec<Transaction>,
    /// Server-computed; `None` until the first successful refresh.
    pub summary: Option<Summary>,
    pub filters: ListFilters,
    pub loading: bool,
    pub last_error: Option<LedgerError>,
}

#[derive(Debug, Default)]
struct Cache {
    view: LedgerView,
    /// Generation of the most recently initiated refresh whose response
    /// has been applied. Responses tagged lower are stale.
    applied: u64,
}

pub struct SyncController<A> {
    api: Arc<A>,
    session: watch::Receiver<SessionState>,
    cache: Mutex<Cache>,
    issued: AtomicU64,
}

impl<A: LedgerApi> SyncController<A> {
    pub fn new(api: Arc<A>, session: watch::Receiver<SessionState>) -> Self {
        Self {
            api,
            session,
            cache: Mutex::new(Cache::default()),
            issued: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> LedgerView {
        self.lock().view.clone()
    }

    fn session_active(&self) -> bool {
        self.session.borrow().is_authenticated()
    }

    fn lock(&self) -> MutexGuard<'_, Cache> {
        // The lock is only ever held for quick field swaps, never across
        // an await; a poisoned lock still holds consistent data.
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Re-fetches entries and summary for the current filters.
    ///
    /// On failure the previous entries stay in place next to
    /// `last_error`: stale-but-present data beats a blanked view.
    pub async fn refresh(&self) -> Result<(), LedgerError> {
        if !self.session_active() {
            return Err(LedgerError::Unauthenticated);
        }

        let generation = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        let filters = {
            let mut cache = self.lock();
            cache.view.loading = true;
            cache.view.filters.clone()
        };

        let result = self.api.list(&filters).await;

        let mut cache = self.lock();
        if generation <= cache.applied {
            // A later-initiated refresh already answered; this response
            // is stale regardless of its outcome.
            tracing::debug!("discarding stale refresh (generation {generation})");
            return Ok(());
        }
        cache.applied = generation;
        cache.view.loading = false;
        match result {
            Ok(resp) => {
                cache.view.entries = resp.entries;
                cache.view.summary = Some(resp.summary);
                cache.view.last_error = None;
                Ok(())
            }
            Err(err) => {
                cache.view.last_error = Some(err.clone());
                Err(err)
            }
        }
    }

    /// Replaces the filter criteria and re-fetches under them.
    pub async fn set_filters(&self, filters: ListFilters) -> Result<(), LedgerError> {
        {
            self.lock().view.filters = filters;
        }
        self.refresh().await
    }

    pub async fn create(&self, draft: TransactionDraft) -> Result<Transaction, LedgerError> {
        let entry = self.api.create(&draft).await?;
        self.reconcile("create").await;
        Ok(entry)
    }

    pub async fn update(
        &self,
        id: &str,
        patch: TransactionPatch,
    ) -> Result<Transaction, LedgerError> {
        let entry = self.api.update(id, &patch).await?;
        self.reconcile("update").await;
        Ok(entry)
    }

    pub async fn delete(&self, id: &str) -> Result<(), LedgerError> {
        self.api.delete(id).await?;
        self.reconcile("delete").await;
        Ok(())
    }

    /// Refresh after a confirmed write. The write itself succeeded, so a
    /// refresh failure is recorded in the view rather than returned.
    async fn reconcile(&self, operation: &str) {
        if let Err(err) = self.refresh().await {
            tracing::warn!("refresh after {operation} failed: {err}");
        }
    }
}
