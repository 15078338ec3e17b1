//! Sync controller semantics against a scripted ledger API.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::{oneshot, watch};

use api_types::summary::Summary;
use api_types::transaction::{
    ListFilters, ListResponse, Transaction, TransactionDraft, TransactionKind, TransactionPatch,
};
use spese_client::error::LedgerError;
use spese_client::ledger::LedgerApi;
use spese_client::session::{Session, SessionState};
use spese_client::sync::SyncController;

fn entry(id: &str, amount: f64) -> Transaction {
    Transaction {
        id: id.to_string(),
        owner_id: "sub-alice".to_string(),
        amount,
        kind: TransactionKind::Expense,
        category: "Food".to_string(),
        description: "Lunch".to_string(),
        created_at: "2025-01-05T12:00:00Z".to_string(),
        updated_at: "2025-01-05T12:00:00Z".to_string(),
        tags: None,
    }
}

fn response(ids: &[&str]) -> ListResponse {
    let entries: Vec<_> = ids.iter().map(|id| entry(id, 50.0)).collect();
    let total: f64 = entries.iter().map(|e| e.amount).sum();
    ListResponse {
        summary: Summary {
            total_count: entries.len() as u64,
            total_amount: total,
            total_income: 0.0,
            total_expense: total,
            net_amount: -total,
            category_breakdown: BTreeMap::from([("Food".to_string(), total)]),
            average_amount: if entries.is_empty() {
                0.0
            } else {
                total / entries.len() as f64
            },
            pagination: None,
        },
        entries,
    }
}

fn fetch_err(status: u16, message: &str) -> LedgerError {
    LedgerError::Fetch {
        status,
        message: message.to_string(),
    }
}

#[derive(Default)]
struct ScriptedApi {
    lists: Mutex<VecDeque<Result<ListResponse, LedgerError>>>,
    gates: Mutex<VecDeque<oneshot::Receiver<()>>>,
    list_calls: AtomicUsize,
    seen_filters: Mutex<Vec<ListFilters>>,
    create_result: Mutex<Option<Result<Transaction, LedgerError>>>,
    update_result: Mutex<Option<Result<Transaction, LedgerError>>>,
    delete_result: Mutex<Option<Result<(), LedgerError>>>,
}

impl ScriptedApi {
    fn script_list(&self, outcome: Result<ListResponse, LedgerError>) {
        self.lists.lock().unwrap().push_back(outcome);
    }
}

impl LedgerApi for ScriptedApi {
    async fn list(&self, filters: &ListFilters) -> Result<ListResponse, LedgerError> {
        self.seen_filters.lock().unwrap().push(filters.clone());
        let gate = self.gates.lock().unwrap().pop_front();
        let outcome = self
            .lists
            .lock()
            .unwrap()
            .pop_front()
            .expect("unscripted list call");
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        outcome
    }

    async fn create(&self, _draft: &TransactionDraft) -> Result<Transaction, LedgerError> {
        self.create_result
            .lock()
            .unwrap()
            .take()
            .expect("unscripted create call")
    }

    async fn update(&self, _id: &str, _: &TransactionPatch) -> Result<Transaction, LedgerError> {
        self.update_result
            .lock()
            .unwrap()
            .take()
            .expect("unscripted update call")
    }

    async fn delete(&self, _id: &str) -> Result<(), LedgerError> {
        self.delete_result
            .lock()
            .unwrap()
            .take()
            .expect("unscripted delete call")
    }
}

fn authed() -> (watch::Sender<SessionState>, watch::Receiver<SessionState>) {
    watch::channel(SessionState::Authenticated(Session {
        identity_handle: "alice".to_string(),
        email: Some("a@x.com".to_string()),
        subject_id: "sub-alice".to_string(),
    }))
}

fn controller(api: Arc<ScriptedApi>) -> (watch::Sender<SessionState>, SyncController<ScriptedApi>) {
    let (tx, rx) = authed();
    (tx, SyncController::new(api, rx))
}

#[tokio::test]
async fn refresh_requires_a_session() {
    let api = Arc::new(ScriptedApi::default());
    let (_tx, rx) = watch::channel(SessionState::Anonymous);
    let controller = SyncController::new(Arc::clone(&api), rx);

    let err = controller.refresh().await.unwrap_err();
    assert_eq!(err, LedgerError::Unauthenticated);
    assert_eq!(api.list_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn refresh_replaces_entries_and_summary_wholesale() {
    let api = Arc::new(ScriptedApi::default());
    api.script_list(Ok(response(&["tx-1", "tx-2"])));
    api.script_list(Ok(response(&["tx-3"])));
    let (_tx, controller) = controller(Arc::clone(&api));

    controller.refresh().await.unwrap();
    let view = controller.snapshot();
    assert_eq!(view.entries.len(), 2);
    assert_eq!(view.summary.as_ref().unwrap().total_count, 2);
    assert!(!view.loading);
    assert_eq!(view.last_error, None);

    controller.refresh().await.unwrap();
    let view = controller.snapshot();
    let ids: Vec<_> = view.entries.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["tx-3"]);
    assert_eq!(view.summary.as_ref().unwrap().total_count, 1);
}

#[tokio::test]
async fn refresh_failure_keeps_stale_entries_and_records_the_error() {
    let api = Arc::new(ScriptedApi::default());
    api.script_list(Ok(response(&["tx-1"])));
    api.script_list(Err(fetch_err(500, "boom")));
    api.script_list(Ok(response(&["tx-1"])));
    let (_tx, controller) = controller(Arc::clone(&api));

    controller.refresh().await.unwrap();
    let err = controller.refresh().await.unwrap_err();
    assert_eq!(err, fetch_err(500, "boom"));

    let view = controller.snapshot();
    assert_eq!(view.entries.len(), 1, "stale entries beat a blank view");
    assert!(view.summary.is_some());
    assert_eq!(view.last_error, Some(fetch_err(500, "boom")));
    assert!(!view.loading);

    // The next successful refresh clears the recorded error.
    controller.refresh().await.unwrap();
    assert_eq!(controller.snapshot().last_error, None);
}

#[tokio::test]
async fn create_reconciles_by_refreshing() {
    let api = Arc::new(ScriptedApi::default());
    *api.create_result.lock().unwrap() = Some(Ok(entry("tx-9", 50.0)));
    api.script_list(Ok(response(&["tx-1", "tx-9"])));
    let (_tx, controller) = controller(Arc::clone(&api));

    let created = controller
        .create(TransactionDraft {
            amount: 50.0,
            category: "Food".to_string(),
            description: "Lunch".to_string(),
            kind: TransactionKind::Expense,
            date: None,
            tags: None,
        })
        .await
        .unwrap();
    assert!(!created.id.is_empty());

    let view = controller.snapshot();
    assert!(view.entries.iter().any(|e| e.id == created.id));
    assert_eq!(api.list_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn failed_create_leaves_the_cache_untouched() {
    let api = Arc::new(ScriptedApi::default());
    api.script_list(Ok(response(&["tx-1"])));
    let (_tx, controller) = controller(Arc::clone(&api));
    controller.refresh().await.unwrap();
    let before = controller.snapshot();

    *api.create_result.lock().unwrap() = Some(Err(fetch_err(400, "Amount must be positive")));
    let err = controller
        .create(TransactionDraft {
            amount: 0.0,
            category: "Food".to_string(),
            description: "".to_string(),
            kind: TransactionKind::Expense,
            date: None,
            tags: None,
        })
        .await
        .unwrap_err();
    assert_eq!(err, fetch_err(400, "Amount must be positive"));

    assert_eq!(controller.snapshot(), before);
    assert_eq!(api.list_calls.load(Ordering::SeqCst), 1, "no refresh ran");
}

#[tokio::test]
async fn failed_delete_leaves_the_cache_untouched() {
    let api = Arc::new(ScriptedApi::default());
    api.script_list(Ok(response(&["tx-1"])));
    let (_tx, controller) = controller(Arc::clone(&api));
    controller.refresh().await.unwrap();
    let before = controller.snapshot();

    *api.delete_result.lock().unwrap() = Some(Err(LedgerError::Network("timed out".to_string())));
    let err = controller.delete("tx-1").await.unwrap_err();
    assert!(matches!(err, LedgerError::Network(_)));
    assert_eq!(controller.snapshot(), before);
}

#[tokio::test]
async fn delete_success_reconciles_by_refreshing() {
    let api = Arc::new(ScriptedApi::default());
    api.script_list(Ok(response(&["tx-1", "tx-2"])));
    api.script_list(Ok(response(&["tx-2"])));
    let (_tx, controller) = controller(Arc::clone(&api));
    controller.refresh().await.unwrap();

    *api.delete_result.lock().unwrap() = Some(Ok(()));
    controller.delete("tx-1").await.unwrap();

    let ids: Vec<_> = controller
        .snapshot()
        .entries
        .iter()
        .map(|e| e.id.clone())
        .collect();
    assert_eq!(ids, vec!["tx-2"]);
}

#[tokio::test]
async fn refresh_failure_after_a_successful_write_is_recorded_not_returned() {
    let api = Arc::new(ScriptedApi::default());
    api.script_list(Ok(response(&["tx-1"])));
    let (_tx, controller) = controller(Arc::clone(&api));
    controller.refresh().await.unwrap();

    *api.update_result.lock().unwrap() = Some(Ok(entry("tx-1", 75.0)));
    api.script_list(Err(fetch_err(502, "bad gateway")));

    let updated = controller
        .update(
            "tx-1",
            TransactionPatch {
                amount: Some(75.0),
                ..TransactionPatch::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.amount, 75.0);

    let view = controller.snapshot();
    assert_eq!(view.last_error, Some(fetch_err(502, "bad gateway")));
    // Entries are stale (pre-write) until a later refresh succeeds.
    assert_eq!(view.entries[0].amount, 50.0);
}

#[tokio::test]
async fn set_filters_refreshes_under_the_new_criteria() {
    let api = Arc::new(ScriptedApi::default());
    api.script_list(Ok(response(&["tx-2"])));
    let (_tx, controller) = controller(Arc::clone(&api));

    let filters = ListFilters {
        category: Some("Food".to_string()),
        start_date: Some("2024-01-01".to_string()),
        ..ListFilters::default()
    };
    controller.set_filters(filters.clone()).await.unwrap();

    assert_eq!(*api.seen_filters.lock().unwrap(), vec![filters.clone()]);
    assert_eq!(controller.snapshot().filters, filters);
}

#[tokio::test]
async fn later_initiated_refresh_wins_even_when_its_response_arrives_first() {
    let api = Arc::new(ScriptedApi::default());
    let (first_gate, first_rx) = oneshot::channel::<()>();
    let (second_gate, second_rx) = oneshot::channel::<()>();
    {
        let mut gates = api.gates.lock().unwrap();
        gates.push_back(first_rx);
        gates.push_back(second_rx);
    }
    api.script_list(Ok(response(&["stale-1", "stale-2"])));
    api.script_list(Ok(response(&["fresh-1"])));
    let (_tx, controller) = controller(Arc::clone(&api));

    let driver = async {
        while api.list_calls.load(Ordering::SeqCst) < 2 {
            tokio::task::yield_now().await;
        }
        assert!(controller.snapshot().loading);
        // Let the second (later-initiated) response land first.
        second_gate.send(()).unwrap();
        tokio::task::yield_now().await;
        first_gate.send(()).unwrap();
    };

    let (first, second, ()) = tokio::join!(controller.refresh(), controller.refresh(), driver);
    first.unwrap();
    second.unwrap();

    let view = controller.snapshot();
    let ids: Vec<_> = view.entries.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["fresh-1"], "stale response must not overwrite");
    assert_eq!(view.summary.as_ref().unwrap().total_count, 1);
    assert!(!view.loading);
}
