//! Typed HTTP wrapper around the remote expense-ledger API.
//!
//! Every operation resolves a bearer credential first and refuses to
//! issue an unauthenticated request. A received non-success response
//! becomes [`LedgerError::Fetch`] with the body's `message` when present;
//! transport failures stay separate as [`LedgerError::Network`].

use std::sync::Arc;

use serde::Deserialize;
use serde::de::DeserializeOwned;

use api_types::transaction::{
    DeleteRequest, EntryResponse, ListFilters, ListResponse, Transaction, TransactionDraft,
    TransactionPatch,
};

use crate::error::LedgerError;
use crate::session::{IdToken, TokenSource};

/// The four ledger operations, as a seam so the sync controller and
/// tests can substitute fakes for the HTTP client.
#[allow(async_fn_in_trait)]
pub trait LedgerApi {
    async fn list(&self, filters: &ListFilters) -> Result<ListResponse, LedgerError>;
    async fn create(&self, draft: &TransactionDraft) -> Result<Transaction, LedgerError>;
    async fn update(&self, id: &str, patch: &TransactionPatch) -> Result<Transaction, LedgerError>;
    async fn delete(&self, id: &str) -> Result<(), LedgerError>;
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

#[derive(Clone, Debug)]
pub struct LedgerClient<T> {
    http: reqwest::Client,
    base_url: String,
    tokens: Arc<T>,
}

impl<T: TokenSource> LedgerClient<T> {
    /// The caller supplies the `reqwest::Client` so the surrounding
    /// environment controls timeouts and connection reuse.
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, tokens: Arc<T>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            tokens,
        }
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    async fn bearer(&self) -> Result<IdToken, LedgerError> {
        self.tokens
            .id_token()
            .await
            .ok_or(LedgerError::Unauthenticated)
    }

    async fn read_json<R: DeserializeOwned>(
        &self,
        resp: reqwest::Response,
        fallback: &str,
    ) -> Result<R, LedgerError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp.json::<R>().await?);
        }
        let message = resp
            .json::<ErrorBody>()
            .await
            .ok()
            .and_then(|body| body.message)
            .unwrap_or_else(|| fallback.to_string());
        tracing::debug!("ledger request failed: {status} {message}");
        Err(LedgerError::Fetch {
            status: status.as_u16(),
            message,
        })
    }
}

impl<T: TokenSource> LedgerApi for LedgerClient<T> {
    async fn list(&self, filters: &ListFilters) -> Result<ListResponse, LedgerError> {
        let token = self.bearer().await?;
        let mut url = self.url("get");
        if let Some(query) = filters_query(filters) {
            url = format!("{url}?{query}");
        }
        let resp = self
            .http
            .get(url)
            .bearer_auth(&token.raw)
            .header("content-type", "application/json")
            .send()
            .await?;
        self.read_json(resp, "failed to fetch entries").await
    }

    async fn create(&self, draft: &TransactionDraft) -> Result<Transaction, LedgerError> {
        let token = self.bearer().await?;
        let resp = self
            .http
            .post(self.url("create"))
            .bearer_auth(&token.raw)
            .json(draft)
            .send()
            .await?;
        let body: EntryResponse = self.read_json(resp, "failed to create entry").await?;
        Ok(body.entry)
    }

    async fn update(&self, id: &str, patch: &TransactionPatch) -> Result<Transaction, LedgerError> {
        let token = self.bearer().await?;
        let resp = self
            .http
            .put(self.url(&format!("update/{id}")))
            .bearer_auth(&token.raw)
            .json(patch)
            .send()
            .await?;
        let body: EntryResponse = self.read_json(resp, "failed to update entry").await?;
        Ok(body.entry)
    }

    /// The remote API keys deletion by both the entry id and the owner's
    /// subject id; without a resolvable subject no request is issued.
    async fn delete(&self, id: &str) -> Result<(), LedgerError> {
        let token = self.bearer().await?;
        if token.claims.sub.is_empty() {
            return Err(LedgerError::Unauthenticated);
        }
        let payload = DeleteRequest {
            id: id.to_string(),
            owner_id: token.claims.sub.clone(),
        };
        let resp = self
            .http
            .delete(self.url("delete"))
            .bearer_auth(&token.raw)
            .json(&payload)
            .send()
            .await?;

        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        let message = resp
            .json::<ErrorBody>()
            .await
            .ok()
            .and_then(|body| body.message)
            .unwrap_or_else(|| "failed to delete entry".to_string());
        Err(LedgerError::Fetch {
            status: status.as_u16(),
            message,
        })
    }
}

/// Builds the list query from exactly the present filter fields, in
/// `key=value` form joined by `&`. `None` when no filter is set.
pub fn filters_query(filters: &ListFilters) -> Option<String> {
    let mut params = Vec::new();
    if let Some(limit) = filters.limit {
        params.push(format!("limit={limit}"));
    }
    if let Some(start_date) = &filters.start_date {
        params.push(format!("startDate={start_date}"));
    }
    if let Some(end_date) = &filters.end_date {
        params.push(format!("endDate={end_date}"));
    }
    if let Some(category) = &filters.category {
        params.push(format!("category={category}"));
    }
    if params.is_empty() {
        None
    } else {
        Some(params.join("&"))
    }
}
