//! Wire types shared between the ledger HTTP API and its clients.
//!
//! Field names follow the deployed API (camelCase); timestamps are kept as
//! the RFC3339 strings the server sends, clients never rewrite them.

use serde::{Deserialize, Serialize};

pub mod transaction {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "lowercase")]
    pub enum TransactionKind {
        Income,
        Expense,
    }

    impl TransactionKind {
        /// Sign applied to `amount` when totalling; stored amounts are
        /// always non-negative magnitudes.
        pub fn sign(self) -> f64 {
            match self {
                Self::Income => 1.0,
                Self::Expense => -1.0,
            }
        }
    }

    /// One ledger entry, exactly as confirmed by the server.
    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    pub struct Transaction {
        /// Server-assigned, immutable.
        pub id: String,
        /// Subject id of the owning principal.
        #[serde(rename = "userId")]
        pub owner_id: String,
        /// Non-negative magnitude; direction comes from `kind`.
        pub amount: f64,
        #[serde(rename = "type")]
        pub kind: TransactionKind,
        pub category: String,
        pub description: String,
        #[serde(rename = "createdAt")]
        pub created_at: String,
        #[serde(rename = "updatedAt")]
        pub updated_at: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub tags: Option<Vec<String>>,
    }

    /// Body for creating a new entry. The server assigns id and timestamps.
    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct TransactionDraft {
        pub amount: f64,
        pub category: String,
        pub description: String,
        #[serde(rename = "type")]
        pub kind: TransactionKind,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub date: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub tags: Option<Vec<String>>,
    }

    /// Partial update; only set fields are serialized and replaced.
    #[derive(Clone, Debug, Default, Serialize, Deserialize)]
    pub struct TransactionPatch {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub amount: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub category: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub description: Option<String>,
        #[serde(
            rename = "type",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        pub kind: Option<TransactionKind>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub date: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub tags: Option<Vec<String>>,
    }

    /// Query constraints for a list request. Only present fields are sent.
    #[derive(Clone, Debug, Default, PartialEq, Eq)]
    pub struct ListFilters {
        pub limit: Option<u64>,
        pub start_date: Option<String>,
        pub end_date: Option<String>,
        pub category: Option<String>,
    }

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    pub struct ListResponse {
        pub entries: Vec<Transaction>,
        pub summary: super::summary::Summary,
    }

    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct EntryResponse {
        pub entry: Transaction,
    }

    /// Delete is keyed by both the entry id and the owner's subject id.
    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct DeleteRequest {
        pub id: String,
        #[serde(rename = "userId")]
        pub owner_id: String,
    }
}

pub mod summary {
    use std::collections::BTreeMap;

    use super::*;

    /// Server-computed aggregate over the queried entries.
    ///
    /// Clients treat this as authoritative and never recompute it; the
    /// averaging and rounding rules live server-side only.
    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    pub struct Summary {
        #[serde(rename = "totalCount")]
        pub total_count: u64,
        #[serde(rename = "totalAmount")]
        pub total_amount: f64,
        #[serde(rename = "totalIncome")]
        pub total_income: f64,
        #[serde(rename = "totalExpense")]
        pub total_expense: f64,
        #[serde(rename = "netAmount")]
        pub net_amount: f64,
        #[serde(rename = "categoryBreakdown")]
        pub category_breakdown: BTreeMap<String, f64>,
        #[serde(rename = "averageAmount")]
        pub average_amount: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub pagination: Option<Pagination>,
    }

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    pub struct Pagination {
        pub limit: u64,
        #[serde(rename = "hasMore")]
        pub has_more: bool,
    }
}
