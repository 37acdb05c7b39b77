use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::events::{Address, Event};
use crate::indexing::UnitIndexing;
use crate::Result;

/// Per-wallet signed proof attached to every history request.
///
/// Produced by an external wallet-signing collaborator; this crate only
/// transports it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WalletSignature {
    pub message: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub expiration: DateTime<Utc>,
    pub signer: Address,
}

/// Request body for `accountTransactionsHistory`.
///
/// `before_timestamp` omitted means "fetch latest/head"; present means
/// "backfill strictly older history".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRequest {
    pub account_id: String,
    pub signature: WalletSignature,
    #[serde(
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none",
        default
    )]
    pub before_timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    /// Whether an older page exists server-side for the current filter set
    pub more_events: bool,
}

/// One page of the remote event log plus indexing/pagination metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryResponse {
    pub events: Vec<Event>,
    /// `wallet -> unit -> (per-chain watermarks | error marker)`
    #[serde(default)]
    pub indexing: HashMap<Address, HashMap<String, UnitIndexing>>,
    #[serde(default)]
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AccountStatus {
    Active,
    Pending,
    Disabled,
}

/// Authenticated account scoping one history store. An account may own
/// several wallet addresses; its history is one logical stream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: String,
    pub wallets: Vec<Address>,
    pub status: AccountStatus,
}

/// Source of the currently authenticated account, if any. Drives the
/// no-account guard: no user means every sync is a benign no-op.
#[async_trait]
pub trait AccountProvider: Send + Sync {
    async fn get_user(&self) -> Option<Account>;
}

/// External wallet-signing collaborator. The engine never generates
/// signatures, only attaches them.
#[async_trait]
pub trait WalletSignatureProvider: Send + Sync {
    async fn get_wallet_verifying_signature(&self, account: &Account) -> Result<WalletSignature>;
}

/// Transport seam to the remote history API. Implemented over HTTP by
/// `history_client`; tests substitute scripted responses.
#[async_trait]
pub trait HistoryTransport: Send + Sync {
    async fn fetch_history(&self, request: &HistoryRequest) -> Result<HistoryResponse>;
}

#[async_trait]
impl<T: HistoryTransport + ?Sized> HistoryTransport for Arc<T> {
    async fn fetch_history(&self, request: &HistoryRequest) -> Result<HistoryResponse> {
        (**self).fetch_history(request).await
    }
}
