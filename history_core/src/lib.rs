pub mod api;
pub mod events;
pub mod indexing;
pub mod store;
pub mod sync;
pub mod views;

// Re-export the types most consumers need
pub use api::{
    Account, AccountProvider, AccountStatus, HistoryRequest, HistoryResponse, HistoryTransport,
    Pagination, WalletSignature, WalletSignatureProvider,
};
pub use events::{Event, EventKey, EventKind, EventPayload, RawAmount, TxEnvelope};
pub use indexing::{IndexerUnit, IndexingData, IndexingTracker, UnitIndexing};
pub use store::{MergeStats, TransactionsHistory};
pub use sync::{SyncEngine, SyncOutcome};
pub use views::{token_events, token_flow, TokenFlow, TokenWatch};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum HistoryError {
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Authentication failed: {0}")]
    Auth(String),
    #[error("Wallet signature error: {0}")]
    Signature(String),
    #[error("History exhausted: server reported no more events for this session")]
    HistoryExhausted,
    #[error("No events held and no cursor supplied; nothing to backfill from")]
    EmptyHistory,
}

pub type Result<T> = std::result::Result<T, HistoryError>;
