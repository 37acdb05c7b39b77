use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::api::{Account, AccountProvider, HistoryRequest, HistoryResponse, HistoryTransport,
    WalletSignatureProvider};
use crate::store::{MergeStats, TransactionsHistory};
use crate::{HistoryError, Result};

/// Result of one sync call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// No authenticated account; nothing was fetched or stored
    Skipped,
    Synced(MergeStats),
}

/// Orchestrates fetch-merge cycles against the remote history API.
///
/// Owns the per-account [`TransactionsHistory`] for the current session:
/// created on the first successful head refresh after login, discarded on
/// [`logout`] or when the authenticated account changes. The engine never
/// retries and never commits a partial merge; a failed call leaves the
/// store exactly as it was.
///
/// Merges are synchronous folds keyed by event identity, so a host that
/// overlaps a foreground refresh with a user-triggered backfill converges
/// to the same store regardless of network completion order.
///
/// [`logout`]: SyncEngine::logout
pub struct SyncEngine<T: HistoryTransport> {
    transport: T,
    accounts: Arc<dyn AccountProvider>,
    signer: Arc<dyn WalletSignatureProvider>,
    history: Option<TransactionsHistory>,
}

impl<T: HistoryTransport> SyncEngine<T> {
    pub fn new(
        transport: T,
        accounts: Arc<dyn AccountProvider>,
        signer: Arc<dyn WalletSignatureProvider>,
    ) -> Self {
        Self {
            transport,
            accounts,
            signer,
            history: None,
        }
    }

    /// The current account's history, if one has been synced this session.
    pub fn history(&self) -> Option<&TransactionsHistory> {
        self.history.as_ref()
    }

    /// Drop the session store. Called on logout; also happens implicitly
    /// when a sync observes a different authenticated account.
    pub fn logout(&mut self) {
        if let Some(history) = self.history.take() {
            info!(
                "Discarding history store for account {} ({} events)",
                history.account_id(),
                history.events().len()
            );
        }
    }

    /// Head refresh: fetch the latest/authoritative window (no cursor).
    ///
    /// Used on login, account switch and periodic foreground refresh.
    /// Returns [`SyncOutcome::Skipped`] when no account is authenticated.
    pub async fn fetch_latest(&mut self) -> Result<SyncOutcome> {
        let Some(account) = self.accounts.get_user().await else {
            debug!("No authenticated account; skipping history refresh");
            return Ok(SyncOutcome::Skipped);
        };
        self.discard_if_account_changed(&account);

        let response = self.request(&account, None).await?;
        let store = self
            .history
            .get_or_insert_with(|| TransactionsHistory::new(account.id.clone()));
        let stats = store.merge(&response, None);

        info!(
            "Head refresh for account {}: {} new, {} updated, {} events held",
            account.id,
            stats.inserted,
            stats.replaced,
            store.events().len()
        );
        Ok(SyncOutcome::Synced(stats))
    }

    /// Backfill: fetch events strictly older than `before`, defaulting to
    /// the timestamp of the oldest held event.
    ///
    /// Local preconditions are checked before any network call: backfilling
    /// an exhausted session (`more_events == false`) is
    /// [`HistoryError::HistoryExhausted`], and backfilling with nothing
    /// held and no explicit cursor is [`HistoryError::EmptyHistory`].
    pub async fn fetch_older(&mut self, before: Option<DateTime<Utc>>) -> Result<SyncOutcome> {
        let Some(account) = self.accounts.get_user().await else {
            debug!("No authenticated account; skipping history backfill");
            return Ok(SyncOutcome::Skipped);
        };
        self.discard_if_account_changed(&account);

        let cursor = {
            let store = self.history.as_ref().ok_or(HistoryError::EmptyHistory)?;
            if !store.more_events() {
                return Err(HistoryError::HistoryExhausted);
            }
            before
                .or_else(|| store.oldest_timestamp())
                .ok_or(HistoryError::EmptyHistory)?
        };

        let response = self.request(&account, Some(cursor)).await?;
        let store = self.history.as_mut().ok_or(HistoryError::EmptyHistory)?;
        let stats = store.merge(&response, Some(cursor));

        info!(
            "Backfill for account {} before {}: {} new, {} updated, more: {}",
            account.id,
            cursor.timestamp_millis(),
            stats.inserted,
            stats.replaced,
            store.more_events()
        );
        Ok(SyncOutcome::Synced(stats))
    }

    fn discard_if_account_changed(&mut self, account: &Account) {
        let changed = self
            .history
            .as_ref()
            .is_some_and(|history| history.account_id() != account.id);
        if changed {
            info!("Authenticated account changed; discarding previous history store");
            self.history = None;
        }
    }

    async fn request(
        &self,
        account: &Account,
        before: Option<DateTime<Utc>>,
    ) -> Result<HistoryResponse> {
        let signature = self
            .signer
            .get_wallet_verifying_signature(account)
            .await?;
        let request = HistoryRequest {
            account_id: account.id.clone(),
            signature,
            before_timestamp: before,
        };
        self.transport.fetch_history(&request).await
    }
}
