//! Read-only projections over a [`TransactionsHistory`].
//!
//! Everything here is a pure function of the store; the only mutable piece
//! of state is the per-token-set last-viewed marker ([`TokenWatch`]),
//! which lives outside the store and never feeds back into merging.

use chrono::{DateTime, Utc};

use crate::events::{Address, Event, EventPayload};
use crate::store::TransactionsHistory;

/// Direction of a transfer-like event relative to the viewing wallets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenFlow {
    Incoming,
    Outgoing,
    SameAccount,
}

fn is_own_wallet(wallets: &[Address], address: &str) -> bool {
    wallets.iter().any(|w| w.eq_ignore_ascii_case(address))
}

/// Classify a transfer-like event as incoming/outgoing/same-account.
/// Non-transfer events (approvals, swaps, position lifecycle) have no flow.
pub fn token_flow(event: &Event, wallets: &[Address]) -> Option<TokenFlow> {
    let (from, to) = match &event.payload {
        EventPayload::Erc20Transfer { from, to, .. } => (from, to),
        EventPayload::NativeTransfer { from, to, .. } => (from, to),
        EventPayload::DcaTransfer { from, to, .. } => (from, to),
        _ => return None,
    };

    match (is_own_wallet(wallets, from), is_own_wallet(wallets, to)) {
        (true, true) => Some(TokenFlow::SameAccount),
        (true, false) => Some(TokenFlow::Outgoing),
        (false, true) => Some(TokenFlow::Incoming),
        (false, false) => None,
    }
}

/// All held events touching any of the given token addresses, in timeline
/// order.
pub fn token_events<'a>(
    history: &'a TransactionsHistory,
    tokens: &[Address],
) -> Vec<&'a Event> {
    history
        .events()
        .iter()
        .filter(|event| {
            event
                .payload
                .tokens()
                .iter()
                .any(|token| tokens.iter().any(|t| t.eq_ignore_ascii_case(token)))
        })
        .collect()
}

/// Last-viewed marker scoped to one token-list query.
///
/// `unseen_events` reads; `mark_seen` is the explicit reset side effect.
#[derive(Debug, Clone)]
pub struct TokenWatch {
    tokens: Vec<Address>,
    last_viewed: Option<DateTime<Utc>>,
}

impl TokenWatch {
    pub fn new(tokens: Vec<Address>) -> Self {
        Self {
            tokens,
            last_viewed: None,
        }
    }

    pub fn last_viewed(&self) -> Option<DateTime<Utc>> {
        self.last_viewed
    }

    /// Matching events strictly newer than the marker. With no marker set,
    /// every matching event is unseen.
    pub fn unseen_events<'a>(&self, history: &'a TransactionsHistory) -> Vec<&'a Event> {
        token_events(history, &self.tokens)
            .into_iter()
            .filter(|event| {
                self.last_viewed
                    .map(|seen| event.tx.timestamp > seen)
                    .unwrap_or(true)
            })
            .collect()
    }

    /// Advance the marker to the newest matching event currently held.
    pub fn mark_seen(&mut self, history: &TransactionsHistory) {
        if let Some(newest) = token_events(history, &self.tokens)
            .first()
            .map(|event| event.tx.timestamp)
        {
            self.last_viewed = Some(newest);
        }
    }
}
