use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::{HistoryResponse, Pagination};
use crate::events::{Event, EventKey};
use crate::indexing::IndexingTracker;

/// Counts reported by one merge step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub inserted: usize,
    pub replaced: usize,
}

/// The client-held, ordered, deduplicated event history of one account.
///
/// Created empty at login or account switch, mutated only by [`merge`],
/// dropped wholesale on logout. Never shared across accounts.
///
/// Invariants maintained across every merge:
/// - no two events share an identity key (`chain`, `hash`, `kind`)
/// - `events` is sorted newest-first with a deterministic tie-break, so it
///   can drive a reverse-chronological timeline directly
/// - indexing watermarks only move forward
///
/// [`merge`]: TransactionsHistory::merge
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionsHistory {
    account_id: String,
    events: Vec<Event>,
    indexing: IndexingTracker,
    pagination: Pagination,
}

impl TransactionsHistory {
    pub fn new(account_id: String) -> Self {
        Self {
            account_id,
            events: Vec::new(),
            indexing: IndexingTracker::new(),
            // Until the server says otherwise, assume older pages may exist
            pagination: Pagination { more_events: true },
        }
    }

    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn indexing(&self) -> &IndexingTracker {
        &self.indexing
    }

    pub fn more_events(&self) -> bool {
        self.pagination.more_events
    }

    /// Timestamp of the oldest held event, the natural backfill cursor.
    pub fn oldest_timestamp(&self) -> Option<DateTime<Utc>> {
        self.events.last().map(|event| event.tx.timestamp)
    }

    /// Fold one fetched page into the store.
    ///
    /// `requested_before` is the cursor the page was requested with:
    /// `None` marks an authoritative head refresh, `Some` a backfill of
    /// strictly older data. Either way the fold is the same replace-or-
    /// insert keyed by event identity, so merging a response twice (or two
    /// overlapping responses in either order) converges to the same store.
    ///
    /// This is a synchronous read-modify-write; callers that overlap
    /// in-flight fetches get atomicity for free as long as they hold
    /// `&mut self` across the call, never across an await.
    pub fn merge(
        &mut self,
        response: &HistoryResponse,
        requested_before: Option<DateTime<Utc>>,
    ) -> MergeStats {
        let mut index: HashMap<EventKey, usize> = self
            .events
            .iter()
            .enumerate()
            .map(|(position, event)| (event.key(), position))
            .collect();

        let mut stats = MergeStats::default();
        for event in &response.events {
            match index.get(&event.key()) {
                Some(&position) => {
                    // Same identity re-emitted (e.g. pending entry later
                    // confirmed): whole-record replacement, never a duplicate
                    self.events[position] = event.clone();
                    stats.replaced += 1;
                }
                None => {
                    index.insert(event.key(), self.events.len());
                    self.events.push(event.clone());
                    stats.inserted += 1;
                }
            }
        }

        self.events.sort_by(timeline_order);

        for (wallet, units) in &response.indexing {
            self.indexing.apply(wallet, units);
        }
        self.pagination = response.pagination.clone();

        debug!(
            "Merged history page for account {}: {} inserted, {} replaced, {} held (backfill: {})",
            self.account_id,
            stats.inserted,
            stats.replaced,
            self.events.len(),
            requested_before.is_some()
        );
        stats
    }
}

/// Timeline ordering: timestamp descending, then `(chain, hash, kind)`
/// ascending so iteration order is deterministic regardless of merge order.
fn timeline_order(a: &Event, b: &Event) -> Ordering {
    b.tx
        .timestamp
        .cmp(&a.tx.timestamp)
        .then_with(|| a.tx.chain_id.cmp(&b.tx.chain_id))
        .then_with(|| a.tx.tx_hash.cmp(&b.tx.tx_hash))
        .then_with(|| a.payload.kind().cmp(&b.payload.kind()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventPayload, RawAmount, TxEnvelope};
    use std::collections::HashMap as StdHashMap;

    fn transfer_event(chain_id: u64, tx_hash: &str, ts_millis: i64, amount: u64) -> Event {
        Event {
            tx: TxEnvelope {
                chain_id,
                tx_hash: tx_hash.to_string(),
                timestamp: DateTime::from_timestamp_millis(ts_millis).unwrap(),
                spent_in_gas: RawAmount::from(21_000u64),
                native_price: "2000".parse().unwrap(),
                initiated_by: "0xme".to_string(),
            },
            payload: EventPayload::Erc20Transfer {
                token: "0xtoken".to_string(),
                from: "0xme".to_string(),
                to: "0xyou".to_string(),
                amount: RawAmount::from(amount),
            },
        }
    }

    fn approval_event(chain_id: u64, tx_hash: &str, ts_millis: i64, amount: u64) -> Event {
        Event {
            tx: TxEnvelope {
                chain_id,
                tx_hash: tx_hash.to_string(),
                timestamp: DateTime::from_timestamp_millis(ts_millis).unwrap(),
                spent_in_gas: RawAmount::from(45_000u64),
                native_price: "2000".parse().unwrap(),
                initiated_by: "0xme".to_string(),
            },
            payload: EventPayload::Erc20Approval {
                token: "0xtoken".to_string(),
                owner: "0xme".to_string(),
                spender: "0xspender".to_string(),
                amount: RawAmount::from(amount),
            },
        }
    }

    fn response(events: Vec<Event>, more_events: bool) -> HistoryResponse {
        HistoryResponse {
            events,
            indexing: StdHashMap::new(),
            pagination: Pagination { more_events },
        }
    }

    fn timestamps(store: &TransactionsHistory) -> Vec<i64> {
        store
            .events()
            .iter()
            .map(|e| e.tx.timestamp.timestamp_millis())
            .collect()
    }

    #[test]
    fn merge_is_idempotent() {
        let mut store = TransactionsHistory::new("acct".to_string());
        let page = response(
            vec![transfer_event(1, "0xa", 100, 5), transfer_event(1, "0xb", 99, 6)],
            true,
        );

        store.merge(&page, None);
        let after_first = store.clone();
        let stats = store.merge(&page, None);

        assert_eq!(stats.inserted, 0);
        assert_eq!(stats.replaced, 2);
        assert_eq!(store.events(), after_first.events());
        assert_eq!(timestamps(&store), vec![100, 99]);
    }

    #[test]
    fn merge_order_independent() {
        let head = response(
            vec![transfer_event(1, "0xa", 100, 5), transfer_event(1, "0xb", 99, 6)],
            true,
        );
        let tail = response(vec![transfer_event(1, "0xc", 98, 7)], false);

        let mut forward = TransactionsHistory::new("acct".to_string());
        forward.merge(&head, None);
        forward.merge(&tail, Some(DateTime::from_timestamp_millis(99).unwrap()));

        let mut reverse = TransactionsHistory::new("acct".to_string());
        reverse.merge(&tail, Some(DateTime::from_timestamp_millis(99).unwrap()));
        reverse.merge(&head, None);

        assert_eq!(forward.events(), reverse.events());
        assert_eq!(timestamps(&forward), vec![100, 99, 98]);
    }

    #[test]
    fn backfill_appends_older_events_and_records_exhaustion() {
        let mut store = TransactionsHistory::new("acct".to_string());
        store.merge(
            &response(
                vec![
                    transfer_event(1, "0xa", 100, 1),
                    transfer_event(1, "0xb", 99, 2),
                    transfer_event(1, "0xc", 98, 3),
                ],
                true,
            ),
            None,
        );
        assert!(store.more_events());

        let cursor = store.oldest_timestamp().unwrap();
        assert_eq!(cursor.timestamp_millis(), 98);

        let stats = store.merge(
            &response(vec![transfer_event(1, "0xd", 97, 4)], false),
            Some(cursor),
        );

        assert_eq!(stats.inserted, 1);
        assert_eq!(timestamps(&store), vec![100, 99, 98, 97]);
        assert!(!store.more_events());
    }

    #[test]
    fn head_refresh_replaces_reemitted_key_in_place() {
        let mut store = TransactionsHistory::new("acct".to_string());
        store.merge(&response(vec![approval_event(10, "0xabc", 50, 0)], true), None);

        // Same (chain, hash, kind) later confirmed with the real amount
        let stats = store.merge(&response(vec![approval_event(10, "0xabc", 50, 777)], true), None);

        assert_eq!(stats.replaced, 1);
        assert_eq!(stats.inserted, 0);
        assert_eq!(store.events().len(), 1);
        match &store.events()[0].payload {
            EventPayload::Erc20Approval { amount, .. } => {
                assert_eq!(*amount, RawAmount::from(777u64));
            }
            other => panic!("unexpected payload: {:?}", other),
        }
    }

    #[test]
    fn same_tx_different_kinds_are_distinct_entries() {
        let mut store = TransactionsHistory::new("acct".to_string());
        store.merge(
            &response(
                vec![approval_event(1, "0xa", 100, 1), transfer_event(1, "0xa", 100, 2)],
                true,
            ),
            None,
        );

        assert_eq!(store.events().len(), 2);
        // Deterministic kind tie-break on identical (timestamp, chain, hash)
        assert_eq!(store.events()[0].payload.kind(), crate::EventKind::Erc20Approval);
    }

    #[test]
    fn equal_timestamps_break_ties_by_chain_then_hash() {
        let mut store = TransactionsHistory::new("acct".to_string());
        store.merge(
            &response(
                vec![
                    transfer_event(10, "0xb", 100, 1),
                    transfer_event(1, "0xz", 100, 2),
                    transfer_event(10, "0xa", 100, 3),
                ],
                true,
            ),
            None,
        );

        let order: Vec<(u64, String)> = store
            .events()
            .iter()
            .map(|e| (e.tx.chain_id, e.tx.tx_hash.clone()))
            .collect();
        assert_eq!(
            order,
            vec![
                (1, "0xz".to_string()),
                (10, "0xa".to_string()),
                (10, "0xb".to_string())
            ]
        );
    }

    #[test]
    fn merge_folds_indexing_payload() {
        let mut store = TransactionsHistory::new("acct".to_string());
        let mut response: HistoryResponse = serde_json::from_value(serde_json::json!({
            "events": [],
            "indexing": {
                "0xwallet": {
                    "erc20Transfers": {
                        "1": { "processedUpTo": "100", "detectedUpTo": "120", "target": "200" }
                    }
                }
            },
            "pagination": { "moreEvents": true }
        }))
        .unwrap();

        store.merge(&response, None);
        assert_eq!(
            store
                .indexing()
                .progress("0xwallet", crate::IndexerUnit::Erc20Transfers, 1)
                .unwrap()
                .processed_up_to,
            100
        );

        // A later page can only advance the watermarks
        response.indexing = serde_json::from_value(serde_json::json!({
            "0xwallet": {
                "erc20Transfers": {
                    "1": { "processedUpTo": "90", "detectedUpTo": "130", "target": "200" }
                }
            }
        }))
        .unwrap();
        store.merge(&response, Some(DateTime::from_timestamp_millis(50).unwrap()));

        let data = store
            .indexing()
            .progress("0xwallet", crate::IndexerUnit::Erc20Transfers, 1)
            .unwrap();
        assert_eq!(data.processed_up_to, 100);
        assert_eq!(data.detected_up_to, 130);
    }
}
