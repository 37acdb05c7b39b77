use redis::{AsyncCommands, Client};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use history_core::TransactionsHistory;

/// Stored history snapshot with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredHistorySnapshot {
    pub account_id: String,
    pub history: TransactionsHistory,
    pub snapshotted_at: chrono::DateTime<chrono::Utc>,
}

/// Redis health status information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisHealthStatus {
    pub connected: bool,
    pub latency_ms: u64,
    pub error: Option<String>,
}

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Redis connection error: {0}")]
    Connection(#[from] redis::RedisError),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PersistenceError>;

/// Whole-store snapshot cache keyed by account id.
///
/// Snapshots are a warm-start convenience only: the merge engine never
/// reads them, and an account switch invalidates the previous account's
/// snapshot wholesale.
#[derive(Debug, Clone)]
pub struct RedisClient {
    client: Client,
}

impl RedisClient {
    pub async fn new(redis_url: &str) -> Result<Self> {
        let client = Client::open(redis_url)?;

        // Test the connection
        let mut conn = client.get_multiplexed_async_connection().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;

        Ok(Self { client })
    }

    async fn get_connection(&self) -> Result<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(PersistenceError::from)
    }

    fn snapshot_key(account_id: &str) -> String {
        format!("history:{}", account_id)
    }

    /// Store the full history store as one JSON snapshot with a TTL.
    pub async fn store_history_snapshot(
        &self,
        history: &TransactionsHistory,
        ttl_seconds: u64,
    ) -> Result<()> {
        let snapshot = StoredHistorySnapshot {
            account_id: history.account_id().to_string(),
            history: history.clone(),
            snapshotted_at: chrono::Utc::now(),
        };

        let key = Self::snapshot_key(history.account_id());
        let json = serde_json::to_string(&snapshot)?;
        let mut conn = self.get_connection().await?;
        let _: () = conn.set_ex(&key, json, ttl_seconds).await?;

        info!(
            "Stored history snapshot for account {} ({} events)",
            history.account_id(),
            history.events().len()
        );
        Ok(())
    }

    /// Load a previously stored snapshot, if one exists and has not expired.
    pub async fn load_history_snapshot(
        &self,
        account_id: &str,
    ) -> Result<Option<StoredHistorySnapshot>> {
        let key = Self::snapshot_key(account_id);
        let mut conn = self.get_connection().await?;
        let json: Option<String> = conn.get(&key).await?;

        match json {
            Some(json) => {
                let snapshot: StoredHistorySnapshot = serde_json::from_str(&json)?;
                debug!(
                    "Loaded history snapshot for account {} ({} events)",
                    account_id,
                    snapshot.history.events().len()
                );
                Ok(Some(snapshot))
            }
            None => Ok(None),
        }
    }

    /// Drop the snapshot for an account. Called on logout/account switch.
    pub async fn invalidate_history(&self, account_id: &str) -> Result<()> {
        let key = Self::snapshot_key(account_id);
        let mut conn = self.get_connection().await?;
        let _: u32 = conn.del(&key).await?;
        debug!("Invalidated history snapshot for account {}", account_id);
        Ok(())
    }

    /// Test Redis connectivity and health
    pub async fn health_check(&self) -> Result<RedisHealthStatus> {
        let start_time = std::time::Instant::now();

        match self.get_connection().await {
            Ok(mut conn) => {
                let ping: redis::RedisResult<String> =
                    redis::cmd("PING").query_async(&mut conn).await;
                match ping {
                    Ok(_) => Ok(RedisHealthStatus {
                        connected: true,
                        latency_ms: start_time.elapsed().as_millis() as u64,
                        error: None,
                    }),
                    Err(e) => Ok(RedisHealthStatus {
                        connected: false,
                        latency_ms: start_time.elapsed().as_millis() as u64,
                        error: Some(format!("PING failed: {}", e)),
                    }),
                }
            }
            Err(e) => Ok(RedisHealthStatus {
                connected: false,
                latency_ms: start_time.elapsed().as_millis() as u64,
                error: Some(format!("Connection failed: {}", e)),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use history_core::HistoryResponse;

    fn sample_history() -> TransactionsHistory {
        let mut history = TransactionsHistory::new("acct-1".to_string());
        let response: HistoryResponse = serde_json::from_value(serde_json::json!({
            "events": [{
                "tx": {
                    "chainId": 1,
                    "txHash": "0xa",
                    "timestamp": 1_700_000_000_000i64,
                    "spentInGas": "21000",
                    "nativePrice": "2000",
                    "initiatedBy": "0xme"
                },
                "type": "NATIVE_TRANSFER",
                "data": { "from": "0xme", "to": "0xyou", "amount": "1000000000000000000" }
            }],
            "pagination": { "moreEvents": false }
        }))
        .unwrap();
        history.merge(&response, None);
        history
    }

    #[test]
    fn snapshot_round_trips_through_json() {
        let history = sample_history();
        let snapshot = StoredHistorySnapshot {
            account_id: history.account_id().to_string(),
            history: history.clone(),
            snapshotted_at: chrono::Utc::now(),
        };

        let json = serde_json::to_string(&snapshot).unwrap();
        let back: StoredHistorySnapshot = serde_json::from_str(&json).unwrap();

        assert_eq!(back.account_id, "acct-1");
        assert_eq!(back.history.events(), history.events());
        assert_eq!(back.history.more_events(), history.more_events());
    }

    #[tokio::test]
    #[ignore] // Run manually against a local Redis: cargo test -p persistence_layer -- --ignored
    async fn snapshot_lifecycle_against_real_redis() {
        let client = RedisClient::new("redis://127.0.0.1:6379").await.unwrap();
        let history = sample_history();

        client.store_history_snapshot(&history, 60).await.unwrap();
        let loaded = client.load_history_snapshot("acct-1").await.unwrap();
        assert!(loaded.is_some());

        client.invalidate_history("acct-1").await.unwrap();
        let gone = client.load_history_snapshot("acct-1").await.unwrap();
        assert!(gone.is_none());
    }
}
