use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;
use tracing::{info, warn};

use config_manager::{AccountConfig, SystemConfig};
use history_client::{HistoryApiClient, HistoryApiConfig};
use history_core::{
    Account, AccountProvider, AccountStatus, HistoryError, SyncEngine, SyncOutcome,
    WalletSignature, WalletSignatureProvider,
};
use persistence_layer::RedisClient;
use retry_utils::{retry_with_backoff, RetryClass, RetryPolicy};

/// Account identity sourced from configuration. A real deployment plugs a
/// login/session service in here; an empty id runs unauthenticated and
/// every sync becomes a no-op.
struct ConfiguredAccount {
    account: Option<Account>,
}

impl ConfiguredAccount {
    fn from_config(config: &AccountConfig) -> Self {
        let account = (!config.id.is_empty()).then(|| Account {
            id: config.id.clone(),
            wallets: config.wallets.clone(),
            status: AccountStatus::Active,
        });
        Self { account }
    }
}

#[async_trait]
impl AccountProvider for ConfiguredAccount {
    async fn get_user(&self) -> Option<Account> {
        self.account.clone()
    }
}

/// Wallet signing is an external collaborator; this adapter replays a
/// pre-signed verification proof from configuration until it expires.
struct PresignedProof {
    message: String,
    signer: String,
    expiration: DateTime<Utc>,
}

impl PresignedProof {
    fn from_config(config: &AccountConfig) -> Self {
        Self {
            message: config.proof_message.clone(),
            signer: config.proof_signer.clone(),
            expiration: Utc::now() + Duration::minutes(config.proof_valid_minutes),
        }
    }
}

#[async_trait]
impl WalletSignatureProvider for PresignedProof {
    async fn get_wallet_verifying_signature(
        &self,
        _account: &Account,
    ) -> history_core::Result<WalletSignature> {
        if self.expiration <= Utc::now() {
            return Err(HistoryError::Signature(
                "pre-signed proof has expired".to_string(),
            ));
        }
        Ok(WalletSignature {
            message: self.message.clone(),
            expiration: self.expiration,
            signer: self.signer.clone(),
        })
    }
}

fn classify(error: &HistoryError) -> RetryClass {
    match error {
        // Transport failures are worth another attempt; everything else
        // (auth, local preconditions) is final
        HistoryError::Transport(_) => RetryClass::Server,
        _ => RetryClass::Fatal,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = SystemConfig::load().context("Failed to load configuration")?;

    let default_filter = if config.system.debug_mode { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .init();

    info!(
        "Starting history tracker (api: {})",
        config.history_api.api_base_url
    );

    let client = HistoryApiClient::new(HistoryApiConfig {
        base_url: config.history_api.api_base_url.clone(),
        timeout_seconds: config.history_api.request_timeout_seconds,
    })
    .context("Failed to build history API client")?;

    let engine = Arc::new(Mutex::new(SyncEngine::new(
        client,
        Arc::new(ConfiguredAccount::from_config(&config.account)),
        Arc::new(PresignedProof::from_config(&config.account)),
    )));
    let policy = RetryPolicy::default();

    // Head refresh
    let outcome = retry_with_backoff(
        || {
            let engine = Arc::clone(&engine);
            async move { engine.lock().await.fetch_latest().await }
        },
        &policy,
        classify,
    )
    .await
    .context("Head refresh failed")?;

    if outcome == SyncOutcome::Skipped {
        info!("No account configured; nothing to sync");
        return Ok(());
    }

    // Backfill older pages until the server reports exhaustion
    let mut pages = 0u32;
    loop {
        if config.system.backfill_max_pages > 0 && pages >= config.system.backfill_max_pages {
            info!("Backfill page cap reached ({} pages)", pages);
            break;
        }

        let result = retry_with_backoff(
            || {
                let engine = Arc::clone(&engine);
                async move { engine.lock().await.fetch_older(None).await }
            },
            &policy,
            classify,
        )
        .await;

        match result {
            Ok(SyncOutcome::Synced(_)) => pages += 1,
            Ok(SyncOutcome::Skipped) => break,
            Err(HistoryError::HistoryExhausted) => {
                info!("Server reported no more events; backfill complete");
                break;
            }
            Err(e) => return Err(e).context("Backfill failed"),
        }
    }

    {
        let engine = engine.lock().await;
        if let Some(history) = engine.history() {
            info!(
                "Sync complete for account {}: {} events held, oldest {:?}",
                history.account_id(),
                history.events().len(),
                history.oldest_timestamp().map(|t| t.timestamp_millis())
            );

            for wallet in &config.account.wallets {
                let Some(units) = history.indexing().wallet_progress(wallet) else {
                    continue;
                };
                for (unit, chains) in units {
                    for (chain_id, data) in chains {
                        info!(
                            "  {} {} chain {}: processed {} / detected {} / target {}",
                            wallet,
                            unit.as_str(),
                            chain_id,
                            data.processed_up_to,
                            data.detected_up_to,
                            data.target
                        );
                    }
                }
            }

            if config.redis.enabled {
                match RedisClient::new(&config.redis.url).await {
                    Ok(redis) => {
                        redis
                            .store_history_snapshot(history, config.redis.snapshot_ttl_seconds)
                            .await
                            .context("Failed to store history snapshot")?;
                    }
                    Err(e) => warn!("Redis unavailable, skipping snapshot: {}", e),
                }
            }
        }
    }

    if config.system.refresh_interval_ms == 0 {
        return Ok(());
    }

    // Foreground refresh: keep folding newly indexed events into the store
    let interval = std::time::Duration::from_millis(config.system.refresh_interval_ms);
    info!("Entering foreground refresh loop (every {:?})", interval);
    loop {
        tokio::time::sleep(interval).await;

        let outcome = retry_with_backoff(
            || {
                let engine = Arc::clone(&engine);
                async move { engine.lock().await.fetch_latest().await }
            },
            &policy,
            classify,
        )
        .await
        .context("Foreground refresh failed")?;

        if outcome == SyncOutcome::Skipped {
            continue;
        }

        if config.redis.enabled {
            let engine = engine.lock().await;
            if let Some(history) = engine.history() {
                if let Ok(redis) = RedisClient::new(&config.redis.url).await {
                    if let Err(e) = redis
                        .store_history_snapshot(history, config.redis.snapshot_ttl_seconds)
                        .await
                    {
                        warn!("Snapshot refresh failed: {}", e);
                    }
                }
            }
        }
    }
}
