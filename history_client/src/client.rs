use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::{debug, error, info};

use history_core::{HistoryRequest, HistoryResponse, HistoryTransport};

use crate::error::TransportError;

/// Configuration for the history API client
#[derive(Debug, Clone)]
pub struct HistoryApiConfig {
    pub base_url: String,
    pub timeout_seconds: u64,
}

impl Default for HistoryApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.history.example/v1".to_string(),
            timeout_seconds: 30,
        }
    }
}

/// HTTP client for the remote account-transactions-history API.
///
/// Carries no retry logic and no cursor bookkeeping of its own; it issues
/// exactly the request it is given and parses the page that comes back.
#[derive(Debug, Clone)]
pub struct HistoryApiClient {
    client: Client,
    config: HistoryApiConfig,
}

impl HistoryApiClient {
    pub fn new(config: HistoryApiConfig) -> Result<Self, TransportError> {
        if config.base_url.is_empty() {
            return Err(TransportError::Config(
                "History API base URL is required".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self { client, config })
    }

    /// POST one history request and parse the returned page.
    pub async fn fetch_page(
        &self,
        request: &HistoryRequest,
    ) -> Result<HistoryResponse, TransportError> {
        let url = format!(
            "{}/accountTransactionsHistory",
            self.config.base_url.trim_end_matches('/')
        );

        match request.before_timestamp {
            Some(before) => info!(
                "📄 Fetching history for account {} before {}",
                request.account_id,
                before.timestamp_millis()
            ),
            None => info!("🔄 Fetching latest history for account {}", request.account_id),
        }
        debug!("🌐 URL: {}", url);

        let response = self.client.post(&url).json(request).send().await?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            let message = response.text().await.unwrap_or_default();
            error!("❌ History API rejected signature ({}): {}", status, message);
            return Err(TransportError::Auth {
                status: status.as_u16(),
                message,
            });
        }

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            error!("❌ History API error {}: {}", status, message);
            return Err(TransportError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.text().await?;
        debug!("📄 Response size: {} bytes", body.len());

        let page: HistoryResponse = match serde_json::from_str(&body) {
            Ok(page) => page,
            Err(e) => {
                error!("❌ JSON parsing failed: {}", e);
                error!(
                    "🔍 Response snippet: {}",
                    &body.chars().take(500).collect::<String>()
                );
                return Err(TransportError::Json(e));
            }
        };

        info!(
            "📄 Received {} events, more: {}",
            page.events.len(),
            page.pagination.more_events
        );
        Ok(page)
    }
}

#[async_trait]
impl HistoryTransport for HistoryApiClient {
    async fn fetch_history(
        &self,
        request: &HistoryRequest,
    ) -> history_core::Result<HistoryResponse> {
        self.fetch_page(request).await.map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_creation_with_defaults() {
        let client = HistoryApiClient::new(HistoryApiConfig::default());
        assert!(client.is_ok());
    }

    #[test]
    fn empty_base_url_is_rejected() {
        let result = HistoryApiClient::new(HistoryApiConfig {
            base_url: String::new(),
            timeout_seconds: 30,
        });
        assert!(matches!(result, Err(TransportError::Config(_))));
    }

    #[tokio::test]
    #[ignore] // Run manually against a live endpoint: cargo test -p history_client -- --ignored
    async fn fetch_against_local_server() {
        use chrono::DateTime;
        use history_core::WalletSignature;

        let client = HistoryApiClient::new(HistoryApiConfig {
            base_url: "http://127.0.0.1:8080/v1".to_string(),
            timeout_seconds: 10,
        })
        .unwrap();

        let request = HistoryRequest {
            account_id: "acct-local".to_string(),
            signature: WalletSignature {
                message: "verify:acct-local".to_string(),
                expiration: DateTime::from_timestamp_millis(9_999_999_999_999).unwrap(),
                signer: "0xsigner".to_string(),
            },
            before_timestamp: None,
        };

        match client.fetch_page(&request).await {
            Ok(page) => {
                println!(
                    "Fetched {} events, more: {}",
                    page.events.len(),
                    page.pagination.more_events
                );
            }
            Err(e) => panic!("API call failed: {:?}", e),
        }
    }

    #[test]
    fn auth_errors_map_to_core_auth() {
        let err = TransportError::Auth {
            status: 401,
            message: "expired proof".to_string(),
        };
        let core: history_core::HistoryError = err.into();
        assert!(matches!(core, history_core::HistoryError::Auth(_)));

        let err = TransportError::Api {
            status: 500,
            message: "boom".to_string(),
        };
        let core: history_core::HistoryError = err.into();
        assert!(matches!(core, history_core::HistoryError::Transport(_)));
    }
}
