use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use ethers::prelude::*;
use reqwest::{Client, Url};
use tokio::time::timeout;

use crate::evm::types::{MAX_RETRY_ATTEMPTS, PROVIDER_POLL_INTERVAL, RETRY_BASE_DELAY};
use crate::ledger::LedgerError;
use crate::utils::retry_async;

/// JSON-RPC client wrapper with per-request timeouts.
///
/// Reads go through [`RpcClient::idempotent`] and are retried with backoff.
/// Writes and estimates go through [`RpcClient::once`] and never are.
#[derive(Debug, Clone)]
pub struct RpcClient {
    provider: Arc<Provider<Http>>,
    request_timeout: Duration,
}

impl RpcClient {
    /// Creates a new RPC client with the given endpoint and timeout
    pub fn new(rpc_url: &str, request_timeout: Duration) -> Result<Self, LedgerError> {
        let url = Url::parse(rpc_url)
            .map_err(|e| LedgerError::Configuration(format!("Invalid RPC URL '{}': {}", rpc_url, e)))?;

        let http = Http::new_with_client(
            url,
            Client::builder()
                .timeout(request_timeout)
                .build()
                .map_err(|e| LedgerError::Configuration(format!("Failed to create HTTP client: {}", e)))?,
        );

        let provider = Provider::new(http).interval(PROVIDER_POLL_INTERVAL);

        Ok(Self {
            provider: Arc::new(provider),
            request_timeout,
        })
    }

    /// Runs an idempotent read with timeout and bounded retries.
    pub async fn idempotent<T, F, Fut>(&self, label: &str, mut operation: F) -> Result<T, LedgerError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let request_timeout = self.request_timeout;
        retry_async(
            label,
            || {
                let call = operation();
                async move { Self::bounded(label, request_timeout, call).await }
            },
            MAX_RETRY_ATTEMPTS,
            RETRY_BASE_DELAY,
        )
        .await
    }

    /// Runs a single request with a timeout and no retry.
    pub async fn once<T, Fut>(&self, label: &str, call: Fut) -> Result<T, LedgerError>
    where
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        Self::bounded(label, self.request_timeout, call).await
    }

    async fn bounded<T, Fut>(label: &str, limit: Duration, call: Fut) -> Result<T, LedgerError>
    where
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        match timeout(limit, call).await {
            Ok(result) => result.map_err(LedgerError::from),
            Err(_) => Err(LedgerError::Timeout(format!("{} timed out after {:?}", label, limit))),
        }
    }

    /// Gets the underlying provider
    pub fn provider(&self) -> &Provider<Http> {
        &self.provider
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_malformed_url() {
        let err = RpcClient::new("not a url", Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, LedgerError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_once_times_out() {
        let client = RpcClient::new("http://127.0.0.1:8545", Duration::from_millis(10)).unwrap();
        let result: Result<(), LedgerError> = client
            .once("slow", async {
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(LedgerError::Timeout(_))));
    }
}
