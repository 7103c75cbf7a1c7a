// Broadcast and confirmation of sequenced calls.

use std::sync::Arc;
use std::time::Duration;

use ethers::types::{Log, TxHash, H256, U256};
use tokio::time::timeout;
use tracing::{info, instrument, warn};

use crate::error::OrchestratorError;
use crate::ledger::{FinalityReport, LedgerClient};
use crate::types::{FinalityStatus, PendingCall, ResourceBudget, TransactionOutcome};

/// Sends sequenced calls and waits for their finality within a fixed budget.
#[derive(Clone)]
pub struct TransactionSubmitter {
    ledger: Arc<dyn LedgerClient>,
    confirmation_timeout: Duration,
}

impl TransactionSubmitter {
    pub fn new(ledger: Arc<dyn LedgerClient>, confirmation_timeout: Duration) -> Self {
        Self {
            ledger,
            confirmation_timeout,
        }
    }

    pub fn ledger(&self) -> &Arc<dyn LedgerClient> {
        &self.ledger
    }

    /// Signs and broadcasts `call` at `nonce`. Returns the provisional hash.
    pub async fn send(
        &self,
        call: &PendingCall,
        budget: &ResourceBudget,
        nonce: U256,
    ) -> Result<TxHash, OrchestratorError> {
        self.ledger.send(call, budget, nonce).await.map_err(|e| {
            warn!("Broadcast of {} at nonce {} failed: {}", call.function, nonce, e);
            OrchestratorError::SubmissionFailed(e.to_string())
        })
    }

    /// Waits for finality of `tx_hash`.
    ///
    /// Never fails: an expired budget or a polling error yields
    /// [`FinalityStatus::Unknown`], which callers must not treat as failure.
    #[instrument(skip(self), fields(chain_id = self.ledger.chain_id()))]
    pub async fn confirm(&self, tx_hash: TxHash, nonce: U256, cross_chain: bool) -> TransactionOutcome {
        let finality = timeout(self.confirmation_timeout, self.ledger.await_finality(tx_hash));
        let (status, logs) = match finality.await {
            Ok(Ok(report)) => Self::status_of(report),
            Ok(Err(e)) => {
                warn!("Lost track of {:?}: {}", tx_hash, e);
                (FinalityStatus::Unknown { detail: e.to_string() }, Vec::new())
            }
            Err(_) => {
                warn!(
                    "No finality for {:?} within {:?}",
                    tx_hash, self.confirmation_timeout
                );
                (
                    FinalityStatus::Unknown {
                        detail: format!("not final after {:?}", self.confirmation_timeout),
                    },
                    Vec::new(),
                )
            }
        };

        let correlation_id = match (&status, cross_chain) {
            (FinalityStatus::Success, true) => Some(correlation_id(tx_hash, &logs)),
            _ => None,
        };

        info!("Transaction {:?} at nonce {} ended as {:?}", tx_hash, nonce, status);
        TransactionOutcome {
            tx_hash,
            nonce,
            status,
            correlation_id,
        }
    }

    fn status_of(report: FinalityReport) -> (FinalityStatus, Vec<Log>) {
        if report.success {
            (FinalityStatus::Success, report.logs)
        } else {
            (
                FinalityStatus::Failure {
                    reason: report.revert_reason,
                },
                Vec::new(),
            )
        }
    }
}

/// First topic of the first emitted log, falling back to the transaction hash.
pub fn correlation_id(tx_hash: TxHash, logs: &[Log]) -> H256 {
    logs.first()
        .and_then(|log| log.topics.first())
        .copied()
        .unwrap_or(tx_hash)
}
