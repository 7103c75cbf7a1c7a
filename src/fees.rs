// Fee estimation and budget provisioning.

use ethers::types::U256;
use tracing::{debug, warn};

use crate::error::OrchestratorError;
use crate::ledger::LedgerClient;
use crate::types::{PendingCall, ResourceBudget};

/// Turns a ledger estimate into the budget a call is provisioned with.
///
/// The multiplier comes from the call's [`crate::types::EstimationPolicy`]:
/// 2 for a single destination, N + 1 for a fan-out to N destinations.
pub struct FeeEstimator;

impl FeeEstimator {
    /// Estimates `call` as sent by the ledger's signer.
    ///
    /// Any estimation error aborts the write before a nonce is taken.
    pub async fn estimate(
        ledger: &dyn LedgerClient,
        call: &PendingCall,
    ) -> Result<ResourceBudget, OrchestratorError> {
        let base = ledger.estimate(call, ledger.signer()).await.map_err(|e| {
            warn!("Estimation of {} failed: {}", call.function, e);
            OrchestratorError::EstimationFailed(e.to_string())
        })?;

        let budget = Self::provision(base, call.policy.multiplier())?;
        debug!(
            "Provisioned {} for {}: base={} x{}",
            budget.provisioned, call.function, budget.base, budget.multiplier
        );
        Ok(budget)
    }

    pub fn provision(
        base: U256,
        multiplier: u64,
    ) -> Result<ResourceBudget, OrchestratorError> {
        let provisioned = base.checked_mul(multiplier.into()).ok_or_else(|| {
            OrchestratorError::EstimationFailed(format!("budget overflow: {base} x {multiplier}"))
        })?;
        Ok(ResourceBudget {
            base,
            multiplier,
            provisioned,
        })
    }
}
