//! Registration and token use cases on top of the write pipeline.
//!
//! Every write follows the same path: estimate on the target ledger, admit
//! to that ledger's sequencer, wait for finality. The services only decide
//! what to write and which reads must pass first.

pub mod registration;
pub mod tokens;

use std::collections::HashMap;
use std::sync::Arc;

use ethers::types::{Address, Bytes};
use tracing::debug;

use crate::config::{ContractAddresses, DuplicateCheckPolicy};
use crate::directory::ChainDirectory;
use crate::error::OrchestratorError;
use crate::fees::FeeEstimator;
use crate::ledger::LedgerClient;
use crate::sequencer::SequencerPool;
use crate::types::{DestinationRef, PendingCall, TransactionOutcome};

pub use registration::RegistrationService;
pub use tokens::TokenService;

/// A configured ledger together with its client and deployed contracts.
#[derive(Clone)]
pub struct LedgerBinding {
    /// Canonical chain directory name
    pub name: String,
    pub endpoint: DestinationRef,
    pub contracts: ContractAddresses,
    pub client: Arc<dyn LedgerClient>,
}

impl LedgerBinding {
    /// Address of a deployed contract, or a configuration error naming it.
    pub fn contract(&self, address: Option<Address>, what: &str) -> Result<Address, OrchestratorError> {
        address.ok_or_else(|| {
            OrchestratorError::Configuration(format!("no {} contract configured on {}", what, self.name))
        })
    }
}

/// Shared state of the services. Built once at initialization.
pub struct ServiceContext {
    pub directory: ChainDirectory,
    pub origin: String,
    pub ledgers: HashMap<String, LedgerBinding>,
    pub pool: SequencerPool,
    pub duplicate_check: DuplicateCheckPolicy,
}

impl ServiceContext {
    /// The ledger named `name`, or the origin ledger when none is named.
    pub fn ledger(&self, name: Option<&str>) -> Result<&LedgerBinding, OrchestratorError> {
        let canonical = match name {
            Some(name) => self
                .directory
                .canonical_name(name)
                .ok_or_else(|| OrchestratorError::UnknownChain(name.to_string()))?,
            None => self.origin.as_str(),
        };

        self.ledgers.get(canonical).ok_or_else(|| {
            OrchestratorError::Configuration(format!("ledger {} is not configured", canonical))
        })
    }

    pub fn origin(&self) -> Result<&LedgerBinding, OrchestratorError> {
        self.ledger(None)
    }

    /// Executes a read call, mapping failures to `ReadFailed`.
    pub async fn read(
        &self,
        ledger: &LedgerBinding,
        contract: Address,
        data: Bytes,
    ) -> Result<Bytes, OrchestratorError> {
        ledger
            .client
            .read(contract, data)
            .await
            .map_err(|e| OrchestratorError::ReadFailed(format!("{}: {}", ledger.name, e)))
    }

    /// Estimates, sequences and confirms `call` on `ledger`.
    ///
    /// Reverted and unconfirmed outcomes come back as errors so callers can
    /// report them with `?`.
    pub async fn write(
        &self,
        ledger: &LedgerBinding,
        call: PendingCall,
    ) -> Result<TransactionOutcome, OrchestratorError> {
        let budget = FeeEstimator::estimate(ledger.client.as_ref(), &call).await?;
        debug!("Admitting {} to the {} sequencer", call.function, ledger.name);
        let sequencer = self.pool.for_ledger(&ledger.client).await;
        sequencer.submit(call, budget).await?.into_result()
    }
}
