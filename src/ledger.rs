// Outbound ledger interface

use async_trait::async_trait;
use ethers::types::{Address, Bytes, Log, TxHash, U256, U64};

use crate::types::{PendingCall, ResourceBudget};

/// Errors raised by a ledger client.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Transport failure
    #[error("Network error: {0}")]
    Network(String),

    /// The node answered with a JSON-RPC error
    #[error("RPC error: {0}")]
    Rpc(String),

    /// Signing the transaction failed
    #[error("Signing error: {0}")]
    Signing(String),

    /// Response could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Other: {0}")]
    Other(String),
}

/// What a finalized transaction looked like on the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalityReport {
    pub tx_hash: TxHash,
    pub block_number: Option<U64>,
    pub success: bool,
    /// Revert reason, when the ledger could provide one
    pub revert_reason: Option<String>,
    pub logs: Vec<Log>,
}

/// Connection to one ledger with one signing account.
///
/// Implementations must be cheap to share behind an `Arc`; the orchestrator
/// creates exactly one per configured ledger at startup.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Chain id of the ledger. Nonce spaces are per chain id.
    fn chain_id(&self) -> u64;

    /// Address of the signing account.
    fn signer(&self) -> Address;

    /// Executes a read-only call and returns the raw output.
    async fn read(&self, contract: Address, data: Bytes) -> Result<Bytes, LedgerError>;

    /// Estimates the resource cost of `call` when sent by `sender`.
    async fn estimate(&self, call: &PendingCall, sender: Address) -> Result<U256, LedgerError>;

    /// Next nonce the ledger expects from `account`, counting pending
    /// transactions.
    async fn pending_nonce(&self, account: Address) -> Result<U256, LedgerError>;

    /// Signs and broadcasts `call` with an explicit nonce. Returns as soon as
    /// the ledger accepted it, without waiting for inclusion.
    async fn send(
        &self,
        call: &PendingCall,
        budget: &ResourceBudget,
        nonce: U256,
    ) -> Result<TxHash, LedgerError>;

    /// Blocks until `tx_hash` is final. Unbounded; callers apply a timeout.
    async fn await_finality(&self, tx_hash: TxHash) -> Result<FinalityReport, LedgerError>;
}
