use crate::ledger::LedgerError;
use ethers::providers::ProviderError;
use ethers::signers::WalletError;

/// Failures surfaced by the orchestrator to its callers.
///
/// Each variant maps onto exactly one response `outcome_kind`, see
/// [`crate::types::OutcomeKind::from_error`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum OrchestratorError {
    /// Malformed identifier, account or token kind. No ledger I/O was performed.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A logical chain name did not resolve in the chain directory.
    #[error("Unknown chain: {0}")]
    UnknownChain(String),

    /// The identifier already has an owner on the ledger.
    #[error("Identifier {identifier} already registered to {owner}")]
    AlreadyRegistered { identifier: String, owner: String },

    /// The ledger could not estimate the call. Nothing was signed.
    #[error("Fee estimation failed: {0}")]
    EstimationFailed(String),

    /// A read call (ownership or balance lookup) failed.
    #[error("Ledger read failed: {0}")]
    ReadFailed(String),

    /// Signing or broadcasting failed. The nonce may or may not be consumed.
    #[error("Submission failed: {0}")]
    SubmissionFailed(String),

    /// The transaction finalized but the contract rejected it.
    #[error("Transaction {tx_hash} reverted: {}", reason.as_deref().unwrap_or("no reason given"))]
    LedgerReverted { tx_hash: String, reason: Option<String> },

    /// Finality was not observed within the confirmation budget. The
    /// transaction may still finalize; callers re-query with `tx_hash`.
    #[error("Confirmation of {tx_hash} not observed: {detail}")]
    ConfirmationTimeout { tx_hash: String, detail: String },

    /// An operation was attempted before the orchestrator was initialized.
    #[error("Orchestrator not ready")]
    NotReady,

    /// Configuration or wiring error
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl From<ProviderError> for LedgerError {
    fn from(error: ProviderError) -> Self {
        match error {
            ProviderError::JsonRpcClientError(e) => LedgerError::Rpc(e.to_string()),
            ProviderError::HTTPError(e) => LedgerError::Network(e.to_string()),
            ProviderError::SerdeJson(e) => LedgerError::Decode(e.to_string()),
            ProviderError::HexError(e) => LedgerError::Decode(format!("Hex error: {}", e)),
            _ => LedgerError::Other(format!("Provider error: {:?}", error)),
        }
    }
}

impl From<WalletError> for LedgerError {
    fn from(error: WalletError) -> Self {
        LedgerError::Signing(error.to_string())
    }
}

impl From<ethers::abi::Error> for LedgerError {
    fn from(error: ethers::abi::Error) -> Self {
        LedgerError::Decode(error.to_string())
    }
}
