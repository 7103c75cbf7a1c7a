//! TapPass cross-chain write orchestrator
//!
//! Registers tag identifiers to owner accounts and issues event tokens on
//! one or several EVM ledgers. Writes are fee-provisioned, strictly
//! sequenced per signing account and ledger, and confirmed before they are
//! reported. Cross-chain calls go out through LayerZero endpoint ids.

pub mod abi;
pub mod config;
pub mod directory;
pub mod error;
pub mod evm;
pub mod fees;
pub mod ledger;
pub mod normalizer;
pub mod orchestrator;
pub mod sequencer;
pub mod services;
pub mod submitter;
pub mod telemetry;
pub mod types;
pub mod utils;

#[cfg(test)]
pub(crate) mod mock;

pub use config::{DuplicateCheckPolicy, LedgerConfig, OrchestratorConfig};
pub use directory::ChainDirectory;
pub use error::OrchestratorError;
pub use ledger::{LedgerClient, LedgerError};
pub use orchestrator::{Orchestrator, Request};
pub use types::{Identifier, OutcomeKind, Response, TokenKind, TransactionOutcome};

pub type Result<T> = std::result::Result<T, OrchestratorError>;
