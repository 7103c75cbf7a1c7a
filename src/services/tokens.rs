// Token issuance on the event pass contracts.

use std::collections::BTreeMap;
use std::sync::Arc;

use ethers::types::{Bytes, U256};
use tracing::{info, instrument};

use crate::abi::{decode_uint, decode_uint_array, ContractCall};
use crate::error::OrchestratorError;
use crate::services::ServiceContext;
use crate::types::{parse_account, EstimationPolicy, PendingCall, TokenKind, TransactionOutcome};

/// Mint, burn and balance operations for the three token kinds.
///
/// Mints are additive and never checked for duplicates.
pub struct TokenService {
    context: Arc<ServiceContext>,
}

impl TokenService {
    pub fn new(context: Arc<ServiceContext>) -> Self {
        Self { context }
    }

    #[instrument(skip(self))]
    pub async fn mint(
        &self,
        kind: TokenKind,
        raw_account: &str,
        chain: Option<&str>,
    ) -> Result<TransactionOutcome, OrchestratorError> {
        let to = parse_account(raw_account)?;
        let ledger = self.context.ledger(chain)?;
        let event_pass = ledger.contract(ledger.contracts.event_pass, "event pass")?;

        let call = ContractCall::Mint { kind, to };
        let pending = PendingCall::local(event_pass, call.signature(), call.encode());
        let outcome = self.context.write(ledger, pending).await?;

        info!("Minted one {} to {:?} on {}", kind, to, ledger.name);
        Ok(outcome)
    }

    pub async fn balance(
        &self,
        raw_account: &str,
        kind: TokenKind,
        chain: Option<&str>,
    ) -> Result<U256, OrchestratorError> {
        let account = parse_account(raw_account)?;
        let ledger = self.context.ledger(chain)?;
        let event_pass = ledger.contract(ledger.contracts.event_pass, "event pass")?;

        let call = ContractCall::BalanceOf { account, kind };
        let output = self.context.read(ledger, event_pass, call.encode()).await?;
        decode_uint(&output).map_err(|e| OrchestratorError::ReadFailed(e.to_string()))
    }

    /// Balances of every kind, in one batch read.
    pub async fn balances(
        &self,
        raw_account: &str,
        chain: Option<&str>,
    ) -> Result<BTreeMap<TokenKind, U256>, OrchestratorError> {
        let account = parse_account(raw_account)?;
        let ledger = self.context.ledger(chain)?;
        let event_pass = ledger.contract(ledger.contracts.event_pass, "event pass")?;

        let call = ContractCall::BalanceOfBatch {
            account,
            kinds: TokenKind::ALL.to_vec(),
        };
        let output = self.context.read(ledger, event_pass, call.encode()).await?;
        let counts =
            decode_uint_array(&output).map_err(|e| OrchestratorError::ReadFailed(e.to_string()))?;
        if counts.len() != TokenKind::ALL.len() {
            return Err(OrchestratorError::ReadFailed(format!(
                "expected {} balances, got {}",
                TokenKind::ALL.len(),
                counts.len()
            )));
        }

        Ok(TokenKind::ALL.into_iter().zip(counts).collect())
    }

    /// Mints `amount` of `kind` to `account` on `chain` through the origin.
    #[instrument(skip(self))]
    pub async fn mint_cross_chain(
        &self,
        kind: TokenKind,
        raw_account: &str,
        amount: u64,
        chain: &str,
    ) -> Result<TransactionOutcome, OrchestratorError> {
        let to = parse_account(raw_account)?;
        let amount = positive(amount)?;
        let destination = self.context.directory.resolve(chain)?;

        let origin = self.context.origin()?;
        let event_pass =
            origin.contract(origin.contracts.omnichain_event_pass, "omnichain event pass")?;

        let call = ContractCall::CrossChainMint {
            destination,
            to,
            kind,
            amount,
            options: Bytes::default(),
        };
        let pending = PendingCall::cross_chain(
            event_pass,
            call.signature(),
            call.encode(),
            EstimationPolicy::Single,
        );
        let outcome = self.context.write(origin, pending).await?;

        info!("Sent mint of {} {} to {:?} on {}", amount, kind, to, destination);
        Ok(outcome)
    }

    /// Burns `amount` of `kind` on the origin and messages `chain`.
    #[instrument(skip(self))]
    pub async fn burn_cross_chain(
        &self,
        kind: TokenKind,
        amount: u64,
        chain: &str,
    ) -> Result<TransactionOutcome, OrchestratorError> {
        let amount = positive(amount)?;
        let destination = self.context.directory.resolve(chain)?;

        let origin = self.context.origin()?;
        let event_pass =
            origin.contract(origin.contracts.omnichain_event_pass, "omnichain event pass")?;

        let call = ContractCall::CrossChainBurn {
            destination,
            kind,
            amount,
            options: Bytes::default(),
        };
        let pending = PendingCall::cross_chain(
            event_pass,
            call.signature(),
            call.encode(),
            EstimationPolicy::Single,
        );
        self.context.write(origin, pending).await
    }
}

fn positive(amount: u64) -> Result<U256, OrchestratorError> {
    if amount == 0 {
        return Err(OrchestratorError::InvalidInput("amount must be positive".to_string()));
    }
    Ok(U256::from(amount))
}
