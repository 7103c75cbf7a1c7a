//! # Registration service
//!
//! Binds an identifier to an owner account, once. A request moves through
//! validation, a duplicate check against the ledger, estimation,
//! sequencing and confirmation. Nothing is written unless every earlier
//! stage passed, and ownership is never cached: each attempt reads the
//! ledger again.

use std::sync::Arc;

use ethers::types::{Address, Bytes};
use futures::future::try_join_all;
use tracing::{debug, info, instrument};

use crate::abi::{decode_address, ContractCall};
use crate::config::DuplicateCheckPolicy;
use crate::error::OrchestratorError;
use crate::normalizer::normalize;
use crate::services::{LedgerBinding, ServiceContext};
use crate::types::{
    parse_account, DestinationRef, EstimationPolicy, Identifier, PendingCall, TransactionOutcome,
};

pub struct RegistrationService {
    context: Arc<ServiceContext>,
}

impl RegistrationService {
    pub fn new(context: Arc<ServiceContext>) -> Self {
        Self { context }
    }

    /// Registers `identifier` to `account` on one ledger (the origin when
    /// `chain` is None).
    #[instrument(skip(self), fields(identifier = %raw_identifier))]
    pub async fn register(
        &self,
        raw_identifier: &str,
        raw_account: &str,
        chain: Option<&str>,
    ) -> Result<TransactionOutcome, OrchestratorError> {
        let tag = normalize(raw_identifier)?;
        let wallet = parse_account(raw_account)?;
        let ledger = self.context.ledger(chain)?;
        let registry = ledger.contract(ledger.contracts.attendee_registry, "attendee registry")?;

        let lookup = ContractCall::WalletOf { tag };
        let output = self.context.read(ledger, registry, lookup.encode()).await?;
        ensure_unowned(&tag, decode_owner(&output)?)?;

        let call = ContractCall::RegisterTag { tag, wallet };
        let pending = PendingCall::local(registry, call.signature(), call.encode());
        let outcome = self.context.write(ledger, pending).await?;

        info!("Registered {} to {:?} on {}", tag, wallet, ledger.name);
        Ok(outcome)
    }

    /// Current owner of `identifier` on one ledger, None when unregistered.
    pub async fn owner_of(
        &self,
        raw_identifier: &str,
        chain: Option<&str>,
    ) -> Result<Option<Address>, OrchestratorError> {
        let tag = normalize(raw_identifier)?;
        let ledger = self.context.ledger(chain)?;
        let registry = ledger.contract(ledger.contracts.attendee_registry, "attendee registry")?;

        let lookup = ContractCall::WalletOf { tag };
        let output = self.context.read(ledger, registry, lookup.encode()).await?;
        let owner = decode_owner(&output)?;
        Ok((!owner.is_zero()).then_some(owner))
    }

    /// Registers `identifier` to `account` on the origin and every named
    /// chain with one fan-out call.
    ///
    /// All names are resolved before any ledger I/O. One unknown name fails
    /// the whole request and nothing is sent.
    #[instrument(skip(self, chains), fields(identifier = %raw_identifier, destinations = chains.len()))]
    pub async fn register_cross_chain<S: AsRef<str>>(
        &self,
        raw_identifier: &str,
        raw_account: &str,
        chains: &[S],
    ) -> Result<TransactionOutcome, OrchestratorError> {
        let tag = normalize(raw_identifier)?;
        let wallet = parse_account(raw_account)?;
        if chains.is_empty() {
            return Err(OrchestratorError::InvalidInput(
                "at least one destination chain is required".to_string(),
            ));
        }
        let destinations = self.context.directory.resolve_all(chains)?;

        let origin = self.context.origin()?;
        let registry = origin.contract(origin.contracts.omnichain_registry, "omnichain registry")?;

        self.check_cross_chain_owners(origin, registry, &tag, &destinations).await?;

        let call = ContractCall::RegisterTagCrossChain {
            destinations: destinations.clone(),
            tag,
            wallet,
            options: Bytes::default(),
        };
        let policy = EstimationPolicy::FanOut {
            destinations: destinations.len(),
        };
        let pending = PendingCall::cross_chain(registry, call.signature(), call.encode(), policy);
        let outcome = self.context.write(origin, pending).await?;

        info!(
            "Registered {} to {:?} across {} destinations from {}",
            tag,
            wallet,
            destinations.len(),
            origin.name
        );
        Ok(outcome)
    }

    /// Sends a cross-chain ownership query for `identifier` to `chain`.
    #[instrument(skip(self), fields(identifier = %raw_identifier))]
    pub async fn query_tag_cross_chain(
        &self,
        raw_identifier: &str,
        chain: &str,
    ) -> Result<TransactionOutcome, OrchestratorError> {
        let tag = normalize(raw_identifier)?;
        let destination = self.context.directory.resolve(chain)?;

        let origin = self.context.origin()?;
        let registry = origin.contract(origin.contracts.omnichain_registry, "omnichain registry")?;

        let call = ContractCall::QueryTagCrossChain {
            destination,
            tag,
            options: Bytes::default(),
        };
        let pending = PendingCall::cross_chain(
            registry,
            call.signature(),
            call.encode(),
            EstimationPolicy::Single,
        );
        self.context.write(origin, pending).await
    }

    /// Reads the origin registry's record for the origin endpoint, and for
    /// every destination when configured to.
    async fn check_cross_chain_owners(
        &self,
        origin: &LedgerBinding,
        registry: Address,
        tag: &Identifier,
        destinations: &[DestinationRef],
    ) -> Result<(), OrchestratorError> {
        let mut endpoints = vec![origin.endpoint];
        if self.context.duplicate_check == DuplicateCheckPolicy::AllDestinations {
            endpoints.extend(destinations.iter().filter(|d| **d != origin.endpoint));
        }
        debug!("Duplicate check of {} on {} endpoints", tag, endpoints.len());

        let reads = endpoints.iter().map(|endpoint| {
            let lookup = ContractCall::GetWalletOfTag {
                tag: *tag,
                endpoint: *endpoint,
            };
            async move {
                let output = self.context.read(origin, registry, lookup.encode()).await?;
                decode_owner(&output)
            }
        });

        for owner in try_join_all(reads).await? {
            ensure_unowned(tag, owner)?;
        }
        Ok(())
    }
}

fn decode_owner(output: &[u8]) -> Result<Address, OrchestratorError> {
    decode_address(output).map_err(|e| OrchestratorError::ReadFailed(e.to_string()))
}

fn ensure_unowned(tag: &Identifier, owner: Address) -> Result<(), OrchestratorError> {
    if owner.is_zero() {
        return Ok(());
    }
    Err(OrchestratorError::AlreadyRegistered {
        identifier: tag.to_string(),
        owner: format!("{:?}", owner),
    })
}
