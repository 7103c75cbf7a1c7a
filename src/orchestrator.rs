//! # Orchestrator
//!
//! Owns the ledger clients, the sequencers and the services, and exposes
//! the inbound request surface. It starts `Uninitialized`; every write or
//! read fails with [`OrchestratorError::NotReady`] until
//! [`Orchestrator::initialize`] has connected all configured ledgers.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use ethers::types::{Address, U256};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::config::OrchestratorConfig;
use crate::directory::ChainDirectory;
use crate::error::OrchestratorError;
use crate::evm::EvmLedger;
use crate::ledger::LedgerClient;
use crate::sequencer::SequencerPool;
use crate::services::{LedgerBinding, RegistrationService, ServiceContext, TokenService};
use crate::types::{ChainEntry, OutcomeKind, Response, TokenKind, TransactionOutcome};

/// A request from the routing layer, tagged by `op`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    Register {
        identifier: String,
        account: String,
        #[serde(default)]
        chain: Option<String>,
    },
    RegisterCrossChain {
        identifier: String,
        account: String,
        chains: Vec<String>,
    },
    Mint {
        kind: u64,
        account: String,
        #[serde(default)]
        chain: Option<String>,
    },
    MintCrossChain {
        kind: u64,
        account: String,
        amount: u64,
        chain: String,
    },
    BurnCrossChain {
        kind: u64,
        amount: u64,
        chain: String,
    },
    QueryTagCrossChain {
        identifier: String,
        chain: String,
    },
    OwnerOf {
        identifier: String,
        #[serde(default)]
        chain: Option<String>,
    },
    Balance {
        account: String,
        #[serde(default)]
        kind: Option<u64>,
        #[serde(default)]
        chain: Option<String>,
    },
    ListChains,
}

impl Request {
    pub fn op(&self) -> &'static str {
        match self {
            Request::Register { .. } => "register",
            Request::RegisterCrossChain { .. } => "register_cross_chain",
            Request::Mint { .. } => "mint",
            Request::MintCrossChain { .. } => "mint_cross_chain",
            Request::BurnCrossChain { .. } => "burn_cross_chain",
            Request::QueryTagCrossChain { .. } => "query_tag_cross_chain",
            Request::OwnerOf { .. } => "owner_of",
            Request::Balance { .. } => "balance",
            Request::ListChains => "list_chains",
        }
    }
}

struct Runtime {
    registration: RegistrationService,
    tokens: TokenService,
}

enum Lifecycle {
    Uninitialized,
    Ready(Arc<Runtime>),
}

pub struct Orchestrator {
    directory: ChainDirectory,
    state: RwLock<Lifecycle>,
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl Orchestrator {
    pub fn new() -> Self {
        Self {
            directory: ChainDirectory::default(),
            state: RwLock::new(Lifecycle::Uninitialized),
        }
    }

    /// Validates `config` and connects an [`EvmLedger`] per configured
    /// ledger. The orchestrator stays uninitialized if any ledger fails.
    #[instrument(skip(self, config), fields(origin = %config.origin))]
    pub async fn initialize(&self, config: OrchestratorConfig) -> Result<(), OrchestratorError> {
        config.validate(&self.directory)?;

        let mut clients: HashMap<String, Arc<dyn LedgerClient>> = HashMap::new();
        for ledger in &config.ledgers {
            let client = EvmLedger::connect(ledger.clone()).await.map_err(|e| {
                OrchestratorError::Configuration(format!("ledger {}: {}", ledger.name, e))
            })?;
            clients.insert(ledger.name.clone(), Arc::new(client));
        }

        self.initialize_with_clients(config, clients).await
    }

    /// Same as [`Orchestrator::initialize`] with already connected clients,
    /// keyed by configured ledger name.
    pub async fn initialize_with_clients(
        &self,
        config: OrchestratorConfig,
        mut clients: HashMap<String, Arc<dyn LedgerClient>>,
    ) -> Result<(), OrchestratorError> {
        config.validate(&self.directory)?;

        let mut ledgers = HashMap::with_capacity(config.ledgers.len());
        for ledger in &config.ledgers {
            let client = clients.remove(&ledger.name).ok_or_else(|| {
                OrchestratorError::Configuration(format!("no client for ledger {}", ledger.name))
            })?;
            if client.chain_id() != ledger.chain_id {
                return Err(OrchestratorError::Configuration(format!(
                    "ledger {}: client serves chain {}, configured {}",
                    ledger.name,
                    client.chain_id(),
                    ledger.chain_id
                )));
            }

            let endpoint = self.directory.resolve(&ledger.name)?;
            let name = self
                .directory
                .canonical_name(&ledger.name)
                .unwrap_or(ledger.name.as_str())
                .to_string();
            ledgers.insert(
                name.clone(),
                LedgerBinding {
                    name,
                    endpoint,
                    contracts: ledger.contracts.clone(),
                    client,
                },
            );
        }

        let origin = self
            .directory
            .canonical_name(&config.origin)
            .unwrap_or(config.origin.as_str())
            .to_string();
        let context = Arc::new(ServiceContext {
            directory: self.directory.clone(),
            origin,
            ledgers,
            pool: SequencerPool::new(config.queue_capacity, config.confirmation_timeout()),
            duplicate_check: config.duplicate_check,
        });
        let runtime = Runtime {
            registration: RegistrationService::new(context.clone()),
            tokens: TokenService::new(context),
        };

        let mut state = self.state.write().await;
        if let Lifecycle::Ready(_) = *state {
            return Err(OrchestratorError::Configuration("already initialized".to_string()));
        }
        *state = Lifecycle::Ready(Arc::new(runtime));

        info!("Orchestrator ready with {} ledgers", config.ledgers.len());
        Ok(())
    }

    pub async fn is_ready(&self) -> bool {
        matches!(*self.state.read().await, Lifecycle::Ready(_))
    }

    async fn runtime(&self) -> Result<Arc<Runtime>, OrchestratorError> {
        match &*self.state.read().await {
            Lifecycle::Ready(runtime) => Ok(runtime.clone()),
            Lifecycle::Uninitialized => Err(OrchestratorError::NotReady),
        }
    }

    pub async fn register(
        &self,
        identifier: &str,
        account: &str,
        chain: Option<&str>,
    ) -> Result<TransactionOutcome, OrchestratorError> {
        let runtime = self.runtime().await?;
        runtime.registration.register(identifier, account, chain).await
    }

    pub async fn register_cross_chain<S: AsRef<str>>(
        &self,
        identifier: &str,
        account: &str,
        chains: &[S],
    ) -> Result<TransactionOutcome, OrchestratorError> {
        let runtime = self.runtime().await?;
        runtime
            .registration
            .register_cross_chain(identifier, account, chains)
            .await
    }

    pub async fn query_tag_cross_chain(
        &self,
        identifier: &str,
        chain: &str,
    ) -> Result<TransactionOutcome, OrchestratorError> {
        let runtime = self.runtime().await?;
        runtime.registration.query_tag_cross_chain(identifier, chain).await
    }

    pub async fn owner_of(
        &self,
        identifier: &str,
        chain: Option<&str>,
    ) -> Result<Option<Address>, OrchestratorError> {
        let runtime = self.runtime().await?;
        runtime.registration.owner_of(identifier, chain).await
    }

    pub async fn mint(
        &self,
        kind: TokenKind,
        account: &str,
        chain: Option<&str>,
    ) -> Result<TransactionOutcome, OrchestratorError> {
        let runtime = self.runtime().await?;
        runtime.tokens.mint(kind, account, chain).await
    }

    pub async fn mint_cross_chain(
        &self,
        kind: TokenKind,
        account: &str,
        amount: u64,
        chain: &str,
    ) -> Result<TransactionOutcome, OrchestratorError> {
        let runtime = self.runtime().await?;
        runtime.tokens.mint_cross_chain(kind, account, amount, chain).await
    }

    pub async fn burn_cross_chain(
        &self,
        kind: TokenKind,
        amount: u64,
        chain: &str,
    ) -> Result<TransactionOutcome, OrchestratorError> {
        let runtime = self.runtime().await?;
        runtime.tokens.burn_cross_chain(kind, amount, chain).await
    }

    pub async fn balance(
        &self,
        account: &str,
        kind: TokenKind,
        chain: Option<&str>,
    ) -> Result<U256, OrchestratorError> {
        let runtime = self.runtime().await?;
        runtime.tokens.balance(account, kind, chain).await
    }

    pub async fn balances(
        &self,
        account: &str,
        chain: Option<&str>,
    ) -> Result<BTreeMap<TokenKind, U256>, OrchestratorError> {
        let runtime = self.runtime().await?;
        runtime.tokens.balances(account, chain).await
    }

    /// The chain directory. Static, so available before initialization.
    pub fn list_chains(&self) -> Vec<ChainEntry> {
        self.directory.list()
    }

    /// Executes one request and shapes the result for the routing layer.
    #[instrument(skip(self, request), fields(request_id = %Uuid::new_v4(), op = request.op()))]
    pub async fn handle(&self, request: Request) -> Response {
        let response = match request {
            Request::Register { identifier, account, chain } => {
                let result = self.register(&identifier, &account, chain.as_deref()).await;
                Response::from_write(OutcomeKind::Registered, &result)
            }
            Request::RegisterCrossChain { identifier, account, chains } => {
                let result = self.register_cross_chain(&identifier, &account, chains.as_slice()).await;
                Response::from_write(OutcomeKind::Registered, &result)
            }
            Request::Mint { kind, account, chain } => {
                let result = match TokenKind::try_from(kind) {
                    Ok(kind) => self.mint(kind, &account, chain.as_deref()).await,
                    Err(e) => Err(e),
                };
                Response::from_write(OutcomeKind::Confirmed, &result)
            }
            Request::MintCrossChain { kind, account, amount, chain } => {
                let result = match TokenKind::try_from(kind) {
                    Ok(kind) => self.mint_cross_chain(kind, &account, amount, &chain).await,
                    Err(e) => Err(e),
                };
                Response::from_write(OutcomeKind::Confirmed, &result)
            }
            Request::BurnCrossChain { kind, amount, chain } => {
                let result = match TokenKind::try_from(kind) {
                    Ok(kind) => self.burn_cross_chain(kind, amount, &chain).await,
                    Err(e) => Err(e),
                };
                Response::from_write(OutcomeKind::Confirmed, &result)
            }
            Request::QueryTagCrossChain { identifier, chain } => {
                let result = self.query_tag_cross_chain(&identifier, &chain).await;
                Response::from_write(OutcomeKind::Confirmed, &result)
            }
            Request::OwnerOf { identifier, chain } => {
                match self.owner_of(&identifier, chain.as_deref()).await {
                    Ok(owner) => Response::owner(owner),
                    Err(e) => Response::from_error(&e),
                }
            }
            Request::Balance { account, kind, chain } => {
                match self.balance_request(&account, kind, chain.as_deref()).await {
                    Ok(balances) => Response::balances(balances),
                    Err(e) => Response::from_error(&e),
                }
            }
            Request::ListChains => Response::chains(self.list_chains()),
        };

        if response.accepted {
            info!("Request completed as {:?}", response.outcome_kind);
        } else {
            warn!(
                "Request rejected as {:?}: {}",
                response.outcome_kind,
                response.reason.as_deref().unwrap_or("")
            );
        }
        response
    }

    async fn balance_request(
        &self,
        account: &str,
        kind: Option<u64>,
        chain: Option<&str>,
    ) -> Result<BTreeMap<TokenKind, U256>, OrchestratorError> {
        match kind {
            Some(kind) => {
                let kind = TokenKind::try_from(kind)?;
                let count = self.balance(account, kind, chain).await?;
                Ok(BTreeMap::from([(kind, count)]))
            }
            None => self.balances(account, chain).await,
        }
    }
}
