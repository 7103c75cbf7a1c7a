//! # EvmLedger: ledger client for EVM chains
//!
//! Transactions are built as legacy transactions with an explicit nonce
//! handed down by the sequencer, signed locally with the configured wallet
//! and broadcast raw. Nothing here keeps nonce state of its own.

use async_trait::async_trait;
use ethers::prelude::*;
use ethers::types::transaction::eip2718::TypedTransaction;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};

use crate::config::LedgerConfig;
use crate::evm::clients::RpcClient;
use crate::evm::revert::reason_from_provider_error;
use crate::evm::types::GWEI;
use crate::ledger::{FinalityReport, LedgerClient, LedgerError};
use crate::types::{PendingCall, ResourceBudget};

/// Ledger client for one EVM chain and one signing account.
pub struct EvmLedger {
    /// RPC client for reads and broadcasts
    client: RpcClient,

    /// Local signer. Key custody is the embedder's concern
    wallet: LocalWallet,

    /// Network configuration
    config: LedgerConfig,
}

impl EvmLedger {
    /// Connects using the signing key found in `config.signer_key_env`.
    ///
    /// # Arguments
    ///
    /// * `config` - Ledger configuration
    ///
    /// # Returns
    ///
    /// * `Result<Self, LedgerError>` - Connected client, after a health check
    #[instrument(skip(config), fields(ledger = %config.name, chain_id = config.chain_id))]
    pub async fn connect(config: LedgerConfig) -> Result<Self, LedgerError> {
        let key = std::env::var(&config.signer_key_env).map_err(|_| {
            LedgerError::Configuration(format!(
                "signing key variable {} is not set",
                config.signer_key_env
            ))
        })?;
        let wallet = key.trim().parse::<LocalWallet>()?;
        Self::with_wallet(config, wallet).await
    }

    /// Connects with an explicit wallet.
    pub async fn with_wallet(config: LedgerConfig, wallet: LocalWallet) -> Result<Self, LedgerError> {
        info!("Initializing EVM ledger {} (chain {})", config.name, config.chain_id);

        let client = RpcClient::new(&config.rpc_url, config.rpc_timeout())?;
        let wallet = wallet.with_chain_id(config.chain_id);

        let ledger = Self { client, wallet, config };
        ledger.health_check().await?;

        info!(
            "EVM ledger {} ready, signer {:?}",
            ledger.config.name,
            ledger.wallet.address()
        );
        Ok(ledger)
    }

    /// Verifies the endpoint serves the configured chain and looks at the
    /// signer's balance.
    async fn health_check(&self) -> Result<(), LedgerError> {
        debug!("Performing health check for chain {}", self.config.chain_id);
        let provider = self.client.provider();

        let chain_id = self
            .client
            .idempotent("eth_chainId", || provider.get_chainid())
            .await?;
        if chain_id.as_u64() != self.config.chain_id {
            return Err(LedgerError::Configuration(format!(
                "Chain ID mismatch: expected {}, got {}",
                self.config.chain_id,
                chain_id.as_u64()
            )));
        }

        self.client
            .idempotent("eth_blockNumber", || provider.get_block_number())
            .await?;

        let signer = self.wallet.address();
        let balance = self
            .client
            .idempotent("eth_getBalance", || provider.get_balance(signer, None))
            .await?;
        if balance.is_zero() {
            warn!("Signer account has zero balance: {:?}", signer);
        }

        Ok(())
    }

    /// Current gas price, clamped to the configured ceiling.
    async fn safe_gas_price(&self) -> Result<U256, LedgerError> {
        let provider = self.client.provider();
        let quoted = self
            .client
            .idempotent("eth_gasPrice", || provider.get_gas_price())
            .await?;

        if let Some(max_gwei) = self.config.max_gas_price_gwei {
            let max_wei = U256::from(max_gwei) * U256::from(GWEI);
            if quoted > max_wei {
                warn!(
                    "Gas price {} gwei exceeds ceiling {} gwei, using ceiling",
                    quoted / U256::from(GWEI),
                    max_gwei
                );
                return Ok(max_wei);
            }
        }

        Ok(quoted)
    }

    /// Replays a reverted transaction at its inclusion block to recover the
    /// reason. Returns None when the node does not tell.
    async fn revert_reason(&self, tx_hash: TxHash, block: Option<U64>) -> Option<String> {
        let provider = self.client.provider();
        let original = match self
            .client
            .idempotent("eth_getTransactionByHash", || provider.get_transaction(tx_hash))
            .await
        {
            Ok(Some(tx)) => tx,
            Ok(None) => return None,
            Err(e) => {
                warn!("Could not fetch reverted transaction {:?}: {}", tx_hash, e);
                return None;
            }
        };

        let mut replay = TransactionRequest::new()
            .from(original.from)
            .data(original.input)
            .value(original.value)
            .gas(original.gas);
        if let Some(to) = original.to {
            replay = replay.to(to);
        }
        let replay: TypedTransaction = replay.into();
        let at = block.map(|b| BlockId::Number(BlockNumber::Number(b)));

        match provider.call(&replay, at).await {
            Ok(_) => None,
            Err(e) => reason_from_provider_error(&e),
        }
    }

    /// Waits until `block` has the configured number of confirmations.
    async fn wait_for_confirmations(&self, block: U64) -> Result<(), LedgerError> {
        let provider = self.client.provider();
        let target = block + U64::from(self.config.confirmations().saturating_sub(1));

        loop {
            let current = self
                .client
                .idempotent("eth_blockNumber", || provider.get_block_number())
                .await?;
            if current >= target {
                return Ok(());
            }
            debug!("Waiting for finality: current={}, target={}", current, target);
            sleep(self.config.poll_interval()).await;
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }
}

#[async_trait]
impl LedgerClient for EvmLedger {
    fn chain_id(&self) -> u64 {
        self.config.chain_id
    }

    fn signer(&self) -> Address {
        self.wallet.address()
    }

    #[instrument(skip(self, data), fields(chain_id = self.config.chain_id))]
    async fn read(&self, contract: Address, data: Bytes) -> Result<Bytes, LedgerError> {
        let provider = self.client.provider();
        let tx: TypedTransaction = TransactionRequest::new().to(contract).data(data).into();
        self.client.idempotent("eth_call", || provider.call(&tx, None)).await
    }

    #[instrument(skip(self, call), fields(chain_id = self.config.chain_id, function = call.function))]
    async fn estimate(&self, call: &PendingCall, sender: Address) -> Result<U256, LedgerError> {
        let provider = self.client.provider();
        let tx: TypedTransaction = TransactionRequest::new()
            .from(sender)
            .to(call.contract)
            .data(call.data.clone())
            .value(call.value)
            .into();

        // single shot: a failed estimate is reported, never guessed
        self.client
            .once("eth_estimateGas", provider.estimate_gas(&tx, None))
            .await
    }

    async fn pending_nonce(&self, account: Address) -> Result<U256, LedgerError> {
        let provider = self.client.provider();
        self.client
            .idempotent("eth_getTransactionCount", || {
                provider.get_transaction_count(account, Some(BlockNumber::Pending.into()))
            })
            .await
    }

    #[instrument(skip(self, call, budget), fields(chain_id = self.config.chain_id, function = call.function, %nonce))]
    async fn send(
        &self,
        call: &PendingCall,
        budget: &ResourceBudget,
        nonce: U256,
    ) -> Result<TxHash, LedgerError> {
        let gas_price = self.safe_gas_price().await?;

        let tx: TypedTransaction = TransactionRequest::new()
            .from(self.wallet.address())
            .to(call.contract)
            .data(call.data.clone())
            .value(call.attached_value(budget))
            .gas(budget.provisioned)
            .gas_price(gas_price)
            .nonce(nonce)
            .chain_id(self.config.chain_id)
            .into();

        let signature = self.wallet.sign_transaction(&tx).await?;
        let raw = tx.rlp_signed(&signature);

        let provider = self.client.provider();
        let pending = self
            .client
            .once("eth_sendRawTransaction", provider.send_raw_transaction(raw))
            .await?;
        let tx_hash = pending.tx_hash();

        info!("Broadcast {} as {:?} (nonce {})", call.function, tx_hash, nonce);
        Ok(tx_hash)
    }

    #[instrument(skip(self), fields(chain_id = self.config.chain_id, tx_hash = ?tx_hash))]
    async fn await_finality(&self, tx_hash: TxHash) -> Result<FinalityReport, LedgerError> {
        let provider = self.client.provider();

        let receipt = loop {
            let receipt = self
                .client
                .idempotent("eth_getTransactionReceipt", || {
                    provider.get_transaction_receipt(tx_hash)
                })
                .await?;
            match receipt {
                Some(receipt) => break receipt,
                None => sleep(self.config.poll_interval()).await,
            }
        };

        if let Some(block) = receipt.block_number {
            self.wait_for_confirmations(block).await?;
        }

        let success = receipt.status == Some(U64::from(1));
        let revert_reason = if success {
            None
        } else {
            self.revert_reason(tx_hash, receipt.block_number).await
        };

        debug!(
            "Transaction {:?} final in block {:?}, success={}",
            tx_hash, receipt.block_number, success
        );

        Ok(FinalityReport {
            tx_hash,
            block_number: receipt.block_number,
            success,
            revert_reason,
            logs: receipt.logs,
        })
    }
}
