use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use ethers::types::Address;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::directory::ChainDirectory;
use crate::error::OrchestratorError;

/// Default number of block confirmations before a receipt counts as final
pub const DEFAULT_CONFIRMATIONS: u64 = 1;

/// Default timeout for a single RPC request
pub const DEFAULT_RPC_TIMEOUT_SECS: u64 = 30;

/// Default receipt polling interval
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2_000;

/// Default confirmation budget per call, distinct from any request timeout
pub const DEFAULT_CONFIRMATION_TIMEOUT_SECS: u64 = 180;

/// Default depth of each per-account sequencer queue
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Which ledgers a cross-chain registration reads before spending fees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateCheckPolicy {
    /// Only the origin ledger's record is checked.
    #[default]
    OriginOnly,
    /// The origin and every destination record are checked, in parallel.
    AllDestinations,
}

/// Deployed contract addresses on one ledger. Absent contracts make the
/// operations that need them fail with a configuration error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractAddresses {
    pub attendee_registry: Option<Address>,
    pub event_pass: Option<Address>,
    pub omnichain_registry: Option<Address>,
    pub omnichain_event_pass: Option<Address>,
}

/// One ledger the orchestrator writes to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Chain directory name of the ledger
    pub name: String,
    /// RPC endpoint URL
    pub rpc_url: String,
    /// EVM chain id
    pub chain_id: u64,
    /// Environment variable holding the hex-encoded signing key
    pub signer_key_env: String,
    #[serde(default)]
    pub contracts: ContractAddresses,
    /// Blocks to wait after inclusion
    pub confirmations: Option<u64>,
    /// Gas price ceiling in gwei (None for whatever the node quotes)
    pub max_gas_price_gwei: Option<u64>,
    pub rpc_timeout_secs: Option<u64>,
    pub poll_interval_ms: Option<u64>,
}

impl LedgerConfig {
    pub fn confirmations(&self) -> u64 {
        self.confirmations.unwrap_or(DEFAULT_CONFIRMATIONS)
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc_timeout_secs.unwrap_or(DEFAULT_RPC_TIMEOUT_SECS))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.unwrap_or(DEFAULT_POLL_INTERVAL_MS))
    }

    /// Ethereum Sepolia with testnet-friendly defaults
    pub fn sepolia(rpc_url: String, signer_key_env: String, contracts: ContractAddresses) -> Self {
        LedgerConfigBuilder::new("sepolia".to_string(), rpc_url, 11_155_111, signer_key_env)
            .contracts(contracts)
            .confirmations(2)
            .max_gas_price_gwei(200)
            .build()
    }

    /// Arbitrum Sepolia. L2 blocks are fast and final after one confirmation
    pub fn arbitrum_sepolia(
        rpc_url: String,
        signer_key_env: String,
        contracts: ContractAddresses,
    ) -> Self {
        LedgerConfigBuilder::new("arbitrumSepolia".to_string(), rpc_url, 421_614, signer_key_env)
            .contracts(contracts)
            .confirmations(1)
            .poll_interval(Duration::from_millis(500))
            .build()
    }

    /// Local development node (hardhat / anvil)
    pub fn development(name: String, rpc_url: String, signer_key_env: String) -> Self {
        LedgerConfigBuilder::new(name, rpc_url, 31337, signer_key_env)
            .confirmations(1)
            .rpc_timeout_secs(5)
            .poll_interval(Duration::from_millis(200))
            .build()
    }

    fn validate(&self) -> Result<(), OrchestratorError> {
        if !self.rpc_url.starts_with("http://") && !self.rpc_url.starts_with("https://") {
            return Err(OrchestratorError::Configuration(format!(
                "ledger {}: RPC URL must start with http:// or https://",
                self.name
            )));
        }

        if self.chain_id == 0 {
            return Err(OrchestratorError::Configuration(format!(
                "ledger {}: chain id cannot be zero",
                self.name
            )));
        }

        if self.signer_key_env.trim().is_empty() {
            return Err(OrchestratorError::Configuration(format!(
                "ledger {}: signer_key_env is required",
                self.name
            )));
        }

        if let Some(max_gas_price) = self.max_gas_price_gwei {
            if max_gas_price == 0 {
                return Err(OrchestratorError::Configuration(format!(
                    "ledger {}: maximum gas price cannot be zero",
                    self.name
                )));
            }
            if max_gas_price > 10_000 {
                warn!("Maximum gas price for {} is set very high: {} gwei", self.name, max_gas_price);
            }
        }

        if self.rpc_timeout_secs == Some(0) || self.poll_interval_ms == Some(0) {
            return Err(OrchestratorError::Configuration(format!(
                "ledger {}: timeouts and intervals must be non-zero",
                self.name
            )));
        }

        Ok(())
    }
}

/// Builder pattern for LedgerConfig
pub struct LedgerConfigBuilder {
    config: LedgerConfig,
}

impl LedgerConfigBuilder {
    pub fn new(name: String, rpc_url: String, chain_id: u64, signer_key_env: String) -> Self {
        Self {
            config: LedgerConfig {
                name,
                rpc_url,
                chain_id,
                signer_key_env,
                contracts: ContractAddresses::default(),
                confirmations: None,
                max_gas_price_gwei: None,
                rpc_timeout_secs: None,
                poll_interval_ms: None,
            },
        }
    }

    pub fn contracts(mut self, contracts: ContractAddresses) -> Self {
        self.config.contracts = contracts;
        self
    }

    pub fn confirmations(mut self, confirmations: u64) -> Self {
        self.config.confirmations = Some(confirmations);
        self
    }

    pub fn max_gas_price_gwei(mut self, max_gas_price: u64) -> Self {
        self.config.max_gas_price_gwei = Some(max_gas_price);
        self
    }

    pub fn rpc_timeout_secs(mut self, secs: u64) -> Self {
        self.config.rpc_timeout_secs = Some(secs);
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval_ms = Some(interval.as_millis() as u64);
        self
    }

    pub fn build(self) -> LedgerConfig {
        self.config
    }
}

fn default_confirmation_timeout_secs() -> u64 {
    DEFAULT_CONFIRMATION_TIMEOUT_SECS
}

fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

/// Process-wide orchestrator configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Ledger that originates cross-chain calls and serves single-chain
    /// requests that do not name one
    pub origin: String,
    #[serde(default = "default_confirmation_timeout_secs")]
    pub confirmation_timeout_secs: u64,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default)]
    pub duplicate_check: DuplicateCheckPolicy,
    pub ledgers: Vec<LedgerConfig>,
}

impl OrchestratorConfig {
    pub fn new(origin: String, ledgers: Vec<LedgerConfig>) -> Self {
        Self {
            origin,
            confirmation_timeout_secs: DEFAULT_CONFIRMATION_TIMEOUT_SECS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            duplicate_check: DuplicateCheckPolicy::default(),
            ledgers,
        }
    }

    pub fn from_toml_str(raw: &str) -> anyhow::Result<Self> {
        let config: OrchestratorConfig =
            toml::from_str(raw).context("failed to parse orchestrator config")?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_toml_str(&raw).with_context(|| format!("invalid config in {}", path.display()))
    }

    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_secs(self.confirmation_timeout_secs)
    }

    pub fn with_duplicate_check(mut self, policy: DuplicateCheckPolicy) -> Self {
        self.duplicate_check = policy;
        self
    }

    /// Confirmation budget in whole seconds, the unit of the file setting.
    pub fn with_confirmation_timeout_secs(mut self, secs: u64) -> Self {
        self.confirmation_timeout_secs = secs;
        self
    }

    /// Checks the configuration against the chain directory.
    pub fn validate(&self, directory: &ChainDirectory) -> Result<(), OrchestratorError> {
        if self.ledgers.is_empty() {
            return Err(OrchestratorError::Configuration("no ledgers configured".to_string()));
        }

        if self.confirmation_timeout_secs == 0 || self.queue_capacity == 0 {
            return Err(OrchestratorError::Configuration(
                "confirmation timeout and queue capacity must be non-zero".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for ledger in &self.ledgers {
            ledger.validate()?;
            let canonical = directory.canonical_name(&ledger.name).ok_or_else(|| {
                OrchestratorError::Configuration(format!(
                    "ledger {} is not in the chain directory",
                    ledger.name
                ))
            })?;
            if !seen.insert(canonical.to_string()) {
                return Err(OrchestratorError::Configuration(format!(
                    "ledger {} configured twice",
                    ledger.name
                )));
            }
        }

        let origin = directory.canonical_name(&self.origin).unwrap_or(self.origin.as_str());
        if !seen.contains(origin) {
            return Err(OrchestratorError::Configuration(format!(
                "origin {} is not a configured ledger",
                self.origin
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        origin = "sepolia"
        confirmation_timeout_secs = 90
        duplicate_check = "all_destinations"

        [[ledgers]]
        name = "sepolia"
        rpc_url = "https://rpc.sepolia.example"
        chain_id = 11155111
        signer_key_env = "TAPPASS_SIGNER_KEY"
        confirmations = 2

        [ledgers.contracts]
        attendee_registry = "0x1111111111111111111111111111111111111111"
        omnichain_registry = "0x2222222222222222222222222222222222222222"

        [[ledgers]]
        name = "arbitrumSepolia"
        rpc_url = "https://rpc.arbitrum-sepolia.example"
        chain_id = 421614
        signer_key_env = "TAPPASS_SIGNER_KEY"
    "#;

    #[test]
    fn test_parse_and_validate() {
        let config = OrchestratorConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.origin, "sepolia");
        assert_eq!(config.confirmation_timeout(), Duration::from_secs(90));
        assert_eq!(config.queue_capacity, DEFAULT_QUEUE_CAPACITY);
        assert_eq!(config.duplicate_check, DuplicateCheckPolicy::AllDestinations);
        assert_eq!(config.ledgers[0].confirmations(), 2);
        assert_eq!(config.ledgers[1].confirmations(), DEFAULT_CONFIRMATIONS);
        assert_eq!(
            config.ledgers[0].contracts.attendee_registry,
            Some(Address::repeat_byte(0x11))
        );
        assert!(config.ledgers[0].contracts.event_pass.is_none());

        config.validate(&ChainDirectory::default()).unwrap();
    }

    #[test]
    fn test_validation_failures() {
        let directory = ChainDirectory::default();
        let ledger = LedgerConfig::development(
            "sepolia".to_string(),
            "http://localhost:8545".to_string(),
            "KEY".to_string(),
        );

        let unknown_origin = OrchestratorConfig::new("polygon".to_string(), vec![ledger.clone()]);
        assert!(unknown_origin.validate(&directory).is_err());

        let duplicated =
            OrchestratorConfig::new("sepolia".to_string(), vec![ledger.clone(), ledger.clone()]);
        assert!(duplicated.validate(&directory).is_err());

        let mut bad_url = ledger.clone();
        bad_url.rpc_url = "localhost:8545".to_string();
        assert!(OrchestratorConfig::new("sepolia".to_string(), vec![bad_url])
            .validate(&directory)
            .is_err());

        let zero_timeout = OrchestratorConfig::new("sepolia".to_string(), vec![ledger.clone()])
            .with_confirmation_timeout_secs(0);
        assert!(zero_timeout.validate(&directory).is_err());
        let short_timeout = OrchestratorConfig::new("sepolia".to_string(), vec![ledger.clone()])
            .with_confirmation_timeout_secs(1);
        assert_eq!(short_timeout.confirmation_timeout(), Duration::from_secs(1));
        short_timeout.validate(&directory).unwrap();

        let mut not_in_directory = ledger;
        not_in_directory.name = "moonbase".to_string();
        assert!(OrchestratorConfig::new("moonbase".to_string(), vec![not_in_directory])
            .validate(&directory)
            .is_err());
    }

    #[test]
    fn test_builder() {
        let config = LedgerConfigBuilder::new(
            "sepolia".to_string(),
            "https://rpc.example".to_string(),
            11_155_111,
            "KEY".to_string(),
        )
        .confirmations(3)
        .max_gas_price_gwei(150)
        .rpc_timeout_secs(45)
        .poll_interval(Duration::from_millis(750))
        .build();

        assert_eq!(config.confirmations(), 3);
        assert_eq!(config.max_gas_price_gwei, Some(150));
        assert_eq!(config.rpc_timeout(), Duration::from_secs(45));
        assert_eq!(config.poll_interval(), Duration::from_millis(750));
    }

    #[test]
    fn test_missing_file_has_context() {
        let err = OrchestratorConfig::from_file("/nonexistent/tappass.toml").unwrap_err();
        assert!(err.to_string().contains("failed to read config file"));
    }
}
