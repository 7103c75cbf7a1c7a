// Tunables of the EVM ledger client

use std::time::Duration;

/// Maximum retry attempts for idempotent RPC reads
pub const MAX_RETRY_ATTEMPTS: u32 = 3;

/// Base delay between read retries (exponential backoff)
pub const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);

/// Interval ethers uses when it polls on our behalf
pub const PROVIDER_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// `Error(string)` selector used by Solidity `require`/`revert` messages
pub const ERROR_STRING_SELECTOR: [u8; 4] = [0x08, 0xc3, 0x79, 0xa0];

/// Prefix nodes put in front of revert messages
pub const EXECUTION_REVERTED_PREFIX: &str = "execution reverted: ";

/// One gwei in wei
pub const GWEI: u64 = 1_000_000_000;
