// Domain types shared by the services, the sequencer and the ledger layer.

use std::collections::BTreeMap;
use std::fmt;

use ethers::types::{Address, Bytes, TxHash, H256, U256};
use serde::{Deserialize, Serialize};

use crate::error::OrchestratorError;

/// Width of an identifier body in hex digits.
pub const IDENTIFIER_HEX_LEN: usize = 64;

/// Width of an account address body in hex digits.
pub const ADDRESS_HEX_LEN: usize = 40;

/// A 32-byte tag hash. Only produced by [`crate::normalizer::normalize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identifier([u8; 32]);

impl Identifier {
    pub(crate) fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl Serialize for Identifier {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

/// Parses a textual account address (`0x` followed by 40 hex digits).
///
/// Anything else is rejected before the address is allowed anywhere near a
/// ledger call.
pub fn parse_account(raw: &str) -> Result<Address, OrchestratorError> {
    let body = raw
        .trim()
        .strip_prefix("0x")
        .or_else(|| raw.trim().strip_prefix("0X"))
        .ok_or_else(|| OrchestratorError::InvalidInput(format!("account {raw:?} lacks 0x prefix")))?;

    if body.len() != ADDRESS_HEX_LEN {
        return Err(OrchestratorError::InvalidInput(format!(
            "account {raw:?} must have {ADDRESS_HEX_LEN} hex digits, got {}",
            body.len()
        )));
    }

    let mut bytes = [0u8; 20];
    hex::decode_to_slice(body, &mut bytes)
        .map_err(|e| OrchestratorError::InvalidInput(format!("account {raw:?}: {e}")))?;
    Ok(Address::from(bytes))
}

/// Endpoint identifier of a destination ledger in the cross-chain messaging
/// protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DestinationRef(pub u32);

impl fmt::Display for DestinationRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "eid:{}", self.0)
    }
}

/// The three token kinds issued by the event pass contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub enum TokenKind {
    RegistrationPass = 1,
    EventTicket = 2,
    EventPoap = 3,
}

impl TokenKind {
    pub const ALL: [TokenKind; 3] = [
        TokenKind::RegistrationPass,
        TokenKind::EventTicket,
        TokenKind::EventPoap,
    ];

    pub fn id(self) -> u64 {
        self as u64
    }

    pub fn name(self) -> &'static str {
        match self {
            TokenKind::RegistrationPass => "registration_pass",
            TokenKind::EventTicket => "event_ticket",
            TokenKind::EventPoap => "event_poap",
        }
    }
}

impl TryFrom<u64> for TokenKind {
    type Error = OrchestratorError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(TokenKind::RegistrationPass),
            2 => Ok(TokenKind::EventTicket),
            3 => Ok(TokenKind::EventPoap),
            other => Err(OrchestratorError::InvalidInput(format!(
                "token kind {other} outside [1,3]"
            ))),
        }
    }
}

impl From<TokenKind> for u64 {
    fn from(kind: TokenKind) -> Self {
        kind.id()
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How the fee estimate of a call is scaled before it is provisioned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EstimationPolicy {
    /// One destination (or a plain local write): estimate × 2.
    Single,
    /// One call fanning out to `destinations` ledgers: estimate × (N + 1).
    FanOut { destinations: usize },
}

impl EstimationPolicy {
    pub fn multiplier(self) -> u64 {
        match self {
            EstimationPolicy::Single => 2,
            EstimationPolicy::FanOut { destinations } => destinations as u64 + 1,
        }
    }
}

/// Provisioned resources for one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceBudget {
    /// Raw estimate returned by the ledger
    pub base: U256,
    pub multiplier: u64,
    /// `base × multiplier`; used as gas limit and, for cross-chain calls, as
    /// the attached messaging fee.
    pub provisioned: U256,
}

/// Unit of work admitted to the sequencer.
#[derive(Debug, Clone)]
pub struct PendingCall {
    pub contract: Address,
    /// Function signature, for logs only.
    pub function: &'static str,
    pub data: Bytes,
    pub value: U256,
    pub policy: EstimationPolicy,
    /// Cross-chain calls attach the provisioned budget as the messaging fee
    /// and report a correlation id.
    pub cross_chain: bool,
}

impl PendingCall {
    pub fn local(contract: Address, function: &'static str, data: Bytes) -> Self {
        Self {
            contract,
            function,
            data,
            value: U256::zero(),
            policy: EstimationPolicy::Single,
            cross_chain: false,
        }
    }

    pub fn cross_chain(
        contract: Address,
        function: &'static str,
        data: Bytes,
        policy: EstimationPolicy,
    ) -> Self {
        Self {
            contract,
            function,
            data,
            value: U256::zero(),
            policy,
            cross_chain: true,
        }
    }

    /// Value sent along with the transaction once a budget is known.
    pub fn attached_value(&self, budget: &ResourceBudget) -> U256 {
        if self.cross_chain {
            self.value.saturating_add(budget.provisioned)
        } else {
            self.value
        }
    }
}

/// What the ledger said about a submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinalityStatus {
    Success,
    Failure { reason: Option<String> },
    /// Not observed within the confirmation budget. Neither success nor failure.
    Unknown { detail: String },
}

/// Result of one sequenced transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionOutcome {
    pub tx_hash: TxHash,
    pub nonce: U256,
    pub status: FinalityStatus,
    pub correlation_id: Option<H256>,
}

impl TransactionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self.status, FinalityStatus::Success)
    }

    /// Turns a reverted or unconfirmed outcome into the matching error.
    pub fn into_result(self) -> Result<TransactionOutcome, OrchestratorError> {
        match &self.status {
            FinalityStatus::Success => Ok(self),
            FinalityStatus::Failure { reason } => Err(OrchestratorError::LedgerReverted {
                tx_hash: format!("{:?}", self.tx_hash),
                reason: reason.clone(),
            }),
            FinalityStatus::Unknown { detail } => Err(OrchestratorError::ConfirmationTimeout {
                tx_hash: format!("{:?}", self.tx_hash),
                detail: detail.clone(),
            }),
        }
    }
}

/// Response `outcome_kind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Registered,
    AlreadyRegistered,
    InvalidInput,
    UnknownChain,
    Failed,
    Unknown,
    /// A non-registration write finalized successfully.
    Confirmed,
    /// A read completed.
    Queried,
}

impl OutcomeKind {
    pub fn from_error(error: &OrchestratorError) -> Self {
        match error {
            OrchestratorError::InvalidInput(_) => OutcomeKind::InvalidInput,
            OrchestratorError::UnknownChain(_) => OutcomeKind::UnknownChain,
            OrchestratorError::AlreadyRegistered { .. } => OutcomeKind::AlreadyRegistered,
            OrchestratorError::ConfirmationTimeout { .. } => OutcomeKind::Unknown,
            OrchestratorError::EstimationFailed(_)
            | OrchestratorError::ReadFailed(_)
            | OrchestratorError::SubmissionFailed(_)
            | OrchestratorError::LedgerReverted { .. }
            | OrchestratorError::NotReady
            | OrchestratorError::Configuration(_) => OutcomeKind::Failed,
        }
    }
}

/// One row of the chain directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainEntry {
    pub name: String,
    pub endpoint: DestinationRef,
}

/// Response returned to the routing layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Response {
    pub accepted: bool,
    pub outcome_kind: OutcomeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<TxHash>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<H256>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Token balances by kind name, decimal strings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balances: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chains: Option<Vec<ChainEntry>>,
    /// Owner of a looked-up identifier. Absent when it is unregistered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<Address>,
}

impl Response {
    fn empty(accepted: bool, outcome_kind: OutcomeKind) -> Self {
        Self {
            accepted,
            outcome_kind,
            transaction_id: None,
            correlation_id: None,
            reason: None,
            balances: None,
            chains: None,
            owner: None,
        }
    }

    /// Successful write. `kind` is `Registered` or `Confirmed`.
    pub fn written(kind: OutcomeKind, outcome: &TransactionOutcome) -> Self {
        Self {
            transaction_id: Some(outcome.tx_hash),
            correlation_id: outcome.correlation_id,
            ..Self::empty(true, kind)
        }
    }

    pub fn balances(balances: BTreeMap<TokenKind, U256>) -> Self {
        Self {
            balances: Some(
                balances
                    .into_iter()
                    .map(|(kind, count)| (kind.name().to_string(), count.to_string()))
                    .collect(),
            ),
            ..Self::empty(true, OutcomeKind::Queried)
        }
    }

    pub fn chains(chains: Vec<ChainEntry>) -> Self {
        Self {
            chains: Some(chains),
            ..Self::empty(true, OutcomeKind::Queried)
        }
    }

    pub fn owner(owner: Option<Address>) -> Self {
        Self {
            owner,
            ..Self::empty(true, OutcomeKind::Queried)
        }
    }

    pub fn from_error(error: &OrchestratorError) -> Self {
        let transaction_id = match error {
            OrchestratorError::LedgerReverted { tx_hash, .. }
            | OrchestratorError::ConfirmationTimeout { tx_hash, .. } => tx_hash.parse().ok(),
            _ => None,
        };
        let reason = match error {
            OrchestratorError::LedgerReverted { reason: Some(reason), .. } => reason.clone(),
            other => other.to_string(),
        };
        Self {
            transaction_id,
            reason: Some(reason),
            ..Self::empty(false, OutcomeKind::from_error(error))
        }
    }

    /// Maps a write result to a response, `success_kind` naming the
    /// successful outcome.
    pub fn from_write(
        success_kind: OutcomeKind,
        result: &Result<TransactionOutcome, OrchestratorError>,
    ) -> Self {
        match result {
            Ok(outcome) => Self::written(success_kind, outcome),
            Err(error) => Self::from_error(error),
        }
    }
}
