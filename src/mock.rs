// In-memory ledger used by the unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use ethers::abi::{self, ParamType, Token};
use ethers::types::{Address, Bytes, Log, TxHash, H256, U256, U64};
use ethers::utils::{id, keccak256};

use crate::ledger::{FinalityReport, LedgerClient, LedgerError};
use crate::types::{Identifier, PendingCall, ResourceBudget, TokenKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentTx {
    pub hash: TxHash,
    pub nonce: U256,
    pub function: &'static str,
    pub value: U256,
    pub gas: U256,
}

#[derive(Default)]
struct MockState {
    next_nonce: U256,
    registry: HashMap<[u8; 32], Address>,
    omnichain: HashMap<([u8; 32], u32), Address>,
    balances: HashMap<(Address, u64), U256>,
    sent: Vec<SentTx>,
    receipts: HashMap<TxHash, FinalityReport>,
    send_attempts: usize,
    fail_sends: HashSet<usize>,
    fail_estimates: bool,
    fail_reads: bool,
    revert_reason: Option<String>,
    reads: usize,
    estimates: usize,
}

pub struct MockLedger {
    chain_id: u64,
    signer: Address,
    origin_eid: u32,
    estimate_base: U256,
    send_delay: Duration,
    finality_delay: Mutex<Duration>,
    state: Mutex<MockState>,
}

impl MockLedger {
    pub fn new(chain_id: u64, origin_eid: u32) -> Self {
        Self {
            chain_id,
            signer: Address::repeat_byte(0xaa),
            origin_eid,
            estimate_base: U256::from(100_000),
            send_delay: Duration::ZERO,
            finality_delay: Mutex::new(Duration::ZERO),
            state: Mutex::new(MockState::default()),
        }
    }

    pub fn with_estimate(mut self, base: u64) -> Self {
        self.estimate_base = U256::from(base);
        self
    }

    pub fn with_send_delay(mut self, delay: Duration) -> Self {
        self.send_delay = delay;
        self
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    pub fn fail_send_at(&self, attempt: usize) {
        self.state().fail_sends.insert(attempt);
    }

    pub fn fail_estimates(&self) {
        self.state().fail_estimates = true;
    }

    pub fn fail_reads(&self) {
        self.state().fail_reads = true;
    }

    pub fn revert_with(&self, reason: &str) {
        self.state().revert_reason = Some(reason.to_string());
    }

    pub fn set_finality_delay(&self, delay: Duration) {
        *self.finality_delay.lock().unwrap() = delay;
    }

    pub fn preregister_remote(&self, tag: &Identifier, eid: u32, owner: Address) {
        self.state().omnichain.insert((*tag.as_bytes(), eid), owner);
    }

    pub fn sent(&self) -> Vec<SentTx> {
        self.state().sent.clone()
    }

    pub fn read_count(&self) -> usize {
        self.state().reads
    }

    pub fn estimate_count(&self) -> usize {
        self.state().estimates
    }

    pub fn owner_of(&self, tag: &Identifier) -> Option<Address> {
        self.state().registry.get(tag.as_bytes()).copied()
    }

    pub fn cross_chain_owner(&self, tag: &Identifier, eid: u32) -> Option<Address> {
        self.state().omnichain.get(&(*tag.as_bytes(), eid)).copied()
    }

    pub fn balance(&self, account: Address, kind: TokenKind) -> U256 {
        self.state()
            .balances
            .get(&(account, kind.id()))
            .copied()
            .unwrap_or_default()
    }

    fn log(&self, signature: &str, topic: H256) -> Log {
        Log {
            topics: vec![H256::from(keccak256(signature)), topic],
            ..Default::default()
        }
    }

    /// Applies a state-changing call. Err carries a revert reason.
    fn apply(&self, state: &mut MockState, data: &[u8]) -> Result<Vec<Log>, String> {
        let (selector, args) = data.split_at(4);
        let selector: [u8; 4] = selector.try_into().map_err(|_| "short calldata".to_string())?;
        let decode = |types: &[ParamType]| abi::decode(types, args).map_err(|e| e.to_string());

        if selector == id("registerTag(bytes32,address)") {
            let tokens = decode(&[ParamType::FixedBytes(32), ParamType::Address])?;
            let tag = fixed32(&tokens[0]);
            let wallet = tokens[1].clone().into_address().unwrap_or_default();
            if state.registry.contains_key(&tag) {
                return Err("Tag already registered".to_string());
            }
            state.registry.insert(tag, wallet);
            return Ok(vec![self.log("TagRegistered(bytes32,address)", H256::from(tag))]);
        }

        if selector == id("registerTagCrossChain(uint32[],bytes32,address,bytes)") {
            let tokens = decode(&[
                ParamType::Array(Box::new(ParamType::Uint(32))),
                ParamType::FixedBytes(32),
                ParamType::Address,
                ParamType::Bytes,
            ])?;
            let tag = fixed32(&tokens[1]);
            let wallet = tokens[2].clone().into_address().unwrap_or_default();
            let mut eids = vec![self.origin_eid];
            for eid in tokens[0].clone().into_array().unwrap_or_default() {
                eids.push(eid.into_uint().unwrap_or_default().as_u32());
            }
            for eid in eids {
                state.omnichain.insert((tag, eid), wallet);
            }
            let nonce = state.next_nonce.as_u64().to_be_bytes();
            let guid = H256::from(keccak256([&tag[..], &nonce[..]].concat()));
            return Ok(vec![self.log("PacketSent(bytes32)", guid)]);
        }

        for kind in TokenKind::ALL {
            let signature = match kind {
                TokenKind::RegistrationPass => "mintRegistration(address)",
                TokenKind::EventTicket => "mintTicket(address)",
                TokenKind::EventPoap => "mintPOAP(address)",
            };
            if selector == id(signature) {
                let tokens = decode(&[ParamType::Address])?;
                let to = tokens[0].clone().into_address().unwrap_or_default();
                *state.balances.entry((to, kind.id())).or_default() += U256::one();
                return Ok(vec![self.log("TransferSingle(address)", H256::from(to))]);
            }
        }

        if selector == id("crossChainMint(uint32,address,uint256,uint256,bytes)")
            || selector == id("crossChainBurn(uint32,uint256,uint256,bytes)")
            || selector == id("queryTagCrossChain(uint32,bytes32,bytes)")
        {
            let guid = H256::from_low_u64_be(0xc0ffee + state.next_nonce.as_u64());
            return Ok(vec![self.log("PacketSent(bytes32)", guid)]);
        }

        Err(format!("unknown selector 0x{}", hex::encode(selector)))
    }

    fn answer(&self, state: &MockState, data: &[u8]) -> Result<Bytes, LedgerError> {
        let (selector, args) = data.split_at(4);
        let selector: [u8; 4] = selector
            .try_into()
            .map_err(|_| LedgerError::Decode("short calldata".to_string()))?;
        let decode = |types: &[ParamType]| abi::decode(types, args).map_err(LedgerError::from);

        let output = if selector == id("walletOf(bytes32)") {
            let tokens = decode(&[ParamType::FixedBytes(32)])?;
            let owner = state.registry.get(&fixed32(&tokens[0])).copied().unwrap_or_default();
            abi::encode(&[Token::Address(owner)])
        } else if selector == id("getWalletOfTag(bytes32,uint32)") {
            let tokens = decode(&[ParamType::FixedBytes(32), ParamType::Uint(32)])?;
            let eid = tokens[1].clone().into_uint().unwrap_or_default().as_u32();
            let owner = state
                .omnichain
                .get(&(fixed32(&tokens[0]), eid))
                .copied()
                .unwrap_or_default();
            abi::encode(&[Token::Address(owner)])
        } else if selector == id("balanceOf(address,uint256)") {
            let tokens = decode(&[ParamType::Address, ParamType::Uint(256)])?;
            let account = tokens[0].clone().into_address().unwrap_or_default();
            let kind = tokens[1].clone().into_uint().unwrap_or_default().as_u64();
            let balance = state.balances.get(&(account, kind)).copied().unwrap_or_default();
            abi::encode(&[Token::Uint(balance)])
        } else if selector == id("balanceOfBatch(address[],uint256[])") {
            let tokens = decode(&[
                ParamType::Array(Box::new(ParamType::Address)),
                ParamType::Array(Box::new(ParamType::Uint(256))),
            ])?;
            let accounts = tokens[0].clone().into_array().unwrap_or_default();
            let kinds = tokens[1].clone().into_array().unwrap_or_default();
            let balances = accounts
                .into_iter()
                .zip(kinds)
                .map(|(account, kind)| {
                    let key = (
                        account.into_address().unwrap_or_default(),
                        kind.into_uint().unwrap_or_default().as_u64(),
                    );
                    Token::Uint(state.balances.get(&key).copied().unwrap_or_default())
                })
                .collect();
            abi::encode(&[Token::Array(balances)])
        } else {
            return Err(LedgerError::Rpc(format!("unknown view 0x{}", hex::encode(selector))));
        };

        Ok(Bytes::from(output))
    }
}

fn fixed32(token: &Token) -> [u8; 32] {
    let mut out = [0u8; 32];
    if let Token::FixedBytes(bytes) = token {
        out.copy_from_slice(&bytes[..32]);
    }
    out
}

#[async_trait]
impl LedgerClient for MockLedger {
    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    fn signer(&self) -> Address {
        self.signer
    }

    async fn read(&self, _contract: Address, data: Bytes) -> Result<Bytes, LedgerError> {
        let mut state = self.state();
        state.reads += 1;
        if state.fail_reads {
            return Err(LedgerError::Network("read refused".to_string()));
        }
        self.answer(&state, &data)
    }

    async fn estimate(&self, _call: &PendingCall, _sender: Address) -> Result<U256, LedgerError> {
        let mut state = self.state();
        state.estimates += 1;
        if state.fail_estimates {
            return Err(LedgerError::Rpc("execution reverted: estimate refused".to_string()));
        }
        Ok(self.estimate_base)
    }

    async fn pending_nonce(&self, _account: Address) -> Result<U256, LedgerError> {
        Ok(self.state().next_nonce)
    }

    async fn send(
        &self,
        call: &PendingCall,
        budget: &ResourceBudget,
        nonce: U256,
    ) -> Result<TxHash, LedgerError> {
        if !self.send_delay.is_zero() {
            tokio::time::sleep(self.send_delay).await;
        }

        let mut state = self.state();
        let attempt = state.send_attempts;
        state.send_attempts += 1;

        if state.fail_sends.contains(&attempt) {
            return Err(LedgerError::Network(format!("connection reset on send {attempt}")));
        }
        if nonce != state.next_nonce {
            return Err(LedgerError::Rpc(format!(
                "nonce mismatch: expected {}, got {}",
                state.next_nonce, nonce
            )));
        }

        let hash = TxHash::from_low_u64_be((self.chain_id << 32) | nonce.as_u64() + 1);
        let outcome = match state.revert_reason.clone() {
            Some(reason) => Err(reason),
            None => self.apply(&mut state, &call.data),
        };
        let report = match outcome {
            Ok(logs) => FinalityReport {
                tx_hash: hash,
                block_number: Some(U64::from(nonce.as_u64() + 1)),
                success: true,
                revert_reason: None,
                logs,
            },
            Err(reason) => FinalityReport {
                tx_hash: hash,
                block_number: Some(U64::from(nonce.as_u64() + 1)),
                success: false,
                revert_reason: Some(reason),
                logs: Vec::new(),
            },
        };

        state.next_nonce = nonce + 1;
        state.receipts.insert(hash, report);
        state.sent.push(SentTx {
            hash,
            nonce,
            function: call.function,
            value: call.attached_value(budget),
            gas: budget.provisioned,
        });
        Ok(hash)
    }

    async fn await_finality(&self, tx_hash: TxHash) -> Result<FinalityReport, LedgerError> {
        let delay = *self.finality_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.state()
            .receipts
            .get(&tx_hash)
            .cloned()
            .ok_or_else(|| LedgerError::Rpc(format!("unknown transaction {tx_hash:?}")))
    }
}
