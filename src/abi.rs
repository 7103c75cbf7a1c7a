//! Call encoding for the registry and event pass contracts.
//!
//! The contracts are a fixed interface, so calls are encoded straight from
//! their signatures instead of through generated bindings.

use ethers::abi::{self, ParamType, Token};
use ethers::types::{Address, Bytes, U256};
use ethers::utils::id;

use crate::ledger::LedgerError;
use crate::types::{DestinationRef, Identifier, TokenKind};

/// A contract function invocation with its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContractCall {
    RegisterTag { tag: Identifier, wallet: Address },
    WalletOf { tag: Identifier },
    RegisterTagCrossChain {
        destinations: Vec<DestinationRef>,
        tag: Identifier,
        wallet: Address,
        options: Bytes,
    },
    QueryTagCrossChain {
        destination: DestinationRef,
        tag: Identifier,
        options: Bytes,
    },
    GetWalletOfTag { tag: Identifier, endpoint: DestinationRef },
    Mint { kind: TokenKind, to: Address },
    BalanceOf { account: Address, kind: TokenKind },
    BalanceOfBatch { account: Address, kinds: Vec<TokenKind> },
    CrossChainMint {
        destination: DestinationRef,
        to: Address,
        kind: TokenKind,
        amount: U256,
        options: Bytes,
    },
    CrossChainBurn {
        destination: DestinationRef,
        kind: TokenKind,
        amount: U256,
        options: Bytes,
    },
}

impl ContractCall {
    pub fn signature(&self) -> &'static str {
        match self {
            ContractCall::RegisterTag { .. } => "registerTag(bytes32,address)",
            ContractCall::WalletOf { .. } => "walletOf(bytes32)",
            ContractCall::RegisterTagCrossChain { .. } => {
                "registerTagCrossChain(uint32[],bytes32,address,bytes)"
            }
            ContractCall::QueryTagCrossChain { .. } => "queryTagCrossChain(uint32,bytes32,bytes)",
            ContractCall::GetWalletOfTag { .. } => "getWalletOfTag(bytes32,uint32)",
            ContractCall::Mint { kind, .. } => mint_signature(*kind),
            ContractCall::BalanceOf { .. } => "balanceOf(address,uint256)",
            ContractCall::BalanceOfBatch { .. } => "balanceOfBatch(address[],uint256[])",
            ContractCall::CrossChainMint { .. } => {
                "crossChainMint(uint32,address,uint256,uint256,bytes)"
            }
            ContractCall::CrossChainBurn { .. } => "crossChainBurn(uint32,uint256,uint256,bytes)",
        }
    }

    pub fn selector(&self) -> [u8; 4] {
        id(self.signature())
    }

    fn tokens(&self) -> Vec<Token> {
        match self {
            ContractCall::RegisterTag { tag, wallet } => {
                vec![tag_token(tag), Token::Address(*wallet)]
            }
            ContractCall::WalletOf { tag } => vec![tag_token(tag)],
            ContractCall::RegisterTagCrossChain { destinations, tag, wallet, options } => vec![
                Token::Array(destinations.iter().map(|d| eid_token(*d)).collect()),
                tag_token(tag),
                Token::Address(*wallet),
                Token::Bytes(options.to_vec()),
            ],
            ContractCall::QueryTagCrossChain { destination, tag, options } => vec![
                eid_token(*destination),
                tag_token(tag),
                Token::Bytes(options.to_vec()),
            ],
            ContractCall::GetWalletOfTag { tag, endpoint } => {
                vec![tag_token(tag), eid_token(*endpoint)]
            }
            ContractCall::Mint { to, .. } => vec![Token::Address(*to)],
            ContractCall::BalanceOf { account, kind } => {
                vec![Token::Address(*account), kind_token(*kind)]
            }
            ContractCall::BalanceOfBatch { account, kinds } => vec![
                Token::Array(kinds.iter().map(|_| Token::Address(*account)).collect()),
                Token::Array(kinds.iter().map(|k| kind_token(*k)).collect()),
            ],
            ContractCall::CrossChainMint { destination, to, kind, amount, options } => vec![
                eid_token(*destination),
                Token::Address(*to),
                kind_token(*kind),
                Token::Uint(*amount),
                Token::Bytes(options.to_vec()),
            ],
            ContractCall::CrossChainBurn { destination, kind, amount, options } => vec![
                eid_token(*destination),
                kind_token(*kind),
                Token::Uint(*amount),
                Token::Bytes(options.to_vec()),
            ],
        }
    }

    /// Selector followed by the ABI-encoded arguments.
    pub fn encode(&self) -> Bytes {
        let mut data = self.selector().to_vec();
        data.extend(abi::encode(&self.tokens()));
        Bytes::from(data)
    }
}

/// The event pass exposes one mint entrypoint per token kind.
fn mint_signature(kind: TokenKind) -> &'static str {
    match kind {
        TokenKind::RegistrationPass => "mintRegistration(address)",
        TokenKind::EventTicket => "mintTicket(address)",
        TokenKind::EventPoap => "mintPOAP(address)",
    }
}

fn tag_token(tag: &Identifier) -> Token {
    Token::FixedBytes(tag.as_bytes().to_vec())
}

fn eid_token(destination: DestinationRef) -> Token {
    Token::Uint(U256::from(destination.0))
}

fn kind_token(kind: TokenKind) -> Token {
    Token::Uint(U256::from(kind.id()))
}

pub fn decode_address(output: &[u8]) -> Result<Address, LedgerError> {
    abi::decode(&[ParamType::Address], output)?
        .into_iter()
        .next()
        .and_then(Token::into_address)
        .ok_or_else(|| LedgerError::Decode("expected an address".to_string()))
}

pub fn decode_uint(output: &[u8]) -> Result<U256, LedgerError> {
    abi::decode(&[ParamType::Uint(256)], output)?
        .into_iter()
        .next()
        .and_then(Token::into_uint)
        .ok_or_else(|| LedgerError::Decode("expected a uint256".to_string()))
}

pub fn decode_uint_array(output: &[u8]) -> Result<Vec<U256>, LedgerError> {
    let array = abi::decode(&[ParamType::Array(Box::new(ParamType::Uint(256)))], output)?
        .into_iter()
        .next()
        .and_then(Token::into_array)
        .ok_or_else(|| LedgerError::Decode("expected a uint256[]".to_string()))?;

    array
        .into_iter()
        .map(|t| {
            t.into_uint()
                .ok_or_else(|| LedgerError::Decode("non-uint element in uint256[]".to_string()))
        })
        .collect()
}
