// Recovery of revert reasons from node errors.

use ethers::abi::{self, ParamType, Token};
use ethers::providers::{JsonRpcError, ProviderError};

use crate::evm::types::{ERROR_STRING_SELECTOR, EXECUTION_REVERTED_PREFIX};

/// Decodes `Error(string)` revert data. Custom errors and panics yield None.
pub fn decode_revert_data(data: &[u8]) -> Option<String> {
    if data.len() < 4 || data[..4] != ERROR_STRING_SELECTOR {
        return None;
    }
    abi::decode(&[ParamType::String], &data[4..])
        .ok()?
        .into_iter()
        .next()
        .and_then(Token::into_string)
}

/// Best available reason from a JSON-RPC error: decoded revert data first,
/// then the node's message with the generic prefix removed.
pub fn reason_from_rpc_error(error: &JsonRpcError) -> String {
    error
        .data
        .as_ref()
        .and_then(|value| value.as_str())
        .and_then(|raw| hex::decode(raw.trim_start_matches("0x")).ok())
        .and_then(|bytes| decode_revert_data(&bytes))
        .unwrap_or_else(|| {
            error
                .message
                .strip_prefix(EXECUTION_REVERTED_PREFIX)
                .unwrap_or(&error.message)
                .to_string()
        })
}

/// Revert reason carried by a provider error, if it is a JSON-RPC error.
pub fn reason_from_provider_error(error: &ProviderError) -> Option<String> {
    match error {
        ProviderError::JsonRpcClientError(inner) => {
            inner.as_error_response().map(reason_from_rpc_error)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn error_string(reason: &str) -> Vec<u8> {
        let mut data = ERROR_STRING_SELECTOR.to_vec();
        data.extend(abi::encode(&[Token::String(reason.to_string())]));
        data
    }

    #[test]
    fn test_decodes_error_string() {
        assert_eq!(
            decode_revert_data(&error_string("Tag already registered")),
            Some("Tag already registered".to_string())
        );
        assert_eq!(decode_revert_data(&[0xde, 0xad, 0xbe, 0xef]), None);
        assert_eq!(decode_revert_data(&[]), None);
    }

    #[test]
    fn test_reason_prefers_revert_data() {
        let error = JsonRpcError {
            code: 3,
            message: "execution reverted: ignored".to_string(),
            data: Some(serde_json::Value::String(format!(
                "0x{}",
                hex::encode(error_string("Only owner"))
            ))),
        };
        assert_eq!(reason_from_rpc_error(&error), "Only owner");
    }

    #[test]
    fn test_reason_falls_back_to_message() {
        let error = JsonRpcError {
            code: -32000,
            message: "execution reverted: Invalid token".to_string(),
            data: None,
        };
        assert_eq!(reason_from_rpc_error(&error), "Invalid token");
    }
}
