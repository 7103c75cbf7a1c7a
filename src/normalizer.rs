//! Canonicalization of raw tag input into a fixed-width [`Identifier`].
//!
//! Input may carry a `0x` marker. The remaining hex body is lowercased and
//! right-padded with `0` to 64 digits, or truncated to the first 64 digits.
//! Truncation drops trailing information silently: callers that care about
//! precision must not pass bodies longer than 64 digits.

use crate::error::OrchestratorError;
use crate::types::{Identifier, IDENTIFIER_HEX_LEN};

/// Normalizes raw input into an [`Identifier`].
///
/// Only the first 64 characters of the body are kept, and only those must
/// be hex digits. Fails with `InvalidInput` when the input is empty after
/// stripping the marker or a kept character is not a hex digit.
pub fn normalize(raw: &str) -> Result<Identifier, OrchestratorError> {
    let trimmed = raw.trim();
    let body = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    if body.is_empty() {
        return Err(OrchestratorError::InvalidInput("identifier is empty".to_string()));
    }

    let mut canonical = String::with_capacity(IDENTIFIER_HEX_LEN);
    for c in body.chars().take(IDENTIFIER_HEX_LEN) {
        if !c.is_ascii_hexdigit() {
            return Err(OrchestratorError::InvalidInput(format!(
                "identifier contains non-hex character {c:?}"
            )));
        }
        canonical.push(c.to_ascii_lowercase());
    }
    while canonical.len() < IDENTIFIER_HEX_LEN {
        canonical.push('0');
    }

    let mut bytes = [0u8; 32];
    hex::decode_to_slice(&canonical, &mut bytes)
        .map_err(|e| OrchestratorError::InvalidInput(format!("identifier: {e}")))?;
    Ok(Identifier::from_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_short_input_is_right_padded() {
        let id = normalize("abc").unwrap();
        assert_eq!(id.to_string(), format!("0xabc{}", "0".repeat(61)));
    }

    #[test]
    fn test_marker_and_case_are_canonicalized() {
        let a = normalize("0xABCDEF").unwrap();
        let b = normalize("abcdef").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_long_input_is_truncated() {
        let raw = format!("{}ff", "12".repeat(32));
        let id = normalize(&raw).unwrap();
        assert_eq!(id.to_string(), format!("0x{}", "12".repeat(32)));
    }

    #[test]
    fn test_characters_past_digit_64_are_dropped_unchecked() {
        let id = normalize(&format!("{}zz", "ab".repeat(32))).unwrap();
        assert_eq!(id.to_string(), format!("0x{}", "ab".repeat(32)));
    }

    #[test]
    fn test_non_hex_within_first_64_digits_is_rejected() {
        let raw = format!("{}g{}", "a".repeat(63), "b".repeat(10));
        assert!(matches!(normalize(&raw), Err(OrchestratorError::InvalidInput(_))));
    }

    #[test]
    fn test_rejects_non_hex_and_empty() {
        assert!(matches!(normalize("xyz"), Err(OrchestratorError::InvalidInput(_))));
        assert!(matches!(normalize("0x"), Err(OrchestratorError::InvalidInput(_))));
        assert!(matches!(normalize("  "), Err(OrchestratorError::InvalidInput(_))));
    }

    proptest! {
        #[test]
        fn prop_normalize_is_idempotent(body in "[0-9a-fA-F]{1,80}") {
            let once = normalize(&body).unwrap();
            let twice = normalize(&once.to_string()).unwrap();
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn prop_short_bodies_pad_with_zeros(body in "[0-9a-f]{1,64}") {
            let rendered = normalize(&body).unwrap().to_string();
            prop_assert_eq!(rendered.len(), 2 + IDENTIFIER_HEX_LEN);
            prop_assert!(rendered[2..].starts_with(&body));
            prop_assert!(rendered[2 + body.len()..].chars().all(|c| c == '0'));
        }

        #[test]
        fn prop_long_bodies_keep_first_64_digits(body in "[0-9a-f]{65,128}") {
            let rendered = normalize(&body).unwrap().to_string();
            prop_assert_eq!(&rendered[2..], &body[..IDENTIFIER_HEX_LEN]);
        }

        #[test]
        fn prop_trailing_junk_is_ignored(
            head in "[0-9a-f]{64}",
            tail in "[^0-9a-fA-F]{1,32}",
        ) {
            let rendered = normalize(&format!("{head}{tail}")).unwrap().to_string();
            prop_assert_eq!(&rendered[2..], head.as_str());
        }
    }
}
