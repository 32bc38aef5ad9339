// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@on1.no>

use crate::domain::error::AppError;
use alloy::json_abi::Function;
use alloy::primitives::{Bytes, Selector, U256};
use alloy::sol;
use alloy::sol_types::{SolCall, SolValue};

sol! {
    interface IPresale {
        function presale(uint256 amount) external payable;
        function enablePresale(bool enabled) external;
    }
}

/// Parse a human-readable signature such as `enablePresale(bool _state)`.
/// Parameter names and the `function` keyword are accepted.
pub fn parse_function(signature: &str) -> Result<Function, AppError> {
    Function::parse(signature.trim())
        .map_err(|e| AppError::Config(format!("Invalid function signature {signature:?}: {e}")))
}

/// Selector of the canonical form of `signature`.
pub fn selector_of(signature: &str) -> Result<Selector, AppError> {
    Ok(parse_function(signature)?.selector())
}

/// Parse a raw `0x`-prefixed (or bare) 4-byte selector.
pub fn parse_selector(raw: &str) -> Result<Selector, AppError> {
    let trimmed = raw.trim();
    let hex_part = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    let bytes = hex::decode(hex_part)
        .map_err(|e| AppError::Config(format!("Invalid selector {trimmed}: {e}")))?;
    let arr: [u8; 4] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| AppError::Config(format!("Selector {trimmed} is not 4 bytes")))?;
    Ok(Selector::from(arr))
}

/// `presale(uint256)` calldata with the configured selector in front.
pub fn encode_purchase(selector: Selector, amount: u64) -> Bytes {
    let mut data = IPresale::presaleCall {
        amount: U256::from(amount),
    }
    .abi_encode();
    data[..4].copy_from_slice(selector.as_slice());
    Bytes::from(data)
}

/// Strict ABI bool argument: exactly one word, padding zero, value 0 or 1.
pub fn decode_bool_word(args: &[u8]) -> Option<bool> {
    if args.len() != 32 {
        return None;
    }
    let mut data = Vec::with_capacity(36);
    data.extend_from_slice(&IPresale::enablePresaleCall::SELECTOR);
    data.extend_from_slice(args);
    IPresale::enablePresaleCall::abi_decode_validate(&data)
        .ok()
        .map(|call| call.enabled)
}

/// Decode the return data of a status view call.
pub fn decode_status_return(data: &[u8]) -> Result<bool, AppError> {
    <bool as SolValue>::abi_decode(data).map_err(|e| AppError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_of_matches_generated_bindings() {
        assert_eq!(
            selector_of("presale(uint256)").expect("sig"),
            Selector::from(IPresale::presaleCall::SELECTOR)
        );
        assert_eq!(
            selector_of("enablePresale( bool )").expect("sig"),
            Selector::from(IPresale::enablePresaleCall::SELECTOR)
        );
        assert_eq!(
            selector_of("isPresaleActive()").expect("sig"),
            parse_selector("0x60d938dc").expect("sel")
        );
    }

    #[test]
    fn parameter_names_do_not_change_the_selector() {
        let named = selector_of("enablePresale(bool _state)").expect("named");
        assert_eq!(named, parse_selector("0xd1454bf4").expect("sel"));
        assert_eq!(
            selector_of("function enablePresale(bool _state)").expect("keyword"),
            named
        );
        assert_eq!(
            parse_function("enablePresale(bool _state)")
                .expect("parse")
                .signature(),
            "enablePresale(bool)"
        );
    }

    #[test]
    fn malformed_signatures_are_config_errors() {
        assert!(matches!(
            selector_of("enablePresale(bool"),
            Err(AppError::Config(_))
        ));
        assert!(parse_function("").is_err());
    }

    #[test]
    fn parse_selector_accepts_prefixed_and_bare() {
        let a = parse_selector("0xd1454bf4").expect("prefixed");
        let b = parse_selector("d1454bf4").expect("bare");
        assert_eq!(a, b);
        assert!(parse_selector("0xd1454b").is_err());
        assert!(parse_selector("0xzz454bf4").is_err());
    }

    #[test]
    fn purchase_calldata_uses_configured_selector() {
        let custom = parse_selector("0x12345678").expect("sel");
        let data = encode_purchase(custom, 2);
        assert_eq!(data.len(), 36);
        assert_eq!(&data[..4], custom.as_slice());
        assert_eq!(data[35], 2);
        assert!(data[4..35].iter().all(|b| *b == 0));
    }

    #[test]
    fn bool_word_is_strict() {
        let mut word = [0u8; 32];
        assert_eq!(decode_bool_word(&word), Some(false));
        word[31] = 1;
        assert_eq!(decode_bool_word(&word), Some(true));
        word[31] = 2;
        assert_eq!(decode_bool_word(&word), None);
        word[31] = 1;
        word[0] = 1;
        assert_eq!(decode_bool_word(&word), None);
        assert_eq!(decode_bool_word(&[1u8]), None);
        assert_eq!(decode_bool_word(&[0u8; 64]), None);
    }

    #[test]
    fn status_return_decodes_true() {
        let encoded = true.abi_encode();
        assert!(decode_status_return(&encoded).expect("decode"));
        assert!(decode_status_return(&[0u8; 3]).is_err());
    }
}
