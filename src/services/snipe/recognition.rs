// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@on1.no>

use crate::domain::error::AppError;
use crate::infrastructure::data::abi::{decode_bool_word, parse_function};
use alloy::primitives::Selector;

/// How a variant's argument (if any) is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgumentDecode {
    /// No argument: the call itself activates.
    Implicit,
    /// One ABI `bool`.
    AbiBool,
    /// Unknown layout; only the trailing-byte heuristic applies.
    RawSuffix,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorVariant {
    pub selector: Selector,
    pub label: String,
    pub decode: ArgumentDecode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    NotGating,
    Activate { heuristic: bool },
    Deactivate,
    /// Gating selector whose argument could not be read; never a trigger.
    Ambiguous,
}

impl Classification {
    pub fn is_gating(&self) -> bool {
        !matches!(self, Classification::NotGating)
    }
}

/// Declarative list of gating-call variants with one recognition function.
#[derive(Debug, Clone, Default)]
pub struct RecognitionTable {
    variants: Vec<SelectorVariant>,
}

impl RecognitionTable {
    pub fn new(variants: Vec<SelectorVariant>) -> Self {
        let mut deduped: Vec<SelectorVariant> = Vec::with_capacity(variants.len());
        for v in variants {
            if !deduped.iter().any(|d| d.selector == v.selector) {
                deduped.push(v);
            }
        }
        Self { variants: deduped }
    }

    /// Signatures map to `Implicit` / `AbiBool` by their parsed input types; anything
    /// else, and every raw selector, falls back to `RawSuffix`.
    pub fn from_config(signatures: &[String], raw_selectors: &[Selector]) -> Result<Self, AppError> {
        let mut variants = Vec::new();
        for signature in signatures.iter().filter(|s| !s.trim().is_empty()) {
            let function = parse_function(signature)?;
            let decode = match function.inputs.as_slice() {
                [] => ArgumentDecode::Implicit,
                [only] if only.ty == "bool" => ArgumentDecode::AbiBool,
                _ => ArgumentDecode::RawSuffix,
            };
            variants.push(SelectorVariant {
                selector: function.selector(),
                label: function.signature(),
                decode,
            });
        }
        for selector in raw_selectors {
            variants.push(SelectorVariant {
                selector: *selector,
                label: selector.to_string(),
                decode: ArgumentDecode::RawSuffix,
            });
        }
        Ok(Self::new(variants))
    }

    pub fn variants(&self) -> &[SelectorVariant] {
        &self.variants
    }

    pub fn lookup(&self, input: &[u8]) -> Option<&SelectorVariant> {
        let head: [u8; 4] = input.get(..4)?.try_into().ok()?;
        let selector = Selector::from(head);
        self.variants.iter().find(|v| v.selector == selector)
    }

    pub fn classify(&self, input: &[u8]) -> Classification {
        let Some(variant) = self.lookup(input) else {
            return Classification::NotGating;
        };
        let payload = &input[4..];
        match variant.decode {
            ArgumentDecode::Implicit => Classification::Activate { heuristic: false },
            ArgumentDecode::AbiBool => match decode_bool_word(payload) {
                Some(true) => Classification::Activate { heuristic: false },
                Some(false) => Classification::Deactivate,
                None => trailing_byte(payload),
            },
            ArgumentDecode::RawSuffix => trailing_byte(payload),
        }
    }
}

fn trailing_byte(payload: &[u8]) -> Classification {
    match payload.last() {
        Some(0x01) => Classification::Activate { heuristic: true },
        _ => Classification::Ambiguous,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::constants::{DEFAULT_GATING_SELECTORS, DEFAULT_GATING_SIGNATURES};
    use crate::infrastructure::data::abi::{parse_selector, selector_of};

    const UNPUBLISHED: &str = "0x5bea0f8e";

    fn default_table() -> RecognitionTable {
        let signatures: Vec<String> = DEFAULT_GATING_SIGNATURES
            .iter()
            .map(|s| s.to_string())
            .collect();
        let raw: Vec<Selector> = DEFAULT_GATING_SELECTORS
            .iter()
            .map(|s| parse_selector(s).expect("selector"))
            .collect();
        RecognitionTable::from_config(&signatures, &raw).expect("table")
    }

    fn call(signature: &str, word: Option<u8>) -> Vec<u8> {
        let mut data = selector_of(signature).expect("sig").to_vec();
        if let Some(last) = word {
            let mut w = [0u8; 32];
            w[31] = last;
            data.extend_from_slice(&w);
        }
        data
    }

    #[test]
    fn default_table_has_three_variants() {
        let table = default_table();
        let decodes: Vec<_> = table.variants().iter().map(|v| v.decode).collect();
        assert_eq!(
            decodes,
            vec![
                ArgumentDecode::AbiBool,
                ArgumentDecode::Implicit,
                ArgumentDecode::RawSuffix
            ]
        );
        assert_eq!(table.variants()[2].selector, parse_selector(UNPUBLISHED).expect("sel"));
    }

    #[test]
    fn bool_variant_true_activates_false_deactivates() {
        let table = default_table();
        assert_eq!(
            table.classify(&call("enablePresale(bool)", Some(1))),
            Classification::Activate { heuristic: false }
        );
        assert_eq!(
            table.classify(&call("enablePresale(bool)", Some(0))),
            Classification::Deactivate
        );
    }

    #[test]
    fn named_parameter_signature_recognises_real_calldata() {
        let table =
            RecognitionTable::from_config(&["enablePresale(bool _state)".to_string()], &[])
                .expect("table");
        let variant = &table.variants()[0];
        assert_eq!(variant.selector, parse_selector("0xd1454bf4").expect("sel"));
        assert_eq!(variant.decode, ArgumentDecode::AbiBool);
        assert_eq!(variant.label, "enablePresale(bool)");
        assert_eq!(
            table.classify(&call("enablePresale(bool)", Some(1))),
            Classification::Activate { heuristic: false }
        );
    }

    #[test]
    fn unparseable_signature_is_rejected() {
        let err = RecognitionTable::from_config(&["enablePresale(bool".to_string()], &[])
            .expect_err("malformed");
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn other_argument_lists_use_trailing_byte() {
        let table =
            RecognitionTable::from_config(&["setSaleState(uint8 state)".to_string()], &[])
                .expect("table");
        assert_eq!(table.variants()[0].decode, ArgumentDecode::RawSuffix);
    }

    #[test]
    fn no_arg_variant_activates() {
        let table = default_table();
        assert_eq!(
            table.classify(&call("enablePresale()", None)),
            Classification::Activate { heuristic: false }
        );
    }

    #[test]
    fn raw_selector_uses_trailing_byte() {
        let table = default_table();
        let mut data = parse_selector(UNPUBLISHED).expect("sel").to_vec();
        data.extend_from_slice(&[0u8; 31]);
        data.push(1);
        assert_eq!(
            table.classify(&data),
            Classification::Activate { heuristic: true }
        );

        let last = data.len() - 1;
        data[last] = 0;
        assert_eq!(table.classify(&data), Classification::Ambiguous);

        let bare = parse_selector(UNPUBLISHED).expect("sel").to_vec();
        assert_eq!(table.classify(&bare), Classification::Ambiguous);
    }

    #[test]
    fn malformed_bool_falls_back_to_heuristic() {
        let table = default_table();
        let mut data = call("enablePresale(bool)", None);
        let mut w = [0u8; 32];
        w[0] = 0xff;
        w[31] = 1;
        data.extend_from_slice(&w);
        assert_eq!(
            table.classify(&data),
            Classification::Activate { heuristic: true }
        );

        let last = data.len() - 1;
        data[last] = 2;
        assert_eq!(table.classify(&data), Classification::Ambiguous);
    }

    #[test]
    fn unrelated_and_short_inputs_are_not_gating() {
        let table = default_table();
        assert_eq!(
            table.classify(&call("presale(uint256)", Some(1))),
            Classification::NotGating
        );
        assert_eq!(table.classify(&[0xd1, 0x45]), Classification::NotGating);
        assert_eq!(table.classify(&[]), Classification::NotGating);
    }

    #[test]
    fn duplicate_selectors_keep_first_variant() {
        let sel = selector_of("enablePresale(bool)").expect("sig");
        let table = RecognitionTable::from_config(&["enablePresale(bool)".to_string()], &[sel])
            .expect("table");
        assert_eq!(table.variants().len(), 1);
        assert_eq!(table.variants()[0].decode, ArgumentDecode::AbiBool);
    }
}
