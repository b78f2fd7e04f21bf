//! Call argument encoding and reference resolution.
//!
//! Arguments stay symbolic (`AddressOf`/`ClassHashOf`) until resolved
//! against the run registry, which makes each request's data dependencies
//! explicit. String arguments encode as Cairo `ByteArray`s:
//! `[full_words_len, full_words..., pending_word, pending_word_len]` with
//! 31-byte words.

use starknet::core::types::FieldElement;

use crate::orchestrator::registry::RunRegistry;
use crate::types::{ContractName, DeployError, DeployResult};

const BYTE_ARRAY_WORD_SIZE: usize = 31;

/// One constructor or invoke argument.
#[derive(Debug, Clone)]
pub enum CallArg {
    /// A concrete field element
    Felt(FieldElement),
    /// A string, serialized as a Cairo `ByteArray`
    Str(String),
    /// The address of a contract planned earlier or found in the manifest
    AddressOf(ContractName),
    /// The class hash of a contract declared earlier or found in the manifest
    ClassHashOf(ContractName),
}

impl CallArg {
    pub fn str(value: impl Into<String>) -> Self {
        CallArg::Str(value.into())
    }

    pub fn address_of(name: impl Into<ContractName>) -> Self {
        CallArg::AddressOf(name.into())
    }

    pub fn class_hash_of(name: impl Into<ContractName>) -> Self {
        CallArg::ClassHashOf(name.into())
    }

    /// The contract this argument depends on, if it is a reference.
    pub fn referenced_contract(&self) -> Option<&ContractName> {
        match self {
            CallArg::AddressOf(name) | CallArg::ClassHashOf(name) => Some(name),
            _ => None,
        }
    }
}

impl From<FieldElement> for CallArg {
    fn from(value: FieldElement) -> Self {
        CallArg::Felt(value)
    }
}

/// Resolve a list of arguments into raw calldata.
///
/// Fails with `UnresolvedReference` on the first reference the registry
/// cannot satisfy; callers rely on this happening before any network I/O.
pub fn resolve_args(args: &[CallArg], registry: &RunRegistry) -> DeployResult<Vec<FieldElement>> {
    let mut calldata = Vec::with_capacity(args.len());
    for arg in args {
        match arg {
            CallArg::Felt(value) => calldata.push(*value),
            CallArg::Str(value) => calldata.extend(encode_byte_array(value)),
            CallArg::AddressOf(name) => calldata.push(
                registry
                    .address_of(name)
                    .ok_or_else(|| DeployError::UnresolvedReference(name.clone()))?,
            ),
            CallArg::ClassHashOf(name) => calldata.push(
                registry
                    .class_hash_of(name)
                    .ok_or_else(|| DeployError::UnresolvedReference(name.clone()))?,
            ),
        }
    }
    Ok(calldata)
}

/// Serialize a string as a Cairo `ByteArray`.
pub fn encode_byte_array(value: &str) -> Vec<FieldElement> {
    let bytes = value.as_bytes();
    let mut chunks = bytes.chunks_exact(BYTE_ARRAY_WORD_SIZE);

    let mut out = Vec::new();
    let full_words: Vec<FieldElement> = chunks
        .by_ref()
        // A 31-byte big-endian value is always below the field modulus
        .map(|word| FieldElement::from_byte_slice_be(word).expect("31-byte word fits a felt"))
        .collect();
    let remainder = chunks.remainder();

    out.push(FieldElement::from(full_words.len() as u64));
    out.extend(full_words);
    if remainder.is_empty() {
        out.push(FieldElement::ZERO);
        out.push(FieldElement::ZERO);
    } else {
        out.push(FieldElement::from_byte_slice_be(remainder).expect("short word fits a felt"));
        out.push(FieldElement::from(remainder.len() as u64));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_empty_string() {
        assert_eq!(
            encode_byte_array(""),
            vec![FieldElement::ZERO, FieldElement::ZERO, FieldElement::ZERO]
        );
    }

    #[test]
    fn test_encode_short_string() {
        // "abc" fits entirely in the pending word
        let encoded = encode_byte_array("abc");
        assert_eq!(
            encoded,
            vec![
                FieldElement::ZERO,
                FieldElement::from_hex_be("0x616263").unwrap(),
                FieldElement::from(3u64),
            ]
        );
    }

    #[test]
    fn test_encode_exact_word() {
        // 31 bytes fill one word and leave nothing pending
        let value = "0123456789012345678901234567890";
        assert_eq!(value.len(), 31);
        let encoded = encode_byte_array(value);
        assert_eq!(encoded.len(), 4);
        assert_eq!(encoded[0], FieldElement::ONE);
        assert_eq!(
            encoded[1],
            FieldElement::from_byte_slice_be(value.as_bytes()).unwrap()
        );
        assert_eq!(encoded[2], FieldElement::ZERO);
        assert_eq!(encoded[3], FieldElement::ZERO);
    }

    #[test]
    fn test_encode_long_string() {
        let value = "https://bb-backend-stg.onrender.com/reward/loomi/";
        let encoded = encode_byte_array(value);
        let full = value.len() / 31;
        let pending = value.len() % 31;
        assert_eq!(encoded[0], FieldElement::from(full as u64));
        assert_eq!(encoded.len(), full + 3);
        assert_eq!(*encoded.last().unwrap(), FieldElement::from(pending as u64));
    }

    #[test]
    fn test_resolve_felt_and_reference() {
        let mut registry = RunRegistry::new();
        registry.record_address(ContractName::from("Loomi"), FieldElement::from(42u64));

        let args = vec![
            CallArg::Felt(FieldElement::ONE),
            CallArg::address_of("Loomi"),
        ];
        let calldata = resolve_args(&args, &registry).unwrap();
        assert_eq!(calldata, vec![FieldElement::ONE, FieldElement::from(42u64)]);
    }

    #[test]
    fn test_resolve_missing_reference() {
        let registry = RunRegistry::new();
        let args = vec![CallArg::class_hash_of("Quest")];
        let err = resolve_args(&args, &registry).unwrap_err();
        assert!(matches!(err, DeployError::UnresolvedReference(name) if name.as_str() == "Quest"));
    }
}
