//! Claim content hashing
//!
//! Validators sign, and the relay compares, the same digest this module
//! computes on chain:
//!
//! ```text
//! keccak256(prophecy_id ‖ claim_type word ‖ keccak256(symbol) ‖ amount word
//!           ‖ keccak256(destination) ‖ token word)
//! ```
//!
//! Words are 32 bytes, left-padded, big-endian (`abi.encode` layout).

use cosmwasm_std::Uint256;
use tiny_keccak::{Hasher, Keccak};

use crate::error::ContractError;

/// Compute keccak256 hash of arbitrary data
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    hasher.update(data);
    let mut output = [0u8; 32];
    hasher.finalize(&mut output);
    output
}

/// Digest of the content every validator must agree on
pub fn claim_content_hash(
    prophecy_id: &[u8; 32],
    claim_type: u8,
    symbol: &str,
    amount: Uint256,
    destination: &[u8],
    token: &[u8; 20],
) -> [u8; 32] {
    let mut data = [0u8; 192];
    data[0..32].copy_from_slice(prophecy_id);
    data[63] = claim_type;
    data[64..96].copy_from_slice(&keccak256(symbol.as_bytes()));
    data[96..128].copy_from_slice(&amount.to_be_bytes());
    data[128..160].copy_from_slice(&keccak256(destination));
    data[172..192].copy_from_slice(token);
    keccak256(&data)
}

/// Parse a 32-byte prophecy id
pub fn parse_prophecy_id(bytes: &[u8]) -> Result<[u8; 32], ContractError> {
    bytes
        .try_into()
        .map_err(|_| ContractError::InvalidHashLength { got: bytes.len() })
}

/// Parse a 0x-prefixed 20-byte EVM address
pub fn parse_evm_address(value: &str) -> Result<[u8; 20], ContractError> {
    let invalid = |reason: String| ContractError::InvalidAddress { reason };

    let stripped = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .ok_or_else(|| invalid(format!("{} is missing the 0x prefix", value)))?;
    let bytes = hex::decode(stripped).map_err(|e| invalid(format!("{}: {}", value, e)))?;
    bytes
        .try_into()
        .map_err(|b: Vec<u8>| invalid(format!("expected 20 bytes, got {}", b.len())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keccak256_empty() {
        assert_eq!(
            hex::encode(keccak256(b"")),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn test_content_hash_covers_every_field() {
        let id = [1u8; 32];
        let token = [0xbb; 20];
        let base = claim_content_hash(&id, 3, "ETH", Uint256::from(1000u64), b"cosmos1xyz", &token);

        assert_ne!(base, claim_content_hash(&[2u8; 32], 3, "ETH", Uint256::from(1000u64), b"cosmos1xyz", &token));
        assert_ne!(base, claim_content_hash(&id, 1, "ETH", Uint256::from(1000u64), b"cosmos1xyz", &token));
        assert_ne!(base, claim_content_hash(&id, 3, "DAI", Uint256::from(1000u64), b"cosmos1xyz", &token));
        assert_ne!(base, claim_content_hash(&id, 3, "ETH", Uint256::from(999u64), b"cosmos1xyz", &token));
        assert_ne!(base, claim_content_hash(&id, 3, "ETH", Uint256::from(1000u64), b"cosmos1abc", &token));
        assert_ne!(base, claim_content_hash(&id, 3, "ETH", Uint256::from(1000u64), b"cosmos1xyz", &[0xcc; 20]));
    }

    #[test]
    fn test_parse_evm_address() {
        let parsed = parse_evm_address("0x1111111111111111111111111111111111111111").unwrap();
        assert_eq!(parsed, [0x11; 20]);

        assert!(parse_evm_address("1111111111111111111111111111111111111111").is_err());
        assert!(parse_evm_address("0x1111").is_err());
        assert!(parse_evm_address("0xzz11111111111111111111111111111111111111").is_err());
    }

    #[test]
    fn test_parse_prophecy_id() {
        assert!(parse_prophecy_id(&[0u8; 32]).is_ok());
        assert_eq!(
            parse_prophecy_id(&[0u8; 31]).unwrap_err(),
            ContractError::InvalidHashLength { got: 31 }
        );
    }
}
