//! Hash computation for prophecy identifiers and claim content
//!
//! The oracle contract recomputes the same digests on chain, so the byte
//! layouts here are part of the wire contract:
//!
//! - Ethereum lock: `keccak256(chainId word ‖ bridge address word ‖ lock id)`
//! - Cosmos message: `keccak256("COSMOS" ‖ chain_id ‖ ":" ‖ tx_hash ‖ msg_index_be32)`
//! - Claim content: `keccak256(prophecy_id ‖ claim_type word ‖ keccak(symbol) ‖
//!   amount ‖ keccak(destination) ‖ token word)`
//!
//! Words are 32 bytes, left-padded, big-endian (`abi.encode` layout).

use tiny_keccak::{Hasher, Keccak};

/// Domain prefix for identifiers derived from Cosmos messages
pub const COSMOS_ID_DOMAIN: &[u8] = b"COSMOS";

/// Compute keccak256 hash of data
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    hasher.update(data);
    let mut output = [0u8; 32];
    hasher.finalize(&mut output);
    output
}

/// Left-pad a 20-byte EVM address into a 32-byte word
pub fn address_to_word(address: &[u8; 20]) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[12..].copy_from_slice(address);
    word
}

/// Encode a u64 as a 32-byte big-endian word
pub fn u64_to_word(value: u64) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[24..].copy_from_slice(&value.to_be_bytes());
    word
}

/// Prophecy id for an Ethereum `LogLock` event
///
/// The lock id is only unique per bridge contract and chain, so both are
/// folded into the digest.
pub fn lock_prophecy_id(chain_id: u64, bridge_contract: &[u8; 20], lock_id: &[u8; 32]) -> [u8; 32] {
    let mut data = [0u8; 96];
    data[0..32].copy_from_slice(&u64_to_word(chain_id));
    data[32..64].copy_from_slice(&address_to_word(bridge_contract));
    data[64..96].copy_from_slice(lock_id);
    keccak256(&data)
}

/// Prophecy id for a Cosmos burn/lock message
pub fn cosmos_prophecy_id(chain_id: &str, tx_hash: &str, msg_index: u32) -> [u8; 32] {
    let mut data = Vec::with_capacity(
        COSMOS_ID_DOMAIN.len() + chain_id.len() + 1 + tx_hash.len() + 4,
    );
    data.extend_from_slice(COSMOS_ID_DOMAIN);
    data.extend_from_slice(chain_id.as_bytes());
    data.push(b':');
    // Tx hashes are case-insensitive hex; hash the canonical uppercase form
    data.extend_from_slice(tx_hash.to_ascii_uppercase().as_bytes());
    data.extend_from_slice(&msg_index.to_be_bytes());
    keccak256(&data)
}

/// Digest of the agreed-upon content of a claim
pub fn claim_content_hash(
    prophecy_id: &[u8; 32],
    claim_type: u8,
    symbol: &str,
    amount: &[u8; 32],
    destination: &[u8],
    token: &[u8; 20],
) -> [u8; 32] {
    let mut data = [0u8; 192];
    data[0..32].copy_from_slice(prophecy_id);
    data[63] = claim_type;
    data[64..96].copy_from_slice(&keccak256(symbol.as_bytes()));
    data[96..128].copy_from_slice(amount);
    data[128..160].copy_from_slice(&keccak256(destination));
    data[160..192].copy_from_slice(&address_to_word(token));
    keccak256(&data)
}

/// Short hex form for logs: first and last four bytes
pub fn short_hex(bytes: &[u8]) -> String {
    if bytes.len() <= 8 {
        return format!("0x{}", hex::encode(bytes));
    }
    format!(
        "0x{}..{}",
        hex::encode(&bytes[..4]),
        hex::encode(&bytes[bytes.len() - 4..])
    )
}
