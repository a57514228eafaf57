//! Error types for the prophecy oracle contract

use cosmwasm_std::StdError;
use thiserror::Error;

use crate::msg::ClaimKind;

#[derive(Error, Debug, PartialEq)]
pub enum ContractError {
    #[error("{0}")]
    Std(#[from] StdError),

    // ========================================================================
    // Authorization Errors
    // ========================================================================

    #[error("Unauthorized: only admin can perform this action")]
    Unauthorized,

    #[error("Unauthorized: {sender} is not in validator set {version}")]
    NotAValidator { sender: String, version: u64 },

    // ========================================================================
    // Claim Errors
    // ========================================================================

    #[error("Claim kind {kind} is not accepted by this oracle")]
    UnexpectedClaimKind { kind: ClaimKind },

    #[error("Invalid hash length: expected 32 bytes, got {got}")]
    InvalidHashLength { got: usize },

    #[error("Invalid signature: expected 65 bytes, got {got}")]
    InvalidSignature { got: usize },

    #[error("Invalid address: {reason}")]
    InvalidAddress { reason: String },

    #[error("Invalid amount: {reason}")]
    InvalidAmount { reason: String },

    #[error("Token not registered: {symbol}")]
    TokenNotRegistered { symbol: String },

    // ========================================================================
    // Prophecy Errors
    // ========================================================================

    #[error("Prophecy not found: {prophecy_id}")]
    ProphecyNotFound { prophecy_id: String },

    #[error("Prophecy {prophecy_id} is not expired")]
    ProphecyNotExpired { prophecy_id: String },

    #[error("Prophecy {prophecy_id} is not flagged for review")]
    NotUnderReview { prophecy_id: String },

    // ========================================================================
    // Configuration Errors
    // ========================================================================

    #[error("Invalid validator set: {reason}")]
    InvalidValidatorSet { reason: String },

    #[error("Invalid quorum: {numerator}/{denominator}")]
    InvalidQuorum { numerator: u64, denominator: u64 },

    #[error("Expiry window must be greater than zero")]
    InvalidExpiry,
}
