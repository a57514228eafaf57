//! Admin operations handlers.
//!
//! This module handles:
//! - Validator set rotation
//! - Token registry and configuration
//! - Review of expired or conflicting prophecies

use std::collections::BTreeSet;

use cosmwasm_std::{Api, DepsMut, Env, HexBinary, MessageInfo, Response};

use crate::error::ContractError;
use crate::hash::parse_prophecy_id;
use crate::msg::{ClaimKind, Quorum, ValidatorInput};
use crate::prophecy::ProphecyStatus;
use crate::state::{
    Config, TokenMode, ValidatorSet, ValidatorWeight, ARCHIVED_PROPHECIES, CONFIG,
    CURRENT_VALIDATOR_SET, PROPHECIES, TOKENS, VALIDATOR_SETS,
};

fn ensure_admin(config: &Config, info: &MessageInfo) -> Result<(), ContractError> {
    if info.sender != config.admin {
        return Err(ContractError::Unauthorized);
    }
    Ok(())
}

// ============================================================================
// Validator Set
// ============================================================================

/// Validate validator inputs into a snapshot.
///
/// The set must be non-empty, every weight positive and every address unique.
pub(crate) fn build_validator_set(
    api: &dyn Api,
    version: u64,
    inputs: Vec<ValidatorInput>,
    activated_at: u64,
) -> Result<ValidatorSet, ContractError> {
    if inputs.is_empty() {
        return Err(ContractError::InvalidValidatorSet {
            reason: "At least one validator required".to_string(),
        });
    }

    let mut seen = BTreeSet::new();
    let mut validators = Vec::with_capacity(inputs.len());
    let mut total_weight = 0u64;
    for input in inputs {
        let address = api.addr_validate(&input.address)?;
        if input.weight == 0 {
            return Err(ContractError::InvalidValidatorSet {
                reason: format!("{} has zero weight", address),
            });
        }
        if !seen.insert(address.clone()) {
            return Err(ContractError::InvalidValidatorSet {
                reason: format!("{} listed twice", address),
            });
        }
        total_weight = total_weight.checked_add(input.weight).ok_or_else(|| {
            ContractError::InvalidValidatorSet {
                reason: "Total weight overflows".to_string(),
            }
        })?;
        validators.push(ValidatorWeight {
            address,
            weight: input.weight,
        });
    }

    Ok(ValidatorSet {
        version,
        validators,
        total_weight,
        activated_at,
    })
}

/// Install a new validator set snapshot.
///
/// Open prophecies keep tallying against the snapshot they opened with.
pub fn execute_update_validators(
    deps: DepsMut,
    env: Env,
    info: MessageInfo,
    validators: Vec<ValidatorInput>,
) -> Result<Response, ContractError> {
    let config = CONFIG.load(deps.storage)?;
    ensure_admin(&config, &info)?;

    let version = CURRENT_VALIDATOR_SET.load(deps.storage)? + 1;
    let set = build_validator_set(deps.api, version, validators, env.block.height)?;
    VALIDATOR_SETS.save(deps.storage, version, &set)?;
    CURRENT_VALIDATOR_SET.save(deps.storage, &version)?;

    Ok(Response::new()
        .add_attribute("method", "update_validators")
        .add_attribute("version", version.to_string())
        .add_attribute("validator_count", set.validators.len().to_string())
        .add_attribute("total_weight", set.total_weight.to_string()))
}

// ============================================================================
// Token Registry
// ============================================================================

/// Register (or replace) how a symbol is delivered.
pub fn execute_register_token(
    deps: DepsMut,
    info: MessageInfo,
    symbol: String,
    token: TokenMode,
) -> Result<Response, ContractError> {
    let config = CONFIG.load(deps.storage)?;
    ensure_admin(&config, &info)?;

    if symbol.trim().is_empty() {
        return Err(ContractError::TokenNotRegistered { symbol });
    }

    let token = match token {
        TokenMode::Mint { cw20 } => TokenMode::Mint {
            cw20: deps.api.addr_validate(&cw20)?.to_string(),
        },
        TokenMode::UnlockCw20 { cw20 } => TokenMode::UnlockCw20 {
            cw20: deps.api.addr_validate(&cw20)?.to_string(),
        },
        TokenMode::UnlockNative { denom } => {
            if denom.is_empty() {
                return Err(ContractError::InvalidAddress {
                    reason: "Native denom must not be empty".to_string(),
                });
            }
            TokenMode::UnlockNative { denom }
        }
    };
    TOKENS.save(deps.storage, &symbol, &token)?;

    Ok(Response::new()
        .add_attribute("method", "register_token")
        .add_attribute("symbol", symbol))
}

// ============================================================================
// Configuration
// ============================================================================

pub fn execute_update_config(
    deps: DepsMut,
    info: MessageInfo,
    admin: Option<String>,
    quorum: Option<Quorum>,
    expiry_blocks: Option<u64>,
    accepted_kinds: Option<Vec<ClaimKind>>,
) -> Result<Response, ContractError> {
    let mut config = CONFIG.load(deps.storage)?;
    ensure_admin(&config, &info)?;

    if let Some(admin) = admin {
        config.admin = deps.api.addr_validate(&admin)?;
    }
    if let Some(quorum) = quorum {
        if !quorum.is_valid() {
            return Err(ContractError::InvalidQuorum {
                numerator: quorum.numerator,
                denominator: quorum.denominator,
            });
        }
        config.quorum = quorum;
    }
    if let Some(expiry_blocks) = expiry_blocks {
        if expiry_blocks == 0 {
            return Err(ContractError::InvalidExpiry);
        }
        config.expiry_blocks = expiry_blocks;
    }
    if let Some(kinds) = accepted_kinds {
        config.accepted_kinds = kinds;
    }
    CONFIG.save(deps.storage, &config)?;

    Ok(Response::new()
        .add_attribute("method", "update_config")
        .add_attribute("admin", config.admin)
        .add_attribute("expiry_blocks", config.expiry_blocks.to_string()))
}

// ============================================================================
// Prophecy Review
// ============================================================================

/// Archive an expired prophecy. The next claim for the id opens a fresh
/// attempt against the then-current validator set.
pub fn execute_reopen_prophecy(
    deps: DepsMut,
    info: MessageInfo,
    prophecy_id: HexBinary,
) -> Result<Response, ContractError> {
    let config = CONFIG.load(deps.storage)?;
    ensure_admin(&config, &info)?;

    let id = parse_prophecy_id(prophecy_id.as_slice())?;
    let prophecy = PROPHECIES
        .may_load(deps.storage, &id)?
        .ok_or_else(|| ContractError::ProphecyNotFound {
            prophecy_id: prophecy_id.to_hex(),
        })?;
    if prophecy.status != ProphecyStatus::Expired {
        return Err(ContractError::ProphecyNotExpired {
            prophecy_id: prophecy_id.to_hex(),
        });
    }

    ARCHIVED_PROPHECIES.save(deps.storage, (&id, prophecy.attempt), &prophecy)?;
    PROPHECIES.remove(deps.storage, &id);

    Ok(Response::new()
        .add_attribute("method", "reopen_prophecy")
        .add_attribute("prophecy_id", prophecy_id.to_hex())
        .add_attribute("archived_attempt", prophecy.attempt.to_string()))
}

/// Clear the review flag after the conflict has been looked at.
pub fn execute_clear_review(
    deps: DepsMut,
    info: MessageInfo,
    prophecy_id: HexBinary,
) -> Result<Response, ContractError> {
    let config = CONFIG.load(deps.storage)?;
    ensure_admin(&config, &info)?;

    let id = parse_prophecy_id(prophecy_id.as_slice())?;
    let mut prophecy = PROPHECIES
        .may_load(deps.storage, &id)?
        .ok_or_else(|| ContractError::ProphecyNotFound {
            prophecy_id: prophecy_id.to_hex(),
        })?;
    if !prophecy.needs_review {
        return Err(ContractError::NotUnderReview {
            prophecy_id: prophecy_id.to_hex(),
        });
    }

    prophecy.needs_review = false;
    PROPHECIES.save(deps.storage, &id, &prophecy)?;

    Ok(Response::new()
        .add_attribute("method", "clear_review")
        .add_attribute("prophecy_id", prophecy_id.to_hex())
        .add_attribute("conflicts", prophecy.conflicts.to_string()))
}
