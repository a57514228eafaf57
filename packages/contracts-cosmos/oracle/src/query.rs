//! Query handlers for the prophecy oracle.

use cosmwasm_std::{Deps, HexBinary, Order, StdError, StdResult};
use cw_storage_plus::Bound;

use crate::msg::{
    ConfigResponse, PropheciesResponse, ProphecyResponse, TokenResponse, ValidatorClaimResponse,
    ValidatorSetResponse,
};
use crate::prophecy::Prophecy;
use crate::state::{
    CONFIG, CURRENT_VALIDATOR_SET, DEFAULT_LIMIT, MAX_LIMIT, PROPHECIES, TOKENS, VALIDATOR_SETS,
};

// ============================================================================
// Core Queries
// ============================================================================

/// Query contract configuration.
pub fn query_config(deps: Deps) -> StdResult<ConfigResponse> {
    let config = CONFIG.load(deps.storage)?;
    Ok(ConfigResponse {
        admin: config.admin,
        quorum: config.quorum,
        expiry_blocks: config.expiry_blocks,
        accepted_kinds: config.accepted_kinds,
        validator_set_version: CURRENT_VALIDATOR_SET.load(deps.storage)?,
    })
}

/// Query a validator set snapshot (current when no version is given).
pub fn query_validator_set(deps: Deps, version: Option<u64>) -> StdResult<ValidatorSetResponse> {
    let version = match version {
        Some(version) => version,
        None => CURRENT_VALIDATOR_SET.load(deps.storage)?,
    };
    let set = VALIDATOR_SETS.load(deps.storage, version)?;
    Ok(ValidatorSetResponse {
        version: set.version,
        validators: set.validators,
        total_weight: set.total_weight,
        activated_at: set.activated_at,
    })
}

// ============================================================================
// Prophecy Queries
// ============================================================================

fn to_response(prophecy: Prophecy) -> ProphecyResponse {
    ProphecyResponse {
        prophecy_id: prophecy.id,
        attempt: prophecy.attempt,
        status: prophecy.status,
        content: prophecy.content,
        content_hash: prophecy.content_hash,
        validator_set_version: prophecy.validator_set_version,
        threshold: prophecy.threshold,
        tally: prophecy.tally,
        attestations: prophecy.attestations,
        opened_at: prophecy.opened_at,
        finalized_at: prophecy.finalized_at,
        needs_review: prophecy.needs_review,
        conflicts: prophecy.conflicts,
    }
}

/// Query the live record of a prophecy.
pub fn query_prophecy(deps: Deps, prophecy_id: HexBinary) -> StdResult<ProphecyResponse> {
    let prophecy = PROPHECIES
        .may_load(deps.storage, prophecy_id.as_slice())?
        .ok_or_else(|| StdError::not_found(format!("prophecy {}", prophecy_id.to_hex())))?;
    Ok(to_response(prophecy))
}

/// List live prophecies ordered by id.
pub fn query_prophecies(
    deps: Deps,
    start_after: Option<HexBinary>,
    limit: Option<u32>,
) -> StdResult<PropheciesResponse> {
    let limit = limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT) as usize;
    let start: Option<Bound<&[u8]>> = start_after
        .as_ref()
        .map(|id| Bound::exclusive(id.as_slice()));

    let prophecies = PROPHECIES
        .range(deps.storage, start, None, Order::Ascending)
        .take(limit)
        .map(|item| item.map(|(_, prophecy)| to_response(prophecy)))
        .collect::<StdResult<Vec<_>>>()?;

    Ok(PropheciesResponse { prophecies })
}

/// Whether a validator has a claim on the prophecy, and its content hash.
///
/// Relays use this to avoid resubmitting after a restart.
pub fn query_validator_claim(
    deps: Deps,
    prophecy_id: HexBinary,
    validator: String,
) -> StdResult<ValidatorClaimResponse> {
    let validator = deps.api.addr_validate(&validator)?;
    let content_hash = PROPHECIES
        .may_load(deps.storage, prophecy_id.as_slice())?
        .and_then(|prophecy| {
            prophecy
                .validator_claim(&validator)
                .map(|attestation| attestation.content_hash.clone())
        });

    Ok(ValidatorClaimResponse {
        exists: content_hash.is_some(),
        content_hash,
    })
}

// ============================================================================
// Token Queries
// ============================================================================

/// Query the delivery mode of a registered symbol.
pub fn query_token(deps: Deps, symbol: String) -> StdResult<TokenResponse> {
    let token = TOKENS
        .may_load(deps.storage, &symbol)?
        .ok_or_else(|| StdError::not_found(format!("token {}", symbol)))?;
    Ok(TokenResponse { symbol, token })
}
