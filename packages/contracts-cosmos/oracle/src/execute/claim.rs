//! Claim handlers.
//!
//! This module handles:
//! - `SubmitClaim` - tally a validator's claim, deliver on quorum
//! - `ExpireProphecies` - permissionless expiry sweep

use cosmwasm_std::{
    to_json_binary, Addr, BankMsg, Coin, CosmosMsg, Deps, DepsMut, Empty, Env, HexBinary,
    MessageInfo, Order, Response, StdResult, Uint128, WasmMsg,
};
use cw20::Cw20ExecuteMsg;

use crate::error::ContractError;
use crate::hash::{claim_content_hash, parse_evm_address, parse_prophecy_id};
use crate::msg::ClaimMsg;
use crate::prophecy::{ClaimContent, ClaimOutcome, Prophecy, Vote};
use crate::state::{
    current_validator_set, TokenMode, ARCHIVED_PROPHECIES, CONFIG, DEFAULT_LIMIT, MAX_LIMIT,
    OPEN_PROPHECIES, PROPHECIES, TOKENS, VALIDATOR_SETS,
};

const SIGNATURE_LENGTH: usize = 65;

// ============================================================================
// SubmitClaim - Validator
// ============================================================================

/// Record a validator's claim and run the delivery once quorum is reached.
///
/// Conflicting and equivocating claims are answered with `outcome=rejected`
/// rather than an error, so the review flag they set is persisted.
pub fn execute_submit_claim(
    deps: DepsMut,
    env: Env,
    info: MessageInfo,
    claim: ClaimMsg,
) -> Result<Response, ContractError> {
    let config = CONFIG.load(deps.storage)?;
    if !config.accepted_kinds.contains(&claim.kind) {
        return Err(ContractError::UnexpectedClaimKind { kind: claim.kind });
    }

    let id = parse_prophecy_id(claim.prophecy_id.as_slice())?;
    if claim.signature.len() != SIGNATURE_LENGTH {
        return Err(ContractError::InvalidSignature {
            got: claim.signature.len(),
        });
    }
    let token = parse_evm_address(&claim.token)?;

    let content_hash = HexBinary::from(claim_content_hash(
        &id,
        claim.kind.claim_type(),
        &claim.symbol,
        claim.amount,
        claim.destination.as_slice(),
        &token,
    ));
    let height = env.block.height;

    let (mut prophecy, created) = match PROPHECIES.may_load(deps.storage, &id)? {
        Some(mut prophecy) => {
            if prophecy.expire_if_due(height, config.expiry_blocks) {
                OPEN_PROPHECIES.remove(deps.storage, (prophecy.opened_at, &id));
            }
            (prophecy, false)
        }
        None => {
            let content = ClaimContent {
                kind: claim.kind,
                sender: claim.sender.clone(),
                symbol: claim.symbol.clone(),
                amount: claim.amount,
                destination: claim.destination.clone(),
                token: claim.token.to_lowercase(),
            };
            // Canonical content must be deliverable before anyone votes on it
            resolve_delivery(deps.as_ref(), &content)?;

            let set = current_validator_set(deps.storage)?;
            let attempt = next_attempt(deps.as_ref(), &id)?;
            let prophecy = Prophecy::open(
                claim.prophecy_id.clone(),
                attempt,
                content,
                content_hash.clone(),
                set.version,
                config.quorum.threshold(set.total_weight),
                height,
            );
            (prophecy, true)
        }
    };

    let set = VALIDATOR_SETS.load(deps.storage, prophecy.validator_set_version)?;
    let weight = set
        .weight_of(&info.sender)
        .ok_or_else(|| ContractError::NotAValidator {
            sender: info.sender.to_string(),
            version: set.version,
        })?;

    let outcome = prophecy.apply_claim(Vote {
        validator: info.sender.clone(),
        weight,
        content_hash: content_hash.clone(),
        signature: claim.signature,
        height,
    });

    let mut response = Response::new()
        .add_attribute("method", "submit_claim")
        .add_attribute("prophecy_id", claim.prophecy_id.to_hex())
        .add_attribute("attempt", prophecy.attempt.to_string())
        .add_attribute("validator", info.sender.to_string())
        .add_attribute("kind", claim.kind.as_str())
        .add_attribute("content_hash", content_hash.to_hex())
        .add_attribute("outcome", outcome.as_str());

    match outcome {
        ClaimOutcome::Finalized => {
            let (recipient, amount, mode) = resolve_delivery(deps.as_ref(), &prophecy.content)?;
            let message = delivery_msg(&mode, &recipient, amount)?;
            prophecy.mark_executed();
            if !created {
                OPEN_PROPHECIES.remove(deps.storage, (prophecy.opened_at, &id));
            }
            response = response
                .add_message(message)
                .add_attribute("action", delivery_action(&mode))
                .add_attribute("recipient", recipient.to_string())
                .add_attribute("amount", amount.to_string())
                .add_attribute("symbol", prophecy.content.symbol.clone());
        }
        ClaimOutcome::Rejected(reason) => {
            response = response
                .add_attribute("reason", reason.as_str())
                .add_attribute("needs_review", prophecy.needs_review.to_string());
        }
        ClaimOutcome::Opened
        | ClaimOutcome::Accepted
        | ClaimOutcome::Duplicate
        | ClaimOutcome::AuditOnly => {}
    }

    if created && outcome == ClaimOutcome::Opened {
        OPEN_PROPHECIES.save(deps.storage, (prophecy.opened_at, &id), &Empty {})?;
    }

    PROPHECIES.save(deps.storage, &id, &prophecy)?;

    Ok(response
        .add_attribute("status", format!("{:?}", prophecy.status).to_lowercase())
        .add_attribute("tally", prophecy.tally.to_string())
        .add_attribute("threshold", prophecy.threshold.to_string()))
}

// ============================================================================
// ExpireProphecies - Anyone
// ============================================================================

/// Expire up to `limit` open prophecies whose window has elapsed, oldest first.
pub fn execute_expire_prophecies(
    deps: DepsMut,
    env: Env,
    limit: Option<u32>,
) -> Result<Response, ContractError> {
    let config = CONFIG.load(deps.storage)?;
    let limit = limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT) as usize;
    let height = env.block.height;

    let due: Vec<(u64, Vec<u8>)> = OPEN_PROPHECIES
        .keys(deps.storage, None, None, Order::Ascending)
        .take(limit)
        .collect::<StdResult<Vec<_>>>()?
        .into_iter()
        .take_while(|(opened_at, _)| height >= opened_at.saturating_add(config.expiry_blocks))
        .collect();

    let mut expired = 0u32;
    for (opened_at, id) in due {
        OPEN_PROPHECIES.remove(deps.storage, (opened_at, &id));
        if let Some(mut prophecy) = PROPHECIES.may_load(deps.storage, &id)? {
            if prophecy.expire_if_due(height, config.expiry_blocks) {
                PROPHECIES.save(deps.storage, &id, &prophecy)?;
                expired += 1;
            }
        }
    }

    Ok(Response::new()
        .add_attribute("method", "expire_prophecies")
        .add_attribute("expired", expired.to_string()))
}

// ============================================================================
// Helpers
// ============================================================================

/// Attempt number for a new record: one past the last archived attempt
fn next_attempt(deps: Deps, id: &[u8]) -> StdResult<u32> {
    let last = ARCHIVED_PROPHECIES
        .prefix(id)
        .keys(deps.storage, None, None, Order::Descending)
        .next()
        .transpose()?;
    Ok(last.map(|attempt| attempt + 1).unwrap_or(1))
}

/// Recipient, amount and delivery mode of a claim's content
pub(crate) fn resolve_delivery(
    deps: Deps,
    content: &ClaimContent,
) -> Result<(Addr, Uint128, TokenMode), ContractError> {
    let mode = TOKENS
        .may_load(deps.storage, &content.symbol)?
        .ok_or_else(|| ContractError::TokenNotRegistered {
            symbol: content.symbol.clone(),
        })?;

    let destination = std::str::from_utf8(content.destination.as_slice()).map_err(|_| {
        ContractError::InvalidAddress {
            reason: "destination is not a UTF-8 address".to_string(),
        }
    })?;
    let recipient = deps
        .api
        .addr_validate(destination)
        .map_err(|e| ContractError::InvalidAddress {
            reason: format!("{}: {}", destination, e),
        })?;

    if content.amount.is_zero() {
        return Err(ContractError::InvalidAmount {
            reason: "Amount must be greater than zero".to_string(),
        });
    }
    let amount = Uint128::try_from(content.amount).map_err(|_| ContractError::InvalidAmount {
        reason: format!("{} exceeds 128 bits", content.amount),
    })?;

    Ok((recipient, amount, mode))
}

fn delivery_msg(mode: &TokenMode, recipient: &Addr, amount: Uint128) -> StdResult<CosmosMsg> {
    let message = match mode {
        TokenMode::Mint { cw20 } => CosmosMsg::Wasm(WasmMsg::Execute {
            contract_addr: cw20.clone(),
            msg: to_json_binary(&Cw20ExecuteMsg::Mint {
                recipient: recipient.to_string(),
                amount,
            })?,
            funds: vec![],
        }),
        TokenMode::UnlockNative { denom } => CosmosMsg::Bank(BankMsg::Send {
            to_address: recipient.to_string(),
            amount: vec![Coin {
                denom: denom.clone(),
                amount,
            }],
        }),
        TokenMode::UnlockCw20 { cw20 } => CosmosMsg::Wasm(WasmMsg::Execute {
            contract_addr: cw20.clone(),
            msg: to_json_binary(&Cw20ExecuteMsg::Transfer {
                recipient: recipient.to_string(),
                amount,
            })?,
            funds: vec![],
        }),
    };
    Ok(message)
}

fn delivery_action(mode: &TokenMode) -> &'static str {
    match mode {
        TokenMode::Mint { .. } => "mint",
        TokenMode::UnlockNative { .. } | TokenMode::UnlockCw20 { .. } => "unlock",
    }
}
