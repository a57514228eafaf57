//! Prophecy Oracle - Entry Points
//!
//! The implementation is modularized into:
//! - `execute/` - Execute message handlers
//! - `query` - Query message handlers
//! - `prophecy` - The claim tally state machine

use cosmwasm_std::{
    entry_point, to_json_binary, Binary, Deps, DepsMut, Env, MessageInfo, Response, StdResult,
};
use cw2::set_contract_version;

use crate::collateral::query_collateral;
use crate::error::ContractError;
use crate::execute::{
    build_validator_set, execute_clear_review, execute_expire_prophecies,
    execute_register_token, execute_reopen_prophecy, execute_submit_claim, execute_update_config,
    execute_update_validators,
};
use crate::msg::{ClaimKind, ExecuteMsg, InstantiateMsg, MigrateMsg, QueryMsg};
use crate::query::{
    query_config, query_prophecies, query_prophecy, query_token, query_validator_claim,
    query_validator_set,
};
use crate::state::{
    Config, CONFIG, CONTRACT_NAME, CONTRACT_VERSION, CURRENT_VALIDATOR_SET, VALIDATOR_SETS,
};

// ============================================================================
// Instantiate
// ============================================================================

#[cfg_attr(not(feature = "library"), entry_point)]
pub fn instantiate(
    deps: DepsMut,
    env: Env,
    _info: MessageInfo,
    msg: InstantiateMsg,
) -> Result<Response, ContractError> {
    set_contract_version(deps.storage, CONTRACT_NAME, CONTRACT_VERSION)?;

    let admin = deps.api.addr_validate(&msg.admin)?;

    let quorum = msg.quorum.unwrap_or_default();
    if !quorum.is_valid() {
        return Err(ContractError::InvalidQuorum {
            numerator: quorum.numerator,
            denominator: quorum.denominator,
        });
    }
    if msg.expiry_blocks == 0 {
        return Err(ContractError::InvalidExpiry);
    }

    let set = build_validator_set(deps.api, 1, msg.validators, env.block.height)?;
    VALIDATOR_SETS.save(deps.storage, set.version, &set)?;
    CURRENT_VALIDATOR_SET.save(deps.storage, &set.version)?;

    let config = Config {
        admin,
        quorum,
        expiry_blocks: msg.expiry_blocks,
        accepted_kinds: msg
            .accepted_kinds
            .unwrap_or_else(|| vec![ClaimKind::LockOnEthereum]),
    };
    CONFIG.save(deps.storage, &config)?;

    Ok(Response::new()
        .add_attribute("method", "instantiate")
        .add_attribute("admin", config.admin)
        .add_attribute("validator_count", set.validators.len().to_string())
        .add_attribute("total_weight", set.total_weight.to_string())
        .add_attribute(
            "quorum",
            format!("{}/{}", quorum.numerator, quorum.denominator),
        )
        .add_attribute("expiry_blocks", config.expiry_blocks.to_string()))
}

// ============================================================================
// Execute
// ============================================================================

#[cfg_attr(not(feature = "library"), entry_point)]
pub fn execute(
    deps: DepsMut,
    env: Env,
    info: MessageInfo,
    msg: ExecuteMsg,
) -> Result<Response, ContractError> {
    match msg {
        // Validator claims
        ExecuteMsg::SubmitClaim { claim } => execute_submit_claim(deps, env, info, claim),
        ExecuteMsg::ExpireProphecies { limit } => execute_expire_prophecies(deps, env, limit),

        // Prophecy review
        ExecuteMsg::ReopenProphecy { prophecy_id } => {
            execute_reopen_prophecy(deps, info, prophecy_id)
        }
        ExecuteMsg::ClearReview { prophecy_id } => execute_clear_review(deps, info, prophecy_id),

        // Administration
        ExecuteMsg::UpdateValidators { validators } => {
            execute_update_validators(deps, env, info, validators)
        }
        ExecuteMsg::RegisterToken { symbol, token } => {
            execute_register_token(deps, info, symbol, token)
        }
        ExecuteMsg::UpdateConfig {
            admin,
            quorum,
            expiry_blocks,
            accepted_kinds,
        } => execute_update_config(deps, info, admin, quorum, expiry_blocks, accepted_kinds),
    }
}

// ============================================================================
// Query
// ============================================================================

#[cfg_attr(not(feature = "library"), entry_point)]
pub fn query(deps: Deps, _env: Env, msg: QueryMsg) -> StdResult<Binary> {
    match msg {
        QueryMsg::Config {} => to_json_binary(&query_config(deps)?),
        QueryMsg::ValidatorSet { version } => to_json_binary(&query_validator_set(deps, version)?),
        QueryMsg::Prophecy { prophecy_id } => to_json_binary(&query_prophecy(deps, prophecy_id)?),
        QueryMsg::Prophecies { start_after, limit } => {
            to_json_binary(&query_prophecies(deps, start_after, limit)?)
        }
        QueryMsg::ValidatorClaim {
            prophecy_id,
            validator,
        } => to_json_binary(&query_validator_claim(deps, prophecy_id, validator)?),
        QueryMsg::Token { symbol } => to_json_binary(&query_token(deps, symbol)?),

        // Already serialized JSON
        QueryMsg::Collateral { path } => query_collateral(deps, &path),
    }
}

// ============================================================================
// Migrate
// ============================================================================

#[cfg_attr(not(feature = "library"), entry_point)]
pub fn migrate(deps: DepsMut, _env: Env, _msg: MigrateMsg) -> Result<Response, ContractError> {
    set_contract_version(deps.storage, CONTRACT_NAME, CONTRACT_VERSION)?;
    Ok(Response::new()
        .add_attribute("method", "migrate")
        .add_attribute("version", CONTRACT_VERSION))
}
