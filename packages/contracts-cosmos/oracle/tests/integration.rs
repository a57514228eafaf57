//! Integration tests for the prophecy oracle using cw-multi-test.
//!
//! Validators v1/v2/v3 carry weights 40/40/20 with a 2/3 quorum, so any two
//! of v1, v2 plus anything else finalize while v1 + v3 alone do not.

use cosmwasm_std::{coins, Addr, Binary, HexBinary, Uint128, Uint256};
use cw20::{BalanceResponse, Cw20QueryMsg, MinterResponse};
use cw_multi_test::{App, AppResponse, ContractWrapper, Executor};

use oracle::msg::{
    ClaimKind, ClaimMsg, ConfigResponse, ExecuteMsg, InstantiateMsg, PropheciesResponse,
    ProphecyResponse, QueryMsg, ValidatorClaimResponse, ValidatorInput, ValidatorSetResponse,
};
use oracle::prophecy::ProphecyStatus;
use oracle::state::TokenMode;

// ============================================================================
// Test Setup
// ============================================================================

const EXPIRY_BLOCKS: u64 = 100;

fn contract_oracle() -> Box<dyn cw_multi_test::Contract<cosmwasm_std::Empty>> {
    let contract = ContractWrapper::new(
        oracle::contract::execute,
        oracle::contract::instantiate,
        oracle::contract::query,
    );
    Box::new(contract)
}

fn contract_cw20() -> Box<dyn cw_multi_test::Contract<cosmwasm_std::Empty>> {
    let contract = ContractWrapper::new(
        cw20_base::contract::execute,
        cw20_base::contract::instantiate,
        cw20_base::contract::query,
    );
    Box::new(contract)
}

struct TestEnv {
    app: App,
    oracle: Addr,
    cw20: Addr,
    admin: Addr,
    v1: Addr,
    v2: Addr,
    v3: Addr,
    recipient: Addr,
}

fn setup() -> TestEnv {
    let mut app = App::default();

    let admin = Addr::unchecked("cosmos1admin");
    let v1 = Addr::unchecked("cosmos1validator1");
    let v2 = Addr::unchecked("cosmos1validator2");
    let v3 = Addr::unchecked("cosmos1validator3");
    let recipient = Addr::unchecked("cosmos1recipient");

    let oracle_code = app.store_code(contract_oracle());
    let oracle = app
        .instantiate_contract(
            oracle_code,
            admin.clone(),
            &InstantiateMsg {
                admin: admin.to_string(),
                validators: vec![
                    ValidatorInput {
                        address: v1.to_string(),
                        weight: 40,
                    },
                    ValidatorInput {
                        address: v2.to_string(),
                        weight: 40,
                    },
                    ValidatorInput {
                        address: v3.to_string(),
                        weight: 20,
                    },
                ],
                quorum: None,
                expiry_blocks: EXPIRY_BLOCKS,
                accepted_kinds: Some(vec![ClaimKind::LockOnEthereum]),
            },
            &[],
            "peggy-oracle",
            Some(admin.to_string()),
        )
        .unwrap();

    // Pegged ETH, minted by the oracle
    let cw20_code = app.store_code(contract_cw20());
    let cw20 = app
        .instantiate_contract(
            cw20_code,
            admin.clone(),
            &cw20_base::msg::InstantiateMsg {
                name: "Pegged Ether".to_string(),
                symbol: "PETH".to_string(),
                decimals: 18,
                initial_balances: vec![],
                mint: Some(MinterResponse {
                    minter: oracle.to_string(),
                    cap: None,
                }),
                marketing: None,
            },
            &[],
            "peth",
            None,
        )
        .unwrap();

    app.execute_contract(
        admin.clone(),
        oracle.clone(),
        &ExecuteMsg::RegisterToken {
            symbol: "ETH".to_string(),
            token: TokenMode::Mint {
                cw20: cw20.to_string(),
            },
        },
        &[],
    )
    .unwrap();

    TestEnv {
        app,
        oracle,
        cw20,
        admin,
        v1,
        v2,
        v3,
        recipient,
    }
}

fn prophecy_id(tag: u8) -> HexBinary {
    HexBinary::from(vec![tag; 32])
}

fn claim(id: &HexBinary, amount: u128) -> ClaimMsg {
    ClaimMsg {
        prophecy_id: id.clone(),
        kind: ClaimKind::LockOnEthereum,
        sender: Binary::from(vec![0xaa; 20]),
        symbol: "ETH".to_string(),
        amount: Uint256::from(amount),
        destination: Binary::from(b"cosmos1recipient".to_vec()),
        token: format!("0x{}", "bb".repeat(20)),
        signature: Binary::from(vec![1u8; 65]),
    }
}

fn submit(env: &mut TestEnv, validator: &Addr, claim: ClaimMsg) -> anyhow::Result<AppResponse> {
    env.app.execute_contract(
        validator.clone(),
        env.oracle.clone(),
        &ExecuteMsg::SubmitClaim { claim },
        &[],
    )
}

fn attr(res: &AppResponse, key: &str) -> Option<String> {
    res.events
        .iter()
        .flat_map(|e| e.attributes.iter())
        .find(|a| a.key == key)
        .map(|a| a.value.clone())
}

fn prophecy(env: &TestEnv, id: &HexBinary) -> ProphecyResponse {
    env.app
        .wrap()
        .query_wasm_smart(
            &env.oracle,
            &QueryMsg::Prophecy {
                prophecy_id: id.clone(),
            },
        )
        .unwrap()
}

fn cw20_balance(env: &TestEnv, address: &Addr) -> Uint128 {
    let res: BalanceResponse = env
        .app
        .wrap()
        .query_wasm_smart(
            &env.cw20,
            &Cw20QueryMsg::Balance {
                address: address.to_string(),
            },
        )
        .unwrap();
    res.balance
}

fn advance_blocks(env: &mut TestEnv, blocks: u64) {
    env.app.update_block(|block| {
        block.height += blocks;
        block.time = block.time.plus_seconds(blocks * 5);
    });
}

// ============================================================================
// Instantiate
// ============================================================================

#[test]
fn test_instantiate() {
    let env = setup();

    let config: ConfigResponse = env
        .app
        .wrap()
        .query_wasm_smart(&env.oracle, &QueryMsg::Config {})
        .unwrap();
    assert_eq!(config.admin, env.admin);
    assert_eq!(config.expiry_blocks, EXPIRY_BLOCKS);
    assert_eq!(config.validator_set_version, 1);
    assert_eq!(config.accepted_kinds, vec![ClaimKind::LockOnEthereum]);

    let set: ValidatorSetResponse = env
        .app
        .wrap()
        .query_wasm_smart(&env.oracle, &QueryMsg::ValidatorSet { version: None })
        .unwrap();
    assert_eq!(set.version, 1);
    assert_eq!(set.total_weight, 100);
    assert_eq!(set.validators.len(), 3);
}

#[test]
fn test_instantiate_rejects_bad_validator_sets() {
    let mut app = App::default();
    let admin = Addr::unchecked("cosmos1admin");
    let code_id = app.store_code(contract_oracle());

    let cases = vec![
        (vec![], "At least one validator"),
        (
            vec![ValidatorInput {
                address: "cosmos1validator1".to_string(),
                weight: 0,
            }],
            "zero weight",
        ),
        (
            vec![
                ValidatorInput {
                    address: "cosmos1validator1".to_string(),
                    weight: 10,
                },
                ValidatorInput {
                    address: "cosmos1validator1".to_string(),
                    weight: 10,
                },
            ],
            "listed twice",
        ),
    ];

    for (validators, expected) in cases {
        let res = app.instantiate_contract(
            code_id,
            admin.clone(),
            &InstantiateMsg {
                admin: admin.to_string(),
                validators,
                quorum: None,
                expiry_blocks: EXPIRY_BLOCKS,
                accepted_kinds: None,
            },
            &[],
            "peggy-oracle",
            None,
        );
        let err_str = res.unwrap_err().root_cause().to_string();
        assert!(err_str.contains(expected), "{}", err_str);
    }
}

// ============================================================================
// Quorum
// ============================================================================

#[test]
fn test_two_heavy_validators_finalize_and_mint() {
    let mut env = setup();
    let id = prophecy_id(1);
    let (v1, v2) = (env.v1.clone(), env.v2.clone());

    let res = submit(&mut env, &v1, claim(&id, 1000)).unwrap();
    assert_eq!(attr(&res, "outcome").as_deref(), Some("opened"));
    assert_eq!(cw20_balance(&env, &env.recipient), Uint128::zero());

    let res = submit(&mut env, &v2, claim(&id, 1000)).unwrap();
    assert_eq!(attr(&res, "outcome").as_deref(), Some("finalized"));
    assert_eq!(attr(&res, "action").as_deref(), Some("mint"));

    assert_eq!(cw20_balance(&env, &env.recipient), Uint128::new(1000));

    let p = prophecy(&env, &id);
    assert_eq!(p.status, ProphecyStatus::Executed);
    assert_eq!(p.tally, 80);
    assert_eq!(p.threshold, 67);
    assert_eq!(p.attempt, 1);
}

#[test]
fn test_light_validators_stay_below_quorum() {
    let mut env = setup();
    let id = prophecy_id(2);
    let (v1, v3) = (env.v1.clone(), env.v3.clone());

    submit(&mut env, &v1, claim(&id, 1000)).unwrap();
    let res = submit(&mut env, &v3, claim(&id, 1000)).unwrap();
    assert_eq!(attr(&res, "outcome").as_deref(), Some("accepted"));

    let p = prophecy(&env, &id);
    assert_eq!(p.status, ProphecyStatus::Open);
    assert_eq!(p.tally, 60);
    assert_eq!(cw20_balance(&env, &env.recipient), Uint128::zero());
}

#[test]
fn test_resubmission_counts_once() {
    let mut env = setup();
    let id = prophecy_id(3);
    let v1 = env.v1.clone();

    submit(&mut env, &v1, claim(&id, 1000)).unwrap();
    for _ in 0..3 {
        let res = submit(&mut env, &v1, claim(&id, 1000)).unwrap();
        assert_eq!(attr(&res, "outcome").as_deref(), Some("duplicate"));
    }

    let p = prophecy(&env, &id);
    assert_eq!(p.tally, 40);
    assert_eq!(p.attestations.len(), 1);
    assert_eq!(p.status, ProphecyStatus::Open);
}

#[test]
fn test_claims_after_execution_are_audit_only() {
    let mut env = setup();
    let id = prophecy_id(4);
    let (v1, v2, v3) = (env.v1.clone(), env.v2.clone(), env.v3.clone());

    submit(&mut env, &v1, claim(&id, 1000)).unwrap();
    submit(&mut env, &v2, claim(&id, 1000)).unwrap();

    let res = submit(&mut env, &v3, claim(&id, 1000)).unwrap();
    assert_eq!(attr(&res, "outcome").as_deref(), Some("audit_only"));
    assert!(attr(&res, "action").is_none());

    // Minted exactly once
    assert_eq!(cw20_balance(&env, &env.recipient), Uint128::new(1000));
    let p = prophecy(&env, &id);
    assert_eq!(p.attestations.len(), 3);
    assert_eq!(p.tally, 80);
}

// ============================================================================
// Conflicts
// ============================================================================

#[test]
fn test_conflicting_claim_is_rejected_and_flagged() {
    let mut env = setup();
    let id = prophecy_id(5);
    let (v1, v2) = (env.v1.clone(), env.v2.clone());

    submit(&mut env, &v1, claim(&id, 1000)).unwrap();
    let res = submit(&mut env, &v2, claim(&id, 999)).unwrap();
    assert_eq!(attr(&res, "outcome").as_deref(), Some("rejected"));
    assert_eq!(attr(&res, "reason").as_deref(), Some("conflicting_claim"));

    let p = prophecy(&env, &id);
    assert!(p.needs_review);
    assert_eq!(p.conflicts, 1);
    assert_eq!(p.tally, 40);
    assert_eq!(p.content.amount, Uint256::from(1000u128));

    // Admin clears the flag once reviewed
    let admin = env.admin.clone();
    env.app
        .execute_contract(
            admin.clone(),
            env.oracle.clone(),
            &ExecuteMsg::ClearReview {
                prophecy_id: id.clone(),
            },
            &[],
        )
        .unwrap();
    assert!(!prophecy(&env, &id).needs_review);

    let res = env.app.execute_contract(
        admin,
        env.oracle.clone(),
        &ExecuteMsg::ClearReview {
            prophecy_id: id.clone(),
        },
        &[],
    );
    let err_str = res.unwrap_err().root_cause().to_string();
    assert!(err_str.contains("not flagged for review"), "{}", err_str);
}

#[test]
fn test_equivocation_keeps_first_claim() {
    let mut env = setup();
    let id = prophecy_id(6);
    let v1 = env.v1.clone();

    submit(&mut env, &v1, claim(&id, 1000)).unwrap();
    let res = submit(&mut env, &v1, claim(&id, 5000)).unwrap();
    assert_eq!(attr(&res, "reason").as_deref(), Some("equivocation"));

    let first = prophecy(&env, &id).content_hash;
    let stored: ValidatorClaimResponse = env
        .app
        .wrap()
        .query_wasm_smart(
            &env.oracle,
            &QueryMsg::ValidatorClaim {
                prophecy_id: id.clone(),
                validator: v1.to_string(),
            },
        )
        .unwrap();
    assert!(stored.exists);
    assert_eq!(stored.content_hash, Some(first));
    assert!(prophecy(&env, &id).needs_review);
}

// ============================================================================
// Claim Validation
// ============================================================================

#[test]
fn test_non_validator_rejected() {
    let mut env = setup();
    let outsider = Addr::unchecked("cosmos1outsider");

    let res = submit(&mut env, &outsider, claim(&prophecy_id(7), 1000));
    let err_str = res.unwrap_err().root_cause().to_string();
    assert!(err_str.contains("not in validator set"), "{}", err_str);

    // No record was opened
    let res: PropheciesResponse = env
        .app
        .wrap()
        .query_wasm_smart(
            &env.oracle,
            &QueryMsg::Prophecies {
                start_after: None,
                limit: None,
            },
        )
        .unwrap();
    assert!(res.prophecies.is_empty());
}

#[test]
fn test_malformed_claims_rejected() {
    let mut env = setup();
    let v1 = env.v1.clone();
    let id = prophecy_id(8);

    let mut short_sig = claim(&id, 1000);
    short_sig.signature = Binary::from(vec![1u8; 64]);

    let mut bad_token = claim(&id, 1000);
    bad_token.token = "bb".repeat(20);

    let mut zero = claim(&id, 0);
    zero.amount = Uint256::zero();

    let mut unknown_symbol = claim(&id, 1000);
    unknown_symbol.symbol = "DAI".to_string();

    let mut wrong_kind = claim(&id, 1000);
    wrong_kind.kind = ClaimKind::BurnOnCosmos;

    let mut short_id = claim(&id, 1000);
    short_id.prophecy_id = HexBinary::from(vec![1u8; 31]);

    let cases = vec![
        (short_sig, "Invalid signature"),
        (bad_token, "missing the 0x prefix"),
        (zero, "greater than zero"),
        (unknown_symbol, "Token not registered"),
        (wrong_kind, "burn_on_cosmos is not accepted"),
        (short_id, "Invalid hash length"),
    ];
    for (msg, expected) in cases {
        let err_str = submit(&mut env, &v1, msg)
            .unwrap_err()
            .root_cause()
            .to_string();
        assert!(err_str.contains(expected), "{}", err_str);
    }
}

// ============================================================================
// Expiry
// ============================================================================

#[test]
fn test_expire_and_reopen() {
    let mut env = setup();
    let id = prophecy_id(9);
    let (v1, v2, admin) = (env.v1.clone(), env.v2.clone(), env.admin.clone());

    submit(&mut env, &v1, claim(&id, 1000)).unwrap();

    // Reopen is refused while the prophecy is still open
    let res = env.app.execute_contract(
        admin.clone(),
        env.oracle.clone(),
        &ExecuteMsg::ReopenProphecy {
            prophecy_id: id.clone(),
        },
        &[],
    );
    assert!(res
        .unwrap_err()
        .root_cause()
        .to_string()
        .contains("is not expired"));

    advance_blocks(&mut env, EXPIRY_BLOCKS);
    let res = env
        .app
        .execute_contract(
            v2.clone(),
            env.oracle.clone(),
            &ExecuteMsg::ExpireProphecies { limit: None },
            &[],
        )
        .unwrap();
    assert_eq!(attr(&res, "expired").as_deref(), Some("1"));
    assert_eq!(prophecy(&env, &id).status, ProphecyStatus::Expired);

    // Late claims cannot finalize an expired prophecy
    let res = submit(&mut env, &v2, claim(&id, 1000)).unwrap();
    assert_eq!(attr(&res, "reason").as_deref(), Some("expired"));
    assert_eq!(cw20_balance(&env, &env.recipient), Uint128::zero());

    env.app
        .execute_contract(
            admin,
            env.oracle.clone(),
            &ExecuteMsg::ReopenProphecy {
                prophecy_id: id.clone(),
            },
            &[],
        )
        .unwrap();

    // A fresh attempt needs a fresh quorum
    let res = submit(&mut env, &v2, claim(&id, 1000)).unwrap();
    assert_eq!(attr(&res, "outcome").as_deref(), Some("opened"));
    assert_eq!(attr(&res, "attempt").as_deref(), Some("2"));
    submit(&mut env, &v1, claim(&id, 1000)).unwrap();

    let p = prophecy(&env, &id);
    assert_eq!(p.attempt, 2);
    assert_eq!(p.status, ProphecyStatus::Executed);
    assert_eq!(cw20_balance(&env, &env.recipient), Uint128::new(1000));
}

#[test]
fn test_claim_expires_lazily() {
    let mut env = setup();
    let id = prophecy_id(10);
    let (v1, v2) = (env.v1.clone(), env.v2.clone());

    submit(&mut env, &v1, claim(&id, 1000)).unwrap();
    advance_blocks(&mut env, EXPIRY_BLOCKS + 1);

    let res = submit(&mut env, &v2, claim(&id, 1000)).unwrap();
    assert_eq!(attr(&res, "outcome").as_deref(), Some("rejected"));
    assert_eq!(prophecy(&env, &id).status, ProphecyStatus::Expired);

    // Nothing left for the sweep
    let res = env
        .app
        .execute_contract(
            v1,
            env.oracle.clone(),
            &ExecuteMsg::ExpireProphecies { limit: None },
            &[],
        )
        .unwrap();
    assert_eq!(attr(&res, "expired").as_deref(), Some("0"));
}

// ============================================================================
// Validator Rotation
// ============================================================================

#[test]
fn test_rotation_keeps_snapshot_of_open_prophecies() {
    let mut env = setup();
    let old_id = prophecy_id(11);
    let new_id = prophecy_id(12);
    let (v1, v2, admin) = (env.v1.clone(), env.v2.clone(), env.admin.clone());
    let v4 = Addr::unchecked("cosmos1validator4");

    submit(&mut env, &v1, claim(&old_id, 1000)).unwrap();

    env.app
        .execute_contract(
            admin,
            env.oracle.clone(),
            &ExecuteMsg::UpdateValidators {
                validators: vec![ValidatorInput {
                    address: v4.to_string(),
                    weight: 10,
                }],
            },
            &[],
        )
        .unwrap();

    // The new validator has no weight on a prophecy opened before rotation
    let err_str = submit(&mut env, &v4, claim(&old_id, 1000))
        .unwrap_err()
        .root_cause()
        .to_string();
    assert!(err_str.contains("validator set 1"), "{}", err_str);

    // ...while the old set still finalizes it
    let res = submit(&mut env, &v2, claim(&old_id, 1000)).unwrap();
    assert_eq!(attr(&res, "outcome").as_deref(), Some("finalized"));

    // New prophecies use the new set
    let err_str = submit(&mut env, &v1, claim(&new_id, 1000))
        .unwrap_err()
        .root_cause()
        .to_string();
    assert!(err_str.contains("validator set 2"), "{}", err_str);
    let res = submit(&mut env, &v4, claim(&new_id, 1000)).unwrap();
    assert_eq!(attr(&res, "outcome").as_deref(), Some("finalized"));

    let p = prophecy(&env, &new_id);
    assert_eq!(p.validator_set_version, 2);
    assert_eq!(cw20_balance(&env, &env.recipient), Uint128::new(2000));
}

// ============================================================================
// Delivery Modes
// ============================================================================

#[test]
fn test_unlock_native_from_custody() {
    let mut env = setup();
    let (v1, v2, admin) = (env.v1.clone(), env.v2.clone(), env.admin.clone());
    let oracle = env.oracle.clone();

    env.app.init_modules(|router, _, storage| {
        router
            .bank
            .init_balance(storage, &oracle, coins(1_000_000, "uatom"))
            .unwrap();
    });
    env.app
        .execute_contract(
            admin,
            oracle.clone(),
            &ExecuteMsg::RegisterToken {
                symbol: "ATOM".to_string(),
                token: TokenMode::UnlockNative {
                    denom: "uatom".to_string(),
                },
            },
            &[],
        )
        .unwrap();

    let id = prophecy_id(13);
    let mut atom = claim(&id, 2500);
    atom.symbol = "ATOM".to_string();

    submit(&mut env, &v1, atom.clone()).unwrap();
    let res = submit(&mut env, &v2, atom).unwrap();
    assert_eq!(attr(&res, "action").as_deref(), Some("unlock"));

    let balance = env
        .app
        .wrap()
        .query_balance(&env.recipient, "uatom")
        .unwrap();
    assert_eq!(balance.amount, Uint128::new(2500));
    let custody = env.app.wrap().query_balance(&oracle, "uatom").unwrap();
    assert_eq!(custody.amount, Uint128::new(997_500));
}

// ============================================================================
// Admin
// ============================================================================

#[test]
fn test_admin_operations_require_admin() {
    let mut env = setup();
    let v1 = env.v1.clone();

    let msgs = vec![
        ExecuteMsg::UpdateValidators {
            validators: vec![ValidatorInput {
                address: v1.to_string(),
                weight: 1,
            }],
        },
        ExecuteMsg::RegisterToken {
            symbol: "DAI".to_string(),
            token: TokenMode::UnlockNative {
                denom: "udai".to_string(),
            },
        },
        ExecuteMsg::UpdateConfig {
            admin: Some(v1.to_string()),
            quorum: None,
            expiry_blocks: None,
            accepted_kinds: None,
        },
        ExecuteMsg::ReopenProphecy {
            prophecy_id: prophecy_id(1),
        },
    ];
    for msg in msgs {
        let err_str = env
            .app
            .execute_contract(v1.clone(), env.oracle.clone(), &msg, &[])
            .unwrap_err()
            .root_cause()
            .to_string();
        assert!(err_str.contains("Unauthorized"), "{}", err_str);
    }
}

#[test]
fn test_update_config_validates_quorum() {
    let mut env = setup();
    let admin = env.admin.clone();

    let err_str = env
        .app
        .execute_contract(
            admin.clone(),
            env.oracle.clone(),
            &ExecuteMsg::UpdateConfig {
                admin: None,
                quorum: Some(oracle::msg::Quorum {
                    numerator: 4,
                    denominator: 3,
                }),
                expiry_blocks: None,
                accepted_kinds: None,
            },
            &[],
        )
        .unwrap_err()
        .root_cause()
        .to_string();
    assert!(err_str.contains("Invalid quorum"), "{}", err_str);

    env.app
        .execute_contract(
            admin,
            env.oracle.clone(),
            &ExecuteMsg::UpdateConfig {
                admin: None,
                quorum: None,
                expiry_blocks: Some(500),
                accepted_kinds: Some(vec![ClaimKind::LockOnEthereum, ClaimKind::BurnOnCosmos]),
            },
            &[],
        )
        .unwrap();

    let config: ConfigResponse = env
        .app
        .wrap()
        .query_wasm_smart(&env.oracle, &QueryMsg::Config {})
        .unwrap();
    assert_eq!(config.expiry_blocks, 500);
    assert_eq!(config.accepted_kinds.len(), 2);
}
