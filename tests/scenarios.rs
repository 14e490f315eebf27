/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! End-to-end scenarios exercising the manager, contract state and VM driver together.

use pchain_runtime::{
    call, commit_contract_state, create, AccountId, CallInfo, HashAlgorithm, InMemoryStore, Serializable,
    StateManager,
};

fn manager() -> StateManager<InMemoryStore> {
    StateManager::new(HashAlgorithm::Sha3_256, InMemoryStore::new())
}

fn account(seed: &[u8]) -> AccountId {
    HashAlgorithm::Sha3_256.account_id(seed)
}

/// S1: a basic set then get is visible before any commit.
#[test]
fn s1_set_then_get_is_visible_immediately() {
    let m = manager();
    let key = HashAlgorithm::Sha3_256.hash_one(b"balance");
    m.put_state(key, b"100".to_vec()).unwrap();
    assert_eq!(m.get_state(key).unwrap(), b"100".to_vec());
}

/// S2: values written, updated and committed survive a fresh manager reopened at the
/// resulting root.
#[test]
fn s2_committed_state_survives_reopen() {
    let store = InMemoryStore::new();
    let key = HashAlgorithm::Sha3_256.hash_one(b"balance");

    let root = {
        let m = StateManager::new(HashAlgorithm::Sha3_256, store.clone());
        m.put_state(key, b"100".to_vec()).unwrap();
        let root = m.update().unwrap();
        m.commit().unwrap();
        root
    };

    let reopened = StateManager::open(HashAlgorithm::Sha3_256, store, root);
    assert_eq!(reopened.get_state(key).unwrap(), b"100".to_vec());
}

/// S3: a snapshot taken mid-transaction can roll back exactly the writes made after it,
/// leaving earlier writes in place.
#[test]
fn s3_snapshot_rollback_is_precise() {
    let m = manager();
    let key = HashAlgorithm::Sha3_256.hash_one(b"k");

    m.put_state(key, b"first".to_vec()).unwrap();
    let snap = m.snapshot();
    m.put_state(key, b"second".to_vec()).unwrap();
    assert_eq!(m.get_state(key).unwrap(), b"second".to_vec());

    m.rollback(snap);
    assert_eq!(m.get_state(key).unwrap(), b"first".to_vec());
}

/// S4: applying the same writes in the same order from a fresh manager always yields the
/// same root, independent of any particular run's internal node cache.
#[test]
fn s4_root_is_a_pure_function_of_writes() {
    let build_root = || {
        let m = manager();
        m.put_state(HashAlgorithm::Sha3_256.hash_one(b"a"), b"1".to_vec()).unwrap();
        m.put_state(HashAlgorithm::Sha3_256.hash_one(b"b"), b"2".to_vec()).unwrap();
        m.update().unwrap()
    };

    assert_eq!(build_root(), build_root());
}

/// S5: two managers opened at two different committed roots over the same store each see
/// only their own root's data, i.e. historical views do not interfere with each other.
#[test]
fn s5_independent_views_by_root() {
    let store = InMemoryStore::new();
    let key = HashAlgorithm::Sha3_256.hash_one(b"k");

    let root_a = {
        let m = StateManager::new(HashAlgorithm::Sha3_256, store.clone());
        m.put_state(key, b"a".to_vec()).unwrap();
        let root = m.update().unwrap();
        m.commit().unwrap();
        root
    };

    let root_b = {
        let m = StateManager::open(HashAlgorithm::Sha3_256, store.clone(), root_a);
        m.put_state(key, b"b".to_vec()).unwrap();
        let root = m.update().unwrap();
        m.commit().unwrap();
        root
    };

    let view_a = StateManager::open(HashAlgorithm::Sha3_256, store.clone(), root_a);
    let view_b = StateManager::open(HashAlgorithm::Sha3_256, store, root_b);

    assert_eq!(view_a.get_state(key).unwrap(), b"a".to_vec());
    assert_eq!(view_b.get_state(key).unwrap(), b"b".to_vec());
}

const MINIMAL_CONTRACT_WAT: &str = r#"
(module
  (memory (export "memory") 1)
  (func (export "alloc") (param $size i32) (result i32)
    i32.const 0)
  (func (export "init") (param $ptr i32) (param $len i32) (result i64)
    i64.const 0)
  (func (export "run") (param $ptr i32) (param $len i32) (result i64)
    i64.const 0))
"#;

fn deploy_payload(code: &[u8], init: Option<&CallInfo>) -> Vec<u8> {
    let trailer = init.map(Serializable::serialize).unwrap_or_default();
    let total_len = 8 + code.len() + trailer.len();
    let mut payload = Vec::with_capacity(total_len);
    payload.extend_from_slice(&(total_len as u32).to_le_bytes());
    payload.extend_from_slice(&(code.len() as u32).to_le_bytes());
    payload.extend_from_slice(code);
    payload.extend_from_slice(&trailer);
    payload
}

/// S6: deploying a contract with a trailing init call persists the code, runs the
/// initializer once, and reports gas for both the deploy and the init run.
#[test]
fn s6_deploy_with_init_charges_gas_and_persists_code() {
    let m = manager();
    let contract_account = account(b"contract");
    let code = wat::parse_str(MINIMAL_CONTRACT_WAT).expect("valid wat fixture");

    let init = CallInfo {
        name: "init".to_string(),
        args: vec![],
    };
    let payload = deploy_payload(&code, Some(&init));

    let (contract_state, outcome) = create(&m, contract_account, &payload).unwrap();
    assert!(outcome.deploy_gas_used > 0);
    let init_outcome = outcome.init.expect("deploy carried an init call");
    assert!(init_outcome.result.is_ok());
    commit_contract_state(&m, contract_state).unwrap();

    m.update().unwrap();
    m.commit().unwrap();

    let call_info = CallInfo { name: "run".to_string(), args: vec![] };
    let call_payload = call_info.serialize();
    let (contract_state, call_outcome) = call(&m, contract_account, &call_payload).unwrap();
    assert!(call_outcome.result.is_ok());
    assert!(call_outcome.gas_used > 0);
    commit_contract_state(&m, contract_state).unwrap();
}

/// Deploying without a trailing init call is not treated as malformed input.
#[test]
fn deploy_without_init_is_accepted() {
    let m = manager();
    let contract_account = account(b"no-init-contract");
    let code = wat::parse_str(MINIMAL_CONTRACT_WAT).expect("valid wat fixture");
    let payload = deploy_payload(&code, None);

    let (contract_state, outcome) = create(&m, contract_account, &payload).unwrap();
    assert!(outcome.init.is_none());
    commit_contract_state(&m, contract_state).unwrap();
}

/// Calling an account with no deployed code is rejected.
#[test]
fn call_against_account_without_code_fails() {
    let m = manager();
    let missing = account(b"nobody-home");
    let call_info = CallInfo { name: "run".to_string(), args: vec![] };
    let result = call(&m, missing, &call_info.serialize());
    assert!(result.is_err());
}
