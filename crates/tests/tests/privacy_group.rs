use evm_runner::Address;
use pente_tests::{CUSTODIAN, INVESTOR, bond_group};
use pretty_assertions::assert_eq;
use privacy_group::{GroupError, LocalPrivacyGroup, PrivacyGroup, new_parameters};
use serde_json::json;
use test_utils::contracts::SIMPLE_STORAGE_RESOURCE;

fn deploy_storage(group: &mut LocalPrivacyGroup, bytecode: &str, x: u64) -> Address {
    let constructor = new_parameters([("x", "uint256")]).unwrap();
    group
        .deploy(CUSTODIAN, bytecode, &constructor, &json!({ "x": x }))
        .unwrap()
}

fn get(group: &mut LocalPrivacyGroup, storage: Address) -> String {
    let outputs = new_parameters([("output", "uint256")]).unwrap();
    group
        .call("get", &[], &outputs, INVESTOR, storage, &json!({}))
        .unwrap()
        .output()
}

#[test]
fn invoke_commits_and_call_does_not() {
    let (mut group, fixtures) = bond_group();
    let bytecode = fixtures
        .loader()
        .json_resource_entry_text(SIMPLE_STORAGE_RESOURCE, "bytecode")
        .unwrap();
    let storage = deploy_storage(&mut group, &bytecode, 7);
    assert_eq!(get(&mut group, storage), "7");

    let set = new_parameters([("x", "uint256")]).unwrap();
    group
        .call("set", &set, &[], INVESTOR, storage, &json!({ "x": "0x2a" }))
        .unwrap();
    assert_eq!(get(&mut group, storage), "7");

    group
        .invoke("set", &set, INVESTOR, storage, &json!({ "x": "42" }))
        .unwrap();
    assert_eq!(get(&mut group, storage), "42");
}

#[test]
fn deployments_follow_the_sender_nonce() {
    let (mut group, fixtures) = bond_group();
    let bytecode = fixtures
        .loader()
        .json_resource_entry_text(SIMPLE_STORAGE_RESOURCE, "bytecode")
        .unwrap();
    let custodian = group.address_of(CUSTODIAN).unwrap();

    let first = deploy_storage(&mut group, &bytecode, 1);
    let second = deploy_storage(&mut group, &bytecode, 2);
    assert_eq!(first, custodian.create(0));
    assert_eq!(second, custodian.create(1));
    assert_eq!(group.runner().world().nonce(custodian), 2);
    assert_eq!(get(&mut group, first), "1");
    assert_eq!(get(&mut group, second), "2");
}

#[test]
fn bad_inputs_are_reported_by_name() {
    let (mut group, fixtures) = bond_group();
    let bytecode = fixtures
        .loader()
        .json_resource_entry_text(SIMPLE_STORAGE_RESOURCE, "bytecode")
        .unwrap();
    let constructor = new_parameters([("x", "uint256")]).unwrap();

    let missing = group
        .deploy(CUSTODIAN, &bytecode, &constructor, &json!({ "y": 1 }))
        .unwrap_err();
    assert!(matches!(missing, GroupError::MissingInput(name) if name == "x"));

    let invalid = group
        .deploy(CUSTODIAN, &bytecode, &constructor, &json!({ "x": "twelve" }))
        .unwrap_err();
    assert!(matches!(invalid, GroupError::InvalidInput { name, .. } if name == "x"));
}

#[test]
fn unknown_selectors_revert_without_reason() {
    let (mut group, fixtures) = bond_group();
    let bytecode = fixtures
        .loader()
        .json_resource_entry_text(SIMPLE_STORAGE_RESOURCE, "bytecode")
        .unwrap();
    let storage = deploy_storage(&mut group, &bytecode, 1);

    let err = group
        .invoke("reset", &[], CUSTODIAN, storage, &json!({}))
        .unwrap_err();
    assert!(matches!(
        err,
        GroupError::Reverted { method, reason: None, data } if method == "reset" && data.is_empty()
    ));
}
