use ethers_core::types::U256;
use evm_runner::{EvmRunner, ParamType, Token, hex_to_bytes, random_address};
use pretty_assertions::assert_eq;
use test_utils::{FixtureResources, contracts::SIMPLE_STORAGE_WRAPPED_RESOURCE};

#[test]
fn wrapped_storage_round_trip_at_preassigned_address() {
    let fixtures = FixtureResources::install().unwrap();
    let bytecode = fixtures
        .loader()
        .json_resource_entry_text(SIMPLE_STORAGE_WRAPPED_RESOURCE, "bytecode")
        .unwrap();
    let bytecode = hex_to_bytes(&bytecode).unwrap();

    let mut runner = EvmRunner::default();
    let sender = random_address();
    let target = random_address();

    let deployment = runner
        .run_contract_deployment(sender, target, &bytecode, &[Token::Uint(U256::from(12345u64))])
        .unwrap();
    assert!(deployment.is_success(), "{deployment:?}");

    let set = runner
        .run_contract_invoke(sender, target, "set", &[Token::Uint(U256::from(23456u64))])
        .unwrap();
    assert!(set.is_success(), "{set:?}");

    let get = runner.run_contract_invoke(sender, target, "get", &[]).unwrap();
    assert!(get.is_success(), "{get:?}");
    assert_eq!(
        EvmRunner::decode_return(&get, &[ParamType::Uint(256)]).unwrap(),
        vec![Token::Uint(U256::from(23456u64))]
    );

    let nested = target.create(0);
    let mut expected = vec![sender, target, nested];
    expected.sort();
    assert_eq!(runner.world().queried_accounts(), expected);
    assert_eq!(runner.world().nonce(target), 1);
}

#[test]
fn constructor_value_is_visible_before_any_update() {
    let fixtures = FixtureResources::install().unwrap();
    let artifact = fixtures
        .loader()
        .artifact(SIMPLE_STORAGE_WRAPPED_RESOURCE)
        .unwrap();

    let mut runner = EvmRunner::default();
    let sender = random_address();
    let target = random_address();
    runner
        .run_contract_deployment(
            sender,
            target,
            &artifact.bytecode_bytes().unwrap(),
            &[Token::Uint(U256::from(12345u64))],
        )
        .unwrap();

    let get = runner.run_contract_call(sender, target, "get()", &[]).unwrap();
    assert_eq!(
        EvmRunner::decode_return(&get, &[ParamType::Uint(256)]).unwrap(),
        vec![Token::Uint(U256::from(12345u64))]
    );
}
