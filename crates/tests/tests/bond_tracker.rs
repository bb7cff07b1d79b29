use evm_runner::Address;
use pente_tests::{CUSTODIAN, INVESTOR, OUTSIDER, bond_group};
use pretty_assertions::assert_eq;
use privacy_group::{GroupError, LocalPrivacyGroup, PrivacyGroup, new_parameter};
use serde_json::{Value, json};
use test_utils::{BondTrackerHelper, address_hex, contracts::BOND_INITIAL_SUPPLY};

fn bond_inputs(group: &LocalPrivacyGroup) -> Value {
    let custodian = group.address_of(CUSTODIAN).unwrap();
    json!({
        "name": "FakeBond",
        "symbol": "FBD",
        "custodian": address_hex(custodian),
        "distributionFactory": address_hex(Address::repeat_byte(0x11)),
    })
}

#[test]
fn deploys_with_investor_registry() {
    let (mut group, fixtures) = bond_group();
    let inputs = bond_inputs(&group);
    let bond = BondTrackerHelper::deploy(&mut group, fixtures.loader(), CUSTODIAN, &inputs).unwrap();

    let custodian = group.address_of(CUSTODIAN).unwrap();
    assert_eq!(bond.address(), custodian.create(0));

    let registry = bond.investor_registry(&mut group, CUSTODIAN).unwrap();
    assert_ne!(registry, address_hex(Address::ZERO));
    assert_eq!(registry, address_hex(bond.address().create(1)));
    assert!(group.runner().world().has_code(bond.address().create(1)));
}

#[test]
fn custodian_holds_initial_supply() {
    let (mut group, fixtures) = bond_group();
    let inputs = bond_inputs(&group);
    let bond = BondTrackerHelper::deploy(&mut group, fixtures.loader(), CUSTODIAN, &inputs).unwrap();

    let custodian = address_hex(group.address_of(CUSTODIAN).unwrap());
    let investor = address_hex(group.address_of(INVESTOR).unwrap());
    assert_eq!(
        bond.balance_of(&mut group, INVESTOR, &custodian).unwrap(),
        BOND_INITIAL_SUPPLY.to_string()
    );
    assert_eq!(bond.balance_of(&mut group, INVESTOR, &investor).unwrap(), "0");
}

#[test]
fn custodian_sets_distribution() {
    let (mut group, fixtures) = bond_group();
    let inputs = bond_inputs(&group);
    let bond = BondTrackerHelper::deploy(&mut group, fixtures.loader(), CUSTODIAN, &inputs).unwrap();

    let distribution = address_hex(Address::repeat_byte(0x22));
    bond.set_distribution(&mut group, CUSTODIAN, &distribution).unwrap();

    let output = group
        .call(
            "distribution",
            &[],
            &[new_parameter("output", "address").unwrap()],
            INVESTOR,
            bond.address(),
            &json!({}),
        )
        .unwrap();
    assert_eq!(output.output(), distribution);
}

#[test]
fn only_the_custodian_sets_distribution() {
    let (mut group, fixtures) = bond_group();
    let inputs = bond_inputs(&group);
    let bond = BondTrackerHelper::deploy(&mut group, fixtures.loader(), CUSTODIAN, &inputs).unwrap();

    let err = bond
        .set_distribution(&mut group, INVESTOR, &address_hex(Address::repeat_byte(0x22)))
        .unwrap_err();
    match err {
        GroupError::Reverted { method, reason, .. } => {
            assert_eq!(method, "setDistribution");
            assert_eq!(reason.as_deref(), Some("not custodian"));
        }
        other => panic!("expected a revert, got {other}"),
    }
}

#[test]
fn outsiders_cannot_use_the_bond() {
    let (mut group, fixtures) = bond_group();
    let inputs = bond_inputs(&group);
    assert!(matches!(
        BondTrackerHelper::deploy(&mut group, fixtures.loader(), OUTSIDER, &inputs),
        Err(test_utils::HelperError::Group(GroupError::NotMember { .. }))
    ));

    let bond = BondTrackerHelper::deploy(&mut group, fixtures.loader(), CUSTODIAN, &inputs).unwrap();
    assert!(matches!(
        bond.investor_registry(&mut group, OUTSIDER),
        Err(GroupError::NotMember { .. })
    ));
}

#[test]
fn missing_constructor_inputs_are_named() {
    let (mut group, fixtures) = bond_group();
    let err = BondTrackerHelper::deploy(
        &mut group,
        fixtures.loader(),
        CUSTODIAN,
        &json!({"name": "FakeBond", "symbol": "FBD"}),
    )
    .unwrap_err();
    assert!(matches!(
        err,
        test_utils::HelperError::Group(GroupError::MissingInput(name)) if name == "custodian"
    ));
}
