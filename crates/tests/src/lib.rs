//! Shared setup for the integration tests under `tests/`.
use privacy_group::LocalPrivacyGroup;
use test_utils::FixtureResources;

pub const CUSTODIAN: &str = "custodian@node1";
pub const INVESTOR: &str = "investor@node2";
pub const OUTSIDER: &str = "outsider@node3";

/// A group of the custodian and the investor together with the fixture artifacts.
pub fn bond_group() -> (LocalPrivacyGroup, FixtureResources) {
    let group = LocalPrivacyGroup::from_members("bond", [CUSTODIAN, INVESTOR])
        .expect("valid group");
    let fixtures = FixtureResources::install().expect("fixtures install");
    (group, fixtures)
}
