use common::{ArtifactError, ResourceLoader};
use ethers_core::abi::ParamType;
use evm_runner::Address;
use privacy_group::{GroupError, Param, PrivacyGroup};
use serde_json::{Value, json};
use thiserror::Error;

use crate::contracts::BOND_TRACKER_RESOURCE;

#[derive(Debug, Error)]
pub enum HelperError {
    #[error(transparent)]
    Artifact(#[from] ArtifactError),
    #[error(transparent)]
    Group(#[from] GroupError),
}

fn param(name: &str, kind: ParamType) -> Param {
    Param {
        name: name.to_string(),
        kind,
        internal_type: None,
    }
}

pub fn constructor_params() -> Vec<Param> {
    vec![
        param("name", ParamType::String),
        param("symbol", ParamType::String),
        param("custodian", ParamType::Address),
        param("distributionFactory", ParamType::Address),
    ]
}

/// Drives a deployed `BondTracker` through a privacy group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BondTrackerHelper {
    address: Address,
}

impl BondTrackerHelper {
    pub fn deploy(
        group: &mut impl PrivacyGroup,
        resources: &ResourceLoader,
        sender: &str,
        inputs: &Value,
    ) -> Result<Self, HelperError> {
        let bytecode = resources.json_resource_entry_text(BOND_TRACKER_RESOURCE, "bytecode")?;
        let address = group.deploy(sender, &bytecode, &constructor_params(), inputs)?;
        Ok(Self { address })
    }

    pub fn at(address: Address) -> Self {
        Self { address }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn investor_registry(
        &self,
        group: &mut impl PrivacyGroup,
        sender: &str,
    ) -> Result<String, GroupError> {
        let output = group.call(
            "investorRegistry",
            &[],
            &[param("output", ParamType::Address)],
            sender,
            self.address,
            &json!({}),
        )?;
        Ok(output.output())
    }

    pub fn balance_of(
        &self,
        group: &mut impl PrivacyGroup,
        sender: &str,
        account: &str,
    ) -> Result<String, GroupError> {
        let output = group.call(
            "balanceOf",
            &[param("account", ParamType::Address)],
            &[param("output", ParamType::Uint(256))],
            sender,
            self.address,
            &json!({ "account": account }),
        )?;
        Ok(output.output())
    }

    pub fn set_distribution(
        &self,
        group: &mut impl PrivacyGroup,
        sender: &str,
        addr: &str,
    ) -> Result<(), GroupError> {
        group.invoke(
            "setDistribution",
            &[param("addr", ParamType::Address)],
            sender,
            self.address,
            &json!({ "addr": addr }),
        )
    }
}
