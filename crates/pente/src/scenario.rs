//! Scenario files: a privacy group plus an ordered list of steps.
//!
//! ```toml
//! [group]
//! name = "bond"
//! members = ["custodian@node1", "investor@node2"]
//!
//! [[step]]
//! action = "deploy"
//! name = "bond"
//! artifact = "BondTracker.json"
//! sender = "custodian@node1"
//! inputs = { name = "FakeBond", symbol = "FBD", custodian = "0x…", distributionFactory = "0x…" }
//!
//! [[step]]
//! action = "call"
//! contract = "bond"
//! method = "investorRegistry"
//! sender = "investor@node2"
//! ```
//!
//! Artifact paths are relative to the scenario file. Parameter schemas come
//! from the artifact ABI.
use std::collections::HashMap;

use camino::{Utf8Path, Utf8PathBuf};
use common::{ArtifactError, Config, ConfigError, ContractArtifact};
use evm_runner::Address;
use privacy_group::{GroupError, LocalPrivacyGroup, Param, PrivacyGroup, new_parameter};
use serde::Deserialize;
use serde_json::{Value, json};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid scenario: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("scenario has no [group] table")]
    MissingGroup,
    #[error("step {step}: no contract named \"{name}\" has been deployed")]
    UnknownContract { step: usize, name: String },
    #[error("step {step}: {contract} has no function \"{method}\" in its abi")]
    UnknownFunction {
        step: usize,
        contract: String,
        method: String,
    },
    #[error("step {step}: contract name \"{name}\" is already taken")]
    DuplicateContract { step: usize, name: String },
    #[error("malformed abi entry: {0}")]
    Abi(String),
    #[error("step {step} failed: {source}")]
    Step {
        step: usize,
        #[source]
        source: GroupError,
    },
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Artifact(#[from] ArtifactError),
    #[error(transparent)]
    Group(#[from] GroupError),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum Step {
    Deploy {
        name: String,
        artifact: String,
        sender: String,
        #[serde(default)]
        inputs: Value,
    },
    Invoke {
        contract: String,
        method: String,
        sender: String,
        #[serde(default)]
        inputs: Value,
    },
    Call {
        contract: String,
        method: String,
        sender: String,
        #[serde(default)]
        inputs: Value,
    },
}

#[derive(Debug, Deserialize)]
struct Steps {
    #[serde(default)]
    step: Vec<Step>,
}

#[derive(Debug)]
pub struct Scenario {
    pub config: Config,
    pub steps: Vec<Step>,
    /// Directory artifact paths are resolved against.
    pub base: Utf8PathBuf,
}

impl Scenario {
    pub fn parse(content: &str, base: &Utf8Path) -> Result<Self, ScenarioError> {
        let config = Config::parse(content)?;
        if config.group.is_none() {
            return Err(ScenarioError::MissingGroup);
        }
        let Steps { step } = toml::from_str(content)?;
        Ok(Self {
            config,
            steps: step,
            base: base.to_owned(),
        })
    }

    pub fn load(path: &Utf8Path) -> Result<Self, ScenarioError> {
        let content = std::fs::read_to_string(path).map_err(|source| ScenarioError::Io {
            path: path.to_owned(),
            source,
        })?;
        let base = path.parent().unwrap_or(Utf8Path::new("."));
        Self::parse(&content, base)
    }

    /// Runs every step in order and returns one JSON record per step.
    /// Stops at the first failing step.
    pub fn run(&self) -> Result<Vec<Value>, ScenarioError> {
        let group = self.config.group.clone().ok_or(ScenarioError::MissingGroup)?;
        let mut group = LocalPrivacyGroup::new(group)?;
        let mut contracts: HashMap<&str, (Address, ContractArtifact)> = HashMap::new();
        let mut records = Vec::with_capacity(self.steps.len());

        for (index, step) in self.steps.iter().enumerate() {
            let number = index + 1;
            tracing::debug!(target: "pente", "Running step {number}: {step:?}");
            let record = match step {
                Step::Deploy {
                    name,
                    artifact,
                    sender,
                    inputs,
                } => {
                    if contracts.contains_key(name.as_str()) {
                        return Err(ScenarioError::DuplicateContract {
                            step: number,
                            name: name.clone(),
                        });
                    }
                    let artifact = ContractArtifact::load(&self.base.join(artifact))?;
                    let constructor = constructor_params(&artifact)?;
                    let address = group
                        .deploy(sender, &artifact.bytecode, &constructor, inputs)
                        .map_err(|source| ScenarioError::Step {
                            step: number,
                            source,
                        })?;
                    contracts.insert(name.as_str(), (address, artifact));
                    json!({
                        "step": number,
                        "action": "deploy",
                        "name": name,
                        "address": format!("{address:#x}"),
                    })
                }
                Step::Invoke {
                    contract,
                    method,
                    sender,
                    inputs,
                } => {
                    let (address, artifact) = lookup(&contracts, number, contract)?;
                    let (params, _) = function_params(artifact, number, contract, method)?;
                    group
                        .invoke(method, &params, sender, *address, inputs)
                        .map_err(|source| ScenarioError::Step {
                            step: number,
                            source,
                        })?;
                    json!({
                        "step": number,
                        "action": "invoke",
                        "contract": contract,
                        "method": method,
                    })
                }
                Step::Call {
                    contract,
                    method,
                    sender,
                    inputs,
                } => {
                    let (address, artifact) = lookup(&contracts, number, contract)?;
                    let (params, outputs) = function_params(artifact, number, contract, method)?;
                    let output = group
                        .call(method, &params, &outputs, sender, *address, inputs)
                        .map_err(|source| ScenarioError::Step {
                            step: number,
                            source,
                        })?;
                    json!({
                        "step": number,
                        "action": "call",
                        "contract": contract,
                        "method": method,
                        "outputs": output.into_json(),
                    })
                }
            };
            records.push(record);
        }
        Ok(records)
    }
}

fn lookup<'a>(
    contracts: &'a HashMap<&str, (Address, ContractArtifact)>,
    step: usize,
    name: &str,
) -> Result<&'a (Address, ContractArtifact), ScenarioError> {
    contracts
        .get(name)
        .ok_or_else(|| ScenarioError::UnknownContract {
            step,
            name: name.to_string(),
        })
}

fn constructor_params(artifact: &ContractArtifact) -> Result<Vec<Param>, ScenarioError> {
    match artifact
        .abi
        .iter()
        .find(|entry| entry["type"] == "constructor")
    {
        Some(entry) => abi_params(&entry["inputs"]),
        None => Ok(Vec::new()),
    }
}

fn function_params(
    artifact: &ContractArtifact,
    step: usize,
    contract: &str,
    method: &str,
) -> Result<(Vec<Param>, Vec<Param>), ScenarioError> {
    let entry = artifact
        .abi
        .iter()
        .find(|entry| entry["type"] == "function" && entry["name"] == method)
        .ok_or_else(|| ScenarioError::UnknownFunction {
            step,
            contract: contract.to_string(),
            method: method.to_string(),
        })?;
    Ok((abi_params(&entry["inputs"])?, abi_params(&entry["outputs"])?))
}

fn abi_params(entries: &Value) -> Result<Vec<Param>, ScenarioError> {
    let Some(entries) = entries.as_array() else {
        return Ok(Vec::new());
    };
    entries
        .iter()
        .map(|entry| {
            let kind = entry["type"]
                .as_str()
                .ok_or_else(|| ScenarioError::Abi(entry.to_string()))?;
            let name = entry["name"].as_str().unwrap_or_default();
            Ok(new_parameter(name, kind)?)
        })
        .collect()
}
