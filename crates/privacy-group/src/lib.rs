//! Privacy groups: a set of member identities executing contracts against one
//! shared EVM state.
//!
//! [`PrivacyGroup`] is the contract-facing API (deploy, call, invoke with named
//! JSON arguments). [`LocalPrivacyGroup`] implements it in-process on top of an
//! [`EvmRunner`].
pub mod params;

pub use ethers_core::abi::Param;
pub use params::{new_parameter, new_parameters};

use common::{ConfigError, GroupConfig};
use ethers_core::abi::{self, Token};
use ethers_core::utils::keccak256;
use evm_runner::{
    Address, EvmRunner, Execution, ExecutionStatus, RevertData, RunnerError, hex_to_bytes,
};
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GroupError {
    #[error("{sender} is not a member of privacy group \"{group}\"")]
    NotMember { group: String, sender: String },
    #[error("missing input \"{0}\"")]
    MissingInput(String),
    #[error("invalid input \"{name}\": {reason}")]
    InvalidInput { name: String, reason: String },
    #[error("invalid abi parameter {0}")]
    InvalidParameter(String),
    #[error("{method} reverted: {}", reason.as_deref().unwrap_or("no reason given"))]
    Reverted {
        method: String,
        reason: Option<String>,
        data: Vec<u8>,
    },
    #[error("{method} halted: {reason}")]
    Halted { method: String, reason: String },
    #[error("{0} returned data that does not match its outputs: {1}")]
    OutputMismatch(String, ethers_core::abi::Error),
    #[error(transparent)]
    Runner(#[from] RunnerError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Decoded outputs of a [`PrivacyGroup::call`], keyed by output name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallOutput(pub Map<String, Value>);

impl CallOutput {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// The value named `output` as text; empty when absent.
    pub fn output(&self) -> String {
        match self.0.get("output") {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        }
    }

    pub fn into_json(self) -> Value {
        Value::Object(self.0)
    }
}

pub trait PrivacyGroup {
    /// Deploys `bytecode` (hex) with named constructor inputs and returns its address.
    fn deploy(
        &mut self,
        sender: &str,
        bytecode: &str,
        constructor: &[Param],
        inputs: &Value,
    ) -> Result<Address, GroupError>;

    /// Executes `method` without committing any state change.
    fn call(
        &mut self,
        method: &str,
        inputs: &[Param],
        outputs: &[Param],
        sender: &str,
        to: Address,
        args: &Value,
    ) -> Result<CallOutput, GroupError>;

    /// Executes `method` as a transaction.
    fn invoke(
        &mut self,
        method: &str,
        inputs: &[Param],
        sender: &str,
        to: Address,
        args: &Value,
    ) -> Result<(), GroupError>;
}

/// Deterministic address of an identity such as `alice@node1`.
pub fn resolve_identity(identity: &str) -> Address {
    Address::from_slice(&keccak256(identity.as_bytes())[12..])
}

/// In-process privacy group backed by a single [`EvmRunner`].
#[derive(Debug)]
pub struct LocalPrivacyGroup {
    name: String,
    members: Vec<String>,
    runner: EvmRunner,
}

impl LocalPrivacyGroup {
    pub fn new(config: GroupConfig) -> Result<Self, GroupError> {
        config.validate()?;
        tracing::info!(
            target: "pente",
            "Created privacy group \"{}\" with {} members ({})",
            config.name,
            config.members.len(),
            config.runner.evm_version
        );
        Ok(Self {
            name: config.name,
            members: config.members,
            runner: EvmRunner::new(config.runner),
        })
    }

    pub fn from_members(
        name: &str,
        members: impl IntoIterator<Item = impl Into<String>>,
    ) -> Result<Self, GroupError> {
        Self::new(GroupConfig::new(name, members))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn members(&self) -> &[String] {
        &self.members
    }

    pub fn is_member(&self, identity: &str) -> bool {
        self.members.iter().any(|member| member == identity)
    }

    pub fn runner(&self) -> &EvmRunner {
        &self.runner
    }

    pub fn runner_mut(&mut self) -> &mut EvmRunner {
        &mut self.runner
    }

    /// Address of a member identity.
    pub fn address_of(&self, identity: &str) -> Result<Address, GroupError> {
        if !self.is_member(identity) {
            return Err(GroupError::NotMember {
                group: self.name.clone(),
                sender: identity.to_string(),
            });
        }
        Ok(resolve_identity(identity))
    }

    fn execute(
        &mut self,
        method: &str,
        inputs: &[Param],
        sender: &str,
        to: Address,
        args: &Value,
        commit: bool,
    ) -> Result<Execution, GroupError> {
        let from = self.address_of(sender)?;
        let tokens = params::tokenize_inputs(inputs, args)?;
        let mut calldata = abi::short_signature(method, &params::param_types(inputs)).to_vec();
        calldata.extend(abi::encode(&tokens));

        let execution = if commit {
            self.runner.call_raw(from, to, &calldata)?
        } else {
            self.runner.static_call_raw(from, to, &calldata)?
        };
        check_status(method, execution)
    }
}

impl PrivacyGroup for LocalPrivacyGroup {
    fn deploy(
        &mut self,
        sender: &str,
        bytecode: &str,
        constructor: &[Param],
        inputs: &Value,
    ) -> Result<Address, GroupError> {
        let from = self.address_of(sender)?;
        let code = hex_to_bytes(bytecode)?;
        let tokens = params::tokenize_inputs(constructor, inputs)?;
        let execution = check_status("constructor", self.runner.deploy(from, &code, &tokens)?)?;
        let address = execution.created.ok_or_else(|| {
            RunnerError::Execution("deployment did not report a contract address".to_string())
        })?;
        tracing::info!(target: "pente", "{sender} deployed {address} in group \"{}\"", self.name);
        Ok(address)
    }

    fn call(
        &mut self,
        method: &str,
        inputs: &[Param],
        outputs: &[Param],
        sender: &str,
        to: Address,
        args: &Value,
    ) -> Result<CallOutput, GroupError> {
        let execution = self.execute(method, inputs, sender, to, args, false)?;
        let tokens: Vec<Token> = abi::decode(&params::param_types(outputs), &execution.output)
            .map_err(|err| GroupError::OutputMismatch(method.to_string(), err))?;
        tracing::debug!(target: "pente", "{sender} called {method} on {to}");
        Ok(CallOutput(params::outputs_to_json(outputs, &tokens)))
    }

    fn invoke(
        &mut self,
        method: &str,
        inputs: &[Param],
        sender: &str,
        to: Address,
        args: &Value,
    ) -> Result<(), GroupError> {
        let execution = self.execute(method, inputs, sender, to, args, true)?;
        tracing::info!(
            target: "pente",
            "{sender} invoked {method} on {to} (gas used {})",
            execution.gas_used
        );
        Ok(())
    }
}

fn check_status(method: &str, execution: Execution) -> Result<Execution, GroupError> {
    match &execution.status {
        ExecutionStatus::Success => Ok(execution),
        ExecutionStatus::Revert => {
            let data = RevertData(execution.output.to_vec());
            let reason = data.reason();
            tracing::warn!(target: "pente", "{method} reverted with {data}");
            Err(GroupError::Reverted {
                method: method.to_string(),
                reason,
                data: data.0,
            })
        }
        ExecutionStatus::Halt(reason) => Err(GroupError::Halted {
            method: method.to_string(),
            reason: format!("{reason:?}"),
        }),
    }
}
