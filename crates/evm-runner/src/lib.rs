//! Standalone EVM runner: deploys and invokes contracts against an in-memory
//! world state with `revm`, and exposes that state for inspection.
pub mod abi;
mod world;

pub use ethers_core::abi::{ParamType, Token};
pub use revm::primitives::{Address, Bytes, U256};
pub use world::WorldState;

use common::{EvmVersion, RunnerConfig};
use ethers_core::abi::{ParseError as AbiParseError, decode as abi_decode};
use revm::{
    ExecuteEvm, MainBuilder, MainContext,
    bytecode::Bytecode,
    context::{
        CfgEnv, Context, TxEnv,
        result::{ExecutionResult, HaltReason, Output},
    },
    primitives::{Log, TxKind, hardfork::SpecId},
};
use std::fmt;
use thiserror::Error;

/// Selector of the standard `Error(string)` revert payload.
const ERROR_SELECTOR: [u8; 4] = [0x08, 0xc3, 0x79, 0xa0];
/// Selector of the `Panic(uint256)` revert payload.
const PANIC_SELECTOR: [u8; 4] = [0x4e, 0x48, 0x7b, 0x71];

/// Error type returned by the runner.
#[derive(Error)]
pub enum RunnerError {
    #[error("abi encoding failed: {0}")]
    Abi(#[from] ethers_core::abi::Error),
    #[error("failed to parse function signature: {0}")]
    AbiSignature(#[from] AbiParseError),
    #[error("cannot infer the abi type of {0}")]
    UntypedArgument(String),
    #[error("invalid hex string: {0}")]
    Hex(#[from] hex::FromHexError),
    #[error("execution failed: {0}")]
    Execution(String),
    #[error("cannot deploy to {0}: the account already holds code")]
    AddressInUse(Address),
    #[error("runtime reverted with data {0}")]
    Revert(RevertData),
    #[error("runtime halted: {reason:?} (gas_used={gas_used})")]
    Halted { reason: HaltReason, gas_used: u64 },
    #[error("cannot decode the output of an unsuccessful execution ({0})")]
    NotSuccessful(String),
}

impl fmt::Debug for RunnerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Captures raw revert data and provides a nicer `Display` implementation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevertData(pub Vec<u8>);

impl RevertData {
    /// Human readable reason for `Error(string)` and `Panic(uint256)` payloads.
    pub fn reason(&self) -> Option<String> {
        let (selector, body) = self.0.split_first_chunk::<4>()?;
        if *selector == ERROR_SELECTOR {
            match abi_decode(&[ParamType::String], body).ok()?.pop()? {
                Token::String(reason) => Some(reason),
                _ => None,
            }
        } else if *selector == PANIC_SELECTOR {
            match abi_decode(&[ParamType::Uint(256)], body).ok()?.pop()? {
                Token::Uint(code) => Some(format!("panic code {code:#x}")),
                _ => None,
            }
        } else {
            None
        }
    }
}

impl fmt::Display for RevertData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(&self.0))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionStatus {
    Success,
    Revert,
    Halt(HaltReason),
}

/// Outcome of a single transaction. Reverts and halts are outcomes, not errors.
#[derive(Debug, Clone, PartialEq)]
pub struct Execution {
    pub status: ExecutionStatus,
    /// Return data; revert data for reverts; runtime code for deployments.
    pub output: Bytes,
    pub gas_used: u64,
    pub logs: Vec<Log>,
    /// Address of the deployed contract, for successful deployments.
    pub created: Option<Address>,
}

impl Execution {
    fn from_result(result: ExecutionResult<HaltReason>) -> Self {
        match result {
            ExecutionResult::Success {
                output,
                gas_used,
                logs,
                ..
            } => {
                let (output, created) = match output {
                    Output::Call(bytes) => (bytes, None),
                    Output::Create(bytes, address) => (bytes, address),
                };
                Self {
                    status: ExecutionStatus::Success,
                    output,
                    gas_used,
                    logs,
                    created,
                }
            }
            ExecutionResult::Revert { gas_used, output } => Self {
                status: ExecutionStatus::Revert,
                output,
                gas_used,
                logs: Vec::new(),
                created: None,
            },
            ExecutionResult::Halt { reason, gas_used } => Self {
                status: ExecutionStatus::Halt(reason),
                output: Bytes::new(),
                gas_used,
                logs: Vec::new(),
                created: None,
            },
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ExecutionStatus::Success
    }

    pub fn revert_data(&self) -> Option<RevertData> {
        (self.status == ExecutionStatus::Revert).then(|| RevertData(self.output.to_vec()))
    }

    /// Turns reverts and halts into errors.
    pub fn into_result(self) -> Result<Self, RunnerError> {
        match &self.status {
            ExecutionStatus::Success => Ok(self),
            ExecutionStatus::Revert => Err(RunnerError::Revert(RevertData(self.output.to_vec()))),
            ExecutionStatus::Halt(reason) => Err(RunnerError::Halted {
                reason: reason.clone(),
                gas_used: self.gas_used,
            }),
        }
    }
}

/// Stateful EVM backed by a persistent in-memory world state.
#[derive(Debug, Default)]
pub struct EvmRunner {
    world: WorldState,
    config: RunnerConfig,
}

impl EvmRunner {
    pub fn new(config: RunnerConfig) -> Self {
        Self {
            world: WorldState::new(),
            config,
        }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    pub fn world(&self) -> &WorldState {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut WorldState {
        &mut self.world
    }

    pub fn set_balance(&mut self, address: Address, balance: U256) {
        self.world.set_balance(address, balance);
    }

    /// Deploys `bytecode` at the pre-assigned `target` address.
    ///
    /// The init code (with the encoded constructor arguments appended) is
    /// installed at `target` and run by a call from `sender`; on success the
    /// returned runtime code replaces it. Constructor storage therefore lands at
    /// `target`, and contracts created by the constructor are created by `target`.
    pub fn run_contract_deployment(
        &mut self,
        sender: Address,
        target: Address,
        bytecode: &[u8],
        constructor_args: &[Token],
    ) -> Result<Execution, RunnerError> {
        if self.world.has_code(target) {
            return Err(RunnerError::AddressInUse(target));
        }
        let mut init_code = bytecode.to_vec();
        init_code.extend(ethers_core::abi::encode(constructor_args));
        self.world
            .set_code(target, Bytecode::new_raw(Bytes::from(init_code)));

        let mut execution = match self.transact(sender, TxKind::Call(target), Bytes::new(), true) {
            Ok(execution) => execution,
            Err(err) => {
                self.world.set_code(target, Bytecode::default());
                return Err(err);
            }
        };
        if execution.is_success() {
            self.world
                .set_code(target, Bytecode::new_raw(execution.output.clone()));
            execution.created = Some(target);
            tracing::debug!(target: "evm_runner", "Deployed {} bytes of runtime code at {target}", execution.output.len());
        } else {
            self.world.set_code(target, Bytecode::default());
            tracing::debug!(target: "evm_runner", "Deployment at {target} failed: {:?}", execution.status);
        }
        Ok(execution)
    }

    /// Deploys with a CREATE transaction; the address derives from `sender` and its nonce.
    pub fn deploy(
        &mut self,
        sender: Address,
        bytecode: &[u8],
        constructor_args: &[Token],
    ) -> Result<Execution, RunnerError> {
        let mut init_code = bytecode.to_vec();
        init_code.extend(ethers_core::abi::encode(constructor_args));
        let execution = self.transact(sender, TxKind::Create, Bytes::from(init_code), true)?;
        if let Some(address) = execution.created {
            tracing::debug!(target: "evm_runner", "Created contract at {address}");
        }
        Ok(execution)
    }

    /// Invokes `method` with argument types inferred from `args`, committing the result.
    pub fn run_contract_invoke(
        &mut self,
        sender: Address,
        target: Address,
        method: &str,
        args: &[Token],
    ) -> Result<Execution, RunnerError> {
        let calldata = abi::encode_invoke(method, args)?;
        self.call_raw(sender, target, &calldata)
    }

    /// Invokes a function named by its full signature, e.g. `set(uint256)`.
    pub fn run_contract_call(
        &mut self,
        sender: Address,
        target: Address,
        signature: &str,
        args: &[Token],
    ) -> Result<Execution, RunnerError> {
        let calldata = abi::encode_function_call(signature, args)?;
        self.call_raw(sender, target, &calldata)
    }

    /// Executes arbitrary calldata and commits the resulting state.
    pub fn call_raw(
        &mut self,
        sender: Address,
        target: Address,
        calldata: &[u8],
    ) -> Result<Execution, RunnerError> {
        self.transact(
            sender,
            TxKind::Call(target),
            Bytes::copy_from_slice(calldata),
            true,
        )
    }

    /// Executes arbitrary calldata and discards the resulting state.
    pub fn static_call_raw(
        &mut self,
        sender: Address,
        target: Address,
        calldata: &[u8],
    ) -> Result<Execution, RunnerError> {
        self.transact(
            sender,
            TxKind::Call(target),
            Bytes::copy_from_slice(calldata),
            false,
        )
    }

    /// ABI-decodes the return data of a successful execution.
    pub fn decode_return(
        execution: &Execution,
        outputs: &[ParamType],
    ) -> Result<Vec<Token>, RunnerError> {
        if !execution.is_success() {
            return Err(RunnerError::NotSuccessful(format!("{:?}", execution.status)));
        }
        abi::decode_output(outputs, &execution.output)
    }

    fn transact(
        &mut self,
        sender: Address,
        kind: TxKind,
        data: Bytes,
        commit: bool,
    ) -> Result<Execution, RunnerError> {
        if self.config.sender_balance > 0 && self.world.account(sender).is_none() {
            self.world
                .set_balance(sender, U256::from(self.config.sender_balance));
        }
        let nonce = self.world.nonce(sender);
        let chain_id = self.config.chain_id;

        let mut cfg = CfgEnv::new_with_spec(spec_id(self.config.evm_version));
        cfg.chain_id = chain_id;

        let tx = TxEnv::builder()
            .caller(sender)
            .gas_limit(self.config.gas_limit)
            .gas_price(0)
            .kind(kind)
            .value(U256::ZERO)
            .data(data)
            .nonce(nonce)
            .chain_id(Some(chain_id))
            .build()
            .map_err(|err| RunnerError::Execution(format!("{err:?}")))?;

        tracing::trace!(target: "evm_runner", "Executing {kind:?} from {sender} (nonce {nonce})");

        // The sender collects its own (zero) fees, so settlement touches no other account.
        let mut evm = Context::mainnet()
            .with_db(&mut self.world)
            .with_cfg(cfg)
            .modify_block_chained(|block| block.beneficiary = sender)
            .build_mainnet();

        let outcome = evm
            .transact(tx)
            .map_err(|err| RunnerError::Execution(err.to_string()))?;
        drop(evm);

        if commit {
            self.world.apply(outcome.state);
        }
        Ok(Execution::from_result(outcome.result))
    }
}

pub fn spec_id(version: EvmVersion) -> SpecId {
    match version {
        EvmVersion::London => SpecId::LONDON,
        EvmVersion::Paris => SpecId::MERGE,
        EvmVersion::Shanghai => SpecId::SHANGHAI,
        EvmVersion::Cancun => SpecId::CANCUN,
        EvmVersion::Prague => SpecId::PRAGUE,
    }
}

pub fn random_address() -> Address {
    Address::from(rand::random::<[u8; 20]>())
}

/// Parses a hex string (with or without `0x` prefix) into raw bytes.
pub fn hex_to_bytes(hex: &str) -> Result<Vec<u8>, RunnerError> {
    let trimmed = hex.trim().strip_prefix("0x").unwrap_or(hex.trim());
    hex::decode(trimmed).map_err(RunnerError::Hex)
}

/// Interprets exactly 32 return bytes as a big-endian `U256`.
pub fn bytes_to_u256(bytes: &[u8]) -> Result<U256, RunnerError> {
    let buf: [u8; 32] = bytes.try_into().map_err(|_| {
        RunnerError::Execution(format!(
            "expected 32 bytes of return data, found {}",
            bytes.len()
        ))
    })?;
    Ok(U256::from_be_bytes(buf))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers_core::types::U256 as AbiU256;
    use pretty_assertions::assert_eq;
    use revm::bytecode::opcode;

    /// Init code that stores its single constructor argument in slot 0 and
    /// deploys a runtime returning that slot.
    fn stored_value_init_code() -> Vec<u8> {
        let runtime = [
            opcode::PUSH0,
            opcode::SLOAD,
            opcode::PUSH0,
            opcode::MSTORE,
            opcode::PUSH1,
            0x20,
            opcode::PUSH0,
            opcode::RETURN,
        ];
        let mut code = vec![
            // mem[0..32] = last 32 bytes of code (the constructor argument)
            opcode::PUSH1,
            0x20,
            opcode::PUSH1,
            0x20,
            opcode::CODESIZE,
            opcode::SUB,
            opcode::PUSH0,
            opcode::CODECOPY,
            opcode::PUSH0,
            opcode::MLOAD,
            opcode::PUSH0,
            opcode::SSTORE,
            // return runtime
            opcode::PUSH1,
            runtime.len() as u8,
            opcode::PUSH1,
            0x00, // patched below
            opcode::PUSH0,
            opcode::CODECOPY,
            opcode::PUSH1,
            runtime.len() as u8,
            opcode::PUSH0,
            opcode::RETURN,
        ];
        let offset_index = 15;
        code[offset_index] = code.len() as u8;
        code.extend_from_slice(&runtime);
        code
    }

    fn reverting_init_code() -> Vec<u8> {
        vec![opcode::PUSH0, opcode::PUSH0, opcode::REVERT]
    }

    #[test]
    fn runner_error_debug_is_human_readable() {
        let err = RunnerError::Execution("nonce too low".to_string());
        let dbg = format!("{err:?}");
        assert_eq!(dbg, "execution failed: nonce too low");
    }

    #[test]
    fn deploys_at_preassigned_address() {
        let mut runner = EvmRunner::default();
        let sender = random_address();
        let target = random_address();
        let execution = runner
            .run_contract_deployment(
                sender,
                target,
                &stored_value_init_code(),
                &[Token::Uint(AbiU256::from(42u64))],
            )
            .unwrap();
        assert!(execution.is_success(), "{execution:?}");
        assert_eq!(execution.created, Some(target));
        assert!(runner.world().has_code(target));
        assert_eq!(runner.world().storage(target, U256::ZERO), U256::from(42));
        assert_eq!(runner.world().nonce(sender), 1);

        let get = runner.call_raw(sender, target, &[]).unwrap();
        assert_eq!(bytes_to_u256(&get.output).unwrap(), U256::from(42));
        assert_eq!(runner.world().nonce(sender), 2);
    }

    #[test]
    fn failed_deployment_leaves_no_code() {
        let mut runner = EvmRunner::default();
        let sender = random_address();
        let target = random_address();
        let execution = runner
            .run_contract_deployment(sender, target, &reverting_init_code(), &[])
            .unwrap();
        assert_eq!(execution.status, ExecutionStatus::Revert);
        assert_eq!(execution.created, None);
        assert!(!runner.world().has_code(target));
        assert!(matches!(
            EvmRunner::decode_return(&execution, &[ParamType::Uint(256)]),
            Err(RunnerError::NotSuccessful(_))
        ));
        assert!(matches!(
            execution.into_result(),
            Err(RunnerError::Revert(data)) if data.0.is_empty()
        ));
    }

    #[test]
    fn rejected_deployment_transaction_frees_the_target() {
        let sender = random_address();
        let target = random_address();
        let init = [opcode::PUSH0, opcode::PUSH0, opcode::RETURN];

        let mut runner = EvmRunner::new(RunnerConfig {
            gas_limit: 1000,
            ..RunnerConfig::default()
        });
        assert!(matches!(
            runner.run_contract_deployment(sender, target, &init, &[]),
            Err(RunnerError::Execution(_))
        ));
        assert!(!runner.world().has_code(target));

        runner.config.gas_limit = RunnerConfig::default().gas_limit;
        let execution = runner
            .run_contract_deployment(sender, target, &init, &[])
            .unwrap();
        assert!(execution.is_success(), "{execution:?}");
        assert_eq!(execution.created, Some(target));
    }

    #[test]
    fn new_senders_are_funded_once() {
        let mut runner = EvmRunner::new(RunnerConfig {
            sender_balance: 5_000,
            ..RunnerConfig::default()
        });
        let sender = random_address();
        let target = random_address();
        runner
            .run_contract_deployment(
                sender,
                target,
                &stored_value_init_code(),
                &[Token::Uint(AbiU256::from(1u64))],
            )
            .unwrap();
        assert_eq!(runner.world().balance(sender), U256::from(5_000));

        runner.set_balance(sender, U256::from(7));
        runner.call_raw(sender, target, &[]).unwrap();
        assert_eq!(runner.world().balance(sender), U256::from(7));
    }

    #[test]
    fn deploying_over_code_is_rejected() {
        let mut runner = EvmRunner::default();
        let sender = random_address();
        let target = random_address();
        let init = stored_value_init_code();
        let args = [Token::Uint(AbiU256::from(1u64))];
        runner
            .run_contract_deployment(sender, target, &init, &args)
            .unwrap();
        assert!(matches!(
            runner.run_contract_deployment(sender, target, &init, &args),
            Err(RunnerError::AddressInUse(address)) if address == target
        ));
    }

    #[test]
    fn create_deployment_derives_address_from_nonce() {
        let mut runner = EvmRunner::default();
        let sender = random_address();
        let execution = runner
            .deploy(
                sender,
                &stored_value_init_code(),
                &[Token::Uint(AbiU256::from(7u64))],
            )
            .unwrap();
        assert_eq!(execution.created, Some(sender.create(0)));
        assert_eq!(runner.world().nonce(sender), 1);
        let second = runner
            .deploy(
                sender,
                &stored_value_init_code(),
                &[Token::Uint(AbiU256::from(8u64))],
            )
            .unwrap();
        assert_eq!(second.created, Some(sender.create(1)));
    }

    #[test]
    fn static_calls_do_not_commit() {
        let mut runner = EvmRunner::default();
        let sender = random_address();
        let target = random_address();
        runner
            .run_contract_deployment(
                sender,
                target,
                &stored_value_init_code(),
                &[Token::Uint(AbiU256::from(5u64))],
            )
            .unwrap();
        let before = runner.world().nonce(sender);
        let execution = runner.static_call_raw(sender, target, &[]).unwrap();
        let decoded = EvmRunner::decode_return(&execution, &[ParamType::Uint(256)]).unwrap();
        assert_eq!(decoded, vec![Token::Uint(AbiU256::from(5u64))]);
        assert_eq!(runner.world().nonce(sender), before);
    }

    #[test]
    fn revert_reasons_are_decoded() {
        let mut data = ERROR_SELECTOR.to_vec();
        data.extend(ethers_core::abi::encode(&[Token::String("not custodian".into())]));
        assert_eq!(RevertData(data).reason().as_deref(), Some("not custodian"));

        let mut data = PANIC_SELECTOR.to_vec();
        data.extend(ethers_core::abi::encode(&[Token::Uint(AbiU256::from(0x11u64))]));
        assert_eq!(RevertData(data).reason().as_deref(), Some("panic code 0x11"));

        assert_eq!(RevertData(vec![1, 2]).reason(), None);
        assert_eq!(RevertData(vec![0xab, 0xcd]).to_string(), "0xabcd");
    }

    #[test]
    fn bytes_to_u256_requires_a_word() {
        assert!(bytes_to_u256(&[0u8; 31]).is_err());
        let mut word = [0u8; 32];
        word[31] = 9;
        assert_eq!(bytes_to_u256(&word).unwrap(), U256::from(9));
    }

    #[test]
    fn spec_ids_follow_evm_versions() {
        assert_eq!(spec_id(EvmVersion::Shanghai), SpecId::SHANGHAI);
        assert_eq!(spec_id(EvmVersion::Paris), SpecId::MERGE);
    }
}
