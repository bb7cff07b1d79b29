//! Fixture contracts, hand assembled so tests need no Solidity compiler.
//!
//! Constructors read their arguments from the end of their own code, which
//! holds both for CREATE deployments and for deployments at a pre-assigned
//! address.
use camino::{Utf8Path, Utf8PathBuf};
use common::ResourceLoader;
use ethers_core::{
    abi::{self, Token},
    utils::id,
};
use revm::bytecode::opcode::*;
use serde_json::{Value, json};

use crate::asm::Assembler;

pub const SIMPLE_STORAGE_RESOURCE: &str = "contracts/testcontracts/SimpleStorage.sol/SimpleStorage.json";
pub const SIMPLE_STORAGE_WRAPPED_RESOURCE: &str =
    "contracts/testcontracts/SimpleStorageWrapped.sol/SimpleStorageWrapped.json";
pub const BOND_TRACKER_RESOURCE: &str = "contracts/private/BondTracker.sol/BondTracker.json";

/// Balance credited to the custodian by the `BondTracker` constructor.
pub const BOND_INITIAL_SUPPLY: u64 = 1000;

pub fn selector(signature: &str) -> [u8; 4] {
    id(signature)
}

/// Reverts unless the call selector matches one of `routes`, otherwise jumps
/// to the matching label. Leaves the selector on the stack.
fn dispatch(asm: &mut Assembler, routes: &[(&str, &'static str)]) {
    asm.op(PUSH0).op(CALLDATALOAD).push_u64(0xe0).op(SHR);
    for &(signature, label) in routes {
        asm.op(DUP1)
            .push_bytes(&selector(signature))
            .op(EQ)
            .push_label(label)
            .op(JUMPI);
    }
    asm.op(PUSH0).op(PUSH0).op(REVERT);
}

/// mem[0..32] = the last word of the executing code.
fn load_last_word(asm: &mut Assembler) {
    asm.push_u64(32)
        .push_u64(32)
        .op(CODESIZE)
        .op(SUB)
        .op(PUSH0)
        .op(CODECOPY);
}

/// Copies the code at label `runtime` into memory and returns it.
fn return_runtime(asm: &mut Assembler, runtime_len: usize) {
    asm.push_usize(runtime_len)
        .push_label("runtime")
        .op(PUSH0)
        .op(CODECOPY)
        .push_usize(runtime_len)
        .op(PUSH0)
        .op(RETURN);
}

/// Returns the storage word in `slot` as a `uint256`/`address`.
fn return_slot(asm: &mut Assembler, slot: u64) {
    asm.push_u64(slot)
        .op(SLOAD)
        .op(PUSH0)
        .op(MSTORE)
        .push_u64(32)
        .op(PUSH0)
        .op(RETURN);
}

/// `SimpleStorage`: `set(uint256)` / `get()` over slot 0.
pub fn simple_storage_runtime() -> Vec<u8> {
    let mut asm = Assembler::new();
    dispatch(&mut asm, &[("set(uint256)", "set"), ("get()", "get")]);
    asm.jumpdest("set")
        .push_u64(4)
        .op(CALLDATALOAD)
        .op(PUSH0)
        .op(SSTORE)
        .op(STOP);
    asm.jumpdest("get");
    return_slot(&mut asm, 0);
    asm.assemble()
}

/// `constructor(uint256 x)` stores `x` in slot 0.
pub fn simple_storage_init() -> Vec<u8> {
    let runtime = simple_storage_runtime();
    let mut asm = Assembler::new();
    load_last_word(&mut asm);
    asm.op(PUSH0).op(MLOAD).op(PUSH0).op(SSTORE);
    return_runtime(&mut asm, runtime.len());
    asm.mark("runtime").raw(&runtime);
    asm.assemble()
}

/// `SimpleStorageWrapped`: forwards `set`/`get` to the `SimpleStorage` whose
/// address is held in slot 0.
pub fn simple_storage_wrapped_runtime() -> Vec<u8> {
    let mut asm = Assembler::new();
    dispatch(&mut asm, &[("set(uint256)", "set"), ("get()", "get")]);

    // call(gas, inner, 0, 0, 36, 0, 0) with the calldata copied verbatim
    asm.jumpdest("set")
        .push_u64(36)
        .op(PUSH0)
        .op(PUSH0)
        .op(CALLDATACOPY)
        .op(PUSH0)
        .op(PUSH0)
        .push_u64(36)
        .op(PUSH0)
        .op(PUSH0)
        .op(PUSH0)
        .op(SLOAD)
        .op(GAS)
        .op(CALL)
        .op(ISZERO)
        .push_label("fail")
        .op(JUMPI)
        .op(STOP);

    // staticcall(gas, inner, 0, 4, 0, 32) and return the word
    asm.jumpdest("get")
        .push_u64(4)
        .op(PUSH0)
        .op(PUSH0)
        .op(CALLDATACOPY)
        .push_u64(32)
        .op(PUSH0)
        .push_u64(4)
        .op(PUSH0)
        .op(PUSH0)
        .op(SLOAD)
        .op(GAS)
        .op(STATICCALL)
        .op(ISZERO)
        .push_label("fail")
        .op(JUMPI)
        .push_u64(32)
        .op(PUSH0)
        .op(RETURN);

    asm.jumpdest("fail").op(PUSH0).op(PUSH0).op(REVERT);
    asm.assemble()
}

/// `constructor(uint256 x)` creates `SimpleStorage(x)` and keeps its address in slot 0.
pub fn simple_storage_wrapped_init() -> Vec<u8> {
    let inner = simple_storage_init();
    let runtime = simple_storage_wrapped_runtime();
    let mut asm = Assembler::new();

    // mem = inner init code ++ x
    asm.push_usize(inner.len())
        .push_label("inner")
        .op(PUSH0)
        .op(CODECOPY);
    asm.push_u64(32)
        .push_u64(32)
        .op(CODESIZE)
        .op(SUB)
        .push_usize(inner.len())
        .op(CODECOPY);

    asm.push_usize(inner.len() + 32)
        .op(PUSH0)
        .op(PUSH0)
        .op(CREATE)
        .op(DUP1)
        .op(ISZERO)
        .push_label("fail")
        .op(JUMPI)
        .op(PUSH0)
        .op(SSTORE);
    return_runtime(&mut asm, runtime.len());

    asm.jumpdest("fail").op(PUSH0).op(PUSH0).op(REVERT);
    asm.mark("runtime").raw(&runtime);
    asm.mark("inner").raw(&inner);
    asm.assemble()
}

/// Runtime of the registry contract a `BondTracker` creates. It holds no logic.
pub fn investor_registry_init() -> Vec<u8> {
    let runtime = [PUSH0, PUSH0, RETURN];
    let mut asm = Assembler::new();
    return_runtime(&mut asm, runtime.len());
    asm.mark("runtime").raw(&runtime);
    asm.assemble()
}

fn error_payload(reason: &str) -> Vec<u8> {
    let mut payload = selector("Error(string)").to_vec();
    payload.extend(abi::encode(&[Token::String(reason.to_string())]));
    payload
}

/// Storage: 0 investor registry, 1 custodian, 2 distribution factory,
/// 3 distribution; balances are keyed by the account word itself.
pub fn bond_tracker_runtime() -> Vec<u8> {
    let reason = error_payload("not custodian");
    let mut asm = Assembler::new();
    dispatch(
        &mut asm,
        &[
            ("investorRegistry()", "investor_registry"),
            ("balanceOf(address)", "balance_of"),
            ("setDistribution(address)", "set_distribution"),
            ("distribution()", "distribution"),
        ],
    );

    asm.jumpdest("investor_registry");
    return_slot(&mut asm, 0);

    asm.jumpdest("balance_of")
        .push_u64(4)
        .op(CALLDATALOAD)
        .op(SLOAD)
        .op(PUSH0)
        .op(MSTORE)
        .push_u64(32)
        .op(PUSH0)
        .op(RETURN);

    asm.jumpdest("set_distribution")
        .push_u64(1)
        .op(SLOAD)
        .op(CALLER)
        .op(EQ)
        .op(ISZERO)
        .push_label("denied")
        .op(JUMPI)
        .push_u64(4)
        .op(CALLDATALOAD)
        .push_u64(3)
        .op(SSTORE)
        .op(STOP);

    asm.jumpdest("distribution");
    return_slot(&mut asm, 3);

    asm.jumpdest("denied")
        .push_usize(reason.len())
        .push_label("reason")
        .op(PUSH0)
        .op(CODECOPY)
        .push_usize(reason.len())
        .op(PUSH0)
        .op(REVERT);
    asm.mark("reason").raw(&reason);
    asm.assemble()
}

/// `constructor(string name, string symbol, address custodian, address distributionFactory)`.
pub fn bond_tracker_init() -> Vec<u8> {
    let registry = investor_registry_init();
    let runtime = bond_tracker_runtime();
    let mut asm = Assembler::new();

    // mem[0..128] = head of the encoded constructor arguments
    asm.push_u64(128)
        .push_label("args")
        .op(PUSH0)
        .op(CODECOPY);
    asm.push_u64(64).op(MLOAD).push_u64(1).op(SSTORE);
    asm.push_u64(96).op(MLOAD).push_u64(2).op(SSTORE);
    asm.push_u64(BOND_INITIAL_SUPPLY)
        .push_u64(64)
        .op(MLOAD)
        .op(SSTORE);

    asm.push_usize(registry.len())
        .push_label("registry")
        .op(PUSH0)
        .op(CODECOPY)
        .push_usize(registry.len())
        .op(PUSH0)
        .op(PUSH0)
        .op(CREATE)
        .op(DUP1)
        .op(ISZERO)
        .push_label("fail")
        .op(JUMPI)
        .op(PUSH0)
        .op(SSTORE);
    return_runtime(&mut asm, runtime.len());

    asm.jumpdest("fail").op(PUSH0).op(PUSH0).op(REVERT);
    asm.mark("runtime").raw(&runtime);
    asm.mark("registry").raw(&registry);
    asm.mark("args");
    asm.assemble()
}

fn function_abi(name: &str, inputs: &[(&str, &str)], outputs: &[(&str, &str)]) -> Value {
    let params = |params: &[(&str, &str)]| -> Vec<Value> {
        params
            .iter()
            .map(|(name, kind)| json!({"name": name, "type": kind}))
            .collect()
    };
    json!({
        "type": "function",
        "name": name,
        "inputs": params(inputs),
        "outputs": params(outputs),
    })
}

fn constructor_abi(inputs: &[(&str, &str)]) -> Value {
    let inputs: Vec<Value> = inputs
        .iter()
        .map(|(name, kind)| json!({"name": name, "type": kind}))
        .collect();
    json!({"type": "constructor", "inputs": inputs})
}

/// Writes an artifact document for `bytecode` at `resource` under `root`.
pub fn write_artifact(
    root: &Utf8Path,
    resource: &str,
    name: &str,
    abi: Vec<Value>,
    bytecode: &[u8],
) -> std::io::Result<Utf8PathBuf> {
    let path = root.join(resource);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let document = json!({
        "contractName": name,
        "abi": abi,
        "bytecode": format!("0x{}", hex::encode(bytecode)),
    });
    std::fs::write(&path, serde_json::to_string_pretty(&document)?)?;
    Ok(path)
}

/// A temporary resource root holding the artifacts of every fixture contract.
#[derive(Debug)]
pub struct FixtureResources {
    _dir: tempfile::TempDir,
    loader: ResourceLoader,
}

impl FixtureResources {
    pub fn install() -> std::io::Result<Self> {
        let dir = tempfile::tempdir()?;
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).map_err(|path| {
            std::io::Error::other(format!("non utf-8 temp dir {}", path.display()))
        })?;

        let storage_abi = vec![
            constructor_abi(&[("x", "uint256")]),
            function_abi("set", &[("x", "uint256")], &[]),
            function_abi("get", &[], &[("", "uint256")]),
        ];
        write_artifact(
            &root,
            SIMPLE_STORAGE_RESOURCE,
            "SimpleStorage",
            storage_abi.clone(),
            &simple_storage_init(),
        )?;
        write_artifact(
            &root,
            SIMPLE_STORAGE_WRAPPED_RESOURCE,
            "SimpleStorageWrapped",
            storage_abi,
            &simple_storage_wrapped_init(),
        )?;
        write_artifact(
            &root,
            BOND_TRACKER_RESOURCE,
            "BondTracker",
            vec![
                constructor_abi(&[
                    ("name", "string"),
                    ("symbol", "string"),
                    ("custodian", "address"),
                    ("distributionFactory", "address"),
                ]),
                function_abi("investorRegistry", &[], &[("", "address")]),
                function_abi("balanceOf", &[("account", "address")], &[("", "uint256")]),
                function_abi("setDistribution", &[("addr", "address")], &[]),
                function_abi("distribution", &[], &[("", "address")]),
            ],
            &bond_tracker_init(),
        )?;

        Ok(Self {
            _dir: dir,
            loader: ResourceLoader::new(root),
        })
    }

    pub fn loader(&self) -> &ResourceLoader {
        &self.loader
    }

    pub fn root(&self) -> &Utf8Path {
        self.loader.root()
    }
}
